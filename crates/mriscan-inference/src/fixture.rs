//! A tiny ONNX classifier for tests.
//!
//! `input [1,3,128,128] -> GlobalAveragePool -> Flatten -> Gemm -> logits [1,4]`
//!
//! The Gemm weights copy the three channel means into the first three logits
//! and leave the fourth at zero, so the output is easy to predict by hand.
//! The protobuf is written field by field to avoid a code generator.

/// Name of the graph input.
pub const INPUT_NAME: &str = "input";
/// Name of the graph output.
pub const OUTPUT_NAME: &str = "logits";
/// Shape of the graph input.
pub const INPUT_SHAPE: [usize; 4] = [1, 3, 128, 128];

// onnx.TensorProto.DataType.FLOAT
const FLOAT: u64 = 1;
const IR_VERSION: u64 = 8;
const OPSET_VERSION: u64 = 13;

/// Serialized `ModelProto` of the test classifier.
pub fn tiny_classifier() -> Vec<u8> {
    #[rustfmt::skip]
    let weight = [
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
    ];

    let graph = Message::default()
        .message(1, node("GlobalAveragePool", &[INPUT_NAME], "pooled"))
        .message(1, node("Flatten", &["pooled"], "features"))
        .message(1, node("Gemm", &["features", "weight", "bias"], OUTPUT_NAME))
        .string(2, "tiny_classifier")
        .message(5, initializer("weight", &[3, 4], &weight))
        .message(5, initializer("bias", &[4], &[0.0; 4]))
        .message(11, value_info(INPUT_NAME, &INPUT_SHAPE))
        .message(12, value_info(OUTPUT_NAME, &[1, 4]));

    Message::default()
        .varint(1, IR_VERSION)
        .string(2, "mriscan-tests")
        .message(7, graph)
        .message(8, Message::default().varint(2, OPSET_VERSION))
        .into_bytes()
}

/// Input data whose three channel planes are filled with `values`.
pub fn channel_planes(values: [f32; 3]) -> Vec<f32> {
    let plane = INPUT_SHAPE[2] * INPUT_SHAPE[3];
    values
        .iter()
        .flat_map(|&v| std::iter::repeat_n(v, plane))
        .collect()
}

fn node(op_type: &str, inputs: &[&str], output: &str) -> Message {
    inputs
        .iter()
        .fold(Message::default(), |m, input| m.string(1, input))
        .string(2, output)
        .string(3, output)
        .string(4, op_type)
}

fn initializer(name: &str, dims: &[u64], values: &[f32]) -> Message {
    let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    dims.iter()
        .fold(Message::default(), |m, &d| m.varint(1, d))
        .varint(2, FLOAT)
        .string(8, name)
        .bytes(9, &raw)
}

fn value_info(name: &str, dims: &[usize]) -> Message {
    let shape = dims.iter().fold(Message::default(), |shape, &d| {
        shape.message(1, Message::default().varint(1, d as u64))
    });
    let tensor_type = Message::default().varint(1, FLOAT).message(2, shape);
    Message::default()
        .string(1, name)
        .message(2, Message::default().message(1, tensor_type))
}

/// Minimal protobuf writer: varint and length-delimited fields only.
#[derive(Default)]
struct Message(Vec<u8>);

impl Message {
    fn varint(mut self, field: u32, value: u64) -> Self {
        self.key(field, 0);
        put_varint(&mut self.0, value);
        self
    }

    fn bytes(mut self, field: u32, data: &[u8]) -> Self {
        self.key(field, 2);
        put_varint(&mut self.0, data.len() as u64);
        self.0.extend_from_slice(data);
        self
    }

    fn string(self, field: u32, value: &str) -> Self {
        self.bytes(field, value.as_bytes())
    }

    fn message(self, field: u32, inner: Message) -> Self {
        self.bytes(field, &inner.0)
    }

    fn key(&mut self, field: u32, wire_type: u64) {
        put_varint(&mut self.0, (u64::from(field) << 3) | wire_type);
    }

    fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_varint_encoding() {
        let mut buf = Vec::new();
        put_varint(&mut buf, 300);
        assert_eq!(buf, vec![0xac, 0x02]);

        // field 1, varint 8
        assert_eq!(Message::default().varint(1, 8).into_bytes(), vec![0x08, 0x08]);
        // field 2, "ab"
        assert_eq!(
            Message::default().string(2, "ab").into_bytes(),
            vec![0x12, 0x02, b'a', b'b']
        );
    }

    #[test]
    fn test_channel_planes() {
        let data = channel_planes([1.0, 2.0, 3.0]);
        let plane = 128 * 128;
        assert_eq!(data.len(), 3 * plane);
        assert_eq!((data[0], data[plane], data[2 * plane]), (1.0, 2.0, 3.0));
    }
}
