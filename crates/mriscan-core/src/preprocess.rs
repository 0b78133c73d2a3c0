//! Image preprocessing: decode, stretch to the network input size, normalize.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbaImage};
use mriscan_inference::InputTensor;
use ndarray::Array4;
use tracing::debug;

use crate::config::ResizeFilter;
use crate::error::PreprocessError;

/// Network input width.
pub const INPUT_WIDTH: u32 = 128;
/// Network input height.
pub const INPUT_HEIGHT: u32 = 128;
/// Network input channels (RGB).
pub const INPUT_CHANNELS: usize = 3;
/// Element count of one input tensor.
pub const TENSOR_LEN: usize = INPUT_CHANNELS * INPUT_WIDTH as usize * INPUT_HEIGHT as usize;
/// Full input shape, batch of one, NCHW.
pub const INPUT_SHAPE: [usize; 4] =
    [1, INPUT_CHANNELS, INPUT_HEIGHT as usize, INPUT_WIDTH as usize];

// Training-time statistics of the network; changing them breaks the model.
const MEAN: f32 = 0.5;
const STD: f32 = 0.5;

/// Map a raw 0..=255 channel value to roughly -1..=1.
#[inline]
pub fn normalize(raw: u8) -> f32 {
    (raw as f32 / 255.0 - MEAN) / STD
}

/// A preprocessed image ready for one forward pass.
///
/// Layout is channel-major: every red value, then every green, then every
/// blue. The tensor is consumed when handed to the session.
#[derive(Debug)]
pub struct ImageTensor {
    data: Array4<f32>,
}

impl ImageTensor {
    /// Number of elements; always [`TENSOR_LEN`].
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Values in channel-major order.
    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.data.iter().copied()
    }

    /// Value at channel `c`, row `y`, column `x`.
    pub fn get(&self, c: usize, y: usize, x: usize) -> Option<f32> {
        self.data.get([0, c, y, x]).copied()
    }

    /// Hand the tensor over to the inference layer.
    pub fn into_input(self) -> InputTensor {
        InputTensor::from_array(self.data.into_dyn())
    }
}

/// Turns arbitrary images into network input tensors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImagePreprocessor {
    filter: ResizeFilter,
}

impl ImagePreprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the resampling filter used for the resize.
    pub fn with_filter(mut self, filter: ResizeFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Decode an encoded image (PNG, JPEG, ...).
    pub fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, PreprocessError> {
        let image = image::load_from_memory(bytes)?;
        debug!("Decoded image: {}x{}", image.width(), image.height());
        Ok(image)
    }

    /// Wrap a raw RGBA buffer such as canvas `ImageData`.
    pub fn from_rgba(
        &self,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> Result<DynamicImage, PreprocessError> {
        if width == 0 || height == 0 {
            return Err(PreprocessError::InvalidBuffer(format!(
                "zero-sized image {}x{}",
                width, height
            )));
        }
        let len = data.len();
        let rgba = RgbaImage::from_raw(width, height, data).ok_or_else(|| {
            PreprocessError::InvalidBuffer(format!(
                "{}x{} RGBA needs {} bytes, got {}",
                width,
                height,
                width as usize * height as usize * 4,
                len
            ))
        })?;
        Ok(DynamicImage::ImageRgba8(rgba))
    }

    /// Build the input tensor for `image`.
    ///
    /// The image is stretched to 128x128 regardless of aspect ratio and any
    /// alpha channel is dropped.
    pub fn preprocess(&self, image: &DynamicImage) -> Result<ImageTensor, PreprocessError> {
        let (orig_width, orig_height) = image.dimensions();
        if orig_width == 0 || orig_height == 0 {
            return Err(PreprocessError::InvalidBuffer("image has no pixels".into()));
        }
        debug!(
            "Resizing {}x{} -> {}x{}",
            orig_width, orig_height, INPUT_WIDTH, INPUT_HEIGHT
        );

        let resized = if (orig_width, orig_height) == (INPUT_WIDTH, INPUT_HEIGHT) {
            image.to_rgb8()
        } else {
            image
                .resize_exact(INPUT_WIDTH, INPUT_HEIGHT, FilterType::from(self.filter))
                .to_rgb8()
        };

        let mut data = Array4::<f32>::zeros(INPUT_SHAPE);
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..INPUT_CHANNELS {
                data[[0, c, y as usize, x as usize]] = normalize(pixel[c]);
            }
        }

        Ok(ImageTensor { data })
    }

    /// Decode and preprocess in one step.
    pub fn preprocess_bytes(&self, bytes: &[u8]) -> Result<ImageTensor, PreprocessError> {
        let image = self.decode(bytes)?;
        self.preprocess(&image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage, Rgba};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn png_bytes(image: &DynamicImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_black_image_is_minus_one() {
        let black = DynamicImage::ImageRgb8(RgbImage::new(128, 128));
        let tensor = ImagePreprocessor::new().preprocess(&black).unwrap();

        assert_eq!(tensor.len(), TENSOR_LEN);
        assert_eq!(tensor.shape(), &INPUT_SHAPE);
        assert!(tensor.values().all(|v| v == -1.0));
    }

    #[test]
    fn test_normalize_range() {
        assert_eq!(normalize(0), -1.0);
        assert_eq!(normalize(255), 1.0);
        assert!(normalize(128).abs() < 0.01);
    }

    #[test]
    fn test_channel_major_layout() {
        let red = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 0, 0])));
        let tensor = ImagePreprocessor::new().preprocess(&red).unwrap();
        let values: Vec<f32> = tensor.values().collect();
        let plane = TENSOR_LEN / 3;

        assert!(values[..plane].iter().all(|&v| v == 1.0));
        assert!(values[plane..].iter().all(|&v| v == -1.0));
    }

    #[test]
    fn test_stretch_any_aspect_ratio() {
        let wide = DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 90, Rgb([10, 200, 30])));
        let tensor = ImagePreprocessor::new()
            .with_filter(ResizeFilter::Lanczos3)
            .preprocess(&wide)
            .unwrap();

        assert_eq!(tensor.len(), TENSOR_LEN);
        assert!(tensor.values().all(|v| (-1.0..=1.0).contains(&v)));
        let green = tensor.get(1, 127, 127).unwrap();
        assert!((green - normalize(200)).abs() < 0.01);
        assert_eq!(tensor.get(3, 0, 0), None);
    }

    #[test]
    fn test_alpha_is_dropped() {
        let translucent = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            128,
            128,
            Rgba([255, 255, 255, 0]),
        ));
        let tensor = ImagePreprocessor::new().preprocess(&translucent).unwrap();
        assert!(tensor.values().all(|v| v == 1.0));
    }

    #[test]
    fn test_decode_round_trip_png() {
        let gray = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 48, Rgb([51, 51, 51])));
        let tensor = ImagePreprocessor::new()
            .preprocess_bytes(&png_bytes(&gray))
            .unwrap();
        let expected = normalize(51);
        assert!(tensor.values().all(|v| (v - expected).abs() < 1e-6));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = ImagePreprocessor::new()
            .preprocess_bytes(b"definitely not an image")
            .unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)));
    }

    #[test]
    fn test_from_rgba_checks_length() {
        let pre = ImagePreprocessor::new();
        assert!(pre.from_rgba(2, 2, vec![0; 16]).is_ok());
        assert!(matches!(
            pre.from_rgba(2, 2, vec![0; 15]),
            Err(PreprocessError::InvalidBuffer(_))
        ));
        assert!(matches!(
            pre.from_rgba(0, 2, Vec::new()),
            Err(PreprocessError::InvalidBuffer(_))
        ));
    }
}
