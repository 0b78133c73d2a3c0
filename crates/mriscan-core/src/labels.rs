//! The fixed label set produced by the network.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of output classes.
pub const NUM_CLASSES: usize = 4;

/// Tumor category predicted by the network.
///
/// Variant order is the order of the network's output layer and is also the
/// tie-break order when two classes receive the same probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TumorClass {
    Glioma,
    Meningioma,
    #[serde(rename = "notumor")]
    NoTumor,
    Pituitary,
}

impl TumorClass {
    /// All classes in output-layer order.
    pub const ALL: [TumorClass; NUM_CLASSES] = [
        TumorClass::Glioma,
        TumorClass::Meningioma,
        TumorClass::NoTumor,
        TumorClass::Pituitary,
    ];

    /// Wire name, as used in serialized predictions.
    pub fn as_str(self) -> &'static str {
        match self {
            TumorClass::Glioma => "glioma",
            TumorClass::Meningioma => "meningioma",
            TumorClass::NoTumor => "notumor",
            TumorClass::Pituitary => "pituitary",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TumorClass::Glioma => "Glioma",
            TumorClass::Meningioma => "Meningioma",
            TumorClass::NoTumor => "No Tumor",
            TumorClass::Pituitary => "Pituitary",
        }
    }
}

impl fmt::Display for TumorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TumorClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown class: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_order_matches_output_layer() {
        let names: Vec<&str> = TumorClass::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(names, ["glioma", "meningioma", "notumor", "pituitary"]);
        assert!(TumorClass::ALL.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_names() {
        assert_eq!("notumor".parse::<TumorClass>(), Ok(TumorClass::NoTumor));
        assert_eq!(" Glioma ".parse::<TumorClass>(), Ok(TumorClass::Glioma));
        assert!("astrocytoma".parse::<TumorClass>().is_err());
        assert_eq!(TumorClass::NoTumor.display_name(), "No Tumor");
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&TumorClass::ALL).unwrap();
        assert_eq!(json, r#"["glioma","meningioma","notumor","pituitary"]"#);
        let back: TumorClass = serde_json::from_str(r#""pituitary""#).unwrap();
        assert_eq!(back, TumorClass::Pituitary);
    }
}
