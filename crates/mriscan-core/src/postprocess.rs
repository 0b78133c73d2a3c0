//! Turn raw logits into a ranked probability distribution.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::PostprocessError;
use crate::labels::{NUM_CLASSES, TumorClass};

/// One class with its probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassScore {
    pub class_name: TumorClass,
    /// Probability in `0.0..=1.0`.
    pub confidence: f32,
}

/// Result of one classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    /// All classes, most likely first.
    pub predictions: Vec<ClassScore>,
    /// Same as `predictions[0]`.
    pub top_prediction: ClassScore,
    /// Wall-clock duration of the forward pass in milliseconds.
    #[serde(rename = "inferenceTime")]
    pub inference_time_ms: f64,
}

impl Prediction {
    /// Rank `logits` and attach the measured forward-pass time.
    pub fn from_logits(logits: &[f32], inference_time_ms: f64) -> Result<Self, PostprocessError> {
        let predictions = rank(logits)?;
        let top_prediction = predictions[0];
        Ok(Self {
            predictions,
            top_prediction,
            inference_time_ms,
        })
    }

    /// Probability assigned to `class`.
    pub fn confidence_of(&self, class: TumorClass) -> f32 {
        self.predictions
            .iter()
            .find(|s| s.class_name == class)
            .map(|s| s.confidence)
            .unwrap_or(0.0)
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Softmax `logits` and sort classes by descending probability.
///
/// Equal probabilities keep the fixed label order.
pub fn rank(logits: &[f32]) -> Result<Vec<ClassScore>, PostprocessError> {
    if logits.len() != NUM_CLASSES {
        return Err(PostprocessError::LengthMismatch {
            expected: NUM_CLASSES,
            actual: logits.len(),
        });
    }
    if let Some((index, &value)) = logits.iter().enumerate().find(|(_, l)| !l.is_finite()) {
        return Err(PostprocessError::NonFinite { index, value });
    }

    let mut scores: Vec<ClassScore> = TumorClass::ALL
        .into_iter()
        .zip(softmax(logits))
        .map(|(class_name, confidence)| ClassScore {
            class_name,
            confidence,
        })
        .collect();

    scores.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.class_name.cmp(&b.class_name))
    });

    Ok(scores)
}
