//! Scoring and thresholded decision logic

use crate::model::CachedModel;
use candle_core::Tensor;
use dermascan_core::{Diagnosis, Error, Result};

/// Runs the cached model against preprocessed tensors and applies the
/// decision threshold.
pub struct InferenceEngine {
    threshold: f32,
}

impl InferenceEngine {
    /// Create an engine with the configured decision threshold
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Configured threshold
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Score one preprocessed image, returning the model's scalar output.
    ///
    /// Shape mismatches and any model failure surface immediately as
    /// `Inference`; scoring failures are never transient and never retried.
    pub fn score(&self, tensor: &Tensor, model: &CachedModel) -> Result<f32> {
        let (height, width) = model.input_size();
        let expected = [1, height, width, 3];
        if tensor.dims() != expected {
            return Err(Error::inference(format!(
                "input tensor has shape {:?}, model expects {:?}",
                tensor.dims(),
                expected
            )));
        }

        let output = model
            .forward(tensor)
            .map_err(|e| Error::inference(format!("forward pass failed: {e}")))?;

        let scores = output
            .flatten_all()
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(|e| Error::inference(format!("reading model output failed: {e}")))?;

        scores
            .first()
            .copied()
            .ok_or_else(|| Error::inference("model produced no output".to_string()))
    }

    /// Apply the threshold.
    ///
    /// Strictly greater-than: a score equal to the threshold classifies as
    /// Non-cancer.
    pub fn decide(&self, score: f32) -> Diagnosis {
        if score > self.threshold {
            Diagnosis::Cancer
        } else {
            Diagnosis::NonCancer
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LesionNet;
    use candle_core::{DType, Device};
    use candle_nn::VarBuilder;

    fn engine() -> InferenceEngine {
        InferenceEngine::new(0.58)
    }

    fn zero_weight_model() -> CachedModel {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let net = LesionNet::new(vb, (224, 224)).unwrap();
        CachedModel::new(net, (224, 224))
    }

    #[test]
    fn test_decision_boundary_is_strict() {
        let engine = engine();

        assert_eq!(engine.decide(0.58), Diagnosis::NonCancer);
        assert_eq!(engine.decide(0.580_000_1), Diagnosis::Cancer);
        assert_eq!(engine.decide(0.0), Diagnosis::NonCancer);
        assert_eq!(engine.decide(1.0), Diagnosis::Cancer);
    }

    #[test]
    fn test_score_rejects_wrong_shape() {
        let model = zero_weight_model();
        let tensor = Tensor::zeros((1, 128, 128, 3), DType::F32, &Device::Cpu).unwrap();

        let err = engine().score(&tensor, &model).unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn test_zero_weights_score_is_half() {
        let model = zero_weight_model();
        let tensor = Tensor::zeros((1, 224, 224, 3), DType::F32, &Device::Cpu).unwrap();

        // All-zero weights collapse the sigmoid input to zero
        let score = engine().score(&tensor, &model).unwrap();
        assert!((score - 0.5).abs() < 1e-6);
        assert_eq!(engine().decide(score), Diagnosis::NonCancer);
    }
}
