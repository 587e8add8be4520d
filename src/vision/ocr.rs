//! OCR (Optical Character Recognition) module
//!
//! The recognizer is a black box behind [`TextRecognizer`]: an owned image
//! region goes in, the best candidate text comes out.

use async_trait::async_trait;
use image::RgbaImage;
use thiserror::Error;

use super::DetectionClass;

/// Recognizer errors. All of them are treated as a transient miss.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Recognizer backend is not available
    #[error("OCR backend unavailable: {0}")]
    Unavailable(String),

    /// Inference failed for this region
    #[error("OCR inference failed: {0}")]
    InferenceError(String),

    /// Region dimensions are unusable
    #[error("Invalid region dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),
}

/// Single OCR result
#[derive(Debug, Clone, PartialEq)]
pub struct OcrResult {
    /// Recognized text
    pub text: String,
    /// Recognition confidence (0.0 - 1.0)
    pub confidence: f32,
}

/// One recognition job
#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    /// Track the region belongs to
    pub track_id: u64,
    pub class: DetectionClass,
    /// Cropped region, owned by the request
    pub region: RgbaImage,
    /// Text the detection source attached to the detection, if any
    pub hint: Option<String>,
}

/// Asynchronous text recognizer
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Recognize the best text candidate in the request's region.
    ///
    /// `Ok(None)` means nothing readable was found.
    async fn recognize(&self, request: &RecognitionRequest) -> Result<Option<OcrResult>, OcrError>;
}

/// Recognizer that answers with the text the detection source already
/// attached. Used for replaying recorded sessions.
#[derive(Debug, Clone)]
pub struct HintRecognizer {
    /// Confidence reported for every hinted result
    pub confidence: f32,
}

impl Default for HintRecognizer {
    fn default() -> Self {
        Self { confidence: 0.9 }
    }
}

#[async_trait]
impl TextRecognizer for HintRecognizer {
    async fn recognize(&self, request: &RecognitionRequest) -> Result<Option<OcrResult>, OcrError> {
        let (width, height) = request.region.dimensions();
        if width == 0 || height == 0 {
            return Err(OcrError::InvalidDimensions(width, height));
        }

        Ok(request.hint.as_ref().map(|text| OcrResult {
            text: text.clone(),
            confidence: self.confidence,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(hint: Option<&str>, width: u32, height: u32) -> RecognitionRequest {
        RecognitionRequest {
            track_id: 1,
            class: DetectionClass::BreakerFace,
            region: RgbaImage::new(width, height),
            hint: hint.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_hint_recognizer_returns_hint() {
        let recognizer = HintRecognizer::default();
        let result = recognizer.recognize(&request(Some("QO120"), 20, 20)).await.unwrap();
        assert_eq!(
            result,
            Some(OcrResult {
                text: "QO120".to_string(),
                confidence: 0.9
            })
        );
    }

    #[tokio::test]
    async fn test_hint_recognizer_without_hint() {
        let recognizer = HintRecognizer::default();
        let result = recognizer.recognize(&request(None, 20, 20)).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_hint_recognizer_rejects_empty_region() {
        let recognizer = HintRecognizer::default();
        let err = recognizer.recognize(&request(Some("X"), 0, 5)).await.unwrap_err();
        assert!(matches!(err, OcrError::InvalidDimensions(0, 5)));
    }
}
