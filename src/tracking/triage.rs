//! Recognition Result Triage
//!
//! Screens recognizer output before it may reach the confirmation prompt.
//! Panel labels only get loose checks and the human makes the final call;
//! every other class must pass the confidence threshold and the text-shape
//! validator.

use serde::Serialize;

use crate::vision::text::{alphanumeric_ratio, has_alphanumeric, has_letter_or_digit, normalize, valid_char_count};
use crate::vision::{DetectionClass, OcrResult, TextShapeValidator};

const MIN_VALID_CHARS: usize = 2;
const LABEL_MIN_LEN: usize = 3;
const LABEL_MAX_LEN: usize = 12;
const LABEL_MIN_ALNUM_RATIO: f32 = 0.6;

/// Why a recognition result was rejected
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum RejectReason {
    /// Recognizer returned nothing or failed
    NoResult,
    /// Fewer than two non-whitespace characters
    TooShort,
    NoAlphanumeric,
    /// Label text outside the loose label checks
    LabelShape,
    LowConfidence { confidence: f32 },
    /// Failed the text-shape validator
    InvalidShape,
}

/// Triage outcome
#[derive(Debug, Clone, PartialEq)]
pub enum TriageVerdict {
    /// Candidate may go to confirmation
    Accept { text: String, confidence: f32 },
    Reject {
        reason: RejectReason,
        /// Whether the track should also start its cooldown
        cooldown: bool,
    },
}

/// Screen one recognition result for `class`.
pub fn triage(
    class: DetectionClass,
    result: Option<&OcrResult>,
    ocr_threshold: f32,
    validator: &dyn TextShapeValidator,
) -> TriageVerdict {
    let fast_path = class.is_fast_path();
    let generic_reject = |reason| TriageVerdict::Reject {
        reason,
        cooldown: fast_path,
    };

    let Some(result) = result else {
        return generic_reject(RejectReason::NoResult);
    };
    let text = normalize(&result.text);

    if valid_char_count(&text) < MIN_VALID_CHARS {
        return generic_reject(RejectReason::TooShort);
    }
    if !has_alphanumeric(&text) {
        return generic_reject(RejectReason::NoAlphanumeric);
    }

    if fast_path {
        let len = text.chars().count();
        if len < LABEL_MIN_LEN
            || len > LABEL_MAX_LEN
            || !has_letter_or_digit(&text)
            || alphanumeric_ratio(&text) < LABEL_MIN_ALNUM_RATIO
        {
            return TriageVerdict::Reject {
                reason: RejectReason::LabelShape,
                cooldown: true,
            };
        }
    } else {
        if result.confidence < ocr_threshold {
            return TriageVerdict::Reject {
                reason: RejectReason::LowConfidence {
                    confidence: result.confidence,
                },
                cooldown: true,
            };
        }
        if !validator.is_valid(&text) {
            return TriageVerdict::Reject {
                reason: RejectReason::InvalidShape,
                cooldown: true,
            };
        }
    }

    TriageVerdict::Accept {
        text,
        confidence: result.confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::BreakerModelValidator;

    fn ocr(text: &str, confidence: f32) -> OcrResult {
        OcrResult {
            text: text.to_string(),
            confidence,
        }
    }

    fn run(class: DetectionClass, result: Option<OcrResult>) -> TriageVerdict {
        triage(class, result.as_ref(), 0.6, &BreakerModelValidator)
    }

    #[test]
    fn test_missing_result_cooldown_depends_on_class() {
        assert_eq!(
            run(DetectionClass::BreakerFace, None),
            TriageVerdict::Reject {
                reason: RejectReason::NoResult,
                cooldown: false
            }
        );
        assert_eq!(
            run(DetectionClass::PanelLabel, None),
            TriageVerdict::Reject {
                reason: RejectReason::NoResult,
                cooldown: true
            }
        );
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            run(DetectionClass::BreakerFace, Some(ocr(" A ", 0.9))),
            TriageVerdict::Reject { reason: RejectReason::TooShort, cooldown: false }
        ));
        assert!(matches!(
            run(DetectionClass::BreakerFace, Some(ocr("--//", 0.9))),
            TriageVerdict::Reject { reason: RejectReason::NoAlphanumeric, cooldown: false }
        ));
    }

    #[test]
    fn test_label_loose_checks() {
        let accepted = run(DetectionClass::PanelLabel, Some(ocr("  main  lp1 ", 0.1)));
        assert_eq!(
            accepted,
            TriageVerdict::Accept {
                text: "main lp1".to_string(),
                confidence: 0.1
            }
        );

        for bad in ["AB", "PANELBOARD-LP1", "A-/-/"] {
            assert_eq!(
                run(DetectionClass::PanelLabel, Some(ocr(bad, 0.9))),
                TriageVerdict::Reject {
                    reason: RejectReason::LabelShape,
                    cooldown: true
                },
                "{bad}"
            );
        }
    }

    #[test]
    fn test_breaker_requires_confidence_and_shape() {
        assert_eq!(
            run(DetectionClass::BreakerFace, Some(ocr("BJA36050", 0.9))),
            TriageVerdict::Accept {
                text: "BJA36050".to_string(),
                confidence: 0.9
            }
        );
        assert!(matches!(
            run(DetectionClass::BreakerFace, Some(ocr("BJA36050", 0.3))),
            TriageVerdict::Reject { reason: RejectReason::LowConfidence { .. }, cooldown: true }
        ));
        assert!(matches!(
            run(DetectionClass::TextRoi, Some(ocr("hello", 0.9))),
            TriageVerdict::Reject { reason: RejectReason::InvalidShape, cooldown: true }
        ));
    }
}
