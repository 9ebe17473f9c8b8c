//! Tagged session-context values.
//!
//! The orchestrator enriches reasoning prompts from well-known context keys.
//! Representing the payload as a tagged enum keeps that enrichment an
//! exhaustive match instead of ad hoc JSON key lookups.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known context key for the latest classification result.
pub const KEY_DETECTION_RESULTS: &str = "detection_results";

/// Well-known context key for documents under discussion.
pub const KEY_DOCUMENTS: &str = "documents";

/// A structured value stored in a session's context table.
///
/// Values are overwritten wholesale per key; there are no merge semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextValue {
    /// The latest AI-content-detection result for this session.
    DetectionResults {
        /// Identifier of the detection run, if the client supplied one.
        detection_id: Option<String>,
        /// Probability the content is AI-generated, in `[0, 1]`.
        ai_score: f64,
        /// Probability the content is human-created, in `[0, 1]`.
        human_score: f64,
        /// Free-form feature hints from the classifier.
        features: Value,
    },
    /// Documents the user is discussing.
    Documents {
        /// The document list, in upload order.
        documents: Vec<DocumentRef>,
    },
    /// Any other structured payload a client attached.
    Other {
        /// The raw JSON value.
        value: Value,
    },
}

/// A reference to one document under discussion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Display name of the document.
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detection_results_tagged_serialization() {
        let value = ContextValue::DetectionResults {
            detection_id: Some("det-42".to_string()),
            ai_score: 0.85,
            human_score: 0.15,
            features: json!({"perplexity": "low"}),
        };
        let encoded = serde_json::to_value(&value).unwrap();
        assert_eq!(encoded["kind"], "detection_results");
        assert_eq!(encoded["ai_score"], 0.85);

        let back: ContextValue = serde_json::from_value(encoded).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn documents_round_trip() {
        let value = ContextValue::Documents {
            documents: vec![
                DocumentRef {
                    name: "essay.pdf".to_string(),
                },
                DocumentRef {
                    name: "notes.txt".to_string(),
                },
            ],
        };
        let json = serde_json::to_string(&value).unwrap();
        let back: ContextValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn other_preserves_arbitrary_json() {
        let value = ContextValue::Other {
            value: json!({"nested": {"a": [1, 2, 3]}}),
        };
        let json = serde_json::to_string(&value).unwrap();
        let back: ContextValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
