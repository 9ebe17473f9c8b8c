//! Prompt enrichment and system instructions.
//!
//! A turn's prompt starts from the raw user text. When the session context
//! holds detection results, a structured summary of scores and feature hints
//! is prepended; otherwise, when it holds a document list, a document summary
//! is prepended. At most one enrichment applies per turn, and detection
//! results take precedence.

use std::collections::HashMap;
use vaani_types::{ContextValue, DocumentRef, KEY_DETECTION_RESULTS, KEY_DOCUMENTS};

/// System instruction when the user is asking about detection results.
pub const RESULTS_EXPLANATION: &str = "You are an AI detection expert. Explain detection \
    results clearly and concisely. Focus on specific patterns, features, and evidence. \
    Use simple language. Be helpful and educational.";

/// System instruction for general guidance through the tool.
pub const TUTORIAL: &str = "You are a friendly tutorial guide for the AI Detector tool. \
    Guide users step-by-step through features. Be encouraging and clear. Ask questions \
    to understand user needs.";

/// System instruction when documents are under discussion.
pub const ANALYSIS_DISCUSSION: &str = "You are an analytical assistant for document \
    comparison. Compare documents objectively, highlight key differences, and provide \
    insights. Be thorough but concise.";

/// System instruction for summarizing batch analysis results.
pub const BATCH_SUMMARY: &str = "You are a data analyst summarizing batch analysis \
    results. Provide clear statistics, identify patterns, and highlight important \
    findings. Be organized and precise.";

/// Renders a probability in `[0, 1]` as a whole percentage.
fn percent(score: f64) -> String {
    format!("{:.0}%", score * 100.0)
}

/// Builds the contextual prompt for a turn.
///
/// Enrichment precedence: detection results, then documents, then the raw
/// text unmodified.
pub fn build_prompt(raw_text: &str, context: &HashMap<String, ContextValue>) -> String {
    if let Some(ContextValue::DetectionResults {
        ai_score,
        human_score,
        features,
        ..
    }) = context.get(KEY_DETECTION_RESULTS)
    {
        return format!(
            "Based on the AI detection analysis:\n\
             - AI probability: {}\n\
             - Human probability: {}\n\
             - Key features: {}\n\n\
             User question: {}\n\n\
             Provide a clear, helpful explanation.",
            percent(*ai_score),
            percent(*human_score),
            features,
            raw_text
        );
    }

    if let Some(ContextValue::Documents { documents }) = context.get(KEY_DOCUMENTS) {
        return format!(
            "Documents being discussed:\n{}\n\nUser question: {}",
            document_list(documents),
            raw_text
        );
    }

    raw_text.to_string()
}

fn document_list(documents: &[DocumentRef]) -> String {
    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("- Document {}: {}", i + 1, doc.name))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Selects the system instruction for a turn from the session context.
pub fn select_system_instruction(context: &HashMap<String, ContextValue>) -> &'static str {
    if matches!(
        context.get(KEY_DETECTION_RESULTS),
        Some(ContextValue::DetectionResults { .. })
    ) {
        RESULTS_EXPLANATION
    } else if matches!(
        context.get(KEY_DOCUMENTS),
        Some(ContextValue::Documents { .. })
    ) {
        ANALYSIS_DISCUSSION
    } else {
        TUTORIAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detection(ai: f64, human: f64) -> ContextValue {
        ContextValue::DetectionResults {
            detection_id: None,
            ai_score: ai,
            human_score: human,
            features: json!({"burstiness": "low"}),
        }
    }

    fn documents() -> ContextValue {
        ContextValue::Documents {
            documents: vec![
                DocumentRef {
                    name: "essay.pdf".to_string(),
                },
                DocumentRef {
                    name: "draft.txt".to_string(),
                },
            ],
        }
    }

    #[test]
    fn no_context_leaves_text_unmodified() {
        let prompt = build_prompt("Hello", &HashMap::new());
        assert_eq!(prompt, "Hello");
    }

    #[test]
    fn detection_context_prepends_scores_and_keeps_question() {
        let mut context = HashMap::new();
        context.insert(KEY_DETECTION_RESULTS.to_string(), detection(0.85, 0.15));

        let prompt = build_prompt("Why AI?", &context);
        assert!(prompt.contains("85%"));
        assert!(prompt.contains("15%"));
        assert!(prompt.contains("Why AI?"));
        assert!(prompt.contains("burstiness"));
    }

    #[test]
    fn documents_context_lists_documents() {
        let mut context = HashMap::new();
        context.insert(KEY_DOCUMENTS.to_string(), documents());

        let prompt = build_prompt("Compare them", &context);
        assert!(prompt.contains("- Document 1: essay.pdf"));
        assert!(prompt.contains("- Document 2: draft.txt"));
        assert!(prompt.contains("Compare them"));
    }

    #[test]
    fn detection_takes_precedence_over_documents() {
        let mut context = HashMap::new();
        context.insert(KEY_DETECTION_RESULTS.to_string(), detection(0.6, 0.4));
        context.insert(KEY_DOCUMENTS.to_string(), documents());

        let prompt = build_prompt("What happened?", &context);
        assert!(prompt.contains("60%"));
        assert!(!prompt.contains("Document 1"));
    }

    #[test]
    fn mismatched_variant_under_known_key_is_ignored() {
        let mut context = HashMap::new();
        context.insert(
            KEY_DETECTION_RESULTS.to_string(),
            ContextValue::Other { value: json!(42) },
        );

        assert_eq!(build_prompt("Hi", &context), "Hi");
        assert_eq!(select_system_instruction(&context), TUTORIAL);
    }

    #[test]
    fn system_instruction_selection() {
        let mut context = HashMap::new();
        assert_eq!(select_system_instruction(&context), TUTORIAL);

        context.insert(KEY_DOCUMENTS.to_string(), documents());
        assert_eq!(select_system_instruction(&context), ANALYSIS_DISCUSSION);

        context.insert(KEY_DETECTION_RESULTS.to_string(), detection(0.5, 0.5));
        assert_eq!(select_system_instruction(&context), RESULTS_EXPLANATION);
    }
}
