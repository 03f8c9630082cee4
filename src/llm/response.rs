// Decoder for the generative model's response envelope.

use serde_json::Value;

/// The shapes a model response can take once decoded at the network
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelResponse {
    /// A flattened text field at the top level.
    DirectText(String),
    /// Text parts gathered across every candidate, in order.
    CandidateParts(Vec<String>),
    /// No text at all, only block or safety metadata.
    BlockedWithReason(String),
    Empty,
}

impl ModelResponse {
    /// Decode a raw response body. Shapes are tried in priority order:
    /// top-level `text`, candidate parts, then prompt feedback.
    pub fn decode(body: &Value) -> Self {
        if let Some(text) = body.get("text").and_then(Value::as_str) {
            if !text.trim().is_empty() {
                return ModelResponse::DirectText(text.to_string());
            }
        }

        let parts: Vec<String> = candidates(body)
            .flat_map(|c| {
                c.pointer("/content/parts")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
            })
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        if parts.iter().any(|p| !p.trim().is_empty()) {
            return ModelResponse::CandidateParts(parts);
        }

        match block_diagnostic(body) {
            Some(reason) => ModelResponse::BlockedWithReason(reason),
            None => ModelResponse::Empty,
        }
    }

    /// The usable text of this response, if any.
    pub fn into_text(self) -> Option<String> {
        let text = match self {
            ModelResponse::DirectText(text) => text,
            ModelResponse::CandidateParts(parts) => parts.join("\n").trim().to_string(),
            ModelResponse::BlockedWithReason(reason) => reason,
            ModelResponse::Empty => return None,
        };
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

fn candidates(body: &Value) -> impl Iterator<Item = &Value> {
    body.get("candidates")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn block_diagnostic(body: &Value) -> Option<String> {
    let mut notes = Vec::new();
    if let Some(feedback) = body.get("promptFeedback") {
        if let Some(reason) = feedback.get("blockReason").and_then(Value::as_str) {
            notes.push(format!("block_reason={reason}"));
        }
        if let Some(ratings) = feedback.get("safetyRatings") {
            if !ratings.is_null() {
                notes.push(format!("safety_ratings={ratings}"));
            }
        }
    }
    if notes.is_empty() {
        // A candidate cut short by safety carries its reason on the candidate.
        let reasons: Vec<&str> = candidates(body)
            .filter_map(|c| c.get("finishReason").and_then(Value::as_str))
            .filter(|r| *r != "STOP")
            .collect();
        if !reasons.is_empty() {
            notes.push(format!("finish_reason={}", reasons.join(",")));
        }
    }
    if notes.is_empty() {
        None
    } else {
        Some(notes.join(" | "))
    }
}
