//! Schema-checked structured calls and plain free-text calls
//!
//! A structured call either yields a value that validated against its JSON
//! Schema or fails with [`LlmError::Schema`]. Callers never see a partially
//! parsed object.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::provider::{LlmError, LlmProvider, LlmRequest};

/// Ask for a JSON value matching `schema` and deserialize it into `T`
pub async fn complete_structured<T, P>(
    provider: &P,
    system: &str,
    prompt: &str,
    schema: &Value,
) -> Result<T, LlmError>
where
    T: DeserializeOwned,
    P: LlmProvider + ?Sized,
{
    let schema_text = serde_json::to_string_pretty(schema)
        .map_err(|e| LlmError::Schema(format!("unserializable schema: {}", e)))?;
    let full_prompt = format!(
        "{}\n\nRespond with ONLY a JSON value that validates against this JSON Schema:\n{}",
        prompt, schema_text
    );
    let request = LlmRequest::json(system, &full_prompt);
    let response = provider.complete(request).await?;

    parse_structured(&response.content, schema).inspect_err(|e| {
        tracing::warn!(provider = provider.name(), error = %e, "structured response rejected");
        metrics::counter!("agora_llm_schema_failures_total").increment(1);
    })
}

/// Plain text completion, trimmed. An empty reply is an error.
pub async fn complete_text<P>(provider: &P, instructions: &str, prompt: &str) -> Result<String, LlmError>
where
    P: LlmProvider + ?Sized,
{
    let response = provider
        .complete(LlmRequest::text(instructions, prompt))
        .await?;
    let text = response.content.trim();
    if text.is_empty() {
        return Err(LlmError::InvalidResponse("empty completion".to_string()));
    }
    Ok(text.to_string())
}

/// Extract, validate and deserialize a structured payload from raw text
pub fn parse_structured<T: DeserializeOwned>(content: &str, schema: &Value) -> Result<T, LlmError> {
    let json = extract_json(content)
        .ok_or_else(|| LlmError::Schema("no JSON value found in response".to_string()))?;
    let value: Value =
        serde_json::from_str(json).map_err(|e| LlmError::Schema(format!("malformed JSON: {}", e)))?;

    let validator = jsonschema::validator_for(schema)
        .map_err(|e| LlmError::Schema(format!("invalid schema: {}", e)))?;
    let violations: Vec<String> = validator.iter_errors(&value).map(|e| e.to_string()).collect();
    if !violations.is_empty() {
        return Err(LlmError::Schema(violations.join("; ")));
    }

    serde_json::from_value(value).map_err(|e| LlmError::Schema(e.to_string()))
}

/// Locate the JSON payload inside a reply that may carry prose or code fences
pub fn extract_json(text: &str) -> Option<&str> {
    let text = text.trim();
    let text = match text.find("```") {
        Some(fence) => {
            let body = &text[fence + 3..];
            let body = body.strip_prefix("json").unwrap_or(body);
            match body.find("```") {
                Some(end) => &body[..end],
                None => body,
            }
        }
        None => text,
    };

    let start = text.find(&['{', '['][..])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end >= start).then(|| text[start..=end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        strength: f64,
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["strength"],
            "properties": { "strength": { "type": "number", "minimum": 0, "maximum": 1 } }
        })
    }

    #[test]
    fn test_extract_json_from_prose_and_fences() {
        assert_eq!(extract_json("Sure! {\"a\": 1} hope that helps"), Some("{\"a\": 1}"));
        assert_eq!(extract_json("```json\n[1, 2]\n```"), Some("[1, 2]"));
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn test_parse_structured_accepts_valid_payload() {
        let verdict: Verdict = parse_structured("{\"strength\": 0.4}", &schema()).unwrap();
        assert_eq!(verdict, Verdict { strength: 0.4 });
    }

    #[test]
    fn test_parse_structured_rejects_schema_violation() {
        let result: Result<Verdict, _> = parse_structured("{\"strength\": 3}", &schema());
        assert!(matches!(result, Err(LlmError::Schema(_))));
    }

    #[test]
    fn test_parse_structured_rejects_garbage() {
        let result: Result<Verdict, _> = parse_structured("{\"strength\": ", &schema());
        assert!(matches!(result, Err(LlmError::Schema(_))));
    }
}
