//! Extraction of the structured service error from a response body.

use crate::operation::ExtendedError;
use crate::xml;

/// Parse the structured error carried by an error response body.
///
/// JSON bodies are recognized by their content type; everything else is read as
/// the XML `<Error>` document. Returns `None` when the body is empty or does not
/// parse, in which case the caller keeps an empty extended error.
pub fn parse_extended_error(content_type: Option<&str>, body: &[u8]) -> Option<ExtendedError> {
    if body.is_empty() {
        return None;
    }

    let is_json = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("json"))
        .unwrap_or(false);

    if is_json {
        parse_json_error(body)
    } else {
        let text = std::str::from_utf8(body).ok()?;
        xml::parse_error_response(text).ok()
    }
}

/// Parse the OData JSON error document:
/// `{"odata.error":{"code":"...","message":{"lang":"en-US","value":"..."}}}`.
fn parse_json_error(body: &[u8]) -> Option<ExtendedError> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let error = value.get("odata.error").or_else(|| value.get("error"))?;

    let code = error
        .get("code")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string();
    let message = match error.get("message") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(m) => m
            .get("value")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        None => String::new(),
    };

    let mut extended = ExtendedError::new(code, message);
    if let Some(inner) = error.get("innererror").and_then(|i| i.as_object()) {
        for (key, value) in inner {
            if let Some(text) = value.as_str() {
                extended.add_detail(key.clone(), text.to_string());
            }
        }
    }
    Some(extended)
}
