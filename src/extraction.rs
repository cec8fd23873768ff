//! Best-effort structured extraction from free-form model text
//!
//! Models are asked to "answer in JSON" but routinely wrap the object in
//! prose or markdown fences. The object is taken to be the span between the
//! first `{` and the last `}`.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("no JSON object found in model text")]
    NoObject,

    #[error("embedded JSON is malformed: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("embedded JSON has an unexpected shape: {0}")]
    Shape(#[source] serde_json::Error),
}

/// Slice out the `{ ... }` span, if any.
pub fn embedded_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parse the embedded object as loose JSON.
pub fn extract_object(text: &str) -> Result<Value, ExtractionError> {
    let span = embedded_object_span(text).ok_or(ExtractionError::NoObject)?;
    let value: Value = serde_json::from_str(span).map_err(ExtractionError::Malformed)?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(ExtractionError::NoObject)
    }
}

/// Parse the embedded object into a typed record.
pub fn extract_as<T: DeserializeOwned>(text: &str) -> Result<T, ExtractionError> {
    let value = extract_object(text)?;
    serde_json::from_value(value).map_err(ExtractionError::Shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Receipt {
        amount: f64,
        category: String,
    }

    #[test]
    fn test_extracts_object_wrapped_in_prose_and_fences() {
        let text = "Claro, aquí está:\n```json\n{\"amount\": 30, \"category\": \"Transporte\"}\n```\nSaludos";
        let receipt: Receipt = extract_as(text).unwrap();
        assert_eq!(receipt.amount, 30.0);
        assert_eq!(receipt.category, "Transporte");
    }

    #[test]
    fn test_nested_objects_use_outermost_braces() {
        let value = extract_object("x {\"a\": {\"b\": 1}} y").unwrap();
        assert_eq!(value["a"]["b"], 1);
    }

    #[test]
    fn test_missing_braces() {
        assert!(matches!(
            extract_object("No hay datos suficientes"),
            Err(ExtractionError::NoObject)
        ));
        assert!(matches!(extract_object("} al revés {"), Err(ExtractionError::NoObject)));
    }

    #[test]
    fn test_malformed_span() {
        assert!(matches!(
            extract_object("{amount: treinta}"),
            Err(ExtractionError::Malformed(_))
        ));
    }

    #[test]
    fn test_wrong_shape() {
        assert!(matches!(
            extract_as::<Receipt>("{\"amount\": \"mucho\", \"category\": \"X\"}"),
            Err(ExtractionError::Shape(_))
        ));
    }
}
