//! Response shape normalization.
//!
//! Some gateway endpoints wrap their payload as `{ "data": ... }`, others
//! return it bare. Everything the adapter decodes goes through [`Envelope`]
//! so nothing past this crate ever sees the difference.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::ProviderError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    pub fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(value) => value,
        }
    }
}

/// Decode a response body in either shape
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ProviderError> {
    let envelope: Envelope<T> = serde_json::from_str(body)?;
    Ok(envelope.into_inner())
}

/// Error body returned alongside non-2xx statuses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Best human-readable text from an error body, falling back to the raw text
    pub fn describe(body: &str) -> String {
        let parsed = decode::<ErrorBody>(body).unwrap_or_default();
        match (parsed.error, parsed.message) {
            (Some(error), Some(message)) => format!("{error}: {message}"),
            (None, Some(message)) => message,
            (Some(error), None) => error,
            (None, None) if body.trim().is_empty() => "empty response body".to_string(),
            (None, None) => body.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Range {
        min_amount: f64,
        max_amount: Option<f64>,
    }

    #[test]
    fn test_wrapped_and_bare_decode_alike() {
        let wrapped: Range = decode(r#"{"data":{"minAmount":0.01,"maxAmount":5}}"#).unwrap();
        let bare: Range = decode(r#"{"minAmount":0.01,"maxAmount":5}"#).unwrap();
        assert_eq!(wrapped, bare);
        assert_eq!(bare.max_amount, Some(5.0));
    }

    #[test]
    fn test_bare_list() {
        let list: Vec<String> = decode(r#"["btc","eth"]"#).unwrap();
        assert_eq!(list.len(), 2);
        let wrapped: Vec<String> = decode(r#"{"data":["btc"]}"#).unwrap();
        assert_eq!(wrapped, vec!["btc".to_string()]);
    }

    #[test]
    fn test_malformed_body() {
        let err = decode::<Range>(r#"{"minimum":1}"#).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }

    #[test]
    fn test_error_body_description() {
        assert_eq!(
            ErrorBody::describe(r#"{"error":"out_of_range","message":"Amount is less than minimal"}"#),
            "out_of_range: Amount is less than minimal"
        );
        assert_eq!(
            ErrorBody::describe(r#"{"data":{"message":"not_valid_params"}}"#),
            "not_valid_params"
        );
        assert_eq!(ErrorBody::describe("gateway down"), "gateway down");
        assert_eq!(ErrorBody::describe(""), "empty response body");
    }
}
