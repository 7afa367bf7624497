//! The fetched secret document and the shared fetch-then-parse step

use crate::diagnostics::{DiagnosticContext, DiagnosticLevel, DiagnosticSink, events};
use crate::{BackendError, SecretSource, SecureSecret};
use std::collections::HashMap;
use thiserror::Error;

/// A secret payload that is not a flat JSON object of string values.
///
/// The message names the error category and position only; it never quotes
/// payload content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("secret payload is not a flat JSON object of string values ({category} error at line {line}, column {column})")]
pub struct PayloadError {
    /// `syntax`, `data` or `eof`
    pub category: &'static str,
    /// 1-based line of the failure
    pub line: usize,
    /// 1-based column of the failure
    pub column: usize,
}

impl From<serde_json::Error> for PayloadError {
    fn from(err: serde_json::Error) -> Self {
        let category = match err.classify() {
            serde_json::error::Category::Io => "io",
            serde_json::error::Category::Syntax => "syntax",
            serde_json::error::Category::Data => "data",
            serde_json::error::Category::Eof => "eof",
        };
        Self {
            category,
            line: err.line(),
            column: err.column(),
        }
    }
}

/// Flat key/value mapping parsed from one remote secret.
///
/// Values are held as [`SecureSecret`]s; `Debug` shows key names only.
#[derive(Clone, Default)]
pub struct SecretDocument {
    entries: HashMap<String, SecureSecret>,
}

impl SecretDocument {
    /// Parse a JSON object whose values are all strings.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] for malformed JSON, a non-object top level,
    /// nested objects or arrays, and non-string values.
    pub fn parse(payload: &str) -> Result<Self, PayloadError> {
        let entries: HashMap<String, String> = serde_json::from_str(payload)?;
        Ok(entries.into_iter().collect())
    }

    /// Get the value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SecureSecret> {
        self.entries.get(key)
    }

    /// Check if the document has a key.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate over key names.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the document has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for SecretDocument {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k, SecureSecret::new(v)))
                .collect(),
        }
    }
}

impl std::fmt::Debug for SecretDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.entries.keys().collect();
        keys.sort();
        f.debug_struct("SecretDocument")
            .field("count", &self.entries.len())
            .field("keys", &keys)
            .finish()
    }
}

/// Fetch the secret once from `source` and parse it into a document.
///
/// Fetch and parse failures are recorded on `sink` with the identifiers in
/// `context` before being returned.
///
/// # Errors
///
/// Returns the source's [`BackendError::Fetch`] unchanged, or
/// [`BackendError::Parse`] if the payload is not a flat JSON object.
pub async fn load_document<S>(
    source: &S,
    context: &DiagnosticContext,
    sink: &dyn DiagnosticSink,
) -> Result<SecretDocument, BackendError>
where
    S: SecretSource + ?Sized,
{
    let payload = match source.fetch_secret(context).await {
        Ok(payload) => payload,
        Err(err) => {
            let event = if matches!(err, BackendError::Parse { .. }) {
                events::PARSE_FAILED
            } else {
                events::FETCH_FAILED
            };
            sink.record(
                &context
                    .diagnostic(DiagnosticLevel::Error, event, "failed to retrieve secret value")
                    .with_error(&err),
            );
            return Err(err);
        }
    };

    let document = SecretDocument::parse(payload.expose()).map_err(|e| {
        let err = BackendError::Parse {
            backend_id: context.backend_id.clone(),
            secret_id: context.secret_id.clone(),
            message: e.to_string(),
        };
        sink.record(
            &context
                .diagnostic(
                    DiagnosticLevel::Error,
                    events::PARSE_FAILED,
                    "failed to parse secret value",
                )
                .with_error(&err),
        );
        err
    })?;

    sink.record(&context.diagnostic(
        DiagnosticLevel::Debug,
        events::LOADED,
        "secret document loaded",
    ));
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BackendType, MemorySink};
    use async_trait::async_trait;

    struct FixedSource(Result<&'static str, &'static str>);

    #[async_trait]
    impl SecretSource for FixedSource {
        async fn fetch_secret(
            &self,
            context: &DiagnosticContext,
        ) -> Result<SecureSecret, BackendError> {
            self.0
                .map(|p| SecureSecret::new(p.to_string()))
                .map_err(|m| BackendError::Fetch {
                    backend_id: context.backend_id.clone(),
                    secret_id: context.secret_id.clone(),
                    message: m.to_string(),
                })
        }
    }

    fn context() -> DiagnosticContext {
        DiagnosticContext::new("test", BackendType::AwsSecretsManager, "s1")
    }

    #[test]
    fn test_parse_flat_object() {
        let doc = SecretDocument::parse(r#"{"db_password":"hunter2","user":"app"}"#).unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.get("db_password").unwrap().expose(), "hunter2");
        assert!(doc.contains_key("user"));
        assert!(doc.get("other").is_none());
    }

    #[test]
    fn test_parse_preserves_values_exactly() {
        let payload = r#"{"k":"  spaced \"quoted\" é \n"}"#;
        let doc = SecretDocument::parse(payload).unwrap();
        assert_eq!(doc.get("k").unwrap().expose(), "  spaced \"quoted\" é \n");
    }

    #[test]
    fn test_parse_empty_object() {
        let doc = SecretDocument::parse("{}").unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_parse_rejects_nested_object() {
        let err = SecretDocument::parse(r#"{"a": {"nested": 1}}"#).unwrap_err();
        assert_eq!(err.category, "data");
    }

    #[test]
    fn test_parse_rejects_non_string_values() {
        assert!(SecretDocument::parse(r#"{"pin": 1234}"#).is_err());
        assert!(SecretDocument::parse(r#"{"flag": true}"#).is_err());
        assert!(SecretDocument::parse(r#"{"list": ["a"]}"#).is_err());
        assert!(SecretDocument::parse(r#"{"none": null}"#).is_err());
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(SecretDocument::parse("plain-text-password").is_err());
        assert!(SecretDocument::parse(r#"["a"]"#).is_err());
        assert!(SecretDocument::parse("null").is_err());
        assert!(SecretDocument::parse(r#"{"a":"b""#).is_err());
    }

    #[test]
    fn test_parse_error_never_quotes_payload() {
        let err = SecretDocument::parse(r#"{"pin": 987654}"#).unwrap_err();
        assert!(!err.to_string().contains("987654"));
    }

    #[test]
    fn test_debug_shows_keys_only() {
        let doc = SecretDocument::parse(r#"{"b":"secret-b","a":"secret-a"}"#).unwrap();
        let debug = format!("{doc:?}");
        assert!(debug.contains("\"a\""));
        assert!(!debug.contains("secret-a"));
    }

    #[tokio::test]
    async fn test_load_document_success() {
        let sink = MemorySink::new();
        let doc = load_document(&FixedSource(Ok(r#"{"k":"v"}"#)), &context(), &sink)
            .await
            .unwrap();
        assert_eq!(doc.get("k").unwrap().expose(), "v");
        assert_eq!(sink.events(events::LOADED).len(), 1);
    }

    #[tokio::test]
    async fn test_load_document_fetch_failure() {
        let sink = MemorySink::new();
        let err = load_document(&FixedSource(Err("connection refused")), &context(), &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Fetch { .. }));

        let records = sink.events(events::FETCH_FAILED);
        assert_eq!(records.len(), 1);
        assert!(records[0].error.as_deref().unwrap().contains("connection refused"));
    }

    #[test]
    fn test_load_document_parse_failure() {
        let sink = MemorySink::new();
        let err = tokio_test::block_on(load_document(
            &FixedSource(Ok(r#"{"a": {"nested": "topsecret"}}"#)),
            &context(),
            &sink,
        ))
        .unwrap_err();
        assert!(matches!(err, BackendError::Parse { .. }));

        let records = sink.events(events::PARSE_FAILED);
        assert_eq!(records.len(), 1);
        assert!(!format!("{records:?}").contains("topsecret"));
    }
}
