use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by HTTP decoding.
pub enum HttpError {
    #[error("missing start line")]
    MissingStartLine,
    #[error("malformed start line: {line}")]
    MalformedStartLine { line: String },
    #[error("invalid status code: {value}")]
    InvalidStatusCode { value: String },
}
