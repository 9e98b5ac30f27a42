use crate::preview::Variant;

/// Errors that end a single aggregation.
///
/// Lines that do not carry the `data: ` prefix are not errors; they are
/// skipped by the line parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    /// The chunk source failed while reading.
    #[error("stream read failed: {message}")]
    Read { message: String },
    /// The chunk bytes were not valid in the configured encoding.
    #[error("malformed stream bytes at offset {offset}")]
    Decode { offset: usize },
    /// The generation endpoint answered with a non-success status.
    #[error("generation request failed with status {status}: {message}")]
    Http { status: u16, message: String },
    /// The aggregation was cancelled through its abort handle.
    #[error("aggregation cancelled")]
    Cancelled,
    /// Invalid aggregator or client configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl AggregateError {
    /// Creates a read error from any displayable transport failure.
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read {
            message: message.into(),
        }
    }

    /// Returns true when the error came from the abort handle.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<reqwest::Error> for AggregateError {
    fn from(value: reqwest::Error) -> Self {
        Self::read(value.to_string())
    }
}

/// Failure of a two-variant preview: which variant failed and why.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{variant} preview failed: {source}")]
pub struct PreviewError {
    pub variant: Variant,
    #[source]
    pub source: AggregateError,
}

impl PreviewError {
    pub(crate) fn new(variant: Variant, source: AggregateError) -> Self {
        Self { variant, source }
    }
}
