//! Common imports for typical aggregator usage.
pub use crate::{
    AbortHandle, AggregateError, Aggregated, AggregatorConfig, GenerationClient,
    GenerationClientConfig, GenerationRequest, LoadingFlag, Preview, PreviewError,
    PreviewOutcome, StreamAggregator, Variant, normalize,
};
