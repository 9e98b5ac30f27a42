//! Streaming aggregation for brand-voice content generation.
//!
//! A generation endpoint answers with a body of `data: <text>` lines. The
//! [`StreamAggregator`] concatenates the payloads, normalizes the markdown and
//! hands the result to a sink at a bounded rate, then emits the complete
//! content once the stream ends.
//!
//! ```no_run
//! use brandvoice_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GenerationClient::from_env()?;
//! let request = GenerationRequest::new("Announce the spring sale").brand_voice("bv-1");
//!
//! let outcome = Preview::new(AggregatorConfig::default())
//!     .run_request(&client, &request, |variant, content| {
//!         eprintln!("[{variant}] {} chars", content.len());
//!     })
//!     .await?;
//!
//! println!("{}", outcome.with_voice.content);
//! # Ok(())
//! # }
//! ```

/// Rate-limited aggregation of a chunk stream.
pub mod aggregator;
/// Batching thresholds and client configuration.
pub mod config;
/// Byte-to-text decoding of chunks.
pub mod decode;
/// Public error types.
pub mod errors;
/// `data: ` line protocol.
pub mod event;
/// Markdown normalization pipeline.
pub mod normalize;
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Concurrent with/without brand voice preview.
pub mod preview;
/// HTTP chunk source.
pub mod source;

pub use aggregator::{AbortHandle, Aggregated, LoadingFlag, StreamAggregator, UpdateSink};
pub use config::{AggregatorConfig, GenerationClientConfig};
pub use decode::{ChunkDecoder, Latin1Decoder, Utf8Decoder};
pub use errors::{AggregateError, PreviewError};
pub use event::{StreamEvent, parse_line};
pub use normalize::normalize;
pub use observability::init_observability;
pub use preview::{Preview, PreviewOutcome, Variant, run_preview};
pub use source::{ByteStream, GenerationClient, GenerationRequest};
