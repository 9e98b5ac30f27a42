//! Side-by-side preview: the same prompt generated with and without the
//! brand voice, aggregated concurrently.

use std::fmt::{self, Display};

use futures::{Stream, TryFutureExt as _};

use crate::aggregator::{Aggregated, LoadingFlag, StreamAggregator};
use crate::config::AggregatorConfig;
use crate::errors::{AggregateError, PreviewError};
use crate::source::{GenerationClient, GenerationRequest};

/// Which half of a preview a stream belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    WithVoice,
    WithoutVoice,
}

impl Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Variant::WithVoice => "with brand voice",
            Variant::WithoutVoice => "without brand voice",
        })
    }
}

/// Final content of both variants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreviewOutcome {
    pub with_voice: Aggregated,
    pub without_voice: Aggregated,
}

impl PreviewOutcome {
    pub fn get(&self, variant: Variant) -> &Aggregated {
        match variant {
            Variant::WithVoice => &self.with_voice,
            Variant::WithoutVoice => &self.without_voice,
        }
    }
}

/// Runs the two variants of a preview.
///
/// Each variant has its own aggregator and loading flag; nothing is shared
/// between them. The preview fails as soon as either variant fails, and the
/// other aggregation is dropped, which still releases its source and clears
/// its loading flag.
pub struct Preview {
    config: AggregatorConfig,
    with_voice: LoadingFlag,
    without_voice: LoadingFlag,
}

impl Preview {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            with_voice: LoadingFlag::new(),
            without_voice: LoadingFlag::new(),
        }
    }

    pub fn loading(&self, variant: Variant) -> &LoadingFlag {
        match variant {
            Variant::WithVoice => &self.with_voice,
            Variant::WithoutVoice => &self.without_voice,
        }
    }

    /// Aggregates both streams concurrently; `sink` is called with the
    /// variant of every update.
    pub async fn run<S, B, E, F>(
        &self,
        with_voice: S,
        without_voice: S,
        sink: F,
    ) -> Result<PreviewOutcome, PreviewError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
        F: Fn(Variant, &str),
    {
        let sink = &sink;
        let voiced = StreamAggregator::new(self.config.clone())
            .loading(&self.with_voice)
            .run(with_voice, move |content: &str| sink(Variant::WithVoice, content))
            .map_err(|e| PreviewError::new(Variant::WithVoice, e));
        let plain = StreamAggregator::new(self.config.clone())
            .loading(&self.without_voice)
            .run(without_voice, move |content: &str| {
                sink(Variant::WithoutVoice, content)
            })
            .map_err(|e| PreviewError::new(Variant::WithoutVoice, e));

        let (with_voice, without_voice) = tokio::try_join!(voiced, plain)?;
        Ok(PreviewOutcome {
            with_voice,
            without_voice,
        })
    }

    /// Opens both generation streams for `request` and runs the preview.
    ///
    /// `request` carries the brand voice; the other variant is the same
    /// request without it.
    pub async fn run_request<F>(
        &self,
        client: &GenerationClient,
        request: &GenerationRequest,
        sink: F,
    ) -> Result<PreviewOutcome, PreviewError>
    where
        F: Fn(Variant, &str),
    {
        if request.brand_voice_id.is_none() {
            return Err(PreviewError::new(
                Variant::WithVoice,
                AggregateError::Config("preview request needs a brand voice id".into()),
            ));
        }
        let plain_request = request.without_voice();
        let (voiced, plain) = tokio::try_join!(
            client
                .open(request)
                .map_err(|e| PreviewError::new(Variant::WithVoice, e)),
            client
                .open(&plain_request)
                .map_err(|e| PreviewError::new(Variant::WithoutVoice, e)),
        )?;
        self.run(voiced, plain, sink).await
    }
}

/// Runs a one-off preview over two already-open streams.
pub async fn run_preview<S, B, E, F>(
    with_voice: S,
    without_voice: S,
    config: AggregatorConfig,
    sink: F,
) -> Result<PreviewOutcome, PreviewError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    F: Fn(Variant, &str),
{
    Preview::new(config).run(with_voice, without_voice, sink).await
}
