use std::fmt::Display;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{Stream, StreamExt as _};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::AggregatorConfig;
use crate::decode::{ChunkDecoder, Utf8Decoder};
use crate::errors::AggregateError;
use crate::event::{StreamEvent, chunk_events};
use crate::normalize::normalize;

/// Receives normalized content every time the aggregator emits.
pub trait UpdateSink {
    fn update(&mut self, content: &str);
}

impl<F> UpdateSink for F
where
    F: FnMut(&str),
{
    fn update(&mut self, content: &str) {
        self(content)
    }
}

/// Handle used to stop a running aggregation.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// The aggregation stops reading, releases its source and returns
    /// `AggregateError::Cancelled` without a final emit.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

/// Loading indicator shared between an aggregation and whoever displays it.
///
/// Set when the aggregation starts and cleared on every exit path.
#[derive(Clone, Debug, Default)]
pub struct LoadingFlag(Arc<AtomicBool>);

impl LoadingFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn set(&self, loading: bool) {
        self.0.store(loading, Ordering::SeqCst);
    }
}

/// Result of a finished aggregation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Aggregated {
    /// All payloads concatenated in arrival order.
    pub raw: String,
    /// `normalize(raw)`, identical to the final emit.
    pub content: String,
    /// Number of emits, the final one included.
    pub emits: u64,
}

type CleanupHook = Box<dyn FnOnce() + Send>;

/// Turns a `data: <text>` chunk stream into rate-limited content updates.
///
/// After every appended payload the pending deferred emit is pushed back to
/// `flush_delay` from now (debounce), and an immediate emit fires when at
/// least `min_growth` characters arrived and `flush_delay` passed since the
/// previous emit (throttle). Once the source ends, or the `[DONE]` sentinel
/// arrives, exactly one final emit carries the complete normalized content.
pub struct StreamAggregator {
    id: uuid::Uuid,
    config: AggregatorConfig,
    decoder: Box<dyn ChunkDecoder>,
    loading: Option<LoadingFlag>,
    on_done: Vec<CleanupHook>,
    abort_tx: watch::Sender<bool>,
    abort_rx: watch::Receiver<bool>,
}

impl StreamAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        let (abort_tx, abort_rx) = watch::channel(false);
        Self {
            id: uuid::Uuid::new_v4(),
            config,
            decoder: Box::new(Utf8Decoder::default()),
            loading: None,
            on_done: Vec::new(),
            abort_tx,
            abort_rx,
        }
    }

    /// Id used in log events for this aggregation.
    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    /// Replaces the default UTF-8 decoder.
    pub fn decoder(mut self, decoder: impl ChunkDecoder + 'static) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    /// Sets `flag` while the aggregation runs and clears it on every exit path.
    pub fn loading(mut self, flag: &LoadingFlag) -> Self {
        self.loading = Some(flag.clone());
        self
    }

    /// Registers a hook that runs once after the source has been released.
    pub fn on_done(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_done.push(Box::new(hook));
        self
    }

    /// Returns a handle that can cancel this aggregation.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            tx: self.abort_tx.clone(),
        }
    }

    /// Consumes `source` to completion, emitting into `sink`.
    ///
    /// The source is dropped and the done hooks run before this returns, on
    /// success, failure and cancellation alike.
    pub async fn run<S, B, E, K>(self, source: S, mut sink: K) -> Result<Aggregated, AggregateError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
        K: UpdateSink,
    {
        let Self {
            id,
            config,
            mut decoder,
            loading,
            mut on_done,
            abort_tx: _abort_tx,
            mut abort_rx,
        } = self;

        if let Some(flag) = loading {
            flag.set(true);
            on_done.insert(0, Box::new(move || flag.set(false)));
        }
        let mut guard = SourceGuard {
            source: Some(Box::pin(source)),
            on_done,
        };
        config.validate()?;
        let mut state = AggregationState::new(Instant::now());
        debug!(aggregation_id = %id, "aggregation started");

        if *abort_rx.borrow() {
            debug!(aggregation_id = %id, "aggregation cancelled before start");
            return Err(AggregateError::Cancelled);
        }

        loop {
            let deadline = state.deadline;
            tokio::select! {
                biased;
                changed = abort_rx.changed() => {
                    if changed.is_ok() && *abort_rx.borrow() {
                        debug!(aggregation_id = %id, chars = state.chars, "aggregation cancelled");
                        return Err(AggregateError::Cancelled);
                    }
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    state.deadline = None;
                    state.emit(&mut sink, Instant::now());
                    debug!(aggregation_id = %id, emits = state.emits, chars = state.chars, "deferred emit");
                }
                next = guard.next_chunk() => match next {
                    Some(Ok(chunk)) => {
                        let text = match decoder.decode(chunk.as_ref()) {
                            Ok(text) => text,
                            Err(err) => {
                                warn!(aggregation_id = %id, error = %err, "dropping undecodable chunk");
                                return Err(err);
                            }
                        };
                        if state.absorb(&text, &config, &mut sink, id) == Absorbed::Done {
                            break;
                        }
                    }
                    Some(Err(err)) => {
                        warn!(aggregation_id = %id, error = %err, "stream read failed");
                        return Err(AggregateError::read(err.to_string()));
                    }
                    None => {
                        decoder.finish()?;
                        break;
                    }
                },
            }
        }

        state.deadline = None;
        let content = state.emit(&mut sink, Instant::now());
        info!(aggregation_id = %id, emits = state.emits, chars = state.chars, "aggregation finished");
        Ok(Aggregated {
            raw: state.accumulated,
            content,
            emits: state.emits,
        })
    }
}

/// Owns the source so that releasing it and the done hooks happen exactly
/// once, in that order, whichever way `run` exits.
struct SourceGuard<S> {
    source: Option<Pin<Box<S>>>,
    on_done: Vec<CleanupHook>,
}

impl<S: Stream> SourceGuard<S> {
    async fn next_chunk(&mut self) -> Option<S::Item> {
        match self.source.as_mut() {
            Some(source) => source.next().await,
            None => None,
        }
    }
}

impl<S> Drop for SourceGuard<S> {
    fn drop(&mut self) {
        drop(self.source.take());
        for hook in self.on_done.drain(..) {
            hook();
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Absorbed {
    More,
    Done,
}

struct AggregationState {
    accumulated: String,
    chars: usize,
    chars_at_emit: usize,
    last_emit: Instant,
    deadline: Option<Instant>,
    emits: u64,
}

impl AggregationState {
    fn new(now: Instant) -> Self {
        Self {
            accumulated: String::new(),
            chars: 0,
            chars_at_emit: 0,
            last_emit: now,
            deadline: None,
            emits: 0,
        }
    }

    /// Appends every payload of one decoded chunk, applying the batching
    /// policy after each append.
    fn absorb<K: UpdateSink>(
        &mut self,
        text: &str,
        config: &AggregatorConfig,
        sink: &mut K,
        id: uuid::Uuid,
    ) -> Absorbed {
        for event in chunk_events(text) {
            let payload = match event {
                StreamEvent::Done => return Absorbed::Done,
                StreamEvent::Payload(payload) => payload,
            };
            self.accumulated.push_str(payload);
            self.chars += payload.chars().count();

            let now = Instant::now();
            self.deadline = Some(now + config.flush_delay);
            let grown = self.chars - self.chars_at_emit >= config.min_growth;
            if grown && now.duration_since(self.last_emit) >= config.flush_delay {
                self.emit(sink, now);
                debug!(aggregation_id = %id, emits = self.emits, chars = self.chars, "throttled emit");
            }
        }
        Absorbed::More
    }

    fn emit<K: UpdateSink>(&mut self, sink: &mut K, now: Instant) -> String {
        let content = normalize(&self.accumulated);
        sink.update(&content);
        self.last_emit = now;
        self.chars_at_emit = self.chars;
        self.emits += 1;
        content
    }
}
