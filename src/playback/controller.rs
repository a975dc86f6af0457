//! Playback controller: one voice at a time, cache first, stale results
//! discarded.
//!
//! [`PlaybackController`] is a cheap-to-clone handle (`Arc` inside) owned by
//! one reading session.  Every play request bumps a generation counter; any
//! await point (synthesis round trip, context resume) is followed by a check
//! that the generation is still current, so a late result for a request the
//! user already replaced or stopped never starts playback.
//!
//! # Play flow
//!
//! ```text
//! play(v, text, lang)
//!   ├─ text empty                     → Skipped
//!   ├─ state == Playing(v)            → stop, Stopped        (toggle)
//!   └─ stop anything active, generation += 1, Loading(v)
//!        ├─ cache hit  ───────────────────────────────────┐
//!        └─ synthesize().await (stale? → Superseded) → put ┤
//!                                                         ▼
//!           session.acquire_context().await  (stale? → Superseded)
//!           context.prepare(audio)            (unlocked: resample)
//!           context.start(voice) → Playing(v)
//!           spawn: completion.await → Idle (if still current)
//! ```
//!
//! The state slot sits in a `std::sync::Mutex` that is only held for short
//! critical sections and never across `.await`.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::watch;

use crate::audio::{DecodedAudio, MalformedAudio, OutputBackend, OutputError, VoiceHandle};
use crate::tts::{SpeechSynthesizer, SynthesisError};

use super::cache::{AudioCache, CacheKey};
use super::session::AudioSessionManager;
use super::state::{PlaybackState, TextVariant};

/// The one message shown to the user whatever made playback fail.
pub const PLAYBACK_FAILED_NOTICE: &str = "Could not play audio";

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

/// Closed set of failure kinds in the audio pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Decode-time structural failure; retrying will not help.
    MalformedAudio,
    /// Provider-side failure; the user may press play again.
    SynthesisProvider,
    /// Output context could not be opened, resumed or started.
    PlaybackStart,
    /// Stopping a voice that was already stopped.  Never surfaced.
    Stop,
}

/// Errors surfaced by [`PlaybackController::play`].
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("malformed audio: {0}")]
    MalformedAudio(MalformedAudio),

    #[error("speech synthesis failed: {0}")]
    SynthesisProvider(SynthesisError),

    #[error("could not start playback: {0}")]
    PlaybackStart(OutputError),

    #[error("stop failed: {0}")]
    Stop(OutputError),
}

impl From<SynthesisError> for PlaybackError {
    fn from(e: SynthesisError) -> Self {
        match e {
            SynthesisError::MalformedAudio(m) => PlaybackError::MalformedAudio(m),
            other => PlaybackError::SynthesisProvider(other),
        }
    }
}

impl PlaybackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlaybackError::MalformedAudio(_) => ErrorKind::MalformedAudio,
            PlaybackError::SynthesisProvider(_) => ErrorKind::SynthesisProvider,
            PlaybackError::PlaybackStart(_) => ErrorKind::PlaybackStart,
            PlaybackError::Stop(_) => ErrorKind::Stop,
        }
    }

    /// `true` when pressing play again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self.kind() {
            ErrorKind::SynthesisProvider | ErrorKind::PlaybackStart => true,
            ErrorKind::MalformedAudio | ErrorKind::Stop => false,
        }
    }

    /// User-facing text.  All surfaced kinds collapse to the same notice.
    pub fn user_notice(&self) -> &'static str {
        match self.kind() {
            ErrorKind::MalformedAudio | ErrorKind::SynthesisProvider | ErrorKind::PlaybackStart => {
                PLAYBACK_FAILED_NOTICE
            }
            ErrorKind::Stop => "",
        }
    }
}

// ---------------------------------------------------------------------------
// PlayOutcome
// ---------------------------------------------------------------------------

/// What a successful [`PlaybackController::play`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Playback started; `cached` tells whether synthesis was skipped.
    Started { cached: bool },
    /// The variant was already playing and has been stopped (toggle).
    Stopped,
    /// The text was empty; nothing happened.
    Skipped,
    /// A newer play or stop request replaced this one before it started.
    Superseded,
}

// ---------------------------------------------------------------------------
// PlaybackController
// ---------------------------------------------------------------------------

/// The active voice (the single playback session).
struct ActiveVoice {
    variant: TextVariant,
    handle: VoiceHandle,
}

struct Inner {
    state: PlaybackState,
    generation: u64,
    active: Option<ActiveVoice>,
    cache: AudioCache,
}

struct Shared {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    session: tokio::sync::Mutex<AudioSessionManager>,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<PlaybackState>,
}

impl Shared {
    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, inner: &mut Inner, state: PlaybackState) {
        if inner.state != state {
            log::debug!("playback: {:?} → {:?}", inner.state, state);
        }
        inner.state = state;
        self.state_tx.send_replace(state);
    }

    /// Silence the active voice, invalidate any in-flight load and go Idle.
    fn stop_locked(&self, inner: &mut Inner) {
        inner.generation += 1;
        if let Some(active) = inner.active.take() {
            if let Err(e) = active.handle.stop() {
                let suppressed = PlaybackError::Stop(e);
                log::debug!("playback: ignoring {} ({suppressed})", active.variant);
            }
        }
        self.set_state(inner, PlaybackState::Idle);
    }

    /// Report `error` for request `generation`, or swallow it when the
    /// request has been superseded meanwhile.
    fn fail(&self, generation: u64, error: PlaybackError) -> Result<PlayOutcome, PlaybackError> {
        let mut inner = self.inner();
        if inner.generation != generation {
            log::debug!("playback: dropping failure of superseded request: {error}");
            return Ok(PlayOutcome::Superseded);
        }
        log::warn!("playback: {error}");
        self.set_state(&mut inner, PlaybackState::Idle);
        Err(error)
    }
}

/// Exclusive single-voice playback for one reading session.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use reading_aid::audio::CpalBackend;
/// use reading_aid::config::AppConfig;
/// use reading_aid::playback::{PlaybackController, TextVariant};
/// use reading_aid::tts::GeminiSpeechClient;
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let controller = PlaybackController::new(
///     Arc::new(GeminiSpeechClient::from_config(&config.provider)),
///     Arc::new(CpalBackend::new(None)),
///     24_000,
/// );
///
/// match controller.play(TextVariant::Original, "Hello world", "English").await {
///     Ok(outcome) => println!("{outcome:?}"),
///     Err(e) => eprintln!("{}", e.user_notice()),
/// }
/// controller.wait_until_idle().await;
/// controller.close().await;
/// # }
/// ```
#[derive(Clone)]
pub struct PlaybackController {
    shared: Arc<Shared>,
}

impl PlaybackController {
    /// Create a controller; the output context is opened lazily at
    /// `sample_rate` Hz on the first play.
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        backend: Arc<dyn OutputBackend>,
        sample_rate: u32,
    ) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        Self {
            shared: Arc::new(Shared {
                synthesizer,
                session: tokio::sync::Mutex::new(AudioSessionManager::new(backend, sample_rate)),
                inner: Mutex::new(Inner {
                    state: PlaybackState::Idle,
                    generation: 0,
                    active: None,
                    cache: AudioCache::new(),
                }),
                state_tx,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn state(&self) -> PlaybackState {
        self.shared.inner().state
    }

    /// Receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.shared.state_tx.subscribe()
    }

    /// Resolve once nothing is loading or playing.
    pub async fn wait_until_idle(&self) {
        let mut rx = self.subscribe();
        let _ = rx.wait_for(|state| !state.is_busy()).await;
    }

    /// Number of cached utterances.
    pub fn cached_len(&self) -> usize {
        self.shared.inner().cache.len()
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Play `text` as `variant`, spoken in `language`.
    ///
    /// `language` is also part of the cache key for
    /// [`TextVariant::Translated`].  Playing the variant that is currently
    /// audible stops it instead.
    ///
    /// # Errors
    ///
    /// A [`PlaybackError`] of kind `MalformedAudio`, `SynthesisProvider` or
    /// `PlaybackStart`; the controller is back in `Idle` when it returns.
    /// Failures of superseded requests are not reported.
    pub async fn play(
        &self,
        variant: TextVariant,
        text: &str,
        language: &str,
    ) -> Result<PlayOutcome, PlaybackError> {
        if text.trim().is_empty() {
            log::debug!("playback: {variant} has no text, ignoring play");
            return Ok(PlayOutcome::Skipped);
        }

        let shared = &self.shared;
        let key = CacheKey::new(variant, language);

        // ── 1. Toggle / replace ─────────────────────────────────────────
        let (generation, cached) = {
            let mut inner = shared.inner();
            if inner.state.is_playing(variant) {
                shared.stop_locked(&mut inner);
                return Ok(PlayOutcome::Stopped);
            }
            shared.stop_locked(&mut inner);
            let generation = inner.generation;
            shared.set_state(&mut inner, PlaybackState::Loading(variant));
            (generation, inner.cache.get(&key))
        };

        // ── 2. Audio: cache or provider ─────────────────────────────────
        let from_cache = cached.is_some();
        let audio: Arc<DecodedAudio> = match cached {
            Some(audio) => {
                log::debug!("playback: cache hit for {variant}");
                audio
            }
            None => {
                let result = shared.synthesizer.synthesize(text, language).await;
                let audio = match result {
                    Ok(audio) => Arc::new(audio),
                    Err(e) => return shared.fail(generation, e.into()),
                };

                // A superseded load must not write back: the cache may have
                // been cleared or invalidated for new text meanwhile.
                let mut inner = shared.inner();
                if inner.generation != generation {
                    log::debug!("playback: {variant} superseded while loading");
                    return Ok(PlayOutcome::Superseded);
                }
                inner.cache.put(key, Arc::clone(&audio));
                audio
            }
        };

        // ── 3. Output context ───────────────────────────────────────────
        let context = {
            let mut session = shared.session.lock().await;
            session.acquire_context().await
        };
        let context = match context {
            Ok(context) => context,
            Err(e) => return shared.fail(generation, PlaybackError::PlaybackStart(e)),
        };

        // Resampling a long utterance is slow; keep it out of the lock.
        let voice = context.prepare(audio);

        // ── 4. Start, unless superseded during the awaits above ─────────
        let completion = {
            let mut inner = shared.inner();
            if inner.generation != generation {
                log::debug!("playback: {variant} superseded before start");
                return Ok(PlayOutcome::Superseded);
            }

            let mut handle = match context.start(voice) {
                Ok(handle) => handle,
                Err(e) => {
                    let error = PlaybackError::PlaybackStart(e);
                    log::warn!("playback: {error}");
                    shared.set_state(&mut inner, PlaybackState::Idle);
                    return Err(error);
                }
            };

            let completion = handle.take_completion();
            inner.active = Some(ActiveVoice { variant, handle });
            shared.set_state(&mut inner, PlaybackState::Playing(variant));
            completion
        };

        // ── 5. Natural completion → Idle ────────────────────────────────
        if let Some(completion) = completion {
            let shared = Arc::clone(shared);
            tokio::spawn(async move {
                if completion.await.is_err() {
                    return;
                }
                let mut inner = shared.inner();
                if inner.generation == generation && inner.state.is_playing(variant) {
                    inner.active = None;
                    shared.set_state(&mut inner, PlaybackState::Idle);
                    log::debug!("playback: {variant} finished");
                }
            });
        }

        Ok(PlayOutcome::Started { cached: from_cache })
    }

    /// Stop whatever is loading or playing.  Idempotent.
    pub fn stop(&self) {
        let mut inner = self.shared.inner();
        self.shared.stop_locked(&mut inner);
    }

    /// Drop the cached audio of `variant` in `language`.
    pub fn invalidate(&self, variant: TextVariant, language: &str) {
        self.shared
            .inner()
            .cache
            .invalidate(&CacheKey::new(variant, language));
    }

    /// Drop every cached utterance (a new image was captured).
    pub fn clear_cache(&self) {
        self.shared.inner().cache.clear();
    }

    /// Stop playback and close the output context.  The controller stays
    /// usable; the next play opens a new context.
    pub async fn close(&self) {
        self.stop();
        self.shared.session.lock().await.release().await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
