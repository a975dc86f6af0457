//! Speaker output via `cpal`.
//!
//! An [`OutputContext`] is one open output stream on one device.  It plays at
//! most one voice at a time: [`OutputContext::start`] hands it a decoded
//! buffer and returns a [`VoiceHandle`] that can stop the voice early and
//! reports natural completion through a `oneshot` channel.
//!
//! [`CpalBackend`] opens [`CpalContext`]s.  Because `cpal::Stream` is not
//! `Send` on every platform, each context owns a dedicated `audio-output`
//! thread that builds the stream, keeps it alive and obeys
//! [`Command`]s sent over a std channel.  The cpal callback renders the
//! active voice from a shared slot and writes silence when the slot is empty.
//!
//! ```text
//! CpalContext::start(audio) ──▶ voice slot (Arc<Mutex<…>>)
//!                                   ▲
//! audio-output thread ── cpal::Stream callback ── render() ──▶ speaker
//!                                   │
//!                        end of buffer ──▶ oneshot ──▶ VoiceHandle::completion
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::audio::pcm::DecodedAudio;
use crate::audio::resample::{mono_to_interleaved, resample};

// ---------------------------------------------------------------------------
// OutputError
// ---------------------------------------------------------------------------

/// Errors raised while opening, resuming or driving an output context.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("no output device found on the default audio host")]
    NoDevice,

    #[error("failed to enumerate output devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported device sample format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    /// The context has already been closed.
    #[error("output context is closed")]
    Closed,

    /// The voice was stopped before, or has already played to the end.
    #[error("voice already stopped")]
    AlreadyStopped,

    /// The `audio-output` thread could not be spawned or went away.
    #[error("audio output thread failed: {0}")]
    Thread(String),
}

// ---------------------------------------------------------------------------
// ContextState
// ---------------------------------------------------------------------------

/// Runtime state of an [`OutputContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// The stream is running; voices started now are audible.
    Running,
    /// The stream is paused, e.g. after a device error; call
    /// [`OutputContext::resume`] before starting a voice.
    Suspended,
    /// The context was closed and cannot be reused.
    Closed,
}

// ---------------------------------------------------------------------------
// VoiceHandle / VoiceSignal
// ---------------------------------------------------------------------------

/// Caller side of one started voice.  Single use: once stopped or finished
/// it cannot be restarted.
#[derive(Debug)]
pub struct VoiceHandle {
    stopped: Arc<AtomicBool>,
    completion: Option<oneshot::Receiver<()>>,
}

/// Renderer side of one started voice.
#[derive(Debug)]
pub struct VoiceSignal {
    stopped: Arc<AtomicBool>,
    done: Option<oneshot::Sender<()>>,
}

impl VoiceHandle {
    /// Create a connected handle / signal pair.
    pub fn pair() -> (VoiceHandle, VoiceSignal) {
        let stopped = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();
        (
            VoiceHandle {
                stopped: Arc::clone(&stopped),
                completion: Some(rx),
            },
            VoiceSignal {
                stopped,
                done: Some(tx),
            },
        )
    }

    /// Silence the voice.
    ///
    /// # Errors
    ///
    /// [`OutputError::AlreadyStopped`] when the voice was already stopped or
    /// has finished on its own.
    pub fn stop(&self) -> Result<(), OutputError> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Err(OutputError::AlreadyStopped);
        }
        Ok(())
    }

    /// `true` once the voice was stopped or reached the end of its buffer.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Take the completion receiver.  It resolves with `Ok(())` when the
    /// voice plays to the end and with `Err(_)` when the voice is dropped
    /// without finishing (stopped, replaced or context closed).
    pub fn take_completion(&mut self) -> Option<oneshot::Receiver<()>> {
        self.completion.take()
    }
}

impl VoiceSignal {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Mark the voice as finished and notify the handle, unless it was
    /// already stopped by the caller.
    pub fn complete(mut self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            if let Some(tx) = self.done.take() {
                let _ = tx.send(());
            }
        }
    }

    /// Drop the voice without reporting completion.
    pub fn cancel(self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// PreparedVoice
// ---------------------------------------------------------------------------

/// Decoded audio already converted to a context's rate and channel layout.
#[derive(Debug, Clone)]
pub struct PreparedVoice {
    source: Arc<DecodedAudio>,
    samples: Vec<f32>,
}

impl PreparedVoice {
    pub fn new(source: Arc<DecodedAudio>, samples: Vec<f32>) -> Self {
        Self { source, samples }
    }

    /// The buffer this voice was prepared from.
    pub fn source(&self) -> &Arc<DecodedAudio> {
        &self.source
    }

    /// Interleaved samples at the device rate.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

// ---------------------------------------------------------------------------
// OutputContext / OutputBackend traits
// ---------------------------------------------------------------------------

/// One open output stream.
///
/// Implementors must be `Send + Sync` so a context can be shared behind
/// `Arc<dyn OutputContext>` between the session manager and the playback
/// controller.
#[async_trait]
pub trait OutputContext: Send + Sync {
    /// Current runtime state.
    fn state(&self) -> ContextState;

    /// Rate the context was opened for (the rate voices are expected at).
    fn sample_rate(&self) -> u32;

    /// Restart a suspended stream.  A no-op on a running context.
    async fn resume(&self) -> Result<(), OutputError>;

    /// Convert `audio` to the layout the stream renders.  May be slow for
    /// long utterances; call it outside any lock.
    fn prepare(&self, audio: Arc<DecodedAudio>) -> PreparedVoice;

    /// Start playing `voice`, replacing any voice that is still playing.
    fn start(&self, voice: PreparedVoice) -> Result<VoiceHandle, OutputError>;

    /// Stop the stream and free the device.  Calling it again is a no-op.
    fn close(&self) -> Result<(), OutputError>;
}

/// Factory for [`OutputContext`]s.
pub trait OutputBackend: Send + Sync {
    /// Open a new context that accepts voices at `sample_rate` Hz.
    fn open(&self, sample_rate: u32) -> Result<Arc<dyn OutputContext>, OutputError>;
}

// ---------------------------------------------------------------------------
// CpalBackend
// ---------------------------------------------------------------------------

/// Opens [`CpalContext`]s on the default host.
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    /// Output device name; `None` selects the system default.
    device_name: Option<String>,
}

impl CpalBackend {
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }
}

impl OutputBackend for CpalBackend {
    fn open(&self, sample_rate: u32) -> Result<Arc<dyn OutputContext>, OutputError> {
        let context = CpalContext::open(self.device_name.clone(), sample_rate)?;
        Ok(Arc::new(context))
    }
}

// ---------------------------------------------------------------------------
// CpalContext
// ---------------------------------------------------------------------------

/// Commands understood by the `audio-output` thread.
enum Command {
    Resume(oneshot::Sender<Result<(), OutputError>>),
    Close,
}

/// The voice currently rendered by the callback, already converted to the
/// device's rate and channel layout.
struct ActiveVoice {
    samples: Vec<f32>,
    position: usize,
    signal: VoiceSignal,
}

/// State shared between the context, its thread and the cpal callback.
struct Shared {
    voice: Mutex<Option<ActiveVoice>>,
    state: Mutex<ContextState>,
}

impl Shared {
    fn voice(&self) -> MutexGuard<'_, Option<ActiveVoice>> {
        self.voice.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn state(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Format negotiated with the device.
#[derive(Debug, Clone, Copy)]
struct DeviceFormat {
    sample_rate: u32,
    channels: u16,
}

/// A `cpal` output stream owned by a dedicated thread.
pub struct CpalContext {
    shared: Arc<Shared>,
    commands: std_mpsc::Sender<Command>,
    thread: Mutex<Option<JoinHandle<()>>>,
    requested_rate: u32,
    format: DeviceFormat,
}

impl CpalContext {
    /// Open `device_name` (or the default output device) at `sample_rate`.
    ///
    /// When the device does not accept `sample_rate` its default config is
    /// used and voices are resampled on [`start`](OutputContext::start).
    ///
    /// # Errors
    ///
    /// Any device, config or stream error reported by cpal, or
    /// [`OutputError::Thread`] if the output thread cannot be spawned.
    pub fn open(device_name: Option<String>, sample_rate: u32) -> Result<Self, OutputError> {
        let shared = Arc::new(Shared {
            voice: Mutex::new(None),
            state: Mutex::new(ContextState::Running),
        });

        let (command_tx, command_rx) = std_mpsc::channel::<Command>();
        let (init_tx, init_rx) = std_mpsc::sync_channel::<Result<DeviceFormat, OutputError>>(1);

        let thread_shared = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || {
                let stream = match build_stream(device_name.as_deref(), sample_rate, &thread_shared)
                {
                    Ok((stream, format)) => {
                        let _ = init_tx.send(Ok(format));
                        stream
                    }
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };

                while let Ok(command) = command_rx.recv() {
                    match command {
                        Command::Resume(reply) => {
                            let result = stream.play().map_err(OutputError::from);
                            let _ = reply.send(result);
                        }
                        Command::Close => break,
                    }
                }

                drop(stream);
                log::debug!("output: stream dropped, audio-output thread exiting");
            })
            .map_err(|e| OutputError::Thread(e.to_string()))?;

        let format = init_rx
            .recv()
            .map_err(|e| OutputError::Thread(e.to_string()))??;

        log::info!(
            "output: context opened ({} Hz requested, device {} Hz / {} ch)",
            sample_rate,
            format.sample_rate,
            format.channels
        );

        Ok(Self {
            shared,
            commands: command_tx,
            thread: Mutex::new(Some(thread)),
            requested_rate: sample_rate,
            format,
        })
    }
}

#[async_trait]
impl OutputContext for CpalContext {
    fn state(&self) -> ContextState {
        *self.shared.state()
    }

    fn sample_rate(&self) -> u32 {
        self.requested_rate
    }

    async fn resume(&self) -> Result<(), OutputError> {
        match self.state() {
            ContextState::Running => return Ok(()),
            ContextState::Closed => return Err(OutputError::Closed),
            ContextState::Suspended => {}
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Resume(reply_tx))
            .map_err(|e| OutputError::Thread(e.to_string()))?;
        reply_rx
            .await
            .map_err(|e| OutputError::Thread(e.to_string()))??;

        *self.shared.state() = ContextState::Running;
        log::info!("output: context resumed");
        Ok(())
    }

    /// Resample to the device rate and fan the mono mix out to every
    /// device channel.
    fn prepare(&self, audio: Arc<DecodedAudio>) -> PreparedVoice {
        let mono = audio.to_mono();
        let at_device_rate = resample(&mono, audio.sample_rate(), self.format.sample_rate);
        let samples = mono_to_interleaved(&at_device_rate, self.format.channels);
        PreparedVoice::new(audio, samples)
    }

    fn start(&self, voice: PreparedVoice) -> Result<VoiceHandle, OutputError> {
        if self.state() == ContextState::Closed {
            return Err(OutputError::Closed);
        }

        let samples = voice.samples;
        let (handle, signal) = VoiceHandle::pair();

        let mut slot = self.shared.voice();
        if let Some(previous) = slot.take() {
            previous.signal.cancel();
        }

        if samples.is_empty() {
            signal.complete();
        } else {
            *slot = Some(ActiveVoice {
                samples,
                position: 0,
                signal,
            });
        }

        Ok(handle)
    }

    fn close(&self) -> Result<(), OutputError> {
        {
            let mut state = self.shared.state();
            if *state == ContextState::Closed {
                return Ok(());
            }
            *state = ContextState::Closed;
        }

        if let Some(voice) = self.shared.voice().take() {
            voice.signal.cancel();
        }

        let _ = self.commands.send(Command::Close);
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(thread) = thread {
            thread
                .join()
                .map_err(|_| OutputError::Thread("audio-output thread panicked".into()))?;
        }

        log::info!("output: context closed");
        Ok(())
    }
}

impl Drop for CpalContext {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("output: close on drop failed: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Stream construction (runs on the audio-output thread)
// ---------------------------------------------------------------------------

fn select_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device, OutputError> {
    if let Some(name) = name {
        let found = host
            .output_devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false));
        match found {
            Some(device) => return Ok(device),
            None => log::warn!("output: device {name:?} not found, using default"),
        }
    }
    host.default_output_device().ok_or(OutputError::NoDevice)
}

/// Prefer an `f32` config at exactly `sample_rate`, then any format at that
/// rate, then the device default.
fn select_config(
    device: &cpal::Device,
    sample_rate: u32,
) -> Result<cpal::SupportedStreamConfig, OutputError> {
    let wanted = cpal::SampleRate(sample_rate);

    let ranges: Vec<cpal::SupportedStreamConfigRange> = match device.supported_output_configs() {
        Ok(configs) => configs
            .filter(|c| c.min_sample_rate() <= wanted && wanted <= c.max_sample_rate())
            .collect(),
        Err(e) => {
            log::warn!("output: cannot list supported configs: {e}");
            Vec::new()
        }
    };

    let preferred = ranges
        .iter()
        .find(|c| c.sample_format() == cpal::SampleFormat::F32)
        .or_else(|| ranges.first());

    match preferred {
        Some(range) => Ok(range.clone().with_sample_rate(wanted)),
        None => Ok(device.default_output_config()?),
    }
}

fn build_stream(
    device_name: Option<&str>,
    sample_rate: u32,
    shared: &Arc<Shared>,
) -> Result<(cpal::Stream, DeviceFormat), OutputError> {
    let host = cpal::default_host();
    let device = select_device(&host, device_name)?;
    let supported = select_config(&device, sample_rate)?;

    let format = DeviceFormat {
        sample_rate: supported.sample_rate().0,
        channels: supported.channels(),
    };
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_typed::<f32>(&device, &config, shared)?,
        cpal::SampleFormat::I16 => build_typed::<i16>(&device, &config, shared)?,
        cpal::SampleFormat::U16 => build_typed::<u16>(&device, &config, shared)?,
        other => return Err(OutputError::UnsupportedFormat(format!("{other:?}"))),
    };

    stream.play()?;
    Ok((stream, format))
}

fn build_typed<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    shared: &Arc<Shared>,
) -> Result<cpal::Stream, OutputError>
where
    T: SizedSample + FromSample<f32>,
{
    let render_shared = Arc::clone(shared);
    let error_shared = Arc::clone(shared);

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| render(data, &render_shared),
        move |err: cpal::StreamError| {
            log::error!("cpal output stream error: {err}");
            let mut state = error_shared.state();
            if *state == ContextState::Running {
                *state = ContextState::Suspended;
            }
        },
        None,
    )?;

    Ok(stream)
}

/// Fill `data` from the active voice, padding with silence.
fn render<T>(data: &mut [T], shared: &Shared)
where
    T: Sample + FromSample<f32>,
{
    let mut slot = shared.voice();
    let mut written = 0;
    let mut finished = false;
    let mut cancelled = false;

    if let Some(voice) = slot.as_mut() {
        if voice.signal.is_stopped() {
            cancelled = true;
        } else {
            let remaining = &voice.samples[voice.position..];
            let n = remaining.len().min(data.len());
            for (out, &sample) in data[..n].iter_mut().zip(remaining) {
                *out = T::from_sample(sample);
            }
            voice.position += n;
            written = n;
            finished = voice.position >= voice.samples.len();
        }
    }

    for out in &mut data[written..] {
        *out = T::EQUILIBRIUM;
    }

    if finished || cancelled {
        if let Some(voice) = slot.take() {
            voice.signal.complete();
        }
    }
}

// ---------------------------------------------------------------------------
// MockOutputBackend  (test-only)
// ---------------------------------------------------------------------------

/// Test double that records every context it opens.  Voices never finish on
/// their own; tests call [`MockOutputContext::finish_current`].
#[cfg(test)]
#[derive(Default)]
pub struct MockOutputBackend {
    pub contexts: Mutex<Vec<Arc<MockOutputContext>>>,
    pub fail_open: AtomicBool,
    pub fail_start: AtomicBool,
    /// Called from every `prepare`, on the caller's thread.
    pub prepare_hook: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
    /// Thread each `open` ran on.
    pub open_threads: Mutex<Vec<std::thread::ThreadId>>,
}

#[cfg(test)]
impl MockOutputBackend {
    pub fn opened(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }

    pub fn last(&self) -> Arc<MockOutputContext> {
        Arc::clone(self.contexts.lock().unwrap().last().expect("no context opened"))
    }
}

#[cfg(test)]
impl OutputBackend for MockOutputBackend {
    fn open(&self, sample_rate: u32) -> Result<Arc<dyn OutputContext>, OutputError> {
        self.open_threads.lock().unwrap().push(std::thread::current().id());
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(OutputError::NoDevice);
        }
        let context = Arc::new(MockOutputContext {
            sample_rate,
            state: Mutex::new(ContextState::Running),
            voices: Mutex::new(Vec::new()),
            started: Mutex::new(Vec::new()),
            resumes: Mutex::new(0),
            closes: Mutex::new(0),
            close_threads: Mutex::new(Vec::new()),
            fail_start: self.fail_start.load(Ordering::SeqCst),
            prepare_hook: self.prepare_hook.lock().unwrap().clone(),
        });
        self.contexts.lock().unwrap().push(Arc::clone(&context));
        Ok(context)
    }
}

#[cfg(test)]
pub struct MockOutputContext {
    pub sample_rate: u32,
    pub state: Mutex<ContextState>,
    pub voices: Mutex<Vec<VoiceSignal>>,
    pub started: Mutex<Vec<Arc<DecodedAudio>>>,
    pub resumes: Mutex<usize>,
    pub closes: Mutex<usize>,
    pub close_threads: Mutex<Vec<std::thread::ThreadId>>,
    pub fail_start: bool,
    pub prepare_hook: Option<Arc<dyn Fn() + Send + Sync>>,
}

#[cfg(test)]
impl MockOutputContext {
    pub fn suspend(&self) {
        *self.state.lock().unwrap() = ContextState::Suspended;
    }

    /// Play the most recently started voice to its end.
    pub fn finish_current(&self) {
        if let Some(signal) = self.voices.lock().unwrap().pop() {
            signal.complete();
        }
    }

    /// Number of voices that have not been stopped or finished.
    pub fn audible(&self) -> usize {
        self.voices
            .lock()
            .unwrap()
            .iter()
            .filter(|v| !v.is_stopped())
            .count()
    }

    pub fn start_count(&self) -> usize {
        self.started.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl OutputContext for MockOutputContext {
    fn state(&self) -> ContextState {
        *self.state.lock().unwrap()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn resume(&self) -> Result<(), OutputError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        if *state == ContextState::Closed {
            return Err(OutputError::Closed);
        }
        *state = ContextState::Running;
        *self.resumes.lock().unwrap() += 1;
        Ok(())
    }

    fn prepare(&self, audio: Arc<DecodedAudio>) -> PreparedVoice {
        if let Some(hook) = &self.prepare_hook {
            hook();
        }
        let samples = audio.to_mono();
        PreparedVoice::new(audio, samples)
    }

    fn start(&self, voice: PreparedVoice) -> Result<VoiceHandle, OutputError> {
        if self.fail_start {
            return Err(OutputError::PlayStream(cpal::PlayStreamError::DeviceNotAvailable));
        }
        if self.state() == ContextState::Closed {
            return Err(OutputError::Closed);
        }
        let (handle, signal) = VoiceHandle::pair();
        let mut voices = self.voices.lock().unwrap();
        for previous in voices.drain(..) {
            previous.cancel();
        }
        voices.push(signal);
        self.started.lock().unwrap().push(Arc::clone(voice.source()));
        Ok(handle)
    }

    fn close(&self) -> Result<(), OutputError> {
        self.close_threads.lock().unwrap().push(std::thread::current().id());
        let mut state = self.state.lock().unwrap();
        if *state != ContextState::Closed {
            *state = ContextState::Closed;
            *self.closes.lock().unwrap() += 1;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
