//! Lifecycle of the shared output context.
//!
//! [`AudioSessionManager`] opens one [`OutputContext`] lazily on the first
//! [`acquire_context`](AudioSessionManager::acquire_context), hands the same
//! context out for every later playback (resuming it first when it reports
//! [`ContextState::Suspended`]) and closes it once on
//! [`release`](AudioSessionManager::release).  Platforms cap the number of
//! simultaneously open output streams, so contexts are never opened per
//! playback.
//!
//! Opening and closing a device blocks until the audio thread answers, so
//! both run on `tokio::task::spawn_blocking`.

use std::sync::Arc;

use crate::audio::{ContextState, OutputBackend, OutputContext, OutputError};

/// Owner of the single output context of a reading session.
pub struct AudioSessionManager {
    backend: Arc<dyn OutputBackend>,
    sample_rate: u32,
    context: Option<Arc<dyn OutputContext>>,
    opened: usize,
}

impl AudioSessionManager {
    /// Create a manager that opens contexts at `sample_rate` Hz via
    /// `backend`.  Nothing is opened until the first acquire.
    pub fn new(backend: Arc<dyn OutputBackend>, sample_rate: u32) -> Self {
        Self {
            backend,
            sample_rate,
            context: None,
            opened: 0,
        }
    }

    /// Return the shared context, opening it on first use and resuming it
    /// when suspended.  A context found closed underneath us is replaced.
    ///
    /// # Errors
    ///
    /// Whatever the backend reports while opening or resuming.
    pub async fn acquire_context(&mut self) -> Result<Arc<dyn OutputContext>, OutputError> {
        if let Some(context) = self.context.as_ref().map(Arc::clone) {
            match context.state() {
                ContextState::Running => return Ok(context),
                ContextState::Suspended => {
                    log::debug!("session: output context suspended, resuming");
                    context.resume().await?;
                    return Ok(context);
                }
                ContextState::Closed => {
                    log::warn!("session: output context closed externally, reopening");
                    self.context = None;
                }
            }
        }

        let backend = Arc::clone(&self.backend);
        let sample_rate = self.sample_rate;
        let context = tokio::task::spawn_blocking(move || backend.open(sample_rate))
            .await
            .map_err(|e| OutputError::Thread(e.to_string()))??;
        self.opened += 1;
        log::info!(
            "session: output context opened at {} Hz (#{})",
            self.sample_rate,
            self.opened
        );
        self.context = Some(Arc::clone(&context));
        Ok(context)
    }

    /// Close the context, if one is open.  Safe to call repeatedly; a later
    /// acquire opens a fresh context.
    pub async fn release(&mut self) {
        if let Some(context) = self.context.take() {
            if let Err(e) = tokio::task::spawn_blocking(move || close_context(context)).await {
                log::warn!("session: close task failed: {e}");
            }
        }
    }

    /// `true` while a context is held.
    pub fn is_open(&self) -> bool {
        self.context.is_some()
    }

    /// Number of contexts opened over the manager's lifetime.
    pub fn opened_count(&self) -> usize {
        self.opened
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

fn close_context(context: Arc<dyn OutputContext>) {
    match context.close() {
        Ok(()) => log::info!("session: output context released"),
        Err(e) => log::warn!("session: closing output context failed: {e}"),
    }
}

impl Drop for AudioSessionManager {
    fn drop(&mut self) {
        let Some(context) = self.context.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || close_context(context));
            }
            Err(_) => close_context(context),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
