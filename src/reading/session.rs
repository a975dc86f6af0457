//! One reading session: the texts of a captured image and their playback.

use std::sync::Arc;

use crate::audio::OutputBackend;
use crate::config::AppConfig;
use crate::playback::{PlayOutcome, PlaybackController, PlaybackError, PlaybackState, TextVariant};
use crate::tts::SpeechSynthesizer;
use crate::vision::{ContentExtractor, ExtractionError};

use super::content::ReadingContent;

/// Scope of one captured image.
///
/// Owns the extracted [`ReadingContent`], the languages each variant is
/// spoken in and the [`PlaybackController`] (with its cache and output
/// context).  Original and simplified texts are spoken in the target
/// language; the translated text in the most recently selected translation
/// language.
pub struct ReadingSession {
    content: ReadingContent,
    target_language: String,
    translation_language: String,
    controller: PlaybackController,
}

impl ReadingSession {
    pub fn new(
        content: ReadingContent,
        target_language: impl Into<String>,
        translation_language: impl Into<String>,
        controller: PlaybackController,
    ) -> Self {
        Self {
            content,
            target_language: target_language.into(),
            translation_language: translation_language.into(),
            controller,
        }
    }

    /// Session with languages and output rate taken from `config`.
    pub fn from_config(
        content: ReadingContent,
        config: &AppConfig,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        backend: Arc<dyn OutputBackend>,
    ) -> Self {
        let controller =
            PlaybackController::new(synthesizer, backend, config.audio.output_sample_rate);
        Self::new(
            content,
            config.reading.target_language.clone(),
            config.reading.effective_translation_language(),
            controller,
        )
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn content(&self) -> &ReadingContent {
        &self.content
    }

    pub fn text(&self, variant: TextVariant) -> &str {
        self.content.text(variant)
    }

    /// Language `variant` is spoken in.
    pub fn language_for(&self, variant: TextVariant) -> &str {
        match variant {
            TextVariant::Original | TextVariant::Simplified => &self.target_language,
            TextVariant::Translated => &self.translation_language,
        }
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    pub fn translation_language(&self) -> &str {
        &self.translation_language
    }

    pub fn state(&self) -> PlaybackState {
        self.controller.state()
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    // -----------------------------------------------------------------------
    // Playback
    // -----------------------------------------------------------------------

    /// Play (or toggle off) `variant`.
    pub async fn play(&self, variant: TextVariant) -> Result<PlayOutcome, PlaybackError> {
        self.controller
            .play(variant, self.text(variant), self.language_for(variant))
            .await
    }

    pub fn stop(&self) {
        self.controller.stop();
    }

    /// Block until nothing is loading or playing.
    pub async fn wait_until_idle(&self) {
        self.controller.wait_until_idle().await;
    }

    // -----------------------------------------------------------------------
    // Translation
    // -----------------------------------------------------------------------

    /// Replace the translated text with `text` in `language`.
    ///
    /// A translated utterance that is loading or playing is stopped.  Cached
    /// audio for `language` is dropped because its text changed; the
    /// original and simplified entries are kept.
    pub fn apply_translation(&mut self, language: impl Into<String>, text: impl Into<String>) {
        let language = language.into();

        if self.controller.state().variant() == Some(TextVariant::Translated) {
            self.controller.stop();
        }
        self.controller.invalidate(TextVariant::Translated, &language);

        log::info!("reading: translation switched to {language}");
        self.translation_language = language;
        self.content.translated_text = text.into();
    }

    /// Translate the original text into `language` with `extractor` and
    /// apply the result.  The session is unchanged on failure.
    pub async fn retranslate(
        &mut self,
        extractor: &dyn ContentExtractor,
        language: &str,
    ) -> Result<(), ExtractionError> {
        let text = extractor
            .translate(&self.content.original_text, language)
            .await?;
        self.apply_translation(language, text);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start over with the content of a newly captured image.  Cached audio
    /// belongs to the old texts and is discarded; the output context is kept.
    pub fn reset(&mut self, content: ReadingContent) {
        self.controller.stop();
        self.controller.clear_cache();
        self.content = content;
    }

    /// Stop playback and release the output context.
    pub async fn close(&self) {
        self.controller.close().await;
        log::debug!("reading: session closed");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MockOutputBackend;
    use crate::tts::MockSynthesizer;
    use crate::vision::MockExtractor;

    fn content() -> ReadingContent {
        ReadingContent {
            original_text: "Salida".into(),
            simplified_text: "Exit".into(),
            translated_text: "Exit".into(),
            language: "Spanish".into(),
            confidence: 0.9,
            requires_audit: false,
        }
    }

    fn session() -> (ReadingSession, Arc<MockSynthesizer>, Arc<MockOutputBackend>) {
        let synth = Arc::new(MockSynthesizer::new());
        let backend = Arc::new(MockOutputBackend::default());
        let controller = PlaybackController::new(synth.clone(), backend.clone(), 24_000);
        let session = ReadingSession::new(content(), "English", "English", controller);
        (session, synth, backend)
    }

    // ---- Languages ---------------------------------------------------------

    #[test]
    fn variants_use_their_languages() {
        let synth = Arc::new(MockSynthesizer::new());
        let backend = Arc::new(MockOutputBackend::default());
        let controller = PlaybackController::new(synth, backend, 24_000);
        let session = ReadingSession::new(content(), "English", "French", controller);

        assert_eq!(session.language_for(TextVariant::Original), "English");
        assert_eq!(session.language_for(TextVariant::Simplified), "English");
        assert_eq!(session.language_for(TextVariant::Translated), "French");
    }

    #[tokio::test]
    async fn from_config_uses_reading_languages() {
        let mut config = AppConfig::default();
        config.reading.target_language = "Thai".into();
        config.reading.translation_language = Some("German".into());

        let session = ReadingSession::from_config(
            content(),
            &config,
            Arc::new(MockSynthesizer::new()),
            Arc::new(MockOutputBackend::default()),
        );

        assert_eq!(session.target_language(), "Thai");
        assert_eq!(session.translation_language(), "German");
    }

    #[tokio::test]
    async fn play_passes_variant_text_and_language() {
        let (session, synth, _backend) = session();

        session.play(TextVariant::Original).await.unwrap();

        assert_eq!(synth.calls(), vec![("Salida".to_string(), "English".to_string())]);
        assert_eq!(session.state(), PlaybackState::Playing(TextVariant::Original));
    }

    // ---- Translation -------------------------------------------------------

    #[tokio::test]
    async fn apply_translation_keeps_other_variants_cached() {
        let (mut session, synth, _backend) = session();
        session.play(TextVariant::Original).await.unwrap();
        session.stop();
        session.play(TextVariant::Translated).await.unwrap();
        session.stop();

        session.apply_translation("French", "Sortie");
        session.play(TextVariant::Translated).await.unwrap();
        session.stop();
        session.play(TextVariant::Original).await.unwrap();

        let calls = synth.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2], ("Sortie".to_string(), "French".to_string()));
    }

    #[tokio::test]
    async fn retranslating_same_language_resynthesises() {
        let (mut session, synth, _backend) = session();
        session.play(TextVariant::Translated).await.unwrap();
        session.stop();

        session.apply_translation("English", "Way out");
        session.play(TextVariant::Translated).await.unwrap();

        assert_eq!(synth.call_count(), 2);
        assert_eq!(session.text(TextVariant::Translated), "Way out");
    }

    #[tokio::test]
    async fn apply_translation_stops_translated_playback() {
        let (mut session, _synth, backend) = session();
        session.play(TextVariant::Translated).await.unwrap();

        session.apply_translation("French", "Sortie");

        assert_eq!(session.state(), PlaybackState::Idle);
        assert_eq!(backend.last().audible(), 0);
    }

    #[tokio::test]
    async fn apply_translation_leaves_other_playback_alone() {
        let (mut session, _synth, _backend) = session();
        session.play(TextVariant::Simplified).await.unwrap();

        session.apply_translation("French", "Sortie");

        assert_eq!(session.state(), PlaybackState::Playing(TextVariant::Simplified));
    }

    #[tokio::test]
    async fn retranslate_applies_extractor_result() {
        let (mut session, _synth, _backend) = session();
        let extractor = MockExtractor::new(content());

        session.retranslate(&extractor, "German").await.unwrap();

        assert_eq!(session.translation_language(), "German");
        assert_eq!(session.text(TextVariant::Translated), "[German] Salida");
    }

    #[tokio::test]
    async fn failed_retranslate_leaves_session_unchanged() {
        let (mut session, _synth, _backend) = session();
        let extractor = MockExtractor::failing();

        assert!(session.retranslate(&extractor, "German").await.is_err());
        assert_eq!(session.translation_language(), "English");
        assert_eq!(session.text(TextVariant::Translated), "Exit");
    }

    // ---- Lifecycle ---------------------------------------------------------

    #[tokio::test]
    async fn reset_clears_cache_and_replaces_texts() {
        let (mut session, synth, backend) = session();
        session.play(TextVariant::Original).await.unwrap();

        session.reset(ReadingContent {
            original_text: "Entrada".into(),
            ..content()
        });
        assert_eq!(session.state(), PlaybackState::Idle);
        assert_eq!(session.controller().cached_len(), 0);

        session.play(TextVariant::Original).await.unwrap();
        assert_eq!(synth.call_count(), 2);
        assert_eq!(synth.calls()[1].0, "Entrada");
        assert_eq!(backend.opened(), 1);
    }

    async fn until_calls(synth: &MockSynthesizer, n: usize) {
        for _ in 0..1_000 {
            if synth.call_count() >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("synthesizer never reached {n} call(s)");
    }

    #[tokio::test]
    async fn reset_during_load_does_not_replay_old_image() {
        let (mut session, synth, _backend) = session();
        let gate = synth.hold("Salida");

        let slow = {
            let controller = session.controller().clone();
            tokio::spawn(async move {
                controller.play(TextVariant::Original, "Salida", "English").await
            })
        };
        until_calls(&synth, 1).await;

        session.reset(ReadingContent {
            original_text: "Entrada".into(),
            ..content()
        });
        gate.notify_one();
        assert_eq!(slow.await.unwrap().unwrap(), PlayOutcome::Superseded);

        let outcome = session.play(TextVariant::Original).await.unwrap();

        assert_eq!(outcome, PlayOutcome::Started { cached: false });
        assert_eq!(synth.calls()[1].0, "Entrada");
    }

    #[tokio::test]
    async fn same_language_translation_during_load_is_resynthesised() {
        let (mut session, synth, _backend) = session();
        let gate = synth.hold("Exit");

        let slow = {
            let controller = session.controller().clone();
            tokio::spawn(async move {
                controller.play(TextVariant::Translated, "Exit", "English").await
            })
        };
        until_calls(&synth, 1).await;

        session.apply_translation("English", "Way out");
        gate.notify_one();
        assert_eq!(slow.await.unwrap().unwrap(), PlayOutcome::Superseded);

        session.play(TextVariant::Translated).await.unwrap();

        assert_eq!(synth.call_count(), 2);
        assert_eq!(synth.calls()[1].0, "Way out");
    }

    #[tokio::test]
    async fn close_stops_and_releases() {
        let (session, _synth, backend) = session();
        session.play(TextVariant::Simplified).await.unwrap();

        session.close().await;

        assert_eq!(session.state(), PlaybackState::Idle);
        assert_eq!(*backend.last().closes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_variant_is_skipped() {
        let (mut session, synth, _backend) = session();
        session.reset(ReadingContent {
            simplified_text: String::new(),
            ..content()
        });

        let outcome = session.play(TextVariant::Simplified).await.unwrap();

        assert_eq!(outcome, PlayOutcome::Skipped);
        assert_eq!(synth.call_count(), 0);
    }
}
