//! Application entry point for the reading aid.
//!
//! ```text
//! reading-aid <image-path> [original|simplified|translated]
//! ```
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Parse arguments.
//! 4. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 5. Read the image with the vision provider and print the three texts.
//! 6. Speak the chosen variant (simplified by default) and wait for it to
//!    finish, then release the output device.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use reading_aid::{
    audio::CpalBackend,
    config::AppConfig,
    playback::{PlayOutcome, PlaybackError, TextVariant},
    reading::{ReadingContent, ReadingSession},
    tts::GeminiSpeechClient,
    vision::{CapturedImage, ContentExtractor, GeminiExtractor},
};

const USAGE: &str = "usage: reading-aid <image-path> [original|simplified|translated]";

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

struct Args {
    image: PathBuf,
    variant: TextVariant,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let Some(image) = args.next() else {
        bail!(USAGE);
    };
    let variant = match args.next() {
        Some(v) => v.parse::<TextVariant>().map_err(anyhow::Error::msg)?,
        None => TextVariant::Simplified,
    };
    if args.next().is_some() {
        bail!(USAGE);
    }
    Ok(Args {
        image: PathBuf::from(image),
        variant,
    })
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_content(content: &ReadingContent, session: &ReadingSession) {
    println!("Language:   {}", content.language);
    println!("Confidence: {:.0}%", content.confidence * 100.0);
    if content.requires_audit {
        println!("!! Please double-check this reading with someone you trust.");
    }
    for variant in TextVariant::ALL {
        println!();
        println!("[{variant} · {}]", session.language_for(variant));
        println!("{}", content.text(variant));
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Arguments
    let args = parse_args(std::env::args().skip(1))?;

    // 4. Tokio runtime (network round trips + completion watcher)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(run(config, args))
}

async fn run(config: AppConfig, args: Args) -> Result<()> {
    // 5. Extraction
    let image = CapturedImage::from_path(&args.image)
        .with_context(|| format!("cannot use {}", args.image.display()))?;

    let extractor = GeminiExtractor::from_config(&config.provider);
    let content = extractor
        .extract(
            &image,
            &config.reading.target_language,
            config.reading.effective_translation_language(),
        )
        .await
        .context("could not read the image")?;

    if content.is_blank() {
        println!("No text found in {}.", args.image.display());
        return Ok(());
    }

    let session = ReadingSession::from_config(
        content,
        &config,
        Arc::new(GeminiSpeechClient::from_config(&config.provider)),
        Arc::new(CpalBackend::new(config.audio.output_device.clone())),
    );
    print_content(session.content(), &session);

    // 6. Playback
    let result = session.play(args.variant).await;
    match &result {
        Ok(PlayOutcome::Started { cached }) => {
            log::debug!("playing {} (cached: {cached})", args.variant);
            session.wait_until_idle().await;
        }
        Ok(PlayOutcome::Skipped) => println!("\nThe {} text is empty.", args.variant),
        Ok(outcome) => log::debug!("play ended with {outcome:?}"),
        Err(_) => {} // reported by play_result
    }

    session.close().await;
    play_result(result)
}

/// Log the detailed failure and hand back only the user notice, which
/// `main` prints once on exit.
fn play_result(result: std::result::Result<PlayOutcome, PlaybackError>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            log::error!("{e}");
            Err(anyhow::Error::msg(e.user_notice()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn variant_defaults_to_simplified() {
        let parsed = args(&["label.jpg"]).unwrap();
        assert_eq!(parsed.image, PathBuf::from("label.jpg"));
        assert_eq!(parsed.variant, TextVariant::Simplified);
    }

    #[test]
    fn variant_is_parsed() {
        assert_eq!(args(&["a.png", "Translated"]).unwrap().variant, TextVariant::Translated);
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(args(&[]).is_err());
        assert!(args(&["a.png", "loud"]).is_err());
        assert!(args(&["a.png", "original", "extra"]).is_err());
    }

    #[test]
    fn play_failure_reports_the_notice_once() {
        let error = play_result(Err(PlaybackError::SynthesisProvider(
            reading_aid::tts::SynthesisError::NoCandidate,
        )))
        .unwrap_err();

        assert_eq!(error.to_string(), reading_aid::playback::PLAYBACK_FAILED_NOTICE);
        assert_eq!(error.chain().count(), 1);
    }

    #[test]
    fn play_success_is_ok() {
        assert!(play_result(Ok(PlayOutcome::Superseded)).is_ok());
    }
}
