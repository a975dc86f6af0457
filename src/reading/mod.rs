//! Reading session: what was read from one captured image, and speaking it.
//!
//! ```text
//! CapturedImage ─▶ ContentExtractor::extract ─▶ ReadingContent
//!                                                    │
//!                                                    ▼
//!                     ReadingSession { content, languages, PlaybackController }
//!                        ├─ play(variant) / stop()
//!                        ├─ retranslate(extractor, language) → apply_translation
//!                        ├─ reset(content)    new image, cache cleared
//!                        └─ close()           output context released
//! ```

pub mod content;
pub mod session;

pub use content::ReadingContent;
pub use session::ReadingSession;
