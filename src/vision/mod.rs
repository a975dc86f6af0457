//! Content extraction: captured image → original, simplified and
//! translated text.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use reading_aid::config::AppConfig;
//! use reading_aid::vision::{CapturedImage, ContentExtractor, GeminiExtractor};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::load().unwrap();
//!     let extractor = GeminiExtractor::from_config(&config.provider);
//!
//!     let image = CapturedImage::from_path(Path::new("label.jpg")).unwrap();
//!     let content = extractor.extract(&image, "English", "Spanish").await.unwrap();
//!     println!("{}", content.simplified_text);
//! }
//! ```

pub mod extractor;
pub mod image;
pub mod prompt;

pub use extractor::{
    parse_reading_content, response_text, ContentExtractor, ExtractionError, GeminiExtractor,
};
pub use image::{mime_for_path, CapturedImage};

#[cfg(test)]
pub use extractor::MockExtractor;
