//! Prompts for reading an image and for re-translating its text.
//!
//! The extraction prompt asks for a single JSON object in the camelCase
//! shape of [`ReadingContent`](crate::reading::ReadingContent); the request
//! also sets `responseMimeType: application/json`, so the instructions only
//! need to describe the fields.

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

const EXTRACTION_INSTRUCTION: &str = "\
You are a reading assistant for people with low vision or low literacy.
Read all text visible in the image.

Reply with ONE JSON object with these fields:
- originalText: the text exactly as it appears, in reading order.
- simplifiedText: the same content rewritten in plain, short sentences in {target}.
- translatedText: a faithful translation of the original text into {translation}.
- language: the language the original text is written in.
- confidence: a number from 0 to 1, how legible the text was.
- requiresAudit: true when a mistake could cause harm (medication, dosage,
  legal or financial amounts) or the text was hard to read.

If the image contains no text, reply with empty strings and confidence 0.";

const TRANSLATION_INSTRUCTION: &str = "\
Translate the following text into {language}.
Keep numbers, units, names and line breaks as they are.
Reply with ONLY the translation, no explanation.";

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Prompt that accompanies the image in an extraction request.
///
/// ```rust
/// use reading_aid::vision::prompt::extraction_prompt;
///
/// let prompt = extraction_prompt("English", "Thai");
/// assert!(prompt.contains("plain, short sentences in English"));
/// assert!(prompt.contains("translation of the original text into Thai"));
/// ```
pub fn extraction_prompt(target_language: &str, translation_language: &str) -> String {
    EXTRACTION_INSTRUCTION
        .replace("{target}", target_language)
        .replace("{translation}", translation_language)
}

/// Prompt for translating `text` into `language`.
pub fn translation_prompt(text: &str, language: &str) -> String {
    format!(
        "{}\n\n{text}",
        TRANSLATION_INSTRUCTION.replace("{language}", language)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_prompt_names_every_field() {
        let prompt = extraction_prompt("English", "Spanish");
        for field in [
            "originalText",
            "simplifiedText",
            "translatedText",
            "language",
            "confidence",
            "requiresAudit",
        ] {
            assert!(prompt.contains(field), "missing {field}");
        }
        assert!(!prompt.contains("{target}"));
        assert!(!prompt.contains("{translation}"));
    }

    #[test]
    fn translation_prompt_ends_with_text() {
        let prompt = translation_prompt("Salida de emergencia", "German");
        assert!(prompt.starts_with("Translate the following text into German."));
        assert!(prompt.ends_with("\n\nSalida de emergencia"));
    }
}
