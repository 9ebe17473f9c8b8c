//! Supported language and voice catalog.
//!
//! This is configuration data, not behavior: the inference backends decide
//! what they actually support, this table drives validation and defaults.

/// Default session language.
pub const DEFAULT_LANGUAGE: &str = "hi-IN";

/// Default TTS voice.
pub const DEFAULT_VOICE: &str = "meera";

/// Supported language tags and their display names.
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("en-IN", "English (India)"),
    ("hi-IN", "Hindi"),
    ("ta-IN", "Tamil"),
    ("te-IN", "Telugu"),
    ("kn-IN", "Kannada"),
    ("ml-IN", "Malayalam"),
    ("mr-IN", "Marathi"),
    ("gu-IN", "Gujarati"),
    ("bn-IN", "Bengali"),
    ("pa-IN", "Punjabi"),
    ("od-IN", "Odia"),
];

/// Voices available in every supported language.
const COMMON_VOICES: &[&str] = &["meera", "arjun"];

/// Additional voices only available in English and Hindi.
const EXTENDED_VOICES: &[&str] = &["anushka"];

/// Returns whether `tag` is a supported language.
pub fn is_supported_language(tag: &str) -> bool {
    SUPPORTED_LANGUAGES.iter().any(|(code, _)| *code == tag)
}

/// Returns the display name for a language tag, if supported.
pub fn language_name(tag: &str) -> Option<&'static str> {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(code, _)| *code == tag)
        .map(|(_, name)| *name)
}

/// Returns the voices available for a language.
///
/// Unsupported languages fall back to the default voice only.
pub fn voices_for(tag: &str) -> Vec<&'static str> {
    if !is_supported_language(tag) {
        return vec![DEFAULT_VOICE];
    }
    let mut voices: Vec<&'static str> = COMMON_VOICES.to_vec();
    if tag == "en-IN" || tag == "hi-IN" {
        voices.extend_from_slice(EXTENDED_VOICES);
    }
    voices
}

/// Returns whether `voice` is available in `language`.
pub fn is_supported_voice(language: &str, voice: &str) -> bool {
    voices_for(language).contains(&voice)
}
