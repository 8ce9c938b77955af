// Language tags accepted for localized markdown (`home.fr.md`). These are
// the locales with display-name data in CLDR, plus private-use tags the
// service understands.

const SUPPORTED: &[&str] = &[
    "af", "am", "ar", "az", "bg", "bn", "ca", "cs", "da", "de", "el", "en", "en-GB", "en-US",
    "es", "es-419", "es-ES", "et", "fa", "fi", "fil", "fr", "fr-CA", "gu", "he", "hi", "hr",
    "hu", "hy", "id", "is", "it", "ja", "ka", "kk", "km", "kn", "ko", "ky", "lo", "lt", "lv",
    "mk", "ml", "mn", "mr", "ms", "my", "ne", "nl", "no", "pa", "pl", "pt", "pt-BR", "pt-PT",
    "ro", "ru", "si", "sk", "sl", "sq", "sr", "sr-Latn", "sv", "sw", "ta", "te", "th", "tr",
    "uk", "ur", "uz", "vi", "zh", "zh-Hans", "zh-Hant", "zu",
];

const PRIVATE_USE: &[&str] = &["x-piglatin"];

/// Whether `tag` names a language branding content may be written in.
/// Matching is exact, as tags appear verbatim in file names.
pub fn is_supported(tag: &str) -> bool {
    SUPPORTED.contains(&tag) || PRIVATE_USE.contains(&tag)
}
