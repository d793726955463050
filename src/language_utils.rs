use isolang::Language;

use crate::errors::ConfigurationError;

/// Language and country helpers
///
/// Target languages may be given as ISO 639-1 (2-letter) code, ISO 639-2
/// (3-letter, terminological or bibliographic) code or English name. They are
/// resolved once, before any file is touched, into the code used for output
/// file names and the English name used in the persona prompt.

// ISO 639-2/B codes that differ from their ISO 639-2/T counterpart
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("dut", "nld"),
    ("fre", "fra"),
    ("geo", "kat"),
    ("ger", "deu"),
    ("gre", "ell"),
    ("ice", "isl"),
    ("mac", "mkd"),
    ("may", "msa"),
    ("per", "fas"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Look up a language by ISO 639-1, 639-2/T or 639-2/B code
pub fn language_from_code(code: &str) -> Option<Language> {
    let code = code.trim().to_lowercase();

    match code.len() {
        2 => Language::from_639_1(&code),
        3 => {
            let terminological = BIBLIOGRAPHIC_CODES.iter()
                .find(|(bibliographic, _)| *bibliographic == code)
                .map(|(_, terminological)| *terminological)
                .unwrap_or(code.as_str());
            Language::from_639_3(terminological)
        }
        _ => None,
    }
}

/// Look up a language by its English name, ignoring case
pub fn language_from_name(name: &str) -> Option<Language> {
    let lowered = name.trim().to_lowercase();
    let mut chars = lowered.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => return None,
    };

    Language::from_name(&capitalized)
}

/// Shortest code for a language: ISO 639-1 where one exists, ISO 639-2/T otherwise
pub fn preferred_code(language: Language) -> String {
    language.to_639_1()
        .unwrap_or_else(|| language.to_639_3())
        .to_string()
}

/// Resolve a language given as ISO 639 code or English name.
///
/// # Returns
/// * `(code, name)` - Preferred code and English name
pub fn resolve_language(input: &str) -> Result<(String, String), ConfigurationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ConfigurationError::invalid("target_language", "a target language is required"));
    }

    let language = language_from_code(trimmed)
        .or_else(|| language_from_name(trimmed))
        .ok_or_else(|| ConfigurationError::invalid("target_language", format!("unknown language: {}", input)))?;

    Ok((preferred_code(language), language.to_name().to_string()))
}

/// Check that a country is given as a two-letter ISO 3166-1 code
pub fn validate_country_code(code: &str) -> Result<String, ConfigurationError> {
    let trimmed = code.trim();
    if trimmed.len() != 2 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ConfigurationError::invalid(
            "country_code",
            format!("'{}' is not a two-letter ISO 3166-1 code", code),
        ));
    }
    Ok(trimmed.to_lowercase())
}
