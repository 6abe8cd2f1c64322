//! Canonical identifiers derived from source file names

use heck::ToUpperCamelCase;
use std::path::Path;

/// Template name for a source file: the file stem in UpperCamelCase.
///
/// `emails/welcome_email.html` becomes `WelcomeEmail`.
pub fn template_name_from_file(path: &Path) -> String {
    file_stem(path).to_upper_camel_case()
}

/// Locale code for a catalog file: the file stem lower-cased.
pub fn locale_code_from_file(path: &Path) -> String {
    normalize_locale(&file_stem(path))
}

/// Locale codes are matched case-insensitively.
pub fn normalize_locale(code: &str) -> String {
    code.trim().to_lowercase()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
