// Input rules shared by signup, reset, directory updates and the import pipeline.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Signup and profile updates require a TLD of at least two characters.
    static ref ACCOUNT_EMAIL: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]{2,}$").expect("valid account email regex");

    /// Imported rows use the looser spreadsheet rule.
    static ref IMPORT_EMAIL: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid import email regex");
}

pub const PASSWORD_POLICY_MESSAGE: &str = "Password must have at least 6 characters and contain at least one number, one lowercase and one uppercase letter.";

pub fn is_valid_email(email: &str) -> bool {
    ACCOUNT_EMAIL.is_match(email)
}

pub fn is_valid_import_email(email: &str) -> bool {
    IMPORT_EMAIL.is_match(email)
}

/// At least 6 characters with one digit, one lowercase and one uppercase letter.
pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= 6
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Upper-cases the first letter of every word, leaving the rest untouched.
/// "jean-pierre de la fontaine" -> "Jean-Pierre De La Fontaine".
pub fn capitalize_words(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;

    for c in value.chars() {
        if c.is_alphanumeric() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }

    out
}
