//! String helpers for deriving Azure resource names.

use rand::seq::SliceRandom;

const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Strip every character that is not an ASCII letter or digit.
#[must_use]
pub fn alphanumeric(input: &str) -> String {
    input.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Replace spaces, underscores, hyphens and dots with `separator`.
#[must_use]
pub fn replace_separators(input: &str, separator: &str) -> String {
    input.replace([' ', '_', '-', '.'], separator)
}

/// Lowercase an SRE name and replace anything outside `[a-z0-9]` with `-`.
#[must_use]
pub fn sanitise_sre_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// Shorten the longest tokens one character at a time until the combined
/// length is at most `max_length`.
///
/// `truncate_tokens(&["the", "quick", "fox"], 6)` gives `["th", "qu", "fo"]`.
#[must_use]
pub fn truncate_tokens(tokens: &[&str], max_length: usize) -> Vec<String> {
    let mut output: Vec<String> = tokens.iter().map(|t| (*t).to_string()).collect();
    loop {
        let total: usize = output.iter().map(String::len).sum();
        if total <= max_length {
            return output;
        }
        let longest = output.iter().map(String::len).max().unwrap_or(0);
        if let Some(token) = output.iter_mut().find(|t| t.len() == longest) {
            token.pop();
        }
    }
}

/// Shortest password that can hold one character of each required class.
pub const MIN_PASSWORD_LENGTH: usize = 3;

/// Generate a random alphanumeric password containing at least one
/// lowercase letter, one uppercase letter and one digit. Lengths below
/// [`MIN_PASSWORD_LENGTH`] are raised to it.
#[must_use]
pub fn password(length: usize) -> String {
    let length = length.max(MIN_PASSWORD_LENGTH);
    let mut rng = rand::thread_rng();
    loop {
        let candidate: String = (0..length)
            .map(|_| char::from(*ALPHANUMERIC.choose(&mut rng).unwrap_or(&b'a')))
            .collect();
        if candidate.chars().any(|c| c.is_ascii_lowercase())
            && candidate.chars().any(|c| c.is_ascii_uppercase())
            && candidate.chars().any(|c| c.is_ascii_digit())
        {
            return candidate;
        }
    }
}
