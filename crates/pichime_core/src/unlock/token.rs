//! Unlock token generation, validation and presentation.

use once_cell::sync::Lazy;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use std::fmt::{Debug, Display, Formatter};

/// Shortest token ever issued.
pub const MIN_TOKEN_LEN: usize = 32;
/// Longest token ever issued or accepted.
pub const MAX_TOKEN_LEN: usize = 256;
/// Characters per line on the operator display.
pub const DISPLAY_LINE_CHARS: usize = 16;

static TOKEN_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{32,256}$").expect("token regex must compile"));

/// Opaque URL-path-safe unlock token.
#[derive(Clone, PartialEq, Eq)]
pub struct UnlockToken(String);

impl UnlockToken {
    /// Draws a fresh alphanumeric token, clamped into
    /// `MIN_TOKEN_LEN..=MAX_TOKEN_LEN`.
    pub fn generate(len: usize) -> Self {
        let len = len.clamp(MIN_TOKEN_LEN, MAX_TOKEN_LEN);
        let value = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect();
        Self(value)
    }

    /// Wraps a stored value, rejecting anything not shaped like a token.
    pub fn from_stored(value: &str) -> Option<Self> {
        is_well_formed(value).then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison over the candidate.
    pub fn matches(&self, candidate: &str) -> bool {
        let expected = self.0.as_bytes();
        let candidate = candidate.as_bytes();
        if expected.len() != candidate.len() {
            return false;
        }
        expected
            .iter()
            .zip(candidate)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
    }

    /// Splits the token into fixed-width lines for a character display.
    pub fn display_lines(&self) -> Vec<String> {
        self.0
            .as_bytes()
            .chunks(DISPLAY_LINE_CHARS)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect()
    }
}

impl Display for UnlockToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// Keeps tokens out of `{:?}` log output.
impl Debug for UnlockToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "UnlockToken(<{} chars>)", self.0.len())
    }
}

pub fn is_well_formed(candidate: &str) -> bool {
    TOKEN_SHAPE.is_match(candidate)
}

/// Formats the operator-facing unlock link `<base>/unlock/<token>`.
pub fn unlock_url(base_url: &str, token: &UnlockToken) -> String {
    format!("{}/unlock/{}", base_url.trim_end_matches('/'), token)
}

#[cfg(test)]
mod tests {
    use super::{is_well_formed, unlock_url, UnlockToken, MAX_TOKEN_LEN, MIN_TOKEN_LEN};

    #[test]
    fn generated_tokens_are_alphanumeric_and_never_short() {
        let token = UnlockToken::generate(8);
        assert_eq!(token.as_str().len(), MIN_TOKEN_LEN);
        assert!(token.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(is_well_formed(token.as_str()));

        assert_eq!(UnlockToken::generate(48).as_str().len(), 48);
        assert_eq!(UnlockToken::generate(10_000).as_str().len(), MAX_TOKEN_LEN);
    }

    #[test]
    fn consecutive_tokens_differ() {
        assert_ne!(UnlockToken::generate(32), UnlockToken::generate(32));
    }

    #[test]
    fn malformed_candidates_are_not_well_formed() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("short"));
        assert!(!is_well_formed(&"a".repeat(31)));
        assert!(!is_well_formed(&format!("{}/", "a".repeat(32))));
        assert!(!is_well_formed(&format!("{}é", "a".repeat(32))));
        assert!(is_well_formed(&"a".repeat(32)));
    }

    #[test]
    fn matches_requires_exact_value() {
        let token = UnlockToken::from_stored(&"Ab1".repeat(11)).unwrap();
        assert!(token.matches(&"Ab1".repeat(11)));
        assert!(!token.matches(&"ab1".repeat(11)));
        assert!(!token.matches(&"Ab1".repeat(10)));
    }

    #[test]
    fn display_lines_are_sixteen_chars_wide() {
        let token = UnlockToken::from_stored(&"x".repeat(40)).unwrap();
        let lines = token.display_lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), 16);
        assert_eq!(lines[2].len(), 8);
    }

    #[test]
    fn unlock_url_joins_without_double_slash() {
        let token = UnlockToken::from_stored(&"k".repeat(32)).unwrap();
        assert_eq!(
            unlock_url("http://pichime.local:8080/", &token),
            format!("http://pichime.local:8080/unlock/{}", "k".repeat(32))
        );
    }

    #[test]
    fn debug_output_hides_token_value() {
        let token = UnlockToken::from_stored(&"s".repeat(32)).unwrap();
        assert!(!format!("{token:?}").contains("sss"));
    }
}
