//! Anonymous visitor identifiers.
//!
//! Format: `anon-<unix millis>-<9 base36 chars>`. Uniqueness rests on the
//! timestamp plus the random suffix; the ids only key personalization, so
//! no stronger guarantee is needed.

use rand::Rng;

const PREFIX: &str = "anon-";
const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 9;

/// Generate a fresh anonymous identifier.
pub fn generate_anonymous_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("{PREFIX}{}-{suffix}", chrono::Utc::now().timestamp_millis())
}

/// Whether `value` has the shape of a generated anonymous identifier.
pub fn is_anonymous_id(value: &str) -> bool {
    let Some(rest) = value.strip_prefix(PREFIX) else {
        return false;
    };
    let Some((millis, suffix)) = rest.split_once('-') else {
        return false;
    };
    !millis.is_empty()
        && millis.bytes().all(|b| b.is_ascii_digit())
        && !suffix.is_empty()
        && suffix.bytes().all(|b| b.is_ascii_alphanumeric())
}
