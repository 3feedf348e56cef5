//! `$9$` secret encoding.
//!
//! Junos stores authentication keys and similar secrets in a reversible
//! obfuscated form: `$9$`, a salt character, salt-dependent padding, then
//! each byte of the plaintext spread over a group of characters whose
//! distances in a 65-character alphabet encode the byte.
//!
//! The builder encodes secrets before quoting them so plaintext never
//! reaches the device or a dry-run artifact; the reconstructor decodes them
//! on read. A value that fails to decode is an error, never an empty secret.

use once_cell::sync::Lazy;
use rand::Rng;
use thiserror::Error;

/// Marker that starts every encoded secret.
pub const SECRET_MAGIC: &str = "$9$";

/// The alphabet, split in families; the family of the salt character
/// decides how many padding characters follow it.
const FAMILIES: [&str; 4] = [
    "QzF3n6/9CAtpu0O",
    "B1IREhcSyrleKvMW8LXx",
    "7N-dVbwsY2g4oaJZGUDj",
    "iHkq.mPf5T",
];

/// Per-position multipliers; byte `n` of the plaintext uses
/// `ENCODING[n % 7]` and takes one character per multiplier.
const ENCODING: [&[u32]; 7] = [
    &[1, 4, 32],
    &[1, 16, 32],
    &[1, 8, 32],
    &[1, 64],
    &[1, 32],
    &[1, 4, 16, 128],
    &[1, 32, 64],
];

static ALPHABET: Lazy<Vec<char>> = Lazy::new(|| FAMILIES.concat().chars().collect());

/// Errors raised while decoding or encoding a secret.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretError {
    /// The value does not start with `$9$`.
    #[error("value does not start with '$9$'")]
    MissingMagic,

    /// A character outside the alphabet was found.
    #[error("character '{0}' is not part of the secret alphabet")]
    UnknownCharacter(char),

    /// The value ends in the middle of the salt padding or a byte group.
    #[error("value is truncated")]
    Truncated,

    /// Two consecutive characters are identical, which no encoder produces.
    #[error("invalid character distance at position {0}")]
    InvalidGap(usize),

    /// The decoded bytes are not UTF-8.
    #[error("decoded value is not valid UTF-8")]
    NotUtf8,

    /// The salt padding does not have the length the salt requires.
    #[error("salt '{salt}' requires {expected} padding characters, got {actual}")]
    PaddingLength {
        /// The salt character.
        salt: char,
        /// Required padding length.
        expected: usize,
        /// Provided padding length.
        actual: usize,
    },
}

fn position(c: char) -> Result<usize, SecretError> {
    ALPHABET
        .iter()
        .position(|&a| a == c)
        .ok_or(SecretError::UnknownCharacter(c))
}

fn padding_len(salt: char) -> Result<usize, SecretError> {
    FAMILIES
        .iter()
        .position(|family| family.contains(salt))
        .map(|idx| 3 - idx)
        .ok_or(SecretError::UnknownCharacter(salt))
}

/// Returns true if `value` looks like an encoded secret.
pub fn is_encoded(value: &str) -> bool {
    value.starts_with(SECRET_MAGIC)
}

/// Decodes a `$9$` secret into its plaintext.
pub fn decode_secret(encoded: &str) -> Result<String, SecretError> {
    let body = encoded
        .strip_prefix(SECRET_MAGIC)
        .ok_or(SecretError::MissingMagic)?;
    let chars: Vec<char> = body.chars().collect();

    let salt = *chars.first().ok_or(SecretError::Truncated)?;
    let start = 1 + padding_len(salt)?;
    if chars.len() < start {
        return Err(SecretError::Truncated);
    }

    let alphabet_len = ALPHABET.len();
    let mut prev = position(salt)?;
    let mut idx = start;
    let mut bytes = Vec::new();

    while idx < chars.len() {
        let decode = ENCODING[bytes.len() % ENCODING.len()];
        if idx + decode.len() > chars.len() {
            return Err(SecretError::Truncated);
        }

        let mut value: u32 = 0;
        for (offset, multiplier) in decode.iter().enumerate() {
            let current = position(chars[idx + offset])?;
            let distance = (current + alphabet_len - prev) % alphabet_len;
            let gap = distance
                .checked_sub(1)
                .ok_or(SecretError::InvalidGap(idx + offset))?;
            value += gap as u32 * multiplier;
            prev = current;
        }
        bytes.push((value % 256) as u8);
        idx += decode.len();
    }

    String::from_utf8(bytes).map_err(|_| SecretError::NotUtf8)
}

/// Encodes `plain` with a random salt and padding.
pub fn encode_secret(plain: &str) -> String {
    let mut rng = rand::thread_rng();
    let salt_idx = rng.gen_range(0..ALPHABET.len());
    let pad_len = padding_len(ALPHABET[salt_idx]).unwrap_or(0);
    let padding: String = (0..pad_len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())])
        .collect();
    encode_raw(plain, salt_idx, &padding)
}

/// Encodes `plain` with a caller-chosen salt and padding.
///
/// The output is deterministic, which makes it suitable for fixtures.
pub fn encode_secret_with_salt(
    plain: &str,
    salt: char,
    padding: &str,
) -> Result<String, SecretError> {
    let salt_idx = position(salt)?;
    let expected = padding_len(salt)?;
    let actual = padding.chars().count();
    if actual != expected {
        return Err(SecretError::PaddingLength {
            salt,
            expected,
            actual,
        });
    }
    for c in padding.chars() {
        position(c)?;
    }
    Ok(encode_raw(plain, salt_idx, padding))
}

fn encode_raw(plain: &str, salt_idx: usize, padding: &str) -> String {
    let alphabet_len = ALPHABET.len();
    let mut encoded = String::from(SECRET_MAGIC);
    encoded.push(ALPHABET[salt_idx]);
    encoded.push_str(padding);

    let mut prev = salt_idx;
    for (pos, byte) in plain.bytes().enumerate() {
        let encode = ENCODING[pos % ENCODING.len()];
        let mut remaining = u32::from(byte);
        let mut gaps = vec![0u32; encode.len()];
        for (slot, multiplier) in encode.iter().enumerate().rev() {
            gaps[slot] = remaining / multiplier;
            remaining %= multiplier;
        }
        for gap in gaps {
            prev = (prev + gap as usize + 1) % alphabet_len;
            encoded.push(ALPHABET[prev]);
        }
    }

    encoded
}
