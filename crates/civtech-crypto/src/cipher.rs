//! Attribute cipher: numeric attribute <-> opaque token.
//!
//! **The [`PlaceholderCipher`] provides no confidentiality.** A token is
//! the `FHE-` scheme tag followed by the base64 of the number's decimal
//! text, so anyone holding a token can read the value. It exists to pin
//! down the [`AttributeCipher`] interface so a real homomorphic or
//! commit/reveal scheme can replace it without touching callers.
//!
//! # Round trip
//!
//! `decrypt(encrypt(x)) == x` holds exactly for every [`Decimal`],
//! integers and fractions alike. The precision bound is the one of
//! [`Decimal`] itself: 96-bit mantissa, at most 28 fractional digits.
//!
//! # Legacy tokens
//!
//! Records written before the scheme tag existed hold the bare decimal
//! text (`"250"`, `"1.5e2"`). [`PlaceholderCipher::decrypt`] parses those
//! directly.

use std::str::FromStr;

use civtech_types::EncryptedValue;
use rust_decimal::Decimal;

use crate::base64;
use crate::error::CipherError;

/// Prefix marking tokens produced by the placeholder scheme.
pub const SCHEME_TAG: &str = "FHE-";

/// Encrypts and decrypts numeric attributes.
///
/// Implementations must satisfy `decrypt(&encrypt(x)) == Ok(x)`.
pub trait AttributeCipher: Send + Sync {
    /// Turn a value into an opaque token.
    fn encrypt(&self, value: Decimal) -> EncryptedValue;

    /// Recover the value behind a token.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Malformed`] if the token cannot be read.
    fn decrypt(&self, token: &EncryptedValue) -> Result<Decimal, CipherError>;
}

/// Reversible, keyless stand-in scheme. Offers NO confidentiality.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderCipher;

impl PlaceholderCipher {
    /// Create the placeholder cipher.
    pub const fn new() -> Self {
        Self
    }
}

impl AttributeCipher for PlaceholderCipher {
    fn encrypt(&self, value: Decimal) -> EncryptedValue {
        EncryptedValue(format!(
            "{SCHEME_TAG}{}",
            base64::encode(value.to_string().as_bytes())
        ))
    }

    fn decrypt(&self, token: &EncryptedValue) -> Result<Decimal, CipherError> {
        let raw = token.as_str();
        let malformed = |reason: String| CipherError::Malformed {
            token: raw.to_owned(),
            reason,
        };

        match raw.strip_prefix(SCHEME_TAG) {
            Some(payload) => {
                let bytes = base64::decode(payload).map_err(malformed)?;
                let text = String::from_utf8(bytes)
                    .map_err(|e| malformed(format!("payload is not UTF-8: {e}")))?;
                parse_number(&text).map_err(malformed)
            }
            None => parse_number(raw).map_err(malformed),
        }
    }
}

/// Parse plain or scientific decimal text.
fn parse_number(text: &str) -> Result<Decimal, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(String::from("empty number"));
    }
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|e| format!("not a number: {e}"))
}
