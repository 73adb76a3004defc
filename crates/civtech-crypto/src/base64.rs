//! Minimal standard-alphabet base64, enough for attribute tokens.
//!
//! Encoding always pads. Decoding accepts padded or unpadded input and
//! ignores ASCII whitespace.

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Encode bytes as padded base64.
pub fn encode(input: &[u8]) -> String {
    let mut output = String::with_capacity(input.len().div_ceil(3).saturating_mul(4));

    for chunk in input.chunks(3) {
        let b0 = chunk.first().copied().unwrap_or(0);
        let b1 = chunk.get(1).copied().unwrap_or(0);
        let b2 = chunk.get(2).copied().unwrap_or(0);
        let triple = (u32::from(b0) << 16) | (u32::from(b1) << 8) | u32::from(b2);

        output.push(sextet(triple >> 18));
        output.push(sextet(triple >> 12));
        output.push(if chunk.len() > 1 { sextet(triple >> 6) } else { '=' });
        output.push(if chunk.len() > 2 { sextet(triple) } else { '=' });
    }

    output
}

/// Decode base64 text.
///
/// # Errors
///
/// Returns a description of the first invalid character.
pub fn decode(input: &str) -> Result<Vec<u8>, String> {
    let input = input.trim().trim_end_matches('=');
    let mut output = Vec::with_capacity(input.len().saturating_mul(3) / 4);
    let mut buf: u32 = 0;
    let mut bits: u32 = 0;

    for ch in input.chars() {
        if ch.is_ascii_whitespace() {
            continue;
        }
        let val = value_of(ch).ok_or_else(|| format!("invalid base64 character: {ch:?}"))?;
        buf = (buf << 6) | val;
        bits = bits.saturating_add(6);
        if bits >= 8 {
            bits = bits.saturating_sub(8);
            output.extend(u8::try_from((buf >> bits) & 0xFF).ok());
        }
    }

    Ok(output)
}

/// The alphabet character for the low six bits of `v`.
fn sextet(v: u32) -> char {
    usize::try_from(v & 0x3F)
        .ok()
        .and_then(|i| ALPHABET.get(i))
        .map_or('A', |b| char::from(*b))
}

/// The six-bit value of an alphabet character.
fn value_of(ch: char) -> Option<u32> {
    let byte = u8::try_from(ch).ok()?;
    ALPHABET
        .iter()
        .position(|b| *b == byte)
        .and_then(|i| u32::try_from(i).ok())
}
