//! Translation between ASN.1 DER ECDSA signatures and the `r|s` hex wire format.
//!
//! Outbound signatures are rendered as `hex(r) + "|" + hex(s)` with minimal
//! hex digits. Signatures produced by the service carry no delimiter: `r`
//! occupies the first 64 hex characters and `s` the remainder. Both shapes are
//! accepted by [`decode_wire`].
//!
//! Nothing outside this module handles raw ASN.1.

use error_stack::Report;
use k256::ecdsa::Signature;
use k256::FieldBytes;
use num_bigint::{BigInt, BigUint, Sign};

use crate::error::AuthError;

/// Delimiter placed between `r` and `s` on encode.
pub const WIRE_DELIMITER: char = '|';

/// Width of the `r` window in undelimited wire signatures.
pub const FIXED_R_HEX_LEN: usize = 64;

const SCALAR_BYTES: usize = 32;

/// Renders `(r, s)` as lowercase hex joined by `|`.
///
/// # Errors
///
/// Returns [`AuthError::Encoding`] if either component is negative.
pub fn encode(r: &BigInt, s: &BigInt) -> Result<String, Report<AuthError>> {
    for (name, value) in [("r", r), ("s", s)] {
        if value.sign() == Sign::Minus {
            return Err(Report::new(AuthError::Encoding {
                message: format!("signature component {name} is negative"),
            }));
        }
    }

    Ok(format!(
        "{}{}{}",
        r.to_str_radix(16),
        WIRE_DELIMITER,
        s.to_str_radix(16)
    ))
}

/// Parses a DER `SEQUENCE { INTEGER r, INTEGER s }`.
///
/// # Errors
///
/// Returns [`AuthError::MalformedSignature`] if the bytes are not a
/// two-integer DER sequence holding valid secp256k1 scalars.
pub fn decode_der(signature_bytes: &[u8]) -> Result<(BigInt, BigInt), Report<AuthError>> {
    let signature = Signature::from_der(signature_bytes)
        .map_err(|e| malformed(format!("expected a DER sequence of two integers: {e}")))?;

    let (r, s) = signature.split_bytes();
    Ok((
        BigInt::from_bytes_be(Sign::Plus, &r),
        BigInt::from_bytes_be(Sign::Plus, &s),
    ))
}

/// Builds the DER `SEQUENCE { INTEGER r, INTEGER s }` for a signature pair.
///
/// # Errors
///
/// Returns [`AuthError::MalformedSignature`] if a component is negative, zero,
/// wider than 256 bits, or not below the curve order.
pub fn to_der(r: &BigInt, s: &BigInt) -> Result<Vec<u8>, Report<AuthError>> {
    let signature = Signature::from_scalars(scalar_bytes(r, "r")?, scalar_bytes(s, "s")?)
        .map_err(|e| malformed(format!("signature components are outside the curve order: {e}")))?;

    Ok(signature.to_der().as_bytes().to_vec())
}

/// Splits a wire signature into `(r, s)`.
///
/// A signature containing the delimiter is split on it. Without a delimiter
/// the first 64 hex characters are `r` and the rest is `s`.
///
/// # Errors
///
/// Returns [`AuthError::MalformedSignature`] if the string holds anything
/// other than lowercase hex, has a misplaced or repeated delimiter, or is too
/// short to hold the fixed-width `r` window plus an `s`.
pub fn decode_wire(sig: &str) -> Result<(BigInt, BigInt), Report<AuthError>> {
    let (r_hex, s_hex) = match sig.split_once(WIRE_DELIMITER) {
        Some((r_hex, s_hex)) => {
            if r_hex.is_empty() || s_hex.is_empty() || s_hex.contains(WIRE_DELIMITER) {
                return Err(malformed("delimiter at an unexpected position"));
            }
            (r_hex, s_hex)
        }
        None => {
            if sig.len() <= FIXED_R_HEX_LEN {
                return Err(malformed(format!(
                    "expected more than {FIXED_R_HEX_LEN} characters, got {}",
                    sig.len()
                )));
            }
            if !sig.is_ascii() {
                return Err(malformed("signature is not hex encoded"));
            }
            sig.split_at(FIXED_R_HEX_LEN)
        }
    };

    Ok((parse_hex(r_hex)?, parse_hex(s_hex)?))
}

fn parse_hex(component: &str) -> Result<BigInt, Report<AuthError>> {
    if !component
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return Err(malformed("signature is not lowercase hex"));
    }

    BigUint::parse_bytes(component.as_bytes(), 16)
        .map(BigInt::from)
        .ok_or_else(|| malformed("signature is not lowercase hex"))
}

fn scalar_bytes(value: &BigInt, name: &str) -> Result<FieldBytes, Report<AuthError>> {
    let (sign, bytes) = value.to_bytes_be();
    if sign == Sign::Minus || bytes.len() > SCALAR_BYTES {
        return Err(malformed(format!(
            "signature component {name} does not fit in {SCALAR_BYTES} bytes"
        )));
    }

    let mut padded = [0u8; SCALAR_BYTES];
    padded[SCALAR_BYTES - bytes.len()..].copy_from_slice(&bytes);
    Ok(padded.into())
}

fn malformed(message: impl Into<String>) -> Report<AuthError> {
    Report::new(AuthError::MalformedSignature {
        message: message.into(),
    })
}
