//! Integer-string and byte encodings of field elements.
//!
//! Proof systems and JSON-RPC both speak big integers as strings: decimal
//! for snarkjs, `0x`-prefixed hex for the chain. Everything here accepts
//! either and always emits canonical decimal.

use ark_bn254::Fr;
use ark_ff::PrimeField;
use num_bigint::BigUint;
use num_traits::Num;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("empty integer string")]
    Empty,

    #[error("invalid integer string: {0:?}")]
    InvalidInteger(String),

    #[error("value {0} is not below the field modulus")]
    OutOfField(String),

    #[error("expected {expected} bytes, got {actual}")]
    ByteLength { expected: usize, actual: usize },
}

/// Parse a non-negative decimal or `0x` hex integer.
pub fn parse_integer(s: &str) -> Result<BigUint, EncodingError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(EncodingError::Empty);
    }

    let invalid = || EncodingError::InvalidInteger(s.to_string());

    let (digits, radix) = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => (hex, 16),
        None => (trimmed, 10),
    };

    let well_formed = !digits.is_empty()
        && digits.bytes().all(|b| match radix {
            16 => b.is_ascii_hexdigit(),
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return Err(invalid());
    }

    BigUint::from_str_radix(digits, radix).map_err(|_| invalid())
}

/// Canonical decimal form of an integer string (`"0x0a"` -> `"10"`).
pub fn normalize_integer_string(s: &str) -> Result<String, EncodingError> {
    Ok(parse_integer(s)?.to_str_radix(10))
}

/// Reduce-free conversion: values at or above the modulus are rejected.
pub fn field_from_biguint<F: PrimeField>(n: BigUint) -> Result<F, EncodingError> {
    let modulus: BigUint = F::MODULUS.into();
    if n >= modulus {
        return Err(EncodingError::OutOfField(n.to_str_radix(10)));
    }
    Ok(F::from(n))
}

/// Parse any prime-field element from a decimal or hex string.
pub fn field_from_str<F: PrimeField>(s: &str) -> Result<F, EncodingError> {
    field_from_biguint(parse_integer(s)?)
}

pub fn fr_from_str(s: &str) -> Result<Fr, EncodingError> {
    field_from_str(s)
}

pub fn field_to_decimal<F: PrimeField>(f: &F) -> String {
    let n: BigUint = (*f).into();
    n.to_str_radix(10)
}

pub fn fr_to_decimal(f: &Fr) -> String {
    field_to_decimal(f)
}

/// Interpret a 32-byte big-endian word as a field element.
pub fn fr_from_be_bytes(bytes: &[u8]) -> Result<Fr, EncodingError> {
    if bytes.len() != 32 {
        return Err(EncodingError::ByteLength {
            expected: 32,
            actual: bytes.len(),
        });
    }
    field_from_biguint(BigUint::from_bytes_be(bytes))
}

/// 32-byte big-endian word, as used by ABI encoding.
pub fn fr_to_be_bytes(f: &Fr) -> [u8; 32] {
    let n: BigUint = (*f).into();
    let bytes = n.to_bytes_be();
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    word
}
