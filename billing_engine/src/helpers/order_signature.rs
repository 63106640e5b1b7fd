//! # Order request signature format
//!
//! A project may sign its order requests so that nobody can tamper with the amount or the callback URLs between the
//! merchant's checkout page and the gateway. The signature is a SHA-256 digest over every raw request parameter and
//! the project's secret key.
//!
//! ## Message format
//!
//! ```text
//!    {key_1}={value_1}|{key_2}={value_2}|...|{key_n}={value_n}|{secret}
//! ```
//!
//! where
//!   * the keys are every raw request parameter except `signature` itself, sorted lexicographically (byte order);
//!   * values are used verbatim, with no escaping;
//!   * `secret` is the project secret key.
//!
//! The digest is sent as lower-case hex. Verification accepts either case and compares in constant time.
use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

/// The request parameter that carries the signature. It is never part of the signed message.
pub const SIGNATURE_PARAM: &str = "signature";

const GLUE: &str = "|";

/// Computes the hex signature over `params` (minus [`SIGNATURE_PARAM`]) and `secret`.
pub fn order_signature(params: &BTreeMap<String, String>, secret: &str) -> String {
    let mut message = params
        .iter()
        .filter(|(k, _)| k.as_str() != SIGNATURE_PARAM)
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(GLUE);
    message.push_str(GLUE);
    message.push_str(secret);
    hex::encode(Sha256::digest(message.as_bytes()))
}

pub fn verify_order_signature(params: &BTreeMap<String, String>, secret: &str, signature: &str) -> bool {
    let expected = order_signature(params, secret);
    constant_time_eq(expected.as_bytes(), signature.trim().to_ascii_lowercase().as_bytes())
}

/// Byte comparison whose running time depends only on the lengths of the inputs.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
