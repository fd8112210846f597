//! Request authentication primitives.

pub mod signature;

pub use signature::{sign_request, verify_slack_signature, verify_slack_signature_at};

/// Compare two strings without short-circuiting on the first differing byte.
///
/// Length is not secret: strings of different length return early.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
