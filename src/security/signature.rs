//! Slack request signing (`X-Slack-Signature`, scheme `v0`).
//!
//! The signature is an HMAC-SHA256 over `v0:<timestamp>:<raw body>` keyed with
//! the app's signing secret, hex-encoded and prefixed with `v0=`. It must be
//! checked against the raw body before any JSON decoding happens.
//! See: <https://api.slack.com/authentication/verifying-requests-from-slack>

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::constant_time_eq;

/// Maximum allowed distance (seconds) between the request timestamp and now.
pub const FRESHNESS_WINDOW_SECS: u64 = 300;

/// Signature version prefix used by Slack.
const SIGNATURE_VERSION: &str = "v0";

/// Compute the `v0=<hex>` signature Slack would send for this body and timestamp.
pub fn sign_request(secret: &str, timestamp: &str, body: &str) -> Option<String> {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return None;
    };
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body.as_bytes());
    Some(format!(
        "{SIGNATURE_VERSION}={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Verify a Slack request signature against the current wall clock.
/// Returns true only if the timestamp is fresh and the signature matches.
pub fn verify_slack_signature(body: &str, timestamp: &str, signature: &str, secret: &str) -> bool {
    verify_slack_signature_at(body, timestamp, signature, secret, chrono::Utc::now().timestamp())
}

/// Same as [`verify_slack_signature`] with an explicit `now` (Unix seconds).
pub fn verify_slack_signature_at(
    body: &str,
    timestamp: &str,
    signature: &str,
    secret: &str,
    now: i64,
) -> bool {
    // Non-numeric timestamps are a plain verification failure.
    let Ok(request_time) = timestamp.parse::<i64>() else {
        return false;
    };

    // Stale or future-dated requests are rejected before any HMAC work.
    if now.abs_diff(request_time) > FRESHNESS_WINDOW_SECS {
        return false;
    }

    let Some(expected) = sign_request(secret, timestamp, body) else {
        return false;
    };
    constant_time_eq(&expected, signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    /// Generate a random hex secret at runtime to avoid hard-coded cryptographic values.
    fn generate_test_secret() -> String {
        let bytes: [u8; 32] = rand::random();
        hex::encode(bytes)
    }

    fn sign(secret: &str, timestamp: &str, body: &str) -> String {
        sign_request(secret, timestamp, body).expect("any key length is accepted")
    }

    fn flip_bit(s: &str, byte: usize, bit: u8) -> String {
        let mut bytes = s.as_bytes().to_vec();
        bytes[byte] ^= 1 << bit;
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[test]
    fn signature_has_v0_prefix_and_sha256_hex() {
        let sig = sign("secret", "1531420618", "token=xyz");
        let hex_part = sig.strip_prefix("v0=").expect("v0 prefix");
        assert_eq!(hex_part.len(), 64);
        assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn empty_secret_still_signs_and_verifies() {
        let ts = NOW.to_string();
        let sig = sign_request("", &ts, "{}").expect("empty key is a valid HMAC key");
        assert!(verify_slack_signature_at("{}", &ts, &sig, "", NOW));
        assert!(!verify_slack_signature_at("{}", &ts, &sig, "other", NOW));
    }

    #[test]
    fn signature_matches_slack_documentation_example() {
        let body = "token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J&team_domain=testteamnow&channel_id=G8PSS9T3V&channel_name=foobar&user_id=U2CERLKJA&user_name=roadrunner&command=%2Fwebhook-collect&text=&response_url=https%3A%2F%2Fhooks.slack.com%2Fcommands%2FT1DC2JH3J%2F397700885554%2F96rGlfmibIGlgcZRskXaIFfN&trigger_id=398738663015.47445629121.803a0bc887a14d10d2c447fce8b6703c";
        let sig = sign("8f742231b10e8888abcd99yyyzzz85a5", "1531420618", body);
        assert_eq!(
            sig,
            "v0=a2114d57b48eac39b9ad189dd8316235a7b4a8d21a10bd27519666489c69b503"
        );
    }

    #[test]
    fn valid_signature_within_window_passes() {
        let secret = generate_test_secret();
        let body = r#"{"type":"url_verification","challenge":"abc123"}"#;
        let ts = NOW.to_string();
        let sig = sign(&secret, &ts, body);

        assert!(verify_slack_signature_at(body, &ts, &sig, &secret, NOW));
        assert!(verify_slack_signature_at(body, &ts, &sig, &secret, NOW + 300));
        assert!(verify_slack_signature_at(body, &ts, &sig, &secret, NOW - 300));
    }

    #[test]
    fn signature_against_real_clock_passes() {
        let secret = generate_test_secret();
        let body = "{}";
        let ts = chrono::Utc::now().timestamp().to_string();
        let sig = sign(&secret, &ts, body);
        assert!(verify_slack_signature(body, &ts, &sig, &secret));
    }

    #[test]
    fn stale_timestamp_fails_even_with_correct_signature() {
        let secret = generate_test_secret();
        let body = r#"{"type":"event_callback"}"#;
        let stale = (NOW - 600).to_string();
        let sig = sign(&secret, &stale, body);
        assert!(!verify_slack_signature_at(body, &stale, &sig, &secret, NOW));

        let edge = (NOW - 301).to_string();
        let sig = sign(&secret, &edge, body);
        assert!(!verify_slack_signature_at(body, &edge, &sig, &secret, NOW));
    }

    #[test]
    fn future_timestamp_outside_window_fails() {
        let secret = generate_test_secret();
        let future = (NOW + 301).to_string();
        let sig = sign(&secret, &future, "{}");
        assert!(!verify_slack_signature_at("{}", &future, &sig, &secret, NOW));
    }

    #[test]
    fn non_numeric_timestamp_fails() {
        let secret = generate_test_secret();
        let sig = sign(&secret, "abc", "{}");
        assert!(!verify_slack_signature_at("{}", "abc", &sig, &secret, NOW));
        assert!(!verify_slack_signature_at("{}", "", "v0=00", &secret, NOW));
    }

    #[test]
    fn extreme_timestamp_does_not_overflow() {
        let min = i64::MIN.to_string();
        assert!(!verify_slack_signature_at("{}", &min, "v0=00", "s", NOW));
        let max = i64::MAX.to_string();
        assert!(!verify_slack_signature_at("{}", &max, "v0=00", "s", NOW));
    }

    #[test]
    fn wrong_secret_fails() {
        let body = "{}";
        let ts = NOW.to_string();
        let sig = sign(&generate_test_secret(), &ts, body);
        assert!(!verify_slack_signature_at(body, &ts, &sig, &generate_test_secret(), NOW));
    }

    #[test]
    fn single_bit_mutation_of_body_fails() {
        let secret = generate_test_secret();
        let body = r#"{"event":{"text":"hello","channel":"C1"}}"#;
        let ts = NOW.to_string();
        let sig = sign(&secret, &ts, body);

        for byte in 0..body.len() {
            let mutated = flip_bit(body, byte, 0);
            assert!(
                !verify_slack_signature_at(&mutated, &ts, &sig, &secret, NOW),
                "mutation at byte {byte} should fail"
            );
        }
    }

    #[test]
    fn single_bit_mutation_of_signature_fails() {
        let secret = generate_test_secret();
        let body = "{}";
        let ts = NOW.to_string();
        let sig = sign(&secret, &ts, body);

        for byte in 0..sig.len() {
            for bit in 0..7 {
                let mutated = flip_bit(&sig, byte, bit);
                assert!(!verify_slack_signature_at(body, &ts, &mutated, &secret, NOW));
            }
        }
    }

    #[test]
    fn single_bit_mutation_of_timestamp_fails() {
        let secret = generate_test_secret();
        let body = "{}";
        let ts = NOW.to_string();
        let sig = sign(&secret, &ts, body);

        for byte in 0..ts.len() {
            let mutated = flip_bit(&ts, byte, 0);
            assert!(!verify_slack_signature_at(body, &mutated, &sig, &secret, NOW));
        }
    }

    #[test]
    fn uppercase_hex_signature_is_rejected() {
        let secret = generate_test_secret();
        let ts = NOW.to_string();
        let sig = sign(&secret, &ts, "{}");
        let upper = format!("v0={}", sig[3..].to_ascii_uppercase());
        assert!(!verify_slack_signature_at("{}", &ts, &upper, &secret, NOW));
    }

    #[test]
    fn empty_and_unprefixed_signatures_fail() {
        let secret = generate_test_secret();
        let ts = NOW.to_string();
        let sig = sign(&secret, &ts, "{}");
        assert!(!verify_slack_signature_at("{}", &ts, "", &secret, NOW));
        assert!(!verify_slack_signature_at("{}", &ts, &sig[3..], &secret, NOW));
    }
}
