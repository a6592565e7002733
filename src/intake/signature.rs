//! Slack-style HMAC-SHA256 request signature verification (§4.1).

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify `signature` (`v0=<hex>`) against `body` signed with `secret`,
/// given the request's claimed `timestamp` header. Rejects stale requests
/// outside `freshness_window_secs` of `now` to block replay.
pub fn verify_signature(
    body: &[u8],
    timestamp: &str,
    signature: &str,
    secret: &str,
    now: f64,
    freshness_window_secs: i64,
) -> bool {
    if timestamp.is_empty() || signature.is_empty() {
        return false;
    }
    let Ok(ts_int) = timestamp.parse::<i64>() else {
        return false;
    };
    if (now - ts_int as f64).abs() > freshness_window_secs as f64 {
        return false;
    }

    let mut base = Vec::with_capacity(body.len() + timestamp.len() + 4);
    base.extend_from_slice(b"v0:");
    base.extend_from_slice(timestamp.as_bytes());
    base.push(b':');
    base.extend_from_slice(body);

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(&base);

    let Some(hex_sig) = signature.strip_prefix("v0=") else {
        return false;
    };
    let Ok(expected_bytes) = hex::decode(hex_sig) else {
        return false;
    };
    mac.verify_slice(&expected_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmac::Mac;

    fn sign(secret: &str, timestamp: &str, body: &[u8]) -> String {
        let mut base = format!("v0:{timestamp}:").into_bytes();
        base.extend_from_slice(body);
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(&base);
        format!("v0={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_signature_within_freshness_window_passes() {
        let secret = "shh";
        let body = br#"{"type":"event_callback"}"#;
        let ts = "1000";
        let sig = sign(secret, ts, body);
        assert!(verify_signature(body, ts, &sig, secret, 1000.0, 300));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let secret = "shh";
        let body = b"{}";
        let ts = "1000";
        let sig = sign(secret, ts, body);
        assert!(!verify_signature(body, ts, &sig, secret, 2000.0, 300));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let secret = "shh";
        let ts = "1000";
        let sig = sign(secret, ts, b"original");
        assert!(!verify_signature(b"tampered", ts, &sig, secret, 1000.0, 300));
    }

    #[test]
    fn missing_v0_prefix_is_rejected() {
        let secret = "shh";
        let ts = "1000";
        assert!(!verify_signature(b"{}", ts, "deadbeef", secret, 1000.0, 300));
    }
}
