// Access-token expiry decoding
//
// Payload-only decode, no signature verification: the expiry claim gates
// rendering as a UX fast-path, while real authorization stays server-side on
// every call.

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Claims {
    exp: i64,
}

/// Decode the expiry instant encoded in a signed access token
pub fn decode_expiry(token: &str) -> Result<DateTime<Utc>> {
    let mut segments = token.split('.');
    let payload = match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(_header), Some(payload), Some(_signature), None) => payload,
        _ => anyhow::bail!("token is not a three-segment JWT"),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .context("Failed to decode token payload")?;

    let claims: Claims =
        serde_json::from_slice(&bytes).context("Failed to parse token claims")?;

    DateTime::from_timestamp(claims.exp, 0)
        .with_context(|| format!("Token expiry out of range: {}", claims.exp))
}

/// Forge an unsigned token carrying the given expiry
#[cfg(test)]
pub(crate) fn encode_for_testing(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, exp));
    format!("{}.{}.forged-signature", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_expiry() {
        let token = encode_for_testing(1_900_000_000);
        let exp = decode_expiry(&token).unwrap();
        assert_eq!(exp.timestamp(), 1_900_000_000);
    }

    #[test]
    fn test_decode_rejects_wrong_segment_count() {
        assert!(decode_expiry("only-one-segment").is_err());
        assert!(decode_expiry("two.segments").is_err());
        assert!(decode_expiry("a.b.c.d").is_err());
    }

    #[test]
    fn test_decode_rejects_invalid_payload() {
        // Valid base64, not JSON
        let garbage = URL_SAFE_NO_PAD.encode(b"not json at all");
        assert!(decode_expiry(&format!("h.{}.s", garbage)).is_err());

        // Valid JSON, no exp claim
        let no_exp = URL_SAFE_NO_PAD.encode(br#"{"sub": "ada"}"#);
        assert!(decode_expiry(&format!("h.{}.s", no_exp)).is_err());

        // Not base64 at all
        assert!(decode_expiry("h.!!!.s").is_err());
    }

    proptest! {
        // Arbitrary byte soup must fail cleanly, never panic
        #[test]
        fn test_decode_never_panics(token in "\\PC*") {
            let _ = decode_expiry(&token);
        }
    }
}
