//! Webhook signature verification (C3, §4.3).
//!
//! Each provider signs differently; `verify` dispatches to the matching
//! algorithm and compares with `Mac::verify_slice`, which is constant-time.
//! No algorithm ever returns early on a byte mismatch.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::WebhookError;
use crate::model::Provider;
use crate::util::hex;

type HmacSha256 = Hmac<Sha256>;

/// Verify a provider's webhook signature against the raw request body.
///
/// `signature_header` is the exact header value as received (including any
/// `sha256=` prefix Intercom sends). `full_url` is only consulted for
/// Salesforce, which signs `url ∥ body`.
pub fn verify(
    provider: Provider,
    secret: &str,
    signature_header: &str,
    body: &[u8],
    full_url: &str,
) -> Result<(), WebhookError> {
    if secret.is_empty() {
        return Err(WebhookError::MissingSecret);
    }
    if signature_header.is_empty() {
        return Err(WebhookError::MissingSignature);
    }

    match provider {
        Provider::Gorgias => verify_hex(secret, signature_header, body),
        Provider::Zendesk => verify_base64(secret, signature_header, body),
        Provider::Salesforce => {
            let signed = [full_url.as_bytes(), body].concat();
            verify_base64(secret, signature_header, &signed)
        }
        Provider::Helpshift => verify_hex(secret, signature_header, body),
        Provider::Intercom => {
            let stripped = signature_header.strip_prefix("sha256=").unwrap_or(signature_header);
            verify_hex(secret, stripped, body)
        }
        Provider::Freshdesk => verify_hex(secret, signature_header, body),
    }
}

fn mac_for(secret: &str, body: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    mac
}

fn verify_hex(secret: &str, signature_hex: &str, body: &[u8]) -> Result<(), WebhookError> {
    let expected =
        hex::decode(signature_hex).map_err(|e| WebhookError::InvalidEncoding(e.to_string()))?;
    mac_for(secret, body)
        .verify_slice(&expected)
        .map_err(|_| WebhookError::Mismatch)
}

fn verify_base64(secret: &str, signature_b64: &str, body: &[u8]) -> Result<(), WebhookError> {
    let expected = base64::engine::general_purpose::STANDARD
        .decode(signature_b64)
        .map_err(|e| WebhookError::InvalidEncoding(e.to_string()))?;
    mac_for(secret, body)
        .verify_slice(&expected)
        .map_err(|_| WebhookError::Mismatch)
}

/// Compute a provider's expected signature for a body. Exposed for tests and
/// for operator tooling that needs to replay a webhook (`supportgate-cli`).
pub fn sign(provider: Provider, secret: &str, body: &[u8], full_url: &str) -> String {
    match provider {
        Provider::Gorgias | Provider::Helpshift | Provider::Freshdesk => {
            hex::encode(&mac_for(secret, body).finalize().into_bytes())
        }
        Provider::Intercom => format!(
            "sha256={}",
            hex::encode(&mac_for(secret, body).finalize().into_bytes())
        ),
        Provider::Zendesk => base64::engine::general_purpose::STANDARD
            .encode(mac_for(secret, body).finalize().into_bytes()),
        Provider::Salesforce => {
            let signed = [full_url.as_bytes(), body].concat();
            base64::engine::general_purpose::STANDARD
                .encode(mac_for(secret, &signed).finalize().into_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "my-secret-key";
    const BODY: &[u8] = br#"{"event":"ticket.created"}"#;
    const URL: &str = "https://tenant.example.com/webhooks/salesforce";

    #[test]
    fn test_gorgias_hex_roundtrip() {
        let sig = sign(Provider::Gorgias, SECRET, BODY, "");
        assert!(verify(Provider::Gorgias, SECRET, &sig, BODY, "").is_ok());
    }

    #[test]
    fn test_zendesk_base64_roundtrip() {
        let sig = sign(Provider::Zendesk, SECRET, BODY, "");
        assert!(verify(Provider::Zendesk, SECRET, &sig, BODY, "").is_ok());
    }

    #[test]
    fn test_salesforce_signs_url_and_body() {
        let sig = sign(Provider::Salesforce, SECRET, BODY, URL);
        assert!(verify(Provider::Salesforce, SECRET, &sig, BODY, URL).is_ok());
        // A different URL must fail: the signature covers url ∥ body.
        assert!(verify(Provider::Salesforce, SECRET, &sig, BODY, "https://evil.example.com").is_err());
    }

    #[test]
    fn test_helpshift_hex_roundtrip() {
        let sig = sign(Provider::Helpshift, SECRET, BODY, "");
        assert!(verify(Provider::Helpshift, SECRET, &sig, BODY, "").is_ok());
    }

    #[test]
    fn test_intercom_strips_sha256_prefix() {
        let sig = sign(Provider::Intercom, SECRET, BODY, "");
        assert!(sig.starts_with("sha256="));
        assert!(verify(Provider::Intercom, SECRET, &sig, BODY, "").is_ok());
    }

    #[test]
    fn test_freshdesk_hex_roundtrip() {
        let sig = sign(Provider::Freshdesk, SECRET, BODY, "");
        assert!(verify(Provider::Freshdesk, SECRET, &sig, BODY, "").is_ok());
    }

    #[test]
    fn test_tampered_body_fails() {
        let sig = sign(Provider::Gorgias, SECRET, BODY, "");
        assert!(verify(Provider::Gorgias, SECRET, &sig, b"tampered", "").is_err());
    }

    #[test]
    fn test_missing_secret_errors() {
        assert!(matches!(
            verify(Provider::Gorgias, "", "abc", BODY, ""),
            Err(WebhookError::MissingSecret)
        ));
    }

    #[test]
    fn test_missing_signature_errors() {
        assert!(matches!(
            verify(Provider::Gorgias, SECRET, "", BODY, ""),
            Err(WebhookError::MissingSignature)
        ));
    }

    #[test]
    fn test_invalid_hex_signature_errors() {
        assert!(matches!(
            verify(Provider::Gorgias, SECRET, "not-hex-zz", BODY, ""),
            Err(WebhookError::InvalidEncoding(_))
        ));
    }
}
