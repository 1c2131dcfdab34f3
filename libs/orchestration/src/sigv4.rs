//! AWS Signature Version 4 request signing.
//!
//! Only what the ECS JSON protocol needs: a single canonical path, no query
//! string, and a small fixed set of signed headers.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Static signing credentials.
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

/// A request to be signed.
///
/// `headers` must already contain every header that should be signed,
/// including `host` and `x-amz-date`. Names are lowercased during signing.
#[derive(Debug)]
pub struct SigningRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a str,
    pub headers: &'a [(String, String)],
    pub payload: &'a [u8],
}

/// Output of signing: the `Authorization` header value and its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub authorization: String,
    pub signed_headers: String,
    pub signature: String,
}

/// Format a timestamp as `YYYYMMDD'T'HHMMSS'Z'` for `x-amz-date`.
pub fn amz_date(time: DateTime<Utc>) -> String {
    time.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Hex-encoded SHA-256 of `payload`.
pub fn payload_hash(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Sign `request` for `service` in `region` at `time`.
pub fn sign(
    request: &SigningRequest<'_>,
    credentials: &Credentials,
    region: &str,
    service: &str,
    time: DateTime<Utc>,
) -> Signature {
    let amz_date = amz_date(time);
    let date = &amz_date[..8];

    let mut headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), normalize_value(value)))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method,
        request.path,
        request.query,
        canonical_headers,
        signed_headers,
        payload_hash(request.payload)
    );

    let scope = format!("{date}/{region}/{service}/aws4_request");
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let key = signing_key(&credentials.secret_access_key, date, region, service);
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));

    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        credentials.access_key_id
    );

    Signature {
        authorization,
        signed_headers,
        signature,
    }
}

/// Derive the per-day, per-region, per-service signing key.
pub fn signing_key(secret_access_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret_access_key}").as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn normalize_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    fn example_credentials() -> Credentials {
        Credentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: SECRET.to_string(),
            session_token: None,
        }
    }

    #[test]
    fn test_signing_key_matches_published_derivation() {
        let key = signing_key(SECRET, "20120215", "us-east-1", "iam");
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_sign_get_vanilla() {
        let time = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();
        let headers = vec![
            ("Host".to_string(), "example.amazonaws.com".to_string()),
            ("X-Amz-Date".to_string(), amz_date(time)),
        ];
        let request = SigningRequest {
            method: "GET",
            path: "/",
            query: "",
            headers: &headers,
            payload: b"",
        };

        let signature = sign(&request, &example_credentials(), "us-east-1", "service", time);

        assert_eq!(signature.signed_headers, "host;x-amz-date");
        assert_eq!(
            signature.signature,
            "5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
        assert_eq!(
            signature.authorization,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
    }

    #[test]
    fn test_signed_headers_are_sorted_and_lowercased() {
        let time = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let headers = vec![
            ("X-Amz-Target".to_string(), "Svc.Op".to_string()),
            ("Content-Type".to_string(), "application/x-amz-json-1.1".to_string()),
            ("Host".to_string(), "ecs.eu-west-1.amazonaws.com".to_string()),
            ("X-Amz-Date".to_string(), amz_date(time)),
        ];
        let request = SigningRequest {
            method: "POST",
            path: "/",
            query: "",
            headers: &headers,
            payload: b"{}",
        };

        let signature = sign(&request, &example_credentials(), "eu-west-1", "ecs", time);

        assert_eq!(
            signature.signed_headers,
            "content-type;host;x-amz-date;x-amz-target"
        );
        assert!(signature
            .authorization
            .contains("Credential=AKIDEXAMPLE/20240102/eu-west-1/ecs/aws4_request"));
        assert_eq!(signature.signature.len(), 64);
    }

    #[test]
    fn test_amz_date_format() {
        let time = Utc.with_ymd_and_hms(2024, 11, 5, 7, 8, 9).unwrap();
        assert_eq!(amz_date(time), "20241105T070809Z");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials {
            session_token: Some("token".to_string()),
            ..example_credentials()
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains(SECRET));
        assert!(!rendered.contains("\"token\""));
    }
}
