//! S3-compatible object storage for archiving uploaded originals.
//!
//! Signs requests with AWS Signature V4 using pure-Rust primitives (`hmac`,
//! `sha2`) — no C library dependencies. Supports custom endpoints for
//! S3-compatible services (MinIO, LocalStack).
//!
//! Credentials come from the environment:
//! - `AWS_ACCESS_KEY_ID` — required
//! - `AWS_SECRET_ACCESS_KEY` — required
//! - `AWS_SESSION_TOKEN` — optional (temporary credentials / IAM roles)
//!
//! Archival is independent of indexing by design: a `put` failure is
//! reported as a `Storage` error and never rolls back index state.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::StorageConfig;
use crate::error::{QaError, QaResult};

type HmacSha256 = Hmac<Sha256>;

pub struct S3Storage {
    config: StorageConfig,
    creds: AwsCredentials,
    client: reqwest::Client,
}

impl S3Storage {
    /// Build a storage client, reading AWS credentials from the environment.
    pub fn new(config: &StorageConfig) -> QaResult<Self> {
        Ok(Self {
            config: config.clone(),
            creds: AwsCredentials::from_env()?,
            client: reqwest::Client::new(),
        })
    }

    /// Object key for an uploaded filename, honoring the configured prefix.
    pub fn object_key(&self, filename: &str) -> String {
        if self.config.prefix.is_empty() {
            filename.to_string()
        } else {
            format!("{}/{}", self.config.prefix.trim_end_matches('/'), filename)
        }
    }

    /// Upload bytes under `key`.
    pub async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> QaResult<()> {
        let req = self.signed_request(reqwest::Method::PUT, key, bytes);

        let resp = req
            .header("Content-Type", content_type)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| {
                QaError::Storage(format!(
                    "failed to put s3://{}/{}: {}",
                    self.config.bucket, key, e
                ))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(QaError::Storage(format!(
                "S3 PutObject failed (HTTP {}) for key '{}': {}",
                status,
                key,
                body.chars().take(500).collect::<String>()
            )));
        }

        debug!(bucket = %self.config.bucket, key, size = bytes.len(), "archived object");
        Ok(())
    }

    /// Download the object under `key`. Returns `None` when it does not
    /// exist.
    pub async fn get(&self, key: &str) -> QaResult<Option<Vec<u8>>> {
        let req = self.signed_request(reqwest::Method::GET, key, b"");

        let resp = req.send().await.map_err(|e| {
            QaError::Storage(format!(
                "failed to get s3://{}/{}: {}",
                self.config.bucket, key, e
            ))
        })?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(QaError::Storage(format!(
                "S3 GetObject failed (HTTP {}) for key '{}'",
                resp.status(),
                key
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| QaError::Storage(e.to_string()))?;
        Ok(Some(bytes.to_vec()))
    }

    /// Build a SigV4-signed request for a single object key with no query
    /// string.
    fn signed_request(
        &self,
        method: reqwest::Method,
        key: &str,
        payload: &[u8],
    ) -> reqwest::RequestBuilder {
        let host = self.host();
        let encoded_key = key.split('/').map(uri_encode).collect::<Vec<_>>().join("/");
        let canonical_uri = format!("/{}", encoded_key);
        let scheme = if self.config.endpoint_url.as_deref().map(|u| u.starts_with("http://"))
            == Some(true)
        {
            "http"
        } else {
            "https"
        };
        let url = format!("{}://{}{}", scheme, host, canonical_uri);

        let now = chrono::Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let payload_hash = hex_sha256(payload);

        let mut headers = vec![
            ("host".to_string(), host.clone()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(ref token) = self.creds.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let signed_headers: String = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");
        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();

        let canonical_request = format!(
            "{}\n{}\n\n{}\n{}\n{}",
            method.as_str(),
            canonical_uri,
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.config.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(
            &self.creds.secret_access_key,
            &date_stamp,
            &self.config.region,
            "s3",
        );
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.creds.access_key_id, credential_scope, signed_headers, signature
        );

        let mut builder = self
            .client
            .request(method, &url)
            .header("Authorization", authorization)
            .header("x-amz-content-sha256", payload_hash)
            .header("x-amz-date", amz_date);

        if let Some(ref token) = self.creds.session_token {
            builder = builder.header("x-amz-security-token", token);
        }
        builder
    }

    fn host(&self) -> String {
        if let Some(ref endpoint) = self.config.endpoint_url {
            endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/')
                .to_string()
        } else {
            format!(
                "{}.s3.{}.amazonaws.com",
                self.config.bucket, self.config.region
            )
        }
    }
}

// ============ Credentials and SigV4 helpers ============

struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    fn from_env() -> QaResult<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").map_err(|_| {
            QaError::Storage("AWS_ACCESS_KEY_ID environment variable not set".to_string())
        })?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").map_err(|_| {
            QaError::Storage("AWS_SECRET_ACCESS_KEY environment variable not set".to_string())
        })?;

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
        })
    }
}

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hex_hmac_sha256(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// Derive the SigV4 signing key:
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode per RFC 3986: everything except `A-Z a-z 0-9 - _ . ~`.
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_encode_leaves_unreserved() {
        assert_eq!(uri_encode("doc-1_v2.txt"), "doc-1_v2.txt");
        assert_eq!(uri_encode("a b"), "a%20b");
        assert_eq!(uri_encode("ü"), "%C3%BC");
    }

    #[test]
    fn signing_key_matches_aws_reference_vector() {
        // Worked example from the AWS SigV4 documentation.
        let key = derive_signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        );
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn object_key_applies_prefix() {
        let config = StorageConfig {
            bucket: "b".into(),
            region: "us-east-1".into(),
            prefix: "uploads/".into(),
            endpoint_url: None,
        };
        std::env::set_var("AWS_ACCESS_KEY_ID", "k");
        std::env::set_var("AWS_SECRET_ACCESS_KEY", "s");
        let storage = S3Storage::new(&config).unwrap();
        assert_eq!(storage.object_key("doc.txt"), "uploads/doc.txt");
    }
}
