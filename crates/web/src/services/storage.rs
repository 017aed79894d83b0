//! Object storage for avatar images.
//!
//! [`S3Storage`] uploads with a single signed `PUT` per object (AWS Signature
//! Version 4) rather than pulling in a full SDK.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::StorageConfig;
use crate::services::avatar::UploadError;

type HmacSha256 = Hmac<Sha256>;

/// Somewhere to put publicly readable objects.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `body` under `key` and return its public URL.
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, UploadError>;
}

/// Amazon S3 (or S3-compatible) bucket.
#[derive(Clone)]
pub struct S3Storage {
    client: reqwest::Client,
    config: StorageConfig,
}

impl S3Storage {
    /// Create a new S3 client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StorageConfig) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Public URL of an object.
    ///
    /// Virtual-hosted style on AWS, path style on a custom endpoint.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Signing` if the configured endpoint is not a URL.
    pub fn object_url(&self, key: &str) -> Result<Url, UploadError> {
        let raw = match &self.config.endpoint {
            Some(endpoint) => format!("{endpoint}/{}/{key}", self.config.bucket),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{key}",
                self.config.bucket, self.config.region
            ),
        };
        Url::parse(&raw).map_err(|e| UploadError::Signing(e.to_string()))
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, UploadError> {
        let url = self.object_url(key)?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_owned(),
            (None, _) => return Err(UploadError::Signing("storage URL has no host".into())),
        };

        let payload_hash = hex::encode(Sha256::digest(&body));
        let amz_date = amz_date(Utc::now());

        let mut headers = BTreeMap::new();
        headers.insert("content-type", content_type.to_owned());
        headers.insert("host", host);
        headers.insert("x-amz-acl", "public-read".to_owned());
        headers.insert("x-amz-content-sha256", payload_hash.clone());
        headers.insert("x-amz-date", amz_date.clone());

        let request = CanonicalRequest {
            method: "PUT",
            path: url.path(),
            headers: &headers,
            payload_hash: &payload_hash,
        };
        let authorization = request.authorization(
            &self.config.access_key_id,
            self.config.secret_access_key.expose_secret(),
            &self.config.region,
            &amz_date,
        )?;

        let mut builder = self.client.put(url.clone()).header("authorization", authorization);
        for (name, value) in &headers {
            if *name != "host" {
                builder = builder.header(*name, value);
            }
        }

        let response = builder.body(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(UploadError::Storage {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(%url, "Object stored");
        Ok(url.to_string())
    }
}

/// The parts of an HTTP request covered by a Signature V4.
struct CanonicalRequest<'a> {
    method: &'a str,
    /// Already URI-encoded path
    path: &'a str,
    /// Lowercase header names, sorted
    headers: &'a BTreeMap<&'a str, String>,
    payload_hash: &'a str,
}

impl CanonicalRequest<'_> {
    fn signed_headers(&self) -> String {
        self.headers.keys().copied().collect::<Vec<_>>().join(";")
    }

    fn canonical_string(&self) -> String {
        let headers: String = self
            .headers
            .iter()
            .map(|(name, value)| format!("{name}:{}\n", value.trim()))
            .collect();

        format!(
            "{}\n{}\n\n{}\n{}\n{}",
            self.method,
            self.path,
            headers,
            self.signed_headers(),
            self.payload_hash
        )
    }

    /// Build the `Authorization` header value.
    fn authorization(
        &self,
        access_key_id: &str,
        secret_access_key: &str,
        region: &str,
        amz_date: &str,
    ) -> Result<String, UploadError> {
        let date = amz_date.get(..8).unwrap_or(amz_date);
        let scope = format!("{date}/{region}/s3/aws4_request");

        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(self.canonical_string().as_bytes()))
        );

        let mut key = hmac_sha256(format!("AWS4{secret_access_key}").as_bytes(), date)?;
        for part in [region, "s3", "aws4_request"] {
            key = hmac_sha256(&key, part)?;
        }
        let signature = hex::encode(hmac_sha256(&key, &string_to_sign)?);

        Ok(format!(
            "AWS4-HMAC-SHA256 Credential={access_key_id}/{scope}, SignedHeaders={}, Signature={signature}",
            self.signed_headers()
        ))
    }
}

fn hmac_sha256(key: &[u8], data: &str) -> Result<Vec<u8>, UploadError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| UploadError::Signing(e.to_string()))?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Formats an instant the way `x-amz-date` expects.
#[must_use]
pub fn amz_date(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}
