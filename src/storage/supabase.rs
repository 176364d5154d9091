use super::{key_after_prefix, validate_key, ObjectStorage, StorageError};
use async_trait::async_trait;
use reqwest::{Client, Request};
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tracing::{info, instrument};

/// Bucket on the managed backend's storage HTTP API.
#[derive(Clone)]
pub struct SupabaseStorage {
    http: Client,
    base_url: String,
    bucket: String,
    service_key: String,
}

impl fmt::Debug for SupabaseStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseStorage")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl SupabaseStorage {
    pub fn new(base_url: &str, bucket: &str, service_key: &str) -> Result<Self, StorageError> {
        let http = Client::builder()
            .user_agent("toca/0.1")
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            bucket: bucket.trim_matches('/').to_string(),
            service_key: service_key.to_string(),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key)
    }

    fn public_prefix(&self) -> String {
        format!("{}/storage/v1/object/public/{}/", self.base_url, self.bucket)
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}{}", self.public_prefix(), key)
    }

    pub fn build_upload_request(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<Request, StorageError> {
        validate_key(key)?;
        Ok(self
            .http
            .post(self.object_url(key))
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Content-Type", content_type)
            .header("Cache-Control", "max-age=3600")
            .header("x-upsert", "false")
            .body(bytes.to_vec())
            .build()?)
    }

    pub fn build_delete_request(&self, key: &str) -> Result<Request, StorageError> {
        validate_key(key)?;
        Ok(self
            .http
            .delete(format!("{}/storage/v1/object/{}", self.base_url, self.bucket))
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .json(&json!({ "prefixes": [key] }))
            .build()?)
    }

    async fn execute(&self, request: Request) -> Result<(), StorageError> {
        let res = self.http.execute(request).await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(StorageError::Status { status, body });
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    #[instrument(skip_all, fields(key = %key))]
    async fn upload(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        let request = self.build_upload_request(key, bytes, content_type)?;
        self.execute(request).await?;
        info!(bucket = %self.bucket, size = bytes.len(), "uploaded object");
        Ok(self.public_url(key))
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let request = self.build_delete_request(key)?;
        self.execute(request).await
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        key_after_prefix(url, &self.public_prefix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> SupabaseStorage {
        SupabaseStorage::new("https://abc.supabase.co/", "post-images", "service-key").unwrap()
    }

    #[test]
    fn upload_request_targets_bucket_with_auth() {
        let request = storage()
            .build_upload_request("p/1-0.png", b"bytes", "image/png")
            .unwrap();
        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(
            request.url().as_str(),
            "https://abc.supabase.co/storage/v1/object/post-images/p/1-0.png"
        );
        let headers = request.headers();
        assert_eq!(headers.get("apikey").unwrap(), "service-key");
        assert_eq!(headers.get("Authorization").unwrap(), "Bearer service-key");
        assert_eq!(headers.get("Content-Type").unwrap(), "image/png");
        assert_eq!(headers.get("x-upsert").unwrap(), "false");
    }

    #[test]
    fn delete_request_sends_prefixes() {
        let request = storage().build_delete_request("p/1-0.png").unwrap();
        assert_eq!(request.method(), reqwest::Method::DELETE);
        assert_eq!(request.url().path(), "/storage/v1/object/post-images");
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(value["prefixes"][0], "p/1-0.png");
    }

    #[test]
    fn public_url_round_trips_to_key() {
        let s = storage();
        let url = s.public_url("p/1-0.png");
        assert_eq!(
            url,
            "https://abc.supabase.co/storage/v1/object/public/post-images/p/1-0.png"
        );
        assert_eq!(s.key_for_url(&url).as_deref(), Some("p/1-0.png"));
        assert!(s
            .key_for_url("https://abc.supabase.co/storage/v1/object/public/other/p/1-0.png")
            .is_none());
    }

    #[test]
    fn rejects_bad_keys_before_network() {
        assert!(matches!(
            storage().build_upload_request("../x.png", b"", "image/png"),
            Err(StorageError::InvalidKey(_))
        ));
    }
}
