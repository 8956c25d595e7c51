//! Object-storage collaborator: trait seam plus the S3 implementation

use crate::config::Credentials;
use crate::error::UploadError;
use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use std::path::Path;

/// Storage operations the dispatcher depends on. Retry/backoff is the
/// provider's concern, not ours.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Single-shot whole-file PUT.
    async fn put_object(&self, bucket: &str, key: &str, path: &Path) -> Result<(), UploadError>;

    /// Start a multipart upload, returning its upload id.
    async fn create_multipart(&self, bucket: &str, key: &str) -> Result<String, UploadError>;

    /// Upload one part, returning its etag.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> Result<String, UploadError>;

    /// Finish a multipart upload from `(part_number, etag)` pairs.
    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<(i32, String)>,
    ) -> Result<(), UploadError>;

    async fn abort_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), UploadError>;
}

/// S3-backed store. Also speaks to S3-compatible services (R2, MinIO)
/// through the `S3UP_ENDPOINT` override.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Build a client from the configured static key pair.
    pub fn connect(credentials: &Credentials) -> Self {
        let provider = aws_credential_types::Credentials::new(
            &credentials.access_key,
            &credentials.secret_key,
            None,
            None,
            "s3up-config",
        );

        let region = std::env::var("S3UP_REGION").unwrap_or_else(|_| "us-east-1".to_string());

        let mut builder = S3ConfigBuilder::new()
            .credentials_provider(provider)
            .region(Region::new(region));

        if let Ok(endpoint) = std::env::var("S3UP_ENDPOINT") {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_object(&self, bucket: &str, key: &str, path: &Path) -> Result<(), UploadError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| UploadError::Transfer(e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(into_upload_error)?;

        Ok(())
    }

    async fn create_multipart(&self, bucket: &str, key: &str) -> Result<String, UploadError> {
        let response = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(into_upload_error)?;

        response
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| UploadError::Transfer("no upload id returned".into()))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> Result<String, UploadError> {
        let response = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(into_upload_error)?;

        Ok(response.e_tag().unwrap_or_default().to_string())
    }

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<(i32, String)>,
    ) -> Result<(), UploadError> {
        let completed_parts: Vec<CompletedPart> = parts
            .into_iter()
            .map(|(part_number, etag)| {
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(etag)
                    .build()
            })
            .collect();

        let completed_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed_upload)
            .send()
            .await
            .map_err(into_upload_error)?;

        Ok(())
    }

    async fn abort_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), UploadError> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(into_upload_error)?;

        Ok(())
    }
}

/// Fold an SDK error into our error kinds. Auth failures surface as
/// `Credentials` so the dispatcher can log them distinctly.
fn into_upload_error<E, R>(err: SdkError<E, R>) -> UploadError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let credentials_failure = err.code().is_some_and(is_credentials_code);
    let detail = DisplayErrorContext(err).to_string();
    if credentials_failure {
        UploadError::Credentials(detail)
    } else {
        UploadError::Transfer(detail)
    }
}

fn is_credentials_code(code: &str) -> bool {
    matches!(
        code,
        "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "AccessDenied" | "ExpiredToken"
    )
}
