//! [`Uploader`] for S3-compatible providers via `aws-sdk-s3`.
//!
//! Files up to [`MULTIPART_THRESHOLD_BYTES`] go up in a single PutObject;
//! larger files use multipart upload in [`PART_SIZE_BYTES`] parts, aborted on
//! any failure so no orphaned parts are billed.

use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncReadExt;

use super::upload::{UploadError, Uploader};
use super::ProgressFn;
use crate::destinations::Destination;

pub const MULTIPART_THRESHOLD_BYTES: u64 = 8 * 1024 * 1024;
pub const PART_SIZE_BYTES: usize = 8 * 1024 * 1024;

/// Longest lifetime SigV4 presigned URLs accept.
const MAX_PRESIGN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Default)]
pub struct S3Uploader;

impl S3Uploader {
    pub fn new() -> Self {
        Self
    }

    fn client(destination: &Destination) -> Client {
        let credentials = Credentials::new(
            destination.access_key_id.clone(),
            destination.secret_access_key.clone(),
            None,
            None,
            "cloudlift",
        );
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version_latest()
            .region(Region::new(destination.region.clone()))
            .endpoint_url(destination.endpoint.clone())
            .credentials_provider(credentials)
            .force_path_style(destination.force_path_style)
            .build();
        Client::from_conf(config)
    }
}

fn sdk_err<E: std::error::Error>(destination: &Destination, err: E) -> UploadError {
    UploadError::new(destination.provider, DisplayErrorContext(err).to_string())
}

#[async_trait]
impl Uploader for S3Uploader {
    async fn upload(
        &self,
        destination: &Destination,
        local_path: &Path,
        remote_key: &str,
        on_progress: ProgressFn,
    ) -> Result<(), UploadError> {
        let total = tokio::fs::metadata(local_path)
            .await
            .map_err(|e| {
                UploadError::new(
                    destination.provider,
                    format!("stat {}: {}", local_path.display(), e),
                )
            })?
            .len();
        let client = Self::client(destination);

        if total <= MULTIPART_THRESHOLD_BYTES {
            let body = ByteStream::from_path(local_path.to_path_buf())
                .await
                .map_err(|e| sdk_err(destination, e))?;
            client
                .put_object()
                .bucket(&destination.bucket)
                .key(remote_key)
                .body(body)
                .send()
                .await
                .map_err(|e| sdk_err(destination, e))?;
            on_progress(total, Some(total));
            return Ok(());
        }

        let multipart = client
            .create_multipart_upload()
            .bucket(&destination.bucket)
            .key(remote_key)
            .send()
            .await
            .map_err(|e| sdk_err(destination, e))?;
        let upload_id = multipart
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| UploadError::new(destination.provider, "missing multipart upload id"))?;

        let result = upload_parts(
            &client,
            destination,
            local_path,
            remote_key,
            &upload_id,
            total,
            &on_progress,
        )
        .await;

        if let Err(err) = result {
            if let Err(abort_err) = client
                .abort_multipart_upload()
                .bucket(&destination.bucket)
                .key(remote_key)
                .upload_id(&upload_id)
                .send()
                .await
            {
                tracing::warn!(
                    provider = %destination.provider,
                    upload_id = %upload_id,
                    error = %DisplayErrorContext(abort_err),
                    "abort multipart upload failed"
                );
            }
            return Err(err);
        }
        Ok(())
    }

    /// Sum of object sizes in the bucket (ListObjectsV2, all pages).
    async fn bucket_usage(&self, destination: &Destination) -> Result<u64, UploadError> {
        let client = Self::client(destination);
        let mut continuation_token: Option<String> = None;
        let mut total: u64 = 0;
        loop {
            let mut request = client
                .list_objects_v2()
                .bucket(&destination.bucket)
                .max_keys(1000);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }
            let output = request.send().await.map_err(|e| sdk_err(destination, e))?;
            total += output
                .contents()
                .iter()
                .map(|item| item.size().unwrap_or(0).max(0) as u64)
                .sum::<u64>();
            if output.is_truncated().unwrap_or(false) {
                continuation_token = output.next_continuation_token().map(str::to_string);
                if continuation_token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }
        Ok(total)
    }

    /// Public URL where the provider has one (Oracle Cloud), else a presigned GET.
    async fn share_url(
        &self,
        destination: &Destination,
        remote_key: &str,
        ttl: Duration,
    ) -> Result<Option<String>, UploadError> {
        if let Some(url) = destination.public_object_url(remote_key) {
            return Ok(Some(url));
        }
        let config = PresigningConfig::expires_in(ttl.min(MAX_PRESIGN_TTL))
            .map_err(|e| sdk_err(destination, e))?;
        let presigned = Self::client(destination)
            .get_object()
            .bucket(&destination.bucket)
            .key(remote_key)
            .presigned(config)
            .await
            .map_err(|e| sdk_err(destination, e))?;
        Ok(Some(presigned.uri().to_string()))
    }
}

async fn upload_parts(
    client: &Client,
    destination: &Destination,
    local_path: &Path,
    remote_key: &str,
    upload_id: &str,
    total: u64,
    on_progress: &ProgressFn,
) -> Result<(), UploadError> {
    let read_err = |e: std::io::Error| {
        UploadError::new(
            destination.provider,
            format!("read {}: {}", local_path.display(), e),
        )
    };
    let mut file = tokio::fs::File::open(local_path).await.map_err(read_err)?;
    let mut sent: u64 = 0;
    let mut part_number: i32 = 1;
    let mut parts: Vec<CompletedPart> = Vec::new();

    loop {
        let mut buffer = vec![0u8; PART_SIZE_BYTES];
        let mut filled = 0;
        while filled < buffer.len() {
            let n = file.read(&mut buffer[filled..]).await.map_err(read_err)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            break;
        }
        buffer.truncate(filled);

        let output = client
            .upload_part()
            .bucket(&destination.bucket)
            .key(remote_key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(buffer))
            .send()
            .await
            .map_err(|e| sdk_err(destination, e))?;
        parts.push(
            CompletedPart::builder()
                .set_e_tag(output.e_tag().map(str::to_string))
                .part_number(part_number)
                .build(),
        );

        sent += filled as u64;
        on_progress(sent, Some(total));
        part_number += 1;
    }

    if parts.is_empty() {
        return Err(UploadError::new(
            destination.provider,
            "multipart upload produced no parts",
        ));
    }

    client
        .complete_multipart_upload()
        .bucket(&destination.bucket)
        .key(remote_key)
        .upload_id(upload_id)
        .multipart_upload(
            CompletedMultipartUpload::builder()
                .set_parts(Some(parts))
                .build(),
        )
        .send()
        .await
        .map_err(|e| sdk_err(destination, e))?;
    Ok(())
}
