//! Upload dispatch: strategy selection (single-shot vs. chunked) and
//! multipart orchestration with progress reporting

use crate::config::UploadMapping;
use crate::error::UploadError;
use crate::progress::ProgressTracker;
use crate::store::ObjectStore;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio::sync::Semaphore;

// Multipart threshold: 1 GiB. Files at or below this size go out in one PUT.
pub const MULTIPART_THRESHOLD: u64 = 1024 * 1024 * 1024;
// Part size: 20 MiB per chunk
pub const DEFAULT_CHUNK_SIZE: u64 = 20 * 1024 * 1024;
// Concurrent part uploads per file
pub const DEFAULT_CONCURRENCY: usize = 4;
// S3 rejects multipart uploads beyond this many parts
pub const MAX_PARTS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub threshold: u64,
    pub chunk_size: u64,
    pub concurrency: usize,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            threshold: MULTIPART_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Aggregate outcome of one run, for the final log line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    pub uploaded: usize,
    pub failed: usize,
}

pub struct Uploader<S> {
    store: Arc<S>,
    settings: TransferSettings,
    show_progress: bool,
    on_progress: Option<Arc<dyn Fn(u64, u64) + Send + Sync>>,
}

impl<S: ObjectStore + 'static> Uploader<S> {
    pub fn new(store: Arc<S>, settings: TransferSettings) -> Self {
        Self {
            store,
            settings,
            show_progress: true,
            on_progress: None,
        }
    }

    /// Install a callback invoked with `(bytes_transferred, total_size)`
    /// after each completed part of a chunked upload.
    pub fn with_progress_callback(
        mut self,
        callback: impl Fn(u64, u64) + Send + Sync + 'static,
    ) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    #[cfg(test)]
    fn without_progress_output(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Upload every configured file, bucket by bucket, in config order.
    ///
    /// Failures are isolated per file: each is logged and the run moves on
    /// to the next file. Nothing here retries; that belongs to the storage
    /// provider.
    pub async fn upload_all(&self, mapping: &UploadMapping) -> UploadSummary {
        let mut summary = UploadSummary::default();
        for entry in &mapping.entries {
            for file in &entry.files {
                match self.upload_file(&entry.bucket, file, None).await {
                    Ok(()) => {
                        log::info!("Uploaded {} to bucket {}", file.display(), entry.bucket);
                        summary.uploaded += 1;
                    }
                    Err(err) => {
                        log::error!("Failed to upload {}: {}", file.display(), err);
                        summary.failed += 1;
                    }
                }
            }
        }
        summary
    }

    /// Upload one file, picking the strategy by size. The remote key
    /// defaults to the file's base name.
    pub async fn upload_file(
        &self,
        bucket: &str,
        path: &Path,
        key: Option<&str>,
    ) -> Result<(), UploadError> {
        let remote_key = match key {
            Some(key) => key.to_string(),
            // A path with no final component cannot name an object.
            None => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| UploadError::FileNotFound(path.to_path_buf()))?,
        };

        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(UploadError::FileNotFound(path.to_path_buf()))
            }
            Err(err) => return Err(err.into()),
        };

        // Boundary: a file exactly at the threshold still goes single-shot.
        let size = metadata.len();
        if size <= self.settings.threshold {
            self.store.put_object(bucket, &remote_key, path).await
        } else {
            self.upload_chunked(bucket, &remote_key, path, size).await
        }
    }

    /// Multipart path: fixed-size parts uploaded under a semaphore, with the
    /// progress line redrawn as each part lands. On any part failure the
    /// multipart upload is aborted and the first error is reported.
    async fn upload_chunked(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        file_size: u64,
    ) -> Result<(), UploadError> {
        let chunk_size = self.settings.chunk_size;
        let total_parts = file_size.div_ceil(chunk_size);
        // S3 caps multipart uploads at 10,000 parts; a chunk_size small
        // enough to exceed that can never complete.
        if total_parts > MAX_PARTS {
            return Err(UploadError::Config(format!(
                "{} needs {} parts at chunk size {}; the limit is {} (raise chunk_size)",
                path.display(),
                total_parts,
                chunk_size,
                MAX_PARTS
            )));
        }

        let upload_id = self.store.create_multipart(bucket, key).await?;

        let filename = path.display().to_string();
        let tracker = Arc::new(if self.show_progress {
            ProgressTracker::new(filename, file_size)
        } else {
            ProgressTracker::silent(filename, file_size)
        });

        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency));
        let mut handles = Vec::with_capacity(total_parts as usize);

        for part_number in 1..=total_parts {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| UploadError::Transfer(e.to_string()))?;
            let store = self.store.clone();
            let bucket = bucket.to_string();
            let key = key.to_string();
            let upload_id = upload_id.clone();
            let path = path.to_path_buf();
            let tracker = tracker.clone();
            let on_progress = self.on_progress.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;

                let start = (part_number - 1) * chunk_size;
                let end = (start + chunk_size).min(file_size);
                let part_len = (end - start) as usize;

                let mut file = File::open(&path).await?;
                file.seek(SeekFrom::Start(start)).await?;

                let mut buffer = vec![0u8; part_len];
                file.read_exact(&mut buffer).await?;

                let etag = store
                    .upload_part(&bucket, &key, &upload_id, part_number as i32, buffer)
                    .await?;

                let transferred = tracker.record(part_len as u64);
                if let Some(ref callback) = on_progress {
                    callback(transferred, file_size);
                }

                Ok::<(i32, String), UploadError>((part_number as i32, etag))
            });

            handles.push(handle);
        }

        let mut parts = Vec::with_capacity(handles.len());
        let mut first_error: Option<UploadError> = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(part)) => parts.push(part),
                Ok(Err(err)) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
                Err(err) => {
                    if first_error.is_none() {
                        first_error =
                            Some(UploadError::Transfer(format!("part task failed: {}", err)));
                    }
                }
            }
        }
        tracker.finish();

        if let Some(err) = first_error {
            if let Err(abort_err) = self.store.abort_multipart(bucket, key, &upload_id).await {
                log::warn!(
                    "Failed to abort multipart upload {}: {}",
                    upload_id,
                    abort_err
                );
            }
            return Err(err);
        }

        // S3 requires parts in ascending part-number order.
        parts.sort_by_key(|(n, _)| *n);
        self.store
            .complete_multipart(bucket, key, &upload_id, parts)
            .await
    }
}
