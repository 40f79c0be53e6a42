//! Upload transport and completion notifier for the Lumio API.
//!
//! `POST {prefix}/orders/{order_id}/photos` carries one photo as a multipart
//! form (`file` and `uid`). The file part is streamed in slices so progress
//! can be reported as the body is written.
//! `POST {prefix}/orders/{order_id}/upload-complete` tells the server an
//! order's run finished.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lumio_core::UploadError;
use lumio_upload::{CompletionNotifier, UploadForm, UploadOptions, UploadTransport};

use crate::ApiClient;

const STREAM_SLICE_SIZE: usize = 64 * 1024;

fn order_path(order_id: &str, endpoint: &str) -> String {
    format!("/orders/{}/{}", urlencoding::encode(order_id), endpoint)
}

/// Split `payload` into zero-copy slices of at most `slice_size` bytes.
fn slices(payload: &Bytes, slice_size: usize) -> Vec<Bytes> {
    let slice_size = slice_size.max(1);
    (0..payload.len())
        .step_by(slice_size)
        .map(|start| payload.slice(start..(start + slice_size).min(payload.len())))
        .collect()
}

fn map_send_error(err: reqwest::Error, timeout: Duration) -> UploadError {
    if err.is_timeout() {
        UploadError::Timeout(timeout)
    } else {
        UploadError::Network(err.to_string())
    }
}

impl ApiClient {
    fn photo_form(&self, form: UploadForm, options: &UploadOptions) -> Result<Form, UploadError> {
        let total = form.len();
        let sent = Arc::new(AtomicU64::new(0));
        let progress = options.progress.clone();

        let body = stream::iter(slices(&form.payload, STREAM_SLICE_SIZE)).map(move |chunk| {
            let len = chunk.len() as u64;
            let now = sent.fetch_add(len, Ordering::Relaxed) + len;
            progress(now, total);
            Ok::<Bytes, std::io::Error>(chunk)
        });

        let part = Part::stream_with_length(Body::wrap_stream(body), total)
            .file_name(form.file_name)
            .mime_str(&form.content_type)
            .map_err(|e| UploadError::InvalidInput(format!("Invalid content type: {}", e)))?;

        Ok(Form::new().text("uid", form.uid).part("file", part))
    }
}

#[async_trait]
impl UploadTransport for ApiClient {
    async fn upload_photo(
        &self,
        order_id: &str,
        form: UploadForm,
        options: UploadOptions,
    ) -> Result<(), UploadError> {
        if options.cancel.is_cancelled() {
            return Err(UploadError::Canceled);
        }

        let uid = form.uid.clone();
        let url = self.build_url(&order_path(order_id, "photos"));
        let multipart = self.photo_form(form, &options)?;
        let request = self.apply_auth(
            self.client()
                .post(&url)
                .timeout(options.timeout)
                .multipart(multipart),
        );

        let response = tokio::select! {
            biased;
            _ = options.cancel.cancelled() => return Err(UploadError::Canceled),
            result = request.send() => result.map_err(|e| map_send_error(e, options.timeout))?,
        };

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::debug!(
                order_id = %order_id,
                uid = %uid,
                status = status.as_u16(),
                "Photo upload rejected"
            );
            return Err(UploadError::Http {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl CompletionNotifier for ApiClient {
    async fn notify_upload_complete(&self, order_id: &str) -> anyhow::Result<()> {
        self.post_empty(&order_path(order_id, "upload-complete"))
            .await?;
        tracing::info!(order_id = %order_id, "Upload completion acknowledged");
        Ok(())
    }
}
