//! Network boundary for the generate call. Everything transport-specific
//! (status codes, reqwest error flavours, body framing) stays in this module.

use async_trait::async_trait;
use futures::stream;
use reqwest::{
    multipart::{Form, Part},
    Body, Client, Response,
};
use shared::{
    domain::{Parameters, SubmissionInput},
    protocol::{
        ErrorResponse, GenerateResponse, FIELD_COLOR_PALETTE, FIELD_IMAGE, FIELD_PIXEL_SIZE,
        GENERATE_PATH,
    },
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;
/// Ceiling for any response body read into memory.
pub const MAX_RESPONSE_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEvent {
    UploadProgress { sent: u64, total: u64 },
    /// The last body chunk was handed off to the connection (not necessarily
    /// written yet) or response headers arrived.
    UploadComplete,
    DownloadProgress { received: u64, total: Option<u64> },
}

/// Ordered channel from the transport back to the controller.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: mpsc::UnboundedSender<TransferEvent>,
}

impl ProgressSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransferEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: TransferEvent) {
        // Receiver is gone once the submission settled (timeout, cancel).
        let _ = self.tx.send(event);
    }

    pub fn upload(&self, sent: u64, total: u64) {
        self.emit(TransferEvent::UploadProgress { sent, total });
    }

    pub fn upload_complete(&self) {
        self.emit(TransferEvent::UploadComplete);
    }

    pub fn download(&self, received: u64, total: Option<u64>) {
        self.emit(TransferEvent::DownloadProgress { received, total });
    }
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub input: SubmissionInput,
    pub parameters: Parameters,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    TimedOut,
    #[error("request rejected with status {status}")]
    Rejected {
        status: u16,
        message: Option<String>,
    },
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("network failure: {0}")]
    Network(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::TimedOut
        } else if err.is_decode() {
            TransportError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            TransportError::Status(status.as_u16())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

#[async_trait]
pub trait GenerateTransport: Send + Sync {
    /// Issues the single generate call and returns the result locator as the
    /// service sent it (relative to the base address).
    async fn generate(
        &self,
        request: GenerateRequest,
        progress: ProgressSink,
    ) -> Result<GenerateResponse, TransportError>;

    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, TransportError>;
}

pub struct HttpTransport {
    http: Client,
    endpoint: Url,
    response_limit: u64,
}

impl HttpTransport {
    pub fn new(base_url: &Url) -> Result<Self, url::ParseError> {
        Ok(Self {
            http: Client::new(),
            endpoint: base_url.join(GENERATE_PATH)?,
            response_limit: MAX_RESPONSE_BYTES,
        })
    }

    pub fn with_response_limit(mut self, limit: u64) -> Self {
        self.response_limit = limit;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn upload_body(input: &SubmissionInput, progress: ProgressSink) -> Body {
    let bytes = input.bytes().clone();
    let total = bytes.len() as u64;
    let chunk_count = bytes.len().div_ceil(UPLOAD_CHUNK_BYTES);
    let chunks = stream::iter((0..chunk_count).map(move |index| {
        let start = index * UPLOAD_CHUNK_BYTES;
        let end = (start + UPLOAD_CHUNK_BYTES).min(bytes.len());
        let chunk = bytes[start..end].to_vec();
        progress.upload(end as u64, total);
        if index + 1 == chunk_count {
            progress.upload_complete();
        }
        Ok::<_, std::io::Error>(chunk)
    }));
    Body::wrap_stream(chunks)
}

fn oversized(limit: u64) -> TransportError {
    TransportError::MalformedResponse(format!("response body exceeds {limit} bytes"))
}

/// Reads the body chunk by chunk. `Content-Length` is only a hint for progress;
/// the buffer grows with what actually arrives and stops at `limit`.
async fn read_body(
    mut response: Response,
    progress: Option<&ProgressSink>,
    limit: u64,
) -> Result<Vec<u8>, TransportError> {
    let total = response.content_length();
    if total.is_some_and(|total| total > limit) {
        warn!(?total, limit, "declared response body too large");
        return Err(oversized(limit));
    }
    let mut body = Vec::new();
    if let Some(progress) = progress {
        progress.download(0, total);
    }
    while let Some(chunk) = response.chunk().await? {
        if (body.len() + chunk.len()) as u64 > limit {
            warn!(limit, "response body grew past limit");
            return Err(oversized(limit));
        }
        body.extend_from_slice(&chunk);
        if let Some(progress) = progress {
            progress.download(body.len() as u64, total);
        }
    }
    Ok(body)
}

#[async_trait]
impl GenerateTransport for HttpTransport {
    async fn generate(
        &self,
        request: GenerateRequest,
        progress: ProgressSink,
    ) -> Result<GenerateResponse, TransportError> {
        let GenerateRequest { input, parameters } = request;
        let total = input.size();
        if total == 0 {
            progress.upload(0, 0);
            progress.upload_complete();
        }

        let image = Part::stream_with_length(upload_body(&input, progress.clone()), total)
            .file_name(input.file_name().to_string())
            .mime_str(input.mime_type())
            .map_err(|err| TransportError::Network(format!("invalid mime type: {err}")))?;
        let form = Form::new()
            .part(FIELD_IMAGE, image)
            .text(FIELD_COLOR_PALETTE, parameters.palette.as_str())
            .text(FIELD_PIXEL_SIZE, parameters.pixel_size.to_string());

        debug!(endpoint = %self.endpoint, bytes = total, "sending generate request");
        let response = self
            .http
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?;
        // Headers only arrive once the body is on the wire; covers servers that
        // answer before reading it all.
        progress.upload_complete();

        let status = response.status();
        let body = read_body(response, Some(&progress), self.response_limit).await?;

        if status.is_success() {
            let parsed: GenerateResponse = serde_json::from_slice(&body)
                .map_err(|err| TransportError::MalformedResponse(err.to_string()))?;
            if parsed.result_url.trim().is_empty() {
                return Err(TransportError::MalformedResponse(
                    "empty result_url".to_string(),
                ));
            }
            return Ok(parsed);
        }

        if status.is_client_error() {
            let message = serde_json::from_slice::<ErrorResponse>(&body)
                .ok()
                .map(|body| body.message);
            warn!(status = status.as_u16(), ?message, "generate request rejected");
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        warn!(status = status.as_u16(), "generate request failed");
        Err(TransportError::Status(status.as_u16()))
    }

    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        read_body(response, None, self.response_limit).await
    }
}
