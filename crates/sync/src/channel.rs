//! Push channel transport.
//!
//! [`ChannelTransport::open`] connects to the run's progress stream and
//! returns a [`ChannelHandle`] that yields [`ChannelMessage`]s in
//! receipt order. The transport never reconnects: the first
//! connectivity problem is reported once as
//! [`ChannelMessage::TransportFailure`] and the handle closes itself.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use ideagen_core::job_events::EVENT_PROGRESS;
use ideagen_core::types::JobId;

use crate::api::JobServiceApi;
use crate::messages::{parse_frame, ChannelMessage};
use crate::sse::{SseDecoder, SseFrame};

/// Opens push channels for runs.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn open(&self, job_id: &JobId) -> Result<Box<dyn ChannelHandle>, TransportError>;
}

/// A live push channel for one run.
#[async_trait]
pub trait ChannelHandle: Send {
    /// Wait for the next message. Returns `None` once the handle is
    /// closed; no message is ever produced after that.
    async fn next_message(&mut self) -> Option<ChannelMessage>;

    /// Release the connection. Safe to call more than once.
    fn close(&mut self);
}

/// Errors raised while opening a channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The stream request failed or was answered with an error status.
    #[error("Failed to open progress channel: {0}")]
    Open(String),
}

/// Channel transport backed by the backend's server-sent events endpoint.
pub struct SseChannelTransport {
    api: Arc<JobServiceApi>,
    idle_timeout: Duration,
}

impl SseChannelTransport {
    /// `idle_timeout` bounds the silence between two stream chunks.
    pub fn new(api: Arc<JobServiceApi>, idle_timeout: Duration) -> Self {
        Self { api, idle_timeout }
    }
}

#[async_trait]
impl ChannelTransport for SseChannelTransport {
    async fn open(&self, job_id: &JobId) -> Result<Box<dyn ChannelHandle>, TransportError> {
        let response = self
            .api
            .open_progress_stream(job_id)
            .await
            .map_err(|e| TransportError::Open(e.to_string()))?;

        tracing::info!(job_id = %job_id, "Progress channel opened");

        Ok(Box::new(SseChannel::new(
            job_id.clone(),
            response.bytes_stream().boxed(),
            self.idle_timeout,
        )))
    }
}

/// An open server-sent events stream for one run.
pub struct SseChannel {
    job_id: JobId,
    stream: Option<BoxStream<'static, Result<Bytes, reqwest::Error>>>,
    decoder: SseDecoder,
    pending: VecDeque<SseFrame>,
    idle_timeout: Duration,
}

impl SseChannel {
    pub fn new(
        job_id: JobId,
        stream: BoxStream<'static, Result<Bytes, reqwest::Error>>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            job_id,
            stream: Some(stream),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            idle_timeout,
        }
    }

    /// Close the stream and report the failure exactly once.
    fn fail(&mut self, detail: String) -> Option<ChannelMessage> {
        self.close();
        Some(ChannelMessage::TransportFailure { detail })
    }

    /// Turn a decoded frame into a message, or `None` to skip it.
    fn interpret(&self, frame: &SseFrame) -> Option<ChannelMessage> {
        match parse_frame(frame) {
            Ok(Some(msg)) => Some(msg),
            Ok(None) => {
                tracing::trace!(job_id = %self.job_id, event = %frame.event, "Ignoring untracked event");
                None
            }
            Err(e) if frame.event == EVENT_PROGRESS => {
                tracing::warn!(
                    job_id = %self.job_id,
                    error = %e,
                    "Skipping malformed progress event",
                );
                None
            }
            Err(e) => Some(ChannelMessage::Malformed {
                event: frame.event.clone(),
                detail: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl ChannelHandle for SseChannel {
    async fn next_message(&mut self) -> Option<ChannelMessage> {
        loop {
            self.stream.as_ref()?;

            while let Some(frame) = self.pending.pop_front() {
                if let Some(msg) = self.interpret(&frame) {
                    return Some(msg);
                }
            }

            let idle = self.idle_timeout;
            let next = tokio::time::timeout(idle, self.stream.as_mut()?.next()).await;
            let Ok(chunk) = next else {
                tracing::warn!(job_id = %self.job_id, ?idle, "Progress channel went silent");
                return self.fail(format!("no data for {idle:?}"));
            };

            match chunk {
                Some(Ok(bytes)) => match self.decoder.push(&bytes) {
                    Ok(frames) => self.pending.extend(frames),
                    Err(e) => {
                        tracing::warn!(job_id = %self.job_id, error = %e, "Progress channel sent an oversized line");
                        return self.fail(e.to_string());
                    }
                },
                Some(Err(e)) => {
                    tracing::warn!(job_id = %self.job_id, error = %e, "Progress channel receive error");
                    return self.fail(e.to_string());
                }
                None => {
                    tracing::info!(job_id = %self.job_id, "Progress channel ended without a terminal event");
                    return self.fail("stream ended".into());
                }
            }
        }
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            self.pending.clear();
            tracing::debug!(job_id = %self.job_id, "Progress channel closed");
        }
    }
}
