//! Stream emitter
//!
//! Serializes the ordered stream events of one request into SSE frames. Frames are
//! pushed through a bounded channel in the order they are emitted; closing the
//! emitter drops the sender, which ends the client's stream.

use crate::events::{OutboundEvent, SseFrame, StatusLevel, StreamEvent};
use log::{debug, trace, warn};
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EmitError {
    #[error("Stream already closed")]
    Closed,
    #[error("Client disconnected")]
    Disconnected,
}

impl From<StreamEvent> for OutboundEvent {
    fn from(event: StreamEvent) -> Self {
        match event {
            StreamEvent::WidgetDataRequest(sources) => OutboundEvent::GetWidgetData(sources),
            StreamEvent::TextChunk(delta) => OutboundEvent::MessageChunk { delta },
            StreamEvent::Chart(chart) => OutboundEvent::Chart(chart),
            StreamEvent::Table(table) => OutboundEvent::Table(table),
            StreamEvent::UpdateWidget(source) => OutboundEvent::UpdateWidgetInDashboard(source),
            StreamEvent::AddWidget(source) => OutboundEvent::AddWidgetToDashboard(source),
            StreamEvent::Citations(citations) => OutboundEvent::Citations(citations),
        }
    }
}

pub struct StreamEmitter {
    tx: Option<mpsc::Sender<SseFrame>>,
    emitted: usize,
}

impl StreamEmitter {
    /// Creates an emitter and the receiving end that feeds the HTTP response body.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SseFrame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx: Some(tx),
                emitted: 0,
            },
            rx,
        )
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }

    /// Number of frames delivered so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub async fn emit(&mut self, event: StreamEvent) -> Result<(), EmitError> {
        self.send(OutboundEvent::from(event)).await
    }

    /// Emits the single terminal error indication and closes the stream.
    pub async fn fail(&mut self, message: impl Into<String>) -> Result<(), EmitError> {
        let result = self
            .send(OutboundEvent::StatusUpdate {
                level: StatusLevel::Error,
                message: message.into(),
            })
            .await;
        self.close();
        result
    }

    pub fn close(&mut self) {
        if self.tx.take().is_some() {
            debug!("Stream closed: emitted={}", self.emitted);
        }
    }

    async fn send(&mut self, event: OutboundEvent) -> Result<(), EmitError> {
        let Some(tx) = self.tx.as_ref() else {
            warn!("Dropping {} event: stream already closed", event.kind());
            return Err(EmitError::Closed);
        };

        let frame = event.to_frame();
        trace!("Emitting SSE frame: kind={}, data={}", frame.kind, frame.data);
        if tx.send(frame).await.is_err() {
            debug!("Client went away after {} events", self.emitted);
            self.tx = None;
            return Err(EmitError::Disconnected);
        }
        self.emitted += 1;
        Ok(())
    }
}
