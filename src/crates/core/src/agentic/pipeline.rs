//! Query pipeline
//!
//! Drives one request end to end: local commands, the widget round trip, the
//! backend call and artifact translation, feeding a `StreamEmitter`. Each request
//! runs on its own task; dropping the returned `EventStream` cancels it.

use super::artifacts::ArtifactTranslator;
use super::commands::ChatCommand;
use super::widget_retrieval::{
    Phase2Outcome, RetrievalStart, RetrievalState, WidgetRetrievalCoordinator,
};
use crate::infrastructure::backend::{BackendItem, ChatBackend, ChatCall};
use crate::service::context::AdapterContext;
use crate::service::session::SessionStore;
use crate::util::errors::NexusError;
use crate::util::types::{ArtifactValidationWarning, Message, QueryRequest};
use futures::Stream;
use log::{debug, error, info, warn};
use nexus_agent_transport::{EmitError, SseFrame, StreamEmitter, StreamEvent};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Outcome of one request, for logs and tests.
#[derive(Debug)]
pub struct RunReport {
    pub final_state: RetrievalState,
    pub warnings: Vec<ArtifactValidationWarning>,
    /// Session id sent to or returned by the backend
    pub session_id: Option<String>,
    pub widget_timeout: bool,
    pub cancelled: bool,
    pub events_emitted: usize,
    pub error: Option<NexusError>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            final_state: RetrievalState::Init,
            warnings: Vec::new(),
            session_id: None,
            widget_timeout: false,
            cancelled: false,
            events_emitted: 0,
            error: None,
        }
    }
}

/// Client-facing frames of one request. Dropping it cancels the request.
pub struct EventStream {
    frames: ReceiverStream<SseFrame>,
    _cancel_on_drop: DropGuard,
}

impl Stream for EventStream {
    type Item = SseFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.frames).poll_next(cx)
    }
}

pub struct QueryRun {
    pub events: EventStream,
    pub handle: JoinHandle<RunReport>,
}

enum Halt {
    Cancelled,
    Failed(NexusError),
}

impl From<NexusError> for Halt {
    fn from(error: NexusError) -> Self {
        Halt::Failed(error)
    }
}

impl From<EmitError> for Halt {
    fn from(_: EmitError) -> Self {
        Halt::Cancelled
    }
}

#[derive(Clone)]
pub struct QueryPipeline {
    ctx: Arc<AdapterContext>,
    backend: Arc<dyn ChatBackend>,
    sessions: Arc<SessionStore>,
}

impl QueryPipeline {
    pub fn new(
        ctx: Arc<AdapterContext>,
        backend: Arc<dyn ChatBackend>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            ctx,
            backend,
            sessions,
        }
    }

    pub fn context(&self) -> &AdapterContext {
        &self.ctx
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Runs the request on a new task.
    ///
    /// With `follow_up`, the Phase-2 reply is awaited in-process (bounded by the
    /// configured timeout). Without it, the stream closes after the Phase-1 event
    /// and the client resumes with its next request.
    pub fn spawn(
        &self,
        request: QueryRequest,
        token: String,
        follow_up: Option<mpsc::Receiver<Message>>,
    ) -> QueryRun {
        let (emitter, rx) = StreamEmitter::channel(self.ctx.settings.channel_capacity);
        let cancel = CancellationToken::new();
        let events = EventStream {
            frames: ReceiverStream::new(rx),
            _cancel_on_drop: cancel.clone().drop_guard(),
        };

        let pipeline = self.clone();
        let handle = tokio::spawn(async move {
            pipeline
                .execute(request, token, emitter, follow_up, cancel)
                .await
        });
        QueryRun { events, handle }
    }

    pub async fn execute(
        &self,
        request: QueryRequest,
        token: String,
        mut emitter: StreamEmitter,
        follow_up: Option<mpsc::Receiver<Message>>,
        cancel: CancellationToken,
    ) -> RunReport {
        let mut report = RunReport::new();
        let mut coordinator = WidgetRetrievalCoordinator::new();

        let outcome = self
            .run(
                &request,
                &token,
                &mut emitter,
                follow_up,
                &cancel,
                &mut coordinator,
                &mut report,
            )
            .await;

        match outcome {
            Ok(()) => {}
            Err(Halt::Cancelled) => {
                info!("Request cancelled: client disconnected");
                report.cancelled = true;
            }
            Err(Halt::Failed(error)) => {
                error!("Request failed: {}", error);
                if emitter.fail(error.to_string()).await.is_err() {
                    debug!("Error indication not delivered: stream already gone");
                }
                report.error = Some(error);
            }
        }

        emitter.close();
        coordinator.terminate();
        report.final_state = coordinator.state();
        report.events_emitted = emitter.emitted();
        report.widget_timeout = coordinator.timed_out();
        report
    }

    #[allow(clippy::too_many_arguments)]
    async fn run(
        &self,
        request: &QueryRequest,
        token: &str,
        emitter: &mut StreamEmitter,
        follow_up: Option<mpsc::Receiver<Message>>,
        cancel: &CancellationToken,
        coordinator: &mut WidgetRetrievalCoordinator,
        report: &mut RunReport,
    ) -> Result<(), Halt> {
        if let Some(command) = ChatCommand::detect(request) {
            info!("Answering chat command locally: {:?}", command);
            let reply = command.reply(&self.ctx.catalog);
            emitter.emit(StreamEvent::TextChunk(reply)).await?;
            return Ok(());
        }

        let mut messages = request.messages.clone();
        match coordinator.start(request)? {
            RetrievalStart::Silent => return Ok(()),
            RetrievalStart::Ready => {}
            RetrievalStart::FetchWidgetData(sources) => {
                emitter.emit(StreamEvent::WidgetDataRequest(sources)).await?;
                let Some(mut follow_up) = follow_up else {
                    info!("Phase 1 sent; the client resumes with its next request");
                    return Ok(());
                };

                let wait = self.ctx.settings.phase2_timeout;
                let reply = tokio::select! {
                    _ = cancel.cancelled() => return Err(Halt::Cancelled),
                    reply = timeout(wait, follow_up.recv()) => reply,
                };
                match reply {
                    Ok(Some(reply)) => {
                        if coordinator.accept_tool_response(request, &reply)?
                            == Phase2Outcome::NoWidgetData
                        {
                            return Ok(());
                        }
                        messages.push(reply);
                    }
                    Ok(None) => {
                        warn!("Phase-2 channel closed without a reply");
                        coordinator.expire(wait)?;
                    }
                    Err(_) => coordinator.expire(wait)?,
                }
            }
        }

        let message = request.latest_human_text().unwrap_or_default();
        let session_id = self.sessions.resolve(token, request.session_id.as_deref());
        report.session_id = session_id.clone();

        let call = ChatCall {
            message,
            messages,
            token: token.to_string(),
            session_id,
            widget_context: coordinator.widget_context(request),
            client_context: self.ctx.settings.client_context.clone(),
        };

        coordinator.begin_streaming()?;
        let mut reply = tokio::select! {
            _ = cancel.cancelled() => return Err(Halt::Cancelled),
            reply = self.backend.chat(call) => reply?,
        };

        let translator = ArtifactTranslator::new(request);
        let mut returned_session = None;
        loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => return Err(Halt::Cancelled),
                item = reply.next() => item,
            };
            match item {
                None => break,
                Some(Err(error)) => return Err(Halt::Failed(error)),
                Some(Ok(BackendItem::TextChunk(text))) => {
                    emitter.emit(StreamEvent::TextChunk(text)).await?;
                }
                Some(Ok(BackendItem::Artifact(payload))) => match translator.translate(payload) {
                    Ok(event) => emitter.emit(event).await?,
                    Err(warning) => {
                        warn!("{}", warning);
                        report.warnings.push(warning);
                    }
                },
                Some(Ok(BackendItem::Session(session_id))) => returned_session = Some(session_id),
            }
        }

        if let Some(session_id) = returned_session {
            self.sessions.remember(token, &session_id);
            report.session_id = Some(session_id);
        }

        let citations = coordinator.citations().to_vec();
        if !citations.is_empty() {
            info!("Emitting citations: count={}", citations.len());
            emitter.emit(StreamEvent::Citations(citations)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::backend::BackendReply;
    use crate::service::catalog::WidgetCatalog;
    use crate::service::context::AdapterSettings;
    use crate::util::errors::NexusResult;
    use crate::util::types::WidgetDescriptor;
    use async_trait::async_trait;
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records calls and answers with a fixed script.
    struct ScriptedBackend {
        items: Vec<NexusResult<BackendItem>>,
        calls: Mutex<Vec<ChatCall>>,
    }

    impl ScriptedBackend {
        fn new(items: Vec<NexusResult<BackendItem>>) -> Arc<Self> {
            Arc::new(Self {
                items,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<ChatCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn chat(&self, call: ChatCall) -> NexusResult<BackendReply> {
            self.calls.lock().unwrap().push(call);
            let items = self
                .items
                .iter()
                .map(|item| match item {
                    Ok(item) => Ok(item.clone()),
                    Err(error) => Err(NexusError::BackendUnavailable(error.to_string())),
                })
                .collect();
            Ok(BackendReply::from_items(items))
        }
    }

    fn pipeline(backend: Arc<ScriptedBackend>, phase2_timeout: Duration) -> QueryPipeline {
        let settings = AdapterSettings {
            phase2_timeout,
            ..AdapterSettings::default()
        };
        QueryPipeline::new(
            Arc::new(AdapterContext::new(settings, WidgetCatalog::empty())),
            backend,
            Arc::new(SessionStore::new()),
        )
    }

    fn stock_widget() -> WidgetDescriptor {
        serde_json::from_value(json!({
            "uuid": "abc",
            "origin": "viaNexus Widgets",
            "widget_id": "stock_stats",
            "params": [{"name": "symbol", "current_value": "AAPL"}]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn in_process_phase2_reaches_the_backend() {
        let backend = ScriptedBackend::new(vec![Ok(BackendItem::TextChunk(
            "AAPL trades at 150.25".to_string(),
        ))]);
        let pipeline = pipeline(backend.clone(), Duration::from_secs(5));
        let request = QueryRequest::new(vec![Message::human("What's the current price?")])
            .with_widgets(vec![stock_widget()]);

        let (reply_tx, reply_rx) = mpsc::channel(1);
        let mut run = pipeline.spawn(request, "tok".to_string(), Some(reply_rx));

        let first = run.events.next().await.unwrap();
        assert_eq!(first.kind, "get_widget_data");
        assert!(backend.calls().is_empty());

        reply_tx
            .send(Message::tool(json!([{"uuid": "abc", "price": 150.25}])))
            .await
            .unwrap();

        let rest: Vec<SseFrame> = run.events.collect().await;
        let kinds: Vec<&str> = rest.iter().map(|frame| frame.kind).collect();
        assert_eq!(kinds, vec!["message_chunk", "citations"]);

        let report = run.handle.await.unwrap();
        assert_eq!(report.final_state, RetrievalState::Terminated);
        let calls = backend.calls();
        assert!(calls[0].widget_context.as_deref().unwrap().contains("150.25"));
        assert_eq!(calls[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn missing_phase2_reply_degrades_after_timeout() {
        let backend = ScriptedBackend::new(vec![Ok(BackendItem::TextChunk("ok".to_string()))]);
        let pipeline = pipeline(backend.clone(), Duration::from_millis(50));
        let request = QueryRequest::new(vec![Message::human("price?")])
            .with_widgets(vec![stock_widget()]);

        let (_reply_tx, reply_rx) = mpsc::channel(1);
        let run = pipeline.spawn(request, "tok".to_string(), Some(reply_rx));
        let frames: Vec<SseFrame> = run.events.collect().await;
        let kinds: Vec<&str> = frames.iter().map(|frame| frame.kind).collect();
        assert_eq!(kinds, vec!["get_widget_data", "message_chunk"]);

        let report = run.handle.await.unwrap();
        assert!(report.widget_timeout);
        assert!(report.error.is_none());
        let context = backend.calls()[0].widget_context.clone().unwrap();
        assert!(!context.contains("Use the following data"));
    }

    #[tokio::test]
    async fn backend_failure_ends_with_one_error_event() {
        let backend = ScriptedBackend::new(vec![
            Ok(BackendItem::TextChunk("partial".to_string())),
            Err(NexusError::BackendUnavailable("idle".to_string())),
            Ok(BackendItem::TextChunk("never".to_string())),
        ]);
        let pipeline = pipeline(backend, Duration::from_secs(1));
        let run = pipeline.spawn(
            QueryRequest::new(vec![Message::human("hi")]),
            "tok".to_string(),
            None,
        );

        let frames: Vec<SseFrame> = run.events.collect().await;
        let kinds: Vec<&str> = frames.iter().map(|frame| frame.kind).collect();
        assert_eq!(kinds, vec!["message_chunk", "status_update"]);
        assert_eq!(frames[1].data_json().unwrap()["eventType"], "ERROR");

        let report = run.handle.await.unwrap();
        assert!(report.error.unwrap().is_backend_failure());
    }

    #[tokio::test]
    async fn returned_session_is_remembered_for_the_token() {
        let backend = ScriptedBackend::new(vec![
            Ok(BackendItem::Session("s-42".to_string())),
            Ok(BackendItem::TextChunk("hello".to_string())),
        ]);
        let pipeline = pipeline(backend.clone(), Duration::from_secs(1));

        let run = pipeline.spawn(
            QueryRequest::new(vec![Message::human("hi")]),
            "tok".to_string(),
            None,
        );
        let _: Vec<SseFrame> = run.events.collect().await;
        assert_eq!(run.handle.await.unwrap().session_id.as_deref(), Some("s-42"));

        let run = pipeline.spawn(
            QueryRequest::new(vec![Message::human("again")]),
            "tok".to_string(),
            None,
        );
        let _: Vec<SseFrame> = run.events.collect().await;
        run.handle.await.unwrap();

        let calls = backend.calls();
        assert_eq!(calls[0].session_id, None);
        assert_eq!(calls[1].session_id.as_deref(), Some("s-42"));
    }

    #[tokio::test]
    async fn dropping_the_stream_cancels_the_phase2_wait() {
        let backend = ScriptedBackend::new(Vec::new());
        let pipeline = pipeline(backend.clone(), Duration::from_secs(30));
        let request = QueryRequest::new(vec![Message::human("price?")])
            .with_widgets(vec![stock_widget()]);

        let (_reply_tx, reply_rx) = mpsc::channel(1);
        let mut run = pipeline.spawn(request, "tok".to_string(), Some(reply_rx));
        assert_eq!(run.events.next().await.unwrap().kind, "get_widget_data");
        drop(run.events);

        let report = tokio::time::timeout(Duration::from_secs(5), run.handle)
            .await
            .unwrap()
            .unwrap();
        assert!(report.cancelled);
        assert!(backend.calls().is_empty());
    }
}
