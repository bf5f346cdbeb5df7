//! Widget retrieval state machine
//!
//! `Init -> AwaitingWidgetData -> Ready -> Streaming -> Terminated`, plus the
//! timeout edge `AwaitingWidgetData -> Ready`. One coordinator per request.

use super::context::format_widget_context;
use super::phase2::{build_citations, extract_widget_results, source_refs, WidgetResult};
use crate::util::errors::{NexusError, NexusResult};
use crate::util::types::{Message, QueryRequest};
use log::{debug, info, warn};
use nexus_agent_transport::{Citation, WidgetDataSource};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalState {
    Init,
    AwaitingWidgetData,
    Ready,
    Streaming,
    Terminated,
}

impl RetrievalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalState::Init => "init",
            RetrievalState::AwaitingWidgetData => "awaiting_widget_data",
            RetrievalState::Ready => "ready",
            RetrievalState::Streaming => "streaming",
            RetrievalState::Terminated => "terminated",
        }
    }
}

/// What the pipeline must do after `start`.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalStart {
    /// Go straight to the backend
    Ready,
    /// Phase 1: ask the client for these widgets' data, then wait
    FetchWidgetData(Vec<WidgetDataSource>),
    /// Tool callback without widget data: end without emitting anything
    Silent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase2Outcome {
    Accepted,
    NoWidgetData,
}

#[derive(Debug)]
pub struct WidgetRetrievalCoordinator {
    state: RetrievalState,
    requested: Vec<WidgetDataSource>,
    results: Vec<WidgetResult>,
    citations: Vec<Citation>,
    timed_out: bool,
}

impl Default for WidgetRetrievalCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl WidgetRetrievalCoordinator {
    pub fn new() -> Self {
        Self {
            state: RetrievalState::Init,
            requested: Vec::new(),
            results: Vec::new(),
            citations: Vec::new(),
            timed_out: false,
        }
    }

    pub fn state(&self) -> RetrievalState {
        self.state
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn results(&self) -> &[WidgetResult] {
        &self.results
    }

    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    /// Decides whether a widget round trip is needed for `request`.
    pub fn start(&mut self, request: &QueryRequest) -> NexusResult<RetrievalStart> {
        match request.last_message() {
            Some(last) if last.is_tool() => {
                self.transition(RetrievalState::Init, RetrievalState::AwaitingWidgetData)?;
                info!("Phase 2: resuming with the client's tool reply");
                match self.accept_tool_response(request, last)? {
                    Phase2Outcome::Accepted => Ok(RetrievalStart::Ready),
                    Phase2Outcome::NoWidgetData => Ok(RetrievalStart::Silent),
                }
            }
            Some(last) if last.is_human() && !request.primary_widgets().is_empty() => {
                self.transition(RetrievalState::Init, RetrievalState::AwaitingWidgetData)?;
                self.requested = phase1_sources(request);
                info!(
                    "Phase 1: requesting widget data: widgets={}",
                    self.requested.len()
                );
                Ok(RetrievalStart::FetchWidgetData(self.requested.clone()))
            }
            _ => {
                self.transition(RetrievalState::Init, RetrievalState::Ready)?;
                Ok(RetrievalStart::Ready)
            }
        }
    }

    /// Consumes the client's Phase-2 reply.
    pub fn accept_tool_response(
        &mut self,
        request: &QueryRequest,
        reply: &Message,
    ) -> NexusResult<Phase2Outcome> {
        if self.state != RetrievalState::AwaitingWidgetData {
            return Err(self.illegal(RetrievalState::Ready));
        }

        let refs = source_refs(reply, &self.requested);
        let results = extract_widget_results(reply, request, &refs);
        if results.is_empty() {
            info!("Tool callback carries no widget data; ending silently");
            self.transition(
                RetrievalState::AwaitingWidgetData,
                RetrievalState::Terminated,
            )?;
            return Ok(Phase2Outcome::NoWidgetData);
        }

        self.citations = build_citations(request, &refs);
        self.results = results;
        self.transition(RetrievalState::AwaitingWidgetData, RetrievalState::Ready)?;
        Ok(Phase2Outcome::Accepted)
    }

    /// No reply arrived within `waited`; continue without widget data.
    pub fn expire(&mut self, waited: Duration) -> NexusResult<()> {
        self.transition(RetrievalState::AwaitingWidgetData, RetrievalState::Ready)?;
        self.timed_out = true;
        warn!("{}; continuing without widget data", NexusError::WidgetRetrievalTimeout(waited));
        Ok(())
    }

    pub fn begin_streaming(&mut self) -> NexusResult<()> {
        self.transition(RetrievalState::Ready, RetrievalState::Streaming)
    }

    /// Ends the request from any state. Idempotent.
    pub fn terminate(&mut self) {
        if self.state != RetrievalState::Terminated {
            debug!(
                "Widget retrieval: {} -> {}",
                self.state.as_str(),
                RetrievalState::Terminated.as_str()
            );
            self.state = RetrievalState::Terminated;
        }
    }

    /// Backend widget context for the current state of the round trip.
    pub fn widget_context(&self, request: &QueryRequest) -> Option<String> {
        format_widget_context(request, &self.results)
    }

    fn transition(&mut self, from: RetrievalState, to: RetrievalState) -> NexusResult<()> {
        if self.state != from {
            return Err(self.illegal(to));
        }
        debug!("Widget retrieval: {} -> {}", from.as_str(), to.as_str());
        self.state = to;
        Ok(())
    }

    fn illegal(&self, to: RetrievalState) -> NexusError {
        NexusError::InvalidStateTransition {
            from: self.state.as_str(),
            to: to.as_str(),
        }
    }
}

fn phase1_sources(request: &QueryRequest) -> Vec<WidgetDataSource> {
    request
        .primary_widgets()
        .iter()
        .map(|widget| WidgetDataSource {
            widget_uuid: Some(widget.uuid.clone()),
            origin: widget.origin.clone(),
            id: widget.widget_id.clone(),
            input_args: widget.current_params(),
        })
        .collect()
}
