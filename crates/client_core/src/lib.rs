use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use shared::{
    domain::{Parameters, SubmissionInput},
    error::ErrorDescriptor,
    protocol::GenerateResponse,
};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

pub mod classify;
pub mod config;
pub mod error;
pub mod progress;
pub mod state;
pub mod transport;
pub mod validation;

pub use classify::{classify, classify_rejection};
pub use config::{load_settings, Settings};
pub use error::WorkflowError;
pub use state::{Phase, ResultReference, Transition, WorkflowSnapshot};
pub use transport::{
    GenerateRequest, GenerateTransport, HttpTransport, ProgressSink, TransferEvent,
    TransportError,
};
pub use validation::{validate, RejectReason};

const EVENT_CHANNEL_CAPACITY: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowEvent {
    PhaseChanged { from: Phase, to: Phase },
    ProgressChanged { percent: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Another submission was still in flight; nothing happened.
    Ignored,
    Settled(WorkflowSnapshot),
}

enum CallOutcome {
    Finished(Result<GenerateResponse, TransportError>),
    TimedOut,
    Cancelled,
}

/// Drives one submission at a time through validation, upload, remote
/// processing and a terminal outcome.
///
/// The controller is the only writer of its `WorkflowSnapshot`. Observers read
/// it through [`WorkflowController::snapshot`], [`WorkflowController::watch`]
/// or the event stream from [`WorkflowController::subscribe_events`].
pub struct WorkflowController {
    transport: Arc<dyn GenerateTransport>,
    base_url: Url,
    deadline: Duration,
    state: watch::Sender<WorkflowSnapshot>,
    events: broadcast::Sender<WorkflowEvent>,
    active_call: Mutex<Option<CancellationToken>>,
}

impl WorkflowController {
    pub fn new(transport: Arc<dyn GenerateTransport>, base_url: Url, deadline: Duration) -> Self {
        let (state, _) = watch::channel(WorkflowSnapshot::default());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            transport,
            base_url,
            deadline,
            state,
            events,
            active_call: Mutex::new(None),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, WorkflowError> {
        let base_url = settings.base_url()?;
        let transport = HttpTransport::new(&base_url)?;
        Ok(Self::new(
            Arc::new(transport),
            base_url,
            settings.request_timeout(),
        ))
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<WorkflowSnapshot> {
        self.state.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    /// Runs one submission to a terminal state. A request arriving while a
    /// previous call is unresolved is ignored.
    pub async fn submit(
        &self,
        input: Option<SubmissionInput>,
        parameters: Parameters,
    ) -> SubmitOutcome {
        let token = {
            let mut active = self.lock_active_call();
            if !self.apply(Transition::Begin) {
                warn!("submission ignored: a request is already in flight");
                return SubmitOutcome::Ignored;
            }
            let token = CancellationToken::new();
            *active = Some(token.clone());
            token
        };

        let parameters = parameters.normalized();
        let input = match validate(input.as_ref(), &parameters) {
            Ok(input) => input.clone(),
            Err(reason) => {
                info!(%reason, "submission rejected before upload");
                self.finish(Transition::Rejected(classify_rejection(reason)));
                return SubmitOutcome::Settled(self.snapshot());
            }
        };

        self.apply(Transition::Accepted);
        info!(
            file = input.file_name(),
            bytes = input.size(),
            palette = %parameters.palette,
            pixel_size = parameters.pixel_size,
            "submission accepted"
        );

        let request = GenerateRequest { input, parameters };
        let last = match self.run_call(request, &token).await {
            CallOutcome::Finished(Ok(response)) => {
                match ResultReference::resolve(&self.base_url, &response.result_url) {
                    Ok(result) => {
                        self.apply(Transition::Transfer(TransferEvent::UploadComplete));
                        info!(result = %result, "submission succeeded");
                        Transition::Succeeded(result)
                    }
                    Err(err) => {
                        warn!(locator = %response.result_url, error = %err, "unusable result locator");
                        Transition::Failed(ErrorDescriptor::unknown())
                    }
                }
            }
            CallOutcome::Finished(Err(err)) => {
                let descriptor = classify(&err);
                warn!(error = %err, kind = ?descriptor.kind, "submission failed");
                Transition::Failed(descriptor)
            }
            CallOutcome::TimedOut => {
                warn!(deadline = ?self.deadline, "submission exceeded deadline");
                Transition::Failed(ErrorDescriptor::timeout())
            }
            CallOutcome::Cancelled => {
                info!("submission cancelled");
                Transition::Cancelled
            }
        };
        self.finish(last);
        SubmitOutcome::Settled(self.snapshot())
    }

    /// Aborts the in-flight call, if any. The machine returns to `Idle`.
    pub fn cancel(&self) -> bool {
        match self.lock_active_call().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Clears a terminal state. Does nothing while a call is in flight.
    pub fn reset(&self) -> bool {
        self.apply(Transition::Reset)
    }

    /// Downloads the generated image. Only available after success, and only
    /// while the service still retains the result.
    pub async fn fetch_result(&self) -> Result<Vec<u8>, WorkflowError> {
        let snapshot = self.snapshot();
        let result = match (snapshot.phase, snapshot.result) {
            (Phase::Succeeded, Some(result)) => result,
            _ => return Err(WorkflowError::NoResult),
        };
        debug!(result = %result, "fetching result");
        match tokio::time::timeout(self.deadline, self.transport.fetch(result.url())).await {
            Ok(bytes) => Ok(bytes?),
            Err(_) => Err(TransportError::TimedOut.into()),
        }
    }

    async fn run_call(&self, request: GenerateRequest, token: &CancellationToken) -> CallOutcome {
        let (sink, mut events) = ProgressSink::channel();
        let mut call = self.transport.generate(request, sink);

        let pump = async {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return CallOutcome::Cancelled,
                    Some(event) = events.recv() => {
                        self.apply(Transition::Transfer(event));
                    }
                    result = &mut call => {
                        while let Ok(event) = events.try_recv() {
                            self.apply(Transition::Transfer(event));
                        }
                        return CallOutcome::Finished(result);
                    }
                }
            }
        };

        tokio::time::timeout(self.deadline, pump)
            .await
            .unwrap_or(CallOutcome::TimedOut)
    }

    fn finish(&self, transition: Transition) {
        self.lock_active_call().take();
        self.apply(transition);
    }

    fn apply(&self, transition: Transition) -> bool {
        self.state.send_if_modified(|state| {
            let (from_phase, from_progress) = (state.phase, state.progress);
            if !state.apply(transition) {
                return false;
            }
            if state.phase != from_phase {
                debug!(from = ?from_phase, to = ?state.phase, "workflow phase changed");
                let _ = self.events.send(WorkflowEvent::PhaseChanged {
                    from: from_phase,
                    to: state.phase,
                });
            }
            if state.progress != from_progress {
                let _ = self.events.send(WorkflowEvent::ProgressChanged {
                    percent: state.progress,
                });
            }
            true
        })
    }

    fn lock_active_call(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.active_call
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
