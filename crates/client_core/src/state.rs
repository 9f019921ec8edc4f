//! The submission state machine as plain data plus a reducer.
//!
//! `WorkflowSnapshot::apply` is the only way the state changes; the controller
//! wraps it and presentation only ever reads snapshots.

use shared::error::ErrorDescriptor;
use url::Url;

use crate::{
    progress::{blend, TransferPhase},
    transport::TransferEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Validating,
    Uploading,
    Processing,
    Succeeded,
    Failed,
}

impl Phase {
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            Phase::Validating | Phase::Uploading | Phase::Processing
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Failed)
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Validating => "Validating...",
            Phase::Uploading => "Uploading...",
            Phase::Processing => "Processing...",
            Phase::Succeeded => "Done",
            Phase::Failed => "Failed",
        }
    }
}

/// Absolute location of a generated result. Only valid for the service's
/// retention window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultReference(Url);

impl ResultReference {
    pub fn resolve(base: &Url, locator: &str) -> Result<Self, url::ParseError> {
        base.join(locator.trim().trim_start_matches('/')).map(Self)
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for ResultReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum Transition {
    /// A submit request arrived; ignored while a call is in flight.
    Begin,
    Accepted,
    Rejected(ErrorDescriptor),
    Transfer(TransferEvent),
    Succeeded(ResultReference),
    Failed(ErrorDescriptor),
    /// Clears a terminal state back to `Idle`; no effect while in flight.
    Reset,
    /// Abandons an in-flight call and returns to `Idle`.
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowSnapshot {
    pub phase: Phase,
    pub progress: u8,
    pub result: Option<ResultReference>,
    pub error: Option<ErrorDescriptor>,
}

impl WorkflowSnapshot {
    /// Applies one transition, returning whether anything changed.
    pub fn apply(&mut self, transition: Transition) -> bool {
        let before = self.clone();
        match transition {
            Transition::Begin => {
                if self.phase.is_in_flight() {
                    return false;
                }
                *self = Self {
                    phase: Phase::Validating,
                    ..Self::default()
                };
            }
            Transition::Accepted if self.phase == Phase::Validating => {
                self.phase = Phase::Uploading;
                self.progress = 0;
            }
            Transition::Rejected(error) if self.phase == Phase::Validating => {
                self.fail(error);
            }
            Transition::Transfer(event) => self.apply_transfer(event),
            Transition::Succeeded(result) if self.phase.is_in_flight() => {
                self.phase = Phase::Succeeded;
                self.progress = 100;
                self.result = Some(result);
                self.error = None;
            }
            Transition::Failed(error) if self.phase.is_in_flight() => {
                self.fail(error);
            }
            Transition::Reset if !self.phase.is_in_flight() => {
                *self = Self::default();
            }
            Transition::Cancelled if self.phase.is_in_flight() => {
                *self = Self::default();
            }
            Transition::Accepted
            | Transition::Rejected(_)
            | Transition::Succeeded(_)
            | Transition::Failed(_)
            | Transition::Reset
            | Transition::Cancelled => {}
        }
        *self != before
    }

    fn fail(&mut self, error: ErrorDescriptor) {
        self.phase = Phase::Failed;
        self.progress = 0;
        self.result = None;
        self.error = Some(error);
    }

    fn apply_transfer(&mut self, event: TransferEvent) {
        match (self.phase, event) {
            (Phase::Uploading, TransferEvent::UploadProgress { sent, total }) => {
                self.raise(blend(TransferPhase::Upload, sent, Some(total)));
            }
            (Phase::Uploading, TransferEvent::UploadComplete) => {
                self.enter_processing();
            }
            (Phase::Uploading, TransferEvent::DownloadProgress { received, total }) => {
                self.enter_processing();
                self.raise(blend(TransferPhase::Processing, received, total));
            }
            (Phase::Processing, TransferEvent::DownloadProgress { received, total }) => {
                self.raise(blend(TransferPhase::Processing, received, total));
            }
            // Late upload events after the phase moved on carry no information.
            _ => {}
        }
    }

    fn enter_processing(&mut self) {
        self.phase = Phase::Processing;
        self.raise(TransferPhase::Processing.floor());
    }

    fn raise(&mut self, progress: u8) {
        self.progress = self.progress.max(progress);
    }
}
