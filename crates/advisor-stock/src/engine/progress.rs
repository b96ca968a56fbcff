//! Workflow progress notifications

use crate::domain::{Dimension, Symbol, Verdict};
use crate::error::{DimensionError, Stage};
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    StageStarted {
        run_id: Uuid,
        stage: Stage,
    },
    SpecialistCompleted {
        run_id: Uuid,
        dimension: Dimension,
    },
    SpecialistFailed {
        run_id: Uuid,
        dimension: Dimension,
        error: DimensionError,
    },
    VerdictReached {
        run_id: Uuid,
        symbol: Symbol,
        verdict: Verdict,
    },
    Failed {
        run_id: Uuid,
        stage: Stage,
        reason: String,
    },
}

impl WorkflowEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            Self::StageStarted { run_id, .. }
            | Self::SpecialistCompleted { run_id, .. }
            | Self::SpecialistFailed { run_id, .. }
            | Self::VerdictReached { run_id, .. }
            | Self::Failed { run_id, .. } => *run_id,
        }
    }
}

/// Receives events as a run advances; must not block
pub trait ProgressListener: Send + Sync {
    fn on_event(&self, event: &WorkflowEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl ProgressListener for NoopListener {
    fn on_event(&self, _event: &WorkflowEvent) {}
}

/// Logs each event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl ProgressListener for TracingListener {
    fn on_event(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::StageStarted { run_id, stage } => {
                tracing::info!(%run_id, %stage, "stage started");
            }
            WorkflowEvent::SpecialistCompleted { run_id, dimension } => {
                tracing::info!(%run_id, %dimension, "specialist completed");
            }
            WorkflowEvent::SpecialistFailed {
                run_id,
                dimension,
                error,
            } => {
                tracing::warn!(%run_id, %dimension, %error, "specialist failed");
            }
            WorkflowEvent::VerdictReached {
                run_id,
                symbol,
                verdict,
            } => {
                tracing::info!(%run_id, %symbol, %verdict, "verdict reached");
            }
            WorkflowEvent::Failed { run_id, stage, reason } => {
                tracing::error!(%run_id, %stage, %reason, "workflow failed");
            }
        }
    }
}

/// Forwards events into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<WorkflowEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WorkflowEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressListener for ChannelListener {
    fn on_event(&self, event: &WorkflowEvent) {
        // receiver gone means nobody is watching
        let _ = self.tx.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_listener_forwards() {
        let (listener, mut rx) = ChannelListener::new();
        let run_id = Uuid::new_v4();
        listener.on_event(&WorkflowEvent::StageStarted {
            run_id,
            stage: Stage::Validation,
        });
        drop(listener);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.run_id(), run_id);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_channel_listener_tolerates_closed_receiver() {
        let (listener, rx) = ChannelListener::new();
        drop(rx);
        listener.on_event(&WorkflowEvent::Failed {
            run_id: Uuid::new_v4(),
            stage: Stage::Consolidation,
            reason: "none".to_string(),
        });
    }

    #[test]
    fn test_event_serializes_tagged() {
        let json = serde_json::to_value(WorkflowEvent::SpecialistCompleted {
            run_id: Uuid::nil(),
            dimension: Dimension::Price,
        })
        .unwrap();
        assert_eq!(json["event"], "specialist_completed");
        assert_eq!(json["dimension"], "price");
    }
}
