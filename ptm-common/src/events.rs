//! Event types and broadcast bus for PTM services

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events emitted by the media service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MediaEvent {
    /// Import batch accepted (validation passed)
    ImportStarted {
        test_id: Uuid,
        total_files: usize,
        timestamp: DateTime<Utc>,
    },

    /// One file of a batch finished importing
    ImportProgress {
        test_id: Uuid,
        current: usize,
        total: usize,
        filename: String,
        timestamp: DateTime<Utc>,
    },

    /// Whole batch imported
    ImportCompleted {
        test_id: Uuid,
        imported: usize,
        timestamp: DateTime<Utc>,
    },

    /// Batch aborted; `imported` files before the failure stay committed
    ImportFailed {
        test_id: Uuid,
        imported: usize,
        error: String,
        timestamp: DateTime<Utc>,
    },

    SyncEstimateStarted {
        test_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    SyncEstimateCompleted {
        test_id: Uuid,
        offset_seconds: f64,
        confidence: f64,
        method: String,
        timestamp: DateTime<Utc>,
    },

    /// Estimate cancelled; sync configuration left unchanged
    SyncEstimateCancelled {
        test_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    ReconcileCompleted {
        relinked: usize,
        created: usize,
        deduplicated: usize,
        repointed: usize,
        skipped: usize,
        hash_failures: usize,
        timestamp: DateTime<Utc>,
    },

    ExportCompleted {
        test_id: Uuid,
        asset_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    ExportFailed {
        test_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl MediaEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            MediaEvent::ImportStarted { .. } => "ImportStarted",
            MediaEvent::ImportProgress { .. } => "ImportProgress",
            MediaEvent::ImportCompleted { .. } => "ImportCompleted",
            MediaEvent::ImportFailed { .. } => "ImportFailed",
            MediaEvent::SyncEstimateStarted { .. } => "SyncEstimateStarted",
            MediaEvent::SyncEstimateCompleted { .. } => "SyncEstimateCompleted",
            MediaEvent::SyncEstimateCancelled { .. } => "SyncEstimateCancelled",
            MediaEvent::ReconcileCompleted { .. } => "ReconcileCompleted",
            MediaEvent::ExportCompleted { .. } => "ExportCompleted",
            MediaEvent::ExportFailed { .. } => "ExportFailed",
        }
    }
}

/// Broadcast bus for [`MediaEvent`]s
///
/// Built on `tokio::sync::broadcast`: publishing never blocks, slow
/// subscribers see `Lagged` instead of stalling producers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MediaEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<MediaEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: MediaEvent,
    ) -> Result<usize, broadcast::error::SendError<MediaEvent>> {
        self.tx.send(event)
    }

    /// Emit, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: MediaEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("No subscribers for media event");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let test_id = Uuid::new_v4();

        bus.emit(MediaEvent::SyncEstimateStarted {
            test_id,
            timestamp: Utc::now(),
        })
        .unwrap();

        match rx.recv().await.unwrap() {
            MediaEvent::SyncEstimateStarted { test_id: got, .. } => assert_eq!(got, test_id),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        let event = MediaEvent::ImportCompleted {
            test_id: Uuid::new_v4(),
            imported: 1,
            timestamp: Utc::now(),
        };
        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.capacity(), 4);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = MediaEvent::ImportProgress {
            test_id: Uuid::nil(),
            current: 1,
            total: 2,
            filename: "a.mov".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ImportProgress");
        assert_eq!(event.event_type(), "ImportProgress");
    }
}
