use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Why a thread was closed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    BudgetExhausted,
    ExternalSignal,
}

/// Events emitted by the engine for an external observability or demo layer.
///
/// Advisory only: subscribers may lag or drop events, and nothing here feeds
/// back into core invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    DiscoverySelected {
        content_id: String,
        character_id: String,
    },
    EngagementDecided {
        character_id: String,
        subject_id: String,
        probability: f64,
        engaged: bool,
    },
    ReplyRecorded {
        thread_id: String,
        character_id: String,
        is_originating_post: bool,
    },
    ThreadClosed {
        thread_id: String,
        reason: CloseReason,
    },
    ContentDropped {
        content_id: String,
        reason: String,
    },
    CollaboratorFailed {
        character_id: String,
        stage: String,
        message: String,
    },
}

pub type EventSender = broadcast::Sender<EngineEvent>;
pub type EventReceiver = broadcast::Receiver<EngineEvent>;

/// Create a broadcast event bus with the given capacity.
pub fn event_bus(capacity: usize) -> (EventSender, EventReceiver) {
    broadcast::channel(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_send_receive() {
        let (tx, mut rx) = event_bus(16);

        tx.send(EngineEvent::DiscoverySelected {
            content_id: "news_1".to_string(),
            character_id: "nova".to_string(),
        })
        .unwrap();

        let event = rx.recv().await.unwrap();
        match event {
            EngineEvent::DiscoverySelected {
                content_id,
                character_id,
            } => {
                assert_eq!(content_id, "news_1");
                assert_eq!(character_id, "nova");
            }
            other => panic!("expected DiscoverySelected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn event_bus_multiple_receivers() {
        let (tx, mut rx1) = event_bus(16);
        let mut rx2 = tx.subscribe();

        tx.send(EngineEvent::ThreadClosed {
            thread_id: "thread_1".to_string(),
            reason: CloseReason::BudgetExhausted,
        })
        .unwrap();

        assert!(matches!(
            rx1.recv().await.unwrap(),
            EngineEvent::ThreadClosed { .. }
        ));
        assert!(matches!(
            rx2.recv().await.unwrap(),
            EngineEvent::ThreadClosed { .. }
        ));
    }

    #[test]
    fn engine_event_serde_round_trip() {
        let event = EngineEvent::EngagementDecided {
            character_id: "nova".to_string(),
            subject_id: "news_1".to_string(),
            probability: 0.84,
            engaged: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"engagement_decided\""));

        let parsed: EngineEvent = serde_json::from_str(&json).unwrap();
        match parsed {
            EngineEvent::EngagementDecided {
                character_id,
                engaged,
                ..
            } => {
                assert_eq!(character_id, "nova");
                assert!(engaged);
            }
            other => panic!("expected EngagementDecided, got {other:?}"),
        }
    }

    #[test]
    fn close_reason_serializes_snake_case() {
        let json = serde_json::to_string(&CloseReason::ExternalSignal).unwrap();
        assert_eq!(json, "\"external_signal\"");
    }
}
