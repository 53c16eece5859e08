//! Push-channel events emitted while a turn is processed.
//!
//! Any duplex transport can carry these; the engine only needs an
//! `EventSink`. `ChannelSink` forwards into a tokio mpsc channel, which is
//! what a socket or SSE handler would drain.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use clinisim_contracts::{
    error::{ClinisimError, ClinisimResult},
    session::SessionId,
};

use crate::traits::EventSink;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum SessionEvent {
    /// The clinician's utterance as received (or transcribed).
    TranscribedText { session_id: SessionId, text: String },
    /// The simulated patient's reply for the turn.
    FinalReply { session_id: SessionId, message: String },
    /// The turn failed. `kind` is `ClinisimError::kind()`.
    Error {
        session_id: SessionId,
        kind: String,
        message: String,
    },
}

impl SessionEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::TranscribedText { .. } => "transcribed-text",
            SessionEvent::FinalReply { .. } => "final-reply",
            SessionEvent::Error { .. } => "error",
        }
    }

    pub fn from_error(session_id: SessionId, err: &ClinisimError) -> Self {
        SessionEvent::Error {
            session_id,
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// `EventSink` over a bounded mpsc sender.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<SessionEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<SessionEvent>) -> Self {
        Self { tx }
    }

    /// A sink and the receiver its events arrive on.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, event: SessionEvent) -> ClinisimResult<()> {
        self.tx.send(event).await.map_err(|e| ClinisimError::Transport {
            reason: format!("client channel closed, dropped '{}' event", e.0.name()),
            retryable: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_match_wire_protocol() {
        let id = SessionId(1);
        assert_eq!(
            SessionEvent::TranscribedText { session_id: id, text: "hi".into() }.name(),
            "transcribed-text"
        );
        assert_eq!(
            SessionEvent::FinalReply { session_id: id, message: "hello".into() }.name(),
            "final-reply"
        );
        let err = ClinisimError::not_found("session", 1);
        assert_eq!(SessionEvent::from_error(id, &err).name(), "error");
    }

    #[test]
    fn serialized_event_carries_tag() {
        let event = SessionEvent::FinalReply {
            session_id: SessionId(3),
            message: "I haven't slept well.".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "final-reply");
        assert_eq!(json["session_id"], 3);
    }

    #[tokio::test]
    async fn channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::channel(4);
        let id = SessionId(1);
        sink.emit(SessionEvent::TranscribedText { session_id: id, text: "q".into() })
            .await
            .unwrap();
        sink.emit(SessionEvent::FinalReply { session_id: id, message: "a".into() })
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().name(), "transcribed-text");
        assert_eq!(rx.recv().await.unwrap().name(), "final-reply");
    }

    #[tokio::test]
    async fn emit_after_receiver_dropped_is_transport_error() {
        let (sink, rx) = ChannelSink::channel(1);
        drop(rx);
        let result = sink
            .emit(SessionEvent::TranscribedText { session_id: SessionId(1), text: "q".into() })
            .await;
        match result {
            Err(ClinisimError::Transport { retryable, .. }) => assert!(!retryable),
            other => panic!("expected Transport, got {:?}", other),
        }
    }
}
