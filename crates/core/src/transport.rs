//! Transport trait — where utterances come from and answers go.
//!
//! Audio capture, speech-to-text and framing belong to the transport. The
//! core only needs ordered, one-at-a-time delivery of already-transcribed
//! utterances and a way to send response text back.

use async_trait::async_trait;
use tokio::sync::mpsc;
use crate::error::TransportError;

/// A bidirectional utterance transport (terminal, realtime voice room, ...).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name (e.g., "stdin").
    fn name(&self) -> &str;

    /// Start receiving. Utterances arrive in order on the returned channel;
    /// the channel closing means the peer disconnected.
    async fn start(&self) -> Result<mpsc::Receiver<Result<String, TransportError>>, TransportError>;

    /// Deliver response text to the peer.
    async fn send(&self, text: &str) -> Result<(), TransportError>;
}
