//! Push-notification channel.
//!
//! [`ChannelConnector`] and [`NotificationChannel`] are the seam the
//! completion listener consumes; [`socketio`] implements them over a
//! websocket speaking the Socket.IO protocol.

pub mod packet;
pub mod socketio;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The server accepted the connection.
    Connected,
    /// The server refused the connection.
    ConnectError(String),
    Message { event: String, payload: Value },
    /// The connection ended; `None` for an orderly close.
    Closed(Option<String>),
}

pub trait NotificationChannel {
    /// Waits for the next event. Pending forever once nothing more can arrive.
    async fn next_event(&mut self) -> ChannelEvent;

    async fn disconnect(&mut self);
}

pub trait ChannelConnector {
    type Channel: NotificationChannel;

    async fn open(&self) -> Result<Self::Channel, String>;
}
