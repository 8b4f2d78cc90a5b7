//! In-memory notification channel and progress sink for tests.

use super::ProgressSink;
use crate::notify::{ChannelConnector, ChannelEvent, NotificationChannel};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Default)]
pub struct RecordingSink {
    texts: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn set_text(&self, text: String) {
        self.texts.lock().unwrap().push(text);
    }
}

/// Feeds events to the channel the listener opens.
#[derive(Clone)]
pub struct Script {
    sender: mpsc::UnboundedSender<ChannelEvent>,
}

impl Script {
    pub fn connected(&self) {
        self.push(ChannelEvent::Connected);
    }

    pub fn message(&self, event: &str, payload: Value) {
        self.push(ChannelEvent::Message {
            event: event.to_owned(),
            payload,
        });
    }

    pub fn push(&self, event: ChannelEvent) {
        // the receiver is gone once the listener disconnected
        let _ = self.sender.send(event);
    }
}

pub struct ScriptedConnector {
    receiver: Mutex<Option<mpsc::UnboundedReceiver<ChannelEvent>>>,
    fail_open: Option<String>,
    opens: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new() -> (Self, Script) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let connector = Self {
            receiver: Mutex::new(Some(receiver)),
            fail_open: None,
            opens: Arc::default(),
            disconnects: Arc::default(),
        };
        (connector, Script { sender })
    }

    pub fn failing(reason: &str) -> Self {
        let (mut connector, _) = Self::new();
        connector.fail_open = Some(reason.to_owned());
        connector
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl ChannelConnector for ScriptedConnector {
    type Channel = ScriptedChannel;

    async fn open(&self) -> Result<ScriptedChannel, String> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.fail_open {
            return Err(reason.clone());
        }
        let receiver = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| "scripted channel already opened".to_owned())?;
        Ok(ScriptedChannel {
            receiver,
            disconnects: self.disconnects.clone(),
        })
    }
}

pub struct ScriptedChannel {
    receiver: mpsc::UnboundedReceiver<ChannelEvent>,
    disconnects: Arc<AtomicUsize>,
}

impl NotificationChannel for ScriptedChannel {
    async fn next_event(&mut self) -> ChannelEvent {
        match self.receiver.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    async fn disconnect(&mut self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.receiver.close();
    }
}
