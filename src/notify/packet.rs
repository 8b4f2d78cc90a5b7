//! Engine.IO v4 / Socket.IO v5 text packets.
//!
//! Only what a notification subscriber needs is modelled: the handshake,
//! heartbeats, namespace connect/disconnect and plain events. Binary
//! attachments and acknowledgements are rejected as unsupported.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;


#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("empty packet")]
    Empty,
    #[error("unknown packet type: {0:?}")]
    UnknownType(char),
    #[error("unsupported packet type: {0:?}")]
    Unsupported(char),
    #[error("malformed packet: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for PacketError {
    fn from(err: serde_json::Error) -> Self {
        PacketError::Malformed(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

/// Engine.IO transport packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Noop,
}

/// Socket.IO packet carried in an Engine.IO message.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    /// Sent with the auth payload; received with the session id.
    Connect(Option<Value>),
    Disconnect,
    Event {
        name: String,
        payload: Value,
        ack: Option<u64>,
    },
    ConnectError(String),
}

pub fn decode(text: &str) -> Result<Packet, PacketError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(PacketError::Empty)?;
    let rest = chars.as_str();
    match kind {
        '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_socket(rest).map(Packet::Message),
        '5' => Err(PacketError::Unsupported(kind)),
        '6' => Ok(Packet::Noop),
        other => Err(PacketError::UnknownType(other)),
    }
}

fn decode_socket(text: &str) -> Result<SocketPacket, PacketError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(PacketError::Empty)?;
    let rest = skip_namespace(chars.as_str());
    match kind {
        '0' => Ok(SocketPacket::Connect(parse_optional(rest)?)),
        '1' => Ok(SocketPacket::Disconnect),
        '2' => {
            let (ack, data) = split_ack(rest)?;
            let (name, payload) = parse_event(data)?;
            Ok(SocketPacket::Event { name, payload, ack })
        }
        '4' => {
            let reason = match parse_optional(rest)? {
                Some(Value::String(message)) => message,
                Some(Value::Object(object)) => match object.get("message") {
                    Some(Value::String(message)) => message.clone(),
                    _ => Value::Object(object).to_string(),
                },
                Some(other) => other.to_string(),
                None => "connection refused".to_owned(),
            };
            Ok(SocketPacket::ConnectError(reason))
        }
        '3' | '5' | '6' => Err(PacketError::Unsupported(kind)),
        other => Err(PacketError::UnknownType(other)),
    }
}

/// Strips a `/namespace,` prefix; only the default namespace is used.
fn skip_namespace(text: &str) -> &str {
    if !text.starts_with('/') {
        return text;
    }
    match text.find(',') {
        Some(comma) => &text[comma + 1..],
        None => "",
    }
}

fn split_ack(text: &str) -> Result<(Option<u64>, &str), PacketError> {
    let digits = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    if digits == 0 {
        return Ok((None, text));
    }
    let ack = text[..digits]
        .parse()
        .map_err(|_| PacketError::Malformed(format!("ack id: {}", &text[..digits])))?;
    Ok((Some(ack), &text[digits..]))
}

fn parse_optional(text: &str) -> Result<Option<Value>, PacketError> {
    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(text)?))
}

fn parse_event(text: &str) -> Result<(String, Value), PacketError> {
    let Value::Array(mut items) = serde_json::from_str(text)? else {
        return Err(PacketError::Malformed("event is not an array".to_owned()));
    };
    if items.is_empty() {
        return Err(PacketError::Malformed("event without name".to_owned()));
    }
    let payload = if items.len() > 1 {
        items.swap_remove(1)
    } else {
        Value::Null
    };
    match items.swap_remove(0) {
        Value::String(name) => Ok((name, payload)),
        other => Err(PacketError::Malformed(format!("event name: {other}"))),
    }
}

impl Packet {
    pub fn encode(&self) -> String {
        match self {
            Packet::Open(handshake) => {
                format!("0{}", serde_json::to_value(handshake).unwrap_or(Value::Null))
            }
            Packet::Close => "1".to_owned(),
            Packet::Ping => "2".to_owned(),
            Packet::Pong => "3".to_owned(),
            Packet::Message(socket) => format!("4{}", socket.encode()),
            Packet::Noop => "6".to_owned(),
        }
    }
}

impl SocketPacket {
    fn encode(&self) -> String {
        match self {
            SocketPacket::Connect(None) => "0".to_owned(),
            SocketPacket::Connect(Some(auth)) => format!("0{auth}"),
            SocketPacket::Disconnect => "1".to_owned(),
            SocketPacket::Event { name, payload, ack } => {
                let ack = ack.map(|id| id.to_string()).unwrap_or_default();
                format!("2{ack}{}", json!([name, payload]))
            }
            SocketPacket::ConnectError(message) => {
                format!("4{}", json!({ "message": message }))
            }
        }
    }
}
