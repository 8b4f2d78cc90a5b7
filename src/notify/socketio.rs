use super::packet::{self, Handshake, Packet, SocketPacket};
use super::{ChannelConnector, ChannelEvent, NotificationChannel};
use crate::logging::*;
use anyhow::{Context, Result, anyhow, bail};
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};


type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket.IO endpoint served next to the REST API: same host, websocket
/// scheme, `/socket.io/` path.
pub fn endpoint_for(api_url: &str) -> Result<Url> {
    let mut url = Url::parse(api_url).with_context(|| format!("invalid API URL: {api_url}"))?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => bail!("unsupported API URL scheme: {other}"),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("cannot derive websocket URL from {api_url}"))?;
    url.set_path("/socket.io/");
    url.set_query(Some("EIO=4&transport=websocket"));
    url.set_fragment(None);
    Ok(url)
}

pub struct SocketIoConnector {
    endpoint: Url,
    token: String,
}

impl SocketIoConnector {
    pub fn new(api_url: &str, token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint_for(api_url)?,
            token: token.into(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl ChannelConnector for SocketIoConnector {
    type Channel = SocketIoChannel;

    async fn open(&self) -> Result<SocketIoChannel, String> {
        let log = DEFAULT.new(o!(
            "function" => "SocketIoConnector::open",
            "endpoint" => self.endpoint.to_string(),
        ));

        let (mut stream, _) = tokio_tungstenite::connect_async(self.endpoint.as_str())
            .await
            .map_err(|err| err.to_string())?;
        let handshake = read_handshake(&mut stream).await?;
        debug!(log, "engine opened";
            "sid" => &handshake.sid,
            "ping_interval" => handshake.ping_interval,
        );

        let auth = Packet::Message(SocketPacket::Connect(Some(json!({ "token": self.token }))));
        stream
            .send(Message::Text(auth.encode()))
            .await
            .map_err(|err| err.to_string())?;

        Ok(SocketIoChannel {
            stream: Some(stream),
            log,
        })
    }
}

async fn read_handshake(stream: &mut WsStream) -> Result<Handshake, String> {
    while let Some(message) = stream.next().await {
        let Message::Text(text) = message.map_err(|err| err.to_string())? else {
            continue;
        };
        return match packet::decode(&text) {
            Ok(Packet::Open(handshake)) => Ok(handshake),
            Ok(other) => Err(format!(
                "unexpected packet before handshake: {}",
                other.encode()
            )),
            Err(err) => Err(err.to_string()),
        };
    }
    Err("connection closed during handshake".to_owned())
}

/// An authenticated Socket.IO session on the default namespace.
pub struct SocketIoChannel {
    // None once closed
    stream: Option<WsStream>,
    log: Logger,
}

impl SocketIoChannel {
    fn closed(&mut self, reason: Option<String>) -> ChannelEvent {
        self.stream = None;
        debug!(self.log, "closed"; "reason" => ?reason);
        ChannelEvent::Closed(reason)
    }
}

impl NotificationChannel for SocketIoChannel {
    async fn next_event(&mut self) -> ChannelEvent {
        loop {
            let Some(stream) = self.stream.as_mut() else {
                return std::future::pending().await;
            };
            let text = match stream.next().await {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|frame| frame.reason.into_owned())
                        .filter(|reason| !reason.is_empty());
                    return self.closed(reason);
                }
                // websocket-level ping/pong is answered by tungstenite
                Some(Ok(_)) => continue,
                Some(Err(err)) => return self.closed(Some(err.to_string())),
                None => return self.closed(None),
            };

            match packet::decode(&text) {
                Ok(Packet::Ping) => {
                    trace!(self.log, "ping");
                    if let Err(err) = stream.send(Message::Text(Packet::Pong.encode())).await {
                        return self.closed(Some(err.to_string()));
                    }
                }
                Ok(Packet::Close) => return self.closed(None),
                Ok(Packet::Message(SocketPacket::Connect(_))) => return ChannelEvent::Connected,
                Ok(Packet::Message(SocketPacket::ConnectError(reason))) => {
                    return ChannelEvent::ConnectError(reason);
                }
                Ok(Packet::Message(SocketPacket::Disconnect)) => {
                    return self.closed(Some("server disconnected".to_owned()));
                }
                Ok(Packet::Message(SocketPacket::Event { name, payload, .. })) => {
                    trace!(self.log, "event"; "name" => &name);
                    return ChannelEvent::Message {
                        event: name,
                        payload,
                    };
                }
                Ok(Packet::Open(_) | Packet::Pong | Packet::Noop) => {}
                Err(err) => {
                    warn!(self.log, "ignoring undecodable packet"; "error" => %err);
                }
            }
        }
    }

    async fn disconnect(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        let goodbye = Packet::Message(SocketPacket::Disconnect).encode();
        if let Err(err) = stream.send(Message::Text(goodbye)).await {
            debug!(self.log, "failed to send disconnect"; "error" => %err);
        }
        if let Err(err) = stream.close(None).await {
            debug!(self.log, "failed to close websocket"; "error" => %err);
        }
        debug!(self.log, "disconnected");
    }
}
