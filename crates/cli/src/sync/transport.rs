// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The byte-level link to the relay.
//!
//! [`Transport`] moves whole [`Frame`]s; reconnects, keep-alive and
//! acknowledgment tracking live above it in the connection manager.

use std::future::Future;
use std::pin::Pin;

use fieldsync_core::Frame;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// No live socket, or the relay went away mid-operation.
    #[error("connection closed")]
    ConnectionClosed,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// A frame could not be encoded or decoded; the connection stays usable.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = TransportResult<T>> + Send + 'a>>;

/// A frame-oriented duplex link. One value serves one connection attempt.
pub trait Transport: Send + Sync {
    fn connect(&mut self, url: &str) -> TransportFuture<'_, ()>;

    /// Closes with code 1000. Never fails; an already dead link is fine.
    fn disconnect(&mut self) -> TransportFuture<'_, ()>;

    /// Writes one frame. A failed write leaves the transport disconnected.
    fn send(&mut self, frame: Frame) -> TransportFuture<'_, ()>;

    /// Next frame from the relay, or `None` once it closed the link.
    ///
    /// A frame that fails to parse yields `SerializationError` and the link
    /// stays usable.
    fn recv(&mut self) -> TransportFuture<'_, Option<Frame>>;

    fn is_connected(&self) -> bool;
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Relay transport over tokio-tungstenite.
#[derive(Default)]
pub struct WebSocketTransport {
    halves: Option<Halves>,
}

struct Halves {
    writer: SplitSink<Socket, Message>,
    reader: SplitStream<Socket>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the socket after a failed read or write.
    fn drop_socket(&mut self) {
        self.halves = None;
    }
}

fn encode(frame: &Frame) -> TransportResult<Message> {
    frame
        .to_json()
        .map(Message::text)
        .map_err(|e| TransportError::SerializationError(e.to_string()))
}

fn decode(text: &str) -> TransportResult<Frame> {
    Frame::from_json(text).map_err(|e| TransportError::SerializationError(e.to_string()))
}

impl Transport for WebSocketTransport {
    fn connect(&mut self, url: &str) -> TransportFuture<'_, ()> {
        let url = url.to_string();
        Box::pin(async move {
            let (socket, response) = connect_async(url.as_str())
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
            tracing::debug!("relay handshake answered {}", response.status());

            let (writer, reader) = socket.split();
            self.halves = Some(Halves { writer, reader });
            Ok(())
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let Some(mut halves) = self.halves.take() else {
                return Ok(());
            };
            let close = Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "client disconnect".into(),
            }));
            // The relay may already have dropped the socket.
            if let Err(e) = halves.writer.send(close).await {
                tracing::debug!("close frame not delivered: {}", e);
            }
            let _ = halves.writer.close().await;
            Ok(())
        })
    }

    fn send(&mut self, frame: Frame) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let message = encode(&frame)?;
            let halves = self
                .halves
                .as_mut()
                .ok_or(TransportError::ConnectionClosed)?;
            let written = halves.writer.send(message).await;
            written.map_err(|e| {
                self.drop_socket();
                TransportError::SendFailed(e.to_string())
            })
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<Frame>> {
        Box::pin(async move {
            loop {
                let halves = self
                    .halves
                    .as_mut()
                    .ok_or(TransportError::ConnectionClosed)?;
                let next = halves.reader.next().await;
                match next {
                    Some(Ok(Message::Text(text))) => return decode(&text).map(Some),
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!("relay closed the socket: {:?}", frame);
                        self.drop_socket();
                        return Ok(None);
                    }
                    None => {
                        self.drop_socket();
                        return Ok(None);
                    }
                    // tungstenite answers protocol pings on its own.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        self.drop_socket();
                        return Err(TransportError::ReceiveFailed(e.to_string()));
                    }
                }
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.halves.is_some()
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
