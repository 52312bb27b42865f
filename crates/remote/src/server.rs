// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Handles client connections, frame replies, and data fanout.

use std::net::SocketAddr;

use fieldsync_core::Frame;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::state::RelayState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Run the WebSocket server on the given address.
pub async fn run(addr: SocketAddr, state: RelayState) -> Result<(), BoxError> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", listener.local_addr()?);
    serve(listener, state).await
}

/// Accept connections on an already bound listener until it fails.
pub async fn serve(listener: TcpListener, state: RelayState) -> Result<(), BoxError> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: RelayState,
) -> Result<(), BoxError> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let mut client = state.register();
    info!(
        "New WebSocket connection from {} (client {})",
        peer_addr,
        client.id()
    );

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    loop {
        tokio::select! {
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_text(&text, client.id(), &state) {
                            ws_sink.send(Message::text(reply.to_json()?)).await?;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} disconnected", peer_addr);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_sink.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", peer_addr, e);
                        break;
                    }
                    None => {
                        info!("Client {} stream ended", peer_addr);
                        break;
                    }
                }
            }

            relayed = client.recv() => {
                match relayed {
                    Ok(frame) => {
                        if let Err(e) = ws_sink.send(Message::text(frame.to_json()?)).await {
                            warn!("Failed to relay to {}: {}", peer_addr, e);
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!("Client {} lagged by {} frames", peer_addr, n);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    info!("Connection closed: {}", peer_addr);
    Ok(())
}

/// Process one text frame and return the reply, if any.
pub(crate) fn handle_text(text: &str, client_id: u64, state: &RelayState) -> Option<Frame> {
    let frame = match Frame::from_json(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Malformed frame from client {}: {}", client_id, e);
            return Some(Frame::error(
                message_id_of(text),
                format!("malformed frame: {}", e),
            ));
        }
    };

    match frame {
        Frame::Data {
            message_id,
            data_type,
            payload,
        } => {
            if !state.acks_data() {
                debug!("Dropping {} from client {} unacknowledged", message_id, client_id);
                return None;
            }
            debug!("Relaying {} ({}) from client {}", message_id, data_type, client_id);
            let ack = Frame::ack(message_id.clone());
            state.publish(client_id, Frame::data(message_id, data_type, payload));
            Some(ack)
        }
        Frame::Ping => Some(Frame::Pong),
        Frame::Ack { message_id } => {
            debug!("Client {} acknowledged {}", client_id, message_id);
            None
        }
        Frame::Pong => None,
        Frame::Error {
            message_id,
            message,
        } => {
            warn!(
                "Client {} reported error for {:?}: {}",
                client_id, message_id, message
            );
            None
        }
    }
}

/// Best-effort `messageId` of a frame that failed to parse.
fn message_id_of(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    value
        .get("messageId")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
