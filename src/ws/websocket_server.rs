use crate::messages::{self, Event, EventSender, Request, RequestSender};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

pub const DEFAULT_PORT: u16 = 8765;
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub async fn bind(addr: SocketAddr) -> Result<TcpListener, Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "WebSocket server listening");
    Ok(listener)
}

/// Accepts clients until the controller goes away. Accept errors (for example
/// running out of file descriptors) are logged and retried after a pause.
pub async fn start_websocket_server(listener: TcpListener, requests: RequestSender, events: EventSender) {
    while !requests.is_closed() {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                info!(%peer_addr, "new WebSocket connection");
                tokio::spawn(handle_connection(
                    stream,
                    peer_addr,
                    requests.clone(),
                    events.subscribe(),
                ));
            }
            Err(e) => {
                warn!(error = %e, "failed to accept WebSocket connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

fn encode(event: &Event) -> Option<Message> {
    serde_json::to_string(event).ok().map(Message::Text)
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    requests: RequestSender,
    mut events: broadcast::Receiver<Event>,
) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer_addr, error = %e, "WebSocket handshake failed");
            return;
        }
    };

    debug!(%peer_addr, "WebSocket handshake completed");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            pushed = events.recv() => {
                let event = match pushed {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%peer_addr, skipped, "client lagged behind");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if let Some(message) = encode(&event) {
                    if let Err(e) = ws_sender.send(message).await {
                        warn!(%peer_addr, error = %e, "failed to push event");
                        break;
                    }
                }
            }
            incoming = ws_receiver.next() => {
                let Some(msg) = incoming else { break };
                match msg {
                    Ok(Message::Text(text)) => {
                        let reply = match serde_json::from_str::<Request>(&text) {
                            Ok(request) => {
                                debug!(%peer_addr, ?request, "WebSocket request");
                                let quit = request == Request::Quit;
                                let reply = messages::dispatch(&requests, request).await;
                                if quit {
                                    break;
                                }
                                reply
                            }
                            Err(e) => {
                                warn!(%peer_addr, error = %e, "failed to parse message");
                                Some(Event::Error(format!("Parse error: {}", e)))
                            }
                        };
                        if let Some(message) = reply.as_ref().and_then(encode) {
                            if let Err(e) = ws_sender.send(message).await {
                                warn!(%peer_addr, error = %e, "failed to send reply");
                                break;
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!(%peer_addr, "WebSocket connection closed by peer");
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        if let Err(e) = ws_sender.send(Message::Pong(data)).await {
                            warn!(%peer_addr, error = %e, "failed to send pong");
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(%peer_addr, error = %e, "WebSocket error");
                        break;
                    }
                }
            }
        }
    }

    info!(%peer_addr, "WebSocket connection terminated");
}
