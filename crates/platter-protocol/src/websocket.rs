//! WebSocket transport: one JSON event per text message.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, trace};

use crate::error::ProtocolError;
use crate::transport::{Link, Transport};

/// Connects to the arbitration server over a WebSocket URL.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self) -> Result<Link, ProtocolError> {
        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ProtocolError::Connection(e.to_string()))?;
        debug!(url = %self.url, "websocket connected");

        let (mut sink, mut source) = stream.split();
        let (link, to_local, mut from_local) = Link::pair();

        tokio::spawn(async move {
            while let Some(frame) = from_local.recv().await {
                if let Err(e) = sink.send(Message::Text(frame)).await {
                    debug!(error = %e, "websocket write failed");
                    break;
                }
            }
            let _ = sink.close().await;
            trace!("websocket writer finished");
        });

        tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if to_local.send(text).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "websocket read failed");
                        break;
                    }
                }
            }
            trace!("websocket reader finished");
        });

        Ok(link)
    }
}
