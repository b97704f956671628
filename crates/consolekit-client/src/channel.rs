use crate::controller::Console;
use consolekit_core::{ConsoleError, ConsoleResult};
use consolekit_session::Ingest;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connected WebSocket reader for the console event channel.
///
/// Every text frame is handed to [`Console::ingest`] in arrival order.
/// Disconnecting leaves the console untouched; reconnecting is up to the
/// caller, and the bound session keeps being honored on the new connection.
pub struct EventChannel {
    url: String,
    ws: WsStream,
}

impl EventChannel {
    /// Connects to `url` (`ws://` or `wss://`).
    ///
    /// Connect before issuing a start request so early events are not missed.
    pub async fn connect(url: impl Into<String>) -> ConsoleResult<Self> {
        let url = url.into();
        let (ws, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ConsoleError::Channel(format!("connect to {url} failed: {e}")))?;
        info!(url = %url, "Console event channel connected");
        Ok(Self { url, ws })
    }

    /// The channel URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Drains the channel until the server closes it.
    pub async fn run(mut self, console: Arc<Console>) -> ConsoleResult<()> {
        let mut frames: u64 = 0;
        while let Some(msg) = self.ws.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    frames += 1;
                    dispatch(&console, &text);
                }
                Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                    Ok(text) => {
                        frames += 1;
                        dispatch(&console, text);
                    }
                    Err(e) => warn!(error = %e, "Dropping non UTF-8 binary frame"),
                },
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Console event channel closed by server");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(url = %self.url, error = %e, "Console event channel failed");
                    return Err(ConsoleError::Channel(e.to_string()));
                }
            }
        }

        info!(url = %self.url, frames, "Console event channel disconnected");
        Ok(())
    }

    /// Runs the reader on its own task.
    pub fn spawn(self, console: Arc<Console>) -> JoinHandle<ConsoleResult<()>> {
        tokio::spawn(self.run(console))
    }
}

fn dispatch(console: &Console, text: &str) {
    if let Ingest::Rejected { session_id } = console.ingest(text) {
        debug!(session_id = %session_id, "Ignored event for another session");
    }
}
