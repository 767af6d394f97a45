//! Blocking WebSocket transport
//!
//! The socket is shared between the session thread (writes) and a reader
//! thread (reads) behind a mutex. A short read timeout on the underlying
//! TCP stream makes the reader release the lock periodically, so outbound
//! control frames are never starved by a quiet gateway.

use super::{Connection, Connector, LinkEvent, CLOSE_ABNORMAL, CLOSE_NO_STATUS};
use crate::error::{Error, Result};
use crossbeam_channel::Sender;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tungstenite::client::IntoClientRequest;
use tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tungstenite::http::HeaderValue;
use tungstenite::protocol::frame::coding::CloseCode;
use tungstenite::protocol::CloseFrame;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

/// Subprotocol expected by the gateway for live telemetry streams
const SUBPROTOCOL: &str = "live";

/// Read timeout on the underlying stream; bounds writer lock latency
const READ_TIMEOUT: Duration = Duration::from_millis(200);

type WsSocket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Connector opening WebSocket connections against one gateway URL
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// Create a connector for `url` (`ws://...` or `wss://...`)
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Connector for WsConnector {
    fn connect(&mut self, events: Sender<LinkEvent>) -> Result<Box<dyn Connection>> {
        let mut request = self.url.as_str().into_client_request()?;
        request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBPROTOCOL));

        let (mut socket, response) = tungstenite::connect(request)?;
        debug!("WebSocket handshake done: HTTP {}", response.status());

        match socket.get_mut() {
            MaybeTlsStream::Plain(stream) => {
                stream.set_read_timeout(Some(READ_TIMEOUT))?;
            }
            MaybeTlsStream::NativeTls(stream) => {
                stream.get_mut().set_read_timeout(Some(READ_TIMEOUT))?;
            }
            _ => {}
        }

        info!("Connected to {}", self.url);
        events
            .send(LinkEvent::Opened)
            .map_err(|_| Error::Transport("event channel closed".to_string()))?;

        let socket = Arc::new(Mutex::new(socket));
        let alive = Arc::new(AtomicBool::new(true));

        let reader_socket = Arc::clone(&socket);
        let reader_alive = Arc::clone(&alive);
        let reader = thread::Builder::new()
            .name("ws-reader".to_string())
            .spawn(move || reader_loop(reader_socket, reader_alive, events))?;

        Ok(Box::new(WsConnection {
            socket,
            alive,
            reader: Some(reader),
        }))
    }
}

/// Reader loop: pump inbound messages into the event channel
///
/// Exits when the connection dies, the session drops its receiver, or the
/// alive flag is cleared.
fn reader_loop(socket: Arc<Mutex<WsSocket>>, alive: Arc<AtomicBool>, events: Sender<LinkEvent>) {
    while alive.load(Ordering::Relaxed) {
        let result = {
            let mut socket = socket.lock();
            socket.read()
        };

        match result {
            Ok(Message::Binary(data)) => {
                if events.send(LinkEvent::Frame(data)).is_err() {
                    break;
                }
            }
            Ok(Message::Close(frame)) => {
                let (code, reason) = match frame {
                    Some(f) => (u16::from(f.code), f.reason.to_string()),
                    None => (CLOSE_NO_STATUS, String::new()),
                };
                let _ = events.send(LinkEvent::Closed { code, reason });
                break;
            }
            Ok(other) => {
                // Text frames are not part of the live protocol;
                // ping/pong is handled inside tungstenite.
                if other.is_text() {
                    warn!("Ignoring unexpected text message on live stream");
                }
            }
            Err(tungstenite::Error::Io(e))
                if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut =>
            {
                // Read timeout: lock released above, give writers a gap
                thread::sleep(Duration::from_millis(5));
            }
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                // Close handshake already surfaced via Message::Close
                break;
            }
            Err(e) => {
                let _ = events.send(LinkEvent::Fault(e.to_string()));
                let _ = events.send(LinkEvent::Closed {
                    code: CLOSE_ABNORMAL,
                    reason: e.to_string(),
                });
                break;
            }
        }
    }
    debug!("WebSocket reader exiting");
}

struct WsConnection {
    socket: Arc<Mutex<WsSocket>>,
    alive: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl Connection for WsConnection {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let mut socket = self.socket.lock();
        socket.send(Message::Binary(bytes.to_vec()))?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut socket = self.socket.lock();
        match socket.close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "paused".into(),
        })) {
            Ok(()) => Ok(()),
            // Already closed from the other side; nothing left to do
            Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}
