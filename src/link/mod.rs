//! Gateway link: transports and connection lifecycle
//!
//! A transport is driven through two seams:
//!
//! - [`Connector`] opens a connection and hands the session a boxed
//!   [`Connection`] for the outbound direction.
//! - The inbound direction is a reader thread owned by the transport that
//!   emits typed [`LinkEvent`]s into a channel; the session thread is the
//!   only consumer. The session creates a fresh channel per connection, so
//!   a stale reader from a previous connection ends up talking to an
//!   orphaned channel instead of the live session.
//!
//! The reconnect policy itself lives in [`state`], separate from any
//! socket handling, so it can be tested without a network.

mod mock;
mod state;
mod ws;

pub use mock::MockConnector;
pub use state::{CloseOutcome, LinkState, ReconnectToken, Supervisor, RECONNECT_DELAY};
pub use ws::WsConnector;

use crate::error::Result;
use crossbeam_channel::Sender;

/// Close code for a clean, deliberate closure
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code sent by an endpoint that is going away (reload, shutdown)
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Close code standing in for "closed without a status code"
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Close code standing in for an abnormal loss of the connection
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Events emitted by a transport reader thread
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Connection is established and readable
    Opened,
    /// One received binary buffer (may contain several telemetry frames)
    Frame(Vec<u8>),
    /// Connection closed, with the close code governing the retry policy
    Closed { code: u16, reason: String },
    /// Connection-level error; reported, never fatal by itself
    Fault(String),
}

/// Outbound half of an open connection
pub trait Connection: Send {
    /// Send one binary frame buffer
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Initiate a clean close (code 1000)
    fn close(&mut self) -> Result<()>;
}

/// Factory for connections against one configured endpoint
pub trait Connector: Send {
    /// Open a connection; `events` receives the inbound [`LinkEvent`]s
    ///
    /// Implementations emit [`LinkEvent::Opened`] once the connection is
    /// readable and keep emitting until the connection dies or every
    /// receiver is gone.
    fn connect(&mut self, events: Sender<LinkEvent>) -> Result<Box<dyn Connection>>;
}
