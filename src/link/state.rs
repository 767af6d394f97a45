//! Connection state machine and reconnect policy
//!
//! The policy reproduced here: after a close with code 1000 (normal) or
//! 1001 (going away), schedule exactly one reconnect attempt against the
//! same node after a fixed 1-second delay. Any other close code parks the
//! link in `Disconnected` until the user acts. A user-initiated pause
//! closes the connection without triggering the retry, and cancels a
//! pending retry if one is already scheduled.
//!
//! Pending attempts are armed with a [`ReconnectToken`] carrying a
//! generation number. Pause and play bump the generation, so a timer that
//! fires for a previous connection can never resurrect a paused session.

use super::{CLOSE_GOING_AWAY, CLOSE_NORMAL};
use std::time::Duration;

/// Delay between a retryable close and the reconnect attempt
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No connection and no pending attempt; waiting for user action
    Disconnected,
    /// Attempt in flight, or scheduled after a retryable close
    Connecting,
    /// Connection open
    Connected,
    /// User paused; auto-reconnect suppressed
    Paused,
}

/// What the session should do about a close event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Schedule one reconnect attempt after [`RECONNECT_DELAY`]; redeem the
    /// token when the timer fires
    Retry(ReconnectToken),
    /// Non-retryable close code; stay down until the user acts
    Drop,
    /// Echo of a close we initiated ourselves (pause); nothing to do
    Ignored,
}

/// Arms one scheduled reconnect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectToken {
    generation: u64,
}

/// Tracks the link lifecycle and decides when reconnecting is allowed
#[derive(Debug)]
pub struct Supervisor {
    state: LinkState,
    generation: u64,
    pending: Option<u64>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            state: LinkState::Disconnected,
            generation: 0,
            pending: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// A connection attempt is in flight
    pub fn connecting(&mut self) {
        self.state = LinkState::Connecting;
    }

    /// The attempt succeeded; the connection is open
    pub fn opened(&mut self) {
        self.state = LinkState::Connected;
        self.pending = None;
    }

    /// The attempt failed before the connection opened
    pub fn connect_failed(&mut self) {
        self.state = LinkState::Disconnected;
        self.pending = None;
    }

    /// The connection closed with `code`; decide the follow-up
    pub fn closed(&mut self, code: u16) -> CloseOutcome {
        if self.state == LinkState::Paused {
            // Our own pause close coming back around
            return CloseOutcome::Ignored;
        }

        if code == CLOSE_NORMAL || code == CLOSE_GOING_AWAY {
            self.state = LinkState::Connecting;
            self.pending = Some(self.generation);
            CloseOutcome::Retry(ReconnectToken {
                generation: self.generation,
            })
        } else {
            self.state = LinkState::Disconnected;
            self.pending = None;
            CloseOutcome::Drop
        }
    }

    /// User pause: suppress reconnects and invalidate scheduled ones
    ///
    /// Returns whether an open connection should now be closed.
    pub fn pause(&mut self) -> bool {
        let close_needed = self.state == LinkState::Connected;
        self.generation += 1;
        self.pending = None;
        self.state = LinkState::Paused;
        close_needed
    }

    /// User play: leave `Paused`/`Disconnected` and connect right away
    ///
    /// Returns whether the caller should start a connection attempt.
    pub fn resume(&mut self) -> bool {
        match self.state {
            LinkState::Paused | LinkState::Disconnected => {
                self.generation += 1;
                self.state = LinkState::Connecting;
                true
            }
            LinkState::Connecting | LinkState::Connected => false,
        }
    }

    /// Redeem a scheduled reconnect when its timer fires
    ///
    /// True at most once per close, and only while the token's generation
    /// is still current; a token outlived by a pause or play is dead.
    pub fn redeem(&mut self, token: ReconnectToken) -> bool {
        if self.pending == Some(token.generation) && token.generation == self.generation {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}
