//! Mock gateway for hardware-free runs and tests
//!
//! Emits a deterministic two-channel waveform at 20 Hz, occasionally
//! packing several records into one buffer and mixing in frames from a
//! foreign node id, so the decode and filtering paths get exercised the
//! same way a real shared transport would exercise them.

use super::{Connection, Connector, LinkEvent, CLOSE_NORMAL};
use crate::clock::wall_clock_ms;
use crate::error::Result;
use crate::protocol::{ControlFrame, TelemetryFrame};
use crossbeam_channel::Sender;
use log::{debug, info, warn};
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Generator tick interval
const TICK: Duration = Duration::from_millis(50);

/// Connector producing a synthetic telemetry stream
pub struct MockConnector {
    node_id: u32,
}

impl MockConnector {
    /// Create a mock gateway emitting frames for `node_id`
    pub fn new(node_id: u32) -> Self {
        Self { node_id }
    }
}

impl Connector for MockConnector {
    fn connect(&mut self, events: Sender<LinkEvent>) -> Result<Box<dyn Connection>> {
        let alive = Arc::new(AtomicBool::new(true));

        let node_id = self.node_id;
        let thread_alive = Arc::clone(&alive);
        let thread_events = events.clone();
        thread::Builder::new()
            .name("mock-gateway".to_string())
            .spawn(move || generator_loop(node_id, thread_alive, thread_events))?;

        info!("Mock gateway connected (node id {})", self.node_id);
        Ok(Box::new(MockLink { alive, events }))
    }
}

fn generator_loop(node_id: u32, alive: Arc<AtomicBool>, events: Sender<LinkEvent>) {
    if events.send(LinkEvent::Opened).is_err() {
        return;
    }

    let mut step: u64 = 0;
    while alive.load(Ordering::Relaxed) {
        thread::sleep(TICK);

        let now = wall_clock_ms();
        let t = step as f64 * TICK.as_secs_f64();

        let mut buf = Vec::new();
        TelemetryFrame {
            timestamp_ms: now,
            node_id,
            values: vec![(TAU * 0.4 * t).sin(), 0.6 * (TAU * 0.25 * t).cos()],
        }
        .encode_into(&mut buf);

        // Every fifth tick: pack a second record into the same buffer and
        // add a frame from a foreign node that the scope must filter out.
        if step % 5 == 0 {
            TelemetryFrame {
                timestamp_ms: now + 1,
                node_id,
                values: vec![(TAU * 0.4 * (t + 0.025)).sin(), 0.6 * (TAU * 0.25 * t).cos()],
            }
            .encode_into(&mut buf);
            TelemetryFrame {
                timestamp_ms: now,
                node_id: node_id.wrapping_add(1),
                values: vec![-1.0],
            }
            .encode_into(&mut buf);
        }

        if events.send(LinkEvent::Frame(buf)).is_err() {
            break;
        }
        step += 1;
    }
    debug!("Mock gateway generator exiting");
}

struct MockLink {
    alive: Arc<AtomicBool>,
    events: Sender<LinkEvent>,
}

impl Connection for MockLink {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        match ControlFrame::decode(bytes) {
            Ok(frame) => info!(
                "Mock gateway received control frame: seq={} value={} switches={:#06b}",
                frame.sequence, frame.value, frame.switches
            ),
            Err(e) => warn!("Mock gateway received malformed control frame: {}", e),
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.alive.store(false, Ordering::Relaxed);
        let _ = self.events.send(LinkEvent::Closed {
            code: CLOSE_NORMAL,
            reason: "paused".to_string(),
        });
        Ok(())
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
    }
}
