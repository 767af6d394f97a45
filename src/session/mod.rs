//! Session controller
//!
//! One thread owns everything mutable: the sample buffer, the link state,
//! the control panel and the redraw flag. Transport reader threads and
//! control surfaces only ever talk to it through channels, so no mutation
//! races exist by construction and no locking is needed on the data path.
//!
//! The loop multiplexes four sources:
//! - link events from the current connection's reader thread
//! - user commands ([`Command`]) from any [`SessionHandle`]
//! - the one-shot reconnect timer armed after a retryable close
//! - the redraw ticker derived from the configured update rate
//!
//! Telemetry ingest marks a dirty flag; the ticker clears it through the
//! render sink. Redraw frequency is therefore capped independently of the
//! message arrival rate - extra buffers between ticks just coalesce.

mod controls;
mod sink;

pub use controls::ControlPanel;
pub use sink::{LogSink, RenderFrame, RenderSink};

use crate::clock::wall_clock_ms;
use crate::discovery::{Node, SeriesStyle};
use crate::error::Result;
use crate::link::{
    CloseOutcome, Connection, Connector, LinkEvent, LinkState, ReconnectToken, Supervisor,
    RECONNECT_DELAY,
};
use crate::protocol::decode_telemetry;
use crate::scope::{PlotWindow, SampleBuffer};
use crossbeam_channel::{after, never, select, tick, unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use std::time::{Duration, Instant};

/// Slowest selectable redraw rate
pub const MIN_RATE_HZ: u32 = 1;

/// Fastest selectable redraw rate
pub const MAX_RATE_HZ: u32 = 50;

/// Redraw rate used until the user adjusts it
pub const DEFAULT_RATE_HZ: u32 = 25;

/// User commands accepted by a running session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Resume a paused or dropped session
    Play,
    /// Close the connection and suppress auto-reconnect
    Pause,
    /// Set the analog control level (0-100) and send a control frame
    SetValue(u32),
    /// Set one toggle and send a control frame
    SetSwitch { bit: u8, on: bool },
    /// Adjust the plot window span
    SetSpan(u64),
    /// Adjust the redraw rate
    SetRate(u32),
    /// Stop the session loop
    Shutdown,
}

/// Cloneable sender half used by control surfaces
#[derive(Clone)]
pub struct SessionHandle {
    tx: Sender<Command>,
}

impl SessionHandle {
    /// Queue a command; false once the session is gone
    pub fn send(&self, command: Command) -> bool {
        self.tx.send(command).is_ok()
    }
}

/// The session controller; see the module docs
pub struct Session {
    node: Node,
    connector: Box<dyn Connector>,
    supervisor: Supervisor,
    buffer: SampleBuffer,
    window: PlotWindow,
    panel: ControlPanel,
    sink: Box<dyn RenderSink>,
    styles: Vec<SeriesStyle>,
    connection: Option<Box<dyn Connection>>,
    cmd_rx: Receiver<Command>,
    link_rx: Receiver<LinkEvent>,
    reconnect_rx: Receiver<Instant>,
    pending_token: Option<ReconnectToken>,
    ticker: Receiver<Instant>,
    redraw: bool,
}

impl Session {
    /// Create a session for `node`; nothing connects until [`Session::run`]
    pub fn new(
        node: Node,
        connector: Box<dyn Connector>,
        window: PlotWindow,
        update_rate_hz: u32,
        sink: Box<dyn RenderSink>,
    ) -> (Self, SessionHandle) {
        let (cmd_tx, cmd_rx) = unbounded();

        let styles = node.series.clone().unwrap_or_default();
        let buffer = SampleBuffer::new(node.id);

        let session = Self {
            node,
            connector,
            supervisor: Supervisor::new(),
            buffer,
            window,
            panel: ControlPanel::new(),
            sink,
            styles,
            connection: None,
            cmd_rx,
            link_rx: never(),
            reconnect_rx: never(),
            pending_token: None,
            ticker: tick(rate_interval(update_rate_hz)),
            redraw: false,
        };

        (session, SessionHandle { tx: cmd_tx })
    }

    /// Connect and process events until shutdown
    pub fn run(&mut self) -> Result<()> {
        info!(
            "Session started for node '{}' (id {})",
            self.node.name, self.node.id
        );
        self.open_link();

        loop {
            // Clone the receiver handles so the select arms can replace
            // the originals (reconnect timer, per-connection channel).
            let link_rx = self.link_rx.clone();
            let cmd_rx = self.cmd_rx.clone();
            let reconnect_rx = self.reconnect_rx.clone();
            let ticker = self.ticker.clone();

            select! {
                recv(link_rx) -> event => match event {
                    Ok(event) => self.on_link_event(event),
                    // Reader thread gone; its close event already arrived
                    Err(_) => self.link_rx = never(),
                },
                recv(cmd_rx) -> command => match command {
                    Ok(command) => {
                        if self.on_command(command) {
                            break;
                        }
                    }
                    // Every handle dropped: nobody can control us anymore
                    Err(_) => break,
                },
                recv(reconnect_rx) -> _ => self.on_reconnect_due(),
                recv(ticker) -> _ => self.on_tick(),
            }
        }

        if let Some(mut connection) = self.connection.take() {
            let _ = connection.close();
        }
        info!("Session stopped");
        Ok(())
    }

    /// Current link state, for status surfaces
    pub fn link_state(&self) -> LinkState {
        self.supervisor.state()
    }

    fn open_link(&mut self) {
        self.supervisor.connecting();

        // Fresh channel per connection: events from an earlier reader
        // thread land in an orphaned channel instead of this session.
        let (tx, rx) = unbounded();
        match self.connector.connect(tx) {
            Ok(connection) => {
                self.connection = Some(connection);
                self.link_rx = rx;
            }
            Err(e) => {
                error!("Connection attempt failed: {}", e);
                self.supervisor.connect_failed();
                self.link_rx = never();
            }
        }
    }

    fn on_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Opened => {
                self.supervisor.opened();
                info!("Status: connected");
            }
            LinkEvent::Frame(bytes) => self.on_frame_buffer(&bytes),
            LinkEvent::Closed { code, reason } => {
                self.connection = None;
                match self.supervisor.closed(code) {
                    CloseOutcome::Retry(token) => {
                        info!(
                            "Status: disconnected (code {}, '{}'), retrying in {}ms",
                            code,
                            reason,
                            RECONNECT_DELAY.as_millis()
                        );
                        self.pending_token = Some(token);
                        self.reconnect_rx = after(RECONNECT_DELAY);
                    }
                    CloseOutcome::Drop => {
                        warn!("Status: disconnected (code {}, '{}')", code, reason);
                        self.link_rx = never();
                    }
                    CloseOutcome::Ignored => {}
                }
            }
            LinkEvent::Fault(message) => warn!("Status: connection error: {}", message),
        }
    }

    fn on_frame_buffer(&mut self, bytes: &[u8]) {
        let frames = match decode_telemetry(bytes) {
            Ok(frames) => frames,
            Err(e) => {
                // Protocol mismatch; surfaced, not recovered
                error!("Status: malformed telemetry buffer: {}", e);
                return;
            }
        };

        let now = wall_clock_ms();
        self.buffer.evict_older_than(self.window.cutoff(now));

        let mut ingested = 0usize;
        for frame in &frames {
            if self.buffer.ingest(frame) {
                ingested += 1;
            }
        }
        debug!(
            "Received {} frames, ingested {} ({} channels)",
            frames.len(),
            ingested,
            self.buffer.channel_count()
        );

        self.redraw = true;
    }

    fn on_command(&mut self, command: Command) -> bool {
        match command {
            Command::Play => {
                if self.supervisor.resume() {
                    info!("Resuming");
                    self.cancel_pending_reconnect();
                    self.open_link();
                }
            }
            Command::Pause => {
                let close_needed = self.supervisor.pause();
                self.cancel_pending_reconnect();
                if close_needed {
                    if let Some(mut connection) = self.connection.take() {
                        if let Err(e) = connection.close() {
                            warn!("Close failed: {}", e);
                        }
                    }
                }
                info!("Paused");
            }
            Command::SetValue(value) => {
                self.panel.set_value(value);
                self.send_control();
            }
            Command::SetSwitch { bit, on } => {
                self.panel.set_switch(bit, on);
                self.send_control();
            }
            Command::SetSpan(span_ms) => {
                self.window.set_span(span_ms);
                debug!("Plot span set to {}ms", self.window.span_ms());
                self.redraw = true;
            }
            Command::SetRate(rate_hz) => {
                self.ticker = tick(rate_interval(rate_hz));
                debug!("Redraw rate set to {}Hz", rate_hz.clamp(MIN_RATE_HZ, MAX_RATE_HZ));
            }
            Command::Shutdown => return true,
        }
        false
    }

    fn on_reconnect_due(&mut self) {
        self.reconnect_rx = never();
        if let Some(token) = self.pending_token.take() {
            if self.supervisor.redeem(token) {
                info!("Reconnecting to node '{}'", self.node.name);
                self.open_link();
            }
        }
    }

    fn on_tick(&mut self) {
        if !self.redraw {
            return;
        }
        let frame = RenderFrame {
            buffer: &self.buffer,
            bounds: self.window.bounds(wall_clock_ms()),
            styles: &self.styles,
        };
        self.sink.render(&frame);
        self.redraw = false;
    }

    fn cancel_pending_reconnect(&mut self) {
        self.pending_token = None;
        self.reconnect_rx = never();
    }

    fn send_control(&mut self) {
        if self.supervisor.state() != LinkState::Connected {
            debug!("Not connected; control change kept locally");
            return;
        }
        let Some(connection) = self.connection.as_mut() else {
            return;
        };

        let frame = self.panel.next_frame(self.node.id, wall_clock_ms());
        debug!(
            "Sending control frame: seq={} value={} switches={:#x}",
            frame.sequence, frame.value, frame.switches
        );
        if let Err(e) = connection.send(&frame.encode()) {
            warn!("Failed to send control frame: {}", e);
        }
    }
}

fn rate_interval(rate_hz: u32) -> Duration {
    Duration::from_millis(1000 / rate_hz.clamp(MIN_RATE_HZ, MAX_RATE_HZ) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::NodeKind;
    use crate::protocol::{ControlFrame, TelemetryFrame};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    const NODE_ID: u32 = 7;

    fn test_node() -> Node {
        Node {
            id: NODE_ID,
            name: "bench".to_string(),
            description: None,
            kind: NodeKind::Websocket,
            series: None,
        }
    }

    /// Connector whose event senders stay accessible to the test
    #[derive(Clone)]
    struct ScriptedConnector {
        connects: Arc<AtomicUsize>,
        taps: Arc<Mutex<Vec<Sender<LinkEvent>>>>,
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl ScriptedConnector {
        fn new() -> Self {
            Self {
                connects: Arc::new(AtomicUsize::new(0)),
                taps: Arc::new(Mutex::new(Vec::new())),
                sent: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn tap(&self, index: usize) -> Sender<LinkEvent> {
            self.taps.lock()[index].clone()
        }

        fn connect_count(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }
    }

    impl Connector for ScriptedConnector {
        fn connect(&mut self, events: Sender<LinkEvent>) -> Result<Box<dyn Connection>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let _ = events.send(LinkEvent::Opened);
            self.taps.lock().push(events);
            Ok(Box::new(ScriptedLink {
                sent: Arc::clone(&self.sent),
            }))
        }
    }

    struct ScriptedLink {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Connection for ScriptedLink {
        fn send(&mut self, bytes: &[u8]) -> Result<()> {
            self.sent.lock().push(bytes.to_vec());
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    /// Sink recording (channel count, per-channel lengths) per redraw
    struct CollectSink {
        renders: Arc<Mutex<Vec<(usize, Vec<usize>)>>>,
    }

    impl RenderSink for CollectSink {
        fn render(&mut self, frame: &RenderFrame<'_>) {
            let lens = frame.buffer.channels().map(|c| c.len()).collect();
            self.renders
                .lock()
                .push((frame.buffer.channel_count(), lens));
        }
    }

    struct Harness {
        connector: ScriptedConnector,
        renders: Arc<Mutex<Vec<(usize, Vec<usize>)>>>,
        handle: SessionHandle,
        thread: thread::JoinHandle<()>,
    }

    fn start_session() -> Harness {
        let connector = ScriptedConnector::new();
        let renders = Arc::new(Mutex::new(Vec::new()));

        let (mut session, handle) = Session::new(
            test_node(),
            Box::new(connector.clone()),
            PlotWindow::default(),
            MAX_RATE_HZ,
            Box::new(CollectSink {
                renders: Arc::clone(&renders),
            }),
        );
        let thread = thread::spawn(move || {
            let _ = session.run();
        });

        // Let the initial connect land
        thread::sleep(Duration::from_millis(50));

        Harness {
            connector,
            renders,
            handle,
            thread,
        }
    }

    impl Harness {
        fn stop(self) -> (ScriptedConnector, Arc<Mutex<Vec<(usize, Vec<usize>)>>>) {
            self.handle.send(Command::Shutdown);
            let _ = self.thread.join();
            (self.connector, self.renders)
        }
    }

    fn telemetry_buffer(node_id: u32, timestamp_ms: u64, values: &[f64]) -> Vec<u8> {
        TelemetryFrame {
            timestamp_ms,
            node_id,
            values: values.to_vec(),
        }
        .encode()
    }

    #[test]
    fn test_ingest_to_render_pipeline() {
        let h = start_session();
        assert_eq!(h.connector.connect_count(), 1);

        let now = wall_clock_ms();
        let tap = h.connector.tap(0);

        // Two matching records packed into one buffer plus one foreign one
        let mut buf = telemetry_buffer(NODE_ID, now, &[1.0, 2.0]);
        buf.extend(telemetry_buffer(NODE_ID, now + 1, &[3.0, 4.0]));
        buf.extend(telemetry_buffer(NODE_ID + 1, now, &[9.0, 9.0, 9.0]));
        tap.send(LinkEvent::Frame(buf)).unwrap();

        thread::sleep(Duration::from_millis(150));
        let (_, renders) = h.stop();

        let renders = renders.lock();
        assert!(!renders.is_empty(), "redraw tick never fired");
        // The foreign three-channel frame must not have widened the scope
        let (channels, lens) = renders.last().unwrap().clone();
        assert_eq!(channels, 2);
        assert_eq!(lens, vec![2, 2]);
    }

    #[test]
    fn test_redraw_coalesces_between_ticks() {
        let h = start_session();
        let now = wall_clock_ms();
        let tap = h.connector.tap(0);

        // A burst far above the redraw rate
        for i in 0..50 {
            tap.send(LinkEvent::Frame(telemetry_buffer(NODE_ID, now + i, &[0.5])))
                .unwrap();
        }

        thread::sleep(Duration::from_millis(200));
        let (_, renders) = h.stop();

        let renders = renders.lock();
        assert!(!renders.is_empty());
        // 50 buffers in well under a second cannot mean 50 redraws at 50Hz
        assert!(
            renders.len() < 50,
            "expected coalesced redraws, got {}",
            renders.len()
        );
        assert_eq!(renders.last().unwrap().1, vec![50]);
    }

    #[test]
    fn test_normal_close_reconnects_after_delay() {
        let h = start_session();

        h.connector
            .tap(0)
            .send(LinkEvent::Closed {
                code: 1000,
                reason: String::new(),
            })
            .unwrap();

        // Before the delay elapses there must be no second attempt
        thread::sleep(Duration::from_millis(500));
        assert_eq!(h.connector.connect_count(), 1);

        thread::sleep(Duration::from_millis(800));
        assert_eq!(h.connector.connect_count(), 2);

        h.stop();
    }

    #[test]
    fn test_abnormal_close_does_not_reconnect() {
        let h = start_session();

        h.connector
            .tap(0)
            .send(LinkEvent::Closed {
                code: 4000,
                reason: "policy violation".to_string(),
            })
            .unwrap();

        thread::sleep(Duration::from_millis(1300));
        assert_eq!(h.connector.connect_count(), 1);

        h.stop();
    }

    #[test]
    fn test_pause_cancels_pending_reconnect() {
        let h = start_session();

        h.connector
            .tap(0)
            .send(LinkEvent::Closed {
                code: 1000,
                reason: String::new(),
            })
            .unwrap();
        thread::sleep(Duration::from_millis(100));

        // Pause lands before the 1s delay elapses
        h.handle.send(Command::Pause);
        thread::sleep(Duration::from_millis(1300));
        assert_eq!(h.connector.connect_count(), 1);

        // Play reconnects immediately
        h.handle.send(Command::Play);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(h.connector.connect_count(), 2);

        h.stop();
    }

    #[test]
    fn test_control_frames_carry_increasing_sequence() {
        let h = start_session();

        h.handle.send(Command::SetValue(40));
        h.handle.send(Command::SetSwitch { bit: 0, on: true });
        h.handle.send(Command::SetSwitch { bit: 2, on: true });
        thread::sleep(Duration::from_millis(100));
        let (connector, _) = h.stop();

        let sent = connector.sent.lock();
        assert_eq!(sent.len(), 3);

        let frames: Vec<ControlFrame> = sent
            .iter()
            .map(|b| ControlFrame::decode(b).unwrap())
            .collect();
        assert_eq!(frames[0].sequence, 0);
        assert_eq!(frames[1].sequence, 1);
        assert_eq!(frames[2].sequence, 2);
        assert_eq!(frames[2].node_id, NODE_ID);
        assert_eq!(frames[2].value, 40);
        assert_eq!(frames[2].switches, 0b101);
    }
}
