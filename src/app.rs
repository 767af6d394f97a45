//! Application orchestration
//!
//! Wires discovery, node selection, the transport and the session
//! together, and runs the line-based control surface that stands in for
//! the dashboard widgets.

use crate::config::AppConfig;
use crate::discovery::{self, Node, NodeKind, SeriesStyle};
use crate::error::{Error, Result};
use crate::link::{Connector, MockConnector, WsConnector};
use crate::scope::PlotWindow;
use crate::session::{Command, LogSink, Session, SessionHandle};
use log::{info, warn};
use std::io::{self, BufRead};
use std::thread;

/// Node id the mock gateway emits frames for
const MOCK_NODE_ID: u32 = 1;

/// Main application: discovery, selection, one session
pub struct App {
    config: AppConfig,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Run until shutdown; `use_mock` swaps the gateway for the built-in
    /// waveform generator
    pub fn run(&self, use_mock: bool) -> Result<()> {
        let (node, connector) = if use_mock {
            self.mock_target()
        } else {
            match self.discover_target()? {
                Some(target) => target,
                // Empty discovery set: idle no-op, not an error
                None => {
                    warn!("No nodes discovered; nothing to connect to");
                    return Ok(());
                }
            }
        };

        info!("Selected node '{}' (id {})", node.display_name(), node.id);

        let window = PlotWindow::new(self.config.plot.span_ms);
        let (mut session, handle) = Session::new(
            node,
            connector,
            window,
            self.config.plot.update_rate_hz,
            Box::new(LogSink::new()),
        );

        let ctrlc_handle = handle.clone();
        ctrlc::set_handler(move || {
            info!("Received shutdown signal");
            ctrlc_handle.send(Command::Shutdown);
        })
        .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

        thread::Builder::new()
            .name("control-input".to_string())
            .spawn(move || control_input_loop(handle))?;

        session.run()
    }

    fn discover_target(&self) -> Result<Option<(Node, Box<dyn Connector>)>> {
        let base_url = &self.config.discovery.base_url;
        let nodes = discovery::fetch_nodes(base_url)?;

        let node = match discovery::select_node(&nodes, self.config.discovery.node.as_deref()) {
            Some(node) => node.clone(),
            None => return Ok(None),
        };
        if node.kind != NodeKind::Websocket {
            warn!(
                "Node '{}' is not a websocket node; connecting anyway",
                node.name
            );
        }

        let url = discovery::ws_url(base_url)?;
        Ok(Some((node, Box::new(WsConnector::new(url)))))
    }

    fn mock_target(&self) -> (Node, Box<dyn Connector>) {
        let node = Node {
            id: MOCK_NODE_ID,
            name: "mock".to_string(),
            description: Some("Built-in waveform gateway".to_string()),
            kind: NodeKind::Websocket,
            series: Some(vec![
                SeriesStyle {
                    label: Some("sine".to_string()),
                    color: None,
                },
                SeriesStyle {
                    label: Some("cosine".to_string()),
                    color: None,
                },
            ]),
        };
        (node, Box::new(MockConnector::new(MOCK_NODE_ID)))
    }
}

/// Read control commands from stdin until EOF or shutdown
fn control_input_loop(handle: SessionHandle) {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };

        match parse_command(&line) {
            Some(command) => {
                let quit = command == Command::Shutdown;
                if !handle.send(command) || quit {
                    break;
                }
            }
            None => {
                if !line.trim().is_empty() {
                    eprintln!(
                        "commands: play | pause | set <0-100> | toggle <bit> [on|off] | \
                         span <ms> | rate <hz> | quit"
                    );
                }
            }
        }
    }
}

/// Parse one control line; `None` for anything unrecognized
fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        "play" => Some(Command::Play),
        "pause" => Some(Command::Pause),
        "set" => parts.next()?.parse().ok().map(Command::SetValue),
        "toggle" => {
            let bit: u8 = parts.next()?.parse().ok()?;
            let on = match parts.next() {
                None | Some("on") => true,
                Some("off") => false,
                Some(_) => return None,
            };
            Some(Command::SetSwitch { bit, on })
        }
        "span" => parts.next()?.parse().ok().map(Command::SetSpan),
        "rate" => parts.next()?.parse().ok().map(Command::SetRate),
        "quit" | "exit" => Some(Command::Shutdown),
        _ => None,
    }
}
