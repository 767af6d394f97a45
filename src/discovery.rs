//! Node discovery over the gateway HTTP API
//!
//! One `nodes` request at startup returns the connectable endpoints; the
//! records are validated into typed structs here, once, instead of being
//! poked at field-by-field later. No retries: a gateway that cannot answer
//! this call is not going to accept a WebSocket either.

use crate::error::{Error, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Per-channel display overrides a node may declare
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SeriesStyle {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Transport kind of a discovered node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum NodeKind {
    /// Live-streaming endpoint this client can attach to
    Websocket,
    /// Anything else the gateway lists (files, simulators, ...)
    Other,
}

impl From<String> for NodeKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "websocket" => NodeKind::Websocket,
            _ => NodeKind::Other,
        }
    }
}

impl Default for NodeKind {
    fn default() -> Self {
        NodeKind::Other
    }
}

/// One connectable endpoint as reported by the gateway
///
/// Fetched once at startup and immutable afterwards; `id` is the stable
/// identifier carried in every frame, `name` is what the selection
/// parameter matches against.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Node {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub series: Option<Vec<SeriesStyle>>,
}

impl Node {
    /// Display string: the description when present, the name otherwise
    pub fn display_name(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.name)
    }
}

/// Fetch the node list from the gateway API
///
/// Records that fail validation are skipped with a warning; the remaining
/// nodes stay usable.
pub fn fetch_nodes(base_url: &str) -> Result<Vec<Node>> {
    let endpoint = format!("{}/api/v1", base_url.trim_end_matches('/'));

    let response = ureq::post(&endpoint).send_json(serde_json::json!({ "action": "nodes" }))?;
    let records: Vec<serde_json::Value> = response.into_json()?;

    let mut nodes = Vec::with_capacity(records.len());
    for (i, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<Node>(record) {
            Ok(node) => nodes.push(node),
            Err(e) => warn!("Skipping invalid node record {}: {}", i, e),
        }
    }

    info!("Found {} nodes", nodes.len());
    Ok(nodes)
}

/// Pick the current node: exact name match, else the first discovered
///
/// Returns `None` only when the discovered set is empty; the caller must
/// then stay idle rather than attempt a connection.
pub fn select_node<'a>(nodes: &'a [Node], name: Option<&str>) -> Option<&'a Node> {
    if let Some(name) = name {
        if let Some(node) = nodes.iter().find(|n| n.name == name) {
            return Some(node);
        }
        if !name.is_empty() {
            warn!("No node named '{}', falling back to first", name);
        }
    }
    nodes.first()
}

/// Derive the live-stream WebSocket URL from the gateway base URL
///
/// Scheme maps http->ws and https->wss; host is kept; an explicit port is
/// kept unless it is the scheme default (80/443).
pub fn ws_url(base_url: &str) -> Result<String> {
    let (scheme, rest) = base_url
        .split_once("://")
        .ok_or_else(|| Error::Discovery(format!("invalid base URL: {}", base_url)))?;

    let ws_scheme = match scheme {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(Error::Discovery(format!(
                "unsupported URL scheme: {}",
                other
            )))
        }
    };

    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let authority = match authority.rsplit_once(':') {
        Some((host, port))
            if (scheme == "http" && port == "80") || (scheme == "https" && port == "443") =>
        {
            host
        }
        _ => authority,
    };

    Ok(format!("{}://{}/", ws_scheme, authority))
}
