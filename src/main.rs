//! NodeScope - live telemetry scope client
//!
//! Discovers connectable nodes on a signal gateway, attaches to one over
//! a WebSocket and feeds its telemetry into a time-windowed scope buffer.
//! Control frames (analog level + toggles) go back over the same link.

use nodescope::{App, AppConfig};
use std::env;
use std::path::Path;

struct Args {
    config_path: String,
    use_mock: bool,
}

/// Parse command line arguments.
///
/// Supports:
/// - `nodescope <path>` (positional)
/// - `nodescope --config <path>` (flag-based)
/// - `nodescope -c <path>` (short flag)
/// - `nodescope --mock` (built-in waveform gateway, no network)
///
/// Defaults to `nodescope.toml` if no path is specified.
fn parse_args() -> Args {
    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<String> = None;
    let mut use_mock = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" if i + 1 < args.len() => {
                config_path = Some(args[i + 1].clone());
                i += 1;
            }
            "--mock" => use_mock = true,
            arg if !arg.starts_with('-') && config_path.is_none() => {
                config_path = Some(arg.to_string());
            }
            _ => {}
        }
        i += 1;
    }

    Args {
        config_path: config_path.unwrap_or_else(|| "nodescope.toml".to_string()),
        use_mock,
    }
}

fn main() -> nodescope::Result<()> {
    let args = parse_args();

    let config = if Path::new(&args.config_path).exists() {
        AppConfig::from_file(&args.config_path)?
    } else {
        AppConfig::default()
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("NodeScope v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {}", args.config_path);
    if args.use_mock {
        log::info!("Mock gateway enabled");
    } else {
        log::info!("Gateway: {}", config.discovery.base_url);
    }

    let app = App::new(config);
    app.run(args.use_mock)
}
