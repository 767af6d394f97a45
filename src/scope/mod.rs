//! Time-windowed sample storage feeding the plot
//!
//! The scope holds one ordered sample sequence per telemetry channel,
//! bounded to a trailing time window. The session thread is the only
//! writer; render sinks get read-only access on each redraw tick.

mod buffer;
mod window;

pub use buffer::{Sample, SampleBuffer};
pub use window::{PlotWindow, DEFAULT_SPAN_MS, MAX_SPAN_MS, MIN_SPAN_MS};
