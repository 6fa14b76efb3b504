//! Application layer for carehub-server.
//!
//! Knows *what* happens to a frame or an idle session but never touches a
//! socket: connections and the reaper thread in the infrastructure layer call
//! into it through [`SessionChannel`](crate::domain::SessionChannel).
//!
//! - `session_table` - concurrent peer → session map
//! - `dispatcher`    - classification and per-type routing
//! - `camera`, `wearable` - frame handlers
//! - `monitor`       - bounded queues towards the external monitor
//! - `eviction`      - one reaper sweep

pub mod camera;
pub mod dispatcher;
pub mod eviction;
pub mod monitor;
pub mod session_table;
pub mod wearable;

pub use camera::{AnalysisError, FormatProbeAnalyzer, ImageAnalyzer};
pub use dispatcher::{DispatchOutcome, Dispatcher, DropReason};
pub use eviction::{sweep, EvictionPolicy, SweepReport};
pub use monitor::{monitor_queues, MonitorReceivers, MonitorRecord, MonitorSink};
pub use session_table::{Lookup, SessionTable};
