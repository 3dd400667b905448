#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unsafe_code)]

pub mod checks;
pub mod daemon;
pub mod error;
pub mod logtail;
pub mod monitor;
pub mod pidfile;
pub mod shutdown;
pub mod stream;
pub mod workers;

pub use checks::{QueryTarget, RconTarget, RestartChannel};
pub use daemon::{Channel, Daemon, RestartOutcome, SupervisionHandle};
pub use error::{DaemonError, SupervisionError};
pub use logtail::{LogTailer, RconLineExtractor};
pub use monitor::{HealthMonitor, MonitorChecks};
pub use shutdown::StopSignal;
pub use workers::{RestartIntensity, WorkerFactory, WorkerTable};
