pub mod address;
pub mod catalog;
pub mod classifier;
pub mod watchdog;
pub mod session;
pub mod scheduler;
pub mod sink;
pub mod controller;
pub mod runtime;
pub mod external;
pub mod config;
pub mod logging;
pub mod errors;
pub mod serde_helpers;
#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::{ResolvedAddress, Strategy, StrategyCatalog};
pub use config::{ConfigManager, ControllerConfig, EnvConfigOverride};
pub use controller::ConnectionController;
pub use errors::{ControllerError, Result};
pub use external::{ExternalOpener, SystemOpener};
pub use runtime::{PlaybackHandle, PlaybackService};
pub use scheduler::{TimerId, TimerKind, TimerScheduler, TokioScheduler};
pub use sink::{PlaybackSink, SignalSender};
