use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::{ControllerError, Result};

/// Last-resort escape: hand the canonical address to whatever the OS
/// associates with it. Fire and forget, no feedback reaches the controller.
pub trait ExternalOpener: Send + Sync {
    fn open(&self, address: &str) -> Result<()>;
}

/// Opens addresses with the platform's URL association
#[derive(Debug, Clone, Default)]
pub struct SystemOpener;

impl SystemOpener {
    /// Program and leading arguments for the current platform
    fn launcher() -> (&'static str, &'static [&'static str]) {
        if cfg!(target_os = "windows") {
            ("cmd", &["/C", "start", ""])
        } else if cfg!(target_os = "macos") {
            ("open", &[])
        } else {
            ("xdg-open", &[])
        }
    }
}

impl ExternalOpener for SystemOpener {
    fn open(&self, address: &str) -> Result<()> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ControllerError::InvalidAddress(address.to_string()));
        }

        let (program, args) = Self::launcher();
        let mut child = Command::new(program)
            .args(args)
            .arg(address)
            .spawn()
            .map_err(|e| ControllerError::ExternalOpen {
                reason: format!("{}: {}", program, e),
            })?;

        info!(program, address, "Opened externally");

        // reap the launcher so it does not linger as a zombie
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => debug!(program, "External launcher exited"),
                Ok(status) => warn!(program, %status, "External launcher failed"),
                Err(e) => warn!(program, error = %e, "Could not wait for external launcher"),
            }
        });

        Ok(())
    }
}
