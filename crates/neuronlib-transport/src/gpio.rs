//! sysfs GPIO interrupt line.
//!
//! [`SysfsGpioLine`] exports a GPIO through `/sys/class/gpio`, configures it
//! as a rising-edge input, and waits for the kernel's `POLLPRI`
//! notification on the `value` file. Each wake-up re-reads the value and
//! only reports an edge when the line reads high.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use async_trait::async_trait;
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tracing::{debug, info, warn};

use neuronlib_core::error::{Error, Result};
use neuronlib_core::interrupt::InterruptLine;

/// Root of the sysfs GPIO class directory.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// A rising-edge input line exposed through sysfs.
pub struct SysfsGpioLine {
    gpio: u32,
    value: AsyncFd<File>,
}

impl SysfsGpioLine {
    /// Export `gpio` under [`SYSFS_GPIO_ROOT`] and open it for edge waits.
    pub async fn attach(gpio: u32) -> Result<Self> {
        Self::attach_at(SYSFS_GPIO_ROOT, gpio).await
    }

    /// Export `gpio` under an alternative sysfs root.
    ///
    /// Fails with [`Error::DeviceUnavailable`] if the line cannot be
    /// exported, configured, or its value file opened for edge-triggered
    /// reads.
    pub async fn attach_at(root: impl AsRef<Path>, gpio: u32) -> Result<Self> {
        let root = root.as_ref();
        let line_dir = root.join(format!("gpio{gpio}"));
        let value_path = line_dir.join("value");
        info!(gpio, path = %value_path.display(), "initializing interrupt line");

        if !tokio::fs::try_exists(&line_dir).await.unwrap_or(false) {
            let export = root.join("export");
            tokio::fs::write(&export, gpio.to_string())
                .await
                .map_err(|e| unavailable(&export, e))?;
        }

        if !tokio::fs::try_exists(&value_path).await.unwrap_or(false) {
            warn!(gpio, "interrupt gpio does not exist after export");
            return Err(Error::DeviceUnavailable(format!(
                "{} does not exist",
                value_path.display()
            )));
        }

        let direction = line_dir.join("direction");
        tokio::fs::write(&direction, "in")
            .await
            .map_err(|e| unavailable(&direction, e))?;
        let edge = line_dir.join("edge");
        tokio::fs::write(&edge, "rising")
            .await
            .map_err(|e| unavailable(&edge, e))?;

        let mut file = File::open(&value_path).map_err(|e| unavailable(&value_path, e))?;
        // Reading once clears the pending state so the first wait blocks.
        read_level(&mut file).map_err(|e| unavailable(&value_path, e))?;
        // SAFETY: `file` owns its descriptor and moves into the `AsyncFd`, so
        // the descriptor stays open and unchanged until the `AsyncFd` drops.
        let registered = unsafe { AsyncFd::register_with_interest(file, Interest::PRIORITY) };
        let value = registered.map_err(|e| unavailable(&value_path, e.into()))?;

        debug!(gpio, "edge notifier started");
        Ok(SysfsGpioLine { gpio, value })
    }
}

fn unavailable(path: &Path, e: std::io::Error) -> Error {
    warn!(path = %path.display(), error = %e, "could not configure interrupt line");
    Error::DeviceUnavailable(format!("{}: {e}", path.display()))
}

/// Read the current level of a sysfs `value` file.
fn read_level(mut file: &File) -> std::io::Result<bool> {
    let mut buf = [0u8; 2];
    file.seek(SeekFrom::Start(0))?;
    let n = file.read(&mut buf)?;
    Ok(n > 0 && buf[0] == b'1')
}

#[async_trait]
impl InterruptLine for SysfsGpioLine {
    async fn wait_edge(&mut self) -> Result<()> {
        loop {
            let mut guard = self.value.ready(Interest::PRIORITY).await?;
            guard.clear_ready();
            if read_level(self.value.get_ref())? {
                return Ok(());
            }
        }
    }

    fn gpio(&self) -> u32 {
        self.gpio
    }
}
