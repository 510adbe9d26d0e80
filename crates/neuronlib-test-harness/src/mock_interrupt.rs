//! Mock interrupt line driven from a test.
//!
//! [`MockInterruptLine::new`] returns the line together with an
//! [`InterruptTrigger`]. Each [`InterruptTrigger::fire`] completes one
//! pending [`InterruptLine::wait_edge`]; dropping the trigger makes the line
//! report that it can no longer be read.

use async_trait::async_trait;
use tokio::sync::mpsc;

use neuronlib_core::error::{Error, Result};
use neuronlib_core::interrupt::InterruptLine;

/// A mock [`InterruptLine`].
#[derive(Debug)]
pub struct MockInterruptLine {
    gpio: u32,
    edges: mpsc::UnboundedReceiver<()>,
}

/// Test-side handle that raises edges on a [`MockInterruptLine`].
#[derive(Debug, Clone)]
pub struct InterruptTrigger {
    edges: mpsc::UnboundedSender<()>,
}

impl MockInterruptLine {
    /// Create a line reporting `gpio` and its trigger.
    pub fn new(gpio: u32) -> (Self, InterruptTrigger) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            MockInterruptLine { gpio, edges: rx },
            InterruptTrigger { edges: tx },
        )
    }
}

impl InterruptTrigger {
    /// Raise one rising edge. Returns `false` if the line was dropped.
    pub fn fire(&self) -> bool {
        self.edges.send(()).is_ok()
    }
}

#[async_trait]
impl InterruptLine for MockInterruptLine {
    async fn wait_edge(&mut self) -> Result<()> {
        match self.edges.recv().await {
            Some(()) => Ok(()),
            None => Err(Error::DeviceUnavailable(format!(
                "gpio{} closed",
                self.gpio
            ))),
        }
    }

    fn gpio(&self) -> u32 {
        self.gpio
    }
}
