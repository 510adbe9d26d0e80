//! Interrupt line trait.
//!
//! Each Neuron node raises a GPIO line when it has pending input changes.
//! The protocol engine treats the line purely as an event source: the
//! interrupt monitor waits on an [`InterruptLine`] and publishes one
//! notification per observed rising edge.

use async_trait::async_trait;

use crate::error::Result;

/// An edge-triggered input line.
#[async_trait]
pub trait InterruptLine: Send + Sync {
    /// Wait until the next rising edge is observed.
    ///
    /// Returns an error if the line can no longer be read; the monitor
    /// stops watching the line in that case.
    async fn wait_edge(&mut self) -> Result<()>;

    /// GPIO number of the line, for logging.
    fn gpio(&self) -> u32;
}
