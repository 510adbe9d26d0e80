//! NodeBuilder -- fluent builder for attaching [`Node`] instances.
//!
//! Separates configuration from bring-up so that callers can override the
//! device path, interrupt line, timeouts and bus timing before the board is
//! opened and identified.
//!
//! # Example
//!
//! ```no_run
//! use neuronlib_spi::builder::NodeBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> neuronlib_core::Result<()> {
//! let node = NodeBuilder::new(1)
//!     .command_timeout(Duration::from_millis(200))
//!     .attach()
//!     .await?;
//! let inputs = node.read_bits(0, 4).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::warn;

use neuronlib_core::bus::SpiBus;
use neuronlib_core::error::{Error, Result};
use neuronlib_core::events::NodeEvent;
use neuronlib_core::interrupt::InterruptLine;
use neuronlib_transport::{SpidevBus, SysfsGpioLine};

use crate::io::WorkerConfig;
use crate::message::DEFAULT_MESSAGE_TIMEOUT;
use crate::node::{Node, NodeConfig};
use crate::positions::{NodePosition, position};
use crate::segment::DEFAULT_SETTLING_DELAY_US;
use crate::version::DEFAULT_SPEED_HZ;

/// Capacity of the event channel created when none is supplied.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Fluent builder for [`Node`].
///
/// Defaults come from the node position table, so the simplest usage is:
///
/// ```ignore
/// let node = NodeBuilder::new(0).attach().await?;
/// ```
pub struct NodeBuilder {
    index: u8,
    device_path: Option<String>,
    interrupt_gpio: Option<u32>,
    interrupts: bool,
    command_timeout: Duration,
    default_speed_hz: u32,
    settling_delay_us: u16,
    message_gap: Duration,
    verify_speed: bool,
    queue_depth: usize,
    event_tx: Option<broadcast::Sender<NodeEvent>>,
}

impl NodeBuilder {
    /// Create a builder for the node at position `index` (`0..=2`).
    pub fn new(index: u8) -> Self {
        NodeBuilder {
            index,
            device_path: None,
            interrupt_gpio: None,
            interrupts: true,
            command_timeout: DEFAULT_MESSAGE_TIMEOUT,
            default_speed_hz: DEFAULT_SPEED_HZ,
            settling_delay_us: DEFAULT_SETTLING_DELAY_US,
            message_gap: Duration::from_millis(1),
            verify_speed: true,
            queue_depth: 32,
            event_tx: None,
        }
    }

    /// Override the bus device path (e.g. `/dev/spidev1.0`).
    pub fn device_path(mut self, path: &str) -> Self {
        self.device_path = Some(path.to_string());
        self
    }

    /// Override the interrupt GPIO number.
    pub fn interrupt_gpio(mut self, gpio: u32) -> Self {
        self.interrupt_gpio = Some(gpio);
        self
    }

    /// Enable or disable interrupt monitoring (default: true).
    pub fn interrupts(mut self, enabled: bool) -> Self {
        self.interrupts = enabled;
        self
    }

    /// Set the deadline for a single message (default: 100ms).
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the bus speed used before and instead of the board speed
    /// (default: 8 MHz).
    pub fn default_speed(mut self, speed_hz: u32) -> Self {
        self.default_speed_hz = speed_hz;
        self
    }

    /// Set the chip-select settling delay in microseconds (default: 10).
    pub fn settling_delay(mut self, delay_us: u16) -> Self {
        self.settling_delay_us = delay_us;
        self
    }

    /// Set the pause between consecutive messages (default: 1ms).
    pub fn message_gap(mut self, gap: Duration) -> Self {
        self.message_gap = gap;
        self
    }

    /// Re-read the version block after changing the bus speed and fall back
    /// to the default speed if that fails (default: true).
    pub fn verify_speed(mut self, enabled: bool) -> Self {
        self.verify_speed = enabled;
        self
    }

    /// Set the capacity of the request queue (default: 32).
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Publish node events on an existing channel, e.g. one shared by
    /// several nodes.
    pub fn events(mut self, event_tx: broadcast::Sender<NodeEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    fn position(&self) -> Result<&'static NodePosition> {
        position(self.index).ok_or_else(|| {
            Error::InvalidParameter(format!("node index {} out of range 0..=2", self.index))
        })
    }

    /// Open the node's spidev device and interrupt line and attach.
    ///
    /// A missing bus device fails the attach. An interrupt line that cannot
    /// be set up does not: it is logged and the node runs without interrupt
    /// monitoring, which [`Node::interrupt_gpio`] reports as `None`. Callers
    /// that need interrupts should check it after attaching.
    pub async fn attach(self) -> Result<Node> {
        let pos = self.position()?;
        let path = self
            .device_path
            .clone()
            .unwrap_or_else(|| pos.device_path.to_string());
        let bus = SpidevBus::open(&path, self.default_speed_hz).await?;

        let line: Option<Box<dyn InterruptLine>> = if self.interrupts {
            let gpio = self.interrupt_gpio.unwrap_or(pos.interrupt_gpio);
            match SysfsGpioLine::attach(gpio).await {
                Ok(line) => Some(Box::new(line) as Box<dyn InterruptLine>),
                Err(e) => {
                    warn!(index = self.index, gpio, error = %e, "interrupt line unavailable");
                    None
                }
            }
        } else {
            None
        };

        self.attach_with_bus(Box::new(bus), line).await
    }

    /// Attach using a caller-provided bus and interrupt line.
    ///
    /// This is the entry point for testing (pass a `MockBus` from
    /// `neuronlib-test-harness`) and for integrators with their own bus
    /// backend. `line` is ignored when interrupts are disabled.
    pub async fn attach_with_bus(
        self,
        bus: Box<dyn SpiBus>,
        line: Option<Box<dyn InterruptLine>>,
    ) -> Result<Node> {
        self.position()?;

        let event_tx = self
            .event_tx
            .unwrap_or_else(|| broadcast::channel(EVENT_CHANNEL_CAPACITY).0);
        let config = NodeConfig {
            index: self.index,
            command_timeout: self.command_timeout,
            verify_speed: self.verify_speed,
            worker: WorkerConfig {
                settling_delay_us: self.settling_delay_us,
                message_gap: self.message_gap,
                default_speed_hz: self.default_speed_hz,
                queue_depth: self.queue_depth,
            },
            event_tx,
        };
        let line = if self.interrupts { line } else { None };

        Node::attach(config, bus, line).await
    }
}
