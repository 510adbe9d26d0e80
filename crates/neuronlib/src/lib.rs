//! # neuronlib -- Async Driver for Neuron I/O Boards
//!
//! `neuronlib` drives the I/O expansion boards ("nodes") of a Neuron
//! controller over the host's SPI bus. It speaks the boards' framed
//! register/bit protocol, serializes all traffic for a board through one
//! bus worker task, and negotiates each board's version and bus speed when
//! it is attached.
//!
//! ## Quick Start
//!
//! ```no_run
//! use neuronlib::NodeBuilder;
//!
//! #[tokio::main]
//! async fn main() -> neuronlib::Result<()> {
//!     let node = NodeBuilder::new(0).attach().await?;
//!     println!("{}", node.version());
//!
//!     let inputs = node.read_bits(0, node.version().di_count.into()).await?;
//!     node.write_bit(0, true).await?;
//!     println!("inputs: {inputs:?}");
//!
//!     node.detach().await
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                    | Purpose                                               |
//! |--------------------------|-------------------------------------------------------|
//! | `neuronlib-core`         | Traits ([`SpiBus`], [`InterruptLine`]), transfer primitive, errors |
//! | `neuronlib-transport`    | Linux spidev bus and sysfs GPIO interrupt line        |
//! | `neuronlib-spi`          | Protocol engine: frames, segments, bus worker, node driver |
//! | `neuronlib-test-harness` | Mock bus and interrupt line for tests                 |
//! | **`neuronlib`**          | This facade crate -- re-exports everything            |
//!
//! ## Events
//!
//! Every node publishes [`NodeEvent`]s on a broadcast channel: attach,
//! interrupt edges and detach.
//!
//! ```no_run
//! use neuronlib::{NodeBuilder, NodeEvent};
//! # async fn example() -> neuronlib::Result<()> {
//! let node = NodeBuilder::new(1).attach().await?;
//! let mut events = node.subscribe();
//! while let Ok(event) = events.recv().await {
//!     if let NodeEvent::InterruptReceived { index } = event {
//!         let changed = node.read_bits(0, 8).await?;
//!         println!("node {index}: {changed:?}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub use neuronlib_core::*;

pub use neuronlib_spi::{
    BoardVersion, BusWorker, FunctionCode, Message, MessageState, Node, NodeBuilder, Payload,
    PendingReply, Reply, WorkerConfig, board_speed, decode_version, spawn_bus_worker,
};

/// The protocol engine: checksum, version decoding, frames, segmentation,
/// bus worker and node driver.
pub mod spi {
    pub use neuronlib_spi::*;
}

/// Linux hardware backends.
///
/// Provides [`SpidevBus`](transport::SpidevBus) and
/// [`SysfsGpioLine`](transport::SysfsGpioLine).
pub mod transport {
    pub use neuronlib_transport::*;
}

/// Returns the fixed wiring of every node position.
///
/// # Example
///
/// ```
/// for pos in neuronlib::node_positions() {
///     println!("node {}: {} (gpio {})", pos.index, pos.device_path, pos.interrupt_gpio);
/// }
/// assert_eq!(neuronlib::node_positions().len(), 3);
/// ```
pub fn node_positions() -> &'static [spi::positions::NodePosition] {
    &spi::positions::POSITIONS
}
