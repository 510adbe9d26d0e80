//! neuronlib-core: Core traits, types, and error definitions for neuronlib.
//!
//! This crate defines the backend-agnostic abstractions shared by the
//! protocol engine, the hardware transports and the test harness. Code that
//! integrates Neuron I/O boards depends on these types without pulling in
//! the Linux spidev or sysfs GPIO implementations.
//!
//! # Key types
//!
//! - [`SpiBus`] -- atomic multi-segment transfers on one physical bus
//! - [`Transfer`] / [`Segment`] -- the bus transfer primitive
//! - [`InterruptLine`] -- edge-notification source for a node's interrupt pin
//! - [`NodeEvent`] -- asynchronous node lifecycle notifications
//! - [`Error`] / [`Result`] -- error handling

pub mod bus;
pub mod error;
pub mod events;
pub mod interrupt;

pub use bus::{MAX_SEGMENTS, Segment, SpiBus, Transfer};
pub use error::{Error, Result};
pub use events::NodeEvent;
pub use interrupt::InterruptLine;
