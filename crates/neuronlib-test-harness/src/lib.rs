//! neuronlib-test-harness: Test utilities and mock hardware for neuronlib.
//!
//! This crate provides [`MockBus`] for deterministic testing of the protocol
//! engine and node driver without a real Neuron board, and
//! [`MockInterruptLine`] for driving interrupt notifications from a test.

pub mod mock_bus;
pub mod mock_interrupt;

pub use mock_bus::{MockBus, TransferLog};
pub use mock_interrupt::{InterruptTrigger, MockInterruptLine};
