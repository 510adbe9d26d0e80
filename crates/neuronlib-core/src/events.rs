//! Asynchronous node event types.
//!
//! Events are emitted by the node driver through a
//! `tokio::sync::broadcast` channel. Applications subscribe to them to
//! react to board interrupts without polling.

/// An event emitted by a node driver.
///
/// Delivered on a best-effort basis through a bounded broadcast channel;
/// slow consumers may miss events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// The node finished attach-time negotiation.
    Attached {
        /// Node index (bus position).
        index: u8,
        /// Negotiated bus clock rate in hertz.
        speed_hz: u32,
    },

    /// A rising edge was observed on the node's interrupt line.
    InterruptReceived {
        /// Node index (bus position).
        index: u8,
    },

    /// The node was detached and its bus worker stopped.
    Detached {
        /// Node index (bus position).
        index: u8,
    },
}
