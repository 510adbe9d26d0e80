//! Static table of node positions on the base board.
//!
//! Each position binds a node index to its spidev chip-select device and
//! the GPIO line its interrupt output is wired to.

/// Fixed wiring of one node position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodePosition {
    /// Node index, `0..=2`.
    pub index: u8,
    /// Bus device path.
    pub device_path: &'static str,
    /// GPIO number of the interrupt line.
    pub interrupt_gpio: u32,
}

/// All node positions, by index.
pub const POSITIONS: [NodePosition; 3] = [
    NodePosition {
        index: 0,
        device_path: "/dev/spidev0.1",
        interrupt_gpio: 27,
    },
    NodePosition {
        index: 1,
        device_path: "/dev/spidev0.3",
        interrupt_gpio: 23,
    },
    NodePosition {
        index: 2,
        device_path: "/dev/spidev0.2",
        interrupt_gpio: 22,
    },
];

/// Look up the position for `index`.
pub fn position(index: u8) -> Option<&'static NodePosition> {
    POSITIONS.get(usize::from(index))
}
