//! Neuron SPI protocol engine for neuronlib.
//!
//! This crate implements the framed protocol spoken by Neuron I/O boards
//! over a raw SPI bus. It provides:
//!
//! - **Checksum** ([`crc`]) -- the table-driven 16-bit frame checksum.
//! - **Version decoding** ([`version`]) -- turn the 5-register version block
//!   into a [`BoardVersion`] and pick the board's bus speed.
//! - **Messages** ([`message`]) -- build one-phase and two-phase request
//!   frames and validate replies against them.
//! - **Segmentation** ([`segment`]) -- split a frame into the descriptors of
//!   one atomic bus transfer.
//! - **Bus worker** ([`io`]) -- the task that owns the bus and dispatches
//!   queued messages one at a time, in order, with per-message deadlines.
//! - **Node driver** ([`node`], [`builder`]) -- attach a board at a fixed
//!   position, negotiate its speed and expose register, bit and UART
//!   operations.
//! - **Interrupt monitor** ([`interrupt`]) -- publish interrupt-line edges
//!   as [`NodeEvent`](neuronlib_core::NodeEvent)s.
//!
//! # Example
//!
//! ```
//! use neuronlib_spi::function::FunctionCode;
//! use neuronlib_spi::message::Message;
//! use neuronlib_spi::segment;
//!
//! // Set coil 5: a fixed 6-byte frame after a settling delay.
//! let msg = Message::write_one(FunctionCode::WriteBit, 5, 1).unwrap();
//! assert_eq!(&msg.frame()[..], &[0x05, 0x05, 0x01, 0x00, 0xC2, 0x47]);
//!
//! let transfer = segment::render(&msg, 10, 8_000_000).unwrap();
//! assert_eq!(transfer.segments.len(), 2);
//! ```

pub mod builder;
pub mod crc;
pub mod function;
pub mod interrupt;
pub mod io;
pub mod message;
pub mod node;
pub mod positions;
pub mod reply;
pub mod segment;
pub mod version;

pub use builder::NodeBuilder;
pub use function::FunctionCode;
pub use io::{BusWorker, WorkerConfig, spawn_bus_worker};
pub use message::{Message, Payload};
pub use node::Node;
pub use reply::{MessageState, PendingReply, Reply};
pub use version::{BoardVersion, board_speed, decode_version};
