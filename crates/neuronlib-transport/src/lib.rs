//! Hardware implementations for neuronlib.
//!
//! This crate provides concrete implementations of the traits in
//! `neuronlib-core` for Linux hosts:
//!
//! - [`SpidevBus`]: an [`SpiBus`](neuronlib_core::SpiBus) over a
//!   `/dev/spidevX.Y` character device, submitting every
//!   [`Transfer`](neuronlib_core::Transfer) as one `SPI_IOC_MESSAGE` ioctl
//! - [`SysfsGpioLine`]: an [`InterruptLine`](neuronlib_core::InterruptLine)
//!   over `/sys/class/gpio`, woken by the kernel's edge notification
//!
//! # Example
//!
//! ```no_run
//! use neuronlib_transport::SpidevBus;
//! use neuronlib_core::SpiBus;
//!
//! # async fn example() -> neuronlib_core::Result<()> {
//! let mut bus = SpidevBus::open("/dev/spidev0.1", 8_000_000).await?;
//! bus.set_speed(12_000_000).await?;
//! # Ok(())
//! # }
//! ```

pub mod gpio;
pub mod spidev;

pub use gpio::SysfsGpioLine;
pub use spidev::SpidevBus;
