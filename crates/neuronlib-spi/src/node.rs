//! Node driver: one attached Neuron board.
//!
//! A [`Node`] owns the bus worker for its board and, when enabled, the
//! interrupt monitor for its interrupt line. It is created by
//! [`NodeBuilder`](crate::builder::NodeBuilder), which negotiates the board
//! version and bus speed before handing it out, so every `Node` talks to an
//! identified board.
//!
//! Only one `Node` may drive a given bus device at a time. Nothing in this
//! crate prevents two builders from opening the same device path; that is
//! up to the application.

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use neuronlib_core::bus::SpiBus;
use neuronlib_core::error::{Error, Result};
use neuronlib_core::events::NodeEvent;
use neuronlib_core::interrupt::InterruptLine;

use crate::function::FunctionCode;
use crate::interrupt::InterruptMonitor;
use crate::io::{BusWorker, WorkerConfig, spawn_bus_worker};
use crate::message::Message;
use crate::reply::{PendingReply, Reply};
use crate::version::{
    BoardVersion, VERSION_REGISTER, VERSION_REGISTER_COUNT, board_speed, decode_version,
};

/// Settings a [`Node`] is attached with.
pub(crate) struct NodeConfig {
    pub index: u8,
    pub command_timeout: Duration,
    pub verify_speed: bool,
    pub worker: WorkerConfig,
    pub event_tx: broadcast::Sender<NodeEvent>,
}

/// An attached Neuron board.
pub struct Node {
    index: u8,
    device_path: String,
    version: BoardVersion,
    speed_hz: u32,
    command_timeout: Duration,
    worker: Option<BusWorker>,
    monitor: Option<InterruptMonitor>,
    event_tx: broadcast::Sender<NodeEvent>,
}

impl Drop for Node {
    fn drop(&mut self) {
        // Signal both tasks to exit and abort them in case a transfer is
        // stuck in the driver.
        if let Some(worker) = &self.worker {
            worker.abort();
        }
        if let Some(monitor) = &self.monitor {
            monitor.abort();
        }
    }
}

impl Node {
    /// Bring up a node on `bus`.
    ///
    /// Starts the bus worker, reads and decodes the version block, applies
    /// the board's bus speed, optionally verifies it with a second version
    /// read, and starts the interrupt monitor. A failure to identify the
    /// board stops the worker and fails the attach.
    pub(crate) async fn attach(
        config: NodeConfig,
        bus: Box<dyn SpiBus>,
        line: Option<Box<dyn InterruptLine>>,
    ) -> Result<Node> {
        let index = config.index;
        let device_path = bus.device_path().to_string();
        let default_speed = config.worker.default_speed_hz;
        info!(index, path = %device_path, "attaching node");

        let worker = spawn_bus_worker(bus, config.worker);

        let version = match read_version(&worker, config.command_timeout).await {
            Ok(version) => version,
            Err(e) => {
                warn!(index, path = %device_path, error = %e, "board identification failed");
                worker.abort();
                return Err(e);
            }
        };

        info!(
            index,
            board = %version,
            digital_inputs = version.di_count,
            digital_outputs = version.do_count,
            analog_inputs = version.ai_count,
            analog_outputs = version.ao_count,
            uarts = version.uart_count,
            user_leds = version.uled_count,
            int_mask_register = version.int_mask_register,
            "board identified"
        );

        let speed_hz = negotiate_speed(
            &worker,
            index,
            &version,
            default_speed,
            config.command_timeout,
            config.verify_speed,
        )
        .await;

        let monitor = match line {
            Some(line) => {
                if !version.has_interrupts() {
                    debug!(
                        index,
                        gpio = line.gpio(),
                        "board reports no interrupt support"
                    );
                }
                Some(InterruptMonitor::spawn(
                    line,
                    index,
                    config.event_tx.clone(),
                ))
            }
            None => None,
        };

        info!(index, path = %device_path, speed_hz, "node attached");
        let _ = config.event_tx.send(NodeEvent::Attached { index, speed_hz });

        Ok(Node {
            index,
            device_path,
            version,
            speed_hz,
            command_timeout: config.command_timeout,
            worker: Some(worker),
            monitor,
            event_tx: config.event_tx,
        })
    }

    /// Node index (bus position).
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Path of the bus device.
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Board version decoded at attach time.
    pub fn version(&self) -> &BoardVersion {
        &self.version
    }

    /// Negotiated bus clock rate.
    pub fn speed_hz(&self) -> u32 {
        self.speed_hz
    }

    /// GPIO number of the monitored interrupt line, if any.
    pub fn interrupt_gpio(&self) -> Option<u32> {
        self.monitor.as_ref().map(InterruptMonitor::gpio)
    }

    /// Subscribe to this node's events.
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.event_tx.subscribe()
    }

    fn worker(&self) -> Result<&BusWorker> {
        self.worker.as_ref().ok_or(Error::NotConnected)
    }

    /// Queue a prepared message and return a handle to its outcome.
    ///
    /// The node's command timeout replaces the message's deadline.
    pub async fn submit(&self, message: Message) -> Result<PendingReply> {
        self.worker()?
            .submit(message.with_timeout(self.command_timeout))
            .await
    }

    async fn execute(&self, message: Message) -> Result<Reply> {
        self.submit(message).await?.wait().await
    }

    /// Read `count` consecutive registers starting at `address`.
    ///
    /// The board may return fewer registers than requested.
    pub async fn read_registers(&self, address: u16, count: u16) -> Result<Vec<u16>> {
        let message = Message::read(FunctionCode::ReadRegister, address, count)?;
        Ok(self.execute(message).await?.registers())
    }

    /// Write consecutive registers starting at `address`.
    ///
    /// More than 126 values are rejected before the bus is touched.
    pub async fn write_registers(&self, address: u16, values: &[u16]) -> Result<()> {
        let message = Message::write_many(FunctionCode::WriteRegister, address, values)?;
        self.execute(message).await.map(|_| ())
    }

    /// Write a single register.
    pub async fn write_register(&self, address: u16, value: u16) -> Result<()> {
        let message = Message::write_one(FunctionCode::WriteRegister, address, value)?;
        self.execute(message).await.map(|_| ())
    }

    /// Read `count` consecutive bits starting at `address`.
    pub async fn read_bits(&self, address: u16, count: u16) -> Result<Vec<bool>> {
        let message = Message::read(FunctionCode::ReadBit, address, count)?;
        Ok(self.execute(message).await?.bits())
    }

    /// Set or clear one coil.
    pub async fn write_bit(&self, address: u16, value: bool) -> Result<()> {
        let message = Message::write_one(FunctionCode::WriteBit, address, u16::from(value))?;
        self.execute(message).await.map(|_| ())
    }

    /// Write consecutive coils starting at `address`.
    pub async fn write_bits(&self, address: u16, values: &[bool]) -> Result<()> {
        let message = Message::write_bits(address, values)?;
        self.execute(message).await.map(|_| ())
    }

    /// Send one character to the UART whose register is `uart_address`.
    pub async fn write_character(&self, uart_address: u16, ch: u8) -> Result<()> {
        let message =
            Message::write_one(FunctionCode::WriteCharacter, uart_address, u16::from(ch))?;
        self.execute(message).await.map(|_| ())
    }

    /// Send up to 240 bytes to a UART.
    pub async fn write_string(&self, uart_address: u16, data: &[u8]) -> Result<()> {
        let message = Message::write_string(uart_address, data)?;
        self.execute(message).await.map(|_| ())
    }

    /// Read up to `len` buffered bytes from a UART.
    pub async fn read_string(&self, uart_address: u16, len: u16) -> Result<Vec<u8>> {
        let message = Message::read(FunctionCode::ReadString, uart_address, len)?;
        Ok(self.execute(message).await?.bytes().to_vec())
    }

    /// Send the keep-alive frame.
    pub async fn idle(&self) -> Result<()> {
        self.execute(Message::idle()).await.map(|_| ())
    }

    /// Stop the interrupt monitor and the bus worker.
    ///
    /// Messages already queued are dispatched before the worker exits.
    pub async fn detach(mut self) -> Result<()> {
        if let Some(monitor) = self.monitor.take() {
            monitor.stop().await;
        }
        let result = match self.worker.take() {
            Some(worker) => worker.shutdown().await.map(|_| ()),
            None => Ok(()),
        };
        info!(index = self.index, path = %self.device_path, "node detached");
        let _ = self.event_tx.send(NodeEvent::Detached { index: self.index });
        result
    }
}

/// Read and decode the version block.
async fn read_version(worker: &BusWorker, timeout: Duration) -> Result<BoardVersion> {
    let message = Message::read(
        FunctionCode::ReadRegister,
        VERSION_REGISTER,
        VERSION_REGISTER_COUNT,
    )?
    .with_timeout(timeout);
    let registers = worker.execute(message).await?.registers();
    let block: [u16; 5] = registers.as_slice().try_into().map_err(|_| {
        Error::Protocol(format!(
            "version block returned {} registers, expected {VERSION_REGISTER_COUNT}",
            registers.len()
        ))
    })?;
    Ok(decode_version(&block))
}

/// Apply the board's bus speed and return the speed in effect afterwards.
///
/// Speed problems are not fatal: the node falls back to the default speed
/// when the board speed cannot be applied or does not read back cleanly.
async fn negotiate_speed(
    worker: &BusWorker,
    index: u8,
    version: &BoardVersion,
    default_speed: u32,
    timeout: Duration,
    verify: bool,
) -> u32 {
    let target = board_speed(version);
    if let Err(e) = worker.set_speed(target).await {
        warn!(index, speed_hz = target, error = %e, "cannot apply board speed");
        return default_speed;
    }
    if !verify || target == default_speed {
        return target;
    }

    let failure = match read_version(worker, timeout).await {
        Ok(again) if again == *version => return target,
        Ok(_) => "version block changed".to_string(),
        Err(e) => e.to_string(),
    };
    warn!(
        index,
        speed_hz = target,
        fallback_hz = default_speed,
        reason = %failure,
        "board speed verification failed, reverting"
    );
    match worker.set_speed(default_speed).await {
        Ok(()) => default_speed,
        Err(e) => {
            warn!(index, speed_hz = default_speed, error = %e, "cannot revert bus speed");
            target
        }
    }
}
