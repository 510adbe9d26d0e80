//! Validated replies and the caller-side completion handle.

use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use neuronlib_core::error::{Error, Result};

use crate::function::FunctionCode;

/// A reply that passed validation against its request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    function: FunctionCode,
    address: u16,
    count: u16,
    data: Bytes,
}

impl Reply {
    pub(crate) fn new(function: FunctionCode, address: u16, count: u16, data: Bytes) -> Self {
        Reply {
            function,
            address,
            count,
            data,
        }
    }

    pub fn function(&self) -> FunctionCode {
        self.function
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    /// Number of items the board reported.
    pub fn count(&self) -> u16 {
        self.count
    }

    /// Returned register values, for `ReadRegister`.
    pub fn registers(&self) -> Vec<u16> {
        self.data
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    /// Returned bit states, for `ReadBit`. Bits are packed LSB first.
    pub fn bits(&self) -> Vec<bool> {
        (0..usize::from(self.count))
            .filter_map(|i| self.data.get(i / 8).map(|byte| byte & (1 << (i % 8)) != 0))
            .collect()
    }

    /// Raw returned payload bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Where a submitted message is in its lifecycle.
///
/// A message leaves `Pending` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    Pending,
    Completed,
    TimedOut,
    TransportError,
    ProtocolError,
}

impl MessageState {
    /// Terminal state corresponding to a dispatch outcome.
    pub fn of(result: &Result<Reply>) -> Self {
        match result {
            Ok(_) => MessageState::Completed,
            Err(Error::Timeout) => MessageState::TimedOut,
            Err(Error::Protocol(_)) => MessageState::ProtocolError,
            Err(_) => MessageState::TransportError,
        }
    }
}

/// Handle to a message queued on a bus worker.
///
/// The worker completes the message exactly once. [`PendingReply::state`]
/// polls without blocking; [`PendingReply::wait`] yields the result.
#[derive(Debug)]
pub struct PendingReply {
    id: u64,
    rx: oneshot::Receiver<Result<Reply>>,
    outcome: Option<Result<Reply>>,
}

impl PendingReply {
    pub(crate) fn new(id: u64, rx: oneshot::Receiver<Result<Reply>>) -> Self {
        PendingReply {
            id,
            rx,
            outcome: None,
        }
    }

    /// Identifier assigned by the worker handle, unique per worker.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current state of the message. Never blocks.
    pub fn state(&mut self) -> MessageState {
        if self.outcome.is_none() {
            match self.rx.try_recv() {
                Ok(result) => self.outcome = Some(result),
                Err(TryRecvError::Empty) => return MessageState::Pending,
                Err(TryRecvError::Closed) => self.outcome = Some(Err(Error::NotConnected)),
            }
        }
        match &self.outcome {
            Some(result) => MessageState::of(result),
            None => MessageState::Pending,
        }
    }

    /// Wait for the message to reach a terminal state.
    pub async fn wait(self) -> Result<Reply> {
        if let Some(result) = self.outcome {
            return result;
        }
        self.rx.await.map_err(|_| Error::NotConnected)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_are_little_endian() {
        let reply = Reply::new(
            FunctionCode::ReadRegister,
            0,
            2,
            Bytes::from_static(&[0x01, 0x04, 0xFF, 0x00]),
        );
        assert_eq!(reply.registers(), vec![0x0401, 0x00FF]);
    }

    #[test]
    fn bits_stop_at_count() {
        let reply = Reply::new(FunctionCode::ReadBit, 0, 3, Bytes::from_static(&[0xFF]));
        assert_eq!(reply.bits(), vec![true, true, true]);
    }

    #[test]
    fn state_mapping() {
        let ok: Result<Reply> = Ok(Reply::new(FunctionCode::Idle, 0, 0, Bytes::new()));
        assert_eq!(MessageState::of(&ok), MessageState::Completed);
        assert_eq!(
            MessageState::of(&Err(Error::Timeout)),
            MessageState::TimedOut
        );
        assert_eq!(
            MessageState::of(&Err(Error::Protocol("x".into()))),
            MessageState::ProtocolError
        );
        assert_eq!(
            MessageState::of(&Err(Error::Transport("x".into()))),
            MessageState::TransportError
        );
    }

    #[tokio::test]
    async fn pending_until_completed() {
        let (tx, rx) = oneshot::channel();
        let mut pending = PendingReply::new(7, rx);
        assert_eq!(pending.id(), 7);
        assert_eq!(pending.state(), MessageState::Pending);

        tx.send(Err(Error::Timeout)).unwrap();
        assert_eq!(pending.state(), MessageState::TimedOut);
        // The outcome is cached; asking again does not change it.
        assert_eq!(pending.state(), MessageState::TimedOut);
        assert!(matches!(pending.wait().await, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn dropped_sender_is_not_connected() {
        let (tx, rx) = oneshot::channel::<Result<Reply>>();
        drop(tx);
        let pending = PendingReply::new(1, rx);
        assert!(matches!(pending.wait().await, Err(Error::NotConnected)));
    }
}
