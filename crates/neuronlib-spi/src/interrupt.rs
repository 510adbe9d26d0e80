//! Interrupt monitor: turns edges on a node's interrupt line into events.
//!
//! The monitor only publishes [`NodeEvent::InterruptReceived`] and logs;
//! nothing in the protocol engine reacts to it. Subscribers of the node's
//! event channel may.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use neuronlib_core::events::NodeEvent;
use neuronlib_core::interrupt::InterruptLine;

/// Handle to a running interrupt monitor task.
pub struct InterruptMonitor {
    gpio: u32,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl InterruptMonitor {
    /// Start watching `line` for node `index`.
    pub fn spawn(
        line: Box<dyn InterruptLine>,
        index: u8,
        event_tx: broadcast::Sender<NodeEvent>,
    ) -> Self {
        let gpio = line.gpio();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(monitor_loop(line, index, event_tx, cancel.clone()));
        InterruptMonitor { gpio, cancel, task }
    }

    /// GPIO number being watched.
    pub fn gpio(&self) -> u32 {
        self.gpio
    }

    /// Returns `true` while the monitor task is running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the monitor and wait for its task to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }

    /// Stop the monitor without waiting.
    pub(crate) fn abort(&self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

async fn monitor_loop(
    mut line: Box<dyn InterruptLine>,
    index: u8,
    event_tx: broadcast::Sender<NodeEvent>,
    cancel: CancellationToken,
) {
    let gpio = line.gpio();
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!(index, gpio, "interrupt monitor cancelled");
                break;
            }

            edge = line.wait_edge() => match edge {
                Ok(()) => {
                    debug!(index, gpio, "interrupt edge");
                    // No subscribers is fine.
                    let _ = event_tx.send(NodeEvent::InterruptReceived { index });
                }
                Err(e) => {
                    tracing::warn!(
                        index,
                        gpio,
                        error = %e,
                        "interrupt line failed, monitor stopped"
                    );
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use neuronlib_test_harness::MockInterruptLine;

    #[tokio::test]
    async fn edge_publishes_event() {
        let (line, trigger) = MockInterruptLine::new(23);
        let (event_tx, mut event_rx) = broadcast::channel(16);
        let monitor = InterruptMonitor::spawn(Box::new(line), 1, event_tx);
        assert_eq!(monitor.gpio(), 23);

        assert!(trigger.fire());
        let event = tokio::time::timeout(Duration::from_secs(1), event_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, NodeEvent::InterruptReceived { index: 1 });

        monitor.stop().await;
    }

    #[tokio::test]
    async fn one_event_per_edge() {
        let (line, trigger) = MockInterruptLine::new(27);
        let (event_tx, mut event_rx) = broadcast::channel(16);
        let monitor = InterruptMonitor::spawn(Box::new(line), 0, event_tx);

        for _ in 0..3 {
            trigger.fire();
        }
        for _ in 0..3 {
            let event = tokio::time::timeout(Duration::from_secs(1), event_rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(event, NodeEvent::InterruptReceived { index: 0 });
        }
        assert!(event_rx.try_recv().is_err());
        monitor.stop().await;
    }

    #[tokio::test]
    async fn line_failure_stops_monitor() {
        let (line, trigger) = MockInterruptLine::new(22);
        let (event_tx, _event_rx) = broadcast::channel(16);
        let monitor = InterruptMonitor::spawn(Box::new(line), 2, event_tx);

        drop(trigger);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn stop_while_idle() {
        let (line, _trigger) = MockInterruptLine::new(22);
        let (event_tx, _) = broadcast::channel(16);
        let monitor = InterruptMonitor::spawn(Box::new(line), 2, event_tx);
        assert!(monitor.is_running());
        tokio::time::timeout(Duration::from_secs(1), monitor.stop())
            .await
            .unwrap();
    }
}
