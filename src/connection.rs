use crate::error::{PipelineError, Result};
use crate::packet::Packet;
use crossbeam::channel::{self, Receiver, RecvError, Sender, TrySendError};
use std::sync::Arc;

/// Buffer size used when a pipeline does not override it
pub const DEFAULT_CAPACITY: usize = 5;

/// Create a bounded single-producer/single-consumer connection.
///
/// Neither half is `Clone`, so each connection has exactly one writer and one reader.
/// `capacity` must be non-zero; the pipeline builder validates this.
pub fn connection<T: Send>(
    label: impl Into<String>,
    capacity: usize,
) -> (PacketSender<T>, PacketReceiver<T>) {
    let label: Arc<str> = Arc::from(label.into());
    let (tx, rx) = channel::bounded(capacity);
    (
        PacketSender {
            tx,
            label: Arc::clone(&label),
            ended: false,
            sent_count: 0,
            block_count: 0,
        },
        PacketReceiver {
            rx,
            label,
            ended: false,
        },
    )
}

/// Writing half of a connection
#[derive(Debug)]
pub struct PacketSender<T> {
    tx: Sender<Packet<T>>,
    label: Arc<str>,
    ended: bool,
    sent_count: u64,
    block_count: u64,
}

impl<T: Send> PacketSender<T> {
    /// Send a packet, suspending while the buffer is full
    pub fn send(&mut self, packet: Packet<T>) -> Result<()> {
        if self.ended {
            return Err(PipelineError::SendAfterEnd {
                connection: self.label.to_string(),
            });
        }
        let is_end = packet.is_end_of_stream();

        match self.tx.try_send(packet) {
            Ok(()) => {}
            Err(TrySendError::Full(packet)) => {
                self.block_count += 1;
                tracing::trace!(connection = %self.label, "connection full, suspending sender");
                self.tx.send(packet).map_err(|_| self.disconnected())?;
            }
            Err(TrySendError::Disconnected(_)) => return Err(self.disconnected()),
        }

        self.sent_count += 1;
        self.ended = is_end;
        Ok(())
    }

    /// Send a value packet
    pub fn emit(&mut self, value: T) -> Result<()> {
        self.send(Packet::Value(value))
    }

    /// Send end of stream and give up the writer
    pub fn close(mut self) -> Result<()> {
        self.send(Packet::EndOfStream)
    }

    /// True once end of stream has been sent
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Name of this connection, as used in errors and logs
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of packets sent, control markers included
    pub fn sent_count(&self) -> u64 {
        self.sent_count
    }

    /// Number of sends that found the buffer full and had to wait
    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    /// Number of packets waiting in the buffer
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// Check if no packets are waiting
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Maximum number of packets the buffer holds
    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }

    /// Buffer utilization as a percentage (0-100)
    pub fn utilization(&self) -> u32 {
        utilization(self.len(), self.capacity())
    }

    fn disconnected(&self) -> PipelineError {
        tracing::warn!(connection = %self.label, "receiver dropped before end of stream");
        PipelineError::Disconnected {
            connection: self.label.to_string(),
        }
    }
}

/// Reading half of a connection
#[derive(Debug)]
pub struct PacketReceiver<T> {
    rx: Receiver<Packet<T>>,
    label: Arc<str>,
    ended: bool,
}

impl<T: Send> PacketReceiver<T> {
    /// Receive the next packet, suspending while the buffer is empty.
    ///
    /// Fails with `Disconnected` if the producer went away without sending end of stream.
    pub fn recv(&mut self) -> Result<Packet<T>> {
        if self.ended {
            return Err(PipelineError::StreamEnded {
                connection: self.label.to_string(),
            });
        }
        match self.rx.recv() {
            Ok(packet) => {
                self.ended = packet.is_end_of_stream();
                Ok(packet)
            }
            Err(RecvError) => {
                tracing::warn!(connection = %self.label, "sender dropped before end of stream");
                Err(PipelineError::Disconnected {
                    connection: self.label.to_string(),
                })
            }
        }
    }

    /// Drain the connection into a vector, stopping after end of stream
    pub fn collect_values(&mut self) -> Result<Vec<T>> {
        let mut values = Vec::new();
        loop {
            match self.recv()? {
                Packet::Value(v) => values.push(v),
                Packet::EndOfStream => return Ok(values),
                Packet::ListStart | Packet::ListEnd => {}
            }
        }
    }

    /// True once end of stream has been received
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Name of this connection, as used in errors and logs
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of packets waiting in the buffer
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Check if no packets are waiting
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Maximum number of packets the buffer holds
    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or(0)
    }

    /// Buffer utilization as a percentage (0-100)
    pub fn utilization(&self) -> u32 {
        utilization(self.len(), self.capacity())
    }
}

fn utilization(len: usize, capacity: usize) -> u32 {
    if capacity == 0 {
        return 0;
    }
    ((len * 100) / capacity).min(100) as u32
}
