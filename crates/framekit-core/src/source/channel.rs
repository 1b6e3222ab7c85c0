//! Bounded queue between a transport thread and the decoding thread.

use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};

use super::{ByteSource, SourceError};

/// Create a bounded chunk queue holding at most `capacity` chunks.
///
/// `send` blocks the transport side when the queue is full; the source ends
/// once every sender is dropped and the queue is drained.
///
/// # Examples
/// ```
/// use framekit_core::ByteSource;
/// use framekit_core::source::chunk_channel;
///
/// let (sender, mut source) = chunk_channel(4);
/// let producer = std::thread::spawn(move || {
///     sender.send(vec![0xAA, 0x55]).unwrap();
/// });
/// producer.join().unwrap();
/// assert_eq!(source.next_chunk().unwrap(), Some(vec![0xAA, 0x55]));
/// assert_eq!(source.next_chunk().unwrap(), None);
/// ```
pub fn chunk_channel(capacity: usize) -> (ChunkSender, ChannelSource) {
    let (tx, rx) = sync_channel(capacity.max(1));
    (ChunkSender { tx }, ChannelSource { rx })
}

#[derive(Debug, Clone)]
pub struct ChunkSender {
    tx: SyncSender<Vec<u8>>,
}

impl ChunkSender {
    /// Enqueue a chunk, waiting while the queue is full.
    pub fn send(&self, chunk: Vec<u8>) -> Result<(), SourceError> {
        self.tx.send(chunk).map_err(|_| SourceError::Closed)
    }

    /// Enqueue without waiting; returns the chunk back when the queue is full.
    pub fn try_send(&self, chunk: Vec<u8>) -> Result<(), TrySendError<Vec<u8>>> {
        self.tx.try_send(chunk)
    }
}

#[derive(Debug)]
pub struct ChannelSource {
    rx: Receiver<Vec<u8>>,
}

impl ByteSource for ChannelSource {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        Ok(self.rx.recv().ok())
    }
}
