//! Hand-off of decoded tile payloads to the render worker
//!
//! Payloads move: a [`TransferBuffer`] is consumed by
//! [`TileDataRouter::push_tile_data`] and its bytes travel to the worker
//! without copying. Until the worker reports ready, pushes wait in arrival
//! order and are flushed exactly once.

use crate::core::geo::{Extent, TileKey};
use crate::rendering::messages::{TileData, WorkerCommand};
use crate::{Error, Result};
use crossbeam_channel::Sender;
use std::collections::VecDeque;

/// Move-only byte buffer. Once its contents are taken it is detached and any
/// further transfer attempt fails.
#[derive(Debug, Default)]
pub struct TransferBuffer {
    bytes: Option<Vec<u8>>,
}

impl TransferBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes: Some(bytes) }
    }

    pub fn is_detached(&self) -> bool {
        self.bytes.is_none()
    }

    /// Byte length, 0 once detached
    pub fn len(&self) -> usize {
        self.bytes.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes the contents, leaving this buffer detached
    pub fn detach(&mut self) -> Result<Vec<u8>> {
        self.bytes.take().ok_or_else(|| {
            Error::ChannelTransferFailure("buffer is already detached".to_string())
        })
    }

    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        self.detach()
    }
}

impl From<Vec<u8>> for TransferBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// Routes tile payloads into the render worker, buffering until it is ready
pub struct TileDataRouter {
    commands: Sender<WorkerCommand>,
    worker_ready: bool,
    pending: VecDeque<TileData>,
    transferred: u64,
}

impl TileDataRouter {
    pub fn new(commands: Sender<WorkerCommand>) -> Self {
        Self {
            commands,
            worker_ready: false,
            pending: VecDeque::new(),
            transferred: 0,
        }
    }

    /// Transfers `bytes` for `tile_coord` to the worker, or defers it until the
    /// worker is ready. Fails if `bytes` was already detached or the worker is gone.
    pub fn push_tile_data(
        &mut self,
        bytes: TransferBuffer,
        tile_coord: TileKey,
        extent: Extent,
    ) -> Result<()> {
        let data = TileData {
            bytes: bytes.into_bytes()?,
            tile_coord,
            extent,
        };
        if self.worker_ready {
            self.transfer(data)
        } else {
            log::trace!("deferring tile {} until the worker is ready", tile_coord);
            self.pending.push_back(data);
            Ok(())
        }
    }

    /// Marks the worker ready and flushes deferred pushes in submission order.
    /// Returns how many were flushed; later calls flush nothing.
    pub fn on_worker_ready(&mut self) -> Result<usize> {
        if self.worker_ready {
            return Ok(0);
        }
        self.worker_ready = true;

        let mut flushed = 0;
        while let Some(data) = self.pending.pop_front() {
            self.transfer(data)?;
            flushed += 1;
        }
        log::debug!("flushed {} deferred tile payloads", flushed);
        Ok(flushed)
    }

    pub fn is_worker_ready(&self) -> bool {
        self.worker_ready
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Payloads handed to the worker so far
    pub fn transferred_count(&self) -> u64 {
        self.transferred
    }

    fn transfer(&mut self, data: TileData) -> Result<()> {
        let tile_coord = data.tile_coord;
        self.commands
            .send(WorkerCommand::TileData(data))
            .map_err(|_| {
                Error::ChannelTransferFailure(format!(
                    "render worker is gone, tile {} not delivered",
                    tile_coord
                ))
            })?;
        self.transferred += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn extent() -> Extent {
        Extent::new(0.0, 0.0, 1.0, 1.0)
    }

    fn received_tiles(rx: &crossbeam_channel::Receiver<WorkerCommand>) -> Vec<TileKey> {
        rx.try_iter()
            .filter_map(|cmd| match cmd {
                WorkerCommand::TileData(data) => Some(data.tile_coord),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_pushes_before_ready_flush_in_order_once() {
        let (tx, rx) = unbounded();
        let mut router = TileDataRouter::new(tx);
        for x in 0..3 {
            router
                .push_tile_data(vec![x as u8].into(), TileKey::new(1, x, 0), extent())
                .unwrap();
        }
        assert!(received_tiles(&rx).is_empty());
        assert_eq!(router.pending_count(), 3);

        assert_eq!(router.on_worker_ready().unwrap(), 3);
        assert_eq!(router.on_worker_ready().unwrap(), 0);
        assert_eq!(
            received_tiles(&rx),
            vec![TileKey::new(1, 0, 0), TileKey::new(1, 1, 0), TileKey::new(1, 2, 0)]
        );
    }

    #[test]
    fn test_pushes_after_ready_transfer_immediately() {
        let (tx, rx) = unbounded();
        let mut router = TileDataRouter::new(tx);
        router.on_worker_ready().unwrap();
        router
            .push_tile_data(vec![1, 2, 3].into(), TileKey::new(0, 0, 0), extent())
            .unwrap();

        match rx.try_recv().unwrap() {
            WorkerCommand::TileData(data) => assert_eq!(data.bytes, vec![1, 2, 3]),
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(router.transferred_count(), 1);
    }

    #[test]
    fn test_detached_buffer_is_a_transfer_failure() {
        let (tx, _rx) = unbounded();
        let mut router = TileDataRouter::new(tx);
        let mut buffer = TransferBuffer::new(vec![9; 16]);
        let _taken = buffer.detach().unwrap();
        assert!(buffer.is_detached());

        let err = router
            .push_tile_data(buffer, TileKey::new(0, 0, 0), extent())
            .unwrap_err();
        assert!(matches!(err, Error::ChannelTransferFailure(_)));
        assert_eq!(router.pending_count(), 0);
    }

    #[test]
    fn test_closed_worker_channel_is_a_transfer_failure() {
        let (tx, rx) = unbounded();
        drop(rx);
        let mut router = TileDataRouter::new(tx);
        router.on_worker_ready().unwrap();
        let err = router
            .push_tile_data(vec![0].into(), TileKey::new(0, 0, 0), extent())
            .unwrap_err();
        assert!(matches!(err, Error::ChannelTransferFailure(_)));
    }
}
