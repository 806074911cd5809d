//! Strategies for handing view snapshots to the render worker
//!
//! Both strategies sit behind [`RenderChannel`]. The message strategy sends
//! one request per render and gets the rendered view back, which is what
//! drives staleness compensation. The shared-memory strategy publishes into a
//! [`SharedFrameBuffer`] without any per-tick transfer but also without an
//! acknowledgement, so no compensation is possible under it.

use super::messages::WorkerCommand;
use super::shared::SharedFrameBuffer;
use crate::core::config::ChannelStrategy;
use crate::core::view::RenderSnapshot;
use crate::{Error, Result};
use crossbeam_channel::Sender;
use std::sync::Arc;

pub trait RenderChannel: Send {
    fn strategy(&self) -> ChannelStrategy;

    /// Hands `snapshot` to the worker
    fn submit(&mut self, snapshot: RenderSnapshot) -> Result<()>;

    /// Whether each submission is answered with a `Rendered` event
    fn acknowledges(&self) -> bool;
}

/// One `FRAME_STATE` command per render request
pub struct MessageChannel {
    commands: Sender<WorkerCommand>,
}

impl MessageChannel {
    pub fn new(commands: Sender<WorkerCommand>) -> Self {
        Self { commands }
    }
}

impl RenderChannel for MessageChannel {
    fn strategy(&self) -> ChannelStrategy {
        ChannelStrategy::Message
    }

    fn submit(&mut self, snapshot: RenderSnapshot) -> Result<()> {
        self.commands
            .send(WorkerCommand::FrameState(snapshot))
            .map_err(|_| {
                Error::ChannelTransferFailure("render worker is gone, frame state dropped".to_string())
            })
    }

    fn acknowledges(&self) -> bool {
        true
    }
}

/// Publishes into a shared record the worker waits on
pub struct SharedMemoryChannel {
    buffer: Arc<SharedFrameBuffer>,
}

impl SharedMemoryChannel {
    pub fn new(buffer: Arc<SharedFrameBuffer>) -> Self {
        Self { buffer }
    }

    pub fn buffer(&self) -> &Arc<SharedFrameBuffer> {
        &self.buffer
    }
}

impl RenderChannel for SharedMemoryChannel {
    fn strategy(&self) -> ChannelStrategy {
        ChannelStrategy::SharedMemory
    }

    fn submit(&mut self, snapshot: RenderSnapshot) -> Result<()> {
        if self.buffer.is_closed() {
            return Err(Error::ChannelTransferFailure(
                "shared frame buffer is closed".to_string(),
            ));
        }
        let generation = self.buffer.publish(&snapshot);
        log::trace!("published frame generation {}", generation);
        Ok(())
    }

    fn acknowledges(&self) -> bool {
        false
    }
}

/// Builds the channel for `strategy`. For the shared-memory strategy the
/// buffer is also returned so it can be sent to the worker once.
pub fn open_channel(
    strategy: ChannelStrategy,
    commands: Sender<WorkerCommand>,
) -> (Box<dyn RenderChannel>, Option<Arc<SharedFrameBuffer>>) {
    match strategy {
        ChannelStrategy::Message => (Box::new(MessageChannel::new(commands)), None),
        ChannelStrategy::SharedMemory => {
            let buffer = Arc::new(SharedFrameBuffer::new());
            (
                Box::new(SharedMemoryChannel::new(Arc::clone(&buffer))),
                Some(buffer),
            )
        }
    }
}
