pub mod backend;
pub mod channel;
pub mod messages;
pub mod shared;
pub mod transform;
pub mod worker;

// Re-export main types
pub use backend::{RenderBackend, Surface, SurfaceProvider, SurfaceSet};
pub use channel::{open_channel, MessageChannel, RenderChannel, SharedMemoryChannel};
pub use messages::{TileData, WorkerCommand, WorkerEvent};
pub use shared::SharedFrameBuffer;
pub use transform::CompensationTransform;
pub use worker::{LoopControl, RenderWorkerLoop, WorkerState};
