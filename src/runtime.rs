//! Runtime abstraction layer for async operations
//!
//! Tile downloads are the only async work in the crate. They are spawned
//! through a global [`AsyncSpawner`] so the control thread never needs to be
//! inside an async context itself.

use futures::future::BoxFuture;
use once_cell::sync::OnceCell;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A trait for spawning async tasks (object-safe version)
pub trait AsyncSpawner: Send + Sync + 'static {
    /// Spawn a future and return a handle to it
    fn spawn_boxed(&self, future: BoxFuture<'static, ()>) -> Box<dyn AsyncHandle>;
}

/// Handle to a spawned async task
pub trait AsyncHandle: Send + Sync {
    /// Check if the task is finished
    fn is_finished(&self) -> bool;

    /// Cancel the task
    fn cancel(&self);
}

/// Spawns `future` on the global runtime
pub fn spawn<F>(future: F) -> Box<dyn AsyncHandle>
where
    F: Future<Output = ()> + Send + 'static,
{
    runtime().spawn_boxed(Box::pin(future))
}

/// Default spawner implementations
pub mod spawners {
    use super::*;

    #[cfg(feature = "tokio-runtime")]
    pub mod tokio_impl {
        use super::*;
        use ::tokio::runtime::{Builder, Handle, Runtime};
        use ::tokio::task::JoinHandle;

        /// Tokio-based async spawner.
        ///
        /// Spawns onto the runtime that was current when it was created, or
        /// onto a small runtime of its own when there was none.
        pub struct TokioSpawner {
            handle: Handle,
            _owned: Option<Runtime>,
        }

        impl TokioSpawner {
            pub fn new(handle: Handle) -> Self {
                Self {
                    handle,
                    _owned: None,
                }
            }

            pub fn current_or_owned() -> std::io::Result<Self> {
                if let Ok(handle) = Handle::try_current() {
                    return Ok(Self::new(handle));
                }
                log::debug!("no tokio runtime in scope, starting a private one");
                let runtime = Builder::new_multi_thread()
                    .worker_threads(2)
                    .thread_name("offscreen-map-io")
                    .enable_all()
                    .build()?;
                Ok(Self {
                    handle: runtime.handle().clone(),
                    _owned: Some(runtime),
                })
            }
        }

        impl AsyncSpawner for TokioSpawner {
            fn spawn_boxed(&self, future: BoxFuture<'static, ()>) -> Box<dyn AsyncHandle> {
                Box::new(TokioHandle(self.handle.spawn(future)))
            }
        }

        struct TokioHandle(JoinHandle<()>);

        impl AsyncHandle for TokioHandle {
            fn is_finished(&self) -> bool {
                self.0.is_finished()
            }

            fn cancel(&self) {
                self.0.abort();
            }
        }
    }

    /// Drives each task to completion on its own OS thread. Used when no
    /// async runtime feature is enabled; futures that need a tokio reactor
    /// will not work here.
    pub struct ThreadSpawner;

    impl AsyncSpawner for ThreadSpawner {
        fn spawn_boxed(&self, future: BoxFuture<'static, ()>) -> Box<dyn AsyncHandle> {
            let finished = Arc::new(AtomicBool::new(false));
            let done = Arc::clone(&finished);
            let spawned = std::thread::Builder::new()
                .name("offscreen-map-task".to_string())
                .spawn(move || {
                    futures::executor::block_on(future);
                    done.store(true, Ordering::Release);
                });
            if let Err(e) = spawned {
                log::error!("failed to spawn task thread: {}", e);
                finished.store(true, Ordering::Release);
            }
            Box::new(ThreadHandle { finished })
        }
    }

    struct ThreadHandle {
        finished: Arc<AtomicBool>,
    }

    impl AsyncHandle for ThreadHandle {
        fn is_finished(&self) -> bool {
            self.finished.load(Ordering::Acquire)
        }

        fn cancel(&self) {
            // Threads run to completion
        }
    }
}

/// Global runtime instance
static RUNTIME: OnceCell<Box<dyn AsyncSpawner>> = OnceCell::new();

/// Initialize the runtime with a specific spawner. Returns `false` if a
/// spawner was already installed.
pub fn init_runtime(spawner: Box<dyn AsyncSpawner>) -> bool {
    RUNTIME.set(spawner).is_ok()
}

/// Get the global runtime spawner
pub fn runtime() -> &'static dyn AsyncSpawner {
    RUNTIME.get_or_init(default_spawner).as_ref()
}

#[cfg(feature = "tokio-runtime")]
fn default_spawner() -> Box<dyn AsyncSpawner> {
    match spawners::tokio_impl::TokioSpawner::current_or_owned() {
        Ok(spawner) => Box::new(spawner),
        Err(e) => {
            log::error!("could not start a tokio runtime ({}), falling back to threads", e);
            Box::new(spawners::ThreadSpawner)
        }
    }
}

#[cfg(not(feature = "tokio-runtime"))]
fn default_spawner() -> Box<dyn AsyncSpawner> {
    Box::new(spawners::ThreadSpawner)
}
