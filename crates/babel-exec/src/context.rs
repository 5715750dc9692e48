use crate::arch::CpuArchitecture;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Cooperative stop signal shared between a worker context and its owner.
#[derive(Clone, Default)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// An execution context: something that runs an instruction stream (or a
/// host-side stand-in for one) against the shared bus.
///
/// `run` is called once, on the worker's own thread, and must return promptly
/// once `stop` is raised. Implementations are the per-ISA interpreters and,
/// in-tree, the reference mailbox service loop.
pub trait CpuBackend: Send {
    fn arch(&self) -> CpuArchitecture;

    fn run(&mut self, stop: &StopToken);
}

/// A running worker context: one spawned thread executing a [`CpuBackend`].
///
/// There is no guest-visible stop primitive; workers run until the emulator
/// session ends, at which point [`WorkerHandle::shutdown`] raises the stop
/// token and joins the thread.
pub struct WorkerHandle {
    arch: CpuArchitecture,
    stop: StopToken,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawns `backend` on a dedicated named thread.
    pub fn spawn(mut backend: Box<dyn CpuBackend>) -> io::Result<Self> {
        let arch = backend.arch();
        let stop = StopToken::new();
        let thread_stop = stop.clone();
        let thread = thread::Builder::new()
            .name(format!("worker-{arch}"))
            .spawn(move || {
                tracing::debug!(%arch, "worker context running");
                backend.run(&thread_stop);
                tracing::debug!(%arch, "worker context exited");
            })?;
        Ok(Self {
            arch,
            stop,
            thread: Some(thread),
        })
    }

    pub fn arch(&self) -> CpuArchitecture {
        self.arch
    }

    /// Whether the backend's `run` has returned (e.g. the service halted).
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| t.is_finished())
    }

    /// Raises the stop token and joins the worker thread.
    pub fn shutdown(mut self) {
        self.stop.raise();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!(arch = %self.arch, "worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // Dropping without `shutdown` still stops the thread; it is detached
        // rather than joined.
        self.stop.raise();
    }
}
