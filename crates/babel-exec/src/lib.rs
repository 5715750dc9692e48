//! Execution contexts for the Babel platform.
//!
//! A CPU context, caller or worker, is an independently progressing unit.
//! This crate defines the architecture tags, the [`CpuBackend`] seam behind
//! which the per-ISA interpreters live, and the thread-based worker context
//! used by the coprocessor gateway's lifecycle manager.
#![forbid(unsafe_code)]

mod arch;
mod context;

pub use arch::CpuArchitecture;
pub use context::{CpuBackend, StopToken, WorkerHandle};
