//! Shared bus memory for the Babel emulation platform.
//!
//! Every CPU context (caller or worker) reads and writes the same flat
//! 32-bit-addressable byte array. Contexts execute as independently scheduled
//! units, so the backing store uses atomic byte cells and hands out cheap
//! clone-able handles instead of Rust references into the storage.
#![forbid(unsafe_code)]

mod bus;
mod shared;

pub use bus::{BusAccess, BusError, BusResult};
pub use shared::SharedRam;
