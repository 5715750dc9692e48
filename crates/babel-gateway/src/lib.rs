//! The coprocessor gateway: the mechanism by which one running CPU context
//! launches another CPU context running a named program image and exchanges
//! typed, asynchronous work requests with it.
//!
//! The guest-facing surface is a 64-byte MMIO register file
//! ([`babel_proto::GATEWAY_MMIO_BASE`]) plus per-architecture mailbox rings in
//! ordinary bus RAM. A caller stages parameters in the register file and
//! writes `CMD`; `START` spawns a worker context, `ENQUEUE` appends a request
//! descriptor to the worker's ring and returns a ticket, `POLL` reports that
//! ticket's completion status. Workers drain their rings entirely
//! independently; nothing in the register file blocks.
//!
//! Module map:
//! - `regs`: the explicit register-file struct and byte/word MMIO access
//! - `ring`: the single-producer/single-consumer mailbox ring protocol
//! - `service`: the worker-side dispatch convention (ring consumer + op table)
//! - `window`: bus views, including the narrow-address-core windows
//! - `loader`: program image resolution
//! - `gateway`: command dispatch and worker lifecycle
#![forbid(unsafe_code)]

mod error;
mod gateway;
mod layout;
mod lifecycle;
mod loader;
mod regs;
mod ring;
mod service;
mod window;

pub use error::ImageError;
pub use gateway::{
    BackendError, BackendRegistry, NativeServiceFactory, SharedGateway, WorkerBackendFactory,
    WorkerStartContext,
};
pub use layout::{
    worker_region, DEFAULT_RAM_SIZE, MIN_RAM_SIZE, NARROW_GATEWAY_WINDOW, NARROW_MAILBOX_WINDOW,
};
pub use loader::{DirImageLoader, ImageLoader, MemImageLoader};
pub use regs::RegisterFile;
pub use ring::Ring;
pub use service::{standard_ops, MailboxService, OpHandler, OpTable};
pub use window::{SystemBus, WindowedBus};
