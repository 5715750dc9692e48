//! Gateway command dispatch.
//!
//! Writing `CMD` atomically performs the staged command and latches
//! `CMD_STATUS`/`CMD_ERROR` (and `TICKET`/`TICKET_STATUS` where relevant).
//! All register traffic funnels through one mutex, so each command is an
//! indivisible step relative to the issuing context; no command ever blocks
//! on worker progress.

use crate::error::CmdError;
use crate::loader::ImageLoader;
use crate::ring::Ring;
use crate::service::{standard_ops, MailboxService};
use crate::window::SystemBus;
use babel_exec::{CpuArchitecture, CpuBackend, WorkerHandle};
use babel_proto::{self as proto, RequestEntry, ResponseSlot, WorkerState};
use memory::{BusAccess, BusResult, SharedRam};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use thiserror::Error;

pub(crate) type GatewayLink = Weak<Mutex<Gateway>>;

/// Failure creating a worker execution context.
#[derive(Debug, Error)]
#[error("worker backend: {0}")]
pub struct BackendError(pub String);

/// Everything a backend factory needs to instantiate a worker context.
pub struct WorkerStartContext {
    pub arch: CpuArchitecture,
    /// Flat 32-bit view of the whole bus (gateway registers included).
    pub system_bus: SystemBus,
    /// View matching the architecture's native addressing: identical to
    /// `system_bus` for 32-bit cores, a windowed 16-bit view for narrow ones.
    pub cpu_bus: Box<dyn BusAccess + Send>,
    /// The loaded image (already copied to `load_base`).
    pub image: Vec<u8>,
    pub load_base: u32,
}

/// Creates the execution context for a freshly started worker.
///
/// Per-ISA interpreter integrations implement this to bind the image to a
/// real decoded instruction stream over `cpu_bus`.
pub trait WorkerBackendFactory: Send {
    fn create(&self, ctx: WorkerStartContext) -> Result<Box<dyn CpuBackend>, BackendError>;
}

/// Backs workers with the host-side [`MailboxService`] running the standard
/// op table. The image bytes select no behavior here; they exist so the START
/// flow (name resolution, region load) is identical for every backend.
pub struct NativeServiceFactory;

impl WorkerBackendFactory for NativeServiceFactory {
    fn create(&self, ctx: WorkerStartContext) -> Result<Box<dyn CpuBackend>, BackendError> {
        Ok(Box::new(MailboxService::new(
            ctx.arch,
            Box::new(ctx.system_bus),
            standard_ops(),
        )))
    }
}

/// Architecture → backend factory map.
pub struct BackendRegistry {
    factories: HashMap<CpuArchitecture, Box<dyn WorkerBackendFactory>>,
}

impl BackendRegistry {
    /// A registry with no workers registered; START reports
    /// `ERR_UNKNOWN_ARCH` for every architecture until one is added.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Every architecture backed by the host-side mailbox service.
    pub fn with_native_service() -> Self {
        let mut registry = Self::empty();
        for arch in CpuArchitecture::ALL {
            registry.register(arch, Box::new(NativeServiceFactory));
        }
        registry
    }

    pub fn register(&mut self, arch: CpuArchitecture, factory: Box<dyn WorkerBackendFactory>) {
        self.factories.insert(arch, factory);
    }

    pub fn contains(&self, arch: CpuArchitecture) -> bool {
        self.factories.contains_key(&arch)
    }

    pub(crate) fn get(&self, arch: CpuArchitecture) -> Option<&dyn WorkerBackendFactory> {
        self.factories.get(&arch).map(|f| f.as_ref())
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_native_service()
    }
}

pub(crate) struct WorkerSlot {
    pub(crate) ring: Ring,
    pub(crate) worker: Option<WorkerHandle>,
}

pub(crate) struct Gateway {
    pub(crate) ram: SharedRam,
    pub(crate) regs: crate::regs::RegisterFile,
    pub(crate) slots: [WorkerSlot; proto::NUM_CPU_TYPES],
    pub(crate) registry: BackendRegistry,
    pub(crate) loader: Box<dyn ImageLoader>,
    pub(crate) self_link: GatewayLink,
}

impl Gateway {
    fn new(
        ram: SharedRam,
        registry: BackendRegistry,
        loader: Box<dyn ImageLoader>,
        self_link: GatewayLink,
    ) -> Self {
        let slots = core::array::from_fn(|i| WorkerSlot {
            ring: Ring::for_slot(i),
            worker: None,
        });
        Self {
            ram,
            regs: crate::regs::RegisterFile::new(),
            slots,
            registry,
            loader,
            self_link,
        }
    }

    fn init_rings(&self) -> BusResult<()> {
        for slot in &self.slots {
            slot.ring.init(&self.ram)?;
        }
        Ok(())
    }

    pub(crate) fn worker_state(&self) -> WorkerState {
        let mut mask = WorkerState::empty();
        for arch in CpuArchitecture::ALL {
            if self.slots[arch.slot_index()].worker.is_some() {
                mask |= arch.worker_state_bit();
            }
        }
        mask
    }

    pub(crate) fn mmio_read(&self, offset: u32, size: usize) -> u32 {
        self.regs.mmio_read(offset, size, self.worker_state().bits())
    }

    pub(crate) fn mmio_write(&mut self, offset: u32, size: usize, value: u32) {
        if self.regs.mmio_write(offset, size, value) {
            self.dispatch_cmd();
        }
    }

    fn dispatch_cmd(&mut self) {
        let result = match self.regs.cmd {
            proto::CMD_START => self.cmd_start(),
            proto::CMD_ENQUEUE => self.cmd_enqueue(),
            proto::CMD_POLL => self.cmd_poll(),
            other => {
                tracing::debug!(cmd = other, "unknown gateway command");
                self.regs.cmd_status = proto::CMD_STATUS_ERROR;
                self.regs.cmd_error = proto::ERR_NONE;
                return;
            }
        };
        match result {
            Ok(()) => {
                self.regs.cmd_status = proto::CMD_STATUS_OK;
                self.regs.cmd_error = proto::ERR_NONE;
            }
            Err(err) => {
                tracing::debug!(cmd = self.regs.cmd, %err, "gateway command rejected");
                self.regs.cmd_status = proto::CMD_STATUS_ERROR;
                self.regs.cmd_error = err.code();
            }
        }
    }

    pub(crate) fn staged_arch(&self) -> Result<CpuArchitecture, CmdError> {
        let raw = self.regs.cpu_type;
        let arch = CpuArchitecture::from_raw(raw).ok_or(CmdError::UnknownArch(raw))?;
        if !self.registry.contains(arch) {
            return Err(CmdError::UnknownArch(raw));
        }
        Ok(arch)
    }

    fn cmd_enqueue(&mut self) -> Result<(), CmdError> {
        let arch = self.staged_arch().inspect_err(|_| self.regs.ticket = 0)?;
        let slot = &self.slots[arch.slot_index()];
        if slot.worker.is_none() {
            self.regs.ticket = 0;
            return Err(CmdError::NotStarted(arch));
        }
        let ring = slot.ring;

        let head = ring.head(&self.ram)?;
        let tail = ring.tail_acquire(&self.ram)?;
        if Ring::is_full(head, tail) {
            self.regs.ticket = 0;
            return Err(CmdError::RingFull(arch));
        }

        let ticket = u32::from(head & proto::RING_INDEX_MASK);
        let entry = RequestEntry {
            ticket,
            cpu_type: arch.raw(),
            op: self.regs.op,
            flags: 0,
            req_ptr: self.regs.req_ptr,
            req_len: self.regs.req_len,
            resp_ptr: self.regs.resp_ptr,
            resp_cap: self.regs.resp_cap,
        };
        ring.write_entry(&self.ram, head, &entry)?;
        ring.write_response(
            &self.ram,
            head,
            &ResponseSlot {
                ticket,
                status: proto::TICKET_PENDING,
                result_code: 0,
                resp_len: 0,
            },
        )?;
        ring.publish_head(&self.ram, head.wrapping_add(1))?;

        self.regs.ticket = ticket;
        tracing::trace!(%arch, ticket, op = entry.op, "request enqueued");
        Ok(())
    }

    fn cmd_poll(&mut self) -> Result<(), CmdError> {
        let ticket = self.regs.ticket;
        if ticket >= u32::from(proto::RING_CAPACITY) {
            self.regs.ticket_status = proto::TICKET_ERROR;
            return Err(CmdError::BadTicket(ticket));
        }
        let arch = self.staged_arch()?;
        let ring = self.slots[arch.slot_index()].ring;

        let status = ring.response_status_acquire(&self.ram, ticket as u8)?;
        self.regs.ticket_status = status;
        Ok(())
    }

    /// Detaches every worker handle so the caller can join them without
    /// holding the gateway lock.
    pub(crate) fn take_workers(&mut self) -> Vec<WorkerHandle> {
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.worker.take())
            .collect()
    }
}

/// Handle to the gateway: the register-file MMIO endpoint.
///
/// Clones share one gateway instance; each MMIO access locks it, which is
/// what makes START/ENQUEUE/POLL indivisible steps.
#[derive(Clone)]
pub struct SharedGateway {
    inner: Arc<Mutex<Gateway>>,
}

impl SharedGateway {
    pub fn new(
        ram: SharedRam,
        registry: BackendRegistry,
        loader: Box<dyn ImageLoader>,
    ) -> BusResult<Self> {
        let inner = Arc::new_cyclic(|weak: &GatewayLink| {
            Mutex::new(Gateway::new(ram, registry, loader, weak.clone()))
        });
        let shared = Self { inner };
        shared.lock().init_rings()?;
        Ok(shared)
    }

    fn lock(&self) -> MutexGuard<'_, Gateway> {
        self.inner.lock().expect("gateway lock poisoned")
    }

    /// MMIO read at `offset` within the 64-byte register window.
    pub fn mmio_read(&self, offset: u32, size: usize) -> u32 {
        self.lock().mmio_read(offset, size)
    }

    /// MMIO write at `offset`; a write covering byte 0 of `CMD` dispatches
    /// the staged command before returning.
    pub fn mmio_write(&self, offset: u32, size: usize, value: u32) {
        self.lock().mmio_write(offset, size, value)
    }

    /// Bitmask of architectures with a live worker context.
    pub fn worker_state(&self) -> WorkerState {
        self.lock().worker_state()
    }

    /// Flat caller-side bus view routed through this gateway.
    pub fn system_bus(&self) -> SystemBus {
        let ram = self.lock().ram.clone();
        SystemBus::new(ram, Arc::downgrade(&self.inner))
    }

    /// Detaches all worker handles (for session shutdown: join them after).
    pub fn take_workers(&self) -> Vec<WorkerHandle> {
        self.lock().take_workers()
    }
}
