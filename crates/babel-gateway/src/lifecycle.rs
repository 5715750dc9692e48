//! Worker lifecycle: the START path.
//!
//! START resolves the staged architecture and image name, loads the image,
//! re-initializes the slot's mailbox ring, places the image in the worker's
//! dedicated region, and spawns the execution context produced by the
//! registered backend factory. There is no guest-visible stop primitive;
//! workers run until the session ends.

use crate::error::CmdError;
use crate::gateway::{Gateway, WorkerStartContext};
use crate::layout::worker_region;
use crate::window::{SystemBus, WindowedBus};
use babel_exec::WorkerHandle;
use babel_proto as proto;
use memory::BusAccess;

impl Gateway {
    /// Reads the NUL-terminated image name staged behind `NAME_PTR`.
    fn read_image_name(&self) -> Result<String, CmdError> {
        let mut bytes = Vec::new();
        let mut addr = self.regs.name_ptr;
        loop {
            let byte = self.ram.read_u8(addr).map_err(|_| CmdError::BadName)?;
            if byte == 0 {
                break;
            }
            bytes.push(byte);
            if bytes.len() > proto::MAX_IMAGE_NAME_LEN {
                return Err(CmdError::BadName);
            }
            addr = addr.wrapping_add(1);
        }
        if bytes.is_empty() {
            return Err(CmdError::BadName);
        }
        String::from_utf8(bytes).map_err(|_| CmdError::BadName)
    }

    pub(crate) fn cmd_start(&mut self) -> Result<(), CmdError> {
        let arch = self.staged_arch()?;
        let index = arch.slot_index();
        if self.slots[index].worker.is_some() {
            return Err(CmdError::AlreadyRunning(arch));
        }

        let name = self.read_image_name()?;
        let image = self.loader.load(&name)?;

        let (base, region_size) = worker_region(arch);
        if image.len() > region_size as usize {
            return Err(CmdError::LoadFailed(format!(
                "image {name:?} is {} bytes, {arch} region holds {region_size}",
                image.len()
            )));
        }

        // Fresh ring, fresh region: nothing from a previous session leaks in.
        self.slots[index].ring.init(&self.ram)?;
        self.ram.zero_range(base, region_size as usize)?;
        self.ram.write_from(base, &image)?;

        let system_bus = SystemBus::new(self.ram.clone(), self.self_link.clone());
        let cpu_bus: Box<dyn BusAccess + Send> = if arch.is_narrow() {
            Box::new(WindowedBus::new(
                self.ram.clone(),
                self.self_link.clone(),
                base,
            ))
        } else {
            Box::new(system_bus.clone())
        };

        let factory = self
            .registry
            .get(arch)
            .ok_or(CmdError::UnknownArch(arch.raw()))?;
        let backend = factory
            .create(WorkerStartContext {
                arch,
                system_bus,
                cpu_bus,
                image,
                load_base: base,
            })
            .map_err(|err| CmdError::LoadFailed(err.to_string()))?;

        let handle =
            WorkerHandle::spawn(backend).map_err(|err| CmdError::LoadFailed(err.to_string()))?;
        tracing::info!(%arch, name = %name, "worker started");
        self.slots[index].worker = Some(handle);
        Ok(())
    }
}
