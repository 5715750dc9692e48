//! Canonical machine integration layer for Babel.
//!
//! Composes the shared bus RAM (`memory`), the coprocessor gateway
//! (`babel-gateway`), and the execution contexts (`babel-exec`) into one
//! [`Machine`] usable from native Rust integration tests and embedders. The
//! video, audio, and blitter device models attach to the same bus but live
//! behind their own crates; the machine built here is the part a caller needs
//! to launch coprocessor workers and exchange work with them.
#![forbid(unsafe_code)]

use babel_exec::CpuArchitecture;
use babel_gateway::{
    BackendRegistry, DirImageLoader, ImageLoader, MemImageLoader, SharedGateway, SystemBus,
    DEFAULT_RAM_SIZE, MIN_RAM_SIZE,
};
use babel_proto::{self as proto, WorkerState};
use memory::{BusAccess, BusResult, SharedRam};
use std::path::PathBuf;
use thiserror::Error;

/// Where START resolves service image names.
pub enum ImageSource {
    /// The built-in catalog: every standard `coproc_service_<arch>` name,
    /// served by the host-side mailbox backend.
    BuiltinServices,
    /// Files under a directory (names are confined to it).
    Dir(PathBuf),
    /// Caller-provided loader.
    Custom(Box<dyn ImageLoader>),
}

pub struct MachineConfig {
    pub ram_size: u32,
    pub image_source: ImageSource,
    /// Worker backends; defaults to the host-side mailbox service for every
    /// architecture. Embedders with real interpreter cores register their
    /// own factories here.
    pub backends: BackendRegistry,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            ram_size: DEFAULT_RAM_SIZE,
            image_source: ImageSource::BuiltinServices,
            backends: BackendRegistry::with_native_service(),
        }
    }
}

#[derive(Debug, Error)]
pub enum MachineConfigError {
    #[error("ram size {got:#x} below minimum {min:#x}")]
    RamTooSmall { got: u32, min: u32 },
}

/// Standard service image name for an architecture.
pub fn service_image_name(arch: CpuArchitecture) -> String {
    format!("coproc_service_{arch}")
}

fn builtin_service_images() -> MemImageLoader {
    let mut loader = MemImageLoader::new();
    for arch in CpuArchitecture::ALL {
        // The host-side backend takes its behavior from the op table, not
        // the image bytes; a tag keeps the loaded region identifiable.
        loader.insert(service_image_name(arch), arch.name().as_bytes().to_vec());
    }
    loader
}

/// The composed machine: shared bus RAM plus the coprocessor gateway.
pub struct Machine {
    ram: SharedRam,
    gateway: SharedGateway,
    bus: SystemBus,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Result<Self, MachineConfigError> {
        if config.ram_size < MIN_RAM_SIZE {
            return Err(MachineConfigError::RamTooSmall {
                got: config.ram_size,
                min: MIN_RAM_SIZE,
            });
        }

        let ram = SharedRam::new(config.ram_size);
        let loader: Box<dyn ImageLoader> = match config.image_source {
            ImageSource::BuiltinServices => Box::new(builtin_service_images()),
            ImageSource::Dir(dir) => Box::new(DirImageLoader::new(dir)),
            ImageSource::Custom(loader) => loader,
        };
        let gateway = SharedGateway::new(ram.clone(), config.backends, loader)
            .expect("machine RAM covers the mailbox region");
        let bus = gateway.system_bus();
        tracing::debug!(ram_size = config.ram_size, "machine constructed");
        Ok(Self { ram, gateway, bus })
    }

    /// The caller-side bus view (RAM + gateway register window).
    pub fn bus(&self) -> &SystemBus {
        &self.bus
    }

    pub fn gateway(&self) -> &SharedGateway {
        &self.gateway
    }

    /// Bitmask of architectures with a live worker.
    pub fn worker_state(&self) -> WorkerState {
        self.gateway.worker_state()
    }

    // Convenience accessors mirroring the bus view; integration tests and
    // host tooling drive the machine through these.

    pub fn read_u8(&self, addr: u32) -> BusResult<u8> {
        self.bus.read_u8(addr)
    }

    pub fn read_u32(&self, addr: u32) -> BusResult<u32> {
        self.bus.read_u32(addr)
    }

    pub fn write_u8(&self, addr: u32, value: u8) -> BusResult<()> {
        self.bus.write_u8(addr, value)
    }

    pub fn write_u32(&self, addr: u32, value: u32) -> BusResult<()> {
        self.bus.write_u32(addr, value)
    }

    pub fn read_physical(&self, addr: u32, dst: &mut [u8]) -> BusResult<()> {
        self.bus.read_into(addr, dst)
    }

    pub fn write_physical(&self, addr: u32, src: &[u8]) -> BusResult<()> {
        self.bus.write_from(addr, src)
    }

    /// Writes a NUL-terminated string (image names for START).
    pub fn write_cstr(&self, addr: u32, s: &str) -> BusResult<()> {
        self.ram.write_from(addr, s.as_bytes())?;
        self.ram.write_u8(addr + s.len() as u32, 0)
    }

    /// Writes a gateway register (word-sized, by register offset).
    pub fn write_gateway_reg(&self, reg: u32, value: u32) -> BusResult<()> {
        self.write_u32(proto::GATEWAY_MMIO_BASE + reg, value)
    }

    /// Reads a gateway register (word-sized, by register offset).
    pub fn read_gateway_reg(&self, reg: u32) -> BusResult<u32> {
        self.read_u32(proto::GATEWAY_MMIO_BASE + reg)
    }

    /// Stops every worker context and joins its thread. Called automatically
    /// on drop; idempotent.
    pub fn shutdown(&mut self) {
        for handle in self.gateway.take_workers() {
            let arch = handle.arch();
            handle.shutdown();
            tracing::debug!(%arch, "worker stopped at shutdown");
        }
    }
}

impl Drop for Machine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds_a_machine() {
        let m = Machine::new(MachineConfig::default()).unwrap();
        assert_eq!(m.bus().size(), DEFAULT_RAM_SIZE);
        assert!(m.worker_state().is_empty());
    }

    #[test]
    fn undersized_ram_is_rejected() {
        let config = MachineConfig {
            ram_size: 0x1000,
            ..Default::default()
        };
        assert!(matches!(
            Machine::new(config),
            Err(MachineConfigError::RamTooSmall { .. })
        ));
    }

    #[test]
    fn service_image_names_follow_the_convention() {
        assert_eq!(
            service_image_name(CpuArchitecture::Ie32),
            "coproc_service_ie32"
        );
        assert_eq!(service_image_name(CpuArchitecture::Z80), "coproc_service_z80");
    }
}
