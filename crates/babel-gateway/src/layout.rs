//! Bus placement of the gateway's collaborators: worker program regions and
//! the fixed windows narrow-address cores use to reach shared state.

use babel_exec::CpuArchitecture;

pub const WORKER_IE32_BASE: u32 = 0x0020_0000;
pub const WORKER_IE32_SIZE: u32 = 0x0008_0000;

pub const WORKER_M68K_BASE: u32 = 0x0028_0000;
pub const WORKER_M68K_SIZE: u32 = 0x0008_0000;

pub const WORKER_6502_BASE: u32 = 0x0030_0000;
pub const WORKER_6502_SIZE: u32 = 0x0001_0000;

pub const WORKER_Z80_BASE: u32 = 0x0031_0000;
pub const WORKER_Z80_SIZE: u32 = 0x0001_0000;

pub const WORKER_X86_BASE: u32 = 0x0032_0000;
pub const WORKER_X86_SIZE: u32 = 0x0008_0000;

/// `(base, size)` of the dedicated program region for an architecture.
///
/// A worker's image is loaded at the region base; the region is zeroed on
/// every START. Isolation is a convention; the bus does not enforce it.
pub const fn worker_region(arch: CpuArchitecture) -> (u32, u32) {
    match arch {
        CpuArchitecture::Ie32 => (WORKER_IE32_BASE, WORKER_IE32_SIZE),
        CpuArchitecture::M68k => (WORKER_M68K_BASE, WORKER_M68K_SIZE),
        CpuArchitecture::Mos6502 => (WORKER_6502_BASE, WORKER_6502_SIZE),
        CpuArchitecture::Z80 => (WORKER_Z80_BASE, WORKER_Z80_SIZE),
        CpuArchitecture::X86 => (WORKER_X86_BASE, WORKER_X86_SIZE),
    }
}

/// 16-bit address where a narrow core's mailbox window begins. The window is
/// [`babel_proto::MAILBOX_SIZE`] bytes, identity-mapped onto
/// [`babel_proto::MAILBOX_BASE`].
pub const NARROW_MAILBOX_WINDOW: u16 = 0x2000;

/// 16-bit address where a narrow core's gateway register window begins. The
/// window is [`babel_proto::GATEWAY_MMIO_SIZE`] bytes; 32-bit registers are
/// reached as four byte accesses, low byte last for `CMD`.
pub const NARROW_GATEWAY_WINDOW: u16 = 0xFE00;

/// Smallest bus RAM that covers the mailbox and every worker region.
pub const MIN_RAM_SIZE: u32 = WORKER_X86_BASE + WORKER_X86_SIZE;

/// Default machine RAM size (4 MiB).
pub const DEFAULT_RAM_SIZE: u32 = 0x0040_0000;

#[cfg(test)]
mod tests {
    use super::*;
    use babel_proto as proto;

    #[test]
    fn worker_regions_do_not_overlap() {
        let mut regions: Vec<(u32, u32)> = CpuArchitecture::ALL
            .iter()
            .map(|&a| worker_region(a))
            .collect();
        regions.sort_by_key(|&(base, _)| base);
        for pair in regions.windows(2) {
            let (base, size) = pair[0];
            assert!(base + size <= pair[1].0);
        }
    }

    #[test]
    fn min_ram_covers_mailbox_and_regions() {
        assert!(proto::MAILBOX_BASE + proto::MAILBOX_SIZE <= MIN_RAM_SIZE);
        for arch in CpuArchitecture::ALL {
            let (base, size) = worker_region(arch);
            assert!(base + size <= MIN_RAM_SIZE);
        }
        assert!(MIN_RAM_SIZE <= DEFAULT_RAM_SIZE);
    }

    #[test]
    fn narrow_windows_do_not_collide() {
        let mb_end = NARROW_MAILBOX_WINDOW as u32 + proto::MAILBOX_SIZE;
        assert!(mb_end <= NARROW_GATEWAY_WINDOW as u32);
        assert!(NARROW_GATEWAY_WINDOW as u32 + proto::GATEWAY_MMIO_SIZE <= 0x1_0000);
    }

    #[test]
    fn narrow_regions_are_one_bank() {
        assert_eq!(WORKER_6502_SIZE, 0x1_0000);
        assert_eq!(WORKER_Z80_SIZE, 0x1_0000);
    }
}
