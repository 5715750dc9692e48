use babel_proto as proto;
use core::fmt;

/// Instruction-set family a worker context may run.
///
/// The discriminants are the guest-visible `CPU_TYPE` selector values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CpuArchitecture {
    /// 32-bit in-house core; 32-bit native addressing.
    Ie32 = proto::CPU_TYPE_IE32,
    /// MOS 6502; 16-bit native addressing.
    Mos6502 = proto::CPU_TYPE_6502,
    /// Motorola 68000; 32-bit native addressing.
    M68k = proto::CPU_TYPE_M68K,
    /// Zilog Z80; 16-bit native addressing.
    Z80 = proto::CPU_TYPE_Z80,
    /// x86 (32-bit protected flat model); 32-bit native addressing.
    X86 = proto::CPU_TYPE_X86,
}

impl CpuArchitecture {
    pub const ALL: [CpuArchitecture; proto::NUM_CPU_TYPES] = [
        CpuArchitecture::Ie32,
        CpuArchitecture::Mos6502,
        CpuArchitecture::M68k,
        CpuArchitecture::Z80,
        CpuArchitecture::X86,
    ];

    /// Decodes a guest-written `CPU_TYPE` selector.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            proto::CPU_TYPE_IE32 => Some(CpuArchitecture::Ie32),
            proto::CPU_TYPE_6502 => Some(CpuArchitecture::Mos6502),
            proto::CPU_TYPE_M68K => Some(CpuArchitecture::M68k),
            proto::CPU_TYPE_Z80 => Some(CpuArchitecture::Z80),
            proto::CPU_TYPE_X86 => Some(CpuArchitecture::X86),
            _ => None,
        }
    }

    pub fn raw(self) -> u32 {
        self as u32
    }

    /// Mailbox ring / worker-slot index (0-based).
    pub fn slot_index(self) -> usize {
        (self.raw() - 1) as usize
    }

    /// Whether the core's native address space is narrower than the bus and
    /// therefore reaches the mailbox and gateway registers through windows.
    pub fn is_narrow(self) -> bool {
        matches!(self, CpuArchitecture::Mos6502 | CpuArchitecture::Z80)
    }

    /// This architecture's bit in the [`proto::WorkerState`] mask.
    pub fn worker_state_bit(self) -> proto::WorkerState {
        proto::WorkerState::from_bits_truncate(1 << self.slot_index())
    }

    pub fn name(self) -> &'static str {
        match self {
            CpuArchitecture::Ie32 => "ie32",
            CpuArchitecture::Mos6502 => "6502",
            CpuArchitecture::M68k => "m68k",
            CpuArchitecture::Z80 => "z80",
            CpuArchitecture::X86 => "x86",
        }
    }
}

impl fmt::Display for CpuArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
