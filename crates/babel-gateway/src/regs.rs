//! The gateway register file.
//!
//! An explicit struct of staged command parameters plus the read-only result
//! registers, with byte/halfword/word MMIO access. Sub-word writes
//! read-modify-write the containing register so 8-bit cores can assemble
//! 32-bit values one byte at a time; command dispatch fires only when byte 0
//! of `CMD` is covered by a write, so narrow cores stage the high bytes first
//! and touch the low byte last.

use babel_proto as proto;

const OPEN_BUS: u32 = 0xFFFF_FFFF;

/// Staged command/parameter registers and latched results.
///
/// One instance per gateway. The registers are scratch: each `CMD` write
/// consumes the currently staged values, and commands are not re-entrant;
/// the gateway mutex makes every command an indivisible step.
#[derive(Debug, Default)]
pub struct RegisterFile {
    pub cmd: u32,
    pub cpu_type: u32,
    pub cmd_status: u32,
    pub cmd_error: u32,
    pub ticket: u32,
    pub ticket_status: u32,
    pub op: u32,
    pub req_ptr: u32,
    pub req_len: u32,
    pub resp_ptr: u32,
    pub resp_cap: u32,
    pub name_ptr: u32,
}

fn access_ok(offset: u32, size: usize) -> bool {
    matches!(size, 1 | 2 | 4)
        && offset as usize % size == 0
        && offset as usize + size <= proto::GATEWAY_MMIO_SIZE as usize
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Word value of the aligned register at `reg`. `worker_state` supplies
    /// the externally computed running-worker mask.
    fn read_reg(&self, reg: u32, worker_state: u32) -> u32 {
        match reg {
            proto::REG_CMD => self.cmd,
            proto::REG_CPU_TYPE => self.cpu_type,
            proto::REG_CMD_STATUS => self.cmd_status,
            proto::REG_CMD_ERROR => self.cmd_error,
            proto::REG_TICKET => self.ticket,
            proto::REG_TICKET_STATUS => self.ticket_status,
            proto::REG_OP => self.op,
            proto::REG_REQ_PTR => self.req_ptr,
            proto::REG_REQ_LEN => self.req_len,
            proto::REG_RESP_PTR => self.resp_ptr,
            proto::REG_RESP_CAP => self.resp_cap,
            proto::REG_NAME_PTR => self.name_ptr,
            proto::REG_WORKER_STATE => worker_state,
            _ => 0,
        }
    }

    /// Stores a word into the aligned register at `reg`. Writes to read-only
    /// registers (and unassigned offsets) are ignored.
    fn write_reg(&mut self, reg: u32, value: u32) {
        match reg {
            proto::REG_CMD => self.cmd = value,
            proto::REG_CPU_TYPE => self.cpu_type = value,
            proto::REG_TICKET => self.ticket = value,
            proto::REG_OP => self.op = value,
            proto::REG_REQ_PTR => self.req_ptr = value,
            proto::REG_REQ_LEN => self.req_len = value,
            proto::REG_RESP_PTR => self.resp_ptr = value,
            proto::REG_RESP_CAP => self.resp_cap = value,
            proto::REG_NAME_PTR => self.name_ptr = value,
            _ => {}
        }
    }

    /// MMIO read at `offset` within the register window. Unsupported access
    /// shapes read open-bus.
    pub fn mmio_read(&self, offset: u32, size: usize, worker_state: u32) -> u32 {
        if !access_ok(offset, size) {
            return OPEN_BUS >> (32 - 8 * size.clamp(1, 4) as u32);
        }
        let value = self.read_reg(offset & !3, worker_state);
        let shift = (offset & 3) * 8;
        match size {
            4 => value,
            2 => (value >> shift) & 0xFFFF,
            _ => (value >> shift) & 0xFF,
        }
    }

    /// MMIO write at `offset`. Returns `true` when the write covered byte 0
    /// of `CMD`, i.e. the staged command must now be dispatched.
    pub fn mmio_write(&mut self, offset: u32, size: usize, value: u32) -> bool {
        if !access_ok(offset, size) {
            return false;
        }
        let reg = offset & !3;
        let shift = (offset & 3) * 8;
        let merged = match size {
            4 => value,
            2 => {
                let mask = 0xFFFFu32 << shift;
                (self.read_reg(reg, 0) & !mask) | ((value & 0xFFFF) << shift)
            }
            _ => {
                let mask = 0xFFu32 << shift;
                (self.read_reg(reg, 0) & !mask) | ((value & 0xFF) << shift)
            }
        };
        self.write_reg(reg, merged);
        reg == proto::REG_CMD && offset & 3 == 0
    }
}
