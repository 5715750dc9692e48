//! Coprocessor gateway protocol: register map, mailbox layout, and the
//! command/status/error encodings shared by callers, workers, and the
//! gateway itself.
//!
//! Everything here is plain data: the guest-visible ABI. Behavior lives in
//! `babel-gateway`. Worker service binaries written for the emulated ISAs
//! are assembled against these same constants.
#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

use bitflags::bitflags;

// -------------------------------------------------------------------------------------------------
// Gateway MMIO register file (64-byte window)
// -------------------------------------------------------------------------------------------------

/// Bus address of the gateway register window.
pub const GATEWAY_MMIO_BASE: u32 = 0x000F_E000;
/// Size of the gateway register window in bytes.
pub const GATEWAY_MMIO_SIZE: u32 = 0x40;

/// Command register; dispatch fires when byte 0 is written.
pub const REG_CMD: u32 = 0x00;
/// Target architecture selector (`CPU_TYPE_*`).
pub const REG_CPU_TYPE: u32 = 0x04;
/// Status of the last command (read-only): [`CMD_STATUS_OK`] / [`CMD_STATUS_ERROR`].
pub const REG_CMD_STATUS: u32 = 0x08;
/// Error code of the last rejected command (read-only): `ERR_*`.
pub const REG_CMD_ERROR: u32 = 0x0C;
/// Ticket scratch register: written by ENQUEUE, read by POLL.
pub const REG_TICKET: u32 = 0x10;
/// Per-ticket status (read-only): `TICKET_*`.
pub const REG_TICKET_STATUS: u32 = 0x14;
/// Operation code staged for ENQUEUE.
pub const REG_OP: u32 = 0x18;
/// Request payload pointer (bus address).
pub const REG_REQ_PTR: u32 = 0x1C;
/// Request payload length in bytes.
pub const REG_REQ_LEN: u32 = 0x20;
/// Response buffer pointer (bus address).
pub const REG_RESP_PTR: u32 = 0x24;
/// Response buffer capacity in bytes.
pub const REG_RESP_CAP: u32 = 0x28;
/// Bus address of a NUL-terminated service image name.
pub const REG_NAME_PTR: u32 = 0x2C;
/// Bitmask of running workers (read-only), see [`WorkerState`].
pub const REG_WORKER_STATE: u32 = 0x30;

/// Longest accepted image name (excluding the terminating NUL).
pub const MAX_IMAGE_NAME_LEN: usize = 255;

// Commands (written to REG_CMD). Encodings are implementation-defined but
// stable within a build.
pub const CMD_START: u32 = 1;
pub const CMD_ENQUEUE: u32 = 2;
pub const CMD_POLL: u32 = 3;

// Command status (read from REG_CMD_STATUS).
pub const CMD_STATUS_OK: u32 = 0;
pub const CMD_STATUS_ERROR: u32 = 1;

// Ticket status (read from REG_TICKET_STATUS and stored in response slots).
pub const TICKET_IDLE: u32 = 0;
pub const TICKET_PENDING: u32 = 1;
pub const TICKET_OK: u32 = 2;
pub const TICKET_ERROR: u32 = 3;

// Command error codes (read from REG_CMD_ERROR).
pub const ERR_NONE: u32 = 0;
pub const ERR_UNKNOWN_ARCH: u32 = 1;
pub const ERR_ALREADY_RUNNING: u32 = 2;
pub const ERR_NOT_STARTED: u32 = 3;
pub const ERR_RING_FULL: u32 = 4;
pub const ERR_BAD_NAME: u32 = 5;
pub const ERR_IMAGE_NOT_FOUND: u32 = 6;
pub const ERR_LOAD_FAILED: u32 = 7;
pub const ERR_BAD_TICKET: u32 = 8;

// Worker-side result codes (response slot `result_code`).
pub const RESULT_OK: u32 = 0;
pub const RESULT_UNKNOWN_OP: u32 = 1;
pub const RESULT_BAD_REQUEST: u32 = 2;

// Architecture selector values (written to REG_CPU_TYPE). Ring slot index is
// `selector - 1`.
pub const CPU_TYPE_IE32: u32 = 1;
pub const CPU_TYPE_6502: u32 = 2;
pub const CPU_TYPE_M68K: u32 = 3;
pub const CPU_TYPE_Z80: u32 = 4;
pub const CPU_TYPE_X86: u32 = 5;
/// Number of architecture slots (and mailbox rings).
pub const NUM_CPU_TYPES: usize = 5;

bitflags! {
    /// Running-worker bitmask exposed through [`REG_WORKER_STATE`].
    ///
    /// Bit *n* corresponds to the architecture with slot index *n*.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WorkerState: u32 {
        const IE32 = 1 << 0;
        const MOS6502 = 1 << 1;
        const M68K = 1 << 2;
        const Z80 = 1 << 3;
        const X86 = 1 << 4;
    }
}

// -------------------------------------------------------------------------------------------------
// Mailbox / ring layout
// -------------------------------------------------------------------------------------------------

/// Bus address of the mailbox RAM region.
pub const MAILBOX_BASE: u32 = 0x000E_0000;
/// Size of the mailbox region: one [`RING_STRIDE`] per architecture slot.
pub const MAILBOX_SIZE: u32 = 0x2000;

/// Entries per ring. Power of two so wraparound is a mask.
pub const RING_CAPACITY: u8 = 16;
/// Mask applied to the free-running head/tail counters to obtain a slot index.
pub const RING_INDEX_MASK: u8 = RING_CAPACITY - 1;
/// Bytes of mailbox reserved per ring.
pub const RING_STRIDE: u32 = 0x400;

// Offsets within a ring's mailbox region.
/// Free-running producer counter (u8, wraps mod 256).
pub const RING_HEAD_OFFSET: u32 = 0x00;
/// Free-running consumer counter (u8, wraps mod 256).
pub const RING_TAIL_OFFSET: u32 = 0x01;
/// Ring depth (u8, informational for worker binaries).
pub const RING_CAPACITY_OFFSET: u32 = 0x02;
/// Start of the request descriptor array.
pub const RING_ENTRIES_OFFSET: u32 = 0x08;
/// Start of the response descriptor array.
pub const RING_RESPONSES_OFFSET: u32 = 0x208;

/// Request descriptor, written once per slot use by the gateway's ENQUEUE
/// path and read once by the worker.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RequestEntry {
    pub ticket: u32,
    pub cpu_type: u32,
    pub op: u32,
    pub flags: u32,
    pub req_ptr: u32,
    pub req_len: u32,
    pub resp_ptr: u32,
    pub resp_cap: u32,
}

impl RequestEntry {
    pub const SIZE_BYTES: u32 = 32;
}

pub const REQ_TICKET_OFFSET: u32 = 0x00;
pub const REQ_CPU_TYPE_OFFSET: u32 = 0x04;
pub const REQ_OP_OFFSET: u32 = 0x08;
pub const REQ_FLAGS_OFFSET: u32 = 0x0C;
pub const REQ_REQ_PTR_OFFSET: u32 = 0x10;
pub const REQ_REQ_LEN_OFFSET: u32 = 0x14;
pub const REQ_RESP_PTR_OFFSET: u32 = 0x18;
pub const REQ_RESP_CAP_OFFSET: u32 = 0x1C;

/// Response descriptor, written once per slot use by the worker (the ENQUEUE
/// path pre-initializes it to [`TICKET_PENDING`]) and read by POLL.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ResponseSlot {
    pub ticket: u32,
    pub status: u32,
    pub result_code: u32,
    pub resp_len: u32,
}

impl ResponseSlot {
    pub const SIZE_BYTES: u32 = 16;
}

pub const RESP_TICKET_OFFSET: u32 = 0x00;
pub const RESP_STATUS_OFFSET: u32 = 0x04;
pub const RESP_RESULT_CODE_OFFSET: u32 = 0x08;
pub const RESP_RESP_LEN_OFFSET: u32 = 0x0C;

/// Bus address of the mailbox ring for an architecture slot index.
pub const fn ring_base_addr(slot_index: usize) -> u32 {
    MAILBOX_BASE + (slot_index as u32) * RING_STRIDE
}

// -------------------------------------------------------------------------------------------------
// Standard service operations
// -------------------------------------------------------------------------------------------------

/// Add two little-endian u32 values from the request payload; 4-byte response.
pub const OP_ADD_U32: u32 = 1;
/// Sum `req_len / 4` little-endian u32 values; 4-byte response.
pub const OP_SUM_U32: u32 = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_arrays_fit_the_ring_stride() {
        let cap = RING_CAPACITY as u32;
        assert_eq!(
            RING_RESPONSES_OFFSET,
            RING_ENTRIES_OFFSET + cap * RequestEntry::SIZE_BYTES
        );
        assert!(RING_RESPONSES_OFFSET + cap * ResponseSlot::SIZE_BYTES <= RING_STRIDE);
    }

    #[test]
    fn mailbox_holds_one_ring_per_architecture() {
        assert!(ring_base_addr(NUM_CPU_TYPES - 1) + RING_STRIDE <= MAILBOX_BASE + MAILBOX_SIZE);
    }

    #[test]
    fn ring_capacity_is_a_power_of_two_dividing_the_counter_range() {
        assert!(RING_CAPACITY.is_power_of_two());
        // Free-running u8 counters wrap mod 256; masking stays consistent
        // across the wrap only if the capacity divides 256.
        assert_eq!(256 % RING_CAPACITY as u32, 0);
    }

    #[test]
    fn worker_state_bits_cover_every_architecture() {
        assert_eq!(WorkerState::all().bits(), (1 << NUM_CPU_TYPES) - 1);
    }
}
