//! The mailbox ring protocol.
//!
//! One fixed-capacity single-producer/single-consumer ring per worker slot,
//! living entirely in bus RAM so caller and worker contexts (possibly
//! different ISAs on different threads) share it without sharing any
//! in-process state. `head` is advanced only by the gateway's ENQUEUE path,
//! `tail` only by the owning worker. Both are free-running 8-bit counters;
//! the slot index is `counter & RING_INDEX_MASK`, so all 16 slots are usable
//! and the full condition is a wrapping distance of 16.
//!
//! Publication discipline: the producer writes a request descriptor with
//! relaxed stores and then release-stores `head`; the consumer acquire-loads
//! `head` before reading the descriptor. Completion runs the same protocol in
//! the other direction through the response slot's status word and `tail`.

use babel_proto::{self as proto, RequestEntry, ResponseSlot};
use memory::{BusAccess, BusResult};

/// Addressing and access helpers for one mailbox ring.
///
/// The ring's state lives in bus RAM at `base`; this type holds only the base
/// address and is freely copyable.
#[derive(Clone, Copy, Debug)]
pub struct Ring {
    base: u32,
}

impl Ring {
    /// The ring for an architecture slot index.
    pub const fn for_slot(slot_index: usize) -> Self {
        Self {
            base: proto::ring_base_addr(slot_index),
        }
    }

    pub const fn base(&self) -> u32 {
        self.base
    }

    const fn head_addr(&self) -> u32 {
        self.base + proto::RING_HEAD_OFFSET
    }

    const fn tail_addr(&self) -> u32 {
        self.base + proto::RING_TAIL_OFFSET
    }

    /// Bus address of the request descriptor selected by a head/tail counter.
    pub const fn entry_addr(&self, counter: u8) -> u32 {
        self.base
            + proto::RING_ENTRIES_OFFSET
            + (counter & proto::RING_INDEX_MASK) as u32 * RequestEntry::SIZE_BYTES
    }

    /// Bus address of the response descriptor selected by a head/tail counter.
    pub const fn response_addr(&self, counter: u8) -> u32 {
        self.base
            + proto::RING_RESPONSES_OFFSET
            + (counter & proto::RING_INDEX_MASK) as u32 * ResponseSlot::SIZE_BYTES
    }

    /// Zeroes the whole ring region and stamps the capacity byte.
    pub fn init(&self, bus: &dyn BusAccess) -> BusResult<()> {
        bus.write_from(self.base, &[0u8; proto::RING_STRIDE as usize])?;
        bus.write_u8(self.base + proto::RING_CAPACITY_OFFSET, proto::RING_CAPACITY)
    }

    /// `head == tail` ⇒ empty; distance of `RING_CAPACITY` ⇒ full.
    pub fn is_full(head: u8, tail: u8) -> bool {
        head.wrapping_sub(tail) >= proto::RING_CAPACITY
    }

    // ---- producer (gateway ENQUEUE) side -------------------------------------------------------

    /// Producer's own counter; plain load.
    pub fn head(&self, bus: &dyn BusAccess) -> BusResult<u8> {
        bus.read_u8(self.head_addr())
    }

    /// Consumer's counter as seen by the producer.
    pub fn tail_acquire(&self, bus: &dyn BusAccess) -> BusResult<u8> {
        bus.read_u8_acquire(self.tail_addr())
    }

    /// Publishes a new head counter after the descriptor writes.
    pub fn publish_head(&self, bus: &dyn BusAccess, head: u8) -> BusResult<()> {
        bus.write_u8_release(self.head_addr(), head)
    }

    pub fn write_entry(
        &self,
        bus: &dyn BusAccess,
        counter: u8,
        entry: &RequestEntry,
    ) -> BusResult<()> {
        let addr = self.entry_addr(counter);
        bus.write_u32(addr + proto::REQ_TICKET_OFFSET, entry.ticket)?;
        bus.write_u32(addr + proto::REQ_CPU_TYPE_OFFSET, entry.cpu_type)?;
        bus.write_u32(addr + proto::REQ_OP_OFFSET, entry.op)?;
        bus.write_u32(addr + proto::REQ_FLAGS_OFFSET, entry.flags)?;
        bus.write_u32(addr + proto::REQ_REQ_PTR_OFFSET, entry.req_ptr)?;
        bus.write_u32(addr + proto::REQ_REQ_LEN_OFFSET, entry.req_len)?;
        bus.write_u32(addr + proto::REQ_RESP_PTR_OFFSET, entry.resp_ptr)?;
        bus.write_u32(addr + proto::REQ_RESP_CAP_OFFSET, entry.resp_cap)
    }

    // ---- consumer (worker) side ----------------------------------------------------------------

    /// Consumer's own counter; plain load.
    pub fn tail(&self, bus: &dyn BusAccess) -> BusResult<u8> {
        bus.read_u8(self.tail_addr())
    }

    /// Producer's counter as seen by the consumer.
    pub fn head_acquire(&self, bus: &dyn BusAccess) -> BusResult<u8> {
        bus.read_u8_acquire(self.head_addr())
    }

    /// Publishes a new tail counter after the response is complete.
    pub fn publish_tail(&self, bus: &dyn BusAccess, tail: u8) -> BusResult<()> {
        bus.write_u8_release(self.tail_addr(), tail)
    }

    pub fn read_entry(&self, bus: &dyn BusAccess, counter: u8) -> BusResult<RequestEntry> {
        let addr = self.entry_addr(counter);
        Ok(RequestEntry {
            ticket: bus.read_u32(addr + proto::REQ_TICKET_OFFSET)?,
            cpu_type: bus.read_u32(addr + proto::REQ_CPU_TYPE_OFFSET)?,
            op: bus.read_u32(addr + proto::REQ_OP_OFFSET)?,
            flags: bus.read_u32(addr + proto::REQ_FLAGS_OFFSET)?,
            req_ptr: bus.read_u32(addr + proto::REQ_REQ_PTR_OFFSET)?,
            req_len: bus.read_u32(addr + proto::REQ_REQ_LEN_OFFSET)?,
            resp_ptr: bus.read_u32(addr + proto::REQ_RESP_PTR_OFFSET)?,
            resp_cap: bus.read_u32(addr + proto::REQ_RESP_CAP_OFFSET)?,
        })
    }

    /// Writes a response descriptor. The status word is stored last with
    /// release ordering: a poller that observes a terminal status also
    /// observes the other fields and everything written to the response
    /// buffer beforehand.
    pub fn write_response(
        &self,
        bus: &dyn BusAccess,
        counter: u8,
        resp: &ResponseSlot,
    ) -> BusResult<()> {
        let addr = self.response_addr(counter);
        bus.write_u32(addr + proto::RESP_TICKET_OFFSET, resp.ticket)?;
        bus.write_u32(addr + proto::RESP_RESULT_CODE_OFFSET, resp.result_code)?;
        bus.write_u32(addr + proto::RESP_RESP_LEN_OFFSET, resp.resp_len)?;
        bus.write_u32_release(addr + proto::RESP_STATUS_OFFSET, resp.status)
    }

    /// Status word of a response slot (acquire; pairs with [`Self::write_response`]).
    pub fn response_status_acquire(&self, bus: &dyn BusAccess, counter: u8) -> BusResult<u32> {
        bus.read_u32_acquire(self.response_addr(counter) + proto::RESP_STATUS_OFFSET)
    }

    pub fn read_response(&self, bus: &dyn BusAccess, counter: u8) -> BusResult<ResponseSlot> {
        let addr = self.response_addr(counter);
        Ok(ResponseSlot {
            ticket: bus.read_u32(addr + proto::RESP_TICKET_OFFSET)?,
            status: bus.read_u32(addr + proto::RESP_STATUS_OFFSET)?,
            result_code: bus.read_u32(addr + proto::RESP_RESULT_CODE_OFFSET)?,
            resp_len: bus.read_u32(addr + proto::RESP_RESP_LEN_OFFSET)?,
        })
    }
}
