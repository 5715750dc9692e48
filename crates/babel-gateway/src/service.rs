//! The worker-side service dispatch convention.
//!
//! A started worker is expected to loop over its mailbox ring: compare
//! `head`/`tail`, read the request descriptor at `tail`, dispatch on `op`,
//! write the response payload (bounded by the request's `resp_cap`), write
//! the response descriptor, advance `tail`. The gateway does not enforce the
//! `resp_cap` bound (a worker that writes past it corrupts caller memory),
//! so honoring it is part of this convention.
//!
//! [`MailboxService`] is the host-side implementation of that loop, used as
//! the default worker backend and by the integration tests. Workers emulated
//! by the per-ISA interpreters run the same protocol from their own service
//! binaries; the protocol is ISA-independent even though each worker's op
//! handlers are not.

use crate::ring::Ring;
use babel_exec::{CpuArchitecture, CpuBackend, StopToken};
use babel_proto::{self as proto, RequestEntry, ResponseSlot};
use memory::BusAccess;
use std::collections::HashMap;
use std::time::Duration;

/// Handles one operation: reads the request payload, writes into the
/// response scratch (sized to the request's `resp_cap`), and returns the
/// number of bytes produced, or an error `result_code`.
pub type OpHandler = Box<dyn FnMut(&[u8], &mut [u8]) -> Result<usize, u32> + Send>;

/// Dispatch table from `op` codes to handlers.
#[derive(Default)]
pub struct OpTable {
    handlers: HashMap<u32, OpHandler>,
}

impl OpTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, op: u32, handler: F)
    where
        F: FnMut(&[u8], &mut [u8]) -> Result<usize, u32> + Send + 'static,
    {
        self.handlers.insert(op, Box::new(handler));
    }

    fn get_mut(&mut self, op: u32) -> Option<&mut OpHandler> {
        self.handlers.get_mut(&op)
    }
}

fn write_u32_result(out: &mut [u8], value: u32) -> Result<usize, u32> {
    let bytes = value.to_le_bytes();
    if out.len() < bytes.len() {
        return Err(proto::RESULT_BAD_REQUEST);
    }
    out[..bytes.len()].copy_from_slice(&bytes);
    Ok(bytes.len())
}

/// The op table implemented by the standard `coproc_service_*` images.
pub fn standard_ops() -> OpTable {
    let mut ops = OpTable::new();

    ops.register(proto::OP_ADD_U32, |req, out| {
        if req.len() < 8 {
            return Err(proto::RESULT_BAD_REQUEST);
        }
        let a = u32::from_le_bytes(req[0..4].try_into().unwrap());
        let b = u32::from_le_bytes(req[4..8].try_into().unwrap());
        write_u32_result(out, a.wrapping_add(b))
    });

    ops.register(proto::OP_SUM_U32, |req, out| {
        if req.len() % 4 != 0 {
            return Err(proto::RESULT_BAD_REQUEST);
        }
        let sum = req
            .chunks_exact(4)
            .fold(0u32, |acc, c| acc.wrapping_add(u32::from_le_bytes(c.try_into().unwrap())));
        write_u32_result(out, sum)
    });

    ops
}

/// How long the consumer sleeps when its ring is empty.
const IDLE_POLL_INTERVAL: Duration = Duration::from_micros(20);

/// Architecture-agnostic mailbox ring consumer.
pub struct MailboxService {
    arch: CpuArchitecture,
    bus: Box<dyn BusAccess + Send>,
    ring: Ring,
    ops: OpTable,
}

impl MailboxService {
    /// A service draining `arch`'s mailbox ring through `bus`. The bus view
    /// must see the mailbox at its physical addresses (i.e. a flat view).
    pub fn new(arch: CpuArchitecture, bus: Box<dyn BusAccess + Send>, ops: OpTable) -> Self {
        Self {
            arch,
            bus,
            ring: Ring::for_slot(arch.slot_index()),
            ops,
        }
    }

    fn execute(&mut self, entry: &RequestEntry) -> ResponseSlot {
        let mut resp = ResponseSlot {
            ticket: entry.ticket,
            status: proto::TICKET_ERROR,
            result_code: proto::RESULT_UNKNOWN_OP,
            resp_len: 0,
        };

        let Some(handler) = self.ops.get_mut(entry.op) else {
            tracing::debug!(arch = %self.arch, op = entry.op, "unknown op");
            return resp;
        };

        // Caller-controlled lengths bound the scratch allocations; anything
        // larger than the bus cannot name real memory.
        let bus_size = self.bus.size();
        if entry.req_len > bus_size || entry.resp_cap > bus_size {
            resp.result_code = proto::RESULT_BAD_REQUEST;
            return resp;
        }

        let mut req = vec![0u8; entry.req_len as usize];
        if self.bus.read_into(entry.req_ptr, &mut req).is_err() {
            resp.result_code = proto::RESULT_BAD_REQUEST;
            return resp;
        }

        let mut out = vec![0u8; entry.resp_cap as usize];
        match handler(&req, &mut out) {
            Err(code) => {
                resp.result_code = code;
                resp
            }
            Ok(written) => {
                let written = written.min(out.len());
                if self.bus.write_from(entry.resp_ptr, &out[..written]).is_err() {
                    resp.result_code = proto::RESULT_BAD_REQUEST;
                    return resp;
                }
                ResponseSlot {
                    ticket: entry.ticket,
                    status: proto::TICKET_OK,
                    result_code: proto::RESULT_OK,
                    resp_len: written as u32,
                }
            }
        }
    }

    /// One consumer iteration. Returns `false` when the ring was empty.
    fn service_one(&mut self) -> bool {
        let bus = self.bus.as_ref();
        let Ok(tail) = self.ring.tail(bus) else {
            return false;
        };
        let Ok(head) = self.ring.head_acquire(bus) else {
            return false;
        };
        if head == tail {
            return false;
        }

        let Ok(entry) = self.ring.read_entry(bus, tail) else {
            return false;
        };
        let resp = self.execute(&entry);

        let bus = self.bus.as_ref();
        if self.ring.write_response(bus, tail, &resp).is_err() {
            return false;
        }
        let _ = self.ring.publish_tail(bus, tail.wrapping_add(1));
        true
    }
}

impl CpuBackend for MailboxService {
    fn arch(&self) -> CpuArchitecture {
        self.arch
    }

    fn run(&mut self, stop: &StopToken) {
        while !stop.is_raised() {
            if !self.service_one() {
                std::thread::sleep(IDLE_POLL_INTERVAL);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory::SharedRam;

    const REQ: u32 = 0x1_0000;
    const RESP: u32 = 0x1_1000;

    fn service_with_one_entry(entry: RequestEntry) -> (SharedRam, Ring, MailboxService) {
        let ram = SharedRam::new(0x2_0000.max(proto::MAILBOX_BASE + proto::MAILBOX_SIZE));
        let ring = Ring::for_slot(CpuArchitecture::Ie32.slot_index());
        ring.init(&ram).unwrap();
        ring.write_entry(&ram, 0, &entry).unwrap();
        ring.publish_head(&ram, 1).unwrap();

        let svc = MailboxService::new(
            CpuArchitecture::Ie32,
            Box::new(ram.clone()),
            standard_ops(),
        );
        (ram, ring, svc)
    }

    #[test]
    fn add_op_writes_sum_and_ok_response() {
        let entry = RequestEntry {
            ticket: 0,
            cpu_type: proto::CPU_TYPE_IE32,
            op: proto::OP_ADD_U32,
            flags: 0,
            req_ptr: REQ,
            req_len: 8,
            resp_ptr: RESP,
            resp_cap: 4,
        };
        let (ram, ring, mut svc) = service_with_one_entry(entry);
        ram.write_u32(REQ, 10).unwrap();
        ram.write_u32(REQ + 4, 20).unwrap();

        assert!(svc.service_one());
        assert!(!svc.service_one());

        let resp = ring.read_response(&ram, 0).unwrap();
        assert_eq!(resp.status, proto::TICKET_OK);
        assert_eq!(resp.result_code, proto::RESULT_OK);
        assert_eq!(resp.resp_len, 4);
        assert_eq!(ram.read_u32(RESP).unwrap(), 30);
        assert_eq!(ring.tail(&ram).unwrap(), 1);
    }

    #[test]
    fn unknown_op_yields_error_response_and_advances() {
        let entry = RequestEntry {
            ticket: 0,
            cpu_type: proto::CPU_TYPE_IE32,
            op: 0xDEAD,
            flags: 0,
            req_ptr: REQ,
            req_len: 0,
            resp_ptr: RESP,
            resp_cap: 0,
        };
        let (ram, ring, mut svc) = service_with_one_entry(entry);

        assert!(svc.service_one());
        let resp = ring.read_response(&ram, 0).unwrap();
        assert_eq!(resp.status, proto::TICKET_ERROR);
        assert_eq!(resp.result_code, proto::RESULT_UNKNOWN_OP);
        assert_eq!(resp.resp_len, 0);
        assert_eq!(ring.tail(&ram).unwrap(), 1);
    }

    #[test]
    fn response_capacity_too_small_fails_without_writing() {
        let entry = RequestEntry {
            ticket: 0,
            cpu_type: proto::CPU_TYPE_IE32,
            op: proto::OP_ADD_U32,
            flags: 0,
            req_ptr: REQ,
            req_len: 8,
            resp_ptr: RESP,
            resp_cap: 2,
        };
        let (ram, ring, mut svc) = service_with_one_entry(entry);
        ram.write_u32(REQ, 1).unwrap();
        ram.write_u32(REQ + 4, 2).unwrap();

        assert!(svc.service_one());
        let resp = ring.read_response(&ram, 0).unwrap();
        assert_eq!(resp.status, proto::TICKET_ERROR);
        assert_eq!(resp.result_code, proto::RESULT_BAD_REQUEST);
        assert_eq!(ram.read_u32(RESP).unwrap(), 0);
    }

    #[test]
    fn sum_op_folds_the_request_words() {
        let entry = RequestEntry {
            ticket: 0,
            cpu_type: proto::CPU_TYPE_IE32,
            op: proto::OP_SUM_U32,
            flags: 0,
            req_ptr: REQ,
            req_len: 12,
            resp_ptr: RESP,
            resp_cap: 4,
        };
        let (ram, ring, mut svc) = service_with_one_entry(entry);
        ram.write_u32(REQ, 100).unwrap();
        ram.write_u32(REQ + 4, 200).unwrap();
        ram.write_u32(REQ + 8, 300).unwrap();

        assert!(svc.service_one());
        let resp = ring.read_response(&ram, 0).unwrap();
        assert_eq!(resp.status, proto::TICKET_OK);
        assert_eq!(ram.read_u32(RESP).unwrap(), 600);
    }
}
