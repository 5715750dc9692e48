//! Shared helpers for driving the gateway the way a caller CPU would:
//! register writes through the bus-mapped window, busy-polling for
//! completion.
#![allow(dead_code)]

use babel_machine::Machine;
use babel_proto as proto;
use std::time::{Duration, Instant};

/// Routes worker lifecycle logs to the test harness; safe to call from every
/// test (only the first init wins).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Scratch addresses in caller-owned RAM, clear of every worker region.
pub const NAME_AT: u32 = 0x1000;
pub const REQ_AT: u32 = 0x1100;
pub const RESP_AT: u32 = 0x1200;

pub fn write_reg(m: &Machine, reg: u32, value: u32) {
    m.write_gateway_reg(reg, value).unwrap();
}

pub fn read_reg(m: &Machine, reg: u32) -> u32 {
    m.read_gateway_reg(reg).unwrap()
}

/// Issues a command and returns `CMD_STATUS`.
pub fn issue(m: &Machine, cmd: u32) -> u32 {
    write_reg(m, proto::REG_CMD, cmd);
    read_reg(m, proto::REG_CMD_STATUS)
}

pub fn cmd_error(m: &Machine) -> u32 {
    read_reg(m, proto::REG_CMD_ERROR)
}

/// START with the staged name; returns `CMD_STATUS`.
pub fn start_service(m: &Machine, cpu_type: u32, name: &str) -> u32 {
    m.write_cstr(NAME_AT, name).unwrap();
    write_reg(m, proto::REG_CPU_TYPE, cpu_type);
    write_reg(m, proto::REG_NAME_PTR, NAME_AT);
    issue(m, proto::CMD_START)
}

/// ENQUEUE with explicit descriptor parameters; returns
/// `(cmd_status, cmd_error, ticket)`.
pub fn enqueue(
    m: &Machine,
    cpu_type: u32,
    op: u32,
    req_ptr: u32,
    req_len: u32,
    resp_ptr: u32,
    resp_cap: u32,
) -> (u32, u32, u32) {
    write_reg(m, proto::REG_CPU_TYPE, cpu_type);
    write_reg(m, proto::REG_OP, op);
    write_reg(m, proto::REG_REQ_PTR, req_ptr);
    write_reg(m, proto::REG_REQ_LEN, req_len);
    write_reg(m, proto::REG_RESP_PTR, resp_ptr);
    write_reg(m, proto::REG_RESP_CAP, resp_cap);
    let status = issue(m, proto::CMD_ENQUEUE);
    (status, cmd_error(m), read_reg(m, proto::REG_TICKET))
}

/// One POLL; returns `TICKET_STATUS`. `TICKET` is re-staged every time since
/// ENQUEUE overwrites it.
pub fn poll(m: &Machine, cpu_type: u32, ticket: u32) -> u32 {
    write_reg(m, proto::REG_CPU_TYPE, cpu_type);
    write_reg(m, proto::REG_TICKET, ticket);
    issue(m, proto::CMD_POLL);
    read_reg(m, proto::REG_TICKET_STATUS)
}

/// Busy-polls until the ticket reaches a terminal status.
pub fn poll_until_terminal(m: &Machine, cpu_type: u32, ticket: u32) -> u32 {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let status = poll(m, cpu_type, ticket);
        if status == proto::TICKET_OK || status == proto::TICKET_ERROR {
            return status;
        }
        assert!(
            Instant::now() < deadline,
            "ticket {ticket} still status {status} after 10s"
        );
        std::thread::sleep(Duration::from_millis(1));
    }
}
