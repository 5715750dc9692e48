mod common;

use babel_exec::CpuArchitecture;
use babel_gateway::Ring;
use babel_machine::{Machine, MachineConfig};
use babel_proto as proto;
use common::*;

#[test]
fn unregistered_op_fails_the_ticket_without_poisoning_the_ring() {
    let m = Machine::new(MachineConfig::default()).unwrap();
    assert_eq!(
        start_service(&m, proto::CPU_TYPE_6502, "coproc_service_6502"),
        proto::CMD_STATUS_OK
    );

    m.write_u32(RESP_AT, 0xFFFF_FFFF).unwrap();
    let (status, _, bad_ticket) =
        enqueue(&m, proto::CPU_TYPE_6502, 0x4242, REQ_AT, 0, RESP_AT, 4);
    assert_eq!(status, proto::CMD_STATUS_OK);

    assert_eq!(
        poll_until_terminal(&m, proto::CPU_TYPE_6502, bad_ticket),
        proto::TICKET_ERROR
    );

    let ring = Ring::for_slot(CpuArchitecture::Mos6502.slot_index());
    let resp = ring.read_response(m.bus(), bad_ticket as u8).unwrap();
    assert_eq!(resp.status, proto::TICKET_ERROR);
    assert_eq!(resp.result_code, proto::RESULT_UNKNOWN_OP);
    assert_eq!(resp.resp_len, 0);
    // The response buffer was never touched.
    assert_eq!(m.read_u32(RESP_AT).unwrap(), 0xFFFF_FFFF);

    // The failure did not terminate the worker's poll loop or corrupt the
    // next slot: a well-formed request still succeeds.
    m.write_u32(REQ_AT, 2).unwrap();
    m.write_u32(REQ_AT + 4, 3).unwrap();
    let (status, err, good_ticket) = enqueue(
        &m,
        proto::CPU_TYPE_6502,
        proto::OP_ADD_U32,
        REQ_AT,
        8,
        RESP_AT,
        4,
    );
    assert_eq!(status, proto::CMD_STATUS_OK, "err={err}");
    assert_eq!(good_ticket, bad_ticket + 1);
    assert_eq!(
        poll_until_terminal(&m, proto::CPU_TYPE_6502, good_ticket),
        proto::TICKET_OK
    );
    assert_eq!(m.read_u32(RESP_AT).unwrap(), 5);

    // The failed ticket's status is unchanged by the later success.
    assert_eq!(poll(&m, proto::CPU_TYPE_6502, bad_ticket), proto::TICKET_ERROR);
}

#[test]
fn malformed_request_payload_reports_bad_request() {
    let m = Machine::new(MachineConfig::default()).unwrap();
    assert_eq!(
        start_service(&m, proto::CPU_TYPE_IE32, "coproc_service_ie32"),
        proto::CMD_STATUS_OK
    );

    // OP_ADD_U32 needs 8 request bytes; give it 3.
    let (status, _, ticket) = enqueue(
        &m,
        proto::CPU_TYPE_IE32,
        proto::OP_ADD_U32,
        REQ_AT,
        3,
        RESP_AT,
        4,
    );
    assert_eq!(status, proto::CMD_STATUS_OK);
    assert_eq!(
        poll_until_terminal(&m, proto::CPU_TYPE_IE32, ticket),
        proto::TICKET_ERROR
    );

    let ring = Ring::for_slot(CpuArchitecture::Ie32.slot_index());
    let resp = ring.read_response(m.bus(), ticket as u8).unwrap();
    assert_eq!(resp.result_code, proto::RESULT_BAD_REQUEST);
}
