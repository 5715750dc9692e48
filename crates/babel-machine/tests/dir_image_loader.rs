mod common;

use babel_machine::{ImageSource, Machine, MachineConfig};
use babel_proto as proto;
use common::*;

fn machine_with_image_dir(dir: &std::path::Path) -> Machine {
    Machine::new(MachineConfig {
        image_source: ImageSource::Dir(dir.to_path_buf()),
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn starts_a_service_from_a_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("coproc_service_ie32"), [0x90, 0x90, 0xFF])?;
    let m = machine_with_image_dir(dir.path());

    assert_eq!(
        start_service(&m, proto::CPU_TYPE_IE32, "coproc_service_ie32"),
        proto::CMD_STATUS_OK
    );

    // The image bytes were placed at the worker region base.
    let mut loaded = [0u8; 3];
    m.read_physical(babel_gateway::worker_region(babel_exec::CpuArchitecture::Ie32).0, &mut loaded)?;
    assert_eq!(loaded, [0x90, 0x90, 0xFF]);
    Ok(())
}

#[test]
fn missing_file_reports_image_not_found() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let m = machine_with_image_dir(dir.path());

    assert_eq!(
        start_service(&m, proto::CPU_TYPE_IE32, "coproc_service_ie32"),
        proto::CMD_STATUS_ERROR
    );
    assert_eq!(cmd_error(&m), proto::ERR_IMAGE_NOT_FOUND);
    Ok(())
}

#[test]
fn escaping_names_report_bad_name() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("svc"), [0])?;
    let m = machine_with_image_dir(dir.path());

    for bad in ["../svc", "/etc/hostname", "a/../../svc"] {
        assert_eq!(
            start_service(&m, proto::CPU_TYPE_Z80, bad),
            proto::CMD_STATUS_ERROR,
            "{bad}"
        );
        assert_eq!(cmd_error(&m), proto::ERR_BAD_NAME, "{bad}");
    }
    Ok(())
}

#[test]
fn overlong_names_report_bad_name() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let m = machine_with_image_dir(dir.path());

    let long = "x".repeat(proto::MAX_IMAGE_NAME_LEN + 1);
    assert_eq!(
        start_service(&m, proto::CPU_TYPE_Z80, &long),
        proto::CMD_STATUS_ERROR
    );
    assert_eq!(cmd_error(&m), proto::ERR_BAD_NAME);
    Ok(())
}
