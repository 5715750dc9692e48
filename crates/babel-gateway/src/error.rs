use babel_exec::CpuArchitecture;
use babel_proto as proto;
use memory::BusError;
use thiserror::Error;

/// Errors resolving a program image by name.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The name is empty, escapes the image directory, or is otherwise not a
    /// plain relative path.
    #[error("image name rejected: {0:?}")]
    PathInvalid(String),

    #[error("image not found: {0:?}")]
    NotFound(String),

    #[error("failed to read image {name:?}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Internal command failure; surfaced to the guest as `CMD_STATUS=1` plus a
/// `CMD_ERROR` code, never as a crash of the issuing context.
#[derive(Debug, Error)]
pub(crate) enum CmdError {
    #[error("unknown architecture selector {0}")]
    UnknownArch(u32),

    #[error("{0} worker already running")]
    AlreadyRunning(CpuArchitecture),

    #[error("no {0} worker started")]
    NotStarted(CpuArchitecture),

    #[error("{0} ring full")]
    RingFull(CpuArchitecture),

    #[error("bad image name")]
    BadName,

    #[error("image not found: {0:?}")]
    ImageNotFound(String),

    #[error("load failed: {0}")]
    LoadFailed(String),

    #[error("ticket {0} out of range")]
    BadTicket(u32),

    #[error("bus fault: {0}")]
    Bus(#[from] BusError),
}

impl CmdError {
    /// Guest-visible `CMD_ERROR` code.
    pub(crate) fn code(&self) -> u32 {
        match self {
            CmdError::UnknownArch(_) => proto::ERR_UNKNOWN_ARCH,
            CmdError::AlreadyRunning(_) => proto::ERR_ALREADY_RUNNING,
            CmdError::NotStarted(_) => proto::ERR_NOT_STARTED,
            CmdError::RingFull(_) => proto::ERR_RING_FULL,
            CmdError::BadName => proto::ERR_BAD_NAME,
            CmdError::ImageNotFound(_) => proto::ERR_IMAGE_NOT_FOUND,
            CmdError::LoadFailed(_) => proto::ERR_LOAD_FAILED,
            CmdError::BadTicket(_) => proto::ERR_BAD_TICKET,
            CmdError::Bus(_) => proto::ERR_LOAD_FAILED,
        }
    }
}

impl From<ImageError> for CmdError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::PathInvalid(_) => CmdError::BadName,
            ImageError::NotFound(name) => CmdError::ImageNotFound(name),
            ImageError::Io { .. } => CmdError::LoadFailed(err.to_string()),
        }
    }
}
