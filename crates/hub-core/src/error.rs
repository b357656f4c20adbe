//! Dispatch/runtime error taxonomy (spec §7).

use alertme_protocol::CodecError;
use thiserror::Error;

/// Errors surfaced by the hub engine.
///
/// Dispatch-miss variants (`UnknownProfile`, `UnknownCluster`,
/// `UnknownClusterCommand`) are constructed so callers *can* match on them,
/// but the dispatcher itself only ever logs these and drops the frame; it
/// never returns them up the call stack.
#[derive(Error, Debug)]
pub enum HubError {
    /// A codec-level failure bubbled up from `alertme-protocol` (encoding or
    /// catalog lookup), surfaced synchronously to the caller per §7.
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("unknown profile: {0:#06x}")]
    UnknownProfile(u16),

    #[error("unknown cluster: {0:#06x}")]
    UnknownCluster(u16),

    #[error("unknown cluster command: cluster {cluster:#06x} cmd {cmd:#04x}")]
    UnknownClusterCommand { cluster: u16, cmd: u8 },

    /// The modem collaborator's send failed (e.g. its receiving end hung up).
    #[error("modem error: {0}")]
    ModemError(String),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// `start_discovery` was called while a discovery run was already active.
    #[error("discovery already running")]
    AlreadyRunning,
}
