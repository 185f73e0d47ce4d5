//! Error types for workspace, connection index and drag operations.

use thiserror::Error;

use crate::connection_manager::GroupId;
use crate::model::{BlockId, CheckResult, ConnectionId};

/// Errors that can occur while mutating a workspace.
///
/// The group variants are invariant violations: they mean a drag was
/// started without being finished (or the reverse) and are never expected
/// in correct operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkspaceError {
    /// The main connection group always exists.
    #[error("the main connection group cannot be deleted")]
    CannotDeleteMainGroup,

    /// A group must be emptied (merged) before it is deleted.
    #[error("connection group {group} still tracks {remaining} connections")]
    GroupNotEmpty { group: GroupId, remaining: usize },

    #[error("connection group not found: {0}")]
    UnknownGroup(GroupId),

    #[error("block not found: {0}")]
    UnknownBlock(BlockId),

    #[error("connection not found: {0}")]
    UnknownConnection(ConnectionId),

    #[error("block {block} has no input named {name:?}")]
    UnknownInput { block: BlockId, name: String },

    /// The connection has lost its source block (mid-deletion).
    #[error("connection {0} has no source block")]
    OrphanedConnection(ConnectionId),

    /// The two connections cannot be joined.
    #[error("cannot connect {moving} to {target}: {reason}")]
    IllegalConnection {
        moving: ConnectionId,
        target: ConnectionId,
        reason: CheckResult,
    },

    #[error("invalid block definition: {0}")]
    InvalidBlockDefinition(String),

    /// A drag gesture callback arrived for a block with no active drag.
    #[error("block {0} is not being dragged")]
    BlockNotDragging(BlockId),
}

pub type Result<T, E = WorkspaceError> = std::result::Result<T, E>;
