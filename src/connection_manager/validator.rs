//! Pluggable policy deciding whether two connections may be joined.

use std::fmt;

use crate::model::{Connection, ConnectionType, Workspace};

/// Decides whether a moving connection may snap onto a candidate.
///
/// Implementations only judge legality; distance is handled by the caller.
pub trait ConnectionValidator: fmt::Debug {
    fn can_connect(&self, moving: &Connection, candidate: &Connection, workspace: &Workspace) -> bool;
}

/// Default drag policy.
///
/// 1. The type-level check must pass outright.
/// 2. A moving block without a next connection may not take an occupied
///    next-slot whose occupant could continue the stack, since the occupant
///    would have nowhere to go.
/// 3. Occupied output and previous connections are never candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConnectionValidator;

impl ConnectionValidator for DefaultConnectionValidator {
    fn can_connect(&self, moving: &Connection, candidate: &Connection, workspace: &Workspace) -> bool {
        if !workspace.check_connection(moving, candidate).is_can_connect() {
            return false;
        }

        match candidate.connection_type {
            ConnectionType::OutputValue | ConnectionType::PreviousStatement => {
                !candidate.connected()
            }
            ConnectionType::NextStatement => {
                if !candidate.connected() {
                    return true;
                }
                let moving_is_terminal = moving
                    .source_block
                    .and_then(|id| workspace.block(id))
                    .is_none_or(|b| b.next_connection.is_none());
                let occupant = candidate
                    .target_connection
                    .and_then(|id| workspace.connection(id))
                    .and_then(|c| c.source_block)
                    .and_then(|id| workspace.block(id));
                match occupant {
                    Some(occupant) => {
                        !(moving_is_terminal && !occupant.shadow && occupant.next_connection.is_some())
                    }
                    None => true,
                }
            }
            ConnectionType::InputValue => true,
        }
    }
}
