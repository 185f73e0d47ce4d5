//! Pushes overlapping blocks apart after a drop or a mutation.

use std::collections::BTreeSet;

use crate::config::{BLOCK_BUMP_DISTANCE, LayoutConfig};
use crate::coordinator::WorkspaceLayoutCoordinator;
use crate::error::{Result, WorkspaceError};
use crate::model::{BlockId, ConnectionId};
use crate::units::WorkspacePoint;

/// Moves blocks out of each other's way by a fixed configured offset.
///
/// Only blocks whose connections sit within `bump_distance` of each other
/// are considered overlapping. Blocks in an active drag are never moved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockBumper {
    bump_distance: f64,
}

impl BlockBumper {
    pub fn new(bump_distance: f64) -> Self {
        Self { bump_distance }
    }

    pub fn from_config(config: &LayoutConfig) -> Self {
        Self::new(config.workspace_unit(BLOCK_BUMP_DISTANCE))
    }

    pub fn bump_distance(&self) -> f64 {
        self.bump_distance
    }

    /// Move the group of `impinging`'s block so that connection ends up
    /// `bump_distance` right of and below `stationary`.
    ///
    /// Does nothing when the impinging group is being dragged.
    pub fn bump_block_of_connection(
        &self,
        coordinator: &mut WorkspaceLayoutCoordinator,
        impinging: ConnectionId,
        stationary: ConnectionId,
    ) -> Result<()> {
        let ws = coordinator.workspace();
        let impinging_conn = ws
            .connection(impinging)
            .ok_or(WorkspaceError::UnknownConnection(impinging))?;
        let stationary_conn = ws
            .connection(stationary)
            .ok_or(WorkspaceError::UnknownConnection(stationary))?;
        let block = impinging_conn
            .source_block
            .ok_or(WorkspaceError::OrphanedConnection(impinging))?;
        if coordinator.is_block_dragging(block) {
            tracing::trace!(block = %block, "not bumping a dragged block");
            return Ok(());
        }

        let offset = WorkspacePoint::new(self.bump_distance, self.bump_distance);
        let delta = stationary_conn.position + offset - impinging_conn.position;
        let root = ws.root_block(block);
        let position = coordinator
            .block_group_position(root)
            .ok_or(WorkspaceError::UnknownBlock(root))?;
        coordinator.move_block_group(root, position + delta)?;
        coordinator.bring_to_front(root);
        tracing::debug!(block = %root, from = %stationary, "bumped block");
        Ok(())
    }

    /// Separate `block` from everything overlapping it.
    ///
    /// By default an unattached block moves itself away from the closest
    /// neighbour of its previous or output connection. With
    /// `always_bump_others`, or when the block is nested in another block,
    /// the neighbours are moved instead. High-priority connections push
    /// away everything near them and everything near the blocks plugged
    /// into them.
    pub fn bump_neighbors(
        &self,
        coordinator: &mut WorkspaceLayoutCoordinator,
        block: BlockId,
        always_bump_others: bool,
    ) -> Result<()> {
        if coordinator.workspace().block(block).is_none() {
            return Err(WorkspaceError::UnknownBlock(block));
        }
        let mut bumped = BTreeSet::new();
        self.bump_pass(coordinator, block, always_bump_others, &mut bumped)
    }

    fn bump_pass(
        &self,
        coordinator: &mut WorkspaceLayoutCoordinator,
        block: BlockId,
        always_bump_others: bool,
        bumped: &mut BTreeSet<BlockId>,
    ) -> Result<()> {
        let Some(b) = coordinator.workspace().block(block) else {
            return Ok(());
        };
        let facing = b.superior_facing_connection();
        let high_priority: Vec<ConnectionId> = b
            .direct_connections()
            .into_iter()
            .filter(|id| {
                coordinator
                    .workspace()
                    .connection(*id)
                    .is_some_and(|c| c.high_priority)
            })
            .collect();

        if let Some(conn) = facing {
            let nested = coordinator
                .workspace()
                .connection(conn)
                .is_some_and(|c| c.connected());
            if always_bump_others || nested {
                self.bump_others_near(coordinator, conn, bumped)?;
            } else {
                self.bump_self_from_nearest(coordinator, conn, bumped)?;
            }
        }

        for conn in high_priority {
            let child = coordinator
                .workspace()
                .connection(conn)
                .filter(|c| c.connection_type.is_superior())
                .and_then(|_| coordinator.workspace().target_block(conn));
            if let Some(child) = child {
                self.bump_pass(coordinator, child, true, bumped)?;
            }
            self.bump_others_near(coordinator, conn, bumped)?;
        }
        Ok(())
    }

    fn bump_self_from_nearest(
        &self,
        coordinator: &mut WorkspaceLayoutCoordinator,
        conn: ConnectionId,
        bumped: &mut BTreeSet<BlockId>,
    ) -> Result<()> {
        let ws = coordinator.workspace();
        let Some(query) = ws.connection(conn) else {
            return Ok(());
        };
        let Some(own_root) = query.source_block.map(|b| ws.root_block(b)) else {
            return Ok(());
        };
        if bumped.contains(&own_root) {
            return Ok(());
        }
        let nearest = coordinator
            .stationary_neighbors(conn, self.bump_distance)
            .into_iter()
            .filter_map(|id| ws.connection(id))
            .filter(|c| c.source_block.map(|b| ws.root_block(b)) != Some(own_root))
            .map(|c| (c.id, query.distance_from(c)))
            .reduce(|best, next| if next.1 < best.1 { next } else { best });
        if let Some((stationary, _)) = nearest {
            bumped.insert(own_root);
            self.bump_block_of_connection(coordinator, conn, stationary)?;
        }
        Ok(())
    }

    fn bump_others_near(
        &self,
        coordinator: &mut WorkspaceLayoutCoordinator,
        conn: ConnectionId,
        bumped: &mut BTreeSet<BlockId>,
    ) -> Result<()> {
        let ws = coordinator.workspace();
        let Some(own_root) = ws
            .connection(conn)
            .and_then(|c| c.source_block)
            .map(|b| ws.root_block(b))
        else {
            return Ok(());
        };
        for neighbor in coordinator.stationary_neighbors(conn, self.bump_distance) {
            let ws = coordinator.workspace();
            let Some(root) = ws
                .connection(neighbor)
                .and_then(|c| c.source_block)
                .map(|b| ws.root_block(b))
            else {
                continue;
            };
            if root == own_root || !bumped.insert(root) {
                continue;
            }
            self.bump_block_of_connection(coordinator, neighbor, conn)?;
        }
        Ok(())
    }
}
