//! Spatial index over every tracked connection in a workspace.
//!
//! [`ConnectionManager`] partitions connections into [`ConnectionGroup`]s:
//!
//! - the main group ([`MAIN_GROUP`]) holds everything at rest and is never
//!   deleted;
//! - a drag creates a transient group for the dragged subtree
//!   ([`ConnectionManager::start_group`]) and merges it back when the drag
//!   ends ([`ConnectionManager::merge_group`]).
//!
//! Each group keeps one [`YSortedList`] per
//! [`ConnectionType`](crate::model::ConnectionType), and a search
//! for a connection only looks at the list of the opposite type.
//!
//! # Moving connections
//!
//! The lists read positions from the [`Workspace`], so a position change is
//! a two-step handshake through [`ConnectionPositionDelegate`]:
//!
//! ```rust,ignore
//! manager.will_change_position(id, &workspace); // remove from its list
//! workspace.connection_mut(id)?.position = new_position;
//! manager.did_change_position(id, &workspace);  // re-insert in order
//! ```

pub mod group;
pub mod validator;
pub mod y_sorted_list;

pub use group::{ConnectionGroup, GroupId};
pub use validator::{ConnectionValidator, DefaultConnectionValidator};
pub use y_sorted_list::YSortedList;

use indexmap::IndexMap;
use std::collections::HashMap;

use crate::error::{Result, WorkspaceError};
use crate::model::{BlockId, ConnectionId, Workspace};

/// The group that exists for the whole life of a manager.
pub const MAIN_GROUP: GroupId = GroupId(0);

/// Receives the two halves of a connection position change.
pub trait ConnectionPositionDelegate {
    /// Called while the connection still has its old position.
    fn will_change_position(&mut self, id: ConnectionId, workspace: &Workspace);
    /// Called once the connection has its new position.
    fn did_change_position(&mut self, id: ConnectionId, workspace: &Workspace);
}

/// Result of [`ConnectionManager::find_best_connection`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestConnection {
    /// Connection on the dragged block.
    pub moving: ConnectionId,
    /// Stationary connection to join it to.
    pub target: ConnectionId,
    /// Group `target` was found in.
    pub group: GroupId,
    pub distance: f64,
}

#[derive(Debug)]
pub struct ConnectionManager {
    groups: IndexMap<GroupId, ConnectionGroup>,
    group_of: HashMap<ConnectionId, GroupId>,
    next_group_id: u32,
    validator: Box<dyn ConnectionValidator>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::with_validator(Box::new(DefaultConnectionValidator))
    }

    pub fn with_validator(validator: Box<dyn ConnectionValidator>) -> Self {
        let mut groups = IndexMap::new();
        groups.insert(MAIN_GROUP, ConnectionGroup::new(MAIN_GROUP, None));
        Self {
            groups,
            group_of: HashMap::new(),
            next_group_id: MAIN_GROUP.0 + 1,
            validator,
        }
    }

    pub fn main_group(&self) -> &ConnectionGroup {
        &self.groups[&MAIN_GROUP]
    }

    pub fn group(&self, id: GroupId) -> Option<&ConnectionGroup> {
        self.groups.get(&id)
    }

    pub fn groups(&self) -> impl Iterator<Item = &ConnectionGroup> {
        self.groups.values()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Group currently tracking `id`.
    pub fn group_for_connection(&self, id: ConnectionId) -> Option<GroupId> {
        self.group_of.get(&id).copied()
    }

    pub fn tracked_connection_count(&self) -> usize {
        self.group_of.len()
    }

    pub fn set_drag_mode(&mut self, group: GroupId, drag_mode: bool) -> Result<()> {
        let g = self
            .groups
            .get_mut(&group)
            .ok_or(WorkspaceError::UnknownGroup(group))?;
        g.set_drag_mode(drag_mode);
        Ok(())
    }

    /// Create a group; with an owner, every connection in the owner's
    /// subtree is moved into it.
    pub fn start_group(&mut self, owner: Option<BlockId>, workspace: &Workspace) -> GroupId {
        let id = GroupId(self.next_group_id);
        self.next_group_id += 1;
        self.groups.insert(id, ConnectionGroup::new(id, owner));
        if let Some(block) = owner {
            for conn in workspace.all_connections_in_tree(block) {
                if let Err(err) = self.track_connection(conn, Some(id), workspace) {
                    tracing::warn!("could not move {} into {}: {}", conn, id, err);
                }
            }
        }
        tracing::debug!(group = %id, owner = ?owner, "started connection group");
        id
    }

    /// Move every connection of `from` into `into` (the main group when
    /// `None`) and delete `from`. Merging a group into itself does nothing.
    pub fn merge_group(&mut self, from: GroupId, into: Option<GroupId>, workspace: &Workspace) -> Result<()> {
        let into = into.unwrap_or(MAIN_GROUP);
        if from == into {
            return Ok(());
        }
        if from == MAIN_GROUP {
            return Err(WorkspaceError::CannotDeleteMainGroup);
        }
        if !self.groups.contains_key(&into) {
            return Err(WorkspaceError::UnknownGroup(into));
        }
        let mut source = self
            .groups
            .shift_remove(&from)
            .ok_or(WorkspaceError::UnknownGroup(from))?;
        let moved = source.all_connections();
        if let Some(target) = self.groups.get_mut(&into) {
            source.transfer_connections(target, workspace);
        }
        for conn in &moved {
            self.group_of.insert(*conn, into);
        }
        tracing::debug!(from = %from, into = %into, moved = moved.len(), "merged connection group");
        Ok(())
    }

    /// Delete an empty, non-main group.
    pub fn delete_group(&mut self, id: GroupId) -> Result<()> {
        if id == MAIN_GROUP {
            return Err(WorkspaceError::CannotDeleteMainGroup);
        }
        let group = self.groups.get(&id).ok_or(WorkspaceError::UnknownGroup(id))?;
        if !group.is_empty() {
            return Err(WorkspaceError::GroupNotEmpty {
                group: id,
                remaining: group.len(),
            });
        }
        self.groups.shift_remove(&id);
        Ok(())
    }

    /// Track `id` in `group` (the main group when `None`), moving it out of
    /// any other group first. Tracking into the current group is a no-op.
    pub fn track_connection(&mut self, id: ConnectionId, group: Option<GroupId>, workspace: &Workspace) -> Result<()> {
        let group = group.unwrap_or(MAIN_GROUP);
        if !self.groups.contains_key(&group) {
            return Err(WorkspaceError::UnknownGroup(group));
        }
        if workspace.connection(id).is_none() {
            return Err(WorkspaceError::UnknownConnection(id));
        }
        if self.group_of.get(&id) == Some(&group) {
            return Ok(());
        }
        self.untrack_connection(id, workspace);
        if let Some(g) = self.groups.get_mut(&group) {
            g.track_connection(id, workspace);
        }
        self.group_of.insert(id, group);
        Ok(())
    }

    pub fn untrack_connection(&mut self, id: ConnectionId, workspace: &Workspace) {
        if let Some(old) = self.group_of.remove(&id) {
            if let Some(g) = self.groups.get_mut(&old) {
                g.untrack_connection(id, workspace);
            }
        }
    }

    /// Untrack every connection that has lost its source block, returning
    /// them in id order.
    pub fn untrack_orphaned_connections(&mut self, workspace: &Workspace) -> Vec<ConnectionId> {
        let mut orphans: Vec<ConnectionId> = self
            .group_of
            .keys()
            .copied()
            .filter(|id| workspace.connection(*id).is_none_or(|c| c.source_block.is_none()))
            .collect();
        orphans.sort();
        for id in &orphans {
            self.untrack_connection(*id, workspace);
        }
        if !orphans.is_empty() {
            tracing::debug!(count = orphans.len(), "untracked orphaned connections");
        }
        orphans
    }

    /// Best connection between the owner block of `group` and any other
    /// group, within `max_radius`.
    ///
    /// The radius shrinks to the best distance found so far, so each
    /// candidate connection only has to beat the previous winner.
    pub fn find_best_connection(&self, group: GroupId, max_radius: f64, workspace: &Workspace) -> Option<BestConnection> {
        let owner = self.groups.get(&group)?.owner_block()?;
        let block = workspace.block(owner)?;
        let mut candidates = block.direct_connections();
        let last = workspace.last_block_in_chain(owner);
        if last != owner {
            if let Some(next) = workspace.block(last).and_then(|b| b.next_connection) {
                candidates.push(next);
            }
        }

        let mut radius = max_radius;
        let mut best: Option<BestConnection> = None;
        for moving in candidates {
            let Some((target, found_in, distance)) = self.closest_with_distance(moving, radius, Some(group), workspace)
            else {
                continue;
            };
            if best.is_none_or(|b| distance < b.distance) {
                best = Some(BestConnection {
                    moving,
                    target,
                    group: found_in,
                    distance,
                });
                radius = distance;
            }
        }
        tracing::trace!(group = %group, best = ?best, "find_best_connection");
        best
    }

    /// Closest valid connection to `id` across every group except
    /// `ignore_group`, with the group it was found in.
    pub fn closest_connection(
        &self,
        id: ConnectionId,
        max_radius: f64,
        ignore_group: Option<GroupId>,
        workspace: &Workspace,
    ) -> Option<(ConnectionId, GroupId)> {
        self.closest_with_distance(id, max_radius, ignore_group, workspace)
            .map(|(target, group, _)| (target, group))
    }

    fn closest_with_distance(
        &self,
        id: ConnectionId,
        max_radius: f64,
        ignore_group: Option<GroupId>,
        workspace: &Workspace,
    ) -> Option<(ConnectionId, GroupId, f64)> {
        let query = workspace.connection(id)?;
        let mut radius = max_radius;
        let mut best: Option<(ConnectionId, GroupId, f64)> = None;
        for (gid, group) in &self.groups {
            if Some(*gid) == ignore_group {
                continue;
            }
            let Some(found) = group.closest_connection(query, radius, workspace, self.validator.as_ref()) else {
                continue;
            };
            let Some(candidate) = workspace.connection(found) else {
                continue;
            };
            let distance = query.distance_from(candidate);
            if best.is_none_or(|(_, _, d)| distance < d) {
                best = Some((found, *gid, distance));
                radius = distance;
            }
        }
        best
    }

    /// Neighbours of `id` in every group that is not being dragged.
    pub fn stationary_neighbors(&self, id: ConnectionId, max_radius: f64, workspace: &Workspace) -> Vec<ConnectionId> {
        let Some(query) = workspace.connection(id) else {
            return Vec::new();
        };
        self.groups
            .values()
            .filter(|g| !g.drag_mode())
            .flat_map(|g| g.neighbors(query, max_radius, workspace))
            .collect()
    }

}

impl ConnectionPositionDelegate for ConnectionManager {
    fn will_change_position(&mut self, id: ConnectionId, workspace: &Workspace) {
        if let Some(g) = self.group_of.get(&id).and_then(|gid| self.groups.get_mut(gid)) {
            g.will_change_position(id, workspace);
        }
    }

    fn did_change_position(&mut self, id: ConnectionId, workspace: &Workspace) {
        if let Some(g) = self.group_of.get(&id).and_then(|gid| self.groups.get_mut(gid)) {
            g.did_change_position(id, workspace);
        }
    }
}
