//! A partition of tracked connections, one [`YSortedList`] per type.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{BlockId, Connection, ConnectionId, ConnectionType, Workspace};

use super::ConnectionPositionDelegate;
use super::validator::ConnectionValidator;
use super::y_sorted_list::YSortedList;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

/// Connections that move together.
///
/// The main group holds everything at rest; a drag creates a group owning
/// the dragged subtree so searches never find the dragged blocks themselves.
#[derive(Debug, Clone)]
pub struct ConnectionGroup {
    id: GroupId,
    lists: [YSortedList; 4],
    owner_block: Option<BlockId>,
    drag_mode: bool,
}

impl ConnectionGroup {
    pub(crate) fn new(id: GroupId, owner_block: Option<BlockId>) -> Self {
        Self {
            id,
            lists: Default::default(),
            owner_block,
            drag_mode: false,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn owner_block(&self) -> Option<BlockId> {
        self.owner_block
    }

    /// While set, the index is frozen: position changes are not re-sorted
    /// and the group is left out of stationary-neighbour queries.
    pub fn drag_mode(&self) -> bool {
        self.drag_mode
    }

    pub(crate) fn set_drag_mode(&mut self, drag_mode: bool) {
        self.drag_mode = drag_mode;
    }

    pub fn list(&self, connection_type: ConnectionType) -> &YSortedList {
        &self.lists[connection_type.index()]
    }

    pub fn len(&self) -> usize {
        self.lists.iter().map(YSortedList::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(YSortedList::is_empty)
    }

    pub fn contains(&self, id: ConnectionId, workspace: &Workspace) -> bool {
        match workspace.connection(id) {
            Some(conn) => self.list(conn.connection_type).contains(id),
            None => self.lists.iter().any(|list| list.contains(id)),
        }
    }

    /// Every connection in the group, grouped by type.
    pub fn all_connections(&self) -> Vec<ConnectionId> {
        self.lists.iter().flat_map(YSortedList::iter).collect()
    }

    pub(crate) fn track_connection(&mut self, id: ConnectionId, workspace: &Workspace) -> bool {
        match workspace.connection(id) {
            Some(conn) => {
                self.lists[conn.connection_type.index()].add_connection(id, workspace);
                true
            }
            None => false,
        }
    }

    pub(crate) fn untrack_connection(&mut self, id: ConnectionId, workspace: &Workspace) {
        match workspace.connection(id) {
            Some(conn) => self.lists[conn.connection_type.index()].remove_connection(id, workspace),
            None => {
                for list in &mut self.lists {
                    list.remove_connection(id, workspace);
                }
            }
        }
    }

    /// Closest connection of the opposite type that `validator` accepts.
    pub fn closest_connection(
        &self,
        query: &Connection,
        max_radius: f64,
        workspace: &Workspace,
        validator: &dyn ConnectionValidator,
    ) -> Option<ConnectionId> {
        self.list(query.connection_type.opposite())
            .search_for_closest_valid_connection(query, max_radius, workspace, validator)
    }

    /// Opposite-type connections that visually overlap `query`.
    pub fn neighbors(&self, query: &Connection, max_radius: f64, workspace: &Workspace) -> Vec<ConnectionId> {
        self.list(query.connection_type.opposite())
            .neighbors(query, max_radius, workspace)
    }

    /// Move every connection into `other`, list by list.
    pub(crate) fn transfer_connections(&mut self, other: &mut ConnectionGroup, workspace: &Workspace) {
        for (mine, theirs) in self.lists.iter_mut().zip(other.lists.iter_mut()) {
            mine.transfer_connections(theirs, workspace);
        }
    }

    pub fn is_sorted(&self, workspace: &Workspace) -> bool {
        self.lists.iter().all(|list| list.is_sorted(workspace))
    }
}

impl ConnectionPositionDelegate for ConnectionGroup {
    fn will_change_position(&mut self, id: ConnectionId, workspace: &Workspace) {
        if !self.drag_mode {
            self.untrack_connection(id, workspace);
        }
    }

    fn did_change_position(&mut self, id: ConnectionId, workspace: &Workspace) {
        if !self.drag_mode {
            self.track_connection(id, workspace);
        }
    }
}
