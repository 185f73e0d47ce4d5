//! Connections of one type, kept sorted by y.
//!
//! Blocks mostly stack vertically, so a single-axis index with a local
//! linear scan bounded by the search radius is enough: lookups cost a binary
//! search plus the connections inside the radius' y-band.
//!
//! The list stores ids only and reads positions from the [`Workspace`] at
//! call time. A connection must therefore be removed *before* its position
//! changes and re-added afterwards (see
//! [`super::ConnectionPositionDelegate`]).

use crate::model::{CheckResult, Connection, ConnectionId, Workspace};

use super::validator::ConnectionValidator;

/// Reasons that still count two connections as visual neighbours even though
/// they could not be connected right now.
const NEIGHBOR_REASONS: CheckResult = CheckResult::MUST_DISCONNECT
    .union(CheckResult::TYPE_CHECKS_FAILED)
    .union(CheckResult::CANNOT_SET_SHADOW_FOR_TARGET);

#[derive(Debug, Clone, Default)]
pub struct YSortedList {
    connections: Vec<ConnectionId>,
}

impl YSortedList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains(&id)
    }

    pub fn as_slice(&self) -> &[ConnectionId] {
        &self.connections
    }

    pub fn iter(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections.iter().copied()
    }

    fn y_at(&self, index: usize, workspace: &Workspace) -> f64 {
        workspace
            .connection(self.connections[index])
            .map_or(f64::NAN, |c| c.position.y)
    }

    /// Insert after any existing connections with the same y, so ties keep
    /// insertion order.
    pub fn add_connection(&mut self, id: ConnectionId, workspace: &Workspace) {
        let Some(conn) = workspace.connection(id) else {
            tracing::warn!("not indexing unknown {}", id);
            return;
        };
        let y = conn.position.y;
        let at = self.connections.partition_point(|other| {
            workspace
                .connection(*other)
                .is_some_and(|c| c.position.y <= y)
        });
        self.connections.insert(at, id);
    }

    /// Remove `id`. Absent connections are ignored.
    pub fn remove_connection(&mut self, id: ConnectionId, workspace: &Workspace) {
        let Some(conn) = workspace.connection(id) else {
            self.connections.retain(|other| *other != id);
            return;
        };
        let y = conn.position.y;
        let start = self.find_position(y, workspace);

        // Scan the equal-y band in both directions.
        let mut i = start;
        while i < self.connections.len() && self.y_at(i, workspace) == y {
            if self.connections[i] == id {
                self.connections.remove(i);
                return;
            }
            i += 1;
        }
        let mut i = start;
        while i > 0 && self.y_at(i - 1, workspace) == y {
            i -= 1;
            if self.connections[i] == id {
                self.connections.remove(i);
                return;
            }
        }
        tracing::trace!("{} not found in y-band {}", id, y);
    }

    /// Index of the first connection whose y is not below `y`.
    ///
    /// Any index inside a run of equal-y connections is a valid insertion
    /// point; this one is the start of the run.
    pub fn find_position(&self, y: f64, workspace: &Workspace) -> usize {
        let mut low = 0;
        let mut high = self.connections.len();
        while low < high {
            let mid = (low + high) / 2;
            if self.y_at(mid, workspace) < y {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        low
    }

    fn is_in_y_range(&self, index: usize, base_y: f64, max_radius: f64, workspace: &Workspace) -> bool {
        (self.y_at(index, workspace) - base_y).abs() <= max_radius
    }

    /// Indices within `max_radius` of `base_y` on the y axis, nearest first
    /// below the insertion point, then at and above it.
    fn band(&self, base_y: f64, max_radius: f64, workspace: &Workspace) -> Vec<usize> {
        let start = self.find_position(base_y, workspace);
        let mut out = Vec::new();
        let mut i = start;
        while i > 0 && self.is_in_y_range(i - 1, base_y, max_radius, workspace) {
            i -= 1;
            out.push(i);
        }
        let mut i = start;
        while i < self.connections.len() && self.is_in_y_range(i, base_y, max_radius, workspace) {
            out.push(i);
            i += 1;
        }
        out
    }

    /// Closest connection to `query` within `max_radius` that `validator`
    /// accepts. Equal distances resolve to the lower list index.
    pub fn search_for_closest_valid_connection(
        &self,
        query: &Connection,
        max_radius: f64,
        workspace: &Workspace,
        validator: &dyn ConnectionValidator,
    ) -> Option<ConnectionId> {
        if self.connections.is_empty() {
            return None;
        }
        let mut best: Option<(f64, usize)> = None;
        for index in self.band(query.position.y, max_radius, workspace) {
            let Some(candidate) = workspace.connection(self.connections[index]) else {
                continue;
            };
            let distance = query.distance_from(candidate);
            if distance > max_radius {
                continue;
            }
            let better = match best {
                None => true,
                Some((d, i)) => distance < d || (distance == d && index < i),
            };
            if better && validator.can_connect(query, candidate, workspace) {
                best = Some((distance, index));
            }
        }
        best.map(|(_, index)| self.connections[index])
    }

    /// Connections within `max_radius` of `query` that overlap it visually,
    /// whether or not they could actually be connected.
    pub fn neighbors(
        &self,
        query: &Connection,
        max_radius: f64,
        workspace: &Workspace,
    ) -> Vec<ConnectionId> {
        let mut indices: Vec<usize> = self
            .band(query.position.y, max_radius, workspace)
            .into_iter()
            .filter(|&index| {
                let Some(candidate) = workspace.connection(self.connections[index]) else {
                    return false;
                };
                if query.distance_from(candidate) > max_radius {
                    return false;
                }
                if query.connected() && candidate.connected() {
                    return false;
                }
                workspace
                    .check_connection(query, candidate)
                    .without(NEIGHBOR_REASONS)
                    .is_can_connect()
            })
            .collect();
        indices.sort_unstable();
        indices.into_iter().map(|index| self.connections[index]).collect()
    }

    /// Merge every connection of `self` into `other`, keeping `other` sorted,
    /// and leave `self` empty.
    pub fn transfer_connections(&mut self, other: &mut YSortedList, workspace: &Workspace) {
        if self.connections.is_empty() {
            return;
        }
        let y = |id: &ConnectionId| workspace.connection(*id).map_or(f64::NAN, |c| c.position.y);
        let mine = std::mem::take(&mut self.connections);
        let theirs = std::mem::take(&mut other.connections);
        let mut merged = Vec::with_capacity(mine.len() + theirs.len());
        let (mut a, mut b) = (0, 0);
        while a < theirs.len() && b < mine.len() {
            // `<=` keeps existing entries ahead of transferred ones on ties.
            if y(&theirs[a]) <= y(&mine[b]) {
                merged.push(theirs[a]);
                a += 1;
            } else {
                merged.push(mine[b]);
                b += 1;
            }
        }
        merged.extend_from_slice(&theirs[a..]);
        merged.extend_from_slice(&mine[b..]);
        other.connections = merged;
    }

    /// True when every connection is in non-decreasing y order.
    pub fn is_sorted(&self, workspace: &Workspace) -> bool {
        (1..self.connections.len()).all(|i| self.y_at(i - 1, workspace) <= self.y_at(i, workspace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection_manager::validator::DefaultConnectionValidator;
    use crate::model::{BlockBuilder, ConnectionSpec};
    use crate::units::WorkspacePoint;

    /// A workspace with one statement block per `(x, y)`; returns the ids of
    /// their next connections.
    fn next_connections(points: &[(f64, f64)]) -> (Workspace, Vec<ConnectionId>) {
        let mut ws = Workspace::new();
        let builder = BlockBuilder::new("stmt").next(ConnectionSpec::at(0.0, 0.0));
        let ids = points
            .iter()
            .map(|&(x, y)| {
                let block = ws.create_block(&builder, WorkspacePoint::new(x, y)).unwrap();
                ws.block(block).unwrap().next_connection.unwrap()
            })
            .collect();
        (ws, ids)
    }

    fn previous_at(ws: &mut Workspace, x: f64, y: f64) -> ConnectionId {
        let builder = BlockBuilder::new("query").previous(ConnectionSpec::at(0.0, 0.0));
        let block = ws.create_block(&builder, WorkspacePoint::new(x, y)).unwrap();
        ws.block(block).unwrap().previous_connection.unwrap()
    }

    #[test]
    fn test_add_keeps_sorted() {
        let (ws, ids) = next_connections(&[(0.0, 50.0), (0.0, 10.0), (0.0, 30.0), (0.0, 10.0)]);
        let mut list = YSortedList::new();
        for id in &ids {
            list.add_connection(*id, &ws);
            assert!(list.is_sorted(&ws));
        }
        assert_eq!(list.as_slice(), &[ids[1], ids[3], ids[2], ids[0]]);
    }

    #[test]
    fn test_remove_finds_within_equal_band() {
        let (ws, ids) = next_connections(&[(0.0, 10.0), (5.0, 10.0), (9.0, 10.0), (0.0, 20.0)]);
        let mut list = YSortedList::new();
        for id in &ids {
            list.add_connection(*id, &ws);
        }
        list.remove_connection(ids[1], &ws);
        assert_eq!(list.as_slice(), &[ids[0], ids[2], ids[3]]);
        // Removing again is a silent no-op.
        list.remove_connection(ids[1], &ws);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_find_position_returns_start_of_run() {
        let (ws, ids) = next_connections(&[(0.0, 10.0), (0.0, 20.0), (0.0, 20.0), (0.0, 30.0)]);
        let mut list = YSortedList::new();
        for id in &ids {
            list.add_connection(*id, &ws);
        }
        assert_eq!(list.find_position(5.0, &ws), 0);
        assert_eq!(list.find_position(20.0, &ws), 1);
        assert_eq!(list.find_position(25.0, &ws), 3);
        assert_eq!(list.find_position(99.0, &ws), 4);
    }

    #[test]
    fn test_closest_valid_connection() {
        let (mut ws, ids) = next_connections(&[(0.0, 0.0), (0.0, 100.0), (40.0, 104.0), (3.0, 108.0)]);
        let query = previous_at(&mut ws, 0.0, 105.0);
        let mut list = YSortedList::new();
        for id in &ids {
            list.add_connection(*id, &ws);
        }
        let query = ws.connection(query).unwrap();
        let validator = DefaultConnectionValidator;
        let found = list.search_for_closest_valid_connection(query, 25.0, &ws, &validator);
        assert_eq!(found, Some(ids[3]));
        // Nothing inside a tiny radius.
        let found = list.search_for_closest_valid_connection(query, 1.0, &ws, &validator);
        assert_eq!(found, None);
    }

    #[test]
    fn test_closest_ties_prefer_lower_index() {
        let (mut ws, ids) = next_connections(&[(10.0, 100.0), (-10.0, 100.0)]);
        let query = previous_at(&mut ws, 0.0, 100.0);
        let mut list = YSortedList::new();
        for id in &ids {
            list.add_connection(*id, &ws);
        }
        let query = ws.connection(query).unwrap();
        let found = list.search_for_closest_valid_connection(query, 25.0, &ws, &DefaultConnectionValidator);
        assert_eq!(found, Some(ids[0]));
    }

    #[test]
    fn test_neighbors_uses_true_distance() {
        let (mut ws, ids) = next_connections(&[(0.0, 100.0), (100.0, 100.0), (0.0, 200.0)]);
        let query = previous_at(&mut ws, 5.0, 110.0);
        let mut list = YSortedList::new();
        for id in &ids {
            list.add_connection(*id, &ws);
        }
        let query = ws.connection(query).unwrap();
        assert_eq!(list.neighbors(query, 25.0, &ws), vec![ids[0]]);
    }

    #[test]
    fn test_transfer_merges_sorted() {
        let (ws, ids) = next_connections(&[(0.0, 10.0), (0.0, 40.0), (0.0, 20.0), (0.0, 30.0), (0.0, 20.0)]);
        let mut a = YSortedList::new();
        let mut b = YSortedList::new();
        a.add_connection(ids[0], &ws);
        a.add_connection(ids[1], &ws);
        b.add_connection(ids[2], &ws);
        b.add_connection(ids[3], &ws);
        a.add_connection(ids[4], &ws);

        a.transfer_connections(&mut b, &ws);
        assert!(a.is_empty());
        assert_eq!(b.len(), 5);
        assert!(b.is_sorted(&ws));
        // Existing entry wins the y=20 tie.
        assert_eq!(b.as_slice(), &[ids[0], ids[2], ids[4], ids[3], ids[1]]);
    }

    #[test]
    fn test_sortedness_survives_mixed_operations() {
        // Deterministic pseudo-random y values.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut points = Vec::new();
        for _ in 0..64 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            points.push(((seed % 300) as f64, (seed % 50) as f64));
        }
        let (ws, ids) = next_connections(&points);
        let mut list = YSortedList::new();
        for (i, id) in ids.iter().enumerate() {
            list.add_connection(*id, &ws);
            if i % 3 == 2 {
                list.remove_connection(ids[i / 2], &ws);
            }
            assert!(list.is_sorted(&ws));
        }
    }
}
