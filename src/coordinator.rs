//! Per-workspace context: the block arena, its connection index, the event
//! queue and the layout config, kept in step with each other.
//!
//! [`WorkspaceLayoutCoordinator`] is the only place connection topology
//! changes (`connect`, `disconnect`, `connect_shadow`, `disconnect_shadow`)
//! and the only place blocks move, so every position write goes through the
//! connection index's two-phase update.

use crate::config::LayoutConfig;
use crate::connection_manager::{
    BestConnection, ConnectionManager, ConnectionPositionDelegate, ConnectionValidator, GroupId,
    MAIN_GROUP,
};
use crate::error::{Result, WorkspaceError};
use crate::events::{BlocklyEvent, EventManager, MoveEvent};
use crate::model::{
    BlockBuilder, BlockId, CheckResult, ConnectionId, ConnectionType, InputKind, InputSpec, Workspace,
};
use crate::units::{EdgeInsets, WorkspacePoint, WorkspaceRect};

#[derive(Debug)]
pub struct WorkspaceLayoutCoordinator {
    workspace: Workspace,
    connection_manager: ConnectionManager,
    event_manager: EventManager,
    config: LayoutConfig,
    canvas_insets: EdgeInsets,
    canvas_bounds: Option<WorkspaceRect>,
    next_z_index: u32,
}

impl Default for WorkspaceLayoutCoordinator {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl WorkspaceLayoutCoordinator {
    pub fn new(config: LayoutConfig) -> Self {
        Self::with_connection_manager(config, ConnectionManager::new())
    }

    pub fn with_validator(config: LayoutConfig, validator: Box<dyn ConnectionValidator>) -> Self {
        Self::with_connection_manager(config, ConnectionManager::with_validator(validator))
    }

    fn with_connection_manager(config: LayoutConfig, connection_manager: ConnectionManager) -> Self {
        Self {
            workspace: Workspace::new(),
            connection_manager,
            event_manager: EventManager::new(),
            config,
            canvas_insets: EdgeInsets::default(),
            canvas_bounds: None,
            next_z_index: 0,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn connection_manager(&self) -> &ConnectionManager {
        &self.connection_manager
    }

    pub fn event_manager(&self) -> &EventManager {
        &self.event_manager
    }

    pub fn event_manager_mut(&mut self) -> &mut EventManager {
        &mut self.event_manager
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    // ── Block lifecycle ────────────────────────────────────────────────────

    /// Create a block at `position` and track its connections in the main
    /// group.
    pub fn add_block(&mut self, builder: &BlockBuilder, position: WorkspacePoint) -> Result<BlockId> {
        let id = self.workspace.create_block(builder, position)?;
        let connections = self
            .workspace
            .block(id)
            .map(|b| b.direct_connections())
            .unwrap_or_default();
        for conn in connections {
            self.connection_manager
                .track_connection(conn, Some(MAIN_GROUP), &self.workspace)?;
        }
        self.next_z_index += 1;
        if let Some(b) = self.workspace.block_mut(id) {
            b.z_index = self.next_z_index;
        }
        self.event_manager
            .add_pending_event(BlocklyEvent::Create { block: id });
        tracing::debug!(block = %id, block_type = builder.block_type(), "added block");
        Ok(id)
    }

    /// Detach `block` from its parent and delete it with everything nested
    /// under it. Returns the deleted blocks.
    pub fn remove_block_tree(&mut self, block: BlockId) -> Result<Vec<BlockId>> {
        let b = self.workspace.block(block).ok_or(WorkspaceError::UnknownBlock(block))?;
        if let Some(conn) = b.superior_facing_connection() {
            self.disconnect(conn)?;
        }
        let tree = self.workspace.all_blocks_in_tree(block);
        for id in &tree {
            self.workspace.orphan_block(*id);
        }
        self.sweep_orphaned_connections();
        self.event_manager.add_pending_event(BlocklyEvent::Delete {
            blocks: tree.clone(),
        });
        tracing::debug!(block = %block, removed = tree.len(), "removed block tree");
        self.update_canvas_bounds();
        Ok(tree)
    }

    /// Insert an input at `index` on `block`. Its connection joins the group
    /// the block's other connections are in.
    pub fn insert_input(&mut self, block: BlockId, index: usize, spec: &InputSpec) -> Result<Option<ConnectionId>> {
        let group = self
            .workspace
            .block(block)
            .ok_or(WorkspaceError::UnknownBlock(block))?
            .direct_connections()
            .into_iter()
            .find_map(|c| self.connection_manager.group_for_connection(c))
            .unwrap_or(MAIN_GROUP);
        let conn = self.workspace.insert_input(block, index, spec)?;
        if let Some(conn) = conn {
            self.connection_manager
                .track_connection(conn, Some(group), &self.workspace)?;
        }
        Ok(conn)
    }

    /// Remove the named input. A block plugged into it stays where it is,
    /// now unattached.
    pub fn remove_input(&mut self, block: BlockId, name: &str) -> Result<()> {
        let input_connection = self
            .workspace
            .block(block)
            .ok_or(WorkspaceError::UnknownBlock(block))?
            .input(name)
            .ok_or_else(|| WorkspaceError::UnknownInput {
                block,
                name: name.to_string(),
            })?
            .connection;
        if let Some(conn) = input_connection {
            self.disconnect(conn)?;
            self.disconnect_shadow(conn)?;
        }
        self.workspace.remove_input(block, name)?;
        self.sweep_orphaned_connections();
        Ok(())
    }

    fn sweep_orphaned_connections(&mut self) {
        self.connection_manager
            .untrack_orphaned_connections(&self.workspace);
        let purged = self.workspace.purge_orphaned_connections();
        let dangling: Vec<ConnectionId> = self
            .workspace
            .connections()
            .filter(|c| {
                c.shadow_connection.is_some_and(|s| purged.contains(&s))
                    || c.target_connection.is_some_and(|t| purged.contains(&t))
            })
            .map(|c| c.id)
            .collect();
        for id in dangling {
            if let Some(c) = self.workspace.connection_mut(id) {
                c.shadow_connection = c.shadow_connection.filter(|s| !purged.contains(s));
                c.target_connection = c.target_connection.filter(|t| !purged.contains(t));
            }
        }
    }

    // ── Topology ───────────────────────────────────────────────────────────

    /// Join two connections of opposite type.
    ///
    /// The inferior block (the one plugging in) is moved so both connection
    /// points coincide. A block already occupying the superior connection is
    /// re-attached to the end of the inserted stack, or to the first free
    /// compatible value input of the inserted block; if it has nowhere to go
    /// it is left unattached and returned.
    pub fn connect(&mut self, a: ConnectionId, b: ConnectionId) -> Result<Option<BlockId>> {
        let conn_a = self.workspace.connection(a).ok_or(WorkspaceError::UnknownConnection(a))?;
        let conn_b = self.workspace.connection(b).ok_or(WorkspaceError::UnknownConnection(b))?;
        let block_a = conn_a.source_block.ok_or(WorkspaceError::OrphanedConnection(a))?;
        let block_b = conn_b.source_block.ok_or(WorkspaceError::OrphanedConnection(b))?;
        if conn_a.target_connection == Some(b) {
            return Ok(None);
        }
        let reason = self
            .workspace
            .check_connection(conn_a, conn_b)
            .without(CheckResult::MUST_DISCONNECT);
        if !reason.is_can_connect() {
            return Err(WorkspaceError::IllegalConnection {
                moving: a,
                target: b,
                reason,
            });
        }

        let ((superior, superior_block), (inferior, inferior_block)) =
            if conn_a.connection_type.is_superior() {
                ((a, block_a), (b, block_b))
            } else {
                ((b, block_b), (a, block_a))
            };
        if self
            .workspace
            .all_blocks_in_tree(inferior_block)
            .contains(&superior_block)
        {
            return Err(WorkspaceError::IllegalConnection {
                moving: a,
                target: b,
                reason: CheckResult::SELF_CONNECTION,
            });
        }

        self.disconnect(inferior)?;
        let occupant = self.workspace.target_block(superior);
        self.disconnect(superior)?;

        if let Some(c) = self.workspace.connection_mut(superior) {
            c.target_connection = Some(inferior);
        }
        if let Some(c) = self.workspace.connection_mut(inferior) {
            c.target_connection = Some(superior);
        }

        let delta = self.connection_position(superior)? - self.connection_position(inferior)?;
        self.translate_block_tree(inferior_block, delta)?;
        tracing::debug!(superior = %superior, inferior = %inferior, "connected");

        match occupant {
            Some(occupant) => self.rehome_block(occupant, inferior_block),
            None => Ok(None),
        }
    }

    /// Reattach a block displaced by `connect` below or inside the block
    /// that displaced it. Returns the block when no slot accepts it.
    fn rehome_block(&mut self, orphan: BlockId, inserted: BlockId) -> Result<Option<BlockId>> {
        let Some(orphan_connection) = self
            .workspace
            .block(orphan)
            .and_then(|b| b.superior_facing_connection())
        else {
            return Ok(Some(orphan));
        };
        let Some(orphan_conn) = self.workspace.connection(orphan_connection) else {
            return Ok(Some(orphan));
        };

        let slot = match orphan_conn.connection_type {
            ConnectionType::PreviousStatement => {
                let last = self.workspace.last_block_in_chain(inserted);
                self.workspace
                    .block(last)
                    .and_then(|b| b.next_connection)
                    .filter(|next| self.accepts(*next, orphan_connection))
            }
            ConnectionType::OutputValue => self.workspace.block(inserted).and_then(|b| {
                b.inputs
                    .iter()
                    .filter(|input| input.kind == InputKind::Value)
                    .filter_map(|input| input.connection)
                    .find(|conn| self.accepts(*conn, orphan_connection))
            }),
            _ => None,
        };

        match slot {
            Some(slot) => {
                tracing::debug!(block = %orphan, slot = %slot, "re-attached displaced block");
                self.connect(slot, orphan_connection)?;
                Ok(None)
            }
            None => Ok(Some(orphan)),
        }
    }

    fn accepts(&self, slot: ConnectionId, plug: ConnectionId) -> bool {
        match (self.workspace.connection(slot), self.workspace.connection(plug)) {
            (Some(slot), Some(plug)) => {
                !slot.connected() && self.workspace.check_connection(plug, slot).is_can_connect()
            }
            _ => false,
        }
    }

    /// Break the link on `connection`, leaving both blocks where they are.
    /// Disconnecting an unconnected connection does nothing.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Result<()> {
        let target = self
            .workspace
            .connection(connection)
            .ok_or(WorkspaceError::UnknownConnection(connection))?
            .target_connection;
        let Some(target) = target else {
            return Ok(());
        };
        if let Some(c) = self.workspace.connection_mut(connection) {
            c.target_connection = None;
        }
        if let Some(c) = self.workspace.connection_mut(target) {
            c.target_connection = None;
        }
        tracing::debug!(connection = %connection, target = %target, "disconnected");
        Ok(())
    }

    /// Attach a shadow block's connection as the placeholder of
    /// `connection`. The shadow is moved into place.
    pub fn connect_shadow(&mut self, connection: ConnectionId, shadow: ConnectionId) -> Result<()> {
        let conn = self
            .workspace
            .connection(connection)
            .ok_or(WorkspaceError::UnknownConnection(connection))?;
        let shadow_conn = self
            .workspace
            .connection(shadow)
            .ok_or(WorkspaceError::UnknownConnection(shadow))?;
        let shadow_block = shadow_conn
            .source_block
            .ok_or(WorkspaceError::OrphanedConnection(shadow))?;
        let mut reason = self
            .workspace
            .check_connection(shadow_conn, conn)
            .without(CheckResult::MUST_DISCONNECT | CheckResult::CANNOT_SET_SHADOW_FOR_TARGET);
        if !self.workspace.block(shadow_block).is_some_and(|b| b.shadow) {
            reason |= CheckResult::CANNOT_SET_SHADOW_FOR_TARGET;
        }
        if !reason.is_can_connect() {
            return Err(WorkspaceError::IllegalConnection {
                moving: shadow,
                target: connection,
                reason,
            });
        }

        self.disconnect_shadow(connection)?;
        if let Some(c) = self.workspace.connection_mut(connection) {
            c.shadow_connection = Some(shadow);
        }
        if let Some(c) = self.workspace.connection_mut(shadow) {
            c.shadow_connection = Some(connection);
        }
        let delta = self.connection_position(connection)? - self.connection_position(shadow)?;
        self.translate_block_tree(shadow_block, delta)
    }

    pub fn disconnect_shadow(&mut self, connection: ConnectionId) -> Result<()> {
        let shadow = self
            .workspace
            .connection(connection)
            .ok_or(WorkspaceError::UnknownConnection(connection))?
            .shadow_connection;
        let Some(shadow) = shadow else {
            return Ok(());
        };
        if let Some(c) = self.workspace.connection_mut(connection) {
            c.shadow_connection = None;
        }
        if let Some(c) = self.workspace.connection_mut(shadow) {
            c.shadow_connection = None;
        }
        Ok(())
    }

    // ── Geometry ───────────────────────────────────────────────────────────

    fn connection_position(&self, id: ConnectionId) -> Result<WorkspacePoint> {
        self.workspace
            .connection(id)
            .map(|c| c.position)
            .ok_or(WorkspaceError::UnknownConnection(id))
    }

    /// Top-left corner of the root of `block`'s group.
    pub fn block_group_position(&self, block: BlockId) -> Option<WorkspacePoint> {
        let root = self.workspace.root_block(block);
        self.workspace.block(root).map(|b| b.position)
    }

    /// Move the root group of `block` so its top-left corner is at
    /// `position`. Queues a move event while events are enabled.
    pub fn move_block_group(&mut self, block: BlockId, position: WorkspacePoint) -> Result<()> {
        let root = self.workspace.root_block(block);
        let current = self
            .workspace
            .block(root)
            .ok_or(WorkspaceError::UnknownBlock(block))?
            .position;
        let event = self
            .event_manager
            .is_enabled()
            .then(|| MoveEvent::new(root, &self.workspace));
        self.translate_block_tree(root, position - current)?;
        if let Some(mut event) = event {
            event.record_new_values(&self.workspace);
            self.event_manager.add_pending_event(BlocklyEvent::Move(event));
        }
        Ok(())
    }

    /// Offset `block` and every block nested under it by `delta`.
    pub fn translate_block_tree(&mut self, block: BlockId, delta: WorkspacePoint) -> Result<()> {
        let tree = self.workspace.all_blocks_in_tree(block);
        if tree.is_empty() {
            return Err(WorkspaceError::UnknownBlock(block));
        }
        for id in tree {
            let Some(b) = self.workspace.block_mut(id) else {
                continue;
            };
            b.position += delta;
            let position = b.position;
            for conn in b.direct_connections() {
                self.connection_manager
                    .will_change_position(conn, &self.workspace);
                if let Some(c) = self.workspace.connection_mut(conn) {
                    c.position = position + c.offset;
                }
                self.connection_manager
                    .did_change_position(conn, &self.workspace);
            }
        }
        Ok(())
    }

    /// Raise the root group of `block` above every other block.
    pub fn bring_to_front(&mut self, block: BlockId) {
        let root = self.workspace.root_block(block);
        self.next_z_index += 1;
        let z = self.next_z_index;
        for id in self.workspace.all_blocks_in_tree(root) {
            if let Some(b) = self.workspace.block_mut(id) {
                b.z_index = z;
            }
        }
    }

    pub fn canvas_bounds(&self) -> Option<WorkspaceRect> {
        self.canvas_bounds
    }

    pub fn set_canvas_insets(&mut self, insets: EdgeInsets) {
        self.canvas_insets = insets;
    }

    /// Recompute the canvas from the bounds of all visible blocks.
    pub fn update_canvas_bounds(&mut self) -> Option<WorkspaceRect> {
        self.canvas_bounds = self
            .workspace
            .bounds()
            .map(|r| r.outset(self.canvas_insets));
        self.canvas_bounds
    }

    // ── Drag support ───────────────────────────────────────────────────────

    pub fn is_block_dragging(&self, block: BlockId) -> bool {
        let root = self.workspace.root_block(block);
        self.workspace.block(root).is_some_and(|b| b.dragging)
    }

    pub fn set_block_dragging(&mut self, block: BlockId, dragging: bool) -> Result<()> {
        let root = self.workspace.root_block(block);
        let b = self
            .workspace
            .block_mut(root)
            .ok_or(WorkspaceError::UnknownBlock(block))?;
        b.dragging = dragging;
        Ok(())
    }

    /// Register `source` as wanting `connection` highlighted.
    pub fn add_highlight(&mut self, connection: ConnectionId, source: BlockId) -> Result<()> {
        let owner = self
            .workspace
            .connection(connection)
            .ok_or(WorkspaceError::UnknownConnection(connection))?
            .source_block
            .ok_or(WorkspaceError::OrphanedConnection(connection))?;
        let b = self
            .workspace
            .block_mut(owner)
            .ok_or(WorkspaceError::UnknownBlock(owner))?;
        b.highlights.entry(connection).or_default().insert(source);
        Ok(())
    }

    /// Drop the registration of `source`; unknown registrations are ignored.
    pub fn remove_highlight(&mut self, connection: ConnectionId, source: BlockId) {
        let Some(owner) = self
            .workspace
            .connection(connection)
            .and_then(|c| c.source_block)
        else {
            return;
        };
        if let Some(b) = self.workspace.block_mut(owner) {
            if let Some(sources) = b.highlights.get_mut(&connection) {
                sources.remove(&source);
                if sources.is_empty() {
                    b.highlights.remove(&connection);
                }
            }
        }
    }

    pub fn start_group(&mut self, owner: BlockId) -> GroupId {
        self.connection_manager
            .start_group(Some(owner), &self.workspace)
    }

    pub fn merge_group(&mut self, from: GroupId, into: Option<GroupId>) -> Result<()> {
        self.connection_manager
            .merge_group(from, into, &self.workspace)
    }

    pub fn set_drag_mode(&mut self, group: GroupId, drag_mode: bool) -> Result<()> {
        self.connection_manager.set_drag_mode(group, drag_mode)
    }

    pub fn find_best_connection(&self, group: GroupId, max_radius: f64) -> Option<BestConnection> {
        self.connection_manager
            .find_best_connection(group, max_radius, &self.workspace)
    }

    pub fn stationary_neighbors(&self, connection: ConnectionId, max_radius: f64) -> Vec<ConnectionId> {
        self.connection_manager
            .stationary_neighbors(connection, max_radius, &self.workspace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConnectionSpec;

    fn statement() -> BlockBuilder {
        BlockBuilder::new("stmt")
            .previous(ConnectionSpec::at(0.0, 0.0))
            .next(ConnectionSpec::at(0.0, 40.0))
    }

    fn value() -> BlockBuilder {
        BlockBuilder::new("value").output(ConnectionSpec::at(0.0, 0.0))
    }

    fn holder() -> BlockBuilder {
        BlockBuilder::new("holder")
            .previous(ConnectionSpec::at(0.0, 0.0))
            .input(InputSpec::value("A", ConnectionSpec::at(100.0, 10.0)))
            .input(InputSpec::value("B", ConnectionSpec::at(100.0, 30.0)))
    }

    fn next_of(coord: &WorkspaceLayoutCoordinator, block: BlockId) -> ConnectionId {
        coord.workspace().block(block).unwrap().next_connection.unwrap()
    }

    fn prev_of(coord: &WorkspaceLayoutCoordinator, block: BlockId) -> ConnectionId {
        coord.workspace().block(block).unwrap().previous_connection.unwrap()
    }

    #[test]
    fn test_connect_aligns_inferior_tree() {
        let mut coord = WorkspaceLayoutCoordinator::default();
        let a = coord.add_block(&statement(), WorkspacePoint::new(10.0, 10.0)).unwrap();
        let b = coord.add_block(&statement(), WorkspacePoint::new(200.0, 300.0)).unwrap();
        let c = coord.add_block(&statement(), WorkspacePoint::new(400.0, 400.0)).unwrap();
        coord.connect(next_of(&coord, b), prev_of(&coord, c)).unwrap();

        assert_eq!(coord.connect(next_of(&coord, a), prev_of(&coord, b)).unwrap(), None);
        let ws = coord.workspace();
        assert_eq!(ws.block(b).unwrap().position, WorkspacePoint::new(10.0, 50.0));
        assert_eq!(ws.block(c).unwrap().position, WorkspacePoint::new(10.0, 90.0));
        assert_eq!(ws.root_block(c), a);
        assert!(coord.connection_manager().main_group().is_sorted(ws));
    }

    #[test]
    fn test_connect_reattaches_displaced_statement() {
        let mut coord = WorkspaceLayoutCoordinator::default();
        let a = coord.add_block(&statement(), WorkspacePoint::ZERO).unwrap();
        let old = coord.add_block(&statement(), WorkspacePoint::new(0.0, 200.0)).unwrap();
        let inserted = coord.add_block(&statement(), WorkspacePoint::new(300.0, 0.0)).unwrap();
        coord.connect(next_of(&coord, a), prev_of(&coord, old)).unwrap();

        let displaced = coord.connect(prev_of(&coord, inserted), next_of(&coord, a)).unwrap();
        assert_eq!(displaced, None);
        let ws = coord.workspace();
        assert_eq!(ws.parent_block(inserted), Some(a));
        assert_eq!(ws.parent_block(old), Some(inserted));
        assert_eq!(ws.block(old).unwrap().position, WorkspacePoint::new(0.0, 80.0));
    }

    #[test]
    fn test_connect_returns_homeless_value() {
        let mut coord = WorkspaceLayoutCoordinator::default();
        let h = coord.add_block(&holder(), WorkspacePoint::ZERO).unwrap();
        let v1 = coord.add_block(&value(), WorkspacePoint::new(300.0, 0.0)).unwrap();
        let v2 = coord.add_block(&value(), WorkspacePoint::new(300.0, 100.0)).unwrap();
        let slot = coord.workspace().block(h).unwrap().input("A").unwrap().connection.unwrap();
        let out = |coord: &WorkspaceLayoutCoordinator, b| coord.workspace().block(b).unwrap().output_connection.unwrap();

        coord.connect(slot, out(&coord, v1)).unwrap();
        let displaced = coord.connect(out(&coord, v2), slot).unwrap();
        assert_eq!(displaced, Some(v1));
        assert_eq!(coord.workspace().parent_block(v1), None);
        assert_eq!(coord.workspace().parent_block(v2), Some(h));
    }

    #[test]
    fn test_connect_rejects_cycles_and_wrong_types() {
        let mut coord = WorkspaceLayoutCoordinator::default();
        let a = coord.add_block(&statement(), WorkspacePoint::ZERO).unwrap();
        let b = coord.add_block(&statement(), WorkspacePoint::new(0.0, 100.0)).unwrap();
        coord.connect(next_of(&coord, a), prev_of(&coord, b)).unwrap();

        let err = coord.connect(next_of(&coord, b), prev_of(&coord, a)).unwrap_err();
        assert!(matches!(err, WorkspaceError::IllegalConnection { .. }));
        let err = coord.connect(next_of(&coord, a), next_of(&coord, b)).unwrap_err();
        assert!(matches!(
            err,
            WorkspaceError::IllegalConnection { reason, .. } if reason.contains(CheckResult::WRONG_TYPE)
        ));
        assert_eq!(coord.workspace().parent_block(a), None);
    }

    #[test]
    fn test_move_block_group_queues_event_when_enabled() {
        let mut coord = WorkspaceLayoutCoordinator::default();
        let a = coord.add_block(&statement(), WorkspacePoint::ZERO).unwrap();
        coord.event_manager_mut().take_pending();

        coord.event_manager_mut().set_enabled(false);
        coord.move_block_group(a, WorkspacePoint::new(5.0, 5.0)).unwrap();
        assert!(coord.event_manager().pending_events().is_empty());

        coord.event_manager_mut().set_enabled(true);
        coord.move_block_group(a, WorkspacePoint::new(50.0, 60.0)).unwrap();
        let events = coord.event_manager_mut().take_pending();
        assert_eq!(events.len(), 1);
        let BlocklyEvent::Move(event) = &events[0] else {
            panic!("expected a move event");
        };
        assert_eq!(event.old.position, Some(WorkspacePoint::new(5.0, 5.0)));
        assert_eq!(event.new.as_ref().unwrap().position, Some(WorkspacePoint::new(50.0, 60.0)));
        let next = coord.workspace().connection(next_of(&coord, a)).unwrap();
        assert_eq!(next.position, WorkspacePoint::new(50.0, 100.0));
    }

    #[test]
    fn test_remove_block_tree_untracks_connections() {
        let mut coord = WorkspaceLayoutCoordinator::default();
        let a = coord.add_block(&statement(), WorkspacePoint::ZERO).unwrap();
        let b = coord.add_block(&statement(), WorkspacePoint::new(0.0, 100.0)).unwrap();
        let c = coord.add_block(&statement(), WorkspacePoint::new(0.0, 200.0)).unwrap();
        coord.connect(next_of(&coord, a), prev_of(&coord, b)).unwrap();
        coord.connect(next_of(&coord, b), prev_of(&coord, c)).unwrap();

        let removed = coord.remove_block_tree(b).unwrap();
        assert_eq!(removed, vec![b, c]);
        assert_eq!(coord.workspace().block_count(), 1);
        assert_eq!(coord.workspace().connection_count(), 2);
        assert_eq!(coord.connection_manager().tracked_connection_count(), 2);
        assert!(!coord.workspace().connection(next_of(&coord, a)).unwrap().connected());
    }

    #[test]
    fn test_remove_input_releases_child() {
        let mut coord = WorkspaceLayoutCoordinator::default();
        let h = coord.add_block(&holder(), WorkspacePoint::ZERO).unwrap();
        let v = coord.add_block(&value(), WorkspacePoint::new(300.0, 0.0)).unwrap();
        let slot = coord.workspace().block(h).unwrap().input("A").unwrap().connection.unwrap();
        let out = coord.workspace().block(v).unwrap().output_connection.unwrap();
        coord.connect(slot, out).unwrap();

        coord.remove_input(h, "A").unwrap();
        assert!(coord.workspace().connection(slot).is_none());
        assert_eq!(coord.workspace().parent_block(v), None);
        assert_eq!(coord.connection_manager().group_for_connection(slot), None);
        assert!(matches!(
            coord.remove_input(h, "A"),
            Err(WorkspaceError::UnknownInput { .. })
        ));
    }

    #[test]
    fn test_connect_shadow_requires_shadow_block() {
        let mut coord = WorkspaceLayoutCoordinator::default();
        let h = coord.add_block(&holder(), WorkspacePoint::ZERO).unwrap();
        let shadow = coord.add_block(&value().shadow(true), WorkspacePoint::new(300.0, 0.0)).unwrap();
        let real = coord.add_block(&value(), WorkspacePoint::new(300.0, 100.0)).unwrap();
        let slot = coord.workspace().block(h).unwrap().input("B").unwrap().connection.unwrap();
        let shadow_out = coord.workspace().block(shadow).unwrap().output_connection.unwrap();
        let real_out = coord.workspace().block(real).unwrap().output_connection.unwrap();

        assert!(coord.connect_shadow(slot, real_out).is_err());
        coord.connect_shadow(slot, shadow_out).unwrap();
        let ws = coord.workspace();
        assert_eq!(ws.connection(slot).unwrap().shadow_connection, Some(shadow_out));
        assert_eq!(ws.block(shadow).unwrap().position, WorkspacePoint::new(100.0, 30.0));

        coord.disconnect_shadow(slot).unwrap();
        assert!(!coord.workspace().connection(slot).unwrap().shadow_connected());
    }

    #[test]
    fn test_highlights_are_keyed_by_source() {
        let mut coord = WorkspaceLayoutCoordinator::default();
        let a = coord.add_block(&statement(), WorkspacePoint::ZERO).unwrap();
        let next = next_of(&coord, a);
        coord.add_highlight(next, BlockId(7)).unwrap();
        coord.add_highlight(next, BlockId(8)).unwrap();
        coord.remove_highlight(next, BlockId(7));
        assert!(coord.workspace().block(a).unwrap().is_connection_highlighted(next));
        coord.remove_highlight(next, BlockId(8));
        assert!(!coord.workspace().block(a).unwrap().is_connection_highlighted(next));
    }

    #[test]
    fn test_canvas_bounds_include_insets() {
        let mut coord = WorkspaceLayoutCoordinator::default();
        assert_eq!(coord.update_canvas_bounds(), None);
        coord.add_block(&statement(), WorkspacePoint::new(10.0, 20.0)).unwrap();
        coord.add_block(&value(), WorkspacePoint::new(200.0, 100.0)).unwrap();
        coord.set_canvas_insets(EdgeInsets::new(5.0, 10.0, 15.0, 20.0));

        let bounds = coord.update_canvas_bounds().unwrap();
        assert_eq!(bounds.min, WorkspacePoint::new(0.0, 15.0));
        assert_eq!(bounds.max, WorkspacePoint::new(320.0, 155.0));
        assert_eq!(coord.canvas_bounds(), Some(bounds));
    }

    #[test]
    fn test_bring_to_front_raises_whole_tree() {
        let mut coord = WorkspaceLayoutCoordinator::default();
        let a = coord.add_block(&statement(), WorkspacePoint::ZERO).unwrap();
        let b = coord.add_block(&statement(), WorkspacePoint::new(0.0, 100.0)).unwrap();
        let c = coord.add_block(&statement(), WorkspacePoint::new(200.0, 0.0)).unwrap();
        coord.connect(next_of(&coord, a), prev_of(&coord, b)).unwrap();
        coord.bring_to_front(b);
        let ws = coord.workspace();
        assert_eq!(ws.block(a).unwrap().z_index, ws.block(b).unwrap().z_index);
        assert!(ws.block(a).unwrap().z_index > ws.block(c).unwrap().z_index);
    }
}
