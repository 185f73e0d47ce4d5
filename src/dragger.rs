//! Drag gesture state machine.
//!
//! A drag goes `start -> continue* -> finish | cancel`. While it is active
//! the dragged subtree lives in its own connection group, so searches from
//! the dragged block never find its own connections. Several drags may be
//! active at once, one per block.

use indexmap::IndexMap;

use crate::bumper::BlockBumper;
use crate::config::{BLOCK_SNAP_DISTANCE, LayoutConfig};
use crate::connection_manager::{BestConnection, GroupId, MAIN_GROUP};
use crate::coordinator::WorkspaceLayoutCoordinator;
use crate::error::{Result, WorkspaceError};
use crate::events::{BlocklyEvent, MoveEvent};
use crate::model::{BlockId, ConnectionId};
use crate::units::WorkspacePoint;

/// Bookkeeping for one active drag.
#[derive(Debug, Clone)]
pub struct DragGestureData {
    pub block: BlockId,
    pub group: GroupId,
    pub start_block_position: WorkspacePoint,
    pub start_touch_position: WorkspacePoint,
    pub move_event: MoveEvent,
    /// Stationary connection currently highlighted for this drag.
    pub highlighted: Option<ConnectionId>,
}

#[derive(Debug, Clone)]
pub struct Dragger {
    snap_distance: f64,
    bumper: BlockBumper,
    drags: IndexMap<BlockId, DragGestureData>,
}

impl Dragger {
    pub fn new(config: &LayoutConfig) -> Self {
        Self {
            snap_distance: config.workspace_unit(BLOCK_SNAP_DISTANCE),
            bumper: BlockBumper::from_config(config),
            drags: IndexMap::new(),
        }
    }

    pub fn snap_distance(&self) -> f64 {
        self.snap_distance
    }

    pub fn is_dragging(&self, block: BlockId) -> bool {
        self.drags.contains_key(&block)
    }

    pub fn drag_data(&self, block: BlockId) -> Option<&DragGestureData> {
        self.drags.get(&block)
    }

    pub fn active_drags(&self) -> impl Iterator<Item = &DragGestureData> {
        self.drags.values()
    }

    /// Begin dragging `block` from `touch`.
    ///
    /// Returns `false` without changing anything when the block cannot be
    /// dragged: not draggable, hidden, or already being dragged.
    pub fn start_dragging_block(
        &mut self,
        coordinator: &mut WorkspaceLayoutCoordinator,
        block: BlockId,
        touch: WorkspacePoint,
    ) -> Result<bool> {
        let b = coordinator
            .workspace()
            .block(block)
            .ok_or(WorkspaceError::UnknownBlock(block))?;
        if !b.draggable || !b.visible || b.dragging || self.drags.contains_key(&block) {
            tracing::debug!(block = %block, "block cannot be dragged");
            return Ok(false);
        }
        let facing = b.superior_facing_connection();

        let move_event = MoveEvent::new(block, coordinator.workspace());
        if let Some(conn) = facing {
            coordinator.disconnect(conn)?;
        }
        coordinator.set_block_dragging(block, true)?;
        coordinator.bring_to_front(block);
        let group = coordinator.start_group(block);
        let start_block_position = coordinator
            .block_group_position(block)
            .ok_or(WorkspaceError::UnknownBlock(block))?;

        self.drags.insert(
            block,
            DragGestureData {
                block,
                group,
                start_block_position,
                start_touch_position: touch,
                move_event,
                highlighted: None,
            },
        );
        tracing::debug!(block = %block, group = %group, "drag started");
        Ok(true)
    }

    /// Move the dragged block by the distance the touch has travelled since
    /// the drag started, then refresh its highlighted connection.
    pub fn continue_dragging_block(
        &mut self,
        coordinator: &mut WorkspaceLayoutCoordinator,
        block: BlockId,
        touch: WorkspacePoint,
    ) -> Result<()> {
        let data = self
            .drags
            .get(&block)
            .ok_or(WorkspaceError::BlockNotDragging(block))?;
        let position = data.start_block_position + (touch - data.start_touch_position);
        coordinator.set_drag_mode(data.group, true)?;

        let events_enabled = coordinator.event_manager().is_enabled();
        coordinator.event_manager_mut().set_enabled(false);
        let moved = coordinator.move_block_group(block, position);
        coordinator.event_manager_mut().set_enabled(events_enabled);
        moved?;

        tracing::trace!(block = %block, x = position.x, y = position.y, "drag moved");
        self.update_highlighted_connection(coordinator, block)
    }

    /// End the drag and connect to the best connection in snap range, if
    /// any. Returns the connection that was made.
    ///
    /// The drag group is always merged back, even when connecting fails; the
    /// connect error is returned afterwards.
    pub fn finish_dragging_block(
        &mut self,
        coordinator: &mut WorkspaceLayoutCoordinator,
        block: BlockId,
    ) -> Result<Option<BestConnection>> {
        let data = self.end_drag(coordinator, block)?;

        let best = coordinator.find_best_connection(data.group, self.snap_distance);
        let outcome = match best {
            Some(best) => match coordinator.connect(best.moving, best.target) {
                Ok(displaced) => {
                    let peer = coordinator
                        .connection_manager()
                        .group_for_connection(best.target)
                        .unwrap_or(MAIN_GROUP);
                    coordinator.merge_group(data.group, Some(peer))?;
                    Ok((Some(best), displaced))
                }
                Err(err) => {
                    tracing::warn!(block = %block, "connect on drop failed: {}", err);
                    coordinator.merge_group(data.group, Some(MAIN_GROUP))?;
                    coordinator.update_canvas_bounds();
                    Err(err)
                }
            },
            None => {
                coordinator.merge_group(data.group, Some(MAIN_GROUP))?;
                coordinator.update_canvas_bounds();
                Ok((None, None))
            }
        };

        if let Ok((_, displaced)) = &outcome {
            if coordinator.workspace().block(block).is_some() {
                self.bumper.bump_neighbors(coordinator, block, false)?;
            }
            if let Some(displaced) = displaced {
                self.bumper.bump_neighbors(coordinator, *displaced, false)?;
            }
        }
        self.refresh_other_highlights(coordinator, block)?;
        tracing::debug!(block = %block, connected = ?best.map(|b| b.target), "drag finished");
        outcome.map(|(best, _)| best)
    }

    /// End the drag without connecting anything.
    pub fn cancel_dragging_block(
        &mut self,
        coordinator: &mut WorkspaceLayoutCoordinator,
        block: BlockId,
    ) -> Result<()> {
        let data = self.end_drag(coordinator, block)?;
        coordinator.merge_group(data.group, Some(MAIN_GROUP))?;
        coordinator.update_canvas_bounds();
        self.refresh_other_highlights(coordinator, block)?;
        tracing::debug!(block = %block, "drag cancelled");
        Ok(())
    }

    /// Finalize the move event, drop the highlight and thaw the drag group.
    ///
    /// The block may have been deleted mid-drag; then only the group is
    /// thawed so the caller can still merge it back.
    fn end_drag(&mut self, coordinator: &mut WorkspaceLayoutCoordinator, block: BlockId) -> Result<DragGestureData> {
        let mut data = self
            .drags
            .shift_remove(&block)
            .ok_or(WorkspaceError::BlockNotDragging(block))?;
        let still_exists = coordinator.workspace().block(block).is_some();
        if still_exists {
            data.move_event.record_new_values(coordinator.workspace());
            coordinator
                .event_manager_mut()
                .add_pending_event(BlocklyEvent::Move(data.move_event.clone()));
        } else {
            tracing::debug!(block = %block, "dragged block was removed during the drag");
        }
        if let Some(highlighted) = data.highlighted.take() {
            coordinator.remove_highlight(highlighted, block);
        }
        coordinator.set_drag_mode(data.group, false)?;
        if still_exists {
            coordinator.set_block_dragging(block, false)?;
        }
        Ok(data)
    }

    fn refresh_other_highlights(&mut self, coordinator: &mut WorkspaceLayoutCoordinator, finished: BlockId) -> Result<()> {
        let others: Vec<BlockId> = self.drags.keys().copied().filter(|b| *b != finished).collect();
        for other in others {
            self.update_highlighted_connection(coordinator, other)?;
        }
        Ok(())
    }

    /// Highlight the connection `block` would snap to if dropped now.
    pub fn update_highlighted_connection(
        &mut self,
        coordinator: &mut WorkspaceLayoutCoordinator,
        block: BlockId,
    ) -> Result<()> {
        let data = self
            .drags
            .get_mut(&block)
            .ok_or(WorkspaceError::BlockNotDragging(block))?;
        let target = coordinator
            .find_best_connection(data.group, self.snap_distance)
            .map(|best| best.target);
        if target == data.highlighted {
            return Ok(());
        }
        if let Some(old) = data.highlighted.take() {
            coordinator.remove_highlight(old, block);
        }
        if let Some(new) = target {
            coordinator.add_highlight(new, block)?;
            data.highlighted = Some(new);
        }
        Ok(())
    }
}
