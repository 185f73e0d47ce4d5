//! Workspace change events.
//!
//! Events are queued on an [`EventManager`] owned by the workspace context.
//! Firing is left to the embedder, which drains the queue with
//! [`EventManager::take_pending`].

use serde::Serialize;

use crate::model::{BlockId, Workspace};
use crate::units::WorkspacePoint;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlocklyEvent {
    Create { block: BlockId },
    Delete { blocks: Vec<BlockId> },
    Move(MoveEvent),
}

/// Where a block sits: parent and input name when attached, otherwise its
/// workspace position.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MoveLocation {
    pub parent: Option<BlockId>,
    pub input_name: Option<String>,
    pub position: Option<WorkspacePoint>,
}

impl MoveLocation {
    fn capture(block: BlockId, workspace: &Workspace) -> Self {
        let Some(b) = workspace.block(block) else {
            return Self::default();
        };
        let parent_connection = b
            .superior_facing_connection()
            .and_then(|id| workspace.connection(id))
            .and_then(|c| c.target_connection)
            .and_then(|id| workspace.connection(id));
        match parent_connection {
            Some(conn) => Self {
                parent: conn.source_block,
                input_name: conn.source_input.clone(),
                position: None,
            },
            None => Self {
                parent: None,
                input_name: None,
                position: Some(b.position),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveEvent {
    pub block: BlockId,
    pub old: MoveLocation,
    pub new: Option<MoveLocation>,
}

impl MoveEvent {
    /// Capture where `block` is right now.
    pub fn new(block: BlockId, workspace: &Workspace) -> Self {
        Self {
            block,
            old: MoveLocation::capture(block, workspace),
            new: None,
        }
    }

    pub fn record_new_values(&mut self, workspace: &Workspace) {
        self.new = Some(MoveLocation::capture(self.block, workspace));
    }

    /// False when the recorded move left the block where it started.
    pub fn is_meaningful(&self) -> bool {
        self.new.as_ref().is_none_or(|new| *new != self.old)
    }
}

#[derive(Debug, Clone)]
pub struct EventManager {
    enabled: bool,
    pending: Vec<BlocklyEvent>,
}

impl Default for EventManager {
    fn default() -> Self {
        Self {
            enabled: true,
            pending: Vec::new(),
        }
    }
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Queue `event`; dropped while events are disabled.
    pub fn add_pending_event(&mut self, event: BlocklyEvent) {
        if self.enabled {
            self.pending.push(event);
        }
    }

    pub fn pending_events(&self) -> &[BlocklyEvent] {
        &self.pending
    }

    pub fn take_pending(&mut self) -> Vec<BlocklyEvent> {
        std::mem::take(&mut self.pending)
    }
}
