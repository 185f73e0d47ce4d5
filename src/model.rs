//! Block and connection model.
//!
//! Blocks and connections live in a [`Workspace`] arena and refer to each
//! other by id. A connection never owns its block, and a block only lists
//! the ids of the connections it owns.

use crate::error::{Result, WorkspaceError};
use crate::units::{WorkspacePoint, WorkspaceRect, WorkspaceSize};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::ops::{BitOr, BitOrAssign};

// ────────────────────────────────────────────────────────────────────────────
// WorkspaceDoc – binary serialization wrapper
// ────────────────────────────────────────────────────────────────────────────

/// Leading bytes of a binary workspace snapshot.
pub const SNAPSHOT_MAGIC: &[u8; 11] = b"RUSTYBLOCKS";
/// Bumped whenever the serialized [`Workspace`] layout changes.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceDoc {
    pub workspace: Workspace,
}

impl WorkspaceDoc {
    /// Write the workspace behind [`SNAPSHOT_MAGIC`] and [`SNAPSHOT_VERSION`].
    pub fn save_to_binary<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(SNAPSHOT_MAGIC)?;
        writer.write_all(&SNAPSHOT_VERSION.to_le_bytes())?;
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())?;
        writer.flush()?;
        Ok(())
    }

    /// Read a snapshot, rejecting foreign files and other format versions.
    pub fn load_from_binary<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut magic = *SNAPSHOT_MAGIC;
        reader.read_exact(&mut magic)?;
        if &magic != SNAPSHOT_MAGIC {
            anyhow::bail!("Not a workspace snapshot: bad magic bytes");
        }
        let mut version = [0u8; 4];
        reader.read_exact(&mut version)?;
        let version = u32::from_le_bytes(version);
        if version != SNAPSHOT_VERSION {
            anyhow::bail!(
                "Unsupported snapshot version {} (expected {})",
                version,
                SNAPSHOT_VERSION
            );
        }
        Ok(bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())?)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Ids
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection#{}", self.0)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Connection types and check results
// ────────────────────────────────────────────────────────────────────────────

/// The four kinds of connection. A connection can only ever join its
/// structural opposite (previous ↔ next, input ↔ output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    /// Top notch of a statement block.
    PreviousStatement,
    /// Bottom notch of a statement block, or the slot of a statement input.
    NextStatement,
    /// Socket of a value input.
    InputValue,
    /// Plug on the left of a value block.
    OutputValue,
}

impl ConnectionType {
    pub const ALL: [ConnectionType; 4] = [
        ConnectionType::PreviousStatement,
        ConnectionType::NextStatement,
        ConnectionType::InputValue,
        ConnectionType::OutputValue,
    ];

    pub fn opposite(self) -> ConnectionType {
        match self {
            ConnectionType::PreviousStatement => ConnectionType::NextStatement,
            ConnectionType::NextStatement => ConnectionType::PreviousStatement,
            ConnectionType::InputValue => ConnectionType::OutputValue,
            ConnectionType::OutputValue => ConnectionType::InputValue,
        }
    }

    /// Stable index into per-type tables.
    pub fn index(self) -> usize {
        match self {
            ConnectionType::PreviousStatement => 0,
            ConnectionType::NextStatement => 1,
            ConnectionType::InputValue => 2,
            ConnectionType::OutputValue => 3,
        }
    }

    /// Superior connections are the ones other blocks plug into.
    pub fn is_superior(self) -> bool {
        matches!(
            self,
            ConnectionType::NextStatement | ConnectionType::InputValue
        )
    }
}

/// Flag set describing why two connections can or cannot be joined.
///
/// The empty set is [`CheckResult::CAN_CONNECT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CheckResult(u16);

impl CheckResult {
    pub const CAN_CONNECT: CheckResult = CheckResult(0);
    pub const SELF_CONNECTION: CheckResult = CheckResult(1 << 0);
    pub const WRONG_TYPE: CheckResult = CheckResult(1 << 1);
    pub const SOURCE_NULL: CheckResult = CheckResult(1 << 2);
    pub const TARGET_NULL: CheckResult = CheckResult(1 << 3);
    pub const TYPE_CHECKS_FAILED: CheckResult = CheckResult(1 << 4);
    pub const MUST_DISCONNECT: CheckResult = CheckResult(1 << 5);
    pub const CANNOT_SET_SHADOW_FOR_TARGET: CheckResult = CheckResult(1 << 6);

    const NAMES: [(CheckResult, &'static str); 7] = [
        (CheckResult::SELF_CONNECTION, "self connection"),
        (CheckResult::WRONG_TYPE, "wrong type"),
        (CheckResult::SOURCE_NULL, "source block missing"),
        (CheckResult::TARGET_NULL, "target block missing"),
        (CheckResult::TYPE_CHECKS_FAILED, "type checks failed"),
        (CheckResult::MUST_DISCONNECT, "must disconnect"),
        (
            CheckResult::CANNOT_SET_SHADOW_FOR_TARGET,
            "cannot attach non-shadow to shadow",
        ),
    ];

    pub fn is_can_connect(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: CheckResult) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: CheckResult) -> CheckResult {
        CheckResult(self.0 | other.0)
    }

    /// `self` with every flag of `other` cleared.
    pub fn without(self, other: CheckResult) -> CheckResult {
        CheckResult(self.0 & !other.0)
    }
}

impl BitOr for CheckResult {
    type Output = CheckResult;
    fn bitor(self, rhs: CheckResult) -> CheckResult {
        CheckResult(self.0 | rhs.0)
    }
}

impl BitOrAssign for CheckResult {
    fn bitor_assign(&mut self, rhs: CheckResult) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_can_connect() {
            return f.write_str("can connect");
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join(", "))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Connection
// ────────────────────────────────────────────────────────────────────────────

/// A typed, positioned attachment point owned by a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    #[serde(rename = "type")]
    pub connection_type: ConnectionType,
    /// Absolute workspace position. Only written through the two-phase
    /// move protocol so the connection index stays sorted.
    pub position: WorkspacePoint,
    /// Position relative to the owning block's top-left corner.
    pub offset: WorkspacePoint,
    pub source_block: Option<BlockId>,
    /// Name of the input this connection belongs to, if any.
    #[serde(default)]
    pub source_input: Option<String>,
    #[serde(default)]
    pub target_connection: Option<ConnectionId>,
    #[serde(default)]
    pub shadow_connection: Option<ConnectionId>,
    #[serde(default)]
    pub high_priority: bool,
    /// Compatible type tags. `None` accepts anything.
    #[serde(default)]
    pub type_checks: Option<Vec<String>>,
}

impl Connection {
    pub fn connected(&self) -> bool {
        self.target_connection.is_some()
    }

    pub fn shadow_connected(&self) -> bool {
        self.shadow_connection.is_some()
    }

    pub fn distance_from(&self, other: &Connection) -> f64 {
        self.position.distance_to(other.position)
    }

    /// True when either side accepts anything or the check lists overlap.
    pub fn type_checks_match(&self, other: &Connection) -> bool {
        match (&self.type_checks, &other.type_checks) {
            (Some(mine), Some(theirs)) => mine.iter().any(|check| theirs.contains(check)),
            _ => true,
        }
    }
}

/// Placement and typing of a connection inside a [`BlockBuilder`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionSpec {
    pub offset: WorkspacePoint,
    pub type_checks: Option<Vec<String>>,
    pub high_priority: bool,
}

impl ConnectionSpec {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            offset: WorkspacePoint::new(x, y),
            ..Default::default()
        }
    }

    pub fn with_checks<I, S>(mut self, checks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.type_checks = Some(checks.into_iter().map(Into::into).collect());
        self
    }

    pub fn high_priority(mut self) -> Self {
        self.high_priority = true;
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Block
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    #[default]
    Value,
    Statement,
    Dummy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Input {
    pub name: String,
    pub kind: InputKind,
    /// `None` for dummy inputs.
    pub connection: Option<ConnectionId>,
}

/// An input to add to a block, either at build time or by mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSpec {
    pub name: String,
    pub kind: InputKind,
    pub connection: Option<ConnectionSpec>,
}

impl InputSpec {
    pub fn value(name: impl Into<String>, connection: ConnectionSpec) -> Self {
        Self {
            name: name.into(),
            kind: InputKind::Value,
            connection: Some(connection),
        }
    }

    pub fn statement(name: impl Into<String>, connection: ConnectionSpec) -> Self {
        Self {
            name: name.into(),
            kind: InputKind::Statement,
            connection: Some(connection),
        }
    }

    pub fn dummy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: InputKind::Dummy,
            connection: None,
        }
    }

    fn connection_type(&self) -> Option<ConnectionType> {
        match self.kind {
            InputKind::Value => Some(ConnectionType::InputValue),
            InputKind::Statement => Some(ConnectionType::NextStatement),
            InputKind::Dummy => None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub block_type: String,
    /// Top-left corner in workspace coordinates.
    pub position: WorkspacePoint,
    pub size: WorkspaceSize,
    pub previous_connection: Option<ConnectionId>,
    pub next_connection: Option<ConnectionId>,
    pub output_connection: Option<ConnectionId>,
    #[serde(default)]
    pub inputs: Vec<Input>,
    #[serde(default)]
    pub shadow: bool,
    #[serde(default = "default_true")]
    pub draggable: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub z_index: u32,
    /// Set on a root block while its group is being dragged.
    #[serde(skip)]
    pub dragging: bool,
    /// Highlighted connections of this block, each with the set of dragged
    /// blocks currently requesting the highlight.
    #[serde(skip)]
    pub highlights: BTreeMap<ConnectionId, BTreeSet<BlockId>>,
}

impl Block {
    /// Connections owned by this block itself (not by nested blocks).
    pub fn direct_connections(&self) -> Vec<ConnectionId> {
        let mut out = Vec::with_capacity(3 + self.inputs.len());
        out.extend(self.previous_connection);
        out.extend(self.output_connection);
        out.extend(self.next_connection);
        out.extend(self.inputs.iter().filter_map(|input| input.connection));
        out
    }

    /// The connection that attaches this block to a parent.
    pub fn superior_facing_connection(&self) -> Option<ConnectionId> {
        self.previous_connection.or(self.output_connection)
    }

    pub fn input(&self, name: &str) -> Option<&Input> {
        self.inputs.iter().find(|input| input.name == name)
    }

    pub fn bounds(&self) -> WorkspaceRect {
        WorkspaceRect::from_origin_size(self.position, self.size)
    }

    pub fn is_connection_highlighted(&self, connection: ConnectionId) -> bool {
        self.highlights
            .get(&connection)
            .is_some_and(|sources| !sources.is_empty())
    }
}

/// Describes a block to create in a [`Workspace`].
///
/// # Example
///
/// ```rust
/// use rustyblocks::model::{BlockBuilder, ConnectionSpec, InputSpec};
///
/// let builder = BlockBuilder::new("controls_if")
///     .size(120.0, 60.0)
///     .previous(ConnectionSpec::at(0.0, 0.0))
///     .next(ConnectionSpec::at(0.0, 60.0))
///     .input(InputSpec::value("IF0", ConnectionSpec::at(120.0, 10.0).with_checks(["Boolean"])));
/// assert_eq!(builder.block_type(), "controls_if");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BlockBuilder {
    block_type: String,
    size: WorkspaceSize,
    previous: Option<ConnectionSpec>,
    next: Option<ConnectionSpec>,
    output: Option<ConnectionSpec>,
    inputs: Vec<InputSpec>,
    shadow: bool,
    draggable: bool,
}

impl BlockBuilder {
    pub fn new(block_type: impl Into<String>) -> Self {
        Self {
            block_type: block_type.into(),
            size: WorkspaceSize::new(100.0, 40.0),
            previous: None,
            next: None,
            output: None,
            inputs: Vec::new(),
            shadow: false,
            draggable: true,
        }
    }

    pub fn block_type(&self) -> &str {
        &self.block_type
    }

    pub fn size(mut self, width: f64, height: f64) -> Self {
        self.size = WorkspaceSize::new(width, height);
        self
    }

    pub fn previous(mut self, spec: ConnectionSpec) -> Self {
        self.previous = Some(spec);
        self
    }

    pub fn next(mut self, spec: ConnectionSpec) -> Self {
        self.next = Some(spec);
        self
    }

    pub fn output(mut self, spec: ConnectionSpec) -> Self {
        self.output = Some(spec);
        self
    }

    pub fn input(mut self, input: InputSpec) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn shadow(mut self, shadow: bool) -> Self {
        self.shadow = shadow;
        self
    }

    pub fn draggable(mut self, draggable: bool) -> Self {
        self.draggable = draggable;
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Workspace arena
// ────────────────────────────────────────────────────────────────────────────

/// Arena of blocks and connections plus read-only tree queries.
///
/// Mutation is crate-private: topology changes go through
/// [`crate::coordinator::WorkspaceLayoutCoordinator`] so the connection
/// index is kept in step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workspace {
    blocks: IndexMap<BlockId, Block>,
    connections: IndexMap<ConnectionId, Connection>,
    next_block_id: u32,
    next_connection_id: u32,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(&id)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub(crate) fn connection_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub(crate) fn create_block(
        &mut self,
        builder: &BlockBuilder,
        position: WorkspacePoint,
    ) -> Result<BlockId> {
        if builder.previous.is_some() && builder.output.is_some() {
            return Err(WorkspaceError::InvalidBlockDefinition(format!(
                "{} has both a previous and an output connection",
                builder.block_type
            )));
        }
        let mut seen = BTreeSet::new();
        for input in &builder.inputs {
            if !seen.insert(input.name.as_str()) {
                return Err(WorkspaceError::InvalidBlockDefinition(format!(
                    "{} declares input {:?} twice",
                    builder.block_type, input.name
                )));
            }
        }

        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;
        self.blocks.insert(
            id,
            Block {
                id,
                block_type: builder.block_type.clone(),
                position,
                size: builder.size,
                previous_connection: None,
                next_connection: None,
                output_connection: None,
                inputs: Vec::new(),
                shadow: builder.shadow,
                draggable: builder.draggable,
                visible: true,
                z_index: 0,
                dragging: false,
                highlights: BTreeMap::new(),
            },
        );

        let previous = builder.previous.as_ref().map(|spec| {
            self.create_connection(id, None, ConnectionType::PreviousStatement, spec, position)
        });
        let next = builder.next.as_ref().map(|spec| {
            self.create_connection(id, None, ConnectionType::NextStatement, spec, position)
        });
        let output = builder.output.as_ref().map(|spec| {
            self.create_connection(id, None, ConnectionType::OutputValue, spec, position)
        });
        let inputs: Vec<Input> = builder
            .inputs
            .iter()
            .map(|spec| self.create_input(id, spec, position))
            .collect();

        if let Some(block) = self.blocks.get_mut(&id) {
            block.previous_connection = previous;
            block.next_connection = next;
            block.output_connection = output;
            block.inputs = inputs;
        }
        Ok(id)
    }

    fn create_input(&mut self, block: BlockId, spec: &InputSpec, position: WorkspacePoint) -> Input {
        let connection = match (spec.connection_type(), &spec.connection) {
            (Some(ty), Some(conn)) => {
                Some(self.create_connection(block, Some(&spec.name), ty, conn, position))
            }
            (Some(ty), None) => Some(self.create_connection(
                block,
                Some(&spec.name),
                ty,
                &ConnectionSpec::default(),
                position,
            )),
            (None, _) => None,
        };
        Input {
            name: spec.name.clone(),
            kind: spec.kind,
            connection,
        }
    }

    fn create_connection(
        &mut self,
        block: BlockId,
        input: Option<&str>,
        connection_type: ConnectionType,
        spec: &ConnectionSpec,
        block_position: WorkspacePoint,
    ) -> ConnectionId {
        let id = ConnectionId(self.next_connection_id);
        self.next_connection_id += 1;
        self.connections.insert(
            id,
            Connection {
                id,
                connection_type,
                position: block_position + spec.offset,
                offset: spec.offset,
                source_block: Some(block),
                source_input: input.map(str::to_string),
                target_connection: None,
                shadow_connection: None,
                high_priority: spec.high_priority,
                type_checks: spec.type_checks.clone(),
            },
        );
        id
    }

    /// Insert a new input at `index` (clamped to the input count).
    pub(crate) fn insert_input(
        &mut self,
        block: BlockId,
        index: usize,
        spec: &InputSpec,
    ) -> Result<Option<ConnectionId>> {
        let existing = self.blocks.get(&block).ok_or(WorkspaceError::UnknownBlock(block))?;
        if existing.input(&spec.name).is_some() {
            return Err(WorkspaceError::InvalidBlockDefinition(format!(
                "{} already has an input named {:?}",
                existing.block_type, spec.name
            )));
        }
        let position = existing.position;
        let input = self.create_input(block, spec, position);
        let connection = input.connection;
        if let Some(b) = self.blocks.get_mut(&block) {
            let at = index.min(b.inputs.len());
            b.inputs.insert(at, input);
        }
        Ok(connection)
    }

    /// Remove the named input from its block and orphan its connection.
    pub(crate) fn remove_input(&mut self, block: BlockId, name: &str) -> Result<Option<ConnectionId>> {
        let b = self.blocks.get_mut(&block).ok_or(WorkspaceError::UnknownBlock(block))?;
        let at = b
            .inputs
            .iter()
            .position(|input| input.name == name)
            .ok_or_else(|| WorkspaceError::UnknownInput {
                block,
                name: name.to_string(),
            })?;
        let input = b.inputs.remove(at);
        if let Some(conn) = input.connection.and_then(|id| self.connections.get_mut(&id)) {
            conn.source_block = None;
        }
        Ok(input.connection)
    }

    /// Remove a block from the arena, leaving its connections orphaned
    /// until [`Workspace::purge_orphaned_connections`] runs.
    pub(crate) fn orphan_block(&mut self, id: BlockId) -> Option<Block> {
        let block = self.blocks.shift_remove(&id)?;
        for conn in block.direct_connections() {
            if let Some(c) = self.connections.get_mut(&conn) {
                c.source_block = None;
            }
        }
        Some(block)
    }

    /// Drop every orphaned connection from the arena.
    pub(crate) fn purge_orphaned_connections(&mut self) -> Vec<ConnectionId> {
        let orphans: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| c.source_block.is_none())
            .map(|c| c.id)
            .collect();
        for id in &orphans {
            self.connections.shift_remove(id);
        }
        orphans
    }

    /// Why `moving` can or cannot be joined to `candidate`.
    pub fn check_connection(&self, moving: &Connection, candidate: &Connection) -> CheckResult {
        let mut result = CheckResult::CAN_CONNECT;
        match (moving.source_block, candidate.source_block) {
            (Some(a), Some(b)) => {
                if a == b {
                    result |= CheckResult::SELF_CONNECTION;
                }
            }
            (None, _) => result |= CheckResult::SOURCE_NULL,
            (_, None) => result |= CheckResult::TARGET_NULL,
        }
        if candidate.connection_type != moving.connection_type.opposite() {
            result |= CheckResult::WRONG_TYPE;
        }
        if !moving.type_checks_match(candidate) {
            result |= CheckResult::TYPE_CHECKS_FAILED;
        }
        if moving
            .target_connection
            .is_some_and(|target| target != candidate.id)
        {
            result |= CheckResult::MUST_DISCONNECT;
        }
        if !result.contains(CheckResult::WRONG_TYPE) {
            let (superior, inferior) = if moving.connection_type.is_superior() {
                (moving, candidate)
            } else {
                (candidate, moving)
            };
            let superior_block = superior.source_block.and_then(|id| self.block(id));
            let inferior_block = inferior.source_block.and_then(|id| self.block(id));
            if let (Some(sup), Some(inf)) = (superior_block, inferior_block) {
                if sup.shadow && !inf.shadow {
                    result |= CheckResult::CANNOT_SET_SHADOW_FOR_TARGET;
                }
            }
        }
        result
    }

    /// Block on the other end of `connection`, if connected.
    pub fn target_block(&self, connection: ConnectionId) -> Option<BlockId> {
        let target = self.connection(connection)?.target_connection?;
        self.connection(target)?.source_block
    }

    pub fn parent_block(&self, block: BlockId) -> Option<BlockId> {
        let conn = self.block(block)?.superior_facing_connection()?;
        self.target_block(conn)
    }

    /// Topmost ancestor of `block` (the block itself when unattached).
    pub fn root_block(&self, block: BlockId) -> BlockId {
        let mut current = block;
        for _ in 0..=self.blocks.len() {
            match self.parent_block(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }

    /// Blocks plugged directly into this block's next connection or inputs.
    pub fn child_blocks(&self, block: BlockId) -> Vec<BlockId> {
        let Some(b) = self.block(block) else {
            return Vec::new();
        };
        b.next_connection
            .into_iter()
            .chain(b.inputs.iter().filter_map(|input| input.connection))
            .filter_map(|conn| self.target_block(conn))
            .collect()
    }

    /// `block` followed by every block nested under it, depth first.
    pub fn all_blocks_in_tree(&self, block: BlockId) -> Vec<BlockId> {
        let mut out = Vec::new();
        if self.block(block).is_none() {
            return out;
        }
        let mut stack = vec![block];
        while let Some(current) = stack.pop() {
            if out.contains(&current) {
                continue;
            }
            out.push(current);
            let mut children = self.child_blocks(current);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    pub fn all_connections_in_tree(&self, block: BlockId) -> Vec<ConnectionId> {
        self.all_blocks_in_tree(block)
            .into_iter()
            .filter_map(|id| self.block(id))
            .flat_map(Block::direct_connections)
            .collect()
    }

    /// Last block reached by following next connections from `block`.
    pub fn last_block_in_chain(&self, block: BlockId) -> BlockId {
        let mut current = block;
        for _ in 0..=self.blocks.len() {
            let next = self
                .block(current)
                .and_then(|b| b.next_connection)
                .and_then(|conn| self.target_block(conn));
            match next {
                Some(n) => current = n,
                None => break,
            }
        }
        current
    }

    /// Bounding box of every visible block.
    pub fn bounds(&self) -> Option<WorkspaceRect> {
        self.blocks
            .values()
            .filter(|b| b.visible)
            .map(Block::bounds)
            .reduce(|acc, r| acc.union(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement() -> BlockBuilder {
        BlockBuilder::new("statement")
            .previous(ConnectionSpec::at(0.0, 0.0))
            .next(ConnectionSpec::at(0.0, 40.0))
    }

    #[test]
    fn test_create_block_positions_connections() {
        let mut ws = Workspace::new();
        let id = ws
            .create_block(&statement(), WorkspacePoint::new(10.0, 20.0))
            .unwrap();
        let block = ws.block(id).unwrap();
        let next = ws.connection(block.next_connection.unwrap()).unwrap();
        assert_eq!(next.position, WorkspacePoint::new(10.0, 60.0));
        assert_eq!(next.source_block, Some(id));
        assert_eq!(block.direct_connections().len(), 2);
    }

    #[test]
    fn test_previous_and_output_rejected() {
        let mut ws = Workspace::new();
        let builder = statement().output(ConnectionSpec::at(0.0, 0.0));
        let err = ws.create_block(&builder, WorkspacePoint::ZERO).unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidBlockDefinition(_)));
        assert_eq!(ws.block_count(), 0);
    }

    #[test]
    fn test_opposite_types() {
        for ty in ConnectionType::ALL {
            assert_eq!(ty.opposite().opposite(), ty);
            assert_ne!(ty.opposite(), ty);
            assert_ne!(ty.is_superior(), ty.opposite().is_superior());
        }
    }

    #[test]
    fn test_check_connection_reasons() {
        let mut ws = Workspace::new();
        let a = ws.create_block(&statement(), WorkspacePoint::ZERO).unwrap();
        let b = ws
            .create_block(&statement(), WorkspacePoint::new(0.0, 100.0))
            .unwrap();
        let a_next = ws.connection(ws.block(a).unwrap().next_connection.unwrap()).unwrap();
        let a_prev = ws.connection(ws.block(a).unwrap().previous_connection.unwrap()).unwrap();
        let b_prev = ws.connection(ws.block(b).unwrap().previous_connection.unwrap()).unwrap();

        assert!(ws.check_connection(b_prev, a_next).is_can_connect());
        assert!(ws.check_connection(a_prev, a_next).contains(CheckResult::SELF_CONNECTION));
        assert!(ws.check_connection(b_prev, a_prev).contains(CheckResult::WRONG_TYPE));
    }

    #[test]
    fn test_type_checks() {
        let mut ws = Workspace::new();
        let holder = ws
            .create_block(
                &BlockBuilder::new("holder").input(InputSpec::value(
                    "VALUE",
                    ConnectionSpec::at(100.0, 0.0).with_checks(["Number"]),
                )),
                WorkspacePoint::ZERO,
            )
            .unwrap();
        let text = ws
            .create_block(
                &BlockBuilder::new("text").output(ConnectionSpec::at(0.0, 0.0).with_checks(["String"])),
                WorkspacePoint::new(200.0, 0.0),
            )
            .unwrap();
        let any = ws
            .create_block(
                &BlockBuilder::new("any").output(ConnectionSpec::at(0.0, 0.0)),
                WorkspacePoint::new(300.0, 0.0),
            )
            .unwrap();
        let input = ws.block(holder).unwrap().input("VALUE").unwrap().connection.unwrap();
        let input = ws.connection(input).unwrap();
        let text_out = ws.connection(ws.block(text).unwrap().output_connection.unwrap()).unwrap();
        let any_out = ws.connection(ws.block(any).unwrap().output_connection.unwrap()).unwrap();

        assert_eq!(ws.check_connection(text_out, input), CheckResult::TYPE_CHECKS_FAILED);
        assert!(ws.check_connection(any_out, input).is_can_connect());
    }

    #[test]
    fn test_orphan_and_purge() {
        let mut ws = Workspace::new();
        let a = ws.create_block(&statement(), WorkspacePoint::ZERO).unwrap();
        assert_eq!(ws.connection_count(), 2);
        ws.orphan_block(a).unwrap();
        assert!(ws.connections().all(|c| c.source_block.is_none()));
        let purged = ws.purge_orphaned_connections();
        assert_eq!(purged.len(), 2);
        assert_eq!(ws.connection_count(), 0);
    }

    #[test]
    fn test_insert_and_remove_input() {
        let mut ws = Workspace::new();
        let a = ws.create_block(&statement(), WorkspacePoint::new(5.0, 5.0)).unwrap();
        let conn = ws
            .insert_input(a, 0, &InputSpec::value("X", ConnectionSpec::at(100.0, 10.0)))
            .unwrap()
            .unwrap();
        assert_eq!(ws.connection(conn).unwrap().position, WorkspacePoint::new(105.0, 15.0));
        assert!(ws.insert_input(a, 0, &InputSpec::dummy("X")).is_err());
        assert_eq!(ws.remove_input(a, "X").unwrap(), Some(conn));
        assert!(ws.connection(conn).unwrap().source_block.is_none());
        assert!(matches!(
            ws.remove_input(a, "X"),
            Err(WorkspaceError::UnknownInput { .. })
        ));
    }

    #[test]
    fn test_check_result_display() {
        assert_eq!(CheckResult::CAN_CONNECT.to_string(), "can connect");
        let both = CheckResult::WRONG_TYPE | CheckResult::MUST_DISCONNECT;
        assert_eq!(both.to_string(), "wrong type, must disconnect");
        assert!(both.without(CheckResult::WRONG_TYPE) == CheckResult::MUST_DISCONNECT);
    }
}
