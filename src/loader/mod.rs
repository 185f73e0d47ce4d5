//! JSON workspace descriptions.
//!
//! A description names its blocks, declares their connections and lists the
//! links between them:
//!
//! ```json
//! {
//!   "blocks": [
//!     { "name": "a", "type": "stmt", "x": 0, "y": 0,
//!       "previous": { "x": 0, "y": 0 }, "next": { "x": 0, "y": 40 } },
//!     { "name": "b", "type": "stmt", "x": 0, "y": 200,
//!       "previous": { "x": 0, "y": 0 } }
//!   ],
//!   "links": [ { "parent": "a", "child": "b" } ]
//! }
//! ```
//!
//! A link without `input` uses the parent's next connection. `includes`
//! pulls in more descriptions, resolved against the including file.
//!
//! - [`source`] – where description files are read from

pub mod source;

pub use source::*;

use anyhow::{Context, Result, anyhow, bail};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::BTreeSet;

use crate::config::LayoutConfig;
use crate::coordinator::WorkspaceLayoutCoordinator;
use crate::model::{BlockBuilder, BlockId, ConnectionId, ConnectionSpec, InputKind, InputSpec};
use crate::units::WorkspacePoint;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceDescription {
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub blocks: Vec<BlockDescription>,
    #[serde(default)]
    pub links: Vec<LinkDescription>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    #[serde(default)]
    pub shadow: bool,
    #[serde(default = "default_true")]
    pub draggable: bool,
    pub previous: Option<ConnectionDescription>,
    pub next: Option<ConnectionDescription>,
    pub output: Option<ConnectionDescription>,
    #[serde(default)]
    pub inputs: Vec<InputDescription>,
}

fn default_width() -> f64 {
    100.0
}

fn default_height() -> f64 {
    40.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionDescription {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub checks: Option<Vec<String>>,
    #[serde(default)]
    pub high_priority: bool,
}

impl From<&ConnectionDescription> for ConnectionSpec {
    fn from(desc: &ConnectionDescription) -> Self {
        let mut spec = ConnectionSpec::at(desc.x, desc.y);
        if let Some(checks) = &desc.checks {
            spec = spec.with_checks(checks.iter().cloned());
        }
        if desc.high_priority {
            spec = spec.high_priority();
        }
        spec
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputDescription {
    pub name: String,
    #[serde(default)]
    pub kind: InputKind,
    pub connection: Option<ConnectionDescription>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkDescription {
    pub parent: String,
    /// Input on the parent; the next connection when absent.
    pub input: Option<String>,
    pub child: String,
    /// Attach the child as the slot's shadow instead of its real block.
    #[serde(default)]
    pub shadow: bool,
}

impl BlockDescription {
    pub fn to_builder(&self) -> BlockBuilder {
        let mut builder = BlockBuilder::new(&self.block_type)
            .size(self.width, self.height)
            .shadow(self.shadow)
            .draggable(self.draggable);
        if let Some(prev) = &self.previous {
            builder = builder.previous(prev.into());
        }
        if let Some(next) = &self.next {
            builder = builder.next(next.into());
        }
        if let Some(output) = &self.output {
            builder = builder.output(output.into());
        }
        for input in &self.inputs {
            builder = builder.input(InputSpec {
                name: input.name.clone(),
                kind: input.kind,
                connection: match input.kind {
                    InputKind::Dummy => None,
                    _ => Some(input.connection.as_ref().map(Into::into).unwrap_or_default()),
                },
            });
        }
        builder
    }
}

/// A workspace built from a description.
#[derive(Debug)]
pub struct LoadedWorkspace {
    pub coordinator: WorkspaceLayoutCoordinator,
    /// Description names in declaration order.
    pub names: IndexMap<String, BlockId>,
}

impl LoadedWorkspace {
    pub fn block(&self, name: &str) -> Option<BlockId> {
        self.names.get(name).copied()
    }
}

/// Builds workspaces from JSON descriptions. Generic over [`ContentSource`]
/// so descriptions can come from the filesystem ([`FsSource`]) or memory
/// ([`MemorySource`]).
pub struct WorkspaceLoader<S: ContentSource> {
    source: S,
}

impl<S: ContentSource> WorkspaceLoader<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Load the description at `path` with all its includes.
    pub fn load(&mut self, path: impl AsRef<Utf8Path>, config: LayoutConfig) -> Result<LoadedWorkspace> {
        let path = path.as_ref();
        let mut description = WorkspaceDescription::default();
        let mut visited = BTreeSet::new();
        self.collect(path, &mut description, &mut visited)?;
        build_workspace(&description, config).with_context(|| format!("Failed to build workspace from {}", path))
    }

    fn collect(
        &mut self,
        path: &Utf8Path,
        into: &mut WorkspaceDescription,
        visited: &mut BTreeSet<Utf8PathBuf>,
    ) -> Result<()> {
        if !visited.insert(path.to_path_buf()) {
            bail!("Include cycle through {}", path);
        }
        let text = self.source.read_to_string(path)?;
        let description: WorkspaceDescription =
            serde_json::from_str(&text).with_context(|| format!("Failed to parse workspace {}", path))?;
        let base_dir = path.parent().unwrap_or(Utf8Path::new(""));
        for include in &description.includes {
            let include = Utf8Path::new(include);
            let include_path = if include.is_absolute() {
                include.to_path_buf()
            } else {
                base_dir.join(include)
            };
            self.collect(&include_path, into, visited)?;
        }
        into.blocks.extend(description.blocks);
        into.links.extend(description.links);
        Ok(())
    }
}

/// Build a workspace from an already parsed description.
pub fn build_workspace(description: &WorkspaceDescription, config: LayoutConfig) -> Result<LoadedWorkspace> {
    let mut coordinator = WorkspaceLayoutCoordinator::new(config);
    let mut names = IndexMap::new();
    for block in &description.blocks {
        if names.contains_key(&block.name) {
            bail!("Duplicate block name {:?}", block.name);
        }
        let id = coordinator
            .add_block(&block.to_builder(), WorkspacePoint::new(block.x, block.y))
            .with_context(|| format!("Invalid block {:?}", block.name))?;
        names.insert(block.name.clone(), id);
    }

    for link in &description.links {
        let lookup = |name: &str| {
            names
                .get(name)
                .copied()
                .ok_or_else(|| anyhow!("Link refers to unknown block {:?}", name))
        };
        let parent = lookup(&link.parent)?;
        let child = lookup(&link.child)?;
        let slot = parent_slot(&coordinator, parent, link)?;
        let plug = coordinator
            .workspace()
            .block(child)
            .and_then(|b| b.superior_facing_connection())
            .ok_or_else(|| anyhow!("Block {:?} has no previous or output connection", link.child))?;
        let linked = if link.shadow {
            coordinator.connect_shadow(slot, plug)
        } else {
            coordinator.connect(slot, plug).map(|_| ())
        };
        linked.with_context(|| format!("Cannot link {:?} to {:?}", link.child, link.parent))?;
    }
    coordinator.update_canvas_bounds();
    coordinator.event_manager_mut().take_pending();
    tracing::debug!(blocks = names.len(), links = description.links.len(), "loaded workspace");
    Ok(LoadedWorkspace { coordinator, names })
}

fn parent_slot(coordinator: &WorkspaceLayoutCoordinator, parent: BlockId, link: &LinkDescription) -> Result<ConnectionId> {
    let block = coordinator
        .workspace()
        .block(parent)
        .ok_or_else(|| anyhow!("Unknown block {:?}", link.parent))?;
    match &link.input {
        Some(name) => block
            .input(name)
            .ok_or_else(|| anyhow!("Block {:?} has no input {:?}", link.parent, name))?
            .connection
            .ok_or_else(|| anyhow!("Input {:?} of {:?} takes no blocks", name, link.parent)),
        None => block
            .next_connection
            .ok_or_else(|| anyhow!("Block {:?} has no next connection", link.parent)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STACK: &str = r#"{
        "blocks": [
            { "name": "a", "type": "stmt", "x": 10, "y": 10,
              "previous": { "x": 0, "y": 0 }, "next": { "x": 0, "y": 40 },
              "inputs": [ { "name": "COND", "connection": { "x": 100, "y": 5, "checks": ["Boolean"] } } ] },
            { "name": "b", "type": "stmt", "x": 300, "y": 300,
              "previous": { "x": 0, "y": 0 } },
            { "name": "t", "type": "logic_boolean", "output": { "checks": ["Boolean"] } }
        ],
        "links": [
            { "parent": "a", "child": "b" },
            { "parent": "a", "input": "COND", "child": "t" }
        ]
    }"#;

    #[test]
    fn test_load_links_blocks() {
        let mut loader = WorkspaceLoader::new(MemorySource::new().with_file("ws.json", STACK));
        let loaded = loader.load("ws.json", LayoutConfig::default()).unwrap();
        let ws = loaded.coordinator.workspace();
        let (a, b, t) = (
            loaded.block("a").unwrap(),
            loaded.block("b").unwrap(),
            loaded.block("t").unwrap(),
        );
        assert_eq!(ws.parent_block(b), Some(a));
        assert_eq!(ws.parent_block(t), Some(a));
        assert_eq!(ws.block(b).unwrap().position, WorkspacePoint::new(10.0, 50.0));
        assert_eq!(ws.block(t).unwrap().position, WorkspacePoint::new(110.0, 15.0));
        assert!(loaded.coordinator.event_manager().pending_events().is_empty());
        assert_eq!(loaded.names.keys().collect::<Vec<_>>(), ["a", "b", "t"]);
    }

    #[test]
    fn test_includes_resolve_relative_to_parent() {
        let mut loader = WorkspaceLoader::new(
            MemorySource::new()
                .with_file("dir/main.json", r#"{ "includes": ["lib.json"], "links": [ { "parent": "x", "child": "y" } ] }"#)
                .with_file(
                    "dir/lib.json",
                    r#"{ "blocks": [
                        { "name": "x", "type": "s", "next": { "y": 40 } },
                        { "name": "y", "type": "s", "y": 100, "previous": {} }
                    ] }"#,
                ),
        );
        let loaded = loader.load("dir/main.json", LayoutConfig::default()).unwrap();
        let ws = loaded.coordinator.workspace();
        assert_eq!(ws.parent_block(loaded.block("y").unwrap()), loaded.block("x"));
    }

    #[test]
    fn test_include_cycle_is_an_error() {
        let mut loader = WorkspaceLoader::new(
            MemorySource::new()
                .with_file("a.json", r#"{ "includes": ["b.json"] }"#)
                .with_file("b.json", r#"{ "includes": ["a.json"] }"#),
        );
        let err = loader.load("a.json", LayoutConfig::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("Include cycle"));
    }

    #[test]
    fn test_type_mismatch_reported() {
        let json = r#"{
            "blocks": [
                { "name": "h", "type": "h", "inputs": [ { "name": "N", "connection": { "checks": ["Number"] } } ] },
                { "name": "s", "type": "text", "output": { "checks": ["String"] } }
            ],
            "links": [ { "parent": "h", "input": "N", "child": "s" } ]
        }"#;
        let description: WorkspaceDescription = serde_json::from_str(json).unwrap();
        let err = build_workspace(&description, LayoutConfig::default()).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("Cannot link"), "{}", message);
        assert!(message.contains("type checks failed"), "{}", message);
    }

    #[test]
    fn test_unknown_names_rejected() {
        let json = r#"{ "blocks": [ { "name": "a", "type": "s" } ], "links": [ { "parent": "a", "child": "zz" } ] }"#;
        let description: WorkspaceDescription = serde_json::from_str(json).unwrap();
        assert!(build_workspace(&description, LayoutConfig::default()).is_err());
        assert!(serde_json::from_str::<WorkspaceDescription>(r#"{ "bogus": 1 }"#).is_err());
    }
}
