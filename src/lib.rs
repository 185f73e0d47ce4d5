//! Connection management for block-programming workspaces.
//!
//! This crate keeps a spatial index over the typed connections of blocks in
//! a workspace and runs the drag, snap and bump logic on top of it:
//!
//! - [`connection_manager`] – y-sorted connection lists, groups and the
//!   pluggable [`connection_manager::ConnectionValidator`]
//! - [`coordinator`] – the per-workspace context that owns blocks, the index
//!   and the event queue
//! - [`dragger`] – drag gesture state machine
//! - [`bumper`] – separates overlapping blocks
//! - [`loader`] – builds workspaces from JSON descriptions
//!
//! The binary `rustyblocks` loads a description, replays drags and prints the
//! resulting workspace as JSON.

pub mod bumper;
pub mod config;
pub mod connection_manager;
pub mod coordinator;
pub mod dragger;
pub mod error;
pub mod events;
pub mod loader;
pub mod model;
pub mod units;
