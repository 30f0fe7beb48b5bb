#![cfg_attr(
    feature = "cargo-clippy",
    warn(
        clippy::manual_filter_map,
        clippy::map_unwrap_or,
        clippy::module_name_repetitions,
        clippy::print_stdout,
        clippy::unwrap_used,
    )
)]

//! In-memory query engine over a static category/file graph: reachability,
//! set-algebra (AND/NOT/LIST) and path queries, served off a single-worker
//! job queue. The HTTP/socket transport, the offline graph build pipeline,
//! and process bootstrap all live outside this crate; see `bin/fastcci-server`
//! for the thin binary that wires a TCP listener on top of [`engine::Engine`].

pub mod buffers;
pub mod config;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod intake;
pub mod pathfind;
pub mod queue;
pub mod setops;
pub mod traversal;
pub mod writer;
