//! Startup configuration (ambient A3): CLI parsing and default graph paths.
use std::path::PathBuf;

use clap::Parser;

use crate::queue::MAX_ITEM;

fn default_cat_path() -> PathBuf {
    xdg::BaseDirectories::with_prefix("fastcci")
        .ok()
        .map(|dirs| dirs.get_data_home().join("cat.bin"))
        .unwrap_or_else(|| PathBuf::from("cat.bin"))
}

fn default_tree_path() -> PathBuf {
    xdg::BaseDirectories::with_prefix("fastcci")
        .ok()
        .map(|dirs| dirs.get_data_home().join("tree.bin"))
        .unwrap_or_else(|| PathBuf::from("tree.bin"))
}

/// `fastcci-server` startup arguments. Transport bootstrap (binding the
/// port, accepting connections) is out of scope per spec §1; this only
/// carries what the engine itself needs to come up.
#[derive(Parser, Debug)]
#[command(name = "fastcci-server", about = "In-memory category/file query engine")]
pub struct Args {
    /// Port for the (out-of-scope) transport layer to bind.
    pub port: u16,

    /// Path to the category-offset table (little-endian i32 sequence).
    #[arg(long, default_value_os_t = default_cat_path())]
    pub cat: PathBuf,

    /// Path to the tree blob (little-endian i32 sequence).
    #[arg(long, default_value_os_t = default_tree_path())]
    pub tree: PathBuf,

    /// Override the job queue's admission bound; mainly for tests that
    /// want to exercise `QueueFull` without enqueueing a thousand jobs.
    #[arg(long, default_value_t = MAX_ITEM)]
    pub queue_capacity: usize,
}
