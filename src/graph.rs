//! The immutable category/file graph (C1).
//!
//! The graph is loaded once at startup from two binary blobs and never
//! rewritten: `cat` maps every entity id to either a tree offset (a
//! category) or a negative sentinel (a file), and `tree` packs, for each
//! category offset, the end of its subcategory range, the end of its file
//! range, and the two ranges themselves back to back. See spec §3 for the
//! exact layout.
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::errors::{Result, ResultExt};

/// An entity id: non-negative indices into `cat`/`tree`. Categories and
/// files share the same id space; `Graph::is_category`/`is_file` tell them
/// apart.
pub type EntityId = i32;

/// The category/file graph, loaded once and read by every traversal.
pub struct Graph {
    cat: Vec<i32>,
    tree: Vec<i32>,
}

fn read_i32_blob(path: &Path) -> Result<Vec<i32>> {
    let file = File::open(path).chain_err(|| crate::errors::ErrorKind::LoadGraph(path.to_path_buf()))?;
    let len = file
        .metadata()
        .chain_err(|| crate::errors::ErrorKind::LoadGraph(path.to_path_buf()))?
        .len();
    if len % 4 != 0 {
        return Err(crate::errors::ErrorKind::TruncatedGraph(path.to_path_buf()).into());
    }
    let mut reader = BufReader::new(file);
    let mut out = Vec::with_capacity((len / 4) as usize);
    loop {
        match reader.read_i32::<LittleEndian>() {
            Ok(v) => out.push(v),
            Err(ref e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                return Err(e).chain_err(|| crate::errors::ErrorKind::LoadGraph(path.to_path_buf()))
            }
        }
    }
    Ok(out)
}

impl Graph {
    /// Loads the graph from a `cat` file and a `tree` file, both little-endian
    /// `i32` sequences. Missing or truncated files are a fatal load error.
    pub fn load<P: AsRef<Path>>(cat_path: P, tree_path: P) -> Result<Graph> {
        let cat = read_i32_blob(cat_path.as_ref())?;
        let tree = read_i32_blob(tree_path.as_ref())?;
        let graph = Graph { cat, tree };
        graph.validate(cat_path.as_ref())?;
        Ok(graph)
    }

    /// Constructs a graph directly from already-loaded arrays, mainly for
    /// tests and for embedding small graphs in documentation examples.
    pub fn from_arrays(cat: Vec<i32>, tree: Vec<i32>) -> Graph {
        Graph { cat, tree }
    }

    fn validate(&self, path_for_errors: &Path) -> Result<()> {
        let n = self.cat.len() as i32;
        for &c in &self.cat {
            if c < 0 {
                continue;
            }
            let c = c as usize;
            if c + 2 > self.tree.len() {
                return Err(crate::errors::ErrorKind::TruncatedGraph(path_for_errors.to_path_buf()).into());
            }
            let cend = self.tree[c];
            let fend = self.tree[c + 1];
            if cend < c as i32 + 2 || fend < cend || fend as usize > self.tree.len() {
                return Err(crate::errors::ErrorKind::TruncatedGraph(path_for_errors.to_path_buf()).into());
            }
            for &id in &self.tree[(c + 2)..fend as usize] {
                if id < 0 || id >= n {
                    return Err(crate::errors::ErrorKind::TruncatedGraph(path_for_errors.to_path_buf()).into());
                }
            }
        }
        Ok(())
    }

    /// The number of entities (categories plus files) in the graph.
    pub fn len(&self) -> usize {
        self.cat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cat.is_empty()
    }

    /// Whether `id` names a valid, in-range category.
    pub fn is_category(&self, id: EntityId) -> bool {
        id >= 0 && (id as usize) < self.cat.len() && self.cat[id as usize] >= 0
    }

    /// Whether `id` names a valid, in-range file (a leaf with no outgoing edges).
    pub fn is_file(&self, id: EntityId) -> bool {
        id >= 0 && (id as usize) < self.cat.len() && self.cat[id as usize] < 0
    }

    /// Whether `id` is within `[0, N)` at all, category or file.
    pub fn is_valid_id(&self, id: EntityId) -> bool {
        id >= 0 && (id as usize) < self.cat.len()
    }

    /// The ids of the direct subcategories of `cat_id`.
    ///
    /// Panics if `cat_id` is not a category; callers are expected to have
    /// checked `is_category` already (this mirrors the original's
    /// unchecked array indexing, but with a clear panic instead of silent
    /// out-of-bounds reads).
    pub fn subcategories(&self, cat_id: EntityId) -> &[i32] {
        let c = self.cat[cat_id as usize] as usize;
        let cend = self.tree[c] as usize;
        &self.tree[(c + 2)..cend]
    }

    /// The ids of the files directly contained in `cat_id`.
    pub fn files(&self, cat_id: EntityId) -> &[i32] {
        let c = self.cat[cat_id as usize] as usize;
        let cend = self.tree[c] as usize;
        let fend = self.tree[c + 1] as usize;
        &self.tree[cend..fend]
    }

    /// Whether `file_id` is directly (not transitively) contained in `cat_id`.
    pub fn contains_file(&self, cat_id: EntityId, file_id: EntityId) -> bool {
        self.files(cat_id).contains(&file_id)
    }
}

/// Convenience wrapper pairing load errors with the paths that caused them,
/// used by the server binary to report a readable startup failure.
pub fn load_graph_files(cat_path: impl Into<PathBuf>, tree_path: impl Into<PathBuf>) -> Result<Graph> {
    Graph::load(cat_path.into(), tree_path.into())
}
