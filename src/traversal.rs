//! Deep traversal file collector (C3): `fetch_files`.
use crate::buffers::{Mask, ResultBuffer};
use crate::graph::{EntityId, Graph};

/// Recursion-depth guard (spec §4.3). Any branch deeper than this is
/// silently pruned, which together with the visitation mask makes
/// traversal safe on graphs that contain cycles.
pub const MAX_DEPTH: usize = 500;

/// Collects all file ids transitively reachable from `root` into `out`.
///
/// `mask` must already be zeroed by the caller (the worker does this once
/// per traversal phase); `fetch_files` marks entities as it visits them but
/// never clears the mask itself, since AND/NOT share a single mask across
/// the two operand traversals only when deliberately reusing reachability
/// (which they don't — each operand gets its own freshly zeroed mask, per
/// spec §4.7's "clear visitation mask" step run once per operand).
///
/// Emission order is unspecified; duplicates across multiple paths to the
/// same file are expected and are the set operators' job to remove.
///
/// Uses an explicit work stack rather than native recursion, so a
/// pathological graph (`MAX_DEPTH` deep times high fan-out) cannot
/// overflow the call stack — the risk spec design note §9 flags for a
/// straightforward recursive port.
pub fn fetch_files(graph: &Graph, root: EntityId, mask: &mut Mask, out: &mut ResultBuffer) {
    debug_assert!(graph.is_category(root), "fetch_files root must be a category");

    let mut stack: Vec<(EntityId, usize)> = Vec::with_capacity(64);
    stack.push((root, 0));

    while let Some((id, depth)) = stack.pop() {
        if depth >= MAX_DEPTH {
            continue;
        }
        if mask.is_visited(id) {
            continue;
        }
        mask.mark_visited(id);

        out.extend_from_slice(graph.files(id));

        for &child in graph.subcategories(id) {
            stack.push((child, depth + 1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::Mask;
    use crate::graph::tests::sample_graph;

    #[test]
    fn collects_all_reachable_files_with_duplicates() {
        let g = sample_graph();
        let mut mask = Mask::new(g.len());
        let mut out = ResultBuffer::new();
        fetch_files(&g, 10, &mut mask, &mut out);

        let mut items = out.as_slice().to_vec();
        items.sort_unstable();
        // 100 appears twice: directly under 10 and again under 13.
        assert_eq!(items, vec![100, 100, 101, 101, 102, 103, 104]);
    }

    #[test]
    fn terminates_on_a_cycle() {
        // 20 -> 21 -> 20 (categories only, cyclic), with a file under 21.
        // cat 20 at offset 0: cend=3, fend=3, subcats=[21], files=[]
        // cat 21 at offset 4: cend=7, fend=8, subcats=[20], files=[200]
        let mut cat = vec![-1i32; 22];
        cat[20] = 0;
        cat[21] = 4;
        let tree = vec![3, 3, 21, 0, 7, 8, 20, 200];
        let g = Graph::from_arrays(cat, tree);
        let mut mask = Mask::new(g.len());
        let mut out = ResultBuffer::new();
        fetch_files(&g, 20, &mut mask, &mut out);
        assert_eq!(out.as_slice(), &[200]);
    }
}
