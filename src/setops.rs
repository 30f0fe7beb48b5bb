//! Pairwise set operators over result buffers (C4): LIST, AND, NOT.
//!
//! All three page their output by a 1-based logical counter and hand each
//! surviving id to a caller-supplied sink — batching those into `RESULT`
//! frames is the writer's job (C6), not this module's.
use crate::buffers::ResultBuffer;

/// How a caller should render the trailing size marker.
///
/// `Omitted` matches NOT's reference behavior of never emitting `OUTOF`
/// (spec open question — preserved rather than "fixed").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutofMarker {
    Exact(u64),
    Estimated(u64),
    Omitted,
}

/// Tracks the 1-based logical counter `n` used to select a page
/// `(offset, offset+size]` out of a candidate stream, independent of how
/// many candidates are actually emitted.
struct Pager {
    offset: u64,
    limit: u64,
    n: u64,
}

enum PagerAction {
    Skip,
    Emit,
    Stop,
}

impl Pager {
    fn new(offset: usize, size: usize) -> Pager {
        Pager {
            offset: offset as u64,
            limit: offset as u64 + size as u64,
            n: 0,
        }
    }

    fn tick(&mut self) -> PagerAction {
        self.n += 1;
        if self.n > self.limit {
            PagerAction::Stop
        } else if self.n > self.offset {
            PagerAction::Emit
        } else {
            PagerAction::Skip
        }
    }
}

/// LIST: sort `buf` ascending, stream unique ids, exact `OUTOF`.
pub fn list_unique(buf: &mut ResultBuffer, offset: usize, size: usize, mut emit: impl FnMut(i32)) -> OutofMarker {
    let items = buf.as_mut_vec();
    items.sort_unstable();
    items.dedup();
    let total = items.len() as u64;

    let mut pager = Pager::new(offset, size);
    for &id in items.iter() {
        match pager.tick() {
            PagerAction::Skip => {}
            PagerAction::Emit => emit(id),
            PagerAction::Stop => break,
        }
    }
    OutofMarker::Exact(total)
}

/// Threshold above which AND switches from sort-merge to bsearch-with-deletion.
pub const BSEARCH_THRESHOLD: usize = 1_000_000;

/// AND: intersect `a` and `b`, adaptive strategy by operand size.
pub fn intersect(a: &mut ResultBuffer, b: &mut ResultBuffer, offset: usize, size: usize, emit: impl FnMut(i32)) -> OutofMarker {
    if a.is_empty() || b.is_empty() {
        return OutofMarker::Exact(0);
    }

    if a.len() <= BSEARCH_THRESHOLD && b.len() <= BSEARCH_THRESHOLD {
        intersect_sort_merge(a, b, offset, size, emit)
    } else {
        intersect_bsearch(a, b, offset, size, emit)
    }
}

fn intersect_sort_merge(a: &mut ResultBuffer, b: &mut ResultBuffer, offset: usize, size: usize, mut emit: impl FnMut(i32)) -> OutofMarker {
    let va = a.as_mut_vec();
    va.sort_unstable();
    let vb = b.as_mut_vec();
    vb.sort_unstable();

    let (len_a, len_b) = (va.len(), vb.len());
    let mut ia = 0usize;
    let mut ib = 0usize;
    let mut pager = Pager::new(offset, size);
    let mut stopped = false;

    while ia < len_a && ib < len_b {
        if va[ia] < vb[ib] {
            ia += 1;
        } else if va[ia] > vb[ib] {
            ib += 1;
        } else {
            let val = va[ia];
            match pager.tick() {
                PagerAction::Skip => {}
                PagerAction::Emit => emit(val),
                PagerAction::Stop => {
                    stopped = true;
                    break;
                }
            }
            while ia < len_a && va[ia] == val {
                ia += 1;
            }
            while ib < len_b && vb[ib] == val {
                ib += 1;
            }
        }
    }
    let _ = stopped;

    // Matches the reference's floating-point order of operations
    // (`int(double(n)/double(i0+1)*double(fnum[0]+1))`): the division
    // happens in `f64` and only the final product is truncated. Doing the
    // division in integers first (`n / (ia+1) * (len_a+1)`) truncates
    // early and massively undercounts whenever `n` isn't an exact multiple
    // of `ia+1`/`ib+1`.
    let n = pager.n as f64;
    let est1 = n + n / (ia as f64 + 1.0) * (len_a as f64 + 1.0);
    let est2 = n + n / (ib as f64 + 1.0) * (len_b as f64 + 1.0);
    OutofMarker::Estimated(est1.min(est2) as u64)
}

/// Overwrites the contiguous run `small[lo..hi]` (all equal to the matched
/// value) with a value taken from just outside the run, so the array stays
/// sorted and the run no longer matches future binary searches. Returns
/// `false` when no adjacent live value exists, meaning the caller must stop
/// matching entirely — the run cannot be evicted without breaking sort order.
fn evict_run(small: &mut [i32], lo: usize, hi: usize) -> bool {
    let fill = if hi < small.len() {
        Some(small[hi])
    } else if lo > 0 {
        Some(small[lo - 1])
    } else {
        None
    };
    match fill {
        Some(v) => {
            for x in &mut small[lo..hi] {
                *x = v;
            }
            true
        }
        None => false,
    }
}

fn intersect_bsearch(a: &mut ResultBuffer, b: &mut ResultBuffer, offset: usize, size: usize, mut emit: impl FnMut(i32)) -> OutofMarker {
    let a_is_small = a.len() <= b.len();
    let (small_buf, large_buf) = if a_is_small { (a, b) } else { (b, a) };

    let small = small_buf.as_mut_vec();
    small.sort_unstable();
    // `large` is scanned in its existing order — the bsearch strategy never
    // sorts it, so output order follows the large side as traversed.
    let large = large_buf.as_slice();
    let len_large = large.len() as u64;

    let mut pager = Pager::new(offset, size);
    let mut last_index = 0usize;

    for (idx, &val) in large.iter().enumerate() {
        last_index = idx;
        let hit = small.binary_search(&val);
        let Ok(found) = hit else { continue };

        let mut lo = found;
        while lo > 0 && small[lo - 1] == val {
            lo -= 1;
        }
        let mut hi = found + 1;
        while hi < small.len() && small[hi] == val {
            hi += 1;
        }

        match pager.tick() {
            PagerAction::Skip => {}
            PagerAction::Emit => emit(val),
            PagerAction::Stop => break,
        }

        if !evict_run(small, lo, hi) {
            break;
        }
    }

    // Same floating-point-order fix as `intersect_sort_merge`'s estimate;
    // see the comment there.
    let n = pager.n as f64;
    let i = last_index as f64;
    let est = n + n / (i + 1.0) * (len_large as f64 + 1.0);
    OutofMarker::Estimated(est as u64)
}

/// NOT: `a \ b`. No `OUTOF` marker is emitted, matching the reference engine.
pub fn subtract(a: &mut ResultBuffer, b: &mut ResultBuffer, offset: usize, size: usize, mut emit: impl FnMut(i32)) -> OutofMarker {
    let va = a.as_mut_vec();
    va.sort_unstable();
    let vb = b.as_mut_vec();
    vb.sort_unstable();

    let (len_a, len_b) = (va.len(), vb.len());
    let mut ia = 0usize;
    let mut ib = 0usize;
    let mut pager = Pager::new(offset, size);

    while ia < len_a {
        if ib < len_b && va[ia] == vb[ib] {
            let val = va[ia];
            while ia < len_a && va[ia] == val {
                ia += 1;
            }
            while ib < len_b && vb[ib] == val {
                ib += 1;
            }
        } else if ib < len_b && va[ia] > vb[ib] {
            ib += 1;
        } else {
            let val = va[ia];
            match pager.tick() {
                PagerAction::Skip => {}
                PagerAction::Emit => emit(val),
                PagerAction::Stop => break,
            }
            while ia < len_a && va[ia] == val {
                ia += 1;
            }
        }
    }

    OutofMarker::Omitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::sample_graph;
    use crate::traversal::fetch_files;
    use crate::buffers::Mask;

    fn reachable(root: i32) -> ResultBuffer {
        let g = sample_graph();
        let mut mask = Mask::new(g.len());
        let mut out = ResultBuffer::new();
        fetch_files(&g, root, &mut mask, &mut out);
        out
    }

    #[test]
    fn s1_list_full_page() {
        let mut buf = reachable(10);
        let mut out = Vec::new();
        let outof = list_unique(&mut buf, 0, 100, |id| out.push(id));
        assert_eq!(out, vec![100, 101, 102, 103, 104]);
        assert_eq!(outof, OutofMarker::Exact(5));
    }

    #[test]
    fn s6_list_paged() {
        let mut buf = reachable(10);
        let mut out = Vec::new();
        let outof = list_unique(&mut buf, 2, 2, |id| out.push(id));
        assert_eq!(out, vec![102, 103]);
        assert_eq!(outof, OutofMarker::Exact(5));
    }

    #[test]
    fn s2_and_disjoint_sets() {
        let mut a = reachable(11);
        let mut b = reachable(12);
        let mut out = Vec::new();
        let outof = intersect(&mut a, &mut b, 0, 100, |id| out.push(id));
        assert!(out.is_empty());
        assert_eq!(outof, OutofMarker::Estimated(0));
    }

    #[test]
    fn s3_not_difference() {
        let mut a = reachable(10);
        let mut b = reachable(12);
        let mut out = Vec::new();
        let outof = subtract(&mut a, &mut b, 0, 100, |id| out.push(id));
        assert_eq!(out, vec![100, 101, 102, 104]);
        assert_eq!(outof, OutofMarker::Omitted);
    }

    #[test]
    fn and_overlapping_sets_deduplicate() {
        // 10's closure {100,101,102,103,104} intersected with 11's {101,102,104,100}
        let mut a = reachable(10);
        let mut b = reachable(11);
        let mut out = Vec::new();
        intersect(&mut a, &mut b, 0, 100, |id| out.push(id));
        assert_eq!(out, vec![100, 101, 102, 104]);
    }

    #[test]
    fn and_empty_operand_short_circuits() {
        let mut a = ResultBuffer::new();
        let mut b = reachable(10);
        let mut out = Vec::new();
        let outof = intersect(&mut a, &mut b, 0, 100, |id| out.push(id));
        assert!(out.is_empty());
        assert_eq!(outof, OutofMarker::Exact(0));
    }

    #[test]
    fn bsearch_strategy_evicts_the_whole_matched_run() {
        // `short` has fewer elements than `long`, so it becomes the
        // deletion target regardless of argument order; `long` is scanned
        // in its given order looking for hits in `short`.
        let mut short = ResultBuffer::new();
        short.extend_from_slice(&[1, 2, 2, 2, 5]);
        let mut long = ResultBuffer::new();
        long.extend_from_slice(&[2, 2, 2, 9, 10, 11]);
        let mut out = Vec::new();
        intersect_bsearch(&mut short, &mut long, 0, 100, |id| out.push(id));
        // The first `2` in `long` matches; evict_run collapses the whole
        // run of 2's in `short` to a neighboring value (5), so the two
        // later 2's in `long` no longer find a hit.
        assert_eq!(out, vec![2]);
    }

    #[test]
    fn subtract_deduplicates_a_and_skips_b_overlap() {
        let mut a = ResultBuffer::new();
        a.extend_from_slice(&[1, 1, 2, 3, 4]);
        let mut b = ResultBuffer::new();
        b.extend_from_slice(&[2, 4]);
        let mut out = Vec::new();
        subtract(&mut a, &mut b, 0, 100, |id| out.push(id));
        assert_eq!(out, vec![1, 3]);
    }
}
