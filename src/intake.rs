//! Request intake (C8): parse, validate, and classify a query into a [`JobParams`].
use crate::errors::{ErrorKind, Result};
use crate::graph::{EntityId, Graph};
use crate::queue::{JobKind, JobParams};

/// A map-like accessor over the query-style parameters of spec §4.8. The
/// transport decides how these strings are sourced (URL query string,
/// form body, …); intake only ever reads them by key.
pub trait RequestParams {
    fn get(&self, key: &str) -> Option<&str>;
}

/// Parses, validates, and classifies one request. Never enqueues anything
/// itself — rejections here never reach the job queue, matching spec §7's
/// "synchronous rejection at intake" disposition.
pub fn build_job(params: &dyn RequestParams, graph: &Graph) -> Result<JobParams> {
    let c1 = parse_required_id(params, "c1", graph)?;
    let c2 = match params.get("c2") {
        Some(raw) => parse_id(raw, "c2", graph)?,
        None => c1,
    };

    let action = params.get("a");
    let kind = classify(action, c1, c2)?;

    let _d1 = parse_optional_i32(params, "d1")?.unwrap_or(-1);
    let _d2 = parse_optional_i32(params, "d2")?.unwrap_or(-1);

    let offset = parse_optional_usize(params, "o")?.unwrap_or(0);
    let size = parse_optional_usize(params, "s")?.unwrap_or(100);

    Ok(JobParams {
        c1,
        c2,
        kind,
        offset,
        size,
    })
}

fn classify(action: Option<&str>, c1: EntityId, c2: EntityId) -> Result<JobKind> {
    let kind = match action {
        None => {
            if c1 == c2 {
                JobKind::List
            } else {
                JobKind::And
            }
        }
        Some("and") => JobKind::And,
        Some("not") => JobKind::Not,
        Some("list") => JobKind::List,
        Some("path") => JobKind::Path,
        Some(other) => return Err(ErrorKind::UnknownAction(other.to_string()).into()),
    };

    if kind == JobKind::Path && c1 == c2 {
        return Err(ErrorKind::SelfPath.into());
    }
    Ok(kind)
}

fn parse_required_id(params: &dyn RequestParams, name: &'static str, graph: &Graph) -> Result<EntityId> {
    let raw = params.get(name).ok_or_else(|| ErrorKind::MissingParameter(name))?;
    parse_id(raw, name, graph)
}

fn parse_id(raw: &str, name: &'static str, graph: &Graph) -> Result<EntityId> {
    let id: i32 = raw
        .parse()
        .map_err(|_| ErrorKind::InvalidParameter(name, raw.to_string()))?;
    if id < 0 || !graph.is_valid_id(id) {
        return Err(ErrorKind::InvalidCategoryId(id).into());
    }
    Ok(id)
}

fn parse_optional_i32(params: &dyn RequestParams, name: &'static str) -> Result<Option<i32>> {
    match params.get(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ErrorKind::InvalidParameter(name, raw.to_string()).into()),
    }
}

fn parse_optional_usize(params: &dyn RequestParams, name: &'static str) -> Result<Option<usize>> {
    match params.get(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ErrorKind::InvalidParameter(name, raw.to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::sample_graph;
    use std::collections::HashMap;

    struct MapParams(HashMap<&'static str, &'static str>);

    impl RequestParams for MapParams {
        fn get(&self, key: &str) -> Option<&str> {
            self.0.get(key).copied()
        }
    }

    fn params(pairs: &[(&'static str, &'static str)]) -> MapParams {
        MapParams(pairs.iter().cloned().collect())
    }

    #[test]
    fn defaults_to_and_when_c1_differs_from_c2() {
        let g = sample_graph();
        let job = build_job(&params(&[("c1", "11"), ("c2", "12")]), &g).unwrap();
        assert_eq!(job.kind, JobKind::And);
        assert_eq!((job.c1, job.c2), (11, 12));
        assert_eq!((job.offset, job.size), (0, 100));
    }

    #[test]
    fn defaults_to_list_when_c2_is_absent() {
        let g = sample_graph();
        let job = build_job(&params(&[("c1", "10")]), &g).unwrap();
        assert_eq!(job.kind, JobKind::List);
        assert_eq!((job.c1, job.c2), (10, 10));
    }

    #[test]
    fn s5_self_path_is_rejected() {
        let g = sample_graph();
        let err = build_job(&params(&[("c1", "10"), ("c2", "10"), ("a", "path")]), &g).unwrap_err();
        assert!(err.to_string().contains("distinct"));
    }

    #[test]
    fn rejects_unknown_action() {
        let g = sample_graph();
        let err = build_job(&params(&[("c1", "10"), ("a", "xor")]), &g).unwrap_err();
        assert!(err.to_string().contains("unknown action"));
    }

    #[test]
    fn rejects_missing_c1() {
        let g = sample_graph();
        let err = build_job(&params(&[]), &g).unwrap_err();
        assert!(err.to_string().contains("c1"));
    }

    #[test]
    fn rejects_out_of_range_id() {
        let g = sample_graph();
        let err = build_job(&params(&[("c1", "99999")]), &g).unwrap_err();
        assert!(err.to_string().contains("not a valid entity"));
    }

    #[test]
    fn s6_paging_parameters_are_parsed() {
        let g = sample_graph();
        let job = build_job(&params(&[("c1", "10"), ("a", "list"), ("o", "2"), ("s", "2")]), &g).unwrap();
        assert_eq!((job.offset, job.size), (2, 2));
    }
}
