//! The legality oracle: decides whether a candidate schedule respects
//! every dependence in a SCoP's cached dependence relation.

use tracing::{debug, trace};

use crate::dependence::Dependence;
use crate::error::CoreResult;
use crate::kernel::lex_is_negative;
use crate::tree::{extract_schedule, Node};

/// Stateless: the oracle is a pure function of (tree, dependence).
/// Kept as a type so call sites read `Oracle::is_legal(..)` rather
/// than a bare free function.
pub struct Oracle;

impl Oracle {
    /// Delta `sink_schedule_point - source_schedule_point` for one
    /// dependence edge, evaluated at the canonical representative
    /// point (the origin for the source instance, `distance` for the
    /// sink instance, exact for every affine and tile dimension this
    /// crate's primitives ever produce on an already-legal schedule;
    /// see kernel.rs).
    fn delta(tree: &Node, edge: &crate::dependence::DependenceEdge) -> CoreResult<Vec<i64>> {
        let src_sched = extract_schedule(tree, edge.source)?;
        let snk_sched = extract_schedule(tree, edge.sink)?;
        let src_point = vec![0i64; edge.distance.len()];
        let snk_point = edge.distance.clone();
        let n = src_sched.len().min(snk_sched.len());
        let delta = (0..n)
            .map(|i| snk_sched[i].eval(&snk_point) - src_sched[i].eval(&src_point))
            .collect();
        Ok(delta)
    }

    /// Full legality check: returns `Ok(true)` iff no dependence's
    /// schedule delta is lexicographically negative.
    pub fn is_legal(tree: &Node, dependence: &Dependence) -> CoreResult<bool> {
        if dependence.is_empty() {
            trace!("empty dependence relation, trivially legal");
            return Ok(true);
        }
        for edge in &dependence.edges {
            let delta = Self::delta(tree, edge)?;
            if lex_is_negative(&delta) {
                debug!(?delta, source = edge.source.0, sink = edge.sink.0, "dependence violated");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Parallel variant: a band dimension at `depth` in
    /// the *composed* schedule (i.e. counting every Band dimension
    /// from the root down, zero-indexed) may be marked parallel iff no
    /// dependence has a nonzero component there.
    pub fn is_parallel_at_depth(tree: &Node, dependence: &Dependence, depth: usize) -> CoreResult<bool> {
        for edge in &dependence.edges {
            let delta = Self::delta(tree, edge)?;
            if let Some(&component) = delta.get(depth) {
                if component != 0 {
                    debug!(depth, component, "dimension is not parallel: dependence carried");
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependence::DependenceEdge;
    use crate::kernel::{AffineExpr, Dim};
    use crate::tree::{Band, Cursor, StmtId};

    fn ijk_identity_tree() -> Node {
        let stmt = StmtId(0);
        let schedule = vec![
            Dim::Affine(AffineExpr::coordinate(3, 0)),
            Dim::Affine(AffineExpr::coordinate(3, 1)),
            Dim::Affine(AffineExpr::coordinate(3, 2)),
        ];
        let stmts: std::collections::BTreeSet<_> = [stmt].into_iter().collect();
        Node::Domain {
            stmts: stmts.clone(),
            child: Box::new(Node::Filter {
                stmts,
                child: Box::new(Node::Band(Band::new(schedule, Some("S".into()), Node::Leaf))),
            }),
        }
    }

    #[test]
    fn empty_dependence_is_legal() {
        let tree = ijk_identity_tree();
        assert!(Oracle::is_legal(&tree, &Dependence::default()).unwrap());
    }

    #[test]
    fn forward_self_dependence_on_identity_schedule_is_legal() {
        let tree = ijk_identity_tree();
        let dep = Dependence::new(vec![DependenceEdge::new(StmtId(0), StmtId(0), vec![0, 0, 1])]);
        assert!(Oracle::is_legal(&tree, &dep).unwrap());
    }

    #[test]
    fn reversed_distance_is_illegal() {
        let tree = ijk_identity_tree();
        let dep = Dependence::new(vec![DependenceEdge::new(StmtId(0), StmtId(0), vec![0, 0, -1])]);
        assert!(!Oracle::is_legal(&tree, &dep).unwrap());
    }

    #[test]
    fn k_dependence_makes_j_nonparallel_but_not_i() {
        let tree = ijk_identity_tree();
        let dep = Dependence::new(vec![DependenceEdge::new(StmtId(0), StmtId(0), vec![0, 0, 1])]);
        assert!(Oracle::is_parallel_at_depth(&tree, &dep, 0).unwrap());
        assert!(Oracle::is_parallel_at_depth(&tree, &dep, 1).unwrap());
        assert!(!Oracle::is_parallel_at_depth(&tree, &dep, 2).unwrap());
    }

    #[test]
    fn cursor_smoke_builds_and_navigates() {
        let cur = Cursor::new(ijk_identity_tree()).unwrap();
        assert_eq!(cur.focused().num_children(), 1);
    }
}
