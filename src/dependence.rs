//! The dependence relation a SCoP is checked against.
//!
//! The general model is a relation over arbitrary statement instances.
//! This crate works with its common restriction to **uniform
//! dependences**: every edge between two statements is a constant
//! distance vector in the shared iteration space, which is exact for
//! the affine (and tile-paired) schedules this crate produces and is
//! the textbook representation used for kernels like `gemm` or
//! `matmul` (see DESIGN.md).

use crate::tree::StmtId;

/// One may-dependence: an instance of `sink` at iteration point
/// `p + distance` depends on the instance of `source` at `p`, for
/// every `p` in the shared iteration space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependenceEdge {
    pub source: StmtId,
    pub sink: StmtId,
    pub distance: Vec<i64>,
}

impl DependenceEdge {
    pub fn new(source: StmtId, sink: StmtId, distance: Vec<i64>) -> Self {
        DependenceEdge { source, sink, distance }
    }
}

/// The full may-dependence relation for one SCoP: the union of
/// may-read/may-write/must-write derived edges the front-end computed
/// against the original schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependence {
    pub edges: Vec<DependenceEdge>,
}

impl Dependence {
    pub fn new(edges: Vec<DependenceEdge>) -> Self {
        Dependence { edges }
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
