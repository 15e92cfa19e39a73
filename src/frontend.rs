//! External-collaborator boundaries: the polyhedral front-end that
//! turns C source into SCoPs, and the code generator that turns a
//! final schedule back into C. Both are outside this crate's own
//! scope: the traits here are the seam the core calls through.
//! [`toy`] is a minimal in-crate stand-in used only by the example
//! binary and this crate's own tests, never a real C front-end.

use std::collections::BTreeSet;

use crate::dependence::Dependence;
use crate::error::CoreResult;
use crate::tree::{Node, StmtId};

/// One statement's pretty-printable body, as the front-end would hand
/// it to the core alongside its instance domain and access relations.
#[derive(Debug, Clone)]
pub struct Statement {
    pub id: StmtId,
    pub body: String,
}

/// Everything `extract` hands back for one SCoP.
pub struct ScopSeed {
    pub statements: Vec<Statement>,
    pub schedule: Node,
    pub dependence: Dependence,
    /// Verbatim source text for this region, re-emitted unchanged when
    /// the SCoP's schedule was never committed to.
    pub source_text: String,
}

/// `extract(source_path) -> [SCoP]`.
pub trait Frontend {
    fn extract(&self, source_path: &str) -> CoreResult<Vec<ScopSeed>>;
}

/// Produces C text for one SCoP's (possibly rewritten) schedule.
pub trait CodeGenerator {
    fn generate(&self, statements: &[Statement], schedule: &Node) -> CoreResult<String>;
}

/// A minimal front-end/code-generator pair good enough to exercise the
/// engine end to end: `extract` recognizes a handful of canned
/// fixture names instead of parsing real C, and the generator emits
/// isl-ast-flavored `for` loops (`c0`, `c1`, ... iterators, the
/// convention isl's own AST printer uses) from the schedule tree,
/// without attempting real C declaration/macro synthesis (that is the
/// real code generator's job).
pub mod toy {
    use super::*;
    use crate::error::CoreError;
    use crate::kernel::{AffineExpr, Dim};
    use crate::tree::{Band, LoopType};

    pub struct ToyFrontend;

    impl Frontend for ToyFrontend {
        fn extract(&self, source_path: &str) -> CoreResult<Vec<ScopSeed>> {
            match source_path {
                "gemm.c" => Ok(vec![gemm_seed()]),
                "matmul.c" => Ok(vec![matmul_seed()]),
                "two_loops.c" => Ok(vec![two_loops_seed()]),
                "nested_ijk.c" => Ok(vec![nested_ijk_seed()]),
                other => Err(CoreError::InputError {
                    path: other.into(),
                    reason: "no SCoP recognized (the toy front-end only knows its fixture names)".into(),
                }),
            }
        }
    }

    /// `C[i][j] += A[i][k] * B[k][j]` triply nested, identity schedule.
    pub fn gemm_seed() -> ScopSeed {
        let id = StmtId(0);
        let stmts: BTreeSet<StmtId> = [id].into_iter().collect();
        let schedule = Node::Domain {
            stmts: stmts.clone(),
            child: Box::new(Node::Filter {
                stmts,
                child: Box::new(Node::Band(Band::new(
                    vec![
                        Dim::Affine(AffineExpr::coordinate(3, 0)),
                        Dim::Affine(AffineExpr::coordinate(3, 1)),
                        Dim::Affine(AffineExpr::coordinate(3, 2)),
                    ],
                    Some("S0".into()),
                    Node::Leaf,
                ))),
            }),
        };
        let dependence = Dependence::new(vec![crate::dependence::DependenceEdge::new(id, id, vec![0, 0, 1])]);
        ScopSeed {
            statements: vec![Statement { id, body: "C[i][j] += A[i][k] * B[k][j];".into() }],
            schedule,
            dependence,
            source_text: "for (i = 0; i < N; i++)\n  for (j = 0; j < N; j++)\n    for (k = 0; k < N; k++)\n      C[i][j] += A[i][k] * B[k][j];\n".into(),
        }
    }

    /// Matmul whose only carried dependence runs along `k` (the
    /// accumulator), making the `j` band parallel.
    pub fn matmul_seed() -> ScopSeed {
        let id = StmtId(0);
        let stmts: BTreeSet<StmtId> = [id].into_iter().collect();
        let schedule = Node::Domain {
            stmts: stmts.clone(),
            child: Box::new(Node::Filter {
                stmts,
                child: Box::new(Node::Band(Band::new(
                    vec![
                        Dim::Affine(AffineExpr::coordinate(3, 0)),
                        Dim::Affine(AffineExpr::coordinate(3, 1)),
                        Dim::Affine(AffineExpr::coordinate(3, 2)),
                    ],
                    Some("S0".into()),
                    Node::Leaf,
                ))),
            }),
        };
        let dependence = Dependence::new(vec![crate::dependence::DependenceEdge::new(id, id, vec![0, 0, 1])]);
        ScopSeed {
            statements: vec![Statement { id, body: "C[i][j] += A[i][k] * B[k][j];".into() }],
            schedule,
            dependence,
            source_text: "for (i = 0; i < N; i++)\n  for (j = 0; j < N; j++)\n    for (k = 0; k < N; k++)\n      C[i][j] += A[i][k] * B[k][j];\n".into(),
        }
    }

    /// `C[i][j] += A[i][k] * B[k][j]` as three separately nested 1-D
    /// bands (`i` outermost, `k` innermost), the shape `interchange`
    /// and `set_parallel` act on one loop at a time.
    pub fn nested_ijk_seed() -> ScopSeed {
        let id = StmtId(0);
        let stmts: BTreeSet<StmtId> = [id].into_iter().collect();
        let band_k = Node::Band(Band::new(vec![Dim::Affine(AffineExpr::coordinate(3, 2))], Some("S0".into()), Node::Leaf));
        let band_j = Node::Band(Band::new(vec![Dim::Affine(AffineExpr::coordinate(3, 1))], Some("S0".into()), band_k));
        let band_i = Node::Band(Band::new(vec![Dim::Affine(AffineExpr::coordinate(3, 0))], Some("S0".into()), band_j));
        let schedule = Node::Domain {
            stmts: stmts.clone(),
            child: Box::new(Node::Filter { stmts, child: Box::new(band_i) }),
        };
        // Carried on j (positive) and anti-carried on k (negative).
        // Legal under i,j,k (j dominates first); illegal if k is moved
        // ahead of j, since k's -1 would then come first.
        let dependence = Dependence::new(vec![crate::dependence::DependenceEdge::new(id, id, vec![0, 1, -1])]);
        ScopSeed {
            statements: vec![Statement { id, body: "C[i][j] += A[i][k] * B[k][j];".into() }],
            schedule,
            dependence,
            source_text: "for (i = 0; i < N; i++)\n  for (j = 0; j < N; j++)\n    for (k = 0; k < N; k++)\n      C[i][j] += A[i][k] * B[k][j];\n".into(),
        }
    }

    /// Two independent statements over disjoint domains, no cross
    /// dependence.
    pub fn two_loops_seed() -> ScopSeed {
        let a = StmtId(0);
        let b = StmtId(1);
        let schedule = Node::Domain {
            stmts: [a, b].into_iter().collect(),
            child: Box::new(Node::Sequence {
                children: vec![
                    Node::Filter {
                        stmts: [a].into_iter().collect(),
                        child: Box::new(Node::Band(Band::new(
                            vec![Dim::Affine(AffineExpr::coordinate(1, 0))],
                            Some("A".into()),
                            Node::Leaf,
                        ))),
                    },
                    Node::Filter {
                        stmts: [b].into_iter().collect(),
                        child: Box::new(Node::Band(Band::new(
                            vec![Dim::Affine(AffineExpr::coordinate(1, 0))],
                            Some("B".into()),
                            Node::Leaf,
                        ))),
                    },
                ],
            }),
        };
        ScopSeed {
            statements: vec![
                Statement { id: a, body: "x[i] = x[i] + 1;".into() },
                Statement { id: b, body: "y[i] = y[i] * 2;".into() },
            ],
            schedule,
            dependence: Dependence::default(),
            source_text: "for (i = 0; i < N; i++) x[i] = x[i] + 1;\nfor (i = 0; i < N; i++) y[i] = y[i] * 2;\n".into(),
        }
    }

    pub struct ToyCodeGenerator;

    impl CodeGenerator for ToyCodeGenerator {
        fn generate(&self, statements: &[Statement], schedule: &Node) -> CoreResult<String> {
            let mut out = String::new();
            let active: BTreeSet<StmtId> = statements.iter().map(|s| s.id).collect();
            emit(schedule, &active, statements, 0, &mut out);
            Ok(out)
        }
    }

    fn indent(depth: usize) -> String {
        "  ".repeat(depth)
    }

    fn emit(node: &Node, active: &BTreeSet<StmtId>, statements: &[Statement], depth: usize, out: &mut String) {
        match node {
            Node::Domain { child, .. } | Node::Context { child } => emit(child, active, statements, depth, out),
            Node::Mark { label, child } => {
                out.push_str(&format!("{}/* {} */\n", indent(depth), label));
                emit(child, active, statements, depth, out);
            }
            Node::Filter { stmts, child } => emit(child, stmts, statements, depth, out),
            Node::Sequence { children } | Node::Set { children } => {
                for c in children {
                    emit(c, active, statements, depth, out);
                }
            }
            Node::Band(b) => {
                let mut counter = depth;
                for dim in &b.schedule {
                    let var = format!("c{counter}");
                    let (bound, step) = match dim {
                        Dim::Affine(_) => ("N".to_string(), 1),
                        Dim::TileOuter { tile_size, .. } => ("N".to_string(), *tile_size),
                        Dim::TileInner { tile_size, .. } => (tile_size.to_string(), 1),
                        Dim::SequencePosition(_) => ("1".to_string(), 1),
                    };
                    out.push_str(&format!(
                        "{}for (int {var} = 0; {var} < {bound}; {var} += {step}) {{\n",
                        indent(counter)
                    ));
                    counter += 1;
                }
                emit(&b.child, active, statements, counter, out);
                for d in (depth..counter).rev() {
                    out.push_str(&format!("{}}}\n", indent(d)));
                }
            }
            Node::Leaf => {
                for s in statements {
                    if active.contains(&s.id) {
                        out.push_str(&format!("{}{}\n", indent(depth), s.body));
                    }
                }
            }
        }
    }

    /// Emits the AST-build loop-type annotations that would otherwise
    /// be invisible in the plain `for` text above (used by tests that
    /// assert `set_loop_opt`/`set_parallel` took effect).
    pub fn loop_type_trace(schedule: &Node) -> Vec<LoopType> {
        let mut out = Vec::new();
        fn walk(node: &Node, out: &mut Vec<LoopType>) {
            match node {
                Node::Domain { child, .. } | Node::Context { child } | Node::Mark { child, .. } => walk(child, out),
                Node::Filter { child, .. } => walk(child, out),
                Node::Sequence { children } | Node::Set { children } => {
                    for c in children {
                        walk(c, out);
                    }
                }
                Node::Band(b) => {
                    out.extend(b.loop_type.iter().copied());
                    walk(&b.child, out);
                }
                Node::Leaf => {}
            }
        }
        walk(schedule, &mut out);
        out
    }
}
