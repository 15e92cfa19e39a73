//! Transformation primitives. Each function consumes a [`Cursor`] (and
//! parameters) and returns a new one focused according to the
//! primitive's own rule, or a [`CoreError::PreconditionViolation`] if
//! the focused node does not satisfy the primitive's precondition.
//!
//! None of these check dependence legality. That is the oracle's
//! job, invoked by [`crate::session::Session`] on commit.

use std::collections::BTreeSet;

use tracing::trace;

use crate::error::{CoreError, CoreResult};
use crate::kernel::{AffineExpr, Dim};
use crate::tree::{Band, Cursor, LoopType, Node};

fn precondition(primitive: &'static str, reason: impl Into<String>) -> CoreError {
    CoreError::PreconditionViolation { primitive, reason: reason.into() }
}

fn focused_band<'a>(cursor: &'a Cursor, primitive: &'static str) -> CoreResult<&'a Band> {
    cursor
        .focused()
        .as_band()
        .ok_or_else(|| precondition(primitive, "focused node is not a Band"))
}

/// Tiles every dimension of the focused 1-D-or-wider band by `tile_size`,
/// replacing it with a two-level band tower. Focus remains on the
/// (new) outer band.
pub fn tile(cursor: Cursor, tile_size: i64) -> CoreResult<Cursor> {
    if tile_size <= 0 {
        return Err(precondition("tile", "tile_size must be positive"));
    }
    let band = focused_band(&cursor, "tile")?.clone();
    let mut affines = Vec::with_capacity(band.ndim());
    for d in &band.schedule {
        match d {
            Dim::Affine(a) => affines.push(a.clone()),
            _ => {
                return Err(precondition(
                    "tile",
                    "tile requires every band dimension to be a plain affine expression",
                ))
            }
        }
    }
    let outer_schedule: Vec<Dim> = affines
        .iter()
        .map(|a| Dim::TileOuter { inner: a.clone(), tile_size })
        .collect();
    let inner_schedule: Vec<Dim> = affines
        .into_iter()
        .map(|a| Dim::TileInner { inner: a, tile_size })
        .collect();
    let inner_band = Node::Band(Band::new(inner_schedule, band.tuple_id.clone(), (*band.child).clone()));
    let outer_band = Node::Band(Band::new(outer_schedule, band.tuple_id, inner_band));
    trace!(tile_size, "tile");
    cursor.replace_focused(outer_band)
}

/// Swaps the partial schedules (and annotations) of the focused Band
/// and its direct Band child. Focus stays at the same path, which now
/// carries the formerly-inner band's content.
pub fn interchange(cursor: Cursor) -> CoreResult<Cursor> {
    let outer = focused_band(&cursor, "interchange")?.clone();
    let inner = outer
        .child
        .as_band()
        .ok_or_else(|| precondition("interchange", "focused band's sole child must be a Band"))?
        .clone();
    let new_inner = Node::Band(Band {
        schedule: outer.schedule,
        coincident: outer.coincident,
        permutable: outer.permutable,
        loop_type: outer.loop_type,
        tuple_id: outer.tuple_id,
        child: inner.child,
    });
    let new_outer = Node::Band(Band {
        schedule: inner.schedule,
        coincident: inner.coincident,
        permutable: inner.permutable,
        loop_type: inner.loop_type,
        tuple_id: inner.tuple_id,
        child: Box::new(new_inner),
    });
    trace!("interchange");
    cursor.replace_focused(new_outer)
}

/// Fuses filter children `i1` and `i2` of the focused Sequence/Set
/// into one filter carrying a unioned band. Each chosen child must be
/// `Filter -> Band(1-D) -> ...`. Focus
/// returns to the (new) outer Sequence.
pub fn fuse(cursor: Cursor, i1: usize, i2: usize) -> CoreResult<Cursor> {
    if i1 >= i2 {
        return Err(precondition("fuse", "fuse requires i1 < i2"));
    }
    let focused = cursor.focused();
    let children = match focused {
        Node::Sequence { children } | Node::Set { children } => children,
        _ => return Err(precondition("fuse", "focused node must be a Sequence or Set")),
    };
    if i2 >= children.len() {
        return Err(precondition("fuse", format!("index {i2} out of range ({} children)", children.len())));
    }
    let (stmts1, band1) = filter_band(&children[i1], "fuse")?;
    let (stmts2, band2) = filter_band(&children[i2], "fuse")?;
    if band1.ndim() != 1 || band2.ndim() != 1 {
        return Err(precondition("fuse", "both bands must carry a 1-D partial schedule"));
    }
    let a1 = match &band1.schedule[0] {
        Dim::Affine(a) => a.clone(),
        _ => return Err(precondition("fuse", "fuse only supports plain affine band dimensions")),
    };
    let a2 = match &band2.schedule[0] {
        Dim::Affine(a) => a.clone(),
        _ => return Err(precondition("fuse", "fuse only supports plain affine band dimensions")),
    };
    if a1.ndim() != a2.ndim() {
        return Err(precondition("fuse", "the two bands' parameter spaces do not align"));
    }

    let mut union_stmts: BTreeSet<_> = stmts1.clone();
    union_stmts.extend(stmts2.iter().copied());

    let inner_seq = Node::Sequence {
        children: vec![
            Node::Filter { stmts: stmts1.clone(), child: band1.child.clone() },
            Node::Filter { stmts: stmts2.clone(), child: band2.child.clone() },
        ],
    };
    // Tie-break: adopt the first band's output-tuple identifier.
    let fused_band = Node::Band(Band::new(vec![Dim::Affine(a1)], band1.tuple_id.clone(), inner_seq));
    let fused_filter = Node::Filter { stmts: union_stmts, child: Box::new(fused_band) };

    let mut new_children = Vec::with_capacity(children.len() - 1);
    for (idx, child) in children.iter().enumerate() {
        if idx == i1 {
            new_children.push(fused_filter.clone());
        } else if idx == i2 {
            continue;
        } else {
            new_children.push(child.clone());
        }
    }
    trace!(i1, i2, "fuse");
    cursor.replace_focused(Node::Sequence { children: new_children })
}

fn filter_band(node: &Node, primitive: &'static str) -> CoreResult<(BTreeSet<crate::tree::StmtId>, Band)> {
    match node {
        Node::Filter { stmts, child } => match child.as_ref() {
            Node::Band(b) => Ok((stmts.clone(), b.clone())),
            _ => Err(precondition(primitive, "filter child is not a Band")),
        },
        _ => Err(precondition(primitive, "Sequence/Set child is not a Filter")),
    }
}

/// Multiplies every output dimension of the focused band by `factor`.
pub fn scale(cursor: Cursor, factor: i64) -> CoreResult<Cursor> {
    if factor <= 0 {
        return Err(precondition("scale", "scale must be positive"));
    }
    let mut band = focused_band(&cursor, "scale")?.clone();
    for d in band.schedule.iter_mut() {
        match d {
            Dim::Affine(a) => *a = a.scale(factor),
            _ => return Err(precondition("scale", "scale only supports plain affine band dimensions")),
        }
    }
    trace!(factor, "scale");
    cursor.replace_focused(Node::Band(band))
}

fn require_1d_affine(cursor: &Cursor, primitive: &'static str) -> CoreResult<AffineExpr> {
    let band = focused_band(cursor, primitive)?;
    if band.ndim() != 1 {
        return Err(precondition(primitive, "shift requires a 1-D band"));
    }
    match &band.schedule[0] {
        Dim::Affine(a) => Ok(a.clone()),
        _ => Err(precondition(primitive, "shift only supports a plain affine band dimension")),
    }
}

fn replace_sole_dim(cursor: Cursor, new_expr: AffineExpr) -> CoreResult<Cursor> {
    let mut band = cursor.focused().as_band().expect("checked by caller").clone();
    band.schedule[0] = Dim::Affine(new_expr);
    cursor.replace_focused(Node::Band(band))
}

fn require_single_piece(primitive: &'static str, pa_idx: usize) -> CoreResult<()> {
    if pa_idx != 0 {
        return Err(precondition(
            primitive,
            "this crate models a band's partial schedule as a single piece; pa_idx must be 0",
        ));
    }
    Ok(())
}

/// `partial_shift_val(pa_idx, v)`: add constant `v`, restricted to piece `pa_idx`.
pub fn partial_shift_val(cursor: Cursor, pa_idx: usize, v: i64) -> CoreResult<Cursor> {
    require_single_piece("partial_shift_val", pa_idx)?;
    let a = require_1d_affine(&cursor, "partial_shift_val")?;
    trace!(pa_idx, v, "partial_shift_val");
    replace_sole_dim(cursor, a.add_constant(v))
}

/// `full_shift_val(v)`: add constant `v` everywhere.
pub fn full_shift_val(cursor: Cursor, v: i64) -> CoreResult<Cursor> {
    let a = require_1d_affine(&cursor, "full_shift_val")?;
    trace!(v, "full_shift_val");
    replace_sole_dim(cursor, a.add_constant(v))
}

/// `partial_shift_var(pa_idx, k)`: add input coordinate `k`, restricted to piece `pa_idx`.
pub fn partial_shift_var(cursor: Cursor, pa_idx: usize, k: usize) -> CoreResult<Cursor> {
    require_single_piece("partial_shift_var", pa_idx)?;
    let a = require_1d_affine(&cursor, "partial_shift_var")?;
    if k >= a.ndim() {
        return Err(precondition("partial_shift_var", "input dimension k out of range"));
    }
    trace!(pa_idx, k, "partial_shift_var");
    replace_sole_dim(cursor, a.add_coordinate(k))
}

/// `full_shift_var(k)`: add input coordinate `k` everywhere.
pub fn full_shift_var(cursor: Cursor, k: usize) -> CoreResult<Cursor> {
    let a = require_1d_affine(&cursor, "full_shift_var")?;
    if k >= a.ndim() {
        return Err(precondition("full_shift_var", "input dimension k out of range"));
    }
    trace!(k, "full_shift_var");
    replace_sole_dim(cursor, a.add_coordinate(k))
}

/// Annotates dimension `dim` of the focused band as candidate-parallel.
/// Does not itself check legality. [`crate::session::Session::set_parallel`]
/// consults [`crate::oracle::Oracle::is_parallel_at_depth`] before
/// committing this mark.
pub fn mark_parallel(cursor: Cursor, dim: usize) -> CoreResult<Cursor> {
    let mut band = focused_band(&cursor, "set_parallel")?.clone();
    if dim >= band.ndim() {
        return Err(precondition("set_parallel", "dimension index out of range"));
    }
    band.coincident[dim] = true;
    trace!(dim, "mark_parallel");
    cursor.replace_focused(Node::Band(band))
}

/// Sets the AST-build loop type annotation for dimension `dim` of the
/// focused band. Purely a codegen directive; no legality gate.
pub fn set_loop_type(cursor: Cursor, dim: usize, loop_type: LoopType) -> CoreResult<Cursor> {
    let mut band = focused_band(&cursor, "set_loop_opt")?.clone();
    if dim >= band.ndim() {
        return Err(precondition("set_loop_opt", "dimension index out of range"));
    }
    band.loop_type[dim] = loop_type;
    trace!(dim, ?loop_type, "set_loop_type");
    cursor.replace_focused(Node::Band(band))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Cursor, NodeType, StmtId};
    use std::collections::BTreeSet;

    fn stmt(id: u32) -> BTreeSet<StmtId> {
        [StmtId(id)].into_iter().collect()
    }

    fn one_dim_tree(coeff: i64, constant: i64) -> Node {
        let stmts = stmt(0);
        Node::Domain {
            stmts: stmts.clone(),
            child: Box::new(Node::Filter {
                stmts,
                child: Box::new(Node::Band(Band::new(
                    vec![Dim::Affine(AffineExpr::new(vec![coeff], constant))],
                    Some("S".into()),
                    Node::Leaf,
                ))),
            }),
        }
    }

    #[test]
    fn tile_produces_band_over_band() {
        let cur = Cursor::new(one_dim_tree(1, 0)).unwrap().goto_child(0).unwrap().goto_child(0).unwrap();
        let cur = tile(cur, 32).unwrap();
        assert_eq!(cur.focused().node_type(), NodeType::Band);
        let inner = cur.focused().child(0).unwrap();
        assert_eq!(inner.node_type(), NodeType::Band);
        assert!(matches!(inner.as_band().unwrap().schedule[0], Dim::TileInner { tile_size: 32, .. }));
    }

    #[test]
    fn tile_then_flatten_recovers_original_value() {
        let cur = Cursor::new(one_dim_tree(1, 0)).unwrap().goto_child(0).unwrap().goto_child(0).unwrap();
        let cur = tile(cur, 8).unwrap();
        let outer = cur.focused().as_band().unwrap();
        let inner = outer.child.as_band().unwrap();
        for x in 0..40i64 {
            let o = outer.schedule[0].eval(&[x]);
            let i = inner.schedule[0].eval(&[x]);
            assert_eq!(o * 8 + i, x);
        }
    }

    #[test]
    fn interchange_is_an_involution() {
        let tree = Node::Domain {
            stmts: stmt(0),
            child: Box::new(Node::Filter {
                stmts: stmt(0),
                child: Box::new(Node::Band(Band::new(
                    vec![Dim::Affine(AffineExpr::coordinate(2, 0))],
                    Some("S".into()),
                    Node::Band(Band::new(
                        vec![Dim::Affine(AffineExpr::coordinate(2, 1))],
                        Some("S".into()),
                        Node::Leaf,
                    )),
                ))),
            }),
        };
        let cur = Cursor::new(tree).unwrap().goto_child(0).unwrap().goto_child(0).unwrap();
        let original = cur.focused().clone();
        let once = interchange(cur).unwrap();
        let twice = interchange(once).unwrap();
        let a: Vec<_> = original.as_band().unwrap().schedule.clone();
        let b: Vec<_> = twice.focused().as_band().unwrap().schedule.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn tile_rejects_non_band_focus() {
        let cur = Cursor::new(one_dim_tree(1, 0)).unwrap();
        assert!(tile(cur, 4).is_err());
    }

    #[test]
    fn scale_by_one_is_a_no_op() {
        let cur = Cursor::new(one_dim_tree(3, 5)).unwrap().goto_child(0).unwrap().goto_child(0).unwrap();
        let before = cur.focused().as_band().unwrap().schedule.clone();
        let after = scale(cur, 1).unwrap();
        assert_eq!(before, after.focused().as_band().unwrap().schedule);
    }

    #[test]
    fn shift_then_negate_is_identity() {
        let cur = Cursor::new(one_dim_tree(1, 0)).unwrap().goto_child(0).unwrap().goto_child(0).unwrap();
        let before = cur.focused().as_band().unwrap().schedule.clone();
        let cur = partial_shift_val(cur, 0, 5).unwrap();
        let cur = partial_shift_val(cur, 0, -5).unwrap();
        assert_eq!(before, cur.focused().as_band().unwrap().schedule);
    }

    #[test]
    fn fuse_unions_two_disjoint_filters() {
        let tree = Node::Domain {
            stmts: [StmtId(0), StmtId(1)].into_iter().collect(),
            child: Box::new(Node::Sequence {
                children: vec![
                    Node::Filter {
                        stmts: stmt(0),
                        child: Box::new(Node::Band(Band::new(
                            vec![Dim::Affine(AffineExpr::coordinate(1, 0))],
                            Some("A".into()),
                            Node::Leaf,
                        ))),
                    },
                    Node::Filter {
                        stmts: stmt(1),
                        child: Box::new(Node::Band(Band::new(
                            vec![Dim::Affine(AffineExpr::coordinate(1, 0))],
                            Some("B".into()),
                            Node::Leaf,
                        ))),
                    },
                ],
            }),
        };
        let cur = Cursor::new(tree).unwrap().goto_child(0).unwrap();
        let fused = fuse(cur, 0, 1).unwrap();
        match fused.focused() {
            Node::Sequence { children } => assert_eq!(children.len(), 1),
            _ => panic!("expected Sequence"),
        }
    }
}
