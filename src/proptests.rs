//! Property-based tests for the schedule-tree transformation engine's
//! universal invariants: idempotent no-ops, tile inversion, and
//! interchange involution, checked over randomly generated band
//! coefficients/constants/tile sizes rather than the single fixed
//! example each `#[cfg(test)] mod tests` block spot-checks.

use proptest::prelude::*;

use crate::kernel::{AffineExpr, Dim};
use crate::primitives;
use crate::tree::{Band, Cursor, Node, StmtId};

fn one_dim_cursor(coeff: i64, constant: i64) -> Cursor {
    let stmts: std::collections::BTreeSet<_> = [StmtId(0)].into_iter().collect();
    let tree = Node::Domain {
        stmts: stmts.clone(),
        child: Box::new(Node::Filter {
            stmts,
            child: Box::new(Node::Band(Band::new(
                vec![Dim::Affine(AffineExpr::new(vec![coeff], constant))],
                Some("S".into()),
                Node::Leaf,
            ))),
        }),
    };
    Cursor::new(tree).unwrap().goto_child(0).unwrap().goto_child(0).unwrap()
}

fn two_band_cursor(c0: i64, k0: i64, c1: i64, k1: i64) -> Cursor {
    let stmts: std::collections::BTreeSet<_> = [StmtId(0)].into_iter().collect();
    let tree = Node::Domain {
        stmts: stmts.clone(),
        child: Box::new(Node::Filter {
            stmts,
            child: Box::new(Node::Band(Band::new(
                vec![Dim::Affine(AffineExpr::new(vec![c0, 0], k0))],
                Some("S".into()),
                Node::Band(Band::new(
                    vec![Dim::Affine(AffineExpr::new(vec![0, c1], k1))],
                    Some("S".into()),
                    Node::Leaf,
                )),
            ))),
        }),
    };
    Cursor::new(tree).unwrap().goto_child(0).unwrap().goto_child(0).unwrap()
}

proptest! {
    /// `scale(node, 1)` never changes a band's schedule expression.
    #[test]
    fn scale_by_one_is_identity(coeff in -20i64..20, constant in -20i64..20) {
        let cur = one_dim_cursor(coeff, constant);
        let before = cur.focused().as_band().unwrap().schedule.clone();
        let after = primitives::scale(cur, 1).unwrap();
        prop_assert_eq!(before, after.focused().as_band().unwrap().schedule.clone());
    }

    /// Shifting by `v` and then by `-v` recovers the original band.
    #[test]
    fn shift_then_negate_is_identity(coeff in -20i64..20, constant in -20i64..20, v in -50i64..50) {
        let cur = one_dim_cursor(coeff, constant);
        let before = cur.focused().as_band().unwrap().schedule.clone();
        let cur = primitives::partial_shift_val(cur, 0, v).unwrap();
        let cur = primitives::partial_shift_val(cur, 0, -v).unwrap();
        prop_assert_eq!(before, cur.focused().as_band().unwrap().schedule.clone());
    }

    /// Full-shift by a coordinate adds that coordinate's value at every
    /// input point (`shift_var(k)` has no opposite-sign counterpart, so
    /// the check is done pointwise instead of on the raw expression).
    #[test]
    fn full_shift_var_then_negating_coordinate_scale_cancels_pointwise(
        coeff in -10i64..10, constant in -10i64..10, point in -30i64..30,
    ) {
        let cur = one_dim_cursor(coeff, constant);
        let before = cur.focused().as_band().unwrap().schedule[0].eval(&[point]);
        let cur = primitives::full_shift_var(cur, 0).unwrap();
        let shifted = cur.focused().as_band().unwrap().schedule[0].eval(&[point]);
        prop_assert_eq!(shifted, before + point);
    }

    /// Tiling by `t` then recombining `outer * t + inner` recovers the
    /// original affine value at every point.
    #[test]
    fn tile_inversion_recovers_original(
        coeff in -10i64..10, constant in -10i64..10, t in 1i64..16, x in -40i64..40,
    ) {
        let cur = one_dim_cursor(coeff, constant);
        let original = cur.focused().as_band().unwrap().schedule[0].eval(&[x]);
        let tiled = primitives::tile(cur, t).unwrap();
        let outer = tiled.focused().as_band().unwrap();
        let inner = outer.child.as_band().unwrap();
        let o = outer.schedule[0].eval(&[x]);
        let i = inner.schedule[0].eval(&[x]);
        prop_assert_eq!(o * t + i, original);
    }

    /// Applying `interchange` twice to a Band-over-Band tower returns a
    /// tree whose schedule dimensions equal the original.
    #[test]
    fn interchange_twice_is_identity(
        c0 in -10i64..10, k0 in -10i64..10, c1 in -10i64..10, k1 in -10i64..10,
    ) {
        let cur = two_band_cursor(c0, k0, c1, k1);
        let original = cur.focused().as_band().unwrap().schedule.clone();
        let once = primitives::interchange(cur).unwrap();
        let twice = primitives::interchange(once).unwrap();
        prop_assert_eq!(original, twice.focused().as_band().unwrap().schedule.clone());
    }
}
