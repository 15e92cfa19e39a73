//! Transient, structured views into a focused node: the partial
//! schedule's text, a structured loop signature, and a full subtree
//! dump.
//!
//! These are owned strings/values computed on demand, never pointers
//! into tree storage that a later mutation could invalidate. The
//! lifetime-safety concern an FFI-facing introspection call would face
//! does not arise in safe Rust, but the shape of the output (a
//! structured per-piece description, not a free-form string a driver
//! must tokenize) is kept deliberately parse-friendly.

use serde::Serialize;

use crate::kernel::Dim;
use crate::tree::{Node, NodeType};

/// One schedule dimension's structured description.
#[derive(Debug, Clone, Serialize)]
pub struct PieceSignature {
    /// Parameter-ish names (this crate has no named parameters; kept
    /// for shape-compatibility with a structured description and left
    /// empty rather than invented).
    pub parameters: Vec<String>,
    /// One identifier per input iteration coordinate.
    pub variables: Vec<String>,
    /// Human-readable expression text for this piece.
    pub expr: String,
}

/// The full structured loop signature of a Band (one entry per
/// dimension, a "piece" is per-dimension here since this crate's
/// bands carry a single schedule piece each).
#[derive(Debug, Clone, Serialize, Default)]
pub struct LoopSignature {
    pub pieces: Vec<PieceSignature>,
}

fn var_name(i: usize) -> String {
    // i, j, k, then i3, i4, ...
    match i {
        0 => "i".into(),
        1 => "j".into(),
        2 => "k".into(),
        n => format!("i{n}"),
    }
}

fn dim_expr_text(dim: &Dim) -> String {
    match dim {
        Dim::Affine(a) => affine_text(a),
        Dim::TileOuter { inner, tile_size } => format!("floor({} / {tile_size})", affine_text(inner)),
        Dim::TileInner { inner, tile_size } => format!("({}) mod {tile_size}", affine_text(inner)),
        Dim::SequencePosition(p) => format!("{p}"),
    }
}

fn affine_text(a: &crate::kernel::AffineExpr) -> String {
    let mut terms = Vec::new();
    for (i, c) in a.coeffs.iter().enumerate() {
        if *c == 0 {
            continue;
        }
        terms.push(match *c {
            1 => var_name(i),
            -1 => format!("-{}", var_name(i)),
            c => format!("{c}*{}", var_name(i)),
        });
    }
    if a.constant != 0 || terms.is_empty() {
        terms.push(a.constant.to_string());
    }
    terms.join(" + ")
}

/// Partial-schedule text for the focused node: empty string if it is
/// not a Band, else one expression per dimension joined by `", "`.
pub fn expr_text(node: &Node) -> String {
    match node.as_band() {
        Some(band) => band.schedule.iter().map(dim_expr_text).collect::<Vec<_>>().join(", "),
        None => String::new(),
    }
}

/// Structured per-dimension loop signature: empty if not a Band.
pub fn loop_signature(node: &Node) -> LoopSignature {
    let Some(band) = node.as_band() else {
        return LoopSignature::default();
    };
    let pieces = band
        .schedule
        .iter()
        .map(|dim| {
            let ndim = dim.ndim();
            PieceSignature {
                parameters: Vec::new(),
                variables: (0..ndim).map(var_name).collect(),
                expr: dim_expr_text(dim),
            }
        })
        .collect();
    LoopSignature { pieces }
}

/// Full subtree dump rooted at `node`, indented by depth.
pub fn dump_tree(node: &Node) -> String {
    let mut out = String::new();
    dump_rec(node, 0, &mut out);
    out
}

fn dump_rec(node: &Node, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match node.node_type() {
        NodeType::Domain => out.push_str(&format!("{indent}domain\n")),
        NodeType::Context => out.push_str(&format!("{indent}context\n")),
        NodeType::Sequence => out.push_str(&format!("{indent}sequence\n")),
        NodeType::Set => out.push_str(&format!("{indent}set\n")),
        NodeType::Leaf => out.push_str(&format!("{indent}leaf\n")),
        NodeType::Mark => {
            if let Node::Mark { label, .. } = node {
                out.push_str(&format!("{indent}mark(\"{label}\")\n"));
            }
        }
        NodeType::Filter => {
            if let Node::Filter { stmts, .. } = node {
                let names: Vec<String> = stmts.iter().map(|s| format!("S{}", s.0)).collect();
                out.push_str(&format!("{indent}filter {{ {} }}\n", names.join(", ")));
            }
        }
        NodeType::Band => {
            let band = node.as_band().unwrap();
            out.push_str(&format!(
                "{indent}band [{}] permutable={} coincident={:?} loop_type={:?}\n",
                expr_text(node),
                band.permutable,
                band.coincident,
                band.loop_type,
            ));
        }
    }
    for i in 0..node.num_children() {
        dump_rec(node.child(i).unwrap(), depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::AffineExpr;
    use crate::tree::{Band, Cursor};

    #[test]
    fn expr_text_is_empty_for_non_band() {
        assert_eq!(expr_text(&Node::Leaf), "");
    }

    #[test]
    fn expr_text_renders_affine_dims() {
        let band = Node::Band(Band::new(
            vec![Dim::Affine(AffineExpr::new(vec![1, 0], 0)), Dim::Affine(AffineExpr::new(vec![0, 1], 3))],
            Some("S".into()),
            Node::Leaf,
        ));
        assert_eq!(expr_text(&band), "i, j + 3");
    }

    #[test]
    fn loop_signature_has_one_piece_per_dim() {
        let band = Node::Band(Band::new(
            vec![Dim::Affine(AffineExpr::coordinate(2, 0)), Dim::Affine(AffineExpr::coordinate(2, 1))],
            Some("S".into()),
            Node::Leaf,
        ));
        let sig = loop_signature(&band);
        assert_eq!(sig.pieces.len(), 2);
        assert_eq!(sig.pieces[0].variables, vec!["i", "j"]);
    }

    #[test]
    fn dump_tree_reaches_the_leaf() {
        let stmts = [crate::tree::StmtId(0)].into_iter().collect::<std::collections::BTreeSet<_>>();
        let tree = Node::Domain {
            stmts: stmts.clone(),
            child: Box::new(Node::Filter { stmts, child: Box::new(Node::Leaf) }),
        };
        let cur = Cursor::new(tree).unwrap();
        let text = dump_tree(cur.root());
        assert!(text.contains("domain"));
        assert!(text.contains("leaf"));
    }
}
