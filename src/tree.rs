//! Schedule trees: the rooted, ordered tree of tagged-union nodes,
//! plus the cursor (root-relative path + owning tree) that focuses
//! one node.

use std::collections::BTreeSet;

use crate::error::{CoreError, CoreResult};
use crate::kernel::Dim;

/// Identifier of one statement in a SCoP's statement list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StmtId(pub u32);

/// AST-build loop type annotation for one band dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopType {
    Default,
    Atomic,
    Unroll,
    Separate,
    Parallel,
}

impl Default for LoopType {
    fn default() -> Self {
        LoopType::Default
    }
}

/// Node type tag, returned verbatim by the driver's `get_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Domain,
    Context,
    Band,
    Sequence,
    Set,
    Filter,
    Mark,
    Leaf,
}

/// A band node's full annotation set: coincident, permutable, AST
/// loop type, plus the partial schedule itself.
#[derive(Debug, Clone)]
pub struct Band {
    pub schedule: Vec<Dim>,
    pub coincident: Vec<bool>,
    pub permutable: bool,
    pub loop_type: Vec<LoopType>,
    pub tuple_id: Option<String>,
    pub child: Box<Node>,
}

impl Band {
    pub fn new(schedule: Vec<Dim>, tuple_id: Option<String>, child: Node) -> Self {
        let n = schedule.len();
        Band {
            schedule,
            coincident: vec![false; n],
            permutable: n > 1,
            loop_type: vec![LoopType::Default; n],
            tuple_id,
            child: Box::new(child),
        }
    }

    pub fn ndim(&self) -> usize {
        self.schedule.len()
    }
}

/// A schedule-tree node. See the module invariants below for the
/// contract each variant must satisfy.
#[derive(Debug, Clone)]
pub enum Node {
    Domain { stmts: BTreeSet<StmtId>, child: Box<Node> },
    Context { child: Box<Node> },
    Band(Band),
    Sequence { children: Vec<Node> },
    Set { children: Vec<Node> },
    Filter { stmts: BTreeSet<StmtId>, child: Box<Node> },
    Mark { label: String, child: Box<Node> },
    Leaf,
}

impl Node {
    pub fn node_type(&self) -> NodeType {
        match self {
            Node::Domain { .. } => NodeType::Domain,
            Node::Context { .. } => NodeType::Context,
            Node::Band(_) => NodeType::Band,
            Node::Sequence { .. } => NodeType::Sequence,
            Node::Set { .. } => NodeType::Set,
            Node::Filter { .. } => NodeType::Filter,
            Node::Mark { .. } => NodeType::Mark,
            Node::Leaf => NodeType::Leaf,
        }
    }

    pub fn num_children(&self) -> usize {
        match self {
            Node::Domain { .. }
            | Node::Context { .. }
            | Node::Band(_)
            | Node::Filter { .. }
            | Node::Mark { .. } => 1,
            Node::Sequence { children } | Node::Set { children } => children.len(),
            Node::Leaf => 0,
        }
    }

    pub fn child(&self, idx: usize) -> Option<&Node> {
        match self {
            Node::Domain { child, .. }
            | Node::Context { child }
            | Node::Filter { child, .. }
            | Node::Mark { child, .. } if idx == 0 => Some(child),
            Node::Band(b) if idx == 0 => Some(&b.child),
            Node::Sequence { children } | Node::Set { children } => children.get(idx),
            _ => None,
        }
    }

    pub fn child_mut(&mut self, idx: usize) -> Option<&mut Node> {
        match self {
            Node::Domain { child, .. }
            | Node::Context { child }
            | Node::Filter { child, .. }
            | Node::Mark { child, .. } if idx == 0 => Some(child),
            Node::Band(b) if idx == 0 => Some(&mut b.child),
            Node::Sequence { children } | Node::Set { children } => children.get_mut(idx),
            _ => None,
        }
    }

    pub fn as_band(&self) -> Option<&Band> {
        match self {
            Node::Band(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_band_mut(&mut self) -> Option<&mut Band> {
        match self {
            Node::Band(b) => Some(b),
            _ => None,
        }
    }
}

/// A path from the root to a focused node: `path[0]` is the index of
/// the root's chosen child, and so on.
pub type Path = Vec<usize>;

fn node_at<'a>(root: &'a Node, path: &[usize]) -> CoreResult<&'a Node> {
    let mut node = root;
    for &idx in path {
        node = node.child(idx).ok_or_else(|| CoreError::InvariantViolation(
            format!("cursor path index {idx} has no corresponding child"),
        ))?;
    }
    Ok(node)
}

fn node_at_mut<'a>(root: &'a mut Node, path: &[usize]) -> CoreResult<&'a mut Node> {
    let mut node = root;
    for &idx in path {
        node = node.child_mut(idx).ok_or_else(|| CoreError::InvariantViolation(
            format!("cursor path index {idx} has no corresponding child"),
        ))?;
    }
    Ok(node)
}

/// An owning (tree, path) pair focusing one node. Cursors are
/// consumed by navigation and mutation: every operation takes `self`
/// by value and returns a fresh `Cursor`, so the old one cannot be
/// used after a mutation that invalidated its path.
#[derive(Debug, Clone)]
pub struct Cursor {
    tree: Node,
    path: Path,
}

impl Cursor {
    /// Build a cursor focused on the root. `root` must be a `Domain`
    /// node.
    pub fn new(root: Node) -> CoreResult<Self> {
        if !matches!(root, Node::Domain { .. }) {
            return Err(CoreError::InvariantViolation(
                "schedule tree root must be a Domain node".into(),
            ));
        }
        check_invariants(&root)?;
        Ok(Cursor { tree: root, path: Vec::new() })
    }

    pub fn focused(&self) -> &Node {
        node_at(&self.tree, &self.path).expect("cursor path is always valid by construction")
    }

    pub(crate) fn focused_mut(&mut self) -> &mut Node {
        node_at_mut(&mut self.tree, &self.path).expect("cursor path is always valid by construction")
    }

    pub fn path(&self) -> &[usize] {
        &self.path
    }

    pub fn root(&self) -> &Node {
        &self.tree
    }

    /// The composed schedule depth at which the focused node's own
    /// dimensions begin: the sum, over every strict ancestor on the
    /// path from the root, of that ancestor's contribution to
    /// [`extract_schedule`]'s flattened dimension list (a Band
    /// contributes its dimension count, a Sequence contributes one for
    /// the [`crate::kernel::Dim::SequencePosition`] it injects, a Set
    /// contributes none). Used to translate a band-local dimension
    /// index into the absolute depth the legality oracle's parallel
    /// variant expects.
    pub fn composed_depth(&self) -> usize {
        let mut node = &self.tree;
        let mut depth = 0;
        for &idx in &self.path {
            match node {
                Node::Band(b) => depth += b.ndim(),
                Node::Sequence { .. } => depth += 1,
                _ => {}
            }
            node = node.child(idx).expect("cursor path is always valid by construction");
        }
        depth
    }

    pub fn goto_root(mut self) -> Self {
        self.path.clear();
        self
    }

    pub fn goto_parent(mut self) -> CoreResult<Self> {
        if self.path.pop().is_none() {
            return Err(CoreError::NavigationError {
                direction: "parent",
                reason: "already at the root".into(),
            });
        }
        Ok(self)
    }

    pub fn goto_child(mut self, idx: usize) -> CoreResult<Self> {
        let n = self.focused().num_children();
        if idx >= n {
            return Err(CoreError::NavigationError {
                direction: "child",
                reason: format!("child index {idx} out of range (node has {n} children)"),
            });
        }
        self.path.push(idx);
        Ok(self)
    }

    /// Replace the focused node in place and re-run the structural
    /// invariant check over the whole tree. Used by every
    /// transformation primitive as its final step.
    pub(crate) fn replace_focused(mut self, new_node: Node) -> CoreResult<Self> {
        *self.focused_mut() = new_node;
        check_invariants(&self.tree)?;
        Ok(self)
    }

    /// Move focus one level deeper without changing the tree, used
    /// internally by primitives that need to address a node's child
    /// right after constructing it.
    pub(crate) fn descend(self, idx: usize) -> CoreResult<Self> {
        self.goto_child(idx)
    }
}

/// Flattens the composed partial schedule reaching `target`: every
/// Band dimension on the root-to-leaf path that contains it, in
/// order, with one extra [`Dim::SequencePosition`] injected at each
/// Sequence ancestor to encode that node's imposed order (a Set
/// imposes none, so contributes nothing).
pub fn extract_schedule(root: &Node, target: StmtId) -> CoreResult<Vec<Dim>> {
    let mut acc = Vec::new();
    if walk_schedule(root, target, &mut acc) {
        Ok(acc)
    } else {
        Err(CoreError::InvariantViolation(format!(
            "statement {:?} is not reachable from the tree root",
            target
        )))
    }
}

fn walk_schedule(node: &Node, target: StmtId, acc: &mut Vec<Dim>) -> bool {
    match node {
        Node::Domain { child, .. } | Node::Context { child } | Node::Mark { child, .. } => {
            walk_schedule(child, target, acc)
        }
        Node::Band(b) => {
            let before = acc.len();
            acc.extend(b.schedule.iter().cloned());
            if walk_schedule(&b.child, target, acc) {
                true
            } else {
                acc.truncate(before);
                false
            }
        }
        Node::Filter { stmts, child } => stmts.contains(&target) && walk_schedule(child, target, acc),
        Node::Sequence { children } => {
            for (i, c) in children.iter().enumerate() {
                let before = acc.len();
                acc.push(Dim::SequencePosition(i as i64));
                if walk_schedule(c, target, acc) {
                    return true;
                }
                acc.truncate(before);
            }
            false
        }
        Node::Set { children } => {
            for c in children {
                let before = acc.len();
                if walk_schedule(c, target, acc) {
                    return true;
                }
                acc.truncate(before);
            }
            false
        }
        Node::Leaf => true,
    }
}

/// Checks the schedule tree's structural invariants over the whole tree.
pub fn check_invariants(root: &Node) -> CoreResult<()> {
    match root {
        Node::Domain { stmts, child } => check_subtree(child, stmts),
        _ => Err(CoreError::InvariantViolation("root is not a Domain".into())),
    }
}

fn check_subtree(node: &Node, reaching: &BTreeSet<StmtId>) -> CoreResult<()> {
    match node {
        Node::Domain { .. } => Err(CoreError::InvariantViolation(
            "Domain node may only appear at the root".into(),
        )),
        Node::Context { child } => check_subtree(child, reaching),
        Node::Mark { child, .. } => check_subtree(child, reaching),
        Node::Band(b) => {
            if let Some(first) = b.schedule.first() {
                let ndim = first.ndim();
                for d in &b.schedule {
                    if d.ndim() != 0 && d.ndim() != ndim {
                        return Err(CoreError::InvariantViolation(
                            "band dimensions disagree on the iteration-space arity".into(),
                        ));
                    }
                }
            }
            if b.coincident.len() != b.ndim() || b.loop_type.len() != b.ndim() {
                return Err(CoreError::InvariantViolation(
                    "band annotation arrays do not match its dimensionality".into(),
                ));
            }
            check_subtree(&b.child, reaching)
        }
        Node::Filter { stmts, child } => {
            if !stmts.is_subset(reaching) {
                return Err(CoreError::InvariantViolation(
                    "filter restricts to instances not reaching this point of the tree".into(),
                ));
            }
            check_subtree(child, stmts)
        }
        Node::Sequence { children } | Node::Set { children } => {
            let is_set = matches!(node, Node::Set { .. });
            let mut union: BTreeSet<StmtId> = BTreeSet::new();
            for (i, child) in children.iter().enumerate() {
                let stmts = match child {
                    Node::Filter { stmts, .. } => stmts,
                    _ => {
                        return Err(CoreError::InvariantViolation(format!(
                            "child {i} of a Sequence/Set is not a Filter"
                        )))
                    }
                };
                if is_set {
                    if !union.is_disjoint(stmts) {
                        return Err(CoreError::InvariantViolation(
                            "sibling filters of a Set overlap".into(),
                        ));
                    }
                }
                union.extend(stmts.iter().copied());
                check_subtree(child, reaching)?;
            }
            if &union != reaching {
                return Err(CoreError::InvariantViolation(
                    "union of filter children does not equal the reaching instance set".into(),
                ));
            }
            Ok(())
        }
        Node::Leaf => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{AffineExpr, Dim};

    fn stmt_set(ids: &[u32]) -> BTreeSet<StmtId> {
        ids.iter().map(|&i| StmtId(i)).collect()
    }

    fn leaf_band(ndim: usize) -> Node {
        let schedule = (0..ndim).map(|k| Dim::Affine(AffineExpr::coordinate(ndim, k))).collect();
        Node::Band(Band::new(schedule, Some("S".into()), Node::Leaf))
    }

    pub(crate) fn single_stmt_tree(ndim: usize) -> Node {
        let stmts = stmt_set(&[0]);
        Node::Domain {
            stmts: stmts.clone(),
            child: Box::new(Node::Filter { stmts, child: Box::new(leaf_band(ndim)) }),
        }
    }

    #[test]
    fn root_must_be_domain() {
        assert!(Cursor::new(Node::Leaf).is_err());
    }

    #[test]
    fn navigation_round_trips() {
        let cur = Cursor::new(single_stmt_tree(2)).unwrap();
        assert_eq!(cur.focused().node_type(), NodeType::Domain);
        let cur = cur.goto_child(0).unwrap();
        assert_eq!(cur.focused().node_type(), NodeType::Filter);
        let cur = cur.goto_child(0).unwrap();
        assert_eq!(cur.focused().node_type(), NodeType::Band);
        let cur = cur.goto_parent().unwrap().goto_parent().unwrap();
        assert_eq!(cur.focused().node_type(), NodeType::Domain);
        assert!(cur.goto_parent().is_err());
    }

    #[test]
    fn goto_child_out_of_range_errors() {
        let cur = Cursor::new(single_stmt_tree(1)).unwrap();
        assert!(cur.goto_child(5).is_err());
    }

    #[test]
    fn set_rejects_overlapping_filters() {
        let a = stmt_set(&[0]);
        let b = stmt_set(&[0, 1]);
        let tree = Node::Domain {
            stmts: stmt_set(&[0, 1]),
            child: Box::new(Node::Set {
                children: vec![
                    Node::Filter { stmts: a, child: Box::new(Node::Leaf) },
                    Node::Filter { stmts: b, child: Box::new(Node::Leaf) },
                ],
            }),
        };
        assert!(Cursor::new(tree).is_err());
    }

    #[test]
    fn sequence_requires_filter_children_covering_reaching_set() {
        let tree = Node::Domain {
            stmts: stmt_set(&[0, 1]),
            child: Box::new(Node::Sequence {
                children: vec![Node::Filter { stmts: stmt_set(&[0]), child: Box::new(Node::Leaf) }],
            }),
        };
        assert!(Cursor::new(tree).is_err());
    }

    #[test]
    fn composed_depth_counts_ancestor_band_dimensions() {
        // Filter -> band_i (1 dim) -> band_j (1 dim) -> band_k (1 dim) -> Leaf.
        let stmts = stmt_set(&[0]);
        let band_k = Node::Band(Band::new(
            vec![Dim::Affine(AffineExpr::coordinate(3, 2))],
            Some("S".into()),
            Node::Leaf,
        ));
        let band_j = Node::Band(Band::new(
            vec![Dim::Affine(AffineExpr::coordinate(3, 1))],
            Some("S".into()),
            band_k,
        ));
        let band_i = Node::Band(Band::new(
            vec![Dim::Affine(AffineExpr::coordinate(3, 0))],
            Some("S".into()),
            band_j,
        ));
        let tree = Node::Domain {
            stmts: stmts.clone(),
            child: Box::new(Node::Filter { stmts, child: Box::new(band_i) }),
        };
        let cur = Cursor::new(tree).unwrap();
        let at_i = cur.clone().goto_child(0).unwrap().goto_child(0).unwrap();
        assert_eq!(at_i.composed_depth(), 0);
        let at_j = at_i.goto_child(0).unwrap();
        assert_eq!(at_j.composed_depth(), 1);
        let at_k = at_j.goto_child(0).unwrap();
        assert_eq!(at_k.composed_depth(), 2);
    }
}
