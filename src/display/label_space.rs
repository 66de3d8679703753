//! Presentation names for a finished tree.
//!
//! Tagged labels carry node ids so that distinct leaves never render the
//! same. A [`LabelSpace`] strips the ids again and numbers leaves that share
//! a raw label: the first keeps it, later ones get `2`, `3`, ... (`_2`,
//! `_3`, ... for formula labels). Leaves are visited depth-first, left to
//! right, so the numbering is stable across renders.
//!
//! The numbering is cached together with the raw leaf labels it was built
//! from. Each access compares those labels with the current ones and
//! rebuilds the cache if any leaf was relabelled since.

use crate::graph::Node;
use crate::store::{LabelKind, NodeId};
use indexmap::IndexMap;
use log::debug;
use std::sync::{Mutex, MutexGuard};

/// Replaces every tagged leaf label occurring in `label` by its resolved form.
pub fn substitute(label: &str, mapping: &IndexMap<String, String>) -> String {
    mapping.iter().fold(label.to_string(), |acc, (tagged, resolved)| acc.replace(tagged, resolved))
}

/// Leaves of `node`, depth-first from the left, repeated if shared.
fn leaves(node: &Node) -> Vec<Node> {
    let mut out = Vec::new();
    let mut stack = vec![node.clone()];
    while let Some(n) = stack.pop() {
        if n.is_operation() {
            stack.extend(n.predecessors().into_iter().rev());
        } else {
            out.push(n);
        }
    }
    out
}

#[derive(Debug)]
struct Snapshot {
    labels: Vec<(Node, String)>,
    mapping: IndexMap<String, String>,
}

impl Snapshot {
    fn build(node: &Node, kind: LabelKind) -> Self {
        let labels: Vec<(Node, String)> = leaves(node)
            .into_iter()
            .map(|leaf| {
                let raw = leaf.core().raw_label(kind);
                (leaf, raw)
            })
            .collect();

        let mapping = {
            let mut seen: IndexMap<&str, Vec<NodeId>> = IndexMap::new();
            let mut mapping = IndexMap::new();
            for (leaf, raw) in &labels {
                let ids = seen.entry(raw.as_str()).or_default();
                if ids.contains(&leaf.id()) {
                    continue;
                }
                ids.push(leaf.id());
                let resolved = match (ids.len(), kind) {
                    (1, _) => raw.clone(),
                    (n, LabelKind::Name) => format!("{}{}", raw, n),
                    (n, LabelKind::Fmt) => format!("{}_{}", raw, n),
                };
                mapping.insert(leaf.core().tagged_label(kind), resolved);
            }
            mapping
        };
        Self { labels, mapping }
    }

    fn is_stale(&self, kind: LabelKind) -> bool {
        self.labels.iter().any(|(leaf, raw)| leaf.core().raw_label(kind) != *raw)
    }
}

#[derive(Debug)]
struct Cache {
    name: Snapshot,
    fmt: Snapshot,
}

impl Cache {
    fn get_mut(&mut self, kind: LabelKind) -> &mut Snapshot {
        match kind {
            LabelKind::Name => &mut self.name,
            LabelKind::Fmt => &mut self.fmt,
        }
    }
}

#[derive(Debug)]
pub struct LabelSpace {
    node: Node,
    cache: Mutex<Cache>,
}

impl LabelSpace {
    pub fn new(node: impl Into<Node>) -> Self {
        let node = node.into();
        let cache = Cache { name: Snapshot::build(&node, LabelKind::Name), fmt: Snapshot::build(&node, LabelKind::Fmt) };
        Self { node, cache: Mutex::new(cache) }
    }

    pub fn node(&self) -> &Node { &self.node }

    pub fn name(&self) -> String { self.label(LabelKind::Name) }

    pub fn fmt(&self) -> String { self.label(LabelKind::Fmt) }

    pub fn label(&self, kind: LabelKind) -> String {
        substitute(&self.node.label(kind), &self.mapping(kind))
    }

    /// Tagged leaf label to resolved label.
    pub fn mapping(&self, kind: LabelKind) -> IndexMap<String, String> {
        let mut cache = self.lock();
        let snapshot = cache.get_mut(kind);
        if snapshot.is_stale(kind) {
            debug!("leaf labels of '{}' changed, rebuilding {:?} label space", self.node.render(LabelKind::Name, false), kind);
            *snapshot = Snapshot::build(&self.node, kind);
        }
        snapshot.mapping.clone()
    }

    /// Resolved label of the leaf whose tagged label is `tagged`.
    pub fn resolve(&self, tagged: &str, kind: LabelKind) -> Option<String> {
        self.mapping(kind).get(tagged).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Parameter;

    fn leaf(name: &str) -> Parameter {
        Parameter::uniform(name, name, 0.5, 0.0, 1.0).unwrap()
    }

    #[test]
    fn test_duplicates_are_numbered_left_to_right() {
        let (a, b, other_a) = (leaf("a"), leaf("b"), leaf("a"));
        let expr = &(&(&a + &b) * &other_a) * &a;
        let space = LabelSpace::new(expr);
        assert_eq!(space.name(), "(a + b) * a2 * a");
        assert_eq!(space.fmt(), r"(a + b) \times a_2 \times a");
        assert_eq!(space.resolve(&other_a.name(), LabelKind::Name).as_deref(), Some("a2"));
        assert_eq!(space.mapping(LabelKind::Name).len(), 3);
    }

    #[test]
    fn test_render_is_stable() {
        let (x, y) = (leaf("x"), leaf("x"));
        let space = LabelSpace::new(&x + &y);
        assert_eq!(space.name(), space.name());
        assert_eq!(space.name(), "x + x2");
    }

    #[test]
    fn test_relabelled_leaf_triggers_rebuild() {
        let (a, b, c) = (leaf("a"), leaf("b"), leaf("a"));
        let space = LabelSpace::new(&(&a + &b) + &c);
        assert_eq!(space.fmt(), "a + b + a_2");

        b.set_fmt("a").unwrap();
        assert_eq!(space.fmt(), "a + a_2 + a_3");

        a.set_fmt("z").unwrap();
        a.set_default(0.25).unwrap();
        assert_eq!(space.fmt(), "z + a + a_2");
        assert_eq!(space.name(), "a + b + a2");
    }
}
