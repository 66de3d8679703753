//! The binary operation node shared by parameters and models.
//!
//! Both families build composites the same way: check the operands, resolve
//! what the result is, then keep references to the operands. What differs is
//! captured by the [`Composable`] capability trait.

use crate::graph::node::NodeCore;
use crate::graph::site::Site;
use crate::store::{LabelKind, NodeType, Operator};
use log::debug;
use std::fmt;

/// Capabilities a node family provides to [`Composite`].
pub trait Composable: Clone + fmt::Debug + Sized {
    /// What a composite remembers about its operands after validation.
    type Resolution: Copy + fmt::Debug;
    type Error;

    const NODE_TYPE: NodeType;

    fn core(&self) -> &NodeCore;

    fn operation(&self) -> Option<&Composite<Self>>;

    /// Validates the operands and resolves the result of `lh op rh`.
    fn resolve(op: Operator, lh: &Self, rh: &Self) -> Result<Self::Resolution, Self::Error>;

    /// Sample and deterministic sites reachable from this node.
    fn site(&self) -> Site;

    /// TeX operator used when rendering `lh op ...`.
    fn operator_fmt(op: Operator, _lh: &Self) -> String {
        op.tex().to_string()
    }

    fn is_operation(&self) -> bool {
        self.operation().is_some()
    }

    /// Full label of the node: leaves render their own label, composites
    /// concatenate their operands.
    fn render(&self, kind: LabelKind, tagged: bool) -> String {
        match self.operation() {
            Some(c) => c.render(kind, tagged),
            None => self.core().label(kind, tagged),
        }
    }
}

#[derive(Debug)]
pub struct Composite<T: Composable> {
    core: NodeCore,
    op: Operator,
    lh: T,
    rh: T,
    resolution: T::Resolution,
}

impl<T: Composable> Composite<T> {
    pub(crate) fn new(lh: T, rh: T, op: Operator) -> Result<Self, T::Error> {
        let resolution = T::resolve(op, &lh, &rh)?;
        let core = NodeCore::operation(op, T::operator_fmt(op, &lh));
        debug!(
            "{} composite: {} {} {} -> {:?}",
            T::NODE_TYPE,
            lh.render(LabelKind::Name, false),
            op,
            rh.render(LabelKind::Name, false),
            resolution
        );
        Ok(Self { core, op, lh, rh, resolution })
    }

    pub fn core(&self) -> &NodeCore { &self.core }
    pub fn op(&self) -> Operator { self.op }
    pub fn lh(&self) -> &T { &self.lh }
    pub fn rh(&self) -> &T { &self.rh }
    pub fn resolution(&self) -> T::Resolution { self.resolution }

    /// `lh op rh`, parenthesising sums that appear under a product.
    pub(crate) fn render(&self, kind: LabelKind, tagged: bool) -> String {
        let wrap = |operand: &T| {
            let label = operand.render(kind, tagged);
            let is_sum = operand.operation().is_some_and(|c| c.op == Operator::Add);
            if self.op == Operator::Mul && is_sum { format!("({})", label) } else { label }
        };
        format!("{} {} {}", wrap(&self.lh), self.core.raw_label(kind), wrap(&self.rh))
    }

    /// Union of both operands' sites; the right operand wins on collision.
    pub(crate) fn merged_site(&self) -> Site {
        let mut site = self.lh.site();
        site.merge(self.rh.site());
        site
    }
}
