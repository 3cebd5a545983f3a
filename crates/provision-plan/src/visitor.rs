//! Step visitor protocol
//!
//! A single depth-first traversal drives every derivation over a step tree:
//! leaf extraction, builder reconstruction and serialization.
//!
//! # Protocol
//!
//! 1. [`StepVisitor::start_visit`] once on the entry visitor
//! 2. per node, the hook matching its variant:
//!    - leaves go to [`StepVisitor::visit_leaf_step`]
//!    - composites go to [`StepVisitor::visit_sequential_step`] or
//!      [`StepVisitor::visit_parallel_step`], which return the visitor used
//!      for the children, or `None` to skip them
//! 3. [`StepVisitor::end_visit`] once on the entry visitor
//!
//! A visitor returned by a composite hook is bracketed the same way: it gets
//! `start_visit` before the first child and `end_visit` after the last one.
//! Returning [`descend`]`(self)` keeps using the current visitor.
//!
//! Children are always visited in stored order, parallel groups included.

use crate::step::{CompositeStep, LeafStep, Step};
use std::sync::Arc;

/// Visitor over the closed set of step variants
pub trait StepVisitor<T> {
    /// Called before the first node
    fn start_visit(&mut self) {}

    /// Visit a leaf
    fn visit_leaf_step(&mut self, leaf: &Arc<LeafStep<T>>);

    /// Visit a sequential group, returning the visitor for its children
    fn visit_sequential_step(
        &mut self,
        step: &CompositeStep<T>,
    ) -> Option<Box<dyn StepVisitor<T> + '_>>;

    /// Visit a parallel group, returning the visitor for its children
    fn visit_parallel_step(&mut self, step: &CompositeStep<T>)
        -> Option<Box<dyn StepVisitor<T> + '_>>;

    /// Called after the last node
    fn end_visit(&mut self) {}
}

impl<T, V> StepVisitor<T> for &mut V
where
    V: StepVisitor<T> + ?Sized,
{
    fn start_visit(&mut self) {
        (**self).start_visit();
    }

    fn visit_leaf_step(&mut self, leaf: &Arc<LeafStep<T>>) {
        (**self).visit_leaf_step(leaf);
    }

    fn visit_sequential_step(
        &mut self,
        step: &CompositeStep<T>,
    ) -> Option<Box<dyn StepVisitor<T> + '_>> {
        (**self).visit_sequential_step(step)
    }

    fn visit_parallel_step(
        &mut self,
        step: &CompositeStep<T>,
    ) -> Option<Box<dyn StepVisitor<T> + '_>> {
        (**self).visit_parallel_step(step)
    }

    fn end_visit(&mut self) {
        (**self).end_visit();
    }
}

/// Keep visiting children with the same visitor
#[inline]
pub fn descend<'a, T, V>(visitor: &'a mut V) -> Option<Box<dyn StepVisitor<T> + 'a>>
where
    V: StepVisitor<T>,
{
    Some(Box::new(visitor))
}

impl<T> Step<T> {
    /// Traverse this subtree with `visitor`
    pub fn accept_visitor<V>(&self, visitor: &mut V)
    where
        V: StepVisitor<T> + ?Sized,
    {
        visitor.start_visit();
        dispatch(self, visitor);
        visitor.end_visit();
    }
}

fn dispatch<T, V>(step: &Step<T>, visitor: &mut V)
where
    V: StepVisitor<T> + ?Sized,
{
    let nested = match step {
        Step::Leaf(leaf) => {
            visitor.visit_leaf_step(leaf);
            return;
        }
        Step::Sequential(group) => visitor.visit_sequential_step(group),
        Step::Parallel(group) => visitor.visit_parallel_step(group),
    };

    if let Some(mut nested) = nested {
        nested.start_visit();
        for child in step.children() {
            dispatch(child, nested.as_mut());
        }
        nested.end_visit();
    }
}

/// Collects every leaf, depth-first, left to right
#[derive(Debug)]
pub struct LeafCollector<T> {
    leaves: Vec<Arc<LeafStep<T>>>,
}

impl<T> LeafCollector<T> {
    /// Create an empty collector
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { leaves: Vec::new() }
    }

    /// Collected leaves
    #[inline]
    #[must_use]
    pub fn into_leaves(self) -> Vec<Arc<LeafStep<T>>> {
        self.leaves
    }
}

impl<T> Default for LeafCollector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StepVisitor<T> for LeafCollector<T> {
    fn visit_leaf_step(&mut self, leaf: &Arc<LeafStep<T>>) {
        self.leaves.push(Arc::clone(leaf));
    }

    fn visit_sequential_step(
        &mut self,
        _step: &CompositeStep<T>,
    ) -> Option<Box<dyn StepVisitor<T> + '_>> {
        descend(self)
    }

    fn visit_parallel_step(
        &mut self,
        _step: &CompositeStep<T>,
    ) -> Option<Box<dyn StepVisitor<T> + '_>> {
        descend(self)
    }
}
