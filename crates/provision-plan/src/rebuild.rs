//! Builder reconstruction
//!
//! [`CompositeStepBuilderVisitor`] walks an immutable tree and mirrors it
//! into a composite builder: every group becomes a nested builder with the
//! same kind, id and metadata, every leaf accepted by the filter is appended
//! as a finalized step. Groups whose leaves were all filtered out stay empty
//! in the builder and are pruned by the builder's own `to_step`.

use crate::builder::CompositeStepBuilder;
use crate::filter::StepFilter;
use crate::step::{CompositeStep, LeafStep, Step};
use crate::visitor::StepVisitor;
use std::sync::Arc;

/// Visitor that rebuilds a step tree into a builder
pub struct CompositeStepBuilderVisitor<'a, T, F: ?Sized> {
    builder: &'a mut CompositeStepBuilder<T>,
    filter: &'a F,
}

impl<'a, T, F> CompositeStepBuilderVisitor<'a, T, F>
where
    F: StepFilter<T> + ?Sized,
{
    /// Rebuild into `builder`, keeping leaves accepted by `filter`
    #[inline]
    #[must_use]
    pub fn new(builder: &'a mut CompositeStepBuilder<T>, filter: &'a F) -> Self {
        Self { builder, filter }
    }

    fn nest(
        &mut self,
        nested: fn(&mut CompositeStepBuilder<T>) -> &mut CompositeStepBuilder<T>,
        step: &CompositeStep<T>,
    ) -> Box<dyn StepVisitor<T> + '_> {
        let builder = nested(self.builder);
        builder.set_id(step.id()).extend_metadata(step.metadata());
        Box::new(CompositeStepBuilderVisitor {
            builder,
            filter: self.filter,
        })
    }
}

impl<T, F> StepVisitor<T> for CompositeStepBuilderVisitor<'_, T, F>
where
    F: StepFilter<T> + ?Sized,
{
    fn visit_leaf_step(&mut self, leaf: &Arc<LeafStep<T>>) {
        let step = Step::Leaf(Arc::clone(leaf));
        if self.filter.accept(&step) {
            self.builder.add_step(step);
        } else {
            tracing::trace!(leaf = %leaf.id(), "leaf filtered out of rebuilt plan");
        }
    }

    fn visit_sequential_step(
        &mut self,
        step: &CompositeStep<T>,
    ) -> Option<Box<dyn StepVisitor<T> + '_>> {
        Some(self.nest(CompositeStepBuilder::add_sequential_steps, step))
    }

    fn visit_parallel_step(
        &mut self,
        step: &CompositeStep<T>,
    ) -> Option<Box<dyn StepVisitor<T> + '_>> {
        Some(self.nest(CompositeStepBuilder::add_parallel_steps, step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlanConfig;
    use crate::filter::StepFilters;
    use crate::metadata::Metadata;

    fn leaf(id: &str) -> Step<u8> {
        Step::leaf(id, Metadata::new(), 0)
    }

    fn sample() -> Step<u8> {
        Step::sequential(
            "s",
            Metadata::new(),
            vec![
                Step::parallel("p1", Metadata::new(), vec![leaf("a"), leaf("b")]),
                Step::parallel("p2", Metadata::new(), vec![leaf("c")]),
            ],
        )
    }

    #[test]
    fn rebuild_mirrors_structure() {
        let mut builder = CompositeStepBuilder::sequential(Arc::new(PlanConfig::new()));
        let filter = StepFilters::accept_all();
        sample().accept_visitor(&mut CompositeStepBuilderVisitor::new(&mut builder, &filter));

        let rebuilt = builder.to_step();
        assert_eq!(rebuilt.children().len(), 1);
        assert_eq!(rebuilt.children()[0], sample());
    }

    #[test]
    fn emptied_groups_disappear() {
        let mut builder = CompositeStepBuilder::sequential(Arc::new(PlanConfig::new()));
        let filter = StepFilters::exclude_ids(["c"]);
        sample().accept_visitor(&mut CompositeStepBuilderVisitor::new(&mut builder, &filter));

        let rebuilt = builder.to_step();
        let group = &rebuilt.children()[0];
        let ids: Vec<_> = group.children().iter().map(Step::id).collect();
        assert_eq!(ids, ["p1"]);
    }
}
