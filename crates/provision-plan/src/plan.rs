//! Plans
//!
//! A [`Plan`] pairs metadata with an optional root [`Step`]. It is the
//! artifact handed to the execution engine, which reads the root, the flat
//! list of leaves, and the plan id and name.
//!
//! # Leaf cache
//!
//! The leaf list is computed on first use and published once. Concurrent
//! first callers may each compute it; the tree is immutable, so every
//! computation yields the same sequence and whichever is published first is
//! returned to all of them.
//!
//! # Identity
//!
//! `id()` reads the `id` metadata entry, then falls back to the root step
//! id. A plan with neither gets a hex token unique within the running
//! process. That token is not durable: it changes across restarts and is
//! not derived from content, so plans that are persisted should carry an
//! explicit id.

use crate::builder::{CompositeKind, PlanBuilder};
use crate::config::PlanConfig;
use crate::error::{PlanResult, SerializeError};
use crate::filter::{StepFilter, StepFilters};
use crate::metadata::{self, Metadata};
use crate::rebuild::CompositeStepBuilderVisitor;
use crate::serialize::{json, xml};
use crate::step::{LeafStep, Step};
use crate::visitor::LeafCollector;
use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

static NEXT_PLAN_TOKEN: AtomicU64 = AtomicU64::new(1);

fn next_token() -> u64 {
    NEXT_PLAN_TOKEN.fetch_add(1, Ordering::Relaxed)
}

/// Deployment plan: metadata plus an optional step tree
#[derive(Debug)]
pub struct Plan<T> {
    metadata: Metadata,
    step: Option<Step<T>>,
    token: u64,
    leaf_steps: OnceLock<Vec<Arc<LeafStep<T>>>>,
}

impl<T> Plan<T> {
    /// Create a plan
    ///
    /// Without explicit metadata, the root step's metadata is copied.
    #[must_use]
    pub fn new(metadata: Option<Metadata>, step: Option<Step<T>>) -> Self {
        let metadata = match (metadata, &step) {
            (Some(metadata), _) => metadata,
            (None, Some(step)) => step.metadata().clone(),
            (None, None) => Metadata::new(),
        };

        Self {
            metadata,
            step,
            token: next_token(),
            leaf_steps: OnceLock::new(),
        }
    }

    /// Create a plan with no steps
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::new(None, None)
    }

    /// Create a plan from a root step, inheriting its metadata
    #[inline]
    #[must_use]
    pub fn from_step(step: Step<T>) -> Self {
        Self::new(None, Some(step))
    }

    /// With a metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// With the `name` metadata entry
    #[inline]
    #[must_use]
    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.with_metadata(metadata::NAME_KEY, name.into())
    }

    /// With the `id` metadata entry
    #[inline]
    #[must_use]
    pub fn with_id(self, id: impl Into<String>) -> Self {
        self.with_metadata(metadata::ID_KEY, id.into())
    }

    /// Plan metadata
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Plan name from metadata
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        metadata::get_str(&self.metadata, metadata::NAME_KEY)
    }

    /// Plan id
    ///
    /// See the module docs for the fallback order.
    #[must_use]
    pub fn id(&self) -> Cow<'_, str> {
        match self.metadata.get(metadata::ID_KEY) {
            Some(Value::String(id)) => return Cow::Borrowed(id),
            Some(other) => {
                if let Some(id) = metadata::value_to_text(other) {
                    return Cow::Owned(id);
                }
            }
            None => {}
        }

        match &self.step {
            Some(step) => Cow::Borrowed(step.id()),
            None => Cow::Owned(format!("{:x}", self.token)),
        }
    }

    /// Root step, absent for an empty plan
    #[inline]
    #[must_use]
    pub fn step(&self) -> Option<&Step<T>> {
        self.step.as_ref()
    }

    /// All leaves, depth-first in stored order
    pub fn leaf_steps(&self) -> &[Arc<LeafStep<T>>] {
        if let Some(leaves) = self.leaf_steps.get() {
            return leaves;
        }

        let leaves = self.collect_leaf_steps();
        tracing::trace!(plan = %self.id(), leaves = leaves.len(), "publishing leaf steps");
        self.leaf_steps.get_or_init(move || leaves)
    }

    fn collect_leaf_steps(&self) -> Vec<Arc<LeafStep<T>>> {
        let mut collector = LeafCollector::new();
        if let Some(step) = &self.step {
            step.accept_visitor(&mut collector);
        }
        collector.into_leaves()
    }

    /// Check if the plan has any leaf
    #[inline]
    #[must_use]
    pub fn has_leaf_steps(&self) -> bool {
        !self.leaf_steps().is_empty()
    }

    /// Number of leaves
    #[inline]
    #[must_use]
    pub fn leaf_steps_count(&self) -> usize {
        self.leaf_steps().len()
    }

    /// Builder mirroring this plan, for incremental edits
    #[must_use]
    pub fn to_plan_builder(&self, config: PlanConfig) -> PlanBuilder<T> {
        self.to_plan_builder_filtered(&StepFilters::accept_all(), config)
    }

    /// Builder mirroring this plan, keeping only leaves accepted by `filter`
    ///
    /// Sequential and parallel structure and ordering are preserved for the
    /// kept leaves. Groups left without leaves are pruned when the builder
    /// is finalized. The root builder takes the kind, id and metadata of the
    /// root step; a leaf root ends up under a sequential root. The plan
    /// metadata goes to the builder's own plan metadata.
    #[must_use]
    pub fn to_plan_builder_filtered<F>(&self, filter: &F, config: PlanConfig) -> PlanBuilder<T>
    where
        F: StepFilter<T> + ?Sized,
    {
        let config = Arc::new(config);
        let mut builder = match &self.step {
            Some(Step::Parallel(_)) => PlanBuilder::with_kind(CompositeKind::Parallel, config),
            _ => PlanBuilder::with_kind(CompositeKind::Sequential, config),
        };
        builder.extend_metadata(&self.metadata);

        if let Some(step) = &self.step {
            let root = builder.root_mut();
            if step.is_composite() {
                root.set_id(step.id()).extend_metadata(step.metadata());
            }
            let mut visitor = CompositeStepBuilderVisitor::new(root, filter);
            match step {
                Step::Leaf(_) => step.accept_visitor(&mut visitor),
                Step::Sequential(group) | Step::Parallel(group) => {
                    for child in group.steps() {
                        child.accept_visitor(&mut visitor);
                    }
                }
            }
        }

        tracing::debug!(
            plan = %self.id(),
            entries = builder.len(),
            "rebuilt plan builder"
        );
        builder
    }

    /// Builder with this plan's metadata and no steps
    #[must_use]
    pub fn create_empty_plan_builder(&self, config: PlanConfig) -> PlanBuilder<T> {
        let mut builder = PlanBuilder::new(config);
        builder.extend_metadata(&self.metadata);
        if let Some(id) = metadata::get_str(&self.metadata, metadata::ID_KEY) {
            builder.root_mut().set_id(id);
        }
        builder
    }
}

impl<T: Serialize> Plan<T> {
    /// XML document for this plan
    ///
    /// `context` entries are added to the root attributes after the
    /// metadata and win on key collisions.
    ///
    /// # Errors
    /// Returns an error if a payload cannot be serialized.
    pub fn to_xml(&self, context: Option<&Metadata>) -> PlanResult<String> {
        let mut attributes = self.metadata.clone();
        if let Some(context) = context {
            attributes.extend(context.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Ok(xml::plan_document(&attributes, self.step.as_ref())?)
    }

    /// JSON document for this plan
    ///
    /// # Errors
    /// Returns an error if a payload cannot be serialized.
    pub fn to_json(&self) -> PlanResult<Value> {
        Ok(json::plan_document(&self.metadata, self.step.as_ref())?)
    }

    /// JSON document for this plan, pretty printed
    ///
    /// # Errors
    /// Returns an error if a payload cannot be serialized.
    pub fn to_json_string(&self) -> PlanResult<String> {
        let document = self.to_json()?;
        let text = serde_json::to_string_pretty(&document).map_err(SerializeError::from)?;
        Ok(text)
    }
}

impl<T> Clone for Plan<T> {
    fn clone(&self) -> Self {
        Self {
            metadata: self.metadata.clone(),
            step: self.step.clone(),
            token: next_token(),
            leaf_steps: self.leaf_steps.clone(),
        }
    }
}

impl<T> Default for Plan<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Serialize> Display for Plan<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let xml = self.to_xml(None).map_err(|_| fmt::Error)?;
        f.write_str(&xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(id: &str) -> Step<u8> {
        Step::leaf(id, Metadata::new(), 0)
    }

    fn sample() -> Step<u8> {
        Step::sequential(
            "root",
            metadata::from_pairs([("name", "sample")]),
            vec![
                leaf("a"),
                Step::parallel("p", Metadata::new(), vec![leaf("b"), leaf("c")]),
                leaf("d"),
            ],
        )
    }

    fn ids(leaves: &[Arc<LeafStep<u8>>]) -> Vec<&str> {
        leaves.iter().map(|l| l.id()).collect()
    }

    #[test]
    fn metadata_is_inherited_from_root() {
        let plan = Plan::new(None, Some(sample()));
        assert_eq!(plan.name(), Some("sample"));
        assert_eq!(plan.id(), "root");
    }

    #[test]
    fn explicit_metadata_wins() {
        let plan = Plan::new(Some(metadata::from_pairs([("id", "p-9")])), Some(sample()));
        assert_eq!(plan.id(), "p-9");
        assert_eq!(plan.name(), None);
    }

    #[test]
    fn numeric_id_is_rendered() {
        let plan = Plan::<u8>::empty().with_metadata("id", 42);
        assert_eq!(plan.id(), "42");
    }

    #[test]
    fn empty_plans_get_distinct_tokens() {
        let a = Plan::<u8>::empty();
        let b = Plan::<u8>::empty();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.id());
        assert!(!a.has_leaf_steps());
        assert_eq!(a.leaf_steps_count(), 0);
    }

    #[test]
    fn leaves_are_cached() {
        let plan = Plan::from_step(sample());
        let first = plan.leaf_steps().as_ptr();
        assert_eq!(ids(plan.leaf_steps()), ["a", "b", "c", "d"]);
        assert_eq!(plan.leaf_steps().as_ptr(), first);
        assert_eq!(plan.leaf_steps_count(), 4);
    }

    #[test]
    fn round_trip_preserves_root() {
        let plan = Plan::from_step(sample());
        let rebuilt = plan.to_plan_builder(PlanConfig::new()).to_plan();
        assert_eq!(rebuilt.step(), plan.step());
        assert_eq!(rebuilt.metadata(), plan.metadata());
    }

    #[test]
    fn round_trip_keeps_plan_and_root_metadata_apart() {
        let root = Step::sequential(
            "root",
            metadata::from_pairs([("timeout", 30)]),
            vec![leaf("a")],
        );
        let plan = Plan::new(Some(metadata::from_pairs([("name", "x")])), Some(root));

        let builder = plan.to_plan_builder(PlanConfig::new());
        assert_eq!(builder.metadata(), plan.metadata());
        assert_eq!(builder.root().metadata()["timeout"], 30);

        let rebuilt = builder.to_plan();
        assert_eq!(rebuilt.step(), plan.step());
        assert_eq!(rebuilt.metadata(), plan.metadata());
        assert_eq!(rebuilt.name(), Some("x"));
    }

    #[test]
    fn leaf_root_is_wrapped() {
        let plan = Plan::from_step(leaf("solo"));
        let rebuilt = plan.to_plan_builder(PlanConfig::new()).to_plan();
        let root = rebuilt.step().unwrap();
        assert!(root.is_composite());
        assert_eq!(ids(rebuilt.leaf_steps()), ["solo"]);
    }

    #[test]
    fn empty_plan_builder_keeps_identity() {
        let plan = Plan::from_step(sample()).with_id("p-1");
        let builder = plan.create_empty_plan_builder(PlanConfig::new());
        assert!(builder.is_empty());
        assert_eq!(builder.id(), "p-1");
        assert_eq!(builder.name(), Some("sample"));
    }

    #[test]
    fn clone_gets_fresh_identity() {
        let plan = Plan::<u8>::empty().with_name("x");
        let copy = plan.clone();
        assert_ne!(plan.id(), copy.id());
        assert_eq!(copy.metadata()["name"], json!("x"));
    }
}
