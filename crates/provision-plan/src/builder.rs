//! Mutable step builders
//!
//! Builders are the staging side of a plan. A [`CompositeStepBuilder`]
//! accumulates an ordered list of entries, each either an already finalized
//! [`Step`] or a child builder, and turns itself into an immutable tree with
//! [`CompositeStepBuilder::to_step`].
//!
//! # Normalization
//!
//! `to_step` finalizes child builders recursively and drops every child
//! composite that comes out with no children. The rule applies at every
//! depth, so conditional blocks that were never filled leave no trace in the
//! final tree. Only the node `to_step` was called on may be empty.
//!
//! Finalized steps added with [`CompositeStepBuilder::add_step`] are kept
//! as they are.
//!
//! Builders are single-owner values: they are not meant to be mutated from
//! several threads.

use crate::config::PlanConfig;
use crate::error::{PlanError, PlanResult};
use crate::metadata::{self, Metadata};
use crate::plan::Plan;
use crate::step::{LeafStep, Step, StepType};
use serde_json::Value;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Kind of group a composite builder produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeKind {
    /// Children run in order
    Sequential,
    /// Children run concurrently
    Parallel,
}

impl From<CompositeKind> for StepType {
    fn from(kind: CompositeKind) -> Self {
        match kind {
            CompositeKind::Sequential => Self::Sequential,
            CompositeKind::Parallel => Self::Parallel,
        }
    }
}

impl TryFrom<StepType> for CompositeKind {
    type Error = PlanError;

    fn try_from(step_type: StepType) -> Result<Self, Self::Error> {
        match step_type {
            StepType::Sequential => Ok(Self::Sequential),
            StepType::Parallel => Ok(Self::Parallel),
            StepType::Leaf => Err(PlanError::unsupported_kind(step_type.as_str())),
        }
    }
}

/// One accumulated child of a composite builder
#[derive(Debug, Clone)]
pub enum StepEntry<T> {
    /// Already immutable step, kept as is
    Finalized(Step<T>),
    /// Builder finalized (and pruned) on `to_step`
    Pending(StepBuilder<T>),
}

impl<T> StepEntry<T> {
    /// Id of the step this entry stands for
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Finalized(step) => step.id(),
            Self::Pending(builder) => builder.id(),
        }
    }

}

/// Borrowed view of an accumulated child
#[derive(Debug)]
pub enum EntryRef<'a, T> {
    /// Already immutable step
    Finalized(&'a Step<T>),
    /// Pending leaf builder
    Leaf(&'a LeafStepBuilder<T>),
    /// Pending group builder
    Composite(&'a CompositeStepBuilder<T>),
}

impl<T> EntryRef<'_, T> {
    /// Id of the step this entry stands for
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Finalized(step) => step.id(),
            Self::Leaf(builder) => builder.id(),
            Self::Composite(builder) => builder.id(),
        }
    }
}

/// Mutable view of a child returned by [`CompositeStepBuilder::add_step`]
#[derive(Debug)]
pub enum EntryMut<'a, T> {
    /// Already immutable step
    Finalized(&'a Step<T>),
    /// Pending leaf builder
    Leaf(&'a mut LeafStepBuilder<T>),
    /// Pending group builder
    Composite(&'a mut CompositeStepBuilder<T>),
}

impl<T> EntryMut<'_, T> {
    /// Id of the step this entry stands for
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Finalized(step) => step.id(),
            Self::Leaf(builder) => builder.id(),
            Self::Composite(builder) => builder.id(),
        }
    }
}

/// Position of a child in one of the builder's stores
#[derive(Debug, Clone, Copy)]
enum Slot {
    Finalized(usize),
    Leaf(usize),
    Composite(usize),
}

/// Mutable mirror of [`Step`]
#[derive(Debug, Clone)]
pub enum StepBuilder<T> {
    /// Builder for a leaf
    Leaf(LeafStepBuilder<T>),
    /// Builder for a sequential or parallel group
    Composite(CompositeStepBuilder<T>),
}

impl<T> StepBuilder<T> {
    /// Id the finalized step will carry
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Leaf(builder) => builder.id(),
            Self::Composite(builder) => builder.id(),
        }
    }

    /// Leaf builder, if any
    #[must_use]
    pub fn as_leaf_mut(&mut self) -> Option<&mut LeafStepBuilder<T>> {
        match self {
            Self::Leaf(builder) => Some(builder),
            Self::Composite(_) => None,
        }
    }

    /// Composite builder, if any
    #[must_use]
    pub fn as_composite_mut(&mut self) -> Option<&mut CompositeStepBuilder<T>> {
        match self {
            Self::Leaf(_) => None,
            Self::Composite(builder) => Some(builder),
        }
    }
}

impl<T: Clone> StepBuilder<T> {
    /// Finalize into an immutable step
    #[must_use]
    pub fn to_step(&self) -> Step<T> {
        match self {
            Self::Leaf(builder) => builder.to_step(),
            Self::Composite(builder) => builder.to_step(),
        }
    }
}

/// Anything that can be appended to a composite builder
///
/// `None` converts to nothing, which makes [`CompositeStepBuilder::add_step`]
/// a no-op.
pub trait IntoStepEntry<T> {
    /// Convert into an entry, or `None` for nothing
    fn into_step_entry(self) -> Option<StepEntry<T>>;
}

impl<T> IntoStepEntry<T> for StepEntry<T> {
    fn into_step_entry(self) -> Option<StepEntry<T>> {
        Some(self)
    }
}

impl<T> IntoStepEntry<T> for Step<T> {
    fn into_step_entry(self) -> Option<StepEntry<T>> {
        Some(StepEntry::Finalized(self))
    }
}

impl<T> IntoStepEntry<T> for Arc<LeafStep<T>> {
    fn into_step_entry(self) -> Option<StepEntry<T>> {
        Some(StepEntry::Finalized(Step::Leaf(self)))
    }
}

impl<T> IntoStepEntry<T> for StepBuilder<T> {
    fn into_step_entry(self) -> Option<StepEntry<T>> {
        Some(StepEntry::Pending(self))
    }
}

impl<T> IntoStepEntry<T> for LeafStepBuilder<T> {
    fn into_step_entry(self) -> Option<StepEntry<T>> {
        Some(StepEntry::Pending(StepBuilder::Leaf(self)))
    }
}

impl<T> IntoStepEntry<T> for CompositeStepBuilder<T> {
    fn into_step_entry(self) -> Option<StepEntry<T>> {
        Some(StepEntry::Pending(StepBuilder::Composite(self)))
    }
}

impl<T, E: IntoStepEntry<T>> IntoStepEntry<T> for Option<E> {
    fn into_step_entry(self) -> Option<StepEntry<T>> {
        self.and_then(IntoStepEntry::into_step_entry)
    }
}

/// Builder for a single leaf
#[derive(Debug, Clone)]
pub struct LeafStepBuilder<T> {
    id: String,
    metadata: Metadata,
    value: T,
}

impl<T> LeafStepBuilder<T> {
    /// Create a leaf builder with a generated id
    #[must_use]
    pub fn new(value: T, config: &PlanConfig) -> Self {
        Self {
            id: config.generate_id(),
            metadata: Metadata::new(),
            value,
        }
    }

    /// With explicit id
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// With a metadata entry
    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Id the finalized leaf will carry
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Change the id
    pub fn set_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.id = id.into();
        self
    }

    /// Current metadata
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Set one metadata entry
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Merge entries into the metadata (later entries win)
    pub fn extend_metadata(&mut self, metadata: &Metadata) -> &mut Self {
        self.metadata
            .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Set the `name` metadata entry
    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.set_metadata(metadata::NAME_KEY, name.into())
    }

    /// Payload
    #[inline]
    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Replace the payload
    pub fn set_value(&mut self, value: T) -> &mut Self {
        self.value = value;
        self
    }
}

impl<T: Clone> LeafStepBuilder<T> {
    /// Finalize into a leaf step
    #[must_use]
    pub fn to_step(&self) -> Step<T> {
        Step::leaf(self.id.clone(), self.metadata.clone(), self.value.clone())
    }
}

/// Builder for a sequential or parallel group
///
/// Sequential and parallel builders share everything but the factory used
/// for the final step, selected by [`CompositeKind`].
///
/// Children live in typed stores; `slots` keeps their insertion order.
#[derive(Debug, Clone)]
pub struct CompositeStepBuilder<T> {
    kind: CompositeKind,
    id: String,
    metadata: Metadata,
    config: Arc<PlanConfig>,
    slots: Vec<Slot>,
    steps: Vec<Step<T>>,
    leaves: Vec<LeafStepBuilder<T>>,
    groups: Vec<CompositeStepBuilder<T>>,
}

impl<T> CompositeStepBuilder<T> {
    /// Create a composite builder with a generated id
    #[must_use]
    pub fn new(kind: CompositeKind, config: Arc<PlanConfig>) -> Self {
        Self {
            kind,
            id: config.generate_id(),
            metadata: Metadata::new(),
            config,
            slots: Vec::new(),
            steps: Vec::new(),
            leaves: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Create a sequential builder
    #[inline]
    #[must_use]
    pub fn sequential(config: Arc<PlanConfig>) -> Self {
        Self::new(CompositeKind::Sequential, config)
    }

    /// Create a parallel builder
    #[inline]
    #[must_use]
    pub fn parallel(config: Arc<PlanConfig>) -> Self {
        Self::new(CompositeKind::Parallel, config)
    }

    /// With explicit id
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// With a metadata entry
    #[inline]
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Group kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> CompositeKind {
        self.kind
    }

    /// Shared configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &Arc<PlanConfig> {
        &self.config
    }

    /// Id the finalized step will carry
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Change the id
    pub fn set_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.id = id.into();
        self
    }

    /// Current metadata
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Set one metadata entry
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Merge entries into the metadata (later entries win)
    pub fn extend_metadata(&mut self, metadata: &Metadata) -> &mut Self {
        self.metadata
            .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Set the `name` metadata entry
    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.set_metadata(metadata::NAME_KEY, name.into())
    }

    /// Number of accumulated entries (before pruning)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if nothing was added yet
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Accumulated entries in insertion order
    pub fn entries(&self) -> impl Iterator<Item = EntryRef<'_, T>> + '_ {
        self.slots.iter().map(move |slot| match *slot {
            Slot::Finalized(index) => EntryRef::Finalized(&self.steps[index]),
            Slot::Leaf(index) => EntryRef::Leaf(&self.leaves[index]),
            Slot::Composite(index) => EntryRef::Composite(&self.groups[index]),
        })
    }

    /// Append a step or builder
    ///
    /// Returns the stored entry, or `None` (leaving the builder untouched)
    /// when given nothing.
    pub fn add_step(&mut self, step: impl IntoStepEntry<T>) -> Option<EntryMut<'_, T>> {
        let entry = match step.into_step_entry()? {
            StepEntry::Finalized(step) => EntryMut::Finalized(self.push_step(step)),
            StepEntry::Pending(StepBuilder::Leaf(builder)) => {
                EntryMut::Leaf(self.push_leaf(builder))
            }
            StepEntry::Pending(StepBuilder::Composite(builder)) => {
                EntryMut::Composite(self.push_group(builder))
            }
        };
        Some(entry)
    }

    /// Append an already constructed leaf
    pub fn add_leaf_step(&mut self, leaf: Arc<LeafStep<T>>) {
        self.push_step(Step::Leaf(leaf));
    }

    /// Remove the first finalized leaf with the same id
    ///
    /// Returns `true` if an entry was removed.
    pub fn remove_leaf_step(&mut self, leaf: &LeafStep<T>) -> bool {
        let found = self.slots.iter().enumerate().find_map(|(position, slot)| match *slot {
            Slot::Finalized(index) => match &self.steps[index] {
                Step::Leaf(existing) if existing.id() == leaf.id() => Some((position, index)),
                _ => None,
            },
            Slot::Leaf(_) | Slot::Composite(_) => None,
        });
        let Some((position, removed)) = found else {
            return false;
        };

        self.slots.remove(position);
        self.steps.remove(removed);
        for slot in &mut self.slots {
            if let Slot::Finalized(index) = slot {
                if *index > removed {
                    *index -= 1;
                }
            }
        }
        true
    }

    /// Append a new leaf builder for `value` and return it
    pub fn add_leaf(&mut self, value: T) -> &mut LeafStepBuilder<T> {
        let builder = LeafStepBuilder::new(value, &self.config);
        self.push_leaf(builder)
    }

    /// Append a nested sequential builder and return it
    pub fn add_sequential_steps(&mut self) -> &mut CompositeStepBuilder<T> {
        self.push_composite(CompositeKind::Sequential)
    }

    /// Append a nested parallel builder and return it
    pub fn add_parallel_steps(&mut self) -> &mut CompositeStepBuilder<T> {
        self.push_composite(CompositeKind::Parallel)
    }

    /// Append a nested builder of the given kind and return it
    ///
    /// # Errors
    /// Returns [`PlanError::UnsupportedStepKind`] for [`StepType::Leaf`].
    pub fn add_composite_steps(
        &mut self,
        step_type: StepType,
    ) -> PlanResult<&mut CompositeStepBuilder<T>> {
        let kind = CompositeKind::try_from(step_type)?;
        Ok(self.push_composite(kind))
    }

    fn push_composite(&mut self, kind: CompositeKind) -> &mut CompositeStepBuilder<T> {
        let builder = Self::new(kind, Arc::clone(&self.config));
        self.push_group(builder)
    }

    fn push_step(&mut self, step: Step<T>) -> &Step<T> {
        let index = self.steps.len();
        self.steps.push(step);
        self.slots.push(Slot::Finalized(index));
        &self.steps[index]
    }

    fn push_leaf(&mut self, builder: LeafStepBuilder<T>) -> &mut LeafStepBuilder<T> {
        let index = self.leaves.len();
        self.leaves.push(builder);
        self.slots.push(Slot::Leaf(index));
        &mut self.leaves[index]
    }

    fn push_group(&mut self, builder: CompositeStepBuilder<T>) -> &mut CompositeStepBuilder<T> {
        let index = self.groups.len();
        self.groups.push(builder);
        self.slots.push(Slot::Composite(index));
        &mut self.groups[index]
    }

    fn create_step(&self, steps: Vec<Step<T>>) -> Step<T> {
        match self.kind {
            CompositeKind::Sequential => {
                Step::sequential(self.id.clone(), self.metadata.clone(), steps)
            }
            CompositeKind::Parallel => Step::parallel(self.id.clone(), self.metadata.clone(), steps),
        }
    }
}

impl<T: Clone> CompositeStepBuilder<T> {
    /// Finalize into an immutable step, pruning empty child composites
    ///
    /// Every call produces a fresh, independent tree.
    #[must_use]
    pub fn to_step(&self) -> Step<T> {
        let mut steps = Vec::with_capacity(self.slots.len());

        for slot in &self.slots {
            match *slot {
                Slot::Finalized(index) => steps.push(self.steps[index].clone()),
                Slot::Leaf(index) => steps.push(self.leaves[index].to_step()),
                Slot::Composite(index) => {
                    let child = self.groups[index].to_step();
                    if child.is_empty_composite() {
                        tracing::trace!(
                            parent = %self.id,
                            child = %child.id(),
                            "pruning empty composite step"
                        );
                        continue;
                    }
                    steps.push(child);
                }
            }
        }

        self.create_step(steps)
    }
}

/// Top-level builder for a whole plan
///
/// Dereferences to its root [`CompositeStepBuilder`] for adding steps. Plan
/// metadata is kept apart from the root step's metadata: the metadata
/// methods on `PlanBuilder` itself edit the plan, `root_mut()` reaches the
/// root step's.
#[derive(Debug, Clone)]
pub struct PlanBuilder<T> {
    metadata: Metadata,
    root: CompositeStepBuilder<T>,
}

impl<T> PlanBuilder<T> {
    /// Create a plan builder with a sequential root
    #[must_use]
    pub fn new(config: PlanConfig) -> Self {
        Self::with_kind(CompositeKind::Sequential, Arc::new(config))
    }

    /// Create a plan builder with a parallel root
    #[must_use]
    pub fn parallel(config: PlanConfig) -> Self {
        Self::with_kind(CompositeKind::Parallel, Arc::new(config))
    }

    /// Create a plan builder with the given root kind and shared config
    #[must_use]
    pub fn with_kind(kind: CompositeKind, config: Arc<PlanConfig>) -> Self {
        Self {
            metadata: Metadata::new(),
            root: CompositeStepBuilder::new(kind, config),
        }
    }

    /// Plan metadata
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Set one plan metadata entry
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Merge entries into the plan metadata (later entries win)
    pub fn extend_metadata(&mut self, metadata: &Metadata) -> &mut Self {
        self.metadata
            .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Plan name from metadata
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        metadata::get_str(&self.metadata, metadata::NAME_KEY)
    }

    /// Set the plan name
    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.set_metadata(metadata::NAME_KEY, name.into())
    }

    /// Set the plan id
    ///
    /// Stored in the plan metadata and used as the root step id.
    pub fn set_id(&mut self, id: impl Into<String>) -> &mut Self {
        let id = id.into();
        self.metadata.insert(metadata::ID_KEY.to_string(), Value::from(id.clone()));
        self.root.set_id(id);
        self
    }

    /// Root composite builder
    #[inline]
    #[must_use]
    pub fn root(&self) -> &CompositeStepBuilder<T> {
        &self.root
    }

    /// Root composite builder, mutably
    #[inline]
    pub fn root_mut(&mut self) -> &mut CompositeStepBuilder<T> {
        &mut self.root
    }

    /// Unwrap into the root composite builder
    #[inline]
    #[must_use]
    pub fn into_root(self) -> CompositeStepBuilder<T> {
        self.root
    }
}

impl<T: Clone> PlanBuilder<T> {
    /// Build the plan: plan metadata plus the normalized root
    ///
    /// A root left without children is kept as an empty group.
    #[must_use]
    pub fn to_plan(&self) -> Plan<T> {
        let step = self.root.to_step();
        tracing::debug!(
            root = %step.id(),
            leaves = step.leaf_count(),
            "built plan"
        );
        Plan::new(Some(self.metadata.clone()), Some(step))
    }
}

impl<T> Default for PlanBuilder<T> {
    fn default() -> Self {
        Self::new(PlanConfig::default())
    }
}

impl<T> Deref for PlanBuilder<T> {
    type Target = CompositeStepBuilder<T>;

    fn deref(&self) -> &Self::Target {
        &self.root
    }
}

impl<T> DerefMut for PlanBuilder<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Arc<PlanConfig> {
        Arc::new(PlanConfig::new().with_id_prefix("t-"))
    }

    fn leaf_ids(step: &Step<u32>) -> Vec<String> {
        match step {
            Step::Leaf(leaf) => vec![leaf.id().to_string()],
            _ => step.children().iter().flat_map(leaf_ids).collect(),
        }
    }

    #[test]
    fn add_step_none_is_noop() {
        let mut builder = CompositeStepBuilder::<u32>::sequential(config());
        assert!(builder.add_step(None::<Step<u32>>).is_none());
        assert!(builder.add_step(None::<LeafStepBuilder<u32>>).is_none());
        assert_eq!(builder.len(), 0);
    }

    #[test]
    fn add_step_returns_stored_entry() {
        let mut builder = CompositeStepBuilder::<u32>::sequential(config());
        let leaf = LeafStepBuilder::new(7, builder.config()).with_id("seven");
        let entry = builder.add_step(Some(leaf)).map(|e| e.id().to_string());
        assert_eq!(entry.as_deref(), Some("seven"));
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn generated_ids_use_config_and_are_stable() {
        let mut builder = CompositeStepBuilder::<u32>::parallel(config());
        builder.add_leaf(1);
        assert!(builder.id().starts_with("t-"));

        let first = builder.to_step();
        let second = builder.to_step();
        assert_eq!(first, second);
        assert!(first.children()[0].id().starts_with("t-"));
    }

    #[test]
    fn empty_nested_composites_are_pruned() {
        let mut builder = CompositeStepBuilder::<u32>::sequential(config()).with_id("root");
        builder.add_leaf(1).set_id("a");
        builder.add_parallel_steps();
        {
            let nested = builder.add_sequential_steps();
            nested.add_parallel_steps().add_sequential_steps();
        }
        builder.add_leaf(2).set_id("b");

        let step = builder.to_step();
        assert_eq!(step.children().len(), 2);
        assert_eq!(leaf_ids(&step), ["a", "b"]);
    }

    #[test]
    fn empty_root_is_kept() {
        let mut builder = CompositeStepBuilder::<u32>::parallel(config()).with_id("root");
        builder.add_sequential_steps();

        let step = builder.to_step();
        assert_eq!(step.step_type(), StepType::Parallel);
        assert!(step.is_empty_composite());
    }

    #[test]
    fn finalized_steps_are_kept_as_is() {
        let mut builder = CompositeStepBuilder::<u32>::sequential(config());
        builder.add_step(Step::parallel("empty", Metadata::new(), Vec::new()));
        let step = builder.to_step();
        assert_eq!(step.children().len(), 1);
        assert!(step.children()[0].is_empty_composite());
    }

    #[test]
    fn add_composite_steps_dispatches_on_kind() {
        let mut builder = CompositeStepBuilder::<u32>::sequential(config());
        let shared = Arc::clone(builder.config());
        let nested = builder.add_composite_steps(StepType::Parallel).unwrap();
        assert_eq!(nested.kind(), CompositeKind::Parallel);
        assert!(Arc::ptr_eq(nested.config(), &shared));

        let err = builder.add_composite_steps(StepType::Leaf).unwrap_err();
        assert!(matches!(err, PlanError::UnsupportedStepKind(kind) if kind == "leaf"));
    }

    #[test]
    fn leaf_steps_can_be_added_and_removed() {
        let mut builder = CompositeStepBuilder::<u32>::sequential(config());
        let a = Arc::new(LeafStep::new("a", Metadata::new(), 1));
        let b = Arc::new(LeafStep::new("b", Metadata::new(), 2));
        builder.add_leaf_step(Arc::clone(&a));
        builder.add_leaf_step(Arc::clone(&b));

        assert!(builder.remove_leaf_step(&a));
        assert!(!builder.remove_leaf_step(&a));
        assert_eq!(leaf_ids(&builder.to_step()), ["b"]);
    }

    #[test]
    fn add_step_yields_mutable_views() {
        let mut builder = CompositeStepBuilder::<u32>::sequential(config());
        match builder.add_step(LeafStepBuilder::new(1, &config())) {
            Some(EntryMut::Leaf(leaf)) => {
                leaf.set_id("one");
            }
            _ => panic!("expected a pending leaf"),
        }
        match builder.add_step(CompositeStepBuilder::parallel(config())) {
            Some(EntryMut::Composite(group)) => {
                group.set_id("group").add_leaf(2).set_id("two");
            }
            _ => panic!("expected a pending group"),
        }
        let finalized = builder.add_step(Step::leaf("three", Metadata::new(), 3));
        assert!(matches!(finalized, Some(EntryMut::Finalized(step)) if step.id() == "three"));

        let ids: Vec<_> = builder.entries().map(|e| e.id().to_string()).collect();
        assert_eq!(ids, ["one", "group", "three"]);
        assert!(matches!(builder.entries().nth(1), Some(EntryRef::Composite(_))));
        assert_eq!(leaf_ids(&builder.to_step()), ["one", "two", "three"]);
    }

    #[test]
    fn removal_between_pending_entries_keeps_order() {
        let mut builder = CompositeStepBuilder::<u32>::sequential(config());
        let a = Arc::new(LeafStep::new("a", Metadata::new(), 1));
        let c = Arc::new(LeafStep::new("c", Metadata::new(), 3));
        builder.add_leaf_step(Arc::clone(&a));
        builder.add_leaf(2).set_id("b");
        builder.add_leaf_step(Arc::clone(&c));
        builder.add_sequential_steps().add_leaf(4).set_id("d");

        assert!(builder.remove_leaf_step(&a));
        assert_eq!(builder.len(), 3);
        assert_eq!(leaf_ids(&builder.to_step()), ["b", "c", "d"]);
        assert!(builder.remove_leaf_step(&c));
        assert_eq!(leaf_ids(&builder.to_step()), ["b", "d"]);
    }

    #[test]
    fn metadata_flows_into_step() {
        let mut builder = CompositeStepBuilder::<u32>::sequential(config());
        builder.set_name("deploy").set_metadata("timeout", 30);
        let step = builder.to_step();
        assert_eq!(step.metadata()["name"], "deploy");
        assert_eq!(step.metadata()["timeout"], 30);
    }

    #[test]
    fn plan_builder_sets_plan_identity() {
        let mut builder = PlanBuilder::<u32>::new(PlanConfig::new());
        builder.set_id("plan-1").set_name("rollout");
        builder.add_leaf(1);

        let plan = builder.to_plan();
        assert_eq!(plan.id(), "plan-1");
        assert_eq!(plan.name(), Some("rollout"));
        assert_eq!(plan.step().map(Step::id), Some("plan-1"));
    }
}
