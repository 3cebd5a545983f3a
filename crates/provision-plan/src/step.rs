//! Immutable plan steps
//!
//! A plan is a tree of [`Step`]s. Leaves carry an opaque payload; composite
//! nodes own an ordered list of children that run either one after the other
//! ([`Step::Sequential`]) or concurrently ([`Step::Parallel`]).
//!
//! Nodes are reference counted so that a finalized step can be handed to a
//! builder, cached as a leaf, or shared between threads without copying the
//! payload. Nothing in this module mutates a node after construction.

use crate::error::PlanError;
use crate::metadata::{self, Metadata};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

/// Discriminator for the three step variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    /// Atomic unit of work
    Leaf,
    /// Children run in order
    Sequential,
    /// Children run concurrently
    Parallel,
}

impl StepType {
    /// Lowercase name, also used as the serialized element name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Leaf => "leaf",
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
        }
    }

    /// Check if this is a composite kind
    #[inline]
    #[must_use]
    pub const fn is_composite(self) -> bool {
        matches!(self, Self::Sequential | Self::Parallel)
    }
}

impl Display for StepType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepType {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "leaf" => Ok(Self::Leaf),
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            other => Err(PlanError::unsupported_kind(other)),
        }
    }
}

/// Atomic unit of work
#[derive(Debug, Clone, PartialEq)]
pub struct LeafStep<T> {
    id: String,
    metadata: Metadata,
    value: T,
}

impl<T> LeafStep<T> {
    /// Create a leaf step
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, metadata: Metadata, value: T) -> Self {
        Self {
            id: id.into(),
            metadata,
            value,
        }
    }

    /// Step id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Step metadata
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Display name from the `name` metadata entry
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        metadata::get_str(&self.metadata, metadata::NAME_KEY)
    }

    /// Opaque payload
    #[inline]
    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }
}

/// Sequential or parallel group of steps
///
/// The kind is carried by the enclosing [`Step`] variant.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeStep<T> {
    id: String,
    metadata: Metadata,
    steps: Vec<Step<T>>,
}

impl<T> CompositeStep<T> {
    /// Create a composite step
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, metadata: Metadata, steps: Vec<Step<T>>) -> Self {
        Self {
            id: id.into(),
            metadata,
            steps,
        }
    }

    /// Step id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Step metadata
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Children in stored order
    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[Step<T>] {
        &self.steps
    }

    /// Number of direct children
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the group has no children
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Node of a plan tree
#[derive(Debug, PartialEq)]
pub enum Step<T> {
    /// Atomic unit of work
    Leaf(Arc<LeafStep<T>>),
    /// Children run in order
    Sequential(Arc<CompositeStep<T>>),
    /// Children run concurrently
    Parallel(Arc<CompositeStep<T>>),
}

impl<T> Clone for Step<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Leaf(leaf) => Self::Leaf(Arc::clone(leaf)),
            Self::Sequential(group) => Self::Sequential(Arc::clone(group)),
            Self::Parallel(group) => Self::Parallel(Arc::clone(group)),
        }
    }
}

impl<T> Step<T> {
    /// Create a leaf step
    #[must_use]
    pub fn leaf(id: impl Into<String>, metadata: Metadata, value: T) -> Self {
        Self::Leaf(Arc::new(LeafStep::new(id, metadata, value)))
    }

    /// Create a sequential step
    #[must_use]
    pub fn sequential(id: impl Into<String>, metadata: Metadata, steps: Vec<Step<T>>) -> Self {
        Self::Sequential(Arc::new(CompositeStep::new(id, metadata, steps)))
    }

    /// Create a parallel step
    #[must_use]
    pub fn parallel(id: impl Into<String>, metadata: Metadata, steps: Vec<Step<T>>) -> Self {
        Self::Parallel(Arc::new(CompositeStep::new(id, metadata, steps)))
    }

    /// Step id
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Leaf(leaf) => leaf.id(),
            Self::Sequential(group) | Self::Parallel(group) => group.id(),
        }
    }

    /// Step metadata
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        match self {
            Self::Leaf(leaf) => leaf.metadata(),
            Self::Sequential(group) | Self::Parallel(group) => group.metadata(),
        }
    }

    /// Variant discriminator
    #[must_use]
    pub fn step_type(&self) -> StepType {
        match self {
            Self::Leaf(_) => StepType::Leaf,
            Self::Sequential(_) => StepType::Sequential,
            Self::Parallel(_) => StepType::Parallel,
        }
    }

    /// Check if this is a sequential or parallel step
    #[inline]
    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.step_type().is_composite()
    }

    /// Composite body, if any
    #[must_use]
    pub fn as_composite(&self) -> Option<&CompositeStep<T>> {
        match self {
            Self::Leaf(_) => None,
            Self::Sequential(group) | Self::Parallel(group) => Some(group),
        }
    }

    /// Leaf body, if any
    #[must_use]
    pub fn as_leaf(&self) -> Option<&Arc<LeafStep<T>>> {
        match self {
            Self::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    /// Direct children (empty for leaves)
    #[must_use]
    pub fn children(&self) -> &[Step<T>] {
        match self {
            Self::Leaf(_) => &[],
            Self::Sequential(group) | Self::Parallel(group) => group.steps(),
        }
    }

    /// Check if this is a composite with no children
    #[inline]
    #[must_use]
    pub fn is_empty_composite(&self) -> bool {
        self.as_composite().is_some_and(CompositeStep::is_empty)
    }

    /// Number of leaves in this subtree
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Sequential(group) | Self::Parallel(group) => {
                group.steps().iter().map(Step::leaf_count).sum()
            }
        }
    }
}

impl<T> From<LeafStep<T>> for Step<T> {
    fn from(leaf: LeafStep<T>) -> Self {
        Self::Leaf(Arc::new(leaf))
    }
}

impl<T> From<Arc<LeafStep<T>>> for Step<T> {
    fn from(leaf: Arc<LeafStep<T>>) -> Self {
        Self::Leaf(leaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(id: &str) -> Step<&'static str> {
        Step::leaf(id, Metadata::new(), "noop")
    }

    #[test]
    fn step_type_round_trips_names() {
        for kind in [StepType::Leaf, StepType::Sequential, StepType::Parallel] {
            assert_eq!(kind.as_str().parse::<StepType>().unwrap(), kind);
        }
        assert!(matches!(
            "serial".parse::<StepType>(),
            Err(PlanError::UnsupportedStepKind(kind)) if kind == "serial"
        ));
    }

    #[test]
    fn accessors_dispatch_per_variant() {
        let mut metadata = Metadata::new();
        metadata.insert("name".to_string(), json!("install"));
        let step = Step::sequential("root", metadata, vec![leaf("a"), leaf("b")]);

        assert_eq!(step.id(), "root");
        assert_eq!(step.step_type(), StepType::Sequential);
        assert!(step.is_composite());
        assert_eq!(step.children().len(), 2);
        assert_eq!(step.metadata()["name"], json!("install"));
        assert!(step.as_leaf().is_none());
    }

    #[test]
    fn leaf_has_no_children() {
        let step = leaf("a");
        assert!(step.children().is_empty());
        assert!(!step.is_empty_composite());
        assert_eq!(step.leaf_count(), 1);
        assert_eq!(step.as_leaf().map(|l| *l.value()), Some("noop"));
    }

    #[test]
    fn leaf_count_is_recursive() {
        let step = Step::sequential(
            "s",
            Metadata::new(),
            vec![
                leaf("a"),
                Step::parallel("p", Metadata::new(), vec![leaf("b"), leaf("c")]),
                Step::parallel("empty", Metadata::new(), Vec::new()),
            ],
        );
        assert_eq!(step.leaf_count(), 3);
        assert!(step.children()[2].is_empty_composite());
    }

    #[test]
    fn structural_equality_ignores_sharing() {
        let a = Step::sequential("s", Metadata::new(), vec![leaf("a")]);
        let b = Step::sequential("s", Metadata::new(), vec![leaf("a")]);
        assert_eq!(a, b);
        assert_ne!(a, Step::parallel("s", Metadata::new(), vec![leaf("a")]));
    }

    #[test]
    fn leaf_name_reads_metadata() {
        let mut metadata = Metadata::new();
        metadata.insert("name".to_string(), json!("restart"));
        let leaf = LeafStep::new("a", metadata, 1u8);
        assert_eq!(leaf.name(), Some("restart"));
    }
}
