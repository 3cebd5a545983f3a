//! JSON emission
//!
//! Every node becomes an object with `type`, `id` and `metadata`; leaves add
//! `value`, groups add `steps`. A group node is appended to its parent's list
//! once its own children are done.

use crate::error::SerializeError;
use crate::metadata::Metadata;
use crate::step::{CompositeStep, LeafStep, Step, StepType};
use crate::visitor::StepVisitor;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Group node waiting for its children
#[derive(Debug)]
struct PendingGroup {
    node: Map<String, Value>,
    steps: Vec<Value>,
}

/// Visitor turning steps into JSON nodes
///
/// Top-level nodes are appended to the output list. The first payload
/// failure is stored in the error slot and the failing leaf is skipped.
#[derive(Debug)]
pub struct JsonStepVisitor<'a> {
    out: &'a mut Vec<Value>,
    error: &'a mut Option<SerializeError>,
    group: Option<PendingGroup>,
}

impl<'a> JsonStepVisitor<'a> {
    /// Append nodes to `out`, recording failures in `error`
    #[must_use]
    pub fn new(out: &'a mut Vec<Value>, error: &'a mut Option<SerializeError>) -> Self {
        Self {
            out,
            error,
            group: None,
        }
    }

    fn target(&mut self) -> &mut Vec<Value> {
        match &mut self.group {
            Some(group) => &mut group.steps,
            None => &mut *self.out,
        }
    }

    fn group<T: Serialize>(
        &mut self,
        kind: StepType,
        step: &CompositeStep<T>,
    ) -> Box<dyn StepVisitor<T> + '_> {
        let out = match &mut self.group {
            Some(group) => &mut group.steps,
            None => &mut *self.out,
        };
        Box::new(JsonStepVisitor {
            out,
            error: &mut *self.error,
            group: Some(PendingGroup {
                node: node(kind, step.id(), step.metadata()),
                steps: Vec::with_capacity(step.len()),
            }),
        })
    }
}

impl<T: Serialize> StepVisitor<T> for JsonStepVisitor<'_> {
    fn visit_leaf_step(&mut self, leaf: &Arc<LeafStep<T>>) {
        match serde_json::to_value(leaf.value()) {
            Ok(value) => {
                let mut node = node(StepType::Leaf, leaf.id(), leaf.metadata());
                node.insert("value".to_string(), value);
                self.target().push(Value::Object(node));
            }
            Err(error) => {
                tracing::debug!(leaf = %leaf.id(), %error, "leaf payload failed to serialize");
                if self.error.is_none() {
                    *self.error = Some(SerializeError::Payload(error));
                }
            }
        }
    }

    fn visit_sequential_step(
        &mut self,
        step: &CompositeStep<T>,
    ) -> Option<Box<dyn StepVisitor<T> + '_>> {
        Some(self.group(StepType::Sequential, step))
    }

    fn visit_parallel_step(
        &mut self,
        step: &CompositeStep<T>,
    ) -> Option<Box<dyn StepVisitor<T> + '_>> {
        Some(self.group(StepType::Parallel, step))
    }

    fn end_visit(&mut self) {
        if let Some(PendingGroup { mut node, steps }) = self.group.take() {
            node.insert("steps".to_string(), Value::Array(steps));
            self.out.push(Value::Object(node));
        }
    }
}

fn node(kind: StepType, id: &str, metadata: &Metadata) -> Map<String, Value> {
    let mut node = Map::new();
    node.insert("type".to_string(), Value::from(kind.as_str()));
    node.insert("id".to_string(), Value::from(id));
    node.insert("metadata".to_string(), metadata_object(metadata));
    node
}

fn metadata_object(metadata: &Metadata) -> Value {
    Value::Object(
        metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    )
}

/// Build a plan document: `metadata`, plus `step` when there is a root
///
/// # Errors
/// Returns an error if a payload cannot be serialized.
pub fn plan_document<T: Serialize>(
    metadata: &Metadata,
    step: Option<&Step<T>>,
) -> Result<Value, SerializeError> {
    tracing::trace!(empty = step.is_none(), "writing plan json");
    let mut document = Map::new();
    document.insert("metadata".to_string(), metadata_object(metadata));

    if let Some(step) = step {
        let mut nodes = Vec::with_capacity(1);
        let mut error = None;
        step.accept_visitor(&mut JsonStepVisitor::new(&mut nodes, &mut error));
        if let Some(error) = error {
            return Err(error);
        }
        let root = nodes
            .pop()
            .ok_or_else(|| SerializeError::Format("step tree produced no node".to_string()))?;
        document.insert("step".to_string(), root);
    }

    Ok(Value::Object(document))
}
