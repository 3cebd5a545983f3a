//! Testing utilities for the provision-plan workspace
//!
//! Shared payload type, canned plans and logging setup.

#![allow(missing_docs)]

use provision_plan::{Metadata, Plan, Step};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub command: String,
    pub host: String,
}

impl Action {
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            host: "localhost".to_string(),
        }
    }
}

#[must_use]
pub fn metadata(pairs: &[(&str, &str)]) -> Metadata {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), Value::from(*v)))
        .collect()
}

#[must_use]
pub fn leaf(id: &str) -> Step<Action> {
    Step::leaf(id, metadata(&[("name", id)]), Action::new(&format!("run {id}")))
}

/// `Sequential[A, Parallel[B, C], D]` with leaf ids `a`..`d`
#[must_use]
pub fn sample_step() -> Step<Action> {
    Step::sequential(
        "root",
        Metadata::new(),
        vec![
            leaf("a"),
            Step::parallel("bc", Metadata::new(), vec![leaf("b"), leaf("c")]),
            leaf("d"),
        ],
    )
}

#[must_use]
pub fn sample_plan() -> Plan<Action> {
    Plan::new(Some(metadata(&[("name", "sample")])), Some(sample_step()))
}

#[must_use]
pub fn three_leaf_plan() -> Plan<Action> {
    let root = Step::sequential("three", Metadata::new(), vec![leaf("x"), leaf("y"), leaf("z")]);
    Plan::from_step(root).with_name("three")
}

#[must_use]
pub fn empty_plan(name: &str) -> Plan<Action> {
    Plan::new(Some(metadata(&[("name", name)])), None)
}

#[must_use]
pub fn leaf_ids<T>(plan: &Plan<T>) -> Vec<String> {
    plan.leaf_steps()
        .iter()
        .map(|leaf| leaf.id().to_string())
        .collect()
}

/// Install a fmt subscriber honoring `RUST_LOG`; repeated calls are no-ops
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
