//! Provisioning plans
//!
//! Deployment plans as trees of steps: leaves carry an action payload,
//! sequential groups run their children in order, parallel groups run them
//! concurrently. Plans are immutable once built and safe to share across
//! threads.
//!
//! # Core Concepts
//!
//! - [`Step<T>`]: immutable tree node (leaf, sequential, parallel)
//! - [`CompositeStepBuilder<T>`] / [`PlanBuilder<T>`]: mutable accumulation,
//!   normalized on `to_step()` / `to_plan()` (empty groups are pruned)
//! - [`StepVisitor<T>`]: depth-first traversal protocol used by every
//!   derivation
//! - [`Plan<T>`]: metadata plus root, cached leaf list, XML/JSON output
//! - [`StepFilter<T>`]: leaf selection when turning a plan back into a
//!   builder
//!
//! # Example
//!
//! ```rust,ignore
//! use provision_plan::prelude::*;
//!
//! let mut builder = PlanBuilder::new(PlanConfig::new());
//! builder.set_name("web");
//! builder.add_leaf("install nginx");
//! let group = builder.add_parallel_steps();
//! group.add_leaf("start api");
//! group.add_leaf("start worker");
//!
//! let plan = builder.to_plan();
//! assert_eq!(plan.leaf_steps_count(), 3);
//! println!("{}", plan.to_xml(None)?);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod builder;
pub mod config;
pub mod error;
pub mod filter;
pub mod metadata;
pub mod plan;
pub mod rebuild;
pub mod serialize;
pub mod step;
pub mod visitor;

pub use builder::{
    CompositeKind, CompositeStepBuilder, EntryMut, EntryRef, IntoStepEntry, LeafStepBuilder,
    PlanBuilder, StepBuilder, StepEntry,
};
pub use config::{IdStrategy, PlanConfig};
pub use error::{PlanError, PlanResult, SerializeError};
pub use filter::{StepFilter, StepFilters};
pub use metadata::Metadata;
pub use plan::Plan;
pub use rebuild::CompositeStepBuilderVisitor;
pub use serialize::{JsonStepVisitor, XmlIndent, XmlStepVisitor};
pub use step::{CompositeStep, LeafStep, Step, StepType};
pub use visitor::{descend, LeafCollector, StepVisitor};

/// Commonly used types
pub mod prelude {
    pub use crate::builder::{CompositeStepBuilder, LeafStepBuilder, PlanBuilder};
    pub use crate::config::{IdStrategy, PlanConfig};
    pub use crate::error::{PlanError, PlanResult};
    pub use crate::filter::{StepFilter, StepFilters};
    pub use crate::metadata::Metadata;
    pub use crate::plan::Plan;
    pub use crate::step::{LeafStep, Step, StepType};
    pub use crate::visitor::StepVisitor;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
