//! Document serialization
//!
//! Both formats are produced by visitors over the step tree; callers only
//! see the finished document through [`Plan::to_xml`](crate::Plan::to_xml)
//! and [`Plan::to_json`](crate::Plan::to_json).

pub mod json;
pub mod xml;

pub use json::JsonStepVisitor;
pub use xml::{XmlIndent, XmlStepVisitor};
