//! XML emission
//!
//! [`XmlIndent`] is a small indenting writer; [`XmlStepVisitor`] drives it
//! over a step tree. Each group opens its element in the composite hook and
//! closes it from the nested visitor's `end_visit`.

use crate::error::SerializeError;
use crate::metadata::{self, Metadata};
use crate::step::{CompositeStep, LeafStep, Step, StepType};
use crate::visitor::StepVisitor;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;

const INDENT: &str = "  ";

/// Element attributes in emission order
pub type Attributes = Vec<(String, String)>;

/// Indenting XML writer
///
/// The first failure is kept and reported by [`XmlIndent::into_xml`]; later
/// writes are ignored.
#[derive(Debug, Default)]
pub struct XmlIndent {
    buffer: String,
    open: Vec<String>,
    error: Option<SerializeError>,
}

impl XmlIndent {
    /// Create an empty writer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current nesting depth
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Emit the XML declaration
    pub fn add_xml_decl(&mut self) -> &mut Self {
        if self.error.is_none() {
            self.buffer.push_str("<?xml version=\"1.0\"?>\n");
        }
        self
    }

    /// Open an element; children are indented one level deeper
    pub fn add_opening_tag(&mut self, name: &str, attributes: &[(String, String)]) -> &mut Self {
        if self.error.is_none() {
            self.start_line();
            self.write_start(name, attributes);
            self.buffer.push_str(">\n");
            self.open.push(name.to_string());
        }
        self
    }

    /// Close the innermost open element, which must be `name`
    pub fn add_closing_tag(&mut self, name: &str) -> &mut Self {
        if self.error.is_some() {
            return self;
        }
        match self.open.pop() {
            Some(open) if open == name => {
                self.start_line();
                let _ = writeln!(self.buffer, "</{name}>");
            }
            Some(open) => {
                self.fail(SerializeError::Format(format!(
                    "closing <{name}> while <{open}> is open"
                )));
            }
            None => {
                self.fail(SerializeError::Format(format!(
                    "closing <{name}> with no open element"
                )));
            }
        }
        self
    }

    /// Emit a self-closed element
    pub fn add_empty_tag(&mut self, name: &str, attributes: &[(String, String)]) -> &mut Self {
        if self.error.is_none() {
            self.start_line();
            self.write_start(name, attributes);
            self.buffer.push_str("/>\n");
        }
        self
    }

    /// Emit an element with text content on a single line
    pub fn add_tag(&mut self, name: &str, text: &str, attributes: &[(String, String)]) -> &mut Self {
        if self.error.is_none() {
            self.start_line();
            self.write_start(name, attributes);
            self.buffer.push('>');
            escape_into(&mut self.buffer, text);
            let _ = writeln!(self.buffer, "</{name}>");
        }
        self
    }

    /// Record a failure; the first one wins
    pub fn fail(&mut self, error: SerializeError) {
        if self.error.is_none() {
            tracing::debug!(%error, "xml emission failed");
            self.error = Some(error);
        }
    }

    /// Finished document
    ///
    /// # Errors
    /// Returns the first recorded failure, or a format error if elements are
    /// still open.
    pub fn into_xml(self) -> Result<String, SerializeError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if let Some(open) = self.open.last() {
            return Err(SerializeError::Format(format!("<{open}> was never closed")));
        }
        Ok(self.buffer)
    }

    fn start_line(&mut self) {
        for _ in 0..self.open.len() {
            self.buffer.push_str(INDENT);
        }
    }

    fn write_start(&mut self, name: &str, attributes: &[(String, String)]) {
        self.buffer.push('<');
        self.buffer.push_str(name);
        for (key, value) in attributes {
            self.buffer.push(' ');
            self.buffer.push_str(key);
            self.buffer.push_str("=\"");
            escape_into(&mut self.buffer, value);
            self.buffer.push('"');
        }
    }
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
}

/// Attribute list: `id` first when given, then metadata in insertion order
///
/// A metadata `id` entry is skipped when an explicit id is given. Null
/// values are omitted.
#[must_use]
pub fn attributes(id: Option<&str>, metadata: &Metadata) -> Attributes {
    let mut attributes = Attributes::with_capacity(metadata.len() + 1);
    if let Some(id) = id {
        attributes.push((metadata::ID_KEY.to_string(), id.to_string()));
    }
    for (key, value) in metadata {
        if id.is_some() && key == metadata::ID_KEY {
            continue;
        }
        if let Some(text) = metadata::value_to_text(value) {
            attributes.push((key.clone(), text));
        }
    }
    attributes
}

/// Visitor writing steps as XML elements
#[derive(Debug)]
pub struct XmlStepVisitor<'a> {
    xml: &'a mut XmlIndent,
    closing: Option<&'static str>,
}

impl<'a> XmlStepVisitor<'a> {
    /// Write into `xml` at its current depth
    #[must_use]
    pub fn new(xml: &'a mut XmlIndent) -> Self {
        Self { xml, closing: None }
    }

    fn group<T: Serialize>(
        &mut self,
        kind: StepType,
        step: &CompositeStep<T>,
    ) -> Option<Box<dyn StepVisitor<T> + '_>> {
        let name = kind.as_str();
        let attributes = attributes(Some(step.id()), step.metadata());
        if step.is_empty() {
            self.xml.add_empty_tag(name, &attributes);
            return None;
        }

        self.xml.add_opening_tag(name, &attributes);
        Some(Box::new(XmlStepVisitor {
            xml: &mut *self.xml,
            closing: Some(name),
        }))
    }
}

impl<T: Serialize> StepVisitor<T> for XmlStepVisitor<'_> {
    fn visit_leaf_step(&mut self, leaf: &Arc<LeafStep<T>>) {
        let attributes = attributes(Some(leaf.id()), leaf.metadata());
        let name = StepType::Leaf.as_str();
        match serde_json::to_value(leaf.value()) {
            Ok(value) => {
                if let Some(text) = metadata::value_to_text(&value) {
                    self.xml.add_tag(name, &text, &attributes);
                } else {
                    self.xml.add_empty_tag(name, &attributes);
                }
            }
            Err(error) => self.xml.fail(SerializeError::Payload(error)),
        }
    }

    fn visit_sequential_step(
        &mut self,
        step: &CompositeStep<T>,
    ) -> Option<Box<dyn StepVisitor<T> + '_>> {
        self.group(StepType::Sequential, step)
    }

    fn visit_parallel_step(
        &mut self,
        step: &CompositeStep<T>,
    ) -> Option<Box<dyn StepVisitor<T> + '_>> {
        self.group(StepType::Parallel, step)
    }

    fn end_visit(&mut self) {
        if let Some(name) = self.closing {
            self.xml.add_closing_tag(name);
        }
    }
}

/// Render a plan document
///
/// # Errors
/// Returns an error if a payload cannot be serialized.
pub fn plan_document<T: Serialize>(
    plan_attributes: &Metadata,
    step: Option<&Step<T>>,
) -> Result<String, SerializeError> {
    tracing::trace!(empty = step.is_none(), "writing plan xml");
    let mut xml = XmlIndent::new();
    xml.add_xml_decl();
    let root = attributes(None, plan_attributes);

    match step {
        None => {
            xml.add_empty_tag("plan", &root);
        }
        Some(step) => {
            xml.add_opening_tag("plan", &root);
            step.accept_visitor(&mut XmlStepVisitor::new(&mut xml));
            xml.add_closing_tag("plan");
        }
    }

    xml.into_xml()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn indent_nests_and_escapes() {
        let mut xml = XmlIndent::new();
        xml.add_opening_tag("a", &[("k".to_string(), "x\"y".to_string())])
            .add_tag("b", "1 < 2 & 3", &[])
            .add_empty_tag("c", &[])
            .add_closing_tag("a");
        assert_eq!(
            xml.into_xml().unwrap(),
            "<a k=\"x&quot;y\">\n  <b>1 &lt; 2 &amp; 3</b>\n  <c/>\n</a>\n"
        );
    }

    #[test]
    fn mismatched_close_is_an_error() {
        let mut xml = XmlIndent::new();
        xml.add_opening_tag("a", &[]).add_closing_tag("b");
        assert!(matches!(xml.into_xml(), Err(SerializeError::Format(_))));
    }

    #[test]
    fn unclosed_element_is_an_error() {
        let mut xml = XmlIndent::new();
        xml.add_opening_tag("a", &[]);
        assert!(xml.into_xml().is_err());
    }

    #[test]
    fn attributes_put_id_first_and_skip_nulls() {
        let metadata = metadata::from_pairs([
            ("name", json!("n")),
            ("id", json!("ignored")),
            ("gone", json!(null)),
            ("port", json!(22)),
        ]);
        let attrs = attributes(Some("s1"), &metadata);
        let keys: Vec<_> = attrs.iter().map(|(k, v)| format!("{k}={v}")).collect();
        assert_eq!(keys, ["id=s1", "name=n", "port=22"]);
    }

    #[test]
    fn leaf_payload_is_text() {
        let step = Step::sequential(
            "s",
            Metadata::new(),
            vec![Step::leaf("a", Metadata::new(), "install <pkg>".to_string())],
        );
        let xml = plan_document(&Metadata::new(), Some(&step)).unwrap();
        assert!(xml.contains("  <sequential id=\"s\">\n"));
        assert!(xml.contains("    <leaf id=\"a\">install &lt;pkg&gt;</leaf>\n"));
        assert!(xml.ends_with("  </sequential>\n</plan>\n"));
    }

    #[test]
    fn empty_group_is_self_closed() {
        let step: Step<u8> = Step::parallel("p", Metadata::new(), vec![]);
        let xml = plan_document(&Metadata::new(), Some(&step)).unwrap();
        assert!(xml.contains("  <parallel id=\"p\"/>\n"));
    }
}
