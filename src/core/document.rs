//! Order-preserving YAML document model.
//!
//! Manifests are loaded into a small node tree instead of typed structs so
//! that everything the engine does not touch survives a load/save cycle in
//! the same order, including duplicate keys and custom tags. Scalars keep
//! the exact text and style they were read with, so `0644` or `1.10` are
//! written back byte for byte. Children are held behind `Rc`, which lets a
//! rewrite build a new parent while sharing every untouched sibling with the
//! original tree.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::rc::Rc;

use tracing::trace;
use yaml_rust2::parser::{Event, EventReceiver, Parser, Tag};
use yaml_rust2::scanner::TScalarStyle;

use crate::error::{ParseError, Result};

const CORE_TAG_PREFIX: &str = "tag:yaml.org,2002:";

/// How a scalar was written in the source.
///
/// Scalars built in code use [`ScalarStyle::Any`] and are written in the
/// simplest style that reads back as the same string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalarStyle {
    #[default]
    Any,
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

/// A leaf value: its source text plus the style it was written in.
#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    text: String,
    style: ScalarStyle,
}

impl Scalar {
    pub fn new(text: impl Into<String>, style: ScalarStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    /// The scalar exactly as it appears in the source, after unquoting.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn style(&self) -> ScalarStyle {
        self.style
    }

    /// True for an unquoted null (`~`, `null` or nothing at all).
    pub fn is_null(&self) -> bool {
        self.style == ScalarStyle::Plain
            && matches!(self.text.as_str(), "" | "~" | "null" | "Null" | "NULL")
    }

    /// String value of the scalar. Null reads as the empty string, every
    /// other scalar as its source text.
    pub fn value(&self) -> Cow<'_, str> {
        if self.is_null() {
            Cow::Borrowed("")
        } else {
            Cow::Borrowed(&self.text)
        }
    }
}

/// A node of a YAML document.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(Scalar),
    Mapping(Mapping),
    Sequence(Vec<Rc<Node>>),
    Tagged { tag: String, value: Rc<Node> },
}

impl Node {
    /// A string scalar node.
    pub fn string(value: impl Into<String>) -> Self {
        Node::Scalar(Scalar::new(value, ScalarStyle::Any))
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self.untagged() {
            Node::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self.untagged() {
            Node::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        self.as_scalar().is_some_and(Scalar::is_null)
    }

    /// True when this node is a scalar whose value equals `expected`.
    pub fn is_scalar_text(&self, expected: &str) -> bool {
        self.as_scalar().is_some_and(|s| s.value() == expected)
    }

    // `!!str`, `!!map` and friends only restate the node kind.
    fn untagged(&self) -> &Node {
        match self {
            Node::Tagged { tag, value } if tag.starts_with(CORE_TAG_PREFIX) => value.untagged(),
            other => other,
        }
    }
}

/// An ordered list of key/value entries.
///
/// Duplicate keys are kept in place. Lookups by key see the first occurrence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mapping {
    entries: Vec<(Rc<Node>, Rc<Node>)>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry at the end.
    pub fn push(&mut self, key: Node, value: Node) {
        self.entries.push((Rc::new(key), Rc::new(value)));
    }

    /// Append an entry whose nodes are shared with another tree.
    pub fn push_shared(&mut self, key: Rc<Node>, value: Rc<Node>) {
        self.entries.push((key, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&Rc<Node>, &Rc<Node>)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Entry at `index` in document order.
    pub fn entry(&self, index: usize) -> Option<(&Rc<Node>, &Rc<Node>)> {
        self.entries.get(index).map(|(k, v)| (k, v))
    }

    /// Index of the first entry whose key scalar equals `key`.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k.is_scalar_text(key))
    }

    /// Value of the first entry whose key scalar equals `key`.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.position(key).map(|i| self.entries[i].1.as_ref())
    }

    /// Build a new mapping with the entry at `index` swapped for a new
    /// key/value pair. Every other entry is shared with `self`.
    ///
    /// Panics if `index` is out of bounds, like slice indexing.
    pub fn replace_entry(&self, index: usize, key: Rc<Node>, value: Rc<Node>) -> Mapping {
        let mut entries = self.entries.clone();
        entries[index] = (key, value);
        Mapping { entries }
    }

    /// Build a new mapping without the entry at `index`.
    ///
    /// Panics if `index` is out of bounds, like slice indexing.
    pub fn without_entry(&self, index: usize) -> Mapping {
        let mut entries = self.entries.clone();
        entries.remove(index);
        Mapping { entries }
    }
}

impl FromIterator<(Node, Node)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (Node, Node)>>(iter: I) -> Self {
        Mapping {
            entries: iter
                .into_iter()
                .map(|(k, v)| (Rc::new(k), Rc::new(v)))
                .collect(),
        }
    }
}

/// One top-level document of a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Rc<Node>,
}

impl Document {
    pub fn new(root: Node) -> Self {
        Self {
            root: Rc::new(root),
        }
    }

    pub fn from_rc(root: Rc<Node>) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Rc<Node> {
        &self.root
    }
}

/// An ordered sequence of documents, as found in one YAML file.
pub type Stream = Vec<Document>;

/// Parse a YAML (or JSON) stream into documents.
///
/// Empty documents, such as the one after a trailing `---`, are dropped.
/// Aliases share the anchored node.
///
/// # Errors
///
/// Returns `ParseError::Yaml` on malformed input. Nothing is returned for a
/// stream that fails part way.
pub fn parse_stream(input: &str) -> Result<Stream> {
    let mut builder = Builder::default();
    Parser::new_from_str(input)
        .load(&mut builder, true)
        .map_err(|e| ParseError::Yaml(e.to_string()))?;
    if let Some(message) = builder.error {
        return Err(ParseError::Yaml(message).into());
    }

    let documents: Stream = builder
        .documents
        .into_iter()
        .filter(|node| !node.is_null())
        .map(Document::from_rc)
        .collect();
    trace!(documents = documents.len(), "parsed stream");
    Ok(documents)
}

/// Serialize documents in block style with 2-space indentation and `---`
/// between them.
///
/// Parsed scalars are written in the style they were read with. Anchors are
/// expanded in place.
pub fn serialize_stream(documents: &[Document]) -> String {
    let mut emitter = Emitter::default();
    for (i, doc) in documents.iter().enumerate() {
        if i > 0 {
            emitter.out.push_str("---\n");
        }
        emitter.node(doc.root(), 0, Slot::Root);
    }
    emitter.out
}

enum Frame {
    Sequence {
        items: Vec<Rc<Node>>,
        anchor: usize,
        tag: Option<String>,
    },
    Mapping {
        mapping: Mapping,
        key: Option<Rc<Node>>,
        anchor: usize,
        tag: Option<String>,
    },
}

/// Builds nodes from parser events.
#[derive(Default)]
struct Builder {
    stack: Vec<Frame>,
    anchors: HashMap<usize, Rc<Node>>,
    documents: Vec<Rc<Node>>,
    error: Option<String>,
}

impl Builder {
    fn finish(&mut self, node: Node, anchor: usize, tag: Option<String>) {
        let node = match tag {
            Some(tag) => Node::Tagged {
                tag,
                value: Rc::new(node),
            },
            None => node,
        };
        let node = Rc::new(node);
        if anchor > 0 {
            self.anchors.insert(anchor, Rc::clone(&node));
        }
        self.insert(node);
    }

    fn insert(&mut self, node: Rc<Node>) {
        match self.stack.last_mut() {
            Some(Frame::Sequence { items, .. }) => items.push(node),
            Some(Frame::Mapping { mapping, key, .. }) => match key.take() {
                Some(k) => mapping.push_shared(k, node),
                None => *key = Some(node),
            },
            None => self.documents.push(node),
        }
    }
}

impl EventReceiver for Builder {
    fn on_event(&mut self, event: Event) {
        if self.error.is_some() {
            return;
        }
        match event {
            Event::Scalar(text, style, anchor, tag) => {
                let scalar = Scalar::new(text, scalar_style(style));
                self.finish(Node::Scalar(scalar), anchor, tag.map(tag_name));
            }
            Event::SequenceStart(anchor, tag) => self.stack.push(Frame::Sequence {
                items: Vec::new(),
                anchor,
                tag: tag.map(tag_name),
            }),
            Event::MappingStart(anchor, tag) => self.stack.push(Frame::Mapping {
                mapping: Mapping::new(),
                key: None,
                anchor,
                tag: tag.map(tag_name),
            }),
            Event::SequenceEnd | Event::MappingEnd => match self.stack.pop() {
                Some(Frame::Sequence { items, anchor, tag }) => {
                    self.finish(Node::Sequence(items), anchor, tag)
                }
                Some(Frame::Mapping {
                    mapping,
                    anchor,
                    tag,
                    ..
                }) => self.finish(Node::Mapping(mapping), anchor, tag),
                None => self.error = Some("unbalanced collection end".to_string()),
            },
            Event::Alias(id) => match self.anchors.get(&id) {
                Some(node) => {
                    let node = Rc::clone(node);
                    self.insert(node);
                }
                None => self.error = Some(format!("alias to unknown anchor #{}", id)),
            },
            _ => {}
        }
    }
}

fn scalar_style(style: TScalarStyle) -> ScalarStyle {
    match style {
        TScalarStyle::SingleQuoted => ScalarStyle::SingleQuoted,
        TScalarStyle::DoubleQuoted => ScalarStyle::DoubleQuoted,
        TScalarStyle::Literal => ScalarStyle::Literal,
        TScalarStyle::Folded => ScalarStyle::Folded,
        _ => ScalarStyle::Plain,
    }
}

fn tag_name(tag: Tag) -> String {
    match tag.handle.as_str() {
        "!!" => format!("{}{}", CORE_TAG_PREFIX, tag.suffix),
        handle => format!("{}{}", handle, tag.suffix),
    }
}

/// Where the emitter cursor sits when a node is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// Start of a line, at the top of a document.
    Root,
    /// Right after `key:`.
    Value,
    /// Right after `-`.
    Item,
}

/// Where a scalar is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Block,
    Key,
    Flow,
}

#[derive(Default)]
struct Emitter {
    out: String,
}

impl Emitter {
    fn node(&mut self, node: &Node, indent: usize, slot: Slot) {
        match node {
            Node::Mapping(mapping) if !mapping.is_empty() => match slot {
                Slot::Root => self.mapping(mapping, indent, false),
                Slot::Value => {
                    self.out.push('\n');
                    self.mapping(mapping, indent + 2, false);
                }
                Slot::Item => {
                    self.out.push(' ');
                    self.mapping(mapping, indent + 2, true);
                }
            },
            Node::Sequence(items) if !items.is_empty() => match slot {
                Slot::Root => self.sequence(items, indent, false),
                Slot::Value => {
                    self.out.push('\n');
                    self.sequence(items, indent, false);
                }
                Slot::Item => {
                    self.out.push(' ');
                    self.sequence(items, indent + 2, true);
                }
            },
            Node::Tagged { tag, value } => {
                if slot != Slot::Root {
                    self.out.push(' ');
                }
                self.tag(tag);
                let nested = if slot == Slot::Root { indent } else { indent + 2 };
                match value.as_ref() {
                    Node::Mapping(mapping) if !mapping.is_empty() => {
                        self.out.push('\n');
                        self.mapping(mapping, nested, false);
                    }
                    Node::Sequence(items) if !items.is_empty() => {
                        self.out.push('\n');
                        let nested = if slot == Slot::Item { nested } else { indent };
                        self.sequence(items, nested, false);
                    }
                    other => {
                        self.out.push(' ');
                        self.inline(other, indent, Context::Block);
                        self.out.push('\n');
                    }
                }
            }
            other => {
                if slot != Slot::Root {
                    self.out.push(' ');
                }
                self.inline(other, indent, Context::Block);
                self.out.push('\n');
            }
        }
    }

    fn mapping(&mut self, mapping: &Mapping, indent: usize, inline_first: bool) {
        for (i, (key, value)) in mapping.iter().enumerate() {
            if i > 0 || !inline_first {
                self.indent(indent);
            }
            self.inline(key, indent, Context::Key);
            self.out.push(':');
            self.node(value, indent, Slot::Value);
        }
    }

    fn sequence(&mut self, items: &[Rc<Node>], indent: usize, inline_first: bool) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 || !inline_first {
                self.indent(indent);
            }
            self.out.push('-');
            self.node(item, indent, Slot::Item);
        }
    }

    /// Write a node on the current line: a scalar, an empty collection, or a
    /// collection in flow style.
    fn inline(&mut self, node: &Node, indent: usize, context: Context) {
        match node {
            Node::Scalar(scalar) => self.scalar(scalar, indent, context),
            Node::Mapping(mapping) => {
                self.out.push('{');
                for (i, (key, value)) in mapping.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.inline(key, indent, Context::Flow);
                    self.out.push_str(": ");
                    self.inline(value, indent, Context::Flow);
                }
                self.out.push('}');
            }
            Node::Sequence(items) => {
                self.out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.inline(item, indent, Context::Flow);
                }
                self.out.push(']');
            }
            Node::Tagged { tag, value } => {
                self.tag(tag);
                self.out.push(' ');
                self.inline(value, indent, context);
            }
        }
    }

    fn scalar(&mut self, scalar: &Scalar, indent: usize, context: Context) {
        let text = scalar.text();
        match scalar.style() {
            ScalarStyle::Plain if text.is_empty() => self.out.push('~'),
            ScalarStyle::Plain if !text.contains('\n') && fits_context(text, context) => {
                self.out.push_str(text)
            }
            ScalarStyle::SingleQuoted if is_single_line(text) => self.single_quoted(text),
            ScalarStyle::Literal | ScalarStyle::Folded
                if context == Context::Block && is_literal_safe(text) =>
            {
                self.literal(text, indent)
            }
            ScalarStyle::Any => {
                if is_plain_safe(text) && !looks_typed(text) && fits_context(text, context) {
                    self.out.push_str(text);
                } else if is_single_line(text) {
                    self.single_quoted(text);
                } else if context == Context::Block && is_literal_safe(text) {
                    self.literal(text, indent);
                } else {
                    self.double_quoted(text);
                }
            }
            _ => self.double_quoted(text),
        }
    }

    fn single_quoted(&mut self, text: &str) {
        self.out.push('\'');
        self.out.push_str(&text.replace('\'', "''"));
        self.out.push('\'');
    }

    fn double_quoted(&mut self, text: &str) {
        self.out.push('"');
        for c in text.chars() {
            match c {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\n' => self.out.push_str("\\n"),
                '\t' => self.out.push_str("\\t"),
                '\r' => self.out.push_str("\\r"),
                '\0' => self.out.push_str("\\0"),
                '\u{85}' => self.out.push_str("\\N"),
                '\u{2028}' => self.out.push_str("\\L"),
                '\u{2029}' => self.out.push_str("\\P"),
                c if c.is_control() => {
                    let _ = write!(self.out, "\\x{:02X}", c as u32);
                }
                '\u{feff}' => self.out.push_str("\\uFEFF"),
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }

    fn literal(&mut self, text: &str, indent: usize) {
        let body = text.trim_end_matches('\n');
        let trailing = text.len() - body.len();
        self.out.push_str(match trailing {
            0 => "|-",
            1 => "|",
            _ => "|+",
        });
        self.out.push('\n');
        for line in body.split('\n') {
            if !line.is_empty() {
                self.indent(indent + 2);
                self.out.push_str(line);
            }
            self.out.push('\n');
        }
        for _ in 1..trailing {
            self.out.push('\n');
        }
        // The caller ends the last line.
        self.out.pop();
    }

    fn tag(&mut self, tag: &str) {
        if let Some(suffix) = tag.strip_prefix(CORE_TAG_PREFIX) {
            self.out.push_str("!!");
            self.out.push_str(suffix);
        } else if tag.starts_with('!') {
            self.out.push_str(tag);
        } else {
            let _ = write!(self.out, "!<{}>", tag);
        }
    }

    fn indent(&mut self, width: usize) {
        self.out.extend(std::iter::repeat(' ').take(width));
    }
}

fn is_printable(c: char) -> bool {
    c == '\t' || !(c.is_control() || matches!(c, '\u{feff}' | '\u{2028}' | '\u{2029}'))
}

fn is_single_line(text: &str) -> bool {
    text.chars().all(is_printable)
}

fn fits_context(text: &str, context: Context) -> bool {
    context != Context::Flow || !text.contains([',', '[', ']', '{', '}'])
}

/// True when `text` can be written without quotes and still read back as
/// the same characters.
fn is_plain_safe(text: &str) -> bool {
    let Some(first) = text.chars().next() else {
        return false;
    };
    let Some(last) = text.chars().last() else {
        return false;
    };
    if first.is_whitespace() || "-?:,[]{}#&*!|>'\"%@`".contains(first) {
        return false;
    }
    if last.is_whitespace() || last == ':' {
        return false;
    }
    if text.starts_with("...") {
        return false;
    }
    if [": ", ":\t", " #", "\t#"].iter().any(|p| text.contains(p)) {
        return false;
    }
    is_single_line(text)
}

/// True when a plain `text` would resolve to something other than a string.
fn looks_typed(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    if matches!(
        lower.as_str(),
        "~" | "null"
            | "true"
            | "false"
            | "yes"
            | "no"
            | "on"
            | "off"
            | "y"
            | "n"
            | "<<"
            | ".inf"
            | "+.inf"
            | "-.inf"
            | ".nan"
    ) {
        return true;
    }
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('+' | '-' | '.') => chars.next().is_some_and(|c| c.is_ascii_digit() || c == '.'),
        _ => false,
    }
}

/// True when `text` can be written as a `|` block scalar.
fn is_literal_safe(text: &str) -> bool {
    let body = text.trim_end_matches('\n');
    !body.is_empty()
        && !body.starts_with([' ', '\n'])
        && text.chars().all(|c| c == '\n' || is_printable(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_mapping(doc: &Document) -> &Mapping {
        doc.root().as_mapping().unwrap()
    }

    fn keys(mapping: &Mapping) -> Vec<String> {
        mapping
            .iter()
            .map(|(k, _)| k.as_scalar().unwrap().text().to_string())
            .collect()
    }

    fn reserialize(input: &str) -> String {
        serialize_stream(&parse_stream(input).unwrap())
    }

    #[test]
    fn test_parse_multi_document_stream() {
        let stream = parse_stream("a: 1\n---\nb: 2\n---\nc: 3\n").unwrap();
        assert_eq!(stream.len(), 3);
        assert_eq!(keys(root_mapping(&stream[2])), vec!["c"]);
    }

    #[test]
    fn test_parse_drops_empty_documents() {
        let stream = parse_stream("---\na: 1\n---\n").unwrap();
        assert_eq!(stream.len(), 1);
    }

    #[test]
    fn test_mapping_order_preserved() {
        let stream = parse_stream("zeta: 1\nalpha: 2\nmid: 3\n").unwrap();
        assert_eq!(keys(root_mapping(&stream[0])), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_duplicate_keys_kept_and_first_wins() {
        let stream = parse_stream("name: first\nname: second\n").unwrap();
        let mapping = root_mapping(&stream[0]);
        assert_eq!(mapping.len(), 2);
        assert!(mapping.get("name").unwrap().is_scalar_text("first"));
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let err = parse_stream("a: [1, 2\n").unwrap_err();
        assert!(matches!(err, crate::error::Error::Parse(ParseError::Yaml(_))));
    }

    #[test]
    fn test_json_input_accepted() {
        let stream = parse_stream(r#"{"kind": "ConfigMap", "data": {"k": "v"}}"#).unwrap();
        let mapping = root_mapping(&stream[0]);
        assert!(mapping.get("kind").unwrap().is_scalar_text("ConfigMap"));
    }

    #[test]
    fn test_scalar_text() {
        let stream = parse_stream("n: 42\nb: true\nz: ~\ns: hello\ne:\n").unwrap();
        let mapping = root_mapping(&stream[0]);
        assert!(mapping.get("n").unwrap().is_scalar_text("42"));
        assert!(mapping.get("b").unwrap().is_scalar_text("true"));
        assert!(mapping.get("z").unwrap().is_scalar_text(""));
        assert!(mapping.get("z").unwrap().is_null());
        assert!(mapping.get("s").unwrap().is_scalar_text("hello"));
        assert!(mapping.get("e").unwrap().is_null());
    }

    #[test]
    fn test_quoted_null_is_a_string() {
        let stream = parse_stream("a: '~'\nb: \"null\"\n").unwrap();
        let mapping = root_mapping(&stream[0]);
        assert!(!mapping.get("a").unwrap().is_null());
        assert!(mapping.get("b").unwrap().is_scalar_text("null"));
    }

    #[test]
    fn test_numbers_keep_source_text() {
        let stream = parse_stream("mode: 0644\nhex: 0x1F\nver: 1.10\nexp: 1e3\n").unwrap();
        let mapping = root_mapping(&stream[0]);
        let texts: Vec<&str> = mapping
            .iter()
            .map(|(_, v)| v.as_scalar().unwrap().text())
            .collect();
        assert_eq!(texts, vec!["0644", "0x1F", "1.10", "1e3"]);
    }

    #[test]
    fn test_wide_integer_is_kept_verbatim() {
        let input = "id: 123456789012345678901234567890\nneg: -123456789012345678901234567890\n";
        assert_eq!(reserialize(input), input);
    }

    #[test]
    fn test_deployment_is_written_back_byte_for_byte() {
        let input = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  labels:
    app: web
spec:
  replicas: 3
  template:
    spec:
      containers:
      - name: app
        image: nginx:1.25
        env:
        - name: VERSION
          value: '1.10'
        - name: GREETING
          value: \"hello world\"
      volumes:
      - name: config
        secret:
          secretName: web
          defaultMode: 0644
      hex: 0x1F
      ver: 1.10
      enabled: yes
      nothing: ~
";
        assert_eq!(reserialize(input), input);
    }

    #[test]
    fn test_serialize_separates_documents() {
        assert_eq!(reserialize("a: 1\n---\nb: two\n"), "a: 1\n---\nb: two\n");
    }

    #[test]
    fn test_serialize_uses_two_space_indent() {
        assert_eq!(reserialize("metadata:\n    name: x\n"), "metadata:\n  name: x\n");
    }

    #[test]
    fn test_flow_collections_become_block() {
        let out = reserialize("args: [\"--port\", 8080]\nlabels: {app: x}\nnone: {}\n");
        assert_eq!(out, "args:\n- \"--port\"\n- 8080\nlabels:\n  app: x\nnone: {}\n");
    }

    #[test]
    fn test_roundtrip_is_semantically_identical() {
        let input = "\
apiVersion: apps/v1
kind: Deployment
spec:
  replicas: 3
  template:
    spec:
      containers:
      - name: app
        image: nginx:1.25
        args: [\"--port\", \"8080\"]
---
kind: ConfigMap
data:
  flag: 'true'
  count: '10'
";
        let first = parse_stream(input).unwrap();
        let second = parse_stream(&serialize_stream(&first)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_quoted_strings_keep_their_style() {
        let input = "flag: 'true'\ncount: \"10\"\nquote: 'it''s'\n";
        assert_eq!(reserialize(input), input);
    }

    #[test]
    fn test_block_scalars_roundtrip() {
        let input = "script: |\n  echo one\n\n  echo two\nstrip: |-\n  no newline\n";
        assert_eq!(reserialize(input), input);

        let folded = parse_stream("text: >\n  folded\n  line\n").unwrap();
        let out = serialize_stream(&folded);
        assert_eq!(out, "text: |\n  folded line\n");
    }

    #[test]
    fn test_built_strings_choose_a_safe_style() {
        let mut mapping = Mapping::new();
        for (key, value) in [
            ("plain", "admin"),
            ("number", "0644"),
            ("boolean", "true"),
            ("empty", ""),
            ("colon", "a: b"),
            ("lines", "one\ntwo\n"),
            ("control", "bell\u{7}"),
        ] {
            mapping.push(Node::string(key), Node::string(value));
        }
        let out = serialize_stream(&[Document::new(Node::Mapping(mapping))]);
        assert_eq!(
            out,
            "plain: admin\nnumber: '0644'\nboolean: 'true'\nempty: ''\ncolon: 'a: b'\n\
             lines: |\n  one\n  two\ncontrol: \"bell\\x07\"\n"
        );

        let reparsed = parse_stream(&out).unwrap();
        let values: Vec<String> = root_mapping(&reparsed[0])
            .iter()
            .map(|(_, v)| v.as_scalar().unwrap().value().into_owned())
            .collect();
        assert_eq!(
            values,
            vec!["admin", "0644", "true", "", "a: b", "one\ntwo\n", "bell\u{7}"]
        );
    }

    #[test]
    fn test_custom_tag_roundtrip() {
        let stream = parse_stream("value: !Ref other\n").unwrap();
        let out = serialize_stream(&stream);
        assert_eq!(out, "value: !Ref other\n");
        assert_eq!(parse_stream(&out).unwrap(), stream);
    }

    #[test]
    fn test_core_tags_are_transparent() {
        let stream = parse_stream("port: !!str 8080\n").unwrap();
        let value = root_mapping(&stream[0]).get("port").unwrap();
        assert!(value.is_scalar_text("8080"));
        assert_eq!(serialize_stream(&stream), "port: !!str 8080\n");
    }

    #[test]
    fn test_alias_shares_anchored_node() {
        let stream = parse_stream("base: &b {x: 1}\ncopy: *b\n").unwrap();
        let mapping = root_mapping(&stream[0]);
        assert!(Rc::ptr_eq(mapping.entry(0).unwrap().1, mapping.entry(1).unwrap().1));
        assert_eq!(serialize_stream(&stream), "base:\n  x: 1\ncopy:\n  x: 1\n");
    }

    #[test]
    fn test_replace_entry_shares_siblings() {
        let stream = parse_stream("a: 1\nb: {x: 1}\nc: 3\n").unwrap();
        let original = root_mapping(&stream[0]);
        let replaced = original.replace_entry(
            0,
            Rc::new(Node::string("a2")),
            Rc::new(Node::string("new")),
        );

        assert_eq!(keys(&replaced), vec!["a2", "b", "c"]);
        assert!(Rc::ptr_eq(replaced.entry(1).unwrap().1, original.entry(1).unwrap().1));
        // original untouched
        assert_eq!(keys(original), vec!["a", "b", "c"]);
    }
}
