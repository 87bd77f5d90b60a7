//! A small host-independent element tree.
//!
//! Nodes are what render collaborators hand back and what the feed composes
//! into its own widget; a host turns them into real markup.

use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Fragment(Vec<Node>),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Element {
    pub tag: String,
    pub classes: Vec<String>,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.push((name.to_string(), value.into()));
        self
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

impl Node {
    pub fn element(tag: &str) -> Element {
        Element::new(tag)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn empty() -> Self {
        Node::Fragment(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Node::Fragment(children) => children.iter().all(Node::is_empty),
            _ => false,
        }
    }

    /// All text content, concatenated in document order.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    /// Depth-first search for the first element carrying `class`.
    pub fn find_class(&self, class: &str) -> Option<&Element> {
        match self {
            Node::Element(element) => {
                if element.has_class(class) {
                    return Some(element);
                }
                element.children.iter().find_map(|c| c.find_class(class))
            }
            Node::Fragment(children) => children.iter().find_map(|c| c.find_class(class)),
            Node::Text(_) => None,
        }
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Element(Element { children, .. }) | Node::Fragment(children) => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<Vec<Node>> for Node {
    fn from(children: Vec<Node>) -> Self {
        Node::Fragment(children)
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(text.to_string())
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Text(text)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Text(text) => write!(f, "{}", encode_text(text)),
            Node::Fragment(children) => children.iter().try_for_each(|c| write!(f, "{}", c)),
            Node::Element(element) => {
                write!(f, "<{}", element.tag)?;
                if !element.classes.is_empty() {
                    let classes = element.classes.join(" ");
                    write!(f, " class=\"{}\"", encode_double_quoted_attribute(&classes))?;
                }
                for (name, value) in &element.attrs {
                    write!(f, " {}=\"{}\"", name, encode_double_quoted_attribute(value))?;
                }
                write!(f, ">")?;
                for child in &element.children {
                    write!(f, "{}", child)?;
                }
                write!(f, "</{}>", element.tag)
            }
        }
    }
}
