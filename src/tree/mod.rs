//! Provide methods and data structures for in-memory document trees.
//!
//! [`TreeBuilder`] turns the events of a parse into a [`Node`], and
//! [`TreeWalker`] turns a [`Node`] back into events.

mod builder;
mod walker;

use std::fmt::Display;

use quick_xml::escape::{escape, partial_escape};

use crate::sax::Attribute;

pub use builder::*;
pub use walker::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Document {
        children: Vec<Node>,
    },
    Element {
        name: String,
        attributes: Vec<Attribute>,
        children: Vec<Node>,
    },
    Text(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: String,
    },
}

impl Node {
    pub fn document(children: Vec<Node>) -> Self {
        Self::Document { children }
    }

    pub fn element(name: impl Into<String>, attributes: Vec<Attribute>, children: Vec<Node>) -> Self {
        Self::Element {
            name: name.into(),
            attributes,
            children,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// The name of an element or the target of a processing instruction.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Element { name, .. } => Some(name.as_str()),
            Self::ProcessingInstruction { target, .. } => Some(target.as_str()),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Self::Document { children } | Self::Element { children, .. } => children,
            _ => &[],
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self {
            Self::Element { attributes, .. } => attributes
                .iter()
                .find(|attr| attr.name == name)
                .map(|attr| attr.value.as_str()),
            _ => None,
        }
    }

    /// The first element child; for a document, its root element.
    pub fn first_element(&self) -> Option<&Node> {
        self.children()
            .iter()
            .find(|child| matches!(child, Self::Element { .. }))
    }

    /// Concatenate the text of this node and its descendants.
    #[doc(alias = "xmlNodeGetContent")]
    pub fn text_content(&self) -> String {
        let mut buf = String::new();
        self.collect_text(&mut buf);
        buf
    }

    fn collect_text(&self, buf: &mut String) {
        match self {
            Self::Text(text) => buf.push_str(text),
            Self::Document { children } | Self::Element { children, .. } => {
                children.iter().for_each(|child| child.collect_text(buf));
            }
            _ => {}
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document { children } => {
                for child in children {
                    write!(f, "{child}")?;
                }
                Ok(())
            }
            Self::Element {
                name,
                attributes,
                children,
            } => {
                write!(f, "<{name}")?;
                for attr in attributes {
                    write!(f, " {}=\"{}\"", attr.name, escape(attr.value.as_str()))?;
                }
                if children.is_empty() {
                    return write!(f, "/>");
                }
                write!(f, ">")?;
                for child in children {
                    write!(f, "{child}")?;
                }
                write!(f, "</{name}>")
            }
            Self::Text(text) => write!(f, "{}", partial_escape(text.as_str())),
            Self::Comment(text) => write!(f, "<!--{text}-->"),
            Self::ProcessingInstruction { target, data } if data.is_empty() => {
                write!(f, "<?{target}?>")
            }
            Self::ProcessingInstruction { target, data } => write!(f, "<?{target} {data}?>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_nodes() {
        let tree = Node::document(vec![
            Node::Comment(" header ".to_owned()),
            Node::element(
                "xsl:stylesheet",
                vec![Attribute::new("test", "a < \"b\"")],
                vec![
                    Node::element("xsl:template", vec![], vec![Node::text("1 < 2 & 3")]),
                    Node::ProcessingInstruction {
                        target: "pi".to_owned(),
                        data: String::new(),
                    },
                ],
            ),
        ]);
        assert_eq!(
            tree.to_string(),
            "<!-- header --><xsl:stylesheet test=\"a &lt; &quot;b&quot;\">\
             <xsl:template>1 &lt; 2 &amp; 3</xsl:template><?pi?></xsl:stylesheet>"
        );
    }

    #[test]
    fn accessors() {
        let tree = Node::document(vec![Node::element(
            "root",
            vec![Attribute::new("href", "a.xsl")],
            vec![Node::text("a"), Node::element("b", vec![], vec![Node::text("b")])],
        )]);
        let root = tree.first_element().unwrap();
        assert_eq!(root.name(), Some("root"));
        assert_eq!(root.attribute("href"), Some("a.xsl"));
        assert_eq!(root.attribute("missing"), None);
        assert_eq!(tree.text_content(), "ab");
        assert!(Node::text("x").children().is_empty());
    }
}
