//! Provide methods and data structures for receiving the events of a parse.
//!
//! A reading engine reports what it reads to a [`ContentHandler`], one call
//! per event, in document order.

use crate::error::HandlerError;

pub const XML_XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// An attribute of a start tag, with its entity references already replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// The qualified name as written in the document.
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        split_qname(&self.name).0
    }

    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    /// If this attribute declares a namespace, return the declared prefix
    /// (`""` for the default namespace).
    pub fn declared_prefix(&self) -> Option<&str> {
        if self.name == "xmlns" {
            Some("")
        } else {
            self.name.strip_prefix("xmlns:")
        }
    }
}

/// Split a qualified name into its prefix and local part.
pub fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => (Some(prefix), local),
        _ => (None, name),
    }
}

/// Receive notification of the logical content of a document.
///
/// Every callback may fail; the engine stops reading and hands the error
/// back to its caller.
#[doc(alias = "xmlSAXHandler")]
pub trait ContentHandler {
    fn start_document(&mut self) -> Result<(), HandlerError> {
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), HandlerError> {
        Ok(())
    }

    fn start_element(&mut self, name: &str, attributes: &[Attribute]) -> Result<(), HandlerError>;

    fn end_element(&mut self, name: &str) -> Result<(), HandlerError>;

    fn characters(&mut self, text: &str) -> Result<(), HandlerError>;

    fn ignorable_whitespace(&mut self, text: &str) -> Result<(), HandlerError> {
        self.characters(text)
    }

    fn processing_instruction(&mut self, _target: &str, _data: &str) -> Result<(), HandlerError> {
        Ok(())
    }

    fn comment(&mut self, _text: &str) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// The in-scope namespace declarations of the elements being read.
#[derive(Debug, Clone)]
pub struct NamespaceScopes {
    bindings: Vec<(String, String)>,
    // the length of `bindings` when each open element started
    marks: Vec<usize>,
}

impl NamespaceScopes {
    pub fn new() -> Self {
        Self {
            bindings: vec![("xml".to_owned(), XML_XML_NAMESPACE.to_owned())],
            marks: vec![],
        }
    }

    /// Open the scope of an element with the declarations found in `attributes`.
    pub fn push(&mut self, attributes: &[Attribute]) {
        self.marks.push(self.bindings.len());
        for attr in attributes {
            if let Some(prefix) = attr.declared_prefix() {
                self.bindings.push((prefix.to_owned(), attr.value.clone()));
            }
        }
    }

    pub fn pop(&mut self) {
        if let Some(mark) = self.marks.pop() {
            self.bindings.truncate(mark);
        }
    }

    /// Look up the namespace bound to `prefix` (`""` for the default one).
    ///
    /// An empty binding undeclares the default namespace.
    pub fn lookup(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    /// Split an element name into its namespace and local part.
    pub fn expand<'a>(&self, name: &'a str) -> (Option<&str>, &'a str) {
        let (prefix, local) = split_qname(name);
        (self.lookup(prefix.unwrap_or("")), local)
    }

    pub fn depth(&self) -> usize {
        self.marks.len()
    }
}

impl Default for NamespaceScopes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qname_split() {
        const CASES: &[(&str, Option<&str>, &str)] = &[
            ("xsl:include", Some("xsl"), "include"),
            ("include", None, "include"),
            (":odd", None, ":odd"),
            ("odd:", None, "odd:"),
        ];
        for &(name, prefix, local) in CASES {
            assert_eq!(split_qname(name), (prefix, local), "{name}");
        }
    }

    #[test]
    fn scopes_follow_elements() {
        let mut scopes = NamespaceScopes::new();
        scopes.push(&[
            Attribute::new("xmlns:xsl", "http://www.w3.org/1999/XSL/Transform"),
            Attribute::new("version", "1.0"),
        ]);
        assert_eq!(
            scopes.expand("xsl:include"),
            (Some("http://www.w3.org/1999/XSL/Transform"), "include")
        );
        assert_eq!(scopes.expand("plain"), (None, "plain"));

        scopes.push(&[Attribute::new("xmlns", "urn:default")]);
        assert_eq!(scopes.expand("plain"), (Some("urn:default"), "plain"));
        scopes.push(&[Attribute::new("xmlns", "")]);
        assert_eq!(scopes.expand("plain"), (None, "plain"));
        scopes.pop();
        scopes.pop();
        assert_eq!(scopes.expand("plain"), (None, "plain"));
        assert_eq!(scopes.lookup("xml"), Some(XML_XML_NAMESPACE));
        assert_eq!(scopes.depth(), 1);
    }
}
