//! Provide the hooks applications use to redirect where documents come from.

use crate::{io::InputSource, parser::XmlReader, tree::Node};

/// Map an external identifier to the input that should be read instead.
///
/// Returning `None` means the resolver has no opinion; the caller then uses
/// the system identifier as is.
pub trait EntityResolver {
    fn resolve_entity(&self, public_id: Option<&str>, system_id: &str) -> Option<InputSource>;
}

impl<F> EntityResolver for F
where
    F: Fn(Option<&str>, &str) -> Option<InputSource>,
{
    fn resolve_entity(&self, public_id: Option<&str>, system_id: &str) -> Option<InputSource> {
        self(public_id, system_id)
    }
}

/// Supply the content of a resolved document in some other form than a
/// byte stream.
///
/// Both queries default to `None`, so implementors only provide the form
/// they support.
#[doc(alias = "URIResolver")]
pub trait UriResolver {
    /// A reader already positioned on the content of `source`.
    fn get_reader(&self, _source: &InputSource) -> Option<Box<dyn XmlReader>> {
        None
    }

    /// An already built tree holding the content of `source`.
    fn get_tree_node(&self, _source: &InputSource) -> Option<Node> {
        None
    }
}

/// An [`EntityResolver`] answering from a fixed table of system identifiers.
#[derive(Debug, Clone, Default)]
pub struct MemoryEntityResolver {
    documents: Vec<(String, Vec<u8>)>,
}

impl MemoryEntityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `content` whenever `system_id` is requested.
    pub fn insert(&mut self, system_id: impl Into<String>, content: impl Into<Vec<u8>>) {
        let system_id = system_id.into();
        let content = content.into();
        match self.documents.iter_mut().find(|(id, _)| *id == system_id) {
            Some(entry) => entry.1 = content,
            None => self.documents.push((system_id, content)),
        }
    }
}

impl EntityResolver for MemoryEntityResolver {
    fn resolve_entity(&self, public_id: Option<&str>, system_id: &str) -> Option<InputSource> {
        let (id, content) = self.documents.iter().find(|(id, _)| id == system_id)?;
        let source = InputSource::from_memory(content.clone()).with_system_id(id);
        Some(match public_id {
            Some(public_id) => source.with_public_id(public_id),
            None => source,
        })
    }
}
