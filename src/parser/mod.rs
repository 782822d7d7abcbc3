//! Provide methods and data structures for reading engines.
//!
//! An [`XmlReader`] consumes an [`InputSource`] and reports the content it
//! reads to a [`ContentHandler`]. The crate ships one engine,
//! [`XmlStreamReader`]; applications may plug in their own.

mod dtd;
mod stream;

use std::{error::Error, rc::Rc};

use crate::{
    error::ReaderError, io::InputSource, resolver::EntityResolver, sax::ContentHandler,
};

pub use stream::*;

/// A reading engine.
#[doc(alias = "XMLReader")]
pub trait XmlReader {
    /// Set the resolver used for the external entities met while reading.
    fn set_entity_resolver(&mut self, resolver: Option<Rc<dyn EntityResolver>>);

    /// Read `source` to the end, reporting its content to `handler`.
    fn parse(
        &mut self,
        source: InputSource,
        handler: &mut dyn ContentHandler,
    ) -> Result<(), ReaderError>;

    /// Create a fresh reader configured like this one.
    ///
    /// Returns `None` if this engine cannot be duplicated.
    fn new_sibling(&self) -> Option<Box<dyn XmlReader>>;
}

/// Create reading engines on demand.
pub trait ReaderFactory {
    fn create_reader(&self) -> Result<Box<dyn XmlReader>, Box<dyn Error>>;
}

impl<F> ReaderFactory for F
where
    F: Fn() -> Result<Box<dyn XmlReader>, Box<dyn Error>>,
{
    fn create_reader(&self) -> Result<Box<dyn XmlReader>, Box<dyn Error>> {
        self()
    }
}

/// The factory used when none is configured: it builds [`XmlStreamReader`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultReaderFactory {
    options: i32,
}

impl DefaultReaderFactory {
    pub fn new(options: i32) -> Self {
        Self { options }
    }
}

impl ReaderFactory for DefaultReaderFactory {
    fn create_reader(&self) -> Result<Box<dyn XmlReader>, Box<dyn Error>> {
        Ok(Box::new(XmlStreamReader::new(self.options)))
    }
}
