//! Provide methods and data structures for building stylesheets out of
//! several documents.
//!
//! A [`StylesheetHandler`] receives the events of the top-level stylesheet.
//! When it meets an `xsl:include` or `xsl:import` element it hands the
//! directive to [`process_include`], which reads the referenced document and
//! feeds its events back into the same handler.

mod handler;
mod include;

use std::{fmt::Debug, rc::Rc};

use crate::{
    error::IncludeError,
    parser::{ReaderFactory, XmlReader},
    resolver::{EntityResolver, UriResolver},
};

pub use handler::*;
pub use include::*;

pub const XSLT_NAMESPACE: &str = "http://www.w3.org/1999/XSL/Transform";

/// The default limit of nested inclusions.
pub const DEFAULT_MAX_DEPTH: usize = 40;

/// Called with every inclusion failure reported by a [`StylesheetHandler`].
pub type StructuredError = fn(&IncludeError);

/// Options for reading stylesheets, combined as bit flags.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorOption {
    /// Do not load external entities.
    NoExtEnt = 1 << 1,
    /// Forbid network access.
    NoNet = 1 << 11,
    /// Stop at the first inclusion failure instead of skipping the directive.
    Abort = 1 << 16,
}

/// The kind of document segment being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StylesheetType {
    #[default]
    TopLevel,
    Include,
    Import,
}

/// Decide what happens after an inclusion failure has been reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Record the failure, skip the directive and keep reading.
    #[default]
    Continue,
    /// Stop the whole parse with the failure.
    Abort,
}

/// The collaborators and settings shared by every inclusion of a parse.
///
/// Collaborators are reference counted, so cloning a configuration is cheap.
#[derive(Clone)]
pub struct ProcessorConfig {
    entity_resolver: Option<Rc<dyn EntityResolver>>,
    uri_resolver: Option<Rc<dyn UriResolver>>,
    template_reader: Option<Rc<dyn XmlReader>>,
    reader_factory: Option<Rc<dyn ReaderFactory>>,
    options: i32,
    max_depth: usize,
    serror: Option<StructuredError>,
}

impl ProcessorConfig {
    pub fn new() -> Self {
        Self {
            entity_resolver: None,
            uri_resolver: None,
            template_reader: None,
            reader_factory: None,
            options: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            serror: None,
        }
    }

    pub fn with_entity_resolver(mut self, resolver: impl EntityResolver + 'static) -> Self {
        self.entity_resolver = Some(Rc::new(resolver));
        self
    }

    pub fn with_uri_resolver(mut self, resolver: impl UriResolver + 'static) -> Self {
        self.uri_resolver = Some(Rc::new(resolver));
        self
    }

    /// Set the reader every inclusion reader is cloned from.
    pub fn with_template_reader(mut self, reader: impl XmlReader + 'static) -> Self {
        self.template_reader = Some(Rc::new(reader));
        self
    }

    /// Set the factory used when there is no template reader.
    pub fn with_reader_factory(mut self, factory: impl ReaderFactory + 'static) -> Self {
        self.reader_factory = Some(Rc::new(factory));
        self
    }

    /// Set the combination of [`ProcessorOption`] flags.
    pub fn with_options(mut self, options: i32) -> Self {
        self.options = options;
        self
    }

    pub fn with_option(mut self, option: ProcessorOption) -> Self {
        self.options |= option as i32;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_structured_error(mut self, serror: StructuredError) -> Self {
        self.serror = Some(serror);
        self
    }

    pub fn entity_resolver(&self) -> Option<&Rc<dyn EntityResolver>> {
        self.entity_resolver.as_ref()
    }

    pub fn uri_resolver(&self) -> Option<&Rc<dyn UriResolver>> {
        self.uri_resolver.as_ref()
    }

    pub fn template_reader(&self) -> Option<&Rc<dyn XmlReader>> {
        self.template_reader.as_ref()
    }

    pub fn reader_factory(&self) -> Option<&Rc<dyn ReaderFactory>> {
        self.reader_factory.as_ref()
    }

    pub fn options(&self) -> i32 {
        self.options
    }

    pub fn has_option(&self, option: ProcessorOption) -> bool {
        self.options & option as i32 != 0
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn structured_error(&self) -> Option<StructuredError> {
        self.serror
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        if self.has_option(ProcessorOption::Abort) {
            ErrorPolicy::Abort
        } else {
            ErrorPolicy::Continue
        }
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ProcessorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorConfig")
            .field("entity_resolver", &self.entity_resolver.is_some())
            .field("uri_resolver", &self.uri_resolver.is_some())
            .field("template_reader", &self.template_reader.is_some())
            .field("reader_factory", &self.reader_factory.is_some())
            .field("options", &self.options)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}
