//! Provide methods for reading the document referenced by an inclusion
//! directive into the stylesheet being built.
//!
//! [`process_include`] switches the shared parse context to the included
//! segment, resolves the reference, picks how the content is obtained and
//! streams it into the same handler. The context is restored on every exit
//! path before any failure is reported.

use std::{
    fmt::Debug,
    ops::{Deref, DerefMut},
};

use crate::{
    error::{HandlerError, IncludeError, ParseError, ReaderError},
    io::InputSource,
    parser::{DefaultReaderFactory, ReaderFactory, XmlReader},
    resolver::{EntityResolver, UriResolver},
    sax::{Attribute, ContentHandler},
    tree::{Node, TreeWalker},
    uri::{XmlURI, build_uri, escape_url},
};

use super::{ProcessorConfig, StylesheetType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Include,
    Import,
}

impl DirectiveKind {
    /// Recognize the local name of a directive element in the XSLT namespace.
    pub fn from_local_name(name: &str) -> Option<Self> {
        match name {
            "include" => Some(Self::Include),
            "import" => Some(Self::Import),
            _ => None,
        }
    }

    /// The kind of segment the referenced document is read as.
    pub fn stylesheet_type(self) -> StylesheetType {
        match self {
            Self::Include => StylesheetType::Include,
            Self::Import => StylesheetType::Import,
        }
    }
}

/// An `xsl:include` or `xsl:import` element met while reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionDirective {
    pub kind: DirectiveKind,
    pub href: String,
}

impl InclusionDirective {
    pub fn new(kind: DirectiveKind, href: impl Into<String>) -> Self {
        Self {
            kind,
            href: href.into(),
        }
    }

    /// Bind a directive from the attributes of its element.
    ///
    /// A missing `href` is bound as an empty reference, which fails when the
    /// directive is processed.
    pub fn from_attributes(kind: DirectiveKind, attributes: &[Attribute]) -> Self {
        let href = attributes
            .iter()
            .find(|attr| attr.name == "href")
            .map(|attr| attr.value.as_str())
            .unwrap_or_default();
        Self::new(kind, href)
    }
}

/// The shared parse context an inclusion is processed in.
///
/// Implementors are the handler that builds the enclosing stylesheet; the
/// included document is streamed back into it.
pub trait IncludeContext: ContentHandler {
    fn config(&self) -> &ProcessorConfig;

    /// The system identifier of the document currently being read.
    fn base_identifier(&self) -> Option<&str>;

    fn stylesheet_type(&self) -> StylesheetType;

    fn set_stylesheet_type(&mut self, ty: StylesheetType);

    /// Start a frame for an included document.
    fn push_frame(&mut self, system_id: Option<&str>);

    /// End the innermost frame. `completed` is false if its document could
    /// not be read to the end.
    fn pop_frame(&mut self, completed: bool);

    /// The number of included documents currently open.
    fn depth(&self) -> usize;

    /// Receive an inclusion failure.
    ///
    /// Returning `Ok` skips the directive and lets the enclosing parse go on.
    /// Returning `Err` stops the enclosing parse with the error.
    fn report_error(&mut self, err: IncludeError) -> Result<(), IncludeError>;
}

/// How the content of an included document is obtained.
pub enum Strategy {
    /// A reader supplied by the URI resolver.
    Reader(Box<dyn XmlReader>),
    /// A tree supplied by the URI resolver.
    Tree(Node),
    /// A reader provisioned from the configuration.
    Default,
}

impl Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reader(_) => write!(f, "Reader"),
            Self::Tree(node) => f.debug_tuple("Tree").field(node).finish(),
            Self::Default => write!(f, "Default"),
        }
    }
}

/// Turn the reference of a directive into an input source.
///
/// The entity resolver is asked first. When there is none, or it has no
/// opinion, the reference is made absolute against `base`.
pub fn resolve_reference(
    href: &str,
    base: Option<&str>,
    entity_resolver: Option<&dyn EntityResolver>,
) -> Result<InputSource, IncludeError> {
    if href.trim().is_empty() {
        return Err(IncludeError::resolution(href, "empty reference"));
    }

    if let Some(source) = entity_resolver.and_then(|resolver| resolver.resolve_entity(None, href)) {
        tracing::debug!(href, system_id = source.system_id(), "reference resolved by the entity resolver");
        return Ok(source);
    }

    let escaped = escape_url(href);
    if XmlURI::parse(&escaped).is_none() {
        return Err(IncludeError::resolution(href, "malformed URI reference"));
    }
    let system_id = match base {
        Some(base) => build_uri(&escaped, base).ok_or_else(|| {
            IncludeError::resolution(href, format!("cannot be made absolute against '{base}'"))
        })?,
        None => escaped.into_owned(),
    };
    tracing::debug!(href, base, %system_id, "reference resolved");
    Ok(InputSource::new(system_id))
}

/// Decide how the content of `source` is obtained.
///
/// A reader from the URI resolver wins over a tree; the tree is not asked
/// for once a reader is supplied.
pub fn select_strategy(source: &InputSource, uri_resolver: Option<&dyn UriResolver>) -> Strategy {
    let Some(resolver) = uri_resolver else {
        return Strategy::Default;
    };
    let strategy = if let Some(reader) = resolver.get_reader(source) {
        Strategy::Reader(reader)
    } else if let Some(node) = resolver.get_tree_node(source) {
        Strategy::Tree(node)
    } else {
        Strategy::Default
    };
    tracing::trace!(system_id = source.system_id(), ?strategy, "strategy selected");
    strategy
}

/// Obtain a fresh reader for `href`: a sibling of the template reader if
/// one is configured, otherwise one built by the factory.
#[doc(alias = "XMLReaderFactory")]
pub fn provision_reader(
    config: &ProcessorConfig,
    href: &str,
) -> Result<Box<dyn XmlReader>, IncludeError> {
    if let Some(template) = config.template_reader() {
        tracing::trace!(href, "cloning the template reader");
        return template
            .new_sibling()
            .ok_or_else(|| IncludeError::provisioning(href, "the template reader cannot be cloned"));
    }
    let reader = match config.reader_factory() {
        Some(factory) => factory.create_reader(),
        None => DefaultReaderFactory::new(config.options()).create_reader(),
    };
    tracing::trace!(href, ok = reader.is_ok(), "reader created by the factory");
    reader.map_err(|e| IncludeError::provisioning(href, e.to_string()))
}

/// Read the document referenced by `directive` into `handler`.
///
/// The stylesheet type of `handler` is switched to the directive's kind for
/// the duration of the call, and a frame is pushed once the reference is
/// resolved. Both are undone before this returns, whatever the outcome.
///
/// Failures are passed to [`IncludeContext::report_error`] after the context
/// is restored, and its decision is returned. Failures already escalated by
/// `handler` from a nested inclusion are returned without being reported
/// again.
pub fn process_include<H: IncludeContext>(
    handler: &mut H,
    directive: &InclusionDirective,
) -> Result<(), IncludeError> {
    let href = directive.href.as_str();
    let outcome = {
        let mut guard = ContextGuard::enter(handler, directive.kind.stylesheet_type());
        include_document(&mut guard, href)
    };
    match outcome {
        Ok(()) => Ok(()),
        Err(Failure::Escalated(err)) => Err(err),
        Err(Failure::Failed(err)) => {
            tracing::debug!(href, kind = %err.kind(), "reporting inclusion failure");
            handler.report_error(err)
        }
    }
}

enum Failure {
    /// Not reported yet.
    Failed(IncludeError),
    /// Already reported and escalated by the handler.
    Escalated(IncludeError),
}

impl From<IncludeError> for Failure {
    fn from(value: IncludeError) -> Self {
        Self::Failed(value)
    }
}

impl Failure {
    fn from_handler(href: &str, system_id: Option<&str>, err: HandlerError) -> Self {
        match err {
            HandlerError::Include(err) => Self::Escalated(*err),
            HandlerError::Message(msg) => Self::Failed(IncludeError::Parse {
                href: href.to_owned(),
                source: ParseError::new(system_id, 0, msg),
            }),
        }
    }

    fn from_reader(href: &str, system_id: Option<&str>, err: ReaderError) -> Self {
        match err {
            ReaderError::Io(source) => Self::Failed(IncludeError::Io {
                href: href.to_owned(),
                source,
            }),
            ReaderError::Syntax(source) => Self::Failed(IncludeError::Parse {
                href: href.to_owned(),
                source,
            }),
            ReaderError::Handler(err) => Self::from_handler(href, system_id, err),
        }
    }
}

/// Holds the handler while an inclusion runs and restores its context when
/// dropped.
struct ContextGuard<'a, H: IncludeContext> {
    handler: &'a mut H,
    saved: StylesheetType,
    pushed: bool,
    completed: bool,
}

impl<'a, H: IncludeContext> ContextGuard<'a, H> {
    fn enter(handler: &'a mut H, ty: StylesheetType) -> Self {
        let saved = handler.stylesheet_type();
        handler.set_stylesheet_type(ty);
        Self {
            handler,
            saved,
            pushed: false,
            completed: false,
        }
    }

    fn enter_frame(&mut self, system_id: Option<&str>) {
        self.handler.push_frame(system_id);
        self.pushed = true;
    }
}

impl<H: IncludeContext> Deref for ContextGuard<'_, H> {
    type Target = H;

    fn deref(&self) -> &Self::Target {
        self.handler
    }
}

impl<H: IncludeContext> DerefMut for ContextGuard<'_, H> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.handler
    }
}

impl<H: IncludeContext> Drop for ContextGuard<'_, H> {
    fn drop(&mut self) {
        if self.pushed {
            self.handler.pop_frame(self.completed);
        }
        self.handler.set_stylesheet_type(self.saved);
    }
}

fn include_document<H: IncludeContext>(
    guard: &mut ContextGuard<'_, H>,
    href: &str,
) -> Result<(), Failure> {
    let config = guard.config().clone();
    if guard.depth() >= config.max_depth() {
        return Err(IncludeError::resolution(
            href,
            format!("inclusions are nested more than {} levels deep", config.max_depth()),
        )
        .into());
    }

    let source = resolve_reference(
        href,
        guard.base_identifier(),
        config.entity_resolver().map(|resolver| resolver.as_ref()),
    )?;
    let strategy = select_strategy(&source, config.uri_resolver().map(|resolver| resolver.as_ref()));
    guard.enter_frame(source.system_id());

    match strategy {
        Strategy::Tree(node) => {
            let system_id = source.system_id();
            TreeWalker::new(&node)
                .walk(&mut **guard)
                .map_err(|e| Failure::from_handler(href, system_id, e))?;
        }
        Strategy::Reader(reader) => stream(reader, source, &mut **guard, &config, href)?,
        Strategy::Default => {
            let reader = provision_reader(&config, href)?;
            stream(reader, source, &mut **guard, &config, href)?;
        }
    }
    guard.completed = true;
    Ok(())
}

fn stream(
    mut reader: Box<dyn XmlReader>,
    source: InputSource,
    handler: &mut dyn ContentHandler,
    config: &ProcessorConfig,
    href: &str,
) -> Result<(), Failure> {
    if let Some(resolver) = config.entity_resolver() {
        reader.set_entity_resolver(Some(resolver.clone()));
    }
    let system_id = source.system_id().map(|s| s.to_owned());
    reader
        .parse(source, handler)
        .map_err(|e| Failure::from_reader(href, system_id.as_deref(), e))
}
