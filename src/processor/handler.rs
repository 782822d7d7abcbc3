use crate::{
    error::{
        HandlerError, IncludeError, ReaderError, StylesheetError, generic_error_default,
    },
    io::InputSource,
    sax::{Attribute, ContentHandler, NamespaceScopes},
    tree::{Node, TreeBuilder},
};

use super::{
    DirectiveKind, ErrorPolicy, InclusionDirective, IncludeContext, ProcessorConfig,
    StylesheetType, XSLT_NAMESPACE, process_include, provision_reader,
};

/// A stylesheet document together with the documents it includes or
/// imports, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Stylesheet {
    system_id: Option<String>,
    kind: StylesheetType,
    tree: Node,
    children: Vec<Stylesheet>,
}

impl Stylesheet {
    pub fn system_id(&self) -> Option<&str> {
        self.system_id.as_deref()
    }

    pub fn kind(&self) -> StylesheetType {
        self.kind
    }

    /// The content of this document, inclusion directives left out.
    pub fn tree(&self) -> &Node {
        &self.tree
    }

    /// The root element of this document.
    pub fn root(&self) -> Option<&Node> {
        self.tree.first_element()
    }

    pub fn children(&self) -> &[Stylesheet] {
        &self.children
    }

    pub fn includes(&self) -> impl Iterator<Item = &Stylesheet> {
        self.children
            .iter()
            .filter(|child| child.kind == StylesheetType::Include)
    }

    pub fn imports(&self) -> impl Iterator<Item = &Stylesheet> {
        self.children
            .iter()
            .filter(|child| child.kind == StylesheetType::Import)
    }

    /// This document and every document below it, depth first.
    pub fn documents(&self) -> Vec<&Stylesheet> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.documents());
        }
        out
    }
}

struct Frame {
    system_id: Option<String>,
    kind: StylesheetType,
    builder: TreeBuilder,
    scopes: NamespaceScopes,
    // open elements being skipped, the directive element included
    skip: usize,
    children: Vec<Stylesheet>,
}

impl Frame {
    fn new(system_id: Option<String>, kind: StylesheetType) -> Self {
        Self {
            system_id,
            kind,
            builder: TreeBuilder::new(),
            scopes: NamespaceScopes::new(),
            skip: 0,
            children: vec![],
        }
    }

    fn finish(self) -> Stylesheet {
        Stylesheet {
            system_id: self.system_id,
            kind: self.kind,
            tree: self.builder.finish(),
            children: self.children,
        }
    }
}

/// The handler that builds a [`Stylesheet`] from the events of its
/// documents.
///
/// Each document gets its own frame. Inclusion directives are processed as
/// soon as their start tag is read, so the events of the referenced document
/// arrive in the middle of the enclosing one.
pub struct StylesheetHandler {
    config: ProcessorConfig,
    stylesheet_type: StylesheetType,
    frames: Vec<Frame>,
    errors: Vec<IncludeError>,
}

impl StylesheetHandler {
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            config,
            stylesheet_type: StylesheetType::TopLevel,
            frames: vec![],
            errors: vec![],
        }
    }

    /// The inclusion failures recorded so far.
    pub fn errors(&self) -> &[IncludeError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<IncludeError> {
        std::mem::take(&mut self.errors)
    }

    /// Read the top-level stylesheet `source` and everything it includes.
    pub fn parse_stylesheet(&mut self, source: InputSource) -> Result<Stylesheet, StylesheetError> {
        let system_id = source.system_id().map(|s| s.to_owned());
        let name = system_id.clone().unwrap_or_else(|| "(memory)".to_owned());

        let mut reader = provision_reader(&self.config, &name)?;
        if let Some(resolver) = self.config.entity_resolver() {
            reader.set_entity_resolver(Some(resolver.clone()));
        }
        self.stylesheet_type = StylesheetType::TopLevel;
        self.frames.clear();
        self.frames
            .push(Frame::new(system_id, StylesheetType::TopLevel));
        tracing::debug!(system_id = %name, "reading stylesheet");

        let res = reader.parse(source, self);
        let top = self.frames.drain(..).next();
        match res {
            Ok(()) => top
                .map(Frame::finish)
                .ok_or_else(|| StylesheetError::Read {
                    system_id: name,
                    source: ReaderError::Handler(HandlerError::Message(
                        "no stylesheet was read".into(),
                    )),
                }),
            Err(ReaderError::Handler(HandlerError::Include(err))) => Err((*err).into()),
            Err(source) => Err(StylesheetError::Read {
                system_id: name,
                source,
            }),
        }
    }

    /// Read the stylesheet stored at `system_id`.
    pub fn parse_file(&mut self, system_id: &str) -> Result<Stylesheet, StylesheetError> {
        self.parse_stylesheet(InputSource::new(system_id))
    }

    fn current(&mut self) -> Result<&mut Frame, HandlerError> {
        self.frames
            .last_mut()
            .ok_or(HandlerError::Message("no stylesheet is being read".into()))
    }
}

impl ContentHandler for StylesheetHandler {
    // the document boundaries of included documents are not part of the tree

    fn start_element(&mut self, name: &str, attributes: &[Attribute]) -> Result<(), HandlerError> {
        let frame = self.current()?;
        if frame.skip > 0 {
            frame.skip += 1;
            return Ok(());
        }

        frame.scopes.push(attributes);
        let (ns, local) = frame.scopes.expand(name);
        let kind = match ns {
            Some(XSLT_NAMESPACE) => DirectiveKind::from_local_name(local),
            _ => None,
        };
        let Some(kind) = kind else {
            return frame.builder.start_element(name, attributes);
        };

        frame.skip = 1;
        let directive = InclusionDirective::from_attributes(kind, attributes);
        tracing::debug!(href = %directive.href, ?kind, "inclusion directive");
        process_include(self, &directive)?;
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> Result<(), HandlerError> {
        let frame = self.current()?;
        if frame.skip > 0 {
            frame.skip -= 1;
            if frame.skip == 0 {
                frame.scopes.pop();
            }
            return Ok(());
        }
        frame.scopes.pop();
        frame.builder.end_element(name)
    }

    fn characters(&mut self, text: &str) -> Result<(), HandlerError> {
        let frame = self.current()?;
        if frame.skip > 0 {
            return Ok(());
        }
        frame.builder.characters(text)
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), HandlerError> {
        let frame = self.current()?;
        if frame.skip > 0 {
            return Ok(());
        }
        frame.builder.processing_instruction(target, data)
    }

    fn comment(&mut self, text: &str) -> Result<(), HandlerError> {
        let frame = self.current()?;
        if frame.skip > 0 {
            return Ok(());
        }
        frame.builder.comment(text)
    }
}

impl IncludeContext for StylesheetHandler {
    fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    fn base_identifier(&self) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.system_id.as_deref())
    }

    fn stylesheet_type(&self) -> StylesheetType {
        self.stylesheet_type
    }

    fn set_stylesheet_type(&mut self, ty: StylesheetType) {
        self.stylesheet_type = ty;
    }

    fn push_frame(&mut self, system_id: Option<&str>) {
        tracing::trace!(system_id, depth = self.frames.len(), "push frame");
        self.frames
            .push(Frame::new(system_id.map(|s| s.to_owned()), self.stylesheet_type));
    }

    fn pop_frame(&mut self, completed: bool) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        tracing::trace!(system_id = frame.system_id.as_deref(), completed, "pop frame");
        match self.frames.last_mut() {
            Some(parent) if completed => parent.children.push(frame.finish()),
            _ => {}
        }
    }

    fn depth(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    fn report_error(&mut self, err: IncludeError) -> Result<(), IncludeError> {
        tracing::warn!(kind = %err.kind(), href = err.href(), "{err}");
        match self.config.structured_error() {
            Some(serror) => serror(&err),
            None => generic_error_default(None, &format!("{err}\n")),
        }
        match self.config.error_policy() {
            ErrorPolicy::Continue => {
                self.errors.push(err);
                Ok(())
            }
            ErrorPolicy::Abort => Err(err),
        }
    }
}
