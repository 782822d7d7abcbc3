use std::{cell::Cell, rc::Rc};

use crate::{
    error::{ErrorKind, HandlerError, IncludeError, ReaderError},
    io::InputSource,
    parser::XmlReader,
    processor::{ErrorPolicy, IncludeContext, ProcessorConfig, StylesheetType},
    resolver::EntityResolver,
    sax::{Attribute, ContentHandler},
};

fn describe_start(name: &str, attributes: &[Attribute]) -> String {
    let mut desc = format!("start({name}");
    for attr in attributes {
        desc.push_str(&format!(" {}={}", attr.name, attr.value));
    }
    desc.push(')');
    desc
}

/// Records every event as a short string.
#[derive(Debug, Default)]
pub(crate) struct EventRecorder {
    pub(crate) events: Vec<String>,
}

impl ContentHandler for EventRecorder {
    fn start_document(&mut self) -> Result<(), HandlerError> {
        self.events.push("start-document".to_owned());
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), HandlerError> {
        self.events.push("end-document".to_owned());
        Ok(())
    }

    fn start_element(&mut self, name: &str, attributes: &[Attribute]) -> Result<(), HandlerError> {
        self.events.push(describe_start(name, attributes));
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> Result<(), HandlerError> {
        self.events.push(format!("end({name})"));
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<(), HandlerError> {
        self.events.push(format!("chars({text})"));
        Ok(())
    }

    fn ignorable_whitespace(&mut self, text: &str) -> Result<(), HandlerError> {
        self.events.push(format!("ws({})", text.len()));
        Ok(())
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), HandlerError> {
        self.events.push(format!("pi({target} {data})"));
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<(), HandlerError> {
        self.events.push(format!("comment({text})"));
        Ok(())
    }
}

/// A minimal inclusion context that records what happens to it.
///
/// Content events are tagged with the stylesheet type current when they
/// arrive.
pub(crate) struct ContextRecorder {
    config: ProcessorConfig,
    system_id: String,
    ty: StylesheetType,
    frames: Vec<Option<String>>,
    pub(crate) policy: ErrorPolicy,
    /// start tag name the handler rejects
    pub(crate) fail_on: Option<String>,
    pub(crate) events: Vec<String>,
    pub(crate) popped: Vec<(Option<String>, bool)>,
    /// kind, href and the stylesheet type when the error was reported
    pub(crate) errors: Vec<(ErrorKind, String, StylesheetType)>,
}

impl ContextRecorder {
    pub(crate) fn new(config: ProcessorConfig, system_id: &str) -> Self {
        Self {
            config,
            system_id: system_id.to_owned(),
            ty: StylesheetType::TopLevel,
            frames: vec![],
            policy: ErrorPolicy::Continue,
            fail_on: None,
            events: vec![],
            popped: vec![],
            errors: vec![],
        }
    }

    fn record(&mut self, event: String) {
        self.events.push(format!("{event} [{:?}]", self.ty));
    }
}

impl ContentHandler for ContextRecorder {
    fn start_document(&mut self) -> Result<(), HandlerError> {
        self.events.push("start-document".to_owned());
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), HandlerError> {
        self.events.push("end-document".to_owned());
        Ok(())
    }

    fn start_element(&mut self, name: &str, attributes: &[Attribute]) -> Result<(), HandlerError> {
        if self.fail_on.as_deref() == Some(name) {
            return Err(HandlerError::Message(format!("element '{name}' is rejected").into()));
        }
        self.record(describe_start(name, attributes));
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> Result<(), HandlerError> {
        self.record(format!("end({name})"));
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<(), HandlerError> {
        self.record(format!("chars({text})"));
        Ok(())
    }
}

impl IncludeContext for ContextRecorder {
    fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    fn base_identifier(&self) -> Option<&str> {
        match self.frames.last() {
            Some(frame) => frame.as_deref(),
            None => Some(self.system_id.as_str()),
        }
    }

    fn stylesheet_type(&self) -> StylesheetType {
        self.ty
    }

    fn set_stylesheet_type(&mut self, ty: StylesheetType) {
        self.ty = ty;
    }

    fn push_frame(&mut self, system_id: Option<&str>) {
        self.frames.push(system_id.map(|s| s.to_owned()));
    }

    fn pop_frame(&mut self, completed: bool) {
        if let Some(frame) = self.frames.pop() {
            self.popped.push((frame, completed));
        }
    }

    fn depth(&self) -> usize {
        self.frames.len()
    }

    fn report_error(&mut self, err: IncludeError) -> Result<(), IncludeError> {
        self.errors
            .push((err.kind(), err.href().to_owned(), self.ty));
        match self.policy {
            ErrorPolicy::Continue => Ok(()),
            ErrorPolicy::Abort => Err(err),
        }
    }
}

/// A reader that reports a fixed list of character events, whatever the
/// source, and counts how often it was cloned.
pub(crate) struct RecordedReader {
    texts: Vec<String>,
    clonable: bool,
    pub(crate) clones: Rc<Cell<usize>>,
}

impl RecordedReader {
    pub(crate) fn new(texts: Vec<String>) -> Self {
        Self {
            texts,
            clonable: true,
            clones: Rc::new(Cell::new(0)),
        }
    }

    pub(crate) fn unclonable() -> Self {
        Self {
            clonable: false,
            ..Self::new(vec![])
        }
    }
}

impl XmlReader for RecordedReader {
    fn set_entity_resolver(&mut self, _resolver: Option<Rc<dyn EntityResolver>>) {}

    fn parse(
        &mut self,
        _source: InputSource,
        handler: &mut dyn ContentHandler,
    ) -> Result<(), ReaderError> {
        for text in &self.texts {
            handler.characters(text)?;
        }
        Ok(())
    }

    fn new_sibling(&self) -> Option<Box<dyn XmlReader>> {
        if !self.clonable {
            return None;
        }
        self.clones.set(self.clones.get() + 1);
        Some(Box::new(Self {
            texts: self.texts.clone(),
            clonable: true,
            clones: self.clones.clone(),
        }))
    }
}
