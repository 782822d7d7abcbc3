use std::{collections::HashMap, rc::Rc, str::from_utf8};

use quick_xml::{
    Reader,
    escape::{resolve_predefined_entity, unescape_with},
    events::Event,
};

use crate::{
    encoding::decode_document,
    error::{ParseError, ReaderError},
    io::InputSource,
    processor::ProcessorOption,
    resolver::EntityResolver,
    sax::{Attribute, ContentHandler},
    uri::build_uri,
};

use super::{
    XmlReader,
    dtd::{EntityValue, parse_doctype},
};

/// External entities may reference each other; this bounds the nesting.
const MAX_ENTITY_DEPTH: usize = 16;

/// The default reading engine, a streaming reader built on `quick-xml`.
///
/// Entities declared in the internal subset are replaced while reading.
/// The replacement text of an external entity is loaded through the entity
/// resolver, or from its system identifier made absolute against the
/// document, and is reported as character data.
#[derive(Default)]
pub struct XmlStreamReader {
    options: i32,
    entity_resolver: Option<Rc<dyn EntityResolver>>,
}

impl XmlStreamReader {
    /// Create a reader with a combination of [`ProcessorOption`] flags.
    pub fn new(options: i32) -> Self {
        Self {
            options,
            entity_resolver: None,
        }
    }

    pub fn options(&self) -> i32 {
        self.options
    }

    fn has_option(&self, option: ProcessorOption) -> bool {
        self.options & option as i32 != 0
    }
}

impl XmlReader for XmlStreamReader {
    fn set_entity_resolver(&mut self, resolver: Option<Rc<dyn EntityResolver>>) {
        self.entity_resolver = resolver;
    }

    fn parse(
        &mut self,
        mut source: InputSource,
        handler: &mut dyn ContentHandler,
    ) -> Result<(), ReaderError> {
        let system_id = source.system_id().map(|s| s.to_owned());
        tracing::debug!(system_id = system_id.as_deref(), "start reading");
        let content = source.read_content(self.has_option(ProcessorOption::NoNet))?;
        let text = decode_document(&content)
            .map_err(|e| ParseError::new(system_id.as_deref(), 0, e.to_string()))?;

        let mut ctxt = StreamContext {
            reader: self,
            system_id: system_id.as_deref(),
            entities: HashMap::new(),
            expanded: HashMap::new(),
        };
        ctxt.run(&text, handler)
    }

    fn new_sibling(&self) -> Option<Box<dyn XmlReader>> {
        Some(Box::new(Self {
            options: self.options,
            entity_resolver: self.entity_resolver.clone(),
        }))
    }
}

/// The state of one `parse` call.
struct StreamContext<'a> {
    reader: &'a XmlStreamReader,
    system_id: Option<&'a str>,
    entities: HashMap<String, EntityValue>,
    // fully expanded replacement texts, by entity name
    expanded: HashMap<String, Expansion>,
}

struct Expansion {
    text: String,
    // an external entity was read to produce `text`
    external: bool,
}

impl StreamContext<'_> {
    fn error(&self, position: u64, message: impl Into<String>) -> ParseError {
        ParseError::new(self.system_id, position, message)
    }

    fn run(&mut self, text: &str, handler: &mut dyn ContentHandler) -> Result<(), ReaderError> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(false);
        reader.config_mut().expand_empty_elements = true;

        handler.start_document()?;
        let mut depth = 0usize;
        let mut seen_root = false;
        loop {
            let position = reader.buffer_position() as u64;
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    return Err(self.error(reader.error_position() as u64, e.to_string()).into());
                }
            };
            match event {
                Event::Decl(_) => {}
                Event::DocType(doctype) => {
                    let content = from_utf8(&doctype).map_err(|e| self.error(position, e.to_string()))?;
                    let entities =
                        parse_doctype(content).map_err(|msg| self.error(position, msg))?;
                    self.entities = entities;
                    tracing::trace!(entities = self.entities.len(), "internal subset read");
                }
                Event::Start(start) => {
                    if depth == 0 && seen_root {
                        return Err(self.error(position, "extra content at the end of the document").into());
                    }
                    let name = from_utf8(start.name().into_inner())
                        .map_err(|e| self.error(position, e.to_string()))?;
                    let mut attributes = vec![];
                    for attr in start.attributes() {
                        let attr = attr.map_err(|e| self.error(position, e.to_string()))?;
                        let key = from_utf8(attr.key.into_inner())
                            .map_err(|e| self.error(position, e.to_string()))?;
                        let raw = from_utf8(&attr.value)
                            .map_err(|e| self.error(position, e.to_string()))?;
                        let value = self.replace_in_attribute(raw, position)?;
                        attributes.push(Attribute::new(key, value));
                    }
                    handler.start_element(name, &attributes)?;
                    depth += 1;
                    seen_root = true;
                }
                Event::End(end) => {
                    let name = from_utf8(end.name().into_inner())
                        .map_err(|e| self.error(position, e.to_string()))?;
                    handler.end_element(name)?;
                    depth = depth.saturating_sub(1);
                }
                Event::Text(content) => {
                    let raw = from_utf8(&content).map_err(|e| self.error(position, e.to_string()))?;
                    if depth == 0 {
                        if raw.trim().is_empty() {
                            continue;
                        }
                        return Err(self.error(position, "content outside of the root element").into());
                    }
                    let text = self.replace_in_content(raw, position)?;
                    if text.trim().is_empty() {
                        handler.ignorable_whitespace(&text)?;
                    } else {
                        handler.characters(&text)?;
                    }
                }
                Event::CData(content) => {
                    let text = from_utf8(&content).map_err(|e| self.error(position, e.to_string()))?;
                    handler.characters(text)?;
                }
                Event::Comment(content) => {
                    let text = from_utf8(&content).map_err(|e| self.error(position, e.to_string()))?;
                    handler.comment(text)?;
                }
                Event::PI(pi) => {
                    let target =
                        from_utf8(pi.target()).map_err(|e| self.error(position, e.to_string()))?;
                    let data =
                        from_utf8(pi.content()).map_err(|e| self.error(position, e.to_string()))?;
                    handler.processing_instruction(target, data.trim_start())?;
                }
                Event::Eof => {
                    if depth != 0 {
                        return Err(self.error(position, "premature end of data").into());
                    }
                    if !seen_root {
                        return Err(self.error(position, "document is empty").into());
                    }
                    break;
                }
                _ => {}
            }
        }
        handler.end_document()?;
        Ok(())
    }

    /// Replace the references of an attribute value. External entities are
    /// not allowed there, not even through another entity.
    fn replace_in_attribute(&mut self, raw: &str, position: u64) -> Result<String, ReaderError> {
        self.replace_references(raw, position, 0, false)
    }

    /// Replace the references of character data.
    fn replace_in_content(&mut self, raw: &str, position: u64) -> Result<String, ReaderError> {
        self.replace_references(raw, position, 0, true)
    }

    /// Expand the entities `raw` references first, so that their replacement
    /// text is complete when it is substituted.
    fn replace_references(
        &mut self,
        raw: &str,
        position: u64,
        depth: usize,
        allow_external: bool,
    ) -> Result<String, ReaderError> {
        if depth > MAX_ENTITY_DEPTH {
            return Err(self.error(position, "entities are nested too deeply").into());
        }
        for name in referenced_names(raw) {
            if resolve_predefined_entity(name).is_none() && self.entities.contains_key(name) {
                self.expand_entity(name, position, depth, allow_external)?;
            }
        }

        let replaced = unescape_with(raw, |name| {
            resolve_predefined_entity(name)
                .or_else(|| self.expanded.get(name).map(|expansion| expansion.text.as_str()))
        })
        .map_err(|e| self.error(position, e.to_string()))?;
        Ok(replaced.into_owned())
    }

    fn expand_entity(
        &mut self,
        name: &str,
        position: u64,
        depth: usize,
        allow_external: bool,
    ) -> Result<(), ReaderError> {
        let external_in_attribute = || {
            format!("attribute value references the external entity '{name}'")
        };
        if let Some(expansion) = self.expanded.get(name) {
            if expansion.external && !allow_external {
                return Err(self.error(position, external_in_attribute()).into());
            }
            return Ok(());
        }

        let (raw, mut external) = match self.entities.get(name).cloned() {
            Some(EntityValue::Internal(value)) => (value, false),
            Some(EntityValue::External {
                public_id,
                system_id,
            }) => {
                if !allow_external {
                    return Err(self.error(position, external_in_attribute()).into());
                }
                let text = self.load_external(name, public_id.as_deref(), &system_id, position)?;
                (text, true)
            }
            None => return Ok(()),
        };
        let text = self.replace_references(&raw, position, depth + 1, allow_external)?;
        external |= referenced_names(&raw).any(|name| {
            self.expanded
                .get(name)
                .is_some_and(|expansion| expansion.external)
        });
        self.expanded
            .insert(name.to_owned(), Expansion { text, external });
        Ok(())
    }

    /// Read the replacement text of an external entity, its text declaration
    /// removed.
    fn load_external(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: &str,
        position: u64,
    ) -> Result<String, ReaderError> {
        if self.reader.has_option(ProcessorOption::NoExtEnt) {
            tracing::warn!(entity = name, "loading of external entities is disabled");
            return Ok(String::new());
        }

        let source = self
            .reader
            .entity_resolver
            .as_ref()
            .and_then(|resolver| resolver.resolve_entity(public_id, system_id));
        let mut source = match source {
            Some(source) => source,
            None => {
                let uri = match self.system_id {
                    Some(base) => build_uri(system_id, base),
                    None => Some(system_id.to_owned()),
                }
                .ok_or_else(|| {
                    self.error(position, format!("cannot resolve the entity '{name}'"))
                })?;
                let source = InputSource::new(uri);
                match public_id {
                    Some(public_id) => source.with_public_id(public_id),
                    None => source,
                }
            }
        };
        tracing::debug!(
            entity = name,
            public_id = source.public_id(),
            system_id = source.system_id(),
            "loading external entity"
        );

        let content = source.read_content(self.reader.has_option(ProcessorOption::NoNet))?;
        let text = decode_document(&content).map_err(|e| self.error(position, e.to_string()))?;
        Ok(strip_text_declaration(&text).to_owned())
    }
}

/// The names of the general entity references in `raw`.
fn referenced_names(raw: &str) -> impl Iterator<Item = &str> {
    raw.split('&')
        .skip(1)
        .filter_map(|chunk| chunk.split_once(';').map(|(name, _)| name))
        .filter(|name| !name.starts_with('#'))
}

fn strip_text_declaration(text: &str) -> &str {
    if let Some(rest) = text.strip_prefix("<?xml") {
        if rest.starts_with(|c: char| c.is_whitespace()) {
            if let Some(end) = rest.find("?>") {
                return &rest[end + 2..];
            }
        }
    }
    text
}
