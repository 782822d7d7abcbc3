use crate::{
    error::HandlerError,
    sax::{Attribute, ContentHandler},
};

use super::Node;

/// A [`ContentHandler`] that materializes the events it receives.
///
/// Adjacent character data is merged into one text node.
#[derive(Debug)]
pub struct TreeBuilder {
    // the children of the document, then of each open element
    open: Vec<(Option<(String, Vec<Attribute>)>, Vec<Node>)>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            open: vec![(None, vec![])],
        }
    }

    fn children(&mut self) -> &mut Vec<Node> {
        if self.open.is_empty() {
            self.open.push((None, vec![]));
        }
        let last = self.open.len() - 1;
        &mut self.open[last].1
    }

    /// The number of elements not closed yet.
    pub fn open_elements(&self) -> usize {
        self.open.len().saturating_sub(1)
    }

    /// Close whatever is still open and return the document node.
    pub fn finish(mut self) -> Node {
        while self.open.len() > 1 {
            self.close();
        }
        let children = self.open.pop().map(|(_, children)| children).unwrap_or_default();
        Node::document(children)
    }

    fn close(&mut self) {
        if let Some((Some((name, attributes)), children)) = self.open.pop() {
            self.children().push(Node::Element {
                name,
                attributes,
                children,
            });
        }
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHandler for TreeBuilder {
    fn start_element(&mut self, name: &str, attributes: &[Attribute]) -> Result<(), HandlerError> {
        self.open
            .push((Some((name.to_owned(), attributes.to_vec())), vec![]));
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> Result<(), HandlerError> {
        match self.open.last() {
            Some((Some((open, _)), _)) if open == name => {
                self.close();
                Ok(())
            }
            _ => Err(HandlerError::Message(
                format!("end of element '{name}' does not match the open element").into(),
            )),
        }
    }

    fn characters(&mut self, text: &str) -> Result<(), HandlerError> {
        let children = self.children();
        if let Some(Node::Text(last)) = children.last_mut() {
            last.push_str(text);
        } else {
            children.push(Node::text(text));
        }
        Ok(())
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), HandlerError> {
        self.children().push(Node::ProcessingInstruction {
            target: target.to_owned(),
            data: data.to_owned(),
        });
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<(), HandlerError> {
        self.children().push(Node::Comment(text.to_owned()));
        Ok(())
    }
}
