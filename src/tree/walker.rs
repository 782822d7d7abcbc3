use crate::{error::HandlerError, sax::ContentHandler};

use super::Node;

/// Replay a tree as parse events, in document order.
///
/// Document start and end are only reported when walking a
/// [`Node::Document`]; walking any other node reports its own subtree.
pub struct TreeWalker<'a> {
    root: &'a Node,
}

impl<'a> TreeWalker<'a> {
    pub fn new(root: &'a Node) -> Self {
        Self { root }
    }

    pub fn walk(&self, handler: &mut dyn ContentHandler) -> Result<(), HandlerError> {
        if let Node::Document { children } = self.root {
            handler.start_document()?;
            for child in children {
                emit(child, handler)?;
            }
            handler.end_document()
        } else {
            emit(self.root, handler)
        }
    }
}

fn emit(node: &Node, handler: &mut dyn ContentHandler) -> Result<(), HandlerError> {
    match node {
        Node::Document { children } => {
            for child in children {
                emit(child, handler)?;
            }
            Ok(())
        }
        Node::Element {
            name,
            attributes,
            children,
        } => {
            handler.start_element(name, attributes)?;
            for child in children {
                emit(child, handler)?;
            }
            handler.end_element(name)
        }
        Node::Text(text) if text.trim().is_empty() => handler.ignorable_whitespace(text),
        Node::Text(text) => handler.characters(text),
        Node::Comment(text) => handler.comment(text),
        Node::ProcessingInstruction { target, data } => handler.processing_instruction(target, data),
    }
}
