//! Read XSLT stylesheets made of several documents.
//!
//! `xsl:include` and `xsl:import` elements are processed while the
//! enclosing stylesheet is being read: the referenced document is resolved,
//! read, and its events are spliced into the handler building the
//! stylesheet. See [`processor`] for the entry points.
//!
//! ```no_run
//! use xslinc::processor::{ProcessorConfig, StylesheetHandler};
//!
//! let mut handler = StylesheetHandler::new(ProcessorConfig::new());
//! let sheet = handler.parse_file("file:///path/to/main.xsl").unwrap();
//! for doc in sheet.documents() {
//!     println!("{:?}", doc.system_id());
//! }
//! ```

#![warn(unused_imports)]
#![warn(unused_mut)]
#![warn(unused_variables)]

pub mod encoding;
pub mod error;
pub mod io;
pub mod parser;
pub mod processor;
pub mod resolver;
pub mod sax;
#[cfg(test)]
pub(crate) mod test_util;
pub mod tree;
pub mod uri;
