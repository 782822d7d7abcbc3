//! Provide data structures for the errors raised while processing includes.
//!
//! Every failure of an inclusion attempt is classified into one of four
//! [`ErrorKind`]s and carries the `href` that triggered it.

use std::{
    borrow::Cow,
    fmt::Display,
    io::{self, Write},
};

use thiserror::Error;

/// Write `msg` to `out`, or to the standard error when no output is given.
pub fn generic_error_default(out: Option<&mut dyn Write>, msg: &str) {
    if let Some(out) = out {
        write!(out, "{msg}").ok();
    } else {
        eprint!("{msg}");
    }
}

/// The classification of an inclusion failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The reference is empty, malformed, or cannot be made absolute.
    Resolution,
    /// A reading engine could not be constructed or cloned.
    Provisioning,
    /// The resolved document could not be opened or read.
    Io,
    /// The reading engine rejected the included content.
    Parse,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Resolution => "resolution",
            Self::Provisioning => "provisioning",
            Self::Io => "I/O",
            Self::Parse => "parse",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A failure reported by a reading engine while consuming a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}:{position}: {message}", .system_id.as_deref().unwrap_or("(unknown)"))]
pub struct ParseError {
    pub system_id: Option<String>,
    /// Byte offset in the decoded document.
    pub position: u64,
    pub message: String,
}

impl ParseError {
    pub fn new(system_id: Option<&str>, position: u64, message: impl Into<String>) -> Self {
        Self {
            system_id: system_id.map(|s| s.to_owned()),
            position,
            message: message.into(),
        }
    }
}

/// Returned by a content handler to abort the parse that feeds it.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// An inclusion failure the handler decided to escalate.
    #[error(transparent)]
    Include(Box<IncludeError>),
    #[error("{0}")]
    Message(Cow<'static, str>),
}

impl From<IncludeError> for HandlerError {
    fn from(value: IncludeError) -> Self {
        Self::Include(Box::new(value))
    }
}

/// The failure of [`XmlReader::parse`](crate::parser::XmlReader::parse).
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Syntax(#[from] ParseError),
    #[error("{0}")]
    Handler(#[from] HandlerError),
}

/// The failure of one inclusion attempt.
#[derive(Debug, Error)]
pub enum IncludeError {
    #[error("cannot resolve '{href}': {reason}")]
    Resolution {
        href: String,
        reason: Cow<'static, str>,
    },
    #[error("could not clone parser for '{href}': {reason}")]
    Provisioning {
        href: String,
        reason: Cow<'static, str>,
    },
    #[error("I/O error while including '{href}': {source}")]
    Io {
        href: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse '{href}': {source}")]
    Parse {
        href: String,
        #[source]
        source: ParseError,
    },
}

/// The failure of reading a whole stylesheet.
#[derive(Debug, Error)]
pub enum StylesheetError {
    /// An inclusion failure that stopped the parse.
    #[error(transparent)]
    Include(#[from] IncludeError),
    #[error("cannot read stylesheet '{system_id}': {source}")]
    Read {
        system_id: String,
        #[source]
        source: ReaderError,
    },
}

impl IncludeError {
    pub fn resolution(href: &str, reason: impl Into<Cow<'static, str>>) -> Self {
        Self::Resolution {
            href: href.to_owned(),
            reason: reason.into(),
        }
    }

    pub fn provisioning(href: &str, reason: impl Into<Cow<'static, str>>) -> Self {
        Self::Provisioning {
            href: href.to_owned(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Resolution { .. } => ErrorKind::Resolution,
            Self::Provisioning { .. } => ErrorKind::Provisioning,
            Self::Io { .. } => ErrorKind::Io,
            Self::Parse { .. } => ErrorKind::Parse,
        }
    }

    /// The reference string of the inclusion that failed.
    pub fn href(&self) -> &str {
        match self {
            Self::Resolution { href, .. }
            | Self::Provisioning { href, .. }
            | Self::Io { href, .. }
            | Self::Parse { href, .. } => href,
        }
    }
}
