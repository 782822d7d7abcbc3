use std::{
    fmt::Debug,
    io::{self, Cursor, Read},
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use super::DefaultFileIOCallbacks;

/// A document to be read: a system identifier and, optionally, an already
/// opened byte stream.
///
/// When the stream is absent, [`InputSource::read_content`] opens the system
/// identifier through the registered input callbacks.
#[derive(Default)]
pub struct InputSource {
    system_id: Option<String>,
    public_id: Option<String>,
    stream: Option<Box<dyn Read>>,
}

impl InputSource {
    /// Create an input source that will be opened from `system_id`.
    pub fn new(system_id: impl Into<String>) -> Self {
        Self {
            system_id: Some(system_id.into()),
            ..Default::default()
        }
    }

    /// Create an input source from an opened stream.
    pub fn from_reader(reader: impl Read + 'static) -> Self {
        Self {
            stream: Some(Box::new(reader)),
            ..Default::default()
        }
    }

    /// Create an input source from a document held in memory.
    pub fn from_memory(mem: impl Into<Vec<u8>>) -> Self {
        Self::from_reader(Cursor::new(mem.into()))
    }

    pub fn with_system_id(mut self, system_id: impl Into<String>) -> Self {
        self.system_id = Some(system_id.into());
        self
    }

    pub fn with_public_id(mut self, public_id: impl Into<String>) -> Self {
        self.public_id = Some(public_id.into());
        self
    }

    pub fn system_id(&self) -> Option<&str> {
        self.system_id.as_deref()
    }

    pub fn public_id(&self) -> Option<&str> {
        self.public_id.as_deref()
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Read the whole raw content of the document.
    ///
    /// The opened stream is used if there is one. Otherwise the system
    /// identifier is opened with the registered input callbacks; with
    /// `no_net`, network schemes are refused.
    pub fn read_content(&mut self, no_net: bool) -> io::Result<Vec<u8>> {
        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => {
                let system_id = self.system_id.as_deref().ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "input source has neither a stream nor a system identifier",
                    )
                })?;
                open_input(system_id, no_net)?
            }
        };
        let mut content = vec![];
        stream.read_to_end(&mut content)?;
        Ok(content)
    }
}

impl Debug for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputSource")
            .field("system_id", &self.system_id)
            .field("public_id", &self.public_id)
            .field("stream", &self.stream.as_ref().map(|_| ".."))
            .finish()
    }
}

/// A handler able to open some kind of resources.
pub trait XmlInputCallback: Send {
    /// Check if this handler can open `filename`.
    fn is_match(&self, filename: &str) -> bool;
    fn open(&mut self, filename: &str) -> io::Result<Box<dyn Read>>;
}

pub(crate) const MAX_INPUT_CALLBACK: usize = 15;
static XML_INPUT_CALLBACK_TABLE: Mutex<Vec<Box<dyn XmlInputCallback>>> = Mutex::new(vec![]);
static XML_INPUT_CALLBACK_INITIALIZED: AtomicBool = AtomicBool::new(false);

fn is_network_resource(filename: &str) -> bool {
    ["http://", "https://", "ftp://"].iter().any(|scheme| {
        filename.len() >= scheme.len() && filename[..scheme.len()].eq_ignore_ascii_case(scheme)
    })
}

/// Open `filename` with the most recently registered callback that matches it.
pub fn open_input(filename: &str, no_net: bool) -> io::Result<Box<dyn Read>> {
    if no_net && is_network_resource(filename) {
        tracing::warn!(filename, "network access refused");
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("attempt to load network entity {filename}"),
        ));
    }
    register_default_input_callbacks();

    let mut callbacks = XML_INPUT_CALLBACK_TABLE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let callback = callbacks
        .iter_mut()
        .rev()
        .find(|callback| callback.is_match(filename))
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Unsupported,
                format!("no input handler matches {filename}"),
            )
        })?;
    tracing::trace!(filename, "opening input");
    callback.open(filename)
}

/// Registers the default compiled-in I/O handlers.
#[doc(alias = "xmlRegisterDefaultInputCallbacks")]
pub fn register_default_input_callbacks() {
    if XML_INPUT_CALLBACK_INITIALIZED.load(Ordering::Acquire) {
        return;
    }
    let mut callbacks = XML_INPUT_CALLBACK_TABLE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    // checked again under the lock; the flag is only set once the handler is in
    if XML_INPUT_CALLBACK_INITIALIZED.load(Ordering::Acquire) {
        return;
    }
    // the file handler matches everything, so it goes to the bottom
    callbacks.insert(0, Box::new(DefaultFileIOCallbacks));
    XML_INPUT_CALLBACK_INITIALIZED.store(true, Ordering::Release);
}

/// Register a new set of I/O callback for handling parser input.
/// If success, returns the number of registered handlers wrapped `Ok`, otherwise return `Err`.
///
/// This function fails if the number of callbacks exceeds `MAX_INPUT_CALLBACK`.
#[doc(alias = "xmlRegisterInputCallbacks")]
pub fn register_input_callbacks(callback: impl XmlInputCallback + 'static) -> io::Result<usize> {
    register_default_input_callbacks();
    let mut callbacks = XML_INPUT_CALLBACK_TABLE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if callbacks.len() == MAX_INPUT_CALLBACK {
        return Err(io::Error::other("Too many input callbacks."));
    }
    callbacks.push(Box::new(callback));
    Ok(callbacks.len())
}
