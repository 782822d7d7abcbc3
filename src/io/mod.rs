//! Provide methods and data structures for handling I/O actions.
//!
//! Documents are opened through a stack of [`XmlInputCallback`]s. The file
//! handler is always at the bottom of the stack; applications can register
//! their own handlers for other schemes.

mod input;

use std::{
    borrow::Cow,
    fs::{File, metadata},
    io::{self, ErrorKind, Read, stdin},
    path::{Path, PathBuf},
};

use url::Url;

pub use input::*;

/// function checks to see if `path` is a valid source (file, socket...) for XML.
///
/// if stat fails, returns 0 (if calling stat on the filename fails, it can't be right).
/// if stat succeeds and the file is a directory, returns 2.
/// otherwise returns 1.
#[doc(alias = "xmlCheckFilename")]
pub fn xml_check_filename(path: impl AsRef<Path>) -> i32 {
    match metadata(path.as_ref()) {
        Ok(meta) if meta.is_dir() => 2,
        Ok(_) => 1,
        _ => 0,
    }
}

/// Convert a `file:` URL to a path. Anything else is taken as a path.
pub fn file_url_to_path(filename: &str) -> Cow<'_, Path> {
    if filename.len() >= 5 && filename[..5].eq_ignore_ascii_case("file:") {
        if let Ok(Ok(path)) = Url::parse(filename).map(|url| url.to_file_path()) {
            return Cow::Owned(path);
        }
    }
    Cow::Borrowed(Path::new(filename))
}

/// Build the `file:` URL of `path`, made absolute against the current directory.
pub fn path_to_uri(path: impl AsRef<Path>) -> io::Result<String> {
    let path = path.as_ref();
    let path: PathBuf = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Url::from_file_path(&path)
        .map(|url| url.to_string())
        .map_err(|_| io::Error::other(format!("cannot express {} as URL", path.display())))
}

#[derive(Debug, Clone, Copy)]
pub struct DefaultFileIOCallbacks;

impl XmlInputCallback for DefaultFileIOCallbacks {
    fn is_match(&self, _filename: &str) -> bool {
        true
    }

    fn open(&mut self, filename: &str) -> io::Result<Box<dyn Read>> {
        if filename == "-" {
            return Ok(Box::new(stdin()));
        }

        let path = file_url_to_path(filename);
        match xml_check_filename(path.as_ref()) {
            0 => Err(io::Error::new(
                ErrorKind::NotFound,
                format!("{} is not found", path.display()),
            )),
            2 => Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            )),
            _ => File::open(path.as_ref()).map(|file| Box::new(file) as Box<dyn Read>),
        }
    }
}
