//! Error types for YSON decoding and encoding.

use crate::map::Key;
use std::fmt;
use thiserror::Error;

/// Result type for YSON operations.
pub type Result<T> = std::result::Result<T, Error>;

/// One step of the path from the document root to a failing node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "/{key}"),
            PathSegment::Index(index) => write!(f, "/{index}"),
        }
    }
}

/// Where a parse failure happened.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Location {
    /// Absolute byte offset of the failure in the input.
    pub offset: u64,
    /// Input bytes around the failure that were still buffered.
    pub context: Vec<u8>,
    /// Index of the failing byte within `context`, or `None` if that byte
    /// had already been released by the scanner.
    pub context_pos: Option<usize>,
    /// Keys and indices from the root down to the failing node.
    pub path: Vec<PathSegment>,
}

impl Location {
    /// Render the path as `/a/0/b`.
    pub fn path_string(&self) -> String {
        self.path.iter().map(|segment| segment.to_string()).collect()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " at byte {}", self.offset)?;
        if !self.path.is_empty() {
            write!(f, ", path {}", self.path_string())?;
        }
        if !self.context.is_empty() {
            write!(f, " (context: \"{}\"", self.context.escape_ascii())?;
            if let Some(pos) = self.context_pos {
                write!(f, ", position {pos}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

fn suffix(location: &Option<Box<Location>>) -> String {
    location
        .as_ref()
        .map(|location| location.to_string())
        .unwrap_or_default()
}

/// Error type for YSON decoding and encoding.
#[derive(Error, Debug)]
pub enum Error {
    /// The text grammar was violated.
    #[error("Malformed token: {message}{}", suffix(.location))]
    MalformedToken {
        message: String,
        location: Option<Box<Location>>,
    },

    /// A binary payload (varint, length, tag) was invalid.
    #[error("Malformed binary value: {message}{}", suffix(.location))]
    MalformedBinaryValue {
        message: String,
        location: Option<Box<Location>>,
    },

    /// The stream ended in the middle of a token or structure.
    #[error("Unexpected end of stream{}", suffix(.location))]
    UnexpectedEof { location: Option<Box<Location>> },

    /// Containers and attributes were nested deeper than allowed.
    #[error("Depth limit exceeded while parsing YSON (limit is {limit}){}", suffix(.location))]
    NestingTooDeep {
        limit: usize,
        location: Option<Box<Location>>,
    },

    /// A node document had bytes after its single value.
    #[error("Unexpected data after the end of the node{}", suffix(.location))]
    TrailingData { location: Option<Box<Location>> },

    /// A map key appeared twice while duplicates were rejected.
    #[error("Duplicate key \"{key}\"{}", suffix(.location))]
    DuplicateKey {
        key: String,
        location: Option<Box<Location>>,
    },

    /// A byte string was used where text was required.
    #[error("Not unicode: {0}")]
    NotUnicode(String),

    /// The options cannot be used together.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The underlying reader or writer failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed_token(message: impl Into<String>) -> Self {
        Error::MalformedToken {
            message: message.into(),
            location: None,
        }
    }

    pub(crate) fn malformed_binary(message: impl Into<String>) -> Self {
        Error::MalformedBinaryValue {
            message: message.into(),
            location: None,
        }
    }

    pub(crate) fn eof() -> Self {
        Error::UnexpectedEof { location: None }
    }

    pub(crate) fn not_unicode(bytes: &[u8]) -> Self {
        Error::NotUnicode(format!(
            "\"{}\" is not valid UTF-8",
            bytes.escape_ascii()
        ))
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    fn location_slot(&mut self) -> Option<&mut Option<Box<Location>>> {
        match self {
            Error::MalformedToken { location, .. }
            | Error::MalformedBinaryValue { location, .. }
            | Error::UnexpectedEof { location }
            | Error::NestingTooDeep { location, .. }
            | Error::TrailingData { location }
            | Error::DuplicateKey { location, .. } => Some(location),
            Error::NotUnicode(_) | Error::Configuration(_) | Error::Io(_) => None,
        }
    }

    /// Attach a location. An error that is already located keeps its
    /// original location, so the innermost failure point wins.
    pub fn at(mut self, location: Location) -> Self {
        if let Some(slot) = self.location_slot() {
            if slot.is_none() {
                *slot = Some(Box::new(location));
            }
        }
        self
    }

    /// The location of a parse failure, if this error has one.
    pub fn location(&self) -> Option<&Location> {
        match self {
            Error::MalformedToken { location, .. }
            | Error::MalformedBinaryValue { location, .. }
            | Error::UnexpectedEof { location }
            | Error::NestingTooDeep { location, .. }
            | Error::TrailingData { location }
            | Error::DuplicateKey { location, .. } => location.as_deref(),
            Error::NotUnicode(_) | Error::Configuration(_) | Error::Io(_) => None,
        }
    }

    fn prepend(mut self, segment: PathSegment) -> Self {
        if let Some(Some(location)) = self.location_slot() {
            location.path.insert(0, segment);
        }
        self
    }

    /// Record that the failure happened under `key` of an enclosing map.
    pub(crate) fn in_key(self, key: &Key) -> Self {
        self.prepend(PathSegment::Key(key.to_string()))
    }

    /// Record that the failure happened at `index` of an enclosing list.
    pub(crate) fn in_index(self, index: usize) -> Self {
        self.prepend(PathSegment::Index(index))
    }
}
