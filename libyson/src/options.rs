//! Options for decoding and encoding.

use crate::encode::Format;
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Default bound on nesting of lists, maps and attributes.
pub const DEFAULT_NESTING_LIMIT: usize = 256;

/// The shape of a YSON document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum YsonType {
    /// Exactly one value.
    #[default]
    Node,
    /// `;`-separated values with no enclosing brackets.
    ListFragment,
    /// `;`-separated `key=value` pairs with no enclosing braces.
    MapFragment,
}

impl FromStr for YsonType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "node" => Ok(YsonType::Node),
            "list_fragment" => Ok(YsonType::ListFragment),
            "map_fragment" => Ok(YsonType::MapFragment),
            _ => Err(Error::configuration(format!("unknown yson type \"{s}\""))),
        }
    }
}

impl fmt::Display for YsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            YsonType::Node => "node",
            YsonType::ListFragment => "list_fragment",
            YsonType::MapFragment => "map_fragment",
        })
    }
}

/// How string bytes map to values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Encoding {
    /// Valid UTF-8 becomes text; anything else stays a byte string.
    #[default]
    Utf8,
    /// Every string stays a byte string.
    None,
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "none" => Ok(Encoding::None),
            _ => Err(Error::configuration(format!("unknown encoding \"{s}\""))),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Encoding::Utf8 => "utf-8",
            Encoding::None => "none",
        })
    }
}

/// What to do when a map repeats a key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicateKeys {
    /// The later entry replaces the earlier one.
    #[default]
    LastWins,
    /// Fail with `Error::DuplicateKey`.
    Reject,
}

/// Options for `loads`, `load` and `items`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    pub yson_type: YsonType,
    /// Return each top-level fragment item as its exact bytes.
    pub raw: bool,
    /// Decode maps and lists on first access.
    pub lazy: bool,
    pub encoding: Encoding,
    /// Give every decoded node an attribute map, empty if it had none.
    pub always_create_attributes: bool,
    /// Deepest container nesting accepted before `NestingTooDeep`.
    ///
    /// The parser recurses once per level and keeps roughly a few hundred
    /// bytes of stack per frame, so a limit in the tens of thousands can
    /// overflow a small thread stack before the check fires. Raise it only
    /// with a stack sized to match.
    pub nesting_limit: usize,
    pub duplicate_keys: DuplicateKeys,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            yson_type: YsonType::Node,
            raw: false,
            lazy: false,
            encoding: Encoding::Utf8,
            always_create_attributes: true,
            nesting_limit: DEFAULT_NESTING_LIMIT,
            duplicate_keys: DuplicateKeys::LastWins,
        }
    }
}

impl LoadOptions {
    pub fn yson_type(mut self, yson_type: YsonType) -> Self {
        self.yson_type = yson_type;
        self
    }

    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn always_create_attributes(mut self, always: bool) -> Self {
        self.always_create_attributes = always;
        self
    }

    /// See [`LoadOptions::nesting_limit`] for how this bounds stack use.
    pub fn nesting_limit(mut self, limit: usize) -> Self {
        self.nesting_limit = limit;
        self
    }

    pub fn duplicate_keys(mut self, policy: DuplicateKeys) -> Self {
        self.duplicate_keys = policy;
        self
    }

    /// Reject combinations that cannot be honored.
    pub fn validate(&self) -> Result<()> {
        if self.raw && self.yson_type == YsonType::Node {
            return Err(Error::configuration(
                "raw mode is only supported for list and map fragments",
            ));
        }
        if self.raw && self.lazy {
            return Err(Error::configuration("raw and lazy modes cannot be combined"));
        }
        if self.nesting_limit == 0 {
            return Err(Error::configuration("nesting limit must be positive"));
        }
        Ok(())
    }
}

/// Options for `dumps` and `dump`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DumpOptions {
    pub format: Format,
    pub yson_type: YsonType,
    pub encoding: Encoding,
    /// Spaces per level in `Format::Pretty`.
    pub indent: usize,
    /// Write map and attribute entries ordered by key bytes.
    pub sort_keys: bool,
}

impl Default for DumpOptions {
    fn default() -> Self {
        DumpOptions {
            format: Format::Text,
            yson_type: YsonType::Node,
            encoding: Encoding::Utf8,
            indent: 4,
            sort_keys: false,
        }
    }
}

impl DumpOptions {
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn yson_type(mut self, yson_type: YsonType) -> Self {
        self.yson_type = yson_type;
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn sort_keys(mut self, sort_keys: bool) -> Self {
        self.sort_keys = sort_keys;
        self
    }
}
