//! File name decoding
//!
//! The module hands `reset`/`rewrite` a fixed-width, space-padded name that may
//! carry quoting, an area prefix or a legacy device name. Decoding is an ordered
//! list of independent rules, each taking the previous result and producing a
//! new string; the final string is then classified.

use texrt_abi::{FONT_AREA_PREFIX, POOL_FILE, POOL_FILE_LEGACY, TERMINAL_DEVICE};

/// A decoded file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileName {
    /// The terminal device
    Terminal,

    /// An ordinary file in the virtual file system
    Path(String),
}

impl FileName {
    /// Decode raw name bytes taken from module memory
    pub fn decode(raw: &[u8]) -> Self {
        Self::parse(&String::from_utf8_lossy(raw))
    }

    /// Normalize a name and classify it
    pub fn parse(raw: &str) -> Self {
        let name = normalize(raw);
        if name == TERMINAL_DEVICE {
            Self::Terminal
        } else {
            Self::Path(name)
        }
    }

    /// The path, if this is an ordinary file
    pub fn as_path(&self) -> Option<&str> {
        match self {
            Self::Terminal => None,
            Self::Path(path) => Some(path),
        }
    }
}

type Rule = fn(&str) -> String;

/// Applied left to right
const RULES: &[Rule] = &[
    trim_trailing_spaces,
    unwrap_delimiters,
    strip_asterisk,
    strip_font_area,
    substitute_pool_file,
];

/// Run every normalization rule over `raw`
pub fn normalize(raw: &str) -> String {
    RULES
        .iter()
        .fold(raw.to_string(), |name, rule| rule(&name))
}

fn trim_trailing_spaces(name: &str) -> String {
    name.trim_end_matches(' ').to_string()
}

fn unwrap_delimiters(name: &str) -> String {
    let close = match name.chars().next() {
        Some('{') => '}',
        Some('"') => '"',
        _ => return name.to_string(),
    };
    let inner = &name[1..];
    match inner.find(close) {
        Some(end) => inner[..end].to_string(),
        None => inner.to_string(),
    }
}

fn strip_asterisk(name: &str) -> String {
    name.strip_prefix('*').unwrap_or(name).to_string()
}

fn strip_font_area(name: &str) -> String {
    name.strip_prefix(FONT_AREA_PREFIX).unwrap_or(name).to_string()
}

fn substitute_pool_file(name: &str) -> String {
    if name == POOL_FILE_LEGACY {
        POOL_FILE.to_string()
    } else {
        name.to_string()
    }
}
