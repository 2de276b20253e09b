//! Mapping between tile file names and grid positions.
//!
//! A tile directory has no manifest: the position of every tile is encoded
//! in its file name, `tile-<i>-<j>.tif` by default, with `i` the column
//! and `j` the row of the tile in the grid.

use std::fmt::Debug;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, TifgridError};

/// Column `i` and row `j` of a tile. Orders lexicographically on `(i, j)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileIndex {
    pub i: usize,
    pub j: usize,
}

impl TileIndex {
    pub const fn new(i: usize, j: usize) -> Self {
        Self { i, j }
    }
}

/// Parses tile file names into grid positions and back.
pub trait TileNaming: Debug {
    /// Position encoded in `file_name`, or `None` if it does not name a
    /// tile.
    fn parse(&self, file_name: &str) -> Option<TileIndex>;

    /// File name of the tile at `index`.
    fn file_name(&self, index: TileIndex) -> String;
}

pub const DEFAULT_PATTERN: &str = r"^tile-([0-9]+)-([0-9]+)\.tif$";
pub const DEFAULT_TEMPLATE: &str = "tile-{i}-{j}.tif";

fn default_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(DEFAULT_PATTERN).expect("default tile pattern is valid"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Groups {
    Positional,
    Named,
}

/// Regex-backed [`TileNaming`].
///
/// The pattern captures `i` and `j` either as named groups `i` and `j` or
/// as its first two groups. The template renders names with `{i}` and
/// `{j}` placeholders.
#[derive(Debug, Clone)]
pub struct PatternNaming {
    pattern: Regex,
    groups: Groups,
    template: String,
}

impl PatternNaming {
    pub fn new(pattern: &str, template: &str) -> Result<Self> {
        Self::from_regex(Regex::new(pattern)?, template)
    }

    fn from_regex(pattern: Regex, template: &str) -> Result<Self> {
        let names: Vec<&str> = pattern.capture_names().flatten().collect();
        let groups = if names.contains(&"i") && names.contains(&"j") {
            Groups::Named
        } else if pattern.captures_len() >= 3 {
            Groups::Positional
        } else {
            return Err(TifgridError::InvalidPattern(format!(
                "{} needs two capture groups or groups named i and j",
                pattern.as_str()
            )));
        };
        if !template.contains("{i}") || !template.contains("{j}") {
            return Err(TifgridError::InvalidPattern(format!(
                "template {template:?} must contain {{i}} and {{j}}"
            )));
        }
        Ok(Self {
            pattern,
            groups,
            template: template.to_string(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl Default for PatternNaming {
    fn default() -> Self {
        Self {
            pattern: default_pattern().clone(),
            groups: Groups::Positional,
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl TileNaming for PatternNaming {
    fn parse(&self, file_name: &str) -> Option<TileIndex> {
        let captures = self.pattern.captures(file_name)?;
        let (i, j) = match self.groups {
            Groups::Named => (captures.name("i")?, captures.name("j")?),
            Groups::Positional => (captures.get(1)?, captures.get(2)?),
        };
        Some(TileIndex::new(
            i.as_str().parse().ok()?,
            j.as_str().parse().ok()?,
        ))
    }

    fn file_name(&self, index: TileIndex) -> String {
        self.template
            .replace("{i}", &index.i.to_string())
            .replace("{j}", &index.j.to_string())
    }
}
