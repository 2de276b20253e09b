use std::fmt::Debug;
use std::path::PathBuf;

use thiserror::Error;

use crate::enums::PixelType;
use crate::geometry::{Rectangle, Size};

/// Enum with all errors in this crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TifgridError {
    /// Filesystem error, tagged with the path that caused it.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error raised by the TIFF codec.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Decoded data does not fit the expected array shape.
    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// The tile name pattern is not a valid regular expression.
    #[error("invalid tile name pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid tile name pattern: {0}")]
    InvalidPattern(String),

    #[error("degenerate rectangle {left_top:?}..{right_bottom:?}")]
    InvalidRectangle {
        left_top: (usize, usize),
        right_bottom: (usize, usize),
    },

    /// The partitioner rejected its arguments.
    #[error("cannot partition {size:?} into {grid:?} chunks with overlap {overlap}")]
    CannotPartition {
        size: Size,
        grid: (usize, usize),
        overlap: usize,
    },

    #[error("region {region:?} lies outside the raster extent {extent:?}")]
    RegionOutOfBounds { region: Rectangle, extent: Size },

    #[error("unsupported pixel type: {0}")]
    UnsupportedPixelType(String),

    #[error("unsupported band count {bands} for pixel type {pixel_type}")]
    UnsupportedBandCount { pixel_type: PixelType, bands: usize },

    #[error("pixel type mismatch: expected {expected}, found {found}")]
    PixelTypeMismatch {
        expected: PixelType,
        found: PixelType,
    },

    #[error("band count mismatch: expected {expected}, found {found}")]
    BandCountMismatch { expected: usize, found: usize },

    #[error("no-data value {value} is not representable as {pixel_type}")]
    NodataNotRepresentable { value: f64, pixel_type: PixelType },

    #[error("{0:?} is not a directory")]
    NotADirectory(PathBuf),

    /// Tile discovery matched no file.
    #[error("directory {0:?} does not contain any tiles")]
    NoTiles(PathBuf),

    /// None of the tiles that would define a composite extent is readable.
    #[error("cannot determine composite size: {0}")]
    MissingBorderTile(String),

    #[error("invalid tile size {0:?}")]
    InvalidTileSize(Size),

    /// Malformed GeoTIFF georeferencing tags.
    #[error("invalid GeoTIFF metadata: {0}")]
    GeoKey(String),
}

impl TifgridError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, TifgridError>;
