//! Read, write and chunk GeoTIFF rasters, either as single files or as
//! directories of tiles that together form one large raster.

mod affine;
mod buffer;
mod compression;
mod decoder;
mod encoder;
mod enums;
pub mod error;
mod geo_key_directory;
mod geometry;
mod ifd;
mod mask;
pub mod naming;
mod partial_reads;
mod raster;
mod tiled;

pub use affine::GeoTransform;
pub use buffer::{RasterBuffer, Sample};
pub use compression::{Compression, WriteOptions};
pub use enums::PixelType;
pub use error::{Result, TifgridError};
pub use geo_key_directory::{GeoKeyDirectory, GeoKeyTag, GeoKeyValue};
pub use geometry::{intersect, partition, Chunk, Point, Rectangle, Size};
pub use mask::cut_raster;
pub use naming::{PatternNaming, TileIndex, TileNaming};
pub use raster::{
    for_each_chunk, open_attributes, raster_geotransform, raster_nodata, raster_size,
    read_window, try_open_attributes, write_raster, write_raster_with, RasterAttributes,
    RasterReader,
};
pub use tiled::TiledRaster;
