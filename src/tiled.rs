//! A raster stored as a directory of GeoTIFF tiles.
//!
//! Tiles are addressed by their file names (see [`crate::naming`]). Every
//! tile outside the last column and the last row has the same size, the
//! control size; border tiles may be smaller. Any tile may be missing, its
//! footprint then reads back as no-data.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::affine::GeoTransform;
use crate::buffer::RasterBuffer;
use crate::compression::WriteOptions;
use crate::error::{Result, TifgridError};
use crate::geometry::{intersect, partition, Chunk, Point, Rectangle, Size};
use crate::naming::{PatternNaming, TileIndex, TileNaming};
use crate::raster::{try_open_attributes, write_raster_with, RasterAttributes, RasterReader};

/// Tiles found in the directory.
#[derive(Debug)]
struct TileGrid {
    tiles: BTreeMap<TileIndex, PathBuf>,
    /// `(max i + 1, max j + 1)`
    dimensions: (usize, usize),
}

impl TileGrid {
    fn get(&self, index: TileIndex) -> Option<&Path> {
        self.tiles.get(&index).map(PathBuf::as_path)
    }

    /// Lowest `(i, j)` present.
    fn first(&self) -> Option<(&Path, TileIndex)> {
        self.tiles
            .iter()
            .next()
            .map(|(index, path)| (path.as_path(), *index))
    }

    /// Last present tile, in `(i, j)` order, outside the last column and
    /// row.
    fn control_tile(&self) -> Option<(&Path, TileIndex)> {
        let (nx, ny) = self.dimensions;
        self.tiles
            .iter()
            .filter(|(index, _)| index.i + 2 <= nx && index.j + 2 <= ny)
            .last()
            .map(|(index, path)| (path.as_path(), *index))
    }
}

/// Metadata computed from tile headers, cached per instance.
#[derive(Debug, Default)]
struct MetadataCache {
    grid: OnceCell<Rc<TileGrid>>,
    control_size: OnceCell<Size>,
    size: OnceCell<Size>,
    first_attributes: OnceCell<RasterAttributes>,
}

/// Read and write access to a tiled raster.
///
/// Grid discovery and tile headers are read lazily on first use. With
/// [`cache_metadata`](Self::cache_metadata) enabled (the default) they are
/// kept for the lifetime of the instance, so changes to the directory made
/// by others go unnoticed.
#[derive(Debug)]
pub struct TiledRaster {
    directory: PathBuf,
    naming: Box<dyn TileNaming>,
    cache_metadata: bool,
    write_options: WriteOptions,
    cache: MetadataCache,
}

impl TiledRaster {
    /// Use the existing directory `directory`.
    pub fn open(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            return Err(TifgridError::NotADirectory(directory.to_path_buf()));
        }
        Ok(Self {
            directory: directory.to_path_buf(),
            naming: Box::new(PatternNaming::default()),
            cache_metadata: true,
            write_options: WriteOptions::default(),
            cache: MetadataCache::default(),
        })
    }

    /// Like [`open`](Self::open), creating `directory` first if needed.
    pub fn create(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref();
        fs::create_dir_all(directory).map_err(|err| TifgridError::io(directory, err))?;
        Self::open(directory)
    }

    pub fn with_naming(mut self, naming: impl TileNaming + 'static) -> Self {
        self.naming = Box::new(naming);
        self.cache = MetadataCache::default();
        self
    }

    pub fn cache_metadata(mut self, enabled: bool) -> Self {
        self.cache_metadata = enabled;
        self.cache = MetadataCache::default();
        self
    }

    pub fn with_write_options(mut self, options: WriteOptions) -> Self {
        self.write_options = options;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn cached<T: Clone>(&self, cell: &OnceCell<T>, compute: impl FnOnce() -> Result<T>) -> Result<T> {
        if !self.cache_metadata {
            return compute();
        }
        if let Some(value) = cell.get() {
            return Ok(value.clone());
        }
        let value = compute()?;
        let _ = cell.set(value.clone());
        Ok(value)
    }

    fn grid(&self) -> Result<Rc<TileGrid>> {
        self.cached(&self.cache.grid, || self.discover().map(Rc::new))
    }

    fn discover(&self) -> Result<TileGrid> {
        let tiles = self.scan_tiles()?;
        let (Some(max_i), Some(max_j)) = (
            tiles.keys().map(|index| index.i).max(),
            tiles.keys().map(|index| index.j).max(),
        ) else {
            return Err(TifgridError::NoTiles(self.directory.clone()));
        };
        let dimensions = (max_i + 1, max_j + 1);
        log::debug!(
            "discovered {} tiles in {:?}, grid {}x{}",
            tiles.len(),
            self.directory,
            dimensions.0,
            dimensions.1
        );
        Ok(TileGrid { tiles, dimensions })
    }

    /// Regular files in the directory whose names parse as tiles.
    fn scan_tiles(&self) -> Result<BTreeMap<TileIndex, PathBuf>> {
        let entries =
            fs::read_dir(&self.directory).map_err(|err| TifgridError::io(&self.directory, err))?;

        let mut tiles = BTreeMap::new();
        for entry in entries {
            let path = entry
                .map_err(|err| TifgridError::io(&self.directory, err))?
                .path();
            if !path.is_file() {
                continue;
            }
            let Some(index) = path
                .file_name()
                .and_then(OsStr::to_str)
                .and_then(|name| self.naming.parse(name))
            else {
                continue;
            };
            tiles.insert(index, path);
        }
        Ok(tiles)
    }

    /// `(columns, rows)` of the tile grid.
    pub fn grid_dimensions(&self) -> Result<(usize, usize)> {
        Ok(self.grid()?.dimensions)
    }

    /// The tile that defines the control size, if any tile outside the last
    /// column and row exists.
    pub fn control_tile(&self) -> Result<Option<(PathBuf, TileIndex)>> {
        Ok(self
            .grid()?
            .control_tile()
            .map(|(path, index)| (path.to_path_buf(), index)))
    }

    /// Size shared by all tiles outside the last column and row.
    ///
    /// Without a control tile the width is taken from tile `(0, ny - 1)` and
    /// the height from tile `(nx - 1, 0)`.
    pub fn control_size(&self) -> Result<Size> {
        self.cached(&self.cache.control_size, || {
            let grid = self.grid()?;
            if let Some((path, _)) = grid.control_tile() {
                return Ok(try_open_attributes(path)?.size);
            }
            let (nx, ny) = grid.dimensions;
            let width = corner_size(&grid, TileIndex::new(0, ny - 1))?.width;
            let height = corner_size(&grid, TileIndex::new(nx - 1, 0))?.height;
            Ok(Size::new(width, height))
        })
    }

    /// Pixel size of the whole composite raster.
    pub fn composite_size(&self) -> Result<Size> {
        self.cached(&self.cache.size, || {
            let grid = self.grid()?;
            let (nx, ny) = grid.dimensions;
            let control = self.control_size()?;
            let last_column = border_size(&grid, (0..ny).map(|j| TileIndex::new(nx - 1, j)))
                .ok_or_else(|| {
                    TifgridError::MissingBorderTile(format!("no readable tile in column {}", nx - 1))
                })?;
            let last_row = border_size(&grid, (0..nx).map(|i| TileIndex::new(i, ny - 1)))
                .ok_or_else(|| {
                    TifgridError::MissingBorderTile(format!("no readable tile in row {}", ny - 1))
                })?;
            Ok(Size::new(
                control.width * (nx - 1) + last_column.width,
                control.height * (ny - 1) + last_row.height,
            ))
        })
    }

    /// Geotransform of the composite raster, derived from the control tile
    /// (or the first tile when there is none).
    pub fn composite_geotransform(&self) -> Result<GeoTransform> {
        let grid = self.grid()?;
        let control = self.control_size()?;
        let (path, index) = grid
            .control_tile()
            .or_else(|| grid.first())
            .ok_or_else(|| TifgridError::NoTiles(self.directory.clone()))?;
        let geotransform = try_open_attributes(path)?.geotransform;
        Ok(geotransform.shifted(
            -((control.width * index.i) as f64),
            -((control.height * index.j) as f64),
        ))
    }

    fn first_attributes(&self) -> Result<RasterAttributes> {
        self.cached(&self.cache.first_attributes, || {
            let grid = self.grid()?;
            let (path, _) = grid
                .first()
                .ok_or_else(|| TifgridError::NoTiles(self.directory.clone()))?;
            try_open_attributes(path)
        })
    }

    pub fn composite_nodata(&self) -> Result<Option<f64>> {
        Ok(self.first_attributes()?.nodata)
    }

    /// Attributes of the first tile with the composite geotransform and
    /// size.
    pub fn composite_attributes(&self) -> Result<RasterAttributes> {
        Ok(RasterAttributes {
            geotransform: self.composite_geotransform()?,
            size: self.composite_size()?,
            ..self.first_attributes()?
        })
    }

    /// Read `region` of the composite raster, or all of it for `None`.
    ///
    /// Pixels not covered by any tile hold the composite no-data value, or
    /// zero when the tiles declare none.
    pub fn read_window(&self, region: Option<&Rectangle>) -> Result<RasterBuffer> {
        let attributes = self.composite_attributes()?;
        self.read_composite(&attributes, region)
    }

    fn read_composite(
        &self,
        attributes: &RasterAttributes,
        region: Option<&Rectangle>,
    ) -> Result<RasterBuffer> {
        let extent = Rectangle::from_size(attributes.size)?;
        let region = match region {
            Some(region) if !extent.contains(region) => {
                return Err(TifgridError::RegionOutOfBounds {
                    region: *region,
                    extent: attributes.size,
                })
            }
            Some(region) => *region,
            None => extent,
        };

        let control = self.control_size()?;
        if control.is_empty() {
            return Err(TifgridError::InvalidTileSize(control));
        }
        let grid = self.grid()?;
        let (nx, ny) = grid.dimensions;
        let (left_top, right_bottom) = (region.left_top(), region.right_bottom());
        let columns = (left_top.x / control.width).min(nx - 1)
            ..=((right_bottom.x - 1) / control.width).min(nx - 1);
        let rows = (left_top.y / control.height).min(ny - 1)
            ..=((right_bottom.y - 1) / control.height).min(ny - 1);

        let mut output = RasterBuffer::filled(
            attributes.pixel_type,
            region.size(),
            attributes.bands,
            attributes.nodata,
        )?;
        for i in columns {
            for j in rows.clone() {
                let Some(path) = grid.get(TileIndex::new(i, j)) else {
                    continue;
                };
                let mut tile = RasterReader::try_open(path)?;
                let origin = Point::new(i * control.width, j * control.height);
                let footprint = Rectangle::from_origin_size(origin, tile.size())?;
                let Some(overlap) = intersect(&footprint, &region) else {
                    continue;
                };

                log::trace!("reading {overlap:?} from tile ({i}, {j})");
                let part = tile.read_window(Some(&overlap.relative_to(origin)))?;
                output.paste(&part, overlap.relative_to(left_top).left_top())?;
            }
        }
        Ok(output)
    }

    /// Partition the composite raster into `grid` chunks and hand each one
    /// to `callback` together with the composite attributes, in `[i, j]`
    /// order with `j` varying fastest.
    pub fn for_each_chunk<F, E>(
        &self,
        grid: (usize, usize),
        overlap: usize,
        mut callback: F,
    ) -> std::result::Result<(), E>
    where
        F: FnMut(RasterBuffer, &Chunk, &RasterAttributes) -> std::result::Result<(), E>,
        E: From<TifgridError>,
    {
        let attributes = self.composite_attributes()?;
        let extent = Rectangle::from_size(attributes.size)?;
        for chunk in partition(&extent, grid, overlap)?.iter() {
            let buffer = self.read_composite(&attributes, Some(&chunk.rect()))?;
            callback(buffer, chunk, &attributes)?;
        }
        Ok(())
    }

    /// Cut `buffer` into tiles of `tile_size` pixels and write them to the
    /// directory.
    ///
    /// Tiles in the last column and row keep their remainder size. With
    /// `attributes`, every tile gets its own geotransform, shifted to the
    /// tile origin, plus the projection and no-data value. Tiles of an
    /// earlier, larger grid that fall outside the new one are removed once
    /// all new tiles are written.
    ///
    /// A failure stops the write with the tiles written so far left in
    /// place; the directory then holds a mix of old and new tiles and
    /// should be written again.
    pub fn write(
        &mut self,
        buffer: &RasterBuffer,
        tile_size: Size,
        attributes: Option<&RasterAttributes>,
    ) -> Result<()> {
        if tile_size.is_empty() {
            return Err(TifgridError::InvalidTileSize(tile_size));
        }
        fs::create_dir_all(&self.directory)
            .map_err(|err| TifgridError::io(&self.directory, err))?;
        // the directory content is about to change
        self.cache = MetadataCache::default();

        let size = buffer.size();
        let columns = size.width.div_ceil(tile_size.width);
        let rows = size.height.div_ceil(tile_size.height);
        log::debug!(
            "writing {columns}x{rows} tiles of {tile_size:?} to {:?}",
            self.directory
        );

        for i in 0..columns {
            for j in 0..rows {
                let origin = Point::new(i * tile_size.width, j * tile_size.height);
                let footprint = Rectangle::new(
                    origin,
                    Point::new(
                        (origin.x + tile_size.width).min(size.width),
                        (origin.y + tile_size.height).min(size.height),
                    ),
                )?;
                let tile = buffer.window(&footprint)?;
                let tile_attributes = attributes.map(|attributes| RasterAttributes {
                    geotransform: attributes
                        .geotransform
                        .shifted(origin.x as f64, origin.y as f64),
                    size: tile.size(),
                    bands: tile.bands(),
                    pixel_type: tile.pixel_type(),
                    ..attributes.clone()
                });
                let path = self
                    .directory
                    .join(self.naming.file_name(TileIndex::new(i, j)));
                log::trace!("writing tile ({i}, {j}) {footprint:?} to {path:?}");
                write_raster_with(&tile, &path, tile_attributes.as_ref(), &self.write_options)?;
            }
        }

        for (index, path) in self.scan_tiles()? {
            if index.i < columns && index.j < rows {
                continue;
            }
            log::debug!("removing stale tile ({}, {}) at {path:?}", index.i, index.j);
            fs::remove_file(&path).map_err(|err| TifgridError::io(&path, err))?;
        }
        Ok(())
    }
}

fn corner_size(grid: &TileGrid, index: TileIndex) -> Result<Size> {
    let path = grid
        .get(index)
        .ok_or_else(|| TifgridError::MissingBorderTile(format!("tile {index:?} is absent")))?;
    Ok(try_open_attributes(path)?.size)
}

/// Size of the first readable tile among `candidates`.
fn border_size(grid: &TileGrid, candidates: impl Iterator<Item = TileIndex>) -> Option<Size> {
    candidates
        .filter_map(|index| grid.get(index).map(|path| (index, path)))
        .find_map(|(index, path)| match try_open_attributes(path) {
            Ok(attributes) => Some(attributes.size),
            Err(err) => {
                log::warn!("skipping unreadable border tile {index:?} at {path:?}: {err}");
                None
            }
        })
}
