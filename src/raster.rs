use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tiff::decoder::{Decoder, Limits};

use crate::affine::GeoTransform;
use crate::buffer::RasterBuffer;
use crate::compression::WriteOptions;
use crate::encoder::{encode, GeoTiffTags};
use crate::enums::PixelType;
use crate::error::{Result, TifgridError};
use crate::geo_key_directory::GeoKeyDirectory;
use crate::geometry::{partition, Chunk, Rectangle, Size};
use crate::ifd::ImageHeader;
use crate::partial_reads;

/// Metadata describing a raster independently of its pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterAttributes {
    pub geotransform: GeoTransform,
    pub size: Size,
    pub bands: usize,
    pub pixel_type: PixelType,
    pub nodata: Option<f64>,
    /// Coordinate system description, empty when unknown.
    pub projection: String,
}

impl RasterAttributes {
    /// Attributes matching the layout of `buffer`, with an identity
    /// geotransform and no projection or no-data.
    pub fn for_buffer(buffer: &RasterBuffer) -> Self {
        Self {
            geotransform: GeoTransform::default(),
            size: buffer.size(),
            bands: buffer.bands(),
            pixel_type: buffer.pixel_type(),
            nodata: None,
            projection: String::new(),
        }
    }

    pub fn with_geotransform(mut self, geotransform: GeoTransform) -> Self {
        self.geotransform = geotransform;
        self
    }

    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn with_projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = projection.into();
        self
    }

    fn from_header(header: &ImageHeader) -> Self {
        Self {
            geotransform: header.geotransform,
            size: header.size,
            bands: header.bands,
            pixel_type: header.pixel_type,
            nodata: header.nodata,
            projection: header.projection(),
        }
    }
}

/// An open GeoTIFF whose header has been parsed.
///
/// Pixels are decoded on demand, one internal strip or tile at a time.
pub struct RasterReader {
    path: PathBuf,
    decoder: Decoder<BufReader<File>>,
    header: ImageHeader,
}

impl RasterReader {
    pub fn try_open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|err| TifgridError::io(&path, err))?;
        let mut decoder = Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited());
        let header = ImageHeader::read(&mut decoder)?;
        log::trace!(
            "opened {path:?}: {:?} x {} {}",
            header.size,
            header.bands,
            header.pixel_type
        );
        Ok(Self {
            path,
            decoder,
            header,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn attributes(&self) -> RasterAttributes {
        RasterAttributes::from_header(&self.header)
    }

    pub fn size(&self) -> Size {
        self.header.size
    }

    /// Parsed GeoKey directory, when the file carries one.
    pub fn geo_keys(&self) -> Option<&GeoKeyDirectory> {
        self.header.geo_keys.as_ref()
    }

    /// Decode `region`, or the whole raster for `None`.
    pub fn read_window(&mut self, region: Option<&Rectangle>) -> Result<RasterBuffer> {
        let extent = Rectangle::from_size(self.header.size)?;
        let region = match region {
            Some(region) if !extent.contains(region) => {
                return Err(TifgridError::RegionOutOfBounds {
                    region: *region,
                    extent: self.header.size,
                })
            }
            Some(region) => *region,
            None => extent,
        };
        partial_reads::read_window(&mut self.decoder, &self.header, &region)
    }
}

/// Attributes of the raster at `path`, or `None` if it cannot be opened
/// as one.
pub fn open_attributes(path: impl AsRef<Path>) -> Option<RasterAttributes> {
    let path = path.as_ref();
    match try_open_attributes(path) {
        Ok(attributes) => Some(attributes),
        Err(err) => {
            log::debug!("cannot open {path:?} as a raster: {err}");
            None
        }
    }
}

pub fn try_open_attributes(path: impl AsRef<Path>) -> Result<RasterAttributes> {
    Ok(RasterReader::try_open(path)?.attributes())
}

pub fn raster_size(path: impl AsRef<Path>) -> Option<Size> {
    open_attributes(path).map(|attributes| attributes.size)
}

pub fn raster_geotransform(path: impl AsRef<Path>) -> Option<GeoTransform> {
    open_attributes(path).map(|attributes| attributes.geotransform)
}

/// No-data value of the raster at `path`. `None` both when the raster
/// declares none and when it cannot be opened.
pub fn raster_nodata(path: impl AsRef<Path>) -> Option<f64> {
    open_attributes(path).and_then(|attributes| attributes.nodata)
}

/// Read `region` of the raster at `path`; `None` reads everything.
pub fn read_window(path: impl AsRef<Path>, region: Option<&Rectangle>) -> Result<RasterBuffer> {
    RasterReader::try_open(path)?.read_window(region)
}

/// Write `buffer` as a new uncompressed GeoTIFF, replacing any file at
/// `path`.
pub fn write_raster(
    buffer: &RasterBuffer,
    path: impl AsRef<Path>,
    attributes: Option<&RasterAttributes>,
) -> Result<()> {
    write_raster_with(buffer, path, attributes, &WriteOptions::default())
}

pub fn write_raster_with(
    buffer: &RasterBuffer,
    path: impl AsRef<Path>,
    attributes: Option<&RasterAttributes>,
    options: &WriteOptions,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(attributes) = attributes {
        if attributes.size != buffer.size() || attributes.bands != buffer.bands() {
            log::debug!(
                "writing {path:?} with the buffer layout {:?} x {} instead of {:?} x {}",
                buffer.size(),
                buffer.bands(),
                attributes.size,
                attributes.bands
            );
        }
    }

    let file = File::create(path).map_err(|err| TifgridError::io(path, err))?;
    let tags = attributes.map(GeoTiffTags::new);
    let mut writer = BufWriter::new(file);
    let result = encode(&mut writer, buffer, tags.as_ref(), options.compression)
        .and_then(|()| writer.flush().map_err(|err| TifgridError::io(path, err)));
    drop(writer);
    if result.is_err() {
        // Do not leave a truncated TIFF behind.
        let _ = fs::remove_file(path);
    }
    result
}

/// Partition the raster at `path` into `grid` chunks and hand each one to
/// `callback`, in `[i, j]` order with `j` varying fastest.
///
/// The file is opened once. The first callback error stops the iteration
/// and is returned as is.
pub fn for_each_chunk<P, F, E>(
    path: P,
    grid: (usize, usize),
    overlap: usize,
    mut callback: F,
) -> std::result::Result<(), E>
where
    P: AsRef<Path>,
    F: FnMut(RasterBuffer, &Chunk, &RasterAttributes) -> std::result::Result<(), E>,
    E: From<TifgridError>,
{
    let mut reader = RasterReader::try_open(path)?;
    let attributes = reader.attributes();
    let extent = Rectangle::from_size(attributes.size)?;
    for chunk in partition(&extent, grid, overlap)?.iter() {
        let buffer = reader.read_window(Some(&chunk.rect()))?;
        callback(buffer, chunk, &attributes)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::{s, Array2, Array3};
    use tempfile::TempDir;

    use super::*;
    use crate::compression::Compression;
    use crate::geometry::Point;

    fn gradient_u8(rows: usize, cols: usize, bands: usize) -> Array3<u8> {
        Array3::from_shape_fn((rows, cols, bands), |(r, c, b)| ((r * 7 + c * 3 + b * 50) % 256) as u8)
    }

    #[test]
    fn u8_round_trip_single_and_multi_band() {
        let dir = TempDir::new().unwrap();
        for bands in [1, 3, 4] {
            let path = dir.path().join(format!("u8-{bands}.tif"));
            let buffer = RasterBuffer::from(gradient_u8(37, 53, bands));
            write_raster(&buffer, &path, None).unwrap();
            assert_eq!(read_window(&path, None).unwrap(), buffer);
        }
    }

    #[test]
    fn f32_round_trip_with_compression() {
        let dir = TempDir::new().unwrap();
        let data = Array2::from_shape_fn((20, 31), |(r, c)| r as f32 * 0.5 - c as f32 * 1.25);
        let buffer = RasterBuffer::from(data);
        for compression in [Compression::None, Compression::Lzw, Compression::Deflate] {
            let path = dir.path().join(format!("f32-{}.tif", u16::from(compression)));
            let options = WriteOptions::default().with_compression(compression);
            write_raster_with(&buffer, &path, None, &options).unwrap();
            assert_eq!(read_window(&path, None).unwrap(), buffer);
        }

        let rgb = RasterBuffer::from(Array3::from_shape_fn((9, 4, 3), |(r, c, b)| {
            (r * 100 + c * 10 + b) as f32
        }));
        let path = dir.path().join("f32-rgb.tif");
        write_raster(&rgb, &path, None).unwrap();
        assert_eq!(read_window(&path, None).unwrap(), rgb);
    }

    #[test]
    fn attributes_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("georef.tif");
        let buffer = RasterBuffer::from(Array2::<i16>::from_elem((12, 16), -3));
        let attributes = RasterAttributes::for_buffer(&buffer)
            .with_geotransform(GeoTransform::north_up(440_720.0, 3_751_320.0, 60.0, -60.0))
            .with_nodata(Some(-9999.0))
            .with_projection("WGS 84 / UTM zone 11N");
        write_raster(&buffer, &path, Some(&attributes)).unwrap();

        let read = try_open_attributes(&path).unwrap();
        assert_eq!(read.size, Size::new(16, 12));
        assert_eq!(read.bands, 1);
        assert_eq!(read.pixel_type, PixelType::I16);
        assert_eq!(read.nodata, Some(-9999.0));
        assert_eq!(read.projection, "WGS 84 / UTM zone 11N");
        for (a, b) in read.geotransform.to_gdal().iter().zip(attributes.geotransform.to_gdal()) {
            assert_relative_eq!(*a, b);
        }
        assert_eq!(raster_nodata(&path), Some(-9999.0));
        let reader = RasterReader::try_open(&path).unwrap();
        assert_eq!(
            reader.geo_keys().and_then(GeoKeyDirectory::citation),
            Some("WGS 84 / UTM zone 11N")
        );
        assert_eq!(raster_size(&path), Some(Size::new(16, 12)));
    }

    #[test]
    fn rotated_geotransform_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rotated.tif");
        let buffer = RasterBuffer::from(Array2::<u16>::zeros((4, 4)));
        let geotransform = GeoTransform::new(100.0, 2.0, 0.5, 200.0, 0.25, -2.0);
        let attributes = RasterAttributes::for_buffer(&buffer).with_geotransform(geotransform);
        write_raster(&buffer, &path, Some(&attributes)).unwrap();

        let read = raster_geotransform(&path).unwrap();
        for (a, b) in read.to_gdal().iter().zip(geotransform.to_gdal()) {
            assert_relative_eq!(*a, b);
        }
    }

    #[test]
    fn missing_georeferencing_defaults_to_identity() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.tif");
        write_raster(&RasterBuffer::from(gradient_u8(3, 3, 1)), &path, None).unwrap();
        let attributes = open_attributes(&path).unwrap();
        assert_eq!(attributes.geotransform, GeoTransform::default());
        assert_eq!(attributes.nodata, None);
        assert!(attributes.projection.is_empty());
    }

    #[test]
    fn windowed_reads_match_the_full_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("window.tif");
        let source = gradient_u8(64, 48, 3);
        write_raster(&RasterBuffer::from(source.clone()), &path, None).unwrap();

        let region = Rectangle::new(Point::new(5, 17), Point::new(41, 60)).unwrap();
        let window = read_window(&path, Some(&region)).unwrap();
        let expected = source.slice(s![17..60, 5..41, ..]).to_owned();
        assert_eq!(window.into_array::<u8>().unwrap(), expected);

        let outside = Rectangle::new(Point::new(40, 0), Point::new(49, 10)).unwrap();
        assert!(matches!(
            read_window(&path, Some(&outside)),
            Err(TifgridError::RegionOutOfBounds { .. })
        ));
    }

    #[test]
    fn unreadable_paths_soft_fail() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.tif");
        assert!(open_attributes(&missing).is_none());
        assert!(raster_size(&missing).is_none());
        assert!(matches!(
            try_open_attributes(&missing),
            Err(TifgridError::Io { .. })
        ));

        let garbage = dir.path().join("garbage.tif");
        std::fs::write(&garbage, b"not a tiff at all").unwrap();
        assert!(open_attributes(&garbage).is_none());
        assert!(read_window(&garbage, None).is_err());
    }

    #[test]
    fn unsupported_layouts_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("two-band.tif");
        let buffer = RasterBuffer::from(Array3::<u8>::zeros((2, 2, 2)));
        assert!(matches!(
            write_raster(&buffer, &path, None),
            Err(TifgridError::UnsupportedBandCount { bands: 2, .. })
        ));
        assert!(!path.exists());

        let signed_rgb = RasterBuffer::from(Array3::<i16>::zeros((2, 2, 3)));
        assert!(write_raster(&signed_rgb, &path, None).is_err());
    }

    #[test]
    fn chunks_are_visited_in_grid_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chunks.tif");
        let source = gradient_u8(10, 10, 1);
        write_raster(&RasterBuffer::from(source.clone()), &path, None).unwrap();

        let mut visited = Vec::new();
        for_each_chunk(&path, (3, 2), 0, |buffer, chunk, attributes| {
            assert_eq!(attributes.size, Size::new(10, 10));
            let rect = chunk.rect();
            let (x0, y0) = (rect.left_top().x, rect.left_top().y);
            let (x1, y1) = (rect.right_bottom().x, rect.right_bottom().y);
            let expected = source.slice(s![y0..y1, x0..x1, ..]).to_owned();
            assert_eq!(buffer.into_array::<u8>().unwrap(), expected);
            visited.push(chunk.grid_index);
            Ok::<_, TifgridError>(())
        })
        .unwrap();
        assert_eq!(visited, vec![(0, 0), (0, 1), (1, 0), (1, 1), (2, 0), (2, 1)]);
    }

    #[test]
    fn callback_errors_stop_the_iteration() {
        #[derive(Debug)]
        enum Failure {
            Raster(TifgridError),
            Stop(usize),
        }
        impl From<TifgridError> for Failure {
            fn from(err: TifgridError) -> Self {
                Failure::Raster(err)
            }
        }

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stop.tif");
        write_raster(&RasterBuffer::from(gradient_u8(8, 8, 1)), &path, None).unwrap();

        let mut calls = 0;
        let result = for_each_chunk(&path, (2, 2), 2, |_, _, _| {
            calls += 1;
            if calls == 2 {
                Err(Failure::Stop(calls))
            } else {
                Ok(())
            }
        });
        assert!(matches!(result, Err(Failure::Stop(2))));
        assert_eq!(calls, 2);

        let result = for_each_chunk(&path, (9, 1), 0, |_, _, _| Ok::<_, Failure>(()));
        assert!(matches!(
            result,
            Err(Failure::Raster(TifgridError::CannotPartition { .. }))
        ));
    }
}
