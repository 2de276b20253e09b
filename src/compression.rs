use num_enum::IntoPrimitive;

/// Compression applied to written rasters, valued by TIFF tag code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoPrimitive)]
#[repr(u16)]
pub enum Compression {
    #[default]
    None = 1,
    Lzw = 5,
    Deflate = 8,
    Packbits = 32773,
}

/// Options for [`write_raster_with`](crate::raster::write_raster_with) and
/// tiled writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub compression: Compression,
}

impl WriteOptions {
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }
}
