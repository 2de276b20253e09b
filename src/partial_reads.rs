use std::io::{Read, Seek};

use tiff::decoder::Decoder;

use crate::buffer::RasterBuffer;
use crate::decoder::decode_block;
use crate::error::Result;
use crate::geometry::{intersect, Point, Rectangle, Size};
use crate::ifd::ImageHeader;

/// Internal blocks (strips or tiles) of an image touched by a partial read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BlockWindow {
    /// width and height of each block (# of pixels)
    block_width: usize,
    block_height: usize,
    /// number of blocks in one row of the block grid
    blocks_across: usize,
    /// range of internal x/y blocks which intersect the partial read, inclusive
    xmin: usize,
    ymin: usize,
    xmax: usize,
    ymax: usize,
}

impl BlockWindow {
    pub(crate) fn new(image: Size, block: Size, window: &Rectangle) -> Self {
        let block_width = block.width.max(1);
        let block_height = block.height.max(1);
        Self {
            block_width,
            block_height,
            blocks_across: image.width.div_ceil(block_width),
            xmin: window.left_top().x / block_width,
            ymin: window.left_top().y / block_height,
            xmax: (window.right_bottom().x - 1) / block_width,
            ymax: (window.right_bottom().y - 1) / block_height,
        }
    }

    /// Linear block index and pixel origin of every touched block, row by
    /// row.
    pub(crate) fn blocks(&self) -> impl Iterator<Item = (u32, Point)> + '_ {
        (self.ymin..=self.ymax).flat_map(move |by| {
            (self.xmin..=self.xmax).map(move |bx| {
                let index = (by * self.blocks_across + bx) as u32;
                (index, Point::new(bx * self.block_width, by * self.block_height))
            })
        })
    }
}

/// Decode the pixels of `window`, which must lie inside the image.
pub(crate) fn read_window<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    header: &ImageHeader,
    window: &Rectangle,
) -> Result<RasterBuffer> {
    let (block_width, block_height) = decoder.chunk_dimensions();
    let blocks = BlockWindow::new(
        header.size,
        Size::new(block_width as usize, block_height as usize),
        window,
    );

    let mut output = RasterBuffer::filled(header.pixel_type, window.size(), header.bands, None)?;
    for (index, origin) in blocks.blocks() {
        let (data_width, data_height) = decoder.chunk_data_dimensions(index);
        let data_size = Size::new(data_width as usize, data_height as usize);
        let Some(overlap) = Rectangle::from_origin_size(origin, data_size)
            .ok()
            .and_then(|block| intersect(&block, window))
        else {
            continue;
        };

        log::trace!("decoding block {index} at {origin:?} for {overlap:?}");
        let block = decode_block(
            decoder.read_chunk(index)?,
            data_size,
            header.bands,
            header.pixel_type,
        )?;
        let part = block.window(&overlap.relative_to(origin))?;
        output.paste(&part, overlap.relative_to(window.left_top()).left_top())?;
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_tiles_touching_the_window() {
        let window = Rectangle::new(Point::new(250, 10), Point::new(520, 300)).unwrap();
        let blocks = BlockWindow::new(Size::new(1000, 600), Size::new(256, 256), &window);
        let touched: Vec<_> = blocks.blocks().collect();
        assert_eq!(
            touched,
            vec![
                (0, Point::new(0, 0)),
                (1, Point::new(256, 0)),
                (2, Point::new(512, 0)),
                (4, Point::new(0, 256)),
                (5, Point::new(256, 256)),
                (6, Point::new(512, 256)),
            ]
        );
    }

    #[test]
    fn strips_span_the_full_width() {
        let window = Rectangle::new(Point::new(30, 17), Point::new(40, 33)).unwrap();
        let blocks = BlockWindow::new(Size::new(64, 64), Size::new(64, 8), &window);
        let indices: Vec<u32> = blocks.blocks().map(|(index, _)| index).collect();
        assert_eq!(indices, vec![2, 3, 4]);
    }
}
