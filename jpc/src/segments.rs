//! Typed views over the marker segments needed to index a codestream.

use crate::cursor::{ByteCursor, CursorError};

/// Image and tile size (SIZ) marker segment.
///
/// Provides information about the uncompressed image such as the width and
/// height of the reference grid, the width and height of the tiles, the number
/// of components, component bit depth, and the separation of component samples
/// with respect to the reference grid.
///
/// See ITU-T T.800 | ISO/IEC 15444-1 Section A.5.1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAndTileSizeMarkerSegment {
    offset: u64,
    decoder_capabilities: u16,
    reference_grid_width: u32,
    reference_grid_height: u32,
    image_horizontal_offset: u32,
    image_vertical_offset: u32,
    reference_tile_width: u32,
    reference_tile_height: u32,
    tile_horizontal_offset: u32,
    tile_vertical_offset: u32,
    components: Vec<ComponentSize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentSize {
    precision: u8,
    horizontal_separation: u8,
    vertical_separation: u8,
}

impl ComponentSize {
    /// Bit depth, including the sign bit.
    pub fn precision(&self) -> u8 {
        (self.precision & 0x7F) + 1
    }

    pub fn values_are_signed(&self) -> bool {
        self.precision & 0x80 == 0x80
    }

    pub fn horizontal_separation(&self) -> u8 {
        self.horizontal_separation
    }

    pub fn vertical_separation(&self) -> u8 {
        self.vertical_separation
    }
}

impl ImageAndTileSizeMarkerSegment {
    /// Decodes the SIZ parameters in `payload`, the segment body after the
    /// length field. `offset` is the absolute offset of the SIZ marker.
    pub fn decode(payload: &[u8], offset: u64) -> Result<Self, CursorError> {
        let mut cursor = ByteCursor::with_base(payload, offset + 4);
        let decoder_capabilities = cursor.read_u16()?;
        let reference_grid_width = cursor.read_u32()?;
        let reference_grid_height = cursor.read_u32()?;
        let image_horizontal_offset = cursor.read_u32()?;
        let image_vertical_offset = cursor.read_u32()?;
        let reference_tile_width = cursor.read_u32()?;
        let reference_tile_height = cursor.read_u32()?;
        let tile_horizontal_offset = cursor.read_u32()?;
        let tile_vertical_offset = cursor.read_u32()?;
        let no_components = cursor.read_u16()?;

        let mut components = Vec::with_capacity(no_components as usize);
        for _ in 0..no_components {
            components.push(ComponentSize {
                precision: cursor.read_u8()?,
                horizontal_separation: cursor.read_u8()?,
                vertical_separation: cursor.read_u8()?,
            });
        }

        Ok(ImageAndTileSizeMarkerSegment {
            offset,
            decoder_capabilities,
            reference_grid_width,
            reference_grid_height,
            image_horizontal_offset,
            image_vertical_offset,
            reference_tile_width,
            reference_tile_height,
            tile_horizontal_offset,
            tile_vertical_offset,
            components,
        })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Capabilities a decoder needs to properly decode the codestream (Rsiz).
    pub fn decoder_capabilities(&self) -> u16 {
        self.decoder_capabilities
    }

    /// Width of the reference grid (Xsiz).
    pub fn reference_grid_width(&self) -> u32 {
        self.reference_grid_width
    }

    /// Height of the reference grid (Ysiz).
    pub fn reference_grid_height(&self) -> u32 {
        self.reference_grid_height
    }

    /// Horizontal offset from the origin of the reference grid to the left side
    /// of the image area (XOsiz).
    pub fn image_horizontal_offset(&self) -> u32 {
        self.image_horizontal_offset
    }

    /// Vertical offset from the origin of the reference grid to the top side of
    /// the image area (YOsiz).
    pub fn image_vertical_offset(&self) -> u32 {
        self.image_vertical_offset
    }

    /// Width of one reference tile with respect to the reference grid (XTsiz).
    pub fn reference_tile_width(&self) -> u32 {
        self.reference_tile_width
    }

    /// Height of one reference tile with respect to the reference grid (YTsiz).
    pub fn reference_tile_height(&self) -> u32 {
        self.reference_tile_height
    }

    pub fn tile_horizontal_offset(&self) -> u32 {
        self.tile_horizontal_offset
    }

    pub fn tile_vertical_offset(&self) -> u32 {
        self.tile_vertical_offset
    }

    /// Number of components in the image (Csiz).
    pub fn no_components(&self) -> u16 {
        self.components.len() as u16
    }

    pub fn components(&self) -> &[ComponentSize] {
        &self.components
    }

    /// Image area width, Xsiz - XOsiz.
    pub fn width(&self) -> u32 {
        self.reference_grid_width
            .saturating_sub(self.image_horizontal_offset)
    }

    /// Image area height, Ysiz - YOsiz.
    pub fn height(&self) -> u32 {
        self.reference_grid_height
            .saturating_sub(self.image_vertical_offset)
    }

    /// Number of tiles in the image.
    pub fn no_tiles(&self) -> u64 {
        if self.reference_tile_width == 0 || self.reference_tile_height == 0 {
            return 0;
        }
        let across = div_ceil(
            self.reference_grid_width
                .saturating_sub(self.tile_horizontal_offset),
            self.reference_tile_width,
        );
        let down = div_ceil(
            self.reference_grid_height
                .saturating_sub(self.tile_vertical_offset),
            self.reference_tile_height,
        );
        across as u64 * down as u64
    }
}

fn div_ceil(numerator: u32, denominator: u32) -> u32 {
    ((numerator as u64 + denominator as u64 - 1) / denominator as u64) as u32
}

/// Progression order (SGcod).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressionOrder {
    /// Layer-resolution level-component-position.
    LRCP,
    /// Resolution level-layer-component-position.
    RLCP,
    /// Resolution level-position-component-layer.
    RPCL,
    /// Position-component-resolution level-layer.
    PCRL,
    /// Component-position-resolution level-layer.
    CPRL,
    Reserved(u8),
}

impl ProgressionOrder {
    fn new(value: u8) -> ProgressionOrder {
        match value {
            0 => ProgressionOrder::LRCP,
            1 => ProgressionOrder::RLCP,
            2 => ProgressionOrder::RPCL,
            3 => ProgressionOrder::PCRL,
            4 => ProgressionOrder::CPRL,
            _ => ProgressionOrder::Reserved(value),
        }
    }
}

/// Coding style default (COD) marker segment.
///
/// Describes the coding style, number of decomposition levels and layering
/// that is the default used for compressing all components of an image.
///
/// See ITU-T T.800 | ISO/IEC 15444-1 Section A.6.1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodingStyleMarkerSegment {
    offset: u64,
    coding_style: u8,
    progression_order: ProgressionOrder,
    no_layers: u16,
    multiple_component_transformation: u8,
    no_decomposition_levels: u8,
    code_block_width: u8,
    code_block_height: u8,
    code_block_style: u8,
    transformation: u8,
    precinct_sizes: Vec<u8>,
}

impl CodingStyleMarkerSegment {
    pub fn decode(payload: &[u8], offset: u64) -> Result<Self, CursorError> {
        let mut cursor = ByteCursor::with_base(payload, offset + 4);
        let coding_style = cursor.read_u8()?;
        let progression_order = ProgressionOrder::new(cursor.read_u8()?);
        let no_layers = cursor.read_u16()?;
        let multiple_component_transformation = cursor.read_u8()?;
        let no_decomposition_levels = cursor.read_u8()?;
        let code_block_width = cursor.read_u8()?;
        let code_block_height = cursor.read_u8()?;
        let code_block_style = cursor.read_u8()?;
        let transformation = cursor.read_u8()?;

        // Entropy coder precincts are defined only when the Scod bit is set,
        // one byte for each resolution level.
        let precinct_sizes = if coding_style & 0x01 == 0x01 {
            cursor
                .read_exact(no_decomposition_levels as usize + 1)?
                .to_vec()
        } else {
            vec![]
        };

        Ok(CodingStyleMarkerSegment {
            offset,
            coding_style,
            progression_order,
            no_layers,
            multiple_component_transformation,
            no_decomposition_levels,
            code_block_width,
            code_block_height,
            code_block_style,
            transformation,
            precinct_sizes,
        })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn progression_order(&self) -> ProgressionOrder {
        self.progression_order
    }

    pub fn no_layers(&self) -> u16 {
        self.no_layers
    }

    pub fn multiple_component_transformation(&self) -> u8 {
        self.multiple_component_transformation
    }

    /// Number of wavelet decomposition levels; there are one more resolution
    /// levels than this.
    pub fn no_decomposition_levels(&self) -> u8 {
        self.no_decomposition_levels
    }

    pub fn uses_sop(&self) -> bool {
        self.coding_style & 0x02 == 0x02
    }

    pub fn uses_eph(&self) -> bool {
        self.coding_style & 0x04 == 0x04
    }

    /// Code-block width exponent offset value (xcb - 2).
    pub fn code_block_width(&self) -> u8 {
        self.code_block_width
    }

    pub fn code_block_height(&self) -> u8 {
        self.code_block_height
    }

    pub fn code_block_style(&self) -> u8 {
        self.code_block_style
    }

    /// 0 for the 9-7 irreversible filter, 1 for the 5-3 reversible filter.
    pub fn transformation(&self) -> u8 {
        self.transformation
    }

    pub fn precinct_sizes(&self) -> &[u8] {
        &self.precinct_sizes
    }
}

/// Start of tile-part (SOT) marker segment.
///
/// See ITU-T T.800 | ISO/IEC 15444-1 Section A.4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOfTileMarkerSegment {
    offset: u64,
    tile_index: u16,
    tile_part_length: u32,
    tile_part_index: u8,
    no_tile_parts: u8,
}

impl StartOfTileMarkerSegment {
    pub fn decode(payload: &[u8], offset: u64) -> Result<Self, CursorError> {
        let mut cursor = ByteCursor::with_base(payload, offset + 4);
        Ok(StartOfTileMarkerSegment {
            offset,
            tile_index: cursor.read_u16()?,
            tile_part_length: cursor.read_u32()?,
            tile_part_index: cursor.read_u8()?,
            no_tile_parts: cursor.read_u8()?,
        })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Tile index (Isot).
    pub fn tile_index(&self) -> u16 {
        self.tile_index
    }

    /// Length in bytes from the first byte of this SOT marker to the end of the
    /// tile-part data (Psot).
    ///
    /// Zero means the tile-part runs to the EOC marker at the end of the codestream.
    pub fn tile_part_length(&self) -> u32 {
        self.tile_part_length
    }

    /// Tile-part index (TPsot).
    pub fn tile_part_index(&self) -> u8 {
        self.tile_part_index
    }

    /// Number of tile-parts of this tile (TNsot), zero when not given.
    pub fn no_tile_parts(&self) -> u8 {
        self.no_tile_parts
    }
}
