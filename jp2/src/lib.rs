//! JP2 file format.
//!
//! The JPEG 2000 file format (JP2 file format) provides a foundation for storing application specific data (metadata) in
//! association with a JPEG 2000 codestream, such as information which is required to display the image.
//!
//! The building-block of the JP2 file format is called a box. All information contained within the JP2
//! file is encapsulated in boxes. ITU T.800 | ISO/IEC 15444-1 defines several types of boxes; the definition of each specific
//! box type defines the kinds of information that may be found within a box of that type. Some boxes (superboxes) contain
//! other boxes. ITU T.801 | ISO/IEC 15444-2 (JPX) extends the format with further boxes and superboxes.
//!
//! The main entry point for this module is the `decode_jp2` function. It reads the whole box tree, hands the Contiguous
//! Codestream box contents to the codestream reader, and returns a `JP2File`. Departures from the format that still
//! leave a readable file are recorded as `Issue`s; only a file that cannot be read at all is an error.

use jpc::{record, ByteCursor, Codestream, CodestreamError, CursorError, Issue, IssueKind};
use log::{debug, info};
use thiserror::Error;

mod boxes;
mod colour_specification;

pub use boxes::{is_superbox, BoxContent, BoxLength, Jp2Box};
pub use colour_specification::{
    ColourMethod, ColourSpecificationBox, ColourSpecificationMethods, EnumeratedColourSpaces,
};

use boxes::{decode_box_header, BoxReader};

/// Four character box type (TBox).
pub type BoxType = [u8; 4];

/// Error values that may be returned from JP2 functions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JP2Error {
    /// Invalid signature.
    ///
    /// The signature box did not match the required value. This usually
    /// means the file was damaged in transfer (newline translation, 7-bit
    /// transfer).
    #[error("invalid signature {signature:?} at offset {offset}")]
    InvalidSignature { signature: [u8; 4], offset: u64 },

    /// Box length too small to hold the box header.
    #[error("invalid length {length} for {} box at offset {offset}", box_type_name(.box_type))]
    InvalidBoxLength {
        box_type: BoxType,
        offset: u64,
        length: u64,
    },

    /// Unexpected box type.
    ///
    /// The first box of the file is not a Signature box.
    #[error("unexpected box type {} at offset {offset}", box_type_name(.box_type))]
    BoxUnexpected { box_type: BoxType, offset: u64 },

    /// The Contiguous Codestream box holds an unreadable codestream.
    #[error(transparent)]
    Codestream(#[from] CodestreamError),

    #[error(transparent)]
    Cursor(#[from] CursorError),
}

/// Box type as text, e.g. `jp2h`.
pub fn box_type_name(box_type: &BoxType) -> String {
    String::from_utf8_lossy(box_type).into_owned()
}

// jP\040\040 (0x6A50 2020)
pub const BOX_TYPE_SIGNATURE: BoxType = *b"jP  ";
pub const BOX_TYPE_FILE_TYPE: BoxType = *b"ftyp";
pub const BOX_TYPE_HEADER: BoxType = *b"jp2h";
pub const BOX_TYPE_IMAGE_HEADER: BoxType = *b"ihdr";
pub const BOX_TYPE_BITS_PER_COMPONENT: BoxType = *b"bpcc";
pub const BOX_TYPE_COLOUR_SPECIFICATION: BoxType = *b"colr";
pub const BOX_TYPE_PALETTE: BoxType = *b"pclr";
pub const BOX_TYPE_COMPONENT_MAPPING: BoxType = *b"cmap";
pub const BOX_TYPE_CHANNEL_DEFINITION: BoxType = *b"cdef";
pub const BOX_TYPE_RESOLUTION: BoxType = *b"res ";
pub const BOX_TYPE_CONTIGUOUS_CODESTREAM: BoxType = *b"jp2c";
pub const BOX_TYPE_INTELLECTUAL_PROPERTY: BoxType = *b"jp2i";
pub const BOX_TYPE_XML: BoxType = *b"xml ";
pub const BOX_TYPE_UUID: BoxType = *b"uuid";
pub const BOX_TYPE_UUID_INFO: BoxType = *b"uinf";

// ITU T.801 | ISO/IEC 15444-2 boxes.
pub const BOX_TYPE_READER_REQUIREMENTS: BoxType = *b"rreq";
pub const BOX_TYPE_CODESTREAM_HEADER: BoxType = *b"jpch";
pub const BOX_TYPE_COMPOSITING_LAYER_HEADER: BoxType = *b"jplh";
pub const BOX_TYPE_GROUP_COLOUR: BoxType = *b"cgrp";
pub const BOX_TYPE_FRAGMENT_TABLE: BoxType = *b"ftbl";
pub const BOX_TYPE_COMPOSITION: BoxType = *b"comp";
pub const BOX_TYPE_ASSOCIATION: BoxType = *b"asoc";
pub const BOX_TYPE_DESIRED_REPRODUCTIONS: BoxType = *b"drep";

/// Brand of files that conform to ITU T.800 | ISO/IEC 15444-1.
pub const BRAND_JP2: [u8; 4] = *b"jp2 ";

/// Brand of files that conform to ITU T.801 | ISO/IEC 15444-2.
pub const BRAND_JPX: [u8; 4] = *b"jpx ";

// <CR><LF><0x87><LF> (0x0D0A 870A).
const SIGNATURE_MAGIC: [u8; 4] = [13, 10, 135, 10];

/// All information contained within the JP2 file is encapsulated in boxes.
///
/// Types implementing `JBox` are typed views decoded from the contents of a
/// [`Jp2Box`].
///
/// For more information, see ISO/IEC 15444-1 / ITU T-800 Appendix I.4.
pub trait JBox {
    fn identifier(&self) -> BoxType;
    fn length(&self) -> u64;
    fn offset(&self) -> u64;

    fn decode(&mut self, cursor: &mut ByteCursor) -> Result<(), JP2Error>;
}

fn decode_view<B: JBox>(mut view: B, source: &Jp2Box) -> Result<B, JP2Error> {
    let payload = source.payload().unwrap_or(&[]);
    let mut cursor = ByteCursor::with_base(payload, source.content_offset());
    view.decode(&mut cursor)?;
    Ok(view)
}

/// Options for [`decode_jp2`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Deepest superbox nesting that is descended into. Deeper superboxes
    /// are kept as opaque leaf boxes.
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions { max_depth: 16 }
    }
}

/// File Type box.
///
/// The File Type box completely defines all of the contents of this file, as
/// well as a separate list of readers with which this file is compatible.
///
/// This box shall immediately follow the Signature box.
///
/// For more information, see ISO/IEC 15444-1 / ITU T-800 Appendix I.5.2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTypeBox {
    length: u64,
    offset: u64,
    brand: [u8; 4],
    min_version: u32,
    compatibility_list: Vec<[u8; 4]>,
}

impl FileTypeBox {
    fn at(offset: u64, length: u64) -> FileTypeBox {
        FileTypeBox {
            length,
            offset,
            brand: [0; 4],
            min_version: 0,
            compatibility_list: vec![],
        }
    }

    /// Brand.
    ///
    /// This field specifies the Recommendation | International Standard which
    /// completely defines this file.
    pub fn brand(&self) -> [u8; 4] {
        self.brand
    }

    /// Minor version. Shall be zero, readers continue when it is not.
    pub fn min_version(&self) -> u32 {
        self.min_version
    }

    /// Compatibility list (CL).
    pub fn compatibility_list(&self) -> &[[u8; 4]] {
        &self.compatibility_list
    }

    pub fn is_compatible_with(&self, brand: [u8; 4]) -> bool {
        self.compatibility_list.contains(&brand)
    }
}

impl JBox for FileTypeBox {
    // The type of the File Type Box shall be 'ftyp' (0x6674 7970).
    fn identifier(&self) -> BoxType {
        BOX_TYPE_FILE_TYPE
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn offset(&self) -> u64 {
        self.offset
    }

    fn decode(&mut self, cursor: &mut ByteCursor) -> Result<(), JP2Error> {
        self.brand = cursor.read_array::<4>()?;
        self.min_version = cursor.read_u32()?;

        // The number of CL fields is determined by the length of this box.
        while cursor.remaining() >= 4 {
            self.compatibility_list.push(cursor.read_array::<4>()?);
        }

        debug!("Brand {:?}", box_type_name(&self.brand));
        debug!("Minor version {:?}", self.min_version);
        debug!(
            "Compatibility list {:?}",
            self.compatibility_list
                .iter()
                .map(box_type_name)
                .collect::<Vec<_>>()
        );
        Ok(())
    }
}

/// Image Header box.
///
/// This box contains fixed length generic information about the image, such
/// as the image size and number of components. It shall be the first box in
/// the JP2 Header box.
///
/// For more information, see ISO/IEC 15444-1 | ITU T-800 Appendix I.5.3.1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeaderBox {
    length: u64,
    offset: u64,
    height: u32,
    width: u32,
    components_num: u16,
    components_bits: u8,
    compression_type: u8,
    colourspace_unknown: u8,
    intellectual_property: u8,
}

impl ImageHeaderBox {
    fn at(offset: u64, length: u64) -> ImageHeaderBox {
        ImageHeaderBox {
            length,
            offset,
            height: 0,
            width: 0,
            components_num: 0,
            components_bits: 0,
            compression_type: 0,
            colourspace_unknown: 0,
            intellectual_property: 0,
        }
    }

    /// Image area height (HEIGHT), Ysiz - YOsiz of the codestream.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Image area width (WIDTH), Xsiz - XOsiz of the codestream.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of components (NC).
    pub fn components_num(&self) -> u16 {
        self.components_num
    }

    /// Bits per component (BPC) as stored: depth minus one, high bit set for
    /// signed values, 255 when the depth varies per component.
    pub fn components_bits(&self) -> u8 {
        self.components_bits
    }

    /// Component bit depth, `None` when it varies (given in a Bits Per
    /// Component box) or the value is reserved.
    pub fn bit_depth(&self) -> Option<u8> {
        if self.components_bits == 255 {
            return None;
        }
        let low_bits = self.components_bits & 0b0111_1111;
        if low_bits <= 37 {
            Some(low_bits + 1)
        } else {
            None
        }
    }

    /// True if the components are signed; false if unsigned or varying.
    pub fn values_are_signed(&self) -> bool {
        self.components_bits != 255 && (self.components_bits & 0x80) == 0x80
    }

    /// Compression type (C). 7 for ITU-T T.800 | ISO/IEC 15444-1.
    pub fn compression_type(&self) -> u8 {
        self.compression_type
    }

    /// Colourspace Unknown (UnkC).
    pub fn colourspace_unknown(&self) -> u8 {
        self.colourspace_unknown
    }

    /// Intellectual Property (IPR). 1 when the file has an IPR box.
    pub fn intellectual_property(&self) -> u8 {
        self.intellectual_property
    }
}

impl JBox for ImageHeaderBox {
    // The type of the Image Header box shall be 'ihdr' (0x6968 6472)
    fn identifier(&self) -> BoxType {
        BOX_TYPE_IMAGE_HEADER
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn offset(&self) -> u64 {
        self.offset
    }

    fn decode(&mut self, cursor: &mut ByteCursor) -> Result<(), JP2Error> {
        self.height = cursor.read_u32()?;
        self.width = cursor.read_u32()?;
        self.components_num = cursor.read_u16()?;
        self.components_bits = cursor.read_u8()?;
        self.compression_type = cursor.read_u8()?;
        self.colourspace_unknown = cursor.read_u8()?;
        self.intellectual_property = cursor.read_u8()?;

        debug!("Height {:?}, width {:?}", self.height, self.width);
        debug!(
            "Components {:?}, bits {:?}",
            self.components_num, self.components_bits
        );
        Ok(())
    }
}

/// A decoded JP2 / JPX file.
///
/// Holds the whole box tree, in file order, along with typed views of the
/// boxes that identify the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JP2File {
    length: u64,
    boxes: Vec<Jp2Box>,
    file_type: Option<FileTypeBox>,
    image_header: Option<ImageHeaderBox>,
    colour_specifications: Vec<ColourSpecificationBox>,
}

impl JP2File {
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Top level boxes, the Signature box first.
    pub fn boxes(&self) -> &[Jp2Box] {
        &self.boxes
    }

    /// Every box in the file, in file order.
    pub fn descendants(&self) -> Vec<&Jp2Box> {
        self.boxes.iter().flat_map(|b| b.descendants()).collect()
    }

    /// File Type box. This box is required.
    pub fn file_type_box(&self) -> Option<&FileTypeBox> {
        self.file_type.as_ref()
    }

    /// Image Header box of the JP2 Header box.
    pub fn image_header_box(&self) -> Option<&ImageHeaderBox> {
        self.image_header.as_ref()
    }

    /// Every decodable Colour Specification box, in file order.
    pub fn colour_specification_boxes(&self) -> &[ColourSpecificationBox] {
        &self.colour_specifications
    }

    /// Codestreams of the Contiguous Codestream boxes, in file order.
    ///
    /// ITU-T T.800 | ISO/IEC 15444-1 readers use the first one only.
    pub fn contiguous_codestreams(&self) -> Vec<&Codestream> {
        self.descendants()
            .into_iter()
            .filter_map(|b| b.codestream())
            .collect()
    }
}

/// Decodes the JP2 / JPX file in `data`.
///
/// Recoverable departures from the format are recorded in `issues`.
pub fn decode_jp2(
    data: &[u8],
    options: &DecodeOptions,
    issues: &mut Vec<Issue>,
) -> Result<JP2File, JP2Error> {
    let mut cursor = ByteCursor::new(data);

    // The Signature box shall be the first box, and is a fixed 12 byte string.
    info!("SignatureBox start at {:?}", cursor.offset());
    let header = decode_box_header(&mut cursor)?;
    if header.box_type != BOX_TYPE_SIGNATURE {
        return Err(JP2Error::BoxUnexpected {
            box_type: header.box_type,
            offset: header.offset,
        });
    }
    if header.declared_length != BoxLength::Explicit(12) {
        return Err(JP2Error::InvalidBoxLength {
            box_type: header.box_type,
            offset: header.offset,
            length: match header.declared_length {
                BoxLength::Explicit(length) => length,
                BoxLength::ToEnd => 0,
            },
        });
    }
    let signature_offset = cursor.offset();
    let signature = cursor.read_array::<4>()?;
    if signature != SIGNATURE_MAGIC {
        return Err(JP2Error::InvalidSignature {
            signature,
            offset: signature_offset,
        });
    }
    info!("SignatureBox finish at {:?}", cursor.offset());

    let mut boxes = vec![Jp2Box::signature(header.offset, header.box_type, signature)];
    boxes.extend(BoxReader::new(options, issues).read_boxes(&mut cursor, 0, true)?);

    let file_type = check_file_type(&boxes, issues);
    let image_header = check_header(&boxes, issues);
    check_codestreams(&boxes, issues);
    let colour_specifications = colour_specifications(&boxes, issues);

    info!("JP2File finish, {} top level boxes", boxes.len());
    Ok(JP2File {
        length: data.len() as u64,
        boxes,
        file_type,
        image_header,
        colour_specifications,
    })
}

fn positions(boxes: &[Jp2Box], box_type: BoxType) -> Vec<usize> {
    boxes
        .iter()
        .enumerate()
        .filter(|(_, b)| b.box_type() == box_type)
        .map(|(i, _)| i)
        .collect()
}

fn record_duplicates(boxes: &[Jp2Box], found: &[usize], issues: &mut Vec<Issue>) {
    for &index in found.iter().skip(1) {
        let duplicate = &boxes[index];
        record(
            issues,
            Issue::new(
                IssueKind::DuplicateBox,
                Some(duplicate.offset()),
                format!("only one {} box is allowed", box_type_name(&duplicate.box_type())),
            ),
        );
    }
}

fn record_missing(box_type: BoxType, offset: Option<u64>, issues: &mut Vec<Issue>) {
    record(
        issues,
        Issue::new(
            IssueKind::MissingBox,
            offset,
            format!("no {} box", box_type_name(&box_type)),
        ),
    );
}

fn record_malformed(source: &Jp2Box, error: &JP2Error, issues: &mut Vec<Issue>) {
    record(
        issues,
        Issue::new(
            IssueKind::MalformedBox,
            Some(source.offset()),
            format!("{} box: {}", box_type_name(&source.box_type()), error),
        ),
    );
}

fn check_file_type(boxes: &[Jp2Box], issues: &mut Vec<Issue>) -> Option<FileTypeBox> {
    let found = positions(boxes, BOX_TYPE_FILE_TYPE);
    let first = match found.first() {
        Some(&first) => first,
        None => {
            record_missing(BOX_TYPE_FILE_TYPE, None, issues);
            return None;
        }
    };
    let source = &boxes[first];
    if first != 1 {
        record(
            issues,
            Issue::new(
                IssueKind::UnexpectedBoxOrder,
                Some(source.offset()),
                "the File Type box shall immediately follow the Signature box",
            ),
        );
    }
    record_duplicates(boxes, &found, issues);

    info!("FileTypeBox start at {:?}", source.offset());
    let file_type = match decode_view(FileTypeBox::at(source.offset(), source.length()), source) {
        Ok(file_type) => file_type,
        Err(error) => {
            record_malformed(source, &error, issues);
            return None;
        }
    };
    info!("FileTypeBox finish at {:?}", source.offset() + source.length());

    let payload_length = source.payload().map_or(0, |p| p.len());
    if payload_length % 4 != 0 {
        record(
            issues,
            Issue::new(
                IssueKind::MalformedBox,
                Some(source.offset()),
                format!("{} trailing bytes after the compatibility list", payload_length % 4),
            ),
        );
    }

    // A JP2 file shall have 'jp2\040' in its compatibility list.
    if file_type.brand() == BRAND_JP2 && !file_type.is_compatible_with(BRAND_JP2) {
        record(
            issues,
            Issue::new(
                IssueKind::NotCompatible,
                Some(source.offset()),
                format!(
                    "'jp2 ' not found in compatibility list '{}'",
                    file_type
                        .compatibility_list()
                        .iter()
                        .map(box_type_name)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ),
        );
    }
    Some(file_type)
}

fn check_header(boxes: &[Jp2Box], issues: &mut Vec<Issue>) -> Option<ImageHeaderBox> {
    let found = positions(boxes, BOX_TYPE_HEADER);
    let header = match found.first() {
        Some(&first) => &boxes[first],
        None => {
            record_missing(BOX_TYPE_HEADER, None, issues);
            return None;
        }
    };
    record_duplicates(boxes, &found, issues);

    // Kept opaque when nested too deep; nothing more to check.
    if header.payload().is_some() {
        return None;
    }

    let children = header.children();
    if !children
        .iter()
        .any(|b| b.box_type() == BOX_TYPE_COLOUR_SPECIFICATION)
    {
        record_missing(BOX_TYPE_COLOUR_SPECIFICATION, Some(header.offset()), issues);
    }

    let source = match children
        .iter()
        .find(|b| b.box_type() == BOX_TYPE_IMAGE_HEADER)
    {
        Some(source) => source,
        None => {
            record_missing(BOX_TYPE_IMAGE_HEADER, Some(header.offset()), issues);
            return None;
        }
    };
    if children[0].box_type() != BOX_TYPE_IMAGE_HEADER {
        record(
            issues,
            Issue::new(
                IssueKind::UnexpectedBoxOrder,
                Some(source.offset()),
                "the Image Header box shall be the first box in the JP2 Header box",
            ),
        );
    }

    info!("ImageHeaderBox start at {:?}", source.offset());
    match decode_view(ImageHeaderBox::at(source.offset(), source.length()), source) {
        Ok(image_header) => {
            info!(
                "ImageHeaderBox finish at {:?}",
                source.offset() + source.length()
            );
            Some(image_header)
        }
        Err(error) => {
            record_malformed(source, &error, issues);
            None
        }
    }
}

fn check_codestreams(boxes: &[Jp2Box], issues: &mut Vec<Issue>) {
    let codestreams = positions(boxes, BOX_TYPE_CONTIGUOUS_CODESTREAM);
    let first = match codestreams.first() {
        Some(&first) => first,
        None => {
            // JPX files may hold their codestreams in fragment tables instead.
            if positions(boxes, BOX_TYPE_FRAGMENT_TABLE).is_empty() {
                record_missing(BOX_TYPE_CONTIGUOUS_CODESTREAM, None, issues);
            }
            return;
        }
    };

    if let Some(&header) = positions(boxes, BOX_TYPE_HEADER).first() {
        if first < header {
            record(
                issues,
                Issue::new(
                    IssueKind::UnexpectedBoxOrder,
                    Some(boxes[first].offset()),
                    "the JP2 Header box shall come before the Contiguous Codestream box",
                ),
            );
        }
    }
}

fn colour_specifications(boxes: &[Jp2Box], issues: &mut Vec<Issue>) -> Vec<ColourSpecificationBox> {
    let mut colour_specifications = vec![];
    for source in boxes.iter().flat_map(|b| b.descendants()) {
        if source.box_type() != BOX_TYPE_COLOUR_SPECIFICATION {
            continue;
        }
        info!("ColourSpecificationBox start at {:?}", source.offset());
        let colour_specification = match decode_view(
            ColourSpecificationBox::at(source.offset(), source.length()),
            source,
        ) {
            Ok(colour_specification) => colour_specification,
            Err(error) => {
                record_malformed(source, &error, issues);
                continue;
            }
        };
        if let Some(error) = colour_specification.icc_profile_error() {
            record(
                issues,
                Issue::new(
                    IssueKind::MalformedIccProfile,
                    Some(source.content_offset() + 3),
                    format!("{}", error),
                ),
            );
        }
        info!(
            "ColourSpecificationBox finish at {:?}",
            source.offset() + source.length()
        );
        colour_specifications.push(colour_specification);
    }
    colour_specifications
}
