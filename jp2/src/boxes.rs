use jpc::{read_codestream, record, ByteCursor, Codestream, Issue, IssueKind};
use log::{debug, info};

use crate::{
    box_type_name, BoxType, DecodeOptions, JP2Error, BOX_TYPE_ASSOCIATION,
    BOX_TYPE_CODESTREAM_HEADER, BOX_TYPE_COMPOSITING_LAYER_HEADER, BOX_TYPE_COMPOSITION,
    BOX_TYPE_CONTIGUOUS_CODESTREAM, BOX_TYPE_DESIRED_REPRODUCTIONS, BOX_TYPE_FRAGMENT_TABLE,
    BOX_TYPE_GROUP_COLOUR, BOX_TYPE_HEADER, BOX_TYPE_RESOLUTION, BOX_TYPE_UUID_INFO,
};

const SUPERBOX_TYPES: [BoxType; 10] = [
    BOX_TYPE_HEADER,
    BOX_TYPE_RESOLUTION,
    BOX_TYPE_UUID_INFO,
    BOX_TYPE_CODESTREAM_HEADER,
    BOX_TYPE_COMPOSITING_LAYER_HEADER,
    BOX_TYPE_GROUP_COLOUR,
    BOX_TYPE_FRAGMENT_TABLE,
    BOX_TYPE_COMPOSITION,
    BOX_TYPE_ASSOCIATION,
    BOX_TYPE_DESIRED_REPRODUCTIONS,
];

/// True for box types whose contents are other boxes.
pub fn is_superbox(box_type: BoxType) -> bool {
    SUPERBOX_TYPES.contains(&box_type)
}

/// Box length (LBox, or XLBox when LBox is 1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoxLength {
    /// LBox was 0; the box runs to the end of the file (or of its superbox).
    ToEnd,
    /// Declared length, including the box header.
    Explicit(u64),
}

/// What a box holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoxContent {
    /// Superbox contents.
    Children(Vec<Jp2Box>),
    /// Leaf box contents, kept as read.
    Payload(Vec<u8>),
    /// Contiguous Codestream box contents.
    Codestream(Codestream),
}

/// One box of a JP2 / JPX file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jp2Box {
    box_type: BoxType,
    offset: u64,
    header_length: u8,
    declared_length: BoxLength,
    content_length: u64,
    content: BoxContent,
}

impl Jp2Box {
    pub(crate) fn signature(offset: u64, box_type: BoxType, magic: [u8; 4]) -> Jp2Box {
        Jp2Box {
            box_type,
            offset,
            header_length: 8,
            declared_length: BoxLength::Explicit(12),
            content_length: 4,
            content: BoxContent::Payload(magic.to_vec()),
        }
    }

    pub fn box_type(&self) -> BoxType {
        self.box_type
    }

    /// Absolute offset of the LBox field.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// 8, or 16 with an XLBox field.
    pub fn header_length(&self) -> u8 {
        self.header_length
    }

    pub fn declared_length(&self) -> BoxLength {
        self.declared_length
    }

    /// Absolute offset of the box contents.
    pub fn content_offset(&self) -> u64 {
        self.offset + u64::from(self.header_length)
    }

    /// Number of bytes the box occupies in the file, as far as the file goes.
    pub fn length(&self) -> u64 {
        u64::from(self.header_length) + self.content_length
    }

    pub fn content(&self) -> &BoxContent {
        &self.content
    }

    /// Child boxes; empty for leaf boxes.
    pub fn children(&self) -> &[Jp2Box] {
        match &self.content {
            BoxContent::Children(children) => children,
            _ => &[],
        }
    }

    pub fn payload(&self) -> Option<&[u8]> {
        match &self.content {
            BoxContent::Payload(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn codestream(&self) -> Option<&Codestream> {
        match &self.content {
            BoxContent::Codestream(codestream) => Some(codestream),
            _ => None,
        }
    }

    /// This box and every box below it, in file order.
    pub fn descendants(&self) -> Vec<&Jp2Box> {
        let mut boxes = vec![];
        self.collect_descendants(&mut boxes);
        boxes
    }

    fn collect_descendants<'a>(&'a self, boxes: &mut Vec<&'a Jp2Box>) {
        boxes.push(self);
        for child in self.children() {
            child.collect_descendants(boxes);
        }
    }

    /// The box bytes, header included, as they appear in a well formed file.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.length() as usize);
        match (self.header_length, self.declared_length) {
            (16, BoxLength::Explicit(length)) => {
                bytes.extend_from_slice(&1u32.to_be_bytes());
                bytes.extend_from_slice(&self.box_type);
                bytes.extend_from_slice(&length.to_be_bytes());
            }
            (_, BoxLength::Explicit(length)) => {
                bytes.extend_from_slice(&(length as u32).to_be_bytes());
                bytes.extend_from_slice(&self.box_type);
            }
            (_, BoxLength::ToEnd) => {
                bytes.extend_from_slice(&0u32.to_be_bytes());
                bytes.extend_from_slice(&self.box_type);
            }
        }
        match &self.content {
            BoxContent::Children(children) => {
                for child in children {
                    bytes.extend_from_slice(&child.to_bytes());
                }
            }
            BoxContent::Payload(payload) => bytes.extend_from_slice(payload),
            BoxContent::Codestream(codestream) => bytes.extend_from_slice(&codestream.to_bytes()),
        }
        bytes
    }
}

pub(crate) struct BoxHeader {
    pub(crate) offset: u64,
    pub(crate) box_type: BoxType,
    pub(crate) header_length: u8,
    pub(crate) declared_length: BoxLength,
}

pub(crate) fn decode_box_header(cursor: &mut ByteCursor) -> Result<BoxHeader, JP2Error> {
    let offset = cursor.offset();
    let length = cursor.read_u32()?;
    let box_type = cursor.read_array::<4>()?;

    let (header_length, declared_length) = match length {
        0 => (8, BoxLength::ToEnd),
        1 => {
            let extended = cursor.read_u64()?;
            if extended < 16 {
                return Err(JP2Error::InvalidBoxLength {
                    box_type,
                    offset,
                    length: extended,
                });
            }
            (16, BoxLength::Explicit(extended))
        }
        // Values 2 to 7 are reserved; they leave no room for the header.
        2..=7 => {
            return Err(JP2Error::InvalidBoxLength {
                box_type,
                offset,
                length: u64::from(length),
            })
        }
        _ => (8, BoxLength::Explicit(u64::from(length))),
    };

    Ok(BoxHeader {
        offset,
        box_type,
        header_length,
        declared_length,
    })
}

pub(crate) struct BoxReader<'o> {
    options: &'o DecodeOptions,
    issues: &'o mut Vec<Issue>,
}

impl<'o> BoxReader<'o> {
    pub(crate) fn new(options: &'o DecodeOptions, issues: &'o mut Vec<Issue>) -> BoxReader<'o> {
        BoxReader { options, issues }
    }

    /// Reads boxes until the end of `cursor`.
    ///
    /// `at_file_end` is true when the region is cut short by the end of the
    /// file rather than by a superbox length.
    pub(crate) fn read_boxes(
        &mut self,
        cursor: &mut ByteCursor,
        depth: usize,
        at_file_end: bool,
    ) -> Result<Vec<Jp2Box>, JP2Error> {
        let overrun = if at_file_end {
            IssueKind::BoxLengthExceedsFile
        } else {
            IssueKind::BoxLengthMismatch
        };

        let mut boxes = vec![];
        while !cursor.is_at_end() {
            let needed = match cursor.peek(4) {
                Ok([0, 0, 0, 1]) => 16,
                _ => 8,
            };
            if cursor.remaining() < needed {
                record(
                    self.issues,
                    Issue::new(
                        overrun,
                        Some(cursor.offset()),
                        format!("{} bytes left, too few for a box header", cursor.remaining()),
                    ),
                );
                break;
            }

            let header = decode_box_header(cursor)?;
            let available = cursor.remaining();
            let (content_length, cut_short) = match header.declared_length {
                BoxLength::ToEnd => (available, false),
                BoxLength::Explicit(length) => {
                    let content_length = length - u64::from(header.header_length);
                    if content_length > available {
                        record(
                            self.issues,
                            Issue::new(
                                overrun,
                                Some(header.offset),
                                format!(
                                    "{} box declares {} bytes, {} available",
                                    box_type_name(&header.box_type),
                                    length,
                                    available + u64::from(header.header_length)
                                ),
                            ),
                        );
                        (available, true)
                    } else {
                        (content_length, false)
                    }
                }
            };
            let content_at_file_end =
                at_file_end && (cut_short || header.declared_length == BoxLength::ToEnd);

            let content_offset = cursor.offset();
            let data = cursor.read_exact(content_length as usize)?;
            let mut content_cursor = ByteCursor::with_base(data, content_offset);
            boxes.push(self.read_box(header, &mut content_cursor, depth, content_at_file_end)?);
        }
        Ok(boxes)
    }

    fn read_box(
        &mut self,
        header: BoxHeader,
        content: &mut ByteCursor,
        depth: usize,
        content_at_file_end: bool,
    ) -> Result<Jp2Box, JP2Error> {
        let name = box_type_name(&header.box_type);
        info!("{} box start at {:?}", name, header.offset);
        debug!(
            "{} box header length {}, declared length {:?}",
            name, header.header_length, header.declared_length
        );

        let content_length = content.len() as u64;
        let content = if header.box_type == BOX_TYPE_CONTIGUOUS_CODESTREAM {
            let codestream = read_codestream(content.rest(), content.offset(), self.issues)?;
            BoxContent::Codestream(codestream)
        } else if is_superbox(header.box_type) {
            if depth + 1 > self.options.max_depth {
                record(
                    self.issues,
                    Issue::new(
                        IssueKind::NestingDepthExceeded,
                        Some(header.offset),
                        format!(
                            "{} box nested {} deep, limit is {}",
                            name,
                            depth + 1,
                            self.options.max_depth
                        ),
                    ),
                );
                BoxContent::Payload(content.rest().to_vec())
            } else {
                BoxContent::Children(self.read_boxes(content, depth + 1, content_at_file_end)?)
            }
        } else {
            BoxContent::Payload(content.rest().to_vec())
        };

        info!(
            "{} box finish at {:?}",
            name,
            header.offset + u64::from(header.header_length) + content_length
        );
        Ok(Jp2Box {
            box_type: header.box_type,
            offset: header.offset,
            header_length: header.header_length,
            declared_length: header.declared_length,
            content_length,
            content,
        })
    }
}
