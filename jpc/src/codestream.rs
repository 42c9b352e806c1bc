//! Marker segment tokenization.
//!
//! A codestream is a sequence of marker segments: a 2-byte marker code
//! (always starting with 0xFF), followed for most markers by a 2-byte length
//! that includes itself, followed by the marker parameters. SOC, SOD and EOC
//! (and the other delimiting markers) carry no length.
//!
//! Entropy coded data follows each SOD marker. It is not made of marker
//! segments, so the reader uses the tile-part length (Psot) from the preceding
//! SOT marker segment to jump over it.

use log::{debug, info};
use std::fmt;
use thiserror::Error;

use crate::cursor::{ByteCursor, CursorError};
use crate::issue::{record, Issue, IssueKind};
use crate::marker::MarkerId;
use crate::segments::{
    CodingStyleMarkerSegment, ImageAndTileSizeMarkerSegment, StartOfTileMarkerSegment,
};

/// Errors that make a codestream unreadable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodestreamError {
    /// The first marker is not SOC.
    #[error("expected SOC marker at offset {offset}, found 0x{code:04X}")]
    MissingSoc { offset: u64, code: u16 },

    /// The reader no longer knows where the next marker starts.
    #[error("lost marker synchronisation at offset {offset} (code 0x{code:04X})")]
    UnrecoverableMarkerSync { offset: u64, code: u16 },

    /// A segment length smaller than the length field itself.
    #[error("invalid length {length} for {marker} marker segment at offset {offset}")]
    InvalidSegmentLength {
        marker: MarkerId,
        offset: u64,
        length: u16,
    },

    /// A tile-part that ends before its own data starts.
    #[error("tile-part at offset {offset} has length {length}, which ends before its data")]
    InvalidTilePartLength { offset: u64, length: u32 },

    #[error(transparent)]
    Cursor(#[from] CursorError),
}

/// One marker segment, as found in the codestream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSegment {
    marker: MarkerId,
    offset: u64,
    length: Option<u16>,
    payload: Vec<u8>,
}

impl MarkerSegment {
    pub fn marker_id(&self) -> MarkerId {
        self.marker
    }

    /// Absolute offset of the marker code.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Value of the length field, `None` for delimiting markers.
    pub fn length(&self) -> Option<u16> {
        self.length
    }

    /// Marker parameters, after the length field.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Number of bytes the segment occupies in the codestream, marker included.
    pub fn raw_length(&self) -> u64 {
        2 + self.length.map_or(0, u64::from)
    }

    /// The segment bytes exactly as they appear in the codestream.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.raw_length() as usize);
        bytes.extend_from_slice(&self.marker.code().to_be_bytes());
        if let Some(length) = self.length {
            bytes.extend_from_slice(&length.to_be_bytes());
        }
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

/// Entropy coded data of one tile-part, located by its SOT marker segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePart {
    tile_index: u16,
    part_index: u8,
    offset: u64,
    length: u32,
    data_offset: u64,
    data: Vec<u8>,
    complete: bool,
}

impl TilePart {
    pub fn tile_index(&self) -> u16 {
        self.tile_index
    }

    pub fn part_index(&self) -> u8 {
        self.part_index
    }

    /// Absolute offset of the SOT marker.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Declared tile-part length (Psot), zero when it runs to the EOC.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Absolute offset of the first byte after the SOD marker.
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// The entropy coded bytes that are present.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// False when the data ends before the declared tile-part length.
    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

/// Terminal state of a marker segment sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodestreamState {
    /// The EOC marker was read.
    Complete,
    /// The data ran out before the EOC marker.
    Truncated,
}

/// How a marker segment sequence ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndOfStream {
    /// The previous segment was EOC.
    Complete,
    /// The data ran out at `offset` while more was expected.
    Truncated { offset: u64 },
    /// The codestream cannot be read any further.
    Failed(CodestreamError),
}

impl fmt::Display for EndOfStream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EndOfStream::Complete => write!(f, "end of codestream"),
            EndOfStream::Truncated { offset } => write!(f, "codestream truncated at offset {}", offset),
            EndOfStream::Failed(error) => write!(f, "{}", error),
        }
    }
}

/// Pull based reader producing the marker segments of a codestream in order.
///
/// Each call to [`next_segment`](MarkerSegmentReader::next_segment) returns
/// the next segment, or how the sequence ended. Once ended, it keeps
/// returning the same [`EndOfStream`]; reading again means starting a new
/// reader over the same data.
#[derive(Debug)]
pub struct MarkerSegmentReader<'a> {
    cursor: ByteCursor<'a>,
    started: bool,
    current_tile_part: Option<StartOfTileMarkerSegment>,
    tile_parts: Vec<TilePart>,
    issues: Vec<Issue>,
    end: Option<EndOfStream>,
    end_yielded: bool,
}

impl<'a> MarkerSegmentReader<'a> {
    pub fn new(data: &'a [u8]) -> MarkerSegmentReader<'a> {
        Self::with_base(data, 0)
    }

    /// Reader over codestream `data` that starts at absolute offset `base`,
    /// e.g. inside a Contiguous Codestream box.
    pub fn with_base(data: &'a [u8], base: u64) -> MarkerSegmentReader<'a> {
        MarkerSegmentReader {
            cursor: ByteCursor::with_base(data, base),
            started: false,
            current_tile_part: None,
            tile_parts: vec![],
            issues: vec![],
            end: None,
            end_yielded: false,
        }
    }

    pub fn next_segment(&mut self) -> Result<MarkerSegment, EndOfStream> {
        if let Some(end) = &self.end {
            return Err(end.clone());
        }
        match self.read_segment() {
            Ok(segment) => {
                debug!(
                    "{} marker segment at {:?}, length {:?}",
                    segment.marker_id(),
                    segment.offset(),
                    segment.length()
                );
                Ok(segment)
            }
            Err(end) => {
                self.end = Some(end.clone());
                Err(end)
            }
        }
    }

    /// The terminal state, once reached.
    pub fn end(&self) -> Option<&EndOfStream> {
        self.end.as_ref()
    }

    /// Tile-parts located so far.
    pub fn tile_parts(&self) -> &[TilePart] {
        &self.tile_parts
    }

    /// Issues recorded so far.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn into_parts(self) -> (Vec<TilePart>, Vec<Issue>) {
        (self.tile_parts, self.issues)
    }

    fn read_segment(&mut self) -> Result<MarkerSegment, EndOfStream> {
        let offset = self.cursor.offset();
        let code = match self.cursor.read_u16() {
            Ok(code) => code,
            Err(_) => return Err(self.truncated(offset, "marker")),
        };

        if code & 0xFF00 != 0xFF00 {
            return Err(EndOfStream::Failed(
                CodestreamError::UnrecoverableMarkerSync { offset, code },
            ));
        }

        let marker = MarkerId::new(code);
        if !self.started {
            if marker != MarkerId::SOC {
                return Err(EndOfStream::Failed(CodestreamError::MissingSoc {
                    offset,
                    code,
                }));
            }
            self.started = true;
        }

        if marker.is_delimiting() {
            let segment = MarkerSegment {
                marker,
                offset,
                length: None,
                payload: vec![],
            };
            match marker {
                MarkerId::SOD => self.skip_tile_part_data(offset)?,
                MarkerId::EOC => self.end = Some(EndOfStream::Complete),
                _ => {}
            }
            return Ok(segment);
        }

        let length = match self.cursor.read_u16() {
            Ok(length) => length,
            Err(_) => return Err(self.truncated(offset, "length field")),
        };

        if length < 2 {
            // A marker the reader does not know, with a length it cannot
            // step over, leaves no way to find the next marker.
            let error = if marker.is_unknown() {
                CodestreamError::UnrecoverableMarkerSync { offset, code }
            } else {
                CodestreamError::InvalidSegmentLength {
                    marker,
                    offset,
                    length,
                }
            };
            return Err(EndOfStream::Failed(error));
        }

        let payload = match self.cursor.read_exact(length as usize - 2) {
            Ok(payload) => payload.to_vec(),
            Err(_) => return Err(self.truncated(offset, "marker segment")),
        };

        if marker.is_unknown() {
            record(
                &mut self.issues,
                Issue::new(
                    IssueKind::UnknownMarker,
                    Some(offset),
                    format!("skipped {} bytes of marker 0x{:04X}", length, code),
                ),
            );
        }

        if marker == MarkerId::SOT {
            let sot = StartOfTileMarkerSegment::decode(&payload, offset).map_err(|_| {
                EndOfStream::Failed(CodestreamError::InvalidSegmentLength {
                    marker,
                    offset,
                    length,
                })
            })?;
            self.current_tile_part = Some(sot);
        }

        Ok(MarkerSegment {
            marker,
            offset,
            length: Some(length),
            payload,
        })
    }

    fn skip_tile_part_data(&mut self, sod_offset: u64) -> Result<(), EndOfStream> {
        let sot = match self.current_tile_part.take() {
            Some(sot) => sot,
            None => {
                // Without a tile-part length there is no way to find the end
                // of the entropy coded data.
                return Err(EndOfStream::Failed(
                    CodestreamError::UnrecoverableMarkerSync {
                        offset: sod_offset,
                        code: MarkerId::SOD.code(),
                    },
                ));
            }
        };

        let data_start = self.cursor.position();
        let available = self.cursor.len();
        let (data_end, complete) = if sot.tile_part_length() == 0 {
            // The last tile-part of the codestream, running up to the EOC.
            let rest = self.cursor.rest();
            if rest.len() >= 2 && rest[rest.len() - 2..] == MarkerId::EOC.code().to_be_bytes() {
                (available - 2, true)
            } else {
                (available, false)
            }
        } else {
            let sot_position = sot.offset() - self.cursor.base();
            let end = sot_position + sot.tile_part_length() as u64;
            if end < data_start as u64 {
                return Err(EndOfStream::Failed(
                    CodestreamError::InvalidTilePartLength {
                        offset: sot.offset(),
                        length: sot.tile_part_length(),
                    },
                ));
            }
            if end > available as u64 {
                (available, false)
            } else {
                (end as usize, true)
            }
        };

        let data = self
            .cursor
            .slice(data_start, data_end)
            .map_err(|e| EndOfStream::Failed(e.into()))?
            .to_vec();
        self.cursor
            .seek(data_end)
            .map_err(|e| EndOfStream::Failed(e.into()))?;

        info!(
            "Tile {} part {} data at {:?}, {} bytes",
            sot.tile_index(),
            sot.tile_part_index(),
            self.cursor.base() + data_start as u64,
            data.len()
        );
        self.tile_parts.push(TilePart {
            tile_index: sot.tile_index(),
            part_index: sot.tile_part_index(),
            offset: sot.offset(),
            length: sot.tile_part_length(),
            data_offset: self.cursor.base() + data_start as u64,
            data,
            complete,
        });

        if !complete {
            let offset = self.cursor.offset();
            let end = self.truncated(offset, "tile-part data");
            // SOD itself was read; the caller sees the truncation on the next pull.
            self.end = Some(end);
        }
        Ok(())
    }

    fn truncated(&mut self, offset: u64, what: &str) -> EndOfStream {
        record(
            &mut self.issues,
            Issue::new(
                IssueKind::TruncatedCodestream,
                Some(offset),
                format!("codestream ends in {} before the EOC marker", what),
            ),
        );
        EndOfStream::Truncated { offset }
    }
}

impl<'a> Iterator for MarkerSegmentReader<'a> {
    type Item = Result<MarkerSegment, EndOfStream>;

    /// Yields every segment, then the terminal [`EndOfStream`] once.
    fn next(&mut self) -> Option<Self::Item> {
        if self.end_yielded {
            return None;
        }
        let item = self.next_segment();
        if item.is_err() {
            self.end_yielded = true;
        }
        Some(item)
    }
}

/// A fully tokenized codestream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codestream {
    offset: u64,
    length: u64,
    segments: Vec<MarkerSegment>,
    tile_parts: Vec<TilePart>,
    state: CodestreamState,
}

impl Codestream {
    /// Absolute offset of the SOC marker.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of codestream bytes that were available.
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn segments(&self) -> &[MarkerSegment] {
        &self.segments
    }

    pub fn tile_parts(&self) -> &[TilePart] {
        &self.tile_parts
    }

    pub fn state(&self) -> CodestreamState {
        self.state
    }

    pub fn is_truncated(&self) -> bool {
        self.state == CodestreamState::Truncated
    }

    pub fn last_segment(&self) -> Option<&MarkerSegment> {
        self.segments.last()
    }

    /// Segments of the main header, SOC up to (not including) the first SOT.
    pub fn main_header(&self) -> &[MarkerSegment] {
        let end = self
            .segments
            .iter()
            .position(|s| s.marker_id() == MarkerId::SOT)
            .unwrap_or(self.segments.len());
        &self.segments[..end]
    }

    fn main_header_segment(&self, marker: MarkerId) -> Option<&MarkerSegment> {
        self.main_header().iter().find(|s| s.marker_id() == marker)
    }

    /// The SIZ marker segment, if present and well formed.
    pub fn image_and_tile_size_marker_segment(&self) -> Option<ImageAndTileSizeMarkerSegment> {
        let segment = self.main_header_segment(MarkerId::SIZ)?;
        ImageAndTileSizeMarkerSegment::decode(segment.payload(), segment.offset()).ok()
    }

    /// The COD marker segment, if present and well formed.
    pub fn coding_style_marker_segment(&self) -> Option<CodingStyleMarkerSegment> {
        let segment = self.main_header_segment(MarkerId::COD)?;
        CodingStyleMarkerSegment::decode(segment.payload(), segment.offset()).ok()
    }

    /// Codestream bytes as read, the tile-part data reinserted after each SOD.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.length as usize);
        let mut tile_parts = self.tile_parts.iter();
        for segment in &self.segments {
            bytes.extend_from_slice(&segment.to_bytes());
            if segment.marker_id() == MarkerId::SOD {
                if let Some(tile_part) = tile_parts.next() {
                    bytes.extend_from_slice(tile_part.data());
                }
            }
        }
        bytes
    }
}

/// Reads every marker segment of the codestream in `data`.
///
/// `base` is the absolute offset of `data` within the file. Truncation and
/// unknown markers are recorded in `issues`; only conditions that leave the
/// codestream unreadable are returned as errors.
pub fn read_codestream(
    data: &[u8],
    base: u64,
    issues: &mut Vec<Issue>,
) -> Result<Codestream, CodestreamError> {
    info!("Codestream start at {:?}", base);
    let mut reader = MarkerSegmentReader::with_base(data, base);
    let mut segments = vec![];

    let state = loop {
        match reader.next_segment() {
            Ok(segment) => segments.push(segment),
            Err(EndOfStream::Complete) => break CodestreamState::Complete,
            Err(EndOfStream::Truncated { .. }) => break CodestreamState::Truncated,
            Err(EndOfStream::Failed(error)) => return Err(error),
        }
    };

    let (tile_parts, reader_issues) = reader.into_parts();
    issues.extend(reader_issues);
    info!(
        "Codestream finish, {} segments, {} tile-parts, {:?}",
        segments.len(),
        tile_parts.len(),
        state
    );

    Ok(Codestream {
        offset: base,
        length: data.len() as u64,
        segments,
        tile_parts,
        state,
    })
}
