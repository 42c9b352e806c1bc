//! JPEG 2000 codestream structure.
//!
//! The codestream (ITU-T T.800 | ISO/IEC 15444-1 Annex A) is the compressed
//! image data itself. It can be stored on its own (a `.j2k` / `.j2c` file) or
//! wrapped in the boxes of a JP2 / JPX file.
//!
//! This crate tokenizes a codestream into its marker segments, locates the
//! entropy coded data of each tile-part, and reports truncation and unknown
//! markers as [`Issue`]s rather than errors. The main entry point is
//! [`read_codestream`]; [`MarkerSegmentReader`] gives the same segments one at
//! a time.

mod codestream;
mod cursor;
mod issue;
mod marker;
mod region;
mod segments;

pub use codestream::{
    read_codestream, Codestream, CodestreamError, CodestreamState, EndOfStream, MarkerSegment,
    MarkerSegmentReader, TilePart,
};
pub use cursor::{ByteCursor, CursorError};
pub use issue::{record, Issue, IssueKind, Severity};
pub use marker::MarkerId;
pub use region::{read_header, read_region, ResolutionLevel};
pub use segments::{
    CodingStyleMarkerSegment, ComponentSize, ImageAndTileSizeMarkerSegment, ProgressionOrder,
    StartOfTileMarkerSegment,
};
