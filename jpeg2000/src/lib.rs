//! Structural reader and conformance checker for JPEG 2000 files.
//!
//! Reads raw codestreams (J2K) and JP2 / JPX containers from an in-memory
//! buffer into a [`StructuralModel`]: the box tree or marker segment list,
//! with byte offsets into the original buffer, plus every [`Issue`] found on
//! the way. Recoverable departures from ITU-T T.800 / T.801 are recorded as
//! issues; only data that cannot be read at all is a [`FatalError`].
//!
//! The pixel decoder is not part of this crate. It is handed codestream
//! bytes through [`read_region`], which is where a truncated codestream
//! finally fails.
//!
//! ```no_run
//! let model = jpeg2000::parse_file("image.jp2")?;
//! for issue in model.issues() {
//!     println!("{:?} {}", issue.kind(), issue.detail());
//! }
//! # Ok::<(), jpeg2000::FatalError>(())
//! ```

use log::{debug, info};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

mod model;
mod validate;

pub use jp2::{
    ColourMethod, ColourSpecificationBox, DecodeOptions, FileTypeBox, ImageHeaderBox, JP2Error,
    JP2File, Jp2Box,
};
pub use jpc::{
    Codestream, CodestreamError, Issue, IssueKind, MarkerId, MarkerSegment, ResolutionLevel,
    Severity,
};
pub use model::{Root, StructuralModel};
pub use validate::{
    authoritative_colour_specification, is_conformant, validate, CodecVersion, ParseVersionError,
    Rule, ValidatorConfig, RULES,
};

const CODESTREAM_MAGIC: [u8; 2] = [0xFF, 0x4F];

// Length, 'jP  ', <CR><LF><0x87><LF>.
const SIGNATURE_BOX: [u8; 12] = [0, 0, 0, 12, 106, 80, 32, 32, 13, 10, 135, 10];

/// Conditions that stop a parse. No model is returned with these.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("{length} bytes are not enough to identify the file format")]
    InsufficientData { length: usize },

    #[error("not a JPEG 2000 codestream or JP2 file, starts with {prefix:02X?}")]
    UnrecognizedFormat { prefix: Vec<u8> },

    #[error(transparent)]
    Container(#[from] JP2Error),

    #[error(transparent)]
    Codestream(#[from] CodestreamError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Options for [`parse_with_options`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub decode: DecodeOptions,
    pub validator: ValidatorConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Codestream,
    Container,
}

fn classify(data: &[u8]) -> Result<Format, FatalError> {
    if data.len() < CODESTREAM_MAGIC.len() {
        return Err(FatalError::InsufficientData { length: data.len() });
    }
    if data.starts_with(&CODESTREAM_MAGIC) {
        return Ok(Format::Codestream);
    }
    if data.len() < SIGNATURE_BOX.len() && SIGNATURE_BOX.starts_with(data) {
        return Err(FatalError::InsufficientData { length: data.len() });
    }
    if data.len() >= 8 && data[4..8] == jp2::BOX_TYPE_SIGNATURE {
        return Ok(Format::Container);
    }
    Err(FatalError::UnrecognizedFormat {
        prefix: data.iter().take(SIGNATURE_BOX.len()).copied().collect(),
    })
}

/// Parses `data` with default options.
pub fn parse(data: &[u8]) -> Result<StructuralModel, FatalError> {
    parse_with_options(data, &ParseOptions::default())
}

/// Parses `data`, a raw codestream or a JP2 / JPX file, and applies the
/// conformance rules enabled by `options.validator`.
pub fn parse_with_options(
    data: &[u8],
    options: &ParseOptions,
) -> Result<StructuralModel, FatalError> {
    let format = classify(data)?;
    info!("Parsing {} bytes as {:?}", data.len(), format);

    let mut issues = vec![];
    let root = match format {
        Format::Codestream => Root::Codestream(jpc::read_codestream(data, 0, &mut issues)?),
        Format::Container => Root::Container(jp2::decode_jp2(data, &options.decode, &mut issues)?),
    };

    if !options.validator.enables(Rule::Truncation) {
        // The codestream reader reports truncation as it finds it; engines
        // older than the rule's minimum version do not.
        let before = issues.len();
        issues.retain(|issue| issue.kind() != IssueKind::TruncatedCodestream);
        debug!(
            "Withheld {} truncation issues for codec {:?}",
            before - issues.len(),
            options.validator.codec_version
        );
    }
    let found = validate(&root, &issues, &options.validator);
    issues.extend(found);
    info!("Parse finish, {} issues", issues.len());
    Ok(StructuralModel::new(root, issues))
}

/// Reads the file at `path` into memory and parses it.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<StructuralModel, FatalError> {
    let data = fs::read(path.as_ref())?;
    parse(&data)
}

/// [`parse_file`] with explicit options.
pub fn parse_file_with_options<P: AsRef<Path>>(
    path: P,
    options: &ParseOptions,
) -> Result<StructuralModel, FatalError> {
    let data = fs::read(path.as_ref())?;
    parse_with_options(&data, options)
}

fn model_codestream(model: &StructuralModel) -> io::Result<&Codestream> {
    model.codestream().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "file has no Contiguous Codestream box",
        )
    })
}

/// Codestream bytes the decode engine needs for `level`.
///
/// Fails with [`io::ErrorKind::UnexpectedEof`] when the codestream is
/// truncated, whatever the level.
pub fn read_region(model: &StructuralModel, level: ResolutionLevel) -> io::Result<Vec<u8>> {
    jpc::read_region(model_codestream(model)?, level)
}

/// Main header bytes of the codestream. Available for truncated codestreams.
pub fn read_header(model: &StructuralModel) -> io::Result<Vec<u8>> {
    Ok(jpc::read_header(model_codestream(model)?))
}
