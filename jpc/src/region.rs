//! Handing codestream bytes to the decode engine.
//!
//! Header inspection only needs the main header, which is available even when
//! the codestream is truncated. Decoding needs the tile-part data, and a
//! truncated codestream does not have it: that failure is reported here, when
//! the data is asked for, not when the truncation was detected.

use log::{debug, warn};
use std::io;

use crate::codestream::Codestream;
use crate::marker::MarkerId;

/// Resolution requested from the decode engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionLevel {
    /// Every resolution level.
    Full,
    /// Discard the given number of the highest resolution levels.
    Reduced(u8),
    /// Only the lowest resolution level, discarding every decomposition level.
    Lowest,
}

/// Main header bytes, SOC up to the first SOT marker.
pub fn read_header(codestream: &Codestream) -> Vec<u8> {
    codestream
        .main_header()
        .iter()
        .flat_map(|segment| segment.to_bytes())
        .collect()
}

/// Codestream bytes needed to decode at `level`.
///
/// Which packets belong to which resolution is only known once packet headers
/// are decoded, so every level needs every tile-part in full. Fails with
/// [`io::ErrorKind::UnexpectedEof`] when the codestream is truncated, whatever
/// else is wrong with the request, and with [`io::ErrorKind::InvalidInput`]
/// when `level` discards more levels than the codestream has.
pub fn read_region(codestream: &Codestream, level: ResolutionLevel) -> io::Result<Vec<u8>> {
    if codestream.is_truncated() {
        let present: u64 = codestream.tile_parts().iter().map(|t| t.data().len() as u64).sum();
        let last_offset = codestream
            .last_segment()
            .map_or(codestream.offset(), |s| s.offset());
        warn!(
            "Region read of {:?} over codestream truncated after offset {}",
            level, last_offset
        );
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "codestream is truncated after offset {}: only {} bytes of tile-part data present",
                last_offset, present
            ),
        ));
    }

    let cod = codestream.coding_style_marker_segment().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            "codestream has no usable COD marker segment",
        )
    })?;

    let decomposition_levels = cod.no_decomposition_levels();
    let discarded = match level {
        ResolutionLevel::Full => 0,
        ResolutionLevel::Reduced(levels) => levels,
        ResolutionLevel::Lowest => decomposition_levels,
    };
    if discarded > decomposition_levels {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "cannot discard {} resolution levels, codestream has {} decomposition levels",
                discarded, decomposition_levels
            ),
        ));
    }

    if !codestream
        .segments()
        .iter()
        .any(|s| s.marker_id() == MarkerId::SOD)
    {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "codestream has no tile-part data",
        ));
    }

    let bytes = codestream.to_bytes();
    debug!(
        "Region read of {:?} ({} levels discarded), {} bytes",
        level,
        discarded,
        bytes.len()
    );
    Ok(bytes)
}
