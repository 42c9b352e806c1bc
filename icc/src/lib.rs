//! ICC profile headers.
//!
//! JP2 and JPX files may embed an ICC profile (ISO 15076-1) in a Colour
//! Specification box. Checking how a file embeds its profile only needs the
//! fixed 128-byte profile header and the profile description tag, which is
//! all this crate reads; the transforms themselves are left to a colour
//! management engine.

use jpc::{ByteCursor, CursorError};
use log::debug;
use std::fmt;
use std::str;
use thiserror::Error;

const HEADER_LENGTH: usize = 128;
const TAG_ENTRY_LENGTH: usize = 12;

// 'acsp'
const PROFILE_FILE_SIGNATURE: [u8; 4] = [97, 99, 115, 112];

const CLASS_INPUT: [u8; 4] = *b"scnr";
const CLASS_DISPLAY: [u8; 4] = *b"mntr";
const CLASS_OUTPUT: [u8; 4] = *b"prtr";
const CLASS_DEVICE_LINK: [u8; 4] = *b"link";
const CLASS_COLOUR_SPACE: [u8; 4] = *b"spac";
const CLASS_ABSTRACT: [u8; 4] = *b"abst";
const CLASS_NAMED_COLOUR: [u8; 4] = *b"nmcl";

const TAG_PROFILE_DESCRIPTION: [u8; 4] = *b"desc";
const TYPE_TEXT_DESCRIPTION: [u8; 4] = *b"desc";
const TYPE_MULTI_LOCALIZED_UNICODE: [u8; 4] = *b"mluc";
const TYPE_TEXT: [u8; 4] = *b"text";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IccError {
    /// Not enough bytes for the header and tag table.
    #[error("ICC profile too short: {length} bytes, need at least {required}")]
    TooShort { length: usize, required: usize },

    /// The profile file signature is not 'acsp'.
    #[error("invalid ICC profile file signature {signature:?}")]
    InvalidSignature { signature: [u8; 4] },

    /// A tag points outside the profile or has an unexpected layout.
    #[error("invalid ICC tag {tag:?} at offset {offset}")]
    InvalidTag { tag: [u8; 4], offset: u32 },

    #[error(transparent)]
    Cursor(#[from] CursorError),
}

/// Profile/device class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProfileClass {
    Input,
    Display,
    Output,
    DeviceLink,
    ColourSpace,
    Abstract,
    NamedColour,
    Unknown([u8; 4]),
}

impl ProfileClass {
    fn new(value: [u8; 4]) -> ProfileClass {
        match value {
            CLASS_INPUT => ProfileClass::Input,
            CLASS_DISPLAY => ProfileClass::Display,
            CLASS_OUTPUT => ProfileClass::Output,
            CLASS_DEVICE_LINK => ProfileClass::DeviceLink,
            CLASS_COLOUR_SPACE => ProfileClass::ColourSpace,
            CLASS_ABSTRACT => ProfileClass::Abstract,
            CLASS_NAMED_COLOUR => ProfileClass::NamedColour,
            _ => ProfileClass::Unknown(value),
        }
    }

    pub fn signature(&self) -> [u8; 4] {
        match self {
            ProfileClass::Input => CLASS_INPUT,
            ProfileClass::Display => CLASS_DISPLAY,
            ProfileClass::Output => CLASS_OUTPUT,
            ProfileClass::DeviceLink => CLASS_DEVICE_LINK,
            ProfileClass::ColourSpace => CLASS_COLOUR_SPACE,
            ProfileClass::Abstract => CLASS_ABSTRACT,
            ProfileClass::NamedColour => CLASS_NAMED_COLOUR,
            ProfileClass::Unknown(value) => *value,
        }
    }
}

impl fmt::Display for ProfileClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProfileClass::Input => write!(f, "Input Device"),
            ProfileClass::Display => write!(f, "Display Device"),
            ProfileClass::Output => write!(f, "Output Device"),
            ProfileClass::DeviceLink => write!(f, "Device Link"),
            ProfileClass::ColourSpace => write!(f, "Colour Space"),
            ProfileClass::Abstract => write!(f, "Abstract"),
            ProfileClass::NamedColour => write!(f, "Named Colour"),
            ProfileClass::Unknown(value) => write!(f, "{}", String::from_utf8_lossy(value)),
        }
    }
}

/// The parts of an ICC profile that identify it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IccProfile {
    declared_size: u32,
    preferred_cmm: [u8; 4],
    version: [u8; 4],
    device_class: ProfileClass,
    colour_space: [u8; 4],
    connection_space: [u8; 4],
    description: Option<String>,
}

impl IccProfile {
    /// Profile size field; may disagree with the number of bytes embedded.
    pub fn declared_size(&self) -> u32 {
        self.declared_size
    }

    pub fn preferred_cmm(&self) -> [u8; 4] {
        self.preferred_cmm
    }

    /// Major and minor version, e.g. `(2, 1)` or `(4, 3)`.
    pub fn version(&self) -> (u8, u8) {
        (self.version[0], self.version[1] >> 4)
    }

    pub fn device_class(&self) -> ProfileClass {
        self.device_class
    }

    /// Data colour space signature, e.g. `RGB\040`.
    pub fn colour_space(&self) -> [u8; 4] {
        self.colour_space
    }

    /// Profile connection space signature, `XYZ\040` or `Lab\040`.
    pub fn connection_space(&self) -> [u8; 4] {
        self.connection_space
    }

    /// Profile description, when the profile has a readable 'desc' tag.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// True for the monochrome and three-component matrix based input or
    /// display profiles allowed by the JP2 Restricted ICC method.
    pub fn is_restricted_class(&self) -> bool {
        matches!(
            self.device_class,
            ProfileClass::Input | ProfileClass::Display
        ) && self.connection_space == *b"XYZ "
    }
}

/// Decodes the header and description of the profile in `data`.
pub fn decode_profile(data: &[u8]) -> Result<IccProfile, IccError> {
    if data.len() < HEADER_LENGTH + 4 {
        return Err(IccError::TooShort {
            length: data.len(),
            required: HEADER_LENGTH + 4,
        });
    }

    let mut cursor = ByteCursor::new(data);
    cursor.seek(36)?;
    let signature = cursor.read_array::<4>()?;
    if signature != PROFILE_FILE_SIGNATURE {
        return Err(IccError::InvalidSignature { signature });
    }

    cursor.seek(HEADER_LENGTH)?;
    let tag_count = cursor.read_u32()? as usize;
    let tag_table_end = tag_count
        .checked_mul(TAG_ENTRY_LENGTH)
        .and_then(|length| length.checked_add(HEADER_LENGTH + 4))
        .unwrap_or(usize::MAX);
    if tag_table_end > data.len() {
        return Err(IccError::TooShort {
            length: data.len(),
            required: tag_table_end,
        });
    }

    let mut description = None;
    for _ in 0..tag_count {
        let tag = cursor.read_array::<4>()?;
        let offset = cursor.read_u32()?;
        let size = cursor.read_u32()?;
        if tag == TAG_PROFILE_DESCRIPTION {
            description = Some(decode_description(data, offset, size)?);
            break;
        }
    }

    cursor.seek(0)?;
    let profile = IccProfile {
        declared_size: cursor.read_u32()?,
        preferred_cmm: cursor.read_array()?,
        version: cursor.read_array()?,
        device_class: ProfileClass::new(cursor.read_array()?),
        colour_space: cursor.read_array()?,
        connection_space: cursor.read_array()?,
        description,
    };
    debug!(
        "ICC profile class {} version {:?} description {:?}",
        profile.device_class,
        profile.version(),
        profile.description
    );
    Ok(profile)
}

fn decode_description(data: &[u8], offset: u32, size: u32) -> Result<String, IccError> {
    let invalid = IccError::InvalidTag {
        tag: TAG_PROFILE_DESCRIPTION,
        offset,
    };
    let start = offset as usize;
    let end = start.checked_add(size as usize).ok_or_else(|| invalid.clone())?;
    let tag = ByteCursor::new(data)
        .slice(start, end)
        .map_err(|_| invalid.clone())?;
    let mut cursor = ByteCursor::with_base(tag, u64::from(offset));
    match read_description(&mut cursor) {
        Ok(Some(text)) => Ok(text),
        Ok(None) => Err(invalid),
        Err(error) => {
            debug!("Profile description unreadable: {}", error);
            Err(invalid)
        }
    }
}

/// `Ok(None)` for a tag type that cannot hold a description.
fn read_description(cursor: &mut ByteCursor) -> Result<Option<String>, CursorError> {
    let type_signature = cursor.read_array::<4>()?;
    // Reserved.
    cursor.skip(4)?;
    match type_signature {
        // textDescriptionType (ICC v2): ASCII count, then NUL terminated ASCII.
        TYPE_TEXT_DESCRIPTION => {
            let count = cursor.read_u32()? as usize;
            Ok(Some(ascii_until_nul(cursor.read_exact(count)?)))
        }
        // multiLocalizedUnicodeType (ICC v4): the first record, UTF-16BE.
        TYPE_MULTI_LOCALIZED_UNICODE => {
            let records = cursor.read_u32()?;
            // Record size, language and country code.
            cursor.skip(8)?;
            let length = cursor.read_u32()? as usize;
            let record_offset = cursor.read_u32()? as usize;
            if records == 0 {
                return Ok(None);
            }
            let text = match record_offset.checked_add(length) {
                Some(end) => cursor.slice(record_offset, end)?,
                None => return Ok(None),
            };
            let units: Vec<u16> = text
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            Ok(Some(
                String::from_utf16_lossy(&units)
                    .trim_end_matches('\0')
                    .to_owned(),
            ))
        }
        TYPE_TEXT => Ok(Some(ascii_until_nul(cursor.rest()))),
        _ => Ok(None),
    }
}

fn ascii_until_nul(text: &[u8]) -> String {
    let end = text.iter().position(|&b| b == 0).unwrap_or(text.len());
    String::from_utf8_lossy(&text[..end]).into_owned()
}
