use icc::{decode_profile, IccError, IccProfile};
use jpc::ByteCursor;
use log::{debug, warn};
use std::fmt;

use crate::{BoxType, JBox, JP2Error, BOX_TYPE_COLOUR_SPECIFICATION};

const METHOD_ENUMERATED_COLOUR_SPACE: u8 = 1;
const METHOD_RESTRICTED_ICC_PROFILE: u8 = 2;
const METHOD_ANY_ICC_PROFILE: u8 = 3;
const METHOD_VENDOR_COLOUR: u8 = 4;
const METHOD_PARAMETERIZED_COLOUR_SPACE: u8 = 5;

/// Colour specification methods (METH).
///
/// ITU-T T.800 | ISO/IEC 15444-1 defines the enumerated and restricted ICC
/// methods. ITU-T T.801 | ISO/IEC 15444-2 adds any ICC, vendor and
/// parameterized methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColourSpecificationMethods {
    /// Enumerated colourspace (EnumCS).
    EnumeratedColourSpace { code: EnumeratedColourSpaces },

    /// Restricted ICC method.
    ///
    /// The profile shall be a Monochrome or Three-Component Matrix-Based
    /// Input or Display profile with an XYZ profile connection space.
    RestrictedICCProfile { profile_data: Vec<u8> },

    /// Any ICC method.
    ///
    /// Allows any input ICC profile. Only permitted in JPX (and HTJ2K) files,
    /// not in files that claim to be plain JP2.
    AnyICCProfile { profile_data: Vec<u8> },

    /// Vendor colour method, identified by a UUID.
    VendorColourMethod {
        vendor_defined_code: [u8; 16],
        vendor_parameters: Vec<u8>,
    },

    /// Parameterized colourspace (ITU-T H.273 code points).
    ParameterizedColourspace {
        colour_primaries: u16,
        transfer_characteristics: u16,
        matrix_coefficients: u16,
        video_full_range: bool,
    },

    /// Reserved for ISO use; a reader shall ignore the whole box.
    Reserved { value: u8 },
}

/// Kind of colour specification method, without its data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColourMethod {
    Enumerated,
    RestrictedICC,
    AnyICC,
    VendorColour,
    Parameterized,
    Reserved,
}

impl ColourSpecificationMethods {
    pub fn kind(&self) -> ColourMethod {
        match self {
            ColourSpecificationMethods::EnumeratedColourSpace { .. } => ColourMethod::Enumerated,
            ColourSpecificationMethods::RestrictedICCProfile { .. } => ColourMethod::RestrictedICC,
            ColourSpecificationMethods::AnyICCProfile { .. } => ColourMethod::AnyICC,
            ColourSpecificationMethods::VendorColourMethod { .. } => ColourMethod::VendorColour,
            ColourSpecificationMethods::ParameterizedColourspace { .. } => {
                ColourMethod::Parameterized
            }
            ColourSpecificationMethods::Reserved { .. } => ColourMethod::Reserved,
        }
    }

    /// Encoded METH value.
    pub fn encoded_meth(&self) -> u8 {
        match self {
            ColourSpecificationMethods::EnumeratedColourSpace { .. } => {
                METHOD_ENUMERATED_COLOUR_SPACE
            }
            ColourSpecificationMethods::RestrictedICCProfile { .. } => {
                METHOD_RESTRICTED_ICC_PROFILE
            }
            ColourSpecificationMethods::AnyICCProfile { .. } => METHOD_ANY_ICC_PROFILE,
            ColourSpecificationMethods::VendorColourMethod { .. } => METHOD_VENDOR_COLOUR,
            ColourSpecificationMethods::ParameterizedColourspace { .. } => {
                METHOD_PARAMETERIZED_COLOUR_SPACE
            }
            ColourSpecificationMethods::Reserved { value } => *value,
        }
    }

    /// Embedded ICC profile bytes, for the two ICC methods.
    pub fn profile_data(&self) -> Option<&[u8]> {
        match self {
            ColourSpecificationMethods::RestrictedICCProfile { profile_data }
            | ColourSpecificationMethods::AnyICCProfile { profile_data } => Some(profile_data),
            _ => None,
        }
    }
}

impl fmt::Display for ColourSpecificationMethods {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ColourSpecificationMethods::EnumeratedColourSpace { code } => {
                write!(f, "Enumerated colourspace: {}", code)
            }
            ColourSpecificationMethods::RestrictedICCProfile { profile_data } => {
                write!(f, "Restricted ICC Profile ({} bytes)", profile_data.len())
            }
            ColourSpecificationMethods::AnyICCProfile { profile_data } => {
                write!(f, "\"Any\" ICC Profile ({} bytes)", profile_data.len())
            }
            ColourSpecificationMethods::VendorColourMethod { .. } => write!(f, "Vendor method"),
            ColourSpecificationMethods::ParameterizedColourspace {
                colour_primaries,
                transfer_characteristics,
                matrix_coefficients,
                video_full_range,
            } => write!(
                f,
                "Parameterized colourspace: primaries {}, transfer {}, matrix {}, full range {}",
                colour_primaries, transfer_characteristics, matrix_coefficients, video_full_range
            ),
            ColourSpecificationMethods::Reserved { value } => write!(f, "Reserved method {}", value),
        }
    }
}

/// Enumerated colourspaces (EnumCS) of ITU-T T.800 and T.801.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumeratedColourSpaces {
    BiLevel,
    YCbCr1,
    YCbCr2,
    YCbCr3,
    PhotoYCC,
    CMY,
    CMYK,
    YCCK,
    /// CIELab, with the optional range and offset parameters
    /// (RL, OL, RA, OA, RB, OB, IL).
    CIELab { parameters: Option<[u32; 7]> },
    BiLevel2,
    sRGB,
    Greyscale,
    sYCC,
    /// CIEJab, with the optional range and offset parameters
    /// (RJ, OJ, RA, OA, RB, OB).
    CIEJab { parameters: Option<[u32; 6]> },
    esRGB,
    ROMMRGB,
    YPbPr112560,
    YPbPr125050,
    esYCC,
    scRGB,
    scRGBGrayScale,
    Reserved { code: u32 },
}

impl EnumeratedColourSpaces {
    fn decode(cursor: &mut ByteCursor) -> Result<Self, JP2Error> {
        let code = cursor.read_u32()?;
        let colour_space = match code {
            0 => EnumeratedColourSpaces::BiLevel,
            1 => EnumeratedColourSpaces::YCbCr1,
            3 => EnumeratedColourSpaces::YCbCr2,
            4 => EnumeratedColourSpaces::YCbCr3,
            9 => EnumeratedColourSpaces::PhotoYCC,
            11 => EnumeratedColourSpaces::CMY,
            12 => EnumeratedColourSpaces::CMYK,
            13 => EnumeratedColourSpaces::YCCK,
            14 => EnumeratedColourSpaces::CIELab {
                parameters: read_parameters(cursor)?,
            },
            15 => EnumeratedColourSpaces::BiLevel2,
            16 => EnumeratedColourSpaces::sRGB,
            17 => EnumeratedColourSpaces::Greyscale,
            18 => EnumeratedColourSpaces::sYCC,
            19 => EnumeratedColourSpaces::CIEJab {
                parameters: read_parameters(cursor)?,
            },
            20 => EnumeratedColourSpaces::esRGB,
            21 => EnumeratedColourSpaces::ROMMRGB,
            22 => EnumeratedColourSpaces::YPbPr112560,
            23 => EnumeratedColourSpaces::YPbPr125050,
            24 => EnumeratedColourSpaces::esYCC,
            25 => EnumeratedColourSpaces::scRGB,
            26 => EnumeratedColourSpaces::scRGBGrayScale,
            _ => EnumeratedColourSpaces::Reserved { code },
        };
        Ok(colour_space)
    }

    pub fn code(&self) -> u32 {
        match self {
            EnumeratedColourSpaces::BiLevel => 0,
            EnumeratedColourSpaces::YCbCr1 => 1,
            EnumeratedColourSpaces::YCbCr2 => 3,
            EnumeratedColourSpaces::YCbCr3 => 4,
            EnumeratedColourSpaces::PhotoYCC => 9,
            EnumeratedColourSpaces::CMY => 11,
            EnumeratedColourSpaces::CMYK => 12,
            EnumeratedColourSpaces::YCCK => 13,
            EnumeratedColourSpaces::CIELab { .. } => 14,
            EnumeratedColourSpaces::BiLevel2 => 15,
            EnumeratedColourSpaces::sRGB => 16,
            EnumeratedColourSpaces::Greyscale => 17,
            EnumeratedColourSpaces::sYCC => 18,
            EnumeratedColourSpaces::CIEJab { .. } => 19,
            EnumeratedColourSpaces::esRGB => 20,
            EnumeratedColourSpaces::ROMMRGB => 21,
            EnumeratedColourSpaces::YPbPr112560 => 22,
            EnumeratedColourSpaces::YPbPr125050 => 23,
            EnumeratedColourSpaces::esYCC => 24,
            EnumeratedColourSpaces::scRGB => 25,
            EnumeratedColourSpaces::scRGBGrayScale => 26,
            EnumeratedColourSpaces::Reserved { code } => *code,
        }
    }
}

// EP fields are either all present or all absent.
fn read_parameters<const N: usize>(cursor: &mut ByteCursor) -> Result<Option<[u32; N]>, JP2Error> {
    if cursor.remaining() < 4 * N as u64 {
        return Ok(None);
    }
    let mut parameters = [0u32; N];
    for parameter in parameters.iter_mut() {
        *parameter = cursor.read_u32()?;
    }
    Ok(Some(parameters))
}

impl fmt::Display for EnumeratedColourSpaces {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnumeratedColourSpaces::BiLevel => "Bi-level",
            EnumeratedColourSpaces::YCbCr1 => "YCbCr(1)",
            EnumeratedColourSpaces::YCbCr2 => "YCbCr(2)",
            EnumeratedColourSpaces::YCbCr3 => "YCbCr(3)",
            EnumeratedColourSpaces::PhotoYCC => "PhotoYCC",
            EnumeratedColourSpaces::CMY => "CMY",
            EnumeratedColourSpaces::CMYK => "CMYK",
            EnumeratedColourSpaces::YCCK => "YCCK",
            EnumeratedColourSpaces::CIELab { .. } => "CIELab",
            EnumeratedColourSpaces::BiLevel2 => "Bi-level(2)",
            EnumeratedColourSpaces::sRGB => "sRGB",
            EnumeratedColourSpaces::Greyscale => "greyscale",
            EnumeratedColourSpaces::sYCC => "sYCC",
            EnumeratedColourSpaces::CIEJab { .. } => "CIEJab",
            EnumeratedColourSpaces::esRGB => "e-sRGB",
            EnumeratedColourSpaces::ROMMRGB => "ROMM-RGB",
            EnumeratedColourSpaces::YPbPr112560 => "YPbPr(1125/60)",
            EnumeratedColourSpaces::YPbPr125050 => "YPbPr(1250/50)",
            EnumeratedColourSpaces::esYCC => "e-sYCC",
            EnumeratedColourSpaces::scRGB => "scRGB",
            EnumeratedColourSpaces::scRGBGrayScale => "scRGB gray scale",
            EnumeratedColourSpaces::Reserved { code } => return write!(f, "Reserved ({})", code),
        };
        write!(f, "{}", name)
    }
}

/// Colour Specification box.
///
/// Each Colour Specification box defines one method by which an application
/// can interpret the colourspace of the decompressed image data. A file may
/// hold several; readers pick the first one they support unless PREC says
/// otherwise (T.801).
///
/// For more information, see ISO/IEC 15444-1 | ITU T-800 Appendix I.5.3.3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColourSpecificationBox {
    length: u64,
    offset: u64,
    method: ColourSpecificationMethods,
    precedence: u8,
    colourspace_approximation: u8,
    profile: Option<Result<IccProfile, IccError>>,
}

impl ColourSpecificationBox {
    pub(crate) fn at(offset: u64, length: u64) -> ColourSpecificationBox {
        ColourSpecificationBox {
            length,
            offset,
            method: ColourSpecificationMethods::Reserved { value: 0 },
            precedence: 0,
            colourspace_approximation: 0,
            profile: None,
        }
    }

    pub fn method(&self) -> &ColourSpecificationMethods {
        &self.method
    }

    pub fn method_kind(&self) -> ColourMethod {
        self.method.kind()
    }

    /// Precedence (PREC). Shall be 0 in JP2 files.
    pub fn precedence(&self) -> i8 {
        self.precedence as i8
    }

    /// Colourspace approximation (APPROX). Shall be 0 in JP2 files.
    pub fn colourspace_approximation(&self) -> u8 {
        self.colourspace_approximation
    }

    /// Header and description of the embedded ICC profile, when it decodes.
    pub fn icc_profile(&self) -> Option<&IccProfile> {
        self.profile.as_ref().and_then(|profile| profile.as_ref().ok())
    }

    /// Why the embedded ICC profile did not decode.
    pub fn icc_profile_error(&self) -> Option<&IccError> {
        self.profile.as_ref().and_then(|profile| profile.as_ref().err())
    }
}

impl JBox for ColourSpecificationBox {
    // The type of a Colour Specification box shall be 'colr' (0x636F 6C72).
    fn identifier(&self) -> BoxType {
        BOX_TYPE_COLOUR_SPECIFICATION
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn offset(&self) -> u64 {
        self.offset
    }

    fn decode(&mut self, cursor: &mut ByteCursor) -> Result<(), JP2Error> {
        let method = cursor.read_u8()?;
        self.precedence = cursor.read_u8()?;
        self.colourspace_approximation = cursor.read_u8()?;

        debug!("Method {:?}", method);
        debug!("Precedence {:?}", self.precedence());
        debug!(
            "ColourSpace Approximation {:?}",
            self.colourspace_approximation()
        );

        self.method = match method {
            METHOD_ENUMERATED_COLOUR_SPACE => ColourSpecificationMethods::EnumeratedColourSpace {
                code: EnumeratedColourSpaces::decode(cursor)?,
            },
            // The PROFILE field is the last field in the box.
            METHOD_RESTRICTED_ICC_PROFILE => ColourSpecificationMethods::RestrictedICCProfile {
                profile_data: cursor.rest().to_vec(),
            },
            METHOD_ANY_ICC_PROFILE => ColourSpecificationMethods::AnyICCProfile {
                profile_data: cursor.rest().to_vec(),
            },
            METHOD_VENDOR_COLOUR => ColourSpecificationMethods::VendorColourMethod {
                vendor_defined_code: cursor.read_array::<16>()?,
                vendor_parameters: cursor.rest().to_vec(),
            },
            METHOD_PARAMETERIZED_COLOUR_SPACE => {
                let colour_primaries = cursor.read_u16()?;
                let transfer_characteristics = cursor.read_u16()?;
                let matrix_coefficients = cursor.read_u16()?;
                let flags = cursor.read_u8()?;
                ColourSpecificationMethods::ParameterizedColourspace {
                    colour_primaries,
                    transfer_characteristics,
                    matrix_coefficients,
                    video_full_range: flags & 0x80 == 0x80,
                }
            }
            value => {
                warn!("Reserved colour specification method {}", value);
                ColourSpecificationMethods::Reserved { value }
            }
        };

        self.profile = self.method.profile_data().map(decode_profile);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &[u8]) -> Result<ColourSpecificationBox, JP2Error> {
        let mut colour_specification_box = ColourSpecificationBox::at(0, input.len() as u64 + 8);
        colour_specification_box.decode(&mut ByteCursor::with_base(input, 8))?;
        Ok(colour_specification_box)
    }

    #[test]
    fn parse_enumerated_colourspace() -> Result<(), JP2Error> {
        let colour_specification_box = decode(&[0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10])?;
        assert_eq!(
            *colour_specification_box.method(),
            ColourSpecificationMethods::EnumeratedColourSpace {
                code: EnumeratedColourSpaces::sRGB
            }
        );
        assert_eq!(colour_specification_box.method_kind(), ColourMethod::Enumerated);
        assert_eq!(colour_specification_box.colourspace_approximation(), 0);
        assert_eq!(colour_specification_box.precedence(), 0);
        assert!(colour_specification_box.icc_profile().is_none());
        Ok(())
    }

    #[test]
    fn parse_enumerated_colourspace_approx() -> Result<(), JP2Error> {
        let colour_specification_box = decode(&[0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x12])?;
        assert_eq!(
            *colour_specification_box.method(),
            ColourSpecificationMethods::EnumeratedColourSpace {
                code: EnumeratedColourSpaces::sYCC
            }
        );
        assert_eq!(colour_specification_box.colourspace_approximation(), 1);
        Ok(())
    }

    #[test]
    fn parse_cielab_with_and_without_parameters() -> Result<(), JP2Error> {
        let colour_specification_box = decode(&[0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0E])?;
        assert_eq!(
            *colour_specification_box.method(),
            ColourSpecificationMethods::EnumeratedColourSpace {
                code: EnumeratedColourSpaces::CIELab { parameters: None }
            }
        );

        let mut input = vec![0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0E];
        for value in 1u32..=7 {
            input.extend_from_slice(&value.to_be_bytes());
        }
        let colour_specification_box = decode(&input)?;
        assert_eq!(
            *colour_specification_box.method(),
            ColourSpecificationMethods::EnumeratedColourSpace {
                code: EnumeratedColourSpaces::CIELab {
                    parameters: Some([1, 2, 3, 4, 5, 6, 7])
                }
            }
        );
        Ok(())
    }

    #[test]
    fn parse_restricted_icc_colourspace() -> Result<(), JP2Error> {
        let colour_specification_box = decode(&[0x02, 0x03, 0x04, 0x01, 0x02, 0x04, 0xFF])?;
        assert_eq!(
            *colour_specification_box.method(),
            ColourSpecificationMethods::RestrictedICCProfile {
                profile_data: vec![0x01, 0x02, 0x04, 0xFF]
            }
        );
        assert_eq!(colour_specification_box.colourspace_approximation(), 4);
        assert_eq!(colour_specification_box.precedence(), 3);
        // Four bytes are not a profile.
        assert!(matches!(
            colour_specification_box.icc_profile_error(),
            Some(IccError::TooShort { length: 4, .. })
        ));
        Ok(())
    }

    #[test]
    fn parse_any_icc_colourspace() -> Result<(), JP2Error> {
        let colour_specification_box = decode(&[0x03, 0x00, 0x02, 0x01, 0x02, 0x04, 0xFF])?;
        assert_eq!(colour_specification_box.method_kind(), ColourMethod::AnyICC);
        assert_eq!(
            colour_specification_box.method().profile_data(),
            Some(&[0x01, 0x02, 0x04, 0xFF][..])
        );
        Ok(())
    }

    #[test]
    fn parse_vendor_colourspace() -> Result<(), JP2Error> {
        let mut input = vec![0x04, 0x00, 0x00];
        input.extend_from_slice(&[0xAB; 16]);
        input.extend_from_slice(&[0x01, 0x02]);
        let colour_specification_box = decode(&input)?;
        assert_eq!(
            *colour_specification_box.method(),
            ColourSpecificationMethods::VendorColourMethod {
                vendor_defined_code: [0xAB; 16],
                vendor_parameters: vec![0x01, 0x02]
            }
        );
        Ok(())
    }

    #[test]
    fn parse_parameterized_colourspace() -> Result<(), JP2Error> {
        let colour_specification_box =
            decode(&[0x05, 0x01, 0x02, 0x00, 0x01, 0x00, 0x02, 0x00, 0x03, 0x80])?;
        assert_eq!(
            *colour_specification_box.method(),
            ColourSpecificationMethods::ParameterizedColourspace {
                colour_primaries: 1,
                transfer_characteristics: 2,
                matrix_coefficients: 3,
                video_full_range: true,
            }
        );
        assert_eq!(colour_specification_box.precedence(), 1);
        Ok(())
    }

    #[test]
    fn parse_reserved_method() -> Result<(), JP2Error> {
        let colour_specification_box = decode(&[0x09, 0x00, 0x00])?;
        assert_eq!(colour_specification_box.method_kind(), ColourMethod::Reserved);
        assert_eq!(colour_specification_box.method().encoded_meth(), 9);
        Ok(())
    }

    #[test]
    fn parse_short_box() {
        assert!(matches!(
            decode(&[0x01, 0x00, 0x00, 0x00]),
            Err(JP2Error::Cursor(_))
        ));
    }
}
