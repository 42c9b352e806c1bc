use std::fmt;

const MARKER_SOC: u16 = 0xFF4F;
const MARKER_CAP: u16 = 0xFF50;
const MARKER_SIZ: u16 = 0xFF51;
const MARKER_COD: u16 = 0xFF52;
const MARKER_COC: u16 = 0xFF53;
const MARKER_TLM: u16 = 0xFF55;
const MARKER_PRF: u16 = 0xFF56;
const MARKER_PLM: u16 = 0xFF57;
const MARKER_PLT: u16 = 0xFF58;
const MARKER_CPF: u16 = 0xFF59;
const MARKER_QCD: u16 = 0xFF5C;
const MARKER_QCC: u16 = 0xFF5D;
const MARKER_RGN: u16 = 0xFF5E;
const MARKER_POC: u16 = 0xFF5F;
const MARKER_PPM: u16 = 0xFF60;
const MARKER_PPT: u16 = 0xFF61;
const MARKER_CRG: u16 = 0xFF63;
const MARKER_COM: u16 = 0xFF64;

// ITU-T T.801 | ISO/IEC 15444-2 extensions.
const MARKER_DCO: u16 = 0xFF70;
const MARKER_VMS: u16 = 0xFF71;
const MARKER_DFS: u16 = 0xFF72;
const MARKER_ADS: u16 = 0xFF73;
const MARKER_MCT: u16 = 0xFF74;
const MARKER_MCC: u16 = 0xFF75;
const MARKER_NLT: u16 = 0xFF76;
const MARKER_MCO: u16 = 0xFF77;
const MARKER_CBD: u16 = 0xFF78;
const MARKER_ATK: u16 = 0xFF79;

const MARKER_SOT: u16 = 0xFF90;
const MARKER_SOP: u16 = 0xFF91;
const MARKER_EPH: u16 = 0xFF92;
const MARKER_SOD: u16 = 0xFF93;
const MARKER_EOC: u16 = 0xFFD9;

// 0xFF30 - 0xFF3F are reserved for markers without marker parameters.
const MARKER_RESERVED_FIRST: u16 = 0xFF30;
const MARKER_RESERVED_LAST: u16 = 0xFF3F;

/// Marker codes (ITU-T T.800 | ISO/IEC 15444-1 Table A.2, and the
/// ITU-T T.801 | ISO/IEC 15444-2 additions).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MarkerId {
    /// Start of codestream.
    SOC,
    /// Extended capabilities (ITU-T T.814 | ISO/IEC 15444-15).
    CAP,
    /// Image and tile size.
    SIZ,
    /// Coding style default.
    COD,
    /// Coding style component.
    COC,
    /// Tile-part lengths.
    TLM,
    /// Profile.
    PRF,
    /// Packet length, main header.
    PLM,
    /// Packet length, tile-part header.
    PLT,
    /// Corresponding profile.
    CPF,
    /// Quantization default.
    QCD,
    /// Quantization component.
    QCC,
    /// Region-of-interest.
    RGN,
    /// Progression order change.
    POC,
    /// Packed packet headers, main header.
    PPM,
    /// Packed packet headers, tile-part header.
    PPT,
    /// Component registration.
    CRG,
    /// Comment.
    COM,
    /// Variable DC offset (ITU-T T.801 | ISO/IEC 15444-2).
    DCO,
    /// Visual masking.
    VMS,
    /// Downsampling factor styles.
    DFS,
    /// Arbitrary decomposition styles.
    ADS,
    /// Multiple component transformation definition.
    MCT,
    /// Multiple component transform collection.
    MCC,
    /// Non-linearity point transformation.
    NLT,
    /// Multiple component transform ordering.
    MCO,
    /// Component bit depth definition.
    CBD,
    /// Arbitrary transformation kernels.
    ATK,
    /// Start of tile-part.
    SOT,
    /// Start of packet.
    SOP,
    /// End of packet header.
    EPH,
    /// Start of data.
    SOD,
    /// End of codestream.
    EOC,
    /// Reserved marker without parameters (0xFF30 - 0xFF3F).
    Reserved(u16),
    /// Anything else.
    Unknown(u16),
}

impl MarkerId {
    pub fn new(code: u16) -> MarkerId {
        match code {
            MARKER_SOC => MarkerId::SOC,
            MARKER_CAP => MarkerId::CAP,
            MARKER_SIZ => MarkerId::SIZ,
            MARKER_COD => MarkerId::COD,
            MARKER_COC => MarkerId::COC,
            MARKER_TLM => MarkerId::TLM,
            MARKER_PRF => MarkerId::PRF,
            MARKER_PLM => MarkerId::PLM,
            MARKER_PLT => MarkerId::PLT,
            MARKER_CPF => MarkerId::CPF,
            MARKER_QCD => MarkerId::QCD,
            MARKER_QCC => MarkerId::QCC,
            MARKER_RGN => MarkerId::RGN,
            MARKER_POC => MarkerId::POC,
            MARKER_PPM => MarkerId::PPM,
            MARKER_PPT => MarkerId::PPT,
            MARKER_CRG => MarkerId::CRG,
            MARKER_COM => MarkerId::COM,
            MARKER_DCO => MarkerId::DCO,
            MARKER_VMS => MarkerId::VMS,
            MARKER_DFS => MarkerId::DFS,
            MARKER_ADS => MarkerId::ADS,
            MARKER_MCT => MarkerId::MCT,
            MARKER_MCC => MarkerId::MCC,
            MARKER_NLT => MarkerId::NLT,
            MARKER_MCO => MarkerId::MCO,
            MARKER_CBD => MarkerId::CBD,
            MARKER_ATK => MarkerId::ATK,
            MARKER_SOT => MarkerId::SOT,
            MARKER_SOP => MarkerId::SOP,
            MARKER_EPH => MarkerId::EPH,
            MARKER_SOD => MarkerId::SOD,
            MARKER_EOC => MarkerId::EOC,
            MARKER_RESERVED_FIRST..=MARKER_RESERVED_LAST => MarkerId::Reserved(code),
            _ => MarkerId::Unknown(code),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            MarkerId::SOC => MARKER_SOC,
            MarkerId::CAP => MARKER_CAP,
            MarkerId::SIZ => MARKER_SIZ,
            MarkerId::COD => MARKER_COD,
            MarkerId::COC => MARKER_COC,
            MarkerId::TLM => MARKER_TLM,
            MarkerId::PRF => MARKER_PRF,
            MarkerId::PLM => MARKER_PLM,
            MarkerId::PLT => MARKER_PLT,
            MarkerId::CPF => MARKER_CPF,
            MarkerId::QCD => MARKER_QCD,
            MarkerId::QCC => MARKER_QCC,
            MarkerId::RGN => MARKER_RGN,
            MarkerId::POC => MARKER_POC,
            MarkerId::PPM => MARKER_PPM,
            MarkerId::PPT => MARKER_PPT,
            MarkerId::CRG => MARKER_CRG,
            MarkerId::COM => MARKER_COM,
            MarkerId::DCO => MARKER_DCO,
            MarkerId::VMS => MARKER_VMS,
            MarkerId::DFS => MARKER_DFS,
            MarkerId::ADS => MARKER_ADS,
            MarkerId::MCT => MARKER_MCT,
            MarkerId::MCC => MARKER_MCC,
            MarkerId::NLT => MARKER_NLT,
            MarkerId::MCO => MARKER_MCO,
            MarkerId::CBD => MARKER_CBD,
            MarkerId::ATK => MARKER_ATK,
            MarkerId::SOT => MARKER_SOT,
            MarkerId::SOP => MARKER_SOP,
            MarkerId::EPH => MARKER_EPH,
            MarkerId::SOD => MARKER_SOD,
            MarkerId::EOC => MARKER_EOC,
            MarkerId::Reserved(code) | MarkerId::Unknown(code) => *code,
        }
    }

    /// Delimiting markers carry no length field and no parameters.
    pub fn is_delimiting(&self) -> bool {
        matches!(
            self,
            MarkerId::SOC | MarkerId::SOD | MarkerId::EOC | MarkerId::EPH | MarkerId::Reserved(_)
        )
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, MarkerId::Unknown(_))
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MarkerId::Reserved(code) => write!(f, "reserved 0x{:04X}", code),
            MarkerId::Unknown(code) => write!(f, "unknown 0x{:04X}", code),
            _ => write!(f, "{:?}", self),
        }
    }
}
