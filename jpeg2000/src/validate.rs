//! Conformance rules applied to a parsed file.
//!
//! Rules run after the structural model is complete. They only add
//! warnings; they never change the model.

use jp2::{ColourMethod, ColourSpecificationBox, JBox, JP2File, BRAND_JP2};
use jpc::{record, Codestream, Issue, IssueKind};
use log::debug;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::Root;

/// Version of the decode engine the parsed files are handed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CodecVersion {
    pub major: u16,
    pub minor: u16,
}

impl CodecVersion {
    pub const fn new(major: u16, minor: u16) -> CodecVersion {
        CodecVersion { major, minor }
    }
}

impl fmt::Display for CodecVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid codec version {0:?}, expected MAJOR.MINOR[.PATCH]")]
pub struct ParseVersionError(String);

impl FromStr for CodecVersion {
    type Err = ParseVersionError;

    /// Parses version strings such as `2.5.0`; anything after the minor
    /// version is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('.');
        let mut number = || -> Option<u16> {
            let part = parts.next()?;
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        };
        match (number(), number()) {
            (Some(major), Some(minor)) => Ok(CodecVersion::new(major, minor)),
            _ => Err(ParseVersionError(s.to_owned())),
        }
    }
}

/// A conformance rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rule {
    /// A codestream that does not end with EOC carries a
    /// `TruncatedCodestream` warning.
    Truncation,
    /// A file with the `jp2 ` brand does not use the Any ICC method.
    BrandIccCompatibility,
    /// Restricted and Any ICC Colour Specification boxes describe the same
    /// profile.
    ConflictingColourSpecifications,
}

pub const RULES: [Rule; 3] = [
    Rule::Truncation,
    Rule::BrandIccCompatibility,
    Rule::ConflictingColourSpecifications,
];

impl Rule {
    /// Oldest decode engine the rule applies to, `None` for every version.
    ///
    /// Older engines silently decode what is present of a truncated
    /// codestream, so truncation is only reported to 1.4 and later. When the
    /// rule is disabled, [`parse_with_options`](crate::parse_with_options)
    /// also withholds the truncation issues recorded while reading.
    pub fn minimum_codec_version(&self) -> Option<CodecVersion> {
        match self {
            Rule::Truncation => Some(CodecVersion::new(1, 4)),
            Rule::BrandIccCompatibility | Rule::ConflictingColourSpecifications => None,
        }
    }
}

/// Capabilities the rule set is evaluated against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Version of the decode engine. `None` enables every rule.
    pub codec_version: Option<CodecVersion>,
}

impl ValidatorConfig {
    pub fn for_codec(codec_version: CodecVersion) -> ValidatorConfig {
        ValidatorConfig {
            codec_version: Some(codec_version),
        }
    }

    pub fn enables(&self, rule: Rule) -> bool {
        match (self.codec_version, rule.minimum_codec_version()) {
            (Some(version), Some(minimum)) => version >= minimum,
            _ => true,
        }
    }
}

/// Applies every enabled rule to `root`. `issues` are those already recorded
/// while reading; the returned issues are the new ones.
pub fn validate(root: &Root, issues: &[Issue], config: &ValidatorConfig) -> Vec<Issue> {
    let mut found = vec![];
    for rule in RULES.iter().copied().filter(|&rule| config.enables(rule)) {
        debug!("Applying rule {:?}", rule);
        match rule {
            Rule::Truncation => check_truncation(root, issues, &mut found),
            Rule::BrandIccCompatibility => {
                if let Root::Container(file) = root {
                    check_brand_icc_compatibility(file, &mut found);
                }
            }
            Rule::ConflictingColourSpecifications => {
                if let Root::Container(file) = root {
                    check_conflicting_colour_specifications(file, &mut found);
                }
            }
        }
    }
    found
}

fn check_truncation(root: &Root, issues: &[Issue], found: &mut Vec<Issue>) {
    let codestreams: Vec<&Codestream> = match root {
        Root::Codestream(codestream) => vec![codestream],
        Root::Container(file) => file.contiguous_codestreams(),
    };
    for codestream in codestreams.into_iter().filter(|c| c.is_truncated()) {
        let start = codestream.offset();
        let end = start + codestream.length();
        let reported = issues.iter().any(|issue| {
            issue.kind() == IssueKind::TruncatedCodestream
                && issue.offset().map_or(false, |o| o >= start && o <= end)
        });
        if !reported {
            record(
                found,
                Issue::new(
                    IssueKind::TruncatedCodestream,
                    Some(end),
                    "codestream does not end with an EOC marker",
                ),
            );
        }
    }
}

fn is_jp2_brand(file: &JP2File) -> bool {
    file.file_type_box()
        .map_or(false, |file_type| file_type.brand() == BRAND_JP2)
}

fn check_brand_icc_compatibility(file: &JP2File, found: &mut Vec<Issue>) {
    if !is_jp2_brand(file) {
        return;
    }
    for colour_specification in file.colour_specification_boxes() {
        if colour_specification.method_kind() == ColourMethod::AnyICC {
            record(
                found,
                Issue::new(
                    IssueKind::IncompatibleBrandForICCMethod,
                    Some(colour_specification.offset()),
                    "'jp2 ' brand with an Any ICC colour specification, only allowed in JPX files",
                ),
            );
        }
    }
}

fn same_profile(restricted: &ColourSpecificationBox, any: &ColourSpecificationBox) -> bool {
    match (restricted.icc_profile(), any.icc_profile()) {
        (Some(a), Some(b)) => {
            a.device_class() == b.device_class() && a.description() == b.description()
        }
        _ => restricted.method().profile_data() == any.method().profile_data(),
    }
}

fn check_conflicting_colour_specifications(file: &JP2File, found: &mut Vec<Issue>) {
    let colour_specifications = file.colour_specification_boxes();
    if colour_specifications.len() < 2 {
        return;
    }
    let restricted = colour_specifications
        .iter()
        .filter(|c| c.method_kind() == ColourMethod::RestrictedICC);
    for restricted in restricted {
        let conflicting = colour_specifications
            .iter()
            .filter(|c| c.method_kind() == ColourMethod::AnyICC)
            .find(|any| !same_profile(restricted, any));
        if let Some(any) = conflicting {
            record(
                found,
                Issue::new(
                    IssueKind::ConflictingColourSpecifications,
                    Some(any.offset()),
                    format!(
                        "Any ICC profile differs from the Restricted ICC profile at offset {}",
                        restricted.offset()
                    ),
                ),
            );
            return;
        }
    }
}

/// True when `colour_specification` is usable by a reader of the file's brand.
pub fn is_conformant(file: &JP2File, colour_specification: &ColourSpecificationBox) -> bool {
    match colour_specification.method_kind() {
        ColourMethod::Enumerated | ColourMethod::RestrictedICC => true,
        ColourMethod::Reserved => false,
        ColourMethod::AnyICC | ColourMethod::VendorColour | ColourMethod::Parameterized => {
            !is_jp2_brand(file)
        }
    }
}

/// The first conformant Colour Specification box of the file.
pub fn authoritative_colour_specification(file: &JP2File) -> Option<&ColourSpecificationBox> {
    file.colour_specification_boxes()
        .iter()
        .find(|c| is_conformant(file, c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_codec_version() {
        assert_eq!("2.5.0".parse::<CodecVersion>(), Ok(CodecVersion::new(2, 5)));
        assert_eq!("1.4".parse::<CodecVersion>(), Ok(CodecVersion::new(1, 4)));
        assert_eq!(
            " 2.3.1-dev ".parse::<CodecVersion>(),
            Ok(CodecVersion::new(2, 3))
        );
        assert!("2".parse::<CodecVersion>().is_err());
        assert!("openjpeg".parse::<CodecVersion>().is_err());
    }

    #[test]
    fn test_codec_version_ordering() {
        assert!(CodecVersion::new(1, 10) > CodecVersion::new(1, 4));
        assert!(CodecVersion::new(2, 0) > CodecVersion::new(1, 99));
        assert_eq!(CodecVersion::new(2, 5).to_string(), "2.5");
    }

    #[test]
    fn test_rule_gating() {
        let config = ValidatorConfig::default();
        assert!(RULES.iter().all(|&rule| config.enables(rule)));

        let old = ValidatorConfig::for_codec(CodecVersion::new(1, 3));
        assert!(!old.enables(Rule::Truncation));
        assert!(old.enables(Rule::BrandIccCompatibility));
        assert!(old.enables(Rule::ConflictingColourSpecifications));

        let current = ValidatorConfig::for_codec(CodecVersion::new(1, 4));
        assert!(current.enables(Rule::Truncation));
    }
}
