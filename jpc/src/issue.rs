//! Nonconformance found while reading a codestream or its container.
//!
//! Recoverable conditions are not errors: they are recorded as an [`Issue`]
//! and reading continues with a best-effort result. Conditions that make the
//! data unusable abort the read with an error type instead.

use log::warn;
use std::fmt;

/// How serious a recorded issue is.
///
/// Only recoverable conditions are recorded, so every [`IssueKind`] is a
/// `Warning`. Conditions that stop a read surface as the reader's error type
/// (`CodestreamError`, `JP2Error`) instead and never appear in an issue
/// list, so no reader in this workspace records an `Error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IssueKind {
    /// The codestream ends before its EOC marker.
    TruncatedCodestream,

    /// A marker code that is not defined by ITU-T T.800 | ISO/IEC 15444-1.
    UnknownMarker,

    /// A box declares more bytes than remain in the file.
    BoxLengthExceedsFile,

    /// A `jp2\040` branded file embeds a colour profile with the "Any ICC" method.
    IncompatibleBrandForICCMethod,

    /// Several colour specifications embed ICC profiles that disagree.
    ConflictingColourSpecifications,

    /// Child boxes do not exactly fill their superbox.
    BoxLengthMismatch,

    /// Boxes nested deeper than the configured limit.
    NestingDepthExceeded,

    /// A box appears somewhere its definition does not allow.
    UnexpectedBoxOrder,

    /// A box that may only appear once appears again.
    DuplicateBox,

    /// A required box is absent.
    MissingBox,

    /// The compatibility list does not contain `jp2\040`.
    NotCompatible,

    /// A box payload is too short for its fixed fields.
    MalformedBox,

    /// An embedded ICC profile could not be decoded.
    MalformedIccProfile,
}

impl IssueKind {
    pub fn severity(&self) -> Severity {
        Severity::Warning
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A single recorded nonconformance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Issue {
    kind: IssueKind,
    offset: Option<u64>,
    detail: String,
}

impl Issue {
    pub fn new(kind: IssueKind, offset: Option<u64>, detail: impl Into<String>) -> Issue {
        Issue {
            kind,
            offset,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> IssueKind {
        self.kind
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    /// Absolute byte offset the issue refers to, when it has one.
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{} at offset {}: {}", self.kind, offset, self.detail),
            None => write!(f, "{}: {}", self.kind, self.detail),
        }
    }
}

/// Records `issue` in `issues` and logs it.
pub fn record(issues: &mut Vec<Issue>, issue: Issue) {
    warn!("{}", issue);
    issues.push(issue);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_offset() {
        let issue = Issue::new(IssueKind::UnknownMarker, Some(42), "marker 0xFF70");
        assert_eq!(format!("{}", issue), "UnknownMarker at offset 42: marker 0xFF70");
        assert_eq!(issue.severity(), Severity::Warning);
    }

    #[test]
    fn test_record_appends() {
        let mut issues = vec![];
        record(
            &mut issues,
            Issue::new(IssueKind::TruncatedCodestream, None, "missing EOC"),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind(), IssueKind::TruncatedCodestream);
        assert_eq!(format!("{}", issues[0]), "TruncatedCodestream: missing EOC");
    }

    #[test]
    fn test_every_kind_is_a_warning() {
        let kinds = [
            IssueKind::TruncatedCodestream,
            IssueKind::UnknownMarker,
            IssueKind::BoxLengthExceedsFile,
            IssueKind::IncompatibleBrandForICCMethod,
            IssueKind::ConflictingColourSpecifications,
            IssueKind::BoxLengthMismatch,
            IssueKind::NestingDepthExceeded,
            IssueKind::UnexpectedBoxOrder,
            IssueKind::DuplicateBox,
            IssueKind::MissingBox,
            IssueKind::NotCompatible,
            IssueKind::MalformedBox,
            IssueKind::MalformedIccProfile,
        ];
        for kind in &kinds {
            assert_eq!(kind.severity(), Severity::Warning, "{}", kind);
        }
    }
}
