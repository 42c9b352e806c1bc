//! The structural model returned by a parse.

use jp2::{ColourSpecificationBox, FileTypeBox, JP2File};
use jpc::{Codestream, Issue, IssueKind};

use crate::validate::authoritative_colour_specification;

/// What the parsed bytes turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Root {
    /// A raw ITU-T T.800 | ISO/IEC 15444-1 codestream (J2K).
    Codestream(Codestream),
    /// A JP2 or JPX file.
    Container(JP2File),
}

/// Box tree or marker segment list of a file, with everything found wrong
/// with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralModel {
    root: Root,
    issues: Vec<Issue>,
}

impl StructuralModel {
    pub(crate) fn new(root: Root, issues: Vec<Issue>) -> StructuralModel {
        StructuralModel { root, issues }
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    /// Issues in the order they were found, validator issues last.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn count_issues(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|issue| issue.kind() == kind).count()
    }

    pub fn has_issue(&self, kind: IssueKind) -> bool {
        self.count_issues(kind) > 0
    }

    pub fn is_container(&self) -> bool {
        matches!(self.root, Root::Container(_))
    }

    pub fn container(&self) -> Option<&JP2File> {
        match &self.root {
            Root::Container(file) => Some(file),
            Root::Codestream(_) => None,
        }
    }

    /// The raw codestream, or the first Contiguous Codestream box of a
    /// container.
    pub fn codestream(&self) -> Option<&Codestream> {
        match &self.root {
            Root::Codestream(codestream) => Some(codestream),
            Root::Container(file) => file.contiguous_codestreams().into_iter().next(),
        }
    }

    pub fn file_type_box(&self) -> Option<&FileTypeBox> {
        self.container().and_then(|file| file.file_type_box())
    }

    /// Colour Specification box a reader of this file should use.
    pub fn colour_specification(&self) -> Option<&ColourSpecificationBox> {
        self.container().and_then(authoritative_colour_specification)
    }

    pub fn is_truncated(&self) -> bool {
        self.codestream().map_or(false, |c| c.is_truncated())
    }
}
