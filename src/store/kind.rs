use std::fmt;

/// The record category stored in a backing file
///
/// Each kind has its own identifier field and its own backing file per
/// format. Comments carry a parent link back to the post they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Parent items (posts)
    Contents,

    /// Child items (comments on a post)
    Comments,
}

impl RecordKind {
    /// The mandatory identifier field for records of this kind
    pub fn id_field(&self) -> &'static str {
        match self {
            Self::Contents => "note_id",
            Self::Comments => "comment_id",
        }
    }

    /// The field on a comment record that links it to its parent post
    pub fn parent_link_field() -> &'static str {
        "note_id"
    }

    /// File-name stem used when deriving backing file paths
    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::Contents => "contents",
            Self::Comments => "comments",
        }
    }

    /// Both record kinds, in the order their indexes are loaded
    pub fn all() -> [Self; 2] {
        [Self::Contents, Self::Comments]
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_stem())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_fields() {
        assert_eq!(RecordKind::Contents.id_field(), "note_id");
        assert_eq!(RecordKind::Comments.id_field(), "comment_id");
    }

    #[test]
    fn test_parent_link_field() {
        assert_eq!(RecordKind::parent_link_field(), "note_id");
    }

    #[test]
    fn test_display_matches_file_stem() {
        for kind in RecordKind::all() {
            assert_eq!(format!("{}", kind), kind.file_stem());
        }
    }
}
