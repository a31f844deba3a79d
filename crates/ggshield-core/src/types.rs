use serde::{Deserialize, Serialize};

/// Git file mode, derived from the status letters of a raw diff header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Filemode {
    /// Content scanned from the filesystem, not from a patch.
    #[default]
    File,
    New,
    Delete,
    Modify,
    Rename,
    PermissionChange,
    Unknown,
}

impl Filemode {
    /// Stable uppercase name, used in structured output.
    pub fn as_name(self) -> &'static str {
        match self {
            Filemode::File => "FILE",
            Filemode::New => "NEW",
            Filemode::Delete => "DELETE",
            Filemode::Modify => "MODIFY",
            Filemode::Rename => "RENAME",
            Filemode::PermissionChange => "PERMISSION_CHANGE",
            Filemode::Unknown => "UNKNOWN",
        }
    }

    /// Human-readable form for text reports.
    pub fn describe(self) -> &'static str {
        match self {
            Filemode::File => "file",
            Filemode::New => "new file",
            Filemode::Delete => "deleted file",
            Filemode::Modify => "modified file",
            Filemode::Rename => "renamed file",
            Filemode::PermissionChange => "permission changed",
            Filemode::Unknown => "unknown",
        }
    }

    /// Combine the status letters of a raw diff header into one mode.
    ///
    /// There is one letter per commit parent. For a merge, a path can be
    /// deleted on one side and modified on the other; the end result
    /// contains modifications, so `M` wins over everything, and `D` only
    /// applies when no other letter claims the path.
    pub fn from_status_letters(status: &str) -> Option<Self> {
        if status.contains('M') {
            Some(Filemode::Modify)
        } else if status.contains('C') || status.contains('A') {
            Some(Filemode::New)
        } else if status.contains('T') {
            Some(Filemode::PermissionChange)
        } else if status.contains('R') {
            Some(Filemode::Rename)
        } else if status.contains('D') {
            Some(Filemode::Delete)
        } else {
            None
        }
    }
}
