use serde::{Deserialize, Serialize};

/// Ordinal access level stored on every link row.
///
/// Holding a level implies every capability gated at a lower level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    None,
    View,
    Edit,
    Share,
    Own,
}

impl Permission {
    /// Maps a stored integer onto a level, clamping out-of-range values.
    pub fn from_level(level: i32) -> Self {
        match level {
            i32::MIN..=0 => Permission::None,
            1 => Permission::View,
            2 => Permission::Edit,
            3 => Permission::Share,
            _ => Permission::Own,
        }
    }

    pub fn level(self) -> i32 {
        match self {
            Permission::None => 0,
            Permission::View => 1,
            Permission::Edit => 2,
            Permission::Share => 3,
            Permission::Own => 4,
        }
    }

    pub fn can_view(self) -> bool {
        self >= Permission::View
    }

    pub fn can_edit(self) -> bool {
        self >= Permission::Edit
    }

    pub fn can_share(self) -> bool {
        self >= Permission::Share
    }

    pub fn is_owner(self) -> bool {
        self == Permission::Own
    }

    /// Highest level a group link may carry.
    pub fn capped_for_group(self) -> Self {
        self.min(Permission::Share)
    }
}

/// A user's standing inside a group. Only members and admins receive the
/// group's collection permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Invited,
    Member,
    Admin,
}

impl GroupRole {
    pub fn from_level(level: i32) -> Option<Self> {
        match level {
            1 => Some(GroupRole::Invited),
            2 => Some(GroupRole::Member),
            3 => Some(GroupRole::Admin),
            _ => None,
        }
    }

    pub fn level(self) -> i32 {
        match self {
            GroupRole::Invited => 1,
            GroupRole::Member => 2,
            GroupRole::Admin => 3,
        }
    }

    pub fn receives_group_permissions(self) -> bool {
        self >= GroupRole::Member
    }
}
