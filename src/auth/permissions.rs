use anyhow::Error;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewOwnProfile,
    EditOwnProfile,
    ManageOwnData,

    ManageUsers,
    ViewActivity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Role {
    #[default]
    User,
    Private,
    Admin,
}

static USER_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewOwnProfile);
    permissions.insert(Permission::EditOwnProfile);
    permissions.insert(Permission::ManageOwnData);

    permissions
});

static ADMIN_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(USER_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ManageUsers);
    permissions.insert(Permission::ViewActivity);

    permissions
});

impl Role {
    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::User | Role::Private => &USER_PERMISSIONS,
            Role::Admin => &ADMIN_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Private => "Private",
            Role::Admin => "Admin",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "private" => Ok(Role::Private),
            "admin" => Ok(Role::Admin),
            _ => Err(Error::msg(format!("Unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feature areas a user can be restricted to. An empty permission list on
/// the user record means every widget is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Widget {
    Notes,
    Habits,
    Goals,
    TimeTracker,
    Pdfs,
}

impl Widget {
    pub const ALL: [Widget; 5] = [
        Widget::Notes,
        Widget::Habits,
        Widget::Goals,
        Widget::TimeTracker,
        Widget::Pdfs,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Widget::Notes => "notes",
            Widget::Habits => "habits",
            Widget::Goals => "goals",
            Widget::TimeTracker => "time_tracker",
            Widget::Pdfs => "pdfs",
        }
    }

    pub fn from_key(key: &str) -> Option<Widget> {
        Widget::ALL.into_iter().find(|w| w.key() == key.trim())
    }
}
