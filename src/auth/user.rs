use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::models::UserRecord;

use super::{Permission, Role, Widget};

/// The account as exposed over the API. Never carries hashes.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub age: Option<i32>,
    pub course: String,
    pub role: Role,
    pub has_pin: bool,
    pub widget_permissions: Vec<String>,
}

impl From<&UserRecord> for User {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email.clone(),
            name: record.name.clone(),
            age: record.age,
            course: record.course.clone(),
            role: record.role,
            has_pin: record.has_pin(),
            widget_permissions: record.widget_permissions.clone(),
        }
    }
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        User::from(&record)
    }
}

impl User {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    pub fn require_permission(&self, permission: Permission) -> Result<(), Status> {
        if self.role.has_permission(permission) {
            Ok(())
        } else {
            tracing::warn!(
                email = %self.email,
                role = %self.role.as_str(),
                permission = ?permission,
                "Permission denied"
            );
            Err(Status::Forbidden)
        }
    }

    pub fn can_use_widget(&self, widget: Widget) -> bool {
        self.role == Role::Admin
            || self.widget_permissions.is_empty()
            || self
                .widget_permissions
                .iter()
                .any(|key| Widget::from_key(key) == Some(widget))
    }

    pub fn require_widget(&self, widget: Widget) -> Result<(), Status> {
        if self.can_use_widget(widget) {
            Ok(())
        } else {
            tracing::warn!(
                email = %self.email,
                widget = widget.key(),
                "Widget not enabled for user"
            );
            Err(Status::Forbidden)
        }
    }
}
