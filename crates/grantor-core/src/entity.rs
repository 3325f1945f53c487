use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UserId(i64);

impl UserId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RoleId(i64);

impl RoleId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for RoleId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PermissionId(i64);

impl PermissionId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for PermissionId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for PermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entity categories, used to qualify duplicate/missing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Role,
    Permission,
    UserRole,
    RolePermission,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::User => "user",
            EntityKind::Role => "role",
            EntityKind::Permission => "permission",
            EntityKind::UserRole => "user-role",
            EntityKind::RolePermission => "role-permission",
        };
        write!(f, "{label}")
    }
}

/// Creation/modification timestamp pair. Stamped by the service layer
/// before every write; stores persist these verbatim and never generate
/// their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stamp {
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Stamp {
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            last_modified: now,
        }
    }

    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            created_at: instant,
            last_modified: instant,
        }
    }

    pub fn touched(&self, instant: DateTime<Utc>) -> Self {
        Self {
            created_at: self.created_at,
            last_modified: instant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    /// PHC-formatted credential digest.
    pub credential: String,
    /// Per-user random salt, stored alongside the digest.
    pub salt: String,
    pub stamp: Stamp,
}

impl UserRecord {
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            name: self.name.clone(),
            created_at: self.stamp.created_at,
            last_modified: self.stamp.last_modified,
        }
    }
}

/// User projection without credential material, safe to serialize outward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleRecord {
    pub id: RoleId,
    pub name: String,
    pub stamp: Stamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionRecord {
    pub id: PermissionId,
    pub name: String,
    pub stamp: Stamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRole {
    pub user_id: UserId,
    pub role_id: RoleId,
    pub stamp: Stamp,
}

impl UserRole {
    pub fn new(user_id: UserId, role_id: RoleId, stamp: Stamp) -> Self {
        Self {
            user_id,
            role_id,
            stamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePermission {
    pub role_id: RoleId,
    pub permission_id: PermissionId,
    pub stamp: Stamp,
}

impl RolePermission {
    pub fn new(role_id: RoleId, permission_id: PermissionId, stamp: Stamp) -> Self {
        Self {
            role_id,
            permission_id,
            stamp,
        }
    }
}

/// Insert payload for a user; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserWrite {
    pub name: String,
    pub credential: String,
    pub salt: String,
    pub stamp: Stamp,
}

impl UserWrite {
    pub fn new(
        name: impl Into<String>,
        credential: impl Into<String>,
        salt: impl Into<String>,
        stamp: Stamp,
    ) -> Self {
        Self {
            name: name.into(),
            credential: credential.into(),
            salt: salt.into(),
            stamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleWrite {
    pub name: String,
    pub stamp: Stamp,
}

impl RoleWrite {
    pub fn new(name: impl Into<String>, stamp: Stamp) -> Self {
        Self {
            name: name.into(),
            stamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionWrite {
    pub name: String,
    pub stamp: Stamp,
}

impl PermissionWrite {
    pub fn new(name: impl Into<String>, stamp: Stamp) -> Self {
        Self {
            name: name.into(),
            stamp,
        }
    }
}
