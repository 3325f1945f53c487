use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use grantor_core::entity::{
    EntityKind, PermissionId, PermissionRecord, PermissionWrite, RoleId, RolePermission,
    RoleRecord, RoleWrite, UserId, UserRecord, UserRole, UserView, UserWrite,
};
use grantor_core::page::{Page, PageRequest};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// A natural-key or relation-pair uniqueness violation. This is the
    /// authoritative duplicate signal; callers translate it, it never
    /// leaks as an internal failure.
    #[error("duplicate key for {0}")]
    DuplicateKey(EntityKind),
    #[error("internal storage error: {0}")]
    Internal(String),
}

pub trait UserStore: Send + Sync {
    fn insert_user(
        &self,
        write: &UserWrite,
    ) -> impl Future<Output = Result<UserId, StorageError>> + Send;

    fn user_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, StorageError>> + Send;

    fn update_user_credential(
        &self,
        id: UserId,
        credential: &str,
        salt: &str,
        last_modified: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Deletes the user and every UserRole row referencing it, atomically.
    fn delete_user_cascade(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn list_users(
        &self,
        page: PageRequest,
    ) -> impl Future<Output = Result<Page<UserView>, StorageError>> + Send;
}

pub trait RoleStore: Send + Sync {
    fn insert_role(
        &self,
        write: &RoleWrite,
    ) -> impl Future<Output = Result<RoleId, StorageError>> + Send;

    fn role_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<RoleRecord>, StorageError>> + Send;

    fn rename_role(
        &self,
        id: RoleId,
        new_name: &str,
        last_modified: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Deletes the role plus every UserRole and RolePermission row
    /// referencing it, atomically.
    fn delete_role_cascade(
        &self,
        id: RoleId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn list_roles(
        &self,
        page: PageRequest,
    ) -> impl Future<Output = Result<Page<RoleRecord>, StorageError>> + Send;
}

pub trait PermissionStore: Send + Sync {
    fn insert_permission(
        &self,
        write: &PermissionWrite,
    ) -> impl Future<Output = Result<PermissionId, StorageError>> + Send;

    fn permission_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<PermissionRecord>, StorageError>> + Send;

    fn rename_permission(
        &self,
        id: PermissionId,
        new_name: &str,
        last_modified: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Deletes the permission plus every RolePermission row referencing
    /// it, atomically.
    fn delete_permission_cascade(
        &self,
        id: PermissionId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn list_permissions(
        &self,
        page: PageRequest,
    ) -> impl Future<Output = Result<Page<PermissionRecord>, StorageError>> + Send;
}

pub trait RelationStore: Send + Sync {
    fn insert_user_role(
        &self,
        relation: &UserRole,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Deleting an absent relation is a silent success.
    fn delete_user_role(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn insert_role_permission(
        &self,
        relation: &RolePermission,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn delete_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn role_names_for_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<BTreeSet<String>, StorageError>> + Send;

    fn permission_names_for_role(
        &self,
        role_id: RoleId,
    ) -> impl Future<Output = Result<BTreeSet<String>, StorageError>> + Send;
}

/// The full store surface the services are generic over. Blanket-implemented
/// for anything providing all four sub-traits.
pub trait EntityStore: UserStore + RoleStore + PermissionStore + RelationStore {}

impl<S> EntityStore for S where S: UserStore + RoleStore + PermissionStore + RelationStore {}
