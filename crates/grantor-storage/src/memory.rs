use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use grantor_core::entity::{
    EntityKind, PermissionId, PermissionRecord, PermissionWrite, RoleId, RolePermission,
    RoleRecord, RoleWrite, UserId, UserRecord, UserRole, UserView, UserWrite,
};
use grantor_core::page::{Page, PageRequest};

use crate::traits::{
    PermissionStore, RelationStore, RoleStore, StorageError, UserStore,
};

#[derive(Debug)]
struct InnerState {
    next_user_id: i64,
    next_role_id: i64,
    next_permission_id: i64,
    users: Vec<UserRecord>,
    roles: Vec<RoleRecord>,
    permissions: Vec<PermissionRecord>,
    user_roles: Vec<UserRole>,
    role_permissions: Vec<RolePermission>,
}

/// In-memory backend. Every operation runs under one mutex, so the cascade
/// deletions are atomic by construction.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<InnerState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(InnerState {
                next_user_id: 0,
                next_role_id: 0,
                next_permission_id: 0,
                users: Vec::new(),
                roles: Vec::new(),
                permissions: Vec::new(),
                user_roles: Vec::new(),
                role_permissions: Vec::new(),
            })),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn page_slice<T: Clone>(rows: &[T], page: PageRequest) -> Page<T> {
    let total = rows.len() as u64;
    let start = (page.offset() as usize).min(rows.len());
    let end = (start + page.limit() as usize).min(rows.len());
    Page::new(rows[start..end].to_vec(), page, total)
}

impl UserStore for InMemoryStore {
    async fn insert_user(&self, write: &UserWrite) -> Result<UserId, StorageError> {
        let mut state = self.state.lock().unwrap();

        if state.users.iter().any(|u| u.name == write.name) {
            return Err(StorageError::DuplicateKey(EntityKind::User));
        }

        state.next_user_id += 1;
        let id = UserId::new(state.next_user_id);
        state.users.push(UserRecord {
            id,
            name: write.name.clone(),
            credential: write.credential.clone(),
            salt: write.salt.clone(),
            stamp: write.stamp,
        });

        Ok(id)
    }

    async fn user_by_name(&self, name: &str) -> Result<Option<UserRecord>, StorageError> {
        let state = self.state.lock().unwrap();
        Ok(state.users.iter().find(|u| u.name == name).cloned())
    }

    async fn update_user_credential(
        &self,
        id: UserId,
        credential: &str,
        salt: &str,
        last_modified: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();

        if let Some(user) = state.users.iter_mut().find(|u| u.id == id) {
            user.credential = credential.to_string();
            user.salt = salt.to_string();
            user.stamp = user.stamp.touched(last_modified);
        }

        Ok(())
    }

    async fn delete_user_cascade(&self, id: UserId) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();

        state.user_roles.retain(|ur| ur.user_id != id);
        state.users.retain(|u| u.id != id);

        Ok(())
    }

    async fn list_users(&self, page: PageRequest) -> Result<Page<UserView>, StorageError> {
        let state = self.state.lock().unwrap();

        let mut views: Vec<UserView> = state.users.iter().map(UserRecord::view).collect();
        views.sort_by_key(|v| v.id);

        Ok(page_slice(&views, page))
    }
}

impl RoleStore for InMemoryStore {
    async fn insert_role(&self, write: &RoleWrite) -> Result<RoleId, StorageError> {
        let mut state = self.state.lock().unwrap();

        if state.roles.iter().any(|r| r.name == write.name) {
            return Err(StorageError::DuplicateKey(EntityKind::Role));
        }

        state.next_role_id += 1;
        let id = RoleId::new(state.next_role_id);
        state.roles.push(RoleRecord {
            id,
            name: write.name.clone(),
            stamp: write.stamp,
        });

        Ok(id)
    }

    async fn role_by_name(&self, name: &str) -> Result<Option<RoleRecord>, StorageError> {
        let state = self.state.lock().unwrap();
        Ok(state.roles.iter().find(|r| r.name == name).cloned())
    }

    async fn rename_role(
        &self,
        id: RoleId,
        new_name: &str,
        last_modified: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();

        if state.roles.iter().any(|r| r.name == new_name && r.id != id) {
            return Err(StorageError::DuplicateKey(EntityKind::Role));
        }

        if let Some(role) = state.roles.iter_mut().find(|r| r.id == id) {
            role.name = new_name.to_string();
            role.stamp = role.stamp.touched(last_modified);
        }

        Ok(())
    }

    async fn delete_role_cascade(&self, id: RoleId) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();

        state.user_roles.retain(|ur| ur.role_id != id);
        state.role_permissions.retain(|rp| rp.role_id != id);
        state.roles.retain(|r| r.id != id);

        Ok(())
    }

    async fn list_roles(&self, page: PageRequest) -> Result<Page<RoleRecord>, StorageError> {
        let state = self.state.lock().unwrap();

        let mut rows = state.roles.clone();
        rows.sort_by_key(|r| r.id);

        Ok(page_slice(&rows, page))
    }
}

impl PermissionStore for InMemoryStore {
    async fn insert_permission(
        &self,
        write: &PermissionWrite,
    ) -> Result<PermissionId, StorageError> {
        let mut state = self.state.lock().unwrap();

        if state.permissions.iter().any(|p| p.name == write.name) {
            return Err(StorageError::DuplicateKey(EntityKind::Permission));
        }

        state.next_permission_id += 1;
        let id = PermissionId::new(state.next_permission_id);
        state.permissions.push(PermissionRecord {
            id,
            name: write.name.clone(),
            stamp: write.stamp,
        });

        Ok(id)
    }

    async fn permission_by_name(
        &self,
        name: &str,
    ) -> Result<Option<PermissionRecord>, StorageError> {
        let state = self.state.lock().unwrap();
        Ok(state.permissions.iter().find(|p| p.name == name).cloned())
    }

    async fn rename_permission(
        &self,
        id: PermissionId,
        new_name: &str,
        last_modified: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();

        if state
            .permissions
            .iter()
            .any(|p| p.name == new_name && p.id != id)
        {
            return Err(StorageError::DuplicateKey(EntityKind::Permission));
        }

        if let Some(permission) = state.permissions.iter_mut().find(|p| p.id == id) {
            permission.name = new_name.to_string();
            permission.stamp = permission.stamp.touched(last_modified);
        }

        Ok(())
    }

    async fn delete_permission_cascade(&self, id: PermissionId) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();

        state.role_permissions.retain(|rp| rp.permission_id != id);
        state.permissions.retain(|p| p.id != id);

        Ok(())
    }

    async fn list_permissions(
        &self,
        page: PageRequest,
    ) -> Result<Page<PermissionRecord>, StorageError> {
        let state = self.state.lock().unwrap();

        let mut rows = state.permissions.clone();
        rows.sort_by_key(|p| p.id);

        Ok(page_slice(&rows, page))
    }
}

impl RelationStore for InMemoryStore {
    async fn insert_user_role(&self, relation: &UserRole) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();

        let exists = state
            .user_roles
            .iter()
            .any(|ur| ur.user_id == relation.user_id && ur.role_id == relation.role_id);
        if exists {
            return Err(StorageError::DuplicateKey(EntityKind::UserRole));
        }

        state.user_roles.push(relation.clone());
        Ok(())
    }

    async fn delete_user_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        state
            .user_roles
            .retain(|ur| !(ur.user_id == user_id && ur.role_id == role_id));
        Ok(())
    }

    async fn insert_role_permission(&self, relation: &RolePermission) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();

        let exists = state.role_permissions.iter().any(|rp| {
            rp.role_id == relation.role_id && rp.permission_id == relation.permission_id
        });
        if exists {
            return Err(StorageError::DuplicateKey(EntityKind::RolePermission));
        }

        state.role_permissions.push(relation.clone());
        Ok(())
    }

    async fn delete_role_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        state
            .role_permissions
            .retain(|rp| !(rp.role_id == role_id && rp.permission_id == permission_id));
        Ok(())
    }

    async fn role_names_for_user(&self, user_id: UserId) -> Result<BTreeSet<String>, StorageError> {
        let state = self.state.lock().unwrap();

        let names = state
            .user_roles
            .iter()
            .filter(|ur| ur.user_id == user_id)
            .filter_map(|ur| {
                state
                    .roles
                    .iter()
                    .find(|r| r.id == ur.role_id)
                    .map(|r| r.name.clone())
            })
            .collect();

        Ok(names)
    }

    async fn permission_names_for_role(
        &self,
        role_id: RoleId,
    ) -> Result<BTreeSet<String>, StorageError> {
        let state = self.state.lock().unwrap();

        let names = state
            .role_permissions
            .iter()
            .filter(|rp| rp.role_id == role_id)
            .filter_map(|rp| {
                state
                    .permissions
                    .iter()
                    .find(|p| p.id == rp.permission_id)
                    .map(|p| p.name.clone())
            })
            .collect();

        Ok(names)
    }
}
