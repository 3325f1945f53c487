use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use grantor_core::entity::{
    EntityKind, PermissionId, PermissionRecord, PermissionWrite, RoleId, RolePermission,
    RoleRecord, RoleWrite, Stamp, UserRecord, UserRole, UserView,
};
use grantor_core::page::{Page, PageRequest};
use grantor_storage::{EntityStore, StorageError};

use crate::cache::AuthCache;
use crate::error::EngineError;

/// The authorization graph: User↔Role and Role↔Permission relations with
/// a read-through cache. Every mutation writes the store first and clears
/// the affected cache entries after; sets are never patched in place.
pub struct GraphService<S> {
    store: Arc<S>,
    cache: Arc<dyn AuthCache>,
}

impl<S: EntityStore> GraphService<S> {
    pub fn new(store: Arc<S>, cache: Arc<dyn AuthCache>) -> Self {
        Self { store, cache }
    }

    // --- read-through entity resolution ---

    pub async fn user_by_name(&self, name: &str) -> Result<Option<UserRecord>, EngineError> {
        if let Some(record) = self.cache.user(name) {
            return Ok(Some(record));
        }
        let record = self.store.user_by_name(name).await?;
        if let Some(ref r) = record {
            self.cache.put_user(r);
        }
        Ok(record)
    }

    pub async fn role_by_name(&self, name: &str) -> Result<Option<RoleRecord>, EngineError> {
        if let Some(record) = self.cache.role(name) {
            return Ok(Some(record));
        }
        let record = self.store.role_by_name(name).await?;
        if let Some(ref r) = record {
            self.cache.put_role(r);
        }
        Ok(record)
    }

    pub async fn permission_by_name(
        &self,
        name: &str,
    ) -> Result<Option<PermissionRecord>, EngineError> {
        if let Some(record) = self.cache.permission(name) {
            return Ok(Some(record));
        }
        let record = self.store.permission_by_name(name).await?;
        if let Some(ref r) = record {
            self.cache.put_permission(r);
        }
        Ok(record)
    }

    async fn resolve_user(&self, name: &str) -> Result<UserRecord, EngineError> {
        self.user_by_name(name)
            .await?
            .ok_or_else(|| EngineError::missing(EntityKind::User, name))
    }

    async fn resolve_role(&self, name: &str) -> Result<RoleRecord, EngineError> {
        self.role_by_name(name)
            .await?
            .ok_or_else(|| EngineError::missing(EntityKind::Role, name))
    }

    async fn resolve_permission(&self, name: &str) -> Result<PermissionRecord, EngineError> {
        self.permission_by_name(name)
            .await?
            .ok_or_else(|| EngineError::missing(EntityKind::Permission, name))
    }

    // --- entity creation ---

    /// The pre-check is an optimization; under a racing create the store's
    /// unique constraint is what actually decides.
    pub async fn create_role(&self, name: &str) -> Result<RoleId, EngineError> {
        if self.role_by_name(name).await?.is_some() {
            return Err(EngineError::duplicate(EntityKind::Role, name));
        }

        let write = RoleWrite::new(name, Stamp::now());
        match self.store.insert_role(&write).await {
            Ok(id) => {
                tracing::info!(role = name, %id, "role created");
                Ok(id)
            }
            Err(StorageError::DuplicateKey(_)) => {
                Err(EngineError::duplicate(EntityKind::Role, name))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn create_permission(&self, name: &str) -> Result<PermissionId, EngineError> {
        if self.permission_by_name(name).await?.is_some() {
            return Err(EngineError::duplicate(EntityKind::Permission, name));
        }

        let write = PermissionWrite::new(name, Stamp::now());
        match self.store.insert_permission(&write).await {
            Ok(id) => {
                tracing::info!(permission = name, %id, "permission created");
                Ok(id)
            }
            Err(StorageError::DuplicateKey(_)) => {
                Err(EngineError::duplicate(EntityKind::Permission, name))
            }
            Err(e) => Err(e.into()),
        }
    }

    // --- relation mutation ---

    pub async fn add_role_to_user(
        &self,
        user_name: &str,
        role_name: &str,
    ) -> Result<(), EngineError> {
        let user = self.resolve_user(user_name).await?;
        let role = self.resolve_role(role_name).await?;

        let relation = UserRole::new(user.id, role.id, Stamp::now());
        match self.store.insert_user_role(&relation).await {
            Ok(()) => {
                self.cache.clear_user_roles(user_name);
                tracing::info!(user = user_name, role = role_name, "role granted");
                Ok(())
            }
            Err(StorageError::DuplicateKey(_)) => {
                Err(EngineError::DuplicateRelation(EntityKind::UserRole))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Removing an absent relation is a silent success.
    pub async fn remove_user_role(
        &self,
        user_name: &str,
        role_name: &str,
    ) -> Result<(), EngineError> {
        let user = self.resolve_user(user_name).await?;
        let role = self.resolve_role(role_name).await?;

        self.store.delete_user_role(user.id, role.id).await?;
        self.cache.clear_user_roles(user_name);
        tracing::info!(user = user_name, role = role_name, "role revoked");
        Ok(())
    }

    pub async fn add_permission_to_role(
        &self,
        role_name: &str,
        permission_name: &str,
    ) -> Result<(), EngineError> {
        let role = self.resolve_role(role_name).await?;
        let permission = self.resolve_permission(permission_name).await?;

        let relation = RolePermission::new(role.id, permission.id, Stamp::now());
        match self.store.insert_role_permission(&relation).await {
            Ok(()) => {
                self.cache.clear_role_permissions(role_name);
                tracing::info!(
                    role = role_name,
                    permission = permission_name,
                    "permission granted"
                );
                Ok(())
            }
            Err(StorageError::DuplicateKey(_)) => {
                Err(EngineError::DuplicateRelation(EntityKind::RolePermission))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove_role_permission(
        &self,
        role_name: &str,
        permission_name: &str,
    ) -> Result<(), EngineError> {
        let role = self.resolve_role(role_name).await?;
        let permission = self.resolve_permission(permission_name).await?;

        self.store
            .delete_role_permission(role.id, permission.id)
            .await?;
        self.cache.clear_role_permissions(role_name);
        tracing::info!(
            role = role_name,
            permission = permission_name,
            "permission revoked"
        );
        Ok(())
    }

    // --- entity deletion and rename ---

    /// Cascade is atomic at the store. Any user's cached role set may name
    /// the deleted role, so the whole region is cleared.
    pub async fn remove_role(&self, name: &str) -> Result<(), EngineError> {
        let role = self.resolve_role(name).await?;

        self.store.delete_role_cascade(role.id).await?;

        self.cache.clear_role(name);
        self.cache.clear_all_user_roles();
        self.cache.clear_role_permissions(name);
        tracing::info!(role = name, "role removed with cascading relations");
        Ok(())
    }

    pub async fn remove_permission(&self, name: &str) -> Result<(), EngineError> {
        let permission = self.resolve_permission(name).await?;

        self.store.delete_permission_cascade(permission.id).await?;

        self.cache.clear_permission(name);
        self.cache.clear_all_role_permissions();
        tracing::info!(permission = name, "permission removed with cascading relations");
        Ok(())
    }

    pub async fn rename_role(&self, old_name: &str, new_name: &str) -> Result<(), EngineError> {
        let role = self.resolve_role(old_name).await?;
        if old_name != new_name && self.role_by_name(new_name).await?.is_some() {
            return Err(EngineError::duplicate(EntityKind::Role, new_name));
        }

        match self.store.rename_role(role.id, new_name, Utc::now()).await {
            Ok(()) => {}
            Err(StorageError::DuplicateKey(_)) => {
                return Err(EngineError::duplicate(EntityKind::Role, new_name));
            }
            Err(e) => return Err(e.into()),
        }

        // Same blast radius as a delete: cached sets may carry the old name.
        self.cache.clear_role(old_name);
        self.cache.clear_all_user_roles();
        self.cache.clear_role_permissions(old_name);
        tracing::info!(from = old_name, to = new_name, "role renamed");
        Ok(())
    }

    pub async fn rename_permission(
        &self,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), EngineError> {
        let permission = self.resolve_permission(old_name).await?;
        if old_name != new_name && self.permission_by_name(new_name).await?.is_some() {
            return Err(EngineError::duplicate(EntityKind::Permission, new_name));
        }

        match self
            .store
            .rename_permission(permission.id, new_name, Utc::now())
            .await
        {
            Ok(()) => {}
            Err(StorageError::DuplicateKey(_)) => {
                return Err(EngineError::duplicate(EntityKind::Permission, new_name));
            }
            Err(e) => return Err(e.into()),
        }

        self.cache.clear_permission(old_name);
        self.cache.clear_all_role_permissions();
        tracing::info!(from = old_name, to = new_name, "permission renamed");
        Ok(())
    }

    // --- derived sets ---

    pub async fn roles_of(&self, user_name: &str) -> Result<BTreeSet<String>, EngineError> {
        let user = self.resolve_user(user_name).await?;

        if let Some(roles) = self.cache.user_roles(user_name) {
            return Ok(roles);
        }
        let roles = self.store.role_names_for_user(user.id).await?;
        self.cache.put_user_roles(user_name, &roles);
        Ok(roles)
    }

    pub async fn permissions_of(&self, role_name: &str) -> Result<BTreeSet<String>, EngineError> {
        let role = self.resolve_role(role_name).await?;

        if let Some(permissions) = self.cache.role_permissions(role_name) {
            return Ok(permissions);
        }
        let permissions = self.store.permission_names_for_role(role.id).await?;
        self.cache.put_role_permissions(role_name, &permissions);
        Ok(permissions)
    }

    /// Union of the permission sets of every role assigned to the user.
    /// An empty set is a normal result for a user with no grants.
    pub async fn effective_permissions(
        &self,
        user_name: &str,
    ) -> Result<BTreeSet<String>, EngineError> {
        let roles = self.roles_of(user_name).await?;

        let mut permissions = BTreeSet::new();
        for role_name in &roles {
            permissions.extend(self.permissions_of(role_name).await?);
        }
        Ok(permissions)
    }

    // --- paged enumeration (bypasses the cache) ---

    pub async fn list_users(&self, page: PageRequest) -> Result<Page<UserView>, EngineError> {
        Ok(self.store.list_users(page).await?)
    }

    pub async fn list_roles(&self, page: PageRequest) -> Result<Page<RoleRecord>, EngineError> {
        Ok(self.store.list_roles(page).await?)
    }

    pub async fn list_permissions(
        &self,
        page: PageRequest,
    ) -> Result<Page<PermissionRecord>, EngineError> {
        Ok(self.store.list_permissions(page).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{InMemoryCache, NoopCache};
    use grantor_core::entity::UserWrite;
    use grantor_storage::memory::InMemoryStore;
    use grantor_storage::{RelationStore, UserStore};

    fn make_service() -> (GraphService<InMemoryStore>, Arc<InMemoryStore>, Arc<InMemoryCache>) {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::default());
        let service = GraphService::new(Arc::clone(&store), cache.clone() as Arc<dyn AuthCache>);
        (service, store, cache)
    }

    async fn add_user(store: &InMemoryStore, name: &str) {
        store
            .insert_user(&UserWrite::new(name, "digest", "salt", Stamp::now()))
            .await
            .unwrap();
    }

    fn names(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    // --- creation ---

    #[tokio::test]
    async fn create_role_assigns_id() {
        let (service, _, _) = make_service();

        let id = service.create_role("admin").await.unwrap();

        assert_eq!(id.value(), 1);
        assert!(service.role_by_name("admin").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn second_create_role_is_duplicate() {
        let (service, _, _) = make_service();
        service.create_role("admin").await.unwrap();

        let result = service.create_role("admin").await;

        assert!(matches!(
            result,
            Err(EngineError::DuplicateEntity { kind: EntityKind::Role, ref key }) if key == "admin"
        ));
    }

    #[tokio::test]
    async fn create_translates_store_duplicate_key() {
        // With a cache that never hits, the pre-check miss path goes to the
        // store, which still refuses the duplicate insert.
        let store = Arc::new(InMemoryStore::new());
        let service = GraphService::new(Arc::clone(&store), Arc::new(NoopCache));
        service.create_permission("doc:read").await.unwrap();

        let result = service.create_permission("doc:read").await;

        assert!(matches!(
            result,
            Err(EngineError::DuplicateEntity { kind: EntityKind::Permission, .. })
        ));
    }

    // --- relation mutation ---

    #[tokio::test]
    async fn add_role_to_missing_user_fails() {
        let (service, _, _) = make_service();
        service.create_role("admin").await.unwrap();

        let result = service.add_role_to_user("ghost", "admin").await;

        assert!(matches!(
            result,
            Err(EngineError::MissingEntity { kind: EntityKind::User, ref key }) if key == "ghost"
        ));
    }

    #[tokio::test]
    async fn add_missing_role_to_user_fails() {
        let (service, store, _) = make_service();
        add_user(&store, "alice").await;

        let result = service.add_role_to_user("alice", "ghost").await;

        assert!(matches!(
            result,
            Err(EngineError::MissingEntity { kind: EntityKind::Role, .. })
        ));
    }

    #[tokio::test]
    async fn duplicate_grant_is_duplicate_relation() {
        let (service, store, _) = make_service();
        add_user(&store, "alice").await;
        service.create_role("admin").await.unwrap();
        service.add_role_to_user("alice", "admin").await.unwrap();

        let result = service.add_role_to_user("alice", "admin").await;

        assert!(matches!(
            result,
            Err(EngineError::DuplicateRelation(EntityKind::UserRole))
        ));
    }

    #[tokio::test]
    async fn remove_user_role_twice_succeeds() {
        let (service, store, _) = make_service();
        add_user(&store, "alice").await;
        service.create_role("admin").await.unwrap();
        service.add_role_to_user("alice", "admin").await.unwrap();

        service.remove_user_role("alice", "admin").await.unwrap();
        service.remove_user_role("alice", "admin").await.unwrap();

        assert!(service.roles_of("alice").await.unwrap().is_empty());
    }

    // --- derived sets ---

    #[tokio::test]
    async fn effective_permissions_union_over_roles() {
        let (service, store, _) = make_service();
        add_user(&store, "alice").await;
        add_user(&store, "bob").await;
        service.create_role("editor").await.unwrap();
        service.create_role("viewer").await.unwrap();
        service.create_role("auditor").await.unwrap();
        service.create_permission("doc:read").await.unwrap();
        service.create_permission("doc:write").await.unwrap();
        service.create_permission("audit:read").await.unwrap();
        service
            .add_permission_to_role("editor", "doc:read")
            .await
            .unwrap();
        service
            .add_permission_to_role("editor", "doc:write")
            .await
            .unwrap();
        service
            .add_permission_to_role("viewer", "doc:read")
            .await
            .unwrap();
        service
            .add_permission_to_role("auditor", "audit:read")
            .await
            .unwrap();
        service.add_role_to_user("alice", "editor").await.unwrap();
        service.add_role_to_user("alice", "viewer").await.unwrap();
        // bob's grant must not leak into alice's result
        service.add_role_to_user("bob", "auditor").await.unwrap();

        let effective = service.effective_permissions("alice").await.unwrap();

        assert_eq!(names(&effective), vec!["doc:read", "doc:write"]);
    }

    #[tokio::test]
    async fn effective_permissions_empty_for_unassigned_user() {
        let (service, store, _) = make_service();
        add_user(&store, "alice").await;

        let effective = service.effective_permissions("alice").await.unwrap();

        assert!(effective.is_empty());
    }

    #[tokio::test]
    async fn permissions_of_missing_role_fails() {
        let (service, _, _) = make_service();

        let result = service.permissions_of("ghost").await;

        assert!(matches!(
            result,
            Err(EngineError::MissingEntity { kind: EntityKind::Role, .. })
        ));
    }

    // --- cache coherence ---

    #[tokio::test]
    async fn roles_of_serves_from_cache_until_invalidated() {
        let (service, store, _) = make_service();
        add_user(&store, "alice").await;
        service.create_role("admin").await.unwrap();
        service.create_role("viewer").await.unwrap();
        service.add_role_to_user("alice", "admin").await.unwrap();

        // populate the cached set
        assert_eq!(names(&service.roles_of("alice").await.unwrap()), vec!["admin"]);

        // a write that bypasses the service is invisible to readers...
        let user = store.user_by_name("alice").await.unwrap().unwrap();
        let role = service.role_by_name("viewer").await.unwrap().unwrap();
        store
            .insert_user_role(&UserRole::new(user.id, role.id, Stamp::now()))
            .await
            .unwrap();
        assert_eq!(names(&service.roles_of("alice").await.unwrap()), vec!["admin"]);

        // ...until the next service-side mutation clears the entry
        service.remove_user_role("alice", "admin").await.unwrap();
        assert_eq!(
            names(&service.roles_of("alice").await.unwrap()),
            vec!["viewer"]
        );
    }

    #[tokio::test]
    async fn grant_invalidates_cached_role_set() {
        let (service, store, _) = make_service();
        add_user(&store, "alice").await;
        service.create_role("admin").await.unwrap();
        service.create_role("viewer").await.unwrap();
        service.add_role_to_user("alice", "admin").await.unwrap();
        assert_eq!(service.roles_of("alice").await.unwrap().len(), 1);

        service.add_role_to_user("alice", "viewer").await.unwrap();

        assert_eq!(
            names(&service.roles_of("alice").await.unwrap()),
            vec!["admin", "viewer"]
        );
    }

    #[tokio::test]
    async fn permission_grant_invalidates_cached_permission_set() {
        let (service, _, _) = make_service();
        service.create_role("admin").await.unwrap();
        service.create_permission("doc:read").await.unwrap();
        service.create_permission("doc:write").await.unwrap();
        service
            .add_permission_to_role("admin", "doc:read")
            .await
            .unwrap();
        assert_eq!(service.permissions_of("admin").await.unwrap().len(), 1);

        service
            .add_permission_to_role("admin", "doc:write")
            .await
            .unwrap();

        assert_eq!(
            names(&service.permissions_of("admin").await.unwrap()),
            vec!["doc:read", "doc:write"]
        );
    }

    // --- cascade ---

    #[tokio::test]
    async fn remove_role_cascades_everywhere() {
        let (service, store, _) = make_service();
        add_user(&store, "alice").await;
        service.create_role("r1").await.unwrap();
        service.create_permission("p1").await.unwrap();
        service.add_permission_to_role("r1", "p1").await.unwrap();
        service.add_role_to_user("alice", "r1").await.unwrap();
        // warm every cached set involved
        assert_eq!(service.roles_of("alice").await.unwrap().len(), 1);
        assert_eq!(service.permissions_of("r1").await.unwrap().len(), 1);
        assert_eq!(service.effective_permissions("alice").await.unwrap().len(), 1);

        service.remove_role("r1").await.unwrap();

        assert!(service.roles_of("alice").await.unwrap().is_empty());
        assert!(service.effective_permissions("alice").await.unwrap().is_empty());
        assert!(matches!(
            service.permissions_of("r1").await,
            Err(EngineError::MissingEntity { kind: EntityKind::Role, .. })
        ));
        // the permission itself survives the role cascade
        assert!(service.permission_by_name("p1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn remove_permission_cascades_out_of_role_sets() {
        let (service, _, _) = make_service();
        service.create_role("admin").await.unwrap();
        service.create_permission("doc:read").await.unwrap();
        service.create_permission("doc:write").await.unwrap();
        service
            .add_permission_to_role("admin", "doc:read")
            .await
            .unwrap();
        service
            .add_permission_to_role("admin", "doc:write")
            .await
            .unwrap();
        assert_eq!(service.permissions_of("admin").await.unwrap().len(), 2);

        service.remove_permission("doc:write").await.unwrap();

        assert_eq!(
            names(&service.permissions_of("admin").await.unwrap()),
            vec!["doc:read"]
        );
        assert!(matches!(
            service.create_permission("doc:write").await,
            Ok(_)
        ));
    }

    #[tokio::test]
    async fn remove_missing_role_fails() {
        let (service, _, _) = make_service();

        let result = service.remove_role("ghost").await;

        assert!(matches!(
            result,
            Err(EngineError::MissingEntity { kind: EntityKind::Role, .. })
        ));
    }

    // --- rename ---

    #[tokio::test]
    async fn rename_role_moves_grants_with_it() {
        let (service, store, _) = make_service();
        add_user(&store, "alice").await;
        service.create_role("admin").await.unwrap();
        service.create_permission("doc:read").await.unwrap();
        service
            .add_permission_to_role("admin", "doc:read")
            .await
            .unwrap();
        service.add_role_to_user("alice", "admin").await.unwrap();
        assert_eq!(service.roles_of("alice").await.unwrap().len(), 1);

        service.rename_role("admin", "superadmin").await.unwrap();

        assert_eq!(
            names(&service.roles_of("alice").await.unwrap()),
            vec!["superadmin"]
        );
        assert_eq!(
            names(&service.effective_permissions("alice").await.unwrap()),
            vec!["doc:read"]
        );
        assert!(matches!(
            service.permissions_of("admin").await,
            Err(EngineError::MissingEntity { .. })
        ));
    }

    #[tokio::test]
    async fn rename_role_to_taken_name_fails() {
        let (service, _, _) = make_service();
        service.create_role("admin").await.unwrap();
        service.create_role("viewer").await.unwrap();

        let result = service.rename_role("admin", "viewer").await;

        assert!(matches!(
            result,
            Err(EngineError::DuplicateEntity { kind: EntityKind::Role, ref key }) if key == "viewer"
        ));
    }

    #[tokio::test]
    async fn rename_permission_updates_effective_sets() {
        let (service, store, _) = make_service();
        add_user(&store, "alice").await;
        service.create_role("admin").await.unwrap();
        service.create_permission("doc:read").await.unwrap();
        service
            .add_permission_to_role("admin", "doc:read")
            .await
            .unwrap();
        service.add_role_to_user("alice", "admin").await.unwrap();
        assert_eq!(service.effective_permissions("alice").await.unwrap().len(), 1);

        service
            .rename_permission("doc:read", "doc:view")
            .await
            .unwrap();

        assert_eq!(
            names(&service.effective_permissions("alice").await.unwrap()),
            vec!["doc:view"]
        );
    }

    // --- listing ---

    #[tokio::test]
    async fn list_roles_pages_through_results() {
        let (service, _, _) = make_service();
        for name in ["a", "b", "c", "d", "e"] {
            service.create_role(name).await.unwrap();
        }

        let page = service.list_roles(PageRequest::new(2, 2)).await.unwrap();

        assert_eq!(page.total, 5);
        assert_eq!(
            page.items.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec!["c", "d"]
        );
    }
}
