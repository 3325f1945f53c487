use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use grantor_core::entity::{PermissionRecord, RoleRecord, UserRecord};

/// Best-effort cache in front of the store. A miss is never an error and
/// returned values are copies, so callers always re-resolve from the store
/// when an entry is absent.
pub trait AuthCache: Send + Sync {
    fn user(&self, name: &str) -> Option<UserRecord>;
    fn put_user(&self, record: &UserRecord);
    fn clear_user(&self, name: &str);

    fn role(&self, name: &str) -> Option<RoleRecord>;
    fn put_role(&self, record: &RoleRecord);
    fn clear_role(&self, name: &str);

    fn permission(&self, name: &str) -> Option<PermissionRecord>;
    fn put_permission(&self, record: &PermissionRecord);
    fn clear_permission(&self, name: &str);

    fn user_roles(&self, user_name: &str) -> Option<BTreeSet<String>>;
    fn put_user_roles(&self, user_name: &str, roles: &BTreeSet<String>);
    fn clear_user_roles(&self, user_name: &str);
    /// Conservative invalidation when a role is deleted or renamed: any
    /// user's cached role set may reference the old name.
    fn clear_all_user_roles(&self);

    fn role_permissions(&self, role_name: &str) -> Option<BTreeSet<String>>;
    fn put_role_permissions(&self, role_name: &str, permissions: &BTreeSet<String>);
    fn clear_role_permissions(&self, role_name: &str);
    fn clear_all_role_permissions(&self);

    fn token(&self, user_name: &str) -> Option<String>;
    fn put_token(&self, user_name: &str, token: &str);
    fn clear_token(&self, user_name: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    pub entity: Duration,
    pub set: Duration,
    pub token: Duration,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            entity: Duration::from_secs(300),
            set: Duration::from_secs(300),
            token: Duration::from_secs(1800),
        }
    }
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Debug)]
struct Region<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    ttl: Duration,
}

impl<V: Clone> Region<V> {
    fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: &str, value: V) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    fn clear(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(key);
    }

    fn clear_all(&self) {
        let mut entries = self.entries.lock().unwrap();
        entries.clear();
    }
}

/// Locked-map cache with per-entry expiry.
#[derive(Debug)]
pub struct InMemoryCache {
    users: Region<UserRecord>,
    roles: Region<RoleRecord>,
    permissions: Region<PermissionRecord>,
    user_roles: Region<BTreeSet<String>>,
    role_permissions: Region<BTreeSet<String>>,
    tokens: Region<String>,
}

impl InMemoryCache {
    pub fn new(ttl: CacheTtl) -> Self {
        Self {
            users: Region::new(ttl.entity),
            roles: Region::new(ttl.entity),
            permissions: Region::new(ttl.entity),
            user_roles: Region::new(ttl.set),
            role_permissions: Region::new(ttl.set),
            tokens: Region::new(ttl.token),
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(CacheTtl::default())
    }
}

impl AuthCache for InMemoryCache {
    fn user(&self, name: &str) -> Option<UserRecord> {
        self.users.get(name)
    }

    fn put_user(&self, record: &UserRecord) {
        self.users.put(&record.name, record.clone());
    }

    fn clear_user(&self, name: &str) {
        self.users.clear(name);
    }

    fn role(&self, name: &str) -> Option<RoleRecord> {
        self.roles.get(name)
    }

    fn put_role(&self, record: &RoleRecord) {
        self.roles.put(&record.name, record.clone());
    }

    fn clear_role(&self, name: &str) {
        self.roles.clear(name);
    }

    fn permission(&self, name: &str) -> Option<PermissionRecord> {
        self.permissions.get(name)
    }

    fn put_permission(&self, record: &PermissionRecord) {
        self.permissions.put(&record.name, record.clone());
    }

    fn clear_permission(&self, name: &str) {
        self.permissions.clear(name);
    }

    fn user_roles(&self, user_name: &str) -> Option<BTreeSet<String>> {
        self.user_roles.get(user_name)
    }

    fn put_user_roles(&self, user_name: &str, roles: &BTreeSet<String>) {
        self.user_roles.put(user_name, roles.clone());
    }

    fn clear_user_roles(&self, user_name: &str) {
        self.user_roles.clear(user_name);
    }

    fn clear_all_user_roles(&self) {
        self.user_roles.clear_all();
    }

    fn role_permissions(&self, role_name: &str) -> Option<BTreeSet<String>> {
        self.role_permissions.get(role_name)
    }

    fn put_role_permissions(&self, role_name: &str, permissions: &BTreeSet<String>) {
        self.role_permissions.put(role_name, permissions.clone());
    }

    fn clear_role_permissions(&self, role_name: &str) {
        self.role_permissions.clear(role_name);
    }

    fn clear_all_role_permissions(&self) {
        self.role_permissions.clear_all();
    }

    fn token(&self, user_name: &str) -> Option<String> {
        self.tokens.get(user_name)
    }

    fn put_token(&self, user_name: &str, token: &str) {
        self.tokens.put(user_name, token.to_string());
    }

    fn clear_token(&self, user_name: &str) {
        self.tokens.clear(user_name);
    }
}

/// Always misses. Lets tests prove the services are correct with no
/// caching at all, and keeps one-shot CLI invocations from paying for
/// cache maintenance they will never read back.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl AuthCache for NoopCache {
    fn user(&self, _name: &str) -> Option<UserRecord> {
        None
    }

    fn put_user(&self, _record: &UserRecord) {}

    fn clear_user(&self, _name: &str) {}

    fn role(&self, _name: &str) -> Option<RoleRecord> {
        None
    }

    fn put_role(&self, _record: &RoleRecord) {}

    fn clear_role(&self, _name: &str) {}

    fn permission(&self, _name: &str) -> Option<PermissionRecord> {
        None
    }

    fn put_permission(&self, _record: &PermissionRecord) {}

    fn clear_permission(&self, _name: &str) {}

    fn user_roles(&self, _user_name: &str) -> Option<BTreeSet<String>> {
        None
    }

    fn put_user_roles(&self, _user_name: &str, _roles: &BTreeSet<String>) {}

    fn clear_user_roles(&self, _user_name: &str) {}

    fn clear_all_user_roles(&self) {}

    fn role_permissions(&self, _role_name: &str) -> Option<BTreeSet<String>> {
        None
    }

    fn put_role_permissions(&self, _role_name: &str, _permissions: &BTreeSet<String>) {}

    fn clear_role_permissions(&self, _role_name: &str) {}

    fn clear_all_role_permissions(&self) {}

    fn token(&self, _user_name: &str) -> Option<String> {
        None
    }

    fn put_token(&self, _user_name: &str, _token: &str) {}

    fn clear_token(&self, _user_name: &str) {}
}
