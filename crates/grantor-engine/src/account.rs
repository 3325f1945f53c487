use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use grantor_core::entity::{EntityKind, Stamp, UserId, UserRecord, UserView, UserWrite};
use grantor_storage::{EntityStore, StorageError};

use crate::cache::AuthCache;
use crate::credential;
use crate::error::EngineError;
use crate::graph::GraphService;
use crate::token::TokenService;

/// User view plus the role and effective permission sets, the full
/// outward-facing account picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub user: UserView,
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
}

/// Account lifecycle and authentication, layered over the graph and token
/// services. Credential mismatches are normal outcomes, not errors.
pub struct AccountService<S> {
    store: Arc<S>,
    cache: Arc<dyn AuthCache>,
    graph: GraphService<S>,
    tokens: TokenService,
}

impl<S: EntityStore> AccountService<S> {
    pub fn new(store: Arc<S>, cache: Arc<dyn AuthCache>) -> Self {
        let graph = GraphService::new(Arc::clone(&store), Arc::clone(&cache));
        let tokens = TokenService::new(Arc::clone(&cache));
        Self {
            store,
            cache,
            graph,
            tokens,
        }
    }

    pub fn graph(&self) -> &GraphService<S> {
        &self.graph
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub async fn register(&self, name: &str, password: &str) -> Result<UserId, EngineError> {
        if self.graph.user_by_name(name).await?.is_some() {
            return Err(EngineError::duplicate(EntityKind::User, name));
        }

        let salt = credential::generate_salt();
        let digest = credential::digest(password, &salt)?;
        let write = UserWrite::new(name, digest, salt, Stamp::now());

        match self.store.insert_user(&write).await {
            Ok(id) => {
                tracing::info!(user = name, %id, "user registered");
                Ok(id)
            }
            Err(StorageError::DuplicateKey(_)) => {
                Err(EngineError::duplicate(EntityKind::User, name))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn resolve_user(&self, name: &str) -> Result<UserRecord, EngineError> {
        self.graph
            .user_by_name(name)
            .await?
            .ok_or_else(|| EngineError::missing(EntityKind::User, name))
    }

    /// Password login. An unknown user is an error; a wrong password for a
    /// known user is `Ok(None)`.
    pub async fn login(&self, name: &str, password: &str) -> Result<Option<String>, EngineError> {
        let user = self.resolve_user(name).await?;

        if credential::verify(password, &user.credential)? {
            Ok(Some(self.tokens.issue(name)))
        } else {
            tracing::info!(user = name, "login rejected: credential mismatch");
            Ok(None)
        }
    }

    pub fn token_login(&self, name: &str, token: &str) -> bool {
        self.tokens.validate(name, token)
    }

    pub fn logout(&self, name: &str) {
        self.tokens.revoke(name);
    }

    /// Self-service password change; `Ok(false)` when the old password
    /// does not match.
    pub async fn change_password(
        &self,
        name: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<bool, EngineError> {
        let user = self.resolve_user(name).await?;

        if !credential::verify(old_password, &user.credential)? {
            tracing::info!(user = name, "password change rejected: credential mismatch");
            return Ok(false);
        }

        self.write_credential(&user, new_password).await?;
        Ok(true)
    }

    /// Administrative reset, no old-password check.
    pub async fn set_password(&self, name: &str, new_password: &str) -> Result<(), EngineError> {
        let user = self.resolve_user(name).await?;
        self.write_credential(&user, new_password).await
    }

    async fn write_credential(
        &self,
        user: &UserRecord,
        password: &str,
    ) -> Result<(), EngineError> {
        let salt = credential::generate_salt();
        let digest = credential::digest(password, &salt)?;

        self.store
            .update_user_credential(user.id, &digest, &salt, Utc::now())
            .await?;

        // The cached record still holds the old digest, and any live
        // session predates the new credential.
        self.cache.clear_user(&user.name);
        self.tokens.revoke(&user.name);
        tracing::info!(user = %user.name, "credential updated");
        Ok(())
    }

    pub async fn remove_user(&self, name: &str) -> Result<(), EngineError> {
        let user = self.resolve_user(name).await?;

        self.store.delete_user_cascade(user.id).await?;

        self.cache.clear_user(name);
        self.cache.clear_user_roles(name);
        self.tokens.revoke(name);
        tracing::info!(user = name, "user removed with cascading relations");
        Ok(())
    }

    pub async fn user_summary(&self, name: &str) -> Result<UserSummary, EngineError> {
        let user = self.resolve_user(name).await?;
        let roles = self.graph.roles_of(name).await?;
        let permissions = self.graph.effective_permissions(name).await?;

        Ok(UserSummary {
            user: user.view(),
            roles,
            permissions,
        })
    }
}
