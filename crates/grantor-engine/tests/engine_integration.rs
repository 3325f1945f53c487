use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use grantor_engine::EngineError;
use grantor_engine::account::AccountService;
use grantor_engine::cache::{AuthCache, CacheTtl, InMemoryCache};
use grantor_storage::memory::InMemoryStore;

fn make_accounts() -> AccountService<InMemoryStore> {
    AccountService::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(InMemoryCache::default()),
    )
}

fn make_accounts_with_ttl(ttl: CacheTtl) -> AccountService<InMemoryStore> {
    AccountService::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(InMemoryCache::new(ttl)) as Arc<dyn AuthCache>,
    )
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn effective_permissions_are_union_over_assigned_roles() {
    let accounts = make_accounts();
    let graph = accounts.graph();

    accounts.register("alice", "pw").await.unwrap();
    accounts.register("bob", "pw").await.unwrap();
    graph.create_role("editor").await.unwrap();
    graph.create_role("viewer").await.unwrap();
    graph.create_role("auditor").await.unwrap();
    graph.create_permission("doc:read").await.unwrap();
    graph.create_permission("doc:write").await.unwrap();
    graph.create_permission("audit:read").await.unwrap();
    graph.add_permission_to_role("editor", "doc:write").await.unwrap();
    graph.add_permission_to_role("editor", "doc:read").await.unwrap();
    graph.add_permission_to_role("viewer", "doc:read").await.unwrap();
    graph.add_permission_to_role("auditor", "audit:read").await.unwrap();
    graph.add_role_to_user("alice", "editor").await.unwrap();
    graph.add_role_to_user("alice", "viewer").await.unwrap();
    graph.add_role_to_user("bob", "auditor").await.unwrap();

    let alice = graph.effective_permissions("alice").await.unwrap();
    let bob = graph.effective_permissions("bob").await.unwrap();

    assert_eq!(alice, set(&["doc:read", "doc:write"]));
    assert_eq!(bob, set(&["audit:read"]));
}

#[tokio::test]
async fn revoking_a_role_twice_is_idempotent() {
    let accounts = make_accounts();
    let graph = accounts.graph();
    accounts.register("alice", "pw").await.unwrap();
    graph.create_role("admin").await.unwrap();
    graph.add_role_to_user("alice", "admin").await.unwrap();

    graph.remove_user_role("alice", "admin").await.unwrap();
    graph.remove_user_role("alice", "admin").await.unwrap();

    assert!(graph.roles_of("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_role_creation_yields_one_winner() {
    let store = Arc::new(InMemoryStore::new());
    let cache: Arc<dyn AuthCache> = Arc::new(InMemoryCache::default());
    let a = Arc::new(grantor_engine::graph::GraphService::new(
        Arc::clone(&store),
        Arc::clone(&cache),
    ));
    let b = Arc::new(grantor_engine::graph::GraphService::new(store, cache));

    let first = tokio::spawn({
        let a = Arc::clone(&a);
        async move { a.create_role("admin").await }
    });
    let second = tokio::spawn({
        let b = Arc::clone(&b);
        async move { b.create_role("admin").await }
    });

    let results = [first.await.unwrap(), second.await.unwrap()];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(EngineError::DuplicateEntity { .. })))
        .count();

    assert_eq!(winners, 1);
    assert_eq!(duplicates, 1);
}

#[tokio::test]
async fn role_removal_cascades_through_users_and_permissions() {
    let accounts = make_accounts();
    let graph = accounts.graph();
    accounts.register("alice", "pw").await.unwrap();
    graph.create_role("r1").await.unwrap();
    graph.create_permission("p1").await.unwrap();
    graph.add_permission_to_role("r1", "p1").await.unwrap();
    graph.add_role_to_user("alice", "r1").await.unwrap();
    // warm the caches so the cascade has stale entries to kill
    assert_eq!(graph.roles_of("alice").await.unwrap(), set(&["r1"]));
    assert_eq!(graph.permissions_of("r1").await.unwrap(), set(&["p1"]));

    graph.remove_role("r1").await.unwrap();

    assert!(graph.roles_of("alice").await.unwrap().is_empty());
    assert!(graph.effective_permissions("alice").await.unwrap().is_empty());
    assert!(matches!(
        graph.permissions_of("r1").await,
        Err(EngineError::MissingEntity { .. })
    ));
}

#[tokio::test]
async fn reads_after_any_mutation_reflect_store_state() {
    let accounts = make_accounts();
    let graph = accounts.graph();
    accounts.register("alice", "pw").await.unwrap();
    graph.create_role("admin").await.unwrap();
    graph.create_permission("doc:read").await.unwrap();

    // each step reads first (populating the cache), mutates, reads again
    assert!(graph.roles_of("alice").await.unwrap().is_empty());
    graph.add_role_to_user("alice", "admin").await.unwrap();
    assert_eq!(graph.roles_of("alice").await.unwrap(), set(&["admin"]));

    assert!(graph.permissions_of("admin").await.unwrap().is_empty());
    graph.add_permission_to_role("admin", "doc:read").await.unwrap();
    assert_eq!(
        graph.permissions_of("admin").await.unwrap(),
        set(&["doc:read"])
    );

    graph.remove_role_permission("admin", "doc:read").await.unwrap();
    assert!(graph.permissions_of("admin").await.unwrap().is_empty());

    graph.remove_user_role("alice", "admin").await.unwrap();
    assert!(graph.roles_of("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn rename_invalidates_sets_holding_the_old_name() {
    let accounts = make_accounts();
    let graph = accounts.graph();
    accounts.register("alice", "pw").await.unwrap();
    graph.create_role("admin").await.unwrap();
    graph.create_permission("doc:read").await.unwrap();
    graph.add_permission_to_role("admin", "doc:read").await.unwrap();
    graph.add_role_to_user("alice", "admin").await.unwrap();
    assert_eq!(graph.roles_of("alice").await.unwrap(), set(&["admin"]));

    graph.rename_role("admin", "root").await.unwrap();
    assert_eq!(graph.roles_of("alice").await.unwrap(), set(&["root"]));

    graph.rename_permission("doc:read", "doc:view").await.unwrap();
    assert_eq!(
        graph.effective_permissions("alice").await.unwrap(),
        set(&["doc:view"])
    );
}

#[tokio::test]
async fn login_issues_token_and_logout_revokes_it() {
    let accounts = make_accounts();
    accounts.register("alice", "hunter2").await.unwrap();

    assert_eq!(accounts.login("alice", "wrong").await.unwrap(), None);

    let token = accounts.login("alice", "hunter2").await.unwrap().unwrap();
    assert!(accounts.token_login("alice", &token));
    assert!(!accounts.token_login("alice", "forged"));
    assert!(!accounts.token_login("bob", &token));

    accounts.logout("alice");
    assert!(!accounts.token_login("alice", &token));
}

#[tokio::test]
async fn expired_token_no_longer_validates() {
    let accounts = make_accounts_with_ttl(CacheTtl {
        token: Duration::from_millis(30),
        ..CacheTtl::default()
    });
    accounts.register("alice", "hunter2").await.unwrap();

    let token = accounts.login("alice", "hunter2").await.unwrap().unwrap();
    assert!(accounts.token_login("alice", &token));

    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(!accounts.token_login("alice", &token));
}

#[tokio::test]
async fn full_account_lifecycle() {
    let accounts = make_accounts();
    let graph = accounts.graph();

    accounts.register("alice", "initial").await.unwrap();
    graph.create_role("editor").await.unwrap();
    graph.create_permission("doc:write").await.unwrap();
    graph.add_permission_to_role("editor", "doc:write").await.unwrap();
    graph.add_role_to_user("alice", "editor").await.unwrap();

    let summary = accounts.user_summary("alice").await.unwrap();
    assert_eq!(summary.roles, set(&["editor"]));
    assert_eq!(summary.permissions, set(&["doc:write"]));

    let token = accounts.login("alice", "initial").await.unwrap().unwrap();
    assert!(accounts.change_password("alice", "initial", "rotated").await.unwrap());
    assert!(!accounts.token_login("alice", &token));
    assert!(accounts.login("alice", "rotated").await.unwrap().is_some());

    accounts.remove_user("alice").await.unwrap();
    assert!(matches!(
        accounts.user_summary("alice").await,
        Err(EngineError::MissingEntity { .. })
    ));
}
