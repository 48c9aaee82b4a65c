use std::sync::Arc;
use steward_common::config::PoolSettings;
use steward_common::models::TableDescriptor;
use steward_store::{CatalogStore, MemoryCatalogStore};
use steward_targets::{
    Dialect, Discovery, Liveness, PoolManager, Target, TargetCategory, TargetRegistry,
};
use tempfile::TempDir;

fn sqlite_target(id: &str, path: &str) -> Target {
    Target {
        id: id.to_string(),
        dialect: Dialect::Sqlite,
        host: path.to_string(),
        port: None,
        database: None,
        username: None,
        password: None,
        category: TargetCategory::Test,
        pool: None,
        liveness: Liveness::Unknown,
    }
}

fn manager_for(target: Target) -> (Arc<TargetRegistry>, Arc<PoolManager>) {
    let registry = Arc::new(TargetRegistry::new());
    registry.register(target).unwrap();
    let pools = Arc::new(PoolManager::new(registry.clone(), PoolSettings::default()));
    (registry, pools)
}

#[tokio::test]
async fn test_pool_created_once_under_concurrent_first_access() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.db");
    let (_registry, pools) = manager_for(sqlite_target("t1", path.to_str().unwrap()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pools = pools.clone();
        handles.push(tokio::spawn(async move {
            pools.get_or_create("t1").await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(pools.created_pools(), 1);

    // Repeated access still reuses the cached pool.
    let pool = pools.get_or_create("t1").await.unwrap();
    sqlx::query("SELECT 1").fetch_one(&pool).await.unwrap();
    assert_eq!(pools.created_pools(), 1);

    pools.close_all().await;
}

#[tokio::test]
async fn test_per_target_pool_bounds_override_globals() {
    let dir = TempDir::new().unwrap();
    let global = PoolSettings::default();
    assert_ne!(global.max_connections, 2);

    let shared = dir.path().join("shared.db");
    let bounded = dir.path().join("bounded.db");
    let mut small = sqlite_target("bounded", bounded.to_str().unwrap());
    small.pool = Some(PoolSettings {
        min_connections: 0,
        max_connections: 2,
        ..global
    });

    let (registry, pools) = manager_for(sqlite_target("shared", shared.to_str().unwrap()));
    registry.register(small).unwrap();

    let shared_pool = pools.get_or_create("shared").await.unwrap();
    let bounded_pool = pools.get_or_create("bounded").await.unwrap();
    assert_eq!(
        shared_pool.options().get_max_connections(),
        global.max_connections
    );
    assert_eq!(bounded_pool.options().get_max_connections(), 2);

    pools.close_all().await;
}

#[tokio::test]
async fn test_unknown_target_is_not_found() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.db");
    let (_registry, pools) = manager_for(sqlite_target("t1", path.to_str().unwrap()));

    let err = pools.get_or_create("nope").await.unwrap_err();
    assert_eq!(err.code, steward_error::ErrorCode::TargetNotFound);
}

#[tokio::test]
async fn test_connection_probe_updates_liveness() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.db");
    let (registry, pools) = manager_for(sqlite_target("good", path.to_str().unwrap()));
    registry
        .register(sqlite_target("bad", "/nonexistent-steward-dir/app.db"))
        .unwrap();

    assert!(pools.test_connection("good").await.unwrap());
    assert_eq!(registry.get("good").unwrap().liveness, Liveness::Alive);

    assert!(!pools.test_connection("bad").await.unwrap());
    assert_eq!(registry.get("bad").unwrap().liveness, Liveness::Unreachable);

    // The probe never populates the pool cache.
    assert_eq!(pools.created_pools(), 0);
}

#[tokio::test]
async fn test_discovery_lists_tables_and_merges_idempotently() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.db");
    let (registry, pools) = manager_for(sqlite_target("t1", path.to_str().unwrap()));

    let pool = pools.get_or_create("t1").await.unwrap();
    sqlx::query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("CREATE TABLE orders (id INTEGER PRIMARY KEY, amount REAL)")
        .execute(&pool)
        .await
        .unwrap();

    let catalog: Arc<MemoryCatalogStore> = Arc::new(MemoryCatalogStore::new());
    let discovery = Discovery::new(registry, pools.clone(), catalog.clone());

    let tables = discovery.discover_tables("t1", None).await.unwrap();
    assert_eq!(tables.len(), 2);

    let users = tables.iter().find(|t| t.name == "users").unwrap();
    assert_eq!(users.schema, "main");
    assert_eq!(users.columns.len(), 2);
    let name_col = users.columns.iter().find(|c| c.name == "name").unwrap();
    assert!(!name_col.nullable);

    // Second run discovers the same tables but adds nothing new.
    discovery.discover_tables("t1", None).await.unwrap();
    assert_eq!(catalog.tables_for_target("t1").await.unwrap().len(), 2);

    pools.close_all().await;
}

#[tokio::test]
async fn test_discovery_falls_back_to_cached_catalog() {
    let (registry, pools) = manager_for(sqlite_target("t1", "/nonexistent-steward-dir/app.db"));

    let catalog: Arc<MemoryCatalogStore> = Arc::new(MemoryCatalogStore::new());
    catalog
        .merge_tables(
            "t1",
            vec![TableDescriptor {
                schema: "main".to_string(),
                name: "cached_table".to_string(),
                columns: vec![],
            }],
        )
        .await
        .unwrap();

    let discovery = Discovery::new(registry, pools, catalog);
    let tables = discovery.discover_tables("t1", None).await.unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].name, "cached_table");
}
