use crate::registry::{Liveness, Target, TargetRegistry};
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyConnection, AnyPool, Connection};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use steward_common::config::PoolSettings;
use steward_error::{ErrorCode, ErrorContext, Result, StewardError};
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Owns one lazily-created connection pool per registered target.
///
/// Pool creation is at-most-once per target even under concurrent first
/// access: each target id maps to a `OnceCell`, so racing callers await
/// the same initialization instead of creating duplicate pools. Creation
/// failure surfaces as a connection error and is not retried here; the
/// failed cell stays empty so an explicit caller retry can attempt
/// creation again.
pub struct PoolManager {
    registry: Arc<TargetRegistry>,
    settings: PoolSettings,
    pools: Mutex<HashMap<String, Arc<OnceCell<AnyPool>>>>,
    created: AtomicUsize,
}

impl PoolManager {
    pub fn new(registry: Arc<TargetRegistry>, settings: PoolSettings) -> Self {
        // Driver installation is global and must happen exactly once per
        // process, however many managers are constructed.
        static INSTALL_DRIVERS: std::sync::Once = std::sync::Once::new();
        INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);
        Self {
            registry,
            settings,
            pools: Mutex::new(HashMap::new()),
            created: AtomicUsize::new(0),
        }
    }

    /// Return the cached pool for the target, creating it on first use.
    pub async fn get_or_create(&self, target_id: &str) -> Result<AnyPool> {
        let target = self.registry.get(target_id)?;

        let cell = {
            let mut pools = self.pools.lock().expect("pool map lock poisoned");
            pools
                .entry(target_id.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let pool = cell
            .get_or_try_init(|| self.create_pool(&target))
            .await?
            .clone();
        Ok(pool)
    }

    async fn create_pool(&self, target: &Target) -> Result<AnyPool> {
        // A target's own bounds win over the global settings.
        let settings = target.pool.unwrap_or(self.settings);
        let pool = AnyPoolOptions::new()
            .min_connections(settings.min_connections)
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(settings.idle_timeout_secs))
            .connect(&target.connection_url())
            .await
            .map_err(|e| {
                StewardError::new(
                    ErrorCode::PoolCreationFailed,
                    format!("Failed to create pool for target '{}': {}", target.id, e),
                )
                .with_context(ErrorContext::Connection {
                    target: target.id.clone(),
                    dialect: Some(target.dialect.to_string()),
                    host: Some(target.host.clone()),
                    port: target.port,
                })
            })?;

        self.created.fetch_add(1, Ordering::Relaxed);
        info!(
            target_id = %target.id,
            dialect = %target.dialect,
            max = settings.max_connections,
            "Created connection pool"
        );
        Ok(pool)
    }

    /// Open a throwaway connection, run the dialect's liveness probe, and
    /// close it. The cached pool is untouched; the registry's liveness
    /// flag is refreshed from the outcome.
    pub async fn test_connection(&self, target_id: &str) -> Result<bool> {
        let target = self.registry.get(target_id)?;

        let alive = match AnyConnection::connect(&target.connection_url()).await {
            Ok(mut conn) => {
                let ok = sqlx::query(target.dialect.probe_sql())
                    .fetch_one(&mut conn)
                    .await
                    .is_ok();
                if let Err(e) = conn.close().await {
                    warn!(target_id = %target.id, "Probe connection close failed: {}", e);
                }
                ok
            }
            Err(e) => {
                warn!(target_id = %target.id, "Liveness probe failed: {}", e);
                false
            }
        };

        let liveness = if alive {
            Liveness::Alive
        } else {
            Liveness::Unreachable
        };
        self.registry.set_liveness(target_id, liveness)?;
        Ok(alive)
    }

    /// Number of pools created so far (cached pools, not connections).
    pub fn created_pools(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Drain and close every cached pool, bounded by the configured grace
    /// period per pool. Invoked once at process shutdown.
    pub async fn close_all(&self) {
        let pools: Vec<(String, AnyPool)> = {
            let map = self.pools.lock().expect("pool map lock poisoned");
            map.iter()
                .filter_map(|(id, cell)| cell.get().map(|p| (id.clone(), p.clone())))
                .collect()
        };

        let grace = Duration::from_secs(self.settings.close_grace_secs);
        for (target_id, pool) in pools {
            match tokio::time::timeout(grace, pool.close()).await {
                Ok(()) => info!(target_id = %target_id, "Closed connection pool"),
                Err(_) => warn!(
                    target_id = %target_id,
                    "Pool close exceeded {}s grace period", self.settings.close_grace_secs
                ),
            }
        }
    }
}
