//! Steward server: the REST surface over the query workflow.
//!
//! Wires the registry, pool manager, stores and engines together and
//! exposes them as an axum application. Everything is constructed here
//! and injected; no component reaches for a global.

use anyhow::{Context, Result};
use axum::{routing::get, Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use steward_common::auth::StaticAuthorizer;
use steward_common::config::AppConfig;
use steward_engine::{DryRunEstimator, ExecutionEngine, RollbackEngine};
use steward_store::{MemoryCatalogStore, MemoryRecordStore, RecordStore};
use steward_targets::{Discovery, PoolManager, Target, TargetRegistry};
use steward_workflow::{StaticDirectory, TeamDerivedPolicy, UserDirectory, WorkflowEngine};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub mod api;

/// Shared handles behind every endpoint.
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<WorkflowEngine>,
    pub estimator: Arc<DryRunEstimator>,
    pub executor: Arc<ExecutionEngine>,
    pub rollback: Arc<RollbackEngine>,
    pub store: Arc<dyn RecordStore>,
    pub registry: Arc<TargetRegistry>,
    pub pools: Arc<PoolManager>,
    pub discovery: Arc<Discovery>,
}

/// Deployment file: targets plus the approver assignments the policy
/// reads. `roles` holds fallback approvers (role name to holders in
/// priority order) for submitters whose team has no leads.
#[derive(Debug, Default, Deserialize)]
pub struct DeploymentFile {
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub teams: HashMap<String, TeamLeads>,
    #[serde(default)]
    pub roles: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct TeamLeads {
    pub lead: Option<String>,
    pub skip_lead: Option<String>,
}

impl DeploymentFile {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read deployment file '{}'", path))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse deployment file '{}'", path))
    }

    fn directory(&self) -> StaticDirectory {
        let mut directory = StaticDirectory::new();
        for (team, leads) in &self.teams {
            directory = directory.with_team(
                team.clone(),
                leads.lead.as_deref(),
                leads.skip_lead.as_deref(),
            );
        }
        for (role, holders) in &self.roles {
            for holder in holders {
                directory = directory.with_role_holder(role.clone(), holder.clone());
            }
        }
        directory
    }
}

pub struct StewardServer {
    config_path: String,
    deployment_path: String,
    observability_enabled: bool,
    directory: Option<Arc<dyn UserDirectory>>,
}

impl Default for StewardServer {
    fn default() -> Self {
        Self {
            config_path: "config/steward.yaml".to_string(),
            deployment_path: "config/targets.yaml".to_string(),
            observability_enabled: false,
            directory: None,
        }
    }
}

impl StewardServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, path: &str) -> Self {
        self.config_path = path.to_string();
        self
    }

    pub fn with_deployment(mut self, path: &str) -> Self {
        self.deployment_path = path.to_string();
        self
    }

    pub fn with_observability(mut self, enabled: bool) -> Self {
        self.observability_enabled = enabled;
        self
    }

    /// Override the user directory the approver policy consults.
    pub fn with_directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub async fn run(self) -> Result<()> {
        let app_config = AppConfig::from_file(&self.config_path)?;

        let otel_layer = if self.observability_enabled {
            steward_common::telemetry::init_telemetry(
                &app_config.telemetry.service_name,
                &app_config.telemetry.endpoint,
            )?
        } else {
            Box::new(tracing_subscriber::layer::Identity::new())
        };
        let stdout_layer =
            tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
        tracing_subscriber::registry()
            .with(stdout_layer)
            .with(otel_layer)
            .try_init()
            .ok();

        let deployment = if std::path::Path::new(&self.deployment_path).exists() {
            DeploymentFile::from_file(&self.deployment_path)?
        } else {
            DeploymentFile::default()
        };

        let registry = Arc::new(TargetRegistry::new());
        for target in deployment.targets.iter().cloned() {
            let id = target.id.clone();
            registry
                .register(target)
                .with_context(|| format!("Failed to register target '{}'", id))?;
            info!(target = %id, "Target registered from deployment file");
        }

        let directory: Arc<dyn UserDirectory> = match self.directory {
            Some(directory) => directory,
            None => Arc::new(deployment.directory()),
        };

        let pools = Arc::new(PoolManager::new(registry.clone(), app_config.pool));
        let store: Arc<MemoryRecordStore> = Arc::new(MemoryRecordStore::new());
        let catalog = Arc::new(MemoryCatalogStore::new());
        let authorizer = Arc::new(StaticAuthorizer);

        let state = AppState {
            workflow: Arc::new(WorkflowEngine::new(
                store.clone(),
                registry.clone(),
                authorizer.clone(),
                Arc::new(TeamDerivedPolicy::new(directory)),
            )),
            estimator: Arc::new(DryRunEstimator::new(registry.clone(), pools.clone())),
            executor: Arc::new(ExecutionEngine::new(
                store.clone(),
                registry.clone(),
                pools.clone(),
                authorizer.clone(),
                app_config.execution.clone(),
            )),
            rollback: Arc::new(RollbackEngine::new(
                store.clone(),
                registry.clone(),
                pools.clone(),
                authorizer,
            )),
            store: store.clone(),
            registry: registry.clone(),
            pools: pools.clone(),
            discovery: Arc::new(Discovery::new(registry, pools.clone(), catalog)),
        };

        let app = Router::new()
            .route("/health", get(health_handler))
            .nest("/api/v1", api::create_api_router(state));

        let addr: SocketAddr = app_config
            .server
            .listen_addr
            .parse()
            .context("Invalid listen address")?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!(%addr, name = %app_config.server.name, "Steward server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutdown signal received");
            })
            .await?;

        // Drain every target pool before the process exits.
        pools.close_all().await;
        steward_common::telemetry::shutdown_telemetry();
        Ok(())
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_file_parses_targets_and_teams() {
        let yaml = r#"
targets:
  - id: reporting
    dialect: postgres
    host: db.internal
    port: 5432
    database: reports
    username: steward
    category: reporting
teams:
  data-eng:
    lead: alice
    skip_lead: bob
"#;
        let deployment: DeploymentFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(deployment.targets.len(), 1);
        assert_eq!(deployment.targets[0].id, "reporting");

        let directory = deployment.directory();
        assert_eq!(directory.team_lead("data-eng").as_deref(), Some("alice"));
        assert_eq!(directory.skip_lead("data-eng").as_deref(), Some("bob"));
    }

    #[test]
    fn test_deployment_roles_feed_fallback_approvers() {
        let yaml = r#"
roles:
  team-approver: [alice, dave]
  skip-approver: [bob]
"#;
        let deployment: DeploymentFile = serde_yaml::from_str(yaml).unwrap();
        let directory = deployment.directory();

        // A teamless submitter still gets a chain through these holders.
        assert_eq!(
            directory.first_with_role("team-approver").as_deref(),
            Some("alice")
        );
        assert_eq!(
            directory.first_with_role("skip-approver").as_deref(),
            Some("bob")
        );
    }

    #[test]
    fn test_empty_deployment_is_valid() {
        let deployment: DeploymentFile = serde_yaml::from_str("{}").unwrap();
        assert!(deployment.targets.is_empty());
        assert!(deployment.teams.is_empty());
    }
}
