use crate::dialect::Dialect;
use crate::pool::PoolManager;
use crate::registry::TargetRegistry;
use sqlx::any::AnyRow;
use sqlx::Row;
use std::sync::Arc;
use steward_common::models::{ColumnDescriptor, TableDescriptor};
use steward_error::Result;
use steward_store::CatalogStore;
use tracing::{info, warn};

/// System-catalog discovery for one target, feeding the external table
/// catalog.
///
/// Discovery is a read-side convenience: when the target is unreachable
/// the previously discovered (cached) table list is returned instead of
/// failing the request. Execution and rollback never degrade this way.
pub struct Discovery {
    registry: Arc<TargetRegistry>,
    pools: Arc<PoolManager>,
    catalog: Arc<dyn CatalogStore>,
}

impl Discovery {
    pub fn new(
        registry: Arc<TargetRegistry>,
        pools: Arc<PoolManager>,
        catalog: Arc<dyn CatalogStore>,
    ) -> Self {
        Self {
            registry,
            pools,
            catalog,
        }
    }

    /// Enumerate tables and views outside system-owned schemas, fetch
    /// column metadata for each, and merge the result into the catalog
    /// idempotently. A single table's column fetch failure is logged and
    /// that table skipped; it never fails the whole run.
    pub async fn discover_tables(
        &self,
        target_id: &str,
        schema_filter: Option<&str>,
    ) -> Result<Vec<TableDescriptor>> {
        let target = self.registry.get(target_id)?;

        let pool = match self.pools.get_or_create(target_id).await {
            Ok(pool) => pool,
            Err(e) => {
                warn!(
                    target_id = %target_id,
                    "Target unreachable, falling back to cached catalog: {}", e
                );
                return self.catalog.tables_for_target(target_id).await;
            }
        };

        let listing_sql = target.dialect.table_listing_sql(schema_filter);
        let rows = match sqlx::query(&listing_sql).fetch_all(&pool).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(
                    target_id = %target_id,
                    "Catalog listing failed, falling back to cached catalog: {}", e
                );
                return self.catalog.tables_for_target(target_id).await;
            }
        };

        let mut discovered = Vec::new();
        for row in rows {
            let schema: String = match row.try_get(0) {
                Ok(s) => s,
                Err(e) => {
                    warn!(target_id = %target_id, "Malformed catalog row: {}", e);
                    continue;
                }
            };
            let name: String = match row.try_get(1) {
                Ok(s) => s,
                Err(e) => {
                    warn!(target_id = %target_id, "Malformed catalog row: {}", e);
                    continue;
                }
            };

            let column_sql = target.dialect.column_listing_sql(&schema, &name);
            let columns = match sqlx::query(&column_sql).fetch_all(&pool).await {
                Ok(rows) => rows
                    .iter()
                    .filter_map(|r| parse_column_row(target.dialect, r))
                    .collect(),
                Err(e) => {
                    warn!(
                        target_id = %target_id,
                        table = %name,
                        "Column fetch failed, skipping table: {}", e
                    );
                    continue;
                }
            };

            discovered.push(TableDescriptor {
                schema,
                name,
                columns,
            });
        }

        let added = self
            .catalog
            .merge_tables(target_id, discovered.clone())
            .await?;
        info!(
            target_id = %target_id,
            discovered = discovered.len(),
            added,
            "Discovery run complete"
        );
        Ok(discovered)
    }
}

fn parse_column_row(dialect: Dialect, row: &AnyRow) -> Option<ColumnDescriptor> {
    match dialect {
        Dialect::Postgres | Dialect::MySql => {
            let name: String = row.try_get(0).ok()?;
            let data_type: String = row.try_get(1).ok()?;
            let length = get_integer(row, 2).and_then(|n| u32::try_from(n).ok());
            let nullable: String = row.try_get(3).ok()?;
            Some(ColumnDescriptor {
                name,
                data_type,
                length,
                nullable: nullable.eq_ignore_ascii_case("yes"),
            })
        }
        // PRAGMA table_info: (cid, name, type, notnull, dflt_value, pk)
        Dialect::Sqlite => {
            let name: String = row.try_get(1).ok()?;
            let data_type: String = row.try_get(2).ok()?;
            let not_null = get_integer(row, 3).unwrap_or(0);
            Some(ColumnDescriptor {
                name,
                data_type,
                length: None,
                nullable: not_null == 0,
            })
        }
    }
}

// The Any driver surfaces integer catalog columns as i32 or i64 depending
// on the backend.
fn get_integer(row: &AnyRow, index: usize) -> Option<i64> {
    row.try_get::<i64, _>(index)
        .ok()
        .or_else(|| row.try_get::<i32, _>(index).ok().map(i64::from))
}
