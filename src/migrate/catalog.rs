//! Product catalog rows derived from a migration plan.

use std::collections::HashSet;

use log::{debug, info};
use serde::Serialize;

use super::plan::MigrationPlan;
use super::sanitize::product_folder_key;
use crate::error_handling::{CatalogInsertError, SinkError};
use crate::sink::StorageSink;

/// Rows per `insert` call.
const CATALOG_BATCH_SIZE: usize = 100;

/// One product table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRow {
    /// Brand folder name as found on disk
    pub brand_name: String,
    /// Product folder name as found on disk
    pub product_name: String,
    /// Storage folder holding the product's media
    pub media_filepath: String,
}

/// One row per distinct (brand, product) in the plan, in plan order.
pub fn build_catalog(plan: &MigrationPlan) -> Vec<ProductRow> {
    let mut seen = HashSet::new();
    plan.units
        .iter()
        .filter_map(|unit| {
            let product = unit.product.as_deref()?;
            if !seen.insert((unit.subject.as_str(), product)) {
                return None;
            }
            Some(ProductRow {
                brand_name: unit.subject.clone(),
                product_name: product.to_string(),
                media_filepath: product_folder_key(&unit.subject, product)?,
            })
        })
        .collect()
}

/// Row counts of a finished catalog insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogInsert {
    /// Rows newly stored
    pub inserted: usize,
    /// Rows the table already held
    pub duplicates: usize,
}

/// Inserts `rows` into `table` in batches.
///
/// Rows the table already holds are not stored again, so a rerun only adds
/// what is missing.
///
/// # Errors
///
/// Stops at the first batch the sink rejects. Rows of earlier batches stay
/// inserted and are counted in the returned `CatalogInsertError`.
pub async fn insert_catalog(
    sink: &dyn StorageSink,
    table: &str,
    rows: &[ProductRow],
) -> Result<CatalogInsert, CatalogInsertError> {
    let mut done = CatalogInsert::default();
    for (index, batch) in rows.chunks(CATALOG_BATCH_SIZE).enumerate() {
        let stopped = |source: SinkError| CatalogInsertError {
            table: table.to_string(),
            inserted: done.inserted,
            duplicates: done.duplicates,
            remaining: rows.len() - index * CATALOG_BATCH_SIZE,
            source,
        };
        let values = batch
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| stopped(SinkError::Permanent(format!("{}: {}", table, e))))?;
        let stored = sink.insert(table, &values).await.map_err(stopped)?;
        done.inserted += stored;
        done.duplicates += batch.len().saturating_sub(stored);
        debug!(
            "Batch {}: {} new, {} already present in {}",
            index + 1,
            stored,
            batch.len().saturating_sub(stored),
            table
        );
    }
    info!(
        "Inserted {} product rows into {} ({} already present)",
        done.inserted, table, done.duplicates
    );
    Ok(done)
}
