//! Idempotent bulk migration of a local content tree into storage.
//!
//! - `plan`: walk the tree and compute deterministic destination keys
//! - `execute`: skip-if-exists upload with bounded retries
//! - `index`: per-folder `index.json` manifests in storage
//! - `catalog`: product table rows derived from a plan

mod catalog;
mod execute;
mod index;
mod plan;
mod sanitize;

pub use catalog::{build_catalog, insert_catalog, CatalogInsert, ProductRow};
pub use execute::{execute, failure_for_unit, ExecuteOptions, Migrator, UnitOutcome};
pub use index::{build_indexes, FolderManifest};
pub use plan::{
    mime_for, plan_migration, plan_migration_with, resolve_folder_name, MigrationPlan,
    MigrationUnit, PlanOptions,
};
pub use sanitize::{destination_key, product_folder_key, sanitize_key_component, MediaCategory};
