//! Destination table lifecycle
//!
//! Before a pipeline writes into a table, the table must exist with the
//! expected schema and hold no rows. [`Lifecycle::prepare`] gets it there
//! with the cheapest action:
//!
//! | Destination | `force` | Action |
//! |-------------|---------|--------|
//! | exists, row count matches the source | no | skip |
//! | exists, columns match the schema | no | truncate |
//! | anything else | any | drop (if exists) + create |
//!
//! A skipped table is left alone: the caller must not run a pipeline into it.
//! Derived tables have no source row count, so a partial table left by an
//! interrupted run cannot be told apart from a complete one. They are always
//! rebuilt.

use std::fmt;
use std::sync::Arc;

use mpat_protocol::TableKind;
use mpat_store::{Store, TableInfo};
use tracing::info;

use crate::error::{JobError, Result};

/// What an up-to-date destination looks like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// Same row count as the source table
    Rows(u64),
    /// No source to compare against (derived tables); never met
    Rebuild,
}

impl Expectation {
    fn is_met_by(self, dest: &TableInfo) -> bool {
        match self {
            Self::Rows(rows) => dest.exists && dest.num_rows == rows,
            Self::Rebuild => false,
        }
    }
}

/// Action taken on a destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Already coherent; nothing to do
    Skip,
    /// Right shape, stale content
    Truncate,
    /// Missing, wrong shape or forced
    Recreate,
}

impl Decision {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Truncate => "truncate",
            Self::Recreate => "recreate",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the action for `dest`
pub fn decide(dest: &TableInfo, kind: TableKind, expected: Expectation, force: bool) -> Decision {
    if force {
        return Decision::Recreate;
    }
    if expected.is_met_by(dest) {
        return Decision::Skip;
    }
    if dest.exists && kind.matches_columns(&dest.columns) {
        return Decision::Truncate;
    }
    Decision::Recreate
}

/// Prepares destination tables on one store
#[derive(Clone)]
pub struct Lifecycle {
    store: Arc<dyn Store>,
}

impl Lifecycle {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Bring `table` to an empty table of `kind`, unless it already meets
    /// `expected`
    ///
    /// After `Truncate` or `Recreate` the table is checked to exist, have the
    /// `kind` columns and hold no rows.
    pub async fn prepare(
        &self,
        table: &str,
        kind: TableKind,
        expected: Expectation,
        force: bool,
    ) -> Result<Decision> {
        let dest = self.info(table).await?;
        let decision = decide(&dest, kind, expected, force);

        match decision {
            Decision::Skip => {}
            Decision::Truncate => self.store.truncate_table(table).await?,
            Decision::Recreate => {
                if dest.exists {
                    self.store.drop_table(table).await?;
                }
                self.store.create_table(table, kind).await?;
            }
        }

        if decision != Decision::Skip {
            let prepared = self.info(table).await?;
            if !prepared.exists || prepared.num_rows != 0 || !kind.matches_columns(&prepared.columns) {
                return Err(JobError::NotPrepared {
                    table: table.to_string(),
                    kind,
                });
            }
        }

        info!(
            table = table,
            kind = %kind,
            decision = %decision,
            existing_rows = dest.num_rows,
            force = force,
            "prepared destination"
        );
        Ok(decision)
    }

    async fn info(&self, table: &str) -> Result<TableInfo> {
        let mut infos = self.store.info(&[table.to_string()]).await?;
        Ok(infos.pop().unwrap_or_else(|| TableInfo::missing(table)))
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "lifecycle_test.rs"]
mod lifecycle_test;
