//! The table manifest: which tables take part, and in what order.
//!
//! Every table appears after all tables it references through foreign keys.
//! Inserts walk the manifest forward (parents before children); replace-mode
//! deletes walk it in reverse (children before parents).
//!
//! The order is normally derived from the store's foreign key graph with a
//! topological sort. A hand-maintained order can be configured instead; it is
//! then checked against the same graph.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::config::ManifestConfig;
use crate::error::{PortError, Result};
use crate::store::introspect;

/// Foreign key dependencies: table name to the tables it references.
pub type DependencyGraph = BTreeMap<String, BTreeSet<String>>;

/// Ordered list of tables, parents before children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableManifest {
    tables: Vec<String>,
}

impl TableManifest {
    /// Use an order exactly as given.
    pub fn fixed<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tables: tables.into_iter().map(Into::into).collect(),
        }
    }

    /// Topologically sort a dependency graph.
    ///
    /// Ties are broken by table name so the order is stable across runs.
    /// Self-references and references to tables outside the graph do not
    /// constrain the order. A cycle is an error naming the tables caught in it.
    pub fn from_dependencies(graph: &DependencyGraph) -> Result<Self> {
        let mut remaining: HashMap<&str, usize> = HashMap::new();
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();

        for (table, parents) in graph {
            let parents: Vec<&str> = parents
                .iter()
                .map(String::as_str)
                .filter(|p| *p != table.as_str() && graph.contains_key(*p))
                .collect();
            remaining.insert(table, parents.len());
            for parent in parents {
                children.entry(parent).or_default().push(table);
            }
        }

        let mut ready: BTreeSet<&str> = remaining
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(t, _)| *t)
            .collect();
        let mut order = Vec::with_capacity(graph.len());

        while let Some(table) = ready.pop_first() {
            order.push(table.to_string());
            for child in children.get(table).into_iter().flatten() {
                if let Some(n) = remaining.get_mut(child) {
                    *n -= 1;
                    if *n == 0 {
                        ready.insert(*child);
                    }
                }
            }
        }

        if order.len() < graph.len() {
            let mut stuck: Vec<&str> = remaining
                .iter()
                .filter(|(_, n)| **n > 0)
                .map(|(t, _)| *t)
                .collect();
            stuck.sort_unstable();
            return Err(PortError::Schema(format!(
                "foreign key cycle between tables: {}",
                stuck.join(", ")
            )));
        }

        Ok(Self { tables: order })
    }

    /// Check that every table comes after the tables it references.
    pub fn verify(&self, graph: &DependencyGraph) -> Result<()> {
        let position: HashMap<&str, usize> = self
            .tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.as_str(), i))
            .collect();

        for (i, table) in self.tables.iter().enumerate() {
            let Some(parents) = graph.get(table) else {
                continue;
            };
            for parent in parents {
                if parent == table {
                    continue;
                }
                if let Some(&p) = position.get(parent.as_str()) {
                    if p > i {
                        return Err(PortError::Config(format!(
                            "manifest lists '{}' before '{}', which it references",
                            table, parent
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolve the manifest for a live store.
    ///
    /// With an explicit table list, every listed table must exist and the
    /// order must respect foreign keys. Otherwise the order is derived from
    /// all user tables minus the excluded ones.
    pub async fn resolve(pool: &SqlitePool, config: &ManifestConfig) -> Result<Self> {
        let existing = introspect::list_tables(pool).await?;

        let mut graph = DependencyGraph::new();
        for table in &existing {
            let parents = introspect::foreign_keys(pool, table)
                .await?
                .into_iter()
                .map(|fk| fk.ref_table)
                .collect();
            graph.insert(table.clone(), parents);
        }

        let manifest = if config.tables.is_empty() {
            graph.retain(|t, _| !config.exclude.contains(t));
            Self::from_dependencies(&graph)?
        } else {
            if let Some(missing) = config.tables.iter().find(|t| !graph.contains_key(*t)) {
                return Err(PortError::Config(format!(
                    "manifest table '{}' does not exist in the database",
                    missing
                )));
            }
            let manifest = Self::fixed(config.tables.iter().cloned());
            manifest.verify(&graph)?;
            manifest
        };

        debug!("Table manifest: {:?}", manifest.tables);
        info!("Resolved table manifest with {} tables", manifest.len());
        Ok(manifest)
    }

    /// Tables in insertion order.
    pub fn forward(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(String::as_str)
    }

    /// Tables in deletion order.
    pub fn reverse(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().rev().map(String::as_str)
    }

    /// Check if a table is part of the manifest.
    pub fn contains(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t == table)
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Check if the manifest has no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Table names in insertion order.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }
}
