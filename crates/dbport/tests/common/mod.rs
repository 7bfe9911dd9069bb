//! Shared fixture: a small task-tracker schema in a throwaway SQLite file.

#![allow(dead_code)]

use std::path::PathBuf;

use dbport::{Config, Orchestrator};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::TempDir;

pub const SCHEMA: &[&str] = &[
    "CREATE TABLE projects (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        archived INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE tags (
        id INTEGER PRIMARY KEY,
        label TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE tasks (
        id INTEGER PRIMARY KEY,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        parent_id INTEGER REFERENCES tasks(id),
        title TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'todo' CHECK (status IN ('todo', 'in_progress', 'done')),
        estimate REAL
    )",
    "CREATE TABLE task_tags (
        task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (task_id, tag_id)
    )",
    "CREATE TABLE sessions (
        id INTEGER PRIMARY KEY,
        task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
        started_at TEXT NOT NULL,
        duration_secs INTEGER
    )",
];

pub const SEED: &[&str] = &[
    "INSERT INTO projects VALUES (1, 'Home', 0), (2, 'Work', 1)",
    "INSERT INTO tags VALUES (1, 'urgent'), (2, 'errand'), (3, 'deep-work')",
    "INSERT INTO tasks VALUES
        (1, 1, NULL, 'Groceries', 'todo', 0.5),
        (2, 1, 1, 'Buy milk', 'done', NULL),
        (3, 2, NULL, 'Quarterly report', 'in_progress', 6.0),
        (4, 2, 3, 'Collect numbers', 'todo', 1.25)",
    "INSERT INTO task_tags VALUES (1, 2), (2, 2), (3, 1), (3, 3)",
    "INSERT INTO sessions VALUES
        (1, 3, '2026-03-01T09:00:00Z', 1500),
        (2, 3, '2026-03-01T10:00:00Z', NULL),
        (3, 4, '2026-03-02T14:30:00Z', 900)",
];

/// Manifest order the fixture schema derives to.
pub const MANIFEST: &[&str] = &["projects", "tags", "tasks", "sessions", "task_tags"];

/// Row counts of the seeded fixture, in manifest order.
pub const SEEDED_COUNTS: &[(&str, i64)] = &[
    ("projects", 2),
    ("tags", 3),
    ("tasks", 4),
    ("sessions", 3),
    ("task_tags", 4),
];

/// Create `name` in `dir` with the fixture schema, optionally seeded.
pub async fn create_db(dir: &TempDir, name: &str, seed: bool) -> PathBuf {
    create_db_with(dir, name, seed, &[]).await
}

/// Like [`create_db`], running `extra` statements after the schema.
pub async fn create_db_with(dir: &TempDir, name: &str, seed: bool, extra: &[&str]) -> PathBuf {
    let path = dir.path().join(name);
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    let seed_rows: &[&str] = if seed { SEED } else { &[] };
    for sql in SCHEMA.iter().chain(extra).chain(seed_rows) {
        sqlx::query(sql).execute(&pool).await.unwrap();
    }
    pool.close().await;
    path
}

/// Open an orchestrator on a fixture database.
pub async fn open(dir: &TempDir, name: &str, seed: bool) -> Orchestrator {
    let path = create_db(dir, name, seed).await;
    Orchestrator::new(Config::for_database(path)).await.unwrap()
}

/// Current row count of a table.
pub async fn count(orchestrator: &Orchestrator, table: &str) -> i64 {
    orchestrator
        .store()
        .count_rows(table)
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("table {} missing", table))
}

/// Current row counts in manifest order.
pub async fn counts(orchestrator: &Orchestrator) -> Vec<(String, i64)> {
    orchestrator
        .diagnostics()
        .await
        .unwrap()
        .tables
        .into_iter()
        .map(|(table, n)| (table, n.unwrap_or(-1)))
        .collect()
}

/// Seeded counts as owned pairs, for comparing with [`counts`].
pub fn seeded_counts() -> Vec<(String, i64)> {
    SEEDED_COUNTS
        .iter()
        .map(|(table, n)| (table.to_string(), *n))
        .collect()
}
