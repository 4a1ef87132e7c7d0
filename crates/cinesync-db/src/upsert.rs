//! Insert-or-update driver keyed by external id.
//!
//! Each record kind describes its table through [`Keyed`] and [`Upsert`];
//! [`upsert`] then splits a batch into new and existing rows with one bulk
//! lookup ([`ExistingIndex`]), inserts the new ones, refreshes the changed
//! ones and re-reads the generated ids.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::Debug;
use std::hash::Hash;

use anyhow::{Context, Result};
use rusqlite::types::{FromSql, ToSql};
use rusqlite::{Connection, Row};

use crate::error::DependencyNotResolved;

/// Maximum keys bound into one `IN (...)` lookup.
const LOOKUP_CHUNK: usize = 500;

/// A stored entity addressed by its provider-assigned key.
pub trait Keyed {
    /// External key type.
    type Key: Clone + Eq + Hash + Debug + ToSql + FromSql;
    /// Entity name used in logs and integrity reports.
    const ENTITY: &'static str;
    /// Table name.
    const TABLE: &'static str;
    /// Column holding the external key (`UNIQUE`).
    const KEY_COLUMN: &'static str;
}

/// A record the persister can insert or refresh.
pub trait Upsert: Keyed {
    /// Values of the refreshable columns, compared to skip no-op updates.
    type Snapshot: PartialEq + Debug;
    /// Columns written on insert, in `insert_values` order.
    const COLUMNS: &'static [&'static str];
    /// Columns an update may rewrite, in `refresh_values` order.
    const REFRESHABLE: &'static [&'static str];

    /// External key of this record.
    fn key(&self) -> Self::Key;
    /// Refreshable values of this record.
    fn snapshot(&self) -> Self::Snapshot;
    /// Reads a stored snapshot; refreshable columns start at index 2.
    ///
    /// # Errors
    ///
    /// Returns an error if a column cannot be converted.
    fn read_snapshot(row: &Row<'_>) -> rusqlite::Result<Self::Snapshot>;
    /// Values bound to `COLUMNS`.
    fn insert_values(&self) -> Vec<&dyn ToSql>;
    /// Values bound to `REFRESHABLE`.
    fn refresh_values(&self) -> Vec<&dyn ToSql>;
}

/// Stored id and refreshable snapshot of one existing row.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingRow<S> {
    /// Internal id.
    pub id: i64,
    /// Refreshable values as stored.
    pub snapshot: S,
}

/// External key to stored row, built once per batch.
#[derive(Debug)]
pub struct ExistingIndex<K, S> {
    rows: HashMap<K, ExistingRow<S>>,
}

impl<K: Eq + Hash, S> ExistingIndex<K, S> {
    /// Stored row for `key`, if any.
    pub fn get(&self, key: &K) -> Option<&ExistingRow<S>> {
        self.rows.get(key)
    }

    /// Number of stored rows found.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no stored row was found.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Looks up the stored rows for `keys` in bulk.
///
/// # Errors
///
/// Returns an error if the lookup query fails.
pub fn load_existing<R: Upsert>(
    conn: &Connection,
    keys: &[R::Key],
) -> Result<ExistingIndex<R::Key, R::Snapshot>> {
    let prefix = format!(
        "SELECT {key}, id, {cols} FROM {table} WHERE {key} IN",
        key = R::KEY_COLUMN,
        cols = R::REFRESHABLE.join(", "),
        table = R::TABLE,
    );
    let rows = query_chunks(conn, &prefix, keys, |row| {
        Ok((
            row.get::<_, R::Key>(0)?,
            ExistingRow {
                id: row.get(1)?,
                snapshot: R::read_snapshot(row)?,
            },
        ))
    })
    .with_context(|| format!("failed to look up existing {}", R::TABLE))?;

    Ok(ExistingIndex {
        rows: rows.into_iter().collect(),
    })
}

/// Counts of one persisted batch.
///
/// `inserted + updated` equals the number of distinct records; `unchanged`
/// is the part of `updated` whose stored values already matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    /// Rows created.
    pub inserted: usize,
    /// Existing rows matched by external key.
    pub updated: usize,
    /// Matched rows left untouched because nothing refreshable changed.
    pub unchanged: usize,
}

impl UpsertSummary {
    /// Rows accounted for by this summary.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.inserted.saturating_add(self.updated)
    }

    /// Adds `other` to this summary.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            inserted: self.inserted.saturating_add(other.inserted),
            updated: self.updated.saturating_add(other.updated),
            unchanged: self.unchanged.saturating_add(other.unchanged),
        }
    }
}

/// Summary and resolved internal ids of one upsert.
#[derive(Debug, Clone, Default)]
pub struct UpsertOutcome<K> {
    /// Counts.
    pub summary: UpsertSummary,
    /// External key to internal id of every distinct record.
    pub ids: HashMap<K, i64>,
}

/// Result of a persist call that also materializes relationships.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistOutcome {
    /// Upsert counts of the primary records.
    pub summary: UpsertSummary,
    /// Relationship rows created.
    pub linked: usize,
    /// Rows skipped because an endpoint had no stored row.
    pub unresolved: Vec<DependencyNotResolved>,
}

impl PersistOutcome {
    /// Outcome carrying only upsert counts.
    #[must_use]
    pub const fn from_summary(summary: UpsertSummary) -> Self {
        Self {
            summary,
            linked: 0,
            unresolved: Vec::new(),
        }
    }
}

/// Inserts new records and refreshes existing ones in one transaction.
///
/// Records sharing a key collapse to the last one. Existing rows are
/// rewritten only when their refreshable snapshot differs; identity
/// columns are never updated.
///
/// # Errors
///
/// Returns an error if any statement fails; the transaction is rolled back.
pub fn upsert<R: Upsert>(conn: &Connection, records: &[R]) -> Result<UpsertOutcome<R::Key>> {
    if records.is_empty() {
        return Ok(UpsertOutcome {
            summary: UpsertSummary::default(),
            ids: HashMap::new(),
        });
    }

    let tx = conn
        .unchecked_transaction()
        .context("failed to begin transaction")?;
    let outcome = upsert_in(&tx, records)?;
    tx.commit()
        .with_context(|| format!("failed to commit {} upsert", R::TABLE))?;
    Ok(outcome)
}

/// Same as [`upsert`], inside a transaction the caller already holds.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub fn upsert_in<R: Upsert>(tx: &Connection, records: &[R]) -> Result<UpsertOutcome<R::Key>> {
    let unique = dedup_by_key(records);
    if unique.is_empty() {
        return Ok(UpsertOutcome {
            summary: UpsertSummary::default(),
            ids: HashMap::new(),
        });
    }

    let keys: Vec<R::Key> = unique.iter().map(|r| r.key()).collect();
    let index = load_existing::<R>(tx, &keys)?;

    let mut summary = UpsertSummary::default();
    let mut ids: HashMap<R::Key, i64> = HashMap::with_capacity(unique.len());
    let mut inserted_keys: Vec<R::Key> = Vec::new();

    {
        let mut insert_stmt = tx
            .prepare(&insert_sql::<R>())
            .with_context(|| format!("failed to prepare {} insert", R::TABLE))?;
        let mut update_stmt = tx
            .prepare(&update_sql::<R>())
            .with_context(|| format!("failed to prepare {} update", R::TABLE))?;

        for (record, key) in unique.iter().zip(keys) {
            let Some(existing) = index.get(&key) else {
                insert_stmt
                    .execute(record.insert_values().as_slice())
                    .with_context(|| format!("failed to insert {} {key:?}", R::ENTITY))?;
                summary.inserted = summary.inserted.saturating_add(1);
                inserted_keys.push(key);
                continue;
            };

            summary.updated = summary.updated.saturating_add(1);
            if existing.snapshot == record.snapshot() {
                summary.unchanged = summary.unchanged.saturating_add(1);
            } else {
                let mut values = record.refresh_values();
                values.push(&existing.id);
                update_stmt
                    .execute(values.as_slice())
                    .with_context(|| format!("failed to update {} {key:?}", R::ENTITY))?;
            }
            ids.insert(key, existing.id);
        }
    }

    // Generated ids are read back by key rather than trusted from the insert.
    ids.extend(resolve_ids::<R>(tx, &inserted_keys)?);

    tracing::debug!(
        table = R::TABLE,
        inserted = summary.inserted,
        updated = summary.updated,
        unchanged = summary.unchanged,
        "upsert written"
    );

    Ok(UpsertOutcome { summary, ids })
}

/// Resolves internal ids for `keys`; keys without a stored row are absent.
///
/// # Errors
///
/// Returns an error if the lookup query fails.
pub fn resolve_ids<R: Keyed>(conn: &Connection, keys: &[R::Key]) -> Result<HashMap<R::Key, i64>> {
    let prefix = format!(
        "SELECT {key}, id FROM {table} WHERE {key} IN",
        key = R::KEY_COLUMN,
        table = R::TABLE,
    );
    let rows = query_chunks(conn, &prefix, keys, |row| {
        Ok((row.get::<_, R::Key>(0)?, row.get::<_, i64>(1)?))
    })
    .with_context(|| format!("failed to resolve {} ids", R::TABLE))?;

    Ok(rows.into_iter().collect())
}

/// Collapses records sharing a key, keeping first-seen order and last value.
fn dedup_by_key<R: Upsert>(records: &[R]) -> Vec<&R> {
    let mut position: HashMap<R::Key, usize> = HashMap::with_capacity(records.len());
    let mut unique: Vec<&R> = Vec::with_capacity(records.len());
    for record in records {
        match position.entry(record.key()) {
            Entry::Occupied(entry) => {
                if let Some(slot) = unique.get_mut(*entry.get()) {
                    *slot = record;
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(unique.len());
                unique.push(record);
            }
        }
    }
    unique
}

/// `INSERT ... ON CONFLICT(key) DO UPDATE` over the refreshable columns.
fn insert_sql<R: Upsert>() -> String {
    let on_conflict = if R::REFRESHABLE.is_empty() {
        String::from("DO NOTHING")
    } else {
        let sets: Vec<String> = R::REFRESHABLE
            .iter()
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        format!("DO UPDATE SET {}", sets.join(", "))
    };
    format!(
        "INSERT INTO {table} ({cols}) VALUES ({values}) ON CONFLICT({key}) {on_conflict}",
        table = R::TABLE,
        cols = R::COLUMNS.join(", "),
        values = placeholders(R::COLUMNS.len()),
        key = R::KEY_COLUMN,
    )
}

/// `UPDATE ... SET <refreshable> WHERE id = ?`.
fn update_sql<R: Upsert>() -> String {
    let sets: Vec<String> = R::REFRESHABLE.iter().map(|c| format!("{c} = ?")).collect();
    format!(
        "UPDATE {table} SET {sets} WHERE id = ?",
        table = R::TABLE,
        sets = sets.join(", "),
    )
}

/// `?, ?, ...` with `n` placeholders.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Runs `{prefix} (?, ...)` once per chunk of `keys` and collects the rows.
pub(crate) fn query_chunks<K, T, F>(
    conn: &Connection,
    prefix: &str,
    keys: &[K],
    mut map: F,
) -> rusqlite::Result<Vec<T>>
where
    K: ToSql,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut out = Vec::with_capacity(keys.len());
    for chunk in keys.chunks(LOOKUP_CHUNK) {
        let sql = format!("{prefix} ({})", placeholders(chunk.len()));
        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn ToSql> = chunk.iter().map(|k| -> &dyn ToSql { k }).collect();
        let rows = stmt.query_map(params.as_slice(), &mut map)?;
        for row in rows {
            out.push(row?);
        }
    }
    Ok(out)
}
