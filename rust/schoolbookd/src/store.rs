//! Path-addressed JSON document tree persisted in SQLite.
//!
//! Every row of `documents` is one whole document stored at a slash-delimited
//! path. Reads resolve a path in three ways, in order: the exact document, a
//! value nested inside an ancestor document, or an object assembled from all
//! descendant documents. Writes keep the invariant that no stored path is an
//! ancestor of another stored path.

use crate::db;
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid path {path:?}: {reason}")]
    BadPath { path: String, reason: &'static str },

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("stored document at {path} is not valid JSON: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("document at {path} has an unexpected shape: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown subscription {0}")]
    UnknownSubscription(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocPath(Vec<String>);

impl DocPath {
    /// Parses `a/b/c`. Leading and trailing slashes are ignored.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(StoreError::BadPath {
                path: raw.to_string(),
                reason: "path is empty",
            });
        }
        Self::new(trimmed.split('/'))
    }

    pub fn new<I, S>(segments: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Vec::new();
        for seg in segments {
            out.push(check_segment(seg.as_ref())?);
        }
        if out.is_empty() {
            return Err(StoreError::BadPath {
                path: String::new(),
                reason: "path is empty",
            });
        }
        Ok(DocPath(out))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Strict ancestry: a path is not its own ancestor.
    pub fn is_ancestor_of(&self, other: &DocPath) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }

    pub fn is_related_to(&self, other: &DocPath) -> bool {
        self == other || self.is_ancestor_of(other) || other.is_ancestor_of(self)
    }

    fn strict_prefixes(&self) -> impl Iterator<Item = DocPath> + '_ {
        (1..self.0.len()).map(move |n| DocPath(self.0[..n].to_vec()))
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

fn check_segment(seg: &str) -> Result<String, StoreError> {
    let reason = if seg.is_empty() {
        Some("empty segment")
    } else if seg == "." || seg == ".." {
        Some("relative segment")
    } else if seg.contains('/') {
        Some("segment contains '/'")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(StoreError::BadPath {
            path: seg.to_string(),
            reason,
        }),
        None => Ok(seg.to_string()),
    }
}

#[derive(Debug, Clone)]
pub enum WriteOp {
    Set(DocPath, Value),
    Remove(DocPath),
}

impl WriteOp {
    pub fn path(&self) -> &DocPath {
        match self {
            WriteOp::Set(p, _) => p,
            WriteOp::Remove(p) => p,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub subscription_id: u64,
    pub path: String,
    pub value: Option<Value>,
}

/// Live subscriptions detached from a store, so they survive the store
/// being closed and reopened on another database file.
#[derive(Debug, Default)]
pub struct Subscriptions {
    paths: BTreeMap<u64, DocPath>,
    next_id: u64,
}

pub struct DocumentStore {
    conn: Connection,
    subscriptions: BTreeMap<u64, DocPath>,
    next_subscription_id: u64,
    touched: Vec<DocPath>,
    fresh: BTreeSet<u64>,
}

impl DocumentStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(Self::from_connection(db::open_db(workspace)?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            subscriptions: BTreeMap::new(),
            next_subscription_id: 1,
            touched: Vec::new(),
            fresh: BTreeSet::new(),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn get(&self, path: &DocPath) -> Result<Option<Value>, StoreError> {
        get_in(&self.conn, path)
    }

    pub fn get_as<T: DeserializeOwned>(&self, path: &DocPath) -> Result<Option<T>, StoreError> {
        match self.get(path)? {
            Some(v) => serde_json::from_value(v)
                .map(Some)
                .map_err(|source| StoreError::Decode {
                    path: path.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// All direct children of `path`, ordered by key.
    pub fn children(&self, path: &DocPath) -> Result<Vec<(String, Value)>, StoreError> {
        match self.get(path)? {
            Some(Value::Object(map)) => Ok(map.into_iter().collect()),
            _ => Ok(Vec::new()),
        }
    }

    pub fn children_as<T: DeserializeOwned>(
        &self,
        path: &DocPath,
    ) -> Result<Vec<(String, T)>, StoreError> {
        decode_children(path, self.children(path)?)
    }

    /// Children of `path` whose `field` equals `equals`, ordered by key.
    pub fn query(
        &self,
        path: &DocPath,
        field: &str,
        equals: &Value,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        Ok(self
            .children(path)?
            .into_iter()
            .filter(|(_, v)| v.get(field) == Some(equals))
            .collect())
    }

    pub fn query_as<T: DeserializeOwned>(
        &self,
        path: &DocPath,
        field: &str,
        equals: &Value,
    ) -> Result<Vec<(String, T)>, StoreError> {
        decode_children(path, self.query(path, field, equals)?)
    }

    pub fn set(&mut self, path: &DocPath, value: Value) -> Result<(), StoreError> {
        self.update(vec![WriteOp::Set(path.clone(), value)])
    }

    pub fn set_as<T: Serialize>(&mut self, path: &DocPath, value: &T) -> Result<(), StoreError> {
        let v = serde_json::to_value(value).map_err(|source| StoreError::Decode {
            path: path.to_string(),
            source,
        })?;
        self.set(path, v)
    }

    pub fn remove(&mut self, path: &DocPath) -> Result<(), StoreError> {
        self.update(vec![WriteOp::Remove(path.clone())])
    }

    /// Applies every operation in a single transaction.
    pub fn update(&mut self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for op in &ops {
            match op {
                WriteOp::Set(p, v) => set_in(&tx, p, v.clone())?,
                WriteOp::Remove(p) => remove_in(&tx, p)?,
            }
        }
        tx.commit()?;
        debug!(ops = ops.len(), "store update committed");
        self.touched.extend(ops.iter().map(|op| op.path().clone()));
        Ok(())
    }

    pub fn subscribe(&mut self, path: DocPath) -> u64 {
        let id = self.next_subscription_id;
        self.next_subscription_id += 1;
        debug!(subscription_id = id, path = %path, "subscribed");
        self.subscriptions.insert(id, path);
        self.fresh.insert(id);
        id
    }

    pub fn unsubscribe(&mut self, id: u64) -> Result<(), StoreError> {
        self.fresh.remove(&id);
        match self.subscriptions.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::UnknownSubscription(id)),
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Closes the store, keeping its subscription table.
    pub fn into_subscriptions(self) -> Subscriptions {
        Subscriptions {
            paths: self.subscriptions,
            next_id: self.next_subscription_id,
        }
    }

    /// Takes over subscriptions from a closed store. Ids are kept and every
    /// adopted subscription gets a snapshot on the next drain.
    pub fn adopt_subscriptions(&mut self, carried: Subscriptions) {
        debug!(count = carried.paths.len(), "subscriptions carried over");
        self.next_subscription_id = self.next_subscription_id.max(carried.next_id);
        self.fresh.extend(carried.paths.keys().copied());
        self.subscriptions.extend(carried.paths);
    }

    /// Snapshots for new subscriptions and for every subscription whose path
    /// was touched since the last drain. A subscription whose value cannot be
    /// read is skipped for this round; the others are still delivered.
    pub fn drain_snapshots(&mut self) -> Vec<Snapshot> {
        let touched = std::mem::take(&mut self.touched);
        let mut due = std::mem::take(&mut self.fresh);
        for (id, sub_path) in &self.subscriptions {
            if touched.iter().any(|t| t.is_related_to(sub_path)) {
                due.insert(*id);
            }
        }

        let mut out = Vec::with_capacity(due.len());
        for id in due {
            let Some(sub_path) = self.subscriptions.get(&id) else {
                continue;
            };
            match get_in(&self.conn, sub_path) {
                Ok(value) => out.push(Snapshot {
                    subscription_id: id,
                    path: sub_path.to_string(),
                    value,
                }),
                Err(e) => {
                    error!(subscription_id = id, path = %sub_path, error = %e, "snapshot read failed")
                }
            }
        }
        out
    }
}

fn decode_children<T: DeserializeOwned>(
    parent: &DocPath,
    children: Vec<(String, Value)>,
) -> Result<Vec<(String, T)>, StoreError> {
    children
        .into_iter()
        .map(|(k, v)| {
            serde_json::from_value(v)
                .map(|t| (k.clone(), t))
                .map_err(|source| StoreError::Decode {
                    path: format!("{}/{}", parent, k),
                    source,
                })
        })
        .collect()
}

fn parse_stored(path: &str, raw: &str) -> Result<Value, StoreError> {
    serde_json::from_str(raw).map_err(|source| StoreError::Corrupt {
        path: path.to_string(),
        source,
    })
}

fn read_doc(conn: &Connection, path: &DocPath) -> Result<Option<Value>, StoreError> {
    let key = path.to_string();
    let raw: Option<String> = conn
        .query_row("SELECT value FROM documents WHERE path = ?", [&key], |r| {
            r.get(0)
        })
        .optional()?;
    raw.map(|s| parse_stored(&key, &s)).transpose()
}

fn find_ancestor_doc(
    conn: &Connection,
    path: &DocPath,
) -> Result<Option<(DocPath, Value)>, StoreError> {
    for prefix in path.strict_prefixes() {
        if let Some(v) = read_doc(conn, &prefix)? {
            return Ok(Some((prefix, v)));
        }
    }
    Ok(None)
}

fn descendant_bounds(path: &DocPath) -> (String, String) {
    let key = path.to_string();
    // '0' is the byte after '/', so the range covers exactly "key/...".
    (format!("{}/", key), format!("{}0", key))
}

fn read_descendants(conn: &Connection, path: &DocPath) -> Result<Vec<(String, String)>, StoreError> {
    let (lo, hi) = descendant_bounds(path);
    let mut stmt = conn.prepare(
        "SELECT path, value FROM documents WHERE path > ? AND path < ? ORDER BY path",
    )?;
    let rows = stmt
        .query_map((&lo, &hi), |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn write_doc(conn: &Connection, path: &DocPath, value: &Value) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value).map_err(|source| StoreError::Decode {
        path: path.to_string(),
        source,
    })?;
    conn.execute(
        "INSERT INTO documents(path, value, updated_at) VALUES(?, ?, ?)
         ON CONFLICT(path) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        (path.to_string(), raw, chrono::Utc::now().to_rfc3339()),
    )?;
    Ok(())
}

fn delete_subtree(conn: &Connection, path: &DocPath) -> Result<(), StoreError> {
    let (lo, hi) = descendant_bounds(path);
    conn.execute(
        "DELETE FROM documents WHERE path = ? OR (path > ? AND path < ?)",
        (path.to_string(), lo, hi),
    )?;
    Ok(())
}

fn get_in(conn: &Connection, path: &DocPath) -> Result<Option<Value>, StoreError> {
    if let Some(v) = read_doc(conn, path)? {
        return Ok(Some(v));
    }
    if let Some((ancestor, doc)) = find_ancestor_doc(conn, path)? {
        return Ok(navigate(&doc, &path.segments()[ancestor.len()..]).cloned());
    }
    let rows = read_descendants(conn, path)?;
    if rows.is_empty() {
        return Ok(None);
    }
    let mut root = Value::Object(Map::new());
    for (stored, raw) in rows {
        let v = parse_stored(&stored, &raw)?;
        let child = DocPath::parse(&stored)?;
        insert_at(&mut root, &child.segments()[path.len()..], v);
    }
    Ok(Some(root))
}

fn set_in(conn: &Connection, path: &DocPath, value: Value) -> Result<(), StoreError> {
    if value.is_null() {
        return remove_in(conn, path);
    }
    if let Some((ancestor, mut doc)) = find_ancestor_doc(conn, path)? {
        insert_at(&mut doc, &path.segments()[ancestor.len()..], value);
        return write_doc(conn, &ancestor, &doc);
    }
    delete_subtree(conn, path)?;
    write_doc(conn, path, &value)
}

fn remove_in(conn: &Connection, path: &DocPath) -> Result<(), StoreError> {
    if let Some((ancestor, mut doc)) = find_ancestor_doc(conn, path)? {
        remove_at(&mut doc, &path.segments()[ancestor.len()..]);
        let emptied = doc.as_object().map(|m| m.is_empty()).unwrap_or(false);
        if emptied {
            return delete_subtree(conn, &ancestor);
        }
        return write_doc(conn, &ancestor, &doc);
    }
    delete_subtree(conn, path)
}

fn navigate<'a>(doc: &'a Value, rel: &[String]) -> Option<&'a Value> {
    rel.iter().try_fold(doc, |cur, seg| cur.as_object()?.get(seg))
}

fn insert_at(root: &mut Value, rel: &[String], value: Value) {
    let Some((head, rest)) = rel.split_first() else {
        *root = value;
        return;
    };
    if !root.is_object() {
        *root = Value::Object(Map::new());
    }
    if let Value::Object(map) = root {
        let slot = map
            .entry(head.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        insert_at(slot, rest, value);
    }
}

fn remove_at(root: &mut Value, rel: &[String]) {
    let Some((last, parents)) = rel.split_last() else {
        return;
    };
    let mut cur = root;
    for seg in parents {
        match cur.as_object_mut().and_then(|m| m.get_mut(seg)) {
            Some(next) => cur = next,
            None => return,
        }
    }
    if let Some(map) = cur.as_object_mut() {
        map.remove(last);
    }
}
