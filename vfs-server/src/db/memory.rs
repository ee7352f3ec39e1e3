//! In-memory implementation of the VFS database functions
//!
//! Behaves like the PostgreSQL functions as far as this API can observe:
//! same function names, argument order, result columns and error phrases.
//! Each transaction holds the state lock from `begin` to `commit`, so
//! transactions are serializable. Rollback restores a snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Connection, Connector, DbError, Param, Row, Statement};
use crate::models::{
    ChildCounts, DirectoryDetails, DirectoryListResponse, DirectoryTree, FileDetails, FileTags,
    ItemSearchResponse, ItemSearchResultDirectory, ItemSearchResultFile, ItemType, Metadata,
    ShortDetails, TreeItem, PUBLIC_USER_TOKEN,
};

// SQLSTATE codes raised by the functions
const NO_DATA_FOUND: &str = "P0002";
const UNIQUE_VIOLATION: &str = "23505";
const RAISE_EXCEPTION: &str = "P0001";
const UNDEFINED_FUNCTION: &str = "42883";

/// Shared in-memory database. Clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<VfsState>>,
    connect_failures: Arc<AtomicU32>,
    opened: Arc<AtomicUsize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` connection attempts fail.
    pub fn fail_next_connects(&self, n: u32) {
        self.connect_failures.store(n, Ordering::SeqCst);
    }

    /// Connections successfully opened so far.
    pub fn connections_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryBackend {
    async fn connect(&self) -> Result<Box<dyn Connection>, DbError> {
        let failed = self
            .connect_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(DbError::Connect("connection refused".into()));
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            state: Arc::clone(&self.state),
            tx: None,
        }))
    }
}

struct Transaction {
    guard: OwnedMutexGuard<VfsState>,
    snapshot: VfsState,
}

struct MemoryConnection {
    state: Arc<Mutex<VfsState>>,
    tx: Option<Transaction>,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn ping(&mut self) -> Result<(), DbError> {
        Ok(())
    }

    async fn begin(&mut self) -> Result<(), DbError> {
        if self.tx.is_some() {
            return Err(DbError::query(
                Some("25001"),
                "there is already a transaction in progress",
            ));
        }
        let guard = Arc::clone(&self.state).lock_owned().await;
        let snapshot = guard.clone();
        self.tx = Some(Transaction { guard, snapshot });
        Ok(())
    }

    async fn run(&mut self, statement: &Statement) -> Result<Vec<Row>, DbError> {
        match self.tx.as_mut() {
            Some(tx) => tx.guard.apply(statement),
            // autocommit; every function validates before mutating
            None => self.state.lock().await.apply(statement),
        }
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.tx = None;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        if let Some(Transaction { mut guard, snapshot }) = self.tx.take() {
            *guard = snapshot;
        }
        Ok(())
    }

    fn is_broken(&self) -> bool {
        self.tx.is_some()
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if let Some(Transaction { mut guard, snapshot }) = self.tx.take() {
            *guard = snapshot;
        }
    }
}

#[derive(Debug, Clone)]
struct DirRecord {
    id: Uuid,
    owner: String,
    name: String,
    parent_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct FileRecord {
    id: Uuid,
    owner: String,
    name: String,
    parent_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    storage_id: String,
    metadata: Metadata,
    tags: Vec<i64>,
}

#[derive(Debug, Clone)]
struct TagRecord {
    id: i64,
    owner: String,
    name: String,
}

#[derive(Debug, Clone, Default)]
struct VfsState {
    directories: HashMap<Uuid, DirRecord>,
    files: HashMap<Uuid, FileRecord>,
    tags: Vec<TagRecord>,
    next_tag_id: i64,
}

fn not_found(message: impl Into<String>) -> DbError {
    DbError::query(Some(NO_DATA_FOUND), message)
}

fn conflict(message: impl Into<String>) -> DbError {
    DbError::query(Some(UNIQUE_VIOLATION), message)
}

fn raise(message: impl Into<String>) -> DbError {
    DbError::query(Some(RAISE_EXCEPTION), message)
}

fn single<T: Serialize>(function: &'static str, column: &str, value: &T) -> Result<Vec<Row>, DbError> {
    let value = serde_json::to_value(value).map_err(|e| DbError::decode(function, e.to_string()))?;
    let mut columns = Map::new();
    columns.insert(column.to_string(), value);
    Ok(vec![Row::new(columns)])
}

fn record<T: Serialize>(value: &T) -> Result<Vec<Row>, DbError> {
    Row::from_serialize(value).map(|row| vec![row])
}

/// Positional argument access with PostgreSQL-like complaints.
struct Args<'a>(&'a Statement);

impl<'a> Args<'a> {
    fn param(&self, i: usize) -> Option<&'a Param> {
        self.0.param(i)
    }

    fn uuid(&self, i: usize) -> Option<Uuid> {
        self.param(i).and_then(Param::as_uuid)
    }

    fn required_uuid(&self, i: usize, what: &str) -> Result<Uuid, DbError> {
        self.uuid(i)
            .ok_or_else(|| raise(format!("{} must not be null", what)))
    }

    fn text(&self, i: usize) -> Option<&'a str> {
        self.param(i).and_then(Param::as_text)
    }

    fn required_text(&self, i: usize, what: &str) -> Result<&'a str, DbError> {
        self.text(i)
            .ok_or_else(|| raise(format!("{} must not be null", what)))
    }

    fn token(&self, i: usize) -> &'a str {
        self.text(i).unwrap_or(PUBLIC_USER_TOKEN)
    }

    fn tags(&self, i: usize) -> &'a [String] {
        self.param(i).and_then(Param::as_text_array).unwrap_or(&[])
    }

    /// JSON object argument; SQL NULL and JSON null are both absent.
    fn object(&self, i: usize, what: &str) -> Result<Option<Metadata>, DbError> {
        match self.param(i).and_then(Param::as_json) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map.clone())),
            Some(_) => Err(raise(format!("{} must be a JSON object", what))),
        }
    }
}

impl VfsState {
    fn apply(&mut self, statement: &Statement) -> Result<Vec<Row>, DbError> {
        let a = Args(statement);
        match (statement.function(), statement.params().len()) {
            ("directory_list", 2) => self.directory_list(a.uuid(0), a.token(1)),
            ("directory_tree", 3) => {
                let level = a.param(2).and_then(Param::as_int).unwrap_or(100);
                self.directory_tree(a.uuid(0), a.token(1), level)
            }
            ("directory_details", 2) => self.directory_details(a.required_uuid(0, "dir_id")?, a.token(1)),
            ("directory_create", 3) => {
                self.directory_create(a.required_text(0, "name")?, a.uuid(1), a.token(2))
            }
            ("directory_update", 4) => self.directory_update(
                a.required_uuid(0, "dir_id")?,
                a.text(1),
                a.uuid(2),
                a.token(3),
            ),
            ("directory_copy", 3) => {
                self.directory_copy(a.required_uuid(0, "dir_id")?, a.uuid(1), a.token(2))
            }
            ("directory_delete", 3) => {
                let recursive = a.param(1).and_then(Param::as_bool).unwrap_or(false);
                self.directory_delete(a.required_uuid(0, "dir_id")?, recursive, a.token(2))
            }
            ("file_details", 2) => self.file_details(a.required_uuid(0, "file_id")?, a.token(1)),
            ("file_create", 5) => self.file_create(
                a.required_text(0, "filename")?,
                a.uuid(1),
                a.token(2),
                a.required_text(3, "storage_id")?,
                a.object(4, "metadata")?,
            ),
            ("file_update", 5) => self.file_update(
                a.required_uuid(0, "file_id")?,
                a.text(1),
                a.uuid(2),
                a.object(3, "metadata")?,
                a.token(4),
            ),
            ("file_delete", 2) => self.file_delete(a.required_uuid(0, "file_id")?, a.token(1)),
            ("file_copy", 3) => {
                self.file_copy(a.required_uuid(0, "file_id")?, a.uuid(1), a.token(2))
            }
            ("file_tags_add", 3) => {
                self.file_tags(a.required_uuid(0, "file_id")?, a.tags(1), a.token(2), TagOp::Add)
            }
            ("file_tags_remove", 3) => {
                self.file_tags(a.required_uuid(0, "file_id")?, a.tags(1), a.token(2), TagOp::Remove)
            }
            ("file_tags_set", 3) => {
                self.file_tags(a.required_uuid(0, "file_id")?, a.tags(1), a.token(2), TagOp::Set)
            }
            ("tags_list", 1) => self.tags_list(a.token(0)),
            ("item_search", 6) => self.item_search(
                a.text(0),
                a.text(1).unwrap_or("all"),
                a.uuid(2),
                a.tags(3),
                a.object(4, "metadata")?,
                a.token(5),
            ),
            (name, arity) => Err(DbError::query(
                Some(UNDEFINED_FUNCTION),
                format!("function {} with {} arguments does not exist", name, arity),
            )),
        }
    }

    // --- lookups -------------------------------------------------------

    fn dir(&self, id: Uuid, token: &str) -> Option<&DirRecord> {
        self.directories.get(&id).filter(|d| d.owner == token)
    }

    fn file(&self, id: Uuid, token: &str) -> Option<&FileRecord> {
        self.files.get(&id).filter(|f| f.owner == token)
    }

    fn check_parent(&self, parent_id: Option<Uuid>, token: &str) -> Result<(), DbError> {
        match parent_id {
            Some(id) if self.dir(id, token).is_none() => {
                Err(not_found("Parent directory not found or access denied"))
            }
            _ => Ok(()),
        }
    }

    /// Directory and file names share one namespace per parent and owner.
    fn name_taken(&self, parent_id: Option<Uuid>, token: &str, name: &str, except: Option<Uuid>) -> bool {
        let clash = |id: Uuid, owner: &str, parent: Option<Uuid>, n: &str| {
            Some(id) != except && owner == token && parent == parent_id && n == name
        };
        self.directories
            .values()
            .any(|d| clash(d.id, &d.owner, d.parent_id, &d.name))
            || self
                .files
                .values()
                .any(|f| clash(f.id, &f.owner, f.parent_id, &f.name))
    }

    /// True when `start` is `ancestor` or lies below it.
    fn is_within(&self, start: Option<Uuid>, ancestor: Uuid) -> bool {
        let mut current = start;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.directories.get(&id).and_then(|d| d.parent_id);
        }
        false
    }

    fn child_dirs(&self, parent_id: Option<Uuid>, token: &str) -> Vec<&DirRecord> {
        let mut dirs: Vec<_> = self
            .directories
            .values()
            .filter(|d| d.owner == token && d.parent_id == parent_id)
            .collect();
        dirs.sort_by(|a, b| a.name.cmp(&b.name));
        dirs
    }

    fn child_files(&self, parent_id: Option<Uuid>, token: &str) -> Vec<&FileRecord> {
        let mut files: Vec<_> = self
            .files
            .values()
            .filter(|f| f.owner == token && f.parent_id == parent_id)
            .collect();
        files.sort_by(|a, b| a.name.cmp(&b.name));
        files
    }

    fn dir_details(&self, d: &DirRecord) -> DirectoryDetails {
        let directories = self.child_dirs(Some(d.id), &d.owner).len() as i64;
        let files = self.child_files(Some(d.id), &d.owner).len() as i64;
        DirectoryDetails {
            id: d.id,
            name: d.name.clone(),
            created_at: d.created_at,
            updated_at: d.updated_at,
            parent_id: d.parent_id,
            child_counts: ChildCounts {
                directories,
                files,
                total: directories + files,
            },
        }
    }

    fn file_tag_set(&self, f: &FileRecord) -> FileTags {
        let mut tags = FileTags::default();
        for id in &f.tags {
            if let Some(tag) = self.tags.iter().find(|t| t.id == *id) {
                tags.names.push(tag.name.clone());
                tags.ids.push(tag.id);
            }
        }
        tags
    }

    fn file_record_details(&self, f: &FileRecord) -> FileDetails {
        FileDetails {
            id: f.id,
            name: f.name.clone(),
            created_at: f.created_at,
            updated_at: f.updated_at,
            parent_id: f.parent_id,
            storage_id: f.storage_id.clone(),
            metadata: f.metadata.clone(),
            tags: self.file_tag_set(f),
        }
    }

    fn tag_id(&mut self, name: &str, token: &str) -> i64 {
        if let Some(tag) = self.tags.iter().find(|t| t.owner == token && t.name == name) {
            return tag.id;
        }
        self.next_tag_id += 1;
        let id = self.next_tag_id;
        self.tags.push(TagRecord {
            id,
            owner: token.to_string(),
            name: name.to_string(),
        });
        id
    }

    // --- directories ---------------------------------------------------

    fn directory_list(&self, parent_id: Option<Uuid>, token: &str) -> Result<Vec<Row>, DbError> {
        self.check_parent(parent_id, token)?;
        let short = |id, name: &str, created_at| ShortDetails {
            id,
            name: name.to_string(),
            created_at,
        };
        record(&DirectoryListResponse {
            directories: self
                .child_dirs(parent_id, token)
                .into_iter()
                .map(|d| short(d.id, &d.name, d.created_at))
                .collect(),
            files: self
                .child_files(parent_id, token)
                .into_iter()
                .map(|f| short(f.id, &f.name, f.created_at))
                .collect(),
        })
    }

    fn tree(&self, parent_id: Option<Uuid>, token: &str, depth: i32) -> Vec<TreeItem> {
        if depth <= 0 {
            return Vec::new();
        }
        let dirs = self.child_dirs(parent_id, token).into_iter().map(|d| TreeItem {
            id: d.id,
            name: d.name.clone(),
            created_at: d.created_at,
            kind: ItemType::Directory,
            children: Some(self.tree(Some(d.id), token, depth - 1)),
        });
        let files = self.child_files(parent_id, token).into_iter().map(|f| TreeItem {
            id: f.id,
            name: f.name.clone(),
            created_at: f.created_at,
            kind: ItemType::File,
            children: None,
        });
        dirs.chain(files).collect()
    }

    fn directory_tree(&self, parent_id: Option<Uuid>, token: &str, level: i32) -> Result<Vec<Row>, DbError> {
        self.check_parent(parent_id, token)?;
        record(&DirectoryTree {
            tree: self.tree(parent_id, token, level),
        })
    }

    fn directory_details(&self, id: Uuid, token: &str) -> Result<Vec<Row>, DbError> {
        match self.dir(id, token) {
            Some(d) => single("directory_details", "directory_details", &self.dir_details(d)),
            None => Ok(Vec::new()),
        }
    }

    fn directory_create(&mut self, name: &str, parent_id: Option<Uuid>, token: &str) -> Result<Vec<Row>, DbError> {
        self.check_parent(parent_id, token)?;
        if self.name_taken(parent_id, token, name, None) {
            return Err(conflict(format!("Directory '{}' already exists", name)));
        }

        let now = Utc::now();
        let dir = DirRecord {
            id: Uuid::new_v4(),
            owner: token.to_string(),
            name: name.to_string(),
            parent_id,
            created_at: now,
            updated_at: now,
        };
        let details = self.dir_details(&dir);
        self.directories.insert(dir.id, dir);
        single("directory_create", "directory_details", &details)
    }

    fn directory_update(
        &mut self,
        id: Uuid,
        name: Option<&str>,
        parent_id: Option<Uuid>,
        token: &str,
    ) -> Result<Vec<Row>, DbError> {
        let current = self
            .dir(id, token)
            .cloned()
            .ok_or_else(|| not_found("Directory not found or access denied"))?;

        let new_name = name.unwrap_or(&current.name).to_string();
        let new_parent = parent_id.or(current.parent_id);

        if parent_id.is_some() {
            self.check_parent(new_parent, token)?;
            if self.is_within(new_parent, id) {
                return Err(raise("cannot move a directory into itself or its descendants"));
            }
        }
        if self.name_taken(new_parent, token, &new_name, Some(id)) {
            return Err(conflict(format!("Directory '{}' already exists", new_name)));
        }

        let dir = DirRecord {
            name: new_name,
            parent_id: new_parent,
            updated_at: Utc::now(),
            ..current
        };
        let details = self.dir_details(&dir);
        self.directories.insert(id, dir);
        single("directory_update", "directory_details", &details)
    }

    fn copy_subtree(&mut self, source: Uuid, parent_id: Option<Uuid>, token: &str) -> Uuid {
        let now = Utc::now();
        let Some(original) = self.directories.get(&source).cloned() else {
            return source;
        };
        let copy = DirRecord {
            id: Uuid::new_v4(),
            parent_id,
            created_at: now,
            updated_at: now,
            ..original
        };
        let copy_id = copy.id;
        self.directories.insert(copy_id, copy);

        let files: Vec<FileRecord> = self
            .child_files(Some(source), token)
            .into_iter()
            .cloned()
            .collect();
        for f in files {
            let id = Uuid::new_v4();
            self.files.insert(
                id,
                FileRecord {
                    id,
                    parent_id: Some(copy_id),
                    created_at: now,
                    updated_at: now,
                    ..f
                },
            );
        }

        let dirs: Vec<Uuid> = self
            .child_dirs(Some(source), token)
            .into_iter()
            .map(|d| d.id)
            .collect();
        for child in dirs {
            self.copy_subtree(child, Some(copy_id), token);
        }
        copy_id
    }

    fn directory_copy(&mut self, id: Uuid, dest: Option<Uuid>, token: &str) -> Result<Vec<Row>, DbError> {
        let source = self
            .dir(id, token)
            .cloned()
            .ok_or_else(|| not_found("Directory not found or access denied"))?;
        self.check_parent(dest, token)?;
        if self.is_within(dest, id) {
            return Err(raise("cannot copy a directory into itself or its descendants"));
        }
        if self.name_taken(dest, token, &source.name, None) {
            return Err(conflict(format!("Directory '{}' already exists", source.name)));
        }

        let copy_id = self.copy_subtree(id, dest, token);
        match self.directories.get(&copy_id) {
            Some(d) => single("directory_copy", "directory_details", &self.dir_details(d)),
            None => Ok(Vec::new()),
        }
    }

    fn directory_delete(&mut self, id: Uuid, recursive: bool, token: &str) -> Result<Vec<Row>, DbError> {
        if self.dir(id, token).is_none() {
            return Err(not_found("Directory not found or access denied"));
        }

        let has_children = self.directories.values().any(|d| d.parent_id == Some(id))
            || self.files.values().any(|f| f.parent_id == Some(id));
        if has_children && !recursive {
            return Err(raise("Directory is not empty"));
        }

        let doomed: Vec<Uuid> = self
            .directories
            .keys()
            .copied()
            .filter(|d| self.is_within(Some(*d), id))
            .collect();
        self.files
            .retain(|_, f| !f.parent_id.is_some_and(|p| doomed.contains(&p)));
        for d in doomed {
            self.directories.remove(&d);
        }
        Ok(Vec::new())
    }

    // --- files ---------------------------------------------------------

    fn file_details(&self, id: Uuid, token: &str) -> Result<Vec<Row>, DbError> {
        match self.file(id, token) {
            Some(f) => single("file_details", "file_details", &self.file_record_details(f)),
            None => Ok(Vec::new()),
        }
    }

    fn file_create(
        &mut self,
        name: &str,
        parent_id: Option<Uuid>,
        token: &str,
        storage_id: &str,
        metadata: Option<Metadata>,
    ) -> Result<Vec<Row>, DbError> {
        self.check_parent(parent_id, token)?;
        if self.name_taken(parent_id, token, name, None) {
            return Err(conflict(format!("File '{}' already exists", name)));
        }

        let now = Utc::now();
        let file = FileRecord {
            id: Uuid::new_v4(),
            owner: token.to_string(),
            name: name.to_string(),
            parent_id,
            created_at: now,
            updated_at: now,
            storage_id: storage_id.to_string(),
            metadata: metadata.unwrap_or_default(),
            tags: Vec::new(),
        };
        let details = self.file_record_details(&file);
        self.files.insert(file.id, file);
        single("file_create", "file_details", &details)
    }

    fn file_update(
        &mut self,
        id: Uuid,
        name: Option<&str>,
        parent_id: Option<Uuid>,
        metadata: Option<Metadata>,
        token: &str,
    ) -> Result<Vec<Row>, DbError> {
        let current = self
            .file(id, token)
            .cloned()
            .ok_or_else(|| not_found("File not found or access denied"))?;

        let new_name = name.unwrap_or(&current.name).to_string();
        let new_parent = parent_id.or(current.parent_id);
        self.check_parent(new_parent, token)?;
        if self.name_taken(new_parent, token, &new_name, Some(id)) {
            return Err(conflict(format!("File '{}' already exists", new_name)));
        }

        let file = FileRecord {
            name: new_name,
            parent_id: new_parent,
            metadata: metadata.unwrap_or(current.metadata.clone()),
            updated_at: Utc::now(),
            ..current
        };
        let details = self.file_record_details(&file);
        self.files.insert(id, file);
        single("file_update", "file_details", &details)
    }

    fn file_delete(&mut self, id: Uuid, token: &str) -> Result<Vec<Row>, DbError> {
        if self.file(id, token).is_none() {
            return Err(not_found("File not found or access denied"));
        }
        self.files.remove(&id);
        Ok(Vec::new())
    }

    fn file_copy(&mut self, id: Uuid, dest: Option<Uuid>, token: &str) -> Result<Vec<Row>, DbError> {
        let source = self
            .file(id, token)
            .cloned()
            .ok_or_else(|| not_found("File not found or access denied"))?;
        self.check_parent(dest, token)?;
        if self.name_taken(dest, token, &source.name, None) {
            return Err(conflict(format!("File '{}' already exists", source.name)));
        }

        let now = Utc::now();
        let copy = FileRecord {
            id: Uuid::new_v4(),
            parent_id: dest,
            created_at: now,
            updated_at: now,
            ..source
        };
        let details = self.file_record_details(&copy);
        self.files.insert(copy.id, copy);
        single("file_copy", "file_details", &details)
    }

    // --- tags ----------------------------------------------------------

    fn file_tags(&mut self, id: Uuid, names: &[String], token: &str, op: TagOp) -> Result<Vec<Row>, DbError> {
        let mut tags = self
            .file(id, token)
            .map(|f| f.tags.clone())
            .ok_or_else(|| not_found("File not found or access denied"))?;

        let ids: Vec<i64> = match op {
            TagOp::Remove => names
                .iter()
                .filter_map(|n| {
                    self.tags
                        .iter()
                        .find(|t| t.owner == token && &t.name == n)
                        .map(|t| t.id)
                })
                .collect(),
            TagOp::Add | TagOp::Set => names.iter().map(|n| self.tag_id(n, token)).collect(),
        };

        match op {
            TagOp::Add => {
                for tag in ids {
                    if !tags.contains(&tag) {
                        tags.push(tag);
                    }
                }
            }
            TagOp::Remove => tags.retain(|t| !ids.contains(t)),
            TagOp::Set => {
                tags.clear();
                for tag in ids {
                    if !tags.contains(&tag) {
                        tags.push(tag);
                    }
                }
            }
        }

        let Some(file) = self.files.get_mut(&id) else {
            return Err(not_found("File not found or access denied"));
        };
        file.tags = tags;
        file.updated_at = Utc::now();

        let file = file.clone();
        single(op.function(), "tags", &self.file_tag_set(&file))
    }

    fn tags_list(&self, token: &str) -> Result<Vec<Row>, DbError> {
        #[derive(Serialize)]
        struct TagRow<'a> {
            id: i64,
            name: &'a str,
        }

        let mut owned: Vec<&TagRecord> = self.tags.iter().filter(|t| t.owner == token).collect();
        owned.sort_by(|a, b| a.name.cmp(&b.name));
        owned
            .into_iter()
            .map(|t| {
                Row::from_serialize(&TagRow {
                    id: t.id,
                    name: &t.name,
                })
            })
            .collect()
    }

    // --- search --------------------------------------------------------

    fn item_search(
        &self,
        query: Option<&str>,
        kind: &str,
        parent_id: Option<Uuid>,
        tags: &[String],
        metadata: Option<Metadata>,
        token: &str,
    ) -> Result<Vec<Row>, DbError> {
        let (want_dirs, want_files) = match kind {
            "all" => (true, true),
            "file" => (false, true),
            "directory" => (true, false),
            other => return Err(raise(format!("invalid search type '{}'", other))),
        };
        self.check_parent(parent_id, token)?;

        let needle = query.map(str::to_lowercase).filter(|q| !q.is_empty());
        let metadata = metadata.filter(|m| !m.is_empty());
        let file_only_filters = !tags.is_empty() || metadata.is_some();

        let name_matches = |name: &str| {
            needle
                .as_ref()
                .map_or(true, |q| name.to_lowercase().contains(q))
        };
        let in_scope = |item_parent: Option<Uuid>| {
            parent_id.map_or(true, |scope| self.is_within(item_parent, scope))
        };

        let mut response = ItemSearchResponse::default();

        if want_dirs && !file_only_filters {
            response.directories = self
                .directories
                .values()
                .filter(|d| d.owner == token && in_scope(d.parent_id) && name_matches(&d.name))
                .map(|d| ItemSearchResultDirectory {
                    id: d.id,
                    name: d.name.clone(),
                    parent_id: d.parent_id,
                    created_at: d.created_at,
                    updated_at: d.updated_at,
                    kind: ItemType::Directory,
                })
                .collect();
            response.directories.sort_by(|a, b| a.name.cmp(&b.name));
        }

        if want_files {
            response.files = self
                .files
                .values()
                .filter(|f| f.owner == token && in_scope(f.parent_id) && name_matches(&f.name))
                .filter(|f| {
                    let names = self.file_tag_set(f).names;
                    tags.iter().all(|t| names.contains(t))
                })
                .filter(|f| {
                    metadata
                        .as_ref()
                        .map_or(true, |m| m.iter().all(|(k, v)| f.metadata.get(k) == Some(v)))
                })
                .map(|f| ItemSearchResultFile {
                    id: f.id,
                    name: f.name.clone(),
                    parent_id: f.parent_id,
                    created_at: f.created_at,
                    updated_at: f.updated_at,
                    storage_id: f.storage_id.clone(),
                    metadata: f.metadata.clone(),
                    kind: ItemType::File,
                })
                .collect();
            response.files.sort_by(|a, b| a.name.cmp(&b.name));
        }

        record(&response)
    }
}

#[derive(Debug, Clone, Copy)]
enum TagOp {
    Add,
    Remove,
    Set,
}

impl TagOp {
    fn function(&self) -> &'static str {
        match self {
            Self::Add => "file_tags_add",
            Self::Remove => "file_tags_remove",
            Self::Set => "file_tags_set",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ErrorKind;

    async fn conn() -> Box<dyn Connection> {
        MemoryBackend::new().connect().await.unwrap()
    }

    fn mkdir(name: &str, parent: Option<Uuid>, token: &str) -> Statement {
        Statement::rows("directory_create").arg(name).arg(parent).arg(token)
    }

    fn id_of(rows: &[Row], column: &str) -> Uuid {
        let id = rows[0].columns()[column]["id"].as_str().unwrap();
        Uuid::parse_str(id).unwrap()
    }

    #[tokio::test]
    async fn owners_do_not_see_each_other() {
        let mut c = conn().await;
        let rows = c.run(&mkdir("mine", None, "alice")).await.unwrap();
        let id = id_of(&rows, "directory_details");

        let details = Statement::rows("directory_details").arg(id).arg("bob");
        assert!(c.run(&details).await.unwrap().is_empty());

        // same name is free in another owner's scope
        assert!(c.run(&mkdir("mine", None, "bob")).await.is_ok());
    }

    #[tokio::test]
    async fn shallow_delete_refuses_non_empty() {
        let mut c = conn().await;
        let rows = c.run(&mkdir("outer", None, "public")).await.unwrap();
        let outer = id_of(&rows, "directory_details");
        c.run(&mkdir("inner", Some(outer), "public")).await.unwrap();

        let delete = Statement::scalar("directory_delete").arg(outer).arg(false).arg("public");
        let err = c.run(&delete).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("not empty"));
    }

    #[tokio::test]
    async fn move_into_descendant_rejected() {
        let mut c = conn().await;
        let rows = c.run(&mkdir("a", None, "public")).await.unwrap();
        let a = id_of(&rows, "directory_details");
        let rows = c.run(&mkdir("b", Some(a), "public")).await.unwrap();
        let b = id_of(&rows, "directory_details");

        let update = Statement::rows("directory_update")
            .arg(a)
            .arg(Option::<String>::None)
            .arg(Some(b))
            .arg("public");
        assert!(c.run(&update).await.is_err());
    }

    #[tokio::test]
    async fn copy_duplicates_subtree() {
        let mut c = conn().await;
        let rows = c.run(&mkdir("src", None, "public")).await.unwrap();
        let src = id_of(&rows, "directory_details");
        c.run(&mkdir("child", Some(src), "public")).await.unwrap();
        let rows = c.run(&mkdir("dest", None, "public")).await.unwrap();
        let dest = id_of(&rows, "directory_details");

        let copy = Statement::rows("directory_copy").arg(src).arg(Some(dest)).arg("public");
        let rows = c.run(&copy).await.unwrap();
        let copied = &rows[0].columns()["directory_details"];

        assert_eq!(copied["name"], "src");
        assert_eq!(copied["child_counts"]["directories"], 1);
        assert_ne!(id_of(&rows, "directory_details"), src);
    }

    #[tokio::test]
    async fn rollback_restores_snapshot() {
        let mut c = conn().await;
        c.begin().await.unwrap();
        c.run(&mkdir("temp", None, "public")).await.unwrap();
        c.rollback().await.unwrap();

        let list = Statement::rows("directory_list").arg(Option::<Uuid>::None).arg("public");
        let rows = c.run(&list).await.unwrap();
        assert_eq!(rows[0].columns()["directories"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn wrong_arity_is_undefined_function() {
        let mut c = conn().await;
        let err = c
            .run(&Statement::rows("directory_list").arg("public"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
