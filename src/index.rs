//! Read-only entry index searched by [`crate::search::SearchSession`].
//!
//! The index owns every entry in a flat sequence. Parent links are plain
//! positions into that sequence, so the whole tree is freed as one unit and
//! no entry ever owns another.
use crate::error::{Result, SearchError};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::Arc;

/// Stable position of an entry in its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(usize);

impl EntryId {
    pub fn new(position: usize) -> Self {
        Self(position)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}

/// One filesystem object held in the index.
#[derive(Debug, Clone)]
pub struct Entry {
    id: EntryId,
    name: String,
    folded_name: String,
    kind: EntryKind,
    size: u64,
    mtime: i64,
    parent: Option<EntryId>,
}

impl Entry {
    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercased name, computed once when the entry is added.
    pub fn folded_name(&self) -> &str {
        &self.folded_name
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Modification time in seconds since the Unix epoch.
    pub fn mtime(&self) -> i64 {
        self.mtime
    }

    pub fn parent(&self) -> Option<EntryId> {
        self.parent
    }
}

/// Read access the search core needs from an index.
pub trait EntryIndex: Send + Sync {
    fn len(&self) -> usize;

    /// Entry at position `id` in `0..len()`. Search results are keyed by
    /// this position, not by [`Entry::id`].
    fn get(&self, id: EntryId) -> Option<&Entry>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn parent_of(&self, entry: &Entry) -> Option<&Entry> {
        entry.parent().and_then(|id| self.get(id))
    }

    /// Rebuilds the full path of `entry` by walking its ancestors.
    fn full_path(&self, entry: &Entry) -> String {
        let chain = ancestry(self, entry);
        join_path(chain.iter().rev().map(|e| e.name()))
    }

    /// Full path together with its lowercased form, built from the
    /// precomputed folded names in a single walk.
    fn full_path_folded(&self, entry: &Entry) -> (String, String) {
        let chain = ancestry(self, entry);
        (
            join_path(chain.iter().rev().map(|e| e.name())),
            join_path(chain.iter().rev().map(|e| e.folded_name())),
        )
    }
}

/// `entry` followed by its ancestors, nearest first.
fn ancestry<'a, I: EntryIndex + ?Sized>(index: &'a I, entry: &'a Entry) -> Vec<&'a Entry> {
    let mut chain = vec![entry];
    let mut current = entry;
    // a malformed index must not loop forever
    let mut remaining = index.len();
    while let Some(parent) = index.parent_of(current) {
        if remaining == 0 {
            break;
        }
        remaining -= 1;
        chain.push(parent);
        current = parent;
    }
    chain
}

fn join_path<'a>(components: impl Iterator<Item = &'a str> + Clone) -> String {
    let capacity = components.clone().map(|c| c.len() + 1).sum();
    let mut path = String::with_capacity(capacity);
    for name in components {
        if !path.is_empty() && !path.ends_with('/') {
            path.push('/');
        }
        path.push_str(name);
    }
    path
}

/// Vec-backed index. Parents must be added before their children.
#[derive(Debug, Clone, Default)]
pub struct EntryList {
    entries: Vec<Entry>,
}

impl EntryList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn push(
        &mut self,
        parent: Option<EntryId>,
        name: impl Into<String>,
        kind: EntryKind,
    ) -> Result<EntryId> {
        self.push_with_metadata(parent, name, kind, 0, 0)
    }

    pub fn push_with_metadata(
        &mut self,
        parent: Option<EntryId>,
        name: impl Into<String>,
        kind: EntryKind,
        size: u64,
        mtime: i64,
    ) -> Result<EntryId> {
        if let Some(parent_id) = parent {
            match self.entries.get(parent_id.index()) {
                Some(p) if p.is_dir() => {}
                Some(_) => {
                    return Err(SearchError::Other(format!(
                        "parent {parent_id} is not a directory"
                    )));
                }
                None => {
                    return Err(SearchError::Other(format!(
                        "parent {parent_id} does not exist"
                    )));
                }
            }
        }

        let name = name.into();
        let id = EntryId::new(self.entries.len());
        self.entries.push(Entry {
            id,
            folded_name: name.to_lowercase(),
            name,
            kind,
            size,
            mtime,
            parent,
        });
        Ok(id)
    }

    pub fn add_dir(&mut self, parent: Option<EntryId>, name: impl Into<String>) -> Result<EntryId> {
        self.push(parent, name, EntryKind::Directory)
    }

    pub fn add_file(
        &mut self,
        parent: EntryId,
        name: impl Into<String>,
        size: u64,
    ) -> Result<EntryId> {
        self.push_with_metadata(Some(parent), name, EntryKind::File, size, 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }
}

impl EntryIndex for EntryList {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(id.index())
    }
}

pub type IndexReadGuard<'a, I> = RwLockReadGuard<'a, Arc<I>>;
pub type IndexWriteGuard<'a, I> = RwLockWriteGuard<'a, Arc<I>>;

/// Handle through which an index owner and search passes share one index.
///
/// The owner takes the write side while it rebuilds or swaps the index.
/// Search passes only ever call [`SharedIndex::try_read`], which fails with
/// [`SearchError::IndexLocked`] instead of waiting for a rebuild to finish.
pub struct SharedIndex<I = EntryList> {
    inner: Arc<RwLock<Arc<I>>>,
}

impl<I> Clone for SharedIndex<I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<I: EntryIndex> SharedIndex<I> {
    pub fn new(index: I) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    pub fn try_read(&self) -> Result<IndexReadGuard<'_, I>> {
        self.inner.try_read().ok_or(SearchError::IndexLocked)
    }

    /// Blocks until every in-flight pass has released its read access.
    pub fn write(&self) -> IndexWriteGuard<'_, I> {
        self.inner.write()
    }

    pub fn try_write(&self) -> Option<IndexWriteGuard<'_, I>> {
        self.inner.try_write()
    }

    pub fn replace(&self, index: I) {
        *self.inner.write() = Arc::new(index);
    }

    pub fn same_handle(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
