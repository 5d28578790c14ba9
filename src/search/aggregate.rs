//! Filtering, truncation and counting of a scan's matches.
use crate::index::{EntryId, EntryKind};
use crate::search::matcher::Match;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeFilter {
    #[default]
    None,
    FoldersOnly,
    FilesOnly,
}

impl TypeFilter {
    pub fn admits(self, kind: EntryKind) -> bool {
        match self {
            TypeFilter::None => true,
            TypeFilter::FoldersOnly => kind == EntryKind::Directory,
            TypeFilter::FilesOnly => kind == EntryKind::File,
        }
    }
}

/// One row of a result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    id: EntryId,
    kind: EntryKind,
    ordinal: usize,
    path: Option<String>,
}

impl SearchResult {
    pub fn entry_id(&self) -> EntryId {
        self.id
    }

    /// Position within the filtered result set, starting at 0.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Path the entry matched on, when the pass searched full paths.
    pub fn matched_path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

/// Ordered result set together with its type counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    results: Vec<SearchResult>,
    num_files: usize,
    num_folders: usize,
}

impl Aggregate {
    /// Builds the result set in one pass over `matches`, stopping at
    /// `max_results` admitted entries when it is non-zero.
    pub fn build(matches: &[Match], filter: TypeFilter, max_results: usize) -> Self {
        let mut aggregate = Self::default();
        for m in matches {
            if max_results > 0 && aggregate.results.len() >= max_results {
                break;
            }
            if !filter.admits(m.kind) {
                continue;
            }
            match m.kind {
                EntryKind::Directory => aggregate.num_folders += 1,
                EntryKind::File => aggregate.num_files += 1,
            }
            aggregate.results.push(SearchResult {
                id: m.id,
                kind: m.kind,
                ordinal: aggregate.results.len(),
                path: m.path.clone(),
            });
        }
        aggregate
    }

    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn num_files(&self) -> usize {
        self.num_files
    }

    pub fn num_folders(&self) -> usize {
        self.num_folders
    }

    /// Drops the result for `id`, renumbering everything after it.
    pub fn remove(&mut self, id: EntryId) -> bool {
        // results are sorted by entry id
        let Ok(position) = self.results.binary_search_by_key(&id, |r| r.id) else {
            return false;
        };
        let removed = self.results.remove(position);
        match removed.kind {
            EntryKind::Directory => self.num_folders -= 1,
            EntryKind::File => self.num_files -= 1,
        }
        for result in &mut self.results[position..] {
            result.ordinal -= 1;
        }
        true
    }
}
