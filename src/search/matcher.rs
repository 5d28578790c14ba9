//! Partitioned scan of an index against a compiled predicate.
use crate::error::Result;
use crate::index::{EntryId, EntryIndex, EntryKind};
use crate::pool::WorkerPool;
use crate::search::query::Predicate;
use log::debug;
use std::ops::Range;
use std::time::Instant;

pub const DEFAULT_MIN_CHUNK_SIZE: usize = 1000;

/// An entry that satisfied the predicate during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub id: EntryId,
    pub kind: EntryKind,
    /// Full path the predicate was tested against, in path search mode.
    pub path: Option<String>,
}

/// Splits `0..len` into contiguous, non-empty ranges of near-equal size.
///
/// At most one range per worker, and never so many that a range would hold
/// fewer than `min_chunk_size` entries (except when `len` itself is smaller).
pub fn partition_ranges(len: usize, workers: usize, min_chunk_size: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let by_size = len.div_ceil(min_chunk_size.max(1));
    let count = workers.max(1).min(by_size);

    let base = len / count;
    let extra = len % count;
    let mut ranges = Vec::with_capacity(count);
    let mut start = 0;
    for i in 0..count {
        let size = base + usize::from(i < extra);
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

/// Scans every entry of `index` and returns the hits in index order.
pub fn scan<I: EntryIndex + ?Sized>(
    pool: &WorkerPool,
    index: &I,
    predicate: &Predicate,
    search_in_path: bool,
    min_chunk_size: usize,
) -> Result<Vec<Match>> {
    if predicate.is_nothing() || index.is_empty() {
        return Ok(Vec::new());
    }

    let started = Instant::now();
    let ranges = partition_ranges(index.len(), pool.num_threads(), min_chunk_size);
    debug!(
        "Scanning {} entries in {} partitions (search_in_path={search_in_path})",
        index.len(),
        ranges.len()
    );

    let partitions = pool.run(ranges.len(), |partition| {
        scan_range(index, predicate, search_in_path, ranges[partition].clone())
    })?;

    let total = partitions.iter().map(Vec::len).sum();
    let mut matches = Vec::with_capacity(total);
    for partition in partitions {
        matches.extend(partition);
    }

    debug!(
        "Scan found {} matches in {:.2}ms",
        matches.len(),
        started.elapsed().as_secs_f64() * 1000.0
    );
    Ok(matches)
}

fn scan_range<I: EntryIndex + ?Sized>(
    index: &I,
    predicate: &Predicate,
    search_in_path: bool,
    range: Range<usize>,
) -> Vec<Match> {
    let mut hits = Vec::new();
    for position in range {
        let id = EntryId::new(position);
        let Some(entry) = index.get(id) else {
            continue;
        };

        if search_in_path {
            let (path, folded) = index.full_path_folded(entry);
            if predicate.matches_folded(&path, &folded) {
                hits.push(Match {
                    id,
                    kind: entry.kind(),
                    path: Some(path),
                });
            }
        } else if predicate.matches_folded(entry.name(), entry.folded_name()) {
            hits.push(Match {
                id,
                kind: entry.kind(),
                path: None,
            });
        }
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Entry, EntryList};
    use crate::search::query::{compile, QueryFlags};

    fn tree() -> EntryList {
        let mut list = EntryList::new();
        let root = list.add_dir(None, "/").unwrap();
        let docs = list.add_dir(Some(root), "Documents").unwrap();
        list.add_file(docs, "report.pdf", 10).unwrap();
        let music = list.add_dir(Some(root), "music").unwrap();
        list.add_file(music, "song.mp3", 20).unwrap();
        list.add_file(docs, "notes.txt", 30).unwrap();
        list
    }

    #[test]
    fn test_partition_counts() {
        assert!(partition_ranges(0, 4, 10).is_empty());
        assert_eq!(partition_ranges(5, 8, 1000), vec![0..5]);
        assert_eq!(partition_ranges(10, 4, 1), vec![0..3, 3..6, 6..8, 8..10]);
        assert_eq!(partition_ranges(2500, 8, 1000).len(), 3);
        assert_eq!(partition_ranges(9, 0, 0), vec![0..9]);
    }

    #[test]
    fn test_partitions_cover_range_contiguously() {
        for len in [1, 7, 100, 1001, 4096] {
            for workers in [1, 3, 8] {
                let ranges = partition_ranges(len, workers, 16);
                assert_eq!(ranges.first().unwrap().start, 0);
                assert_eq!(ranges.last().unwrap().end, len);
                for pair in ranges.windows(2) {
                    assert_eq!(pair[0].end, pair[1].start);
                }
                assert!(ranges.iter().all(|r| !r.is_empty()));
            }
        }
    }

    #[test]
    fn test_scan_names_in_index_order() {
        let pool = WorkerPool::new(3).unwrap();
        let index = tree();
        let p = compile("o", QueryFlags::default()).unwrap();
        let matches = scan(&pool, &index, &p, false, 1).unwrap();
        let ids: Vec<usize> = matches.iter().map(|m| m.id.index()).collect();
        assert_eq!(ids, vec![1, 2, 4, 5]);
        assert!(matches.iter().all(|m| m.path.is_none()));
    }

    #[test]
    fn test_scan_path_mode_keeps_path() {
        let pool = WorkerPool::new(2).unwrap();
        let index = tree();
        let p = compile("documents txt", QueryFlags::new(false, true)).unwrap();
        let matches = scan(&pool, &index, &p, true, 1).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path.as_deref(), Some("/Documents/notes.txt"));

        // name-only mode cannot see the parent directory
        let matches = scan(&pool, &index, &p, false, 1).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_scan_path_mode_matches_mixed_case_ancestor() {
        let pool = WorkerPool::new(2).unwrap();
        let index = tree();
        let p = compile("documents/rep", QueryFlags::new(false, true)).unwrap();
        let matches = scan(&pool, &index, &p, true, 1).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, EntryId::new(2));
        assert_eq!(matches[0].path.as_deref(), Some("/Documents/report.pdf"));
    }

    /// Serves the entries of a list back to front.
    struct Reversed(EntryList);

    impl EntryIndex for Reversed {
        fn len(&self) -> usize {
            self.0.len()
        }

        fn get(&self, id: EntryId) -> Option<&Entry> {
            let position = self.0.len().checked_sub(id.index() + 1)?;
            self.0.get(EntryId::new(position))
        }
    }

    #[test]
    fn test_scan_keys_matches_by_position() {
        let mut list = EntryList::new();
        for name in ["apple", "zzz", "yyy", "xxx"] {
            list.add_dir(None, name).unwrap();
        }
        let index = Reversed(list);
        let pool = WorkerPool::new(2).unwrap();
        let p = compile("apple", QueryFlags::default()).unwrap();
        let matches = scan(&pool, &index, &p, false, 1).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, EntryId::new(3));
        assert_eq!(index.get(matches[0].id).unwrap().name(), "apple");
    }

    #[test]
    fn test_scan_nothing_predicate_skips_pool() {
        let pool = WorkerPool::new(1).unwrap();
        let matches = scan(&pool, &tree(), &Predicate::Nothing, true, 1).unwrap();
        assert!(matches.is_empty());
    }
}
