//! Dedup groups
//!
//! Requests with identical canonical descriptors are resolved by a single
//! physical operation. The first handle of each group is its representative;
//! after the representatives settle, their outcome is propagated to the rest
//! of the group.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use graphbatch_domain::FileFingerprint;
use tracing::{debug, error};

use crate::handle::RequestHandle;

/// Canonical equality key of a request handle
///
/// Attached files are identified by their (device, inode) fingerprint rather
/// than their content. The raise flag and the completion status are part of
/// the key, so a completed handle never shares a group with a pending one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub method: &'static str,
    pub relative_url: String,
    pub body: Option<String>,
    pub files: Vec<(String, FileFingerprint)>,
    pub raise_on_failure: bool,
    pub completed: bool,
}

/// Ordered groups of handles sharing a dedup key, in first-seen order
#[derive(Debug, Default)]
pub struct DedupGroups {
    groups: Vec<Vec<RequestHandle>>,
    /// Whether each group was still pending when it was formed.
    pending: Vec<bool>,
}

impl DedupGroups {
    /// One group per handle, for passes that do not deduplicate.
    pub fn singletons(handles: Vec<RequestHandle>) -> Self {
        Self::from_groups(handles.into_iter().map(|h| vec![h]).collect())
    }

    fn from_groups(groups: Vec<Vec<RequestHandle>>) -> Self {
        let pending = groups
            .iter()
            .map(|group| group.first().is_some_and(|h| !h.is_complete()))
            .collect();
        Self { groups, pending }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[Vec<RequestHandle>] {
        &self.groups
    }

    /// Representative of the group containing `handle`.
    pub fn representative_of(&self, handle: &RequestHandle) -> Option<RequestHandle> {
        self.groups
            .iter()
            .find(|group| group.iter().any(|h| h.ptr_eq(handle)))
            .and_then(|group| group.first().cloned())
    }

    fn representatives(&self) -> Vec<RequestHandle> {
        self.groups.iter().filter_map(|group| group.first().cloned()).collect()
    }

    /// All handles, group by group.
    pub fn into_flat(self) -> Vec<RequestHandle> {
        self.groups.into_iter().flatten().collect()
    }
}

/// Group `handles` by dedup key. Returns the representatives and the groups.
///
/// A handle whose key cannot be computed gets a group of its own; the batch
/// builder reports its failure later.
pub fn dedup(handles: Vec<RequestHandle>) -> (Vec<RequestHandle>, DedupGroups) {
    let total = handles.len();
    let mut index: HashMap<DedupKey, usize> = HashMap::new();
    let mut groups: Vec<Vec<RequestHandle>> = Vec::new();

    for handle in handles {
        let Ok(key) = handle.dedup_key() else {
            groups.push(vec![handle]);
            continue;
        };

        match index.entry(key) {
            Entry::Occupied(slot) => {
                debug!(handle = %handle.id(), "dedup");
                groups[*slot.get()].push(handle);
            }
            Entry::Vacant(slot) => {
                slot.insert(groups.len());
                groups.push(vec![handle]);
            }
        }
    }

    let groups = DedupGroups::from_groups(groups);
    let uniques = groups.representatives();
    debug!(from = total, to = uniques.len(), "deduping reduced request count");
    (uniques, groups)
}

/// Propagate each representative's outcome to the rest of its group and
/// return every handle, group by group.
///
/// `uniques` must be the representatives returned by [`dedup`] for these
/// groups. A duplicate that completed on its own while its representative
/// was in flight breaks that contract; it is logged and left untouched.
pub fn redup(uniques: &[RequestHandle], groups: DedupGroups) -> Vec<RequestHandle> {
    debug_assert_eq!(uniques.len(), groups.len());

    for ((unique, group), was_pending) in
        uniques.iter().zip(groups.groups.iter()).zip(groups.pending.iter().copied())
    {
        let Some((representative, duplicates)) = group.split_first() else {
            continue;
        };
        debug_assert!(representative.ptr_eq(unique), "group must start with its representative");

        if !was_pending || !representative.is_complete() {
            continue;
        }

        for duplicate in duplicates {
            if duplicate.is_complete() {
                error!(
                    handle = %duplicate.id(),
                    representative = %representative.id(),
                    "duplicate completed independently of its representative"
                );
                continue;
            }
            duplicate.adopt_result(representative);
        }
    }

    groups.into_flat()
}
