//! Merging iterator over a committed list and its delta.

use crate::types::IdentityKey;
use indexmap::IndexSet;
use ledgergraph_storage::ObjectKey;
use std::iter::FusedIterator;

/// One member of the logical list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMember {
    /// A member of the committed list that was not removed.
    Committed(ObjectKey),
    /// A member added in this transaction: new, or moved in from another
    /// list.
    Added(IdentityKey),
}

/// Yields the committed members in their native order, skipping removed
/// ones, then the added members in insertion order.
///
/// Forward-only and single-pass. The delta is captured when the iterator
/// is created; a fresh iterator is needed to observe later edits.
#[derive(Debug)]
pub struct MergingIterator<I> {
    committed: Option<I>,
    removed: IndexSet<ObjectKey>,
    added: std::vec::IntoIter<IdentityKey>,
}

impl<I> MergingIterator<I>
where
    I: Iterator<Item = ObjectKey>,
{
    pub(crate) fn new(
        committed: I,
        removed: IndexSet<ObjectKey>,
        added: Vec<IdentityKey>,
    ) -> Self {
        Self {
            committed: Some(committed),
            removed,
            added: added.into_iter(),
        }
    }
}

impl<I> Iterator for MergingIterator<I>
where
    I: Iterator<Item = ObjectKey>,
{
    type Item = ListMember;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(committed) = self.committed.as_mut() {
            for key in committed.by_ref() {
                if !self.removed.contains(&key) {
                    return Some(ListMember::Committed(key));
                }
            }
            self.committed = None;
        }
        self.added.next().map(ListMember::Added)
    }
}

impl<I> FusedIterator for MergingIterator<I> where I: Iterator<Item = ObjectKey> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_delta_reads_through() {
        let keys = vec![ObjectKey::new(1), ObjectKey::new(2)];
        let view: Vec<_> =
            MergingIterator::new(keys.clone().into_iter(), IndexSet::new(), Vec::new()).collect();
        assert_eq!(
            view,
            keys.into_iter().map(ListMember::Committed).collect::<Vec<_>>()
        );
    }

    #[test]
    fn everything_removed_yields_only_added() {
        let removed: IndexSet<_> = [ObjectKey::new(1), ObjectKey::new(2)].into_iter().collect();
        let view: Vec<_> = MergingIterator::new(
            vec![ObjectKey::new(1), ObjectKey::new(2)].into_iter(),
            removed,
            vec![IdentityKey::new(4), IdentityKey::new(3)],
        )
        .collect();
        assert_eq!(
            view,
            vec![
                ListMember::Added(IdentityKey::new(4)),
                ListMember::Added(IdentityKey::new(3)),
            ]
        );
    }

    #[test]
    fn stays_exhausted() {
        let mut iter = MergingIterator::new(
            std::iter::once(ObjectKey::new(1)),
            IndexSet::new(),
            Vec::new(),
        );
        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }
}
