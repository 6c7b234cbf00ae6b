//! List deltas: pending membership changes of one list property.
//!
//! A delta records the members added to and removed from one list of one
//! owner object. Until the first mutation there is no delta and the list
//! reads straight through to the committed store.

mod iter;

pub use iter::{ListMember, MergingIterator};

use crate::types::IdentityKey;
use indexmap::IndexSet;
use ledgergraph_storage::ObjectKey;

/// How a member relates to the committed list a delta applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// Created in this transaction; has no committed counterpart.
    New,
    /// A committed object.
    Committed {
        /// Its committed key.
        key: ObjectKey,
        /// Whether the committed list holds it.
        in_list: bool,
    },
}

/// Added and removed members of one (owner, list property) pair.
///
/// # Invariants
///
/// - A member is never in both sets
/// - `removed` only holds members of the committed list
/// - Both sets keep insertion order
#[derive(Debug, Clone, Default)]
pub struct ListDelta {
    added: IndexSet<IdentityKey>,
    removed: IndexSet<ObjectKey>,
}

impl ListDelta {
    /// Creates an empty delta.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member to the logical list.
    ///
    /// Re-adding a removed committed member cancels the removal; adding a
    /// member that is already visible does nothing. Returns true if the
    /// delta changed.
    pub fn add(&mut self, member: IdentityKey, membership: Membership) -> bool {
        match membership {
            Membership::Committed { key, in_list: true } => self.removed.shift_remove(&key),
            Membership::Committed { in_list: false, .. } | Membership::New => {
                self.added.insert(member)
            }
        }
    }

    /// Removes a member from the logical list.
    ///
    /// Removing an added member discards it from `added`; removing a
    /// committed member records it in `removed`. Returns true if the delta
    /// changed.
    pub fn remove(&mut self, member: IdentityKey, membership: Membership) -> bool {
        if self.added.shift_remove(&member) {
            return true;
        }
        match membership {
            Membership::Committed { key, in_list: true } => self.removed.insert(key),
            Membership::Committed { in_list: false, .. } | Membership::New => false,
        }
    }

    /// Returns true if `member` is pending addition.
    #[must_use]
    pub fn is_added(&self, member: IdentityKey) -> bool {
        self.added.contains(&member)
    }

    /// Returns true if the committed member is pending removal.
    #[must_use]
    pub fn is_removed(&self, key: ObjectKey) -> bool {
        self.removed.contains(&key)
    }

    /// Iterates over added members in insertion order.
    pub fn added(&self) -> impl Iterator<Item = IdentityKey> + '_ {
        self.added.iter().copied()
    }

    /// Iterates over removed members in insertion order.
    pub fn removed(&self) -> impl Iterator<Item = ObjectKey> + '_ {
        self.removed.iter().copied()
    }

    /// Returns true if the delta changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Overlays this delta onto the committed members of the list.
    ///
    /// The delta is copied, so the iterator is unaffected by later edits.
    pub fn merged_view<I>(&self, committed: I) -> MergingIterator<I::IntoIter>
    where
        I: IntoIterator<Item = ObjectKey>,
    {
        MergingIterator::new(
            committed.into_iter(),
            self.removed.clone(),
            self.added.iter().copied().collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> IdentityKey {
        IdentityKey::new(n)
    }

    fn member_of_list(key: u64) -> Membership {
        Membership::Committed {
            key: ObjectKey::new(key),
            in_list: true,
        }
    }

    #[test]
    fn add_then_remove_new_is_noop() {
        let mut delta = ListDelta::new();
        assert!(delta.add(id(1), Membership::New));
        assert!(delta.remove(id(1), Membership::New));
        assert!(!delta.is_added(id(1)));
        assert!(delta.is_empty());
    }

    #[test]
    fn add_then_remove_committed_ends_removed() {
        let mut delta = ListDelta::new();
        assert!(!delta.add(id(1), member_of_list(10)));
        assert!(delta.remove(id(1), member_of_list(10)));
        assert!(!delta.is_added(id(1)));
        assert!(delta.is_removed(ObjectKey::new(10)));
    }

    #[test]
    fn readding_removed_cancels() {
        let mut delta = ListDelta::new();
        delta.remove(id(1), member_of_list(10));
        assert!(delta.add(id(1), member_of_list(10)));
        assert!(delta.is_empty());
    }

    #[test]
    fn operations_are_idempotent() {
        let mut delta = ListDelta::new();
        assert!(delta.add(id(2), Membership::New));
        assert!(!delta.add(id(2), Membership::New));
        assert!(delta.remove(id(1), member_of_list(10)));
        assert!(!delta.remove(id(1), member_of_list(10)));
        assert_eq!(delta.added().collect::<Vec<_>>(), vec![id(2)]);
        assert_eq!(delta.removed().collect::<Vec<_>>(), vec![ObjectKey::new(10)]);
    }

    #[test]
    fn moved_in_committed_member_is_added() {
        let mut delta = ListDelta::new();
        let foreign = Membership::Committed {
            key: ObjectKey::new(20),
            in_list: false,
        };
        assert!(delta.add(id(5), foreign));
        assert!(delta.is_added(id(5)));
        assert!(delta.remove(id(5), foreign));
        assert!(delta.is_empty());
    }

    #[test]
    fn removing_non_member_does_nothing() {
        let mut delta = ListDelta::new();
        assert!(!delta.remove(id(1), Membership::New));
        assert!(delta.is_empty());
    }

    #[test]
    fn merged_view_orders_committed_then_added() {
        let (a, b, c) = (ObjectKey::new(1), ObjectKey::new(2), ObjectKey::new(3));
        let mut delta = ListDelta::new();
        delta.remove(id(1), member_of_list(2));
        delta.add(id(7), Membership::New);

        let view: Vec<_> = delta.merged_view(vec![a, b, c]).collect();
        assert_eq!(
            view,
            vec![
                ListMember::Committed(a),
                ListMember::Committed(c),
                ListMember::Added(id(7)),
            ]
        );
    }

    #[test]
    fn merged_view_is_a_snapshot() {
        let mut delta = ListDelta::new();
        delta.add(id(1), Membership::New);
        let mut view = delta.merged_view(Vec::new());
        delta.add(id(2), Membership::New);
        delta.remove(id(1), Membership::New);

        assert_eq!(view.next(), Some(ListMember::Added(id(1))));
        assert_eq!(view.next(), None);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        const COMMITTED: u32 = 4;

        /// Members 1..=4 are committed in list order; 5..=8 are new.
        fn membership(n: u32) -> Membership {
            if n <= COMMITTED {
                member_of_list(u64::from(n))
            } else {
                Membership::New
            }
        }

        proptest! {
            #[test]
            fn merged_view_matches_model(
                ops in prop::collection::vec((any::<bool>(), 1u32..=8), 0..40)
            ) {
                let mut delta = ListDelta::new();
                let mut hidden = std::collections::BTreeSet::new();
                let mut appended: Vec<u32> = Vec::new();

                for (add, n) in ops {
                    if add {
                        delta.add(id(n), membership(n));
                        if n <= COMMITTED {
                            hidden.remove(&n);
                        } else if !appended.contains(&n) {
                            appended.push(n);
                        }
                    } else {
                        delta.remove(id(n), membership(n));
                        if n <= COMMITTED {
                            hidden.insert(n);
                        } else {
                            appended.retain(|&m| m != n);
                        }
                    }
                }

                let expected: Vec<ListMember> = (1..=COMMITTED)
                    .filter(|n| !hidden.contains(n))
                    .map(|n| ListMember::Committed(ObjectKey::new(u64::from(n))))
                    .chain(appended.iter().map(|&n| ListMember::Added(id(n))))
                    .collect();
                let committed = (1..=u64::from(COMMITTED)).map(ObjectKey::new);
                let view: Vec<ListMember> = delta.merged_view(committed).collect();
                prop_assert_eq!(view, expected);
                prop_assert_eq!(delta.is_empty(), hidden.is_empty() && appended.is_empty());
            }
        }
    }
}
