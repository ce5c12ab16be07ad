//! Dense slot id allocation
//!
//! Small integer ids handed out from a contiguous range and recycled through
//! a LIFO free list. Both the executor and the collision space index their
//! storage by these ids.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{KernelError, Result};

/// Reusable integer handle, unique among the live ids of one allocator.
pub type SlotId = usize;

/// Process-unique tag naming one executor or collision space.
///
/// Handles carry the tag of the instance that issued them so a handle can
/// never be used against a different instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(u32);

impl OwnerId {
    pub fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SlotAllocator {
    /// Position of each slot inside `used`, `None` while the slot is free
    index: Vec<Option<usize>>,
    /// Live ids (unordered; swap-removed on release)
    used: Vec<SlotId>,
    /// Released ids, most recent last
    free: Vec<SlotId>,
}

impl SlotAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue an id: the most recently released one if any, else a new top index.
    pub fn acquire(&mut self) -> SlotId {
        let id = match self.free.pop() {
            Some(id) => id,
            None => {
                self.index.push(None);
                self.index.len() - 1
            }
        };
        self.index[id] = Some(self.used.len());
        self.used.push(id);
        id
    }

    /// Return `id` to the free list.
    pub fn release(&mut self, id: SlotId) -> Result<()> {
        let pos = self
            .index
            .get_mut(id)
            .ok_or(KernelError::InvalidIdentifier(id))?
            .take()
            .ok_or(KernelError::InactiveIdentifier(id))?;

        self.used.swap_remove(pos);
        if let Some(&moved) = self.used.get(pos) {
            self.index[moved] = Some(pos);
        }
        self.free.push(id);
        Ok(())
    }

    #[inline]
    pub fn is_active(&self, id: SlotId) -> bool {
        matches!(self.index.get(id), Some(Some(_)))
    }

    /// Live ids in unspecified order.
    #[inline]
    pub fn used_ids(&self) -> &[SlotId] {
        &self.used
    }

    /// Number of live ids
    #[inline]
    pub fn len(&self) -> usize {
        self.used.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    /// Size of the dense range issued so far (live + free).
    #[inline]
    pub fn span(&self) -> usize {
        self.index.len()
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.used.clear();
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_acquire_extends_dense_range() {
        let mut slots = SlotAllocator::new();
        assert_eq!(slots.acquire(), 0);
        assert_eq!(slots.acquire(), 1);
        assert_eq!(slots.acquire(), 2);
        assert_eq!(slots.len(), 3);
        assert_eq!(slots.span(), 3);
    }

    #[test]
    fn test_release_prefers_most_recent() {
        let mut slots = SlotAllocator::new();
        let a = slots.acquire();
        let b = slots.acquire();
        let _c = slots.acquire();

        slots.release(a).unwrap();
        slots.release(b).unwrap();

        assert_eq!(slots.acquire(), b);
        assert_eq!(slots.acquire(), a);
        assert_eq!(slots.span(), 3);
    }

    #[test]
    fn test_used_ids_tracks_swap_remove() {
        let mut slots = SlotAllocator::new();
        for _ in 0..5 {
            slots.acquire();
        }
        slots.release(1).unwrap();
        slots.release(3).unwrap();

        let mut used = slots.used_ids().to_vec();
        used.sort_unstable();
        assert_eq!(used, vec![0, 2, 4]);
        assert!(slots.is_active(4));
        assert!(!slots.is_active(3));

        // Releasing the element that was moved into a hole must still work
        slots.release(4).unwrap();
        let mut used = slots.used_ids().to_vec();
        used.sort_unstable();
        assert_eq!(used, vec![0, 2]);
    }

    #[test]
    fn test_release_errors() {
        let mut slots = SlotAllocator::new();
        let id = slots.acquire();
        assert_eq!(slots.release(7), Err(KernelError::InvalidIdentifier(7)));
        slots.release(id).unwrap();
        assert_eq!(slots.release(id), Err(KernelError::InactiveIdentifier(id)));
    }

    #[test]
    fn test_clear() {
        let mut slots = SlotAllocator::new();
        slots.acquire();
        slots.acquire();
        slots.clear();
        assert!(slots.is_empty());
        assert_eq!(slots.span(), 0);
        assert_eq!(slots.acquire(), 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Acquire,
        Release(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Acquire), (0usize..64).prop_map(Op::Release)]
    }

    proptest! {
        #[test]
        fn test_live_ids_are_never_reissued(ops in prop::collection::vec(op(), 1..200)) {
            let mut slots = SlotAllocator::new();
            let mut live: Vec<SlotId> = Vec::new();

            for op in ops {
                match op {
                    Op::Acquire => {
                        let id = slots.acquire();
                        prop_assert!(!live.contains(&id));
                        live.push(id);
                    }
                    Op::Release(pick) if !live.is_empty() => {
                        let id = live.swap_remove(pick % live.len());
                        prop_assert!(slots.release(id).is_ok());
                    }
                    Op::Release(_) => {}
                }
                let used: HashSet<_> = slots.used_ids().iter().copied().collect();
                let expected: HashSet<_> = live.iter().copied().collect();
                prop_assert_eq!(used, expected);
            }
        }

        #[test]
        fn test_reuse_is_lifo(count in 2usize..32, a in 0usize..32, b in 0usize..32) {
            let mut slots = SlotAllocator::new();
            for _ in 0..count {
                slots.acquire();
            }
            let (a, b) = (a % count, b % count);
            prop_assume!(a != b);

            slots.release(a).unwrap();
            slots.release(b).unwrap();
            prop_assert_eq!(slots.acquire(), b);
            prop_assert_eq!(slots.acquire(), a);
        }
    }
}
