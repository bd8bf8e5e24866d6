//! Identity allocation: object, snapshot, and frame identities drawn from a
//! single monotonic sequence, with reservation tracking so in-flight
//! transactions can claim IDs before they are committed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// The raw identity shared by the [`ObjectId`], [`SnapshotId`], and
/// [`FrameId`] spaces. Which space an ID belongs to is metadata tracked by
/// [`IdentityManager`], not something encoded in the bits themselves.
pub type RawId = u64;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub RawId);

        impl $name {
            /// Returns the underlying raw identity.
            pub fn raw(self) -> RawId {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<RawId> for $name {
            fn from(id: RawId) -> Self {
                Self(id)
            }
        }
    };
}

id_newtype!(
    /// Identifies an object's logical identity within a design. Stable
    /// across every version of that object.
    ObjectId
);
id_newtype!(
    /// Identifies one immutable version of an object. Unique design-wide.
    SnapshotId
);
id_newtype!(
    /// Identifies a frame (stable or transient).
    FrameId
);

/// Tags what an allocated raw identity denotes, since all three ID spaces
/// are drawn from the same counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    /// Identifies a [`crate::snapshot::ObjectSnapshot`]'s logical object.
    Object,
    /// Identifies a [`crate::snapshot::ObjectSnapshot`] version.
    Snapshot,
    /// Identifies a frame.
    Frame,
}

struct IdentityManagerInner {
    seq: RawId,
    used: HashMap<RawId, IdKind>,
    reserved: HashMap<RawId, IdKind>,
}

impl IdentityManagerInner {
    fn next_free(&mut self) -> RawId {
        loop {
            self.seq += 1;
            if !self.used.contains_key(&self.seq) && !self.reserved.contains_key(&self.seq) {
                return self.seq;
            }
        }
    }

    fn claim(&mut self, id: RawId) {
        if id > self.seq {
            self.seq = id;
        }
    }
}

/// Allocates unique, design-wide identities and tracks whether each one is
/// merely reserved (claimed by an in-flight transaction) or used
/// (committed).
///
/// Exclusive access is required for every mutation; this type guards its
/// state with a mutex so concurrent frame creation from different threads
/// can reserve IDs safely (see the crate's concurrency notes).
pub struct IdentityManager {
    inner: Mutex<IdentityManagerInner>,
}

impl IdentityManager {
    /// Creates a fresh identity manager with an empty sequence.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(IdentityManagerInner {
                seq: 0,
                used: HashMap::new(),
                reserved: HashMap::new(),
            }),
        }
    }

    /// Allocates the next free ID and marks it used immediately.
    pub fn create_and_use(&self, kind: IdKind) -> RawId {
        let mut inner = self.inner.lock().expect("identity manager mutex poisoned");
        let id = inner.next_free();
        inner.used.insert(id, kind);
        id
    }

    /// Allocates the next free ID and marks it reserved.
    pub fn create_and_reserve(&self, kind: IdKind) -> RawId {
        let mut inner = self.inner.lock().expect("identity manager mutex poisoned");
        let id = inner.next_free();
        inner.reserved.insert(id, kind);
        id
    }

    /// Reserves a caller-proposed ID. Succeeds only if `id` is neither used
    /// nor already reserved.
    pub fn reserve(&self, id: RawId, kind: IdKind) -> bool {
        let mut inner = self.inner.lock().expect("identity manager mutex poisoned");
        if inner.used.contains_key(&id) || inner.reserved.contains_key(&id) {
            return false;
        }
        inner.claim(id);
        inner.reserved.insert(id, kind);
        true
    }

    /// Reserves `id` if it is free, or accepts it if it is already reserved
    /// or used with the same `kind`. Fails on a kind mismatch.
    pub fn reserve_if_needed(&self, id: RawId, kind: IdKind) -> bool {
        let mut inner = self.inner.lock().expect("identity manager mutex poisoned");
        if let Some(existing) = inner.used.get(&id).or_else(|| inner.reserved.get(&id)) {
            return *existing == kind;
        }
        inner.claim(id);
        inner.reserved.insert(id, kind);
        true
    }

    /// Removes a reservation. Returns `false` if `id` was not reserved.
    pub fn release_reservation(&self, id: RawId) -> bool {
        let mut inner = self.inner.lock().expect("identity manager mutex poisoned");
        inner.reserved.remove(&id).is_some()
    }

    /// Promotes a reservation of matching `kind` to used. Fails on a kind
    /// mismatch, a missing reservation, or if `id` is already used.
    pub fn mark_used(&self, id: RawId, kind: IdKind) -> bool {
        let mut inner = self.inner.lock().expect("identity manager mutex poisoned");
        if inner.used.contains_key(&id) {
            return false;
        }
        match inner.reserved.get(&id) {
            Some(existing) if *existing == kind => {
                inner.reserved.remove(&id);
                inner.used.insert(id, kind);
                true
            }
            _ => false,
        }
    }

    /// Removes `id` from the used set, freeing it permanently for this
    /// manager's bookkeeping (the raw value itself is never reused).
    pub fn free(&self, id: RawId) {
        let mut inner = self.inner.lock().expect("identity manager mutex poisoned");
        inner.used.remove(&id);
    }

    /// Returns whether `id` is tracked as used or reserved.
    pub fn contains(&self, id: RawId) -> bool {
        let inner = self.inner.lock().expect("identity manager mutex poisoned");
        inner.used.contains_key(&id) || inner.reserved.contains_key(&id)
    }

    /// Returns the kind `id` is tracked under, if any.
    pub fn kind_of(&self, id: RawId) -> Option<IdKind> {
        let inner = self.inner.lock().expect("identity manager mutex poisoned");
        inner
            .used
            .get(&id)
            .or_else(|| inner.reserved.get(&id))
            .copied()
    }
}

impl Default for IdentityManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdentityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntest::timeout;

    #[timeout(1000)]
    #[test]
    fn create_and_use_marks_used_not_reserved() {
        let mgr = IdentityManager::new();
        let id = mgr.create_and_use(IdKind::Object);
        assert!(mgr.contains(id));
        assert_eq!(mgr.kind_of(id), Some(IdKind::Object));
        assert!(!mgr.release_reservation(id));
    }

    #[timeout(1000)]
    #[test]
    fn reserve_then_use_round_trip() {
        let mgr = IdentityManager::new();
        let id = mgr.create_and_reserve(IdKind::Snapshot);
        assert!(mgr.contains(id));
        assert!(mgr.mark_used(id, IdKind::Snapshot));
        assert!(!mgr.mark_used(id, IdKind::Snapshot), "cannot use twice");
    }

    #[timeout(1000)]
    #[test]
    fn reserve_rejects_already_claimed() {
        let mgr = IdentityManager::new();
        let id = mgr.create_and_reserve(IdKind::Frame);
        assert!(!mgr.reserve(id, IdKind::Frame));
    }

    #[timeout(1000)]
    #[test]
    fn reserve_if_needed_allows_same_kind_idempotently() {
        let mgr = IdentityManager::new();
        assert!(mgr.reserve_if_needed(42, IdKind::Object));
        assert!(mgr.reserve_if_needed(42, IdKind::Object));
        assert!(!mgr.reserve_if_needed(42, IdKind::Snapshot));
    }

    #[timeout(1000)]
    #[test]
    fn discard_releases_reservation_cleanly() {
        let mgr = IdentityManager::new();
        let id = mgr.create_and_reserve(IdKind::Object);
        assert!(mgr.release_reservation(id));
        assert!(!mgr.contains(id));
        assert!(!mgr.release_reservation(id));
    }

    #[timeout(1000)]
    #[test]
    fn free_id_allows_use_tracking_to_clear() {
        let mgr = IdentityManager::new();
        let id = mgr.create_and_use(IdKind::Object);
        mgr.free(id);
        assert!(!mgr.contains(id));
    }

    #[timeout(1000)]
    #[test]
    fn sequence_advances_past_claimed_ids() {
        let mgr = IdentityManager::new();
        assert!(mgr.reserve(100, IdKind::Object));
        let next = mgr.create_and_reserve(IdKind::Object);
        assert!(next > 100);
    }
}
