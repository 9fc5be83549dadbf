//
// Copyright (c) The RoFI Networking Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use rofinet_utils::link::ConnectorId;

use crate::packet::ChunkDescriptor;

/// The stores' clock: whole seconds since the Unix epoch.
pub type UnixSecs = u64;

/// Bounded map of chunk descriptors seen in the recent past.
///
/// Used to collapse re-broadcast storms: a descriptor stays "seen" until
/// its expiry, and touching it refreshes its recency. When the store is
/// full the least recently touched entry is evicted.
#[derive(Debug)]
pub struct RecentlySeenStore {
    timeout: UnixSecs,
    capacity: usize,
    // Back of the vector is the most recently touched entry.
    entries: Vec<(ChunkDescriptor, UnixSecs)>,
}

/// Bounded map tracking which connectors wait for which chunk.
///
/// The requester `-1` stands for this module's own interest. The first
/// requester triggers the actual transmission; later ones merely
/// piggy-back on the request already in flight.
#[derive(Debug)]
pub struct RequestStore {
    timeout: UnixSecs,
    capacity: usize,
    // Back of the vector is the most recently touched entry.
    entries: Vec<(ChunkDescriptor, UnixSecs, BTreeSet<ConnectorId>)>,
}

// ===== impl RecentlySeenStore =====

impl RecentlySeenStore {
    pub fn new(timeout: UnixSecs, capacity: usize) -> RecentlySeenStore {
        RecentlySeenStore {
            timeout,
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Whether the descriptor was seen within the timeout; a hit also
    /// refreshes its recency.
    pub fn recently_seen(
        &mut self,
        dsc: &ChunkDescriptor,
        now: UnixSecs,
    ) -> bool {
        let Some(pos) = self.entries.iter().position(|(d, _)| d == dsc)
        else {
            return false;
        };
        let (_, expiry) = self.entries[pos];
        if expiry < now {
            return false;
        }

        let entry = self.entries.remove(pos);
        self.entries.push(entry);
        true
    }

    pub fn mark_recently_seen(
        &mut self,
        dsc: &ChunkDescriptor,
        now: UnixSecs,
    ) {
        if let Some(pos) = self.entries.iter().position(|(d, _)| d == dsc)
        {
            self.entries.remove(pos);
        } else if self.entries.len() == self.capacity {
            self.entries.remove(0);
        }
        self.entries.push((*dsc, now + self.timeout));
    }
}

// ===== impl RequestStore =====

impl RequestStore {
    pub fn new(timeout: UnixSecs, capacity: usize) -> RequestStore {
        RequestStore {
            timeout,
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Returns the connectors currently waiting for the chunk, pruning
    /// the entry if it expired.
    pub fn requesters(
        &mut self,
        dsc: &ChunkDescriptor,
        now: UnixSecs,
    ) -> BTreeSet<ConnectorId> {
        if !self.clean(dsc, now) {
            return Default::default();
        }
        self.entries.last().unwrap().2.clone()
    }

    /// Adds a requester, refreshing the entry's expiry. Evicts the least
    /// recently touched entry when full.
    pub fn mark_in_flight(
        &mut self,
        dsc: &ChunkDescriptor,
        requester: ConnectorId,
        now: UnixSecs,
    ) {
        if self.clean(dsc, now) {
            let entry = self.entries.last_mut().unwrap();
            entry.1 = now + self.timeout;
            entry.2.insert(requester);
            return;
        }

        if self.entries.len() == self.capacity {
            self.entries.remove(0);
        }
        self.entries.push((
            *dsc,
            now + self.timeout,
            BTreeSet::from([requester]),
        ));
    }

    /// Drops one requester; the entry disappears with its last one.
    pub fn mark_not_in_flight(
        &mut self,
        dsc: &ChunkDescriptor,
        requester: ConnectorId,
    ) {
        let Some(pos) = self.entries.iter().position(|(d, ..)| d == dsc)
        else {
            return;
        };
        let (_, _, requesters) = &mut self.entries[pos];
        requesters.remove(&requester);
        if requesters.is_empty() {
            self.entries.remove(pos);
        }
    }

    /// Whether anyone at all still waits for the chunk.
    pub fn in_flight_for_anybody(
        &mut self,
        dsc: &ChunkDescriptor,
        now: UnixSecs,
    ) -> bool {
        self.clean(dsc, now)
    }

    // Prunes the entry if expired or empty; returns whether a valid entry
    // remains, moved to the most recent position.
    fn clean(&mut self, dsc: &ChunkDescriptor, now: UnixSecs) -> bool {
        let Some(pos) = self.entries.iter().position(|(d, ..)| d == dsc)
        else {
            return false;
        };
        let (_, expiry, requesters) = &self.entries[pos];
        if *expiry < now || requesters.is_empty() {
            self.entries.remove(pos);
            return false;
        }

        let entry = self.entries.remove(pos);
        self.entries.push(entry);
        true
    }
}

// ===== tests =====

#[cfg(test)]
mod tests {
    use rofinet_utils::link::CONNECTOR_SELF;

    use super::*;

    fn dsc(chunk_id: u16) -> ChunkDescriptor {
        ChunkDescriptor {
            fw_type: 1,
            fw_version: 2,
            chunk_id,
        }
    }

    #[test]
    fn test_recently_seen_expiry() {
        let mut store = RecentlySeenStore::new(20, 4);

        assert!(!store.recently_seen(&dsc(0), 100));
        store.mark_recently_seen(&dsc(0), 100);
        assert!(store.recently_seen(&dsc(0), 110));
        assert!(store.recently_seen(&dsc(0), 120));
        assert!(!store.recently_seen(&dsc(0), 121));
    }

    #[test]
    fn test_recently_seen_eviction() {
        let mut store = RecentlySeenStore::new(20, 2);

        store.mark_recently_seen(&dsc(0), 100);
        store.mark_recently_seen(&dsc(1), 100);
        // Touching 0 makes 1 the eviction candidate.
        assert!(store.recently_seen(&dsc(0), 100));
        store.mark_recently_seen(&dsc(2), 100);

        assert!(store.recently_seen(&dsc(0), 100));
        assert!(!store.recently_seen(&dsc(1), 100));
        assert!(store.recently_seen(&dsc(2), 100));
    }

    #[test]
    fn test_request_store_piggyback() {
        let mut store = RequestStore::new(20, 4);

        assert!(!store.in_flight_for_anybody(&dsc(0), 100));
        store.mark_in_flight(&dsc(0), 2, 100);
        assert!(store.in_flight_for_anybody(&dsc(0), 100));
        store.mark_in_flight(&dsc(0), CONNECTOR_SELF, 105);

        let requesters = store.requesters(&dsc(0), 110);
        assert_eq!(
            requesters,
            BTreeSet::from([CONNECTOR_SELF, 2])
        );
    }

    #[test]
    fn test_request_store_empty_entry_is_dropped() {
        let mut store = RequestStore::new(20, 4);

        store.mark_in_flight(&dsc(0), 2, 100);
        store.mark_not_in_flight(&dsc(0), 2);
        assert!(!store.in_flight_for_anybody(&dsc(0), 100));
    }

    #[test]
    fn test_request_store_expiry_reopens() {
        let mut store = RequestStore::new(20, 4);

        store.mark_in_flight(&dsc(0), CONNECTOR_SELF, 100);
        // Silence past the expiry re-opens the request.
        assert!(!store.in_flight_for_anybody(&dsc(0), 121));
        assert!(store.requesters(&dsc(0), 121).is_empty());
    }
}
