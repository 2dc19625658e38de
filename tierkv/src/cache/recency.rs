//! Recency index for the LRU cache
//!
//! Nodes live in a slot arena and link to each other by index, so the list
//! needs no per-node allocation and no shared ownership. The most recently
//! used entry sits at the head, the eviction victim at the tail.

use crate::core::store::SharedItem;
use std::collections::HashMap;

struct Node {
    key: String,
    /// `None` only while the slot is on the free list
    item: Option<SharedItem>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Recency-ordered list plus key lookup map, bounded by a fixed capacity
///
/// Capacity must be at least one. Zero is a programming error: it trips a
/// debug assertion and is raised to one in release builds. `LruCache` rejects
/// it with `InvalidConfig` before constructing an index.
pub struct RecencyIndex {
    slots: Vec<Node>,
    free: Vec<usize>,
    map: HashMap<String, usize>,
    head: Option<usize>,
    tail: Option<usize>,
    capacity: usize,
}

impl RecencyIndex {
    /// Create an empty index holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "recency index capacity must be at least 1");
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity.min(4096)),
            free: Vec::new(),
            map: HashMap::with_capacity(capacity.min(4096)),
            head: None,
            tail: None,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Look up `key` and mark it most recently used
    pub fn touch(&mut self, key: &str) -> Option<SharedItem> {
        let idx = *self.map.get(key)?;
        self.move_to_front(idx);
        self.slots[idx].item.clone()
    }

    /// Replace the item of a resident key in place and mark it most recently
    /// used. Returns `false` if the key is not resident.
    pub fn replace(&mut self, key: &str, item: SharedItem) -> bool {
        let Some(&idx) = self.map.get(key) else {
            return false;
        };
        self.slots[idx].item = Some(item);
        self.move_to_front(idx);
        true
    }

    /// Insert a key that is not resident yet
    ///
    /// Below capacity the entry gets a fresh head node. At capacity the tail
    /// slot is reused for the new entry and the previous occupant is returned.
    pub fn insert(&mut self, key: String, item: SharedItem) -> Option<(String, SharedItem)> {
        debug_assert!(!self.map.contains_key(&key));

        if self.map.len() < self.capacity {
            let node = Node {
                key: key.clone(),
                item: Some(item),
                prev: None,
                next: None,
            };
            let idx = match self.free.pop() {
                Some(idx) => {
                    self.slots[idx] = node;
                    idx
                }
                None => {
                    self.slots.push(node);
                    self.slots.len() - 1
                }
            };
            self.push_front(idx);
            self.map.insert(key, idx);
            return None;
        }

        let idx = self.tail?;
        let victim_key = std::mem::replace(&mut self.slots[idx].key, key.clone());
        let victim_item = self.slots[idx].item.replace(item);
        self.map.remove(&victim_key);
        self.move_to_front(idx);
        self.map.insert(key, idx);

        victim_item.map(|item| (victim_key, item))
    }

    /// Drop `key` from the index, returning its item
    pub fn remove(&mut self, key: &str) -> Option<SharedItem> {
        let idx = self.map.remove(key)?;
        self.detach(idx);
        let node = &mut self.slots[idx];
        node.key.clear();
        let item = node.item.take();
        self.free.push(idx);
        item
    }

    /// Entries from most to least recently used
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            index: self,
            cursor: self.head,
        }
    }

    /// Resident keys in no particular order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head != Some(idx) {
            self.detach(idx);
            self.push_front(idx);
        }
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }
        self.slots[idx].prev = None;
        self.slots[idx].next = None;
    }

    fn push_front(&mut self, idx: usize) {
        self.slots[idx].prev = None;
        self.slots[idx].next = self.head;
        match self.head {
            Some(h) => self.slots[h].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }
}

/// Iterator over [`RecencyIndex`] entries, most recent first
pub struct Iter<'a> {
    index: &'a RecencyIndex,
    cursor: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a SharedItem);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let node = &self.index.slots[self.cursor?];
            self.cursor = node.next;
            if let Some(item) = &node.item {
                return Some((node.key.as_str(), item));
            }
        }
    }
}
