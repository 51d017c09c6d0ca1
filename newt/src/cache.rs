use std::collections::BTreeMap;

use newt_msg::Id;

use crate::time::Millis;

/// An entry a [`MessageCache`] can hold
pub trait CacheEntry {
  /// The message ID the entry is keyed by. Must not change while the
  /// entry is cached.
  fn id(&self) -> Id;

  /// Absolute time (milliseconds since the driving clock's epoch) the
  /// entry next needs service. After mutating this through
  /// [`MessageCache::get_mut`], call [`MessageCache::reschedule`].
  fn time_due(&self) -> Millis;
}

/// One endpoint/direction's worth of cached message state: a
/// dictionary keyed by message ID that simultaneously keeps its
/// entries ordered by ascending `time_due`, so the driver can always
/// service the due-soonest entry next.
///
/// Entries belong to exactly one cache; insertion hands them over and
/// [`MessageCache::remove`] hands them back. Inserting an ID that is
/// already cached, or removing one that is not, is a bug in the
/// calling layer and panics.
#[derive(Debug)]
pub struct MessageCache<T> {
  entries: BTreeMap<u16, T>,
  /// ids ordered by ascending time_due, stable for equal dues
  queue: Vec<u16>,
  next_id: u16,
}

impl<T> Default for MessageCache<T> {
  fn default() -> Self {
    MessageCache { entries: BTreeMap::new(),
                   queue: Vec::new(),
                   next_id: 0 }
  }
}

impl<T: CacheEntry> MessageCache<T> {
  /// An empty cache
  pub fn new() -> Self {
    Default::default()
  }

  /// Number of cached entries
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Whether the cache is empty
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Whether an entry with this ID is cached
  pub fn contains(&self, id: Id) -> bool {
    self.entries.contains_key(&id.0)
  }

  /// Borrow the entry with this ID
  pub fn get(&self, id: Id) -> Option<&T> {
    self.entries.get(&id.0)
  }

  /// Mutably borrow the entry with this ID
  pub fn get_mut(&mut self, id: Id) -> Option<&mut T> {
    self.entries.get_mut(&id.0)
  }

  /// Take ownership of an entry. Panics if its ID is already cached.
  pub fn insert(&mut self, entry: T) {
    let id = entry.id();
    if self.entries.contains_key(&id.0) {
      panic!("message ID {} is already cached", id.0);
    }
    self.entries.insert(id.0, entry);
    self.queue.push(id.0);
    self.resort();
  }

  /// Dissociate and return an entry. Panics if the ID is not cached.
  pub fn remove(&mut self, id: Id) -> T {
    match self.entries.remove(&id.0) {
      | Some(entry) => {
        self.queue.retain(|n| *n != id.0);
        entry
      },
      | None => panic!("message ID {} is not cached", id.0),
    }
  }

  /// Restore queue order after an entry's `time_due` changed. This
  /// re-sorts; order is never patched in place.
  pub fn reschedule(&mut self, id: Id) {
    assert!(self.entries.contains_key(&id.0),
            "message ID {} is not cached",
            id.0);
    self.resort();
  }

  /// Remove and dissociate every entry
  pub fn clear(&mut self) {
    self.entries.clear();
    self.queue.clear();
  }

  /// ID of the entry due soonest
  pub fn next_due(&self) -> Option<Id> {
    self.queue.first().map(|n| Id(*n))
  }

  /// IDs of every entry due at or before `now`, soonest first
  pub fn due(&self, now: Millis) -> Vec<Id> {
    self.queue
        .iter()
        .take_while(|n| {
          self.entries
              .get(*n)
              .expect("queue and dictionary agree")
              .time_due()
              .0
            <= now.0
        })
        .map(|n| Id(*n))
        .collect()
  }

  /// Allocate the next sequential message ID, skipping IDs currently
  /// live in this cache
  pub fn next_id(&mut self) -> Id {
    loop {
      let candidate = self.next_id;
      self.next_id = self.next_id.wrapping_add(1);
      if !self.entries.contains_key(&candidate) {
        return Id(candidate);
      }
    }
  }

  fn resort(&mut self) {
    let entries = &self.entries;
    self.queue.sort_by_key(|n| {
                 entries.get(n)
                        .expect("queue and dictionary agree")
                        .time_due()
                        .0
               });
  }
}

#[cfg(test)]
mod tests {
  use embedded_time::duration::Milliseconds;

  use super::*;

  #[derive(Debug, PartialEq)]
  struct Entry {
    id: Id,
    due: Millis,
  }

  impl Entry {
    fn new(id: u16, due: u64) -> Self {
      Entry { id: Id(id),
              due: Milliseconds(due) }
    }
  }

  impl CacheEntry for Entry {
    fn id(&self) -> Id {
      self.id
    }

    fn time_due(&self) -> Millis {
      self.due
    }
  }

  #[test]
  fn dictionary_semantics() {
    let mut cache = MessageCache::new();
    cache.insert(Entry::new(7, 100));
    assert_eq!(cache.len(), 1);
    assert!(cache.contains(Id(7)));
    assert!(!cache.contains(Id(8)));
    assert_eq!(cache.get(Id(7)), Some(&Entry::new(7, 100)));
    assert_eq!(cache.remove(Id(7)), Entry::new(7, 100));
    assert!(cache.is_empty());
  }

  #[test]
  #[should_panic(expected = "already cached")]
  fn duplicate_insert_panics() {
    let mut cache = MessageCache::new();
    cache.insert(Entry::new(7, 100));
    cache.insert(Entry::new(7, 200));
  }

  #[test]
  #[should_panic(expected = "is not cached")]
  fn removing_a_stranger_panics() {
    let mut cache = MessageCache::<Entry>::new();
    cache.remove(Id(7));
  }

  #[test]
  fn queue_orders_by_due() {
    let mut cache = MessageCache::new();
    cache.insert(Entry::new(1, 300));
    cache.insert(Entry::new(2, 100));
    cache.insert(Entry::new(3, 200));

    assert_eq!(cache.next_due(), Some(Id(2)));
    assert_eq!(cache.due(Milliseconds(250)), vec![Id(2), Id(3)]);
    assert_eq!(cache.due(Milliseconds(0)), vec![]);
  }

  #[test]
  fn reschedule_resorts() {
    let mut cache = MessageCache::new();
    cache.insert(Entry::new(1, 100));
    cache.insert(Entry::new(2, 200));

    cache.get_mut(Id(1)).unwrap().due = Milliseconds(300);
    cache.reschedule(Id(1));
    assert_eq!(cache.next_due(), Some(Id(2)));
  }

  #[test]
  fn next_id_skips_live_ids() {
    let mut cache = MessageCache::new();
    assert_eq!(cache.next_id(), Id(0));
    cache.insert(Entry::new(1, 100));
    cache.insert(Entry::new(2, 100));
    assert_eq!(cache.next_id(), Id(3));
    assert_eq!(cache.next_id(), Id(4));
  }

  #[test]
  fn clear_dissociates_everything() {
    let mut cache = MessageCache::new();
    cache.insert(Entry::new(1, 100));
    cache.insert(Entry::new(2, 200));
    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.next_due(), None);
  }
}
