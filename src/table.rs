//! An open-addressing hash table keyed by interned strings.
//!
//! This is the table behind string interning. Keys are [`StrId`] handles and
//! the table stores no back-pointers into the heap: every operation that
//! needs a key's hash or content receives the object arena by reference.
//! Deletion leaves a *tombstone* (no key, sentinel `true` value) so that the
//! linear probe sequences of later-inserted keys stay intact.

use crate::{ObjString, StrId, Value};

/// Grow once the table would be more than three quarters full.
const MAX_LOAD: f64 = 0.75;

#[derive(Debug, Clone)]
struct Entry {
    key: Option<StrId>,
    value: Value,
}

impl Entry {
    /// Never-used slot: no key, nil value.
    fn empty() -> Self {
        Self {
            key: None,
            value: Value::Nil,
        }
    }

    /// Deleted slot: no key, `true` sentinel value.
    fn tombstone() -> Self {
        Self {
            key: None,
            value: Value::Bool(true),
        }
    }

    fn is_tombstone(&self) -> bool {
        self.key.is_none() && matches!(self.value, Value::Bool(true))
    }
}

/// A linear-probing hash table whose capacity is always a power of two.
///
/// `count` tracks occupied *and* tombstoned slots, so the load factor check
/// accounts for every slot a probe sequence may have to step over.
#[derive(Debug, Default)]
pub struct Table {
    count: usize,
    entries: Vec<Entry>,
}

impl Table {
    /// Look up the value stored for `key`.
    pub fn get(&self, objects: &[ObjString], key: StrId) -> Option<&Value> {
        if self.count == 0 {
            return None;
        }
        let entry = &self.entries[self.find_entry(objects, key)];
        entry.key.map(|_| &entry.value)
    }

    /// Insert or update the value stored for `key`. Returns true when the
    /// key was not present before.
    pub fn set(&mut self, objects: &[ObjString], key: StrId, value: Value) -> bool {
        if (self.count + 1) as f64 > self.entries.len() as f64 * MAX_LOAD {
            let capacity = grown_capacity(self.entries.len());
            self.adjust_capacity(objects, capacity);
        }

        let idx = self.find_entry(objects, key);
        let entry = &mut self.entries[idx];
        let is_new_key = entry.key.is_none();
        // A reused tombstone was already counted when it was a live entry.
        if is_new_key && !entry.is_tombstone() {
            self.count += 1;
        }
        entry.key = Some(key);
        entry.value = value;
        is_new_key
    }

    /// Remove the entry for `key`, leaving a tombstone in its slot. Returns
    /// true when an entry was actually deleted.
    pub fn delete(&mut self, objects: &[ObjString], key: StrId) -> bool {
        if self.count == 0 {
            return false;
        }
        let idx = self.find_entry(objects, key);
        if self.entries[idx].key.is_none() {
            return false;
        }
        self.entries[idx] = Entry::tombstone();
        true
    }

    /// The interning lookup: find a stored key whose content equals `chars`.
    ///
    /// Unlike [`get`](Self::get), which compares keys by handle identity,
    /// this compares hash, length, and bytes, because the caller is holding
    /// raw text that has no handle yet.
    pub fn find_str(&self, objects: &[ObjString], chars: &str, hash: u32) -> Option<StrId> {
        if self.count == 0 {
            return None;
        }
        let mut idx = hash as usize % self.entries.len();
        loop {
            let entry = &self.entries[idx];
            match entry.key {
                None => {
                    // Stop on a truly empty slot, but keep probing past
                    // tombstones.
                    if !entry.is_tombstone() {
                        return None;
                    }
                }
                Some(key) => {
                    let obj = &objects[key.index()];
                    if obj.hash == hash && *obj.chars == *chars {
                        return Some(key);
                    }
                }
            }
            idx = (idx + 1) % self.entries.len();
        }
    }

    /// Find the slot `key` lives in, or the slot it should be inserted
    /// into. The first tombstone on the probe path is remembered so an
    /// insert can reuse it instead of consuming a fresh slot.
    fn find_entry(&self, objects: &[ObjString], key: StrId) -> usize {
        let hash = objects[key.index()].hash;
        let mut idx = hash as usize % self.entries.len();
        let mut tombstone = None;
        loop {
            let entry = &self.entries[idx];
            match entry.key {
                None => {
                    if entry.is_tombstone() {
                        tombstone.get_or_insert(idx);
                    } else {
                        return tombstone.unwrap_or(idx);
                    }
                }
                Some(k) if k == key => return idx,
                Some(_) => {}
            }
            idx = (idx + 1) % self.entries.len();
        }
    }

    /// Rebuild the table at the new capacity, rehashing every live entry.
    /// Tombstones are dropped, so `count` is reset to the live population.
    fn adjust_capacity(&mut self, objects: &[ObjString], capacity: usize) {
        let old = std::mem::replace(&mut self.entries, vec![Entry::empty(); capacity]);
        self.count = 0;
        for entry in old {
            if let Some(key) = entry.key {
                let idx = self.find_entry(objects, key);
                self.entries[idx] = Entry {
                    key: Some(key),
                    value: entry.value,
                };
                self.count += 1;
            }
        }
    }
}

/// Double the capacity, starting from a floor of 8. The new capacity is
/// computed from the pre-growth capacity, before the pending insert.
fn grown_capacity(capacity: usize) -> usize {
    if capacity < 8 {
        8
    } else {
        capacity * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::hash_string;

    fn arena(names: &[&str]) -> Vec<ObjString> {
        names.iter().map(|s| ObjString::new((*s).into())).collect()
    }

    /// Build objects with handcrafted hashes to force probe collisions.
    fn arena_with_hashes(entries: &[(&str, u32)]) -> Vec<ObjString> {
        entries
            .iter()
            .map(|(s, hash)| ObjString {
                chars: (*s).into(),
                hash: *hash,
            })
            .collect()
    }

    fn ids(count: usize) -> Vec<StrId> {
        (0..count).map(StrId::new).collect()
    }

    #[test]
    fn set_then_get() {
        let objects = arena(&["one", "two"]);
        let keys = ids(2);
        let mut table = Table::default();

        assert!(table.set(&objects, keys[0], Value::Number(1.0)));
        assert!(table.set(&objects, keys[1], Value::Number(2.0)));
        assert_eq!(table.get(&objects, keys[0]), Some(&Value::Number(1.0)));
        assert_eq!(table.get(&objects, keys[1]), Some(&Value::Number(2.0)));

        // Updating an existing key is not a new insert.
        assert!(!table.set(&objects, keys[0], Value::Bool(true)));
        assert_eq!(table.get(&objects, keys[0]), Some(&Value::Bool(true)));
    }

    #[test]
    fn get_from_empty_table() {
        let objects = arena(&["missing"]);
        let table = Table::default();
        assert_eq!(table.get(&objects, StrId::new(0)), None);
    }

    #[test]
    fn delete_leaves_no_value_behind() {
        let objects = arena(&["key"]);
        let key = StrId::new(0);
        let mut table = Table::default();

        table.set(&objects, key, Value::Number(3.0));
        assert!(table.delete(&objects, key));
        assert_eq!(table.get(&objects, key), None);
        // Deleting again finds nothing.
        assert!(!table.delete(&objects, key));
    }

    #[test]
    fn tombstones_keep_probe_chains_alive() {
        // Three keys with the same hash probe into consecutive slots.
        let objects = arena_with_hashes(&[("first", 9), ("second", 9), ("third", 9)]);
        let keys = ids(3);
        let mut table = Table::default();

        for (i, &key) in keys.iter().enumerate() {
            table.set(&objects, key, Value::Number(i as f64));
        }

        // Deleting the middle link must not cut off the keys that probed
        // past it.
        assert!(table.delete(&objects, keys[1]));
        assert_eq!(table.get(&objects, keys[0]), Some(&Value::Number(0.0)));
        assert_eq!(table.get(&objects, keys[2]), Some(&Value::Number(2.0)));
        assert_eq!(table.get(&objects, keys[1]), None);

        // Re-inserting seats the key in the tombstone slot instead of
        // consuming a fresh one.
        let capacity = table.entries.len();
        let count = table.count;
        table.set(&objects, keys[1], Value::Number(10.0));
        assert_eq!(table.entries.len(), capacity);
        assert_eq!(table.count, count);
        assert_eq!(table.get(&objects, keys[1]), Some(&Value::Number(10.0)));
        assert_eq!(table.get(&objects, keys[2]), Some(&Value::Number(2.0)));
    }

    #[test]
    fn growth_doubles_from_a_floor_of_eight() {
        let names: Vec<String> = (0..32).map(|i| format!("key{i}")).collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let objects = arena(&name_refs);
        let keys = ids(32);
        let mut table = Table::default();

        table.set(&objects, keys[0], Value::Nil);
        assert_eq!(table.entries.len(), 8);

        for (i, &key) in keys.iter().enumerate() {
            table.set(&objects, key, Value::Number(i as f64));
        }
        // Power-of-two capacity, everything still reachable after rehashes.
        assert!(table.entries.len().is_power_of_two());
        for (i, &key) in keys.iter().enumerate() {
            assert_eq!(table.get(&objects, key), Some(&Value::Number(i as f64)));
        }
    }

    #[test]
    fn rehash_drops_tombstones() {
        let objects = arena(&["a", "b", "c", "d", "e", "f", "g", "h", "i"]);
        let keys = ids(9);
        let mut table = Table::default();

        for &key in &keys[..5] {
            table.set(&objects, key, Value::Nil);
        }
        table.delete(&objects, keys[0]);
        table.delete(&objects, keys[1]);

        // Keep inserting until the table grows; the rehash counts only live
        // entries.
        for &key in &keys[5..] {
            table.set(&objects, key, Value::Nil);
        }
        assert_eq!(table.entries.len(), 16);
        let live = table.entries.iter().filter(|e| e.key.is_some()).count();
        assert_eq!(table.count, live);
    }

    #[test]
    fn find_str_compares_content_not_identity() {
        let objects = arena(&["shared", "other"]);
        let keys = ids(2);
        let mut table = Table::default();
        table.set(&objects, keys[0], Value::Nil);
        table.set(&objects, keys[1], Value::Nil);

        assert_eq!(
            table.find_str(&objects, "shared", hash_string("shared")),
            Some(keys[0])
        );
        assert_eq!(
            table.find_str(&objects, "absent", hash_string("absent")),
            None
        );
    }

    #[test]
    fn find_str_rejects_hash_collisions_with_different_content() {
        // Same hash, different spellings: content must decide.
        let objects = arena_with_hashes(&[("alpha", 42), ("omega", 42)]);
        let keys = ids(2);
        let mut table = Table::default();
        table.set(&objects, keys[0], Value::Nil);
        table.set(&objects, keys[1], Value::Nil);

        assert_eq!(table.find_str(&objects, "omega", 42), Some(keys[1]));
        assert_eq!(table.find_str(&objects, "delta", 42), None);
    }
}
