// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide tag name/id interner (§3, §5: "Tag registry: one process-wide
//! mutex around its name -> id map and backing array; counters are atomic").

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagId(pub u32);

#[derive(Default)]
struct Inner {
    name_to_id: HashMap<String, TagId>,
    names: Vec<String>,
}

/// Interns tag names to small integer ids so a message's tag set can be a
/// bitmap instead of a set of strings.
#[derive(Clone)]
pub struct TagRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TagRegistry {
    pub fn new() -> Self {
        TagRegistry { inner: Arc::new(Mutex::new(Inner::default())) }
    }

    /// Look up or allocate an id for `name`.
    pub fn intern(&self, name: &str) -> TagId {
        let mut inner = self.inner.lock();
        if let Some(id) = inner.name_to_id.get(name) {
            return *id;
        }
        let id = TagId(inner.names.len() as u32);
        inner.names.push(name.to_string());
        inner.name_to_id.insert(name.to_string(), id);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<TagId> {
        self.inner.lock().name_to_id.get(name).copied()
    }

    pub fn name_of(&self, id: TagId) -> Option<String> {
        self.inner.lock().names.get(id.0 as usize).cloned()
    }
}

/// A bitmap of tag ids carried on a message. Bits beyond 128 tags fall back
/// to a growable overflow vector, but in practice configurations use far
/// fewer tags than that.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    words: Vec<u64>,
}

impl TagSet {
    pub fn new() -> Self {
        TagSet::default()
    }

    pub fn set(&mut self, id: TagId) {
        let word = id.0 as usize / 64;
        let bit = id.0 as usize % 64;
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << bit;
    }

    pub fn contains(&self, id: TagId) -> bool {
        let word = id.0 as usize / 64;
        let bit = id.0 as usize % 64;
        self.words.get(word).map(|w| (w >> bit) & 1 == 1).unwrap_or(false)
    }

    /// The raw bitmap words, e.g. for serializing a message to a disk queue.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn from_words(words: Vec<u64>) -> Self {
        TagSet { words }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let reg = TagRegistry::new();
        let a = reg.intern("foo");
        let b = reg.intern("foo");
        let c = reg.intern("bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(reg.name_of(a).as_deref(), Some("foo"));
    }

    #[test]
    fn tag_set_membership() {
        let reg = TagRegistry::new();
        let foo = reg.intern("foo");
        let bar = reg.intern("bar");
        let mut set = TagSet::new();
        set.set(foo);
        assert!(set.contains(foo));
        assert!(!set.contains(bar));
    }

    #[test]
    fn tag_set_handles_ids_past_first_word() {
        let mut set = TagSet::new();
        let far = TagId(130);
        set.set(far);
        assert!(set.contains(far));
        assert!(!set.contains(TagId(129)));
    }
}
