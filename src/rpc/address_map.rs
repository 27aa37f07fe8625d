//! Prefix tree keyed by address segments, with single-segment wildcards.
//!
//! ```text
//!   root ─┬─ "net" ─┬─ "x" ─── "hello"   (value A)
//!         │         └─ * ───── "hello"   (value B)
//!         └─ *                           (value C)
//! ```
//!
//! Lookup walks the tree depth-first:
//!
//! 1. a literal child matching the next segment is tried first,
//! 2. then the wildcard child (the consumed segment is captured),
//! 3. then the node's own value, so a value stored at a prefix acts as the
//!    default for everything below it.
//!
//! In the tree above `net/x/hello` yields A, `net/y/hello` yields B with
//! capture `["y"]`, and `other/thing` yields nothing (C only covers
//! single-segment addresses and has no children). Nodes are never pruned;
//! clearing a value leaves its (empty) path in place.

use std::collections::HashMap;

use crate::rpc::address::{Address, Pattern, Segment};

#[derive(Debug, Clone)]
pub struct AddressMap<T> {
    children: HashMap<String, AddressMap<T>>,
    wildcard: Option<Box<AddressMap<T>>>,
    value: Option<T>,
}

impl<T> Default for AddressMap<T> {
    fn default() -> Self {
        Self {
            children: HashMap::new(),
            wildcard: None,
            value: None,
        }
    }
}

impl<T> AddressMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` at `pattern`, creating intermediate nodes. `None`
    /// clears the slot.
    pub fn put(&mut self, pattern: &Pattern, value: Option<T>) {
        let mut node = self;
        for seg in pattern.segments() {
            node = match seg {
                Segment::Literal(s) => node.children.entry(s.clone()).or_default(),
                Segment::Any => node.wildcard.get_or_insert_with(Box::default),
            };
        }
        node.value = value;
    }

    /// Store `value` at `pattern`.
    pub fn insert(&mut self, pattern: &Pattern, value: T) {
        self.put(pattern, Some(value));
    }

    /// Clear the slot at `pattern`.
    pub fn remove(&mut self, pattern: &Pattern) {
        self.put(pattern, None);
    }

    /// Most specific value for `address`.
    pub fn get(&self, address: &Address) -> Option<&T> {
        self.lookup(address.segments(), None)
    }

    /// Like [`get`](Self::get), also recording the segments consumed by
    /// wildcards along the matched path.
    pub fn get_captured(&self, address: &Address, captures: &mut Vec<String>) -> Option<&T> {
        self.lookup(address.segments(), Some(captures))
    }

    fn lookup(&self, rest: &[String], mut captures: Option<&mut Vec<String>>) -> Option<&T> {
        let Some((head, tail)) = rest.split_first() else {
            return self.value.as_ref();
        };

        if let Some(found) = self
            .children
            .get(head)
            .and_then(|child| child.lookup(tail, captures.as_deref_mut()))
        {
            return Some(found);
        }

        if let Some(wild) = &self.wildcard {
            let mark = captures.as_ref().map(|c| c.len());
            if let Some(c) = captures.as_deref_mut() {
                c.push(head.clone());
            }
            if let Some(found) = wild.lookup(tail, captures.as_deref_mut()) {
                return Some(found);
            }
            if let (Some(c), Some(mark)) = (captures, mark) {
                c.truncate(mark);
            }
        }

        self.value.as_ref()
    }

    /// Drop every value and node.
    pub fn clear(&mut self) {
        self.children.clear();
        self.wildcard = None;
        self.value = None;
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        usize::from(self.value.is_some())
            + self.children.values().map(AddressMap::len).sum::<usize>()
            + self.wildcard.as_ref().map_or(0, |w| w.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
