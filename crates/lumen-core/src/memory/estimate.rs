//! Shallow size estimation
//!
//! Sizes are the inline size of a value plus the heap buffer it owns directly.
//! Nested containers are not walked: a map of strings counts its entry slots,
//! not the string contents. This keeps every tracked mutation O(1).

use std::collections::{BTreeMap, HashMap};
use std::mem::size_of;

/// Approximate, non-recursive memory footprint of a value
pub trait ShallowSize {
    fn shallow_size(&self) -> usize;
}

impl ShallowSize for bool {
    fn shallow_size(&self) -> usize {
        size_of::<bool>()
    }
}

impl ShallowSize for f64 {
    fn shallow_size(&self) -> usize {
        size_of::<f64>()
    }
}

impl ShallowSize for str {
    fn shallow_size(&self) -> usize {
        size_of::<String>() + self.len()
    }
}

impl ShallowSize for String {
    fn shallow_size(&self) -> usize {
        size_of::<String>() + self.capacity()
    }
}

impl<T: ShallowSize> ShallowSize for Option<T> {
    fn shallow_size(&self) -> usize {
        match self {
            Some(value) => value.shallow_size(),
            None => 0,
        }
    }
}

impl<T> ShallowSize for Vec<T> {
    fn shallow_size(&self) -> usize {
        size_of::<Vec<T>>() + self.capacity() * size_of::<T>()
    }
}

impl<K, V> ShallowSize for HashMap<K, V> {
    fn shallow_size(&self) -> usize {
        size_of::<HashMap<K, V>>() + self.capacity() * (size_of::<K>() + size_of::<V>())
    }
}

impl<K, V> ShallowSize for BTreeMap<K, V> {
    fn shallow_size(&self) -> usize {
        size_of::<BTreeMap<K, V>>() + self.len() * (size_of::<K>() + size_of::<V>())
    }
}

impl ShallowSize for serde_json::Value {
    fn shallow_size(&self) -> usize {
        let inline = size_of::<serde_json::Value>();
        match self {
            serde_json::Value::String(s) => inline + s.len(),
            serde_json::Value::Array(items) => inline + items.len() * inline,
            serde_json::Value::Object(map) => {
                inline + map.len() * (size_of::<String>() + inline)
            }
            _ => inline,
        }
    }
}

impl ShallowSize for serde_json::Map<String, serde_json::Value> {
    fn shallow_size(&self) -> usize {
        size_of::<Self>() + self.len() * (size_of::<String>() + size_of::<serde_json::Value>())
    }
}

/// Signed difference between two shallow sizes
pub fn size_delta(old: usize, new: usize) -> i64 {
    new as i64 - old as i64
}
