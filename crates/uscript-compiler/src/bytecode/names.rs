//! Per-class name pool.

use rustc_hash::FxHashMap;

/// Names referenced by a class's bytecode, indexed by `u16` operands.
///
/// Indices are assigned in order of first use, so identical compile order
/// gives identical pools.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamePool {
    names: Vec<String>,
    index: FxHashMap<String, u16>,
}

impl NamePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `name`, adding it if new. `None` once the pool is full.
    pub fn intern(&mut self, name: &str) -> Option<u16> {
        if let Some(&idx) = self.index.get(name) {
            return Some(idx);
        }
        let idx = u16::try_from(self.names.len()).ok().filter(|&i| i < super::NO_TARGET)?;
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), idx);
        Some(idx)
    }

    pub fn get(&self, index: u16) -> Option<&str> {
        self.names.get(index as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_deduplicates_in_first_use_order() {
        let mut pool = NamePool::new();
        assert_eq!(pool.intern("Begin"), Some(0));
        assert_eq!(pool.intern("Touch"), Some(1));
        assert_eq!(pool.intern("Begin"), Some(0));
        assert_eq!(pool.get(1), Some("Touch"));
        assert_eq!(pool.len(), 2);
    }
}
