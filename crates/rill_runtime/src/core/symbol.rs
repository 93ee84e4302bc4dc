//! Word spelling interner.

use ahash::RandomState;
use hashbrown::HashMap;

use rill_core::SymbolId;

pub struct SymbolTable {
    spellings: Vec<String>,
    lookup: HashMap<String, SymbolId, RandomState>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            spellings: Vec::new(),
            lookup: HashMap::with_hasher(RandomState::new()),
        }
    }

    pub fn intern(&mut self, spelling: &str) -> SymbolId {
        if let Some(&id) = self.lookup.get(spelling) {
            return id;
        }
        let id = SymbolId(self.spellings.len() as u32);
        self.spellings.push(spelling.to_string());
        self.lookup.insert(spelling.to_string(), id);
        id
    }

    pub fn spelling(&self, id: SymbolId) -> &str {
        &self.spellings[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.spellings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spellings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut tab = SymbolTable::new();
        let a = tab.intern("alpha");
        let b = tab.intern("beta");
        assert_ne!(a, b);
        assert_eq!(tab.intern("alpha"), a);
        assert_eq!(tab.spelling(a), "alpha");
    }
}
