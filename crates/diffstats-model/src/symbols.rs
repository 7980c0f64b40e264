use rustc_hash::FxHashMap;

/// Interns opaque string tokens as dense 0-based ids.
///
/// Relay identities and descriptor hashes repeat in every consensus, so the
/// store keeps one copy of each token and works on ids afterwards.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    ids: FxHashMap<Box<str>, u32>,
}

impl SymbolTable {
    #[inline]
    pub fn intern(&mut self, token: &str) -> u32 {
        if let Some(&id) = self.ids.get(token) {
            return id;
        }
        let id = self.ids.len() as u32;
        self.ids.insert(token.into(), id);
        id
    }

    #[inline]
    pub fn get(&self, token: &str) -> Option<u32> {
        self.ids.get(token).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
