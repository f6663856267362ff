use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::RwLock;

pub use string_cache::DefaultAtom as Atom;

/// Process-wide table of every text the renderer may draw. Interning gives
/// each string a stable numeric ID, so per-frame lookups never allocate.
#[derive(Default)]
struct Interner {
    atoms: Vec<Atom>,
    ids: HashMap<Atom, usize>,
}

lazy_static! {
    static ref TEXT_INTERNER: RwLock<Interner> = RwLock::new(Interner::default());
}

/// Intern a string and return its ID. Re-interning the same text returns
/// the original ID.
pub fn intern_text(s: &str) -> usize {
    let atom = Atom::from(s);
    let mut interner = TEXT_INTERNER.write().unwrap();
    if let Some(&id) = interner.ids.get(&atom) {
        return id;
    }
    let id = interner.atoms.len();
    interner.atoms.push(atom.clone());
    interner.ids.insert(atom, id);
    id
}

/// Current count of unique texts
pub fn text_count() -> usize {
    TEXT_INTERNER.read().unwrap().atoms.len()
}

pub fn get_text(id: usize) -> Option<Atom> {
    TEXT_INTERNER.read().unwrap().atoms.get(id).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let first = intern_text("Trial: 1/50");
        let second = intern_text("Trial: 1/50");
        assert_eq!(first, second);
        assert_eq!(get_text(first).as_deref(), Some("Trial: 1/50"));
    }

    #[test]
    fn distinct_texts_get_distinct_ids() {
        let a = intern_text("Trial: 2/50");
        let b = intern_text("Trial: 3/50");
        assert_ne!(a, b);
        assert!(text_count() >= 2);
        assert_eq!(get_text(usize::MAX), None);
    }
}
