//! Interned strings for canvas tags, stimulus names and on-screen text.
//! Atoms compare by pointer, so tag lookups during hit testing stay cheap.

pub use string_cache::DefaultAtom as Atom;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_strings_share_one_atom() {
        let a = Atom::from("key");
        let b = Atom::from(String::from("key"));
        assert_eq!(a, b);
        assert_ne!(a, Atom::from("bkgrd"));
        assert_eq!(&*b, "key");
    }

    #[test]
    fn dynamic_atoms_outlive_their_source() {
        let owned = format!("ITI ({} sec.)", 30);
        let atom = Atom::from(owned.as_str());
        drop(owned);
        assert_eq!(atom.as_ref(), "ITI (30 sec.)");
    }
}
