//! Transport representation of an identity provider domain.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// An internet domain as exchanged over an API boundary.
///
/// Serializes as `{"name": "example.com"}`. The name may be unset before the
/// record is filled in; an unset name is omitted on output.
///
/// Equality is by name when both names are set. A record with an unset name is
/// only equal to itself (the same instance), so two empty records never compare
/// equal and a clone of an empty record is not equal to its source.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DomainRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl DomainRecord {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: Some(name.into()),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Overwrite the name. No validation happens at this layer.
    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = Some(name.into());
    }

    pub fn clear_name(&mut self) {
        self.name = None;
    }
}

impl PartialEq for DomainRecord {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        matches!((&self.name, &other.name), (Some(a), Some(b)) if a == b)
    }
}

impl Eq for DomainRecord {}

impl Hash for DomainRecord {
    // Unset names all land in one bucket; they are never equal to each other.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl From<&str> for DomainRecord {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::collections::HashSet;

    fn hash_of(r: &DomainRecord) -> u64 {
        let mut h = DefaultHasher::new();
        r.hash(&mut h);
        h.finish()
    }

    #[test]
    fn new_keeps_name_exactly() {
        for n in ["example.com", "", "  spaced  ", "xn--bcher-kva.example", "UPPER.Example"] {
            let r = DomainRecord::new(n);
            assert_eq!(r.name(), Some(n));
        }
    }

    #[test]
    fn default_has_unset_name() {
        let r = DomainRecord::default();
        assert_eq!(r.name(), None);
    }

    #[test]
    fn set_name_overwrites_unconditionally() {
        let mut r = DomainRecord::new("a.example");
        r.set_name("not a domain at all");
        assert_eq!(r.name(), Some("not a domain at all"));
        r.clear_name();
        assert_eq!(r.name(), None);
    }

    #[test]
    fn equal_names_are_equal_and_hash_alike() {
        let a = DomainRecord::new("example.com");
        let b = DomainRecord::new("example.com");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let c = DomainRecord::new("example.org");
        assert_ne!(a, c);
    }

    #[test]
    fn unset_names_compare_by_identity() {
        let a = DomainRecord::default();
        let b = DomainRecord::default();
        assert_ne!(a, b);
        let same = &a;
        assert_eq!(&a, same);
        assert_ne!(a, a.clone());
        assert_ne!(a, DomainRecord::new("example.com"));
    }

    #[test]
    fn hash_set_dedups_named_records_only() {
        let mut set = HashSet::new();
        set.insert(DomainRecord::new("example.com"));
        set.insert(DomainRecord::new("example.com"));
        set.insert(DomainRecord::default());
        set.insert(DomainRecord::default());
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn serializes_as_object_with_name() {
        let json = serde_json::to_string(&DomainRecord::new("example.com")).unwrap();
        assert_eq!(json, r#"{"name":"example.com"}"#);

        let empty = serde_json::to_string(&DomainRecord::default()).unwrap();
        assert_eq!(empty, "{}");
    }

    #[test]
    fn deserializes_missing_or_null_name_as_unset() {
        let r: DomainRecord = serde_json::from_str(r#"{"name":"acme.io"}"#).unwrap();
        assert_eq!(r.name(), Some("acme.io"));

        let missing: DomainRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.name(), None);

        let null: DomainRecord = serde_json::from_str(r#"{"name":null}"#).unwrap();
        assert_eq!(null.name(), None);
    }
}
