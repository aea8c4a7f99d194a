use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // A namespace is interpolated into DDL as part of a table name, so it's
    // restricted to a conservative identifier production.
    static ref NAMESPACE_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").unwrap();
}

/// Namespace is a validated logical collection name. It maps to one metadata
/// table and one search-engine alias, and must be a simple identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct Namespace(String);

#[derive(Debug, thiserror::Error)]
#[error("invalid namespace {0:?}: must match [A-Za-z_][A-Za-z0-9_]{{0,62}}")]
pub struct InvalidNamespace(pub String);

impl Namespace {
    pub fn new(s: impl Into<String>) -> Result<Self, InvalidNamespace> {
        let s = s.into();
        if !NAMESPACE_RE.is_match(&s) {
            return Err(InvalidNamespace(s));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the per-namespace metadata table.
    pub fn meta_table(&self) -> String {
        format!("{}_metadata", self.0)
    }
}

impl std::ops::Deref for Namespace {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Namespace {
    type Err = InvalidNamespace;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> serde::Deserialize<'de> for Namespace {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::Namespace;

    #[test]
    fn accepts_simple_identifiers() {
        for ok in ["orders", "ns1", "_internal", "Abc_123"] {
            assert!(Namespace::new(ok).is_ok(), "{ok:?} should be accepted");
        }
        assert!(Namespace::new("a".repeat(63)).is_ok());
    }

    #[test]
    fn rejects_hostile_names() {
        for bad in [
            "",
            "1leading_digit",
            "has-dash",
            "has.dot",
            "has space",
            "drop table; --",
        ] {
            assert!(Namespace::new(bad).is_err(), "{bad:?} should be rejected");
        }
        assert!(Namespace::new("a".repeat(64)).is_err());
    }

    #[test]
    fn meta_table_name() {
        let ns = Namespace::new("orders").unwrap();
        assert_eq!(ns.meta_table(), "orders_metadata");
    }
}
