use uuid::Uuid;

/// Id is the identifier of a stored document. It's a UUID v7, which embeds a
/// millisecond timestamp in its most-significant bits: the lexicographic order
/// of ids reflects their insertion order, which is what cursor pagination
/// relies on.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(Uuid);

impl Id {
    /// Generate a new time-ordered Id.
    pub fn generate() -> Self {
        Self(Uuid::new_v7(uuid::Timestamp::now(uuid::NoContext)))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for Id {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl std::str::FromStr for Id {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl serde::Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        let s = std::borrow::Cow::<'de, str>::deserialize(deserializer)?;
        s.parse()
            .map_err(|err| D::Error::custom(format!("invalid id: {err}")))
    }
}

#[cfg(test)]
mod test {
    use super::Id;

    #[test]
    fn generated_ids_are_time_ordered() {
        let mut last = Id::generate();
        for _ in 0..100 {
            std::thread::sleep(std::time::Duration::from_millis(2));
            let next = Id::generate();
            assert!(next > last, "{next} must order after {last}");
            last = next;
        }
    }

    #[test]
    fn id_round_trips_through_serde() {
        let id = Id::generate();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: Id = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn id_rejects_malformed_input() {
        assert!(serde_json::from_str::<Id>("\"not-a-uuid\"").is_err());
    }
}
