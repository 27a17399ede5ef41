//! Row-level data model: an ordered field map per input row, and the storage
//! identifier assigned to each row.

use std::fmt;

/// One input row: field names paired with their values, in header order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn with_capacity(n: usize) -> Self {
        Self { fields: Vec::with_capacity(n) }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut rec = Self::default();
        for (k, v) in pairs {
            rec.push(k, v);
        }
        rec
    }

    /// Set `name` to `value`. A name seen again keeps its first position and takes
    /// the later value, so every field name occurs once.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let (name, value) = (name.into(), value.into());
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some((_, v)) => *v = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

/// Storage key of an accepted row: `<keyset prefix><sequence number>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(keyset_prefix: &str, seq: u64) -> Self {
        Self(format!("{keyset_prefix}{seq}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContainerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_header_order_and_looks_up_by_name() {
        let r = Record::from_pairs([("id", "7"), ("name", "ann"), ("city", "oslo")]);
        let names: Vec<&str> = r.iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["id", "name", "city"]);
        assert_eq!(r.get("name"), Some("ann"));
        assert_eq!(r.get("missing"), None);
    }

    #[test]
    fn repeated_name_takes_later_value_in_first_position() {
        let r = Record::from_pairs([("id", "1"), ("name", "ann"), ("id", "2")]);
        assert_eq!(r.get("id"), Some("2"));
        assert_eq!(r.fields(), [("id".to_string(), "2".to_string()), ("name".to_string(), "ann".to_string())]);
    }

    #[test]
    fn container_id_is_prefix_then_sequence() {
        assert_eq!(ContainerId::new("userdata", 12).as_str(), "userdata12");
        assert_eq!(ContainerId::new("", 3).to_string(), "3");
    }
}
