use std::collections::BTreeMap;
use std::fmt;

/// A typed value for one header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Num(i64),
    Bool(bool),
    List(Vec<String>),
    Nums(Vec<i64>),
    Pairs(Vec<(String, String)>),
    NumPairs(Vec<(i64, i64)>),
}

impl FieldValue {
    /// Short type name, matching the pattern type keywords.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Num(_) => "num",
            Self::Bool(_) => "bool",
            Self::List(_) => "list",
            Self::Nums(_) => "nums",
            Self::Pairs(_) => "pairs",
            Self::NumPairs(_) => "numPairs",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Num(n) => write!(f, "{}", n),
            Self::Bool(b) => write!(f, "{}", b),
            Self::List(items) => f.write_str(&items.join(",")),
            Self::Nums(nums) => {
                let parts: Vec<String> = nums.iter().map(|n| n.to_string()).collect();
                f.write_str(&parts.join(","))
            }
            Self::Pairs(pairs) => {
                let parts: Vec<String> = pairs.iter().map(|(k, v)| format!("{};{}", k, v)).collect();
                f.write_str(&parts.join(";"))
            }
            Self::NumPairs(pairs) => {
                let parts: Vec<String> = pairs.iter().map(|(a, b)| format!("{};{}", a, b)).collect();
                f.write_str(&parts.join(";"))
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Num(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        Self::Num(v as i64)
    }
}

impl From<usize> for FieldValue {
    fn from(v: usize) -> Self {
        Self::Num(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(v: Vec<String>) -> Self {
        Self::List(v)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(v: Vec<&str>) -> Self {
        Self::List(v.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<i64>> for FieldValue {
    fn from(v: Vec<i64>) -> Self {
        Self::Nums(v)
    }
}

impl From<Vec<usize>> for FieldValue {
    fn from(v: Vec<usize>) -> Self {
        Self::Nums(v.into_iter().map(|n| i64::try_from(n).unwrap_or(i64::MAX)).collect())
    }
}

impl From<Vec<(String, String)>> for FieldValue {
    fn from(v: Vec<(String, String)>) -> Self {
        Self::Pairs(v)
    }
}

impl From<Vec<(i64, i64)>> for FieldValue {
    fn from(v: Vec<(i64, i64)>) -> Self {
        Self::NumPairs(v)
    }
}

/// Named field values plus an optional trailing payload.
///
/// An empty payload is the same as no payload: it is never encoded and never
/// produced by decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    values: BTreeMap<String, FieldValue>,
    payload: Option<String>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Builder-style payload.
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.set_payload(payload);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn set_payload(&mut self, payload: impl Into<String>) {
        let payload = payload.into();
        self.payload = if payload.is_empty() { None } else { Some(payload) };
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name)? {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn num(&self, name: &str) -> Option<i64> {
        match self.values.get(name)? {
            FieldValue::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name)? {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn list(&self, name: &str) -> Option<&[String]> {
        match self.values.get(name)? {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn nums(&self, name: &str) -> Option<&[i64]> {
        match self.values.get(name)? {
            FieldValue::Nums(nums) => Some(nums),
            _ => None,
        }
    }

    pub fn pairs(&self, name: &str) -> Option<&[(String, String)]> {
        match self.values.get(name)? {
            FieldValue::Pairs(pairs) => Some(pairs),
            _ => None,
        }
    }

    pub fn num_pairs(&self, name: &str) -> Option<&[(i64, i64)]> {
        match self.values.get(name)? {
            FieldValue::NumPairs(pairs) => Some(pairs),
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// Number of named fields (the payload is not counted).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.payload.is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_absent() {
        let fields = Fields::new().with("a", 1i64).with_payload("");
        assert_eq!(fields.payload(), None);
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn typed_getters_reject_other_kinds() {
        let fields = Fields::new().with("n", 7i64).with("t", "x");
        assert_eq!(fields.num("n"), Some(7));
        assert_eq!(fields.text("n"), None);
        assert_eq!(fields.text("t"), Some("x"));
        assert_eq!(fields.num("missing"), None);
    }

    #[test]
    fn display_matches_wire_joins() {
        assert_eq!(FieldValue::Nums(vec![1, 2, 3]).to_string(), "1,2,3");
        assert_eq!(FieldValue::NumPairs(vec![(1, 2), (3, 4)]).to_string(), "1;2;3;4");
    }
}
