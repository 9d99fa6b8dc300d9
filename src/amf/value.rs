//! AMF value type

/// AMF0 value
///
/// Objects keep their properties as an ordered list so that encoded
/// command objects are byte-for-byte deterministic.
#[derive(Debug, Clone, PartialEq)]
pub enum AmfValue {
    /// Null (0x05)
    Null,
    /// Undefined (0x06)
    Undefined,
    /// Boolean (0x01)
    Boolean(bool),
    /// IEEE 754 double (0x00)
    Number(f64),
    /// UTF-8 string (0x02 or 0x0C)
    String(String),
    /// Anonymous object (0x03)
    Object(Vec<(String, AmfValue)>),
    /// Associative array (0x08)
    EcmaArray(Vec<(String, AmfValue)>),
    /// Dense array (0x0A)
    Array(Vec<AmfValue>),
}

impl AmfValue {
    /// Build an object from `(key, value)` pairs
    pub fn object<K, I>(props: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, AmfValue)>,
    {
        AmfValue::Object(props.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Try to get this value as a string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AmfValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AmfValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Look up a property on an object or ECMA array
    pub fn get(&self, key: &str) -> Option<&AmfValue> {
        match self {
            AmfValue::Object(props) | AmfValue::EcmaArray(props) => {
                props.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// Look up a string property
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }
}

impl From<&str> for AmfValue {
    fn from(v: &str) -> Self {
        AmfValue::String(v.to_string())
    }
}

impl From<String> for AmfValue {
    fn from(v: String) -> Self {
        AmfValue::String(v)
    }
}

impl From<f64> for AmfValue {
    fn from(v: f64) -> Self {
        AmfValue::Number(v)
    }
}

impl From<bool> for AmfValue {
    fn from(v: bool) -> Self {
        AmfValue::Boolean(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_lookup() {
        let obj = AmfValue::object([
            ("level", AmfValue::from("status")),
            ("code", AmfValue::from("NetStream.Publish.Start")),
        ]);

        assert_eq!(obj.get_string("code"), Some("NetStream.Publish.Start"));
        assert!(obj.get("missing").is_none());
        assert!(AmfValue::Null.get("code").is_none());
    }

    #[test]
    fn test_accessors() {
        assert_eq!(AmfValue::from(1.0).as_number(), Some(1.0));
        assert_eq!(AmfValue::from("x").as_str(), Some("x"));
        assert!(AmfValue::from(true).as_str().is_none());
    }
}
