//! Serde helpers shared by the JSON formats of the crate

/// Byte vectors as lowercase hex strings
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    /// Accepts an optional `0x` prefix and either case
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Blob {
        #[serde(with = "super::hex_bytes")]
        data: Vec<u8>,
    }

    #[test]
    fn test_hex_bytes() {
        let blob = Blob {
            data: vec![0xde, 0xad, 0xbe, 0xef],
        };
        assert_eq!(serde_json::to_string(&blob).unwrap(), r#"{"data":"deadbeef"}"#);
        let parsed: Blob = serde_json::from_str(r#"{"data":"0xDEADBEEF"}"#).unwrap();
        assert_eq!(parsed, blob);
        assert!(serde_json::from_str::<Blob>(r#"{"data":"xyz"}"#).is_err());
    }
}
