//! Off-chain token metadata documents.
//!
//! The ledgers never interpret a metadata URI; these types model the JSON
//! document the URI resolves to (`name`, `description`, `image`, and an
//! optional attribute list whose values may be strings or numbers) for
//! client layers that compose or render it.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TokenMetadata {
    pub name: String,
    pub description: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<TokenAttribute>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TokenAttribute {
    pub trait_type: String,
    pub value: AttributeValue,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    Number(serde_json::Number),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<u64> for AttributeValue {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl TokenAttribute {
    pub fn new(trait_type: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self {
            trait_type: trait_type.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_pinned_document() {
        // The document shape clients pin before minting.
        let raw = r#"{
            "name": "Sunset #1",
            "description": "Part of the Sunset collection",
            "image": "https://gateway.example/ipfs/QmHash",
            "attributes": [
                {"trait_type": "Collection", "value": "Sunset"},
                {"trait_type": "Edition", "value": 1}
            ]
        }"#;
        let doc: TokenMetadata = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.name, "Sunset #1");
        assert_eq!(doc.attributes.len(), 2);
        assert_eq!(doc.attributes[0].value, AttributeValue::from("Sunset"));
        assert_eq!(doc.attributes[1].value, AttributeValue::from(1u64));
    }

    #[test]
    fn attributes_are_optional() {
        let raw = r#"{"name": "n", "description": "d", "image": "i"}"#;
        let doc: TokenMetadata = serde_json::from_str(raw).unwrap();
        assert!(doc.attributes.is_empty());
        // And they stay absent on re-encode.
        let encoded = serde_json::to_string(&doc).unwrap();
        assert!(!encoded.contains("attributes"));
    }

    #[test]
    fn documents_round_trip() {
        let doc = TokenMetadata {
            name: "Lone".into(),
            description: "One of one".into(),
            image: "store://abc".into(),
            attributes: vec![
                TokenAttribute::new("Creator", "alice"),
                TokenAttribute::new("Edition", 1u64),
            ],
        };
        let encoded = serde_json::to_vec(&doc).unwrap();
        let decoded: TokenMetadata = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(decoded, doc);
    }
}
