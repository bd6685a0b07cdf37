//! Codec boundary between typed items and stored JSON documents.
//!
//! A stored document is a flat JSON object: the payload's own attributes plus
//! the reserved key, version, date and row-type attributes. Payloads must
//! serialize to a JSON object; anything else is an `UnexpectedResponse`.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{CodecError, Result};
use crate::types::{
    CREATE_DATE_ATTRIBUTE, CompositePrimaryKey, KeyAttributes, LAST_UPDATED_DATE_ATTRIBUTE,
    ROW_TYPE_ATTRIBUTE, ROW_VERSION_ATTRIBUTE, RowStatus, TypedDatabaseItem,
};

/// A type-erased item: metadata plus the payload's encoded attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedItem {
    pub key: CompositePrimaryKey,
    pub row_status: RowStatus,
    pub create_date: DateTime<Utc>,
    pub row_type: String,
    pub attributes: Map<String, Value>,
}

impl EncodedItem {
    /// Render the full stored document using the table's key attribute names.
    pub fn to_document(&self, key_attributes: &KeyAttributes) -> Value {
        let mut doc = self.attributes.clone();
        doc.insert(
            key_attributes.partition_key.clone(),
            Value::String(self.key.partition_key.clone()),
        );
        doc.insert(
            key_attributes.sort_key.clone(),
            Value::String(self.key.sort_key.clone()),
        );
        doc.insert(
            ROW_VERSION_ATTRIBUTE.to_string(),
            Value::from(self.row_status.row_version),
        );
        doc.insert(
            LAST_UPDATED_DATE_ATTRIBUTE.to_string(),
            Value::String(format_timestamp(&self.row_status.last_updated_date)),
        );
        doc.insert(
            CREATE_DATE_ATTRIBUTE.to_string(),
            Value::String(format_timestamp(&self.create_date)),
        );
        doc.insert(
            ROW_TYPE_ATTRIBUTE.to_string(),
            Value::String(self.row_type.clone()),
        );
        Value::Object(doc)
    }

    /// Parse a stored document back into its metadata and payload attributes.
    pub fn from_document(doc: &Value, key_attributes: &KeyAttributes) -> Result<Self> {
        let Some(obj) = doc.as_object() else {
            return Err(CodecError::unexpected("expected a structure").into());
        };
        let mut attributes = obj.clone();

        let partition_key = take_string(&mut attributes, &key_attributes.partition_key)?;
        let sort_key = take_string(&mut attributes, &key_attributes.sort_key)?;
        let row_version = attributes
            .remove(ROW_VERSION_ATTRIBUTE)
            .and_then(|v| v.as_u64())
            .ok_or_else(|| missing(ROW_VERSION_ATTRIBUTE))?;
        let last_updated_date =
            parse_timestamp(&take_string(&mut attributes, LAST_UPDATED_DATE_ATTRIBUTE)?)?;
        let create_date = parse_timestamp(&take_string(&mut attributes, CREATE_DATE_ATTRIBUTE)?)?;
        let row_type = take_string(&mut attributes, ROW_TYPE_ATTRIBUTE)?;

        Ok(Self {
            key: CompositePrimaryKey {
                partition_key,
                sort_key,
            },
            row_status: RowStatus {
                row_version,
                last_updated_date,
            },
            create_date,
            row_type,
            attributes,
        })
    }

    /// Decode the payload attributes as `V`.
    pub fn decode<V: DeserializeOwned>(&self) -> Result<TypedDatabaseItem<V>> {
        let payload = serde_json::from_value(Value::Object(self.attributes.clone()))
            .map_err(|e| CodecError::unexpected(format!("failed to decode payload: {e}")))?;
        Ok(TypedDatabaseItem {
            key: self.key.clone(),
            row_status: self.row_status.clone(),
            create_date: self.create_date,
            row_type: self.row_type.clone(),
            payload,
        })
    }
}

/// Encode a typed item. Fails with `UnexpectedResponse` if the payload does
/// not serialize to a structure.
pub fn encode_item<V: Serialize>(item: &TypedDatabaseItem<V>) -> Result<EncodedItem> {
    let value = serde_json::to_value(&item.payload)
        .map_err(|e| CodecError::unexpected(format!("failed to encode payload: {e}")))?;
    let Value::Object(attributes) = value else {
        return Err(CodecError::unexpected("expected a structure").into());
    };
    Ok(EncodedItem {
        key: item.key.clone(),
        row_status: item.row_status.clone(),
        create_date: item.create_date,
        row_type: item.row_type.clone(),
        attributes,
    })
}

/// Decode a stored document straight into a typed item.
pub fn decode_item<V: DeserializeOwned>(
    doc: &Value,
    key_attributes: &KeyAttributes,
) -> Result<TypedDatabaseItem<V>> {
    EncodedItem::from_document(doc, key_attributes)?.decode()
}

/// The canonical timestamp form used in documents and conditions.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CodecError::unexpected(format!("invalid timestamp '{s}': {e}")).into())
}

fn take_string(attributes: &mut Map<String, Value>, name: &str) -> Result<String> {
    match attributes.remove(name) {
        Some(Value::String(s)) => Ok(s),
        _ => Err(missing(name)),
    }
}

fn missing(name: &str) -> crate::error::Error {
    CodecError::unexpected(format!("missing or malformed attribute '{name}'")).into()
}

// ---------------------------------------------------------------------------
// Polymorphic decoding
// ---------------------------------------------------------------------------

type DecodeFn<T> = Box<dyn Fn(&EncodedItem) -> Result<T> + Send + Sync>;

/// Decode-dispatch table keyed by the `RowType` discriminator.
///
/// `T` is whatever the caller wants heterogeneous items to become (an enum,
/// a boxed trait object). New kinds are added with [`register`](Self::register).
pub struct PolymorphicDecoder<T> {
    decoders: HashMap<String, DecodeFn<T>>,
}

impl<T> PolymorphicDecoder<T> {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register payload type `V` under `row_type`, wrapping decoded items with `wrap`.
    pub fn register<V, F>(mut self, row_type: impl Into<String>, wrap: F) -> Self
    where
        T: 'static,
        V: DeserializeOwned + 'static,
        F: Fn(TypedDatabaseItem<V>) -> T + Send + Sync + 'static,
    {
        self.decoders.insert(
            row_type.into(),
            Box::new(move |item: &EncodedItem| item.decode::<V>().map(&wrap)),
        );
        self
    }

    pub fn decode(&self, item: &EncodedItem) -> Result<T> {
        let decoder = self.decoders.get(&item.row_type).ok_or_else(|| {
            CodecError::unexpected(format!("unknown row type '{}'", item.row_type))
        })?;
        decoder(item)
    }

    pub fn is_registered(&self, row_type: &str) -> bool {
        self.decoders.contains_key(row_type)
    }
}

impl<T> Default for PolymorphicDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        age: u32,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Address {
        city: String,
    }

    #[derive(Debug, PartialEq)]
    enum Row {
        Profile(TypedDatabaseItem<Profile>),
        Address(TypedDatabaseItem<Address>),
    }

    fn profile_item() -> TypedDatabaseItem<Profile> {
        TypedDatabaseItem::new(
            CompositePrimaryKey::new("user#1", "profile"),
            Profile {
                name: "Alice".to_string(),
                age: 30,
            },
        )
    }

    #[test]
    fn test_document_layout() {
        let item = profile_item();
        let encoded = encode_item(&item).unwrap();
        let doc = encoded.to_document(&KeyAttributes::default());

        assert_eq!(doc["PK"], "user#1");
        assert_eq!(doc["SK"], "profile");
        assert_eq!(doc["RowVersion"], 1);
        assert_eq!(doc["RowType"], "Profile");
        assert_eq!(doc["name"], "Alice");
        assert_eq!(doc["CreateDate"], format_timestamp(&item.create_date));
    }

    #[test]
    fn test_decode_restores_item() {
        let item = profile_item();
        let attrs = KeyAttributes::new("GSI-1-PK", "GSI-1-SK");
        let doc = encode_item(&item).unwrap().to_document(&attrs);

        let decoded: TypedDatabaseItem<Profile> = decode_item(&doc, &attrs).unwrap();
        assert_eq!(decoded, item);
    }

    #[test]
    fn test_non_structure_payload_is_unexpected_response() {
        let item = TypedDatabaseItem::new(CompositePrimaryKey::new("a", "b"), 42u32);
        let err = encode_item(&item).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Codec(CodecError::UnexpectedResponse { .. })
        ));
    }

    #[test]
    fn test_non_object_document_is_unexpected_response() {
        let err = EncodedItem::from_document(&json!("nope"), &KeyAttributes::default());
        assert!(err.is_err());
    }

    #[test]
    fn test_missing_reserved_attribute() {
        let doc = json!({"PK": "a", "SK": "b", "name": "x"});
        let err = EncodedItem::from_document(&doc, &KeyAttributes::default()).unwrap_err();
        assert!(err.to_string().contains("RowVersion"));
    }

    #[test]
    fn test_polymorphic_dispatch_by_row_type() {
        let decoder = PolymorphicDecoder::new()
            .register::<Profile, _>("Profile", Row::Profile)
            .register::<Address, _>("Address", Row::Address);

        let profile = profile_item();
        let address = TypedDatabaseItem::new(
            CompositePrimaryKey::new("user#1", "address"),
            Address {
                city: "Portland".to_string(),
            },
        );

        let decoded = decoder.decode(&encode_item(&profile).unwrap()).unwrap();
        assert_eq!(decoded, Row::Profile(profile));
        let decoded = decoder.decode(&encode_item(&address).unwrap()).unwrap();
        assert_eq!(decoded, Row::Address(address));
    }

    #[test]
    fn test_polymorphic_unknown_row_type() {
        let decoder: PolymorphicDecoder<Row> =
            PolymorphicDecoder::new().register::<Profile, _>("Profile", Row::Profile);
        let item = profile_item().with_row_type("Unregistered");
        let err = decoder.decode(&encode_item(&item).unwrap()).unwrap_err();
        assert!(err.to_string().contains("unknown row type"));
        assert!(!decoder.is_registered("Unregistered"));
    }
}
