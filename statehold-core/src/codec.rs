//! The document format used for persisted entity state.
//!
//! A document is the JSON object of the payload's fields with the entity id
//! stored alongside them under `_id`. Payloads must therefore serialize as a
//! struct or a map.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::EntityId;

pub const ID_FIELD: &str = "_id";

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode document for {id}: {source}")]
    Encode {
        id: EntityId,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode document: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("document for {expected} carries the id of {found}")]
    IdMismatch { expected: EntityId, found: EntityId },
}

#[derive(Serialize)]
struct DocumentRef<'a, T> {
    #[serde(rename = "_id")]
    id: EntityId,
    #[serde(flatten)]
    payload: &'a T,
}

#[derive(Deserialize)]
struct DocumentOwned<T> {
    #[serde(rename = "_id")]
    id: EntityId,
    #[serde(flatten)]
    payload: T,
}

pub fn encode_document<T: Serialize>(id: EntityId, payload: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(&DocumentRef { id, payload })
        .map_err(|source| CodecError::Encode { id, source })
}

/// Decode a document, checking that it belongs to `expected`
pub fn decode_document<T: DeserializeOwned>(
    expected: EntityId,
    bytes: &[u8],
) -> Result<T, CodecError> {
    let DocumentOwned { id, payload } =
        serde_json::from_slice::<DocumentOwned<T>>(bytes).map_err(CodecError::Decode)?;
    if id != expected {
        return Err(CodecError::IdMismatch {
            expected,
            found: id,
        });
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Room {
        name: String,
        occupants: u32,
    }

    #[test]
    fn document_carries_id_field_next_to_payload() {
        let room = Room {
            name: "lobby".to_string(),
            occupants: 3,
        };
        let bytes = encode_document(EntityId::new(42), &room).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value[ID_FIELD], 42);
        assert_eq!(value["name"], "lobby");

        let decoded: Room = decode_document(EntityId::new(42), &bytes).unwrap();
        assert_eq!(decoded, room);
    }

    #[test]
    fn decoding_someone_elses_document_fails() {
        let bytes = encode_document(EntityId::new(1), &Room::default()).unwrap();
        let err = decode_document::<Room>(EntityId::new(2), &bytes).unwrap_err();
        assert!(matches!(err, CodecError::IdMismatch { .. }));
    }

    #[test]
    fn scalar_payloads_cannot_be_flattened() {
        assert!(encode_document(EntityId::new(1), &5u32).is_err());
    }
}
