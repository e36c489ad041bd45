//! Maps trigger messages received by a deployed function into events.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum TransformError {
    #[error("Message context carries no message")]
    MissingMessage,
    #[error("Message context carries no delivery metadata")]
    MissingMetadata,
    #[error("Invalid message envelope: {0}")]
    InvalidEnvelope(
        #[source]
        #[from]
        serde_json::Error,
    ),
    #[error("Message data is not valid base64: {0}")]
    InvalidData(
        #[source]
        #[from]
        base64::DecodeError,
    ),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PubSubMessage {
    pub data: Vec<u8>,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EventResource {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// Delivery metadata of a background function call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub resource: EventResource,
}

/// What a function receives on invocation. Either part can be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageContext {
    pub message: Option<PubSubMessage>,
    pub metadata: Option<EventMetadata>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    data: Option<RawMessage>,
    context: Option<EventMetadata>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    /// data is base64 encoded
    #[serde(default)]
    data: String,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
}

impl MessageContext {
    pub fn new(message: PubSubMessage, metadata: EventMetadata) -> Self {
        Self {
            message: Some(message),
            metadata: Some(metadata),
        }
    }

    /// Parses the JSON body of a background function call,
    /// `{"data": {"data": <base64>, "attributes": {..}}, "context": {..}}`.
    pub fn from_json(raw: &str) -> Result<Self, TransformError> {
        let envelope: Envelope = serde_json::from_str(raw)?;

        let message = envelope
            .data
            .map(|raw| -> Result<PubSubMessage, TransformError> {
                Ok(PubSubMessage {
                    data: BASE64.decode(raw.data.trim())?,
                    attributes: raw.attributes,
                })
            })
            .transpose()?;

        Ok(Self {
            message,
            metadata: envelope.context,
        })
    }
}

/// Event in its canonical shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// timestamp is when the message was published
    pub timestamp: DateTime<Utc>,
    pub fields: Map<String, Value>,
}

/// Transforms a Pub/Sub message into an event.
///
/// Nothing is emitted unless both the message and its delivery metadata are present.
pub fn pub_sub(context: &MessageContext) -> Result<Event, TransformError> {
    pub_sub_read_at(context, Utc::now())
}

fn pub_sub_read_at(
    context: &MessageContext,
    read_timestamp: DateTime<Utc>,
) -> Result<Event, TransformError> {
    let message = context
        .message
        .as_ref()
        .ok_or(TransformError::MissingMessage)?;
    let metadata = context
        .metadata
        .as_ref()
        .ok_or(TransformError::MissingMetadata)?;

    let mut fields = Map::new();
    fields.insert(String::from("read_timestamp"), json!(read_timestamp));
    fields.insert(
        String::from("message"),
        json!(String::from_utf8_lossy(&message.data)),
    );
    fields.insert(String::from("attributes"), json!(message.attributes));
    fields.insert(String::from("id"), json!(metadata.event_id));
    fields.insert(
        String::from("resource"),
        json!({
            "service": metadata.resource.service,
            "name": metadata.resource.name,
            "event_type": metadata.resource.kind,
        }),
    );

    Ok(Event {
        timestamp: metadata.timestamp,
        fields,
    })
}
