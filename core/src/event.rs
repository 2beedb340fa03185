//! Domain events, stored records, and the codec seam between them.
//!
//! Events are immutable facts. The log stores them as opaque records
//! ([`RecordedEvent`]); the domain works with typed values. An
//! [`EventCodec`] translates between the two and is pluggable per
//! repository or projection, so the wire encoding is a configuration
//! concern rather than a property of the domain types. The default codec
//! is [`BincodeCodec`]: bincode payloads tagged with the event's type
//! string.
//!
//! A malformed payload is always a hard [`CodecError`]. Decoding never
//! degrades to "record absent" — a record that exists but cannot be parsed
//! is corrupt data, not missing data.

use crate::stream::StreamId;
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;

/// Error produced by encoding or decoding event payloads.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Failed to serialize an event to bytes.
    #[error("Failed to encode event: {0}")]
    Encode(String),

    /// Failed to deserialize an event from bytes.
    #[error("Failed to decode event {event_type}: {reason}")]
    Decode {
        /// The type tag of the record that failed to decode.
        event_type: String,
        /// Underlying decoder message.
        reason: String,
    },
}

/// A domain event that can be appended to a stream and replayed.
///
/// # Type tags
///
/// `event_type()` returns a stable string identifier with a version
/// suffix (`"ProductCreated.v1"`). The tag is stored next to the payload
/// and drives projection dispatch and codec routing, so it must never
/// change for an already-written schema; a schema change gets a new
/// suffix instead.
///
/// # Examples
///
/// ```
/// use replay_core::event::Event;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Clone, Debug, Serialize, Deserialize)]
/// enum ProductEvent {
///     Created { product_id: String },
///     VariantAdded { variant_id: String },
/// }
///
/// impl Event for ProductEvent {
///     fn event_type(&self) -> &'static str {
///         match self {
///             ProductEvent::Created { .. } => "ProductCreated.v1",
///             ProductEvent::VariantAdded { .. } => "VariantAddedToProduct.v1",
///         }
///     }
/// }
/// ```
pub trait Event: std::fmt::Debug + Send + Sync + 'static {
    /// The stable type tag for this event.
    fn event_type(&self) -> &'static str;

    /// Serialize this event to bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails.
    fn to_bytes(&self) -> Result<Vec<u8>, CodecError>
    where
        Self: Serialize,
    {
        bincode::serialize(self).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Deserialize an event from bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if the bytes do not parse as this
    /// event type.
    fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError>
    where
        Self: DeserializeOwned + Sized,
    {
        bincode::deserialize(bytes).map_err(|e| CodecError::Decode {
            event_type: String::new(),
            reason: e.to_string(),
        })
    }
}

/// A proposed record: an event encoded for appending, not yet stored.
///
/// Metadata is free-form JSON carried alongside the payload; typical
/// fields are correlation ids and the acting user. The log stores it
/// opaquely.
#[derive(Clone, Debug)]
pub struct EventData {
    /// The event type tag (e.g. `"ProductCreated.v1"`).
    pub event_type: String,
    /// The encoded event payload.
    pub data: Vec<u8>,
    /// Optional JSON metadata.
    pub metadata: Option<serde_json::Value>,
}

impl EventData {
    /// Create a proposed record.
    #[must_use]
    pub const fn new(
        event_type: String,
        data: Vec<u8>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_type,
            data,
            metadata,
        }
    }
}

impl fmt::Display for EventData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EventData {{ type: {}, size: {} bytes }}",
            self.event_type,
            self.data.len()
        )
    }
}

/// A stored record read back from the log.
///
/// `position` is 1-based and strictly increasing within a stream; the
/// position of the last record equals the stream's version.
#[derive(Clone, Debug)]
pub struct RecordedEvent {
    /// The stream this record belongs to.
    pub stream: StreamId,
    /// 1-based position within the stream.
    pub position: u64,
    /// The event type tag.
    pub event_type: String,
    /// The encoded event payload.
    pub data: Vec<u8>,
    /// Optional JSON metadata.
    pub metadata: Option<serde_json::Value>,
}

impl fmt::Display for RecordedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} ({})",
            self.stream, self.position, self.event_type
        )
    }
}

/// Pluggable translation between typed events and log records.
///
/// Both the repository (replay, append) and typed projection helpers go
/// through a codec; swapping the wire format means swapping the codec,
/// nothing else. Implementations must be stateless or internally
/// synchronized.
pub trait EventCodec<E>: Send + Sync {
    /// Encode a typed event into a proposed record.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if the event cannot be serialized.
    fn encode(&self, event: &E) -> Result<EventData, CodecError>;

    /// Decode a stored record into a typed event.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if the payload is malformed. This is
    /// a hard error; callers must not treat it as an absent record.
    fn decode(&self, record: &RecordedEvent) -> Result<E, CodecError>;
}

/// The default codec: bincode payloads tagged via [`Event::event_type`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeCodec;

impl BincodeCodec {
    /// Create the default codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl<E> EventCodec<E> for BincodeCodec
where
    E: Event + Serialize + DeserializeOwned,
{
    fn encode(&self, event: &E) -> Result<EventData, CodecError> {
        Ok(EventData::new(
            event.event_type().to_string(),
            event.to_bytes()?,
            None,
        ))
    }

    fn decode(&self, record: &RecordedEvent) -> Result<E, CodecError> {
        bincode::deserialize(&record.data).map_err(|e| CodecError::Decode {
            event_type: record.event_type.clone(),
            reason: e.to_string(),
        })
    }
}
