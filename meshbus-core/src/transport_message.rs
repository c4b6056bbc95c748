//! `TransportMessage`: the length-prefixed binary wire record exchanged with
//! the transport layer.
//!
//! Encoding is a flat sequence of length-prefixed fields (a `u32` little-endian
//! length followed by that many bytes), mirroring the teacher's frame codec
//! in spirit but carrying this crate's own field set. A header that cannot be
//! parsed never panics: [`read`] reports it via the returned `bool`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message_type::MessageTypeId;
use crate::peer_id::PeerId;

/// Identity of the peer that sent a message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Originator {
    /// The sending peer's identity.
    pub sender_id: String,
    /// The sending peer's transport endpoint.
    pub sender_endpoint: String,
    /// Hostname or machine identifier the sender reported.
    pub sender_machine: String,
    /// The user on whose behalf the message was sent, if any.
    pub initiator_user: String,
}

/// A complete wire-level message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransportMessage {
    /// Unique identity of this message instance.
    pub id: Uuid,
    /// The message's logical type.
    pub message_type_id: MessageTypeId,
    /// Opaque serialized message body.
    pub content: Bytes,
    /// Who sent this message.
    pub originator: Originator,
    /// The deployment environment the message originated in.
    pub environment: String,
    /// Whether this message was persisted by the originator before sending.
    pub was_persisted: bool,
    /// Peer ids this message should additionally be persisted for, out-of-band
    /// of the normal subscription match.
    pub persistent_peer_ids: Vec<PeerId>,
}

impl TransportMessage {
    /// Construct a message with a freshly generated id.
    #[must_use]
    pub fn new(message_type_id: MessageTypeId, content: Bytes, originator: Originator, environment: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            message_type_id,
            content,
            originator,
            environment: environment.into(),
            was_persisted: false,
            persistent_peer_ids: Vec::new(),
        }
    }
}

fn put_str(buf: &mut BytesMut, s: &str) {
    buf.put_u32_le(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn put_bytes(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_u32_le(bytes.len() as u32);
    buf.put_slice(bytes);
}

fn get_str(buf: &mut Bytes) -> Option<String> {
    let len = get_u32(buf)? as usize;
    if buf.remaining() < len {
        return None;
    }
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec()).ok()
}

fn get_bytes(buf: &mut Bytes) -> Option<Bytes> {
    let len = get_u32(buf)? as usize;
    if buf.remaining() < len {
        return None;
    }
    Some(buf.copy_to_bytes(len))
}

fn get_u32(buf: &mut Bytes) -> Option<u32> {
    if buf.remaining() < 4 {
        return None;
    }
    Some(buf.get_u32_le())
}

fn get_u8(buf: &mut Bytes) -> Option<u8> {
    if buf.remaining() < 1 {
        return None;
    }
    Some(buf.get_u8())
}

/// Serialize a `TransportMessage` to its wire representation.
#[must_use]
pub fn write(msg: &TransportMessage) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_slice(msg.id.as_bytes());
    put_str(&mut buf, msg.message_type_id.as_str());
    put_bytes(&mut buf, &msg.content);
    put_str(&mut buf, &msg.originator.sender_id);
    put_str(&mut buf, &msg.originator.sender_endpoint);
    put_str(&mut buf, &msg.originator.sender_machine);
    put_str(&mut buf, &msg.originator.initiator_user);
    put_str(&mut buf, &msg.environment);
    buf.put_u8(u8::from(msg.was_persisted));
    buf.put_u32_le(msg.persistent_peer_ids.len() as u32);
    for peer_id in &msg.persistent_peer_ids {
        put_str(&mut buf, peer_id.as_str());
    }
    buf.freeze()
}

/// Deserialize a `TransportMessage` from its wire representation.
///
/// Never panics. On any malformed input, returns `(TransportMessage::default(), false)`
/// rather than propagating a parse error, matching the transport contract that a bad
/// frame must not interrupt the read loop.
#[must_use]
pub fn read(frame: &[u8]) -> (TransportMessage, bool) {
    match try_read(frame) {
        Some(msg) => (msg, true),
        None => (TransportMessage::default(), false),
    }
}

fn try_read(frame: &[u8]) -> Option<TransportMessage> {
    let mut buf = Bytes::copy_from_slice(frame);
    if buf.remaining() < 16 {
        return None;
    }
    let id_bytes = buf.copy_to_bytes(16);
    let id = Uuid::from_slice(&id_bytes).ok()?;

    let message_type_id = MessageTypeId::new(get_str(&mut buf)?);
    let content = get_bytes(&mut buf)?;
    let sender_id = get_str(&mut buf)?;
    let sender_endpoint = get_str(&mut buf)?;
    let sender_machine = get_str(&mut buf)?;
    let initiator_user = get_str(&mut buf)?;
    let environment = get_str(&mut buf)?;
    let was_persisted = get_u8(&mut buf)? != 0;

    let peer_count = get_u32(&mut buf)? as usize;
    let mut persistent_peer_ids = Vec::with_capacity(peer_count.min(1024));
    for _ in 0..peer_count {
        persistent_peer_ids.push(PeerId::new(get_str(&mut buf)?));
    }

    if buf.has_remaining() {
        return None;
    }

    Some(TransportMessage {
        id,
        message_type_id,
        content,
        originator: Originator { sender_id, sender_endpoint, sender_machine, initiator_user },
        environment,
        was_persisted,
        persistent_peer_ids,
    })
}
