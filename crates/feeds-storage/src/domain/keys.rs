//! # Key Encoding
//!
//! Builds the byte keys of the durable store. Block indexes and key
//! generation versions are big-endian so lexicographic key order equals
//! numeric order, which makes prefix scans return rows in block order.
//!
//! Table layout:
//!
//! | Prefix | Row |
//! |--------|-----|
//! | `feed:` | `Feed` by id |
//! | `group:` | `GroupFeed` by id |
//! | `part:` | `Participant` by `(feed, address)` |
//! | `partidx:` | membership index by `(address, feed)` |
//! | `keygen:` | `KeyGeneration` by `(feed, version)` |
//! | `wrapped:` | `WrappedKey` by `(feed, version, address)` |
//! | `msg:` | `EncryptedMessage` by `(feed, block, message)` |
//! | `msgid:` | message locator by id |
//! | `att:` | `Attachment` by id |
//! | `readpos:` | `ReadPosition` by `(address, feed)` |
//! | `applied:` | idempotent replay marker by transaction id |

use shared_types::{Address, BlockIndex, FeedId, MessageId, TransactionId};

const SEP: u8 = b':';

fn concat(parts: &[&[u8]]) -> Vec<u8> {
    let len = parts.iter().map(|p| p.len() + 1).sum();
    let mut key = Vec::with_capacity(len);
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push(SEP);
        }
        key.extend_from_slice(part);
    }
    key
}

/// `feed:{feedId}`
pub fn feed(id: FeedId) -> Vec<u8> {
    concat(&[b"feed", id.0.as_bytes().as_slice()])
}

/// `group:{feedId}`
pub fn group(id: FeedId) -> Vec<u8> {
    concat(&[b"group", id.0.as_bytes().as_slice()])
}

/// `part:{feedId}:{address}`
pub fn participant(feed_id: FeedId, address: &Address) -> Vec<u8> {
    concat(&[b"part", feed_id.0.as_bytes().as_slice(), address.as_str().as_bytes()])
}

/// `part:{feedId}:` prefix for scanning a feed's participants.
pub fn participant_prefix(feed_id: FeedId) -> Vec<u8> {
    let mut key = concat(&[b"part", feed_id.0.as_bytes().as_slice()]);
    key.push(SEP);
    key
}

/// `partidx:{address}:{feedId}` membership index row.
pub fn participant_index(address: &Address, feed_id: FeedId) -> Vec<u8> {
    concat(&[b"partidx", address.as_str().as_bytes(), feed_id.0.as_bytes().as_slice()])
}

/// `partidx:{address}:` prefix for scanning a user's feeds.
pub fn participant_index_prefix(address: &Address) -> Vec<u8> {
    let mut key = concat(&[b"partidx", address.as_str().as_bytes()]);
    key.push(SEP);
    key
}

/// `keygen:{feedId}:{version:be32}`
pub fn key_generation(feed_id: FeedId, version: u32) -> Vec<u8> {
    concat(&[b"keygen", feed_id.0.as_bytes().as_slice(), version.to_be_bytes().as_slice()])
}

/// `keygen:{feedId}:` prefix, versions in ascending order.
pub fn key_generation_prefix(feed_id: FeedId) -> Vec<u8> {
    let mut key = concat(&[b"keygen", feed_id.0.as_bytes().as_slice()]);
    key.push(SEP);
    key
}

/// `wrapped:{feedId}:{version:be32}:{address}`
pub fn wrapped_key(feed_id: FeedId, version: u32, address: &Address) -> Vec<u8> {
    concat(&[
        b"wrapped",
        feed_id.0.as_bytes().as_slice(),
        version.to_be_bytes().as_slice(),
        address.as_str().as_bytes(),
    ])
}

/// `wrapped:{feedId}:` prefix over all versions and members.
pub fn wrapped_key_feed_prefix(feed_id: FeedId) -> Vec<u8> {
    let mut key = concat(&[b"wrapped", feed_id.0.as_bytes().as_slice()]);
    key.push(SEP);
    key
}

/// `msg:{feedId}:{blockIndex:be64}:{messageId}`
pub fn message(feed_id: FeedId, block_index: BlockIndex, id: MessageId) -> Vec<u8> {
    concat(&[
        b"msg",
        feed_id.0.as_bytes().as_slice(),
        block_index.to_be_bytes().as_slice(),
        id.0.as_bytes().as_slice(),
    ])
}

/// `msg:{feedId}:` prefix, rows in block order.
pub fn message_prefix(feed_id: FeedId) -> Vec<u8> {
    let mut key = concat(&[b"msg", feed_id.0.as_bytes().as_slice()]);
    key.push(SEP);
    key
}

/// `msgid:{messageId}` locator row.
pub fn message_locator(id: MessageId) -> Vec<u8> {
    concat(&[b"msgid", id.0.as_bytes().as_slice()])
}

/// `att:{attachmentId}`
pub fn attachment(id: MessageId) -> Vec<u8> {
    concat(&[b"att", id.0.as_bytes().as_slice()])
}

/// `readpos:{address}:{feedId}`
pub fn read_position(address: &Address, feed_id: FeedId) -> Vec<u8> {
    concat(&[
        b"readpos",
        address.as_str().as_bytes(),
        feed_id.0.as_bytes().as_slice(),
    ])
}

/// `readpos:{address}:` prefix for all of a user's bookmarks.
pub fn read_position_prefix(address: &Address) -> Vec<u8> {
    let mut key = concat(&[b"readpos", address.as_str().as_bytes()]);
    key.push(SEP);
    key
}

/// `applied:{transactionId}` replay marker.
pub fn applied_transaction(id: TransactionId) -> Vec<u8> {
    concat(&[b"applied", id.0.as_bytes().as_slice()])
}
