//! Batch codec: opaque execution payload <-> ordered execution items
//!
//! Layout: a little-endian u32 item count, then one fixed-width header per
//! item (target, value, payload offset, payload length), then the payload
//! region the headers point into. Offsets are absolute from the start of the
//! buffer. Decoding trusts nothing: every length and offset is checked before
//! any item is produced, and a single violation rejects the whole payload.

use thiserror::Error;

use super::types::{Address, ExecutionItem, ADDRESS_WIDTH};

/// Fixed per-item header: target (20) + value (16) + offset (8) + length (8)
pub const ITEM_HEADER_WIDTH: usize = ADDRESS_WIDTH + 16 + 8 + 8;

/// Width of the leading item-count field
const COUNT_WIDTH: usize = 4;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodingError {
    #[error("payload too short: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },
    #[error("item count {count} does not fit the payload")]
    CountOutOfBounds { count: u32 },
    #[error("item {index}: payload slice out of bounds")]
    SliceOutOfBounds { index: u32 },
    #[error("item {index}: offset arithmetic overflow")]
    OffsetOverflow { index: u32 },
}

/// Decode an execution payload. All-or-nothing: any violation produces no items.
pub fn decode_batch(payload: &[u8]) -> Result<Vec<ExecutionItem>, DecodingError> {
    if payload.len() < COUNT_WIDTH {
        return Err(DecodingError::Truncated {
            needed: COUNT_WIDTH,
            have: payload.len(),
        });
    }
    let count = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);

    // The declared header region must fit the buffer before any item is read
    let header_bytes = (count as usize)
        .checked_mul(ITEM_HEADER_WIDTH)
        .and_then(|n| n.checked_add(COUNT_WIDTH))
        .ok_or(DecodingError::CountOutOfBounds { count })?;
    if header_bytes > payload.len() {
        return Err(DecodingError::CountOutOfBounds { count });
    }

    let mut items = Vec::with_capacity(count as usize);
    for index in 0..count {
        let base = COUNT_WIDTH + index as usize * ITEM_HEADER_WIDTH;

        let mut target = [0u8; ADDRESS_WIDTH];
        target.copy_from_slice(&payload[base..base + ADDRESS_WIDTH]);

        let mut cursor = base + ADDRESS_WIDTH;
        let value = u128::from_le_bytes(
            payload[cursor..cursor + 16].try_into().expect("fixed slice"),
        );
        cursor += 16;
        let offset = u64::from_le_bytes(
            payload[cursor..cursor + 8].try_into().expect("fixed slice"),
        );
        cursor += 8;
        let length = u64::from_le_bytes(
            payload[cursor..cursor + 8].try_into().expect("fixed slice"),
        );

        let end = offset
            .checked_add(length)
            .ok_or(DecodingError::OffsetOverflow { index })?;
        if end > payload.len() as u64 {
            return Err(DecodingError::SliceOutOfBounds { index });
        }

        items.push(ExecutionItem {
            target: Address::new(target),
            value,
            payload: payload[offset as usize..end as usize].to_vec(),
        });
    }

    Ok(items)
}

/// Encode items into the canonical payload layout (headers first, payload
/// bytes packed in item order). This produces input for `decode_batch`; it is
/// building the buffer, not trusting one, so it stays a plain serializer.
pub fn encode_batch(items: &[ExecutionItem]) -> Vec<u8> {
    let header_bytes = COUNT_WIDTH + items.len() * ITEM_HEADER_WIDTH;
    let mut buf = Vec::with_capacity(
        header_bytes + items.iter().map(|i| i.payload.len()).sum::<usize>(),
    );

    buf.extend_from_slice(&(items.len() as u32).to_le_bytes());

    let mut next_offset = header_bytes as u64;
    for item in items {
        buf.extend_from_slice(item.target.as_bytes());
        buf.extend_from_slice(&item.value.to_le_bytes());
        buf.extend_from_slice(&next_offset.to_le_bytes());
        buf.extend_from_slice(&(item.payload.len() as u64).to_le_bytes());
        next_offset += item.payload.len() as u64;
    }
    for item in items {
        buf.extend_from_slice(&item.payload);
    }

    buf
}
