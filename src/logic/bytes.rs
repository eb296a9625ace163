//! Canonical transaction encoding
//!
//! Layout, in order: type (1 byte), timestamp (i32 LE), sender public key,
//! requester public key when present, recipient (8 bytes BE, zero when
//! absent), amount (u64 LE), type asset bytes, then the signature and the
//! second signature unless skipped.

use crate::core::{Transaction, TransactionError};
use crate::crypto::keys::ADDRESS_SUFFIX;
use bytes::{BufMut, BytesMut};

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, TransactionError> {
    hex::decode(value)
        .map_err(|e| TransactionError::InvalidEncoding(format!("{}: {}", field, e)))
}

/// Numeric part of an address as 8 big-endian bytes
pub fn recipient_bytes(recipient: Option<&str>) -> Result<[u8; 8], TransactionError> {
    let Some(address) = recipient else {
        return Ok([0u8; 8]);
    };
    address
        .strip_suffix(ADDRESS_SUFFIX)
        .unwrap_or(address)
        .parse::<u64>()
        .map(u64::to_be_bytes)
        .map_err(|_| TransactionError::InvalidEncoding(format!("recipient {}", address)))
}

/// Encode a transaction around already-encoded asset bytes
pub fn encode(
    tx: &Transaction,
    asset_bytes: &[u8],
    skip_signature: bool,
    skip_second_signature: bool,
) -> Result<Vec<u8>, TransactionError> {
    let sender = decode_hex("senderPublicKey", &tx.sender_public_key)?;
    let mut buf = BytesMut::with_capacity(1 + 4 + sender.len() + 8 + 8 + asset_bytes.len() + 128);

    buf.put_u8(tx.tx_type.as_u8());
    buf.put_i32_le(tx.timestamp);
    buf.put_slice(&sender);

    if let Some(requester) = &tx.requester_public_key {
        buf.put_slice(&decode_hex("requesterPublicKey", requester)?);
    }

    buf.put_slice(&recipient_bytes(tx.recipient_id.as_deref())?);
    buf.put_u64_le(tx.amount);
    buf.put_slice(asset_bytes);

    if !skip_signature && !tx.signature.is_empty() {
        buf.put_slice(&decode_hex("signature", &tx.signature)?);
    }

    if !skip_second_signature {
        if let Some(sign_signature) = &tx.sign_signature {
            buf.put_slice(&decode_hex("signSignature", sign_signature)?);
        }
    }

    Ok(buf.to_vec())
}
