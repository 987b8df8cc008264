//! Opaque continuation tokens for ordered listings.
//!
//! A token encodes the (created_at, id) position of the last row of the
//! previous page, exactly as stored, so the next query can resume with a
//! keyset predicate instead of an offset.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use skillswap_types::{Error, Result};

pub fn encode_cursor(created_at: DateTime<Utc>, id: Uuid) -> String {
    B64.encode(format!("{}|{}", skillswap_db::ts(created_at), id))
}

/// Decode a continuation token back into its (created_at, id) pair.
/// Garbage tokens are a validation error, not a crash.
pub fn decode_cursor(token: &str) -> Result<(String, String)> {
    let bytes = B64
        .decode(token)
        .map_err(|_| Error::validation("Invalid continuation token"))?;
    let decoded =
        String::from_utf8(bytes).map_err(|_| Error::validation("Invalid continuation token"))?;

    let (created_at, id) = decoded
        .split_once('|')
        .ok_or_else(|| Error::validation("Invalid continuation token"))?;
    if id.parse::<Uuid>().is_err() {
        return Err(Error::validation("Invalid continuation token"));
    }

    Ok((created_at.to_string(), id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trip() {
        let now = Utc::now();
        let id = Uuid::from_u128(42);
        let token = encode_cursor(now, id);

        let (created_at, decoded_id) = decode_cursor(&token).unwrap();
        assert_eq!(created_at, skillswap_db::ts(now));
        assert_eq!(decoded_id, id.to_string());
    }

    #[test]
    fn garbage_tokens_are_validation_errors() {
        assert!(matches!(decode_cursor("???"), Err(Error::Validation(_))));
        let no_sep = B64.encode("not-a-cursor");
        assert!(matches!(decode_cursor(&no_sep), Err(Error::Validation(_))));
    }
}
