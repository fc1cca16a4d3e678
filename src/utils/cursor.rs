use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Keyset position in a newest-first journal listing.
/// Encoded as base64 of "{created_at_rfc3339}|{uuid}".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl Cursor {
    pub fn new(created_at: DateTime<Utc>, id: Uuid) -> Self {
        Self { created_at, id }
    }

    /// True when `(created_at, id)` sorts after this cursor in descending order.
    pub fn precedes(&self, created_at: DateTime<Utc>, id: Uuid) -> bool {
        (created_at, id) < (self.created_at, self.id)
    }

    pub fn encode(&self) -> String {
        let s = format!("{}|{}", self.created_at.to_rfc3339(), self.id);
        URL_SAFE_NO_PAD.encode(s)
    }

    pub fn decode(cursor: &str) -> Result<Self, String> {
        let decoded = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|e| format!("base64 decode error: {}", e))?;
        let s = String::from_utf8(decoded).map_err(|e| format!("utf8 error: {}", e))?;
        let mut parts = s.splitn(2, '|');
        let ts_str = parts.next().ok_or_else(|| "missing timestamp in cursor".to_string())?;
        let id_str = parts.next().ok_or_else(|| "missing id in cursor".to_string())?;
        let ts = DateTime::parse_from_rfc3339(ts_str)
            .map_err(|e| format!("timestamp parse error: {}", e))?
            .with_timezone(&Utc);
        let id = Uuid::parse_str(id_str).map_err(|e| format!("uuid parse error: {}", e))?;
        Ok(Self::new(ts, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Cursor::decode("not base64 !!").is_err());
        let no_separator = URL_SAFE_NO_PAD.encode("2024-01-01T00:00:00Z");
        assert!(Cursor::decode(&no_separator).is_err());
    }

    #[test]
    fn test_encoded_cursor_decodes_to_same_position() {
        let cursor = Cursor::new(Utc::now(), Uuid::new_v4());
        let decoded = Cursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded.id, cursor.id);
        assert_eq!(decoded.created_at.timestamp_micros(), cursor.created_at.timestamp_micros());
    }

    #[test]
    fn test_precedes_orders_newest_first() {
        let now = Utc::now();
        let cursor = Cursor::new(now, Uuid::new_v4());
        assert!(cursor.precedes(now - chrono::Duration::seconds(1), Uuid::new_v4()));
        assert!(!cursor.precedes(now + chrono::Duration::seconds(1), Uuid::new_v4()));
    }
}
