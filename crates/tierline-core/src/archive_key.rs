//! Archive Object Key Derivation
//!
//! Archive keys follow the format `{year}/{month}/{day}/{identifier}`
//! (UTC calendar date of the record timestamp). The key is a pure
//! function of `(id, timestamp)`, so the read path can reconstruct it
//! even when the location index has no entry for the record.

use chrono::{DateTime, Datelike, TimeZone, Utc};

/// Derive the archive object key for a record.
///
/// Deterministic and collision-free: two records never share a key
/// because the identifier is unique, and the same record always maps
/// to the same key.
pub fn archive_key(id: &str, timestamp_ms: i64) -> String {
    let dt = Utc
        .timestamp_millis_opt(timestamp_ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    format!(
        "{:04}/{:02}/{:02}/{}",
        dt.year(),
        dt.month(),
        dt.day(),
        id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2023-11-14T22:13:20Z
    const TS: i64 = 1_700_000_000_000;

    #[test]
    fn test_key_format() {
        assert_eq!(archive_key("R1", TS), "2023/11/14/R1");
    }

    #[test]
    fn test_zero_padding() {
        // 2024-01-05T00:00:00Z
        let ts = 1_704_412_800_000;
        assert_eq!(archive_key("r", ts), "2024/01/05/r");
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(archive_key("abc", TS), archive_key("abc", TS));
    }

    #[test]
    fn test_distinct_ids_distinct_keys() {
        assert_ne!(archive_key("a", TS), archive_key("b", TS));
    }

    #[test]
    fn test_out_of_range_timestamp_falls_back_to_epoch() {
        assert_eq!(archive_key("x", i64::MAX), "1970/01/01/x");
    }
}
