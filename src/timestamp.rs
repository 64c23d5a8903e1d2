//! Sortable text encoding of row timestamps.
//!
//! The `DateTime` column stores ticks (100ns units since 0001-01-01T00:00:00Z)
//! as a 19-digit zero-padded decimal string, so lexical order in SQLite is
//! chronological order.

use time::OffsetDateTime;

/// Ticks between 0001-01-01 and the Unix epoch.
const UNIX_EPOCH_TICKS: i128 = 621_355_968_000_000_000;
const NANOS_PER_TICK: i128 = 100;
const WIDTH: usize = 19;

/// Error converting between instants and stored ticks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimestampError {
    /// Instant is before year 1 and has no tick representation.
    #[error("instant {0} predates 0001-01-01")]
    BeforeEpoch(OffsetDateTime),
    /// Stored text is not a tick count.
    #[error("malformed stored timestamp {0:?}")]
    Malformed(String),
    /// Tick count does not map to a representable instant.
    #[error("stored timestamp {0} is out of range")]
    OutOfRange(i64),
}

/// Converts an instant to ticks.
pub fn to_ticks(at: OffsetDateTime) -> Result<i64, TimestampError> {
    let ticks = at.unix_timestamp_nanos().div_euclid(NANOS_PER_TICK) + UNIX_EPOCH_TICKS;
    if ticks < 0 {
        return Err(TimestampError::BeforeEpoch(at));
    }
    i64::try_from(ticks).map_err(|_| TimestampError::BeforeEpoch(at))
}

/// Converts ticks back to a UTC instant.
pub fn from_ticks(ticks: i64) -> Result<OffsetDateTime, TimestampError> {
    let nanos = (i128::from(ticks) - UNIX_EPOCH_TICKS) * NANOS_PER_TICK;
    OffsetDateTime::from_unix_timestamp_nanos(nanos).map_err(|_| TimestampError::OutOfRange(ticks))
}

/// Encodes an instant as the stored column text.
pub fn encode(at: OffsetDateTime) -> Result<String, TimestampError> {
    Ok(format!("{:0width$}", to_ticks(at)?, width = WIDTH))
}

/// Decodes the stored column text.
pub fn decode(text: &str) -> Result<OffsetDateTime, TimestampError> {
    let ticks = text
        .trim()
        .parse::<i64>()
        .map_err(|_| TimestampError::Malformed(text.to_string()))?;
    if ticks < 0 {
        return Err(TimestampError::OutOfRange(ticks));
    }
    from_ticks(ticks)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn unix_epoch_has_known_ticks() {
        assert_eq!(to_ticks(OffsetDateTime::UNIX_EPOCH).unwrap(), 621_355_968_000_000_000);
        assert_eq!(
            encode(OffsetDateTime::UNIX_EPOCH).unwrap(),
            "0621355968000000000"
        );
    }

    #[test]
    fn encoding_sorts_chronologically() {
        let instants = [
            datetime!(0001-01-01 00:00 UTC),
            datetime!(1601-06-30 12:00 UTC),
            datetime!(1969-12-31 23:59:59.9999999 UTC),
            datetime!(2024-02-29 08:15:30.123 UTC),
            datetime!(9999-12-31 23:59:59 UTC),
        ];
        let encoded: Vec<String> = instants.iter().map(|at| encode(*at).unwrap()).collect();
        assert!(encoded.iter().all(|text| text.len() == 19));
        assert!(encoded.windows(2).all(|pair| pair[0] < pair[1]));
        for (at, text) in instants.iter().zip(&encoded) {
            assert_eq!(decode(text).unwrap(), *at);
        }
    }

    #[test]
    fn sub_tick_precision_is_truncated() {
        let at = datetime!(2020-01-01 00:00:00.000000150 UTC);
        assert_eq!(decode(&encode(at).unwrap()).unwrap(), datetime!(2020-01-01 00:00:00.0000001 UTC));
    }

    #[test]
    fn offsets_normalize_to_utc() {
        let local = datetime!(2024-05-01 10:00 +02:00);
        assert_eq!(decode(&encode(local).unwrap()).unwrap(), datetime!(2024-05-01 08:00 UTC));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(decode("yesterday"), Err(TimestampError::Malformed(_))));
        assert!(matches!(decode("-5"), Err(TimestampError::OutOfRange(-5))));
    }
}
