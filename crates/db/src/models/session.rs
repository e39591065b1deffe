use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use time::UtcDateTime;

/// Lifecycle state of a cache-access session.
///
/// Stored as a small integer rather than text for storage-format stability:
/// the wire values (`OPEN = 1`, `CLOSED = 2`) must never change, because the
/// database file may be shared with other writers of the same cache.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionStatus {
    Open,
    Closed,
}
impl SessionStatus {
    /// Stable integer encoding used in the `sessions.status` column.
    pub const fn as_wire(self) -> i64 {
        match self {
            Self::Open => 1,
            Self::Closed => 2,
        }
    }
}
impl TryFrom<i64> for SessionStatus {
    type Error = Error;
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Open),
            2 => Ok(Self::Closed),
            _ => exn::bail!(ErrorKind::InvalidData("session status")),
        }
    }
}

/// One process's claim on the cache during a bounded window of activity.
///
/// A writer inserts an [`SessionStatus::Open`] row before touching the blob
/// directory and flips it to [`SessionStatus::Closed`] when it finishes
/// cleanly. A crashed writer leaves the row OPEN until another process's
/// expiry logic reclaims it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    /// Assigned by the store on insert (monotonic, unique).
    pub id: i64,
    /// Subsystem that opened the session (e.g. `"cache_cleaner"`).
    pub source: String,
    /// Point in time the session was opened.
    pub timestamp: UtcDateTime,
    /// Opaque session metadata; most sessions have none.
    pub attributes: Option<String>,
    pub status: SessionStatus,
}

#[derive(sqlx::FromRow)]
pub(crate) struct SessionRow {
    pub(crate) id: i64,
    pub(crate) source: String,
    pub(crate) timestamp: i64,
    pub(crate) attributes: Option<String>,
    pub(crate) status: i64,
}
impl TryFrom<SessionRow> for Session {
    type Error = Error;
    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            source: row.source,
            timestamp: UtcDateTime::from_unix_timestamp(row.timestamp)
                .or_raise(|| ErrorKind::InvalidData("session timestamp"))?,
            attributes: row.attributes,
            status: SessionStatus::try_from(row.status)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, SessionStatus::Open)]
    #[case(2, SessionStatus::Closed)]
    fn test_status_wire_values(#[case] wire: i64, #[case] status: SessionStatus) {
        assert_eq!(status.as_wire(), wire);
        assert_eq!(SessionStatus::try_from(wire).unwrap(), status);
    }

    #[rstest]
    #[case(0)]
    #[case(3)]
    #[case(-1)]
    fn test_status_rejects_unknown_wire_values(#[case] wire: i64) {
        assert!(SessionStatus::try_from(wire).is_err());
    }

    #[test]
    fn test_row_to_model() {
        let opened = UtcDateTime::now();
        let row = SessionRow {
            id: 7,
            source: "streaming_agent".to_string(),
            timestamp: opened.unix_timestamp(),
            attributes: None,
            status: 1,
        };
        let session = Session::try_from(row).unwrap();
        assert_eq!(session.id, 7);
        assert_eq!(session.status, SessionStatus::Open);
        // Converting to a Unix timestamp (measured in seconds) inherently strips the nanoseconds component.
        assert_eq!(session.timestamp, opened.replace_nanosecond(0).unwrap());
    }

    #[test]
    fn test_row_with_garbage_status_fails() {
        let row = SessionRow {
            id: 1,
            source: "cache_cleaner".to_string(),
            timestamp: 0,
            attributes: None,
            status: 99,
        };
        assert!(Session::try_from(row).is_err());
    }
}
