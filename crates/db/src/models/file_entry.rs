use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use time::UtcDateTime;

/// Metadata for one cached blob on disk.
///
/// The blob itself lives in the `files/` directory, named by the 16-hex-digit
/// lowercase encoding of `id`. A given (package, version, type) combination
/// may have multiple entries, e.g. split APKs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileEntry {
    pub id: i64,
    pub package_name: String,
    pub version_code: i64,
    /// Content type (the `type` column; `type` is reserved in Rust).
    pub kind: String,
    pub attributes: Option<String>,
    /// Byte length of the on-disk blob.
    pub size: u64,
    /// Content hash, used for dedup/integrity checks by writers.
    pub hash: Option<String>,
    /// Last-used timestamp, consumed by the eviction policy.
    pub access_time: UtcDateTime,
    /// Retention bias, consumed by the eviction policy.
    pub priority: i32,
    /// Session that streamed this blob in; `ON DELETE CASCADE`.
    pub session_id: i64,
}

/// A [`FileEntry`] before insertion, i.e. without a store-assigned id.
#[derive(Clone, Debug)]
pub struct NewFileEntry {
    pub package_name: String,
    pub version_code: i64,
    pub kind: String,
    pub attributes: Option<String>,
    pub size: u64,
    pub hash: Option<String>,
    pub access_time: UtcDateTime,
    pub priority: i32,
    pub session_id: i64,
}

#[derive(sqlx::FromRow)]
pub(crate) struct FileEntryRow {
    pub(crate) id: i64,
    pub(crate) package_name: String,
    pub(crate) version_code: i64,
    #[sqlx(rename = "type")]
    pub(crate) kind: String,
    pub(crate) attributes: Option<String>,
    pub(crate) size: i64,
    pub(crate) hash: Option<String>,
    pub(crate) access_time: i64,
    pub(crate) priority: i64,
    pub(crate) session_id: i64,
}
impl TryFrom<FileEntryRow> for FileEntry {
    type Error = Error;
    fn try_from(row: FileEntryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            package_name: row.package_name,
            version_code: row.version_code,
            kind: row.kind,
            attributes: row.attributes,
            size: u64::try_from(row.size).or_raise(|| ErrorKind::InvalidData("entry size"))?,
            hash: row.hash,
            access_time: UtcDateTime::from_unix_timestamp(row.access_time)
                .or_raise(|| ErrorKind::InvalidData("access time"))?,
            priority: i32::try_from(row.priority).or_raise(|| ErrorKind::InvalidData("priority"))?,
            session_id: row.session_id,
        })
    }
}
