mod file_entry;
mod session;

pub use self::file_entry::{FileEntry, NewFileEntry};
pub use self::session::{Session, SessionStatus};

pub(crate) use self::file_entry::FileEntryRow;
pub(crate) use self::session::SessionRow;
