//! Domain models and their database row counterparts.

mod file;
mod lang;
mod link;
mod release;

pub use self::file::ReleaseFile;
pub use self::lang::Language;
pub use self::link::ReleaseLink;
pub use self::release::Release;

pub(crate) use self::file::ReleaseFileRow;
pub(crate) use self::link::ReleaseLinkRow;
pub(crate) use self::release::ReleaseRow;
