pub mod backup;
pub mod persistence;

pub use backup::{BackupMetadata, BackupRecord};
pub use persistence::PersistenceLayer;
