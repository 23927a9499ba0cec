use crate::model::error::store_errors::StoreError;

#[derive(Debug, PartialEq)]
pub enum TrackFolderError {
    /// the folder could not be listed from the filesystem; no rows were written
    SourceUnavailable,
    /// the database rejected the operation
    Store(StoreError),
}

impl From<StoreError> for TrackFolderError {
    fn from(value: StoreError) -> Self {
        TrackFolderError::Store(value)
    }
}
