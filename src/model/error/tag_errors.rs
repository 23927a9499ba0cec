use crate::model::error::store_errors::StoreError;

#[derive(Debug, PartialEq)]
pub enum AddTagError {
    /// tag names can never be empty or whitespace
    BlankName,
    /// the database rejected the operation
    Store(StoreError),
}

impl From<StoreError> for AddTagError {
    fn from(value: StoreError) -> Self {
        AddTagError::Store(value)
    }
}

#[derive(Debug, PartialEq)]
pub enum UpdateTagGroupError {
    /// the reserved default group can never be renamed to or from
    ReservedGroup,
    /// no group with the original name exists
    GroupNotFound,
    /// the database rejected the operation
    Store(StoreError),
}

impl From<StoreError> for UpdateTagGroupError {
    fn from(value: StoreError) -> Self {
        UpdateTagGroupError::Store(value)
    }
}
