/// classifies a database failure after the retry loop has run its course
#[derive(Debug, PartialEq)]
pub enum StoreError {
    /// the database stayed write-locked through every retry attempt
    Busy,
    /// a uniqueness or foreign-key constraint rejected the statement; never retried
    Constraint,
    /// any other error with the database
    Db,
}
