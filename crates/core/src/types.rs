/// Identifier assigned by the remote annotation store (`annotation_id`).
pub type StoreId = String;

/// Identifier assigned by the PDF viewer (`annotation.id`), stable across sync.
pub type ViewerId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
