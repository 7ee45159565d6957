//! Canonical schema constants for structured logging and events
//!
//! These constants ensure consistency across all logging and error reporting.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Entity identifiers
pub const FIELD_PROJECT_NAME: &str = "project_name";
pub const FIELD_SNAPSHOT_NAME: &str = "snapshot_name";
pub const FIELD_STORAGE_LOCATION: &str = "storage_location";
pub const FIELD_DATABASE: &str = "database";
pub const FIELD_WORKER_HANDLE: &str = "worker_handle";

// Collection sizes
pub const FIELD_DATABASE_COUNT: &str = "database_count";
pub const FIELD_DELETED_COUNT: &str = "deleted_count";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
