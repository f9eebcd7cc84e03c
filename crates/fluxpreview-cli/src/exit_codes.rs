//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - invalid declarations, filter config or settings
pub const CONFIG_ERROR: i32 = 2;

/// Template error - chart rendering failed
pub const TEMPLATE_ERROR: i32 = 3;

/// Repository error - index or chart could not be fetched or loaded
pub const REPOSITORY_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;
