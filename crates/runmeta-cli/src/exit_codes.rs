//! Exit codes of the `runmeta` binary.

pub const SUCCESS: i32 = 0;
pub const COMMAND_FAILED: i32 = 1; // Tracked command returned non-zero, or nothing to show
pub const INTERNAL_ERROR: i32 = 2; // Config error or metadata could not be written
