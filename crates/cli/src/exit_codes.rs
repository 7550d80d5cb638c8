//! CLI Exit Code Registry
//!
//! All exit codes of the `dal` binary live here. Scripts rely on them.
//!
//! | Range   | Domain     | Description                              |
//! |---------|------------|------------------------------------------|
//! | 0       | Universal  | Success                                  |
//! | 1       | Universal  | General error (unspecified)              |
//! | 2       | Universal  | CLI usage error (bad args, missing URL)  |
//! | 60-69   | dal        | DAL session and server errors            |

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, no base URL, no credentials.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// DAL (60-69)
// =============================================================================

/// The DAL answered with an `Error` record, or the exchange failed.
pub const EXIT_DAL_ERROR: u8 = 60;

/// Login was refused.
pub const EXIT_DAL_LOGIN: u8 = 61;

/// `switch/group/<id>` was refused.
pub const EXIT_DAL_SWITCH_GROUP: u8 = 62;
