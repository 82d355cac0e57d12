//! Process exit codes, numbered after BSD sysexits.h

/// Bad arguments or a command that cannot run in the current state
pub const USAGE: i32 = 64;

/// Remote document could not be interpreted
pub const DATAERR: i32 = 65;

/// `show` found no stored row
pub const NOINPUT: i32 = 66;

/// Entity API unreachable or answering with an error status
pub const UNAVAILABLE: i32 = 69;

/// HTTP client could not be constructed
pub const SOFTWARE: i32 = 70;

/// Database or filesystem failure
pub const IOERR: i32 = 74;

/// Token endpoint rejected the client credentials
pub const NOPERM: i32 = 77;

/// Missing or invalid settings
pub const CONFIG: i32 = 78;
