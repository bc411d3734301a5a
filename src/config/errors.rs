//! Error code constants

/// Request policy error codes (0100-0199)
pub const ERR_EMPTY_COMMAND: &str = "E-OCC-0101";
pub const ERR_RELATIVE_CWD: &str = "E-OCC-0102";
pub const ERR_INVALID_PATH: &str = "E-OCC-0103";
pub const ERR_DUPLICATE_JOB: &str = "E-OCC-0104";
pub const ERR_NOT_OCC: &str = "E-OCC-0105";

/// Worker transport error codes (0200-0299)
pub const ERR_SANDBOX: &str = "E-OCC-0201";
pub const ERR_SPAWN: &str = "E-OCC-0202";
pub const ERR_NO_EXIT: &str = "E-OCC-0203";
pub const ERR_SNAPSHOT: &str = "E-OCC-0204";
pub const ERR_PROGRAM_NOT_FOUND: &str = "E-OCC-0205";
pub const ERR_DIGEST_MISMATCH: &str = "E-OCC-0206";

/// Format adapter error codes (0300-0399)
pub const ERR_XYZ_FORMAT: &str = "E-OCC-0301";
pub const ERR_CIF_FORMAT: &str = "E-OCC-0302";

/// Private filesystem error codes (0400-0499)
pub const ERR_VFS_NOT_FOUND: &str = "E-OCC-0401";
pub const ERR_VFS_NOT_DIR: &str = "E-OCC-0402";
pub const ERR_VFS_EXISTS: &str = "E-OCC-0403";
