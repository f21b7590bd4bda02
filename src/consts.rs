/// well known id of the namespace root directory. per tenant, not
/// deletable
pub const ROOT_DIR_ID: &str = "io.nimbus.files.root-dir";

/// well known id of the trash root directory. per tenant, not
/// deletable
pub const TRASH_DIR_ID: &str = "io.nimbus.files.trash-dir";

pub const TRASH_DIR_NAME: &str = ".trash";

pub const ROOT_DIR_PATH: &str = "/";
pub const TRASH_DIR_PATH: &str = "/.trash";

/// declared content length meaning "unknown, discover from the
/// stream"
pub const SIZE_UNKNOWN: i64 = -1;
