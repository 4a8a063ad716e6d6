/// URL prefix (and conventional directory name) under which attachment files are referenced.
pub const FILES_FOLDER_NAME: &str = "files";

/// Longest extension, including the leading dot, kept when naming a stored file.
pub const MAX_EXTENSION_LEN: usize = 10;
