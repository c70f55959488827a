//! Request-facing constants shared by handlers and route setup.

/// Multipart field carrying the uploaded media.
pub const UPLOAD_FIELD_NAME: &str = "file";

/// Slack on top of the upload cap for multipart boundaries and headers.
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Used when the client sends no usable file name.
pub const DEFAULT_FILE_NAME: &str = "upload";

pub const UPLOAD_SUCCESS_MESSAGE: &str = "File uploaded successfully";

pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");
