use poem_openapi::Object;

/// Descriptor echoed to the client after a successful create or update.
///
/// `checksum` is the lowercase-hex MD5 of the original payload and
/// `content` its UTF-8 text.
#[derive(Debug, Clone, Object)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    pub checksum: String,
    pub content: String,
    pub content_type: String,
}

/// Outcome of a whole-store integrity scan.
///
/// Damaged stripes are purged during the scan, so `purged` counts files
/// that no longer exist once the report is returned.
#[derive(Debug)]
pub struct HealthReport {
    pub total_files: usize,
    pub intact: usize,
    pub purged: usize,
    pub files: Vec<(String, bool)>,
}
