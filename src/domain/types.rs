use serde::Deserialize;

/// Mutually exclusive outcome of classifying one sender in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    InternalWarn,
    ChangePassword,
    Block,
    Critical,
}

/// Per-sender signals derived from one snapshot plus the stored IP history.
/// Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderSignals {
    pub count: u64,
    pub ip: Option<String>,
    pub is_foreign: bool,
    pub is_known_service: bool,
    pub is_ip_new: bool,
}

/// Subset of the geolocation provider's response we care about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeoInfo {
    pub country: Option<String>,
    pub hostname: Option<String>,
}
