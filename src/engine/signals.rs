use crate::{config::RuleConfig, domain::SenderSignals, history::IpHistory};

/// Derives the per-sender signal set from this snapshot's observation plus
/// the stored history. Pure; callers resolve geolocation beforehand.
pub fn derive_signals(
    address: &str,
    count: u64,
    ip: Option<String>,
    country: &str,
    hostname: &str,
    history: &IpHistory,
    rules: &RuleConfig,
) -> SenderSignals {
    let is_ip_new = ip
        .as_deref()
        .map_or(false, |ip| !history.contains(address, ip));
    SenderSignals {
        count,
        is_foreign: country != rules.home_country,
        is_known_service: rules
            .known_services
            .iter()
            .any(|service| hostname.contains(service.as_str())),
        is_ip_new,
        ip,
    }
}
