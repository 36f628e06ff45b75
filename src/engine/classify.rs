use crate::{
    config::RuleConfig,
    domain::{Action, SenderSignals},
};

/// The decision table. Evaluated top to bottom, first match wins; ordering
/// is load-bearing. The trailing InternalWarn arm is shadowed by the
/// broader ChangePassword arm above it and is kept in place deliberately
/// (see DESIGN.md) pending a decision on softer handling for internal
/// domestic senders.
pub fn classify(address: &str, signals: &SenderSignals, rules: &RuleConfig) -> Action {
    let native = address.contains(&rules.native_domain);
    let over_threshold = signals.count > rules.spam_threshold;

    if native && signals.ip.is_none() && over_threshold {
        return Action::Critical;
    }

    if native
        && signals.is_foreign
        && over_threshold
        && !signals.is_known_service
        && signals.is_ip_new
    {
        return Action::Block;
    }

    if over_threshold {
        return Action::ChangePassword;
    }

    if native && over_threshold {
        return Action::InternalWarn;
    }

    Action::None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> RuleConfig {
        RuleConfig {
            spam_threshold: 10,
            known_services: vec!["googlemail".to_string()],
            native_domain: "example.com".to_string(),
            ignored_addresses: vec![],
            ip_threshold: 1,
            home_country: "BR".to_string(),
        }
    }

    fn signals(count: u64, ip: Option<&str>) -> SenderSignals {
        SenderSignals {
            count,
            ip: ip.map(str::to_string),
            is_foreign: false,
            is_known_service: false,
            is_ip_new: false,
        }
    }

    #[test]
    fn below_threshold_is_always_none() {
        for address in ["user@example.com", "user@elsewhere.org"] {
            let mut s = signals(10, Some("203.0.113.7"));
            s.is_foreign = true;
            s.is_ip_new = true;
            assert_eq!(classify(address, &s, &rules()), Action::None);
        }
    }

    #[test]
    fn native_sender_without_ip_is_critical() {
        let s = signals(50, None);
        assert_eq!(classify("user@example.com", &s, &rules()), Action::Critical);
    }

    #[test]
    fn native_foreign_new_ip_is_blocked() {
        let mut s = signals(50, Some("203.0.113.7"));
        s.is_foreign = true;
        s.is_ip_new = true;
        assert_eq!(classify("user@example.com", &s, &rules()), Action::Block);
    }

    #[test]
    fn known_service_is_spared_the_block() {
        let mut s = signals(50, Some("203.0.113.7"));
        s.is_foreign = true;
        s.is_ip_new = true;
        s.is_known_service = true;
        assert_eq!(
            classify("user@example.com", &s, &rules()),
            Action::ChangePassword
        );
    }

    #[test]
    fn previously_seen_foreign_ip_downgrades_to_password_change() {
        let mut s = signals(50, Some("203.0.113.7"));
        s.is_foreign = true;
        assert_eq!(
            classify("user@example.com", &s, &rules()),
            Action::ChangePassword
        );
    }

    #[test]
    fn non_native_over_threshold_changes_password() {
        let s = signals(50, Some("203.0.113.7"));
        assert_eq!(
            classify("user@elsewhere.org", &s, &rules()),
            Action::ChangePassword
        );
    }

    #[test]
    fn internal_warn_arm_is_shadowed() {
        // every combination that could reach the InternalWarn arm is
        // swallowed by the ChangePassword arm first
        for ip in [None, Some("203.0.113.7")] {
            for is_foreign in [false, true] {
                for is_known_service in [false, true] {
                    for is_ip_new in [false, true] {
                        let s = SenderSignals {
                            count: 50,
                            ip: ip.map(str::to_string),
                            is_foreign,
                            is_known_service,
                            is_ip_new,
                        };
                        assert_ne!(
                            classify("user@example.com", &s, &rules()),
                            Action::InternalWarn
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn classification_is_idempotent() {
        let mut s = signals(50, Some("203.0.113.7"));
        s.is_foreign = true;
        s.is_ip_new = true;
        let first = classify("user@example.com", &s, &rules());
        let second = classify("user@example.com", &s, &rules());
        assert_eq!(first, second);
    }
}
