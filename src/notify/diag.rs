use std::fmt::Write as _;

/// Compact error diagnostic for operator notifications: the root-cause
/// message plus whatever identifying fields the error chain yields. A
/// diagnostic with no identifying field besides the message is considered
/// noise and is suppressed by the reporter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub code: Option<String>,
    pub syscall: Option<String>,
    pub address: Option<String>,
    pub port: Option<u16>,
}

impl Diagnostic {
    pub fn from_error(err: &anyhow::Error) -> Self {
        let mut diag = Diagnostic {
            message: err.root_cause().to_string(),
            ..Default::default()
        };

        for cause in err.chain() {
            if let Some(req) = cause.downcast_ref::<reqwest::Error>() {
                if let Some(url) = req.url() {
                    if let Some(host) = url.host_str() {
                        diag.address.get_or_insert_with(|| host.to_string());
                    }
                    if let Some(port) = url.port_or_known_default() {
                        diag.port.get_or_insert(port);
                    }
                }
                if let Some(status) = req.status() {
                    diag.code.get_or_insert_with(|| status.as_u16().to_string());
                }
                if req.is_connect() {
                    diag.syscall.get_or_insert_with(|| "connect".to_string());
                }
            }
            if let Some(io) = cause.downcast_ref::<std::io::Error>() {
                if let Some(os) = io.raw_os_error() {
                    diag.code.get_or_insert_with(|| os.to_string());
                }
            }
        }

        diag
    }

    /// Whether anything beyond the free-text message identifies the failure.
    pub fn has_identity(&self) -> bool {
        self.code.is_some()
            || self.syscall.is_some()
            || self.address.is_some()
            || self.port.is_some()
    }

    /// De-duplication key: the underlying cause message, so the same failure
    /// reported through different wrappers still collapses.
    pub fn key(&self) -> &str {
        &self.message
    }

    pub fn render(&self) -> String {
        let mut out = format!("Error: {}", self.message);
        if let Some(code) = &self.code {
            let _ = write!(out, "\nCode: {code}");
        }
        if let Some(syscall) = &self.syscall {
            let _ = write!(out, "\nSyscall: {syscall}");
        }
        if let Some(address) = &self.address {
            let _ = write!(out, "\nAddress: {address}");
        }
        if let Some(port) = self.port {
            let _ = write!(out, "\nPort: {port}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_error_code_is_extracted_through_the_chain() {
        let io = std::io::Error::from_raw_os_error(111);
        let err = anyhow::Error::from(io).context("directory request failed");
        let diag = Diagnostic::from_error(&err);
        assert_eq!(diag.code.as_deref(), Some("111"));
        assert!(diag.has_identity());
        assert!(diag.message.contains("Connection refused") || !diag.message.is_empty());
    }

    #[test]
    fn bare_message_has_no_identity() {
        let err = anyhow::anyhow!("queue summary was empty");
        let diag = Diagnostic::from_error(&err);
        assert!(!diag.has_identity());
    }

    #[test]
    fn render_skips_absent_fields() {
        let diag = Diagnostic {
            message: "connect ECONNREFUSED".to_string(),
            code: Some("111".to_string()),
            syscall: Some("connect".to_string()),
            address: None,
            port: None,
        };
        let body = diag.render();
        assert_eq!(body, "Error: connect ECONNREFUSED\nCode: 111\nSyscall: connect");
    }

    #[test]
    fn key_is_the_root_cause_message() {
        let io = std::io::Error::from_raw_os_error(110);
        let root = io.to_string();
        let err = anyhow::Error::from(std::io::Error::from_raw_os_error(110))
            .context("outer context");
        let diag = Diagnostic::from_error(&err);
        assert_eq!(diag.key(), root);
    }
}
