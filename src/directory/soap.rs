use std::collections::HashMap;

use roxmltree::{Document, Node};

use crate::{
    directory::error::DirectoryError,
    domain::{QueueSnapshot, SenderVolume},
};

pub const NO_SUCH_ACCOUNT: &str = "account.NO_SUCH_ACCOUNT";

const QUEUE_NAME: &str = "deferred";
const QUEUE_PAGE_LIMIT: u32 = 50;

/// A SOAP fault lifted out of a response body: the service error code from
/// the detail section plus the human-readable reason.
#[derive(Debug, Clone)]
pub struct Fault {
    pub code: String,
    pub reason: String,
}

impl From<Fault> for DirectoryError {
    fn from(fault: Fault) -> Self {
        DirectoryError::Fault {
            code: fault.code,
            reason: fault.reason,
        }
    }
}

pub fn auth_envelope(user: &str, password: &str) -> String {
    format!(
        r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope" xmlns="urn:zimbra">
<soap:Header/>
<soap:Body>
<AuthRequest xmlns="urn:zimbraAdmin">
<account by="name">{}</account>
<password>{}</password>
</AuthRequest>
</soap:Body>
</soap:Envelope>"#,
        escape(user),
        escape(password)
    )
}

pub fn mail_queue_envelope(token: &str, server: &str) -> String {
    format!(
        r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope" xmlns="urn:zimbraAdmin">
{}
<soap:Body>
<GetMailQueueRequest>
<server name="{}">
<queue name="{}" scan="1" wait="5">
<query offset="0" limit="{}">
</query>
</queue>
</server>
</GetMailQueueRequest>
</soap:Body>
</soap:Envelope>"#,
        header(token),
        escape(server),
        QUEUE_NAME,
        QUEUE_PAGE_LIMIT
    )
}

pub fn account_info_envelope(token: &str, address: &str) -> String {
    format!(
        r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope" xmlns="urn:zimbraAdmin">
{}
<soap:Body>
<GetAccountInfoRequest>
<account by="name">{}</account>
</GetAccountInfoRequest>
</soap:Body>
</soap:Envelope>"#,
        header(token),
        escape(address)
    )
}

pub fn set_password_envelope(token: &str, account_id: &str, password: &str) -> String {
    format!(
        r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope" xmlns="urn:zimbraAdmin">
{}
<soap:Body>
<SetPasswordRequest id="{}" newPassword="{}" />
</soap:Body>
</soap:Envelope>"#,
        header(token),
        escape(account_id),
        escape(password)
    )
}

pub fn lock_account_envelope(token: &str, account_id: &str) -> String {
    modify_attr_envelope(token, account_id, "zimbraAccountStatus", "locked")
}

pub fn get_account_envelope(token: &str, account_id: &str) -> String {
    format!(
        r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope" xmlns="urn:zimbraAdmin">
{}
<soap:Body>
<GetAccountRequest>
<account by="id">{}</account>
</GetAccountRequest>
</soap:Body>
</soap:Envelope>"#,
        header(token),
        escape(account_id)
    )
}

pub fn set_notes_envelope(token: &str, account_id: &str, notes: &str) -> String {
    modify_attr_envelope(token, account_id, "zimbraNotes", notes)
}

fn modify_attr_envelope(token: &str, account_id: &str, attr: &str, value: &str) -> String {
    format!(
        r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope" xmlns="urn:zimbraAdmin">
{}
<soap:Body>
<ModifyAccountRequest>
<id>{}</id>
<a n="{}">{}</a>
</ModifyAccountRequest>
</soap:Body>
</soap:Envelope>"#,
        header(token),
        escape(account_id),
        attr,
        escape(value)
    )
}

fn header(token: &str) -> String {
    format!(
        r#"<soap:Header>
<context xmlns="urn:zimbra">
<authToken>{}</authToken>
</context>
</soap:Header>"#,
        escape(token)
    )
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn parse_document(body: &str) -> Result<Document<'_>, DirectoryError> {
    Document::parse(body).map_err(|err| DirectoryError::Malformed {
        reason: err.to_string(),
    })
}

/// Looks for a SOAP fault in the parsed body. The service error code lives
/// in the detail `Error/Code` element; the envelope-level `Reason/Text`
/// carries the message.
pub fn extract_fault(doc: &Document<'_>) -> Option<Fault> {
    let fault = find_named(doc.root_element(), "Fault")?;
    let code = find_named(fault, "Error")
        .and_then(|error| find_named(error, "Code"))
        .and_then(|code| code.text())
        .unwrap_or("unknown")
        .trim()
        .to_string();
    let reason = find_named(fault, "Reason")
        .and_then(|reason| find_named(reason, "Text").or(Some(reason)))
        .and_then(|text| text.text())
        .unwrap_or("no reason given")
        .trim()
        .to_string();
    Some(Fault { code, reason })
}

fn checked(body: &str) -> Result<Document<'_>, DirectoryError> {
    let doc = parse_document(body)?;
    if let Some(fault) = extract_fault(&doc) {
        return Err(fault.into());
    }
    Ok(doc)
}

pub fn parse_auth(body: &str) -> Result<String, DirectoryError> {
    let doc = checked(body)?;
    let token = find_named(doc.root_element(), "authToken")
        .and_then(|node| node.text())
        .ok_or_else(|| DirectoryError::Malformed {
            reason: "auth response has no authToken".to_string(),
        })?;
    Ok(token.trim().to_string())
}

pub fn parse_queue(body: &str) -> Result<QueueSnapshot, DirectoryError> {
    let doc = checked(body)?;
    let queue = find_named(doc.root_element(), "queue").ok_or_else(no_queue_data)?;

    let summaries: Vec<Node<'_, '_>> = queue
        .children()
        .filter(|node| node.tag_name().name() == "qs")
        .collect();
    let items: Vec<Node<'_, '_>> = queue
        .children()
        .filter(|node| node.tag_name().name() == "qi")
        .collect();
    if summaries.is_empty() || items.is_empty() {
        return Err(no_queue_data());
    }

    let from_group = summaries
        .iter()
        .find(|qs| qs.attribute("type") == Some("from"));
    let received_group = summaries
        .iter()
        .find(|qs| qs.attribute("type") == Some("received"));
    let (Some(from_group), Some(_)) = (from_group, received_group) else {
        return Err(DirectoryError::QueueData {
            reason: "No \"from\" or \"received\" type entries found.".to_string(),
        });
    };

    let sender_volumes = from_group
        .children()
        .filter(|node| node.tag_name().name() == "qsi")
        .filter_map(|qsi| {
            let address = qsi.attribute("t")?;
            // Non-numeric counts collapse to 0 rather than killing the run.
            let count = qsi
                .attribute("n")
                .and_then(|n| n.trim().parse::<u64>().ok())
                .unwrap_or(0);
            Some(SenderVolume {
                address: address.to_string(),
                count,
            })
        })
        .collect();

    let mut observed_ips = HashMap::new();
    for qi in items {
        if let (Some(from), Some(received)) = (qi.attribute("from"), qi.attribute("received")) {
            observed_ips.insert(from.to_string(), received.to_string());
        }
    }

    Ok(QueueSnapshot {
        sender_volumes,
        observed_ips,
    })
}

fn no_queue_data() -> DirectoryError {
    DirectoryError::QueueData {
        reason: "No queue data found.".to_string(),
    }
}

pub fn parse_account_id(body: &str) -> Result<String, DirectoryError> {
    let doc = checked(body)?;
    attr_value(&doc, "zimbraId").ok_or_else(|| DirectoryError::Malformed {
        reason: "account info response has no zimbraId attribute".to_string(),
    })
}

/// The set-password acknowledgement may carry a `message` element when the
/// server adjusted or rejected the requested password; otherwise the caller
/// keeps the password it generated.
pub fn parse_set_password(body: &str, generated: String) -> Result<String, DirectoryError> {
    let doc = checked(body)?;
    Ok(find_named(doc.root_element(), "message")
        .and_then(|node| node.text())
        .map(|text| text.trim().to_string())
        .unwrap_or(generated))
}

pub fn parse_modify_ack(body: &str) -> Result<bool, DirectoryError> {
    let doc = checked(body)?;
    Ok(find_named(doc.root_element(), "ModifyAccountResponse").is_some())
}

pub fn parse_notes(body: &str) -> Result<String, DirectoryError> {
    let doc = checked(body)?;
    Ok(attr_value(&doc, "zimbraNotes").unwrap_or_default())
}

/// Account responses carry attributes as `<a n="name">value</a>` elements.
fn attr_value(doc: &Document<'_>, name: &str) -> Option<String> {
    doc.descendants()
        .filter(|node| node.tag_name().name() == "a")
        .find(|node| node.attribute("n") == Some(name))
        .and_then(|node| node.text())
        .map(|text| text.trim().to_string())
}

fn find_named<'a, 'input>(root: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    root.descendants()
        .find(|node| node.tag_name().name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUEUE_BODY: &str = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope">
<soap:Body><GetMailQueueResponse xmlns="urn:zimbraAdmin">
<server name="mail.example.com"><queue name="deferred" total="3" more="0">
<qs type="from">
<qsi n="50" t="alice@example.com"/>
<qsi n="2" t="bob@example.com"/>
<qsi n="bogus" t="carol@example.com"/>
</qs>
<qs type="received"><qsi n="50" t="10.0.0.9"/></qs>
<qi id="1" from="alice@example.com" received="203.0.113.7"/>
<qi id="2" from="alice@example.com" received="198.51.100.4"/>
<qi id="3" from="bob@example.com" received="10.0.0.9"/>
</queue></server>
</GetMailQueueResponse></soap:Body></soap:Envelope>"#;

    #[test]
    fn parses_auth_token() {
        let body = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope">
<soap:Body><AuthResponse xmlns="urn:zimbraAdmin"><authToken>0_abc123</authToken><lifetime>86400</lifetime></AuthResponse></soap:Body></soap:Envelope>"#;
        assert_eq!(parse_auth(body).unwrap(), "0_abc123");
    }

    #[test]
    fn queue_keeps_sender_order_and_last_ip_wins() {
        let snapshot = parse_queue(QUEUE_BODY).unwrap();
        let addresses: Vec<&str> = snapshot
            .sender_volumes
            .iter()
            .map(|s| s.address.as_str())
            .collect();
        assert_eq!(
            addresses,
            vec!["alice@example.com", "bob@example.com", "carol@example.com"]
        );
        assert_eq!(snapshot.sender_volumes[0].count, 50);
        // two queue items for alice: the later one wins
        assert_eq!(
            snapshot.observed_ip("alice@example.com"),
            Some("198.51.100.4")
        );
    }

    #[test]
    fn non_numeric_count_becomes_zero() {
        let snapshot = parse_queue(QUEUE_BODY).unwrap();
        assert_eq!(snapshot.sender_volumes[2].count, 0);
    }

    #[test]
    fn empty_queue_is_a_data_error() {
        let body = r#"<e><GetMailQueueResponse><server name="x"><queue name="deferred"/></server></GetMailQueueResponse></e>"#;
        let err = parse_queue(body).unwrap_err();
        assert!(matches!(err, DirectoryError::QueueData { .. }), "{err}");
    }

    #[test]
    fn missing_received_summary_is_a_data_error() {
        let body = r#"<e><queue name="deferred">
<qs type="from"><qsi n="5" t="a@b"/></qs>
<qi from="a@b" received="1.2.3.4"/>
</queue></e>"#;
        let err = parse_queue(body).unwrap_err();
        match err {
            DirectoryError::QueueData { reason } => {
                assert!(reason.contains("from"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn fault_maps_to_service_code() {
        let body = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope">
<soap:Body><soap:Fault>
<soap:Code><soap:Value>soap:Sender</soap:Value></soap:Code>
<soap:Reason><soap:Text>no such account: ghost@example.com</soap:Text></soap:Reason>
<soap:Detail><Error xmlns="urn:zimbra"><Code>account.NO_SUCH_ACCOUNT</Code></Error></soap:Detail>
</soap:Fault></soap:Body></soap:Envelope>"#;
        let err = parse_account_id(body).unwrap_err();
        match err {
            DirectoryError::Fault { code, reason } => {
                assert_eq!(code, NO_SUCH_ACCOUNT);
                assert!(reason.contains("ghost@example.com"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn account_id_is_read_from_attr_list() {
        let body = r#"<e><GetAccountInfoResponse>
<a n="zimbraMailHost">mail.example.com</a>
<a n="zimbraId">f1e2-d3c4</a>
</GetAccountInfoResponse></e>"#;
        assert_eq!(parse_account_id(body).unwrap(), "f1e2-d3c4");
    }

    #[test]
    fn set_password_prefers_server_message() {
        let generated = "s3cret!".to_string();
        let with_message = r#"<e><SetPasswordResponse><message>policy-rewritten</message></SetPasswordResponse></e>"#;
        assert_eq!(
            parse_set_password(with_message, generated.clone()).unwrap(),
            "policy-rewritten"
        );
        let plain = r#"<e><SetPasswordResponse/></e>"#;
        assert_eq!(parse_set_password(plain, generated).unwrap(), "s3cret!");
    }

    #[test]
    fn escapes_markup_in_interpolated_values() {
        let envelope = auth_envelope("admin@example.com", r#"p<&>"'w"#);
        assert!(envelope.contains("p&lt;&amp;&gt;&quot;&apos;w"));
        assert!(!envelope.contains(r#"p<&>"#));
    }
}
