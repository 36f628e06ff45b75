use std::collections::HashMap;

/// One sender's aggregate in a queue poll. Addresses are taken verbatim from
/// the queue; validity is checked during processing, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderVolume {
    pub address: String,
    pub count: u64,
}

/// The result of one deferred-queue poll: per-sender message totals in queue
/// order, and the most recently observed source IP per sender (one IP per
/// address per snapshot; when several queue items share a sender, the last
/// one wins).
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    pub sender_volumes: Vec<SenderVolume>,
    pub observed_ips: HashMap<String, String>,
}

impl QueueSnapshot {
    pub fn observed_ip(&self, address: &str) -> Option<&str> {
        self.observed_ips.get(address).map(String::as_str)
    }
}
