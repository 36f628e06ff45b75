use crate::{
    directory::{AuthToken, DirectoryApi, DirectoryError},
    geo::GeoLookup,
    notify::Notify,
};

use super::Engine;

impl<D, G, N> Engine<D, G, N>
where
    D: DirectoryApi,
    G: GeoLookup,
    N: Notify,
{
    /// Full lockdown for Block and Critical: password reset, account lock,
    /// dated note, one composed notification. The three mutations are
    /// independent; an individual failure is reported and the remaining
    /// ones still run. An account that disappears mid-way ends the handler
    /// via `NotFound`.
    pub(super) async fn lock_and_annotate(
        &self,
        token: &AuthToken,
        address: &str,
        ip_label: String,
        count: u64,
    ) -> Result<(), DirectoryError> {
        let Some(id) = self.directory.resolve_account(token, address).await? else {
            tracing::info!(target: "engine", address, "account does not exist, nothing to do");
            return Ok(());
        };

        let password = match self.directory.set_password(token, &id).await {
            Ok(password) if password.is_empty() => None,
            Ok(password) => Some(password),
            Err(err) if err.is_not_found() => return Err(err),
            Err(err) => {
                self.report_sub_call(address, "reset the password", &err).await;
                None
            }
        };

        let lock_result = self.directory.lock_account(token, &id).await;
        let locked = self.settle(address, "lock the account", lock_result).await?;

        let note = self.dated_note();
        let note_result = self.directory.append_note(token, &id, &note).await;
        let noted = self
            .settle(address, "append the account note", note_result)
            .await?;

        let mut message =
            format!("*Address:* {address},\n*Count:* {count},\n*Source IP:* {ip_label}");
        if let Some(password) = &password {
            message.push_str(&format!(",\n*New password*: {password}"));
        }
        message.push_str(&format!(
            ",\n*Locked*: {},\n*Note*: {}",
            outcome(locked),
            outcome(noted)
        ));

        tracing::warn!(target: "engine", address, count, "account blocked");
        self.notifier.send(&message).await;
        Ok(())
    }

    pub(super) async fn change_password(
        &self,
        token: &AuthToken,
        address: &str,
        count: u64,
    ) -> Result<(), DirectoryError> {
        let Some(id) = self.directory.resolve_account(token, address).await? else {
            tracing::info!(target: "engine", address, "account does not exist, nothing to do");
            return Ok(());
        };

        let password = self.directory.set_password(token, &id).await?;
        if password.is_empty() {
            tracing::info!(
                target: "engine",
                address,
                "password unchanged, suppressing notification"
            );
            return Ok(());
        }

        tracing::warn!(target: "engine", address, count, "password reset");
        self.notifier
            .send(&format!(
                "*Address:* {address},\n*Count:* {count},\n*New password*: {password}"
            ))
            .await;
        Ok(())
    }

    /// Advisory only; the account is left untouched.
    pub(super) async fn internal_warn(&self, address: &str, count: u64) {
        tracing::warn!(
            target: "engine",
            address,
            count,
            "internal account over threshold"
        );
        self.notifier
            .send(&format!(
                "*Warning*: internal account `{address}` has already sent *{count}* emails.\nCheck whether this is spam or legitimate sending."
            ))
            .await;
    }

    /// Collapses one independent sub-call to its success flag, reporting
    /// failures without ending the handler. `NotFound` still propagates.
    async fn settle(
        &self,
        address: &str,
        what: &'static str,
        result: Result<bool, DirectoryError>,
    ) -> Result<bool, DirectoryError> {
        match result {
            Ok(acked) => Ok(acked),
            Err(err) if err.is_not_found() => Err(err),
            Err(err) => {
                self.report_sub_call(address, what, &err).await;
                Ok(false)
            }
        }
    }

    async fn report_sub_call(&self, address: &str, what: &str, err: &DirectoryError) {
        tracing::error!(target: "engine", address, error = %err, "failed to {what}");
        self.notifier
            .send(&format!("Failed to {what} for {address}: {err}"))
            .await;
    }
}

fn outcome(acked: bool) -> &'static str {
    if acked {
        "success"
    } else {
        "failed"
    }
}
