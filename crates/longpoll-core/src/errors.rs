/// Errors surfaced by the poll and publish paths.
///
/// None of these are fatal. They map to 4xx/5xx responses at the HTTP edge
/// and are never retried by the hub itself.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("clientId is required")]
    MissingClientId,
    #[error("Client not found")]
    ClientNotFound,
    #[error("Client channel is full, skipping event.")]
    MailboxFull,
}

impl HubError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::MissingClientId => "missing_client_id",
            Self::ClientNotFound => "not_found",
            Self::MailboxFull => "mailbox_full",
        }
    }
}
