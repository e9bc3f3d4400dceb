//! Errors for ticket ingestion and the ticket service (C9, C11).

#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("ticket not found: {0}")]
    NotFound(String),

    #[error("a ticket with number {0} already exists")]
    DuplicateTicketNumber(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("customer could not be identified")]
    CustomerUnidentified,

    #[error("language model adapter failed: {0}")]
    UpstreamFailure(String),

    #[error("provider write-back failed: {0}")]
    WriteBackFailed(String),

    #[error(transparent)]
    Analytics(#[from] supportgate_core::error::AnalyticsError),
}
