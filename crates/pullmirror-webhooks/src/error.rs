//! Error types for webhook providers.

/// Errors from registering webhooks or parsing their payloads.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// A required client option is empty.
    #[error("{0} is necessary for registering webhooks")]
    MissingOption(&'static str),

    /// The request could not be sent or its response read.
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with an unexpected status.
    #[error("webhook registration failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// The hook payload is not what the provider sends.
    #[error("could not parse hook payload: {0}")]
    Payload(String),
}

impl WebhookError {
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => Self::Status { status, body },
            Err(e) => Self::Status {
                status,
                body: format!("failed to read body: {e}"),
            },
        }
    }
}
