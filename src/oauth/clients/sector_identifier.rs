//! Retrieval of sector identifier documents (OpenID Connect Core 8.1).

use async_trait::async_trait;

use crate::errors::SectorIdentifierError;

/// Maximum accepted size of a sector identifier document.
pub const MAX_DOCUMENT_SIZE: usize = 5 * 1024 * 1024;

/// Fetches the list of redirect URIs published at a sector identifier URI.
#[async_trait]
pub trait SectorIdentifierFetcher: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<Vec<String>, SectorIdentifierError>;
}

/// Fetcher over HTTP.
///
/// Redirects are never followed, so the document always comes from the
/// validated URI; a 3xx answer is rejected like any other non-success status.
#[derive(Clone)]
pub struct HttpSectorIdentifierFetcher {
    http_client: reqwest::Client,
}

impl HttpSectorIdentifierFetcher {
    /// Build the fetcher from a client builder carrying the outbound settings
    /// (timeout, user agent, root certificates).
    pub fn new(builder: reqwest::ClientBuilder) -> Result<Self, SectorIdentifierError> {
        let http_client = builder
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| SectorIdentifierError::ClientBuildFailed(e.to_string()))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl SectorIdentifierFetcher for HttpSectorIdentifierFetcher {
    async fn fetch(&self, uri: &str) -> Result<Vec<String>, SectorIdentifierError> {
        let mut response = self
            .http_client
            .get(uri)
            .header(http::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SectorIdentifierError::FetchFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SectorIdentifierError::UnexpectedStatus(status.as_u16()));
        }

        if response
            .content_length()
            .is_some_and(|length| length as usize > MAX_DOCUMENT_SIZE)
        {
            return Err(SectorIdentifierError::TooLarge(MAX_DOCUMENT_SIZE));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SectorIdentifierError::FetchFailed(e.to_string()))?
        {
            if body.len() + chunk.len() > MAX_DOCUMENT_SIZE {
                return Err(SectorIdentifierError::TooLarge(MAX_DOCUMENT_SIZE));
            }
            body.extend_from_slice(&chunk);
        }

        let uris: Vec<String> = serde_json::from_slice(&body)
            .map_err(|e| SectorIdentifierError::Malformed(e.to_string()))?;
        if uris.is_empty() {
            return Err(SectorIdentifierError::Malformed(
                "document lists no redirect URIs".to_string(),
            ));
        }
        Ok(uris)
    }
}
