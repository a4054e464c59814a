use chrono::Utc;
use reqwest::{
    Client as ReqwestClient, Method,
    header::{HeaderMap, HeaderValue},
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::types::request::ChangesRequest;
use super::types::response::ApiResponse;
use crate::types::{ChangesSummary, Member, MemberChange, Stats};
use crate::{Result, ToQueryParams as _};

/// Base URL of the leaderboard data API.
pub const DEFAULT_HOST: &str = "http://rpc.servox.store/loud/api";

/// HTTP client for the leaderboard data API.
///
/// Every GET carries a `_t=<unix millis>` parameter so proxies never answer from cache.
///
/// # Example
///
/// ```no_run
/// use leaderboard_live::api::Client;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::default();
///
/// for member in client.members().await? {
///     println!("#{} {}", member.rank, member.name);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    host: Url,
    client: ReqwestClient,
}

impl Default for Client {
    fn default() -> Self {
        Client::new(DEFAULT_HOST).expect("Client with default endpoint should succeed")
    }
}

impl Client {
    /// Creates a new API client with a custom host URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be created.
    pub fn new(host: &str) -> Result<Client> {
        let mut headers = HeaderMap::new();

        headers.insert("User-Agent", HeaderValue::from_static("leaderboard_live"));
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = ReqwestClient::builder().default_headers(headers).build()?;

        let mut host = Url::parse(host)?;
        // Relative paths are appended, so the base must end in a slash
        if !host.path().ends_with('/') {
            let path = format!("{}/", host.path());
            host.set_path(&path);
        }

        Ok(Self { host, client })
    }

    /// Returns the base URL of the API.
    #[must_use]
    pub fn host(&self) -> &Url {
        &self.host
    }

    async fn get<Req: Serialize, Res: DeserializeOwned>(
        &self,
        path: &str,
        req: &Req,
    ) -> Result<Res> {
        let query = req.query_params(Some(Utc::now().timestamp_millis()));
        let request = self
            .client
            .request(Method::GET, format!("{}{path}{query}", self.host))
            .build()?;
        let response: ApiResponse<Res> = crate::request(&self.client, request).await?;
        response.into_data(&Method::GET, path)
    }

    /// Fetches the current leaderboard.
    pub async fn members(&self) -> Result<Vec<Member>> {
        self.get("members", &()).await
    }

    /// Fetches the latest joins, removals and rank movements.
    pub async fn changes(&self, request: &ChangesRequest) -> Result<ChangesSummary> {
        self.get("changes", request).await
    }

    /// Fetches the full change history.
    pub async fn all_changes(&self) -> Result<Vec<MemberChange>> {
        self.get("changes/all", &()).await
    }

    /// Fetches backend statistics.
    pub async fn stats(&self) -> Result<Stats> {
        self.get("stats", &()).await
    }

    /// Asks the backend to scrape the leaderboard now.
    ///
    /// Connected live-update clients are notified through `member_changes` and
    /// `stats_update` once the scrape finishes.
    pub async fn trigger_scrape(&self) -> Result<()> {
        let path = "scrape";
        let request = self
            .client
            .request(Method::POST, format!("{}{path}", self.host))
            .build()?;
        let response: ApiResponse<Value> = crate::request(&self.client, request).await?;
        response.ensure_success(&Method::POST, path)
    }
}
