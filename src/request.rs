use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, REFERER, USER_AGENT},
    Client,
};

use crate::{
    parse::{decode_page, ResultBatch},
    Config, FetchError, PageIndex, Result,
};

const REFERER_VALUE: &str = "https://www.oreilly.com/";
const USER_AGENT_VALUE: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0";

/// Fetches one page of records. Shared by every worker, so calls for distinct
/// pages must not interfere with each other.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, page: PageIndex) -> core::result::Result<ResultBatch, FetchError>;

    /// Where `page` comes from, for log lines.
    fn locate(&self, page: PageIndex) -> String {
        format!("page {page}")
    }
}

/// Fetches pages from the search API over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    // Client uses Arc so we can clone cheaply
    client: Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static(REFERER_VALUE));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        let client = Client::builder().default_headers(headers).build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.base_url(),
        }
    }

    pub fn page_url(&self, page: PageIndex) -> String {
        format!("{}&page={page}", self.base_url)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    /// Requests a page and decodes its `data.products`. Non-2xx responses are
    /// treated as failures without looking at the body.
    async fn fetch(&self, page: PageIndex) -> core::result::Result<ResultBatch, FetchError> {
        let res = self
            .client
            .get(self.page_url(page))
            .send()
            .await
            .map_err(|source| FetchError::Request { page, source })?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status { page, status });
        }

        let body = res
            .bytes()
            .await
            .map_err(|source| FetchError::Request { page, source })?;
        decode_page(page, &body)
    }

    fn locate(&self, page: PageIndex) -> String {
        self.page_url(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_url_appends_page_index() {
        let config = Config {
            endpoint: "http://127.0.0.1:3000/search".into(),
            page_size: 10,
            ..Config::default()
        };
        let fetcher = HttpFetcher::with_client(Client::new(), &config);
        assert_eq!(
            fetcher.page_url(4),
            "http://127.0.0.1:3000/search?q=*&type=book&order_by=published_at&rows=10&language=en&page=4"
        );
        assert_eq!(fetcher.locate(4), fetcher.page_url(4));
    }
}
