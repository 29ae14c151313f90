use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::document::Document;
use crate::error::{IndexError, Result};
use crate::html::html_to_markdown;

const PAGE_SIZE: usize = 25;

/// Create the shared HTTP client used for wiki requests.
///
/// Config: 30s connect timeout, 60s request timeout, rustls TLS,
/// `confab/{version}` user-agent.
///
/// # Panics
///
/// Panics if the TLS backend cannot be initialized (should never happen with rustls).
#[must_use]
pub fn default_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(Duration::from_secs(60))
        .user_agent(concat!("confab/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("default HTTP client construction must not fail")
}

/// Atlassian API credentials, sourced from the environment only.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("api_key", &"***")
            .finish()
    }
}

impl Credentials {
    /// Read `ATLASSIAN_USERNAME` and `ATLASSIAN_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns an error if either variable is missing; there is no
    /// anonymous fallback.
    pub fn from_env() -> Result<Self> {
        let username = std::env::var("ATLASSIAN_USERNAME")
            .map_err(|_| IndexError::Credentials("ATLASSIAN_USERNAME is not set".into()))?;
        let api_key = std::env::var("ATLASSIAN_API_KEY")
            .map_err(|_| IndexError::Credentials("ATLASSIAN_API_KEY is not set".into()))?;
        Ok(Self { username, api_key })
    }
}

#[derive(Debug, Deserialize)]
struct PageList {
    results: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    id: String,
    title: String,
    #[serde(default)]
    body: Option<PageBody>,
    #[serde(rename = "_links", default)]
    links: Option<PageLinks>,
}

#[derive(Debug, Deserialize)]
struct PageBody {
    storage: StorageBody,
}

#[derive(Debug, Deserialize)]
struct StorageBody {
    value: String,
}

#[derive(Debug, Deserialize)]
struct PageLinks {
    #[serde(default)]
    webui: Option<String>,
}

/// Confluence REST client over the `content` API.
#[derive(Debug, Clone)]
pub struct ConfluenceClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl ConfluenceClient {
    #[must_use]
    pub fn new(http: &reqwest::Client, base_url: &str, credentials: Credentials) -> Self {
        Self {
            http: http.clone(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            credentials,
        }
    }

    /// Fetch every page of a space, paging through the content listing.
    ///
    /// # Errors
    ///
    /// Returns an error on any failed request; partial results are not
    /// returned.
    pub async fn fetch_space(&self, space_key: &str) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        let mut start = 0usize;
        loop {
            let url = format!("{}/rest/api/content", self.base_url);
            let start_param = start.to_string();
            let limit_param = PAGE_SIZE.to_string();
            let list: PageList = self
                .http
                .get(&url)
                .basic_auth(&self.credentials.username, Some(&self.credentials.api_key))
                .query(&[
                    ("spaceKey", space_key),
                    ("expand", "body.storage"),
                    ("start", start_param.as_str()),
                    ("limit", limit_param.as_str()),
                ])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let count = list.results.len();
            debug!(space_key, start, count, "fetched content listing");
            documents.extend(list.results.into_iter().map(|p| self.to_document(p)));
            if count < PAGE_SIZE {
                break;
            }
            start += PAGE_SIZE;
        }
        Ok(documents)
    }

    /// Fetch specific pages by id.
    ///
    /// # Errors
    ///
    /// Returns an error on any failed request.
    pub async fn fetch_pages(&self, page_ids: &[String]) -> Result<Vec<Document>> {
        let mut documents = Vec::with_capacity(page_ids.len());
        for id in page_ids {
            let url = format!("{}/rest/api/content/{id}", self.base_url);
            let page: Page = self
                .http
                .get(&url)
                .basic_auth(&self.credentials.username, Some(&self.credentials.api_key))
                .query(&[("expand", "body.storage")])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            debug!(page_id = %id, title = %page.title, "fetched page");
            documents.push(self.to_document(page));
        }
        Ok(documents)
    }

    fn to_document(&self, page: Page) -> Document {
        let source = match page.links.and_then(|l| l.webui) {
            Some(webui) => format!("{}{webui}", self.base_url),
            None => format!("{}/pages/{}", self.base_url, page.id),
        };
        let html = page.body.map(|b| b.storage.value).unwrap_or_default();
        Document::new(html_to_markdown(&html))
            .with_metadata("source", source)
            .with_metadata("title", page.title)
            .with_metadata("id", page.id)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use serial_test::serial;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn creds() -> Credentials {
        Credentials {
            username: "user".into(),
            api_key: "secret".into(),
        }
    }

    fn page_json(id: usize, title: &str, html: &str) -> serde_json::Value {
        json!({
            "id": id.to_string(),
            "title": title,
            "body": {"storage": {"value": html}},
            "_links": {"webui": format!("/spaces/DOC/pages/{id}")}
        })
    }

    #[test]
    #[serial]
    fn credentials_from_env() {
        unsafe { std::env::set_var("ATLASSIAN_USERNAME", "alice") };
        unsafe { std::env::set_var("ATLASSIAN_API_KEY", "token") };
        let creds = Credentials::from_env().unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.api_key, "token");
        unsafe { std::env::remove_var("ATLASSIAN_USERNAME") };
        unsafe { std::env::remove_var("ATLASSIAN_API_KEY") };
    }

    #[test]
    #[serial]
    fn missing_credentials_are_fatal() {
        unsafe { std::env::remove_var("ATLASSIAN_USERNAME") };
        unsafe { std::env::remove_var("ATLASSIAN_API_KEY") };
        let err = Credentials::from_env().unwrap_err();
        assert!(matches!(err, IndexError::Credentials(_)));
    }

    #[test]
    fn credentials_debug_hides_api_key() {
        let rendered = format!("{:?}", creds());
        assert!(!rendered.contains("secret"));
    }

    #[tokio::test]
    async fn fetch_pages_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/content/42"))
            .and(query_param("expand", "body.storage"))
            .and(header("authorization", "Basic dXNlcjpzZWNyZXQ="))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(page_json(42, "Runbook", "<h1>Ops</h1><p>Restart it.</p>")),
            )
            .mount(&server)
            .await;

        let client = ConfluenceClient::new(&default_http_client(), &server.uri(), creds());
        let docs = client.fetch_pages(&["42".to_owned()]).await.unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "# Ops\n\nRestart it.");
        assert_eq!(docs[0].metadata["title"], "Runbook");
        assert_eq!(docs[0].metadata["id"], "42");
        assert_eq!(
            docs[0].metadata["source"],
            format!("{}/spaces/DOC/pages/42", server.uri())
        );
    }

    #[tokio::test]
    async fn fetch_space_pages_through_listing() {
        let server = MockServer::start().await;
        let first: Vec<_> = (0..PAGE_SIZE)
            .map(|i| page_json(i, &format!("Page {i}"), "<p>body</p>"))
            .collect();
        Mock::given(method("GET"))
            .and(path("/rest/api/content"))
            .and(query_param("spaceKey", "DOC"))
            .and(query_param("start", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": first})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/api/content"))
            .and(query_param("start", PAGE_SIZE.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"results": [page_json(99, "Last", "<p>tail</p>")]}),
            ))
            .mount(&server)
            .await;

        let client = ConfluenceClient::new(&default_http_client(), &server.uri(), creds());
        let docs = client.fetch_space("DOC").await.unwrap();

        assert_eq!(docs.len(), PAGE_SIZE + 1);
        assert_eq!(docs.last().unwrap().metadata["title"], "Last");
    }

    #[tokio::test]
    async fn server_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/content/7"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ConfluenceClient::new(&default_http_client(), &server.uri(), creds());
        let result = client.fetch_pages(&["7".to_owned()]).await;
        assert!(matches!(result, Err(IndexError::Http(_))));
    }

    #[tokio::test]
    async fn page_without_body_becomes_empty_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/content/8"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "8",
                "title": "Stub",
            })))
            .mount(&server)
            .await;

        let client = ConfluenceClient::new(&default_http_client(), &server.uri(), creds());
        let docs = client.fetch_pages(&["8".to_owned()]).await.unwrap();
        assert_eq!(docs[0].content, "");
        assert_eq!(docs[0].metadata["source"], format!("{}/pages/8", server.uri()));
    }
}
