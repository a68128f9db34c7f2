//! Source catalog ingestion: download and CSV decoding.
//!
//! The generation engine only sees [`CatalogRow`]s. This crate turns either a
//! local file or Microsoft's published CSV URL into those rows, and fails the
//! whole load on any transport or format error so a half-read catalog is
//! never handed to the engine.

mod parser;

use std::path::{Path, PathBuf};

use licensegraph_shared::{CatalogRow, LicenseGraphError, Result};
use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

pub use parser::parse_catalog_csv;

/// Maximum number of redirects to follow when downloading the catalog.
const MAX_REDIRECTS: usize = 5;

/// Default timeout in seconds for the download.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Maximum response size we consider valid (64 MB).
const MAX_RESPONSE_SIZE: u64 = 64 * 1024 * 1024;

/// User-Agent string for download requests.
const USER_AGENT: &str = concat!("LicenseGraph/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Source & options
// ---------------------------------------------------------------------------

/// Where to read the catalog from.
#[derive(Debug, Clone)]
pub enum CatalogSource {
    /// A CSV file already on disk.
    Local(PathBuf),
    /// A CSV to download.
    Remote(Url),
}

impl CatalogSource {
    /// Human-readable origin, recorded in generation metadata.
    pub fn describe(&self) -> String {
        match self {
            Self::Local(path) => path.display().to_string(),
            Self::Remote(url) => url.to_string(),
        }
    }
}

/// Configuration for the download.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Timeout for HTTP requests in seconds.
    pub timeout_secs: u64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Main entry points
// ---------------------------------------------------------------------------

/// Load and parse catalog rows from `source`.
#[instrument(skip_all, fields(source = %source.describe()))]
pub async fn load_rows(source: &CatalogSource, opts: &FetchOptions) -> Result<Vec<CatalogRow>> {
    let rows = match source {
        CatalogSource::Local(path) => load_csv_file(path)?,
        CatalogSource::Remote(url) => {
            let body = fetch_catalog_csv(url, opts).await?;
            parse_catalog_csv(&body)?
        }
    };

    info!(rows = rows.len(), "catalog rows loaded");
    Ok(rows)
}

/// Read and parse a local catalog CSV.
pub fn load_csv_file(path: &Path) -> Result<Vec<CatalogRow>> {
    if !path.exists() {
        return Err(LicenseGraphError::validation(format!(
            "local CSV file not found at {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| LicenseGraphError::io(path, e))?;
    debug!(path = %path.display(), bytes = content.len(), "read local CSV");
    parse_catalog_csv(&content)
}

/// Download the catalog CSV body.
#[instrument(skip_all, fields(url = %url))]
pub async fn fetch_catalog_csv(url: &Url, opts: &FetchOptions) -> Result<String> {
    info!("downloading catalog CSV");

    let client = build_client(opts)?;
    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| LicenseGraphError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LicenseGraphError::Network(format!("{url}: HTTP {status}")));
    }

    // Check content-length if available
    if let Some(len) = response.content_length() {
        if len > MAX_RESPONSE_SIZE {
            return Err(LicenseGraphError::validation(format!(
                "{url}: response too large ({len} bytes, max {MAX_RESPONSE_SIZE})"
            )));
        }
    }

    let body = response
        .text()
        .await
        .map_err(|e| LicenseGraphError::Network(format!("{url}: failed to read body: {e}")))?;

    debug!(bytes = body.len(), "catalog CSV downloaded");
    Ok(body)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with appropriate settings.
fn build_client(opts: &FetchOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(std::time::Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| LicenseGraphError::Network(format!("failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "../../../fixtures/csv/licensing-sample.csv";

    #[test]
    fn test_load_local_file() {
        let rows = load_csv_file(Path::new(SAMPLE)).unwrap();
        assert_eq!(rows.len(), 25);
    }

    #[test]
    fn test_load_missing_local_file() {
        let err = load_csv_file(Path::new("../../../fixtures/csv/nope.csv")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_describe_source() {
        let url = Url::parse("https://example.com/catalog.csv").unwrap();
        assert_eq!(
            CatalogSource::Remote(url).describe(),
            "https://example.com/catalog.csv"
        );
    }

    #[tokio::test]
    async fn test_fetch_with_mock_server() {
        let server = wiremock::MockServer::start().await;
        let csv = std::fs::read_to_string(SAMPLE).expect("read csv fixture");

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/licensing.csv"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(&csv))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/licensing.csv", server.uri())).unwrap();
        let source = CatalogSource::Remote(url);
        let rows = load_rows(&source, &FetchOptions::default()).await.unwrap();

        assert_eq!(rows.len(), 25);
        assert_eq!(rows[0].string_id, "AAD_PREMIUM");
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/licensing.csv"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/licensing.csv", server.uri())).unwrap();
        let err = fetch_catalog_csv(&url, &FetchOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, LicenseGraphError::Network(_)));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_fetch_malformed_body_fails_load() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/licensing.csv"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_string("not,a,catalog\n1,2,3\n"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/licensing.csv", server.uri())).unwrap();
        let result = load_rows(&CatalogSource::Remote(url), &FetchOptions::default()).await;

        assert!(matches!(
            result,
            Err(LicenseGraphError::MalformedRow { row: 0, .. })
        ));
    }
}
