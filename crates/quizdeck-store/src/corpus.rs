//! Corpus sources: a local JSON file or an HTTP endpoint.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use quizdeck_core::traits::CorpusSource;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Corpus read from a file on every fetch.
#[derive(Debug, Clone)]
pub struct FileCorpus {
    path: PathBuf,
    name: String,
}

impl FileCorpus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CorpusSource for FileCorpus {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<String> {
        tracing::debug!(path = %self.path.display(), "reading corpus file");
        tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read corpus file: {}", self.path.display()))
    }
}

/// Corpus downloaded from a URL on every fetch.
pub struct HttpCorpus {
    url: String,
    client: reqwest::Client,
}

impl HttpCorpus {
    pub fn new(url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

#[async_trait]
impl CorpusSource for HttpCorpus {
    fn name(&self) -> &str {
        &self.url
    }

    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("failed to download corpus from {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("corpus download from {} failed with HTTP {status}", self.url);
        }

        let body = response
            .text()
            .await
            .context("failed to read corpus response body")?;
        tracing::debug!(bytes = body.len(), "corpus downloaded");
        Ok(body)
    }
}

/// Pick a corpus source for a location: `http(s)://` URLs are downloaded,
/// anything else is a file path.
pub fn corpus_source(location: &str) -> Result<Arc<dyn CorpusSource>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Arc::new(HttpCorpus::new(location)?))
    } else {
        Ok(Arc::new(FileCorpus::new(location)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CORPUS: &str = r#"[{"id": "q1", "subject": "s", "stem": "?", "options": {"A": "x", "B": "y"}, "answer": "A"}]"#;

    #[tokio::test]
    async fn file_corpus_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("questions.json");
        std::fs::write(&file, CORPUS).unwrap();

        let source = FileCorpus::new(&file);
        assert_eq!(source.fetch().await.unwrap(), CORPUS);
        assert!(source.name().ends_with("questions.json"));
    }

    #[tokio::test]
    async fn file_corpus_missing_file() {
        let source = FileCorpus::new("/nonexistent/questions.json");
        let err = source.fetch().await.unwrap_err();
        assert!(err.to_string().contains("failed to read corpus file"));
    }

    #[tokio::test]
    async fn http_corpus_downloads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/questions.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CORPUS))
            .expect(1)
            .mount(&server)
            .await;

        let source = corpus_source(&format!("{}/questions.json", server.uri())).unwrap();
        assert_eq!(source.fetch().await.unwrap(), CORPUS);
    }

    #[tokio::test]
    async fn http_corpus_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = HttpCorpus::new(&format!("{}/missing.json", server.uri())).unwrap();
        let err = source.fetch().await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn location_picks_source_kind() {
        assert_eq!(corpus_source("data/questions.json").unwrap().name(), "data/questions.json");
        assert_eq!(
            corpus_source("https://example.com/q.json").unwrap().name(),
            "https://example.com/q.json"
        );
    }
}
