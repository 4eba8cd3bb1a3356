use std::path::PathBuf;

use tracing::info;

use crate::error::{EtlError, Result};

/// Anything that can hand back the page text for a run.
pub trait DocumentSource {
    fn describe(&self) -> String;
    fn fetch(&self) -> Result<String>;
}

pub struct HttpSource {
    url: String,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Self {
        HttpSource { url: url.into() }
    }
}

impl DocumentSource for HttpSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn fetch(&self) -> Result<String> {
        info!("Fetching page: {}", self.url);
        let fetch_err = |source| EtlError::Fetch {
            target: self.url.clone(),
            source,
        };
        let html = reqwest::blocking::get(&self.url)
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.text())
            .map_err(fetch_err)?;
        info!("Fetched {} bytes", html.len());
        Ok(html)
    }
}

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource { path: path.into() }
    }
}

impl DocumentSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> Result<String> {
        info!("Reading page: {}", self.path.display());
        std::fs::read_to_string(&self.path).map_err(|e| EtlError::io(self.describe(), e))
    }
}

/// URLs go over HTTP, anything else is read from disk.
pub fn source_for(target: &str) -> Box<dyn DocumentSource> {
    if target.starts_with("http://") || target.starts_with("https://") {
        Box::new(HttpSource::new(target))
    } else {
        Box::new(FileSource::new(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_source_by_scheme() {
        assert_eq!(
            source_for("https://example.com/page").describe(),
            "https://example.com/page"
        );
        assert_eq!(
            source_for("tests/fixtures/gdp.html").describe(),
            "tests/fixtures/gdp.html"
        );
    }

    #[test]
    fn file_source_reads_fixture() {
        let html = source_for("tests/fixtures/films.html").fetch().unwrap();
        assert!(html.contains("Spirited Away"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = FileSource::new("tests/fixtures/nope.html").fetch().unwrap_err();
        assert!(matches!(err, EtlError::Io { .. }));
    }
}
