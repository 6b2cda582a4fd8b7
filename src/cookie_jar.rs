//! Session cookies that outlive the process
//!
//! Every CLI command is a new process, so the server-side session would be lost
//! with an in-memory jar. [`SessionCookies`] mirrors the cookies sent to the
//! backend into a file and restores them on start.

use crate::errors::StorageError;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

pub struct SessionCookies {
    jar: Arc<Jar>,
    /// URL whose cookies are saved; covers cookies scoped to the API prefix
    scope: Url,
    /// Restored cookies are scoped to the site root
    root: Url,
    file_path: Option<PathBuf>,
}

impl SessionCookies {
    pub fn in_memory(scope: Url) -> Self {
        let root = site_root(&scope);
        SessionCookies {
            jar: Arc::new(Jar::default()),
            scope,
            root,
            file_path: None,
        }
    }

    /// Jar backed by `file_path`, seeded from it when the file exists
    pub fn with_file(scope: Url, file_path: PathBuf) -> Result<Self, StorageError> {
        let mut cookies = Self::in_memory(scope);

        if let Some(parent) = file_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        if file_path.exists() {
            let contents = fs::read_to_string(&file_path)?;
            let restored = contents
                .split(';')
                .map(str::trim)
                .filter(|pair| pair.contains('='))
                .inspect(|pair| cookies.jar.add_cookie_str(pair, &cookies.root))
                .count();
            tracing::debug!("Restored {} session cookie(s) from {:?}", restored, file_path);
        }

        cookies.file_path = Some(file_path);
        Ok(cookies)
    }

    /// Shared jar for `ClientBuilder::cookie_provider`
    pub fn jar(&self) -> Arc<Jar> {
        Arc::clone(&self.jar)
    }

    /// `Cookie` header the backend would receive right now
    pub fn header(&self) -> Option<String> {
        self.jar
            .cookies(&self.scope)
            .and_then(|value: HeaderValue| value.to_str().ok().map(str::to_string))
    }

    /// Write the current cookies to the file, if there is one
    pub fn persist(&self) -> Result<(), StorageError> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };

        match self.header() {
            Some(header) => fs::write(path, header)?,
            None if path.exists() => fs::remove_file(path)?,
            None => {}
        }
        Ok(())
    }

    /// Forget the saved cookies. The in-process jar keeps its copy until the process ends.
    pub fn clear(&self) -> Result<(), StorageError> {
        if let Some(path) = &self.file_path
            && path.exists()
        {
            fs::remove_file(path)?;
            tracing::debug!("Cookie file deleted: {:?}", path);
        }
        Ok(())
    }
}

fn site_root(url: &Url) -> Url {
    let mut root = url.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Url {
        Url::parse("http://localhost:8080/api/auth/profile").unwrap()
    }

    #[test]
    fn test_cookies_survive_a_new_jar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb").join("csrf_token.cookies");

        let first = SessionCookies::with_file(scope(), path.clone()).unwrap();
        assert!(first.header().is_none());
        first
            .jar()
            .add_cookie_str("SESSION=abc; Path=/", &Url::parse("http://localhost:8080/").unwrap());
        first.persist().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "SESSION=abc");

        let second = SessionCookies::with_file(scope(), path.clone()).unwrap();
        assert_eq!(second.header().as_deref(), Some("SESSION=abc"));

        second.clear().unwrap();
        assert!(!path.exists());
        let third = SessionCookies::with_file(scope(), path).unwrap();
        assert!(third.header().is_none());
    }

    #[test]
    fn test_in_memory_jar_never_writes() {
        let cookies = SessionCookies::in_memory(scope());
        cookies
            .jar()
            .add_cookie_str("SESSION=abc", &Url::parse("http://localhost:8080/").unwrap());
        assert!(cookies.persist().is_ok());
        assert!(cookies.clear().is_ok());
        assert_eq!(cookies.header().as_deref(), Some("SESSION=abc"));
    }
}
