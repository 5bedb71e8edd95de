use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Category, Credentials, Job, Page, SavedJob};

/// Query for one page of the external job listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobQuery {
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub category: Option<String>,
    pub page: u32,
    pub size: u32,
}

impl JobQuery {
    pub fn new(size: u32) -> Self {
        Self { search: None, ordering: None, category: None, page: 1, size }
    }

    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("page_size", self.size.to_string()),
        ];
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            pairs.push(("search", search.trim().to_string()));
        }
        if let Some(ordering) = &self.ordering {
            pairs.push(("ordering", ordering.clone()));
        }
        if let Some(category) = &self.category {
            pairs.push(("category", category.clone()));
        }
        pairs
    }
}

/// The external job-board REST API.
pub trait JobBoardApi {
    fn list_jobs(&self, query: &JobQuery) -> Result<Page<Job>>;
    fn get_job(&self, id: &str) -> Result<Job>;
    fn list_categories(&self) -> Result<Page<Category>>;
    fn list_saved_jobs(&self) -> Result<Page<SavedJob>>;
    fn save_job(&self, job_id: &str) -> Result<SavedJob>;
    fn delete_saved_job(&self, saved_id: &str) -> Result<()>;
    fn is_authenticated(&self) -> bool;
}

#[derive(Serialize)]
struct SaveJobRequest<'a> {
    job: &'a str,
}

pub struct HttpJobApi {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl HttpJobApi {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: None,
        })
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Checks the credentials against `/users/login/` and keeps them for
    /// subsequent requests.
    pub fn login(&mut self, credentials: Credentials) -> Result<()> {
        if credentials.username.trim().is_empty() || credentials.password.is_empty() {
            return Err(Error::validation("username and password are required"));
        }
        debug!(username = %credentials.username, "logging in to job API");
        self.client
            .post(self.url("/users/login/"))
            .json(&credentials)
            .send()?
            .error_for_status()?;
        self.credentials = Some(credentials);
        Ok(())
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(c) => request.basic_auth(&c.username, Some(&c.password)),
            None => request,
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        debug!(path, ?query, "GET");
        let response = self
            .authorize(self.client.get(self.url(path)).query(query))
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }
}

impl JobBoardApi for HttpJobApi {
    fn list_jobs(&self, query: &JobQuery) -> Result<Page<Job>> {
        self.get_json("/jobs/", &query.to_pairs())
    }

    fn get_job(&self, id: &str) -> Result<Job> {
        self.get_json(&format!("/jobs/{}/", id), &[])
    }

    fn list_categories(&self) -> Result<Page<Category>> {
        self.get_json("/categories/", &[])
    }

    fn list_saved_jobs(&self) -> Result<Page<SavedJob>> {
        self.get_json("/saved-jobs/", &[])
    }

    fn save_job(&self, job_id: &str) -> Result<SavedJob> {
        debug!(job_id, "POST /saved-jobs/");
        let response = self
            .authorize(self.client.post(self.url("/saved-jobs/")))
            .json(&SaveJobRequest { job: job_id })
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }

    fn delete_saved_job(&self, saved_id: &str) -> Result<()> {
        debug!(saved_id, "DELETE /saved-jobs/");
        self.authorize(self.client.delete(self.url(&format!("/saved-jobs/{}/", saved_id))))
            .send()?
            .error_for_status()?;
        Ok(())
    }

    fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs() {
        let mut query = JobQuery::new(10);
        assert_eq!(
            query.to_pairs(),
            vec![("page", "1".to_string()), ("page_size", "10".to_string())]
        );

        query.search = Some("  rust  ".to_string());
        query.ordering = Some("-created_at".to_string());
        query.page = 3;
        let pairs = query.to_pairs();
        assert!(pairs.contains(&("page", "3".to_string())));
        assert!(pairs.contains(&("search", "rust".to_string())));
        assert!(pairs.contains(&("ordering", "-created_at".to_string())));
    }

    #[test]
    fn test_blank_search_is_dropped() {
        let mut query = JobQuery::new(5);
        query.search = Some("   ".to_string());
        assert!(query.to_pairs().iter().all(|(k, _)| *k != "search"));
    }

    #[test]
    fn test_authentication_follows_credentials() {
        let api = HttpJobApi::new("http://localhost:8000/api/", None).unwrap();
        assert!(!api.is_authenticated());
        assert_eq!(api.url("/jobs/"), "http://localhost:8000/api/jobs/");

        let api = api.with_credentials(Some(Credentials {
            username: "demo".to_string(),
            password: "secret".to_string(),
        }));
        assert!(api.is_authenticated());
    }

    #[test]
    fn test_login_validates_before_network() {
        let mut api = HttpJobApi::new("http://127.0.0.1:1", None).unwrap();
        let err = api
            .login(Credentials { username: " ".to_string(), password: "x".to_string() })
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!api.is_authenticated());
    }

    #[test]
    fn test_unreachable_host_is_transport_error() {
        let api = HttpJobApi::new("http://127.0.0.1:1", Some(Duration::from_secs(2))).unwrap();
        let err = api.list_jobs(&JobQuery::new(10)).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
