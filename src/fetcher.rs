use tracing::{debug, warn};

use crate::api::{JobBoardApi, JobQuery};
use crate::error::Result;
use crate::models::{Job, Outcome, Page};

/// Hands out request generations. Only the most recently issued ticket may
/// apply its response; anything older has been superseded.
#[derive(Debug, Default)]
pub struct RequestGate {
    current: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

impl RequestGate {
    pub fn issue(&mut self) -> Ticket {
        self.current += 1;
        Ticket(self.current)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.current
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchParams {
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub category: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub reset: bool,
}

#[derive(Debug)]
pub struct FeedRequest {
    ticket: Ticket,
    query: JobQuery,
    replace: bool,
}

impl FeedRequest {
    pub fn query(&self) -> &JobQuery {
        &self.query
    }
}

/// Paginated view over the external job listing. Page 1 (or a reset)
/// replaces the held jobs; later pages append.
#[derive(Debug)]
pub struct JobFeed {
    items: Vec<Job>,
    total_count: u64,
    has_more: bool,
    query: JobQuery,
    error: Option<String>,
    gate: RequestGate,
}

impl JobFeed {
    pub fn new(page_size: u32) -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
            has_more: false,
            query: JobQuery::new(page_size),
            error: None,
            gate: RequestGate::default(),
        }
    }

    pub fn items(&self) -> &[Job] {
        &self.items
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn page(&self) -> u32 {
        self.query.page
    }

    pub fn begin(&mut self, params: FetchParams) -> FeedRequest {
        let page = if params.reset { 1 } else { params.page.unwrap_or(1).max(1) };
        let query = JobQuery {
            search: params.search.or_else(|| self.query.search.clone()),
            ordering: params.ordering.or_else(|| self.query.ordering.clone()),
            category: params.category.or_else(|| self.query.category.clone()),
            page,
            size: params.size.unwrap_or(self.query.size),
        };
        self.start(query, page == 1)
    }

    pub fn begin_search(&mut self, text: &str) -> FeedRequest {
        let search = Some(text.trim().to_string()).filter(|s| !s.is_empty());
        let query = JobQuery { search, page: 1, ..self.query.clone() };
        self.start(query, true)
    }

    /// Request for the page after the last one loaded, if there is one.
    pub fn begin_more(&mut self) -> Option<FeedRequest> {
        if !self.has_more {
            return None;
        }
        let query = JobQuery { page: self.query.page + 1, ..self.query.clone() };
        Some(self.start(query, false))
    }

    fn start(&mut self, query: JobQuery, replace: bool) -> FeedRequest {
        let ticket = self.gate.issue();
        debug!(?ticket, page = query.page, search = ?query.search, "job feed request");
        FeedRequest { ticket, query, replace }
    }

    pub fn complete(&mut self, request: FeedRequest, result: Result<Page<Job>>) -> Outcome {
        if !self.gate.is_current(request.ticket) {
            debug!(ticket = ?request.ticket, "discarding superseded job feed response");
            return Outcome::fail("Superseded by a newer request");
        }

        match result {
            Ok(page) => {
                self.has_more = page.has_next();
                if request.replace {
                    self.items = page.results;
                } else {
                    self.items.extend(page.results);
                }
                self.total_count = page.count;
                self.query = request.query;
                self.error = None;
                Outcome::ok(format!("Loaded {} of {} jobs", self.items.len(), self.total_count))
            }
            Err(err) => {
                let message = err.to_string();
                warn!(page = request.query.page, error = %message, "job feed request failed");
                self.error = Some(message.clone());
                Outcome::fail(message)
            }
        }
    }

    pub fn fetch(&mut self, api: &dyn JobBoardApi, params: FetchParams) -> Outcome {
        let request = self.begin(params);
        let result = api.list_jobs(request.query());
        self.complete(request, result)
    }

    pub fn search(&mut self, api: &dyn JobBoardApi, text: &str) -> Outcome {
        let request = self.begin_search(text);
        let result = api.list_jobs(request.query());
        self.complete(request, result)
    }

    pub fn load_more(&mut self, api: &dyn JobBoardApi) -> Outcome {
        match self.begin_more() {
            Some(request) => {
                let result = api.list_jobs(request.query());
                self.complete(request, result)
            }
            None => Outcome::fail("No more jobs to load"),
        }
    }

    pub fn reset(&mut self, api: &dyn JobBoardApi) -> Outcome {
        self.fetch(api, FetchParams { reset: true, ..Default::default() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeJobApi;

    #[test]
    fn test_load_more_until_last_page() {
        let api = FakeJobApi::with_jobs(50);
        let mut feed = JobFeed::new(10);

        let outcome = feed.fetch(&api, FetchParams::default());
        assert!(outcome.success);
        assert_eq!(feed.items().len(), 10);
        assert_eq!(feed.total_count(), 50);
        assert!(feed.has_more());

        assert!(feed.load_more(&api).success);
        assert_eq!(feed.items().len(), 20);
        assert_eq!(feed.page(), 2);
        assert!(feed.has_more());
        assert_eq!(api.requests.borrow()[1].page, 2);

        while feed.has_more() {
            assert!(feed.load_more(&api).success);
        }
        assert_eq!(feed.items().len(), 50);
        assert_eq!(feed.items()[49].id, "50");

        let outcome = feed.load_more(&api);
        assert!(!outcome.success);
        assert_eq!(feed.items().len(), 50);
    }

    #[test]
    fn test_page_one_replaces_and_later_pages_append() {
        let api = FakeJobApi::with_jobs(30);
        let mut feed = JobFeed::new(10);

        feed.fetch(&api, FetchParams { page: Some(2), ..Default::default() });
        assert_eq!(feed.items().len(), 10);
        feed.fetch(&api, FetchParams { page: Some(3), ..Default::default() });
        assert_eq!(feed.items().len(), 20);

        feed.fetch(&api, FetchParams { page: Some(1), ..Default::default() });
        assert_eq!(feed.items().len(), 10);
        assert_eq!(feed.items()[0].id, "1");
    }

    #[test]
    fn test_search_resets_to_first_page() {
        let api = FakeJobApi::with_jobs(25);
        let mut feed = JobFeed::new(10);
        feed.fetch(&api, FetchParams::default());
        feed.load_more(&api);
        assert_eq!(feed.page(), 2);

        let outcome = feed.search(&api, "Job 2");
        assert!(outcome.success);
        assert_eq!(feed.page(), 1);
        // "Job 2" and "Job 20".."Job 25"
        assert_eq!(feed.total_count(), 7);
        assert_eq!(feed.items().len(), 7);
        assert!(!feed.has_more());

        let last = api.requests.borrow().last().cloned().unwrap();
        assert_eq!(last.search.as_deref(), Some("Job 2"));
        assert_eq!(last.page, 1);
    }

    #[test]
    fn test_failure_keeps_prior_items() {
        let api = FakeJobApi::with_jobs(30);
        let mut feed = JobFeed::new(10);
        feed.fetch(&api, FetchParams::default());

        api.fail_with.set(Some(500));
        let outcome = feed.load_more(&api);
        assert!(!outcome.success);
        assert_eq!(outcome.message, "HTTP error! status: 500");
        assert_eq!(feed.error(), Some("HTTP error! status: 500"));
        assert_eq!(feed.items().len(), 10);
        assert_eq!(feed.page(), 1);

        api.fail_with.set(None);
        assert!(feed.load_more(&api).success);
        assert_eq!(feed.items().len(), 20);
        assert!(feed.error().is_none());
    }

    #[test]
    fn test_superseded_response_is_discarded() {
        let api = FakeJobApi::with_jobs(30);
        let mut feed = JobFeed::new(10);

        let slow = feed.begin_search("Job 1");
        let fast = feed.begin_search("Job 3");

        let fast_result = api.list_jobs(fast.query());
        assert!(feed.complete(fast, fast_result).success);
        let newest: Vec<String> = feed.items().iter().map(|j| j.id.clone()).collect();

        let slow_result = api.list_jobs(slow.query());
        let outcome = feed.complete(slow, slow_result);
        assert!(!outcome.success);
        let after: Vec<String> = feed.items().iter().map(|j| j.id.clone()).collect();
        assert_eq!(newest, after);
        assert_eq!(feed.items()[0].id, "3");
    }

    #[test]
    fn test_reset_keeps_query_and_reloads_first_page() {
        let api = FakeJobApi::with_jobs(40);
        let mut feed = JobFeed::new(10);
        feed.fetch(&api, FetchParams {
            ordering: Some("-created_at".to_string()),
            ..Default::default()
        });
        feed.load_more(&api);
        assert_eq!(feed.items().len(), 20);

        assert!(feed.reset(&api).success);
        assert_eq!(feed.items().len(), 10);
        let last = api.requests.borrow().last().cloned().unwrap();
        assert_eq!(last.ordering.as_deref(), Some("-created_at"));
        assert_eq!(last.page, 1);
    }
}
