use tracing::{debug, info, warn};

use crate::api::JobBoardApi;
use crate::error::Result;
use crate::fetcher::{RequestGate, Ticket};
use crate::models::{Outcome, Page, SavedJob};

/// Bookmarks held by the external job API. Every mutation is followed by a
/// full re-fetch of the saved list instead of a local patch.
#[derive(Debug, Default)]
pub struct SavedJobTracker {
    saved: Vec<SavedJob>,
    gate: RequestGate,
}

impl SavedJobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> &[SavedJob] {
        &self.saved
    }

    pub fn is_saved(&self, job_id: &str) -> bool {
        self.saved.iter().any(|s| s.job_id == job_id)
    }

    pub fn saved_id_for(&self, job_id: &str) -> Option<&str> {
        self.saved
            .iter()
            .find(|s| s.job_id == job_id)
            .map(|s| s.id.as_str())
    }

    pub fn refresh(&mut self, api: &dyn JobBoardApi) -> Outcome {
        if !api.is_authenticated() {
            self.saved.clear();
            return Outcome::fail("Please log in to view saved jobs");
        }
        let ticket = self.begin_refresh();
        let result = api.list_saved_jobs();
        self.complete_refresh(ticket, result)
    }

    /// Starts a saved-list fetch. Any fetch begun earlier is superseded.
    pub fn begin_refresh(&mut self) -> Ticket {
        let ticket = self.gate.issue();
        debug!(?ticket, "saved jobs request");
        ticket
    }

    pub fn complete_refresh(&mut self, ticket: Ticket, result: Result<Page<SavedJob>>) -> Outcome {
        if !self.gate.is_current(ticket) {
            debug!(?ticket, "discarding superseded saved jobs response");
            return Outcome::fail("Superseded by a newer request");
        }
        match result {
            Ok(page) => {
                self.saved = page.results;
                Outcome::ok(format!("{} saved job(s)", self.saved.len()))
            }
            Err(err) => {
                warn!(error = %err, "failed to fetch saved jobs");
                Outcome::fail(err.to_string())
            }
        }
    }

    pub fn save(&mut self, api: &dyn JobBoardApi, job_id: &str) -> Outcome {
        if !api.is_authenticated() {
            return Outcome::fail("Please log in to save jobs");
        }
        if let Err(err) = api.save_job(job_id) {
            warn!(job_id, error = %err, "failed to save job");
            return Outcome::fail(err.to_string());
        }
        info!(job_id, "job saved");
        self.after_mutation(api, "Job saved successfully")
    }

    pub fn remove(&mut self, api: &dyn JobBoardApi, saved_id: &str) -> Outcome {
        if let Err(err) = api.delete_saved_job(saved_id) {
            warn!(saved_id, error = %err, "failed to remove saved job");
            return Outcome::fail(err.to_string());
        }
        info!(saved_id, "saved job removed");
        self.after_mutation(api, "Job removed from saved list")
    }

    /// The mutation already happened remotely, so a failed re-fetch keeps the
    /// outcome successful but says the local list is stale.
    fn after_mutation(&mut self, api: &dyn JobBoardApi, done: &str) -> Outcome {
        let refreshed = self.refresh(api);
        if refreshed.success {
            Outcome::ok(done)
        } else {
            Outcome::ok(format!("{} (saved list not refreshed: {})", done, refreshed.message))
        }
    }

    /// Removes the bookmark for `job_id` when present, saves it otherwise.
    pub fn toggle(&mut self, api: &dyn JobBoardApi, job_id: &str) -> Outcome {
        match self.saved_id_for(job_id).map(str::to_string) {
            Some(saved_id) => self.remove(api, &saved_id),
            None => self.save(api, job_id),
        }
    }
}
