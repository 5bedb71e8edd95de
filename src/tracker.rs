use chrono::Utc;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{AppliedJob, ApplicationStatus, Job};
use crate::store::ApplicationStore;

/// Applications recorded locally for the signed-in user. The list is
/// reloaded whenever the user changes and every mutation is written through
/// to the store before returning.
pub struct ApplicationTracker<S: ApplicationStore> {
    store: S,
    user_id: Option<String>,
    applications: Vec<AppliedJob>,
}

impl<S: ApplicationStore> ApplicationTracker<S> {
    pub fn new(store: S) -> Self {
        Self { store, user_id: None, applications: Vec::new() }
    }

    pub fn for_user(store: S, user_id: Option<&str>) -> Result<Self> {
        let mut tracker = Self::new(store);
        tracker.set_user(user_id)?;
        Ok(tracker)
    }

    /// Switches the owner of the visible list. `None` (signed out) clears it.
    pub fn set_user(&mut self, user_id: Option<&str>) -> Result<()> {
        match user_id {
            Some(id) => {
                self.applications = self.store.get(id)?;
                debug!(user_id = id, count = self.applications.len(), "loaded applications");
                self.user_id = Some(id.to_string());
            }
            None => {
                self.applications.clear();
                self.user_id = None;
            }
        }
        Ok(())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn applications(&self) -> &[AppliedJob] {
        &self.applications
    }

    pub fn is_applied(&self, job_id: &str) -> bool {
        self.applications.iter().any(|a| a.job_id == job_id)
    }

    pub fn find_by_job(&self, job_id: &str) -> Option<&AppliedJob> {
        self.applications.iter().find(|a| a.job_id == job_id)
    }

    pub fn stats(&self) -> BTreeMap<&'static str, usize> {
        let mut counts: BTreeMap<&'static str, usize> =
            ApplicationStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
        for app in &self.applications {
            *counts.entry(app.application_status.as_str()).or_default() += 1;
        }
        counts
    }

    pub fn apply_to_job(
        &mut self,
        job: &Job,
        external_url: Option<&str>,
        notes: Option<&str>,
    ) -> Result<AppliedJob> {
        let user_id = self.require_user("apply")?;
        if self.is_applied(&job.id) {
            return Err(Error::Duplicate("You have already applied to this job".to_string()));
        }
        self.record(user_id, job, external_url, notes)
    }

    /// Records an application made outside the platform. Unlike
    /// `apply_to_job` this does not reject a second entry for the same job.
    pub fn add_external_application(
        &mut self,
        job: &Job,
        external_url: &str,
        notes: Option<&str>,
    ) -> Result<AppliedJob> {
        let user_id = self.require_user("track applications")?;
        self.record(user_id, job, Some(external_url), notes)
    }

    /// Returns false when no application has the given id.
    pub fn update_application_status(&mut self, id: &str, status: ApplicationStatus) -> Result<bool> {
        let Some(index) = self.applications.iter().position(|a| a.id == id) else {
            return Ok(false);
        };
        let mut next = self.applications.clone();
        next[index].application_status = status;
        self.commit(next)?;
        info!(id, %status, "application status updated");
        Ok(true)
    }

    /// Returns false when no application has the given id.
    pub fn remove_application(&mut self, id: &str) -> Result<bool> {
        let next: Vec<AppliedJob> =
            self.applications.iter().filter(|a| a.id != id).cloned().collect();
        if next.len() == self.applications.len() {
            return Ok(false);
        }
        self.commit(next)?;
        info!(id, "application removed");
        Ok(true)
    }

    fn require_user(&self, action: &str) -> Result<String> {
        self.user_id
            .clone()
            .ok_or_else(|| Error::auth(format!("you must be logged in to {}", action)))
    }

    fn record(
        &mut self,
        user_id: String,
        job: &Job,
        external_url: Option<&str>,
        notes: Option<&str>,
    ) -> Result<AppliedJob> {
        let application = AppliedJob {
            id: self.next_id(),
            job_id: job.id.clone(),
            user_id,
            job: job.clone(),
            applied_at: Utc::now(),
            application_status: ApplicationStatus::Applied,
            external_url: external_url.map(str::to_string),
            notes: notes.map(str::to_string).filter(|n| !n.trim().is_empty()),
        };
        let mut next = self.applications.clone();
        next.push(application.clone());
        self.commit(next)?;
        info!(id = %application.id, job_id = %application.job_id, "application recorded");
        Ok(application)
    }

    fn next_id(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let id = format!("app-{}-{:08x}", Utc::now().timestamp_millis(), rng.r#gen::<u32>());
            if !self.applications.iter().any(|a| a.id == id) {
                return id;
            }
        }
    }

    /// Writes `next` to the user's slot and only then makes it the live list,
    /// so a failed write leaves the tracker as it was.
    fn commit(&mut self, next: Vec<AppliedJob>) -> Result<()> {
        if let Some(user_id) = &self.user_id {
            self.store.put(user_id, &next)?;
        }
        self.applications = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::store::{KeyValueStore, MemoryStore};
    use std::cell::Cell;
    use std::collections::HashSet;

    fn frontend_job() -> Job {
        let mut job = Job::manual("Frontend Developer", Some("Acme"), None);
        job.id = "job-1".to_string();
        job
    }

    #[test]
    fn test_apply_update_remove_scenario() {
        let mut tracker = ApplicationTracker::for_user(MemoryStore::new(), Some("alice")).unwrap();

        let app = tracker.apply_to_job(&frontend_job(), None, None).unwrap();
        assert_eq!(tracker.applications().len(), 1);
        assert_eq!(tracker.applications()[0].application_status, ApplicationStatus::Applied);

        assert!(tracker.update_application_status(&app.id, ApplicationStatus::Interviewed).unwrap());
        assert_eq!(tracker.applications().len(), 1);
        assert_eq!(tracker.applications()[0].application_status, ApplicationStatus::Interviewed);

        assert!(tracker.remove_application(&app.id).unwrap());
        assert!(tracker.applications().is_empty());
    }

    #[test]
    fn test_second_apply_is_duplicate() {
        let mut tracker = ApplicationTracker::for_user(MemoryStore::new(), Some("alice")).unwrap();
        tracker.apply_to_job(&frontend_job(), None, None).unwrap();

        let err = tracker.apply_to_job(&frontend_job(), None, None).unwrap_err();
        assert!(matches!(err, Error::Duplicate(_)));
        assert_eq!(err.to_string(), "You have already applied to this job");
        assert_eq!(tracker.applications().len(), 1);
    }

    #[test]
    fn test_external_application_skips_duplicate_check() {
        let mut tracker = ApplicationTracker::for_user(MemoryStore::new(), Some("alice")).unwrap();
        let a = tracker
            .add_external_application(&frontend_job(), "https://acme.test/jobs/1", None)
            .unwrap();
        let b = tracker
            .add_external_application(&frontend_job(), "https://acme.test/jobs/1", Some("again"))
            .unwrap();

        assert_eq!(tracker.applications().len(), 2);
        assert_ne!(a.id, b.id);
        assert_eq!(a.job_id, b.job_id);
        assert_eq!(b.external_url.as_deref(), Some("https://acme.test/jobs/1"));
    }

    #[test]
    fn test_requires_signed_in_user() {
        let mut tracker = ApplicationTracker::new(MemoryStore::new());
        let err = tracker.apply_to_job(&frontend_job(), None, None).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        let err = tracker
            .add_external_application(&frontend_job(), "https://acme.test", None)
            .unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn test_status_update_only_touches_status() {
        let mut tracker = ApplicationTracker::for_user(MemoryStore::new(), Some("alice")).unwrap();
        let mut other = frontend_job();
        other.id = "job-2".to_string();
        let first = tracker
            .apply_to_job(&frontend_job(), Some("https://acme.test"), Some("ping recruiter"))
            .unwrap();
        let second = tracker.apply_to_job(&other, None, None).unwrap();

        tracker.update_application_status(&first.id, ApplicationStatus::Rejected).unwrap();

        let matching: Vec<&AppliedJob> =
            tracker.applications().iter().filter(|a| a.id == first.id).collect();
        assert_eq!(matching.len(), 1);
        let updated = matching[0];
        assert_eq!(updated.application_status, ApplicationStatus::Rejected);
        assert_eq!(updated.applied_at, first.applied_at);
        assert_eq!(updated.notes, first.notes);
        assert_eq!(updated.external_url, first.external_url);
        assert_eq!(updated.job, first.job);
        assert_eq!(tracker.find_by_job("job-2"), Some(&second));
    }

    #[test]
    fn test_any_transition_is_allowed() {
        let mut tracker = ApplicationTracker::for_user(MemoryStore::new(), Some("alice")).unwrap();
        let app = tracker.apply_to_job(&frontend_job(), None, None).unwrap();
        tracker.update_application_status(&app.id, ApplicationStatus::Accepted).unwrap();
        tracker.update_application_status(&app.id, ApplicationStatus::Applied).unwrap();
        assert_eq!(tracker.applications()[0].application_status, ApplicationStatus::Applied);
    }

    #[test]
    fn test_unknown_ids_are_no_ops() {
        let mut tracker = ApplicationTracker::for_user(MemoryStore::new(), Some("alice")).unwrap();
        tracker.apply_to_job(&frontend_job(), None, None).unwrap();
        let snapshot = tracker.applications().to_vec();

        assert!(!tracker.update_application_status("nope", ApplicationStatus::Viewed).unwrap());
        assert!(!tracker.remove_application("nope").unwrap());
        assert_eq!(tracker.applications(), snapshot.as_slice());
    }

    #[test]
    fn test_remove_twice_equals_once() {
        let mut tracker = ApplicationTracker::for_user(MemoryStore::new(), Some("alice")).unwrap();
        let app = tracker.apply_to_job(&frontend_job(), None, None).unwrap();
        let mut other = frontend_job();
        other.id = "job-2".to_string();
        tracker.apply_to_job(&other, None, None).unwrap();

        assert!(tracker.remove_application(&app.id).unwrap());
        let after_once = tracker.applications().to_vec();
        assert!(!tracker.remove_application(&app.id).unwrap());
        assert_eq!(tracker.applications(), after_once.as_slice());
    }

    #[test]
    fn test_switching_users_shows_only_their_slot() {
        let store = MemoryStore::new();
        let mut tracker = ApplicationTracker::for_user(&store, Some("alice")).unwrap();
        tracker.apply_to_job(&frontend_job(), None, None).unwrap();

        tracker.set_user(Some("bob")).unwrap();
        assert!(tracker.applications().is_empty());
        let mut bobs_job = frontend_job();
        bobs_job.id = "job-9".to_string();
        tracker.apply_to_job(&bobs_job, None, None).unwrap();
        assert!(tracker.applications().iter().all(|a| a.user_id == "bob"));

        tracker.set_user(Some("alice")).unwrap();
        assert_eq!(tracker.applications().len(), 1);
        assert_eq!(tracker.applications()[0].job_id, "job-1");

        tracker.set_user(None).unwrap();
        assert!(tracker.applications().is_empty());
        assert!(tracker.user_id().is_none());
    }

    #[test]
    fn test_writes_through_to_database() {
        let db = Database::open_in_memory().unwrap();
        {
            let mut tracker = ApplicationTracker::for_user(&db, Some("alice")).unwrap();
            tracker.apply_to_job(&frontend_job(), None, Some("first")).unwrap();
        }
        let reopened = ApplicationTracker::for_user(&db, Some("alice")).unwrap();
        assert_eq!(reopened.applications().len(), 1);
        assert_eq!(reopened.applications()[0].notes.as_deref(), Some("first"));
    }

    #[test]
    fn test_status_and_removal_write_through() {
        let db = Database::open_in_memory().unwrap();
        let (kept, dropped) = {
            let mut tracker = ApplicationTracker::for_user(&db, Some("alice")).unwrap();
            let kept = tracker.apply_to_job(&frontend_job(), None, None).unwrap();
            let dropped = tracker
                .add_external_application(&frontend_job(), "https://acme.test", None)
                .unwrap();
            tracker.update_application_status(&kept.id, ApplicationStatus::Viewed).unwrap();
            tracker.remove_application(&dropped.id).unwrap();
            (kept, dropped)
        };

        let reopened = ApplicationTracker::for_user(&db, Some("alice")).unwrap();
        assert_eq!(reopened.applications().len(), 1);
        assert_eq!(reopened.applications()[0].id, kept.id);
        assert_eq!(reopened.applications()[0].application_status, ApplicationStatus::Viewed);
        assert!(reopened.applications().iter().all(|a| a.id != dropped.id));
    }

    /// Memory store whose writes can be switched to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failing: Cell<bool>,
    }

    impl KeyValueStore for FlakyStore {
        fn get_value(&self, key: &str) -> Result<Option<String>> {
            self.inner.get_value(key)
        }

        fn set_value(&self, key: &str, value: &str) -> Result<()> {
            if self.failing.get() {
                return Err(Error::Io(std::io::Error::other("disk full")));
            }
            self.inner.set_value(key, value)
        }

        fn remove_value(&self, key: &str) -> Result<()> {
            self.inner.remove_value(key)
        }
    }

    #[test]
    fn test_failed_write_leaves_list_unchanged() {
        let store = FlakyStore::default();
        let mut tracker = ApplicationTracker::for_user(&store, Some("alice")).unwrap();
        let first = tracker.apply_to_job(&frontend_job(), None, None).unwrap();
        let mut other = frontend_job();
        other.id = "job-2".to_string();

        store.failing.set(true);
        assert!(tracker.apply_to_job(&other, None, None).is_err());
        assert!(tracker.add_external_application(&other, "https://acme.test", None).is_err());
        assert!(tracker.update_application_status(&first.id, ApplicationStatus::Accepted).is_err());
        assert!(tracker.remove_application(&first.id).is_err());
        assert_eq!(tracker.applications(), &[first.clone()][..]);
        assert!(!tracker.is_applied("job-2"));

        store.failing.set(false);
        tracker.apply_to_job(&other, None, None).unwrap();
        let reopened = ApplicationTracker::for_user(&store, Some("alice")).unwrap();
        assert_eq!(reopened.applications().len(), 2);
        assert_eq!(reopened.applications()[0], first);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut tracker = ApplicationTracker::for_user(MemoryStore::new(), Some("alice")).unwrap();
        for _ in 0..50 {
            tracker
                .add_external_application(&frontend_job(), "https://acme.test", None)
                .unwrap();
        }
        let ids: HashSet<&str> = tracker.applications().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_stats_counts_each_status() {
        let mut tracker = ApplicationTracker::for_user(MemoryStore::new(), Some("alice")).unwrap();
        let app = tracker.apply_to_job(&frontend_job(), None, None).unwrap();
        tracker.add_external_application(&frontend_job(), "https://acme.test", None).unwrap();
        tracker.update_application_status(&app.id, ApplicationStatus::Viewed).unwrap();

        let stats = tracker.stats();
        assert_eq!(stats["applied"], 1);
        assert_eq!(stats["viewed"], 1);
        assert_eq!(stats["accepted"], 0);
    }
}
