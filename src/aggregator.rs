use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::models::Job;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Internal,
    External,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Internal => "internal",
            Source::External => "external",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceFilter {
    #[default]
    All,
    Internal,
    External,
}

impl SourceFilter {
    pub fn matches(&self, source: Source) -> bool {
        match self {
            SourceFilter::All => true,
            SourceFilter::Internal => source == Source::Internal,
            SourceFilter::External => source == Source::External,
        }
    }

    pub fn next(&self) -> Self {
        match self {
            SourceFilter::All => SourceFilter::Internal,
            SourceFilter::Internal => SourceFilter::External,
            SourceFilter::External => SourceFilter::All,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceFilter::All => "all",
            SourceFilter::Internal => "internal",
            SourceFilter::External => "external",
        }
    }
}

impl FromStr for SourceFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(SourceFilter::All),
            "internal" => Ok(SourceFilter::Internal),
            "external" => Ok(SourceFilter::External),
            _ => Err(Error::validation(format!(
                "unknown source '{}' (expected all, internal or external)",
                s
            ))),
        }
    }
}

/// A job on the unified board, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardJob {
    pub id: String, // "<source>-<job id>"
    pub source: Source,
    pub job: Job,
}

fn tag(jobs: &[Job], source: Source) -> impl Iterator<Item = BoardJob> + '_ {
    jobs.iter().map(move |job| BoardJob {
        id: format!("{}-{}", source.as_str(), job.id),
        source,
        job: job.clone(),
    })
}

pub fn merge<R: Rng + ?Sized>(internal: &[Job], external: &[Job], rng: &mut R) -> Vec<BoardJob> {
    let mut combined: Vec<BoardJob> = tag(internal, Source::Internal)
        .chain(tag(external, Source::External))
        .collect();
    combined.shuffle(rng);
    combined
}

pub fn filter_by_source(jobs: &[BoardJob], filter: SourceFilter) -> Vec<&BoardJob> {
    jobs.iter().filter(|j| filter.matches(j.source)).collect()
}

/// Holds both input lists and the combined board. Either input changing
/// rebuilds the whole board.
pub struct Dashboard<R: Rng> {
    internal: Vec<Job>,
    external: Vec<Job>,
    combined: Vec<BoardJob>,
    rng: R,
}

impl<R: Rng> Dashboard<R> {
    pub fn new(rng: R) -> Self {
        Self { internal: Vec::new(), external: Vec::new(), combined: Vec::new(), rng }
    }

    pub fn set_internal(&mut self, jobs: Vec<Job>) {
        self.internal = jobs;
        self.rebuild();
    }

    pub fn set_external(&mut self, jobs: Vec<Job>) {
        self.external = jobs;
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.combined = merge(&self.internal, &self.external, &mut self.rng);
    }

    pub fn jobs(&self) -> &[BoardJob] {
        &self.combined
    }

    pub fn filtered(&self, filter: SourceFilter) -> Vec<&BoardJob> {
        filter_by_source(&self.combined, filter)
    }

    pub fn count(&self, filter: SourceFilter) -> usize {
        self.combined.iter().filter(|j| filter.matches(j.source)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::internal_jobs;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn external(n: usize) -> Vec<Job> {
        (1..=n)
            .map(|i| {
                let mut job = Job::manual(&format!("Remote role {}", i), None, None);
                job.id = i.to_string();
                job
            })
            .collect()
    }

    #[test]
    fn test_merge_tags_and_prefixes_ids() {
        let mut rng = StdRng::seed_from_u64(7);
        let board = merge(&internal_jobs(), &external(3), &mut rng);
        assert_eq!(board.len(), internal_jobs().len() + 3);

        // both sources use id "1" without colliding on the board
        assert!(board.iter().any(|j| j.id == "internal-1" && j.source == Source::Internal));
        assert!(board.iter().any(|j| j.id == "external-1" && j.source == Source::External));
        let mut ids: Vec<&str> = board.iter().map(|j| j.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), board.len());
    }

    #[test]
    fn test_merge_shuffles() {
        let internal = internal_jobs();
        let ext = external(20);
        let unshuffled: Vec<String> = tag(&internal, Source::Internal)
            .chain(tag(&ext, Source::External))
            .map(|j| j.id)
            .collect();

        let mut rng = StdRng::seed_from_u64(42);
        let shuffled: Vec<String> = merge(&internal, &ext, &mut rng).into_iter().map(|j| j.id).collect();
        assert_ne!(shuffled, unshuffled);

        let mut sorted_a = shuffled.clone();
        let mut sorted_b = unshuffled.clone();
        sorted_a.sort();
        sorted_b.sort();
        assert_eq!(sorted_a, sorted_b);
    }

    #[test]
    fn test_filter_by_source() {
        let mut rng = StdRng::seed_from_u64(1);
        let board = merge(&internal_jobs(), &external(4), &mut rng);

        assert_eq!(filter_by_source(&board, SourceFilter::All).len(), board.len());
        let ext = filter_by_source(&board, SourceFilter::External);
        assert_eq!(ext.len(), 4);
        assert!(ext.iter().all(|j| j.source == Source::External));
        assert_eq!(filter_by_source(&board, SourceFilter::Internal).len(), internal_jobs().len());
    }

    #[test]
    fn test_dashboard_recomputes_on_either_input() {
        let mut dashboard = Dashboard::new(StdRng::seed_from_u64(3));
        dashboard.set_internal(internal_jobs());
        assert_eq!(dashboard.jobs().len(), 6);

        dashboard.set_external(external(5));
        assert_eq!(dashboard.jobs().len(), 11);
        assert_eq!(dashboard.count(SourceFilter::External), 5);

        dashboard.set_internal(Vec::new());
        assert_eq!(dashboard.jobs().len(), 5);
        assert_eq!(dashboard.filtered(SourceFilter::Internal).len(), 0);
    }

    #[test]
    fn test_source_filter_parse_and_cycle() {
        assert_eq!("External".parse::<SourceFilter>().unwrap(), SourceFilter::External);
        assert!("both".parse::<SourceFilter>().is_err());
        assert_eq!(SourceFilter::All.next().next().next(), SourceFilter::All);
    }
}
