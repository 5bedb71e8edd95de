use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;

use rand::Rng;

use crate::aggregator::{BoardJob, Dashboard, Source, SourceFilter};
use crate::api::JobBoardApi;
use crate::fetcher::JobFeed;
use crate::models::Outcome;
use crate::notify::Notifier;
use crate::store::ApplicationStore;
use crate::tracker::ApplicationTracker;

struct BoardState {
    jobs: Vec<BoardJob>,
    filter: SourceFilter,
    visible: Vec<usize>,
    selected: usize,
    scroll_offset: u16,
    status_line: String,
}

impl BoardState {
    fn new(jobs: Vec<BoardJob>, filter: SourceFilter) -> Self {
        let mut state = Self {
            jobs,
            filter,
            visible: Vec::new(),
            selected: 0,
            scroll_offset: 0,
            status_line: String::new(),
        };
        state.apply_filter();
        state
    }

    fn apply_filter(&mut self) {
        self.visible = self
            .jobs
            .iter()
            .enumerate()
            .filter(|(_, j)| self.filter.matches(j.source))
            .map(|(i, _)| i)
            .collect();
        self.selected = 0;
        self.scroll_offset = 0;
    }

    fn current(&self) -> Option<&BoardJob> {
        self.visible.get(self.selected).map(|&i| &self.jobs[i])
    }

    fn next(&mut self) {
        if !self.visible.is_empty() && self.selected < self.visible.len() - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn cycle_filter(&mut self) {
        self.filter = self.filter.next();
        self.apply_filter();
    }
}

pub fn run_board<R: Rng, S: ApplicationStore>(
    dashboard: &mut Dashboard<R>,
    feed: &mut JobFeed,
    api: &dyn JobBoardApi,
    filter: SourceFilter,
    tracker: &mut ApplicationTracker<S>,
    notifier: &Notifier,
) -> Result<()> {
    if dashboard.jobs().is_empty() {
        println!("No jobs found.");
        return Ok(());
    }

    let mut state = BoardState::new(dashboard.jobs().to_vec(), filter);

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, dashboard, feed, api, tracker, notifier);

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

/// Reloads the first page of external jobs and rebuilds the board with it.
/// On failure the board keeps what it had.
fn reload_external<R: Rng>(
    state: &mut BoardState,
    dashboard: &mut Dashboard<R>,
    feed: &mut JobFeed,
    api: &dyn JobBoardApi,
) -> Outcome {
    let outcome = feed.reset(api);
    if outcome.success {
        dashboard.set_external(feed.items().to_vec());
        state.jobs = dashboard.jobs().to_vec();
        state.apply_filter();
    }
    outcome
}

fn run_loop<R: Rng, S: ApplicationStore>(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut BoardState,
    dashboard: &mut Dashboard<R>,
    feed: &mut JobFeed,
    api: &dyn JobBoardApi,
    tracker: &mut ApplicationTracker<S>,
    notifier: &Notifier,
) -> Result<()> {
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        terminal.draw(|frame| draw(frame, state, tracker, &mut list_state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Down | KeyCode::Char('j') => state.next(),
                KeyCode::Up | KeyCode::Char('k') => state.prev(),
                KeyCode::Char('J') | KeyCode::PageDown => {
                    state.scroll_offset = state.scroll_offset.saturating_add(3)
                }
                KeyCode::Char('K') | KeyCode::PageUp => {
                    state.scroll_offset = state.scroll_offset.saturating_sub(3)
                }
                KeyCode::Char('f') => state.cycle_filter(),
                KeyCode::Char('r') => {
                    let outcome = reload_external(state, dashboard, feed, api);
                    notifier.outcome(&outcome);
                    state.status_line = outcome.message;
                }
                KeyCode::Char('a') => {
                    if let Some(board_job) = state.current() {
                        let job = board_job.job.clone();
                        state.status_line =
                            match tracker.apply_to_job(&job, job.apply_link.as_deref(), None) {
                                Ok(_) => {
                                    notifier.success(format!("Applied to {}", job.title));
                                    format!("Applied to {}", job.title)
                                }
                                Err(e) => {
                                    notifier.error(e.to_string());
                                    e.to_string()
                                }
                            };
                    }
                }
                _ => {}
            }
            list_state.select(Some(state.selected));
        }
    }
    Ok(())
}

fn draw<S: ApplicationStore>(
    frame: &mut Frame,
    state: &BoardState,
    tracker: &ApplicationTracker<S>,
    list_state: &mut ListState,
) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[0]);

    let items: Vec<ListItem> = state
        .visible
        .iter()
        .map(|&i| {
            let board_job = &state.jobs[i];
            let applied = if tracker.is_applied(&board_job.job.id) { "+" } else { " " };
            let tag = match board_job.source {
                Source::Internal => "INT",
                Source::External => "EXT",
            };
            let company = board_job.job.company.as_deref().unwrap_or("?");
            ListItem::new(format!(
                "{} {} {} | {}",
                applied,
                tag,
                truncate(&board_job.job.title, 32),
                company
            ))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " Jobs: {} ({}) ",
            state.filter.label(),
            state.visible.len()
        )))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    let detail = Paragraph::new(build_detail(state, tracker))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));
    frame.render_widget(detail, chunks[1]);

    let footer = if state.status_line.is_empty() {
        " j/k:navigate  J/K:scroll  f:filter  r:reload  a:apply  q:quit".to_string()
    } else {
        format!(" {}", state.status_line)
    };
    frame.render_widget(
        Paragraph::new(footer).style(Style::default().fg(Color::DarkGray)),
        rows[1],
    );
}

fn build_detail<'a, S: ApplicationStore>(
    state: &'a BoardState,
    tracker: &ApplicationTracker<S>,
) -> Text<'a> {
    let Some(board_job) = state.current() else {
        return Text::raw("No job selected");
    };
    let job = &board_job.job;

    let mut lines: Vec<Line> = Vec::new();
    lines.push(Line::from(Span::styled(
        job.title.as_str(),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    if let Some(company) = &job.company {
        lines.push(Line::from(format!("at {}", company)));
    }
    lines.push(Line::from(Span::styled(
        format!("Source: {}  ({})", board_job.source, board_job.id),
        Style::default().fg(Color::Cyan),
    )));
    if let Some(location) = &job.location {
        lines.push(Line::from(format!("Location: {}", location)));
    }
    if let Some(salary) = &job.salary {
        lines.push(Line::from(format!("Pay: {}", salary)));
    }
    if let Some(label) = job.employment_label() {
        lines.push(Line::from(format!("Type: {}", label)));
    }
    if let Some(link) = &job.apply_link {
        lines.push(Line::from(format!("Apply: {}", link)));
    }

    if let Some(app) = tracker.find_by_job(&job.id) {
        lines.push(Line::from(Span::styled(
            format!(
                "Applied {} - {}",
                app.applied_at.format("%Y-%m-%d"),
                app.application_status
            ),
            Style::default().fg(Color::Green),
        )));
    }

    lines.push(Line::from(""));
    match job.plain_description() {
        Some(text) => {
            for line in textwrap::fill(&text, 70).lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        None => lines.push(Line::from(Span::styled(
            "(No description)",
            Style::default().fg(Color::DarkGray),
        ))),
    }

    Text::from(lines)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::merge;
    use crate::api::fake::FakeJobApi;
    use crate::fetcher::FetchParams;
    use crate::demo::internal_jobs;
    use crate::models::Job;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn board() -> Vec<BoardJob> {
        let mut external = Job::manual("Site Reliability Engineer", Some("Orbit"), None);
        external.id = "77".to_string();
        merge(&internal_jobs(), &[external], &mut StdRng::seed_from_u64(9))
    }

    #[test]
    fn test_filter_cycle_limits_visible_rows() {
        let mut state = BoardState::new(board(), SourceFilter::All);
        assert_eq!(state.visible.len(), 7);

        state.cycle_filter();
        assert_eq!(state.filter, SourceFilter::Internal);
        assert_eq!(state.visible.len(), 6);

        state.cycle_filter();
        assert_eq!(state.visible.len(), 1);
        assert_eq!(state.current().unwrap().id, "external-77");
    }

    #[test]
    fn test_navigation_stays_in_bounds() {
        let mut state = BoardState::new(board(), SourceFilter::External);
        state.next();
        assert_eq!(state.selected, 0);
        state.prev();
        assert_eq!(state.selected, 0);
    }

    #[test]
    fn test_reload_replaces_external_rows_from_first_page() {
        let api = FakeJobApi::with_jobs(25);
        let mut feed = JobFeed::new(10);
        feed.fetch(&api, FetchParams::default());
        feed.load_more(&api);
        let mut dashboard = Dashboard::new(StdRng::seed_from_u64(3));
        dashboard.set_internal(internal_jobs());
        dashboard.set_external(feed.items().to_vec());
        let mut state = BoardState::new(dashboard.jobs().to_vec(), SourceFilter::External);
        assert_eq!(state.visible.len(), 20);
        state.next();

        let outcome = reload_external(&mut state, &mut dashboard, &mut feed, &api);
        assert!(outcome.success);
        assert_eq!(state.visible.len(), 10);
        assert_eq!(state.selected, 0);
        assert_eq!(state.jobs.len(), 16);
        assert_eq!(feed.page(), 1);

        api.fail_with.set(Some(500));
        let outcome = reload_external(&mut state, &mut dashboard, &mut feed, &api);
        assert_eq!(outcome.message, "HTTP error! status: 500");
        assert_eq!(state.visible.len(), 10);
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Ingénieur logiciel", 8), "Ingén...");
    }
}
