mod aggregator;
mod api;
mod auth;
mod backend;
mod config;
mod contacts;
mod db;
mod demo;
mod error;
mod fetcher;
mod models;
mod notify;
mod saved;
mod store;
mod tracker;
mod tui;

use std::cell::RefCell;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use aggregator::{Dashboard, SourceFilter};
use api::{HttpJobApi, JobBoardApi};
use auth::{AuthBridge, GoogleProfile, ProfileUpdate};
use backend::HttpBackend;
use config::Config;
use contacts::ContactClient;
use db::Database;
use fetcher::{FetchParams, JobFeed};
use models::{ApplicationStatus, AppliedJob, ContactDraft, ContactStatus, Credentials, Job};
use notify::{Level, Notice, Notifier};
use saved::SavedJobTracker;
use store::{KeyValueStore, API_CREDENTIALS_KEY};
use tracker::ApplicationTracker;

#[derive(Parser)]
#[command(name = "jobboard")]
#[command(about = "Browse job listings, track applications and manage your job-board account")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the local database
    Init,

    /// Log in to the external job API (needed for saved jobs)
    ApiLogin {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },

    /// Forget the cached job API credentials
    ApiLogout,

    /// List external jobs
    Jobs {
        /// Search text
        #[arg(short, long)]
        search: Option<String>,

        /// Ordering field, e.g. -created_at
        #[arg(short, long)]
        ordering: Option<String>,

        /// Category id
        #[arg(short, long)]
        category: Option<String>,

        /// First page to fetch
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Number of pages to load (load-more)
        #[arg(long, default_value = "1")]
        pages: u32,
    },

    /// List job categories
    Categories,

    /// Show internal and external jobs on one board
    Board {
        /// Source filter (all, internal, external)
        #[arg(short, long, default_value = "all")]
        source: SourceFilter,

        /// Search text for external jobs
        #[arg(long)]
        search: Option<String>,

        /// Open the interactive browser
        #[arg(short, long)]
        browse: bool,
    },

    /// Manage saved jobs
    Saved {
        #[command(subcommand)]
        command: SavedCommands,
    },

    /// Apply to a job (board id like internal-3 / external-12, or an external job id)
    Apply {
        job_id: String,

        /// Link to the submitted application
        #[arg(short, long)]
        url: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Record an application made outside the board
    Track {
        /// Job title
        title: String,

        #[arg(short, long)]
        company: Option<String>,

        /// Where the application was made
        #[arg(short, long)]
        url: String,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// List your applications
    Applications {
        /// Filter by status (applied, viewed, interviewed, accepted, rejected)
        #[arg(short, long)]
        status: Option<ApplicationStatus>,
    },

    /// Change the status of an application
    Status {
        /// Application ID
        id: String,

        status: ApplicationStatus,
    },

    /// Remove an application
    Withdraw {
        /// Application ID
        id: String,
    },

    /// Account commands
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Contact form
    Contact {
        #[command(subcommand)]
        command: ContactCommands,
    },
}

#[derive(Subcommand)]
enum SavedCommands {
    /// List saved jobs
    List,

    /// Save a job
    Add {
        /// External job ID
        job_id: String,
    },

    /// Remove a saved job
    Remove {
        /// Saved job ID
        saved_id: String,
    },

    /// Save a job, or unsave it if already saved
    Toggle {
        /// External job ID
        job_id: String,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Create an account
    Register {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Log in with email and password
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Sign in with a Google profile
    Google {
        #[arg(long)]
        uid: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        name: String,

        #[arg(long)]
        photo_url: Option<String>,
    },

    /// Show your profile
    Profile,

    /// Update your profile
    Update {
        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        email: Option<String>,

        #[arg(short, long)]
        avatar: Option<String>,
    },

    /// Log out of both providers
    Logout,

    /// Delete your account
    Delete {
        /// Only remove the backend's database record
        #[arg(long)]
        record_only: bool,
    },

    /// List registered users
    Users,

    /// Show who is signed in where
    Whoami,
}

#[derive(Subcommand)]
enum ContactCommands {
    /// Send a message
    Send {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        subject: Option<String>,

        #[arg(short, long)]
        message: String,
    },

    /// List messages
    List,

    /// Show a message
    Show { id: String },

    /// Change a message's status (new, read, replied)
    Status { id: String, status: ContactStatus },

    /// Delete a message
    Delete { id: String },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn job_api(config: &Config, db: &Database) -> Result<HttpJobApi> {
    let credentials: Option<Credentials> = db.get_json(API_CREDENTIALS_KEY)?;
    Ok(HttpJobApi::new(&config.api_url, config.http_timeout)?.with_credentials(credentials))
}

fn resolve_job(job_id: &str, api: &dyn JobBoardApi) -> Result<Job> {
    if let Some(id) = job_id.strip_prefix("internal-") {
        return demo::internal_jobs()
            .into_iter()
            .find(|j| j.id == id)
            .ok_or_else(|| anyhow!("Internal job #{} not found", id));
    }
    let id = job_id.strip_prefix("external-").unwrap_or(job_id);
    api.get_job(id)
        .with_context(|| format!("Failed to fetch job #{}", id))
}

/// Owner of the local application list, or an error telling the user to log in.
fn signed_in_user(bridge: &AuthBridge<'_, &HttpBackend, &Database>) -> Result<String> {
    bridge
        .active_user_id()
        .ok_or_else(|| anyhow!("Not logged in. Run 'jobboard auth login' first."))
}

fn print_notice(notice: &Notice) {
    match notice.level {
        Level::Error => eprintln!("error: {}", notice.message),
        Level::Warning => eprintln!("warning: {}", notice.message),
        Level::Success | Level::Info => println!("{}", notice.message),
    }
}

fn print_jobs<'a>(jobs: impl Iterator<Item = (String, &'a Job)>) {
    println!("{:<16} {:<30} {:<20} {:<16} {:>10}", "ID", "TITLE", "COMPANY", "LOCATION", "TYPE");
    println!("{}", "-".repeat(96));
    for (id, job) in jobs {
        println!(
            "{:<16} {:<30} {:<20} {:<16} {:>10}",
            truncate(&id, 16),
            truncate(&job.title, 28),
            truncate(job.company.as_deref().unwrap_or("-"), 18),
            truncate(job.location.as_deref().unwrap_or("-"), 14),
            job.employment_label().unwrap_or("-"),
        );
    }
}

fn print_applications(apps: &[&AppliedJob]) {
    println!("{:<24} {:<12} {:<30} {:<20} {:<10}", "ID", "STATUS", "TITLE", "COMPANY", "APPLIED");
    println!("{}", "-".repeat(98));
    for app in apps {
        println!(
            "{:<24} {:<12} {:<30} {:<20} {:<10}",
            app.id,
            app.application_status.as_str(),
            truncate(&app.job.title, 28),
            truncate(app.job.company.as_deref().unwrap_or("-"), 18),
            app.applied_at.format("%Y-%m-%d").to_string(),
        );
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env()?;
    let db = Database::open(config.db_path.as_deref())?;

    let notifier = Notifier::new(32);
    let mut notices = notifier.subscribe();

    let result = run(cli.command, &config, &db, &notifier);

    for notice in notify::drain(&mut notices) {
        print_notice(&notice);
    }
    result
}

fn run(command: Commands, config: &Config, db: &Database, notifier: &Notifier) -> Result<()> {
    if let Commands::Init = command {
        db.init()?;
        println!("Database initialized at {}", db.path().display());
        return Ok(());
    }
    db.ensure_initialized()?;

    let backend = HttpBackend::new(&config.backend_url, config.http_timeout)?;

    match command {
        Commands::Init => unreachable!("handled above"),

        Commands::ApiLogin { username, password } => {
            let mut api = HttpJobApi::new(&config.api_url, config.http_timeout)?;
            api.login(Credentials { username, password })
                .context("Job API login failed")?;
            if let Some(credentials) = api.credentials() {
                db.put_json(API_CREDENTIALS_KEY, credentials)?;
            }
            notifier.success("Logged in to the job API");
        }

        Commands::ApiLogout => {
            db.remove_value(API_CREDENTIALS_KEY)?;
            notifier.success("Job API credentials removed");
        }

        Commands::Jobs { search, ordering, category, page, pages } => {
            let api = job_api(config, db)?;
            let mut feed = JobFeed::new(config.page_size);
            let outcome = feed.fetch(&api, FetchParams {
                search,
                ordering,
                category,
                page: Some(page),
                ..Default::default()
            });
            if !outcome.success {
                notifier.outcome(&outcome);
                return Ok(());
            }
            for _ in 1..pages {
                if !feed.has_more() {
                    break;
                }
                let outcome = feed.load_more(&api);
                if !outcome.success {
                    notifier.outcome(&outcome);
                    break;
                }
            }

            if feed.items().is_empty() {
                println!("No jobs found.");
            } else {
                print_jobs(feed.items().iter().map(|j| (j.id.clone(), j)));
                println!("\nShowing {} of {} jobs", feed.items().len(), feed.total_count());
                if feed.has_more() {
                    notifier.info(format!(
                        "More jobs available from page {} (use --pages)",
                        feed.page() + 1
                    ));
                }
            }
        }

        Commands::Categories => {
            let api = job_api(config, db)?;
            let categories = api.list_categories().context("Failed to fetch categories")?;
            if categories.results.is_empty() {
                println!("No categories found.");
            }
            for category in categories.results {
                println!("{:<6} {}", category.id, category.name);
            }
        }

        Commands::Board { source, search, browse } => {
            let api = job_api(config, db)?;
            let mut feed = JobFeed::new(config.page_size);
            let outcome = match search.as_deref() {
                Some(text) => feed.search(&api, text),
                None => feed.fetch(&api, FetchParams::default()),
            };
            if !outcome.success {
                let reason = feed.error().unwrap_or(outcome.message.as_str());
                notifier.warning(format!("External jobs unavailable: {}", reason));
            }

            let mut dashboard = Dashboard::new(rand::thread_rng());
            dashboard.set_internal(demo::internal_jobs());
            dashboard.set_external(feed.items().to_vec());

            let bridge = AuthBridge::new(&backend, db)?;
            let user_id = bridge.active_user_id();
            let mut tracker = ApplicationTracker::for_user(db, user_id.as_deref())?;

            if browse {
                tui::run_board(&mut dashboard, &mut feed, &api, source, &mut tracker, notifier)?;
            } else {
                let jobs = dashboard.filtered(source);
                if jobs.is_empty() {
                    println!("No jobs found.");
                } else {
                    print_jobs(jobs.iter().map(|b| (b.id.clone(), &b.job)));
                    println!(
                        "\n{} internal, {} external",
                        dashboard.count(SourceFilter::Internal),
                        dashboard.count(SourceFilter::External)
                    );
                }
            }
        }

        Commands::Saved { command } => {
            let api = job_api(config, db)?;
            let mut saved = SavedJobTracker::new();
            match command {
                SavedCommands::List => {
                    let outcome = saved.refresh(&api);
                    if !outcome.success {
                        notifier.outcome(&outcome);
                    } else if saved.saved().is_empty() {
                        println!("No saved jobs.");
                    } else {
                        println!("{:<8} {:<10} {:<20}", "ID", "JOB", "SAVED");
                        println!("{}", "-".repeat(40));
                        for s in saved.saved() {
                            println!(
                                "{:<8} {:<10} {:<20}",
                                s.id,
                                s.job_id,
                                truncate(s.created_at.as_deref().unwrap_or("-"), 20)
                            );
                        }
                    }
                }
                SavedCommands::Add { job_id } => {
                    notifier.outcome(&saved.save(&api, &job_id));
                }
                SavedCommands::Remove { saved_id } => {
                    notifier.outcome(&saved.remove(&api, &saved_id));
                }
                SavedCommands::Toggle { job_id } => {
                    let outcome = saved.refresh(&api);
                    if outcome.success {
                        notifier.outcome(&saved.toggle(&api, &job_id));
                        let state = if saved.is_saved(&job_id) { "saved" } else { "not saved" };
                        println!("Job #{} is {}", job_id, state);
                    } else {
                        notifier.outcome(&outcome);
                    }
                }
            }
        }

        Commands::Apply { job_id, url, notes } => {
            let bridge = AuthBridge::new(&backend, db)?;
            let user_id = bridge.active_user_id();
            let mut tracker = ApplicationTracker::for_user(db, user_id.as_deref())?;

            let api = job_api(config, db)?;
            let job = resolve_job(&job_id, &api)?;
            let app = tracker.apply_to_job(&job, url.as_deref(), notes.as_deref())?;
            notifier.success(format!("Applied to {} (application {})", job.title, app.id));
        }

        Commands::Track { title, company, url, notes } => {
            let bridge = AuthBridge::new(&backend, db)?;
            let user_id = bridge.active_user_id();
            let mut tracker = ApplicationTracker::for_user(db, user_id.as_deref())?;

            let job = Job::manual(&title, company.as_deref(), Some(&url));
            let app = tracker.add_external_application(&job, &url, notes.as_deref())?;
            notifier.success(format!("Tracking application {} for {}", app.id, title));
        }

        Commands::Applications { status } => {
            let bridge = AuthBridge::new(&backend, db)?;
            let user_id = signed_in_user(&bridge)?;
            let tracker = ApplicationTracker::for_user(db, Some(&user_id))?;

            let apps: Vec<&AppliedJob> = tracker
                .applications()
                .iter()
                .filter(|a| status.is_none_or(|s| a.application_status == s))
                .collect();
            if apps.is_empty() {
                println!("No applications found.");
            } else {
                println!("Applications for {}\n", tracker.user_id().unwrap_or(user_id.as_str()));
                print_applications(&apps);
                let summary: Vec<String> = tracker
                    .stats()
                    .into_iter()
                    .filter(|(_, n)| *n > 0)
                    .map(|(s, n)| format!("{} {}", n, s))
                    .collect();
                println!("\n{}", summary.join(", "));
            }
        }

        Commands::Status { id, status } => {
            let bridge = AuthBridge::new(&backend, db)?;
            let user_id = signed_in_user(&bridge)?;
            let mut tracker = ApplicationTracker::for_user(db, Some(&user_id))?;
            if tracker.update_application_status(&id, status)? {
                notifier.success(format!("Application {} marked {}", id, status));
            } else {
                println!("Application {} not found.", id);
            }
        }

        Commands::Withdraw { id } => {
            let bridge = AuthBridge::new(&backend, db)?;
            let user_id = signed_in_user(&bridge)?;
            let mut tracker = ApplicationTracker::for_user(db, Some(&user_id))?;
            if tracker.remove_application(&id)? {
                notifier.success(format!("Application {} removed", id));
            } else {
                println!("Application {} not found.", id);
            }
        }

        Commands::Auth { command } => {
            let tracker = RefCell::new(ApplicationTracker::new(db));
            let mut bridge = AuthBridge::new(&backend, db)?;
            let subscription = bridge.identity_mut().subscribe(|user| {
                let uid = user.map(|u| u.uid.as_str());
                if let Err(err) = tracker.borrow_mut().set_user(uid) {
                    warn!(error = %err, "failed to load applications for identity user");
                }
            });
            let result = run_auth(command, &mut bridge, &tracker, db, notifier);
            bridge.identity_mut().unsubscribe(subscription);
            result?;
        }

        Commands::Contact { command } => {
            let bridge = AuthBridge::new(&backend, db)?;
            let client = ContactClient::new(&backend, bridge.backend().token());
            match command {
                ContactCommands::Send { name, email, subject, message } => {
                    let contact = client.submit(&ContactDraft { name, email, subject, message })?;
                    notifier.success(format!("Message sent (#{})", contact.id));
                }
                ContactCommands::List => {
                    let contacts = client.list()?;
                    if contacts.is_empty() {
                        println!("No messages.");
                    } else {
                        println!("{:<6} {:<8} {:<20} {:<30}", "ID", "STATUS", "FROM", "SUBJECT");
                        println!("{}", "-".repeat(66));
                        for c in contacts {
                            println!(
                                "{:<6} {:<8} {:<20} {:<30}",
                                c.id,
                                c.status.as_str(),
                                truncate(&c.email, 18),
                                truncate(c.subject.as_deref().unwrap_or("-"), 28)
                            );
                        }
                    }
                }
                ContactCommands::Show { id } => {
                    let c = client.get(&id)?;
                    println!("Message #{} ({})", c.id, c.status);
                    println!("From: {} <{}>", c.name, c.email);
                    if let Some(subject) = &c.subject {
                        println!("Subject: {}", subject);
                    }
                    if let Some(created) = &c.created_at {
                        println!("Received: {}", created);
                    }
                    println!("\n{}", textwrap::fill(&c.message, 80));
                }
                ContactCommands::Status { id, status } => {
                    let c = client.update_status(&id, status)?;
                    notifier.success(format!("Message #{} marked {}", c.id, c.status));
                }
                ContactCommands::Delete { id } => {
                    client.delete(&id)?;
                    notifier.success(format!("Message #{} deleted", id));
                }
            }
        }
    }

    Ok(())
}

fn run_auth(
    command: AuthCommands,
    bridge: &mut AuthBridge<'_, &HttpBackend, &Database>,
    tracker: &RefCell<ApplicationTracker<&Database>>,
    db: &Database,
    notifier: &Notifier,
) -> Result<()> {
    match command {
        AuthCommands::Register { name, email, password } => {
            let user = bridge.backend_mut().register(&name, &email, &password)?;
            notifier.success(format!("Welcome, {}! Account created.", user.name));
        }

        AuthCommands::Login { email, password } => {
            let user = bridge.backend_mut().login(&email, &password)?;
            notifier.success(format!("Logged in as {}", user.email));
        }

        AuthCommands::Google { uid, email, name, photo_url } => {
            let user = bridge.sign_in_with_google(&GoogleProfile { uid, email, name, photo_url })?;
            notifier.success(format!("Signed in with Google as {}", user.email));
            let tracked = tracker.borrow().applications().len();
            if tracked > 0 {
                notifier.info(format!("{} tracked applications", tracked));
            }
        }

        AuthCommands::Profile => {
            let user = bridge.backend_mut().profile()?;
            println!("User #{}", user.id);
            println!("Name: {}", user.name);
            println!("Email: {}", user.email);
            if let Some(avatar) = &user.avatar {
                println!("Avatar: {}", avatar);
            }
            if let Some(created) = &user.created_at {
                println!("Member since: {}", created);
            }
        }

        AuthCommands::Update { name, email, avatar } => {
            if name.is_none() && email.is_none() && avatar.is_none() {
                println!("Nothing to update. Use --name, --email or --avatar");
                return Ok(());
            }
            let user = bridge.backend_mut().update_profile(&ProfileUpdate { name, email, avatar })?;
            notifier.success(format!("Profile updated for {}", user.email));
        }

        AuthCommands::Logout => {
            bridge.sign_out()?;
            notifier.success("Logged out");
        }

        AuthCommands::Delete { record_only } => {
            if record_only {
                bridge.backend_mut().delete_account_record()?;
            } else {
                bridge.backend_mut().delete_account()?;
            }
            notifier.success("Account deleted");
        }

        AuthCommands::Users => {
            let users = bridge.backend().list_users()?;
            println!("{:<6} {:<24} {:<30}", "ID", "NAME", "EMAIL");
            println!("{}", "-".repeat(60));
            for user in users {
                println!("{:<6} {:<24} {:<30}", user.id, truncate(&user.name, 22), truncate(&user.email, 28));
            }
        }

        AuthCommands::Whoami => {
            match bridge.identity().current() {
                Some(user) => println!(
                    "Identity provider: {} ({})",
                    user.display_name.as_deref().unwrap_or("-"),
                    user.uid
                ),
                None => println!("Identity provider: signed out"),
            }
            match bridge.backend().cached_user() {
                Some(user) if bridge.backend().is_authenticated() => {
                    println!("Backend: {} <{}> (#{})", user.name, user.email, user.id)
                }
                _ => println!("Backend: signed out"),
            }
            match bridge.active_user_id() {
                Some(id) => println!("Applications are tracked under: {}", id),
                None => println!("Applications: log in to track applications"),
            }
            let slots = db.keys_with_prefix("appliedJobs_")?;
            println!("Local application slots: {}", slots.len());
        }
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
