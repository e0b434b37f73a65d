mod config;
mod output;
mod tui;

use anyhow::{bail, Context as AnyhowContext, Result};
use clap::{Parser, Subcommand};
use config::{Config, Context, ContextTokenStore};
use redcrawl_client::api::documents::DocumentFilter;
use redcrawl_client::api::scheduling::{
    DEFAULT_COMPUTE_NEXT_BATCH, DEFAULT_DISPATCH_BATCH, DEFAULT_TICK_BATCH, MAX_BATCH,
};
use redcrawl_client::api::RegisterRequest;
use redcrawl_client::forms::{SourceForm, SourcePatch, SubscriptionForm};
use redcrawl_client::{
    ApiClient, ClientConfig, ClientError, LoginRedirect, Pagination, RouteDecision, Session, User,
};
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "redcrawl")]
#[command(version, about = "Redcrawl operator console", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Interactive mode (live observability dashboard)
    #[arg(short, long)]
    interactive: bool,

    /// Redcrawl API base URL (overrides REDCRAWL_API_URL and the current context)
    #[arg(long, global = true)]
    server_url: Option<String>,

    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage backend contexts
    ///
    /// Examples:
    ///     redcrawl context add local --server-url http://localhost/api
    ///     redcrawl context use prod
    #[command(verbatim_doc_comment)]
    Context {
        #[command(subcommand)]
        command: ContextCommand,
    },
    /// Sign in and out
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
    /// Crawl sources
    Sources {
        #[command(subcommand)]
        command: SourceCommand,
    },
    /// Monitoring subscriptions
    Subscriptions {
        #[command(subcommand)]
        command: SubscriptionCommand,
    },
    /// Scheduler controls, runs and outbox
    Scheduling {
        #[command(subcommand)]
        command: SchedulingCommand,
    },
    /// Documents, versions, parsed content and audit trail
    Documents {
        #[command(subcommand)]
        command: DocumentCommand,
    },
    /// Watch the outbox and runs live
    Observe,
}

#[derive(Subcommand)]
enum ContextCommand {
    /// Add a new context
    Add {
        name: String,
        #[arg(long)]
        server_url: String,
        /// Make it the current context
        #[arg(long)]
        set_current: bool,
    },
    /// List contexts
    List,
    /// Switch the current context
    Use { name: String },
    /// Delete a context
    Delete { name: String },
    /// Show the current context
    Current,
}

#[derive(Subcommand)]
enum AuthCommand {
    /// Exchange username and password for tokens
    Login {
        #[arg(short, long)]
        username: Option<String>,
        /// Read from REDCRAWL_PASSWORD or prompted when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored tokens
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Create an account
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum SourceCommand {
    List {
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    Get {
        id: i64,
    },
    Create {
        #[arg(long)]
        name: String,
        /// html, api or pdf
        #[arg(long)]
        kind: String,
        #[arg(long)]
        base_url: String,
        #[arg(long)]
        auth_ref: Option<String>,
        /// allow, disallow or custom
        #[arg(long)]
        robots_mode: Option<String>,
        /// Requests per minute (1-3600)
        #[arg(long)]
        rate_limit: Option<i64>,
        /// Create the source disabled
        #[arg(long)]
        disabled: bool,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        auth_ref: Option<String>,
        #[arg(long)]
        robots_mode: Option<String>,
        #[arg(long)]
        rate_limit: Option<i64>,
        #[arg(long)]
        enabled: Option<bool>,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
enum SubscriptionCommand {
    List {
        /// ACTIVE or DISABLED
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    Get {
        id: i64,
    },
    Create {
        #[arg(long)]
        source_id: i64,
        #[arg(long)]
        jurisdiction: String,
        /// Cron expression, e.g. "0 9 * * 1"
        #[arg(long)]
        schedule: String,
        #[arg(long)]
        status: Option<String>,
        /// Selectors as a JSON object
        #[arg(long)]
        selectors: Option<String>,
    },
    Enable {
        id: i64,
    },
    Disable {
        id: i64,
    },
    /// Trigger a run now
    Run {
        id: i64,
    },
}

#[derive(Subcommand)]
enum SchedulingCommand {
    /// Create runs for due subscriptions
    Tick {
        #[arg(long, default_value_t = DEFAULT_TICK_BATCH)]
        batch_size: u32,
    },
    /// Recompute next run times
    ComputeNext {
        #[arg(long, default_value_t = DEFAULT_COMPUTE_NEXT_BATCH)]
        batch_size: u32,
    },
    /// Publish pending outbox entries
    Dispatch {
        #[arg(long, default_value_t = DEFAULT_DISPATCH_BATCH)]
        batch_size: u32,
    },
    Runs {
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    Outbox {
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
}

#[derive(Subcommand)]
enum DocumentCommand {
    List {
        #[arg(long, default_value_t = 0)]
        skip: u32,
        #[arg(long, default_value_t = 10)]
        limit: u32,
        #[arg(long)]
        source_id: Option<i64>,
        #[arg(long)]
        language: Option<String>,
        /// Include versions for each document
        #[arg(long)]
        with_versions: bool,
    },
    Get {
        id: i64,
    },
    /// List the versions of a document
    Versions {
        id: i64,
    },
    /// Look a document up by its source URL
    ByUrl {
        url: String,
    },
    /// Show the parsed sections of a version
    Parsed {
        id: i64,
        version: i64,
    },
    /// Show the pipeline events behind a version
    Audit {
        id: i64,
        version: i64,
    },
}

/// Tells the operator to sign in again once the refresh token is rejected.
struct CliRedirect;

impl LoginRedirect for CliRedirect {
    fn redirect_to_login(&self) {
        eprintln!("Session expired. Run 'redcrawl auth login' to sign in again.");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let dashboard = cli.interactive || matches!(cli.command, Some(Commands::Observe));
    init_tracing(dashboard);

    let mut config = Config::load()?;

    let command = match (cli.interactive, cli.command) {
        (true, _) => Commands::Observe,
        (false, Some(command)) => command,
        (false, None) => {
            eprintln!("No command given. Run 'redcrawl --help' for usage.");
            std::process::exit(2);
        }
    };

    // Contexts are managed offline; everything else needs a client.
    let command = match command {
        Commands::Context { command } => return handle_context_command(&mut config, command),
        other => other,
    };

    let client_config = client_config(cli.server_url.as_deref(), &config)?;
    tracing::debug!(base_url = %client_config.base_url, "Using API");
    let tokens = Arc::new(ContextTokenStore::new(Config::get_config_path()?, &config));
    let client = Arc::new(
        ApiClient::from_config(&client_config, tokens.clone())?
            .with_login_redirect(Arc::new(CliRedirect)),
    );
    let session = Session::new(client.clone());

    match command {
        Commands::Auth { command } => handle_auth_command(&session, &tokens, command, cli.json).await,
        Commands::Sources { command } => {
            require_user(&session).await?;
            handle_source_command(&client, command, cli.json).await
        }
        Commands::Subscriptions { command } => {
            require_user(&session).await?;
            handle_subscription_command(&client, command, cli.json).await
        }
        Commands::Scheduling { command } => {
            require_user(&session).await?;
            handle_scheduling_command(&client, command, cli.json).await
        }
        Commands::Documents { command } => {
            require_user(&session).await?;
            handle_document_command(&client, command, cli.json).await
        }
        Commands::Observe => {
            require_user(&session).await?;
            tui::run_dashboard(&client).await
        }
        Commands::Context { .. } => unreachable!("handled above"),
    }
}

fn init_tracing(dashboard: bool) {
    // Log lines would tear the dashboard, so it stays silent unless RUST_LOG asks otherwise.
    let default_filter = if dashboard {
        "off"
    } else {
        "warn,redcrawlctl=info,redcrawl_client=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Flag, then `REDCRAWL_API_URL`, then the current context, then the default.
fn resolve_server_url(flag: Option<&str>, env: Option<&str>, context: Option<&Context>) -> String {
    flag.or(env.filter(|s| !s.trim().is_empty()))
        .map(str::to_string)
        .or_else(|| context.map(|ctx| ctx.server_url.clone()))
        .unwrap_or_else(|| redcrawl_client::config::DEFAULT_API_URL.to_string())
}

fn client_config(flag: Option<&str>, config: &Config) -> Result<ClientConfig> {
    client_config_from(flag, config, |key| std::env::var(key).ok())
}

/// Only the winning URL is validated, so a bad `REDCRAWL_API_URL` does not
/// get in the way of `--server-url`.
fn client_config_from(
    flag: Option<&str>,
    config: &Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ClientConfig> {
    let env_url = lookup("REDCRAWL_API_URL");
    let url = resolve_server_url(
        flag,
        env_url.as_deref(),
        config.get_current_context().map(|(_, ctx)| ctx),
    );
    Ok(ClientConfig::new(&url)?.with_timeout(ClientConfig::timeout_from_env()))
}

async fn require_user(session: &Session) -> Result<User> {
    session.start().await;
    match session.guard() {
        RouteDecision::Allow(user) => Ok(user),
        RouteDecision::Pending | RouteDecision::RedirectToLogin => {
            bail!("Not logged in. Run 'redcrawl auth login' to sign in.")
        }
    }
}

fn handle_context_command(config: &mut Config, command: ContextCommand) -> Result<()> {
    match command {
        ContextCommand::Add {
            name,
            server_url,
            set_current,
        } => {
            let server_url = ClientConfig::new(&server_url)?.base_url;
            config.contexts.insert(name.clone(), Context::new(server_url));
            if set_current || config.current_context.is_none() {
                config.current_context = Some(name.clone());
            }
            config.save()?;
            println!("Context '{}' added.", name);
            if config.current_context.as_ref() == Some(&name) {
                println!("Context '{}' is now the current context.", name);
            }
        }
        ContextCommand::List => {
            println!("  {:<15} {:<40} {:<10}", "NAME", "SERVER URL", "LOGGED IN");
            for (name, ctx) in &config.contexts {
                let current_mark = if config.current_context.as_ref() == Some(name) {
                    "*"
                } else {
                    " "
                };
                let logged_in = if ctx.is_logged_in() { "yes" } else { "no" };
                println!("{} {:<15} {:<40} {:<10}", current_mark, name, ctx.server_url, logged_in);
            }
        }
        ContextCommand::Use { name } => {
            if !config.contexts.contains_key(&name) {
                bail!("Context '{}' not found.", name);
            }
            config.current_context = Some(name.clone());
            config.save()?;
            println!("Switched to context '{}'.", name);
        }
        ContextCommand::Delete { name } => {
            if config.contexts.remove(&name).is_none() {
                bail!("Context '{}' not found.", name);
            }
            if config.current_context.as_ref() == Some(&name) {
                config.current_context = None;
            }
            config.save()?;
            println!("Context '{}' deleted.", name);
        }
        ContextCommand::Current => {
            if let Some((name, ctx)) = config.get_current_context() {
                println!("Current context: {}", name);
                println!("  Server URL: {}", ctx.server_url);
                println!("  Logged in:  {}", if ctx.is_logged_in() { "yes" } else { "no" });
            } else {
                println!("No current context set.");
            }
        }
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Password from the flag, then the environment. `None` means prompt.
fn supplied_password(flag: Option<String>, env: Option<String>) -> Option<String> {
    flag.or(env).filter(|p| !p.is_empty())
}

fn read_password(label: &str) -> Result<String> {
    Ok(rpassword::prompt_password_stderr(label)?)
}

fn print_user(user: &User) {
    println!("Username: {}", user.username);
    println!("Email:    {}", user.email);
    println!("Verified: {}", if user.is_verified { "yes" } else { "no" });
    if user.is_admin {
        println!("Role:     admin");
    }
}

async fn handle_auth_command(
    session: &Session,
    tokens: &ContextTokenStore,
    command: AuthCommand,
    json: bool,
) -> Result<()> {
    match command {
        AuthCommand::Login { username, password } => {
            let username = match username {
                Some(u) => u,
                None => prompt("Username: ")?,
            };
            let password = match supplied_password(password, std::env::var("REDCRAWL_PASSWORD").ok()) {
                Some(p) => p,
                None => read_password("Password: ")?,
            };
            if tokens.context_name().is_none() {
                eprintln!(
                    "No current context; credentials will not be saved. Use 'redcrawl context add' first."
                );
            }

            let user = session
                .login(&username, &password)
                .await
                .context("Login failed")?;
            match user {
                Some(user) => println!("Logged in as {} ({}).", user.username, user.email),
                None => println!("Logged in, but the user profile could not be loaded."),
            }
        }
        AuthCommand::Logout => {
            session.logout();
            println!("Logged out.");
        }
        AuthCommand::Whoami => {
            let user = require_user(session).await?;
            if json {
                output::print_json(&user)?;
            } else {
                print_user(&user);
            }
        }
        AuthCommand::Register { username, email } => {
            let password = match supplied_password(None, std::env::var("REDCRAWL_PASSWORD").ok()) {
                Some(p) => p,
                None => {
                    let first = read_password("Password: ")?;
                    let second = read_password("Confirm password: ")?;
                    if first != second {
                        bail!("Passwords do not match.");
                    }
                    first
                }
            };
            let message = session
                .client()
                .auth()
                .register(&RegisterRequest {
                    username,
                    email,
                    password,
                })
                .await
                .context("Registration failed")?;
            println!("{}", message.message);
        }
    }
    Ok(())
}

/// Listing failures replace the table with a message on stderr and a non-zero exit.
fn load_failed(what: &str, err: ClientError) -> anyhow::Error {
    anyhow::Error::new(err).context(format!("Failed to load {}", what))
}

async fn handle_source_command(client: &ApiClient, command: SourceCommand, json: bool) -> Result<()> {
    let sources = client.sources();
    match command {
        SourceCommand::List { limit, offset } => {
            let page = match sources.list(Pagination::limit_offset(limit, offset)).await {
                Ok(page) => page,
                Err(e) => {
                    return Err(load_failed("sources", e));
                }
            };
            if json {
                return output::print_json(&page.items);
            }
            if page.is_empty() {
                println!("No sources found.");
                return Ok(());
            }
            println!(
                "{:<6} {:<30} {:<5} {:<40} {:<9} {:<6} {}",
                "ID", "NAME", "KIND", "BASE URL", "ROBOTS", "RATE", "ENABLED"
            );
            for s in page.iter() {
                println!(
                    "{:<6} {:<30} {:<5} {:<40} {:<9} {:<6} {}",
                    s.id,
                    output::truncate(&s.name, 30),
                    s.kind,
                    output::truncate(&s.base_url, 40),
                    s.robots_mode,
                    s.rate_limit,
                    if s.enabled { "yes" } else { "no" }
                );
            }
        }
        SourceCommand::Get { id } => {
            let s = sources.get(id).await?;
            if json {
                return output::print_json(&s);
            }
            println!("Source {}", s.id);
            println!("  Name:        {}", s.name);
            println!("  Kind:        {}", s.kind);
            println!("  Base URL:    {}", s.base_url);
            println!("  Auth ref:    {}", output::optional(s.auth_ref.as_deref()));
            println!("  Robots mode: {}", s.robots_mode);
            println!("  Rate limit:  {}/min", s.rate_limit);
            println!("  Enabled:     {}", if s.enabled { "yes" } else { "no" });
            println!("  Created:     {}", output::timestamp(s.created_at.as_deref()));
            println!("  Updated:     {}", output::timestamp(s.updated_at.as_deref()));
        }
        SourceCommand::Create {
            name,
            kind,
            base_url,
            auth_ref,
            robots_mode,
            rate_limit,
            disabled,
        } => {
            let form = SourceForm {
                name,
                kind,
                base_url,
                auth_ref,
                robots_mode,
                rate_limit,
                enabled: Some(!disabled),
            };
            let request = form.validate().map_err(ClientError::from)?;
            let created = sources.create(&request).await?;
            if json {
                return output::print_json(&created);
            }
            println!("Source '{}' created with id {}.", created.name, created.id);
        }
        SourceCommand::Update {
            id,
            name,
            kind,
            base_url,
            auth_ref,
            robots_mode,
            rate_limit,
            enabled,
        } => {
            let patch = SourcePatch {
                name,
                kind,
                base_url,
                auth_ref,
                robots_mode,
                rate_limit,
                enabled,
            };
            let request = patch.validate().map_err(ClientError::from)?;
            let updated = sources.update(id, &request).await?;
            if json {
                return output::print_json(&updated);
            }
            println!("Source {} updated.", updated.id);
        }
        SourceCommand::Delete { id } => {
            sources.delete(id).await?;
            println!("Source {} deleted.", id);
        }
    }
    Ok(())
}

async fn handle_subscription_command(
    client: &ApiClient,
    command: SubscriptionCommand,
    json: bool,
) -> Result<()> {
    let subscriptions = client.subscriptions();
    match command {
        SubscriptionCommand::List {
            status,
            limit,
            offset,
        } => {
            let page = match subscriptions
                .list(status.as_deref(), Pagination::limit_offset(limit, offset))
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    return Err(load_failed("subscriptions", e));
                }
            };
            if json {
                return output::print_json(&page.items);
            }
            if page.is_empty() {
                println!("No subscriptions found.");
                return Ok(());
            }
            println!(
                "{:<6} {:<20} {:<10} {:<20} {:<20}",
                "ID", "SCHEDULE", "STATUS", "LAST RUN", "NEXT RUN"
            );
            for s in page.iter() {
                println!(
                    "{:<6} {:<20} {:<10} {:<20} {:<20}",
                    s.id,
                    s.schedule,
                    s.status,
                    output::timestamp(s.last_run_at.as_deref()),
                    output::timestamp(s.next_run_at.as_deref())
                );
            }
        }
        SubscriptionCommand::Get { id } => {
            let s = subscriptions.get(id).await?;
            if json {
                return output::print_json(&s);
            }
            println!("Subscription {}", s.id);
            println!("  Source:       {}", s.source_id);
            println!("  Jurisdiction: {}", s.jurisdiction);
            println!("  Schedule:     {}", s.schedule);
            println!("  Status:       {}", s.status);
            println!("  Last run:     {}", output::timestamp(s.last_run_at.as_deref()));
            println!("  Next run:     {}", output::timestamp(s.next_run_at.as_deref()));
            println!("  Selectors:    {}", serde_json::to_string(&s.selectors)?);
        }
        SubscriptionCommand::Create {
            source_id,
            jurisdiction,
            schedule,
            status,
            selectors,
        } => {
            let form = SubscriptionForm {
                source_id,
                jurisdiction,
                schedule,
                status,
                selectors,
            };
            let request = form.validate().map_err(ClientError::from)?;
            let created = subscriptions.create(&request).await?;
            if json {
                return output::print_json(&created);
            }
            println!(
                "Subscription {} created ({}, next run {}).",
                created.id,
                created.status,
                output::timestamp(created.next_run_at.as_deref())
            );
        }
        SubscriptionCommand::Enable { id } => {
            let s = subscriptions.enable(id).await?;
            println!("Subscription {} is now {}.", s.id, s.status);
        }
        SubscriptionCommand::Disable { id } => {
            let s = subscriptions.disable(id).await?;
            println!("Subscription {} is now {}.", s.id, s.status);
        }
        SubscriptionCommand::Run { id } => {
            let outcome = subscriptions.run_now(id).await?;
            if json {
                return output::print_json(&outcome);
            }
            println!("Run requested for subscription {}.", id);
        }
    }
    Ok(())
}

fn check_batch(batch_size: u32) -> Result<u32> {
    if batch_size == 0 || batch_size > MAX_BATCH {
        bail!("Batch size must be between 1 and {}", MAX_BATCH);
    }
    Ok(batch_size)
}

async fn handle_scheduling_command(
    client: &ApiClient,
    command: SchedulingCommand,
    json: bool,
) -> Result<()> {
    let scheduling = client.scheduling();
    match command {
        SchedulingCommand::Tick { batch_size } => {
            let result = scheduling.tick(check_batch(batch_size)?).await?;
            if json {
                return output::print_json(&result);
            }
            println!("Processed {} due subscription(s).", result.processed);
        }
        SchedulingCommand::ComputeNext { batch_size } => {
            let result = scheduling.compute_next(check_batch(batch_size)?).await?;
            if json {
                return output::print_json(&result);
            }
            println!("Updated next run time for {} subscription(s).", result.updated);
        }
        SchedulingCommand::Dispatch { batch_size } => {
            let result = scheduling.dispatch_outbox(check_batch(batch_size)?).await?;
            if json {
                return output::print_json(&result);
            }
            println!("Published {} outbox entr(ies).", result.published);
        }
        SchedulingCommand::Runs { limit, offset } => {
            let page = match scheduling.runs(Pagination::limit_offset(limit, offset)).await {
                Ok(page) => page,
                Err(e) => {
                    return Err(load_failed("runs", e));
                }
            };
            if json {
                return output::print_json(&page.items);
            }
            if page.is_empty() {
                println!("No runs");
                return Ok(());
            }
            println!(
                "{:<8} {:<12} {:<12} {:<13} {:<20} {:<20}",
                "ID", "RUN KIND", "STATUS", "SUBSCRIPTION", "STARTED", "ENDED"
            );
            for r in page.iter() {
                println!(
                    "{:<8} {:<12} {:<12} {:<13} {:<20} {:<20}",
                    r.id,
                    r.run_kind,
                    r.status,
                    output::optional(r.subscription_id),
                    output::timestamp(r.started_at.as_deref()),
                    output::timestamp(r.ended_at.as_deref())
                );
            }
        }
        SchedulingCommand::Outbox {
            status,
            limit,
            offset,
        } => {
            let page = match scheduling
                .outbox(status.as_deref(), Pagination::limit_offset(limit, offset))
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    return Err(load_failed("outbox", e));
                }
            };
            if json {
                return output::print_json(&page.items);
            }
            if page.is_empty() {
                println!("No outbox entries");
                return Ok(());
            }
            println!(
                "{:<8} {:<32} {:<10} {:<20} {:<8}",
                "ID", "EVENT TYPE", "STATUS", "CREATED AT", "ATTEMPTS"
            );
            for o in page.iter() {
                println!(
                    "{:<8} {:<32} {:<10} {:<20} {:<8}",
                    o.id,
                    output::truncate(&o.event_type, 32),
                    o.status,
                    output::timestamp(o.created_at.as_deref()),
                    o.attempts
                );
            }
        }
    }
    Ok(())
}

async fn handle_document_command(client: &ApiClient, command: DocumentCommand, json: bool) -> Result<()> {
    let documents = client.documents();
    match command {
        DocumentCommand::List {
            skip,
            limit,
            source_id,
            language,
            with_versions,
        } => {
            let page = Pagination::skip_limit(skip, limit);
            if with_versions {
                let details = match documents.list_with_versions(page).await {
                    Ok(details) => details,
                    Err(e) => {
                        return Err(load_failed("documents", e));
                    }
                };
                if json {
                    return output::print_json(&details);
                }
                for d in details.iter() {
                    println!(
                        "{:<6} {:<60} {} version(s)",
                        d.document.id,
                        output::truncate(&d.document.source_url, 60),
                        d.version_count
                    );
                }
                print_range(skip, details.len(), details.total);
                return Ok(());
            }

            let filter = DocumentFilter {
                source_id,
                language,
            };
            let docs = match documents.list(page, &filter).await {
                Ok(docs) => docs,
                Err(e) => {
                    return Err(load_failed("documents", e));
                }
            };
            if json {
                return output::print_json(&docs);
            }
            if docs.is_empty() {
                println!("No documents found.");
                return Ok(());
            }
            println!(
                "{:<6} {:<8} {:<60} {:<5} {:<12} {:<20}",
                "ID", "SOURCE", "URL", "LANG", "PUBLISHED", "UPDATED"
            );
            for d in docs.iter() {
                println!(
                    "{:<6} {:<8} {:<60} {:<5} {:<12} {:<20}",
                    d.id,
                    d.source_id,
                    output::truncate(&d.source_url, 60),
                    d.language,
                    output::optional(d.published_date.as_deref()),
                    output::timestamp(Some(&d.updated_at))
                );
            }
            print_range(skip, docs.len(), docs.total);
        }
        DocumentCommand::Get { id } => {
            let d = documents.get(id).await?;
            if json {
                return output::print_json(&d);
            }
            print_document(&d);
        }
        DocumentCommand::ByUrl { url } => {
            let d = documents.by_url(&url).await?;
            if json {
                return output::print_json(&d);
            }
            print_document(&d);
        }
        DocumentCommand::Versions { id } => {
            let detail = documents.versions(id).await?;
            if json {
                return output::print_json(&detail);
            }
            print_document(&detail.document);
            println!();
            if detail.versions.is_empty() {
                println!("No versions");
                return Ok(());
            }
            println!("{:<8} {:<9} {:<20} {}", "VERSION", "HASH", "CREATED", "DIFF");
            for v in &detail.versions {
                println!(
                    "{:<8} {:<9} {:<20} {}",
                    v.id,
                    output::short_hash(&v.content_hash),
                    output::timestamp(Some(&v.created_at)),
                    output::optional(v.diff_uri.as_deref())
                );
            }
        }
        DocumentCommand::Parsed { id, version } => {
            let parsed = documents.parsed(id, version).await?;
            if json {
                return output::print_json(&parsed);
            }
            println!("{}", parsed.source_url);
            println!(
                "Language: {}  Fetched: {}  Sections: {}  Bytes: {}",
                parsed.language,
                output::timestamp(Some(&parsed.fetch_timestamp)),
                parsed.sections.len(),
                parsed.total_bytes()
            );
            for section in &parsed.sections {
                let indent = "  ".repeat(section.level.saturating_sub(1) as usize);
                println!();
                println!("{}H{} {}", indent, section.level, section.heading);
                println!("{}  {}", indent, output::truncate(section.text.trim(), 100));
                if !section.tables.is_empty() {
                    println!("{}  ({} table(s))", indent, section.tables.len());
                }
            }
        }
        DocumentCommand::Audit { id, version } => {
            let events = documents.audit_trail(id, version).await?;
            if json {
                return output::print_json(&events);
            }
            if events.is_empty() {
                println!("No audit trail events for this version");
                return Ok(());
            }
            for event in &events {
                println!(
                    "[{:<7}] {:<28} {}",
                    event.timeline_status(),
                    event.title(),
                    output::timestamp(Some(&event.timestamp))
                );
                println!("          Event ID: {}  Status: {}", event.event_id, event.status);
                if let Some(run_id) = event.run_id {
                    println!(
                        "          Run: {} ({})",
                        run_id,
                        output::optional(event.run_kind.as_deref())
                    );
                }
                if let Some(version_id) = event.version_id {
                    println!(
                        "          Version: {}  Hash: {}",
                        version_id,
                        event.content_hash.as_deref().map(output::short_hash).unwrap_or("-")
                    );
                }
                for uri in &event.artifact_uris {
                    println!("          Artifact: {}", uri);
                }
                if let Some(error) = &event.error {
                    println!("          Error: {}", error);
                }
            }
        }
    }
    Ok(())
}

fn print_document(d: &redcrawl_client::api::Document) {
    println!("Document {}", d.id);
    println!("  Source:    {}", d.source_id);
    println!("  URL:       {}", d.source_url);
    println!("  Language:  {}", d.language);
    println!("  Published: {}", output::optional(d.published_date.as_deref()));
    println!("  Created:   {}", output::timestamp(Some(&d.created_at)));
    println!("  Updated:   {}", output::timestamp(Some(&d.updated_at)));
}

fn print_range(skip: u32, shown: usize, total: Option<u64>) {
    if shown == 0 {
        return;
    }
    let first = u64::from(skip) + 1;
    let last = u64::from(skip) + shown as u64;
    match total {
        Some(total) => println!("\nShowing {}-{} of {}", first, last, total),
        None => println!("\nShowing {}-{}", first, last),
    }
}
