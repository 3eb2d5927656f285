use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use client::ApiClient;
use client::models::{LoginData, RegisterData, Role};
use presence::notice::NoticeBoard;
use presence::presenter::Presenter;
use presence::reconciler::AttendanceReconciler;
use presence::refresh::RefreshPolicy;
use presence::{DecodedPayload, SubmitOutcome};
use std::sync::Arc;
use tracing_appender::rolling;
use util::config::AppConfig;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RoleArg {
    Student,
    Teacher,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Student => Role::Student,
            RoleArg::Teacher => Role::Teacher,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Rotating-code attendance client")]
struct Args {
    /// Issuer API base URL (overrides API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Also write logs to stdout
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and remember the bearer token
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and remember the bearer token
    Register {
        name: String,
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, value_enum, default_value_t = RoleArg::Student)]
        role: RoleArg,
    },
    /// Forget the stored token
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List sessions
    Sessions,
    /// Display a session's code and keep rotating it until Ctrl-C
    Present {
        /// Session id or human-facing session code
        session: String,
    },
    /// Submit a decoded code payload
    Mark {
        payload: String,
        /// Session the payload was scanned for
        #[arg(long)]
        session: Option<String>,
    },
    /// Check whether you are marked present in a session
    Check { session: String },
    /// List your attendance history
    History,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(url) = &args.api_url {
        AppConfig::set_api_url(url.clone());
    }
    if args.verbose {
        AppConfig::set_log_to_stdout(true);
    }
    let config = AppConfig::global().clone();
    let _log_guard = init_logging(&config);

    let api = ApiClient::from_config(&config).context("failed to set up the issuer client")?;
    tracing::debug!(api = %api.base_url(), env = %config.env, "client ready");

    match args.command {
        Command::Login { email, password } => {
            let resp = api.login(&LoginData { email, password }).await?;
            match resp.user {
                Some(user) => println!("Logged in as {} ({:?})", user.name, user.role),
                None => bail!("login response carried no user"),
            }
        }
        Command::Register {
            name,
            email,
            password,
            role,
        } => {
            let data = RegisterData {
                name,
                email,
                password,
                role: role.into(),
            };
            let resp = api.register(&data).await?;
            println!("{}", resp.message.unwrap_or_else(|| "Registered".into()));
        }
        Command::Logout => {
            api.logout()?;
            println!("Logged out");
        }
        Command::Whoami => {
            let user = api.me().await.context("not logged in?")?;
            println!("{} <{}> ({:?})", user.name, user.email, user.role);
        }
        Command::Sessions => list_sessions(&api).await?,
        Command::Present { session } => present(&config, api, &session).await?,
        Command::Mark { payload, session } => mark(&config, api, payload, session).await?,
        Command::Check { session } => {
            let attended = api
                .check_attendance(&session)
                .await
                .with_context(|| format!("failed to check session {session}"))?;
            if attended {
                println!("Present in {session}");
            } else {
                println!("Not marked present in {session}");
            }
        }
        Command::History => {
            let records = api.my_attendance().await?;
            if records.is_empty() {
                println!("No attendance recorded yet");
            }
            for r in records {
                println!(
                    "{}  {:<24} {} {}-{}  {}",
                    r.scanned_at, r.subject, r.date, r.start_time, r.end_time, r.status
                );
            }
        }
    }
    Ok(())
}

async fn list_sessions(api: &ApiClient) -> Result<()> {
    let sessions = api.list_sessions().await.context("failed to load sessions")?;
    if sessions.is_empty() {
        println!("No sessions");
    }
    for s in sessions {
        println!(
            "{:<26} {:<12} {:<24} {} {}-{}  {:>4} present{}",
            s.id,
            s.session_id,
            s.subject,
            s.date,
            s.start_time,
            s.end_time,
            s.attendance_count,
            if s.is_active { "" } else { "  (inactive)" }
        );
    }
    Ok(())
}

async fn present(config: &AppConfig, api: ApiClient, session: &str) -> Result<()> {
    warn_if_unreachable(config).await;

    let api = Arc::new(api);
    let mut presenter = Presenter::new(api.clone(), api, RefreshPolicy::from_config(config));
    presenter.reload().await.context("failed to load sessions")?;
    let shown = presenter
        .open_display_by_id(session)
        .await
        .with_context(|| format!("cannot present session {session}"))?;

    println!(
        "Presenting {} ({}); code rotates every {} ms. Ctrl-C to stop.",
        shown.subject, shown.session_id, config.qr_refresh_ms
    );
    println!("{}", shown.code.as_str());

    let mut display = presenter.watch_display();
    let mut status = presenter.refresh_status();
    let mut reported_failures = 0;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = display.changed() => {
                if changed.is_err() {
                    break;
                }
                let Some(current) = display.borrow_and_update().clone() else {
                    break;
                };
                println!("{}", current.code.as_str());
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let failures = status.borrow_and_update().consecutive_failures;
                if failures != reported_failures && failures > 0 {
                    eprintln!("code refresh failing ({failures} in a row); keeping the last code");
                }
                reported_failures = failures;
            }
        }
    }

    presenter.close_display();
    println!("Display closed");
    Ok(())
}

async fn mark(
    config: &AppConfig,
    api: ApiClient,
    payload: String,
    session: Option<String>,
) -> Result<()> {
    warn_if_unreachable(config).await;

    let reconciler = AttendanceReconciler::new(Arc::new(api), NoticeBoard::new(config.notice_ttl()));
    let outcome = reconciler
        .submit(session.as_deref(), DecodedPayload::new(payload))
        .await;
    if let Some(notice) = reconciler.notices().current() {
        println!("{}", notice.text);
    }
    match outcome {
        SubmitOutcome::Marked | SubmitOutcome::AlreadyMarked => Ok(()),
        SubmitOutcome::Invalid(message) => bail!("code rejected: {message}"),
        SubmitOutcome::NetworkError(message) => bail!("verifier unreachable: {message}"),
    }
}

async fn warn_if_unreachable(config: &AppConfig) {
    match util::http::is_url_alive(&config.api_url, config.request_timeout_secs).await {
        Ok(true) => {}
        Ok(false) => tracing::warn!(url = %config.api_url, "issuer answered with an error status"),
        Err(e) => tracing::warn!(url = %config.api_url, error = %e, "issuer unreachable"),
    }
}

fn init_logging(config: &AppConfig) -> tracing_appender::non_blocking::WorkerGuard {
    use std::fs;
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    fs::create_dir_all("logs").ok();

    let file_appender = rolling::daily("logs", &config.log_file);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(true)
        .with_thread_ids(true);

    let env_filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("attend=info"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    if config.log_to_stdout {
        registry.with(stdout_layer).init();
    } else {
        registry.init();
    }

    guard
}
