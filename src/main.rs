// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `kieru` command-line client.
//!
//! # Usage
//!
//! ```bash
//! # Share a text secret that burns after one view
//! kieru create --name "wifi" --text "hunter2" --max-views 1
//!
//! # Share an image (paid plans)
//! kieru --plan EXPLORER create --name "scan" --image ./scan.png
//!
//! # Open a link; Ctrl-C burns the secret
//! kieru view "https://kieru.example/view/abc123#<key>"
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

use kieru_client::client::SecretApi;
use kieru_client::config::{self, ClientConfig, APP_ORIGIN_ENV, API_BASE_URL_ENV};
use kieru_client::creation::{
    CreationSettings, DraftContent, PlanTier, SecretCreator, SecretDraft,
};
use kieru_client::crypto::ContentPayload;
use kieru_client::logging;
use kieru_client::request::{
    ConfirmationError, ConfirmationPort, ConfirmationPrompt, MemoryCredentialStore,
    RequestCoordinator, ReqwestTransport, TimedConfirmation,
};
use kieru_client::retrieval::{
    LinkInput, Remaining, RetrievalSession, RetrievalState, SessionConfig, TickOutcome,
    INCORRECT_PASSWORD_MESSAGE,
};
use kieru_client::{Error, Result};

/// End-to-end encrypted, burn-after-reading secrets
#[derive(Parser, Debug)]
#[command(name = "kieru")]
#[command(version)]
struct Cli {
    /// API base URL (overrides KIERU_API_BASE_URL)
    #[arg(long)]
    api_base_url: Option<String>,

    /// Origin used in share links (overrides KIERU_APP_ORIGIN)
    #[arg(long)]
    origin: Option<String>,

    /// Plan tier for local limit checks (overrides KIERU_PLAN)
    #[arg(long)]
    plan: Option<PlanTier>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encrypt content and print a share link
    Create(CreateArgs),
    /// Open a share link, show the content, then burn it
    View(ViewArgs),
}

#[derive(Args, Debug)]
#[command(group = clap::ArgGroup::new("content").required(true))]
struct CreateArgs {
    /// Display name of the secret (max 30 characters)
    #[arg(long)]
    name: String,

    /// Secret text
    #[arg(long, group = "content")]
    text: Option<String>,

    /// Read the secret text from a file
    #[arg(long, group = "content")]
    text_file: Option<PathBuf>,

    /// Share an image file
    #[arg(long, group = "content")]
    image: Option<PathBuf>,

    /// Number of views before the secret is destroyed
    #[arg(long)]
    max_views: Option<u32>,

    /// Password required to open the secret
    #[arg(long)]
    password: Option<String>,

    /// Seconds the content stays visible once opened
    #[arg(long)]
    view_time: Option<u32>,

    /// Hours until the secret expires (minimum 1)
    #[arg(long)]
    expires_in_hours: Option<u32>,

    /// Hide the countdown from the viewer
    #[arg(long)]
    no_time_bomb: bool,

    /// Skip fetching plan limits from the server
    #[arg(long)]
    offline_limits: bool,
}

#[derive(Args, Debug)]
struct ViewArgs {
    /// Full share link, including the `#key` fragment
    link: String,

    /// Password, if the secret is protected
    #[arg(long)]
    password: Option<String>,

    /// Write the content to this file instead of stdout (required for images)
    #[arg(long)]
    out: Option<PathBuf>,
}

/// Asks duplicate-request questions on the terminal.
struct TerminalConfirmation;

#[async_trait]
impl ConfirmationPort for TerminalConfirmation {
    async fn confirm(
        &self,
        prompt: &ConfirmationPrompt,
    ) -> std::result::Result<bool, ConfirmationError> {
        let question = format!(
            "{} [{}/{}] ",
            prompt.message, prompt.confirm_label, prompt.reject_label
        );
        let answer = read_line(&question)
            .await
            .map_err(|e| ConfirmationError::Failed(e.to_string()))?;
        let answer = answer.trim().to_ascii_lowercase();
        Ok(answer == "y"
            || answer == "yes"
            || answer == prompt.confirm_label.to_ascii_lowercase())
    }
}

async fn read_line(prompt: &str) -> std::io::Result<String> {
    let prompt = prompt.to_string();
    tokio::task::spawn_blocking(move || {
        let mut stderr = std::io::stderr();
        stderr.write_all(prompt.as_bytes())?;
        stderr.flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    })
    .await
    .map_err(std::io::Error::other)?
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &cli.api_base_url {
        config.api_base_url = config::parse_url(API_BASE_URL_ENV, url)?;
    }
    if let Some(origin) = &cli.origin {
        config.app_origin = config::parse_url(APP_ORIGIN_ENV, origin)?;
    }
    if let Some(plan) = cli.plan {
        config.plan = plan;
    }
    Ok(config)
}

fn build_api(config: &ClientConfig) -> Result<SecretApi> {
    let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
    let credentials = Arc::new(match &config.auth_token {
        Some(token) => MemoryCredentialStore::with_token(token.as_str()),
        None => MemoryCredentialStore::new(),
    });
    let confirmation = Arc::new(TimedConfirmation::new(
        TerminalConfirmation,
        config.confirm_timeout,
    ));
    let coordinator = Arc::new(RequestCoordinator::new(
        config.api_base_url.clone(),
        transport,
        credentials,
        confirmation,
    ));
    Ok(SecretApi::new(coordinator, config.routes.clone()))
}

async fn create(config: &ClientConfig, api: SecretApi, args: CreateArgs) -> Result<()> {
    let content = match (args.text, args.text_file, args.image) {
        (Some(text), _, _) => DraftContent::text(text),
        (_, Some(path), _) => DraftContent::text(std::fs::read_to_string(path)?),
        (_, _, Some(path)) => DraftContent::image_from_path(&path)?,
        (None, None, None) => {
            return Err(Error::Creation(
                kieru_client::creation::CreationError::EmptyContent,
            ))
        }
    };
    let draft = SecretDraft::new(args.name, content);

    let customised = args.max_views.is_some()
        || args.password.is_some()
        || args.view_time.is_some()
        || args.expires_in_hours.is_some()
        || args.no_time_bomb;
    let settings = customised.then(|| {
        let defaults = CreationSettings::default();
        let mut settings = CreationSettings {
            max_views: args.max_views.unwrap_or(defaults.max_views),
            view_time_seconds: args.view_time.unwrap_or(defaults.view_time_seconds),
            show_time_bomb: !args.no_time_bomb,
            expires_at: args
                .expires_in_hours
                .map(|h| Utc::now() + chrono::Duration::hours(i64::from(h)))
                .unwrap_or(defaults.expires_at),
            ..defaults
        };
        if let Some(password) = &args.password {
            settings = settings.with_password(password.as_str());
        }
        settings
    });

    let mut creator = SecretCreator::new(api, config.app_origin.clone(), config.plan);
    if !args.offline_limits {
        creator.refresh_limits().await;
    }

    let created = creator.create(&draft, settings.as_ref()).await?;
    info!(secret_id = %created.secret_id, "Secret created");
    println!("{}", created.link());
    Ok(())
}

async fn view(config: &ClientConfig, api: SecretApi, args: ViewArgs) -> Result<()> {
    let session = RetrievalSession::with_config(
        api,
        SessionConfig {
            step_timeout: Some(config.request_timeout + Duration::from_secs(5)),
            ..SessionConfig::default()
        },
    );

    let mut password = args.password;
    let mut state = session.open(LinkInput::Pasted(args.link)).await;
    while let RetrievalState::PasswordRequired { incorrect_password } = state {
        if incorrect_password {
            eprintln!("{INCORRECT_PASSWORD_MESSAGE}");
        }
        let attempt = match password.take() {
            Some(p) => p,
            None => read_line("Password: ").await?,
        };
        if attempt.trim().is_empty() {
            session.close();
            eprintln!("No password entered.");
            return Ok(());
        }
        state = session.submit_password(attempt).await;
    }

    let snapshot = session.snapshot();
    match &state {
        RetrievalState::Viewing => {}
        RetrievalState::Failed(reason) => return Err(Error::Retrieval(reason.clone())),
        other => {
            debug!(state = %other, "Retrieval ended without content");
            return Ok(());
        }
    }

    if let Some(name) = &snapshot.secret_name {
        eprintln!("Secret: {name}");
    }
    let Some(payload) = session.view(ContentPayload::clone) else {
        return Ok(());
    };
    let shown = show(&payload, args.out.as_deref());
    drop(payload);
    if let Err(e) = shown {
        session.burn();
        return Err(e);
    }

    let cause = wait_for_burn(&session, snapshot.show_time_bomb).await;
    if let Some(cause) = cause {
        eprintln!("\n{}", cause.user_message());
    }
    Ok(())
}

fn show(payload: &ContentPayload, out: Option<&std::path::Path>) -> Result<()> {
    match (payload, out) {
        (ContentPayload::Text { body }, None) => {
            println!("{}", body.as_str());
            Ok(())
        }
        (ContentPayload::Text { body }, Some(path)) => {
            std::fs::write(path, body.as_bytes())?;
            eprintln!("Wrote text to {}", path.display());
            Ok(())
        }
        (ContentPayload::Image { .. }, Some(path)) => {
            let bytes = payload
                .image_bytes()
                .ok_or(Error::Decryption(kieru_client::crypto::DecryptionError))?;
            std::fs::write(path, bytes)?;
            eprintln!("Wrote image to {}", path.display());
            Ok(())
        }
        (ContentPayload::Image { filename, .. }, None) => Err(Error::Io(std::io::Error::other(
            format!("image {filename:?} needs --out"),
        ))),
    }
}

/// Tick until the countdown or Ctrl-C burns the secret.
async fn wait_for_burn(
    session: &RetrievalSession,
    show_countdown: bool,
) -> Option<kieru_client::retrieval::BurnCause> {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.tick().await;
    eprintln!("Press Ctrl-C to burn.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                session.burn();
                break;
            }
            _ = interval.tick() => match session.tick() {
                TickOutcome::Remaining(left) if show_countdown => {
                    eprint!("\rBurns in {:>8}", Remaining(left).to_string());
                }
                TickOutcome::Remaining(_) | TickOutcome::Idle => {}
                TickOutcome::Burned => break,
            },
        }
        if !matches!(session.state(), RetrievalState::Viewing) {
            break;
        }
    }

    match session.state() {
        RetrievalState::Burned(cause) => Some(cause),
        _ => None,
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    logging::init(config.log_format);
    debug!(api = %config.api_base_url, plan = %config.plan, "Configuration loaded");

    let api = build_api(&config)?;
    match cli.command {
        Command::Create(args) => create(&config, api, args).await,
        Command::View(args) => view(&config, api, args).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_aborted() => {
            eprintln!("Cancelled.");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
