use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use magpie_gateway::DEFAULT_API_BASE;

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum CliAuthMode {
    Token,
    PasswordSession,
    LocalhostDev,
}

#[derive(Debug, Parser)]
#[command(
    name = "magpie-bot",
    about = "Guild chat bot with custom commands, an activity log, and an operator dashboard",
    version
)]
/// Public struct `Cli` used across Magpie components.
pub(crate) struct Cli {
    #[arg(
        long = "data-dir",
        env = "MAGPIE_DATA_DIR",
        default_value = "data",
        help = "Directory holding the command store, event logs, and connector state"
    )]
    pub(crate) data_dir: PathBuf,

    #[arg(
        long = "discord-token",
        env = "MAGPIE_DISCORD_TOKEN",
        help = "Bot token; without one the process serves the dashboard only"
    )]
    pub(crate) discord_token: Option<String>,

    #[arg(
        long = "application-id",
        env = "MAGPIE_APPLICATION_ID",
        help = "Application id used for slash-command registry calls"
    )]
    pub(crate) application_id: Option<String>,

    #[arg(
        long = "api-base",
        env = "MAGPIE_API_BASE",
        default_value = DEFAULT_API_BASE,
        help = "Base URL for the Discord REST API"
    )]
    pub(crate) api_base: String,

    #[arg(
        long = "poll-channel-ids",
        env = "MAGPIE_POLL_CHANNEL_IDS",
        value_delimiter = ',',
        help = "Channel ids the polling connector ingests, comma separated"
    )]
    pub(crate) poll_channel_ids: Vec<String>,

    #[arg(
        long = "poll-interval-ms",
        env = "MAGPIE_POLL_INTERVAL_MS",
        default_value_t = 2500,
        value_parser = parse_positive_u64,
        help = "Delay between connector poll cycles in milliseconds"
    )]
    pub(crate) poll_interval_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "MAGPIE_RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = parse_positive_usize,
        help = "REST attempts per call before the failure is surfaced"
    )]
    pub(crate) retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "MAGPIE_RETRY_BASE_DELAY_MS",
        default_value_t = 250,
        help = "Base delay for linear REST retry backoff in milliseconds"
    )]
    pub(crate) retry_base_delay_ms: u64,

    #[arg(
        long = "sync-slash-on-start",
        env = "MAGPIE_SYNC_SLASH_ON_START",
        default_value_t = false,
        help = "Overwrite each guild's slash registry with the built-in commands at startup"
    )]
    pub(crate) sync_slash_on_start: bool,

    #[arg(
        long,
        env = "MAGPIE_BIND",
        default_value = "127.0.0.1:3000",
        help = "Dashboard listen address"
    )]
    pub(crate) bind: String,

    #[arg(
        long = "auth-mode",
        env = "MAGPIE_AUTH_MODE",
        value_enum,
        default_value_t = CliAuthMode::LocalhostDev,
        help = "Dashboard auth mode: token, password-session, or localhost-dev"
    )]
    pub(crate) auth_mode: CliAuthMode,

    #[arg(
        long = "auth-token",
        env = "MAGPIE_AUTH_TOKEN",
        help = "Static bearer token accepted in token mode"
    )]
    pub(crate) auth_token: Option<String>,

    #[arg(
        long = "auth-password",
        env = "MAGPIE_AUTH_PASSWORD",
        help = "Password exchanged for session tokens in password-session mode"
    )]
    pub(crate) auth_password: Option<String>,

    #[arg(
        long = "session-ttl-seconds",
        env = "MAGPIE_SESSION_TTL_SECONDS",
        default_value_t = 3600,
        value_parser = parse_positive_u64,
        help = "Lifetime of issued dashboard session tokens in seconds"
    )]
    pub(crate) session_ttl_seconds: u64,

    #[arg(
        long = "rate-limit-window-seconds",
        env = "MAGPIE_RATE_LIMIT_WINDOW_SECONDS",
        default_value_t = 60,
        value_parser = parse_positive_u64,
        help = "Fixed rate-limit window applied per dashboard principal, in seconds"
    )]
    pub(crate) rate_limit_window_seconds: u64,

    #[arg(
        long = "rate-limit-max-requests",
        env = "MAGPIE_RATE_LIMIT_MAX_REQUESTS",
        default_value_t = 120,
        value_parser = parse_positive_usize,
        help = "Requests accepted per principal per rate-limit window"
    )]
    pub(crate) rate_limit_max_requests: usize,

    #[arg(
        long = "interactions-public-key",
        env = "MAGPIE_INTERACTIONS_PUBLIC_KEY",
        help = "Hex-encoded ed25519 public key used to verify interaction webhooks"
    )]
    pub(crate) interactions_public_key: Option<String>,
}
