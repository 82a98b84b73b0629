//! Process wiring: storage, event recorder, REST client, dashboard
//! server, and the polling connector loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::Mutex;
use tokio::task::JoinError;
use tracing::warn;

use magpie_commands::CommandStore;
use magpie_dashboard::{run_dashboard_server, DashboardAuthMode, DashboardConfig, DashboardState};
use magpie_events::{Event, EventRecorder};
use magpie_gateway::{
    sync_builtin_commands, DiscordRestClient, GatewayConnector, GatewayConnectorConfig,
    GatewayStatus, MessagePipeline,
};

use crate::cli_args::{Cli, CliAuthMode};

const COMMAND_STORE_FILE: &str = "custom-commands.json";
const EVENT_LOG_DIR: &str = "logs";
const GATEWAY_STATE_FILE: &str = "gateway-state.json";

fn map_auth_mode(mode: CliAuthMode) -> DashboardAuthMode {
    match mode {
        CliAuthMode::Token => DashboardAuthMode::Token,
        CliAuthMode::PasswordSession => DashboardAuthMode::PasswordSession,
        CliAuthMode::LocalhostDev => DashboardAuthMode::LocalhostDev,
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .map(str::to_string)
}

fn ensure_auth_credentials(
    mode: DashboardAuthMode,
    auth_token: Option<&str>,
    auth_password: Option<&str>,
) -> Result<()> {
    match mode {
        DashboardAuthMode::Token if non_empty(auth_token).is_none() => {
            bail!("--auth-mode=token requires --auth-token");
        }
        DashboardAuthMode::PasswordSession if non_empty(auth_password).is_none() => {
            bail!("--auth-mode=password-session requires --auth-password");
        }
        _ => Ok(()),
    }
}

fn dashboard_exit_result(joined: Result<Result<()>, JoinError>) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(join_error) => bail!("dashboard server task failed: {join_error}"),
    }
}

pub(crate) async fn run(cli: Cli) -> Result<()> {
    std::fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("failed to create {}", cli.data_dir.display()))?;

    let auth_mode = map_auth_mode(cli.auth_mode);
    ensure_auth_credentials(
        auth_mode,
        cli.auth_token.as_deref(),
        cli.auth_password.as_deref(),
    )?;

    let store = Arc::new(Mutex::new(CommandStore::load(
        &cli.data_dir.join(COMMAND_STORE_FILE),
    )?));
    let recorder = Arc::new(Mutex::new(EventRecorder::new(
        &cli.data_dir.join(EVENT_LOG_DIR),
    )?));

    let discord_token = non_empty(cli.discord_token.as_deref());
    let rest = Arc::new(DiscordRestClient::new(
        &cli.api_base,
        discord_token.as_deref().unwrap_or_default(),
        cli.application_id.as_deref(),
        cli.retry_max_attempts,
        cli.retry_base_delay_ms,
    ));
    let pipeline = Arc::new(MessagePipeline::new(
        Arc::clone(&store),
        Arc::clone(&recorder),
        Arc::clone(&rest),
    ));
    let gateway_status = Arc::new(Mutex::new(GatewayStatus::default()));

    {
        let mut recorder = recorder.lock().await;
        recorder.record(Event::info("bot started"));
    }

    let dashboard_config = DashboardConfig {
        bind: cli.bind.clone(),
        auth_mode,
        auth_token: non_empty(cli.auth_token.as_deref()),
        auth_password: non_empty(cli.auth_password.as_deref()),
        session_ttl_seconds: cli.session_ttl_seconds,
        rate_limit_window_seconds: cli.rate_limit_window_seconds,
        rate_limit_max_requests: cli.rate_limit_max_requests,
        interactions_public_key: non_empty(cli.interactions_public_key.as_deref()),
    };
    let dashboard_state = Arc::new(DashboardState::new(
        dashboard_config,
        Arc::clone(&store),
        Arc::clone(&recorder),
        Arc::clone(&gateway_status),
        Arc::clone(&rest),
        Arc::clone(&pipeline),
    ));
    let mut dashboard_task = tokio::spawn(run_dashboard_server(dashboard_state));

    if cli.sync_slash_on_start && discord_token.is_some() {
        match rest.list_guilds().await {
            Ok(guilds) => {
                for guild in &guilds {
                    match sync_builtin_commands(&rest, &guild.id).await {
                        Ok(count) => {
                            println!("slash sync: guild={} commands={}", guild.id, count);
                        }
                        Err(error) => {
                            warn!("slash sync failed for guild {}: {}", guild.id, error);
                        }
                    }
                }
            }
            Err(error) => warn!("slash sync skipped: {error}"),
        }
    }

    let poll_channel_ids: Vec<String> = cli
        .poll_channel_ids
        .iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();

    if discord_token.is_some() && !poll_channel_ids.is_empty() {
        let connector_config = GatewayConnectorConfig {
            state_path: cli.data_dir.join(GATEWAY_STATE_FILE),
            poll_channel_ids,
        };
        let mut connector = GatewayConnector::new(
            connector_config,
            Arc::clone(&rest),
            Arc::clone(&pipeline),
            Arc::clone(&gateway_status),
        )?;
        let poll_interval = Duration::from_millis(cli.poll_interval_ms);
        loop {
            let summary = connector.run_poll_cycle().await;
            if summary.messages_ingested > 0
                || summary.replies_sent > 0
                || summary.transport_failures > 0
            {
                println!(
                    "gateway poll: ingested={} bot_skipped={} replies={} transport_failures={}",
                    summary.messages_ingested,
                    summary.bot_messages_skipped,
                    summary.replies_sent,
                    summary.transport_failures
                );
            }
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    println!("magpie bot shutdown requested");
                    break;
                }
                joined = &mut dashboard_task => {
                    dashboard_exit_result(joined)?;
                    break;
                }
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
    } else {
        warn!("no discord token or poll channels configured: dashboard-only mode");
        // The server task is the only work left; its death ends the process.
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            joined = &mut dashboard_task => {
                dashboard_exit_result(joined)?;
            }
        }
    }

    {
        let mut recorder = recorder.lock().await;
        recorder.record(Event::info("bot stopped"));
    }
    dashboard_task.abort();
    Ok(())
}
