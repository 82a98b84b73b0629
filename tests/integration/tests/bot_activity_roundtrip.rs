use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use serde_json::{json, Value};
use tempfile::tempdir;
use tokio::sync::Mutex;

use magpie_commands::CommandStore;
use magpie_dashboard::{
    build_dashboard_router, DashboardAuthMode, DashboardConfig, DashboardState,
};
use magpie_events::{EventKind, EventQuery, EventRecorder};
use magpie_gateway::{
    load_gateway_state, DiscordRestClient, GatewayConnector, GatewayConnectorConfig, GatewayStatus,
    MessagePipeline,
};

struct BotWorld {
    store: Arc<Mutex<CommandStore>>,
    recorder: Arc<Mutex<EventRecorder>>,
    rest: Arc<DiscordRestClient>,
    pipeline: Arc<MessagePipeline>,
    status: Arc<Mutex<GatewayStatus>>,
}

fn build_world(root: &Path, api_base: &str) -> BotWorld {
    let store = Arc::new(Mutex::new(
        CommandStore::load(&root.join("custom-commands.json")).expect("load command store"),
    ));
    let recorder = Arc::new(Mutex::new(
        EventRecorder::new(&root.join("logs")).expect("create event recorder"),
    ));
    let rest = Arc::new(DiscordRestClient::new(
        api_base,
        "bot-token",
        Some("app-1"),
        1,
        0,
    ));
    let pipeline = Arc::new(MessagePipeline::new(
        Arc::clone(&store),
        Arc::clone(&recorder),
        Arc::clone(&rest),
    ));
    let status = Arc::new(Mutex::new(GatewayStatus::default()));
    BotWorld {
        store,
        recorder,
        rest,
        pipeline,
        status,
    }
}

fn mock_discord_directory(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/users/@me");
        then.status(200).json_body(json!({
            "id": "bot-1",
            "username": "magpie",
            "discriminator": "0"
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/users/@me/guilds");
        then.status(200)
            .json_body(json!([{"id": "g-1", "name": "Test Guild"}]));
    });
    server.mock(|when, then| {
        when.method(GET).path("/channels/c-1");
        then.status(200).json_body(json!({
            "id": "c-1",
            "name": "general",
            "type": 0,
            "guild_id": "g-1"
        }));
    });
}

fn mock_channel_backlog(server: &MockServer) {
    // Newest-first page: a bot-authored notice on top of a user trigger.
    server.mock(|when, then| {
        when.method(GET).path("/channels/c-1/messages");
        then.status(200).json_body(json!([
            {
                "id": "1002",
                "channel_id": "c-1",
                "content": "deploy finished",
                "author": {"id": "bot-1", "username": "magpie", "discriminator": "0", "bot": true}
            },
            {
                "id": "1001",
                "channel_id": "c-1",
                "content": "!greet",
                "author": {"id": "u-1", "username": "ada", "discriminator": "0"}
            }
        ]));
    });
}

fn connector_for(root: &Path, world: &BotWorld) -> GatewayConnector {
    let config = GatewayConnectorConfig {
        state_path: root.join("gateway-state.json"),
        poll_channel_ids: vec!["c-1".to_string()],
    };
    GatewayConnector::new(
        config,
        Arc::clone(&world.rest),
        Arc::clone(&world.pipeline),
        Arc::clone(&world.status),
    )
    .expect("build connector")
}

#[tokio::test]
async fn integration_poll_cycle_replies_and_advances_watermark() {
    let server = MockServer::start();
    mock_discord_directory(&server);
    mock_channel_backlog(&server);
    let reply_mock = server.mock(|when, then| {
        when.method(POST).path("/channels/c-1/messages");
        then.status(200).json_body(json!({"id": "1003"}));
    });

    let temp = tempdir().expect("tempdir");
    let world = build_world(temp.path(), &server.base_url());
    {
        let mut store = world.store.lock().await;
        store
            .add("g-1", "greet", "hello from the vault")
            .expect("seed custom command");
    }

    let mut connector = connector_for(temp.path(), &world);
    let first = connector.run_poll_cycle().await;
    assert_eq!(first.messages_ingested, 1);
    assert_eq!(first.bot_messages_skipped, 1);
    assert_eq!(first.replies_sent, 1);
    assert_eq!(first.transport_failures, 0);
    reply_mock.assert();

    // The same backlog page must not be ingested twice.
    let second = connector.run_poll_cycle().await;
    assert_eq!(second.messages_ingested, 0);
    assert_eq!(second.replies_sent, 0);
    reply_mock.assert_calls(1);

    let state =
        load_gateway_state(&temp.path().join("gateway-state.json")).expect("reload state file");
    assert_eq!(
        state.last_message_ids.get("c-1").map(String::as_str),
        Some("1002")
    );

    let events = world.recorder.lock().await.query(&EventQuery::default());
    assert!(events
        .iter()
        .any(|event| event.kind == EventKind::Message
            && event.content.as_deref() == Some("!greet")));
    let custom = events
        .iter()
        .find(|event| event.kind == EventKind::Custom)
        .expect("custom command event recorded");
    assert_eq!(custom.command_name.as_deref(), Some("greet"));
    assert_eq!(custom.guild_name, "Test Guild");
    assert_eq!(custom.channel_name, "general");
    assert_eq!(custom.user_tag, "ada");

    let status = world.status.lock().await.clone();
    assert!(status.online);
    assert_eq!(status.user_tag, "magpie");
    assert_eq!(status.guild_count, 1);
    assert_eq!(status.replies_sent, 1);
}

#[tokio::test]
async fn integration_dashboard_api_observes_connector_activity() {
    let server = MockServer::start();
    mock_discord_directory(&server);
    mock_channel_backlog(&server);
    server.mock(|when, then| {
        when.method(POST).path("/channels/c-1/messages");
        then.status(200).json_body(json!({"id": "1003"}));
    });

    let temp = tempdir().expect("tempdir");
    let world = build_world(temp.path(), &server.base_url());
    {
        let mut store = world.store.lock().await;
        store
            .add("g-1", "greet", "hello from the vault")
            .expect("seed custom command");
    }
    let mut connector = connector_for(temp.path(), &world);
    connector.run_poll_cycle().await;

    let config = DashboardConfig {
        bind: "127.0.0.1:0".to_string(),
        auth_mode: DashboardAuthMode::Token,
        auth_token: Some("ops-token".to_string()),
        auth_password: None,
        session_ttl_seconds: 3600,
        rate_limit_window_seconds: 60,
        rate_limit_max_requests: 120,
        interactions_public_key: None,
    };
    let state = Arc::new(DashboardState::new(
        config,
        Arc::clone(&world.store),
        Arc::clone(&world.recorder),
        Arc::clone(&world.status),
        Arc::clone(&world.rest),
        Arc::clone(&world.pipeline),
    ));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind dashboard listener");
    let addr = listener.local_addr().expect("resolve dashboard addr");
    let app = build_dashboard_router(state);
    let server_task = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let client = reqwest::Client::new();
    let status_payload = client
        .get(format!("http://{addr}/api/status"))
        .bearer_auth("ops-token")
        .send()
        .await
        .expect("request status")
        .json::<Value>()
        .await
        .expect("parse status payload");
    assert_eq!(status_payload["online"], true);
    assert_eq!(status_payload["user_tag"], "magpie");
    assert_eq!(status_payload["guild_count"], 1);
    assert_eq!(status_payload["replies_sent"], 1);
    assert!(status_payload["events_recorded"].as_u64().expect("count") >= 2);

    let events_payload = client
        .get(format!("http://{addr}/api/events?kind=custom"))
        .bearer_auth("ops-token")
        .send()
        .await
        .expect("request events")
        .json::<Value>()
        .await
        .expect("parse events payload");
    let events = events_payload["events"].as_array().expect("events array");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["commandName"], "greet");
    assert_eq!(events[0]["guildName"], "Test Guild");
    assert_eq!(events[0]["type"], "custom");

    let list_payload = client
        .get(format!("http://{addr}/api/custom/list?guild_id=g-1"))
        .bearer_auth("ops-token")
        .send()
        .await
        .expect("request custom list")
        .json::<Value>()
        .await
        .expect("parse custom list payload");
    assert_eq!(list_payload["commands"][0]["name"], "greet");
    assert_eq!(list_payload["commands"][0]["response"], "hello from the vault");

    server_task.abort();
}
