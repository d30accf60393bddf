//! Client execution logic with reconnection support.

use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;

use crate::{
    command::Command,
    config::ClientConfig,
    domain::{NextStep, ReconnectController, SyncEngine},
    error::ClientError,
    room_lookup::RoomDirectory,
    session::{SessionEnd, SessionSettings, run_client_session},
    ui::show,
};

/// Run the client: resolve the room, then keep a session alive until the user
/// quits or reconnection gives up.
pub async fn run_client(
    config: ClientConfig,
    directory: Arc<dyn RoomDirectory>,
) -> Result<(), ClientError> {
    let identity = config.identity()?;
    let room = directory.resolve(&config.room).await?;
    tracing::info!(
        "Resolved room '{}' to '{}' as '{}' ({})",
        room.slug,
        room.id,
        identity.display_name,
        identity.user_id
    );

    let mut engine = SyncEngine::new(config.engine_config(&identity, &room.id));
    let mut controller = ReconnectController::new(config.reconnect_policy());
    let mut input = crate::ui::spawn_readline(identity.display_name.clone());
    println!(
        "\nYou are '{}' in room '{}'. Type /help for commands. Press Ctrl+D to exit.\n",
        identity.display_name, room.slug
    );

    let settings = SessionSettings {
        url: &config.url,
        token: &config.token,
        prompt: &identity.display_name,
        ping_interval: config.ping_interval(),
    };
    let result = drive(&settings, &mut engine, &mut input, &mut controller).await;
    engine.destroy();
    result
}

/// Reconnect loop around `run_client_session`.
///
/// The engine is kept across sessions; the snapshot received after each
/// re-join replaces its shapes.
pub async fn drive(
    settings: &SessionSettings<'_>,
    engine: &mut SyncEngine,
    input: &mut mpsc::UnboundedReceiver<String>,
    controller: &mut ReconnectController,
) -> Result<(), ClientError> {
    loop {
        if !controller.begin_attempt() {
            return Ok(());
        }
        tracing::info!("Attempting to connect to {}", settings.url);

        let error = match run_client_session(settings, engine, input, controller).await {
            SessionEnd::UserQuit => {
                controller.shutdown();
                tracing::info!("Client session ended normally");
                return Ok(());
            }
            SessionEnd::Lost(error) => error,
        };

        match controller.on_failure(error.clone()) {
            NextStep::Retry(delay) => {
                tracing::warn!("Connection lost: {}", error);
                tracing::info!(
                    "Reconnecting in {} ms... (attempt {}/{})",
                    delay.as_millis(),
                    attempt_number(controller),
                    controller.policy().max_attempts
                );
                if wait_or_quit(delay, input, settings.prompt).await {
                    controller.shutdown();
                    tracing::info!("Reconnect cancelled by user");
                    return Ok(());
                }
            }
            NextStep::GiveUp(error) => {
                tracing::error!("Giving up: {}", error);
                return Err(error);
            }
            NextStep::Stop => return Ok(()),
        }
    }
}

fn attempt_number(controller: &ReconnectController) -> u32 {
    match controller.state() {
        crate::domain::ConnectionState::BackoffWait { attempt, .. } => attempt,
        _ => 0,
    }
}

/// Sleep through the backoff; returns `true` if the user quit meanwhile.
async fn wait_or_quit(
    delay: Duration,
    input: &mut mpsc::UnboundedReceiver<String>,
    prompt: &str,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            line = input.recv() => match line {
                None => return true,
                Some(line) if matches!(Command::parse(&line), Ok(Command::Quit)) => return true,
                Some(_) => show("\noffline, reconnecting...\n", prompt),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{ConnectionState, EngineConfig, ReconnectPolicy},
        room_lookup::MockRoomDirectory,
    };
    use clap::Parser;
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn unused_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws", listener.local_addr().unwrap());
        drop(listener);
        url
    }

    fn settings(url: &str) -> SessionSettings<'_> {
        SessionSettings {
            url,
            token: "token",
            prompt: "Alice",
            ping_interval: Duration::from_secs(25),
        }
    }

    fn engine() -> SyncEngine {
        SyncEngine::new(EngineConfig::new("alice", "Alice", "demo"))
    }

    #[tokio::test]
    async fn test_room_not_found_stops_before_connecting() {
        // テスト項目: スラッグが解決できなければ relay に接続せずにエラーを返す
        // given (前提条件):
        let token = encode(
            &Header::new(Algorithm::HS256),
            &json!({"userId": "u-1", "name": "Alice"}),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        let config = ClientConfig::parse_from([
            "tegaki-client",
            "--room",
            "missing",
            "--token",
            &token,
            "--url",
            "ws://127.0.0.1:9/ws",
        ]);
        let mut directory = MockRoomDirectory::new();
        directory
            .expect_resolve()
            .times(1)
            .returning(|slug| Err(ClientError::RoomNotFound(slug.to_string())));

        // when (操作):
        let result = run_client(config, Arc::new(directory)).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(ClientError::RoomNotFound("missing".to_string()))
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_exhausting_attempts() {
        // テスト項目: 再接続の上限に達すると ReconnectExhausted を返す
        // given (前提条件):
        let url = unused_url().await;
        let mut engine = engine();
        let (_tx, mut input) = mpsc::unbounded_channel();
        let mut controller = ReconnectController::new(ReconnectPolicy {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            max_attempts: 2,
        });

        // when (操作):
        let result = drive(&settings(&url), &mut engine, &mut input, &mut controller).await;

        // then (期待する結果):
        assert_eq!(result, Err(ClientError::ReconnectExhausted { attempts: 2 }));
        assert_eq!(controller.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_quit_during_backoff_cancels_reconnect() {
        // テスト項目: 再接続待ちの間に /quit すると再接続せずに終了する
        // given (前提条件):
        let url = unused_url().await;
        let mut engine = engine();
        let (tx, mut input) = mpsc::unbounded_channel();
        tx.send("/quit".to_string()).unwrap();
        let mut controller = ReconnectController::new(ReconnectPolicy {
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
            max_attempts: 5,
        });

        // when (操作):
        let result = drive(&settings(&url), &mut engine, &mut input, &mut controller).await;

        // then (期待する結果):
        assert_eq!(result, Ok(()));
        assert!(controller.is_closed());
        assert!(!controller.begin_attempt());
    }
}
