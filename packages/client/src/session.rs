//! WebSocket client session management.
//!
//! One session is one socket: connect, queue `join_room`, then pump socket
//! frames, terminal commands, keepalive pings, and render ticks through the
//! sync engine until the socket drops or the user quits.

use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tegaki_shared::{
    error::DecodeError,
    protocol::{REPLACED_CLOSE_CODE, decode_message},
    time::now_millis,
};
use tokio::{net::TcpStream, sync::mpsc, time::MissedTickBehavior};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        self,
        client::IntoClientRequest,
        http::{HeaderValue, header::AUTHORIZATION},
        protocol::{CloseFrame, Message},
    },
};

use crate::{
    command::{Command, execute},
    domain::{EngineEvent, Frame, ReconnectController, SyncEngine},
    error::ClientError,
    formatter::MessageFormatter,
    ui::{redisplay_prompt, show},
};

/// Render tick interval
pub const FRAME_INTERVAL: Duration = Duration::from_millis(50);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user asked to leave; do not reconnect
    UserQuit,
    /// The socket could not be opened or was lost
    Lost(ClientError),
}

pub struct SessionSettings<'a> {
    pub url: &'a str,
    pub token: &'a str,
    pub prompt: &'a str,
    pub ping_interval: Duration,
}

/// Terminal-side state that lives for one session
#[derive(Debug, Default)]
struct SessionView {
    last_frame: Option<Frame>,
    /// When the user's `/ping` was sent
    ping_sent_at: Option<i64>,
}

impl SessionView {
    /// Cursor-only repaints are not worth a status line
    fn should_print(&mut self, frame: &Frame) -> bool {
        let changed = self.last_frame.as_ref().is_none_or(|last| {
            last.revision != frame.revision
                || last.viewport != frame.viewport
                || last.selected != frame.selected
                || last.preview != frame.preview
        });
        self.last_frame = Some(frame.clone());
        changed
    }
}

/// Open the socket with the token in the `Authorization` header.
pub async fn connect(url: &str, token: &str) -> Result<WsStream, ClientError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| ClientError::InvalidConfig(format!("bad relay url '{}': {}", url, e)))?;
    let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| ClientError::InvalidConfig("token is not a valid header value".to_string()))?;
    request.headers_mut().insert(AUTHORIZATION, bearer);

    match connect_async(request).await {
        Ok((ws_stream, _response)) => Ok(ws_stream),
        Err(tungstenite::Error::Http(response)) if response.status().as_u16() == 401 => {
            Err(ClientError::Unauthorized)
        }
        Err(e) => Err(ClientError::ConnectionError(e.to_string())),
    }
}

/// Run the WebSocket client session
pub async fn run_client_session(
    settings: &SessionSettings<'_>,
    engine: &mut SyncEngine,
    input: &mut mpsc::UnboundedReceiver<String>,
    controller: &mut ReconnectController,
) -> SessionEnd {
    let ws_stream = match connect(settings.url, settings.token).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => return SessionEnd::Lost(e),
    };
    controller.on_open();
    tracing::info!("Connected to relay at {}", settings.url);

    let (mut write, mut read) = ws_stream.split();

    // join_room goes first; the snapshot that answers it replaces whatever the
    // engine holds.
    let discarded = engine.rejoin();
    if discarded > 0 {
        tracing::info!("Discarded {} messages queued before the connection dropped", discarded);
    }
    if let Err(e) = flush(engine, &mut write).await {
        return SessionEnd::Lost(e);
    }

    let mut ping = tokio::time::interval_at(
        tokio::time::Instant::now() + settings.ping_interval,
        settings.ping_interval,
    );
    let mut frames = tokio::time::interval(FRAME_INTERVAL);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut view = SessionView::default();

    loop {
        tokio::select! {
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if let Some(output) = handle_inbound(engine, &text, &mut view) {
                        show(&output, settings.prompt);
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!("Server closed the connection: {:?}", frame);
                    return SessionEnd::Lost(close_error(frame.as_ref()));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    return SessionEnd::Lost(ClientError::ConnectionError(e.to_string()));
                }
                None => {
                    return SessionEnd::Lost(ClientError::ConnectionError(
                        "Connection lost".to_string(),
                    ));
                }
            },
            line = input.recv() => {
                let Some(line) = line else {
                    return quit(engine, &mut write).await;
                };
                match Command::parse(&line) {
                    Ok(Command::Quit) => return quit(engine, &mut write).await,
                    Ok(command) => {
                        let now = now_millis();
                        if command == Command::Ping {
                            view.ping_sent_at = Some(now);
                        }
                        match execute(engine, command, now) {
                            Some(output) => show(&output, settings.prompt),
                            None => redisplay_prompt(settings.prompt),
                        }
                    }
                    Err(message) => show(&format!("\n{}\n", message), settings.prompt),
                }
            },
            _ = ping.tick() => engine.ping(now_millis()),
            _ = frames.tick() => {
                if let Some(frame) = engine.tick(now_millis())
                    && view.should_print(&frame)
                {
                    show(&MessageFormatter::format_frame(&frame), settings.prompt);
                }
            },
        }

        if let Err(e) = flush(engine, &mut write).await {
            return SessionEnd::Lost(e);
        }
    }
}

/// Map the relay's close frame to the reason the session ended
fn close_error(frame: Option<&CloseFrame>) -> ClientError {
    match frame {
        Some(frame) if u16::from(frame.code) == REPLACED_CLOSE_CODE => ClientError::Replaced,
        Some(frame) if !frame.reason.is_empty() => ClientError::ConnectionError(format!(
            "Server closed the connection: {}",
            frame.reason.as_str()
        )),
        _ => ClientError::ConnectionError("Server closed the connection".to_string()),
    }
}

/// Decode one text frame and apply it; returns what to print, if anything
fn handle_inbound(engine: &mut SyncEngine, text: &str, view: &mut SessionView) -> Option<String> {
    let now = now_millis();
    let message = match decode_message(text) {
        Ok(message) => message,
        Err(DecodeError::UnknownKind(kind)) => {
            tracing::debug!("Ignoring message of unknown type '{}'", kind);
            return None;
        }
        Err(e) => {
            tracing::warn!("Dropping malformed message from relay: {}", e);
            return None;
        }
    };

    match engine.apply_remote(message, now)? {
        EngineEvent::Snapshot {
            shape_count,
            members,
        } => Some(MessageFormatter::format_snapshot(
            engine.room_id(),
            &members,
            shape_count,
            engine.identity(),
        )),
        EngineEvent::MemberJoined {
            display_name,
            member_count,
            ..
        } => Some(MessageFormatter::format_member_joined(
            &display_name,
            member_count,
        )),
        EngineEvent::MemberLeft {
            display_name,
            member_count,
            ..
        } => Some(MessageFormatter::format_member_left(
            &display_name,
            member_count,
        )),
        EngineEvent::Chat {
            display_name,
            text,
            timestamp,
            ..
        } => Some(MessageFormatter::format_chat_message(
            &display_name,
            &text,
            timestamp,
        )),
        EngineEvent::Pong { .. } => view
            .ping_sent_at
            .take()
            .map(|sent_at| MessageFormatter::format_pong(Some(now - sent_at))),
    }
}

/// Send everything the engine queued
async fn flush<S>(engine: &mut SyncEngine, write: &mut S) -> Result<(), ClientError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    for message in engine.take_outbound() {
        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize {} message: {}", message.kind(), e);
                continue;
            }
        };
        tracing::debug!("Sending {}", message.kind());
        write
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| ClientError::ConnectionError(e.to_string()))?;
    }
    Ok(())
}

async fn quit<S>(engine: &mut SyncEngine, write: &mut S) -> SessionEnd
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    engine.leave();
    if let Err(e) = flush(engine, write).await {
        tracing::debug!("Could not send leave_room: {}", e);
    }
    write.send(Message::Close(None)).await.ok();
    SessionEnd::UserQuit
}
