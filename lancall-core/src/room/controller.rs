//! Room lifecycle controller
//!
//! A single task owns all room state - roster, listener tasks, and the
//! per-connection audio pipelines - and serializes every mutation.
//! Commands arrive from the presentation layer through [`RoomHandle`];
//! internal notices (admitted clients, pipeline disconnects) arrive on
//! their own channels and are folded into the same select loop, so no
//! two transitions ever interleave.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;

use lancall_common::protocol::{HOST_ENDED, Member};
use lancall_common::validators::{generate_room_code, validate_room_code};

use crate::audio::SharedVolume;
use crate::audio::pipeline::{CallRole, Disconnect, Pipeline, PipelineConfig};
use crate::chat::{self, ChatLog};
use crate::discovery;
use crate::events::{Event, EventSender};
use crate::net::{self, Ports};
use crate::presence;
use crate::room::Roster;
use crate::session;

/// Controller construction parameters
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub username: String,
    pub ports: Ports,
    /// Input device name, empty for system default
    pub input_device: String,
    /// Output device name, empty for system default
    pub output_device: String,
    pub debug: bool,
}

/// Requests from the presentation layer
enum Command {
    CreateRoom,
    JoinRoom { code: String },
    CloseRoom,
    LeaveCall,
    SendChat { text: String },
    SetVolume { gain: f32 },
    SetMuted { muted: bool },
    ToggleMute,
    Shutdown { done: oneshot::Sender<()> },
}

/// Hosting-side state: the open room
struct HostState {
    code: String,
    /// Discovery responder, accept loop, presence broadcaster, chat listener
    tasks: Vec<JoinHandle<()>>,
    presence_changed: Arc<Notify>,
    /// One audio pipeline per admitted client, keyed by username
    connections: HashMap<String, Pipeline>,
}

/// Client-side state: a live call
struct CallState {
    /// Presence listener and chat listener
    tasks: Vec<JoinHandle<()>>,
    pipeline: Pipeline,
}

enum State {
    Idle,
    Hosting(HostState),
    InCall(CallState),
}

/// Cloneable command surface over the controller task
#[derive(Clone)]
pub struct RoomHandle {
    command_tx: UnboundedSender<Command>,
}

impl RoomHandle {
    pub fn create_room(&self) {
        let _ = self.command_tx.send(Command::CreateRoom);
    }

    pub fn join_room(&self, code: String) {
        let _ = self.command_tx.send(Command::JoinRoom { code });
    }

    pub fn close_room(&self) {
        let _ = self.command_tx.send(Command::CloseRoom);
    }

    pub fn leave_call(&self) {
        let _ = self.command_tx.send(Command::LeaveCall);
    }

    pub fn send_chat(&self, text: String) {
        let _ = self.command_tx.send(Command::SendChat { text });
    }

    pub fn set_volume(&self, gain: f32) {
        let _ = self.command_tx.send(Command::SetVolume { gain });
    }

    pub fn set_muted(&self, muted: bool) {
        let _ = self.command_tx.send(Command::SetMuted { muted });
    }

    pub fn toggle_mute(&self) {
        let _ = self.command_tx.send(Command::ToggleMute);
    }

    /// Tear down any open room or call and stop the controller
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.command_tx.send(Command::Shutdown { done: done_tx }).is_ok() {
            let _ = done_rx.await;
        }
    }
}

/// The room state actor
pub struct RoomController {
    config: RoomConfig,
    roster: Roster,
    chat_log: ChatLog,
    volume: SharedVolume,
    events: EventSender,
    state: State,
    /// Clients admitted by the handshake tasks
    admitted_tx: UnboundedSender<(String, TcpStream)>,
    admitted_rx: UnboundedReceiver<(String, TcpStream)>,
    /// Disconnect notices from the audio pipelines
    disconnect_tx: UnboundedSender<Disconnect>,
    disconnect_rx: UnboundedReceiver<Disconnect>,
}

impl RoomController {
    /// Start the controller task and return its handle
    pub fn spawn(config: RoomConfig, events: EventSender) -> RoomHandle {
        let (command_tx, command_rx) = unbounded_channel();
        let (admitted_tx, admitted_rx) = unbounded_channel();
        let (disconnect_tx, disconnect_rx) = unbounded_channel();

        let controller = Self {
            config,
            roster: Roster::new(),
            chat_log: ChatLog::new(),
            volume: SharedVolume::new(),
            events,
            state: State::Idle,
            admitted_tx,
            admitted_rx,
            disconnect_tx,
            disconnect_rx,
        };
        tokio::spawn(controller.run(command_rx));

        RoomHandle { command_tx }
    }

    async fn run(mut self, mut commands: UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        // Every handle dropped: tear down silently.
                        None => {
                            self.teardown().await;
                            break;
                        }
                        Some(command) => {
                            if self.handle_command(command).await {
                                break;
                            }
                        }
                    }
                }
                Some((username, stream)) = self.admitted_rx.recv() => {
                    self.on_admitted(username, stream).await;
                }
                Some(notice) = self.disconnect_rx.recv() => {
                    self.on_disconnect(notice).await;
                }
            }
        }
    }

    /// Returns true when the controller should stop
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::CreateRoom => self.create_room().await,
            Command::JoinRoom { code } => self.join_room(code).await,
            Command::CloseRoom => {
                if matches!(self.state, State::Hosting(_)) {
                    self.teardown().await;
                    let _ = self.events.send(Event::RoomClosed);
                }
            }
            Command::LeaveCall => {
                if matches!(self.state, State::InCall(_)) {
                    self.teardown().await;
                    let _ = self.events.send(Event::CallEnded { host_ended: false });
                }
            }
            Command::SendChat { text } => {
                if !matches!(self.state, State::Idle)
                    && let Err(e) =
                        chat::send_chat(&self.chat_log, &self.config.username, &text, self.config.ports)
                            .await
                {
                    let _ = self.events.send(Event::Error {
                        detail: format!("chat send failed: {}", e),
                    });
                }
            }
            Command::SetVolume { gain } => self.volume.set_gain(gain),
            Command::SetMuted { muted } => self.volume.set_muted(muted),
            Command::ToggleMute => {
                self.volume.toggle_mute();
            }
            Command::Shutdown { done } => {
                self.teardown().await;
                let _ = done.send(());
                return true;
            }
        }
        false
    }

    /// Open a room: fresh code, fresh roster, all host listeners up
    async fn create_room(&mut self) {
        self.teardown().await;

        let ports = self.config.ports;
        let discovery_socket = match net::bind_reusable_udp(ports.discovery) {
            Ok(socket) => socket,
            Err(e) => {
                return self.setup_failed(format!("discovery listener: {}", e));
            }
        };
        let session_listener = match TcpListener::bind(("0.0.0.0", ports.session)).await {
            Ok(listener) => listener,
            Err(e) => {
                return self.setup_failed(format!("session listener: {}", e));
            }
        };
        let chat_socket = match net::bind_reusable_udp(ports.chat) {
            Ok(socket) => socket,
            Err(e) => {
                return self.setup_failed(format!("chat listener: {}", e));
            }
        };

        let code = generate_room_code();
        self.chat_log.clear().await;
        self.roster
            .replace(vec![Member::host(self.config.username.clone())])
            .await;

        let presence_changed = Arc::new(Notify::new());
        let debug = self.config.debug;
        let tasks = vec![
            tokio::spawn(discovery::run_responder(
                discovery_socket,
                code.clone(),
                debug,
            )),
            tokio::spawn(accept_loop(
                session_listener,
                code.clone(),
                self.config.username.clone(),
                self.roster.clone(),
                presence_changed.clone(),
                self.events.clone(),
                self.admitted_tx.clone(),
                debug,
            )),
            tokio::spawn(presence::run_broadcaster(
                self.roster.clone(),
                presence_changed.clone(),
                ports,
                debug,
            )),
            tokio::spawn(chat::run_listener(
                chat_socket,
                self.chat_log.clone(),
                self.config.username.clone(),
                self.events.clone(),
                debug,
            )),
        ];

        self.state = State::Hosting(HostState {
            code: code.clone(),
            tasks,
            presence_changed,
            connections: HashMap::new(),
        });
        let _ = self.events.send(Event::RoomCreated { code });
    }

    /// Join a discovered room and go live
    async fn join_room(&mut self, code: String) {
        self.teardown().await;

        let code = code.trim().to_string();
        if let Err(e) = validate_room_code(&code) {
            return self.join_failed(e.to_string());
        }

        let ports = self.config.ports;
        let Some(host_ip) = discovery::discover_host(&code, &self.config.username, ports).await
        else {
            return self.join_failed("room not found".to_string());
        };

        let joined = match session::join_room(host_ip, ports.session, &self.config.username, &code)
            .await
        {
            Ok(joined) => joined,
            Err(e) => return self.join_failed(e.to_string()),
        };

        let presence_socket = match net::bind_reusable_udp(ports.presence) {
            Ok(socket) => socket,
            Err(e) => {
                return self.join_failed(format!("presence listener: {}", e));
            }
        };
        let chat_socket = match net::bind_reusable_udp(ports.chat) {
            Ok(socket) => socket,
            Err(e) => {
                return self.join_failed(format!("chat listener: {}", e));
            }
        };

        self.chat_log.clear().await;
        self.roster.replace(joined.members.clone()).await;

        let debug = self.config.debug;
        let tasks = vec![
            tokio::spawn(presence::run_listener(
                presence_socket,
                self.roster.clone(),
                self.events.clone(),
                debug,
            )),
            tokio::spawn(chat::run_listener(
                chat_socket,
                self.chat_log.clone(),
                self.config.username.clone(),
                self.events.clone(),
                debug,
            )),
        ];

        let pipeline = Pipeline::spawn(
            joined.stream,
            PipelineConfig {
                peer_name: joined.host_username.clone(),
                role: CallRole::Client,
                input_device: self.config.input_device.clone(),
                output_device: self.config.output_device.clone(),
                debug,
            },
            self.volume.clone(),
            self.events.clone(),
            self.disconnect_tx.clone(),
        );

        self.state = State::InCall(CallState { tasks, pipeline });
        let _ = self.events.send(Event::JoinedRoom {
            host_username: joined.host_username,
            members: joined.members,
        });
    }

    /// An admitted client's connection is ready for audio
    async fn on_admitted(&mut self, username: String, stream: TcpStream) {
        let State::Hosting(host) = &mut self.state else {
            // Room closed while the handshake was in flight.
            return;
        };

        let pipeline = Pipeline::spawn(
            stream,
            PipelineConfig {
                peer_name: username.clone(),
                role: CallRole::Host,
                input_device: self.config.input_device.clone(),
                output_device: self.config.output_device.clone(),
                debug: self.config.debug,
            },
            self.volume.clone(),
            self.events.clone(),
            self.disconnect_tx.clone(),
        );
        host.connections.insert(username, pipeline);

        let _ = self.events.send(Event::MembershipChanged {
            members: self.roster.snapshot().await,
        });
    }

    /// A pipeline's connection ended
    async fn on_disconnect(&mut self, notice: Disconnect) {
        match &mut self.state {
            State::Idle => {}
            State::Hosting(host) => {
                let Some(pipeline) = host.connections.remove(&notice.peer_name) else {
                    return;
                };
                pipeline.shutdown().await;
                self.roster.remove(&notice.peer_name).await;
                host.presence_changed.notify_one();
                let _ = self.events.send(Event::PeerLeft {
                    username: notice.peer_name,
                });
                let _ = self.events.send(Event::MembershipChanged {
                    members: self.roster.snapshot().await,
                });
            }
            State::InCall(_) => {
                self.teardown().await;
                let _ = self.events.send(Event::CallEnded {
                    host_ended: notice.host_ended,
                });
            }
        }
    }

    /// Stop everything belonging to the current state, silently
    ///
    /// Aborted tasks are awaited so every socket they own (the session
    /// listener in particular) is closed before this returns; the next
    /// `create_room` rebinds the same ports immediately.
    async fn teardown(&mut self) {
        match mem::replace(&mut self.state, State::Idle) {
            State::Idle => {}
            State::Hosting(host) => {
                if self.config.debug {
                    eprintln!("Room: closing {} ({} clients)", host.code, host.connections.len());
                }
                for pipeline in host.connections.values() {
                    // Stop sending first so the sentinel is not
                    // interleaved with a PCM frame.
                    pipeline.abort_send();
                    let writer = pipeline.writer();
                    let mut writer = writer.lock().await;
                    let _ = writer.write_all(HOST_ENDED).await;
                    let _ = writer.shutdown().await;
                }
                for pipeline in host.connections.into_values() {
                    pipeline.shutdown().await;
                }
                for task in host.tasks {
                    task.abort();
                    let _ = task.await;
                }
            }
            State::InCall(call) => {
                call.pipeline.shutdown().await;
                for task in call.tasks {
                    task.abort();
                    let _ = task.await;
                }
            }
        }
        self.roster.clear().await;
    }

    fn setup_failed(&mut self, detail: String) {
        let _ = self.events.send(Event::Error { detail });
    }

    fn join_failed(&mut self, reason: String) {
        let _ = self.events.send(Event::JoinFailed { reason });
    }
}

/// Accept connections on the session port and run each through the
/// admission gate on its own task
#[allow(clippy::too_many_arguments)]
async fn accept_loop(
    listener: TcpListener,
    code: String,
    host_username: String,
    roster: Roster,
    presence_changed: Arc<Notify>,
    events: EventSender,
    admitted_tx: UnboundedSender<(String, TcpStream)>,
    debug: bool,
) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                if debug {
                    eprintln!("Session: accept error: {}", e);
                }
                break;
            }
        };
        if debug {
            eprintln!("Session: connection from {}", addr);
        }

        let code = code.clone();
        let host_username = host_username.clone();
        let roster = roster.clone();
        let presence_changed = presence_changed.clone();
        let events = events.clone();
        let admitted_tx = admitted_tx.clone();
        tokio::spawn(async move {
            if let Some(admitted) = session::handle_join_request(
                stream,
                &code,
                &host_username,
                &roster,
                &presence_changed,
                &events,
                debug,
            )
            .await
            {
                let _ = admitted_tx.send(admitted);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use lancall_common::validators::ROOM_CODE_LENGTH;

    use crate::events::{self, EventReceiver};

    fn test_config(ports: Ports) -> RoomConfig {
        RoomConfig {
            username: "alice".to_string(),
            ports,
            input_device: String::new(),
            output_device: String::new(),
            debug: false,
        }
    }

    async fn next_non_audio_event(events: &mut EventReceiver) -> Event {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("event within deadline")
                .expect("event");
            if !matches!(event, Event::AudioError { .. }) {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn test_create_room_emits_fresh_code() {
        let ports = Ports {
            session: 42107,
            discovery: 42108,
            presence: 42109,
            chat: 42110,
        };
        let (event_tx, mut event_rx) = events::channel();
        let handle = RoomController::spawn(test_config(ports), event_tx);

        handle.create_room();
        let event = next_non_audio_event(&mut event_rx).await;
        let Event::RoomCreated { code } = event else {
            panic!("expected RoomCreated, got {:?}", event);
        };
        assert_eq!(code.len(), ROOM_CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));

        handle.close_room();
        let event = next_non_audio_event(&mut event_rx).await;
        assert!(matches!(event, Event::RoomClosed));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_join_with_invalid_code_fails_fast() {
        let (event_tx, mut event_rx) = events::channel();
        let handle = RoomController::spawn(test_config(Ports::default()), event_tx);

        handle.join_room("too-short".to_string());
        let event = next_non_audio_event(&mut event_rx).await;
        assert!(matches!(event, Event::JoinFailed { .. }));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_recreating_room_rotates_the_code() {
        let ports = Ports {
            session: 42117,
            discovery: 42118,
            presence: 42119,
            chat: 42120,
        };
        let (event_tx, mut event_rx) = events::channel();
        let handle = RoomController::spawn(test_config(ports), event_tx);

        handle.create_room();
        let Event::RoomCreated { code: first } = next_non_audio_event(&mut event_rx).await else {
            panic!("expected RoomCreated");
        };
        handle.create_room();
        let Event::RoomCreated { code: second } = next_non_audio_event(&mut event_rx).await else {
            panic!("expected RoomCreated");
        };
        assert_ne!(first, second);

        handle.shutdown().await;
    }
}
