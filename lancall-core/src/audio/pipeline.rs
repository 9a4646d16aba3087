//! Full-duplex audio streaming over one TCP connection
//!
//! The send half frames microphone capture and writes raw PCM; the
//! receive half reads whatever the peer sends, applies the local
//! volume, meters it, and queues it for playback. cpal streams are not
//! Send, so capture and playback each live on a dedicated thread,
//! bridged to the async tasks by channels.
//!
//! The write half of the socket is shared: the host's controller needs
//! it to deliver the end-of-call sentinel after the send task has been
//! stopped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;

use lancall_common::frame::{self, BYTES_PER_FRAME};
use lancall_common::protocol::HOST_ENDED;

use crate::audio::SharedVolume;
use crate::audio::device::{AudioCapture, AudioPlayback};
use crate::events::{Event, EventSender};

/// How long the capture thread idles when no full frame is ready
const CAPTURE_POLL: Duration = Duration::from_millis(10);

/// Which end of the call this pipeline serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallRole {
    Host,
    Client,
}

/// Notice that a pipeline's connection has ended
#[derive(Debug)]
pub struct Disconnect {
    /// The remote peer this pipeline was streaming with
    pub peer_name: String,
    /// True when the stream ended with the host's end-of-call sentinel
    pub host_ended: bool,
}

/// Per-connection pipeline parameters
pub struct PipelineConfig {
    pub peer_name: String,
    pub role: CallRole,
    pub input_device: String,
    pub output_device: String,
    pub debug: bool,
}

/// A running send/receive pair for one connection
pub struct Pipeline {
    send_task: JoinHandle<()>,
    recv_task: JoinHandle<()>,
    writer: Arc<Mutex<OwnedWriteHalf>>,
    capture_running: Arc<AtomicBool>,
}

impl Pipeline {
    /// Start streaming both directions on an established connection
    ///
    /// Device failures degrade rather than abort: a capture failure
    /// makes the call receive-only, a playback failure leaves the
    /// receive loop metering and watching for disconnect. Both surface
    /// [`Event::AudioError`].
    pub fn spawn(
        stream: TcpStream,
        config: PipelineConfig,
        volume: SharedVolume,
        events: EventSender,
        disconnects: UnboundedSender<Disconnect>,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        let writer = Arc::new(Mutex::new(write_half));

        let capture_running = Arc::new(AtomicBool::new(true));
        let (frame_tx, frame_rx) = unbounded_channel();
        {
            let running = capture_running.clone();
            let events = events.clone();
            let input_device = config.input_device.clone();
            // Dedicated thread: cpal's Stream is not Send
            std::thread::spawn(move || {
                run_capture_thread(input_device, frame_tx, running, events);
            });
        }
        let send_task = tokio::spawn(run_send_loop(
            frame_rx,
            writer.clone(),
            capture_running.clone(),
            config.debug,
        ));

        let (play_tx, play_rx) = unbounded_channel();
        {
            let events = events.clone();
            let output_device = config.output_device.clone();
            std::thread::spawn(move || {
                run_playback_thread(output_device, play_rx, events);
            });
        }
        let recv_task = tokio::spawn(run_recv_loop(
            read_half,
            config.peer_name,
            config.role,
            play_tx,
            volume,
            events,
            disconnects,
            config.debug,
        ));

        Self {
            send_task,
            recv_task,
            writer,
            capture_running,
        }
    }

    /// Shared write half, for delivering the end-of-call sentinel
    pub fn writer(&self) -> Arc<Mutex<OwnedWriteHalf>> {
        self.writer.clone()
    }

    /// Stop the outgoing direction only; the socket stays open
    pub fn abort_send(&self) {
        self.capture_running.store(false, Ordering::SeqCst);
        self.send_task.abort();
    }

    /// Stop both directions
    pub fn abort(&self) {
        self.abort_send();
        self.recv_task.abort();
    }

    /// Stop both directions and wait for the tasks to finish, so the
    /// socket halves are dropped before this returns
    pub async fn shutdown(self) {
        self.abort();
        let _ = self.send_task.await;
        let _ = self.recv_task.await;
    }
}

/// Capture thread: frame the microphone and hand frames to the sender
///
/// Ends when capture stops, the stream errors, or the send loop goes
/// away (channel closed).
fn run_capture_thread(
    input_device: String,
    frame_tx: UnboundedSender<Vec<u8>>,
    running: Arc<AtomicBool>,
    events: EventSender,
) {
    let capture = match AudioCapture::new(&input_device) {
        Ok(capture) => capture,
        Err(e) => {
            let _ = events.send(Event::AudioError {
                detail: format!("Input device error: {}", e),
            });
            return;
        }
    };
    if let Err(e) = capture.start() {
        let _ = events.send(Event::AudioError { detail: e });
        return;
    }

    while running.load(Ordering::SeqCst) {
        if let Some(e) = capture.check_error() {
            let _ = events.send(Event::AudioError { detail: e });
            break;
        }
        match capture.take_frame() {
            Some(samples) => {
                let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
                if frame_tx.send(bytes).is_err() {
                    break;
                }
            }
            None => std::thread::sleep(CAPTURE_POLL),
        }
    }
    capture.stop();
}

/// Send loop: write captured frames to the peer in order
async fn run_send_loop(
    mut frame_rx: UnboundedReceiver<Vec<u8>>,
    writer: Arc<Mutex<OwnedWriteHalf>>,
    capture_running: Arc<AtomicBool>,
    debug: bool,
) {
    use tokio::io::AsyncWriteExt;

    while let Some(frame) = frame_rx.recv().await {
        let mut writer = writer.lock().await;
        if let Err(e) = writer.write_all(&frame).await {
            if debug {
                eprintln!("Audio: send error: {}", e);
            }
            break;
        }
    }
    capture_running.store(false, Ordering::SeqCst);
}

/// Playback thread: queue received frames on the output device
fn run_playback_thread(
    output_device: String,
    mut play_rx: UnboundedReceiver<Vec<i16>>,
    events: EventSender,
) {
    let playback = match AudioPlayback::new(&output_device) {
        Ok(playback) => playback,
        Err(e) => {
            let _ = events.send(Event::AudioError {
                detail: format!("Output device error: {}", e),
            });
            return;
        }
    };
    if let Err(e) = playback.start() {
        let _ = events.send(Event::AudioError { detail: e });
        return;
    }

    while let Some(samples) = play_rx.blocking_recv() {
        if let Some(e) = playback.check_error() {
            let _ = events.send(Event::AudioError { detail: e });
            break;
        }
        playback.queue_samples(&samples);
    }
    playback.stop();
}

/// Receive loop: volume, metering, playback, and disconnect detection
///
/// One socket read per iteration, not a full-frame read, so whatever
/// the peer sent is processed as soon as it arrives. On a client the
/// exact sentinel bytes, arriving alone in a read, mean the host ended
/// the call; PCM frames are always a fixed larger size, so a frame
/// cannot be mistaken for the sentinel.
#[allow(clippy::too_many_arguments)]
async fn run_recv_loop(
    mut read_half: tokio::net::tcp::OwnedReadHalf,
    peer_name: String,
    role: CallRole,
    play_tx: UnboundedSender<Vec<i16>>,
    volume: SharedVolume,
    events: EventSender,
    disconnects: UnboundedSender<Disconnect>,
    debug: bool,
) {
    let mut buf = [0u8; BYTES_PER_FRAME];
    let mut host_ended = false;

    loop {
        let len = match read_half.read(&mut buf).await {
            Ok(0) => break,
            Ok(len) => len,
            Err(e) => {
                if debug {
                    eprintln!("Audio: receive error from {}: {}", peer_name, e);
                }
                break;
            }
        };

        // The host stops its PCM stream before writing the sentinel,
        // so it normally arrives as its own read. A sentinel coalesced
        // with trailing PCM (or split across reads) is not recognized;
        // the close that follows still ends the call, just without the
        // host_ended flag.
        if role == CallRole::Client && len == HOST_ENDED.len() && &buf[..len] == HOST_ENDED {
            host_ended = true;
            break;
        }

        let state = volume.get();
        let processed = frame::apply_volume(&buf[..len], state.gain, state.muted);
        let level = frame::meter_level(frame::rms(&processed));
        let _ = events.send(Event::PeerVolumeUpdated {
            username: peer_name.clone(),
            level,
        });

        let samples: Vec<i16> = processed
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let _ = play_tx.send(samples);
    }

    let _ = disconnects.send(Disconnect {
        peer_name,
        host_ended,
    });
}
