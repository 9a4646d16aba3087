//! lancall terminal client
//!
//! A line-oriented front end over the engine: commands go in, engine
//! events print as they arrive. Everything stateful lives behind the
//! [`RoomHandle`]; this file only translates between the terminal and
//! the event channel.

mod args;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::oneshot;

use lancall_common::validators::validate_username;
use lancall_core::audio::device::{list_input_devices, list_output_devices};
use lancall_core::events::{self, Event};
use lancall_core::net::Ports;
use lancall_core::room::{RoomConfig, RoomController, RoomHandle};
use lancall_core::settings::Settings;

use args::Args;

const COMMAND_HELP: &str = "\
Commands:
  /create            create a room and print its code
  /join <code>       join a room by code
  /accept            admit the pending join request
  /decline           refuse the pending join request
  /close             close the hosted room
  /leave             leave the current call
  /volume <0-200>    set playback volume in percent
  /mute              toggle mute
  /devices           list audio devices
  /quit              exit
anything else is sent as chat";

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.list_devices {
        print_devices();
        return;
    }

    // One reader for the whole session; a second BufReader over stdin
    // would swallow whatever the first had buffered.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut settings = Settings::load();
    let username = match resolve_username(&args, &settings, &mut lines).await {
        Some(username) => username,
        None => {
            eprintln!("A username is required");
            std::process::exit(1);
        }
    };
    if let Err(e) = validate_username(&username) {
        eprintln!("Invalid username: {}", e);
        std::process::exit(1);
    }

    let input_device = args
        .input_device
        .clone()
        .unwrap_or_else(|| settings.input_device.clone());
    let output_device = args
        .output_device
        .clone()
        .unwrap_or_else(|| settings.output_device.clone());

    // Remember what we ended up running with
    settings.username = username.clone();
    settings.input_device = input_device.clone();
    settings.output_device = output_device.clone();
    if let Err(e) = settings.save() {
        eprintln!("Warning: could not save settings: {}", e);
    }

    let ports = Ports {
        session: args.session_port,
        discovery: args.discovery_port,
        presence: args.presence_port,
        chat: args.chat_port,
    };
    let (event_tx, mut event_rx) = events::channel();
    let handle = RoomController::spawn(
        RoomConfig {
            username: username.clone(),
            ports,
            input_device,
            output_device,
            debug: args.debug,
        },
        event_tx,
    );
    handle.set_volume(settings.volume);
    handle.set_muted(settings.muted);

    println!("lancall {} - hello, {}", env!("CARGO_PKG_VERSION"), username);
    println!("{}", COMMAND_HELP);

    if args.host {
        handle.create_room();
    } else if let Some(code) = args.join.clone() {
        handle.join_room(code);
    }

    // The join request currently awaiting /accept or /decline
    let mut pending_decision: Option<oneshot::Sender<bool>> = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_line(&handle, line.trim(), &mut pending_decision) {
                            break;
                        }
                    }
                    // stdin closed
                    Ok(None) | Err(_) => break,
                }
            }
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                print_event(event, &mut pending_decision, args.auto_accept, args.debug);
            }
        }
    }

    handle.shutdown().await;
}

fn print_devices() {
    println!("Input devices:");
    for device in list_input_devices() {
        println!("  {}", device);
    }
    println!("Output devices:");
    for device in list_output_devices() {
        println!("  {}", device);
    }
}

/// Username from args, then saved settings, then a prompt
async fn resolve_username(
    args: &Args,
    settings: &Settings,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Option<String> {
    if let Some(username) = &args.username {
        return Some(username.clone());
    }
    if !settings.username.is_empty() {
        return Some(settings.username.clone());
    }

    println!("Enter a username:");
    match lines.next_line().await {
        Ok(Some(line)) if !line.trim().is_empty() => Some(line.trim().to_string()),
        _ => None,
    }
}

/// Returns false when the user asked to quit
fn handle_line(
    handle: &RoomHandle,
    line: &str,
    pending_decision: &mut Option<oneshot::Sender<bool>>,
) -> bool {
    if line.is_empty() {
        return true;
    }

    let (command, rest) = match line.split_once(' ') {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    match command {
        "/quit" => return false,
        "/create" => handle.create_room(),
        "/join" => {
            if rest.is_empty() {
                println!("Usage: /join <code>");
            } else {
                handle.join_room(rest.to_string());
            }
        }
        "/accept" => answer_pending(pending_decision, true),
        "/decline" => answer_pending(pending_decision, false),
        "/close" => handle.close_room(),
        "/leave" => handle.leave_call(),
        "/volume" => match rest.parse::<u32>() {
            Ok(percent) if percent <= 200 => handle.set_volume(percent as f32 / 100.0),
            _ => println!("Usage: /volume <0-200>"),
        },
        "/mute" => handle.toggle_mute(),
        "/devices" => print_devices(),
        "/help" => println!("{}", COMMAND_HELP),
        _ if command.starts_with('/') => println!("Unknown command; /help for help"),
        _ => handle.send_chat(line.to_string()),
    }
    true
}

fn answer_pending(pending_decision: &mut Option<oneshot::Sender<bool>>, accept: bool) {
    match pending_decision.take() {
        Some(decision) => {
            let _ = decision.send(accept);
        }
        None => println!("No pending join request"),
    }
}

fn print_event(
    event: Event,
    pending_decision: &mut Option<oneshot::Sender<bool>>,
    auto_accept: bool,
    debug: bool,
) {
    match event {
        Event::RoomCreated { code } => {
            println!("Room created. Share this code: {}", code);
        }
        Event::JoinRequest { username, decision } => {
            if auto_accept {
                println!("{} joined (auto-accepted)", username);
                let _ = decision.send(true);
            } else {
                println!("{} wants to join - /accept or /decline", username);
                // A newer request supersedes an unanswered one; dropping
                // the old sender declines it.
                *pending_decision = Some(decision);
            }
        }
        Event::JoinedRoom {
            host_username,
            members,
        } => {
            println!("Joined {}'s room", host_username);
            print_members(&members);
        }
        Event::JoinFailed { reason } => println!("Could not join: {}", reason),
        Event::MembershipChanged { members } => print_members(&members),
        Event::ChatReceived { sender, text } => println!("{}: {}", sender, text),
        Event::PeerVolumeUpdated { username, level } => {
            if debug {
                eprintln!("meter {} {:.2}", username, level);
            }
        }
        Event::PeerLeft { username } => println!("{} left the room", username),
        Event::CallEnded { host_ended } => {
            if host_ended {
                println!("The host ended the call");
            } else {
                println!("Call ended");
            }
        }
        Event::RoomClosed => println!("Room closed"),
        Event::AudioError { detail } => eprintln!("Audio: {}", detail),
        Event::Error { detail } => eprintln!("Error: {}", detail),
    }
}

fn print_members(members: &[lancall_common::protocol::Member]) {
    let list: Vec<String> = members
        .iter()
        .map(|m| format!("{} ({})", m.username, m.role))
        .collect();
    println!("In room: {}", list.join(", "));
}
