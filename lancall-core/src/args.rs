//! Command-line argument parsing

use clap::Parser;
use lancall_common::{
    DEFAULT_CHAT_PORT, DEFAULT_DISCOVERY_PORT, DEFAULT_PRESENCE_PORT, DEFAULT_SESSION_PORT,
};

/// Serverless voice rooms on the local network
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Display name to use in rooms (overrides saved settings)
    #[arg(short, long)]
    pub username: Option<String>,

    /// Create a room immediately on startup
    #[arg(long, default_value = "false", conflicts_with = "join")]
    pub host: bool,

    /// Join the room with this code immediately on startup
    #[arg(long)]
    pub join: Option<String>,

    /// Accept incoming join requests without prompting
    #[arg(long, default_value = "false")]
    pub auto_accept: bool,

    /// TCP port for the join handshake and audio streams
    #[arg(long, default_value_t = DEFAULT_SESSION_PORT)]
    pub session_port: u16,

    /// UDP port for room discovery broadcasts
    #[arg(long, default_value_t = DEFAULT_DISCOVERY_PORT)]
    pub discovery_port: u16,

    /// UDP port for presence broadcasts
    #[arg(long, default_value_t = DEFAULT_PRESENCE_PORT)]
    pub presence_port: u16,

    /// UDP port for chat broadcasts
    #[arg(long, default_value_t = DEFAULT_CHAT_PORT)]
    pub chat_port: u16,

    /// Input device name (overrides saved settings)
    #[arg(long)]
    pub input_device: Option<String>,

    /// Output device name (overrides saved settings)
    #[arg(long)]
    pub output_device: Option<String>,

    /// List audio devices and exit
    #[arg(long, default_value = "false")]
    pub list_devices: bool,

    /// Enable debug logging
    #[arg(long, default_value = "false")]
    pub debug: bool,
}
