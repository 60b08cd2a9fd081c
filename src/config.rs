//! Command line and server configuration

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::transport::Liveness;

pub const DEFAULT_PORT: u16 = 5000;

#[derive(Parser, Debug)]
#[command(name = "rover-signal", version, about = "WebRTC signaling relay")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the signaling server
    Server(ServerArgs),
    /// Start the server in the background and open a client view on it
    Launch(LaunchArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Directory holding server.html, mobile.html and their assets
    #[arg(long, default_value = "public")]
    pub public_dir: PathBuf,

    #[arg(long, default_value_t = 25)]
    pub ping_interval_secs: u64,

    #[arg(long, default_value_t = 60)]
    pub ping_timeout_secs: u64,

    #[arg(long, default_value_t = 20)]
    pub poll_wait_secs: u64,

    /// Frames queued per peer before new ones are dropped
    #[arg(long, default_value_t = 64)]
    pub outbound_buffer: usize,

    #[arg(long)]
    pub debug: bool,
}

#[derive(Args, Debug, Clone)]
pub struct LaunchArgs {
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Which page the client view shows
    #[arg(long, value_enum, default_value_t = Page::Server)]
    pub page: Page,

    #[arg(long, default_value_t = 10)]
    pub ready_timeout_secs: u64,

    /// Only print the client view URL
    #[arg(long)]
    pub no_open: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Server,
    Mobile,
}

impl Page {
    pub fn path(self) -> &'static str {
        match self {
            Page::Server => "/server",
            Page::Mobile => "/mobile",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub public_dir: PathBuf,
    pub liveness: Liveness,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            public_dir: PathBuf::from("public"),
            liveness: Liveness::default(),
        }
    }
}

impl From<&ServerArgs> for ServerConfig {
    fn from(args: &ServerArgs) -> Self {
        ServerConfig {
            addr: SocketAddr::new(args.host, args.port),
            public_dir: args.public_dir.clone(),
            liveness: Liveness {
                ping_interval: Duration::from_secs(args.ping_interval_secs.max(1)),
                ping_timeout: Duration::from_secs(args.ping_timeout_secs.max(1)),
                poll_wait: Duration::from_secs(args.poll_wait_secs),
                outbound_buffer: args.outbound_buffer,
            },
        }
    }
}
