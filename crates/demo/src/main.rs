//! Minimal chat over the session layer: one process hosts, others join and
//! everyone's messages are echoed to all participants.
//!
//!     mooring-demo --serve --name alice
//!     mooring-demo --connect 127.0.0.1 --name bob

use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;

use mooring::{
    BROADCAST, GAME_KIND_BASE, NetConfig, NetworkService, Packet, PacketKind, SessionState,
};

const CHAT: PacketKind = PacketKind::Game(GAME_KIND_BASE);

#[derive(Parser)]
#[command(name = "mooring-demo")]
#[command(about = "Session-layer chat demo")]
struct Args {
    /// Host a session on the given port.
    #[arg(long)]
    serve: bool,

    /// Join the host at this address.
    #[arg(long, conflicts_with = "serve")]
    connect: Option<String>,

    #[arg(short, long, default_value_t = 1750)]
    port: u16,

    #[arg(short, long, default_value = "anonymous")]
    name: String,

    /// Ticks per second for both session loops.
    #[arg(long, default_value_t = 30)]
    tick_rate: u32,

    #[arg(long, default_value_t = 8)]
    max_clients: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = NetConfig::default();
    config.port = args.port;
    config.max_clients = args.max_clients;
    let mut service = NetworkService::new(config);

    let tick = Duration::from_secs(1) / args.tick_rate.max(1);

    if args.serve {
        run_host(&mut service, tick)
    } else if let Some(addr) = args.connect {
        run_client(&mut service, &addr, &args.name, tick)
    } else {
        anyhow::bail!("pass --serve or --connect <address>");
    }
}

fn run_host(service: &mut NetworkService, tick: Duration) -> Result<()> {
    // Chat packets arriving from clients are collected here and rebroadcast
    // from the main loop.
    let inbox: Rc<RefCell<Vec<Packet>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&inbox);
    service.hooks_mut().set_interpret_client(move |packet| {
        if packet.header.kind != CHAT {
            return false;
        }
        sink.borrow_mut().push(packet.clone());
        true
    });
    service
        .hooks_mut()
        .set_interpret_server(|packet| print_chat(packet));

    let port = service.start_hosting()?;
    log::info!("serving on port {port}");

    loop {
        service.server_tick();
        service.client_tick();

        for packet in inbox.borrow_mut().drain(..) {
            log::info!(
                "relaying chat from client {}: {}",
                packet.client_id(),
                String::from_utf8_lossy(&packet.payload)
            );
            service.send_from_server(CHAT, BROADCAST, &packet.payload);
        }

        thread::sleep(tick);
    }
}

fn run_client(
    service: &mut NetworkService,
    addr: &str,
    name: &str,
    tick: Duration,
) -> Result<()> {
    service
        .hooks_mut()
        .set_interpret_server(|packet| print_chat(packet));

    service.join_host(addr, name.as_bytes())?;

    let mut counter = 0u32;
    let mut last_message = Instant::now();

    loop {
        service.client_tick();

        match service.session_state() {
            SessionState::Disconnected => {
                if let Some(reason) = service.last_deny_reason() {
                    anyhow::bail!("join denied: {reason}");
                }
                anyhow::bail!("disconnected from host");
            }
            SessionState::Authorized => {
                if last_message.elapsed() >= Duration::from_secs(2) {
                    counter += 1;
                    let message = format!("{name} says hello #{counter}");
                    service.send_from_client(CHAT, message.as_bytes());
                    last_message = Instant::now();
                }
            }
            _ => {}
        }

        thread::sleep(tick);
    }
}

fn print_chat(packet: &Packet) -> bool {
    if packet.header.kind != CHAT {
        return false;
    }
    log::info!("chat: {}", String::from_utf8_lossy(&packet.payload));
    true
}
