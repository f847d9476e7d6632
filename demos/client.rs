//! Cooperative client driven from a fixed-rate loop.
//!
//! Run: cargo run --example client -- ws://127.0.0.1:9001/
//! Set RUST_LOG=mcu_ws=debug to watch the handshake and reconnects.

use std::error::Error;
use std::thread;
use std::time::{Duration, Instant};

use mcu_ws::{CloseFrame, Config, Handler, Message, TcpTransport};
use tracing_subscriber::EnvFilter;

const DEFAULT_URL: &str = "ws://mcu_proto.jetperch.com/ws";
const TICK: Duration = Duration::from_millis(10);

/// Prints whatever the server sends.
#[derive(Default)]
struct Printer {
    received: usize,
}

impl Handler for Printer {
    fn on_connect(&mut self) {
        println!("connected");
    }

    fn on_message(&mut self, message: Message) {
        self.received += 1;
        match message {
            Message::Text(text) => println!("<- {text}"),
            Message::Binary(data) => println!("<- {} bytes", data.len()),
        }
    }

    fn on_close(&mut self, frame: Option<CloseFrame>) {
        println!("server closed: {frame:?}");
    }

    fn on_disconnect(&mut self) {
        println!("connection lost, will retry");
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let url = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_URL.to_string());
    let config = Config::default().with_retry_ticks(200);
    let mut client = mcu_ws::Client::with_config(&url, config, TcpTransport::new(), Printer::default())?;

    if let Err(err) = client.connect() {
        // poll() keeps retrying on its own.
        println!("initial connect failed: {err}");
    }

    let started = Instant::now();
    let mut last_send = Instant::now();
    while started.elapsed() < Duration::from_secs(30) {
        if let Err(err) = client.poll() {
            println!("poll: {err}");
        }

        if client.is_connected() && last_send.elapsed() >= Duration::from_secs(2) {
            let uptime = started.elapsed().as_secs();
            client.send(&format!("uptime {uptime}s"))?;
            client.send_ping()?;
            last_send = Instant::now();
        }

        thread::sleep(TICK);
    }

    client.close()?;
    for _ in 0..10 {
        client.poll()?;
        thread::sleep(TICK);
    }
    println!("received {} messages", client.handler().received);
    Ok(())
}
