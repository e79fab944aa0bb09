#![allow(unused_crate_dependencies)]
#![allow(clippy::print_stdout)]

//! Interactive peripheral simulator. Transport calls are logged instead of
//! being sent to a Bluetooth controller, and host events are typed on stdin.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use sscanf::sscanf;
use tracing::{info, warn};

use hidpad::att::Handle;
use hidpad::gatt::{ServiceDef, Uuid16};
use hidpad::hid::kbd::Key;
use hidpad::hid::media::MediaKey;
use hidpad::hid::mouse::Button;
use hidpad::hid::usage;
use hidpad::le::{Addr, RawAddr};
use hidpad::*;

#[derive(Clone, Debug, clap::Parser)]
struct Args {
    /// Configuration file. The per-user configuration is used by default.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the combined report topology.
    #[arg(long)]
    combined: bool,

    /// Enable notifications automatically when a host connects.
    #[arg(short, long)]
    auto_enable: bool,
}

/// Transport that logs every call.
#[derive(Debug, Default)]
struct LogTransport;

impl Transport for LogTransport {
    fn adapter_state(&self) -> AdapterState {
        AdapterState::Ready
    }

    fn start_advertising(&self, p: &AdvParams) -> Result<(), AdvError> {
        info!("Advertising: {p:?}");
        Ok(())
    }

    fn stop_advertising(&self) {
        info!("Advertising stopped");
    }

    fn add_service(&self, s: &ServiceDef) -> Result<(), TransportError> {
        info!("Service {:?} {}..{}", s.uuid(), s.handle(), s.end_handle());
        for c in s.characteristics() {
            info!("  {:?} {} {:?}", c.uuid(), c.value_handle(), c.properties());
            for d in c.descriptors() {
                info!("    {:?} {} {:02X?}", d.uuid(), d.handle(), d.value());
            }
        }
        Ok(())
    }

    fn remove_service(&self, s: &ServiceDef) {
        info!("Service {:?} removed", s.uuid());
    }

    fn notify(&self, peer: Addr, hdl: Handle, _: Uuid16, v: &[u8]) -> bool {
        println!("{peer} {hdl} <- {v:02X?}");
        true
    }

    fn connect_client(&self, peer: Addr) -> bool {
        info!("Client connection to {peer}");
        true
    }

    fn disconnect_client(&self, peer: Addr) {
        info!("Client connection to {peer} closed");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let mut cfg = match args.config {
        Some(ref path) => Config::load(path)?,
        None => Config::per_user("hidpad")?,
    };
    if args.combined {
        cfg.topology = hids::Topology::Combined;
    }
    let p = Peripheral::new(Arc::new(LogTransport), cfg);
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let event_loop = p.event_loop(rx);
    p.start()?;
    let r = serve(&args, &p, tx).await;
    p.close();
    event_loop.stop().await;
    r
}

async fn serve(
    args: &Args,
    p: &Peripheral<LogTransport>,
    events: tokio::sync::mpsc::UnboundedSender<Event>,
) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::channel(1);
    std::thread::spawn(move || {
        for ln in std::io::BufReader::new(std::io::stdin()).lines() {
            tx.blocking_send(ln?)?;
        }
        Ok::<_, anyhow::Error>(())
    });
    let host = Addr::Random(RawAddr::new([0x01, 0x02, 0x03, 0x04, 0x05, 0xC6]));
    loop {
        let ln: String = tokio::select! {
            ln = rx.recv() => match ln {
                None => return Ok(()),
                Some(ln) => ln,
            },
            _ = tokio::signal::ctrl_c() => return Ok(()),
        };
        let mut tok = ln.split_ascii_whitespace();
        let Some(cmd) = tok.next() else { continue };
        let r = match (cmd, tok.collect::<Vec<&str>>().join(" ")) {
            ("connect", _) => {
                events.send(Event::Connected(host))?;
                if args.auto_enable {
                    tokio::task::yield_now().await;
                    enable_all(p, host);
                }
                Ok(true)
            }
            ("disconnect", _) => {
                events.send(Event::Disconnected(host))?;
                Ok(true)
            }
            ("enable", _) => {
                enable_all(p, host);
                Ok(true)
            }
            ("mtu", params) => {
                let Ok(mtu) = sscanf!(params, "{u16}") else { continue };
                events.send(Event::MtuChanged(host, mtu))?;
                Ok(true)
            }
            ("move" | "m", params) => {
                let Ok((dx, dy)) = sscanf!(params, "{i32} {i32}") else { continue };
                p.move_pointer(dx, dy).await
            }
            ("click" | "c", params) => {
                let btn = match sscanf!(params, "{u8}") {
                    Ok(v) if v < 3 => Button::from_bits_retain(1 << v),
                    _ => Button::LEFT,
                };
                p.click(btn).await
            }
            ("scroll" | "s", params) => {
                let Ok(v) = sscanf!(params, "{i32}") else { continue };
                p.scroll(v).await
            }
            ("key" | "k", params) => {
                let Ok(v) = sscanf!(params, "{u8:x}") else { continue };
                p.tap_key(Key::from(usage::Key::from(v))).await
            }
            ("type" | "t", text) => p.type_text(&text).await.map(|n| n > 0),
            ("media", params) => {
                let m = match params.as_str() {
                    "play" => MediaKey::PLAY_PAUSE,
                    "next" => MediaKey::NEXT_TRACK,
                    "prev" => MediaKey::PREV_TRACK,
                    "up" => MediaKey::VOLUME_UP,
                    "down" => MediaKey::VOLUME_DOWN,
                    "mute" => MediaKey::MUTE,
                    _ => continue,
                };
                p.tap_media(m).await
            }
            ("release", _) => p.release_all().await,
            ("info", _) => {
                println!("{:?} {:?}", p.state(), p.stats());
                println!("{:?}", p.connection_info());
                Ok(true)
            }
            ("quit" | "q", _) => return Ok(()),
            _ => {
                println!("Unknown command: {cmd}");
                continue;
            }
        };
        match r {
            Ok(true) => {}
            Ok(false) => warn!("Report not delivered"),
            Err(e) => warn!("{cmd} failed: {e}"),
        }
    }
}

/// Simulates the host enabling notifications for every input report.
fn enable_all(p: &Peripheral<LogTransport>, host: Addr) {
    for c in p.service().def().characteristics() {
        if let Some(cccd) = c.cccd() {
            if let Err(e) = p.on_descriptor_write(host, cccd, 0, &[1, 0]) {
                warn!("Failed to enable {}: {e}", c.value_handle());
            }
        }
    }
}
