//! Small MPD remote.
//!
//! ```text
//! cargo run -p pmompd --example mpd_remote -- [host[:port]] [command]
//! ```
//!
//! Commands: `albums`, `status`, `outputs`, `watch` (default), `play`,
//! `pause`, `next`, `previous`. Without a host the configuration is used
//! (`~/.pmompd/config.yaml`, `PMOMPD_CONFIG__SERVER__HOSTNAME`, ...).

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{RecvTimeoutError, unbounded};
use pmompd::{EntityType, MpdBridge, MpdConfig, PlayerEvent, ServerDescriptor};
use tracing_subscriber::EnvFilter;

const WAIT: Duration = Duration::from_secs(10);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1);
    let mut config = MpdConfig::load(None)?;
    let mut command = "watch".to_string();

    if let Some(first) = args.next() {
        if first.contains('.') || first.contains(':') || first == "localhost" {
            config.server = Some(parse_server(&first)?);
            if let Some(cmd) = args.next() {
                command = cmd;
            }
        } else {
            command = first;
        }
    }
    if config.server.is_none() {
        config.server = Some(ServerDescriptor::new("localhost", 6600));
    }

    let bridge = MpdBridge::new(&config)?;
    bridge.initialize().context("Could not reach MPD")?;

    match command.as_str() {
        "albums" => {
            let (tx, rx) = unbounded();
            bridge.entities_for_type(EntityType::Albums, move |r| {
                let _ = tx.send(r);
            });
            let albums = rx.recv_timeout(WAIT)??;
            for name in albums.names() {
                println!("{}", name);
            }
        }
        "status" => {
            let (tx, rx) = unbounded();
            bridge.stats(move |r| {
                let _ = tx.send(r);
            });
            let stats = rx.recv_timeout(WAIT)??;
            println!(
                "{} artists, {} albums, {} songs",
                stats.artists, stats.albums, stats.songs
            );
        }
        "outputs" => {
            let (tx, rx) = unbounded();
            bridge.available_outputs(move |r| {
                let _ = tx.send(r);
            });
            for output in rx.recv_timeout(WAIT)?? {
                let mark = if output.enabled { "x" } else { " " };
                println!("[{}] {} {}", mark, output.id, output.name);
            }
        }
        "play" => bridge.play(),
        "pause" => bridge.toggle_pause(),
        "next" => bridge.next_track(),
        "previous" => bridge.previous_track(),
        "watch" => watch(&bridge)?,
        other => return Err(anyhow!("Unknown command: {}", other)),
    }

    // Le pont traite ses jobs dans l'ordre: un aller-retour suffit à vider la file.
    let _ = bridge.current_state();
    Ok(())
}

fn watch(bridge: &MpdBridge) -> Result<()> {
    // Album lookups need the album list when browsing by tags.
    let (tx, rx) = unbounded();
    bridge.prefetch_all_entities(move |r| {
        let _ = tx.send(r);
    });
    rx.recv_timeout(WAIT)??;

    let events = bridge.subscribe();
    println!("Watching player, Ctrl-C to quit");
    loop {
        match events.recv_timeout(Duration::from_secs(30)) {
            Ok(PlayerEvent::TrackChanged(info)) => println!(
                "> {} - {} ({})",
                info.track.artist, info.track.name, info.album.name
            ),
            Ok(PlayerEvent::StatusChanged(info)) => println!("  {:?}", info.status),
            Ok(PlayerEvent::NowPlaying(_)) => {}
            Err(RecvTimeoutError::Timeout) => {
                if !bridge.is_connected() {
                    return Err(anyhow!("Lost connection to MPD"));
                }
            }
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }
}

fn parse_server(arg: &str) -> Result<ServerDescriptor> {
    match arg.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .with_context(|| format!("Invalid port in {}", arg))?;
            Ok(ServerDescriptor::new(host, port))
        }
        None => Ok(ServerDescriptor::new(arg, 6600)),
    }
}
