use std::fs;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mmd_backend::{load_catalog, BackendApi, HttpBackend};
use mmd_push::{PushChannelManager, PushSignal, WsTransport};
use mmd_schemas::{
    JoinQueueRequest, MatchEvent, Notification, PoolSnapshot, PushEvent, PushEventKind, Region,
};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "mmd")]
#[command(about = "Matchmaking dashboard CLI", long_about = None)]
struct Cli {
    /// Backend REST base
    #[arg(
        long,
        global = true,
        env = "MMD_API_BASE",
        default_value = "http://localhost:8000/api/v2"
    )]
    api_base: String,

    /// Backend push channel URL
    #[arg(
        long,
        global = true,
        env = "MMD_PUSH_URL",
        default_value = "ws://localhost:8000/ws"
    )]
    push_url: String,

    /// Per-request timeout in milliseconds
    #[arg(long, global = true, default_value_t = 10_000)]
    request_timeout_ms: u64,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List game modes (falls back to the built-in set if the backend fails)
    Modes {
        /// Catalog request timeout in milliseconds
        #[arg(long, default_value_t = 5_000)]
        timeout_ms: u64,
    },

    /// Print the backend system status line
    Status,

    /// Print per-mode pool sizes
    Pool,

    /// Queue one player
    Join {
        /// Game mode key
        #[arg(long)]
        mode: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        skill: i64,

        /// in-central | us-east | eu-west | asia-se
        #[arg(long, value_parser = parse_region)]
        region: Region,
    },

    /// Follow the push channel and print events
    Watch {
        /// Identity presented on the push channel
        #[arg(long, default_value = "dashboard")]
        client_id: String,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local ...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Verify the hash chain of an exported history (JSONL)
    VerifyHistory {
        path: String,
    },
}

fn parse_region(s: &str) -> Result<Region, String> {
    Region::parse(s).ok_or_else(|| {
        let known: Vec<&str> = Region::ALL.iter().map(Region::as_str).collect();
        format!("unknown region {s:?}; expected one of {}", known.join(", "))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let api = HttpBackend::new(
        cli.api_base.clone(),
        Duration::from_millis(cli.request_timeout_ms),
    )
    .context("build backend client")?;

    match cli.cmd {
        Commands::Modes { timeout_ms } => {
            let load = load_catalog(
                &api,
                Duration::from_millis(timeout_ms),
                mmd_config::default_fallback_modes(),
            )
            .await;
            for n in &load.notifications {
                if let Some(msg) = n.log_message() {
                    eprintln!("{msg}");
                }
            }
            for mode in load.catalog.modes() {
                println!("{}\t{}", mode.key, mode.description);
            }
        }

        Commands::Status => {
            let status = api.system_status().await.context("system_status")?;
            println!("{}", status.display_line());
        }

        Commands::Pool => {
            let pool = api.pool_status().await.context("pool_status")?;
            print!("{}", render_pool(&pool));
        }

        Commands::Join {
            mode,
            name,
            skill,
            region,
        } => {
            let req = JoinQueueRequest::single_region(name, skill, region);
            let resp = match api.join_queue(&mode, &req).await {
                Ok(r) => r,
                Err(e) => bail!("Failed to queue player - {}", e.reason()),
            };
            match resp.ticket_id() {
                Some(id) => println!("ticket_id={id}"),
                None => println!("ticket_id="),
            }
        }

        Commands::Watch { client_id } => watch(&cli.push_url, &client_id).await?,

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = mmd_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::VerifyHistory { path } => {
            let content =
                fs::read_to_string(&path).with_context(|| format!("read history: {path}"))?;
            match mmd_audit::verify_hash_chain_str(&content)? {
                mmd_audit::VerifyResult::Valid { lines } => println!("valid lines={lines}"),
                mmd_audit::VerifyResult::Broken { line, reason } => {
                    bail!("broken at line {line}: {reason}")
                }
            }
        }
    }

    Ok(())
}

fn render_pool(pool: &PoolSnapshot) -> String {
    let mut out = String::new();
    for (mode, stats) in &pool.pool_status {
        out.push_str(&format!("{mode}\t{}\n", stats.queue_size));
    }
    out.push_str(&format!(
        "TOTAL\t{} ({} active)\n",
        pool.total_queued(),
        pool.active_queue_count()
    ));
    out
}

fn render_match(m: &MatchEvent) -> Vec<String> {
    let mut lines = vec![format!(
        "[*] MATCH FOUND: {} | {} | {} | {} players",
        m.match_id,
        m.game_mode.to_uppercase(),
        m.region,
        m.ticket_ids.len()
    )];
    for (team, players) in &m.teams {
        let names: Vec<&str> = players.iter().map(|p| p.player_name.as_str()).collect();
        lines.push(format!("    {team}: {}", names.join(", ")));
    }
    lines
}

/// Printing handlers; the context carries nothing.
fn watch_manager() -> PushChannelManager<()> {
    let mut m = PushChannelManager::new();
    m.register(PushEventKind::MatchFound, |_: &mut (), ev| {
        if let PushEvent::MatchFound(event) = ev {
            for line in render_match(&event) {
                println!("{line}");
            }
        }
    });
    m.register(PushEventKind::DashboardLog, |_: &mut (), ev| {
        if let PushEvent::DashboardLog(log) = ev {
            println!("BACKEND: {}", log.message);
        }
    });
    m.register(PushEventKind::PoolUpdated, |_: &mut (), ev| {
        if let PushEvent::PoolUpdated(u) = ev {
            println!(
                "POOL UPDATE: {} | {}",
                u.game_mode,
                u.action.as_deref().unwrap_or("-")
            );
        }
    });
    m
}

fn print_log(n: Option<Notification>) {
    if let Some(msg) = n.as_ref().and_then(Notification::log_message) {
        eprintln!("{msg}");
    }
}

async fn watch(push_url: &str, client_id: &str) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(256);
    let transport = WsTransport::new(push_url, client_id);
    eprintln!("> connecting to {}", transport.endpoint());
    let task = transport.spawn(tx);

    let mut manager = watch_manager();
    manager.start();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            signal = rx.recv() => match signal {
                Some(PushSignal::Connected) => print_log(manager.on_connect()),
                Some(PushSignal::Disconnected { .. }) => print_log(manager.on_disconnect()),
                Some(PushSignal::Frame(text)) => print_log(manager.dispatch(&mut (), &text).log_line()),
                None => break,
            },
        }
    }
    task.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use mmd_schemas::{PlayerSummary, PoolStats};
    use std::collections::BTreeMap;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn join_parses_region() {
        let cli = Cli::try_parse_from([
            "mmd", "join", "--mode", "1v1_duel", "--name", "ALPHA_01", "--skill", "99",
            "--region", "eu-west",
        ])
        .unwrap();
        match cli.cmd {
            Commands::Join { region, skill, .. } => {
                assert_eq!(region, Region::EuWest);
                assert_eq!(skill, 99);
            }
            _ => panic!("expected join"),
        }
    }

    #[test]
    fn unknown_region_is_rejected() {
        let err = Cli::try_parse_from([
            "mmd", "join", "--mode", "x", "--name", "n", "--skill", "1", "--region", "mars",
        ])
        .err()
        .unwrap();
        assert!(err.to_string().contains("unknown region"));
    }

    #[test]
    fn pool_rendering() {
        let mut pool_status = BTreeMap::new();
        pool_status.insert(
            "1v1_duel".to_string(),
            PoolStats {
                queue_size: 3,
                extra: BTreeMap::new(),
            },
        );
        pool_status.insert("2v2_clash".to_string(), PoolStats::default());
        let out = render_pool(&PoolSnapshot { pool_status });
        assert_eq!(out, "1v1_duel\t3\n2v2_clash\t0\nTOTAL\t3 (1 active)\n");
    }

    #[test]
    fn match_rendering_lists_teams() {
        let mut teams = BTreeMap::new();
        teams.insert(
            "A".to_string(),
            vec![
                PlayerSummary {
                    player_name: "ALPHA_01".to_string(),
                    skill: None,
                    region: None,
                },
                PlayerSummary {
                    player_name: "BRAVO_02".to_string(),
                    skill: None,
                    region: None,
                },
            ],
        );
        let m = MatchEvent {
            match_id: "M-1".to_string(),
            game_mode: "2v2_clash".to_string(),
            region: "us-east".to_string(),
            ticket_ids: vec!["a".to_string(), "b".to_string()],
            teams,
            timestamp: None,
        };
        assert_eq!(
            render_match(&m),
            vec![
                "[*] MATCH FOUND: M-1 | 2V2_CLASH | us-east | 2 players",
                "    A: ALPHA_01, BRAVO_02",
            ]
        );
    }
}
