//! `dispatchd`: run the dispatch engine from the command line.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use ticket_dispatch::config::Config;
use ticket_dispatch::engine::{AutoDispatcher, DispatchEngine, TickerConfig};
use ticket_dispatch::event::{BroadcastObserver, ChannelSink, DispatchSnapshot};
use ticket_dispatch::model::{CallClass, ClientClass, NewTicket, Ticket};
use ticket_dispatch::roster::Roster;
use ticket_dispatch::telemetry::{TelemetryConfig, init_telemetry};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "dispatchd", about = "Support-ticket dispatch engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the engine with timed auto-dispatch until Ctrl-C
    Serve {
        /// Roster TOML (overrides DISPATCH_ROSTER)
        #[arg(long)]
        roster: Option<PathBuf>,
        /// Use the built-in two-agent roster instead of a file
        #[arg(long, conflicts_with = "roster")]
        sample_roster: bool,
        /// JSON array of ticket requests to queue at startup
        #[arg(long)]
        seed: Option<PathBuf>,
        /// Seconds between dispatch ticks (overrides DISPATCH_TICK_SECS; 0 disables)
        #[arg(long)]
        tick_secs: Option<u64>,
    },
    /// Queue a handful of sample tickets against the sample roster and work them through
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "dispatchd".to_string(),
        log_level: config.log_level.clone(),
    })?;

    match cli.command {
        Command::Serve {
            roster,
            sample_roster,
            seed,
            tick_secs,
        } => {
            let roster = if sample_roster {
                Roster::sample()
            } else {
                match roster.or(config.roster_path.clone()) {
                    Some(path) => Roster::load(&path)?,
                    None => Roster::empty(),
                }
            };
            let interval = match tick_secs {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => config.tick_interval,
            };
            cmd_serve(roster, seed, interval).await
        }
        Command::Demo => cmd_demo(),
    }
}

async fn cmd_serve(
    roster: Roster,
    seed: Option<PathBuf>,
    interval: Option<Duration>,
) -> anyhow::Result<()> {
    let (sink, mut notifications) = ChannelSink::new();
    let observer = BroadcastObserver::new(64);
    let mut snapshots = observer.subscribe();
    let engine = DispatchEngine::new(Arc::new(sink), Arc::new(observer));

    if roster.is_empty() {
        warn!("no agents registered; dispatched tickets will wait for assignment");
    }
    roster.register_all(&engine)?;

    tokio::spawn(async move {
        while let Some(n) = notifications.recv().await {
            println!("[{}] {}", n.title(), n.message());
        }
    });
    tokio::spawn(async move {
        loop {
            match snapshots.recv().await {
                Ok(s) => info!(
                    pending = s.pending.len(),
                    in_progress = s.in_progress.len(),
                    awaiting_agent = s.awaiting_agent.len(),
                    "state changed"
                ),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "snapshot consumer lagging");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    if let Some(path) = seed {
        let content = std::fs::read_to_string(&path)?;
        let requests: Vec<NewTicket> = serde_json::from_str(&content)?;
        for request in requests {
            match engine.add_ticket(request) {
                Ok(t) => info!(ticket_id = %t.id, "seed ticket queued"),
                Err(e) => warn!(error = %e, "seed ticket rejected"),
            }
        }
    }

    let Some(interval) = interval else {
        info!("auto-dispatch disabled; waiting for Ctrl-C");
        tokio::signal::ctrl_c().await?;
        print_snapshot(&engine.snapshot());
        return Ok(());
    };

    let dispatcher = AutoDispatcher::new(engine.clone(), TickerConfig { interval });
    let stopper = dispatcher.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        stopper.shutdown();
    });

    let dispatched = dispatcher.run().await;
    info!(dispatched, "stopped");
    print_snapshot(&engine.snapshot());
    Ok(())
}

fn cmd_demo() -> anyhow::Result<()> {
    let (sink, _rx) = ChannelSink::new();
    let engine = DispatchEngine::new(
        Arc::new(sink),
        Arc::new(ticket_dispatch::event::NoopObserver),
    );
    Roster::sample().register_all(&engine)?;

    let samples = [
        ("Company A", ClientClass::Demo, CallClass::Question, "How do I generate a report?"),
        ("Company B", ClientClass::Priority, CallClass::ServerDown, "Main server offline"),
        ("Company C", ClientClass::Standard, CallClass::ProductionImpact, "Sales module not working"),
        ("Company D", ClientClass::Standard, CallClass::NoImpact, "Typo on the invoice page"),
        ("Company E", ClientClass::Priority, CallClass::ServerDown, "Database cluster unreachable"),
    ];
    for (client, client_class, call_class, description) in samples {
        engine.add_ticket(NewTicket::of(client, client_class, call_class).description(description))?;
    }

    println!("== queued");
    print_snapshot(&engine.snapshot());

    while let Some(d) = engine.dispatch_next() {
        println!(
            "dispatched {} -> {}",
            d.ticket.id,
            d.assigned_to.as_deref().unwrap_or("(no free agent)")
        );
    }

    let in_progress: Vec<String> = engine
        .snapshot()
        .in_progress
        .into_iter()
        .map(|t| t.id)
        .collect();
    for id in in_progress {
        let done = engine.complete_ticket(&id)?;
        println!(
            "resolved {} by {}; picked up {}",
            done.resolved.id,
            done.resolved_by,
            done.reassigned.as_ref().map_or("-", |t| t.id.as_str())
        );
    }

    println!("== final");
    print_snapshot(&engine.snapshot());
    Ok(())
}

fn print_snapshot(s: &DispatchSnapshot) {
    print_tickets("PENDING", &s.pending);
    print_tickets("IN PROGRESS", &s.in_progress);
    print_tickets("AWAITING AGENT", &s.awaiting_agent);

    println!("AGENTS");
    for agent in &s.agents {
        let caps: Vec<&str> = agent.capabilities.iter().map(|c| c.token()).collect();
        println!(
            "  {:<6}  {:<16}  {:<8}  {}",
            agent.id,
            agent.name,
            agent.current_ticket.as_deref().unwrap_or("-"),
            caps.join(",")
        );
    }
}

fn print_tickets(heading: &str, tickets: &[Ticket]) {
    println!("{heading} ({})", tickets.len());
    for t in tickets {
        println!(
            "  {:<8}  {:<6}  {:<18}  {:<9}  {:<12}  {:>4}m  {}",
            t.id,
            t.priority_key().to_string(),
            t.call_class,
            t.client_class,
            t.client_name,
            t.estimated_resolution.num_minutes(),
            t.assigned_agent.as_deref().unwrap_or("-")
        );
    }
}
