//! linkmgrd — per-ToR daemon that drives dual-ToR MUX cable forwarding state.

mod wiring;

use clap::Parser;

use linkmgrd_core::config::{parse_ipv4, parse_mac, GlobalConfig, DEFAULT_LOOPBACK_SRC_IPV4};
use linkmgrd_core::kv::KvSubscriber;
use linkmgrd_core::mux_manager::MuxManager;
use linkmgrd_kv::InMemoryKv;

use wiring::DeviceConfig;

/// Flat flag set mirroring the daemon's historical `-v -e -m -d -l -s`
/// options; there are no subcommands, only switches.
#[derive(Parser)]
#[command(name = "linkmgrd")]
#[command(about = "Per-ToR daemon that drives dual-ToR MUX cable forwarding state")]
#[command(version = linkmgrd_core::VERSION)]
struct Cli {
    /// Logging verbosity level.
    #[arg(short = 'v', long, default_value = "debug", value_parser = ["trace", "debug", "info", "warn", "error"])]
    verbosity: String,

    /// Also write logs to an extra rotated log file under /var/log/mux.
    #[arg(short = 'e', long)]
    extra_log_file: bool,

    /// Decrease the link prober interval after a switchover, to better
    /// measure switchover overhead.
    #[arg(short = 'm', long)]
    measure_switchover_overhead: bool,

    /// Disable heartbeat sending and avoid switching to active when the
    /// default route is missing.
    #[arg(short = 'd', long)]
    default_route: bool,

    /// Simulate hardware LFD offload by posting link prober state change
    /// notifications straight to the KV store.
    #[arg(short = 's', long)]
    simulate_lfd_offload: bool,
}

fn init_logger(verbosity: &str, extra_log_file: bool) {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(verbosity);
    builder.init();
    if extra_log_file {
        log::info!("extra_log_file requested; linkmgrd writes only to stderr in this build");
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logger(&cli.verbosity, cli.extra_log_file);

    log::info!("linkmgrd starting (verbosity={})", cli.verbosity);

    let mut global = GlobalConfig::default();
    global.enable_switchover_measurement = cli.measure_switchover_overhead;
    global.enable_default_route_feature = !cli.default_route;

    if cli.simulate_lfd_offload {
        log::info!("simulate_lfd_offload enabled: link prober transitions will be mirrored to the KV store directly");
    }

    // Separate tables standing in for the `device metadata` / `vlan` /
    // `loopback interface` / `warm restart` / `mux cable` rows of §6.
    // Nothing in this build populates them on its own; a real deployment
    // (or a test harness acting as one) `set`s the required rows before or
    // while linkmgrd is running.
    let device_metadata_kv = InMemoryKv::new("DEVICE_METADATA");
    let vlan_kv = InMemoryKv::new("VLAN");
    let loopback_kv = InMemoryKv::new("LOOPBACK_INTERFACE");
    let warm_restart_kv = InMemoryKv::new("WARM_RESTART");
    let cable_kv = InMemoryKv::new("MUX_CABLE_TABLE");

    let Some(tor_mac) = device_metadata_kv
        .get("localhost")
        .and_then(|fields| fields.get("mac").cloned())
        .and_then(|raw| parse_mac("mac", &raw).ok())
    else {
        log::error!("required configuration missing: no ToR MAC in device metadata, exiting");
        return std::process::ExitCode::FAILURE;
    };
    let vlan_mac = vlan_kv
        .get("Vlan1000")
        .and_then(|fields| fields.get("mac").cloned())
        .and_then(|raw| parse_mac("mac", &raw).ok());
    let loopback_src_ipv4 = loopback_kv
        .get("Loopback2")
        .and_then(|fields| fields.get("ipv4").cloned())
        .and_then(|raw| parse_ipv4("ipv4", &raw).ok())
        .unwrap_or_else(|| {
            log::info!("no loopback interface row yet, using default loopback source {DEFAULT_LOOPBACK_SRC_IPV4}");
            DEFAULT_LOOPBACK_SRC_IPV4
        });
    let device = DeviceConfig {
        tor_mac,
        vlan_mac,
        loopback_src_ipv4,
    };

    let manager = MuxManager::new(global.clone(), cable_kv.clone());
    let handle = manager.spawn();

    // Warm-restart status is read once at startup (§6) and, if set, arms
    // the reconciliation timer MuxManager runs against whatever ports the
    // cable table already names (§4.7).
    let warm_restart = warm_restart_kv
        .get("system")
        .and_then(|fields| fields.get("enabled").cloned())
        .is_some_and(|raw| raw == "true");
    let initial_ports = cable_kv.keys().len();
    if warm_restart {
        log::info!("warm-restart detected: arming reconciliation timer for {initial_ports} port(s)");
        let _ = handle.start_warm_restart_reconciliation_timer(initial_ports);
    }

    let subscriber: Box<dyn KvSubscriber> = Box::new(cable_kv.subscribe());
    tokio::spawn(wiring::run_cable_subscriber(
        handle.clone(),
        subscriber,
        device,
        global,
        warm_restart,
    ));

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::unbounded_channel::<()>();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })
    .expect("failed to install SIGINT/SIGTERM handler");

    log::info!("linkmgrd running; waiting for SIGINT/SIGTERM");
    shutdown_rx.recv().await;

    log::warn!("shutdown requested, draining in-flight port work");
    handle.shutdown().await;

    std::process::ExitCode::SUCCESS
}
