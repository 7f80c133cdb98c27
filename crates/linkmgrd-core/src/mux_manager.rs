//! MuxManager (§4, §5): owns every [`Port`] on the box and is the single
//! task allowed to touch them, reached only through [`MuxManagerHandle`].
//!
//! The original daemon serializes all port mutation onto a single
//! `boost::asio::io_service` strand; the Rust equivalent is an actor task
//! that owns every `Port` and a channel of boxed closures. Anything that
//! wants to touch port state — a KV notification, a heartbeat event, a
//! signal handler — sends a command rather than taking a lock.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::config::{GlobalConfig, Mode, PortConfig};
use crate::error::MuxManagerError;
use crate::kv::KvTable;
use crate::link_manager::LinkManagerAction;
use crate::link_prober::LinkProberEvent;
use crate::link_state::LinkStateEvent;
use crate::mux_state::MuxStateEvent;
use crate::port::Port;
use crate::timer::{Cancellable, TimerOutcome};

/// A unit of work executed against the strand's owned state. Boxed so
/// heterogeneous call sites (KV callbacks, heartbeat pollers, signal
/// handlers, the reconciliation timer) can all enqueue without
/// `MuxManager` knowing about any of them.
type PortJob = Box<dyn FnOnce(&mut StrandState) + Send + 'static>;

pub enum PortCommand {
    Run(PortJob),
    Shutdown(oneshot::Sender<()>),
}

/// Everything the strand task owns exclusively. Only ever touched from
/// inside a [`PortCommand::Run`] closure.
pub struct StrandState {
    pub ports: HashMap<String, Port>,
    pub global: GlobalConfig,
    kv: Arc<dyn KvTable>,
    /// Ports still expected to report their initial state during a warm
    /// restart (§4.7). Reaches zero either by every port decrementing it
    /// or by the reconciliation timer expiring first.
    reconciliation_count: i64,
    reconciled: bool,
    reconciliation_timer: Option<Cancellable>,
}

impl StrandState {
    /// Create-on-first-reference (§4, §6): a port only comes into being
    /// once something — the cable table, a netdev notification — mentions
    /// its name for the first time.
    pub fn ensure_port(&mut self, config: PortConfig) -> &mut Port {
        let global = &self.global;
        self.ports
            .entry(config.port_name.clone())
            .or_insert_with(|| Port::new(config, global.positive_signal_count, global.negative_signal_count))
    }
}

/// Cheaply cloneable handle used by every producer to reach the strand.
/// Dropping every clone closes the channel and lets the strand task exit.
#[derive(Clone)]
pub struct MuxManagerHandle {
    tx: mpsc::UnboundedSender<PortCommand>,
    kv: Arc<dyn KvTable>,
}

impl MuxManagerHandle {
    /// Enqueue `job` to run with exclusive access to the strand state.
    /// Returns an error if the strand has already shut down.
    pub fn run<F>(&self, job: F) -> Result<(), MuxManagerError>
    where
        F: FnOnce(&mut StrandState) + Send + 'static,
    {
        self.tx
            .send(PortCommand::Run(Box::new(job)))
            .map_err(|_| MuxManagerError::StrandClosed)
    }

    /// Create a port on the strand from a live KV row, rather than at
    /// pre-spawn setup time. The subscriber task in `linkmgrd-daemon` is
    /// the main caller: a cable-table row naming a port this process
    /// hasn't seen yet needs to land here before any event can be
    /// dispatched against it.
    pub fn ensure_port(&self, config: PortConfig) -> Result<(), MuxManagerError> {
        self.run(move |state| {
            state.ensure_port(config);
        })
    }

    pub fn dispatch_link_prober_event(&self, port_name: String, event: LinkProberEvent) -> Result<(), MuxManagerError> {
        let kv = self.kv.clone();
        self.run(move |state| {
            if let Some(port) = state.ports.get_mut(&port_name) {
                let actions = port.handle_link_prober_event(event);
                apply_actions(&kv, &port_name, &actions);
            } else {
                log::warn!("{port_name}: link prober event for unknown port");
            }
        })
    }

    pub fn dispatch_mux_state_event(&self, port_name: String, event: MuxStateEvent) -> Result<(), MuxManagerError> {
        let kv = self.kv.clone();
        self.run(move |state| {
            if let Some(port) = state.ports.get_mut(&port_name) {
                let actions = port.handle_mux_state_event(event);
                apply_actions(&kv, &port_name, &actions);
            }
        })
    }

    pub fn dispatch_link_state_event(&self, port_name: String, event: LinkStateEvent) -> Result<(), MuxManagerError> {
        let kv = self.kv.clone();
        self.run(move |state| {
            if let Some(port) = state.ports.get_mut(&port_name) {
                let actions = port.handle_link_state_event(event);
                apply_actions(&kv, &port_name, &actions);
            }
        })
    }

    pub fn set_mode(&self, port_name: String, mode: Mode) -> Result<(), MuxManagerError> {
        self.run(move |state| {
            if let Some(port) = state.ports.get_mut(&port_name) {
                port.set_mode(mode);
            }
        })
    }

    /// Start the warm-restart reconciliation timer (§4.7): arm a deadline
    /// of `global.mux_reconciliation_timeout` and seed the per-port
    /// decrement counter with `expected_ports` (however many cable-table
    /// rows existed at startup). Whichever fires first — the deadline or
    /// the counter reaching zero via [`adjust_reconciliation_count`] —
    /// forces every port still outside `Auto` back to it and marks the
    /// service reconciled. Matches
    /// `MuxManager::startWarmRestartReconciliationTimer` in the original:
    /// natural timeout and early-cancel run the identical forcing logic,
    /// differing only in which log line is emitted.
    pub fn start_warm_restart_reconciliation_timer(&self, expected_ports: usize) -> Result<(), MuxManagerError> {
        let handle = self.clone();
        self.run(move |state| {
            state.reconciliation_count = expected_ports as i64;
            state.reconciled = false;
            if expected_ports == 0 {
                reconcile(state, TimerOutcome::Cancelled);
                return;
            }
            let timeout = state.global.mux_reconciliation_timeout;
            let on_complete_handle = handle.clone();
            state.reconciliation_timer = Some(Cancellable::spawn(timeout, move |outcome| {
                let _ = on_complete_handle.run(move |state| reconcile(state, outcome));
            }));
        })
    }

    /// A port has reported its initial state; decrement the warm-restart
    /// reconciliation counter and, if it has now reached zero, cancel the
    /// deadline timer early (`updateWarmRestartReconciliationCount` in the
    /// original). `delta` is almost always `-1`; it takes a parameter
    /// rather than a fixed decrement since the original also supports
    /// re-incrementing when a port is removed before it has reported.
    pub fn adjust_reconciliation_count(&self, delta: i64) -> Result<(), MuxManagerError> {
        self.run(move |state| {
            if state.reconciled {
                return;
            }
            state.reconciliation_count += delta;
            if state.reconciliation_count <= 0 {
                if let Some(mut timer) = state.reconciliation_timer.take() {
                    timer.cancel();
                }
            }
        })
    }

    pub async fn is_reconciled(&self) -> bool {
        let (tx, rx) = oneshot::channel();
        if self.run(move |state| { let _ = tx.send(state.reconciled); }).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub async fn port_mode(&self, port_name: String) -> Option<Mode> {
        let (tx, rx) = oneshot::channel();
        if self
            .run(move |state| {
                let _ = tx.send(state.ports.get(&port_name).map(|p| p.config.mode));
            })
            .is_err()
        {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Two-phase shutdown: ask the strand to stop accepting new jobs after
    /// draining what's already queued, and wait for it to confirm. Matches
    /// the daemon's `SIGINT`/`SIGTERM` handling of finishing in-flight work
    /// before exiting (§5).
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(PortCommand::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

/// Force every non-`Auto` port back to `Auto` and mark the service
/// reconciled. Runs identically whether reached via natural timer expiry
/// or an early cancel once every port has reported — only the log line
/// differs, mirroring `handleWarmRestartReconciliationTimeout` in the
/// original, which branches on `errorCode` for the message alone.
fn reconcile(state: &mut StrandState, outcome: TimerOutcome) {
    if state.reconciled {
        return;
    }
    match outcome {
        TimerOutcome::Expired => {
            log::warn!("warm-restart reconciliation timer expired; forcing outstanding ports to auto");
        }
        TimerOutcome::Cancelled => {
            log::info!("warm-restart reconciliation satisfied by every port reporting; forcing outstanding ports to auto");
        }
    }
    let kv = state.kv.clone();
    for (name, port) in state.ports.iter_mut() {
        if port.config.mode != Mode::Auto {
            port.set_mode(Mode::Auto);
            let mut fields = HashMap::new();
            fields.insert("mode".to_string(), Mode::Auto.as_str().to_string());
            kv.set(name, fields);
        }
    }
    state.reconciliation_timer = None;
    state.reconciled = true;
}

/// Orchestrates every port and owns the global configuration. Construct
/// with [`MuxManager::spawn`], which returns a handle and hands off the
/// actual [`StrandState`] to a background task.
pub struct MuxManager {
    state: StrandState,
}

impl MuxManager {
    pub fn new(global: GlobalConfig, kv: Arc<dyn KvTable>) -> Self {
        Self {
            state: StrandState {
                ports: HashMap::new(),
                global,
                kv,
                reconciliation_count: 0,
                reconciled: true,
                reconciliation_timer: None,
            },
        }
    }

    pub fn global_config(&self) -> &GlobalConfig {
        &self.state.global
    }

    /// Pre-spawn port setup, used by tests and by the daemon while it's
    /// still building up the initial port set before handing off to the
    /// strand. Once [`spawn`](Self::spawn) has run, new ports are created
    /// via [`MuxManagerHandle::ensure_port`] instead.
    pub fn ensure_port(&mut self, config: PortConfig) -> &mut Port {
        self.state.ensure_port(config)
    }

    pub fn port(&self, name: &str) -> Option<&Port> {
        self.state.ports.get(name)
    }

    pub fn port_names(&self) -> Vec<String> {
        self.state.ports.keys().cloned().collect()
    }

    pub fn kv(&self) -> &Arc<dyn KvTable> {
        &self.state.kv
    }

    /// Spawn the strand task and return a handle to it. The task runs
    /// until every handle is dropped or [`MuxManagerHandle::shutdown`] is
    /// called.
    pub fn spawn(self) -> MuxManagerHandle {
        let (tx, mut rx) = mpsc::unbounded_channel::<PortCommand>();
        let kv = self.state.kv.clone();
        let mut state = self.state;
        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    PortCommand::Run(job) => job(&mut state),
                    PortCommand::Shutdown(ack) => {
                        log::info!("MuxManager strand draining {} port(s) before exit", state.ports.len());
                        let _ = ack.send(());
                        break;
                    }
                }
            }
        });
        MuxManagerHandle { tx, kv }
    }
}

/// Apply the side-effecting half of a [`LinkManagerAction`] list against the
/// KV store. Kept free-standing (rather than a `Port` method) since it
/// needs the KV handle, which the state machines themselves never see.
pub fn apply_actions(kv: &Arc<dyn KvTable>, port_name: &str, actions: &[LinkManagerAction]) {
    for action in actions {
        if let LinkManagerAction::SwitchMuxState { target, cause } = action {
            log::warn!("{port_name}: switching MUX state to {target:?} (cause: {cause:?})");
            let mut fields = HashMap::new();
            fields.insert("state".to_string(), format!("{target:?}").to_lowercase());
            kv.set(port_name, fields);
        }
    }
}
