//! Background daemon primitives for skills that need out-of-process work.
//!
//! A skill daemon is composed from the pieces here:
//! - lifecycle: start/stop/query a named daemon, detached spawn per platform
//! - pidfile: durable PID records with staleness detection
//! - server/client/protocol: localhost HTTP IPC with port discovery
//! - scheduler: fixed-interval tasks with cooperative cancellation
//! - watcher: glob-filtered, debounced filesystem change batches
//! - registry: optional in-memory health bookkeeping
//! - runtime: the daemon process body wiring the above to one tokio loop
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │              skill daemon process              │
//! ├───────────────────────────────────────────────┤
//! │ IpcServer   │ PeriodicTask(s) │ FileWatcher   │
//! │ (POST /rpc) │ (interval loop) │ (debounce)    │
//! ├───────────────────────────────────────────────┤
//! │      PidGuard        │     port file          │
//! └───────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod lifecycle;
pub mod pidfile;
pub mod protocol;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod server;
pub mod shutdown;
pub mod watcher;

pub use client::IpcClient;
pub use lifecycle::{spawn_detached, DaemonLifecycleManager};
pub use pidfile::{PidFile, PidGuard};
pub use protocol::{IpcRequest, IpcResponse, PingReply};
pub use registry::{DaemonEntry, DaemonRegistry, DaemonStatus, HealthSummary};
pub use runtime::DaemonRuntime;
pub use scheduler::PeriodicTask;
pub use server::{IpcHandler, IpcServer};
pub use shutdown::{ShutdownCoordinator, ShutdownHandle};
pub use watcher::FileWatcher;
