//! Pod monitoring service: mirrors pod state for a set of namespaces, runs
//! start/stop/restart actions against deployments and pods, and pushes
//! snapshots to live WebSocket subscribers.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod monitor;
pub mod server;
