//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Expose a Prometheus scrape endpoint
//! - Count handled commands, lint steps, config writes and reloads
//!
//! # Metrics
//! - `config_commands_total` (counter): commands by name and status
//! - `config_lint_steps_total` (counter): lint steps by kind and outcome
//! - `config_writes_total` (counter): persisted configs by target
//! - `config_reloads_total` (counter): file reloads by status
//! - `config_services` (gauge): services in the current app
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Installs the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!("config_commands_total", "Config commands handled");
    describe_counter!("config_lint_steps_total", "Pipeline lint steps run");
    describe_counter!("config_writes_total", "Configs written");
    describe_counter!("config_reloads_total", "App file reloads");
    describe_gauge!("config_services", "Services in the app");

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_command(command: &str, ok: bool) {
    let status = if ok { "ok" } else { "fail" };
    let labels = [("command", command.to_string()), ("status", status.to_string())];
    counter!("config_commands_total", &labels).increment(1);
}

pub fn record_lint(kind: &'static str, updated: bool) {
    let outcome = if updated { "updated" } else { "unchanged" };
    counter!("config_lint_steps_total", "kind" => kind, "outcome" => outcome).increment(1);
}

pub fn record_config_write(target: &'static str) {
    counter!("config_writes_total", "target" => target).increment(1);
}

pub fn record_services(count: usize) {
    gauge!("config_services").set(count as f64);
}

pub fn record_reload(ok: bool) {
    let status = if ok { "ok" } else { "fail" };
    counter!("config_reloads_total", "status" => status).increment(1);
}
