// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-command parsing and dispatch shared by the control socket and the
//! HTTP scrape endpoint's `?query=` path (§6).

use flowlog_stats::export::{format_csv, format_kv};
use flowlog_stats::query::glob_match;
use flowlog_stats::StatsRegistry;
use std::fmt::Write as _;
use std::sync::atomic::AtomicBool;

use crate::logflags::{LogFlag, LogFlags};

/// Side effects `STOP`/`RELOAD` trigger, injected so the command processor
/// stays unit-testable without a running daemon -- the same trait-injection
/// shape as [`flowlog_source::driver`]'s transport adapter.
pub trait ControlActions: Send + Sync {
    fn request_stop(&self);
    fn request_reload(&self);
}

/// `<pattern>[.<counter-name>]` (§4.1 "Query layer", §6 `QUERY`). The suffix
/// after the last `.` is only treated as a counter-name filter when it is
/// itself glob-free -- a bare pattern like `src.*` has no trailing filter,
/// since `*` can never name a real counter.
fn split_query_expr(expr: &str) -> (&str, Option<&str>) {
    match expr.rsplit_once('.') {
        Some((pattern, counter))
            if !pattern.is_empty() && !counter.is_empty() && !counter.contains(['*', '?']) =>
        {
            (pattern, Some(counter))
        }
        _ => (expr, None),
    }
}

pub fn query_get(registry: &StatsRegistry, expr: &str) -> String {
    let (pattern, counter_name) = split_query_expr(expr);
    let mut out = String::new();
    let cancel = AtomicBool::new(false);
    registry.foreach_counter(&cancel, |cluster, ty, counter| {
        if counter_name.is_some_and(|name| ty.0 != name) {
            return;
        }
        let key = cluster.key.query_key();
        if glob_match(pattern, &key) {
            let _ = writeln!(out, "{key}.{}={}", ty.0, counter.get());
        }
    });
    out
}

pub fn query_get_sum(registry: &StatsRegistry, expr: &str) -> i64 {
    let (pattern, counter_name) = split_query_expr(expr);
    let mut sum = 0i64;
    let cancel = AtomicBool::new(false);
    registry.foreach_counter(&cancel, |cluster, ty, counter| {
        if ty.is_timestamp() || counter_name.is_some_and(|name| ty.0 != name) {
            return;
        }
        if glob_match(pattern, &cluster.key.query_key()) {
            sum += counter.get();
        }
    });
    sum
}

pub fn query_list(registry: &StatsRegistry, expr: &str) -> String {
    let (pattern, counter_name) = split_query_expr(expr);
    let mut out = String::new();
    let cancel = AtomicBool::new(false);
    registry.foreach_counter(&cancel, |cluster, ty, _counter| {
        if counter_name.is_some_and(|name| ty.0 != name) {
            return;
        }
        let key = cluster.key.query_key();
        if glob_match(pattern, &key) {
            let _ = writeln!(out, "{key}.{}", ty.0);
        }
    });
    out
}

/// Dispatch a `QUERY <sub> <pattern>` body (the part after `QUERY `, or
/// after `?query=` on the scrape endpoint).
pub fn run_query(body: &str, registry: &StatsRegistry) -> String {
    let mut it = body.trim().splitn(2, ' ');
    let sub = it.next().unwrap_or("").to_ascii_uppercase();
    let expr = it.next().unwrap_or("").trim();
    if expr.is_empty() {
        return "ERROR missing pattern\n".to_string();
    }
    match sub.as_str() {
        "GET" => query_get(registry, expr),
        "GET_SUM" => format!("{}\n", query_get_sum(registry, expr)),
        "LIST" => query_list(registry, expr),
        _ => "ERROR unknown query subcommand\n".to_string(),
    }
}

fn run_log(body: &str, log_flags: &LogFlags) -> String {
    let mut it = body.split_whitespace();
    let Some(flag_str) = it.next() else {
        return "ERROR missing flag\n".to_string();
    };
    let Some(flag) = LogFlag::parse(flag_str) else {
        return "ERROR unknown flag\n".to_string();
    };
    match it.next() {
        None => format!("{}={}\n", flag_str.to_ascii_uppercase(), i32::from(log_flags.get(flag))),
        Some(arg) => match arg.to_ascii_uppercase().as_str() {
            "ON" => {
                log_flags.set(flag, true);
                "OK\n".to_string()
            }
            "OFF" => {
                log_flags.set(flag, false);
                "OK\n".to_string()
            }
            _ => "ERROR invalid argument\n".to_string(),
        },
    }
}

/// Process one control-socket line (§6 table) and return the full reply,
/// including any trailing blank line the command's contract specifies.
pub fn process_line(
    line: &str,
    registry: &StatsRegistry,
    log_flags: &LogFlags,
    actions: &dyn ControlActions,
) -> String {
    let mut parts = line.trim().splitn(2, ' ');
    let cmd = parts.next().unwrap_or("").to_ascii_uppercase();
    let rest = parts.next().unwrap_or("").trim();
    match cmd.as_str() {
        "STATS" => format!("{}\n", format_csv(registry)),
        "RESET_STATS" => {
            registry.reset_non_stamp_counters();
            "OK\n".to_string()
        }
        "LOG" => run_log(rest, log_flags),
        "STOP" => {
            actions.request_stop();
            "OK Shutdown initiated\n".to_string()
        }
        "RELOAD" => {
            actions.request_reload();
            "OK Config reload initiated\n".to_string()
        }
        "QUERY" => run_query(rest, registry),
        "" => "ERROR empty command\n".to_string(),
        _ => "ERROR unknown command\n".to_string(),
    }
}

/// Generate a full-registry export in one of the three formats (§4.1, §6).
pub fn export_all(registry: &StatsRegistry, format: crate::scrape::ExportFormat, now_unix: i64) -> String {
    match format {
        crate::scrape::ExportFormat::Prometheus => flowlog_stats::export::format_prometheus(registry, now_unix),
        crate::scrape::ExportFormat::Csv => format_csv(registry),
        crate::scrape::ExportFormat::Kv => format_kv(registry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowlog_stats::{ClusterKey, CounterType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingActions {
        stops: AtomicUsize,
        reloads: AtomicUsize,
    }

    impl ControlActions for RecordingActions {
        fn request_stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
        fn request_reload(&self) {
            self.reloads.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn setup() -> (StatsRegistry, LogFlags, RecordingActions) {
        (StatsRegistry::new(3, 0), LogFlags::new(), RecordingActions { stops: AtomicUsize::new(0), reloads: AtomicUsize::new(0) })
    }

    #[test]
    fn stats_emits_csv_with_trailing_blank_line() {
        let (reg, flags, actions) = setup();
        reg.register_counter(0, ClusterKey::new("src"), CounterType::PROCESSED).add(3);
        let reply = process_line("STATS", &reg, &flags, &actions);
        assert!(reply.starts_with("SourceName;SourceId;SourceInstance;State;Type;Number\n"));
        assert!(reply.ends_with("\n\n"), "reply followed by a blank line");
    }

    #[test]
    fn reset_stats_zeroes_counters_and_replies_ok() {
        let (reg, flags, actions) = setup();
        let c = reg.register_counter(0, ClusterKey::new("src"), CounterType::PROCESSED);
        c.add(7);
        assert_eq!(process_line("RESET_STATS", &reg, &flags, &actions), "OK\n");
        assert_eq!(c.get(), 0);
    }

    #[test]
    fn log_without_argument_reports_current_state() {
        let (reg, flags, actions) = setup();
        flags.set(LogFlag::Verbose, true);
        assert_eq!(process_line("LOG VERBOSE", &reg, &flags, &actions), "VERBOSE=1\n");
    }

    #[test]
    fn log_on_off_sets_flag_and_replies_ok() {
        let (reg, flags, actions) = setup();
        assert_eq!(process_line("LOG DEBUG ON", &reg, &flags, &actions), "OK\n");
        assert!(flags.get(LogFlag::Debug));
        assert_eq!(process_line("LOG DEBUG OFF", &reg, &flags, &actions), "OK\n");
        assert!(!flags.get(LogFlag::Debug));
    }

    #[test]
    fn stop_and_reload_invoke_actions_and_reply() {
        let (reg, flags, actions) = setup();
        assert_eq!(process_line("STOP", &reg, &flags, &actions), "OK Shutdown initiated\n");
        assert_eq!(process_line("RELOAD", &reg, &flags, &actions), "OK Config reload initiated\n");
        assert_eq!(actions.stops.load(Ordering::SeqCst), 1);
        assert_eq!(actions.reloads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn query_get_sum_excludes_stamp_counters() {
        let (reg, flags, actions) = setup();
        reg.register_counter(0, ClusterKey::new("src.a"), CounterType::PROCESSED).add(4);
        reg.register_counter(0, ClusterKey::new("src.a"), CounterType::STAMP).set(1_700_000_000);
        assert_eq!(process_line("QUERY GET_SUM src.*", &reg, &flags, &actions), "4\n");
    }

    #[test]
    fn query_list_filters_by_counter_name_suffix() {
        let (reg, flags, actions) = setup();
        reg.register_counter(0, ClusterKey::new("src.a"), CounterType::PROCESSED).add(1);
        reg.register_counter(0, ClusterKey::new("src.a"), CounterType::DROPPED).add(1);
        let reply = process_line("QUERY LIST src.*.dropped", &reg, &flags, &actions);
        assert_eq!(reply, "src.a.dropped\n");
    }

    #[test]
    fn unknown_command_is_an_error_reply() {
        let (reg, flags, actions) = setup();
        assert_eq!(process_line("BOGUS", &reg, &flags, &actions), "ERROR unknown command\n");
    }
}
