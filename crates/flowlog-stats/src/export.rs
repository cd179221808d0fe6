// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Export formatters: Prometheus text exposition, CSV, and the legacy `kv`
//! line format used by the STATS control command (§4.1, §6).
//!
//! Unit/name conversion rules are grounded on `stats-prometheus.c`: counter
//! names are sanitized to Prometheus's `[a-zA-Z_:][a-zA-Z0-9_:]*` charset,
//! and values denominated in anything other than seconds/bytes are
//! converted to the base unit at export time (Prometheus convention is
//! always base units, never ms/KiB/etc).

use crate::cluster::{CounterType, FrameOfReference, Unit};
use crate::key::ClusterKey;
use crate::registry::StatsRegistry;
use std::fmt::Write as _;
use std::sync::atomic::AtomicBool;

/// `stats_format_prometheus_sanitize_name`: keep `[A-Za-z0-9_]`, fold `.`
/// and `-` to `_`, and drop every other byte unconditionally (not replace --
/// drop).
pub fn sanitize_metric_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' => out.push(c),
            '.' | '-' => out.push('_'),
            _ => {}
        }
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

pub fn escape_label_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

/// Convert a raw stored integer to the base unit, as an f64, per
/// `stats-prometheus.c`. Callers that need the exact integer-vs-float
/// rendering distinction the C exporter makes should use
/// [`format_converted_value`] instead.
pub fn convert_unit(raw: i64, unit: Unit) -> f64 {
    match unit {
        Unit::None | Unit::Seconds | Unit::Bytes => raw as f64,
        Unit::Minutes => (raw * 60) as f64,
        Unit::Hours => (raw * 3600) as f64,
        Unit::Milliseconds => raw as f64 / 1_000.0,
        Unit::Nanoseconds => raw as f64 / 1_000_000_000.0,
        Unit::Kib => (raw * 1024) as f64,
        Unit::Mib => (raw * 1024 * 1024) as f64,
        Unit::Gib => (raw * 1024 * 1024 * 1024) as f64,
    }
}

/// Render a converted value the way `stats-prometheus.c` does: seconds,
/// bytes, minutes/hours-as-seconds and Ki/Mi/GiB-as-bytes are emitted as
/// plain integers; milliseconds/nanoseconds-as-seconds are emitted as a
/// float, since sub-second precision is the point of storing them that way.
pub fn format_converted_value(raw: i64, unit: Unit) -> String {
    match unit {
        Unit::Milliseconds | Unit::Nanoseconds => format!("{}", convert_unit(raw, unit)),
        _ => format!("{}", convert_unit(raw, unit) as i64),
    }
}

fn prometheus_labels(key: &ClusterKey) -> String {
    if key.labels.is_empty() {
        return String::new();
    }
    let mut s = String::from("{");
    for (i, (k, v)) in key.labels.iter().enumerate() {
        if i > 0 {
            s.push(',');
        }
        let _ = write!(s, "{k}=\"{}\"", escape_label_value(v));
    }
    s.push('}');
    s
}

/// `frame_of_reference == RelativeToTimeOfQuery` counters (last-seen
/// timestamps) are exported as `now - stored` so the result is itself a
/// duration, matching `stats-prometheus.c`'s `_stamp` conversion.
fn resolve_value(raw: i64, formatting: &crate::cluster::CounterFormatting, now_unix: i64) -> String {
    match formatting.frame_of_reference {
        FrameOfReference::RelativeToTimeOfQuery => format!("{}", now_unix - raw),
        FrameOfReference::Absolute | FrameOfReference::None => format_converted_value(raw, formatting.unit),
    }
}

/// Render the whole registry as Prometheus text exposition format.
/// `now_unix` is the caller-supplied current time (used for
/// `RelativeToTimeOfQuery` counters); passed in rather than read from the
/// clock so export stays pure and testable.
pub fn format_prometheus(registry: &StatsRegistry, now_unix: i64) -> String {
    let mut out = String::new();
    let cancel = AtomicBool::new(false);
    registry.foreach_cluster(&cancel, |cluster| {
        let base = sanitize_metric_name(&cluster.key.name);
        let labels = prometheus_labels(&cluster.key);
        for (ty, counter) in cluster.iter() {
            let metric = format!("{base}_{}", sanitize_metric_name(ty.0));
            let formatting = cluster.formatting(ty);
            let value = resolve_value(counter.get(), &formatting, now_unix);
            let _ = writeln!(out, "{metric}{labels} {value}");
        }
    });
    out
}

/// Quote a CSV field if it contains `;` or `"` (§4.1 CSV), doubling any
/// inner `"`; bytes outside valid UTF-8 are never produced here since every
/// field is already a `&str`, so no `\xNN` escaping is needed on this path.
fn csv_field(raw: &str) -> String {
    if raw.contains(';') || raw.contains('"') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

/// Render as CSV: `component;id;instance;state;type;value` per row (§4.1,
/// §6), `state` one of `a` (active)/`o` (orphaned)/`d` (dynamic). Orphaned
/// clusters are exported too -- only removed clusters are absent.
pub fn format_csv(registry: &StatsRegistry) -> String {
    let mut out = String::from("SourceName;SourceId;SourceInstance;State;Type;Number\n");
    let cancel = AtomicBool::new(false);
    registry.foreach_cluster(&cancel, |cluster| {
        let (name, id, instance) = match &cluster.key.legacy {
            Some(legacy) => (legacy.component.as_str(), legacy.id.as_str(), legacy.instance.as_str()),
            None => (cluster.key.name.as_str(), "", ""),
        };
        let state = if cluster.dynamic {
            'd'
        } else if cluster.is_orphaned() {
            'o'
        } else {
            'a'
        };
        for (ty, counter) in cluster.iter() {
            let _ = writeln!(
                out,
                "{};{};{};{state};{};{}",
                csv_field(name),
                csv_field(id),
                csv_field(instance),
                ty.0,
                counter.get()
            );
        }
    });
    out
}

/// Render as `key=value` lines, the format the control socket's `STATS`
/// command returns (one query key per counter, no legacy columns).
pub fn format_kv(registry: &StatsRegistry) -> String {
    let mut out = String::new();
    let cancel = AtomicBool::new(false);
    registry.foreach_cluster(&cancel, |cluster| {
        let base = cluster.key.query_key();
        for (ty, counter) in cluster.iter() {
            let _ = writeln!(out, "{base}.{}={}", ty.0, counter.get());
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::CounterFormatting;
    use yare::parameterized;

    #[parameterized(
        plain = { "src_s_in", "src_s_in" },
        dots = { "src.s_in", "src_s_in" },
        dash = { "src-in", "src_in" },
        dropped_punctuation = { "src;a=b", "srcab" },
    )]
    fn sanitize_cases(raw: &str, expect: &str) {
        assert_eq!(sanitize_metric_name(raw), expect);
    }

    #[test]
    fn unit_conversion_to_base_units() {
        assert_eq!(convert_unit(5, Unit::Minutes), 300.0);
        assert_eq!(convert_unit(2, Unit::Kib), 2048.0);
        assert_eq!(convert_unit(1_000_000_000, Unit::Nanoseconds), 1.0);
    }

    #[test]
    fn integer_units_render_without_decimal_point() {
        assert_eq!(format_converted_value(5, Unit::Minutes), "300");
        assert_eq!(format_converted_value(2, Unit::Gib), "2147483648");
    }

    #[test]
    fn sub_second_units_render_as_float() {
        assert_eq!(format_converted_value(1_500, Unit::Milliseconds), "1.5");
    }

    #[test]
    fn prometheus_export_includes_labels_and_suffix() {
        let reg = StatsRegistry::new(3, 0);
        let key = ClusterKey::new("src").with_labels(vec![("id".into(), "s_in".into())]);
        reg.register_counter(0, key, CounterType::PROCESSED).add(7);
        let text = format_prometheus(&reg, 0);
        assert!(text.contains("src_processed{id=\"s_in\"} 7"));
    }

    #[test]
    fn relative_to_time_of_query_counter_exports_as_age() {
        let reg = StatsRegistry::new(3, 0);
        let key = ClusterKey::new("src");
        reg.register_counter(0, key.clone(), CounterType::STAMP).set(100);
        reg.set_formatting(
            &key,
            CounterType::STAMP,
            CounterFormatting { unit: Unit::None, frame_of_reference: FrameOfReference::RelativeToTimeOfQuery },
        );
        let text = format_prometheus(&reg, 160);
        assert!(text.contains("src_stamp 60"));
    }

    #[test]
    fn csv_export_has_header_and_rows() {
        let reg = StatsRegistry::new(3, 0);
        reg.register_counter(0, ClusterKey::new("src"), CounterType::PROCESSED).add(1);
        let csv = format_csv(&reg);
        assert!(csv.starts_with("SourceName;SourceId;SourceInstance;State;Type;Number\n"));
        assert!(csv.contains("src;;;a;processed;1"));
    }

    #[test]
    fn csv_export_quotes_fields_containing_the_delimiter() {
        let reg = StatsRegistry::new(3, 0);
        let key = ClusterKey::new("src").with_legacy(crate::key::LegacyKey {
            component: crate::key::LegacyComponent::Source,
            id: "a;b".to_string(),
            instance: "plain".to_string(),
        });
        reg.register_counter(0, key, CounterType::PROCESSED).add(1);
        let csv = format_csv(&reg);
        assert!(csv.contains("\"a;b\""));
    }

    #[test]
    fn csv_export_marks_dynamic_clusters() {
        let reg = StatsRegistry::new(3, 0);
        reg.register_dynamic_counter(0, ClusterKey::new("dyn"), CounterType::PROCESSED).add(1);
        let csv = format_csv(&reg);
        assert!(csv.contains(";d;"));
    }
}
