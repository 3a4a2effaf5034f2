use std::io::IsTerminal;

use chrono::{DateTime, SecondsFormat, Utc};
use locol_core::attrs::Attributes;
use locol_core::model::log::LogRow;
use locol_core::model::metric::MetricPointRow;
use locol_core::model::span::SpanRow;
use locol_core::query::{ColumnarResult, ResourceAttributeGroup, StatusResponse};
use owo_colors::OwoColorize;

pub fn print_query_human(v: &ColumnarResult) {
    let headers = v.column_names();
    let rows = v
        .rows()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect::<Vec<Vec<String>>>();
    print_table(&headers, &rows);
    println!("-- {} rows --", v.row_count());
}

pub fn print_groups_human(v: &[ResourceAttributeGroup]) {
    for group in v {
        println!(
            "{}={} resources={}",
            paint_key(&group.key),
            group.value,
            group.resource_ids.len()
        );
        for id in &group.resource_ids {
            println!("  {id}");
        }
    }
    println!("-- {} groups --", v.len());
}

pub fn print_resource_ids_human(v: &[String]) {
    for id in v {
        println!("{id}");
    }
    println!("-- {} resources --", v.len());
}

pub fn print_spans_human(v: &[SpanRow]) {
    let rows = v
        .iter()
        .map(|s| {
            vec![
                ts(&s.start_time),
                format!("{}ms", s.duration_ms()),
                s.trace_id.clone(),
                s.span_id.clone(),
                s.parent_span_id.clone().unwrap_or_else(|| "-".to_string()),
                s.name.clone(),
                s.attributes.encode(),
            ]
        })
        .collect::<Vec<_>>();
    print_table(
        &["start", "duration", "trace", "span", "parent", "name", "attributes"],
        &rows,
    );
    println!("-- {} spans --", v.len());
}

pub fn print_metrics_human(v: &[MetricPointRow]) {
    let rows = v
        .iter()
        .map(|p| {
            vec![
                ts(&p.time),
                p.metric_name.clone(),
                p.metric_type.as_str().to_string(),
                p.value.to_string(),
                p.unit.clone(),
                p.attributes.encode(),
            ]
        })
        .collect::<Vec<_>>();
    print_table(
        &["time", "name", "type", "value", "unit", "attributes"],
        &rows,
    );
    println!("-- {} points --", v.len());
}

pub fn print_logs_human(v: &[LogRow]) {
    for log in v {
        println!(
            "{} {} | {} {}",
            ts(&log.timestamp),
            severity_label(log.severity_number, &log.severity_text),
            log.body,
            log.attributes.encode()
        );
    }
    println!("-- {} logs --", v.len());
}

pub fn print_attributes_human(v: &Attributes) {
    for attr in v {
        println!("{}={}", paint_key(&attr.key), attr.value.canonical_text());
    }
}

pub fn print_status_human(v: &StatusResponse) {
    println!("connected={}", v.connected);
    println!(
        "resources={} attributes={} scopes={}",
        v.resources_count, v.attributes_count, v.scopes_count
    );
    println!(
        "spans={} metrics={} logs={}",
        v.spans_count, v.metrics_count, v.logs_count
    );
}

fn ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn severity_label(number: i32, text: &str) -> String {
    if !text.is_empty() {
        return text.to_string();
    }
    match number {
        0 => "UNSPECIFIED",
        1..=4 => "TRACE",
        5..=8 => "DEBUG",
        9..=12 => "INFO",
        13..=16 => "WARN",
        17..=20 => "ERROR",
        _ => "FATAL",
    }
    .to_string()
}

fn paint_key(key: &str) -> String {
    if std::io::stdout().is_terminal() {
        key.cyan().to_string()
    } else {
        key.to_string()
    }
}

fn print_table<H: AsRef<str>>(headers: &[H], rows: &[Vec<String>]) {
    let rendered = render_table(headers, rows);
    let mut lines = rendered.lines();
    if let Some(header) = lines.next() {
        if std::io::stdout().is_terminal() {
            println!("{}", header.bold());
        } else {
            println!("{header}");
        }
    }
    for line in lines {
        println!("{line}");
    }
}

/// Left-aligned columns padded to the widest cell, two spaces apart.
fn render_table<H: AsRef<str>>(headers: &[H], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|h| h.as_ref().chars().count())
        .collect::<Vec<_>>();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let header_cells = headers.iter().map(|h| h.as_ref()).collect::<Vec<_>>();
    let mut out = render_line(&header_cells, &widths);
    out.push('\n');
    for row in rows {
        out.push_str(&render_line(
            &row.iter().map(String::as_str).collect::<Vec<_>>(),
            &widths,
        ));
        out.push('\n');
    }
    out
}

fn render_line(cells: &[&str], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}
