use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;

use crate::coverage;
use crate::error::QueryError;
use crate::models::{
    CoordinatorStatus, CoordinatorTable, CoverageRow, DetailTable, HubStatus, StatusCount,
    TotalsTable,
};

const PROGRESS_WIDTH: usize = 30;

#[derive(Debug, Serialize)]
pub struct HubStatusView<'a> {
    pub total_records: usize,
    pub with_coordinator: usize,
    pub without_coordinator: usize,
    pub summary: &'a [StatusCount],
    pub records: Vec<StatusRecordView<'a>>,
}

/// A hub record with every totals column passed through by header.
#[derive(Debug, Serialize)]
pub struct StatusRecordView<'a> {
    pub status: CoordinatorStatus,
    pub has_coordinator: bool,
    pub fields: BTreeMap<&'a str, Option<&'a str>>,
}

impl<'a> HubStatusView<'a> {
    pub fn new(status: &'a HubStatus, headers: &'a [String]) -> Self {
        let records = status
            .records
            .iter()
            .map(|tagged| StatusRecordView {
                status: tagged.status,
                has_coordinator: tagged.has_coordinator,
                fields: headers
                    .iter()
                    .map(String::as_str)
                    .zip(tagged.record.values.iter().map(Option::as_deref))
                    .collect(),
            })
            .collect();

        HubStatusView {
            total_records: status.total_records(),
            with_coordinator: status.with_coordinator(),
            without_coordinator: status.without_coordinator(),
            summary: &status.summary,
            records,
        }
    }
}

pub fn format_percentage(value: f64) -> String {
    format!("{value:.1}%")
}

pub fn progress_bar(value: f64) -> String {
    let filled = ((value.clamp(0.0, 100.0) / 100.0) * PROGRESS_WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {}",
        "#".repeat(filled),
        "-".repeat(PROGRESS_WIDTH - filled),
        format_percentage(value)
    )
}

/// Renders an aligned plain-text table.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|header| header.chars().count()).collect();
    for row in rows {
        for (width, value) in widths.iter_mut().zip(row) {
            *width = (*width).max(value.chars().count());
        }
    }

    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();

    let mut output = String::new();
    let _ = writeln!(output, "{}", table_line(headers, &widths));
    let _ = writeln!(output, "{}", table_line(&rule, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", table_line(row, &widths));
    }
    output
}

fn table_line<S: AsRef<str>>(values: &[S], widths: &[usize]) -> String {
    let cells: Vec<String> = values
        .iter()
        .zip(widths)
        .map(|(value, width)| format!("{:<width$}", value.as_ref(), width = *width))
        .collect();
    cells.join("  ").trim_end().to_string()
}

pub fn render_coverage(key_header: &str, rows: &[CoverageRow]) -> String {
    let values: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            vec![
                row.key.clone(),
                row.total_schools.to_string(),
                row.schools_with_coordinator.to_string(),
                format_percentage(row.percentage),
            ]
        })
        .collect();
    render_table(&[key_header, "Schools", "With coord.", "% with coord."], &values)
}

pub fn render_status(status: &HubStatus) -> String {
    let values: Vec<Vec<String>> = status
        .summary
        .iter()
        .map(|count| {
            vec![
                count.status.to_string(),
                count.records.to_string(),
                format_percentage(count.percentage),
            ]
        })
        .collect();

    let mut output = render_table(&["Status", "Records", "% of records"], &values);
    let _ = writeln!(output);
    let _ = writeln!(output, "Records in hub:   {}", status.total_records());
    let _ = writeln!(output, "With coordinator: {}", status.with_coordinator());
    let _ = writeln!(output, "No coordinator:   {}", status.without_coordinator());
    output
}

pub fn render_details(table: &DetailTable) -> String {
    let headers: Vec<&str> = table.columns.iter().map(|column| column.header()).collect();
    let values: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| table.columns.iter().map(|column| row.value(*column)).collect())
        .collect();
    render_table(&headers, &values)
}

pub fn write_details_csv(path: &Path, table: &DetailTable) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record(table.columns.iter().map(|column| column.header()))?;
    for row in &table.rows {
        writer.write_record(table.columns.iter().map(|column| row.value(*column)))?;
    }
    writer.flush()?;
    Ok(())
}

/// Markdown drill-down: overall completion, then each region, its hubs, and
/// the records of every hub.
pub fn build_report(
    coordinators: &CoordinatorTable,
    totals: &TotalsTable,
    region: Option<&str>,
    generated_on: NaiveDate,
) -> Result<String, QueryError> {
    let regions = coverage::summarize_regions(coordinators, totals)?;
    let completion = coverage::completion_percentage(coordinators, totals);

    let mut output = String::new();
    let _ = writeln!(output, "# Coordinator Allocation Report");
    let _ = writeln!(
        output,
        "Generated on {} for {}",
        generated_on,
        region.unwrap_or("all regions")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "Overall completion: **{}**", format_percentage(completion));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Coverage by Region");

    if regions.is_empty() {
        let _ = writeln!(output, "No regions found in the totals table.");
        return Ok(output);
    }

    write_coverage_markdown(&mut output, "GRE", &regions);

    if let Some(selected) = region {
        if !regions.iter().any(|summary| summary.key == selected) {
            let _ = writeln!(output);
            let _ = writeln!(output, "Region {selected} not found in the totals table.");
            return Ok(output);
        }
    }

    for summary in regions
        .iter()
        .filter(|summary| region.map_or(true, |selected| summary.key == selected))
    {
        let hubs = coverage::summarize_hubs(coordinators, totals, &summary.key)?;
        let _ = writeln!(output);
        let _ = writeln!(output, "## {} by Hub", summary.key);
        write_coverage_markdown(&mut output, "Hub", &hubs);

        for hub in &hubs {
            let status = coverage::hub_status(coordinators, totals, &summary.key, &hub.key)?;
            let details = coverage::school_details(coordinators, totals, &summary.key, &hub.key)?;

            let _ = writeln!(output);
            let _ = writeln!(output, "### Hub {} ({})", hub.key, summary.key);
            let _ = writeln!(
                output,
                "{} records: {} with coordinator, {} without",
                status.total_records(),
                status.with_coordinator(),
                status.without_coordinator()
            );
            for count in &status.summary {
                let _ = writeln!(
                    output,
                    "- {}: {} ({})",
                    count.status,
                    count.records,
                    format_percentage(count.percentage)
                );
            }
            let _ = writeln!(output);
            write_details_markdown(&mut output, &details);
        }
    }

    Ok(output)
}

fn write_coverage_markdown(output: &mut String, key_header: &str, rows: &[CoverageRow]) {
    let _ = writeln!(output, "| {key_header} | Schools | With coord. | % with coord. |");
    let _ = writeln!(output, "|---|---:|---:|---:|");
    for row in rows {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} |",
            row.key,
            row.total_schools,
            row.schools_with_coordinator,
            format_percentage(row.percentage)
        );
    }
}

fn write_details_markdown(output: &mut String, table: &DetailTable) {
    let headers: Vec<&str> = table.columns.iter().map(|column| column.header()).collect();
    let _ = writeln!(output, "| {} |", headers.join(" | "));
    let _ = writeln!(output, "|{}", "---|".repeat(headers.len()));
    for row in &table.rows {
        let values: Vec<String> = table
            .columns
            .iter()
            .map(|column| row.value(*column).replace('|', "\\|"))
            .collect();
        let _ = writeln!(output, "| {} |", values.join(" | "));
    }
}
