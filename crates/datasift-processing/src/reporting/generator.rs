use super::{ReportContext, ReportGenerator};
use crate::profiler::DataProfiler;
use crate::types::{ColumnProfile, DatasetProfile};
use crate::utils::cell_text;
use anyhow::Result;
use chrono::Local;
use polars::prelude::*;
use std::fmt::Write;
use tracing::debug;

/// Rows shown in the "Sample" section.
const HEAD_ROWS: usize = 10;

const STYLE: &str = "\
body{font-family:system-ui,sans-serif;margin:2rem auto;max-width:1100px;color:#222}\
h1{margin-bottom:.2rem}.meta{color:#666;font-size:.9rem}\
table{border-collapse:collapse;margin:.5rem 0 1.5rem}\
th,td{border:1px solid #ddd;padding:.3rem .6rem;text-align:left;font-size:.9rem}\
th{background:#f4f4f4}.variable{border-top:2px solid #eee;padding-top:.5rem}\
.kind{display:inline-block;background:#e8eefc;border-radius:4px;padding:0 .4rem;font-size:.8rem}\
.warn{color:#b35c00}td.null{background:#fafafa;color:#aaa}";

// ============================================================================
// HTML Report Generator
// ============================================================================

/// Default report generator: a self-contained HTML page built from a
/// [`DatasetProfile`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlReportGenerator;

impl HtmlReportGenerator {
    pub fn new() -> Self {
        Self
    }

    fn render(&self, df: &DataFrame, profile: &DatasetProfile, ctx: &ReportContext) -> String {
        let mut html = String::with_capacity(16 * 1024);
        let title = escape_html(&ctx.title);

        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<h1>{title}</h1>\n"
        );
        let _ = writeln!(
            html,
            "<p class=\"meta\">Source: {} &middot; Encoding: {} &middot; Run {} &middot; Generated {}</p>",
            escape_html(&ctx.source),
            escape_html(&ctx.encoding),
            ctx.run_id,
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        if let Some(href) = &ctx.download_href {
            let _ = writeln!(
                html,
                "<p><a href=\"{}\">Download cleaned CSV</a></p>",
                escape_html(href)
            );
        }

        render_overview(&mut html, profile);

        html.push_str("<h2>Variables</h2>\n");
        for column in &profile.column_profiles {
            render_variable(&mut html, column);
        }

        render_head(&mut html, df);

        html.push_str("</body>\n</html>\n");
        html
    }
}

impl ReportGenerator for HtmlReportGenerator {
    fn generate(&self, df: &DataFrame, context: &ReportContext) -> Result<String> {
        let profile = DataProfiler::profile_dataset(df)?;
        debug!(
            "Rendering report for {} columns ({} rows)",
            profile.shape.1, profile.shape.0
        );
        Ok(self.render(df, &profile, context))
    }

    fn name(&self) -> &str {
        "html"
    }
}

// ============================================================================
// Sections
// ============================================================================

fn render_overview(html: &mut String, profile: &DatasetProfile) {
    html.push_str("<h2>Overview</h2>\n<table>\n");
    let rows = [
        ("Rows", profile.shape.0.to_string()),
        ("Columns", profile.shape.1.to_string()),
        (
            "Missing cells",
            format!(
                "{} ({:.1}%)",
                profile.missing_cells, profile.missing_cells_percentage
            ),
        ),
        (
            "Duplicate rows",
            format!(
                "{} ({:.1}%)",
                profile.duplicate_count, profile.duplicate_percentage
            ),
        ),
        ("In-memory size", format_bytes(profile.estimated_size_bytes)),
    ];
    for (label, value) in rows {
        let _ = writeln!(html, "<tr><th>{}</th><td>{}</td></tr>", label, value);
    }
    html.push_str("</table>\n");
}

fn render_variable(html: &mut String, column: &ColumnProfile) {
    let _ = writeln!(
        html,
        "<section class=\"variable\">\n<h3>{} <span class=\"kind\">{}</span></h3>",
        escape_html(&column.name),
        escape_html(&column.inferred_type)
    );

    html.push_str("<table>\n");
    let _ = writeln!(
        html,
        "<tr><th>Type</th><td>{}</td></tr>",
        escape_html(&column.dtype)
    );
    let _ = writeln!(
        html,
        "<tr><th>Distinct</th><td>{}</td></tr>",
        column.unique_count
    );
    let _ = writeln!(
        html,
        "<tr><th>Missing</th><td>{} ({:.1}%)</td></tr>",
        column.null_count, column.null_percentage
    );

    let stats = &column.characteristics;
    for key in [
        "min",
        "max",
        "mean",
        "median",
        "std",
        "skewness",
        "true_count",
        "false_count",
        "most_frequent",
        "cardinality",
    ] {
        if let Some(value) = stats.get(key) {
            let _ = writeln!(
                html,
                "<tr><th>{}</th><td>{}</td></tr>",
                key.replace('_', " "),
                escape_html(&format_json_value(value))
            );
        }
    }
    if stats.get("has_outliers").and_then(|v| v.as_bool()) == Some(true) {
        html.push_str("<tr><th>outliers</th><td class=\"warn\">more than 5% outside 1.5 IQR</td></tr>\n");
    }
    html.push_str("</table>\n");

    if let Some(top) = stats.get("top_values").and_then(|v| v.as_array()) {
        html.push_str("<table>\n<tr><th>Value</th><th>Count</th></tr>\n");
        for pair in top {
            if let (Some(value), Some(count)) = (pair.get(0), pair.get(1)) {
                let _ = writeln!(
                    html,
                    "<tr><td>{}</td><td>{}</td></tr>",
                    escape_html(&format_json_value(value)),
                    count
                );
            }
        }
        html.push_str("</table>\n");
    }

    if !column.sample_values.is_empty() {
        let samples: Vec<String> = column.sample_values.iter().map(|s| escape_html(s)).collect();
        let _ = writeln!(html, "<p class=\"meta\">Sample: {}</p>", samples.join(", "));
    }

    html.push_str("</section>\n");
}

fn render_head(html: &mut String, df: &DataFrame) {
    html.push_str("<h2>Sample</h2>\n<table>\n<tr>");
    for name in df.get_column_names() {
        let _ = write!(html, "<th>{}</th>", escape_html(name));
    }
    html.push_str("</tr>\n");

    let head = df.head(Some(HEAD_ROWS));
    for idx in 0..head.height() {
        html.push_str("<tr>");
        for column in head.get_columns() {
            match cell_text(column.as_materialized_series(), idx) {
                Some(text) => {
                    let _ = write!(html, "<td>{}</td>", escape_html(&text));
                }
                None => html.push_str("<td class=\"null\"></td>"),
            }
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n");
}

// ============================================================================
// Formatting Helpers
// ============================================================================

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn format_json_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format!("{:.4}", f)
                .trim_end_matches('0')
                .trim_end_matches('.')
                .to_string(),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
