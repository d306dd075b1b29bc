//! HTML bodies for run and history mails.

use std::fmt::Write as _;

use resync_core::{Stat, StatHistory};

/// Replaced by the rendered history tables in a custom template.
pub const HISTORY_PLACEHOLDER: &str = "{{ history }}";

const STYLE: &str = "<style>\
table{border-collapse:collapse;margin-bottom:1.5em}\
th,td{border:1px solid #999;padding:4px 8px;text-align:left}\
.ok{color:#2e7d32}.fail{color:#c62828}\
</style>";

pub fn status_label(success: bool) -> &'static str {
    if success {
        "Complete"
    } else {
        "Failed"
    }
}

/// Subject line for a single run.
pub fn run_subject(stat: &Stat) -> String {
    format!("Resync: Sync {} {}", stat.name, status_label(stat.success))
}

/// Body for a single run.
pub fn run_body(stat: &Stat) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<html><head>{STYLE}</head><body><h2>Sync {name} {status}</h2>",
        name = escape(&stat.name),
        status = status_label(stat.success),
    );
    html.push_str("<table><tr><th>Status</th><th>Start</th><th>End</th><th>Duration</th></tr>");
    push_row(&mut html, stat);
    html.push_str("</table></body></html>");
    html
}

/// One table per sync, newest run first.
pub fn history_tables(history: &StatHistory) -> String {
    let mut html = String::new();
    for (name, stats) in history {
        let _ = write!(html, "<h3>{}</h3>", escape(name));
        html.push_str("<table><tr><th>Status</th><th>Start</th><th>End</th><th>Duration</th></tr>");
        for stat in stats {
            push_row(&mut html, stat);
        }
        html.push_str("</table>");
    }
    html
}

/// Whole history mail, either standalone or poured into `template`.
pub fn history_page(tables: &str, template: Option<&str>, generated: &str) -> String {
    match template {
        Some(template) if template.contains(HISTORY_PLACEHOLDER) => {
            template.replace(HISTORY_PLACEHOLDER, tables)
        }
        Some(template) => format!("{template}{tables}"),
        None => format!(
            "<html><head>{STYLE}</head><body><h2>Resync History</h2>\
             <p>Generated {}</p>{tables}</body></html>",
            escape(generated)
        ),
    }
}

fn push_row(html: &mut String, stat: &Stat) {
    let class = if stat.success { "ok" } else { "fail" };
    let _ = write!(
        html,
        "<tr><td class=\"{class}\">{status}</td><td>{start}</td><td>{end}</td><td>{duration}</td></tr>",
        status = status_label(stat.success),
        start = escape(&stat.start),
        end = escape(&stat.end),
        duration = escape(&stat.human_duration()),
    );
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
