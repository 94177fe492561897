//! reverie-cli - command-line client for the Reverie journaling API
//!
//! # Subcommands
//! - `add <text> [--type T] [--format F] [--date D] [--no-decompose]` - write an entry
//! - `edit <id> <text> [--type T] [--format F]`                      - rewrite and re-analyse
//! - `delete <id>`                                                    - soft delete
//! - `bookmark <id> [--off]`                                          - set or clear bookmark
//! - `daily [date]`, `weekly [week] [--regenerate]`, `monthly [month] [--regenerate]`
//! - `status`                                                         - show server health
//!
//! `--json` prints the raw response body instead of the text rendering.

use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";
/// Entry processing makes several model calls in sequence.
const PROCESS_TIMEOUT_SECS: u64 = 180;
const SUMMARY_TIMEOUT_SECS: u64 = 90;
const STATUS_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "reverie-cli", version, about = "Reverie journal command-line client")]
struct Cli {
    /// Reverie HTTP server URL (overrides REVERIE_HTTP_URL env var)
    #[arg(long, env = "REVERIE_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Print the raw JSON response
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write a new journal entry
    Add {
        text: String,

        /// Entry type, e.g. "Work" (overrides classification)
        #[arg(long = "type")]
        entry_type: Option<String>,

        /// Entry format, e.g. "End of Day"
        #[arg(long)]
        format: Option<String>,

        /// Entry date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,

        /// Never split the entry into separate events
        #[arg(long)]
        no_decompose: bool,
    },

    /// Replace an entry's text and re-analyse it
    Edit {
        id: String,
        text: String,

        #[arg(long = "type")]
        entry_type: Option<String>,

        #[arg(long)]
        format: Option<String>,
    },

    /// Soft delete an entry
    Delete { id: String },

    /// Bookmark an entry
    Bookmark {
        id: String,

        /// Clear the bookmark instead
        #[arg(long)]
        off: bool,
    },

    /// Summary for a day (YYYY-MM-DD or "today")
    Daily { date: Option<String> },

    /// Summary for an ISO week (YYYY-Wnn or "current")
    Weekly {
        week: Option<String>,

        #[arg(long)]
        regenerate: bool,
    },

    /// Summary for a month (YYYY-MM or "current")
    Monthly {
        month: Option<String>,

        #[arg(long)]
        regenerate: bool,
    },

    /// Show Reverie server status
    Status,
}

// ============================================================================
// Request building
// ============================================================================

pub fn add_body(
    text: &str,
    entry_type: Option<&str>,
    format: Option<&str>,
    date: Option<&str>,
    no_decompose: bool,
) -> Value {
    let mut body = json!({ "text": text, "autoDecompose": !no_decompose });
    if let Some(t) = entry_type {
        body["type"] = json!(t);
    }
    if let Some(f) = format {
        body["format"] = json!(f);
    }
    if let Some(d) = date {
        body["date"] = json!(d);
    }
    body
}

/// Query string for a summary request; empty when nothing is set.
pub fn summary_query(key: &str, value: Option<&str>, regenerate: bool) -> String {
    let mut parts = Vec::new();
    if let Some(v) = value {
        parts.push(format!("{}={}", key, v));
    }
    if regenerate {
        parts.push("regenerate=true".to_string());
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("?{}", parts.join("&"))
    }
}

// ============================================================================
// Text rendering
// ============================================================================

fn str_or<'a>(v: &'a Value, fallback: &'a str) -> &'a str {
    v.as_str().unwrap_or(fallback)
}

fn list(v: &Value) -> String {
    v.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}

/// One entry from an `{id, fields}` envelope.
pub fn render_entry(entry: &Value) -> String {
    let f = &entry["fields"];
    let mut out = format!(
        "{} [{}] {}\n  {} · {} · {} · {}\n  {}",
        str_or(&entry["id"], "?"),
        str_or(&f["date"], "?"),
        str_or(&f["name"], "Untitled"),
        str_or(&f["type"], "?"),
        str_or(&f["inferredMode"], "?"),
        str_or(&f["energyShape"], "?"),
        str_or(&f["sentiment"], "?"),
        str_or(&f["snapshot"], ""),
    );
    let themes = list(&f["themeTags"]);
    if !themes.is_empty() {
        out.push_str(&format!("\n  Themes: {}", themes));
    }
    if let Some(next) = f["nextAction"].as_str() {
        out.push_str(&format!("\n  Next: {}", next));
    }
    if f["bookmarked"].as_bool() == Some(true) {
        out.push_str("\n  ★ bookmarked");
    }
    out
}

pub fn render_process(body: &Value) -> String {
    let mut out = render_entry(&body["entry"]);
    if let Some(children) = body["childEntries"].as_array() {
        out.push_str(&format!("\nSplit into {} entries:", children.len()));
        for child in children {
            out.push_str(&format!(
                "\n  {}. {}",
                child["sequenceOrder"].as_i64().unwrap_or(0),
                str_or(&child["fields"]["name"], "Untitled")
            ));
        }
    }
    if let Some(tokens) = body["processing"]["tokensUsed"].as_i64() {
        out.push_str(&format!("\nTokens: {}", tokens));
    }
    out
}

/// Shared tail of every summary: narrative, recommendations and stats.
fn render_summary_body(s: &Value, out: &mut String) {
    if s["entryCount"].as_i64().unwrap_or(0) == 0 {
        out.push_str("\nNo entries for this period.");
        return;
    }
    out.push_str(&format!("\n\n{}\n", str_or(&s["narrative"], "")));
    for (label, key) in [
        ("Mood", "moodSummary"),
        ("Energy", "energyPattern"),
        ("Takeaway", "keyTakeaway"),
        ("Reflect", "eveningReflection"),
        ("Trend", "moodTrend"),
        ("Insight", "weeklyInsight"),
        ("Insight", "monthlyInsight"),
        ("Highlight", "monthHighlight"),
        ("Next week", "nextWeekFocus"),
        ("Next month", "nextMonthFocus"),
    ] {
        if let Some(v) = s[key].as_str() {
            out.push_str(&format!("\n{}: {}", label, v));
        }
    }
    if let Some(recs) = s["recommendations"].as_array() {
        for (i, r) in recs.iter().filter_map(|r| r.as_str()).enumerate() {
            out.push_str(&format!("\n  {}. {}", i + 1, r));
        }
    }
    let themes = list(if s["topThemes"].is_array() { &s["topThemes"] } else { &s["themes"] });
    out.push_str(&format!(
        "\n\nEntries: {} · Mode: {} · Sentiment: {}",
        s["entryCount"],
        str_or(&s["dominantMode"], "?"),
        str_or(&s["dominantSentiment"], "?")
    ));
    if !themes.is_empty() {
        out.push_str(&format!(" · Themes: {}", themes));
    }
    if s["cached"].as_bool() == Some(true) {
        out.push_str("\n(cached)");
    }
}

pub fn render_summary(body: &Value) -> String {
    let s = &body["summary"];
    let mut out = if let Some(d) = s["displayDate"].as_str() {
        d.to_string()
    } else if let Some(w) = s["weekId"].as_str() {
        format!("{} ({})", w, str_or(&s["weekRange"], ""))
    } else {
        str_or(&s["monthRange"], str_or(&s["monthId"], "?")).to_string()
    };
    render_summary_body(s, &mut out);
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send and decode; non-2xx responses surface the server's `error` message.
fn send(req: reqwest::blocking::RequestBuilder, url: &str) -> anyhow::Result<Value> {
    let resp = req
        .send()
        .with_context(|| format!("connection failed to {}", url))?;
    let status = resp.status();
    let body: Value = resp.json().unwrap_or(Value::Null);
    if !status.is_success() {
        let msg = body["error"].as_str().unwrap_or("no error message");
        bail!("server returned {}: {}", status, msg);
    }
    Ok(body)
}

fn print(body: &Value, json_output: bool, render: fn(&Value) -> String) -> anyhow::Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(body)?);
    } else {
        println!("{}", render(body));
    }
    Ok(())
}

fn entry_render(body: &Value) -> String {
    render_entry(&body["entry"])
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    let resp = client(STATUS_TIMEOUT_SECS)?.get(&url).send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: Value = r.json().unwrap_or_default();
            println!("Reverie server: {}", str_or(&body["status"], "unknown"));
            println!("Version:        {}", str_or(&body["version"], "?"));
            println!("Store:          {}", str_or(&body["store"], "?"));
        }
        Ok(r) => {
            let status = r.status();
            eprintln!("reverie-cli: server unhealthy (HTTP {})", status);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("reverie-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let server = cli.server.trim_end_matches('/').to_string();
    let json_output = cli.json;

    match cli.command {
        Commands::Add {
            text,
            entry_type,
            format,
            date,
            no_decompose,
        } => {
            let url = format!("{}/api/process-entry", server);
            let body = add_body(
                &text,
                entry_type.as_deref(),
                format.as_deref(),
                date.as_deref(),
                no_decompose,
            );
            let resp = send(client(PROCESS_TIMEOUT_SECS)?.post(&url).json(&body), &url)?;
            print(&resp, json_output, render_process)
        }
        Commands::Edit {
            id,
            text,
            entry_type,
            format,
        } => {
            let url = format!("{}/api/entry/{}", server, id);
            let mut body = json!({ "text": text });
            if let Some(t) = entry_type {
                body["type"] = json!(t);
            }
            if let Some(f) = format {
                body["format"] = json!(f);
            }
            let resp = send(client(PROCESS_TIMEOUT_SECS)?.patch(&url).json(&body), &url)?;
            print(&resp, json_output, entry_render)
        }
        Commands::Delete { id } => {
            let url = format!("{}/api/entry/{}", server, id);
            let resp = send(client(STATUS_TIMEOUT_SECS)?.delete(&url), &url)?;
            print(&resp, json_output, |_| "Deleted.".to_string())
        }
        Commands::Bookmark { id, off } => {
            let url = format!("{}/api/entry/{}/bookmark", server, id);
            let body = json!({ "bookmarked": !off });
            let resp = send(client(STATUS_TIMEOUT_SECS)?.patch(&url).json(&body), &url)?;
            print(&resp, json_output, entry_render)
        }
        Commands::Daily { date } => {
            let url = format!("{}/api/daily-summary{}", server, summary_query("date", date.as_deref(), false));
            let resp = send(client(SUMMARY_TIMEOUT_SECS)?.get(&url), &url)?;
            print(&resp, json_output, render_summary)
        }
        Commands::Weekly { week, regenerate } => {
            let url = format!(
                "{}/api/weekly-summary{}",
                server,
                summary_query("week", week.as_deref(), regenerate)
            );
            let resp = send(client(SUMMARY_TIMEOUT_SECS)?.get(&url), &url)?;
            print(&resp, json_output, render_summary)
        }
        Commands::Monthly { month, regenerate } => {
            let url = format!(
                "{}/api/monthly-summary{}",
                server,
                summary_query("month", month.as_deref(), regenerate)
            );
            let resp = send(client(SUMMARY_TIMEOUT_SECS)?.get(&url), &url)?;
            print(&resp, json_output, render_summary)
        }
        Commands::Status => do_status(&server),
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("reverie-cli: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
