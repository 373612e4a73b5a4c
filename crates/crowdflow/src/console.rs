//! Colorful console output for the hub and the scheduling engine.
//!
//! Provides a custom `tracing` layer. Engine events carrying an `event` field
//! (`solve_start`, `round_end`, `solve_end`) get dedicated lines; every other
//! `crowdflow*` event is printed as one line with its structured fields.

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::sync::OnceLock;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static INIT: OnceLock<()> = OnceLock::new();

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "crowdflow=info";

/// Initializes console output.
///
/// Safe to call multiple times - only the first call has effect.
/// Prints the Crowdflow banner and sets up tracing.
pub fn init() {
    INIT.get_or_init(|| {
        print_banner();

        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .from_env_lossy();
        let filter = if std::env::var_os(EnvFilter::DEFAULT_ENV).is_none() {
            match DEFAULT_DIRECTIVE.parse() {
                Ok(directive) => filter.add_directive(directive),
                Err(_) => filter,
            }
        } else {
            filter
        };

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(CrowdflowConsoleLayer)
            .try_init();
    });
}

fn print_banner() {
    let banner = r#"
  ____                      _  __ _
 / ___|_ __ _____      ____| |/ _| | _____      __
| |   | '__/ _ \ \ /\ / / _` | |_| |/ _ \ \ /\ / /
| |___| | | (_) \ V  V / (_| |  _| | (_) \ V  V /
 \____|_|  \___/ \_/\_/ \__,_|_| |_|\___/ \_/\_/
"#;

    let version_line = format!(
        "              v{} - Crowd-Flow Scheduling Hub\n",
        env!("CARGO_PKG_VERSION")
    );

    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{}", banner.bright_cyan());
    let _ = writeln!(stdout, "{}", version_line.bright_white().bold());
    let _ = stdout.flush();
}

/// A tracing layer that formats crowdflow events with colors.
pub struct CrowdflowConsoleLayer;

impl<S: Subscriber> Layer<S> for CrowdflowConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !metadata.target().starts_with("crowdflow") {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let output = format_event(&visitor, *metadata.level(), metadata.target());
        if !output.is_empty() {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }
}

#[derive(Default)]
struct EventVisitor {
    event: Option<String>,
    message: Option<String>,
    fields: Vec<(&'static str, String)>,
    numbers: Vec<(&'static str, i64)>,
}

impl EventVisitor {
    fn number(&self, name: &str) -> Option<i64> {
        self.numbers
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| *value)
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value.as_str())
    }
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let s = format!("{:?}", value);
        match field.name() {
            "message" => self.message = Some(s),
            "event" => self.event = Some(s.trim_matches('"').to_string()),
            name => self.fields.push((name, s.trim_matches('"').to_string())),
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_i64(field, i64::try_from(value).unwrap_or(i64::MAX));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.numbers.push((field.name(), value));
        self.fields.push((field.name(), value.to_string()));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            name => self.fields.push((name, value.to_string())),
        }
    }
}

fn format_event(v: &EventVisitor, level: Level, target: &str) -> String {
    match v.event.as_deref() {
        Some("solve_start") => format_solve_start(v),
        Some("round_end") => format_round_end(v),
        Some("solve_end") => format_solve_end(v),
        Some(_) if level > Level::INFO => String::new(),
        _ => format_plain(v, level, target),
    }
}

fn format_solve_start(v: &EventVisitor) -> String {
    let groups = v.number("groups").unwrap_or(0);
    let ticks = v.number("ticks").unwrap_or(0);
    let segments = v.number("segments").unwrap_or(0);
    let presence = groups * ticks * segments;

    format!(
        "{} {} {} {} groups, {} ticks, {} segments, {} presence variables ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Scheduler]".bright_cyan(),
        groups.to_formatted_string(&Locale::en).bright_yellow(),
        ticks.to_formatted_string(&Locale::en).bright_yellow(),
        segments.to_formatted_string(&Locale::en).bright_yellow(),
        presence.to_formatted_string(&Locale::en).bright_magenta(),
        v.text("backend").unwrap_or("unknown").white()
    )
}

fn format_round_end(v: &EventVisitor) -> String {
    let round = v.number("round").unwrap_or(0);
    let status = v.text("status").unwrap_or("Unknown");
    let status = if status == "Optimal" {
        status.bright_green().to_string()
    } else {
        status.bright_red().bold().to_string()
    };

    format!(
        "{} {} {} round ({}) ended: time spent ({}), variables ({}), constraints ({}), status ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        format!("[Round {}]", round).bright_cyan(),
        round.to_string().yellow(),
        format_duration_ms(v.number("duration_ms").unwrap_or(0)).yellow(),
        v.number("variables")
            .unwrap_or(0)
            .to_formatted_string(&Locale::en)
            .white(),
        v.number("constraints")
            .unwrap_or(0)
            .to_formatted_string(&Locale::en)
            .white(),
        status
    )
}

fn format_solve_end(v: &EventVisitor) -> String {
    let unused = v.number("unused_capacity").unwrap_or(0);

    let mut output = format!(
        "{} {} {} Scheduling ended: unused capacity ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Scheduler]".bright_cyan(),
        unused.to_formatted_string(&Locale::en).bright_magenta().bold()
    );

    output.push_str("\n\n");
    output.push_str(
        &"╔══════════════════════════════════════════════════════════╗"
            .bright_cyan()
            .to_string(),
    );
    output.push('\n');

    let status_text = "SCHEDULE FOUND";
    let total_pad = 58usize.saturating_sub(status_text.len());
    let left_pad = total_pad / 2;
    let right_pad = total_pad - left_pad;
    output.push_str(&format!(
        "{}{}{}{}{}",
        "║".bright_cyan(),
        " ".repeat(left_pad),
        status_text.bright_green().bold(),
        " ".repeat(right_pad),
        "║".bright_cyan()
    ));
    output.push('\n');

    output.push_str(
        &"╠══════════════════════════════════════════════════════════╣"
            .bright_cyan()
            .to_string(),
    );
    output.push('\n');

    output.push_str(&format!(
        "{}  {:<18}{:>36}  {}",
        "║".bright_cyan(),
        "Unused capacity:",
        unused.to_formatted_string(&Locale::en),
        "║".bright_cyan()
    ));
    output.push('\n');

    output.push_str(
        &"╚══════════════════════════════════════════════════════════╝"
            .bright_cyan()
            .to_string(),
    );
    output.push('\n');

    output
}

fn format_plain(v: &EventVisitor, level: Level, target: &str) -> String {
    let level_text = match level {
        Level::ERROR => "ERROR".bright_red().bold().to_string(),
        Level::WARN => "WARN ".yellow().to_string(),
        Level::INFO => "INFO ".bright_green().to_string(),
        Level::DEBUG => "DEBUG".bright_blue().to_string(),
        Level::TRACE => "TRACE".bright_black().to_string(),
    };
    let component = target.split("::").next().unwrap_or(target);
    let component = component.strip_prefix("crowdflow_").unwrap_or(component);

    let mut output = format!(
        "{} {} {} {}",
        timestamp().bright_black(),
        level_text,
        format!("[{}]", component).bright_cyan(),
        v.message.as_deref().unwrap_or("").white()
    );
    for (name, value) in &v.fields {
        if *name == "duration_ms" {
            if let Some(ms) = v.number(name) {
                output.push_str(&format!(" {}", format_duration_ms(ms).yellow()));
                continue;
            }
        }
        output.push_str(&format!(" {}={}", name.bright_black(), value));
    }
    output
}

fn timestamp() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| {
            let secs = d.as_secs() % 100000;
            let millis = d.subsec_millis();
            format!("{:5}.{:03}", secs, millis)
        })
        .unwrap_or_else(|_| "    0.000".to_string())
}

fn format_duration_ms(ms: i64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        let mins = ms / 60_000;
        let secs = (ms % 60_000) / 1000;
        format!("{}m {}s", mins, secs)
    }
}
