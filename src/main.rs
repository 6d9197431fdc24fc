use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process;
use tracing::info;

use ticket_analytics::aggregate::{GroupBy, Metric};
use ticket_analytics::compare::CompareOrder;
use ticket_analytics::config::{get_config, Config};
use ticket_analytics::display::ReportDisplayManager;
use ticket_analytics::logging::{analysis_span, init_logging};
use ticket_analytics::parser::TicketFileParser;
use ticket_analytics::timestamp_parser::TimestampParser;
use ticket_analytics::{AnalysisWindow, FilterSet, TicketAnalyzer};

#[derive(Parser)]
#[command(name = "ticket-analytics")]
#[command(about = "Comparative analytics for service-queue ticket logs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Ticket log, one JSON object per line
    #[arg(long)]
    input: PathBuf,
    /// Current period start (YYYY-MM-DD); defaults to the first date in the data,
    /// or to today when the input is empty
    #[arg(long)]
    p2_start: Option<String>,
    /// Current period end (YYYY-MM-DD); defaults to the last date in the data,
    /// or to today when the input is empty
    #[arg(long)]
    p2_end: Option<String>,
    /// Restrict to a client (repeatable, ALL for every client)
    #[arg(long = "client")]
    clients: Vec<String>,
    /// Restrict to an operation (repeatable, ALL for every operation)
    #[arg(long = "operation")]
    operations: Vec<String>,
    /// Restrict to a shift A, B or C (repeatable, ALL for every shift)
    #[arg(long = "shift")]
    shifts: Vec<String>,
    /// Configuration file (defaults to the standard search path)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two periods group by group
    Compare {
        #[command(flatten)]
        common: CommonArgs,
        /// Reference period start (YYYY-MM-DD)
        #[arg(long)]
        p1_start: String,
        /// Reference period end (YYYY-MM-DD)
        #[arg(long)]
        p1_end: String,
        /// client, operation, operator, hour, shift or date
        #[arg(long, default_value = "client")]
        group_by: GroupBy,
        /// service, wait or total
        #[arg(long, default_value = "service")]
        metric: Metric,
        /// volume or key
        #[arg(long, default_value = "volume")]
        order: CompareOrder,
    },
    /// Rank operators by idle time between services
    Idle {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Detect pickup bursts and critical hours
    Convoy {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Pickups by date and hour of day
    Heatmap {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Share of tickets within the dwell-time target
    Dwell {
        #[command(flatten)]
        common: CommonArgs,
        /// client, operation, operator, hour, shift or date
        #[arg(long, default_value = "client")]
        group_by: GroupBy,
    },
    /// Active gates per hour of day
    Gates {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Operations and clients covered by each operator
    Polyvalence {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Headline figures and daily volume of a period
    Overview {
        #[command(flatten)]
        common: CommonArgs,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Compare { .. } => "compare",
            Commands::Idle { .. } => "idle",
            Commands::Convoy { .. } => "convoy",
            Commands::Heatmap { .. } => "heatmap",
            Commands::Dwell { .. } => "dwell",
            Commands::Gates { .. } => "gates",
            Commands::Polyvalence { .. } => "polyvalence",
            Commands::Overview { .. } => "overview",
        }
    }

    fn common(&self) -> &CommonArgs {
        match self {
            Commands::Compare { common, .. }
            | Commands::Idle { common }
            | Commands::Convoy { common }
            | Commands::Heatmap { common }
            | Commands::Dwell { common, .. }
            | Commands::Gates { common }
            | Commands::Polyvalence { common }
            | Commands::Overview { common } => common,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let json = cli.command.common().json;

    match run(cli.command) {
        Ok(()) => Ok(()),
        Err(e) => handle_error(e, json),
    }
}

fn run(command: Commands) -> Result<()> {
    let common = command.common();
    let config = match &common.config {
        Some(path) => Config::load_layered(Some(path.as_path()))?,
        None => get_config()?.clone(),
    };
    let _log_guard = init_logging(&config);

    let span = analysis_span(command.name());
    let _entered = span.enter();

    let (analyzer, filters, window) = parse_common_args(common, &config)?;
    let display = ReportDisplayManager::new(common.json);

    match &command {
        Commands::Compare {
            p1_start,
            p1_end,
            group_by,
            metric,
            order,
            ..
        } => {
            let period_1 = analyzer.window_from_str(p1_start, p1_end)?;
            display.display_comparison(&analyzer.compare(
                &period_1, &window, &filters, *group_by, *metric, *order,
            ));
        }
        Commands::Idle { .. } => display.display_idle(&analyzer.idle(&window, &filters)),
        Commands::Convoy { .. } => display.display_convoy(&analyzer.convoy(&window, &filters)),
        Commands::Heatmap { .. } => display.display_heatmap(&analyzer.heatmap(&window, &filters)),
        Commands::Dwell { group_by, .. } => {
            display.display_dwell(&analyzer.dwell(&window, &filters, *group_by))
        }
        Commands::Gates { .. } => display.display_gates(&analyzer.gates(&window, &filters)),
        Commands::Polyvalence { .. } => {
            display.display_polyvalence(&analyzer.polyvalence(&window, &filters))
        }
        Commands::Overview { .. } => {
            display.display_overview(&analyzer.overview(&window, &filters))
        }
    }

    Ok(())
}

fn parse_common_args(
    common: &CommonArgs,
    config: &Config,
) -> Result<(TicketAnalyzer, FilterSet, AnalysisWindow)> {
    let parsed = TicketFileParser::new(config.shifts).load_events(&common.input)?;
    info!(
        tickets = parsed.output.len(),
        skipped = parsed.skipped_lines,
        "Tickets loaded"
    );
    if parsed.skipped_lines > 0 && !common.json {
        eprintln!(
            "{} Skipped {} malformed line(s) in {}",
            "⚠".bright_yellow(),
            parsed.skipped_lines,
            common.input.display()
        );
    }

    let filters = FilterSet::from_labels(&common.clients, &common.operations, &common.shifts)?;
    let analyzer = TicketAnalyzer::from_config(parsed.output, config);

    let start = common
        .p2_start
        .as_deref()
        .map(TimestampParser::parse_date)
        .transpose()?;
    let end = common
        .p2_end
        .as_deref()
        .map(TimestampParser::parse_date)
        .transpose()?;
    // Missing bounds come from the data; an empty input falls back to a single day.
    let (first, last) = analyzer.data_span().unwrap_or_else(|| {
        let day = start
            .or(end)
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        (day, day)
    });
    let window = analyzer.window(start.unwrap_or(first), end.unwrap_or(last))?;

    Ok((analyzer, filters, window))
}

fn handle_error(e: anyhow::Error, json: bool) -> Result<(), anyhow::Error> {
    if json {
        println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
    } else {
        eprintln!("{} {:#}", "Error:".bright_red().bold(), e);
    }
    process::exit(1);
}
