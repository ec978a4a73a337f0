use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use substitute_planner::config::{Config, ConfigOverrides};
use substitute_planner::output::csv::{plan_to_csv, slots_to_csv, teachers_to_csv};
use substitute_planner::output::json::render_json;
use substitute_planner::output::table::{
    render_plan_report, render_teachers_table, render_timetable_table,
};
use substitute_planner::planning::plan::PlanReport;
use substitute_planner::planning::{AbsenceRecord, SubstituteChoice};
use substitute_planner::recommender::{build_recommender, RecommenderKind};
use substitute_planner::server::run_server;
use substitute_planner::session::PlanningSession;
use substitute_planner::snapshot::store::SqliteStorage;
use substitute_planner::snapshot::Storage;
use substitute_planner::timetable::{School, Teacher, Weekday};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "substitute-planner",
    about = "Plan substitute teachers for a day's absences"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    /// Timetable grid file, overriding [school].timetable_path
    #[arg(short, long)]
    timetable: Option<String>,
    /// State database, overriding [storage].db_path
    #[arg(long)]
    db: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate a plan for the given date and absences
    Plan {
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// ID or ID:REASON, repeatable
        #[arg(short, long = "absent", required = true)]
        absent: Vec<AbsenceRecord>,
        #[arg(long)]
        preparer: Option<String>,
        #[arg(short, long)]
        recommender: Option<RecommenderKind>,
    },
    Show,
    /// Override the substitute of one row (teacher id or LAIN_LAIN)
    Assign {
        #[arg(long)]
        row: usize,
        #[arg(long)]
        teacher: SubstituteChoice,
    },
    /// Type the substitute name of a LAIN_LAIN row
    Name {
        #[arg(long)]
        row: usize,
        #[arg(long)]
        name: String,
    },
    Available {
        #[arg(long)]
        row: usize,
    },
    Timetable {
        #[arg(long)]
        day: Option<Weekday>,
    },
    Teachers,
    Clear,
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        timetable_path: cli.timetable.clone(),
        recommender: match &cli.command {
            Commands::Plan { recommender, .. } => *recommender,
            _ => None,
        },
        db_path: cli.db.clone(),
    });

    if let Commands::Config { init, show } = &cli.command {
        return handle_config_command(*init, *show, &config, &config_path);
    }
    if let Commands::Serve { host, port } = &cli.command {
        let bind = format!("{host}:{port}");
        let addr: SocketAddr = bind
            .parse()
            .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
        return run_server(config, addr).await;
    }

    let school = Arc::new(School::load(config.resolved_timetable_path().as_deref())?);
    let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open(&config.resolved_db_path())?);
    let mut session = PlanningSession::restore(Arc::clone(&school), storage);
    if session.preparer_name().is_empty() && !config.report.preparer_name.is_empty() {
        session.set_preparer_name(&config.report.preparer_name);
    }

    match cli.command {
        Commands::Plan {
            date,
            absent,
            preparer,
            ..
        } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let recommender = build_recommender(config.recommender.kind, &config.recommender);
            info!("planning {date} with the {} recommender", recommender.kind());
            session
                .generate(date, absent, preparer.as_deref(), recommender.as_ref())
                .await?;
            print_report(&session, &config, cli.output)?;
        }
        Commands::Show => print_report(&session, &config, cli.output)?,
        Commands::Assign { row, teacher } => {
            session.set_substitute(row, teacher)?;
            print_report(&session, &config, cli.output)?;
        }
        Commands::Name { row, name } => {
            session.set_manual_substitute_name(row, &name)?;
            print_report(&session, &config, cli.output)?;
        }
        Commands::Available { row } => {
            let teachers = session.available_substitutes(row)?;
            if teachers.is_empty() {
                warn!("no free teacher for row {row}; use LAIN_LAIN");
            }
            print_teachers(&teachers, cli.output)?;
        }
        Commands::Timetable { day } => {
            let slots: Vec<_> = school
                .timetable
                .slots()
                .iter()
                .filter(|s| day.map_or(true, |d| s.weekday == d))
                .collect();
            match cli.output {
                OutputFormat::Table => println!("{}", render_timetable_table(&school, day)),
                OutputFormat::Json => println!("{}", render_json(&slots)?),
                OutputFormat::Csv => print!("{}", slots_to_csv(&slots)?),
            }
        }
        Commands::Teachers => print_teachers(school.roster.teachers(), cli.output)?,
        Commands::Clear => {
            session.clear();
            println!("Saved plan cleared");
        }
        Commands::Config { .. } => {}
        Commands::Serve { .. } => unreachable!("serve command handled before dispatch"),
    }

    Ok(())
}

fn handle_config_command(init: bool, show: bool, config: &Config, config_path: &PathBuf) -> Result<()> {
    if init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn print_report(session: &PlanningSession, config: &Config, format: OutputFormat) -> Result<()> {
    let Some(report) = session.report() else {
        println!("No saved plan. Run `substitute-planner plan` first.");
        return Ok(());
    };
    print_plan_report(&report, &config.report.footer, format)
}

fn print_plan_report(report: &PlanReport, footer: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_plan_report(report, footer)),
        OutputFormat::Json => println!("{}", render_json(report)?),
        OutputFormat::Csv => print!("{}", plan_to_csv(report)?),
    }
    Ok(())
}

fn print_teachers(teachers: &[Teacher], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_teachers_table(teachers)),
        OutputFormat::Json => println!("{}", render_json(teachers)?),
        OutputFormat::Csv => print!("{}", teachers_to_csv(teachers)?),
    }
    Ok(())
}
