use crate::commands::{run_hash_password, run_keepalive, run_report, run_track};
use crate::server;
use clap::{Args, Parser, Subcommand, ValueEnum};
use staff_tracker::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Staff Tracker",
    about = "Serve the staff location tracker API and run its companion tools",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Write an attendance workbook for one staff member to disk
    Report(ReportArgs),
    /// Check a staff member in or out and record their location periodically
    Track(TrackArgs),
    /// Ping a deployment on an interval to keep it awake
    Keepalive(KeepAliveArgs),
    /// Print a bcrypt hash for a password
    HashPassword(HashPasswordArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct ReportArgs {
    /// Staff id to report on
    pub(crate) staff_id: String,
    /// Named period: daily, weekly, monthly, quarterly or yearly
    #[arg(long)]
    pub(crate) period: Option<String>,
    /// Custom range start (YYYY-MM-DD); requires --end-date
    #[arg(long, requires = "end_date")]
    pub(crate) start_date: Option<String>,
    /// Custom range end (YYYY-MM-DD), inclusive
    #[arg(long, requires = "start_date")]
    pub(crate) end_date: Option<String>,
    /// Directory for the workbook; defaults to REPORTS_DIR
    #[arg(long)]
    pub(crate) output_dir: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum TrackAction {
    /// Check in and keep capturing until interrupted
    CheckIn,
    /// Record a final location and close the open session
    CheckOut,
    /// Show whether the staff member is checked in
    Status,
}

#[derive(Args, Debug)]
pub(crate) struct TrackArgs {
    /// Staff id of the device owner
    pub(crate) staff_id: String,
    #[arg(value_enum)]
    pub(crate) action: TrackAction,
    /// Latitude reported for every capture
    #[arg(long, allow_hyphen_values = true, default_value_t = 0.0)]
    pub(crate) lat: f64,
    /// Longitude reported for every capture
    #[arg(long, allow_hyphen_values = true, default_value_t = 0.0)]
    pub(crate) lng: f64,
}

#[derive(Args, Debug, Default)]
pub(crate) struct KeepAliveArgs {
    /// Override the URL to ping
    #[arg(long)]
    pub(crate) target: Option<String>,
    /// Override the ping interval in minutes
    #[arg(long)]
    pub(crate) interval_minutes: Option<u64>,
    /// Override the status endpoint port
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct HashPasswordArgs {
    pub(crate) password: String,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Report(args) => run_report(args).await,
        Command::Track(args) => run_track(args).await,
        Command::Keepalive(args) => run_keepalive(args).await,
        Command::HashPassword(args) => run_hash_password(args).await,
    }
}
