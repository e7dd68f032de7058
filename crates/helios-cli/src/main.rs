mod commands;
mod output;

use clap::{Parser, Subcommand};
use helios_core::YearMonth;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "helios",
    version,
    about = "Monthly sales reporting from PDF invoices and CSV/Excel exports"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the line-item table from a PDF invoice (without normalizing)
    Extract {
        /// Path to PDF invoice
        input_file: PathBuf,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Normalize one or more sales files and print monthly summaries
    Report {
        /// PDF, CSV, XLSX or XLS files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Custom JSON detection config
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Only include these months (repeatable)
        #[arg(short, long = "month", value_name = "YYYY-MM")]
        months: Vec<YearMonth>,

        /// Only include these categories (repeatable)
        #[arg(long = "category", value_name = "NAME")]
        categories: Vec<String>,

        /// Month assigned to files with no date column, e.g. a monthly invoice
        #[arg(long, value_name = "YYYY-MM")]
        default_month: Option<YearMonth>,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Inspect and validate column-detection configs
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the built-in detection config as JSON
    Show,
    /// Validate a custom detection config file
    Validate {
        /// Path to JSON config file
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract { input_file, output } => commands::extract::run(input_file, &output),
        Commands::Report {
            files,
            config,
            months,
            categories,
            default_month,
            output,
        } => commands::report::run(commands::report::ReportArgs {
            files,
            config,
            months,
            categories,
            default_month,
            output,
        }),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(),
            ConfigAction::Validate { file } => commands::config::validate(&file),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
