mod cmd_catalog;
mod cmd_search;
mod cmd_session;
mod cmd_show;
mod context;
mod logging;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use context::Sources;
use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "lectern")]
#[command(about = "Browse scripture documents and build shareable reading sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory document locations are resolved against
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Fetch documents over HTTP from this base instead of --root
    #[arg(long, global = true)]
    base_url: Option<Url>,

    /// Catalog file (JSON array of entries) replacing the built-in one
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Disable colored log output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available documents by category
    Catalog {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a document's sections, a section's chapters, or a chapter
    Show {
        document: String,

        /// Section id, name or index
        #[arg(long)]
        section: Option<String>,

        /// Chapter number within --section
        #[arg(long)]
        chapter: Option<u32>,
    },
    /// Search verse text, or section names with --sections
    Search {
        document: String,
        query: String,

        /// Only search this section (id, name or index)
        #[arg(long, conflicts_with = "sections")]
        section: Option<String>,

        /// Match section names instead of verse text
        #[arg(long)]
        sections: bool,

        /// Print a permalink under this base for each verse
        #[arg(long)]
        link: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect and edit session links
    Session {
        #[command(subcommand)]
        op: cmd_session::SessionOp,
    },
}

fn log_config(cli: &Cli) -> logging::LogConfig {
    logging::LogConfig::from_verbosity(cli.verbose).with_ansi(!cli.no_color)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&log_config(&cli));

    let sources = Sources {
        root: cli.root,
        base_url: cli.base_url,
        catalog: cli.catalog,
    };

    match cli.command {
        Commands::Catalog { json } => cmd_catalog::run(&sources.catalog()?, json, cli.pretty),
        Commands::Show {
            document,
            section,
            chapter,
        } => cmd_show::run(&sources, document, section, chapter).await,
        Commands::Search {
            document,
            query,
            section,
            sections,
            link,
            json,
        } => {
            let args = cmd_search::SearchArgs {
                document,
                query,
                section,
                sections,
                link,
                json,
            };
            cmd_search::run(&sources, args, cli.pretty).await
        }
        Commands::Session { op } => cmd_session::run(&sources, op, cli.pretty).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_from_flags() {
        let cli = Cli::parse_from(["lectern", "catalog"]);
        assert!(log_config(&cli).with_ansi);

        let cli = Cli::parse_from(["lectern", "-vv", "catalog", "--no-color"]);
        let config = log_config(&cli);
        assert!(!config.with_ansi);
        assert_eq!(config.level, tracing::Level::DEBUG);
    }
}
