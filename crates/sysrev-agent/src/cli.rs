//! Command-line interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Overrides;

#[derive(Debug, Parser)]
#[command(name = "sysrev", version, about = "Hybrid data extraction and full-text screening for systematic reviews")]
pub struct Cli {
    /// Debug-level logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract study data from every PDF into one CSV row per paper.
    Extract(RunArgs),
    /// Screen every PDF against the inclusion and exclusion criteria.
    Screen(RunArgs),
    /// Print the output field schema.
    Fields,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// claude, gpt or gemini.
    #[arg(long, env = "SYSREV_PROVIDER")]
    pub provider: Option<String>,

    #[arg(long, env = "SYSREV_MODEL")]
    pub model: Option<String>,

    /// Folder containing the PDFs.
    #[arg(long, value_name = "DIR")]
    pub folder: Option<PathBuf>,

    /// File with one PDF filename per line.
    #[arg(long, value_name = "FILE")]
    pub files_list: Option<PathBuf>,

    /// Output CSV.
    #[arg(short, long, value_name = "CSV")]
    pub output: Option<PathBuf>,
}

impl From<&RunArgs> for Overrides {
    fn from(args: &RunArgs) -> Self {
        Overrides {
            provider: args.provider.clone(),
            model: args.model.clone(),
            pdf_folder: args.folder.clone(),
            files_list: args.files_list.clone(),
            output: args.output.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_flags() {
        let cli = Cli::parse_from(["sysrev", "-v", "extract", "--provider", "gemini", "--folder", "pdfs", "-o", "out.csv"]);
        assert!(cli.verbose);
        let Command::Extract(args) = cli.command else {
            panic!("expected extract");
        };
        let o = Overrides::from(&args);
        assert_eq!(o.provider.as_deref(), Some("gemini"));
        assert_eq!(o.pdf_folder, Some(PathBuf::from("pdfs")));
        assert_eq!(o.output, Some(PathBuf::from("out.csv")));
    }

    #[test]
    fn test_fields_takes_no_arguments() {
        assert!(matches!(Cli::parse_from(["sysrev", "fields"]).command, Command::Fields));
        assert!(Cli::try_parse_from(["sysrev", "fields", "--folder", "x"]).is_err());
    }
}
