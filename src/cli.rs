//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use grabber_core::DEFAULT_MAX_ATTEMPTS;
use grabber_core::resolver::SourceKind;

/// Grab full-text PubMed articles.
///
/// Reads PMIDs from `wanted.csv`, fetches full text from Crossref click-through
/// links and the PubMed Central Open Access subset, and files the results in
/// `XML/`, `PDF/` and `unknown/` below the working directory.
#[derive(Parser, Debug)]
#[command(name = "grabber")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory holding wanted.csv and clickThroughToken.txt, and receiving the output tree
    #[arg(short = 'd', long, default_value = ".", global = true)]
    pub work_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Try every source in order for each PMID
    Grab(GrabArgs),
    /// Use Crossref click-through links only
    Crossref(RunArgs),
    /// Use the PMC Open Access subset only
    PmcOai(RunArgs),
    /// Convert stored XML articles to plain text under TXT/
    Convert(ConvertArgs),
    /// Print the resources a PMID resolves to, without downloading
    Resolve(ResolveArgs),
}

/// Options shared by every command that talks to the network.
#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Contact email sent to NCBI and Crossref
    #[arg(short, long, env = "GRABBER_EMAIL")]
    pub email: String,

    /// Wanted list (default: <work-dir>/wanted.csv)
    #[arg(long)]
    pub wanted: Option<PathBuf>,

    /// Click-through token file (default: <work-dir>/clickThroughToken.txt)
    #[arg(long)]
    pub token: Option<PathBuf>,

    /// Output root (default: <work-dir>)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Attempts per download, initial attempt included (1-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_ATTEMPTS, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_attempts: u32,

    /// Connect timeout for downloads, in seconds
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..=600))]
    pub connect_timeout: u64,

    /// Read timeout for downloads, in seconds
    #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: u64,

    /// Minimum spacing between requests to one host, in milliseconds (0 disables)
    #[arg(long, default_value_t = 340, value_parser = clap::value_parser!(u64).range(0..=60_000))]
    pub request_interval_ms: u64,

    /// Serve every remote service from this base URL (testing against a mirror or mock)
    #[arg(long, hide = true, env = "GRABBER_SERVICE_BASE")]
    pub service_base: Option<String>,
}

/// Options for `grab`.
#[derive(ClapArgs, Debug, Clone)]
pub struct GrabArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Sources to try, in order
    #[arg(short, long, value_delimiter = ',', default_values_t = SourceKind::DEFAULT_ORDER)]
    pub sources: Vec<SourceKind>,
}

/// Options for `convert`.
#[derive(ClapArgs, Debug, Clone)]
pub struct ConvertArgs {
    /// Output root holding XML/ (default: <work-dir>); the same root `grab -o` writes to
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Options for `resolve`.
#[derive(ClapArgs, Debug, Clone)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// PMID to look up
    pub pmid: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(args)
    }

    #[test]
    fn test_cli_grab_defaults() {
        let args = parse(&["grabber", "grab", "--email", "me@example.org"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert_eq!(args.work_dir, PathBuf::from("."));
        let Command::Grab(grab) = args.command else {
            panic!("expected grab");
        };
        assert_eq!(grab.run.email, "me@example.org");
        assert_eq!(grab.run.max_attempts, 3);
        assert_eq!(grab.run.connect_timeout, 30);
        assert_eq!(grab.run.read_timeout, 300);
        assert_eq!(grab.run.request_interval_ms, 340);
        assert_eq!(grab.sources, SourceKind::DEFAULT_ORDER.to_vec());
    }

    #[test]
    fn test_cli_grab_source_order() {
        let args = parse(&[
            "grabber", "grab", "-e", "a@b.c", "--sources", "pmc-oa,crossref",
        ])
        .unwrap();
        let Command::Grab(grab) = args.command else {
            panic!("expected grab");
        };
        assert_eq!(grab.sources, vec![SourceKind::PmcOa, SourceKind::Crossref]);
    }

    #[test]
    fn test_cli_unknown_source_rejected() {
        let err = parse(&["grabber", "grab", "-e", "a@b.c", "-s", "arxiv"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_verbose_is_global() {
        let args = parse(&["grabber", "-vv", "convert"]).unwrap();
        assert_eq!(args.verbose, 2);
        let args = parse(&["grabber", "convert", "-v", "-d", "/tmp/run"]).unwrap();
        assert_eq!(args.verbose, 1);
        assert_eq!(args.work_dir, PathBuf::from("/tmp/run"));
    }

    #[test]
    fn test_cli_max_attempts_range() {
        let args = parse(&["grabber", "crossref", "-e", "a@b.c", "-r", "10"]).unwrap();
        let Command::Crossref(run) = args.command else {
            panic!("expected crossref");
        };
        assert_eq!(run.max_attempts, 10);

        let err = parse(&["grabber", "crossref", "-e", "a@b.c", "-r", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_convert_output_root() {
        let args = parse(&["grabber", "convert"]).unwrap();
        let Command::Convert(convert) = args.command else {
            panic!("expected convert");
        };
        assert!(convert.output.is_none());

        let args = parse(&["grabber", "convert", "-o", "/data/out"]).unwrap();
        let Command::Convert(convert) = args.command else {
            panic!("expected convert");
        };
        assert_eq!(convert.output, Some(PathBuf::from("/data/out")));
    }

    #[test]
    fn test_cli_request_interval_can_be_disabled() {
        let args = parse(&[
            "grabber", "pmc-oai", "-e", "a@b.c", "--request-interval-ms", "0",
        ])
        .unwrap();
        let Command::PmcOai(run) = args.command else {
            panic!("expected pmc-oai");
        };
        assert_eq!(run.request_interval_ms, 0);
    }

    #[test]
    fn test_cli_resolve_takes_pmid() {
        let args = parse(&["grabber", "resolve", "-e", "a@b.c", "28249574"]).unwrap();
        let Command::Resolve(resolve) = args.command else {
            panic!("expected resolve");
        };
        assert_eq!(resolve.pmid, "28249574");
    }

    #[test]
    fn test_cli_missing_subcommand_is_error() {
        assert!(parse(&["grabber"]).is_err());
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = parse(&["grabber", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = parse(&["grabber", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
