use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "depfetch")]
#[command(about = "Fetch build dependencies and print how to reproduce them", long_about = None)]
pub struct Cli {
    /// Build configuration to operate on
    #[arg(long, global = true, default_value = "buildconfig.json")]
    pub buildconfig: PathBuf,

    /// Directory dependencies are placed in (default: current directory)
    #[arg(long, global = true)]
    pub workdir: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch every dependency and print the reproduction arguments
    Resolve(ResolveArgs),
    /// Fetch a single dependency
    Get {
        name: String,
    },
    /// Print reproduction arguments for what is on disk, without fetching
    ReproArgs,
    /// Print the value of a build parameter
    Arg {
        /// Print nothing instead of failing when the entry is missing
        #[arg(long)]
        optional: bool,
        name: String,
    },
    /// Remove workspace entries the build does not keep
    Clean,
    /// List registered repository types
    Handlers,
}

#[derive(clap::Args, Debug)]
pub struct ResolveArgs {
    /// Write the config with pinned revisions back to the build config file
    #[arg(long)]
    pub write_pinned: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arg_command() {
        let cli = Cli::parse_from(["depfetch", "arg", "--optional", "CMAKE_FLAGS"]);
        assert!(matches!(
            cli.command,
            Commands::Arg { optional: true, ref name } if name == "CMAKE_FLAGS"
        ));
        assert_eq!(cli.buildconfig, PathBuf::from("buildconfig.json"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["depfetch", "resolve", "--buildconfig", "b.json", "-v"]);
        assert!(cli.verbose);
        assert_eq!(cli.buildconfig, PathBuf::from("b.json"));
        assert!(matches!(cli.command, Commands::Resolve(ResolveArgs { write_pinned: false })));
    }
}
