//! Command-line interface for cisplatin_signature

use clap::{Args, Parser, Subcommand};

use crate::config::{FoldFailurePolicy, SignatureConfig};
use crate::simulate::SimulationParams;

/// Help flags are disabled for subcommands too, so per-command help goes
/// through the `help` subcommand
pub const COMMAND_HELP_HINT: &str = "Run `cisplatin_signature help <COMMAND>` for command-specific options.";

#[derive(Parser)]
#[command(name = "cisplatin_signature")]
#[command(version)]
#[command(about = "Cross-validated drug-sensitivity gene signature extraction")]
#[command(disable_help_flag = true)]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract a signature from cell-line and tumor tables
    #[command(
        about = "Extract a signature from cell-line and tumor tables",
        long_about = "Extract a signature from cell-line and tumor tables\n\n\
            Splits the cell lines into folds, runs three differential-expression tests\n\
            on each training subset, keeps genes called by all three, filters them by\n\
            tumor co-expression connectivity and keeps genes found in most folds.",
        after_long_help = "\
Examples:
  # Defaults (5 folds, top/bottom 20% response)
  cisplatin_signature run -c cell_lines.tsv -t tumor.tsv -o results/

  # Parameters from a JSON file, with a command-line override
  cisplatin_signature run -c cell_lines.tsv -t tumor.tsv --config params.json --n-folds 10

  # Keep going when a fold's DE step fails
  cisplatin_signature run -c cell_lines.tsv -t tumor.tsv --drop-failed-folds"
    )]
    Run {
        /// Cell-line table (samples x [response, auc, genes])
        #[arg(short, long,
            long_help = "Cell-line table.\n\
                Format: first column = sample IDs, then the response column, an optional\n\
                AUC column and one column per gene. CSV or TSV (auto-detected).")]
        cell_lines: String,

        /// Tumor expression table (samples x genes)
        #[arg(short, long)]
        tumor: String,

        /// JSON file with configuration values
        #[arg(long)]
        config: Option<String>,

        /// Output directory [default: signature_output]
        #[arg(short, long, default_value = "signature_output")]
        output_dir: String,

        /// Restrict both tables to their shared genes before running
        #[arg(long)]
        align_genes: bool,

        #[command(flatten)]
        overrides: ConfigOverrides,
    },

    /// Score samples against a gene list
    Score {
        /// Expression table (samples x genes)
        #[arg(short, long)]
        expression: String,

        /// Gene list, one identifier per line
        #[arg(short, long)]
        genes: String,

        /// Output TSV [default: scores.tsv]
        #[arg(short, long, default_value = "scores.tsv")]
        output: String,
    },

    /// Write synthetic cell-line and tumor tables with a planted signal
    Simulate {
        /// Output directory [default: simulated]
        #[arg(short, long, default_value = "simulated")]
        output_dir: String,

        #[arg(long, default_value = "100")]
        n_samples: usize,

        #[arg(long, default_value = "20")]
        n_genes: usize,

        #[arg(long, default_value = "5")]
        n_signal: usize,

        /// Mean shift between the extreme response quintiles, in standard deviations
        #[arg(long, default_value = "2.0")]
        effect_sd: f64,

        #[arg(long, default_value = "80")]
        n_tumor_samples: usize,

        /// Signal genes sharing a latent factor in the tumor data
        #[arg(long, default_value = "3")]
        n_coexpressed: usize,

        #[arg(long, default_value = "1")]
        seed: u64,
    },
}

/// Command-line values that take precedence over the configuration file
#[derive(Args, Debug, Default)]
pub struct ConfigOverrides {
    /// Drug name used to label outputs
    #[arg(long)]
    pub drug: Option<String>,

    /// Response column in the cell-line table [default: ln_ic50]
    #[arg(long)]
    pub response_column: Option<String>,

    /// AUC column in the cell-line table [default: auc]
    #[arg(long)]
    pub auc_column: Option<String>,

    /// Fraction of samples at each response extreme [default: 0.2]
    #[arg(long)]
    pub de_comp_perc: Option<f64>,

    /// Fraction trimmed from each response extreme first [default: 0]
    #[arg(long)]
    pub rm_extreme_perc: Option<f64>,

    /// Permutations of the SAM-style test [default: 100]
    #[arg(long)]
    pub sam_perm: Option<usize>,

    /// Permutations of the maxT test [default: 1000]
    #[arg(long)]
    pub mult_perm: Option<usize>,

    /// Significance level of each DE test [default: 0.05]
    #[arg(long)]
    pub de_alpha: Option<f64>,

    /// Number of folds [default: 5]
    #[arg(long)]
    pub n_folds: Option<usize>,

    /// Random seed [default: 42]
    #[arg(long)]
    pub seed: Option<u64>,

    /// Fraction of affinities counted as strong co-expression [default: 0.05]
    #[arg(long)]
    pub conn_sig_frac: Option<f64>,

    /// Top connectivity fraction a seed gene must reach [default: 0.2]
    #[arg(long)]
    pub conn_cutoff_perc: Option<f64>,

    /// Time limit per DE test call, in seconds
    #[arg(long, value_name = "SECS")]
    pub method_timeout: Option<u64>,

    /// Consolidate over completed folds when a fold fails
    #[arg(long)]
    pub drop_failed_folds: bool,

    /// Number of threads (0 = all cores)
    #[arg(long)]
    pub threads: Option<usize>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut SignatureConfig) {
        if let Some(v) = &self.drug {
            config.drug = v.clone();
        }
        if let Some(v) = &self.response_column {
            config.response_column = v.clone();
        }
        if let Some(v) = &self.auc_column {
            config.auc_column = Some(v.clone());
        }
        if let Some(v) = self.de_comp_perc {
            config.de_comp_perc = v;
        }
        if let Some(v) = self.rm_extreme_perc {
            config.rm_extreme_perc = v;
        }
        if let Some(v) = self.sam_perm {
            config.sam_perm = v;
        }
        if let Some(v) = self.mult_perm {
            config.mult_perm = v;
        }
        if let Some(v) = self.de_alpha {
            config.de_alpha = v;
        }
        if let Some(v) = self.n_folds {
            config.n_folds = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.conn_sig_frac {
            config.conn_sig_frac = v;
        }
        if let Some(v) = self.conn_cutoff_perc {
            config.conn_cutoff_perc = v;
        }
        if let Some(v) = self.method_timeout {
            config.method_timeout_secs = Some(v);
        }
        if self.drop_failed_folds {
            config.fold_failure_policy = FoldFailurePolicy::DropFailed;
        }
        if let Some(v) = self.threads {
            config.threads = v;
        }
    }
}

/// Simulation parameters from the `simulate` subcommand
pub fn simulation_params(
    n_samples: usize,
    n_genes: usize,
    n_signal: usize,
    effect_sd: f64,
    n_tumor_samples: usize,
    n_coexpressed: usize,
    seed: u64,
) -> SimulationParams {
    SimulationParams {
        n_samples,
        n_genes,
        n_signal,
        effect_sd,
        n_tumor_samples,
        n_coexpressed,
        seed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_command_help_via_help_subcommand() {
        let err = Cli::try_parse_from(["cisplatin_signature", "help", "run"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert!(err.to_string().contains("--cell-lines"));

        let err = Cli::try_parse_from(["cisplatin_signature", "run", "--help"]).err().unwrap();
        assert_ne!(err.kind(), ErrorKind::DisplayHelp);
        assert!(COMMAND_HELP_HINT.contains("cisplatin_signature help <COMMAND>"));
    }

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::parse_from([
            "cisplatin_signature",
            "run",
            "-c",
            "cells.tsv",
            "-t",
            "tumor.tsv",
            "--n-folds",
            "10",
            "--drop-failed-folds",
            "--method-timeout",
            "60",
        ]);
        match cli.command {
            Some(Commands::Run { cell_lines, overrides, .. }) => {
                assert_eq!(cell_lines, "cells.tsv");
                let mut config = SignatureConfig::default();
                overrides.apply(&mut config);
                assert_eq!(config.n_folds, 10);
                assert_eq!(config.fold_failure_policy, FoldFailurePolicy::DropFailed);
                assert_eq!(config.method_timeout_secs, Some(60));
                assert_eq!(config.de_comp_perc, 0.2);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let mut config = SignatureConfig::default();
        config.seed = 7;
        ConfigOverrides::default().apply(&mut config);
        assert_eq!(config.seed, 7);
        assert_eq!(config.fold_failure_policy, FoldFailurePolicy::Abort);
    }
}
