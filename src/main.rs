//! cisplatin_signature command-line interface

use std::fs;
use std::path::Path;

use clap::Parser;
use log::{info, LevelFilter};

use cisplatin_signature::cli::{simulation_params, Cli, Commands, ConfigOverrides, COMMAND_HELP_HINT};
use cisplatin_signature::prelude::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Find the first non-flag argument (potential subcommand)
    let first_positional = args.iter().skip(1).find(|a| !a.starts_with('-'));
    let subcommands = ["run", "score", "simulate", "help"];
    let has_subcommand = first_positional.map_or(false, |a| subcommands.contains(&a.as_str()));

    if !has_subcommand {
        if args.iter().any(|a| a == "-h" || a == "--help") {
            print_help();
            return;
        }
        if args.iter().any(|a| a == "-V" || a == "--version") {
            println!("cisplatin_signature {}", VERSION);
            return;
        }
        print_no_args();
        return;
    }

    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Some(Commands::Run {
            cell_lines,
            tumor,
            config,
            output_dir,
            align_genes,
            overrides,
        }) => run_signature_command(&cell_lines, &tumor, config.as_deref(), &output_dir, align_genes, &overrides),
        Some(Commands::Score { expression, genes, output }) => run_score(&expression, &genes, &output),
        Some(Commands::Simulate {
            output_dir,
            n_samples,
            n_genes,
            n_signal,
            effect_sd,
            n_tumor_samples,
            n_coexpressed,
            seed,
        }) => run_simulate(
            &output_dir,
            &simulation_params(n_samples, n_genes, n_signal, effect_sd, n_tumor_samples, n_coexpressed, seed),
        ),
        None => {
            print_no_args();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_no_args() {
    println!("cisplatin_signature v{}", VERSION);
    println!("Run `cisplatin_signature -h` for usage.");
}

fn print_help() {
    println!("cisplatin_signature v{}", VERSION);
    println!();
    println!("Usage: cisplatin_signature <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  run       Extract a signature from cell-line and tumor tables");
    println!("  score     Score samples against a gene list");
    println!("  simulate  Write synthetic input tables with a planted signal");
    println!();
    println!("{}", COMMAND_HELP_HINT);
}

fn run_signature_command(
    cell_lines_path: &str,
    tumor_path: &str,
    config_path: Option<&str>,
    output_dir: &str,
    align_genes: bool,
    overrides: &ConfigOverrides,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            SignatureConfig::from_json_file(path)?
        }
        None => SignatureConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate()?;

    // Configure thread pool
    if config.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build_global()
            .ok();
    }

    info!("Loading cell lines from: {}", cell_lines_path);
    let mut cell_lines = read_cell_line_table(cell_lines_path, &config.response_column, config.auc_column.as_deref())?;
    info!("  {} samples, {} genes", cell_lines.n_samples(), cell_lines.n_genes());

    info!("Loading tumor expression from: {}", tumor_path);
    let mut tumor = read_expression_table(tumor_path)?;
    info!("  {} samples, {} genes", tumor.n_samples(), tumor.n_genes());

    if align_genes {
        let (c, t) = align_gene_space(&cell_lines, &tumor)?;
        cell_lines = c;
        tumor = t;
    }

    let methods = default_methods();
    let batch = run_folds(&cell_lines, &tumor, &config, &methods)?;

    let output = Path::new(output_dir);
    fs::create_dir_all(output)?;
    let artifacts = write_fold_artifacts(output.join("folds"), &batch, &config)?;
    info!("Wrote {} fold artifacts", artifacts.len());

    let run = batch.consolidate(&config)?;

    let fingerprint = config.fingerprint();
    let signature_path = output.join(format!("{}_signature_{}.txt", config.drug, fingerprint));
    write_signature(&signature_path, &run.signature.genes)?;
    let down_path = output.join(format!("{}_down_{}.txt", config.drug, fingerprint));
    write_signature(&down_path, &run.down_signature.genes)?;
    let report_path = output.join(format!("{}_run_{}.json", config.drug, fingerprint));
    write_run_report(&report_path, &run)?;

    println!("{}", run);
    info!("Signature written to: {}", signature_path.display());
    Ok(())
}

fn run_score(expression_path: &str, genes_path: &str, output_path: &str) -> Result<()> {
    info!("Loading expression from: {}", expression_path);
    let matrix = read_expression_table(expression_path)?;
    let genes = read_gene_list(genes_path)?;
    info!("  {} samples, {} listed genes", matrix.n_samples(), genes.len());

    let scores = signature_scores(&matrix, &genes)?;
    write_scores(output_path, matrix.sample_ids(), &scores)?;
    info!("Scores written to: {}", output_path);
    Ok(())
}

fn run_simulate(output_dir: &str, params: &SimulationParams) -> Result<()> {
    let data = simulate(params)?;
    let output = Path::new(output_dir);
    fs::create_dir_all(output)?;

    let defaults = SignatureConfig::default();
    write_cell_line_table(
        output.join("cell_lines.tsv"),
        &data.cell_lines,
        &defaults.response_column,
        defaults.auc_column.as_deref(),
    )?;
    write_expression_table(output.join("tumor.tsv"), &data.tumor)?;
    write_signature(output.join("planted_signal.txt"), &data.signal_genes)?;

    info!(
        "Wrote {} cell lines and {} tumor samples to {}",
        data.cell_lines.n_samples(),
        data.tumor.n_samples(),
        output.display()
    );
    Ok(())
}
