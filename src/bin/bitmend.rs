//! bitmend command-line driver
//!
//! One subcommand per task. Methods, budgets and file roles come from
//! flags; the sidecar headers are authoritative for tasks that consume
//! existing sidecars.

use anyhow::{Context, Result};
use bitmend::{
    ChecksumMethod, Budgets, DiagnosePaths, DistanceKind, RestoreMode, SearchOptions, TaskConfig,
    TaskSummary,
};
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    let matches = Command::new("bitmend")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Block-level bit-rot detection and recovery")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("generate")
                .visible_alias("g")
                .about("Write a checksum sidecar for a data file")
                .arg(method_arg())
                .arg(redundancy_arg())
                .arg(path_arg("data", "Data file to checksum", true))
                .arg(path_arg("checksum", "Checksum sidecar to write", true)),
        )
        .subcommand(
            Command::new("verify")
                .visible_alias("v")
                .about("List blocks whose stored and computed digests differ")
                .arg(path_arg("data", "Data file to verify", true))
                .arg(path_arg("checksum", "Checksum sidecar to verify against", true))
                .arg(path_arg("error", "Mismatch sidecar to write", true)),
        )
        .subcommand(
            Command::new("repair")
                .visible_alias("r")
                .about("Search damaged blocks for their original bytes")
                .arg(bruteforce_arg())
                .arg(penalty_arg())
                .arg(distance_arg())
                .arg(path_arg("data", "Damaged data file", true))
                .arg(path_arg("error", "Mismatch sidecar from verify", true))
                .arg(path_arg("repair", "Repair instruction sidecar to write", true)),
        )
        .subcommand(
            Command::new("restore")
                .about("Search unresolved blocks against the backup copy")
                .arg(bruteforce_arg())
                .arg(penalty_arg())
                .arg(distance_arg())
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .help("Which repair outcomes to take on (all, ambi_no, ambi_only)")
                        .value_name("MODE")
                        .default_value("all"),
                )
                .arg(path_arg("repair", "Repair instruction sidecar from repair", true))
                .arg(path_arg("backup", "Backup data file", true))
                .arg(path_arg(
                    "backup-checksum",
                    "Checksum sidecar of the backup file",
                    true,
                ))
                .arg(path_arg("restore", "Restore instruction sidecar to write", true)),
        )
        .subcommand(
            Command::new("execute")
                .visible_alias("x")
                .about("Apply HIT! and HIT? instruction records to the data file")
                .arg(path_arg("data", "Data file to mutate in place", true))
                .arg(path_arg("instructions", "Instruction sidecar to apply", true)),
        )
        .subcommand(
            Command::new("diag")
                .about("Compare surviving damage against a known-good original")
                .arg(path_arg("data", "Data file after execute", true))
                .arg(path_arg("orig", "Known-good original file", true))
                .arg(path_arg("backup", "Backup data file", true))
                .arg(path_arg("corrupt", "Pre-repair corrupted copy", true))
                .arg(path_arg("repair", "Repair instruction sidecar", true))
                .arg(path_arg("restore", "Restore instruction sidecar", true))
                .arg(path_arg("diag", "Report file to write", true)),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("generate", sub)) => handle_generate(sub),
        Some(("verify", sub)) => handle_verify(sub),
        Some(("repair", sub)) => handle_repair(sub),
        Some(("restore", sub)) => handle_restore(sub),
        Some(("execute", sub)) => handle_execute(sub),
        Some(("diag", sub)) => handle_diag(sub),
        _ => {
            eprintln!("Error: no command specified");
            eprintln!("\nUse 'bitmend --help' for usage information");
            std::process::exit(1);
        }
    }
}

fn method_arg() -> Arg {
    Arg::new("method")
        .long("method")
        .help("Checksum method (md4, md5, sha256, crc32, md5_16, md5_32, md5_64)")
        .value_name("METHOD")
        .default_value("md5")
}

fn redundancy_arg() -> Arg {
    Arg::new("redundancy")
        .long("redundancy")
        .help("Block bytes per digest byte; must be a power of two")
        .value_name("R")
        .default_value("32")
}

fn bruteforce_arg() -> Arg {
    Arg::new("bruteforce")
        .long("bruteforce")
        .help("Brute-force budgets as repair=N and/or restore=N")
        .value_name("KEY=N")
        .num_args(1..=2)
}

fn penalty_arg() -> Arg {
    Arg::new("penalty")
        .long("penalty")
        .help("Checksum penalty in the distance function")
        .value_name("P")
        .default_value("1")
}

fn distance_arg() -> Arg {
    Arg::new("distance")
        .long("distance")
        .help("Distance shape (linear, square, conservative, conservative-biased)")
        .value_name("KIND")
        .default_value("linear")
}

fn path_arg(name: &'static str, help: &'static str, required: bool) -> Arg {
    Arg::new(name)
        .long(name)
        .help(help)
        .value_name("FILE")
        .required(required)
}

fn get_path(matches: &ArgMatches, name: &str) -> PathBuf {
    PathBuf::from(matches.get_one::<String>(name).expect("required argument"))
}

fn parse_budgets(matches: &ArgMatches) -> Result<Budgets> {
    let mut budgets = Budgets::default();
    if let Some(values) = matches.get_many::<String>("bruteforce") {
        for value in values {
            let (key, number) = value
                .split_once('=')
                .with_context(|| format!("--bruteforce value {value:?} is not KEY=N"))?;
            let number: u64 = number
                .parse()
                .with_context(|| format!("--bruteforce {key} value {number:?} is not a number"))?;
            match key {
                "repair" => budgets.repair = number,
                "restore" => budgets.restore = number,
                _ => anyhow::bail!("--bruteforce key must be repair or restore, got {key:?}"),
            }
        }
    }
    Ok(budgets)
}

fn parse_search_options(matches: &ArgMatches) -> Result<SearchOptions> {
    let penalty: u64 = matches
        .get_one::<String>("penalty")
        .expect("defaulted")
        .parse()
        .context("--penalty is not a number")?;
    let distance_name = matches.get_one::<String>("distance").expect("defaulted");
    let distance = DistanceKind::parse(distance_name)
        .with_context(|| format!("unknown distance kind {distance_name:?}"))?;
    Ok(SearchOptions {
        budgets: parse_budgets(matches)?,
        penalty,
        distance,
    })
}

fn print_summary(task: &str, summary: &TaskSummary) {
    println!("{task}: {summary}");
}

fn handle_generate(matches: &ArgMatches) -> Result<()> {
    let method: ChecksumMethod = matches
        .get_one::<String>("method")
        .expect("defaulted")
        .parse()?;
    let redundancy: u32 = matches
        .get_one::<String>("redundancy")
        .expect("defaulted")
        .parse()
        .context("--redundancy is not a number")?;

    let config = TaskConfig::new(method, redundancy);
    let summary = bitmend::generate(
        &config,
        &get_path(matches, "data"),
        &get_path(matches, "checksum"),
    )
    .context("generate failed")?;
    print_summary("generate", &summary);
    Ok(())
}

fn handle_verify(matches: &ArgMatches) -> Result<()> {
    let summary = bitmend::verify(
        &get_path(matches, "data"),
        &get_path(matches, "checksum"),
        &get_path(matches, "error"),
    )
    .context("verify failed")?;
    print_summary("verify", &summary);
    if summary.failed > 0 {
        eprintln!("{} block(s) mismatch; repair is required.", summary.failed);
        std::process::exit(1);
    }
    Ok(())
}

fn handle_repair(matches: &ArgMatches) -> Result<()> {
    let options = parse_search_options(matches)?;
    let summary = bitmend::repair(
        &options,
        &get_path(matches, "data"),
        &get_path(matches, "error"),
        &get_path(matches, "repair"),
    )
    .context("repair failed")?;
    print_summary("repair", &summary);
    Ok(())
}

fn handle_restore(matches: &ArgMatches) -> Result<()> {
    let options = parse_search_options(matches)?;
    let mode_name = matches.get_one::<String>("mode").expect("defaulted");
    let mode = RestoreMode::parse(mode_name)
        .with_context(|| format!("unknown restore mode {mode_name:?}"))?;
    let summary = bitmend::restore(
        &options,
        mode,
        &get_path(matches, "repair"),
        &get_path(matches, "backup"),
        &get_path(matches, "backup-checksum"),
        &get_path(matches, "restore"),
    )
    .context("restore failed")?;
    print_summary("restore", &summary);
    Ok(())
}

fn handle_execute(matches: &ArgMatches) -> Result<()> {
    let summary = bitmend::execute(
        &get_path(matches, "data"),
        &get_path(matches, "instructions"),
    )
    .context("execute failed")?;
    print_summary("execute", &summary);
    if summary.failed > 0 {
        anyhow::bail!("{} instruction record(s) could not be applied", summary.failed);
    }
    Ok(())
}

fn handle_diag(matches: &ArgMatches) -> Result<()> {
    let paths = DiagnosePaths {
        data: get_path(matches, "data"),
        original: get_path(matches, "orig"),
        backup: get_path(matches, "backup"),
        corrupt: get_path(matches, "corrupt"),
        repair: get_path(matches, "repair"),
        restore: get_path(matches, "restore"),
        report: get_path(matches, "diag"),
    };
    let summary = bitmend::diagnose(&paths).context("diag failed")?;
    print_summary("diag", &summary);
    Ok(())
}
