// Command-line front end for pkgdelta.
//
// Reads the two inputs from files, runs the in-memory engine, and reports
// what the delta looks like.  Writing a container format is left to the
// caller; this tool is for inspecting and comparing deltas.

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use log::LevelFilter;

use crate::engine::{DeltaSession, DiffOptions};
use crate::io::{self, DiffStats};
use crate::matcher::config::{ACCEPT_LEN, HASH_WINDOW, MIN_MISMATCHES, WIDE_CONTEXT_THRESHOLD};
use crate::matcher::{MatcherConfig, Strategy};
use crate::ops::{Delta, DeltaOp};

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024usize),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1usize),
    };
    let num: usize = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// bsdiff-family binary delta generator.
#[derive(Parser, Debug)]
#[command(
    name = "pkgdelta",
    version,
    about = "Binary delta generator (hash and suffix-array matchers)",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Quiet mode (only errors are logged, summaries are suppressed).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Print results as JSON.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Compute the delta from OLD to NEW and summarise it.
    Diff(DiffArgs),
    /// Run both matchers on the same inputs and compare them.
    Compare(CompareArgs),
    /// Print build features and heuristic defaults.
    Config,
}

#[derive(Args, Debug)]
struct TuningArgs {
    /// Hash window width in bytes.
    #[arg(long, default_value_t = HASH_WINDOW)]
    window: usize,

    /// Shortest hash match worth accepting.
    #[arg(long = "accept-len", default_value_t = ACCEPT_LEN)]
    accept_len: usize,

    /// Mismatches against the previous alignment needed to open a new copy.
    #[arg(long = "min-mismatches", default_value_t = MIN_MISMATCHES)]
    min_mismatches: usize,

    /// Old size above which the suffix sort starts from 3-byte context.
    #[arg(long = "wide-context-threshold", value_parser = parse_byte_size, default_value_t = WIDE_CONTEXT_THRESHOLD)]
    wide_context_threshold: usize,
}

#[derive(Args, Debug)]
struct DiffArgs {
    /// Matching strategy (suffix or hash).
    #[arg(long, short = 's', default_value = "suffix")]
    strategy: Strategy,

    /// Replay the delta and compare it against NEW.
    #[arg(long)]
    verify: bool,

    /// List every operation.
    #[arg(long)]
    ops: bool,

    #[command(flatten)]
    tuning: TuningArgs,

    /// Old file.
    #[arg(value_hint = ValueHint::FilePath)]
    old: PathBuf,

    /// New file.
    #[arg(value_hint = ValueHint::FilePath)]
    new: PathBuf,
}

#[derive(Args, Debug)]
struct CompareArgs {
    #[command(flatten)]
    tuning: TuningArgs,

    /// Old file.
    #[arg(value_hint = ValueHint::FilePath)]
    old: PathBuf,

    /// New file.
    #[arg(value_hint = ValueHint::FilePath)]
    new: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Diff,
    Compare,
    Config,
}

struct Options {
    command: Command,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    diff: DiffOptions,
    verify: bool,
    list_ops: bool,
    old_file: Option<PathBuf>,
    new_file: Option<PathBuf>,
}

fn matcher_config(tuning: &TuningArgs) -> MatcherConfig {
    MatcherConfig {
        window: tuning.window,
        accept_len: tuning.accept_len,
        min_mismatches: tuning.min_mismatches,
        wide_context_threshold: tuning.wide_context_threshold,
    }
}

fn resolve_options(cli: Cli) -> Options {
    let base = Options {
        command: Command::Config,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
        diff: DiffOptions::default(),
        verify: false,
        list_ops: false,
        old_file: None,
        new_file: None,
    };

    match cli.command {
        Cmd::Diff(args) => Options {
            command: Command::Diff,
            diff: DiffOptions {
                strategy: args.strategy,
                matcher: matcher_config(&args.tuning),
            },
            verify: args.verify,
            list_ops: args.ops,
            old_file: Some(args.old),
            new_file: Some(args.new),
            ..base
        },
        Cmd::Compare(args) => Options {
            command: Command::Compare,
            diff: DiffOptions {
                matcher: matcher_config(&args.tuning),
                ..DiffOptions::default()
            },
            old_file: Some(args.old),
            new_file: Some(args.new),
            ..base
        },
        Cmd::Config => base,
    }
}

fn log_level(opts: &Options) -> LevelFilter {
    match (opts.quiet, opts.verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Warn,
        (false, 1) => LevelFilter::Info,
        (false, _) => LevelFilter::Debug,
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config(opts: &Options) -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    let file_io = cfg!(feature = "file-io");
    let parallel = cfg!(feature = "parallel");

    if opts.json_output {
        let json = serde_json::json!({
            "version": version,
            "features": { "file-io": file_io, "parallel": parallel },
            "defaults": {
                "strategy": Strategy::default().name(),
                "window": HASH_WINDOW,
                "accept_len": ACCEPT_LEN,
                "min_mismatches": MIN_MISMATCHES,
                "wide_context_threshold": WIDE_CONTEXT_THRESHOLD,
            },
        });
        println!("{json:#}");
        return 0;
    }

    println!("pkgdelta version {version}");
    println!("FILE_IO={}", file_io as u8);
    println!("PARALLEL={}", parallel as u8);
    println!("DEFAULT_STRATEGY={}", Strategy::default().name());
    println!("HASH_WINDOW={HASH_WINDOW}");
    println!("ACCEPT_LEN={ACCEPT_LEN}");
    println!("MIN_MISMATCHES={MIN_MISMATCHES}");
    println!("WIDE_CONTEXT_THRESHOLD={WIDE_CONTEXT_THRESHOLD}");
    println!("sizeof(usize)={}", size_of::<usize>());
    0
}

// ---------------------------------------------------------------------------
// Diff command
// ---------------------------------------------------------------------------

fn digest_json(digest: Option<[u8; 32]>) -> serde_json::Value {
    digest.map_or(serde_json::Value::Null, |d| io::hex(&d).into())
}

fn ops_json(delta: &Delta) -> serde_json::Value {
    delta
        .ops()
        .iter()
        .map(|op| match op {
            DeltaOp::Copy { old_offset, len } => {
                serde_json::json!({ "op": "copy", "old_offset": old_offset, "len": len })
            }
            DeltaOp::Extra(bytes) => serde_json::json!({ "op": "extra", "len": bytes.len() }),
        })
        .collect()
}

fn print_ops(delta: &Delta) {
    let mut new_pos = 0usize;
    for op in delta.ops() {
        match op {
            DeltaOp::Copy { old_offset, len } => {
                println!("{new_pos:>12}  COPY   old={old_offset} len={len}");
            }
            DeltaOp::Extra(bytes) => println!("{new_pos:>12}  EXTRA  len={}", bytes.len()),
        }
        new_pos += op.len();
    }
}

fn print_summary(opts: &Options, stats: &DiffStats) {
    let d = &stats.delta;
    println!("strategy:      {}", opts.diff.strategy.name());
    println!("old size:      {}", stats.old_size);
    println!("new size:      {}", stats.new_size);
    println!("copies:        {} ({} bytes)", d.copies, d.copy_bytes);
    println!("extras:        {} ({} bytes)", d.extras, d.extra_bytes);
    println!("controls:      {}", d.controls);
    println!("encoded size:  {}", d.encoded_size);
    if let Some(digest) = stats.old_sha256 {
        println!("old sha256:    {}", io::hex(&digest));
    }
    if let Some(digest) = stats.new_sha256 {
        println!("new sha256:    {}", io::hex(&digest));
    }
    if stats.verified {
        println!("verified:      ok");
    }
}

fn cmd_diff(opts: &Options) -> i32 {
    let (Some(old_path), Some(new_path)) = (&opts.old_file, &opts.new_file) else {
        eprintln!("pkgdelta: diff needs OLD and NEW");
        return 1;
    };

    let (delta, stats) = match io::diff_files(old_path, new_path, &opts.diff, opts.verify) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("pkgdelta: {e}");
            return 1;
        }
    };

    if opts.json_output {
        let d = &stats.delta;
        let mut json = serde_json::json!({
            "command": "diff",
            "strategy": opts.diff.strategy.name(),
            "old_size": stats.old_size,
            "new_size": stats.new_size,
            "copies": d.copies,
            "extras": d.extras,
            "controls": d.controls,
            "copy_bytes": d.copy_bytes,
            "extra_bytes": d.extra_bytes,
            "encoded_size": d.encoded_size,
            "verified": stats.verified,
            "old_sha256": digest_json(stats.old_sha256),
            "new_sha256": digest_json(stats.new_sha256),
        });
        if opts.list_ops {
            json["ops"] = ops_json(&delta);
        }
        println!("{json:#}");
        return 0;
    }

    if opts.list_ops {
        print_ops(&delta);
    }
    if !opts.quiet {
        print_summary(opts, &stats);
    }
    0
}

// ---------------------------------------------------------------------------
// Compare command
// ---------------------------------------------------------------------------

struct Run {
    strategy: Strategy,
    encoded_size: usize,
    controls: usize,
    extra_bytes: usize,
    build_ms: f64,
    diff_ms: f64,
}

fn cmd_compare(opts: &Options) -> i32 {
    let (Some(old_path), Some(new_path)) = (&opts.old_file, &opts.new_file) else {
        eprintln!("pkgdelta: compare needs OLD and NEW");
        return 1;
    };

    let (old, new) = match (io::read_input(old_path), io::read_input(new_path)) {
        (Ok(old), Ok(new)) => (old.bytes, new.bytes),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("pkgdelta: {e}");
            return 1;
        }
    };

    let mut runs = Vec::with_capacity(2);
    let mut old = old;
    for strategy in [Strategy::Hash, Strategy::Suffix] {
        let options = DiffOptions {
            strategy,
            ..opts.diff
        };
        let started = Instant::now();
        let session = match DeltaSession::new(old, &options) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("pkgdelta: {} index: {e}", strategy.name());
                return 1;
            }
        };
        let built = Instant::now();
        let delta = session.diff(&new);
        let done = Instant::now();

        if let Err(e) = io::verify(&delta, session.old(), &new) {
            eprintln!("pkgdelta: {} delta: {e}", strategy.name());
            return 1;
        }

        let stats = delta.stats();
        runs.push(Run {
            strategy,
            encoded_size: stats.encoded_size,
            controls: stats.controls,
            extra_bytes: stats.extra_bytes,
            build_ms: (built - started).as_secs_f64() * 1e3,
            diff_ms: (done - built).as_secs_f64() * 1e3,
        });
        old = session.into_old();
    }

    if opts.json_output {
        let list: Vec<serde_json::Value> = runs
            .iter()
            .map(|r| {
                serde_json::json!({
                    "strategy": r.strategy.name(),
                    "encoded_size": r.encoded_size,
                    "controls": r.controls,
                    "extra_bytes": r.extra_bytes,
                    "build_ms": r.build_ms,
                    "diff_ms": r.diff_ms,
                })
            })
            .collect();
        let json = serde_json::json!({
            "command": "compare",
            "old_size": old.len(),
            "new_size": new.len(),
            "runs": list,
        });
        println!("{json:#}");
        return 0;
    }

    if !opts.quiet {
        println!(
            "{:<8} {:>14} {:>10} {:>12} {:>10} {:>10}",
            "strategy", "encoded size", "controls", "extra bytes", "index ms", "diff ms"
        );
        for r in &runs {
            println!(
                "{:<8} {:>14} {:>10} {:>12} {:>10.2} {:>10.2}",
                r.strategy.name(),
                r.encoded_size,
                r.controls,
                r.extra_bytes,
                r.build_ms,
                r.diff_ms
            );
        }
    }
    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level(&opts).as_str()),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();

    if let Err(e) = opts.diff.matcher.validate() {
        eprintln!("pkgdelta: {e}");
        process::exit(1);
    }

    let exit_code = match opts.command {
        Command::Diff => cmd_diff(&opts),
        Command::Compare => cmd_compare(&opts),
        Command::Config => cmd_config(&opts),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
