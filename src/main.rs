//! CLI front end for the numeric diff engine.
//!
//! Argument parsing, process plumbing, and nothing else: the engine itself
//! (`ndiff::engine::Engine`) has no notion of `clap`, `env_logger`, or
//! `std::process`. This mirrors the teacher's `sort`/`gnu_sort` split.

use std::io::{self, BufReader};
use std::path::Path;
use std::process;

use clap::{Arg, ArgAction, Command};

use ndiff::line_source::{LineSource, MmapLineSource, ReaderLineSource};
use ndiff::rule::{Rule, ToleranceBound};
use ndiff::rule_context::UniformRuleContext;
use ndiff::{Engine, NdiffError, NdiffResult};

fn main() {
    let result = run();
    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            log::error!("ndiff: {e}");
            process::exit(e.exit_code());
        }
    }
}

fn run() -> NdiffResult<i32> {
    let matches = build_cli().get_matches();

    let verbosity = matches.get_count("verbose");
    init_logging(verbosity);

    let rule = build_rule_from_matches(&matches)?;
    let keep = matches.get_one::<String>("keep").map(|s| {
        s.parse::<usize>()
            .map_err(|_| NdiffError::invalid_option(format!("keep: not a number: {s}")))
    });
    let keep = keep.transpose()?;
    let blank = matches.get_flag("blank");
    let check = matches.get_flag("check");
    let echo = matches.get_flag("echo");

    let file1 = matches.get_one::<String>("file1").expect("required");
    let file2 = matches.get_one::<String>("file2").expect("required");

    let lhs_source = open_source(file1)?;
    let rhs_source = open_source(file2)?;

    let mut engine = Engine::new(
        lhs_source,
        rhs_source,
        Box::new(UniformRuleContext::new(rule)),
        Box::new(ndiff::diagnostics::LoggingDiagnostics::default()),
        64 * 1024,
        ndiff::registers::REG_MIN,
    )
    .with_labels(file1.clone(), file2.clone());

    engine.set_options(keep, Some(blank), Some(check))?;

    let stdout = io::stdout();
    let mut lock = stdout.lock();
    let summary = if echo {
        engine.run(Some(&mut lock as &mut dyn io::Write), None)?
    } else {
        engine.run(None, None)?
    };

    log::info!(
        "{} rows, {} numbers compared, {} diffs",
        summary.rows,
        summary.numbers,
        summary.diffs
    );

    if summary.diffs > 0 {
        Ok(ndiff::EXIT_FAILURE)
    } else {
        Ok(ndiff::EXIT_SUCCESS)
    }
}

fn open_source(path: &str) -> NdiffResult<Box<dyn LineSource>> {
    if path == "-" {
        return Ok(Box::new(ReaderLineSource::new(BufReader::new(io::stdin()))));
    }
    let path = Path::new(path);
    match MmapLineSource::open(path) {
        Ok(src) => Ok(Box::new(src)),
        Err(_) => Ok(Box::new(ReaderLineSource::open(path)?)),
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}

fn build_rule_from_matches(matches: &clap::ArgMatches) -> NdiffResult<Rule> {
    let mut rule = Rule::default();

    if let Some(eps) = matches.get_one::<String>("abs") {
        rule.tolerance.abs = true;
        rule.abs = ToleranceBound::symmetric(parse_eps(eps, "abs")?);
    }
    if let Some(eps) = matches.get_one::<String>("rel") {
        rule.tolerance.rel = true;
        rule.rel = ToleranceBound::symmetric(parse_eps(eps, "rel")?);
    }
    if let Some(eps) = matches.get_one::<String>("dig") {
        rule.tolerance.dig = true;
        rule.dig = ToleranceBound::symmetric(parse_eps(eps, "dig")?);
    }

    rule.tolerance.any = matches.get_flag("any");
    rule.flags.equ = matches.get_flag("equal");
    rule.flags.ign = matches.get_flag("ignore");
    rule.flags.istr = matches.get_flag("istr");
    rule.flags.blank = matches.get_flag("blank");

    Ok(rule)
}

fn parse_eps(raw: &str, which: &str) -> NdiffResult<f64> {
    raw.parse::<f64>()
        .map_err(|_| NdiffError::invalid_option(format!("{which}: not a number: {raw}")))
}

fn build_cli() -> Command {
    Command::new("ndiff")
        .version(env!("CARGO_PKG_VERSION"))
        .author("numeric diff engine")
        .override_usage("ndiff [OPTION]... FILE1 FILE2")
        .about("Compare two text files, treating embedded numbers numerically")
        .long_about(
            "Compare two text files line by line. Non-numeric text must match \
             exactly; numbers embedded in the text are parsed and compared \
             against a configurable tolerance instead of byte-for-byte.",
        )
        .arg(Arg::new("file1").required(true).value_name("FILE1"))
        .arg(Arg::new("file2").required(true).value_name("FILE2"))
        .arg(
            Arg::new("abs")
                .short('a')
                .long("abs")
                .help("Absolute tolerance")
                .value_name("EPS"),
        )
        .arg(
            Arg::new("rel")
                .short('r')
                .long("rel")
                .help("Relative tolerance")
                .value_name("EPS"),
        )
        .arg(
            Arg::new("dig")
                .short('d')
                .long("dig")
                .help("Digit-based tolerance (skipped for integer columns)")
                .value_name("EPS"),
        )
        .arg(
            Arg::new("any")
                .long("any")
                .help("Pass if any configured tolerance metric passes")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("equal")
                .short('e')
                .long("equal")
                .help("Require strict textual equality of numeric spans")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ignore")
                .short('i')
                .long("ignore")
                .help("Never fail on number pairs (ign)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("istr")
                .long("istr")
                .help("Digits-only scan mode")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("blank")
                .long("blank")
                .help("Consume runs of blanks as one step, and trailing blanks at EOF")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("keep")
                .short('k')
                .long("keep")
                .help("Cap on reported diffs (must be > 0)")
                .value_name("N"),
        )
        .arg(
            Arg::new("check")
                .short('c')
                .long("check")
                .help("Cross-validate incremental vs random-access rule lookups")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Raise the trace log level (repeatable)")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("echo")
                .long("echo")
                .help("Echo matching lines to stdout")
                .action(ArgAction::SetTrue),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_abs_tolerance_flag() {
        let matches = build_cli()
            .try_get_matches_from(["ndiff", "-a", "1e-6", "a.txt", "b.txt"])
            .unwrap();
        let rule = build_rule_from_matches(&matches).unwrap();
        assert!(rule.tolerance.abs);
        assert_eq!(rule.abs.upper.literal, 1e-6);
    }

    #[test]
    fn rejects_non_numeric_tolerance() {
        let matches = build_cli()
            .try_get_matches_from(["ndiff", "-a", "nope", "a.txt", "b.txt"])
            .unwrap();
        assert!(build_rule_from_matches(&matches).is_err());
    }

    #[test]
    fn requires_two_files() {
        let result = build_cli().try_get_matches_from(["ndiff", "a.txt"]);
        assert!(result.is_err());
    }
}
