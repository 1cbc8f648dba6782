//! goldbach-gear CLI: empirical Goldbach coverage over large intervals.
//!
//! Modes:
//!   --mode sieve --limit 1000000000000                Dense verification of evens in [4, L]
//!   --mode mr --startN <even> --windowEvens <count>   Sparse high-window verification
//!
//! Options:
//!   --gear <K>                   Gear size: first K odd primes (default 310)
//!   --threads <N>                Worker thread hint (default: all cores)
//!   --segmentEvens <E>           Evens per segment (default 2*10^9, clamped)
//!   --maxConcurrentSegments <N>  Simultaneously active segments (default 1)
//!   --threadsInside <T>          Threads per segment (default: --threads)
//!   --misses <M>                 Miss sample cap per segment/window (default 0)
//!   --resume                     Skip segments whose audit file parses
//!   --verifySeams[=false]        Boundary cross-check (default on)
//!   --affinityMask <mask>        CPU mask, decimal or 0xHEX (best effort)
//!   --blockLen <B>               Inner sieve block length (default 32*10^6)
//!   --outDir <dir>               Audit directory (default .)
//!
//! Flags accept both `--flag value` and `--flag=value`; unknown flags are
//! ignored. Exit codes: 0 success, 1 run failure, 2 argument error.

use std::path::PathBuf;
use std::process;

use goldbach_gear::affinity;
use goldbach_gear::run::{self, RunConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Sieve { limit: u64 },
    Mr { start_n: u64, window_evens: u64 },
}

struct CliConfig {
    mode: Mode,
    affinity_mask: Option<u64>,
    run: RunConfig,
}

/// Inline `--flag=value` payload, or the following argument when it does
/// not itself look like a flag.
fn next_value(inline: Option<String>, args: &[String], i: &mut usize) -> Option<String> {
    if inline.is_some() {
        return inline;
    }
    if *i < args.len() && !args[*i].starts_with("--") {
        let v = args[*i].clone();
        *i += 1;
        return Some(v);
    }
    None
}

fn parse_u64(flag: &str, value: Option<String>) -> Result<u64, String> {
    let v = value.ok_or_else(|| format!("{} requires a value", flag))?;
    v.parse::<u64>()
        .map_err(|_| format!("{} expects an unsigned integer, got '{}'", flag, v))
}

fn parse_positive(flag: &str, value: Option<String>) -> Result<u64, String> {
    let n = parse_u64(flag, value)?;
    if n == 0 {
        return Err(format!("{} must be positive", flag));
    }
    Ok(n)
}

/// Bare boolean flag, optionally `=true`/`=false`.
fn parse_switch(flag: &str, inline: Option<String>) -> Result<bool, String> {
    match inline.as_deref() {
        None => Ok(true),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(v) => Err(format!("{} expects true or false, got '{}'", flag, v)),
    }
}

fn parse_args(args: &[String]) -> Result<CliConfig, String> {
    let mut mode_name = String::from("sieve");
    let mut limit: Option<u64> = None;
    let mut start_n: Option<u64> = None;
    let mut window_evens: Option<u64> = None;
    let mut threads: Option<usize> = None;
    let mut threads_inside: Option<usize> = None;
    let mut affinity_mask: Option<u64> = None;
    let mut run = RunConfig::default();

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].clone();
        i += 1;
        if !arg.starts_with("--") {
            continue;
        }
        let (flag, inline) = match arg.split_once('=') {
            Some((f, v)) => (f.to_string(), Some(v.to_string())),
            None => (arg.clone(), None),
        };
        match flag.as_str() {
            "--mode" => {
                mode_name = next_value(inline, args, &mut i)
                    .ok_or("--mode requires a value".to_string())?;
            }
            "--limit" => limit = Some(parse_positive("--limit", next_value(inline, args, &mut i))?),
            "--startN" => {
                start_n = Some(parse_positive("--startN", next_value(inline, args, &mut i))?)
            }
            "--windowEvens" => {
                window_evens = Some(parse_positive(
                    "--windowEvens",
                    next_value(inline, args, &mut i),
                )?)
            }
            "--gear" => {
                run.gear_size =
                    parse_positive("--gear", next_value(inline, args, &mut i))? as usize
            }
            "--threads" => {
                threads =
                    Some(parse_positive("--threads", next_value(inline, args, &mut i))? as usize)
            }
            "--segmentEvens" => {
                run.segment_evens =
                    parse_positive("--segmentEvens", next_value(inline, args, &mut i))?
            }
            "--maxConcurrentSegments" => {
                run.max_concurrent_segments = parse_positive(
                    "--maxConcurrentSegments",
                    next_value(inline, args, &mut i),
                )? as usize
            }
            "--threadsInside" => {
                threads_inside = Some(parse_positive(
                    "--threadsInside",
                    next_value(inline, args, &mut i),
                )? as usize)
            }
            "--misses" => {
                run.miss_cap = parse_u64("--misses", next_value(inline, args, &mut i))? as usize
            }
            "--blockLen" => {
                run.block_len = parse_positive("--blockLen", next_value(inline, args, &mut i))?
            }
            "--outDir" => {
                run.out_dir = PathBuf::from(
                    next_value(inline, args, &mut i)
                        .ok_or("--outDir requires a value".to_string())?,
                )
            }
            "--resume" => run.resume = parse_switch("--resume", inline)?,
            "--verifySeams" => run.verify_seams = parse_switch("--verifySeams", inline)?,
            "--affinityMask" => {
                let v = next_value(inline, args, &mut i)
                    .ok_or("--affinityMask requires a value".to_string())?;
                affinity_mask = Some(
                    affinity::parse_mask(&v)
                        .ok_or(format!("--affinityMask expects decimal or 0xHEX, got '{}'", v))?,
                );
            }
            // unknown flags are ignored
            _ => {}
        }
    }

    if let Some(t) = threads {
        run.threads_inside = t;
    }
    if let Some(t) = threads_inside {
        run.threads_inside = t;
    }

    let mode = match mode_name.as_str() {
        "sieve" => {
            let limit = limit.ok_or("sieve mode requires --limit".to_string())?;
            Mode::Sieve { limit }
        }
        "mr" => {
            let start_n = start_n.ok_or("mr mode requires --startN".to_string())?;
            if start_n % 2 != 0 {
                return Err(format!("--startN must be even, got {}", start_n));
            }
            let window_evens =
                window_evens.ok_or("mr mode requires --windowEvens".to_string())?;
            Mode::Mr {
                start_n,
                window_evens,
            }
        }
        other => return Err(format!("unknown mode '{}', expected sieve or mr", other)),
    };

    Ok(CliConfig {
        mode,
        affinity_mask,
        run,
    })
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cfg = match parse_args(&args) {
        Ok(cfg) => cfg,
        Err(msg) => {
            eprintln!("error: {}", msg);
            eprintln!("see the header of this binary's source for the flag list");
            process::exit(2);
        }
    };

    if let Some(mask) = cfg.affinity_mask {
        affinity::apply_mask(mask);
    }

    match cfg.mode {
        Mode::Sieve { limit } => println!(
            "[cfg] mode=sieve limit={} gear={} segmentEvens={} maxConcurrentSegments={} threadsInside={} misses={} resume={} verifySeams={} outDir={}",
            limit,
            cfg.run.gear_size,
            cfg.run.segment_evens,
            cfg.run.max_concurrent_segments,
            cfg.run.threads_inside,
            cfg.run.miss_cap,
            cfg.run.resume,
            cfg.run.verify_seams,
            cfg.run.out_dir.display()
        ),
        Mode::Mr {
            start_n,
            window_evens,
        } => println!(
            "[cfg] mode=mr startN={} windowEvens={} gear={} threadsInside={} misses={} outDir={}",
            start_n,
            window_evens,
            cfg.run.gear_size,
            cfg.run.threads_inside,
            cfg.run.miss_cap,
            cfg.run.out_dir.display()
        ),
    }

    let result = match cfg.mode {
        Mode::Sieve { limit } => run::run_sieve(limit, &cfg.run),
        Mode::Mr {
            start_n,
            window_evens,
        } => run::run_mr(start_n, window_evens, &cfg.run),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
