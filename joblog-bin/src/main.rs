use anyhow::Result;
use chrono::{DateTime, Utc};
use joblog_index::{LogIndex, Row, RowFilter};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::env;
use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

fn print_usage() {
    eprintln!("Usage: joblog <file> [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --follow, -f            Keep scanning and print rows as they are appended");
    eprintln!("  --interval <ms>         Poll interval in follow mode (default: 500)");
    eprintln!("  --window <n>, -n <n>    Number of trailing rows to print (default: 40)");
    eprintln!("  --match <text>, -m      Only show rows whose host/pid/tid/subsystem match");
    eprintln!("  --info                  Print index summary instead of rows");
    eprintln!("  --verbose, -v           Enable debug logging");
    eprintln!("  --help, -h              Print this help message");
}

struct Options {
    path: PathBuf,
    follow: bool,
    interval: Duration,
    window: usize,
    info: bool,
    pattern: Option<String>,
    verbose: bool,
}

impl Options {
    /// parse args; `Ok(None)` means help was printed and we should exit
    fn from_args(args: &[String]) -> Result<Option<Self>, io::Error> {
        let mut path = None;
        let mut follow = false;
        let mut interval = Duration::from_millis(500);
        let mut window = 40usize;
        let mut info = false;
        let mut pattern = None;
        let mut verbose = false;

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--follow" | "-f" => follow = true,
                "--info" => info = true,
                "--verbose" | "-v" => verbose = true,
                "--help" | "-h" => {
                    print_usage();
                    return Ok(None);
                }
                "--interval" => {
                    i += 1;
                    interval = Duration::from_millis(Self::numeric_value(args, i)?);
                }
                "--window" | "-n" => {
                    i += 1;
                    window = Self::numeric_value(args, i)? as usize;
                }
                "--match" | "-m" => {
                    i += 1;
                    let Some(value) = args.get(i) else {
                        print_usage();
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidInput,
                            "--match requires a value",
                        ));
                    };
                    pattern = Some(value.clone());
                }
                other if !other.starts_with('-') && path.is_none() => {
                    path = Some(PathBuf::from(other));
                }
                _ => {
                    print_usage();
                    return Err(io::Error::new(io::ErrorKind::InvalidInput, "Unknown option"));
                }
            }
            i += 1;
        }

        let Some(path) = path else {
            print_usage();
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "A log file path is required",
            ));
        };

        Ok(Some(Self {
            path,
            follow,
            interval,
            window,
            info,
            pattern,
            verbose,
        }))
    }

    fn numeric_value(args: &[String], i: usize) -> Result<u64, io::Error> {
        match args.get(i).and_then(|v| v.parse::<u64>().ok()) {
            Some(n) => Ok(n),
            None => {
                print_usage();
                Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "Expected a numeric value",
                ))
            }
        }
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(opts) = Options::from_args(&args)? else {
        return Ok(());
    };

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .ok();

    let mut index = LogIndex::new(&opts.path);

    if opts.info {
        let (_, status) = index.scan()?;
        log::debug!("scan: {status}");
        print_info(&index);
        return Ok(());
    }

    if opts.follow {
        follow(&mut index, &opts);
        Ok(())
    } else {
        print_tail(&mut index, &opts)
    }
}

/// one-shot: scan, then print the trailing window
fn print_tail(index: &mut LogIndex, opts: &Options) -> Result<()> {
    let (added, status) = index.scan()?;
    log::debug!("scan: {added} rows, {status}");

    match &opts.pattern {
        None => {
            let start = -(opts.window as isize);
            print_window(index, &index.rows(start, -1)?);
        }
        Some(pattern) => {
            let mut filter = RowFilter::new();
            let matched = filter.filter(index, pattern);
            let tail_start = matched.len().saturating_sub(opts.window);
            for &row in &matched[tail_start..] {
                print_window(index, &index.rows(row as isize, row as isize)?);
            }
        }
    }
    Ok(())
}

/// poll `scan()` on the interval and print newly appended rows; scan
/// failures are reported and polling continues with last-known-good state
fn follow(index: &mut LogIndex, opts: &Options) {
    let mut filter = RowFilter::new();

    loop {
        let old_count = index.n_rows();
        match index.scan() {
            Ok((added, status)) => {
                log::debug!("scan: {added} rows, {status}");
                // a replaced file starts over from row zero
                let from = old_count.min(index.n_rows() - added);
                if from < old_count {
                    // cached filter state belongs to the replaced file
                    filter.reset();
                }
                if added > 0
                    && let Err(e) = print_appended(index, &mut filter, from, opts)
                {
                    eprintln!("{e}");
                }
            }
            Err(e) => eprintln!("{e}"),
        }
        thread::sleep(opts.interval);
    }
}

fn print_appended(
    index: &LogIndex,
    filter: &mut RowFilter,
    from: usize,
    opts: &Options,
) -> Result<()> {
    match &opts.pattern {
        None => print_window(index, &index.rows(from as isize, -1)?),
        Some(pattern) => {
            let matched = filter.filter_appended(index, from, pattern);
            for &row in matched.iter().filter(|&&row| row >= from) {
                print_window(index, &index.rows(row as isize, row as isize)?);
            }
        }
    }
    Ok(())
}

/// fixed-width rendering using the index's tracked column widths
fn print_window(index: &LogIndex, rows: &[Row]) {
    let (tw, hw, pw, dw, sw) = index.widths();
    for row in rows {
        println!(
            "{:>tw$.1} {:<hw$} {:>pw$} {:>dw$} {:<sw$} {}",
            row.rel_time, row.host, row.pid, row.tid, row.subsystem, row.message
        );
    }
}

fn print_info(index: &LogIndex) {
    println!("file:       {}", index.path().display());
    println!("identity:   {}", index.uuid().unwrap_or("<none>"));
    println!("rows:       {}", index.n_rows());
    match index.start_time() {
        // epoch-looking anchors also get a wall-clock rendering
        Some(ts) if ts > 1.0e9 => match DateTime::<Utc>::from_timestamp(ts as i64, 0) {
            Some(dt) => {
                println!("start time: {ts:.6} ({})", dt.format("%Y-%m-%d %H:%M:%S UTC"))
            }
            None => println!("start time: {ts:.6}"),
        },
        Some(ts) => println!("start time: {ts:.6}"),
        None => println!("start time: <none>"),
    }
    let (tw, hw, pw, dw, sw) = index.widths();
    println!("widths:     time={tw} host={hw} pid={pw} tid={dw} subsystem={sw}");
}
