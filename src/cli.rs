use std::str::FromStr;

use crate::{app::LogLevel, Error, Result};

/// Options for the `run` command; values are `None` when not provided on CLI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunOptions {
    pub bucket: Option<String>,
    pub tick_ms: Option<u64>,
    pub poll_every_ticks: Option<u32>,
    pub rows_file: Option<String>,
    pub demo: bool,
    pub log_level: Option<String>,
    pub log_file: Option<String>,
    pub max_ticks: Option<u64>,
}

/// Parsed command-line intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(Box<RunOptions>),
    ShowHelp,
    ShowVersion,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        if args.is_empty() {
            return Ok(Command::Run(Box::default()));
        }

        let mut iter = args.iter();
        match iter.next().map(|s| s.as_str()) {
            Some("run") => Ok(Command::Run(Box::new(parse_run_options(&mut iter)?))),
            Some("--help") | Some("-h") => Ok(Command::ShowHelp),
            Some("--version") | Some("-V") => Ok(Command::ShowVersion),
            Some(flag) if flag.starts_with('-') => {
                // `run` is implied when the first argument is already a flag.
                let mut flags: Vec<String> = Vec::with_capacity(args.len());
                flags.push(flag.to_string());
                flags.extend(iter.map(|s| s.to_string()));
                let mut iter = flags.iter();
                Ok(Command::Run(Box::new(parse_run_options(&mut iter)?)))
            }
            Some(cmd) => Err(Error::InvalidArgs(format!(
                "unknown command '{cmd}', try --help"
            ))),
            None => Ok(Command::Run(Box::default())),
        }
    }

    pub fn help() -> &'static str {
        concat!(
            "pedalpanel - cycling telemetry + playback status panel\n",
            "\n",
            "USAGE:\n",
            "  pedalpanel run [--bucket <name>] [--tick-ms <ms>] [--poll-every <ticks>] [--rows-file <path>] [--demo]\n",
            "                 [--log-level <level>] [--log-file <path>] [--ticks <n>]\n",
            "  pedalpanel --help\n",
            "  pedalpanel --version\n",
            "\n",
            "OPTIONS:\n",
            "  --bucket <name>       Time-series bucket to query (default: bike-test)\n",
            "  --tick-ms <ms>        Render/poll tick interval (default: 100)\n",
            "  --poll-every <ticks>  Fire the remote query every N poll ticks (default: 50)\n",
            "  --rows-file <path>    Decode a JSON rows file and render it once (testing helper)\n",
            "  --demo                Drive the panel from synthetic ride data\n",
            "  --log-level <level>   error|warn|info|debug|trace (default: info)\n",
            "  --log-file <path>     Append log lines to a file as well as stderr\n",
            "  --ticks <n>           Stop after n render ticks\n",
            "  -h, --help            Show this help\n",
            "  -V, --version         Show version\n",
        )
    }

    pub fn print_help() {
        println!("{}", Self::help());
    }
}

fn parse_run_options(iter: &mut std::slice::Iter<String>) -> Result<RunOptions> {
    let mut opts = RunOptions::default();

    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--bucket" => {
                opts.bucket = Some(take_value(flag, iter)?);
            }
            "--tick-ms" => {
                let raw = take_value(flag, iter)?;
                opts.tick_ms = Some(raw.parse().map_err(|_| {
                    Error::InvalidArgs("tick-ms must be a positive integer".to_string())
                })?);
            }
            "--poll-every" => {
                let raw = take_value(flag, iter)?;
                opts.poll_every_ticks = Some(raw.parse().map_err(|_| {
                    Error::InvalidArgs("poll-every must be a positive integer".to_string())
                })?);
            }
            "--ticks" => {
                let raw = take_value(flag, iter)?;
                opts.max_ticks = Some(raw.parse().map_err(|_| {
                    Error::InvalidArgs("ticks must be a positive integer".to_string())
                })?);
            }
            "--rows-file" => {
                opts.rows_file = Some(take_value(flag, iter)?);
            }
            "--demo" => {
                opts.demo = true;
            }
            "--log-level" => {
                let raw = take_value(flag, iter)?;
                LogLevel::from_str(&raw).map_err(|_| {
                    Error::InvalidArgs(format!(
                        "unknown log level '{raw}', expected error|warn|info|debug|trace"
                    ))
                })?;
                opts.log_level = Some(raw);
            }
            "--log-file" => {
                opts.log_file = Some(take_value(flag, iter)?);
            }
            other => {
                return Err(Error::InvalidArgs(format!(
                    "unknown flag '{other}', try --help"
                )));
            }
        }
    }

    Ok(opts)
}

fn take_value(flag: &str, iter: &mut std::slice::Iter<String>) -> Result<String> {
    iter.next()
        .cloned()
        .ok_or_else(|| Error::InvalidArgs(format!("expected a value after {flag}")))
}
