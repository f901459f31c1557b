#[macro_use]
extern crate serde_derive;

use std::env;
use std::fmt;
use std::io;
use std::process;

use colored::Colorize;
use docopt::Docopt;

mod cmd;
mod codec;
mod config;
mod format;
mod header;
mod heap;
mod merge_driver;
mod observer;
mod order;
mod record;
mod region;
mod run_generator;
mod sink;
mod sort_driver;
mod util;

macro_rules! command_list {
    () => {
        "
    sort        Sort alignment records, spilling to disk if needed
    merge       Merge multiple sorted alignment files
"
    };
}

fn main() {
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| {
            d.options_first(true)
                .version(Some(util::version()))
                .deserialize()
        })
        .unwrap_or_else(|e| match e {
            docopt::Error::Deserialize(_) => {
                eprintln!(
                    "Please choose one of the following commands:\n{}",
                    command_list!()
                );
                eprintln!(
                    "{}",
                    format!(
                        "Unknown command {}!\nUse one of the commands listed above.",
                        env::args().nth(1).unwrap_or_else(|| "<missing>".to_string())
                    )
                    .red()
                );
                process::exit(1);
            }
            _ => e.exit(),
        });

    match args.arg_command {
        None => {
            println!(
                "alnsort (v{}) sorts and merges alignment records.\n\nPlease choose one of the following commands:\n{}",
                util::version(),
                command_list!()
            );
            process::exit(0);
        }
        Some(cmd) => match cmd.run() {
            Ok(()) => process::exit(0),
            Err(CliError::Flag(err)) => err.exit(),
            Err(CliError::Io(ref err)) if err.kind() == io::ErrorKind::BrokenPipe => {
                process::exit(0);
            }
            Err(CliError::Io(err)) => {
                eprintln!("alnsort {}: {}", env::args().nth(1).unwrap_or_default(), err);
                process::exit(1);
            }
            Err(CliError::Other(msg)) => {
                eprintln!("alnsort {}: {}", env::args().nth(1).unwrap_or_default(), msg);
                process::exit(1);
            }
            Err(CliError::Help(usage, exit_code)) => {
                println!("{}", usage);
                process::exit(exit_code);
            }
        },
    }
}

static USAGE: &str = "
alnsort sorts and merges alignment records.

Usage:
    alnsort [options] <command> [<args>...]
    alnsort [options]

Options:
    -h, --help     Display this message
    --version      Print version information

Commands:
    sort        Sort alignment records, spilling to disk if needed
    merge       Merge multiple sorted alignment files
";

#[derive(Debug, Deserialize)]
struct Args {
    arg_command: Option<Command>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Command {
    Sort,
    Merge,
}

impl Command {
    fn run(&self) -> CliResult<()> {
        let argv: Vec<_> = env::args().collect();
        let argv: Vec<&str> = argv.iter().map(|s| &**s).collect();
        let argv = &*argv;

        match self {
            Command::Sort => cmd::sort::run(argv),
            Command::Merge => cmd::merge::run(argv),
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub enum CliError {
    Flag(docopt::Error),
    Io(io::Error),
    Other(String),
    Help(String, i32),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CliError::Flag(ref e) => e.fmt(f),
            CliError::Io(ref e) => e.fmt(f),
            CliError::Other(ref s) => f.write_str(s),
            CliError::Help(ref s, _) => f.write_str(s),
        }
    }
}

impl From<docopt::Error> for CliError {
    fn from(err: docopt::Error) -> CliError {
        match err {
            docopt::Error::WithProgramUsage(kind, usage) => {
                let usage = util::colorize_help(&usage);

                match kind.as_ref() {
                    docopt::Error::Help => CliError::Help(usage, 0),
                    _ => CliError::Help(
                        format!(
                            "{}\n\n{} Use the {} flag for more information.",
                            usage,
                            "Invalid command!".red(),
                            "-h,--help".cyan()
                        ),
                        1,
                    ),
                }
            }
            _ => CliError::Flag(err),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> CliError {
        CliError::Io(err)
    }
}

impl From<String> for CliError {
    fn from(err: String) -> CliError {
        CliError::Other(err)
    }
}

impl From<&str> for CliError {
    fn from(err: &str) -> CliError {
        CliError::Other(err.to_string())
    }
}
