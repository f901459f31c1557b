use bytesize::ByteSize;

use crate::config::{Config, CompressionMode};
use crate::order::OrderMode;
use crate::sink::EmissionSink;
use crate::sort_driver::{self, SortOptions};
use crate::util;
use crate::CliResult;

static USAGE: &str = "
Sort alignment records, spilling to disk when the input does not fit in
the given memory budget.

When the whole input fits in one buffer, it is sorted in memory directly;
otherwise it is split into sorted runs on disk and merged back together,
and the run files are removed once the merge completes.

Usage:
    alnsort sort [options] <in> <out-prefix>
    alnsort sort --help

sort options:
    -n, --by-name            Sort by query name instead of position.
    -w, --ignore-warts       Ignore leading [MFRC]_ prefixes when sorting
                              by query name.
    -m, --memory <arg>       Memory budget before spilling a run to disk.
                              Accepts a plain byte count or a `k`/`M`/`G`
                              suffix. [default: 500000000]
    -o, --stdout              Write the sorted output to stdout instead of
                              <out-prefix>.bam.

Common options:
    -h, --help                Display this message
";

#[derive(Deserialize)]
struct Args {
    arg_in: String,
    arg_out_prefix: String,
    flag_by_name: bool,
    flag_ignore_warts: bool,
    flag_memory: String,
    flag_stdout: bool,
}

pub fn run(argv: &[&str]) -> CliResult<()> {
    let args: Args = util::get_args(USAGE, argv)?;

    let memory_budget = util::parse_memory_budget(&args.flag_memory)
        .map_err(|e| format!("invalid --memory value: {}", e))?;
    eprintln!(
        "[alnsort sort] memory budget: {}",
        ByteSize(memory_budget).to_string_as(true)
    );

    let mode = if args.flag_by_name {
        OrderMode::QueryName {
            ignore_warts: args.flag_ignore_warts,
        }
    } else {
        OrderMode::Positional
    };

    let input = Config::new(&Some(args.arg_in)).reader()?;

    let output_path = if args.flag_stdout {
        None
    } else {
        Some(format!("{}.bam", args.arg_out_prefix))
    };
    let output_config = Config::new(&output_path);
    let writer = output_config.writer(CompressionMode::Default)?;

    let warnings = {
        let mut sink = EmissionSink::new(writer);
        let warnings = sort_driver::run(
            input,
            SortOptions {
                mode,
                memory_budget,
                prefix: args.arg_out_prefix,
            },
            &mut sink,
        )?;
        sink.close()?;
        warnings
    };

    for warning in warnings {
        eprintln!("[alnsort sort] warning: {}", warning);
    }

    Ok(())
}
