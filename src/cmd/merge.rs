use std::io::Write as _;

use crate::codec::HeaderCodec;
use crate::config::{CompressionMode, Config};
use crate::format::native::NativeCodec;
use crate::header::Header;
use crate::merge_driver::{self, MergeInput, MergeOptions};
use crate::observer::{
    CoverageObserver, FlagObserver, IndexObserver, NativeCoverageObserver, NativeFlagObserver,
    NativeIndexObserver,
};
use crate::order::OrderMode;
use crate::sink::EmissionSink;
use crate::util;
use crate::CliResult;

static USAGE: &str = "
Merge multiple alignment files already sorted the same way into one
sorted stream.

Usage:
    alnsort merge [options] [<input>...]
    alnsort merge --help

merge options:
    -n, --by-name              Inputs are sorted by query name, not
                                position.
    -r, --rg                   Inject an RG tag derived from each input's
                                filename into every record drawn from it.
    -u, --uncompressed         Write the output uncompressed.
    -1, --fast                 Write the output at compression level 1.
    -H, --override-header <f>  Read an override header from this file and
                                apply it to the merged output.
    -R, --region <str>         Restrict the merge to a single region,
                                given as chr, chr:start, or chr:start-end.
    -o, --output <file>        Write output to <file> instead of stdout.
    -f, --force                Overwrite the output file if it exists.
    -i, --index <file>         Write a positional index of the merged
                                output to <file>.
    -x, --flagstat <file>      Write per-read-group flag statistics to
                                <file>.
    -c, --covstat <file>       Write a per-reference coverage summary to
                                <file>.

Common options:
    --help                     Display this message
";

#[derive(Deserialize)]
struct Args {
    arg_input: Vec<String>,
    flag_by_name: bool,
    flag_rg: bool,
    flag_uncompressed: bool,
    flag_fast: bool,
    flag_override_header: Option<String>,
    flag_region: Option<String>,
    flag_output: Option<String>,
    flag_force: bool,
    flag_index: Option<String>,
    flag_flagstat: Option<String>,
    flag_covstat: Option<String>,
}

pub fn run(argv: &[&str]) -> CliResult<()> {
    let args: Args = util::get_args(USAGE, argv)?;

    let mode = if args.flag_by_name {
        OrderMode::QueryName {
            ignore_warts: false,
        }
    } else {
        OrderMode::Positional
    };

    let compression = if args.flag_uncompressed {
        CompressionMode::Uncompressed
    } else if args.flag_fast {
        CompressionMode::Level1
    } else {
        CompressionMode::Default
    };

    let output_config = Config::new(&args.flag_output);
    output_config.refuse_overwrite(args.flag_force)?;

    let override_header = match &args.flag_override_header {
        None => None,
        Some(path) => {
            let mut reader = Config::new(&Some(path.clone())).reader()?;
            let mut codec = NativeCodec::new();
            let header: Header = codec
                .read_header(&mut reader)
                .map_err(|e| format!("failed to read override header {}: {}", path, e))?;
            Some(header)
        }
    };

    let input_paths = if args.arg_input.is_empty() {
        vec!["-".to_string()]
    } else {
        args.arg_input.clone()
    };

    let mut inputs = Vec::with_capacity(input_paths.len());
    for path in &input_paths {
        let reader = Config::new(&Some(path.clone())).reader()?;
        inputs.push(MergeInput {
            path: path.clone(),
            reader,
        });
    }

    let writer = output_config.writer(compression)?;

    let mut index_observer = NativeIndexObserver::new();
    let mut flag_observer = NativeFlagObserver::new();
    let mut coverage_observer = NativeCoverageObserver::new(1000);

    let (warnings, merged_header) = {
        let mut sink = EmissionSink::new(writer);
        if args.flag_index.is_some() {
            sink = sink.with_index_observer(&mut index_observer);
        }
        if args.flag_flagstat.is_some() {
            sink = sink.with_flag_observer(&mut flag_observer);
        }
        if args.flag_covstat.is_some() {
            sink = sink.with_coverage_observer(&mut coverage_observer);
        }

        let (warnings, merged_header) = merge_driver::run(
            inputs,
            MergeOptions {
                mode,
                inject_rg: args.flag_rg,
                region: args.flag_region,
                override_header,
            },
            &mut sink,
        )?;
        sink.close()?;
        (warnings, merged_header)
    };

    for warning in &warnings {
        eprintln!("[alnsort merge] warning: {}", warning);
    }

    if let Some(path) = &args.flag_flagstat {
        let mut out = Config::new(&Some(path.clone())).writer(CompressionMode::Uncompressed)?;
        flag_observer.print(&mut out)?;
    }

    if let Some(path) = &args.flag_covstat {
        let mut out = Config::new(&Some(path.clone())).writer(CompressionMode::Uncompressed)?;
        coverage_observer.print(&mut out, &merged_header)?;
    }

    if let Some(path) = &args.flag_index {
        let mut out = Config::new(&Some(path.clone())).writer(CompressionMode::Uncompressed)?;
        for (tid, pos, offset) in index_observer.entries() {
            writeln!(out, "{}\t{}\t{}", tid, pos, offset)?;
        }
    }

    Ok(())
}
