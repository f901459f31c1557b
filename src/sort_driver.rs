use std::io::Read;

use crate::codec::HeaderCodec;
use crate::config;
use crate::format::native::NativeCodec;
use crate::header::Header;
use crate::merge_driver::{self, MergeInput, MergeOptions};
use crate::order::OrderMode;
use crate::run_generator::{self, Outcome};
use crate::sink::EmissionSink;
use crate::{CliError, CliResult};

pub struct SortOptions {
    pub mode: OrderMode,
    pub memory_budget: u64,
    /// Run files are named `<prefix>.NNNN.bam`.
    pub prefix: String,
}

fn run_path(prefix: &str, label: &str) -> String {
    format!("{}.{}.bam", prefix, label)
}

/// Drives C3 (run generation) followed, if more than one run was produced,
/// by a merge over those runs (C7). Returns any warnings collected, and
/// unlinks the run files itself once the final merge has completed
/// successfully; on any earlier error, run files already on disk are left
/// in place for the caller to inspect or clean up.
pub fn run(
    mut input: Box<dyn Read>,
    options: SortOptions,
    sink: &mut EmissionSink<'_>,
) -> CliResult<Vec<String>> {
    let mut header_codec = NativeCodec::new();
    let header: Header = header_codec
        .read_header(&mut input)
        .map_err(|e| CliError::Other(format!("failed to read header: {}", e)))?;

    let mut record_codec = NativeCodec::new();
    let mut run_header_codec = NativeCodec::new();

    let (outcome, mut warnings) = run_generator::generate_runs(
        &mut input,
        &mut record_codec,
        &mut run_header_codec,
        &header,
        options.mode,
        options.memory_budget,
        |i| config::open_run_writer(&run_path(&options.prefix, &format!("{:04}", i))),
    )
    .map_err(|e| CliError::Other(format!("run generation failed: {}", e)))?;

    match outcome {
        Outcome::SortedInMemory(records) => {
            sink.put_header(header)
                .map_err(|e| CliError::Other(e.to_string()))?;
            for record in records {
                sink.put_record(record, None)
                    .map_err(|e| CliError::Other(e.to_string()))?;
            }
        }
        Outcome::Runs(labels) => {
            eprintln!("[sort] merging from {} files...", labels.len());

            let paths: Vec<String> = labels
                .iter()
                .map(|l| run_path(&options.prefix, l))
                .collect();

            let mut inputs = Vec::with_capacity(paths.len());
            for path in &paths {
                let reader = config::open_run_reader(path)
                    .map_err(|e| CliError::Other(format!("failed to reopen run {}: {}", path, e)))?;
                inputs.push(MergeInput {
                    path: path.clone(),
                    reader,
                });
            }

            let (merge_warnings, _header) = merge_driver::run(
                inputs,
                MergeOptions {
                    mode: options.mode,
                    inject_rg: false,
                    region: None,
                    override_header: None,
                },
                sink,
            )
            .map_err(|e| CliError::Other(e.to_string()))?;
            warnings.extend(merge_warnings);

            for path in &paths {
                config::remove_run(path)
                    .map_err(|e| CliError::Other(format!("failed to remove run {}: {}", path, e)))?;
            }
        }
    }

    Ok(warnings)
}
