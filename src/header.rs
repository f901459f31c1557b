use crate::{CliError, CliResult};

/// The reconciled header of a sort/merge session: the reference dictionary
/// (target names and lengths) plus the free-form text header.
#[derive(Debug, Clone, Default)]
pub struct Header {
    pub target_names: Vec<String>,
    pub target_lengths: Vec<i32>,
    pub text: String,
}

impl Header {
    pub fn n_targets(&self) -> usize {
        self.target_names.len()
    }

    fn swap_targets_from(&mut self, other: &Header) {
        self.target_names = other.target_names.clone();
        self.target_lengths = other.target_lengths.clone();
    }

    fn swap_text_from(&mut self, other: &Header) {
        self.text = other.text.clone();
    }
}

/// Verifies that `a` and `b` agree on the shared prefix of their target
/// dictionaries, returning the first diverging name on mismatch.
fn prefix_mismatch<'a>(a: &'a Header, b: &'a Header) -> Option<(usize, &'a str, &'a str)> {
    let k = a.n_targets().min(b.n_targets());
    for i in 0..k {
        if a.target_names[i] != b.target_names[i] {
            return Some((i, &a.target_names[i], &b.target_names[i]));
        }
    }
    None
}

/// Reconciles the headers of `n` merge inputs into a single output header.
/// When `region_active` is set, a dictionary mismatch is downgraded from a
/// hard failure to a warning printed by the caller (the region already
/// restricts the scope of what can be emitted, so a partially incompatible
/// dictionary is tolerable).
pub fn reconcile(headers: &[Header], filenames: &[String], region_active: bool) -> CliResult<(Header, Vec<String>)> {
    let mut warnings = Vec::new();
    let mut out = headers
        .first()
        .cloned()
        .ok_or_else(|| CliError::Other("cannot merge zero inputs".to_string()))?;

    for (i, h) in headers.iter().enumerate().skip(1) {
        if let Some((idx, expected, found)) = prefix_mismatch(&out, h) {
            let msg = format!(
                "reference name mismatch at index {} ({} != {}) in {}",
                idx, expected, found, filenames[i]
            );
            if region_active {
                warnings.push(msg);
            } else {
                return Err(CliError::Other(msg));
            }
        }

        if h.n_targets() > out.n_targets() {
            out.swap_targets_from(h);
        }
    }

    Ok((out, warnings))
}

/// Applies an override header supplied via `-H`: its free-form text always
/// replaces the reconciled text, but its binary target dictionary (if it
/// carries one) must agree element-wise with the reconciled dictionary's
/// prefix, or the merge fails (downgraded to a warning under a region
/// filter, same as the multi-input case). A text-only override header
/// bypasses the dictionary check entirely, by design: this asymmetry comes
/// straight from the original tool and is preserved intentionally.
pub fn apply_override(out: &mut Header, over: &Header, region_active: bool) -> CliResult<Option<String>> {
    let mut warning = None;

    if over.n_targets() > 0 {
        if over.n_targets() > out.n_targets() {
            let msg = format!(
                "override header has {} targets, reconciled header only has {}",
                over.n_targets(),
                out.n_targets()
            );
            if region_active {
                warning = Some(msg);
            } else {
                return Err(CliError::Other(msg));
            }
        } else {
            for i in 0..over.n_targets() {
                if over.target_names[i] != out.target_names[i] {
                    let msg = format!(
                        "override header target {} ({}) does not match reconciled target ({})",
                        i, over.target_names[i], out.target_names[i]
                    );
                    if region_active {
                        warning = Some(msg);
                    } else {
                        return Err(CliError::Other(msg));
                    }
                }
            }
        }
    }

    out.swap_text_from(over);
    Ok(warning)
}
