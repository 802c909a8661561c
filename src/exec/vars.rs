// src/exec/vars.rs

//! `${NAME}` expansion for artifact paths.

use std::sync::LazyLock;

use anyhow::{bail, Result};
use regex::{Captures, Regex};

use crate::types::Vars;

static VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("variable pattern is valid")
});

/// Replace every `${NAME}` in `input` with its value from `vars`.
///
/// Referencing a variable that is not defined is an error.
pub fn expand(input: &str, vars: &Vars) -> Result<String> {
    let missing: Vec<&str> = VAR_RE
        .captures_iter(input)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|name| !vars.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        bail!("undefined variable(s) {:?} in '{}'", missing, input);
    }

    let expanded = VAR_RE.replace_all(input, |caps: &Captures| {
        vars.get(&caps[1]).cloned().unwrap_or_default()
    });
    Ok(expanded.into_owned())
}
