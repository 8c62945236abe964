//! Import id parsing: recovering a resource identity without a prior create.
//!
//! An opaque import identifier is matched against the spec's ordered pattern
//! list, most specific first. Patterns are anchored full matches with named
//! capture groups; the first pattern that matches wins.

use std::collections::BTreeMap;

use regex::Regex;

use crate::error::EngineError;
use crate::spec::ResourceSpec;

/// Parses `id` against the spec's import patterns, returning the recovered
/// identity variables.
///
/// # Errors
///
/// Returns [`EngineError::ImportMismatch`] when no pattern matches, and
/// [`EngineError::Validation`] when a pattern is not a valid regex.
pub fn parse_import_id(
    spec: &ResourceSpec,
    id: &str,
) -> Result<BTreeMap<String, String>, EngineError> {
    for pattern in spec.import_patterns() {
        let anchored = format!("^{pattern}$");
        let regex = Regex::new(&anchored).map_err(|err| {
            EngineError::Validation(format!("invalid import pattern '{pattern}': {err}"))
        })?;
        let Some(caps) = regex.captures(id) else {
            continue;
        };

        let mut vars = BTreeMap::new();
        for name in regex.capture_names().flatten() {
            if let Some(value) = caps.name(name) {
                vars.insert(name.to_owned(), value.as_str().to_owned());
            }
        }
        return Ok(vars);
    }

    Err(EngineError::ImportMismatch {
        id: id.to_owned(),
        resource: spec.type_name().to_owned(),
    })
}
