//! Output path checks before a report file is overwritten.
//!
//! Keeps a mistyped argument from clobbering the collector's snapshot or the
//! run configuration.

use std::path::Path;

use crate::error::ReportError;
use crate::intake::SNAPSHOT_PREFIX;

/// Name fragment every report output must carry
pub const OUTPUT_PATTERN: &str = "cpi";

/// Validates that an output path is safe to overwrite.
///
/// - the file name must contain `required_pattern`
/// - it must not be any of `source_paths`
/// - it must not look like a raw snapshot or a config file
pub fn validate_output_path(
    output: &Path,
    required_pattern: &str,
    source_paths: &[&Path],
) -> Result<(), ReportError> {
    let output_name = output.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if !output_name.to_lowercase().contains(required_pattern) {
        return Err(ReportError::UnsafeOutput(format!(
            "output file '{}' must contain '{}' in the name",
            output.display(),
            required_pattern
        )));
    }

    for source in source_paths {
        if output == *source {
            return Err(ReportError::UnsafeOutput(format!(
                "output '{}' cannot be the same as input '{}'",
                output.display(),
                source.display()
            )));
        }
    }

    if output_name.starts_with(SNAPSHOT_PREFIX) || output_name.ends_with(".toml") {
        return Err(ReportError::UnsafeOutput(format!(
            "output '{}' looks like a snapshot or config file",
            output.display()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_output() {
        let output = PathBuf::from("/tmp/ranked_cpi.csv");
        let source = PathBuf::from("/data/measurements_20251102.json");
        assert!(validate_output_path(&output, OUTPUT_PATTERN, &[source.as_path()]).is_ok());
    }

    #[test]
    fn test_missing_pattern() {
        let output = PathBuf::from("/tmp/output.csv");
        let result = validate_output_path(&output, OUTPUT_PATTERN, &[]);
        assert!(result.unwrap_err().to_string().contains("must contain 'cpi'"));
    }

    #[test]
    fn test_output_equals_source() {
        let path = PathBuf::from("/data/cpi.json");
        let result = validate_output_path(&path, OUTPUT_PATTERN, &[path.as_path()]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot be the same as input"));
    }

    #[test]
    fn test_snapshot_and_config_names_blocked() {
        let snapshot = PathBuf::from("/data/measurements_cpi.json");
        assert!(validate_output_path(&snapshot, OUTPUT_PATTERN, &[]).is_err());
        let config = PathBuf::from("/data/cpi.toml");
        assert!(validate_output_path(&config, OUTPUT_PATTERN, &[]).is_err());
    }
}
