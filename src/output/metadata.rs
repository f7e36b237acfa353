//! Write run and program metadata to a TOML file in the output directory.
use anyhow::Result;
use chrono::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// The output filename used for metadata.
const METADATA_FILE_NAME: &str = "metadata.toml";

#[derive(Serialize)]
struct Metadata<'a> {
    run: RunMetadata<'a>,
    program: ProgramMetadata,
}

/// Information about the run
#[derive(Serialize)]
struct RunMetadata<'a> {
    /// Path to the case file which was run
    case_path: &'a Path,
    /// The date and time on which the results were written
    datetime: String,
}

#[derive(Serialize)]
struct ProgramMetadata {
    name: &'static str,
    /// The program version as specified in Cargo.toml
    version: &'static str,
    is_debug: bool,
}

/// Write metadata to `metadata.toml` in the given output directory.
///
/// # Arguments
///
/// * `output_path` - Directory where `metadata.toml` will be written.
/// * `case_path` - Path to the case file that was run (recorded in the metadata).
pub fn write_metadata(output_path: &Path, case_path: &Path) -> Result<()> {
    let metadata = Metadata {
        run: RunMetadata {
            case_path,
            datetime: Local::now().to_rfc2822(),
        },
        program: ProgramMetadata {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            is_debug: cfg!(debug_assertions),
        },
    };
    let file_path = output_path.join(METADATA_FILE_NAME);
    fs::write(&file_path, toml::to_string(&metadata)?)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn metadata_file() {
        let dir = tempdir().unwrap();
        write_metadata(dir.path(), Path::new("cases/demo.csv")).unwrap();

        let contents = fs::read_to_string(dir.path().join(METADATA_FILE_NAME)).unwrap();
        assert!(contents.contains("case_path = \"cases/demo.csv\""));
        assert!(contents.contains("name = \"gridcase\""));
    }
}
