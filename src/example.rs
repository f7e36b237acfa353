//! Code for working with the bundled example cases
use anyhow::{Context, Result, bail};
use include_dir::{Dir, DirEntry, include_dir};
use std::fs;
use std::path::{Path, PathBuf};

/// The directory containing the example cases.
const DEMOS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/demos");

/// The name of the case file in each example
pub const CASE_FILE_NAME: &str = "case.csv";

/// Get the names of all examples
pub fn get_example_names() -> impl Iterator<Item = &'static str> {
    DEMOS_DIR
        .dirs()
        .filter_map(|dir| dir.path().as_os_str().to_str())
}

/// A bundled example case
pub struct Example(Dir<'static>);

impl Example {
    /// Get the example with the specified name
    pub fn from_name(name: &str) -> Result<Self> {
        let dir = DEMOS_DIR
            .get_dir(name)
            .with_context(|| format!("Example '{name}' not found"))?;

        Ok(Self(dir.clone()))
    }

    /// Get the contents of the readme file for this example
    pub fn get_readme(&self) -> Result<&'static str> {
        self.0
            .get_file(self.0.path().join("README.txt"))
            .context("Missing file")?
            .contents_utf8()
            .context("File not UTF-8 encoded")
    }

    /// Extract this example to a specified destination, returning the path of its case file
    pub fn extract(&self, new_path: &Path) -> Result<PathBuf> {
        fs::create_dir_all(new_path)?;
        for entry in self.0.entries() {
            match entry {
                DirEntry::Dir(dir) => {
                    bail!("Subdirectories in examples not supported: {}", dir.path().display())
                }
                DirEntry::File(f) => {
                    let file_name = f.path().file_name().context("Missing file name")?;
                    fs::write(new_path.join(file_name), f.contents())?;
                }
            }
        }

        Ok(new_path.join(CASE_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn all_examples_have_readme() {
        for example in get_example_names() {
            let readme = Example::from_name(example)
                .unwrap()
                .get_readme()
                .with_context(|| format!("Could not load readme for {example}"))
                .unwrap();

            assert!(!readme.trim().is_empty());
        }
    }

    #[test]
    fn extract_example() {
        let dir = tempdir().unwrap();
        let case_path = Example::from_name("simple")
            .unwrap()
            .extract(&dir.path().join("simple"))
            .unwrap();
        assert!(case_path.is_file());
    }

    #[test]
    fn unknown_example() {
        assert!(Example::from_name("nonexistent").is_err());
    }
}
