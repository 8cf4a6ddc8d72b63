use std::path::{Path, PathBuf};

use warden_policy::{PolicyRule, PolicySource, SourceError, parse_rules};

/// Rules read from a CSV file on every load.
///
/// ```text
/// p, admin, /api/*, *
/// p, user, /api/me, GET
/// g, auditor, user
/// ```
#[derive(Debug, Clone)]
pub struct FilePolicySource {
    path: PathBuf,
}

impl FilePolicySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PolicySource for FilePolicySource {
    fn load(&self) -> Result<Vec<PolicyRule>, SourceError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        let rules = parse_rules(&text)?;
        tracing::debug!(path = %self.path.display(), rules = rules.len(), "policy rules read");
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_rules_from_disk_each_time() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "p, admin, /api/*, *").unwrap();
        let source = FilePolicySource::new(file.path());
        assert_eq!(source.load().unwrap(), vec![PolicyRule::allow("admin", "/api/*", "*")]);

        writeln!(file, "g, auditor, admin").unwrap();
        assert_eq!(source.load().unwrap().len(), 2);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let source = FilePolicySource::new("/no/such/policy.csv");
        assert!(matches!(source.load(), Err(SourceError::Io { .. })));
    }

    #[test]
    fn malformed_line_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "p, admin, /api/*, *\njunk").unwrap();
        assert!(matches!(
            FilePolicySource::new(file.path()).load(),
            Err(SourceError::Parse { line: 2, .. })
        ));
    }
}
