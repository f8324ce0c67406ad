//! `.env` file loading.
//!
//! Loads `.env`, `.env.local`, `.env.[mode]`, `.env.[mode].local` in order,
//! with later files overriding earlier ones. A variable already present in the
//! process environment wins over every file.
//!
//! The resulting map is read once when the build configuration is assembled and
//! is opaque to the rest of the pipeline.

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::Mode;

/// Parse a `.env` file's contents into key-value pairs.
///
/// Supports:
/// - `KEY=value` (unquoted, inline ` #` comments stripped)
/// - `KEY="value"` (double-quoted, with escape sequences)
/// - `KEY='value'` (single-quoted, literal)
/// - `export KEY=value`
/// - Comments (`#`) and blank lines are skipped
#[must_use]
pub fn parse_env_file(content: &str) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, raw_value)) = line.split_once('=') else {
            continue;
        };

        let key = key.trim();
        let key = key.strip_prefix("export ").unwrap_or(key).trim();
        if key.is_empty() {
            continue;
        }

        let raw_value = raw_value.trim();
        let value = if let Some(inner) = raw_value.strip_prefix('"') {
            parse_double_quoted(inner)
        } else if let Some(inner) = raw_value.strip_prefix('\'') {
            inner.split('\'').next().unwrap_or_default().to_string()
        } else {
            match raw_value.find(" #") {
                Some(pos) => raw_value[..pos].trim_end().to_string(),
                None => raw_value.to_string(),
            }
        };

        env.insert(key.to_string(), value);
    }

    env
}

fn parse_double_quoted(inner: &str) -> String {
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => break,
            '\\' => match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => {}
            },
            _ => result.push(c),
        }
    }
    result
}

/// The `.env` files consulted for `mode`, lowest precedence first.
#[must_use]
pub fn env_files(root: &Path, mode: Mode) -> [std::path::PathBuf; 4] {
    let mode = mode.as_str();
    [
        root.join(".env"),
        root.join(".env.local"),
        root.join(format!(".env.{mode}")),
        root.join(format!(".env.{mode}.local")),
    ]
}

/// Load the environment map for `mode` from the project root.
#[must_use]
pub fn load_env_files(root: &Path, mode: Mode) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();

    for file in &env_files(root, mode) {
        if let Ok(content) = std::fs::read_to_string(file) {
            tracing::debug!(file = %file.display(), "loaded env file");
            env.extend(parse_env_file(&content));
        }
    }

    for (key, value) in &mut env {
        if let Ok(process_value) = std::env::var(key) {
            *value = process_value;
        }
    }

    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_env_file_forms() {
        let env = parse_env_file(
            "# comment\n\
             \n\
             API_URL=https://api.example.com # trailing\n\
             export TOKEN=abc\n\
             GREETING=\"hello\\nworld\"\n\
             RAW='a \\n b'\n\
             =ignored\n\
             NOEQUALS\n",
        );

        assert_eq!(env["API_URL"], "https://api.example.com");
        assert_eq!(env["TOKEN"], "abc");
        assert_eq!(env["GREETING"], "hello\nworld");
        assert_eq!(env["RAW"], "a \\n b");
        assert_eq!(env.len(), 4);
    }

    #[test]
    #[serial]
    fn test_load_env_files_override_order() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".env"), "A=base\nB=base\nC=base\n").unwrap();
        fs::write(dir.path().join(".env.local"), "B=local\n").unwrap();
        fs::write(dir.path().join(".env.production"), "C=prod\n").unwrap();
        fs::write(dir.path().join(".env.development"), "C=dev\n").unwrap();

        let env = load_env_files(dir.path(), Mode::Production);
        assert_eq!(env["A"], "base");
        assert_eq!(env["B"], "local");
        assert_eq!(env["C"], "prod");
    }

    #[test]
    #[serial]
    fn test_process_env_wins() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(".env"),
            "BRISK_TEST_PROCESS_WINS=from-file\n",
        )
        .unwrap();

        std::env::set_var("BRISK_TEST_PROCESS_WINS", "from-process");
        let env = load_env_files(dir.path(), Mode::Development);
        std::env::remove_var("BRISK_TEST_PROCESS_WINS");

        assert_eq!(env["BRISK_TEST_PROCESS_WINS"], "from-process");
    }

    #[test]
    fn test_missing_files_yield_empty_map() {
        let dir = tempdir().unwrap();
        assert!(load_env_files(dir.path(), Mode::Development).is_empty());
    }
}
