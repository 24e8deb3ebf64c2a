//! Configuration file loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// File configuration for `giro` defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Index page (or direct document) URL.
    pub url: Option<String>,
    /// Filename pattern for discovered documents.
    pub pattern: Option<String>,
    /// Path to the tabula jar; enables structured PDF extraction.
    pub tabula_jar: Option<PathBuf>,
    /// Java launcher for tabula.
    pub java: Option<PathBuf>,
    /// `pdftotext` program.
    pub pdftotext: Option<PathBuf>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        if let Some(pattern) = &self.pattern
            && let Err(error) = regex::Regex::new(pattern)
        {
            bail!("Invalid config value for `pattern`: {error}");
        }
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/giro/config.toml`
/// 2. `$HOME/.config/giro/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("giro").join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("giro")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path, if a file exists there.
pub fn load_default_file_config() -> Result<Option<FileConfig>> {
    match resolve_default_config_path() {
        Some(path) if path.exists() => load_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let line_number = line_index + 1;

        match key {
            "url" => cfg.url = Some(string_value(key, value, line_number)?),
            "pattern" => cfg.pattern = Some(string_value(key, value, line_number)?),
            "tabula_jar" => {
                cfg.tabula_jar = Some(PathBuf::from(string_value(key, value, line_number)?));
            }
            "java" => cfg.java = Some(PathBuf::from(string_value(key, value, line_number)?)),
            "pdftotext" => {
                cfg.pdftotext = Some(PathBuf::from(string_value(key, value, line_number)?));
            }
            "connect_timeout_secs" => {
                let parsed = parse_integer_u64(value)
                    .with_context(|| format!("Invalid `{key}` value on line {line_number}"))?;
                cfg.connect_timeout_secs = Some(parsed);
            }
            "read_timeout_secs" => {
                let parsed = parse_integer_u64(value)
                    .with_context(|| format!("Invalid `{key}` value on line {line_number}"))?;
                cfg.read_timeout_secs = Some(parsed);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_number}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn string_value(key: &str, value: &str, line_number: usize) -> Result<String> {
    parse_string_literal(value)
        .with_context(|| format!("Invalid `{key}` value on line {line_number}"))
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_all_fields() {
        let cfg = parse_config_str(
            r#"
url = "https://www.giro.hu/dokumentumok"
pattern = "^EHT_[0-9]{8}\.xlsx$"
tabula_jar = "/opt/tabula/tabula.jar" # optional
java = "/usr/bin/java"
pdftotext = "/usr/bin/pdftotext"
connect_timeout_secs = 10
read_timeout_secs = 120
"#,
        )
        .unwrap();
        assert_eq!(cfg.url.as_deref(), Some("https://www.giro.hu/dokumentumok"));
        assert_eq!(cfg.pattern.as_deref(), Some(r"^EHT_[0-9]{8}\.xlsx$"));
        assert_eq!(cfg.tabula_jar, Some(PathBuf::from("/opt/tabula/tabula.jar")));
        assert_eq!(cfg.java, Some(PathBuf::from("/usr/bin/java")));
        assert_eq!(cfg.pdftotext, Some(PathBuf::from("/usr/bin/pdftotext")));
        assert_eq!(cfg.connect_timeout_secs, Some(10));
        assert_eq!(cfg.read_timeout_secs, Some(120));
    }

    #[test]
    fn test_parse_config_empty_is_default() {
        let cfg = parse_config_str("# nothing here\n\n").unwrap();
        assert_eq!(cfg, FileConfig::default());
    }

    #[test]
    fn test_parse_config_hash_inside_string_is_kept() {
        let cfg = parse_config_str(r#"url = "https://www.giro.hu/dokumentumok#list""#).unwrap();
        assert_eq!(cfg.url.as_deref(), Some("https://www.giro.hu/dokumentumok#list"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("\nconcurrency = 4").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_string() {
        let err = parse_config_str("url = https://www.giro.hu").unwrap_err();
        assert!(err.to_string().contains("`url`"), "got: {err}");
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("url").unwrap_err();
        assert!(err.to_string().contains("expected key = value"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_timeout() {
        let err = parse_config_str("read_timeout_secs = 0").unwrap_err();
        assert!(err.to_string().contains("read_timeout_secs"));
        let err = parse_config_str("connect_timeout_secs = -1").unwrap_err();
        assert!(err.to_string().contains("connect_timeout_secs"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_pattern() {
        let err = parse_config_str(r#"pattern = "EHT_(""#).unwrap_err();
        assert!(err.to_string().contains("pattern"));
    }
}
