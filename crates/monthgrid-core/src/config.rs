use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, info, trace, warn};

/// rc-style configuration: `key = value` lines, `#` comments, and
/// `include` directives, loaded from `~/.monthgridrc` (or `MONTHGRIDRC`,
/// or an explicit `--gridrc` path) with CLI `rc.key=value` overrides
/// applied on top.
#[derive(Debug, Clone)]
pub struct Config {
    map: HashMap<String, String>,
    pub loaded_files: Vec<PathBuf>,
}

impl Config {
    #[tracing::instrument(skip(gridrc_override))]
    pub fn load(gridrc_override: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Config {
            map: HashMap::new(),
            loaded_files: vec![],
        };

        cfg.map
            .insert("week.start".to_string(), "0".to_string());
        cfg.map
            .insert("default.command".to_string(), "show".to_string());
        cfg.map.insert("color".to_string(), "on".to_string());
        cfg.map.insert(
            "events.location".to_string(),
            "~/.monthgrid/events.json".to_string(),
        );

        let gridrc = resolve_gridrc_path(gridrc_override)?;
        if let Some(path) = gridrc {
            info!(gridrc = %path.display(), "loading gridrc");
            cfg.load_file(&path)?;
        } else {
            debug!("no gridrc found; using defaults");
        }

        Ok(cfg)
    }

    #[tracing::instrument(skip(self, overrides))]
    pub fn apply_overrides<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (k, v) in overrides {
            let key = k.strip_prefix("rc.").unwrap_or(&k).to_string();
            debug!(key = %key, value = %v, "applying override");
            self.map.insert(key, v);
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.map.get(key).map(|v| parse_bool(v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.map.iter()
    }

    /// The configured week start as the 0=Sunday..6=Saturday index.
    /// Accepts either the digit or an English weekday name. Anything
    /// else is a hard configuration error.
    pub fn week_start(&self) -> anyhow::Result<u8> {
        let raw = self
            .get("week.start")
            .unwrap_or_else(|| "0".to_string());
        parse_week_start(&raw)
    }

    /// Where the event feed lives, tilde-expanded.
    pub fn events_location(&self) -> PathBuf {
        let raw = self
            .get("events.location")
            .unwrap_or_else(|| "~/.monthgrid/events.json".to_string());
        expand_tilde(Path::new(&raw))
    }

    #[tracing::instrument(skip(self))]
    fn load_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let path = expand_tilde(path);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        self.loaded_files.push(path.clone());

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        for (line_num, raw_line) in text.lines().enumerate() {
            let mut line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((before, _)) = line.split_once('#') {
                line = before.trim();
            }

            if line.is_empty() {
                continue;
            }

            if let Some(include_rest) = line.strip_prefix("include ") {
                let include_path = resolve_include_path(&base_dir, include_rest.trim())?;
                debug!(
                    file = %path.display(),
                    include = %include_path.display(),
                    line = line_num + 1,
                    "processing include"
                );

                if include_path.exists() {
                    self.load_file(&include_path)?;
                } else {
                    warn!(include = %include_path.display(), "include file does not exist; skipping");
                }
                continue;
            }

            let (k, v) = line.split_once('=').ok_or_else(|| {
                anyhow!(
                    "invalid config line {}:{}: {}",
                    path.display(),
                    line_num + 1,
                    raw_line
                )
            })?;

            let key = k.trim().to_string();
            let value = v.trim().to_string();
            trace!(key = %key, value = %value, "loaded config key");
            self.map.insert(key, value);
        }

        Ok(())
    }
}

pub fn parse_week_start(raw: &str) -> anyhow::Result<u8> {
    let token = raw.trim().to_ascii_lowercase();

    if let Ok(value) = token.parse::<u8>() {
        if value > 6 {
            return Err(anyhow!(
                "invalid week.start {value}: expected 0 (Sunday) through 6 (Saturday)"
            ));
        }
        return Ok(value);
    }

    match token.as_str() {
        "sunday" | "sun" => Ok(0),
        "monday" | "mon" => Ok(1),
        "tuesday" | "tue" => Ok(2),
        "wednesday" | "wed" => Ok(3),
        "thursday" | "thu" => Ok(4),
        "friday" | "fri" => Ok(5),
        "saturday" | "sat" => Ok(6),
        other => Err(anyhow!(
            "invalid week.start {other}: expected 0-6 or a weekday name"
        )),
    }
}

#[tracing::instrument(skip(override_path))]
fn resolve_gridrc_path(override_path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = override_path {
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(gridrc_env) = std::env::var("MONTHGRIDRC") {
        if gridrc_env == "/dev/null" {
            return Ok(None);
        }
        return Ok(Some(PathBuf::from(gridrc_env)));
    }

    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    let candidate = home.join(".monthgridrc");
    if candidate.exists() {
        return Ok(Some(candidate));
    }

    Ok(None)
}

fn resolve_include_path(base_dir: &Path, include: &str) -> anyhow::Result<PathBuf> {
    if include.trim().is_empty() {
        return Err(anyhow!("include path cannot be empty"));
    }

    let raw = PathBuf::from(include);
    let expanded = expand_tilde(&raw);
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(base_dir.join(expanded))
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if let Some(rest) = text.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "y" | "yes" | "on" | "true"
    )
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{Config, parse_week_start};

    #[test]
    fn week_start_accepts_digits_and_names() {
        assert_eq!(parse_week_start("0").expect("digit"), 0);
        assert_eq!(parse_week_start("monday").expect("name"), 1);
        assert_eq!(parse_week_start("Sat").expect("abbrev"), 6);
        assert!(parse_week_start("7").is_err());
        assert!(parse_week_start("someday").is_err());
    }

    #[test]
    fn loads_keys_and_applies_overrides() {
        let temp = tempfile::tempdir().expect("tempdir");
        let rc = temp.path().join("gridrc");
        fs::write(&rc, "week.start = monday\ncolor = off # no ansi\n").expect("write rc");

        let mut cfg = Config::load(Some(&rc)).expect("load");
        assert_eq!(cfg.week_start().expect("week start"), 1);
        assert_eq!(cfg.get_bool("color"), Some(false));
        assert_eq!(cfg.get("default.command").as_deref(), Some("show"));

        cfg.apply_overrides([("rc.week.start".to_string(), "2".to_string())]);
        assert_eq!(cfg.week_start().expect("week start"), 2);
    }

    #[test]
    fn follows_includes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let extra = temp.path().join("extra");
        fs::write(&extra, "grid.timezone = America/New_York\n").expect("write extra");
        let rc = temp.path().join("gridrc");
        fs::write(&rc, "include extra\nweek.start = 1\n").expect("write rc");

        let cfg = Config::load(Some(&rc)).expect("load");
        assert_eq!(
            cfg.get("grid.timezone").as_deref(),
            Some("America/New_York")
        );
        assert_eq!(cfg.loaded_files.len(), 2);
    }
}
