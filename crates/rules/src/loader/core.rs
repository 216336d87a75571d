//! Directory scanning, parsing and validation of rule files.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use crate::schema::{DetectionRule, Operator, RulesDocument};

use super::error::{LoadResult, LoadStatus, Result, RuleError};
use super::watcher::{is_relevant, is_rule_file, spawn_reload_thread};

/// Rules gathered from a directory scan plus the per-file outcome.
#[derive(Debug, Default)]
pub struct RuleLoad {
    /// Enabled rules in load order (files sorted by path, rules in file order).
    pub rules: Vec<DetectionRule>,
    pub results: Vec<LoadResult>,
}

impl RuleLoad {
    /// Number of files that failed to parse or validate.
    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, LoadStatus::Failed { .. }))
            .count()
    }
}

/// Filesystem-backed rule loader with optional hot-reload.
///
/// Scans a directory (recursively) for `*.yml` / `*.yaml` files, each holding
/// a `rules:` list.
pub struct RuleLoader {
    /// Root directory containing rule YAML files.
    rules_dir: PathBuf,
    /// Active filesystem watcher (held to keep it alive).
    _watcher: Option<RecommendedWatcher>,
}

impl RuleLoader {
    pub fn new(rules_dir: impl Into<PathBuf>) -> Self {
        Self {
            rules_dir: rules_dir.into(),
            _watcher: None,
        }
    }

    /// Recursively scan the rules directory and load all YAML files.
    ///
    /// A missing directory yields zero rules. Dotfiles and non-YAML files are
    /// skipped. Parse and validation errors are reported per file and do not
    /// abort the scan. A file that redefines an already loaded rule id fails
    /// as a whole.
    pub fn load_all(&self) -> Result<RuleLoad> {
        let mut load = RuleLoad::default();

        if !self.rules_dir.exists() {
            warn!(path = %self.rules_dir.display(), "rules directory not found, no rules loaded");
            return Ok(load);
        }

        let mut files = Vec::new();
        scan_dir_recursive(&self.rules_dir, &mut files, &mut load.results)?;
        files.sort();

        let mut seen: HashSet<String> = HashSet::new();

        for path in files {
            let (rules, disabled) = match self.load_file_counted(&path) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "rejected rule file");
                    load.results.push(LoadResult::failed(path, e.to_string()));
                    continue;
                }
            };

            if let Some(dup) = rules.iter().find(|r| seen.contains(&r.id)) {
                let error = format!("rule id '{}' is already defined by an earlier file", dup.id);
                warn!(path = %path.display(), %error, "rejected rule file");
                load.results.push(LoadResult::failed(path, error));
                continue;
            }

            let rule_ids: Vec<String> = rules.iter().map(|r| r.id.clone()).collect();
            info!(path = %path.display(), rules = rule_ids.len(), disabled, "loaded rule file");
            seen.extend(rule_ids.iter().cloned());
            load.rules.extend(rules);
            load.results.push(LoadResult {
                path,
                status: LoadStatus::Loaded { rule_ids, disabled },
            });
        }

        Ok(load)
    }

    /// Parse a single rule file, returning its enabled rules.
    pub fn load_file(&self, path: &Path) -> Result<Vec<DetectionRule>> {
        self.load_file_counted(path).map(|(rules, _)| rules)
    }

    fn load_file_counted(&self, path: &Path) -> Result<(Vec<DetectionRule>, usize)> {
        let contents = fs::read_to_string(path)?;
        parse_rules(&contents)
    }

    /// Start a filesystem watcher that reloads the whole directory after a
    /// burst of changes settles, passing the new rules to `on_reload`.
    ///
    /// A reload in which any file fails is discarded and the current rules
    /// stay in effect.
    pub fn watch<F>(&mut self, on_reload: F) -> Result<()>
    where
        F: Fn(Vec<DetectionRule>) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<()>();

        let mut watcher = notify::recommended_watcher(move |res: std::result::Result<notify::Event, notify::Error>| {
            match res {
                Ok(event) if is_relevant(&event) => {
                    let _ = tx.send(());
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            }
        })?;

        watcher.watch(&self.rules_dir, RecursiveMode::Recursive)?;

        spawn_reload_thread(rx, self.rules_dir.clone(), on_reload)?;

        info!(path = %self.rules_dir.display(), "watching rules directory for changes (recursive)");
        self._watcher = Some(watcher);
        Ok(())
    }

    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }
}

/// Parse a `rules:` document from a string, returning its enabled rules.
pub fn load_from_str(yaml: &str) -> Result<Vec<DetectionRule>> {
    parse_rules(yaml).map(|(rules, _)| rules)
}

/// Parse and validate; returns enabled rules and the number of disabled ones.
fn parse_rules(yaml: &str) -> Result<(Vec<DetectionRule>, usize)> {
    if yaml.trim().is_empty() {
        return Ok((Vec::new(), 0));
    }

    let doc: RulesDocument = serde_yaml::from_str(yaml)?;
    let total = doc.rules.len();
    let rules: Vec<DetectionRule> = doc.rules.into_iter().filter(|r| r.enabled).collect();
    let disabled = total - rules.len();

    let mut ids = HashSet::new();
    for rule in &rules {
        validate_rule(rule)?;
        if !ids.insert(rule.id.as_str()) {
            return Err(RuleError::Validation(format!("duplicate rule id '{}'", rule.id)));
        }
    }

    Ok((rules, disabled))
}

fn validate_rule(rule: &DetectionRule) -> Result<()> {
    if rule.id.trim().is_empty() {
        return Err(RuleError::Validation("rule id must not be empty".to_string()));
    }

    for cond in &rule.conditions.field_conditions {
        if cond.field.is_empty() {
            return Err(RuleError::Validation(format!(
                "rule '{}': field condition with empty field",
                rule.id
            )));
        }
        if let Operator::Unknown(name) = &cond.operator {
            warn!(
                rule_id = %rule.id,
                field = %cond.field,
                operator = %name,
                "unknown operator, condition will never match"
            );
        }
    }

    if let Some(agg) = rule.aggregation() {
        if agg.field.is_empty() {
            return Err(RuleError::Validation(format!(
                "rule '{}': aggregation field must not be empty",
                rule.id
            )));
        }
        if agg.count_threshold == 0 {
            return Err(RuleError::Validation(format!(
                "rule '{}': count_threshold must be at least 1",
                rule.id
            )));
        }
        if !agg.time_window_seconds.is_finite() || agg.time_window_seconds <= 0.0 {
            return Err(RuleError::Validation(format!(
                "rule '{}': time_window_seconds must be positive",
                rule.id
            )));
        }
    }

    Ok(())
}

/// Collect rule files under `dir`, reporting the files passed over.
///
/// Hidden entries are ignored; hidden directories are not descended into.
fn scan_dir_recursive(dir: &Path, files: &mut Vec<PathBuf>, results: &mut Vec<LoadResult>) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "cannot read rules subdirectory");
            return Ok(());
        }
    };

    for entry in entries {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.starts_with('.'));

        match (hidden, path.is_dir()) {
            (true, true) => {}
            (true, false) => results.push(LoadResult::skipped(path, "dotfile")),
            (false, true) => scan_dir_recursive(&path, files, results)?,
            (false, false) if is_rule_file(&path) => files.push(path),
            (false, false) => results.push(LoadResult::skipped(path, "not a YAML file")),
        }
    }

    Ok(())
}
