//! Config checks for `ringle config check`.
//!
//! Parses the file (syntax errors become diagnostics instead of a hard
//! failure) and then checks the values against what the engine can run with.

use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;

use crate::{
    env_subst::{substitute_env, unresolved_refs},
    loader::{apply_env_overrides, find_config_file, parse_config},
    schema::RingleConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// "syntax", "value", "channel", "env" or "file".
    pub category: &'static str,
    /// Dotted config path, empty for file-level problems.
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{} [{}] {}", self.severity, self.category, self.message)
        } else {
            write!(
                f,
                "{} [{}] {}: {}",
                self.severity, self.category, self.path, self.message
            )
        }
    }
}

#[derive(Debug, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(
        &mut self,
        severity: Severity,
        category: &'static str,
        path: &str,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Validate the file at `path`, or the discovered config file.
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let Some(path) = path.map(Path::to_path_buf).or_else(find_config_file) else {
        let mut result = ValidationResult::default();
        result.push(
            Severity::Info,
            "file",
            "",
            "no config file found, defaults will be used",
        );
        let mut cfg = RingleConfig::default();
        apply_env_overrides(&mut cfg);
        check_values(&cfg, &mut result);
        return result;
    };

    let mut result = match std::fs::read_to_string(&path) {
        Ok(raw) => check_str(&raw, &path, true),
        Err(e) => {
            let mut result = ValidationResult::default();
            result.push(Severity::Error, "file", "", format!("cannot read file: {e}"));
            result
        },
    };
    result.config_path = Some(path);
    result
}

/// Validate raw config text. The format follows `path`'s extension.
pub fn validate_str(raw: &str, path: &Path) -> ValidationResult {
    check_str(raw, path, false)
}

/// With `env_overrides`, values are checked as `discover_and_load` would
/// see them at runtime.
fn check_str(raw: &str, path: &Path, env_overrides: bool) -> ValidationResult {
    let mut result = ValidationResult::default();
    let expanded = substitute_env(raw);

    for name in unresolved_refs(&expanded) {
        result.push(
            Severity::Warning,
            "env",
            "",
            format!("environment variable ${{{name}}} is not set"),
        );
    }

    match parse_config(&expanded, path) {
        Ok(mut cfg) => {
            if env_overrides {
                apply_env_overrides(&mut cfg);
            }
            check_values(&cfg, &mut result);
        },
        Err(e) => result.push(Severity::Error, "syntax", "", e.to_string()),
    }
    result
}

/// Semantic checks on an already parsed config.
pub fn check_values(cfg: &RingleConfig, result: &mut ValidationResult) {
    let seg = &cfg.segmenter;
    if seg.max_segment_chars == 0 {
        result.push(
            Severity::Error,
            "value",
            "segmenter.max_segment_chars",
            "must be greater than 0",
        );
    }
    if seg.transition_phrases.iter().any(|p| p.trim().is_empty()) {
        result.push(
            Severity::Warning,
            "value",
            "segmenter.transition_phrases",
            "contains an empty phrase, which is ignored",
        );
    }

    let pacing = &cfg.pacing;
    if pacing.min_chars_per_sec <= 0.0 || pacing.max_chars_per_sec <= 0.0 {
        result.push(
            Severity::Error,
            "value",
            "pacing.min_chars_per_sec",
            "typing speed must be positive",
        );
    }
    if pacing.min_chars_per_sec > pacing.max_chars_per_sec {
        result.push(
            Severity::Error,
            "value",
            "pacing.min_chars_per_sec",
            "must not exceed pacing.max_chars_per_sec",
        );
    }
    if pacing.min_overhead_ms > pacing.max_overhead_ms {
        result.push(
            Severity::Error,
            "value",
            "pacing.min_overhead_ms",
            "must not exceed pacing.max_overhead_ms",
        );
    }
    if pacing.min_delay_ms > pacing.max_delay_ms {
        result.push(
            Severity::Error,
            "value",
            "pacing.min_delay_ms",
            "must not exceed pacing.max_delay_ms",
        );
    }

    if cfg.delivery.queue_capacity == 0 {
        result.push(
            Severity::Error,
            "value",
            "delivery.queue_capacity",
            "must be greater than 0",
        );
    }
    if cfg.delivery.status_interval_secs == 0 && cfg.delivery.idle_evict_secs > 0 {
        result.push(
            Severity::Warning,
            "value",
            "delivery.idle_evict_secs",
            "ignored while delivery.status_interval_secs is 0",
        );
    }

    let conv = &cfg.conversation;
    if conv.summary_every == 0 {
        result.push(
            Severity::Error,
            "value",
            "conversation.summary_every",
            "must be greater than 0",
        );
    }
    if !(conv.language_threshold > 0.0 && conv.language_threshold <= 1.0) {
        result.push(
            Severity::Error,
            "value",
            "conversation.language_threshold",
            "must be in (0.0, 1.0]",
        );
    }

    if cfg.persona.system_prompt.contains("{user_name}") && cfg.persona.user_name.is_none() {
        result.push(
            Severity::Info,
            "value",
            "persona.user_name",
            "not set, the prompt will address the user generically",
        );
    }
    if cfg.persona.reply_timeout_secs == 0 {
        result.push(
            Severity::Error,
            "value",
            "persona.reply_timeout_secs",
            "must be greater than 0",
        );
    }

    let has_key = cfg
        .provider
        .api_key
        .as_ref()
        .is_some_and(|k| !k.expose_secret().trim().is_empty());
    if !has_key {
        result.push(
            Severity::Warning,
            "value",
            "provider.api_key",
            "no API key configured (set OPENAI_API_KEY)",
        );
    }

    let imessage = &cfg.channels.imessage;
    if imessage.enabled && imessage.target.as_deref().is_none_or(str::is_empty) {
        result.push(
            Severity::Error,
            "channel",
            "channels.imessage.target",
            "required when the iMessage channel is enabled",
        );
    }
    if imessage.enabled && imessage.poll_interval_ms == 0 {
        result.push(
            Severity::Error,
            "channel",
            "channels.imessage.poll_interval_ms",
            "must be greater than 0",
        );
    }

    let telegram = &cfg.channels.telegram;
    if telegram.enabled && telegram.token.is_none() {
        result.push(
            Severity::Error,
            "channel",
            "channels.telegram.token",
            "required when the Telegram channel is enabled",
        );
    }

    if !imessage.enabled && !telegram.enabled {
        result.push(
            Severity::Warning,
            "channel",
            "channels",
            "no channel is enabled, nothing will be received",
        );
    }
}
