//! Explicit, non-global logger.
//!
//! A concurrent backup pipeline can't rely on implicit `println!`/`eprintln!`
//! calls from anywhere in the process, so logging instead goes through an
//! explicit value passed through the pipeline and its workers, with the
//! prefix set once at construction, instead of global mutable state.
//! `Logger` below is that value — built once by the pipeline, then handed to
//! every worker behind a cheap `Arc` clone.

use std::sync::Arc;

use colored::Colorize;

/// Log levels, ordered least to most verbose. Matches the `log_level`
/// integer from the configuration contract: 0=Error .. 3=Debug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn from_i64(level: i64) -> Self {
        match level {
            i64::MIN..=0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }
}

/// Shared table of secret substrings to mask in any emitted log line or
/// error message.
///
/// Seeded once per pipeline run from the provider token and the encryption
/// passphrase, then grown per-repository as each descriptor's embedded
/// credentials become known, so every downstream logging path masks them
/// consistently.
#[derive(Debug, Clone, Default)]
pub struct MaskTable {
    secrets: Vec<String>,
}

const MASK: &str = "*****";

impl MaskTable {
    pub fn new() -> Self {
        Self { secrets: Vec::new() }
    }

    /// Register a secret for masking. Empty strings are ignored (masking the
    /// empty string would turn every character into a mask).
    pub fn register(&mut self, secret: impl Into<String>) {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.push(secret);
        }
    }

    pub fn with(mut self, secret: impl Into<String>) -> Self {
        self.register(secret);
        self
    }

    /// Replace every occurrence of every registered secret with a
    /// fixed-length mask of five asterisks.
    pub fn mask(&self, text: &str) -> String {
        let mut masked = text.to_string();
        for secret in &self.secrets {
            if masked.contains(secret.as_str()) {
                masked = masked.replace(secret.as_str(), MASK);
            }
        }
        masked
    }
}

/// Explicit logger handed to the pipeline and every worker it spawns.
///
/// `prefix` is set once at construction (e.g. the provider's canonical name)
/// and never mutated; `level` gates which calls actually print.
#[derive(Clone)]
pub struct Logger {
    prefix: Arc<str>,
    level: LogLevel,
    masks: Arc<MaskTable>,
}

impl Logger {
    pub fn new(prefix: impl Into<String>, level: LogLevel, masks: MaskTable) -> Self {
        Self {
            prefix: Arc::from(prefix.into()),
            level,
            masks: Arc::new(masks),
        }
    }

    pub fn masks(&self) -> &MaskTable {
        &self.masks
    }

    /// Derive a logger sharing this one's prefix and level, but with
    /// `extra_secrets` additionally registered in its mask table. Used to
    /// mask a repository's own embedded credentials for the handful of log
    /// lines scoped to that repository, without mutating the shared logger
    /// every other worker holds a clone of.
    pub fn with_extra_masks(&self, extra_secrets: &[String]) -> Self {
        if extra_secrets.is_empty() {
            return self.clone();
        }
        let mut masks = (*self.masks).clone();
        for secret in extra_secrets {
            masks.register(secret.clone());
        }
        Self {
            prefix: Arc::clone(&self.prefix),
            level: self.level,
            masks: Arc::new(masks),
        }
    }

    fn line(&self, marker: &str, message: &str) -> String {
        format!("[{}] {} {}", self.prefix, marker, self.masks.mask(message))
    }

    pub fn error(&self, message: &str) {
        if self.level >= LogLevel::Error {
            eprintln!("{}", self.line("✗", message).red());
        }
    }

    pub fn warn(&self, message: &str) {
        if self.level >= LogLevel::Warn {
            eprintln!("{}", self.line("!", message).yellow());
        }
    }

    pub fn info(&self, message: &str) {
        if self.level >= LogLevel::Info {
            println!("{}", self.line("ℹ", message).blue());
        }
    }

    pub fn debug(&self, message: &str) {
        if self.level >= LogLevel::Debug {
            println!("{}", self.line("→", message).dimmed());
        }
    }
}
