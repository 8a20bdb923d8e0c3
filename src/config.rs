//! Runtime configuration loaded from the environment

use std::env;
use std::path::PathBuf;

use crate::ingest::DEFAULT_UNTITLED_TOPIC;

pub const ENV_DB_PATH: &str = "TESTOWNIK_DB_PATH";
pub const ENV_UNTITLED_TOPIC: &str = "TESTOWNIK_UNTITLED_TOPIC";
pub const ENV_YES_TOKEN: &str = "TESTOWNIK_YES_TOKEN";
pub const ENV_NO_TOKEN: &str = "TESTOWNIK_NO_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankConfig {
    pub db_path: PathBuf,
    pub untitled_topic: String,
    pub yes_token: String,
    pub no_token: String,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("testownik.db"),
            untitled_topic: DEFAULT_UNTITLED_TOPIC.to_string(),
            yes_token: "TAK".to_string(),
            no_token: "NIE".to_string(),
        }
    }
}

impl BankConfig {
    /// Defaults overridden by `.env` and `TESTOWNIK_*` variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from `lookup`; blank values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get(ENV_DB_PATH) {
            self.db_path = PathBuf::from(path);
        }
        if let Some(topic) = get(ENV_UNTITLED_TOPIC) {
            self.untitled_topic = topic.trim().to_string();
        }
        if let Some(yes) = get(ENV_YES_TOKEN) {
            self.yes_token = yes;
        }
        if let Some(no) = get(ENV_NO_TOKEN) {
            self.no_token = no;
        }
        self
    }
}
