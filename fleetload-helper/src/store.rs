//! Append-only files shared with the cleanup tooling

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::HelperResult;

const SERVICE_ACCOUNTS_FILE: &str = "service_accounts.txt";
const CONFIG_FILE: &str = "config.txt";

/// Connection config document as the consumers of `config.txt` expect it
#[derive(Debug, Serialize)]
struct ConfigDocument<'a> {
    #[serde(rename = "bootstrapURL")]
    bootstrap_url: &'a str,
    username: &'a str,
    password: &'a str,
}

/// Just the field used to spot a config that is already recorded
#[derive(Debug, Deserialize)]
struct RecordedBootstrap {
    #[serde(rename = "bootstrapURL")]
    bootstrap_url: String,
}

fn has_line(existing: &str, id: &str) -> bool {
    existing.lines().any(|line| line.trim_end() == id)
}

fn has_bootstrap_url(existing: &str, bootstrap_url: &str) -> bool {
    existing
        .split("---\n")
        .filter_map(|doc| serde_yaml::from_str::<RecordedBootstrap>(doc).ok())
        .any(|doc| doc.bootstrap_url == bootstrap_url)
}

/// Writes ids and configs under one directory, one writer at a time
#[derive(Debug)]
pub struct FileStore {
    data_dir: PathBuf,
    resource: String,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// `resource` is the collection name used for the cluster id file,
    /// e.g. `kafkas` -> `kafkas.txt`
    pub fn new(data_dir: impl Into<PathBuf>, resource: &str) -> Self {
        Self {
            data_dir: data_dir.into(),
            resource: resource.to_string(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn cluster_ids_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.txt", self.resource))
    }

    pub fn service_account_ids_path(&self) -> PathBuf {
        self.data_dir.join(SERVICE_ACCOUNTS_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    pub async fn write_cluster_id(&self, id: &str) -> HelperResult<bool> {
        let content = format!("{}\n", id);
        self.append_unless(&self.cluster_ids_path(), &content, |existing| has_line(existing, id))
            .await
    }

    pub async fn write_service_account_id(&self, id: &str) -> HelperResult<bool> {
        let content = format!("{}\n", id);
        self.append_unless(&self.service_account_ids_path(), &content, |existing| {
            has_line(existing, id)
        })
        .await
    }

    /// Append a YAML document unless the bootstrap URL is already recorded
    pub async fn write_config(
        &self,
        bootstrap_url: &str,
        username: &str,
        password: &str,
    ) -> HelperResult<bool> {
        let document = ConfigDocument {
            bootstrap_url,
            username,
            password,
        };
        let yaml = format!("---\n{}", serde_yaml::to_string(&document)?);
        self.append_unless(&self.config_path(), &yaml, |existing| {
            has_bootstrap_url(existing, bootstrap_url)
        })
        .await
    }

    /// Append `content` unless `recorded` says the file already holds it.
    /// Returns whether anything was written.
    async fn append_unless<F>(&self, path: &Path, content: &str, recorded: F) -> HelperResult<bool>
    where
        F: FnOnce(&str) -> bool,
    {
        let _guard = self.write_lock.lock().await;

        let existing = match fs::read_to_string(path).await {
            Ok(existing) => existing,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        if recorded(&existing) {
            debug!("{} already holds {:?}", path.display(), content.lines().next());
            return Ok(false);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(true)
    }
}
