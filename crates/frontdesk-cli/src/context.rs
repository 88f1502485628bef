//! Client construction from global CLI options.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use directories::ProjectDirs;

use frontdesk::{ApiUrl, ClientConfig, FileStore, SessionClient};

use crate::cli::Cli;

/// Where the API lives and where the session is kept.
#[derive(Debug)]
pub struct Context {
    api: Option<String>,
    config: Option<PathBuf>,
    store_path: PathBuf,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let store_path = match &cli.store {
            Some(path) => path.clone(),
            None => default_store_path()?,
        };

        Ok(Self {
            api: cli.api.clone(),
            config: cli.config.clone(),
            store_path,
        })
    }

    /// The credential store backing the session.
    pub fn store(&self) -> Arc<FileStore> {
        Arc::new(FileStore::new(&self.store_path))
    }

    /// Client configuration: the config file if given, with `--api` taking
    /// precedence over its base URL.
    pub fn config(&self) -> Result<ClientConfig> {
        let config = match (&self.config, &self.api) {
            (Some(path), api) => {
                let mut config = ClientConfig::load(path)
                    .with_context(|| format!("Failed to load config from {}", path.display()))?;
                if let Some(api) = api {
                    config.base_url = ApiUrl::new(api).context("Invalid API URL")?;
                }
                config
            }
            (None, Some(api)) => ClientConfig::new(ApiUrl::new(api).context("Invalid API URL")?),
            (None, None) => bail!("No API URL. Pass --api or set FRONTDESK_API."),
        };
        Ok(config)
    }

    pub fn client(&self) -> Result<SessionClient> {
        self.client_with(self.config()?)
    }

    pub fn client_with(&self, config: ClientConfig) -> Result<SessionClient> {
        SessionClient::new(config, self.store()).context("Failed to create client")
    }
}

fn default_store_path() -> Result<PathBuf> {
    let dirs =
        ProjectDirs::from("", "", "frontdesk").context("Could not determine data directory")?;
    Ok(dirs.data_dir().join("session.json"))
}
