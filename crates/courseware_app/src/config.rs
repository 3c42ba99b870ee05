//! Run configuration, assembled once from the command line and the
//! environment (`.env` included) before anything touches the network.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use courseware_engine::{
    BrowserSettings, Credentials, DriverSettings, IngestCredentials, LoginForm, NavigatorSettings,
    Normalizer, RunSettings,
};
use url::Url;

use crate::cli::Cli;

pub const USER_VAR: &str = "USER_NAME";
pub const PASSWORD_VAR: &str = "PASSWORD";
pub const INGEST_BASE_VAR: &str = "INGEST_BASE_URL";
pub const INGEST_USER_VAR: &str = "INGEST_USER";
pub const INGEST_PASSWORD_VAR: &str = "INGEST_PASSWORD";

/// Path of the content pages under the platform root.
const CONTENT_PATH: &str = "d2l/le/content/";

pub struct RunConfig {
    pub catalog_path: PathBuf,
    pub credentials: Credentials,
    pub browser: BrowserSettings,
    pub login: LoginForm,
    pub normalizer: Normalizer,
    pub run: RunSettings,
}

impl RunConfig {
    pub fn from_cli(cli: &Cli, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let credentials = Credentials {
            username: required(&env, USER_VAR)?,
            password: required(&env, PASSWORD_VAR)?,
        };
        let save_root = cli.save_root();
        let content_base = cli
            .platform
            .join(CONTENT_PATH)
            .with_context(|| format!("invalid platform url {}", cli.platform))?;

        let mut browser = BrowserSettings::new(save_root.clone());
        browser.webdriver_url = cli.webdriver.clone();
        browser.headless = !cli.headed;

        Ok(Self {
            catalog_path: cli.catalog.clone(),
            credentials,
            browser,
            login: LoginForm::new(cli.platform.as_str()),
            normalizer: Normalizer::default(),
            run: RunSettings {
                save_root,
                content_base,
                navigator: NavigatorSettings::default(),
                driver: DriverSettings {
                    settle_wait: Duration::from_secs(cli.settle_secs),
                    ..DriverSettings::default()
                },
            },
        })
    }
}

pub fn ingest_credentials(env: impl Fn(&str) -> Option<String>) -> Result<IngestCredentials> {
    let raw_base = required(&env, INGEST_BASE_VAR)?;
    let base_url =
        Url::parse(&raw_base).with_context(|| format!("{INGEST_BASE_VAR} is not a valid url"))?;
    Ok(IngestCredentials {
        base_url,
        username: required(&env, INGEST_USER_VAR)?,
        password: required(&env, INGEST_PASSWORD_VAR)?,
    })
}

/// Process environment lookup; blank values count as unset.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn required(env: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    env(name).ok_or_else(|| {
        anyhow!("{name} is not set. Did you create a .env file with {name}?")
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use clap::Parser;
    use pretty_assertions::assert_eq;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn course_run_needs_both_credentials() {
        let cli = Cli::try_parse_from(["courseware"]).unwrap();
        let err = RunConfig::from_cli(&cli, env(&[(USER_VAR, "s123")]))
            .err()
            .unwrap();
        assert!(err.to_string().contains(PASSWORD_VAR));
    }

    #[test]
    fn config_follows_the_command_line() {
        let cli = Cli::try_parse_from([
            "courseware",
            "-d",
            "/data/courses",
            "--platform",
            "https://lms.test/",
            "--headed",
            "--settle-secs",
            "5",
        ])
        .unwrap();

        let config =
            RunConfig::from_cli(&cli, env(&[(USER_VAR, "s123"), (PASSWORD_VAR, "pw")])).unwrap();

        assert_eq!(config.run.save_root, PathBuf::from("/data/courses"));
        assert_eq!(config.browser.download_dir, PathBuf::from("/data/courses"));
        assert!(!config.browser.headless);
        assert_eq!(
            config.run.content_base.as_str(),
            "https://lms.test/d2l/le/content/"
        );
        assert_eq!(config.login.login_url, "https://lms.test/");
        assert_eq!(config.run.driver.settle_wait, Duration::from_secs(5));
        assert_eq!(config.credentials.username, "s123");
    }

    #[test]
    fn ingest_credentials_are_validated() {
        let missing = ingest_credentials(env(&[(INGEST_BASE_VAR, "https://camp.test/")]));
        assert!(missing.is_err());

        let bad_url = ingest_credentials(env(&[
            (INGEST_BASE_VAR, "camp"),
            (INGEST_USER_VAR, "u"),
            (INGEST_PASSWORD_VAR, "p"),
        ]));
        assert!(bad_url.is_err());

        let creds = ingest_credentials(env(&[
            (INGEST_BASE_VAR, "https://camp.test/"),
            (INGEST_USER_VAR, "u"),
            (INGEST_PASSWORD_VAR, "p"),
        ]))
        .unwrap();
        assert_eq!(creds.base_url.host_str(), Some("camp.test"));
    }
}
