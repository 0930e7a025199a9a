use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use crate::artifacts::GitHubConfig;
use crate::credentials::DEFAULT_HASH_ROUNDS;

/// NFC attendance HTTP server.
#[derive(Debug, Clone, Parser)]
#[command(name = "attendance-server", version)]
pub struct Config {
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://data/system.db")]
    pub database_url: String,

    /// Directory for imported student datasets.
    #[arg(long, env = "DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Token signing secret. A random one is generated when unset.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    #[arg(long, env = "TOKEN_TTL_HOURS", default_value_t = 24)]
    pub token_ttl_hours: i64,

    /// PBKDF2 rounds for new password hashes.
    #[arg(long, env = "HASH_ROUNDS", default_value_t = DEFAULT_HASH_ROUNDS)]
    pub hash_rounds: u32,

    #[arg(long, env = "ADMIN_USERNAME", default_value = "admin")]
    pub admin_username: String,

    /// Password for a newly created admin. Generated and logged once when unset.
    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,

    /// Overwrite the admin password with `--admin-password` on startup.
    #[arg(long, env = "RESET_ADMIN")]
    pub reset_admin: bool,

    /// Mark the session cookie `Secure`.
    #[arg(long, env = "SECURE_COOKIES")]
    pub secure_cookies: bool,

    /// Issuer accepted on externally minted identity tokens.
    #[arg(long, env = "PROVIDER_ISSUER", requires = "provider_secret")]
    pub provider_issuer: Option<String>,

    #[arg(long, env = "PROVIDER_SECRET", hide_env_values = true, requires = "provider_issuer")]
    pub provider_secret: Option<String>,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    #[arg(long, env = "GITHUB_OWNER")]
    pub github_owner: Option<String>,

    #[arg(long, env = "GITHUB_REPO")]
    pub github_repo: Option<String>,

    #[arg(long, env = "GITHUB_BRANCH", default_value = "main")]
    pub github_branch: String,

    #[arg(long, env = "GITHUB_FOLDER", default_value = "databases")]
    pub github_folder: String,
}

impl Config {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Snapshot store settings, present only when token, owner and repo are all set.
    pub fn github(&self) -> Option<GitHubConfig> {
        Some(GitHubConfig {
            token: self.github_token.clone()?,
            owner: self.github_owner.clone()?,
            repo: self.github_repo.clone()?,
            branch: self.github_branch.clone(),
            folder: self.github_folder.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["attendance-server"]).unwrap();
        assert_eq!(config.token_ttl_hours, 24);
        assert_eq!(config.hash_rounds, DEFAULT_HASH_ROUNDS);
        assert!(!config.reset_admin);
    }

    #[test]
    fn github_needs_all_parts() {
        let partial = Config::try_parse_from([
            "attendance-server",
            "--github-token",
            "t",
            "--github-owner",
            "school",
        ])
        .unwrap();
        assert!(partial.github().is_none());

        let full = Config::try_parse_from([
            "attendance-server",
            "--github-token",
            "t",
            "--github-owner",
            "school",
            "--github-repo",
            "records",
        ])
        .unwrap();
        let github = full.github().unwrap();
        assert_eq!(github.branch, "main");
        assert_eq!(github.folder, "databases");
    }

    #[test]
    fn provider_settings_come_in_pairs() {
        assert!(Config::try_parse_from(["attendance-server", "--provider-issuer", "sso"]).is_err());
    }
}
