//! Runtime configuration resolved from CLI flags, then environment
//! variables, then defaults (spec §6 "Environment variables consumed by
//! the compiler").

use std::path::PathBuf;

const DEFAULT_IMPORT_CACHE: &str = ".github/aw/imports";
const DEFAULT_ACTIONS_LOCK: &str = ".github/aw/actions-lock.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: Option<String>,
    pub import_cache_path: PathBuf,
    pub actions_lock_path: PathBuf,
    pub log_filter: Option<String>,
}

impl Config {
    /// `cli_token`/`cli_cache` come from explicit flags and take priority
    /// over the environment; `workspace_root` anchors the relative defaults.
    pub fn resolve(workspace_root: &std::path::Path, cli_token: Option<String>, cli_cache: Option<PathBuf>) -> Config {
        let github_token = cli_token
            .or_else(|| std::env::var("GH_TOKEN").ok())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok());

        let import_cache_path = cli_cache
            .or_else(|| std::env::var("GH_AW_IMPORT_CACHE").ok().map(PathBuf::from))
            .unwrap_or_else(|| workspace_root.join(DEFAULT_IMPORT_CACHE));

        let actions_lock_path = workspace_root.join(DEFAULT_ACTIONS_LOCK);
        let log_filter = std::env::var("GH_AW_LOG_FILTER").ok();

        Config {
            github_token,
            import_cache_path,
            actions_lock_path,
            log_filter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn cli_flag_wins_over_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("GITHUB_TOKEN", "from-env");
        let config = Config::resolve(std::path::Path::new("."), Some("from-cli".to_string()), None);
        assert_eq!(config.github_token.as_deref(), Some("from-cli"));
        std::env::remove_var("GITHUB_TOKEN");
    }

    #[test]
    fn gh_token_takes_precedence_over_github_token() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("GH_TOKEN", "gh-token-value");
        std::env::set_var("GITHUB_TOKEN", "github-token-value");
        let config = Config::resolve(std::path::Path::new("."), None, None);
        assert_eq!(config.github_token.as_deref(), Some("gh-token-value"));
        std::env::remove_var("GH_TOKEN");
        std::env::remove_var("GITHUB_TOKEN");
    }

    #[test]
    fn default_cache_path_is_under_workspace_root() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("GH_AW_IMPORT_CACHE");
        let config = Config::resolve(std::path::Path::new("/repo"), None, None);
        assert_eq!(config.import_cache_path, PathBuf::from("/repo/.github/aw/imports"));
    }
}
