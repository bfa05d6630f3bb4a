//! Project configuration.
//!
//! Read from `bertui.toml` at the project root. Every field is optional; a
//! project without a config file compiles with the defaults below. Values
//! from `<root>/.env` are merged under the `[env]` table.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const CONFIG_FILE: &str = "bertui.toml";
pub const DOTENV_FILE: &str = ".env";

/// Environment placeholder values, keyed by variable name.
pub type EnvValues = BTreeMap<String, String>;

/// Virtual module specifiers and the UI library the compiler rewrites or injects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specifiers {
    /// Virtual router module, rewritten to the generated router's relative path.
    pub router: String,
    /// Virtual stylesheet module, stripped from compiled output.
    pub styles: String,
    /// UI library default-imported when classic JSX calls need it in scope.
    pub ui_library: String,
}

impl Default for Specifiers {
    fn default() -> Self {
        Self {
            router: "bertui/router".to_string(),
            styles: "bertui/styles".to_string(),
            ui_library: "react".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub source_dir: PathBuf,
    /// Relative to `source_dir`.
    pub pages_dir: PathBuf,
    pub compiled_dir: PathBuf,
    pub build_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub router_module: String,
    pub styles_module: String,
    pub ui_library: String,
    /// Value of the `export const render = "..."` opt-in for Server Islands.
    pub island_marker: String,
    pub debounce_ms: u64,
    pub watched_extensions: Vec<String>,
    pub env: EnvValues,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        let specifiers = Specifiers::default();
        Self {
            source_dir: PathBuf::from("src"),
            pages_dir: PathBuf::from("pages"),
            compiled_dir: PathBuf::from(".bertui/compiled"),
            build_dir: PathBuf::from(".bertuibuild"),
            cache_dir: PathBuf::from(".bertui/cache"),
            router_module: specifiers.router,
            styles_module: specifiers.styles,
            ui_library: specifiers.ui_library,
            island_marker: "server".to_string(),
            debounce_ms: 150,
            watched_extensions: [
                "js", "jsx", "ts", "tsx", "css", "png", "jpg", "jpeg", "gif", "svg", "webp", "avif",
            ]
            .iter()
            .map(|ext| ext.to_string())
            .collect(),
            env: EnvValues::new(),
        }
    }
}

impl ProjectConfig {
    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(path, e.to_string()))
    }

    pub fn specifiers(&self) -> Specifiers {
        Specifiers {
            router: self.router_module.clone(),
            styles: self.styles_module.clone(),
            ui_library: self.ui_library.clone(),
        }
    }

    /// The exact sentinel export that opts a page into Server Island rendering.
    pub fn island_marker_export(&self) -> String {
        format!("export const render = \"{}\"", self.island_marker)
    }
}

/// A project root plus its loaded configuration.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: ProjectConfig,
}

impl Project {
    /// Load `bertui.toml` and `.env` from `root`. Both files are optional.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let config_path = root.join(CONFIG_FILE);

        let mut config = if config_path.is_file() {
            let content = fs::read_to_string(&config_path)
                .map_err(|e| Error::config(&config_path, e.to_string()))?;
            ProjectConfig::from_toml_str(&content, &config_path)?
        } else {
            ProjectConfig::default()
        };

        let dotenv_path = root.join(DOTENV_FILE);
        if dotenv_path.is_file() {
            let content = fs::read_to_string(&dotenv_path)
                .map_err(|e| Error::config(&dotenv_path, e.to_string()))?;
            for (key, value) in parse_dotenv(&content) {
                config.env.entry(key).or_insert(value);
            }
        }

        if !config.env.is_empty() {
            tracing::info!(count = config.env.len(), "Loaded environment variables");
        }

        Ok(Self { root, config })
    }

    pub fn with_config(root: impl Into<PathBuf>, config: ProjectConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn source_root(&self) -> PathBuf {
        self.root.join(&self.config.source_dir)
    }

    pub fn pages_root(&self) -> PathBuf {
        self.source_root().join(&self.config.pages_dir)
    }

    pub fn compiled_root(&self) -> PathBuf {
        self.root.join(&self.config.compiled_dir)
    }

    pub fn build_root(&self) -> PathBuf {
        self.root.join(&self.config.build_dir)
    }

    pub fn cache_root(&self) -> PathBuf {
        self.root.join(&self.config.cache_dir)
    }
}

/// Parse `KEY=VALUE` lines. Blank lines and `#` comments are skipped, an
/// optional `export ` prefix is accepted and matching surrounding quotes are
/// stripped from the value.
pub fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let value = value.trim();
            let unquoted = ['"', '\'']
                .iter()
                .find_map(|q| value.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
                .unwrap_or(value);
            Some((key.to_string(), unquoted.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProjectConfig::default();
        assert_eq!(config.router_module, "bertui/router");
        assert_eq!(config.styles_module, "bertui/styles");
        assert_eq!(
            config.island_marker_export(),
            "export const render = \"server\""
        );
        assert!(config.watched_extensions.iter().any(|e| e == "tsx"));
        assert!(config.watched_extensions.iter().any(|e| e == "css"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ProjectConfig::from_toml_str(
            r#"
            debounce_ms = 50
            router_module = "@app/router"

            [env]
            API_URL = "https://api.example.com"
            "#,
            Path::new("bertui.toml"),
        )
        .unwrap();
        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.router_module, "@app/router");
        assert_eq!(config.styles_module, "bertui/styles");
        assert_eq!(
            config.env.get("API_URL").map(String::as_str),
            Some("https://api.example.com")
        );
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = ProjectConfig::from_toml_str("debounce_ms = \"soon\"", Path::new("bertui.toml"))
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_parse_dotenv() {
        let vars = parse_dotenv(
            "# comment\n\nAPI_URL=https://x.dev\nexport TOKEN='abc'\nNAME=\"My App\"\n=broken\n",
        );
        assert_eq!(
            vars,
            vec![
                ("API_URL".to_string(), "https://x.dev".to_string()),
                ("TOKEN".to_string(), "abc".to_string()),
                ("NAME".to_string(), "My App".to_string()),
            ]
        );
    }

    #[test]
    fn test_project_load_merges_dotenv_under_table() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[env]\nAPI_URL = \"from-toml\"\n",
        )
        .unwrap();
        fs::write(dir.path().join(DOTENV_FILE), "API_URL=from-dotenv\nMODE=dev\n").unwrap();

        let project = Project::load(dir.path()).unwrap();
        assert_eq!(project.config.env["API_URL"], "from-toml");
        assert_eq!(project.config.env["MODE"], "dev");
        assert_eq!(project.pages_root(), dir.path().join("src").join("pages"));
    }

    #[test]
    fn test_project_load_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::load(dir.path()).unwrap();
        assert_eq!(project.config, ProjectConfig::default());
    }
}
