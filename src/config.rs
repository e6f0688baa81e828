//! Bootstrap configuration
//!
//! Everything project-specific lives here so the installer itself takes no
//! flags. The file is HCL and every field has a default:
//!
//! ```hcl
//! privilege = "sudo"
//!
//! source {
//!   repository = "https://github.com/wp-spotlight/wp-spotlight.git"
//!   checkout   = "wp-spotlight"
//! }
//!
//! install {
//!   target = "user"
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{BootstrapError, Result};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "A3S_BOOTSTRAP_CONFIG";
/// Config file picked up from the working directory when present
pub const CONFIG_FILE: &str = "Bootstrap.hcl";

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Program used to elevate package installs; empty disables elevation
    #[serde(default = "default_privilege")]
    pub privilege: String,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub install: InstallConfig,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_repository")]
    pub repository: String,
    #[serde(default)]
    pub branch: Option<String>,
    /// Directory the source is cloned into, relative to the working directory
    #[serde(default = "default_checkout")]
    pub checkout: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_build_command")]
    pub command: String,
    /// Artifact path relative to the checkout
    #[serde(default = "default_artifact")]
    pub artifact: PathBuf,
    /// File name of the installed binary
    #[serde(default = "default_binary")]
    pub binary: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallConfig {
    #[serde(default)]
    pub target: InstallTarget,
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Shell profile receiving the PATH entry (user target only)
    #[serde(default)]
    pub profile: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallTarget {
    /// `/usr/local/bin`, written with elevation
    #[default]
    System,
    /// `~/.local/bin`, added to the user's PATH via their shell profile
    User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolchainConfig {
    #[serde(default = "default_installer_url")]
    pub installer_url: String,
    #[serde(default)]
    pub bin_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "warn".into()
}
fn default_privilege() -> String {
    "sudo".into()
}
fn default_repository() -> String {
    "https://github.com/wp-spotlight/wp-spotlight.git".into()
}
fn default_checkout() -> PathBuf {
    PathBuf::from("wp-spotlight")
}
fn default_build_command() -> String {
    "cargo build --release".into()
}
fn default_artifact() -> PathBuf {
    PathBuf::from("target/release/wp-spotlight")
}
fn default_binary() -> String {
    "wp-spotlight".into()
}
fn default_installer_url() -> String {
    "https://sh.rustup.rs".into()
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            privilege: default_privilege(),
            source: SourceConfig::default(),
            build: BuildConfig::default(),
            install: InstallConfig::default(),
            toolchain: ToolchainConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            repository: default_repository(),
            branch: None,
            checkout: default_checkout(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            command: default_build_command(),
            artifact: default_artifact(),
            binary: default_binary(),
        }
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            target: InstallTarget::System,
            dir: None,
            profile: None,
        }
    }
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            installer_url: default_installer_url(),
            bin_dir: None,
        }
    }
}

impl BootstrapConfig {
    /// Load from `$A3S_BOOTSTRAP_CONFIG`, else `./Bootstrap.hcl`, else defaults.
    pub fn load() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }
        let local = Path::new(CONFIG_FILE);
        if local.is_file() {
            return Self::from_file(local);
        }
        tracing::debug!("no {CONFIG_FILE} found; using built-in defaults");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let src = std::fs::read_to_string(path)
            .map_err(|e| BootstrapError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&src)
            .map_err(|e| BootstrapError::Config(format!("{}: {e}", path.display())))
    }

    pub fn parse(src: &str) -> std::result::Result<Self, String> {
        let cfg: BootstrapConfig =
            hcl::from_str(src).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        let required = [
            ("source.repository", self.source.repository.trim().is_empty()),
            ("source.checkout", self.source.checkout.as_os_str().is_empty()),
            ("build.command", self.build.command.trim().is_empty()),
            ("build.artifact", self.build.artifact.as_os_str().is_empty()),
            ("build.binary", self.build.binary.trim().is_empty()),
        ];
        if let Some((field, _)) = required.iter().find(|(_, empty)| *empty) {
            return Err(format!("{field} must not be empty"));
        }
        if self.build.binary.contains(['/', '\\']) {
            return Err(format!(
                "build.binary '{}' must be a file name, not a path",
                self.build.binary
            ));
        }
        let path_dirs = [
            ("install.dir", self.install.dir.as_ref()),
            ("toolchain.bin_dir", self.toolchain.bin_dir.as_ref()),
        ];
        for (field, dir) in path_dirs {
            if let Some(dir) = dir {
                if std::env::join_paths([dir]).is_err() {
                    return Err(format!(
                        "{field} '{}' cannot be a PATH entry",
                        dir.display()
                    ));
                }
            }
        }
        Ok(())
    }

    /// Privilege-escalation program, if elevation is enabled
    pub fn privilege(&self) -> Option<&str> {
        let p = self.privilege.trim();
        (!p.is_empty()).then_some(p)
    }

    pub fn checkout_dir(&self) -> PathBuf {
        expand_tilde(&self.source.checkout)
    }

    pub fn install_dir(&self) -> PathBuf {
        match (&self.install.dir, self.install.target) {
            (Some(dir), _) => expand_tilde(dir),
            (None, InstallTarget::System) => PathBuf::from("/usr/local/bin"),
            (None, InstallTarget::User) => home().join(".local").join("bin"),
        }
    }

    pub fn profile_path(&self) -> PathBuf {
        match &self.install.profile {
            Some(p) => expand_tilde(p),
            None => shell_profile(std::env::var("SHELL").ok().as_deref(), &home()),
        }
    }

    pub fn toolchain_bin_dir(&self) -> PathBuf {
        match &self.toolchain.bin_dir {
            Some(dir) => expand_tilde(dir),
            None => home().join(".cargo").join("bin"),
        }
    }
}

fn home() -> PathBuf {
    dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Startup file a login shell of kind `shell` reads.
pub fn shell_profile(shell: Option<&str>, home: &Path) -> PathBuf {
    let name = shell
        .and_then(|s| Path::new(s).file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("");
    match name {
        "zsh" => home.join(".zshrc"),
        "bash" => home.join(".bashrc"),
        _ => home.join(".profile"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = BootstrapConfig::default();
        assert_eq!(cfg.privilege(), Some("sudo"));
        assert_eq!(cfg.install.target, InstallTarget::System);
        assert_eq!(cfg.install_dir(), PathBuf::from("/usr/local/bin"));
        assert_eq!(cfg.build.binary, "wp-spotlight");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_full() {
        let src = r#"
log_level = "debug"
privilege = ""

source {
  repository = "https://example.com/spotlight.git"
  branch     = "main"
  checkout   = "spotlight"
}

build {
  command  = "cargo build --release --locked"
  artifact = "target/release/spotlight"
  binary   = "spotlight"
}

install {
  target  = "user"
  dir     = "/opt/tools/bin"
  profile = "/tmp/profile"
}

toolchain {
  installer_url = "https://mirror.example.com/rustup.sh"
  bin_dir       = "/opt/cargo/bin"
}
"#;
        let cfg = BootstrapConfig::parse(src).unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.privilege(), None);
        assert_eq!(cfg.source.branch.as_deref(), Some("main"));
        assert_eq!(cfg.checkout_dir(), PathBuf::from("spotlight"));
        assert_eq!(cfg.install.target, InstallTarget::User);
        assert_eq!(cfg.install_dir(), PathBuf::from("/opt/tools/bin"));
        assert_eq!(cfg.profile_path(), PathBuf::from("/tmp/profile"));
        assert_eq!(cfg.toolchain_bin_dir(), PathBuf::from("/opt/cargo/bin"));
    }

    #[test]
    fn test_parse_partial_keeps_defaults() {
        let cfg = BootstrapConfig::parse("install {\n  target = \"user\"\n}\n").unwrap();
        assert_eq!(cfg.install.target, InstallTarget::User);
        assert!(cfg.install_dir().ends_with(".local/bin"));
        assert_eq!(cfg.build.command, "cargo build --release");
    }

    #[test]
    fn test_parse_rejects_empty_repository() {
        let err = BootstrapConfig::parse("source {\n  repository = \"\"\n}\n").unwrap_err();
        assert!(err.contains("source.repository"), "{err}");
    }

    #[test]
    fn test_parse_rejects_binary_path() {
        let err = BootstrapConfig::parse("build {\n  binary = \"bin/tool\"\n}\n").unwrap_err();
        assert!(err.contains("file name"), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn test_parse_rejects_dir_with_path_separator() {
        let err = BootstrapConfig::parse("toolchain {\n  bin_dir = \"/opt/a:b/bin\"\n}\n")
            .unwrap_err();
        assert!(err.contains("toolchain.bin_dir"), "{err}");

        let err = BootstrapConfig::parse("install {\n  dir = \"/opt/x:y\"\n}\n").unwrap_err();
        assert!(err.contains("install.dir"), "{err}");
    }

    #[test]
    fn test_parse_rejects_unknown_target() {
        assert!(BootstrapConfig::parse("install {\n  target = \"global\"\n}\n").is_err());
    }

    #[test]
    fn test_from_file_missing() {
        let err = BootstrapConfig::from_file(Path::new("/nonexistent/Bootstrap.hcl")).unwrap_err();
        assert!(matches!(err, BootstrapError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "privilege = \"doas\"\n").unwrap();
        let cfg = BootstrapConfig::from_file(&path).unwrap();
        assert_eq!(cfg.privilege(), Some("doas"));
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde(Path::new("~/.local/bin"));
        assert!(expanded.ends_with(".local/bin"));
        assert!(!expanded.starts_with("~"));
        assert_eq!(expand_tilde(Path::new("/usr/bin")), PathBuf::from("/usr/bin"));
    }

    #[test]
    fn test_shell_profile() {
        let home = Path::new("/home/u");
        assert_eq!(shell_profile(Some("/bin/zsh"), home), home.join(".zshrc"));
        assert_eq!(shell_profile(Some("/usr/bin/bash"), home), home.join(".bashrc"));
        assert_eq!(shell_profile(Some("/bin/dash"), home), home.join(".profile"));
        assert_eq!(shell_profile(None, home), home.join(".profile"));
    }
}
