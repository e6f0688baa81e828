//! Dependency resolver
//!
//! Maps a [`HostProfile`] to the ordered install plan for that host. Pure:
//! nothing here touches the system, so every row of the table is covered
//! by unit tests.
//!
//! | OS      | package manager | plan                                                     |
//! |---------|-----------------|----------------------------------------------------------|
//! | Linux   | pacman          | toolchain, `base-devel openssl pkg-config`               |
//! | Linux   | apt             | toolchain, index update, `build-essential pkg-config libssl-dev` |
//! | Linux   | none            | unsupported: install manually                            |
//! | Darwin  | n/a             | toolchain, `brew update`, `openssl pkg-config`           |
//! | Windows | n/a             | unsupported: manual dependency step                      |
//! | Unknown | any             | unsupported OS                                           |

use std::path::PathBuf;

use crate::config::BootstrapConfig;
use crate::types::{
    ActionKind, CommandSpec, HostProfile, InstallAction, OsFamily, PackageManager,
};

pub const PACMAN_PACKAGES: &[&str] = &["base-devel", "openssl", "pkg-config"];
pub const APT_PACKAGES: &[&str] = &["build-essential", "pkg-config", "libssl-dev"];
pub const BREW_PACKAGES: &[&str] = &["openssl", "pkg-config"];

/// Executable whose presence means the toolchain is already installed
pub const TOOLCHAIN_PROBE: &str = "cargo";

const NO_PACKAGE_MANAGER: &str = "no supported package manager found (looked for pacman, apt-get). \
Install a C toolchain, the OpenSSL development headers and pkg-config manually, \
then install Rust from https://rustup.rs and re-run.";

const WINDOWS_MANUAL: &str = "Windows needs a manual dependency step: install Rust from \
https://rustup.rs together with the MSVC build tools, then build the project from source.";

const UNSUPPORTED_OS: &str = "unsupported operating system; only Linux (pacman or apt) and \
macOS are handled automatically.";

/// Inputs the plan depends on besides the host profile
#[derive(Debug, Clone)]
pub struct Resolver {
    privilege: Option<String>,
    installer_url: String,
    toolchain_bin: PathBuf,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::from_config(&BootstrapConfig::default())
    }
}

impl Resolver {
    pub fn new(
        privilege: Option<&str>,
        installer_url: impl Into<String>,
        toolchain_bin: impl Into<PathBuf>,
    ) -> Self {
        Self {
            privilege: privilege
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            installer_url: installer_url.into(),
            toolchain_bin: toolchain_bin.into(),
        }
    }

    pub fn from_config(cfg: &BootstrapConfig) -> Self {
        Self::new(
            cfg.privilege(),
            cfg.toolchain.installer_url.clone(),
            cfg.toolchain_bin_dir(),
        )
    }

    /// The install plan for `profile`. Never empty.
    pub fn resolve(&self, profile: &HostProfile) -> Vec<InstallAction> {
        match (profile.os_family, profile.package_manager) {
            (OsFamily::Linux, PackageManager::Pacman) => vec![
                self.toolchain(),
                self.native_packages(
                    CommandSpec::new("pacman")
                        .args(["-S", "--needed", "--noconfirm"])
                        .args(PACMAN_PACKAGES.iter().copied()),
                    PACMAN_PACKAGES,
                    true,
                ),
            ],
            (OsFamily::Linux, PackageManager::Apt) => vec![
                self.toolchain(),
                self.index_update(CommandSpec::new("apt-get").arg("update"), true),
                self.native_packages(
                    CommandSpec::new("apt-get")
                        .args(["install", "-y"])
                        .args(APT_PACKAGES.iter().copied()),
                    APT_PACKAGES,
                    true,
                ),
            ],
            (OsFamily::Linux, PackageManager::None | PackageManager::NotApplicable) => {
                vec![InstallAction::unsupported(NO_PACKAGE_MANAGER)]
            }
            // Homebrew refuses to run as root, so nothing here is elevated
            (OsFamily::Darwin, _) => vec![
                self.toolchain(),
                self.index_update(CommandSpec::new("brew").arg("update"), false),
                self.native_packages(
                    CommandSpec::new("brew")
                        .arg("install")
                        .args(BREW_PACKAGES.iter().copied()),
                    BREW_PACKAGES,
                    false,
                ),
            ],
            (OsFamily::Windows, _) => vec![InstallAction::unsupported(WINDOWS_MANUAL)],
            (OsFamily::Unknown, _) => vec![InstallAction::unsupported(UNSUPPORTED_OS)],
        }
    }

    fn toolchain(&self) -> InstallAction {
        let script = format!(
            "curl --proto '=https' --tlsv1.2 -sSf {} | sh -s -- -y",
            self.installer_url
        );
        InstallAction::new(
            ActionKind::InstallToolchain,
            "installing the Rust toolchain",
            vec![CommandSpec::shell(script)],
        )
        .skip_if_present(TOOLCHAIN_PROBE)
        .providing_path(self.toolchain_bin.clone())
    }

    fn index_update(&self, cmd: CommandSpec, elevate: bool) -> InstallAction {
        InstallAction::new(
            ActionKind::UpdatePackageIndex,
            "updating the package index",
            vec![self.maybe_elevate(cmd, elevate)],
        )
    }

    fn native_packages(&self, cmd: CommandSpec, packages: &[&str], elevate: bool) -> InstallAction {
        InstallAction::new(
            ActionKind::InstallNativePackages,
            format!("installing {}", packages.join(", ")),
            vec![self.maybe_elevate(cmd, elevate)],
        )
    }

    fn maybe_elevate(&self, cmd: CommandSpec, elevate: bool) -> CommandSpec {
        if elevate {
            cmd.elevated(self.privilege.as_deref())
        } else {
            cmd
        }
    }
}

/// Resolve with the default resolver settings.
pub fn resolve(profile: &HostProfile) -> Vec<InstallAction> {
    Resolver::default().resolve(profile)
}
