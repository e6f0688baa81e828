//! Environment prober: OS classification and package-manager discovery.

use crate::runner::CommandRunner;
use crate::types::{CommandSpec, EnvDelta, HostProfile, OsFamily, PackageManager};

/// Prefixes `uname -s` reports under Windows POSIX layers (Git Bash, MSYS2, Cygwin)
const WINDOWS_MARKERS: &[&str] = &["MINGW", "MSYS", "CYGWIN", "Windows_NT"];

/// Package managers in probe order. Pacman wins on hosts that carry both.
const PACKAGE_MANAGERS: &[(PackageManager, &str)] = &[
    (PackageManager::Pacman, "pacman"),
    (PackageManager::Apt, "apt-get"),
];

/// Map a raw OS identifier (as printed by `uname -s`) to an [`OsFamily`].
pub fn classify_os(raw: &str) -> OsFamily {
    let raw = raw.trim();
    match raw {
        "Linux" => OsFamily::Linux,
        "Darwin" => OsFamily::Darwin,
        _ if WINDOWS_MARKERS.iter().any(|m| raw.starts_with(m)) => OsFamily::Windows,
        _ => OsFamily::Unknown,
    }
}

/// First package manager in priority order for which `exists` returns true.
pub fn detect_package_manager(exists: impl Fn(&str) -> bool) -> PackageManager {
    PACKAGE_MANAGERS
        .iter()
        .find(|(_, exe)| exists(*exe))
        .map(|(pm, _)| *pm)
        .unwrap_or(PackageManager::None)
}

/// The compile-time target OS, spelled the way `uname -s` would spell it.
fn fallback_os_name() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "Darwin",
        "windows" => "Windows_NT",
        other => other,
    }
}

/// Read the raw OS identifier, preferring `uname -s`.
pub async fn os_name(runner: &dyn CommandRunner) -> String {
    let uname = CommandSpec::new("uname").arg("-s");
    match runner.run(&uname, &EnvDelta::new()).await {
        Ok(out) if out.success() && !out.output.trim().is_empty() => {
            out.output.trim().to_string()
        }
        Ok(out) => {
            tracing::warn!(
                "uname -s exited with {:?}; using compile-time OS",
                out.exit_code
            );
            fallback_os_name().to_string()
        }
        Err(e) => {
            tracing::warn!("uname unavailable ({e}); using compile-time OS");
            fallback_os_name().to_string()
        }
    }
}

/// Inspect the host and build its [`HostProfile`].
///
/// Only reads system identification: `uname -s` and PATH lookups.
pub async fn probe(runner: &dyn CommandRunner) -> HostProfile {
    let raw = os_name(runner).await;
    let os_family = classify_os(&raw);

    let package_manager = match os_family {
        OsFamily::Linux => {
            let env = EnvDelta::new();
            detect_package_manager(|exe| runner.find_executable(exe, &env).is_some())
        }
        _ => PackageManager::NotApplicable,
    };

    let profile = HostProfile::new(os_family, package_manager);
    tracing::info!("probed host '{raw}' as {profile}");
    profile
}
