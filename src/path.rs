//! Shell-profile PATH editing for user-local installs
//!
//! The install directory is appended to the profile only when no PATH
//! assignment in it already mentions the directory, so running the
//! installer any number of times leaves exactly one entry.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::Result;

const MARKER: &str = "# added by a3s-bootstrap";

/// The line appended to the profile for `dir`
pub fn export_line(dir: &Path) -> String {
    format!("export PATH=\"{}:$PATH\"", dir.display())
}

/// Spellings of `dir` a profile might use: absolute, `$HOME/…` and `~/…`
fn spellings(dir: &Path, home: Option<&Path>) -> Vec<String> {
    let mut out = vec![dir.display().to_string()];
    if let Some(rest) = home.and_then(|h| dir.strip_prefix(h).ok()) {
        let rest = rest.display().to_string();
        out.push(format!("$HOME/{rest}"));
        out.push(format!("${{HOME}}/{rest}"));
        out.push(format!("~/{rest}"));
    }
    out
}

/// Entries of the PATH assigned on `line`, if the line is a PATH assignment
fn assigned_entries(line: &str) -> Option<Vec<&str>> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let (lhs, rhs) = line.split_once('=')?;
    let name = lhs.trim().trim_start_matches("export").trim();
    if name != "PATH" {
        return None;
    }
    let value = rhs.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);
    Some(value.split(':').collect())
}

/// True if an uncommented PATH assignment in `contents` already names `dir`
pub fn references_dir(contents: &str, dir: &Path, home: Option<&Path>) -> bool {
    let names = spellings(dir, home);
    contents
        .lines()
        .filter_map(assigned_entries)
        .flatten()
        .any(|entry| {
            let entry = entry.trim_end_matches('/');
            names.iter().any(|n| n.trim_end_matches('/') == entry)
        })
}

/// Text to append to a profile currently holding `contents`
fn addition(contents: &str, dir: &Path) -> String {
    let mut out = String::new();
    if !contents.is_empty() && !contents.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    out.push_str(MARKER);
    out.push('\n');
    out.push_str(&export_line(dir));
    out.push('\n');
    out
}

/// New profile contents with `dir` appended, or `None` if nothing changes.
pub fn append_path_entry(contents: &str, dir: &Path, home: Option<&Path>) -> Option<String> {
    if references_dir(contents, dir, home) {
        return None;
    }
    Some(format!("{contents}{}", addition(contents, dir)))
}

/// Make sure `profile` puts `dir` on PATH. Returns `true` if the file changed.
///
/// A missing profile (and its parent directory) is created.
pub async fn ensure_path_entry(profile: &Path, dir: &Path) -> Result<bool> {
    let home: Option<PathBuf> = dirs_next::home_dir();
    let contents = match fs::read_to_string(profile).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let Some(updated) = append_path_entry(&contents, dir, home.as_deref()) else {
        tracing::debug!(
            "{} already puts {} on PATH",
            profile.display(),
            dir.display()
        );
        return Ok(false);
    };

    if let Some(parent) = profile.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    fs::write(profile, updated).await?;

    tracing::info!("added {} to PATH in {}", dir.display(), profile.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_to_empty() {
        let out = append_path_entry("", Path::new("/home/u/.local/bin"), None).unwrap();
        assert!(out.contains("export PATH=\"/home/u/.local/bin:$PATH\""));
    }

    #[test]
    fn test_append_is_idempotent() {
        let dir = Path::new("/home/u/.local/bin");
        let once = append_path_entry("alias ll='ls -l'\n", dir, None).unwrap();
        assert!(append_path_entry(&once, dir, None).is_none());
        assert_eq!(once.matches("/home/u/.local/bin").count(), 1);
    }

    #[test]
    fn test_recognizes_home_relative_spellings() {
        let home = Path::new("/home/u");
        let dir = Path::new("/home/u/.local/bin");
        for line in [
            "export PATH=\"$HOME/.local/bin:$PATH\"",
            "export PATH=${HOME}/.local/bin:$PATH",
            "PATH=~/.local/bin:$PATH",
            "export PATH=\"$PATH:/home/u/.local/bin/\"",
        ] {
            assert!(references_dir(line, dir, Some(home)), "{line}");
        }
    }

    #[test]
    fn test_dir_with_spaces_matches_whole_entry() {
        let dir = Path::new("/home/u/my tools/bin");
        let line = export_line(dir);
        assert!(references_dir(&line, dir, None));
        assert!(!references_dir(&line, Path::new("/home/u/my"), None));
        assert!(append_path_entry(&line, dir, None).is_none());
    }

    #[test]
    fn test_ignores_comments_and_prefix_matches() {
        let dir = Path::new("/opt/bin");
        assert!(!references_dir("# export PATH=/opt/bin:$PATH", dir, None));
        assert!(!references_dir("export PATH=/opt/bin2:$PATH", dir, None));
        assert!(!references_dir("cd /opt/bin", dir, None));
        assert!(!references_dir("export MANPATH=/opt/bin:$MANPATH", dir, None));
    }

    #[test]
    fn test_append_adds_missing_newline() {
        let out = append_path_entry("export EDITOR=vim", Path::new("/opt/bin"), None).unwrap();
        assert!(out.starts_with("export EDITOR=vim\n"));
    }

    #[tokio::test]
    async fn test_ensure_twice_leaves_one_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = tmp.path().join(".bashrc");
        std::fs::write(&profile, "export EDITOR=vim\n").unwrap();
        let dir = tmp.path().join("bin");

        assert!(ensure_path_entry(&profile, &dir).await.unwrap());
        assert!(!ensure_path_entry(&profile, &dir).await.unwrap());

        let contents = std::fs::read_to_string(&profile).unwrap();
        assert_eq!(contents.matches(&export_line(&dir)).count(), 1);
        assert!(contents.starts_with("export EDITOR=vim\n"));
    }

    #[tokio::test]
    async fn test_ensure_twice_with_spaces_in_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = tmp.path().join(".zshrc");
        let dir = tmp.path().join("my tools").join("bin");

        assert!(ensure_path_entry(&profile, &dir).await.unwrap());
        assert!(!ensure_path_entry(&profile, &dir).await.unwrap());

        let contents = std::fs::read_to_string(&profile).unwrap();
        assert_eq!(contents.matches(&export_line(&dir)).count(), 1);
    }

    #[tokio::test]
    async fn test_ensure_creates_missing_profile() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = tmp.path().join("nested").join(".profile");
        let dir = tmp.path().join("bin");

        assert!(ensure_path_entry(&profile, &dir).await.unwrap());
        let contents = std::fs::read_to_string(&profile).unwrap();
        assert!(contents.contains(&export_line(&dir)));
    }
}
