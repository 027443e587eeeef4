use crate::selection::PreferencePolicy;
use crate::Result;
use log::{debug, info};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub mod ipc;
mod target;

pub use target::OverrideTarget;

/// Default location of the mode override file
pub const DEFAULT_MODE_FILE: &str = "/var/run/drmMode";

/// Environment variable overriding [`DEFAULT_MODE_FILE`]
pub const MODE_FILE_ENV: &str = "DRMHOOK_MODE_FILE";

/// Environment variable selecting the [`PreferencePolicy`]
pub const POLICY_ENV: &str = "DRMHOOK_POLICY";

/// Environment variable holding an env_logger filter for the hook
pub const LOG_FILTER_ENV: &str = "DRMHOOK_LOG";

/// Environment variable naming a file the hook appends diagnostics to
pub const LOG_FILE_ENV: &str = "DRMHOOK_LOG_FILE";

/// Longest override line read, matching a 128-byte line buffer with its terminator
pub const MAX_LINE_LEN: u64 = 127;

/// Settings of the preloaded hook, read once per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookSettings {
    /// File holding the `WIDTHxHEIGHT@REFRESH` override
    pub mode_file: PathBuf,

    /// How non-matching modes are treated
    pub policy: PreferencePolicy,

    /// env_logger filter directives
    pub log_filter: Option<String>,

    /// Append diagnostics here instead of standard error
    pub log_file: Option<PathBuf>,

    /// Problems found while reading the settings, logged once logging is up
    pub warnings: Vec<String>,
}

impl Default for HookSettings {
    fn default() -> Self {
        Self {
            mode_file: PathBuf::from(DEFAULT_MODE_FILE),
            policy: PreferencePolicy::default(),
            log_filter: None,
            log_file: None,
            warnings: Vec::new(),
        }
    }
}

impl HookSettings {
    /// Reads the settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var_os(key))
    }

    /// Reads the settings through `lookup`, falling back to defaults for
    /// anything unset, empty, or invalid.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let mut settings = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(path) = non_empty(MODE_FILE_ENV) {
            settings.mode_file = PathBuf::from(path);
        }

        if let Some(policy) = non_empty(POLICY_ENV) {
            match policy.to_string_lossy().parse() {
                Ok(policy) => settings.policy = policy,
                Err(e) => settings
                    .warnings
                    .push(format!("{}, using {}", e, settings.policy)),
            }
        }

        settings.log_filter = non_empty(LOG_FILTER_ENV).map(|f| f.to_string_lossy().into_owned());
        settings.log_file = non_empty(LOG_FILE_ENV).map(PathBuf::from);
        settings
    }
}

/// Returns the override file path the command-line tool should use.
pub fn mode_file_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => HookSettings::from_env().mode_file,
    }
}

/// Reads and parses the first line of the override file.
///
/// Missing files, read errors, empty lines, and malformed content all come
/// back as `Err`. Bytes after the mode are ignored even when they are not
/// UTF-8.
pub fn read_override(path: &Path) -> Result<OverrideTarget> {
    let file = File::open(path)?;

    let mut raw = Vec::new();
    BufReader::new(file.take(MAX_LINE_LEN)).read_until(b'\n', &mut raw)?;
    let raw = raw.strip_suffix(b"\n").unwrap_or(&raw);

    let line = match std::str::from_utf8(raw) {
        Ok(line) => line,
        // Keep the longest valid prefix; the mode itself is always ASCII.
        Err(e) => std::str::from_utf8(&raw[..e.valid_up_to()]).unwrap_or_default(),
    };

    debug!("Read mode override line from {}: {:?}", path.display(), line);
    line.parse()
}

/// Writes `target` to the override file, replacing it atomically.
pub fn write_override(path: &Path, target: &OverrideTarget) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !dir.exists() {
        debug!("Creating override directory: {}", dir.display());
        fs::create_dir_all(dir)?;
    }

    // A uniquely named sibling, so concurrent writers never share a temp file.
    let mut tmp = NamedTempFile::new_in(dir)?;
    writeln!(tmp, "{}", target)?;
    tmp.persist(path).map_err(|e| e.error)?;

    info!("Wrote mode override {} to {}", target, path.display());
    Ok(())
}

/// Removes the override file. A missing file is not an error.
pub fn clear_override(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!("Removed mode override {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::collections::HashMap;

    fn scratch(contents: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = dir.path().join("drmMode");
        fs::write(&path, contents).expect("write override");
        (dir, path)
    }

    #[test]
    fn reads_first_line() {
        let (_dir, path) = scratch(b"1920x1080@60\n3840x2160@30\n");
        assert_eq!(
            read_override(&path).unwrap(),
            OverrideTarget::new(1920, 1080, 60)
        );
    }

    #[test]
    fn reads_line_without_newline() {
        let (_dir, path) = scratch(b"1280x720@50");
        assert_eq!(
            read_override(&path).unwrap(),
            OverrideTarget::new(1280, 720, 50)
        );
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().expect("create tempdir");
        assert!(matches!(
            read_override(&dir.path().join("absent")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn malformed_contents_are_unavailable() {
        let cases: [&[u8]; 5] = [b"", b"\n", b"1920x1080\n", b"abcxdef@60\n", b"\xff\xfe"];
        for contents in cases {
            let (_dir, path) = scratch(contents);
            assert!(read_override(&path).is_err(), "accepted {:?}", contents);
        }
    }

    #[test]
    fn non_utf8_after_mode_is_ignored() {
        let (_dir, path) = scratch(b"1920x1080@60\xff\n");
        assert_eq!(
            read_override(&path).unwrap(),
            OverrideTarget::new(1920, 1080, 60)
        );

        let (_dir, path) = scratch(b"1280x720@50 \xc3\x28 trailing");
        assert_eq!(
            read_override(&path).unwrap(),
            OverrideTarget::new(1280, 720, 50)
        );
    }

    #[test]
    fn only_a_bounded_prefix_is_read() {
        let mut contents = vec![b'0'; MAX_LINE_LEN as usize];
        contents.extend_from_slice(b"1920x1080@60\n");
        let (_dir, path) = scratch(&contents);
        assert!(read_override(&path).is_err());
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = dir.path().join("nested").join("drmMode");
        let target = OverrideTarget::new(2560, 1080, 75);

        write_override(&path, &target).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "2560x1080@75\n");
        assert_eq!(read_override(&path).unwrap(), target);

        let entries: Vec<_> = fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![OsString::from("drmMode")]);
    }

    #[test]
    fn concurrent_writers_do_not_collide() {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = dir.path().join("drmMode");

        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let path = path.clone();
                std::thread::spawn(move || {
                    write_override(&path, &OverrideTarget::new(1920, 1080, 60 + i))
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let target = read_override(&path).unwrap();
        assert_eq!((target.width, target.height), (1920, 1080));
        assert!((60..68).contains(&target.refresh));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn clear_is_idempotent() {
        let (_dir, path) = scratch(b"1920x1080@60\n");
        assert!(clear_override(&path).unwrap());
        assert!(!clear_override(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn settings_default_without_env() {
        let settings = HookSettings::from_vars(|_| None);
        assert_eq!(settings, HookSettings::default());
        assert_eq!(settings.mode_file, PathBuf::from(DEFAULT_MODE_FILE));
        assert_eq!(settings.policy, PreferencePolicy::Authoritative);
    }

    #[test]
    fn settings_read_from_vars() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (MODE_FILE_ENV, "/tmp/drmMode"),
            (POLICY_ENV, "additive"),
            (LOG_FILTER_ENV, "debug"),
            (LOG_FILE_ENV, ""),
        ]);
        let settings = HookSettings::from_vars(|key| vars.get(key).map(OsString::from));

        assert_eq!(settings.mode_file, PathBuf::from("/tmp/drmMode"));
        assert_eq!(settings.policy, PreferencePolicy::Additive);
        assert_eq!(settings.log_filter.as_deref(), Some("debug"));
        assert_eq!(settings.log_file, None);
        assert!(settings.warnings.is_empty());
    }

    #[test]
    fn invalid_policy_is_reported() {
        let settings = HookSettings::from_vars(|key| {
            (key == POLICY_ENV).then(|| OsString::from("loud"))
        });
        assert_eq!(settings.policy, PreferencePolicy::Authoritative);
        assert_eq!(settings.warnings.len(), 1);
    }
}
