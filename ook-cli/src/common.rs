use std::path::{Path, PathBuf};
use std::time::Instant;

use ook_core::clock::Clock;
use ook_core::settings::valid_name;

/// A host filesystem equivalent of a flash-backed settings store: a plain
/// directory of plain-text settings lists, one file per saved name.
#[derive(Debug, Clone)]
pub struct SettingsDir {
    root: PathBuf,
}

impl SettingsDir {
    pub fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(SettingsDir { root })
    }

    fn path_for(&self, name: &str) -> anyhow::Result<PathBuf> {
        if !valid_name(name) {
            anyhow::bail!("name '{}' contains illegal characters", name);
        }
        Ok(self.root.join(name))
    }

    pub fn save(&self, name: &str, contents: &str) -> anyhow::Result<()> {
        let path = self.path_for(name)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn load(&self, name: &str) -> anyhow::Result<String> {
        let path = self.path_for(name)?;
        Ok(std::fs::read_to_string(path)?)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name)
            .map(|path| path.exists())
            .unwrap_or(false)
    }

    pub fn rm(&self, name: &str) -> anyhow::Result<()> {
        let path = self.path_for(name)?;
        std::fs::remove_file(path)?;
        Ok(())
    }

    pub fn list(&self) -> anyhow::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

pub fn default_settings_dir() -> PathBuf {
    dirs_next_fallback().join("ook-cli")
}

fn dirs_next_fallback() -> PathBuf {
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// A [`Clock`] backed by `std::time::Instant`, the host equivalent of a
/// hardware microsecond timer.
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        SystemClock {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}
