//! Lossless image optimization through external tools.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Optimizer {
    Pingo,
    Ect,
}

impl Optimizer {
    pub fn program(&self) -> &'static str {
        match self {
            Optimizer::Pingo => "pingo",
            Optimizer::Ect => "ect",
        }
    }

    fn args(&self) -> &'static [&'static str] {
        match self {
            Optimizer::Pingo => &["-lossless", "-nostrip", "-notime"],
            Optimizer::Ect => &["--mt-file", "--mt-deflate", "--strict"],
        }
    }

    /// First available tool on `PATH`, pingo preferred.
    pub fn detect() -> Option<Self> {
        [Optimizer::Pingo, Optimizer::Ect]
            .into_iter()
            .find(|o| find_in_path(o.program()).is_some())
    }

    /// Optimize every image in `dir` in place.
    pub async fn run(&self, dir: &Path) -> Result<()> {
        tracing::info!("Optimizing images using {}", self.program());
        let status = tokio::process::Command::new(self.program())
            .args(self.args())
            .arg(dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .with_context(|| format!("Failed to run {}", self.program()))?;

        if !status.success() {
            tracing::warn!("{} exited with {}", self.program(), status);
        }
        Ok(())
    }
}

fn find_in_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        let candidates = if cfg!(windows) {
            vec![dir.join(format!("{}.exe", program)), dir.join(program)]
        } else {
            vec![dir.join(program)]
        };
        candidates.into_iter().find(|c| c.is_file())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_programs() {
        assert_eq!(Optimizer::Pingo.program(), "pingo");
        assert_eq!(Optimizer::Ect.program(), "ect");
        assert!(Optimizer::Pingo.args().contains(&"-lossless"));
    }

    #[test]
    fn test_missing_program_not_found() {
        assert!(find_in_path("definitely-not-an-optimizer-binary").is_none());
    }
}
