use std::path::Path;
use std::process::Stdio;

/// Produces a JPEG preview next to a downloaded asset.
///
/// Extraction is best effort from the engine's point of view: the caller
/// logs a returned error and keeps the asset.
#[async_trait::async_trait]
pub trait ThumbnailExtractor: Send + Sync {
    /// Write a JPEG preview of `source` to `target`.
    async fn extract(&self, source: &Path, target: &Path) -> anyhow::Result<()>;
}

/// Runs an external command with the source path appended and writes the
/// command's stdout as the preview. The default is exiftool's embedded
/// preview dump, which covers most camera raw formats.
pub struct CommandThumbnailExtractor {
    program: String,
    args: Vec<String>,
}

impl CommandThumbnailExtractor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace-separated command line, e.g. from the config file.
    /// Returns `None` for a blank line.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl Default for CommandThumbnailExtractor {
    fn default() -> Self {
        Self::new("exiftool", vec!["-b".into(), "-PreviewImage".into()])
    }
}

#[async_trait::async_trait]
impl ThumbnailExtractor for CommandThumbnailExtractor {
    async fn extract(&self, source: &Path, target: &Path) -> anyhow::Result<()> {
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(source)
            .stdin(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            anyhow::bail!(
                "{} exited with {} for {}",
                self.program,
                output.status,
                source.display()
            );
        }
        if output.stdout.is_empty() {
            anyhow::bail!(
                "{} produced no preview for {}",
                self.program,
                source.display()
            );
        }
        tokio::fs::write(target, &output.stdout).await?;
        Ok(())
    }
}
