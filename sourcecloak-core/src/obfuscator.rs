//! File-level obfuscation and deobfuscation.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::config::CloakConfig;
use crate::encoder;
use crate::errors::{Result, SourceCloakError};
use crate::pipeline::{ObfuscationLevel, PassOptions, TransformPipeline};
use crate::wrapper;

const DEOBFUSCATED_SUFFIX: &str = "_deobfuscated";

/// Runs the pipeline + encoder + wrapper chain over strings and files.
#[derive(Debug, Clone)]
pub struct Obfuscator {
    pipeline: TransformPipeline,
    output_suffix: String,
}

impl Obfuscator {
    pub fn new(config: &CloakConfig) -> Self {
        Self {
            pipeline: TransformPipeline::new(config.remove_whitespace),
            output_suffix: config.output_suffix.clone(),
        }
    }

    /// Pipeline passes followed by the final encoding. Always produces the
    /// reversed-base64 payload, whatever the level.
    pub fn transform(&self, source: &str, level: ObfuscationLevel, options: &PassOptions) -> String {
        let cleaned = self.pipeline.apply(source, level, options);
        encoder::encode(&cleaned)
    }

    /// Obfuscate one file into a self-executing stub.
    ///
    /// Without an explicit `output`, the stub is written next to the input
    /// with the configured suffix (`app.php` -> `app_obfuscated.php`).
    pub async fn obfuscate_file(
        &self,
        input: &Path,
        output: Option<&Path>,
        level: ObfuscationLevel,
        options: &PassOptions,
    ) -> Result<PathBuf> {
        let source = read_source(input).await?;
        let stub = wrapper::wrap(&self.transform(&source, level, options));

        let output_path = match output {
            Some(path) => path.to_path_buf(),
            None => self.output_path(input),
        };
        write_output(&output_path, &stub).await?;
        debug!(input = %input.display(), output = %output_path.display(), %level, "file obfuscated");
        Ok(output_path)
    }

    /// Produce the stub text for `source` without touching the filesystem.
    pub fn obfuscate_source(
        &self,
        source: &str,
        level: ObfuscationLevel,
        options: &PassOptions,
    ) -> String {
        wrapper::wrap(&self.transform(source, level, options))
    }

    /// Deobfuscate one file back to source text.
    ///
    /// Accepts either a generated stub (the embedded literal is extracted) or
    /// a bare payload file. Decode failures are hard errors for this file.
    pub async fn deobfuscate_file(&self, input: &Path, output: Option<&Path>) -> Result<PathBuf> {
        let content = read_source(input).await?;
        let source = deobfuscate_content(&content)?;

        let output_path = match output {
            Some(path) => path.to_path_buf(),
            None => suffixed_path(input, DEOBFUSCATED_SUFFIX),
        };
        write_output(&output_path, &source).await?;
        debug!(input = %input.display(), output = %output_path.display(), "file deobfuscated");
        Ok(output_path)
    }

    /// Output path for an obfuscated sibling of `input`.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        suffixed_path(input, &self.output_suffix)
    }
}

/// Decode stub or bare-payload content into source text.
pub fn deobfuscate_content(content: &str) -> Result<String> {
    match wrapper::extract_payload(content) {
        Some(payload) => encoder::decode(payload),
        None => encoder::decode(content.trim()),
    }
}

fn suffixed_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name = format!("{stem}{suffix}");
    if let Some(ext) = input.extension().and_then(|e| e.to_str()) {
        name.push('.');
        name.push_str(ext);
    }
    input.with_file_name(name)
}

async fn read_source(input: &Path) -> Result<String> {
    if !input.exists() {
        return Err(SourceCloakError::InputNotFound(input.to_path_buf()));
    }
    Ok(fs::read_to_string(input).await?)
}

async fn write_output(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)
        .await
        .map_err(|source| SourceCloakError::Write {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;

    fn obfuscator() -> Obfuscator {
        Obfuscator::new(&CloakConfig::default())
    }

    #[test]
    fn suffixed_path_inserts_before_extension() {
        assert_eq!(
            suffixed_path(Path::new("/tmp/app.php"), "_obfuscated"),
            Path::new("/tmp/app_obfuscated.php")
        );
    }

    #[tokio::test]
    async fn obfuscate_file_writes_stub_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("app.php");
        std_fs::write(&input, "<?php echo 1;").unwrap();

        let output = obfuscator()
            .obfuscate_file(&input, None, ObfuscationLevel::Basic, &PassOptions::default())
            .await
            .unwrap();

        assert_eq!(output, dir.path().join("app_obfuscated.php"));
        let stub = std_fs::read_to_string(&output).unwrap();
        assert!(stub.contains("$obfuscated"));
        assert!(stub.contains("eval($decoded);"));
    }

    #[tokio::test]
    async fn obfuscate_then_deobfuscate_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("app.php");
        let source = "<?php echo 1;";
        std_fs::write(&input, source).unwrap();

        let service = obfuscator();
        let stub_path = service
            .obfuscate_file(&input, None, ObfuscationLevel::Basic, &PassOptions::default())
            .await
            .unwrap();
        let restored_path = service.deobfuscate_file(&stub_path, None).await.unwrap();

        // basic level collapses whitespace but this input has single spaces
        assert_eq!(std_fs::read_to_string(restored_path).unwrap(), source);
    }

    #[tokio::test]
    async fn deobfuscate_accepts_bare_payload() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("payload.php");
        std_fs::write(&input, crate::encoder::encode("<?php echo 2;")).unwrap();

        let output = obfuscator().deobfuscate_file(&input, None).await.unwrap();
        assert_eq!(
            std_fs::read_to_string(output).unwrap(),
            "<?php echo 2;"
        );
    }

    #[tokio::test]
    async fn deobfuscate_garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("garbage.php");
        std_fs::write(&input, "definitely not a payload!!").unwrap();

        let err = obfuscator()
            .deobfuscate_file(&input, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceCloakError::Decode(_)));
    }

    #[tokio::test]
    async fn missing_input_is_input_not_found() {
        let err = obfuscator()
            .obfuscate_file(
                Path::new("/no/such/file.php"),
                None,
                ObfuscationLevel::Basic,
                &PassOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SourceCloakError::InputNotFound(_)));
    }
}
