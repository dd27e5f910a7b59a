use crate::{Detection, DetectionModel, ProviderError};
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct CommandModelConfig {
    pub program: String,
    pub args: Vec<String>,
}

/// Runs an external detector program once per image.
///
/// The program receives the configured arguments followed by the image path
/// and must print a JSON array of `{"class": .., "score": ..}` on stdout.
#[derive(Clone)]
pub struct CommandModel {
    cfg: Arc<CommandModelConfig>,
}

impl CommandModel {
    pub fn new(cfg: CommandModelConfig) -> Self {
        Self { cfg: Arc::new(cfg) }
    }
}

#[async_trait::async_trait]
impl DetectionModel for CommandModel {
    async fn detect(&self, path: &Path) -> Result<Vec<Detection>, ProviderError> {
        let output = Command::new(&self.cfg.program)
            .args(&self.cfg.args)
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::RequestFailed(format!(
                "{} exited with {}: {}",
                self.cfg.program,
                output.status,
                stderr.trim()
            )));
        }

        let detections = parse_detections(&output.stdout)?;
        debug!("{} detections for {:?}", detections.len(), path);
        Ok(detections)
    }
}

fn parse_detections(stdout: &[u8]) -> Result<Vec<Detection>, ProviderError> {
    serde_json::from_slice(stdout).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_detection_array() {
        let out = br#"[{"class":"FACE_FEMALE","score":0.91},{"class":"BUTTOCKS_EXPOSED","score":0.42}]"#;
        let detections = parse_detections(out).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[1].class, "BUTTOCKS_EXPOSED");
        assert!((detections[0].score - 0.91).abs() < f32::EPSILON);
    }

    #[test]
    fn rejects_non_json_output() {
        let err = parse_detections(b"model not found").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_program_and_reads_stdout() {
        let model = CommandModel::new(CommandModelConfig {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                r#"echo '[{"class":"ANUS_EXPOSED","score":0.7}]'"#.to_string(),
                "detector".to_string(),
            ],
        });
        let detections = model.detect(Path::new("/tmp/x.jpg")).await.unwrap();
        assert_eq!(
            detections,
            vec![Detection {
                class: "ANUS_EXPOSED".to_string(),
                score: 0.7
            }]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_program_is_an_error() {
        let model = CommandModel::new(CommandModelConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "exit 3".to_string(), "detector".to_string()],
        });
        let err = model.detect(Path::new("/tmp/x.jpg")).await.unwrap_err();
        assert!(matches!(err, ProviderError::RequestFailed(_)));
    }
}
