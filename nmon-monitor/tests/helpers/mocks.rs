//! Scripted collaborators for orchestrator tests

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use nmon_monitor::models::MeasurementRecord;
use nmon_monitor::services::{
    ArtifactDispatcher, AudioTools, CaptureRequest, EngineError, InferenceEngine,
    MeasurementStore, ModelInfo, ModelLoader, RawStatistics, StatisticsError, StatisticsSource,
    StoreError, TelemetryClient, ToolError,
};

use super::audio_generator::{generate_tone_wav, ToneConfig};

fn tool_failure(program: &str) -> ToolError {
    ToolError::Failed {
        program: program.to_string(),
        code: Some(1),
        stderr: "scripted failure".to_string(),
    }
}

/// Audio tools that write placeholder files
///
/// Captures contain their own file name, so a concatenated clip reads as the
/// `|`-joined list of its source names in append order.
pub struct MockTools {
    pub pcm: ToneConfig,
    pub captures: AtomicUsize,
    /// 1-based capture call that fails
    pub fail_capture_at: Option<usize>,
    pub fail_convert: bool,
    pub fail_enhance: bool,
    pub enhanced: Mutex<Vec<PathBuf>>,
}

impl MockTools {
    pub fn new(pcm: ToneConfig) -> Self {
        Self {
            pcm,
            captures: AtomicUsize::new(0),
            fail_capture_at: None,
            fail_convert: false,
            fail_enhance: false,
            enhanced: Mutex::new(Vec::new()),
        }
    }

    pub fn capture_count(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioTools for MockTools {
    async fn capture(&self, _request: &CaptureRequest, out: &Path) -> Result<(), ToolError> {
        let call = self.captures.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_capture_at == Some(call) {
            return Err(tool_failure("ffmpeg"));
        }
        let name = out.file_name().unwrap().to_string_lossy().into_owned();
        std::fs::write(out, name)?;
        Ok(())
    }

    async fn convert(
        &self,
        _input: &Path,
        out: &Path,
        _sample_rate: Option<u32>,
    ) -> Result<(), ToolError> {
        if self.fail_convert {
            return Err(tool_failure("ffmpeg"));
        }
        generate_tone_wav(out, &self.pcm).map_err(|e| ToolError::Failed {
            program: "hound".into(),
            code: None,
            stderr: e.to_string(),
        })?;
        Ok(())
    }

    async fn seed_clip(&self, source: &Path, clip: &Path) -> Result<(), ToolError> {
        std::fs::copy(source, clip)?;
        Ok(())
    }

    async fn append_clip(&self, clip: &Path, next: &Path) -> Result<(), ToolError> {
        let mut content = std::fs::read_to_string(clip)?;
        content.push('|');
        content.push_str(&std::fs::read_to_string(next)?);
        std::fs::write(clip, content)?;
        Ok(())
    }

    async fn enhance(
        &self,
        input: &Path,
        out: &Path,
        _noise_profile: &Path,
    ) -> Result<(), ToolError> {
        if self.fail_enhance {
            return Err(tool_failure("sox"));
        }
        std::fs::copy(input, out)?;
        self.enhanced.lock().unwrap().push(out.to_path_buf());
        Ok(())
    }
}

/// Statistics source returning one scripted RMS value per call
pub struct ScriptedStatistics {
    rms: Mutex<VecDeque<f64>>,
}

impl ScriptedStatistics {
    pub fn new(rms: &[f64]) -> Self {
        Self {
            rms: Mutex::new(rms.iter().copied().collect()),
        }
    }
}

#[async_trait]
impl StatisticsSource for ScriptedStatistics {
    async fn statistics(&self, _wav: &Path) -> Result<RawStatistics, StatisticsError> {
        let rms = self.rms.lock().unwrap().pop_front();
        Ok(RawStatistics {
            rms_amplitude: rms,
            rough_frequency: Some(440.0),
            volume_adjustment: Some(3.3),
            max_amplitude: Some(0.3),
            min_amplitude: Some(-0.3),
        })
    }
}

/// Engine that answers each window with the next scripted label at 0.9
pub struct ScriptedEngine {
    info: ModelInfo,
    labels: Arc<Mutex<VecDeque<String>>>,
}

#[async_trait]
impl InferenceEngine for ScriptedEngine {
    fn model_info(&self) -> &ModelInfo {
        &self.info
    }

    async fn classify_window(
        &mut self,
        _window: &[i16],
    ) -> Result<HashMap<String, f64>, EngineError> {
        let label = self
            .labels
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| EngineError::Remote("script exhausted".into()))?;

        Ok(self
            .info
            .labels
            .iter()
            .map(|l| (l.clone(), if *l == label { 0.9 } else { 0.1 }))
            .collect())
    }
}

/// Loader handing out `ScriptedEngine`s that share one label script
pub struct ScriptedLoader {
    pub info: ModelInfo,
    labels: Arc<Mutex<VecDeque<String>>>,
    pub loads: AtomicUsize,
    pub fail: bool,
}

impl ScriptedLoader {
    pub fn new(info: ModelInfo, labels: &[&str]) -> Self {
        Self {
            info,
            labels: Arc::new(Mutex::new(labels.iter().map(|s| s.to_string()).collect())),
            loads: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelLoader for ScriptedLoader {
    async fn load(&self, model_path: &Path) -> Result<Box<dyn InferenceEngine>, EngineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EngineError::ModelNotFound(model_path.display().to_string()));
        }
        Ok(Box::new(ScriptedEngine {
            info: self.info.clone(),
            labels: self.labels.clone(),
        }))
    }
}

/// Archive that snapshots each uploaded file's content
#[derive(Default)]
pub struct RecordingArchive {
    pub uploads: Mutex<Vec<(PathBuf, String)>>,
}

impl RecordingArchive {
    pub fn uploads(&self) -> Vec<(PathBuf, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactDispatcher for RecordingArchive {
    async fn archive(&self, artifact: &Path) -> bool {
        let content = std::fs::read_to_string(artifact).unwrap_or_default();
        self.uploads
            .lock()
            .unwrap()
            .push((artifact.to_path_buf(), content));
        true
    }
}

#[derive(Default)]
pub struct RecordingTelemetry {
    pub values: Mutex<Vec<f64>>,
}

impl RecordingTelemetry {
    pub fn values(&self) -> Vec<f64> {
        self.values.lock().unwrap().clone()
    }
}

#[async_trait]
impl TelemetryClient for RecordingTelemetry {
    async fn report(&self, value: f64) -> bool {
        self.values.lock().unwrap().push(value);
        true
    }
}

/// Store whose directory can never be created
pub struct FailingStore;

impl MeasurementStore for FailingStore {
    fn append(&self, _records: &[MeasurementRecord]) -> Result<Option<PathBuf>, StoreError> {
        Err(StoreError::CreateDir {
            path: "/unwritable".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        })
    }
}
