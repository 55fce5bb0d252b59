use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, error, info};

use crate::audio::codec::{CodecAdapter, SymphoniaCodec};
use crate::audio::resampler::Resampler;
use crate::batch::progress::{ProgressEvent, ProgressOutcome, ProgressSink};
use crate::batch::spec::{ConversionJobSpec, ConversionMode, FileTask};
use crate::utils::file_ops::same_location;
use crate::{AudioError, FailureKind, Result};

/// Per-file results of one run, in enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Number of files enumerated, including any skipped by cancellation.
    pub total: usize,
    pub succeeded: Vec<FileTask>,
    pub failed: Vec<(FileTask, FailureKind)>,
    /// Files never started because the run was cancelled.
    pub skipped: Vec<FileTask>,
    pub cancelled: bool,
}

impl BatchOutcome {
    pub fn processed(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Idle,
    Enumerating,
    Processing { index: usize, total: usize },
    Completed,
}

/// Cooperative stop signal, checked between files.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct BatchJob<C = SymphoniaCodec> {
    codec: C,
    resampler: Resampler,
    cancel: CancellationToken,
    state: Arc<Mutex<JobState>>,
}

impl Default for BatchJob<SymphoniaCodec> {
    fn default() -> Self {
        Self::new(SymphoniaCodec::default(), Resampler::default())
    }
}

impl<C: CodecAdapter> BatchJob<C> {
    pub fn new(codec: C, resampler: Resampler) -> Self {
        Self {
            codec,
            resampler,
            cancel: CancellationToken::new(),
            state: Arc::new(Mutex::new(JobState::Idle)),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> JobState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: JobState) {
        debug!("Batch state: {:?}", state);
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Converts every matching file in `spec.input_dir`.
    ///
    /// Directory and configuration problems fail the whole run before any
    /// file is touched. Per-file problems are recorded in the outcome and
    /// never stop the batch.
    pub fn run(&self, spec: ConversionJobSpec, sink: &dyn ProgressSink) -> Result<BatchOutcome> {
        self.set_state(JobState::Enumerating);
        let tasks = match spec.validate().and_then(|()| spec.tasks()) {
            Ok(tasks) => tasks,
            Err(e) => {
                self.set_state(JobState::Idle);
                return Err(e);
            }
        };

        let total = tasks.len();
        let mut outcome = BatchOutcome { total, ..Default::default() };
        if total == 0 {
            info!("No matching files in {}", spec.input_dir.display());
            sink.on_no_input(&spec.input_dir);
            self.set_state(JobState::Completed);
            return Ok(outcome);
        }

        info!(
            "Converting {} files from {} to {}",
            total,
            spec.input_dir.display(),
            spec.output_dir.display()
        );
        let mut claimed: HashSet<PathBuf> = HashSet::new();
        let mut tasks = tasks.into_iter();
        while let Some(task) = tasks.next() {
            if self.cancel.is_cancelled() {
                info!("Batch cancelled before {}", task.file_name());
                outcome.cancelled = true;
                outcome.skipped.push(task);
                outcome.skipped.extend(tasks.by_ref());
                break;
            }

            self.set_state(JobState::Processing { index: task.index, total });
            let filename = task.file_name();
            sink.on_progress(ProgressEvent {
                index: task.index,
                total,
                filename: filename.clone(),
                outcome: ProgressOutcome::Pending,
            });

            let event_outcome = match self.convert(&task, &spec.mode, &claimed) {
                Ok(()) => {
                    debug!(
                        "Converted {} -> {}",
                        task.source_path.display(),
                        task.derived_output_path.display()
                    );
                    claimed.insert(task.derived_output_path.clone());
                    outcome.succeeded.push(task.clone());
                    ProgressOutcome::Success
                }
                Err(kind) => {
                    error!("Failed to convert {}: {}", task.source_path.display(), kind);
                    outcome.failed.push((task.clone(), kind.clone()));
                    ProgressOutcome::Failure(kind)
                }
            };
            sink.on_progress(ProgressEvent {
                index: task.index,
                total,
                filename,
                outcome: event_outcome,
            });
        }

        info!(
            "Finished: {} succeeded, {} failed, {} skipped",
            outcome.succeeded.len(),
            outcome.failed.len(),
            outcome.skipped.len()
        );
        sink.on_complete(&outcome);
        self.set_state(JobState::Completed);
        Ok(outcome)
    }

    /// decode, resample if asked, encode. One attempt, no retry.
    ///
    /// `claimed` holds the outputs already written by this run; a second
    /// source mapping onto one of them fails instead of replacing it.
    fn convert(
        &self,
        task: &FileTask,
        mode: &ConversionMode,
        claimed: &HashSet<PathBuf>,
    ) -> std::result::Result<(), FailureKind> {
        let decoded = self
            .codec
            .decode(&task.source_path)
            .map_err(|e| FailureKind::Decode(e.to_string()))?;

        let buffer = match mode.target_rate() {
            Some(rate) => self
                .resampler
                .resample(decoded, rate)
                .map_err(|e| FailureKind::Resample(e.to_string()))?,
            None => decoded,
        };

        if same_location(&task.source_path, &task.derived_output_path) {
            return Err(FailureKind::Encode(format!(
                "refusing to overwrite source file {}",
                task.source_path.display()
            )));
        }
        if claimed.contains(&task.derived_output_path) {
            return Err(FailureKind::Encode(format!(
                "{} was already written by another file in this batch",
                task.derived_output_path.display()
            )));
        }
        let format = mode
            .output_format(&task.source_path)
            .map_err(|e| FailureKind::Encode(e.to_string()))?;
        self.codec
            .encode(buffer, &task.derived_output_path, format)
            .map_err(|e| FailureKind::Encode(e.to_string()))
    }
}

impl<C: CodecAdapter + 'static> BatchJob<C> {
    /// Runs the batch on a dedicated worker thread.
    pub fn spawn(self, spec: ConversionJobSpec, sink: Arc<dyn ProgressSink>) -> Result<JobHandle> {
        let cancel = self.cancel.clone();
        let state = Arc::clone(&self.state);
        let worker = thread::Builder::new()
            .name("batch-worker".into())
            .spawn(move || self.run(spec, sink.as_ref()))?;
        Ok(JobHandle { cancel, state, worker })
    }
}

/// Handle to a batch running on its worker thread.
pub struct JobHandle {
    cancel: CancellationToken,
    state: Arc<Mutex<JobState>>,
    worker: JoinHandle<Result<BatchOutcome>>,
}

impl JobHandle {
    /// Asks the worker to stop after the file in flight.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> JobState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    pub fn join(self) -> Result<BatchOutcome> {
        self.worker.join().map_err(|_| {
            AudioError::Io(std::io::Error::new(std::io::ErrorKind::Other, "batch worker panicked"))
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::AudioBuffer;
    use crate::audio::codec::OutputFormat;
    use crate::batch::progress::{ChannelSink, ProgressMessage};
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::mpsc;
    use tempfile::TempDir;

    /// Fake codec: files whose content is "bad" fail to decode, everything else
    /// decodes to a short mono buffer at 8 kHz. Encodes are recorded.
    #[derive(Default)]
    struct FakeCodec {
        encoded: Mutex<Vec<(PathBuf, OutputFormat, u32)>>,
        cancel_after_first: Option<CancellationToken>,
    }

    impl CodecAdapter for FakeCodec {
        fn decode(&self, path: &Path) -> Result<AudioBuffer> {
            if fs::read(path)? == b"bad" {
                return Err(AudioError::UnsupportedFormat("not audio".into()));
            }
            AudioBuffer::new(vec![0.1; 80], 1, 8000)
        }

        fn encode(&self, buffer: AudioBuffer, path: &Path, format: OutputFormat) -> Result<()> {
            fs::write(path, b"encoded")?;
            self.encoded.lock().unwrap().push((path.to_path_buf(), format, buffer.sample_rate()));
            if let Some(token) = &self.cancel_after_first {
                token.cancel();
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<ProgressEvent>>,
        completed: Mutex<Option<BatchOutcome>>,
        no_input: Mutex<bool>,
    }

    impl ProgressSink for RecordingSink {
        fn on_progress(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }

        fn on_complete(&self, outcome: &BatchOutcome) {
            *self.completed.lock().unwrap() = Some(outcome.clone());
        }

        fn on_no_input(&self, _input_dir: &Path) {
            *self.no_input.lock().unwrap() = true;
        }
    }

    fn dirs(files: &[(&str, &[u8])]) -> (TempDir, TempDir) {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(input.path().join(name), content).unwrap();
        }
        (input, output)
    }

    #[test]
    fn corrupt_file_does_not_abort_batch() {
        let (input, output) = dirs(&[("a.wav", b"ok"), ("b.wav", b"bad"), ("c.wav", b"ok")]);
        let job = BatchJob::new(FakeCodec::default(), Resampler::default());
        let sink = RecordingSink::default();
        let spec = ConversionJobSpec::new(input.path(), output.path(), ConversionMode::ToFlac);

        let outcome = job.run(spec, &sink).unwrap();

        assert_eq!(outcome.total, 3);
        assert_eq!(
            outcome.succeeded.iter().map(FileTask::file_name).collect::<Vec<_>>(),
            vec!["a.wav", "c.wav"]
        );
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0.file_name(), "b.wav");
        assert!(matches!(outcome.failed[0].1, FailureKind::Decode(_)));
        assert!(output.path().join("a.flac").exists());
        assert!(output.path().join("c.flac").exists());
        assert!(!output.path().join("b.flac").exists());
        assert_eq!(job.state(), JobState::Completed);
        assert_eq!(sink.completed.lock().unwrap().as_ref(), Some(&outcome));
    }

    #[test]
    fn events_are_pending_then_terminal_in_order() {
        let (input, output) = dirs(&[("b.wav", b"bad"), ("a.wav", b"ok")]);
        let job = BatchJob::new(FakeCodec::default(), Resampler::default());
        let sink = RecordingSink::default();
        job.run(ConversionJobSpec::new(input.path(), output.path(), ConversionMode::ToWav), &sink)
            .unwrap();

        let events = sink.events.lock().unwrap();
        let summary: Vec<(usize, String, bool)> = events
            .iter()
            .map(|e| (e.index, e.filename.clone(), e.is_terminal()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, "a.wav".to_string(), false),
                (1, "a.wav".to_string(), true),
                (2, "b.wav".to_string(), false),
                (2, "b.wav".to_string(), true),
            ]
        );
        assert_eq!(events[1].outcome, ProgressOutcome::Success);
        assert!(matches!(events[3].outcome, ProgressOutcome::Failure(FailureKind::Decode(_))));
    }

    #[test]
    fn resample_mode_resamples_before_encoding() {
        let (input, output) = dirs(&[("tone.wav", b"ok")]);
        let job = BatchJob::new(FakeCodec::default(), Resampler::default());
        let mode = ConversionMode::Resample { target_rate: 16000, tag_filename: true };
        let spec = ConversionJobSpec::new(input.path(), output.path(), mode);
        job.run(spec, &RecordingSink::default()).unwrap();

        let encoded = job.codec.encoded.lock().unwrap();
        assert_eq!(encoded.len(), 1);
        assert_eq!(encoded[0], (output.path().join("tone_16000Hz.wav"), OutputFormat::Wav, 16000));
    }

    #[test]
    fn empty_input_signals_no_input_instead_of_completion() {
        let (input, output) = dirs(&[("readme.txt", b"ok")]);
        let job = BatchJob::new(FakeCodec::default(), Resampler::default());
        let sink = RecordingSink::default();
        let outcome = job
            .run(ConversionJobSpec::new(input.path(), output.path(), ConversionMode::ToWav), &sink)
            .unwrap();

        assert_eq!(outcome, BatchOutcome::default());
        assert!(*sink.no_input.lock().unwrap());
        assert!(sink.completed.lock().unwrap().is_none());
        assert!(sink.events.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_input_directory_is_fatal() {
        let output = TempDir::new().unwrap();
        let missing = output.path().join("nope");
        let job = BatchJob::new(FakeCodec::default(), Resampler::default());
        let sink = RecordingSink::default();
        let err = job
            .run(ConversionJobSpec::new(&missing, output.path(), ConversionMode::ToWav), &sink)
            .unwrap_err();

        assert!(matches!(err, AudioError::NotFound(_)));
        assert!(sink.events.lock().unwrap().is_empty());
        assert_eq!(job.state(), JobState::Idle);
    }

    #[test]
    fn in_place_output_that_would_overwrite_source_fails_that_file() {
        let (input, _output) = dirs(&[("mix.wav", b"ok"), ("take.aif", b"ok")]);
        let job = BatchJob::new(FakeCodec::default(), Resampler::default());
        let spec = ConversionJobSpec::new(input.path(), input.path(), ConversionMode::ToWav);
        let outcome = job.run(spec, &RecordingSink::default()).unwrap();

        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0.file_name(), "mix.wav");
        assert!(matches!(outcome.failed[0].1, FailureKind::Encode(_)));
        assert_eq!(fs::read(input.path().join("mix.wav")).unwrap(), b"ok");
        assert_eq!(outcome.succeeded[0].file_name(), "take.aif");
    }

    #[test]
    fn cancellation_is_honoured_between_files() {
        let (input, output) = dirs(&[("a.wav", b"ok"), ("b.wav", b"ok"), ("c.wav", b"ok")]);
        let mut job = BatchJob::new(FakeCodec::default(), Resampler::default());
        job.codec.cancel_after_first = Some(job.cancellation_token());

        let sink = RecordingSink::default();
        let outcome = job
            .run(ConversionJobSpec::new(input.path(), output.path(), ConversionMode::ToFlac), &sink)
            .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.succeeded.len(), 1);
        assert_eq!(
            outcome.skipped.iter().map(FileTask::file_name).collect::<Vec<_>>(),
            vec!["b.wav", "c.wav"]
        );
        assert!(sink.completed.lock().unwrap().is_some());
        assert!(!output.path().join("b.flac").exists());
    }

    /// Blocks inside `decode` until the test releases it, so the test thread
    /// can act while a file is in flight.
    struct GatedCodec {
        started: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl CodecAdapter for GatedCodec {
        fn decode(&self, _path: &Path) -> Result<AudioBuffer> {
            let _ = self.started.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
            AudioBuffer::new(vec![0.0; 16], 1, 8000)
        }

        fn encode(&self, _buffer: AudioBuffer, path: &Path, _format: OutputFormat) -> Result<()> {
            fs::write(path, b"encoded")?;
            Ok(())
        }
    }

    #[test]
    fn handle_cancel_stops_worker_after_file_in_flight() {
        let (input, output) = dirs(&[("a.wav", b"ok"), ("b.wav", b"ok"), ("c.wav", b"ok")]);
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let codec = GatedCodec {
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
        };
        let job = BatchJob::new(codec, Resampler::default());
        let sink = Arc::new(RecordingSink::default());
        let spec = ConversionJobSpec::new(input.path(), output.path(), ConversionMode::ToWav);
        let handle = job.spawn(spec, sink.clone()).unwrap();

        started_rx.recv().unwrap();
        assert_eq!(handle.state(), JobState::Processing { index: 1, total: 3 });
        handle.cancel();
        release_tx.send(()).unwrap();

        while !handle.is_finished() {
            thread::yield_now();
        }
        assert_eq!(handle.state(), JobState::Completed);
        let outcome = handle.join().unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.succeeded.len(), 1);
        assert_eq!(outcome.succeeded[0].file_name(), "a.wav");
        assert_eq!(
            outcome.skipped.iter().map(FileTask::file_name).collect::<Vec<_>>(),
            vec!["b.wav", "c.wav"]
        );
        assert_eq!(sink.completed.lock().unwrap().as_ref(), Some(&outcome));

        let written: Vec<String> = fs::read_dir(output.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(written, vec!["a.wav"]);
    }

    #[test]
    fn second_source_with_same_output_name_fails() {
        let (input, output) = dirs(&[("take.wav", b"ok"), ("take.aif", b"ok")]);
        let job = BatchJob::new(FakeCodec::default(), Resampler::default());
        let spec = ConversionJobSpec::new(input.path(), output.path(), ConversionMode::ToFlac);
        let outcome = job.run(spec, &RecordingSink::default()).unwrap();

        assert_eq!(outcome.succeeded.len(), 1);
        assert_eq!(outcome.succeeded[0].file_name(), "take.aif");
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0.file_name(), "take.wav");
        assert!(matches!(outcome.failed[0].1, FailureKind::Encode(_)));
        assert_eq!(job.codec.encoded.lock().unwrap().len(), 1);
    }

    #[test]
    fn spawned_job_reports_over_channel() {
        let (input, output) = dirs(&[("a.wav", b"ok"), ("b.wav", b"bad")]);
        let (tx, rx) = mpsc::channel();
        let job = BatchJob::new(FakeCodec::default(), Resampler::default());
        let handle = job
            .spawn(
                ConversionJobSpec::new(input.path(), output.path(), ConversionMode::ToWav),
                Arc::new(ChannelSink::new(tx)),
            )
            .unwrap();

        let outcome = handle.join().unwrap();
        let messages: Vec<ProgressMessage> = rx.try_iter().collect();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages.last(), Some(&ProgressMessage::Complete(outcome.clone())));
        assert_eq!(outcome.processed(), 2);
        assert!(!outcome.is_clean());
    }
}
