//! Transcription pipeline and media action tests

mod helpers;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use avt_common::events::{EventBus, PipelineEvent, PipelinePhase};
use avt_web::error::{ApiError, ProcessingError, ValidationError};
use avt_web::models::{CaptionStyle, Container, Task, Transcript, TranscriptionOptions, UploadedMedia};
use avt_web::services::{MediaActions, MediaStore, TranscriptionPipeline};
use helpers::{FakeNormalizer, FakeRenderer, FakeTranscriber};
use tokio::sync::broadcast::Receiver;

fn stored_media(store: &MediaStore, id_char: char) -> UploadedMedia {
    let id: String = std::iter::repeat(id_char).take(64).collect();
    let dir = store.media_dir(&id).unwrap();
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("input.mp4");
    std::fs::write(&path, b"video").unwrap();
    UploadedMedia {
        id,
        path,
        size_bytes: 5,
        declared_type: Some("video/mp4".to_string()),
        filename: "clip.mp4".to_string(),
        container: Container::Mp4,
    }
}

fn drain(rx: &mut Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn phases(events: &[PipelineEvent]) -> Vec<PipelinePhase> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::PhaseStarted { phase, .. } => Some(*phase),
            _ => None,
        })
        .collect()
}

struct Fixture {
    _dir: tempfile::TempDir,
    store: MediaStore,
    bus: EventBus,
    normalizer: Arc<FakeNormalizer>,
    transcriber: Arc<FakeTranscriber>,
}

impl Fixture {
    fn new(normalizer: FakeNormalizer, transcriber: FakeTranscriber) -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self {
            store: MediaStore::new(dir.path().to_path_buf()),
            _dir: dir,
            bus: EventBus::new(64),
            normalizer: Arc::new(normalizer),
            transcriber: Arc::new(transcriber),
        }
    }

    fn pipeline(&self) -> TranscriptionPipeline {
        TranscriptionPipeline::new(
            self.normalizer.clone(),
            self.transcriber.clone(),
            self.store.clone(),
            self.bus.clone(),
            "whisper-1".to_string(),
        )
    }
}

#[tokio::test]
async fn test_pipeline_runs_phases_in_order() {
    let fixture = Fixture::new(FakeNormalizer::new(3.0), FakeTranscriber::new());
    let media = stored_media(&fixture.store, 'a');
    let mut rx = fixture.bus.subscribe();

    let outcome = fixture
        .pipeline()
        .transcribe(&media, TranscriptionOptions::default())
        .await
        .unwrap();

    assert!(!outcome.cached);
    assert_eq!(outcome.transcript.media_id, media.id);
    assert_eq!(outcome.transcript.segments.len(), 2);
    assert_eq!(outcome.transcript.duration_secs, 3.0);
    assert_eq!(outcome.transcript.options.model.as_deref(), Some("whisper-1"));

    let events = drain(&mut rx);
    assert_eq!(
        phases(&events),
        vec![
            PipelinePhase::Normalizing,
            PipelinePhase::Transcribing,
            PipelinePhase::Formatting
        ]
    );
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::JobCompleted { cached: false, .. })
    ));
}

#[tokio::test]
async fn test_pipeline_cache_hit_skips_backends() {
    let fixture = Fixture::new(FakeNormalizer::new(3.0), FakeTranscriber::new());
    let media = stored_media(&fixture.store, 'b');
    let pipeline = fixture.pipeline();

    let first = pipeline
        .transcribe(&media, TranscriptionOptions::default())
        .await
        .unwrap();

    let mut rx = fixture.bus.subscribe();
    let second = pipeline
        .transcribe(&media, TranscriptionOptions::default())
        .await
        .unwrap();

    assert!(second.cached);
    assert_eq!(first.transcript, second.transcript);
    assert_eq!(fixture.normalizer.calls(), 1);
    assert_eq!(fixture.transcriber.calls(), 1);

    let events = drain(&mut rx);
    assert!(phases(&events).is_empty());
    assert!(matches!(
        events.as_slice(),
        [PipelineEvent::JobCompleted { cached: true, .. }]
    ));
}

#[tokio::test]
async fn test_explicit_default_model_shares_cache_entry() {
    let fixture = Fixture::new(FakeNormalizer::new(3.0), FakeTranscriber::new());
    let media = stored_media(&fixture.store, 'c');
    let pipeline = fixture.pipeline();

    pipeline
        .transcribe(&media, TranscriptionOptions::default())
        .await
        .unwrap();
    let explicit = TranscriptionOptions::parse(None, Some("transcribe"), Some("whisper-1")).unwrap();
    let outcome = pipeline.transcribe(&media, explicit).await.unwrap();

    assert!(outcome.cached);
    assert_eq!(fixture.transcriber.calls(), 1);
}

#[tokio::test]
async fn test_normalization_failure_stops_pipeline() {
    let fixture = Fixture::new(FakeNormalizer::failing(), FakeTranscriber::new());
    let media = stored_media(&fixture.store, 'd');
    let mut rx = fixture.bus.subscribe();

    let err = fixture
        .pipeline()
        .transcribe(&media, TranscriptionOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ApiError::Processing(ProcessingError::MediaTool { .. })
    ));
    assert_eq!(fixture.transcriber.calls(), 0);

    let events = drain(&mut rx);
    assert_eq!(phases(&events), vec![PipelinePhase::Normalizing]);
    assert!(matches!(events.last(), Some(PipelineEvent::JobFailed { .. })));

    // Nothing cached for a failed job
    let transcript_id = TranscriptionOptions::default()
        .with_default_model("whisper-1")
        .transcript_id(&media.id);
    assert!(fixture.store.load_transcript(&transcript_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_translate_options_reach_transcriber() {
    let fixture = Fixture::new(FakeNormalizer::new(1.0), FakeTranscriber::new());
    let media = stored_media(&fixture.store, 'e');
    let options = TranscriptionOptions::parse(Some("French"), Some("translate"), None).unwrap();

    fixture.pipeline().transcribe(&media, options).await.unwrap();

    let sent = fixture.transcriber.last_options.lock().unwrap().clone().unwrap();
    assert_eq!(sent.task, Task::Translate);
    assert_eq!(sent.language.as_deref(), Some("fr"));
}

#[tokio::test]
async fn test_burn_rejects_foreign_transcript() {
    let fixture = Fixture::new(FakeNormalizer::new(3.0), FakeTranscriber::new());
    let media = stored_media(&fixture.store, 'a');
    let other = stored_media(&fixture.store, 'b');
    let transcript = fixture
        .pipeline()
        .transcribe(&other, TranscriptionOptions::default())
        .await
        .unwrap()
        .transcript;

    let renderer = Arc::new(FakeRenderer::new());
    let actions = MediaActions::new(renderer.clone(), fixture.store.clone(), fixture.bus.clone());
    let err = actions
        .burn_captions(&media, &transcript, &CaptionStyle::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ApiError::Validation(ValidationError::InvalidRequest(_))
    ));
    assert_eq!(renderer.burn_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_burn_caches_per_style() {
    let fixture = Fixture::new(FakeNormalizer::new(3.0), FakeTranscriber::new());
    let media = stored_media(&fixture.store, 'f');
    let transcript: Transcript = fixture
        .pipeline()
        .transcribe(&media, TranscriptionOptions::default())
        .await
        .unwrap()
        .transcript;

    let renderer = Arc::new(FakeRenderer::new());
    let actions = MediaActions::new(renderer.clone(), fixture.store.clone(), fixture.bus.clone());

    let default_style = CaptionStyle::default();
    let large = CaptionStyle {
        font_size: 48,
        ..Default::default()
    };

    let first = actions.burn_captions(&media, &transcript, &default_style).await.unwrap();
    let repeat = actions.burn_captions(&media, &transcript, &default_style).await.unwrap();
    let other = actions.burn_captions(&media, &transcript, &large).await.unwrap();

    assert!(!first.cached);
    assert!(repeat.cached);
    assert_eq!(first.path, repeat.path);
    assert!(!other.cached);
    assert_ne!(first.path, other.path);
    assert_eq!(renderer.burn_calls.load(Ordering::SeqCst), 2);
    assert!(first.path.exists());
}
