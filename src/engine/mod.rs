//! TTS Engine orchestrator.
//!
//! This module provides the main engine that coordinates between the
//! VoiceManager and the synthesis client: it checks that a voice is ready,
//! resolves its reference audio, and dispatches to the requested model.

mod tts;

pub use tts::{PreparedVoice, SpeechOutput, SpeechRequest, TTSEngine, TTSError};


#[cfg(test)]
mod tests {
    use super::test_support::{voice_manager, voice_with_status};
    use super::*;
    use crate::backend::{BackendError, InferenceResponse, MockBackend, StreamItem};
    use crate::cli::TtsModel;
    use crate::voice::ProcessingStatus;
    use futures::StreamExt;
    use tempfile::TempDir;

    fn audio_response() -> InferenceResponse {
        InferenceResponse {
            audio_base64: Some("UklGRg==".to_string()),
            sample_rate: Some(24000),
            duration_seconds: Some(2.0),
            processing_time_ms: Some(900.0),
            ..Default::default()
        }
    }

    // ===========================================
    // TTSEngine prepare tests
    // ===========================================

    #[test]
    fn test_prepare_unknown_voice() {
        let temp_dir = TempDir::new().unwrap();
        let engine = TTSEngine::new(MockBackend::new(), voice_manager(&temp_dir));

        let result = engine.prepare(&uuid::Uuid::new_v4().to_string(), TtsModel::Svara);
        assert!(matches!(result, Err(TTSError::VoiceNotFound(_))));
    }

    #[test]
    fn test_prepare_pending_voice_not_ready() {
        let temp_dir = TempDir::new().unwrap();
        let manager = voice_manager(&temp_dir);
        let id = voice_with_status(&manager, ProcessingStatus::Pending);
        let engine = TTSEngine::new(MockBackend::new(), manager);

        let err = engine.prepare(&id, TtsModel::Xtts).unwrap_err();
        assert!(matches!(
            err,
            TTSError::VoiceNotReady(ProcessingStatus::Pending)
        ));
        assert_eq!(
            err.to_string(),
            "Voice is not ready for synthesis. Status: pending"
        );
    }

    #[test]
    fn test_prepare_resolves_reference_for_cloning_models() {
        let temp_dir = TempDir::new().unwrap();
        let manager = voice_manager(&temp_dir);
        let id = voice_with_status(&manager, ProcessingStatus::Ready);
        let engine = TTSEngine::new(MockBackend::new(), manager);

        for model in [TtsModel::Svara, TtsModel::Xtts, TtsModel::Chatterbox] {
            let prepared = engine.prepare(&id, model).unwrap();
            assert!(prepared.reference_audio.unwrap().exists());
        }

        let prepared = engine.prepare(&id, TtsModel::Orpheus).unwrap();
        assert!(prepared.reference_audio.is_none());
    }

    #[test]
    fn test_prepare_missing_reference_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = voice_manager(&temp_dir);
        let id = voice_with_status(&manager, ProcessingStatus::Ready);
        let path = manager.audio_path(&id).unwrap();
        std::fs::remove_file(path).unwrap();
        let engine = TTSEngine::new(MockBackend::new(), manager);

        assert!(matches!(
            engine.prepare(&id, TtsModel::Chatterbox),
            Err(TTSError::AudioPath(_))
        ));
        // Preset voices never touch the file
        assert!(engine.prepare(&id, TtsModel::Orpheus).is_ok());
    }

    // ===========================================
    // TTSEngine synthesize tests
    // ===========================================

    #[tokio::test]
    async fn test_synthesize_ready_voice() {
        let temp_dir = TempDir::new().unwrap();
        let manager = voice_manager(&temp_dir);
        let id = voice_with_status(&manager, ProcessingStatus::Ready);

        let mut mock_backend = MockBackend::new();
        mock_backend
            .expect_synthesize()
            .withf(|req| {
                req.model == TtsModel::Xtts
                    && req.language.as_deref() == Some("en")
                    && req.audio_prompt_base64.is_some()
            })
            .times(1)
            .returning(|_| Ok(audio_response()));

        let engine = TTSEngine::new(mock_backend, manager);
        let mut request = SpeechRequest::new("Hello there", id, TtsModel::Xtts);
        request.language = "en".to_string();

        let output = engine.synthesize(&request).await.unwrap();
        assert_eq!(output.result.model, "xtts");
        assert_eq!(output.result.duration_seconds, 2.0);
        assert!(output.processing_time_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_synthesize_not_ready_never_calls_backend() {
        let temp_dir = TempDir::new().unwrap();
        let manager = voice_manager(&temp_dir);
        let id = voice_with_status(&manager, ProcessingStatus::Processing);

        let mut mock_backend = MockBackend::new();
        mock_backend.expect_synthesize().never();

        let engine = TTSEngine::new(mock_backend, manager);
        let result = engine
            .synthesize(&SpeechRequest::new("Hello", id, TtsModel::Svara))
            .await;

        assert!(matches!(
            result,
            Err(TTSError::VoiceNotReady(ProcessingStatus::Processing))
        ));
    }

    #[tokio::test]
    async fn test_synthesize_backend_failure() {
        let temp_dir = TempDir::new().unwrap();
        let manager = voice_manager(&temp_dir);
        let id = voice_with_status(&manager, ProcessingStatus::Ready);

        let mut mock_backend = MockBackend::new();
        mock_backend
            .expect_synthesize()
            .times(1)
            .returning(|_| Err(BackendError::ConnectionFailed("Connection refused".to_string())));

        let engine = TTSEngine::new(mock_backend, manager);
        let err = engine
            .synthesize(&SpeechRequest::new("Hello", id, TtsModel::Svara))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TTSError::BackendError(BackendError::ConnectionFailed(_))
        ));
        assert!(err.to_string().starts_with("TTS service error:"));
    }

    #[tokio::test]
    async fn test_synthesize_forwards_orpheus_voice() {
        let temp_dir = TempDir::new().unwrap();
        let manager = voice_manager(&temp_dir);
        let id = voice_with_status(&manager, ProcessingStatus::Ready);

        let mut mock_backend = MockBackend::new();
        mock_backend
            .expect_synthesize()
            .withf(|req| req.voice.as_deref() == Some("leo") && req.emotion.as_deref() == Some("sad"))
            .times(1)
            .returning(|_| Ok(audio_response()));

        let engine = TTSEngine::new(mock_backend, manager);
        let mut request = SpeechRequest::new("Hello", id, TtsModel::Orpheus);
        request.voice = Some("leo".to_string());
        request.emotion = Some("sad".to_string());

        let output = engine.synthesize(&request).await.unwrap();
        assert_eq!(output.result.language, "en");
    }

    // ===========================================
    // TTSEngine stream tests
    // ===========================================

    #[tokio::test]
    async fn test_stream_prepared_voice() {
        let temp_dir = TempDir::new().unwrap();
        let manager = voice_manager(&temp_dir);
        let id = voice_with_status(&manager, ProcessingStatus::Ready);

        let mut mock_backend = MockBackend::new();
        mock_backend
            .expect_synthesize()
            .times(1)
            .returning(|_| Ok(audio_response()));

        let engine = TTSEngine::new(mock_backend, manager);
        let request = SpeechRequest::new("Hello", id.clone(), TtsModel::Svara);
        let prepared = engine.prepare(&id, request.model).unwrap();

        let items: Vec<_> = engine.stream(&request, &prepared).collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Ok(StreamItem::Chunk { .. })));
        assert!(matches!(
            items[1],
            Ok(StreamItem::Final { total_chunks: 1, .. })
        ));
    }

    #[test]
    fn test_models_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let engine = TTSEngine::new(MockBackend::new(), voice_manager(&temp_dir));

        let ids: Vec<TtsModel> = engine.models().iter().map(|m| m.id).collect();
        assert_eq!(ids, TtsModel::ALL.to_vec());
    }
}
