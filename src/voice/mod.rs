//! Voice profile management.
//!
//! Profiles are rows in a SQLite table with a directory of audio files
//! each. The manager validates and normalizes uploads before anything is
//! recorded, and owns the processing-status lifecycle that gates synthesis.

mod manager;
mod store;
mod types;

pub use manager::{PROCESSED_FILENAME, VoiceManager};
pub use store::VoiceStore;
pub use types::{
    BackendData, NewVoice, ProcessingStatus, VoiceError, VoicePage, VoiceProfile, VoiceUpdate,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::fixtures::sine_wav;
    use crate::audio::{AudioError, AudioLimits};
    use serde_json::json;
    use tempfile::TempDir;

    fn manager(temp_dir: &TempDir) -> VoiceManager {
        VoiceManager::new(
            VoiceStore::open_in_memory().unwrap(),
            temp_dir.path().join("voices"),
            AudioLimits::default(),
            24000,
        )
    }

    fn create_voice(manager: &VoiceManager, name: &str) -> VoiceProfile {
        manager
            .create(NewVoice::new(name), &sine_wav(4.0, 24000, 1, 0.5), "sample.wav")
            .unwrap()
    }

    // ===========================================
    // ProcessingStatus tests
    // ===========================================

    #[test]
    fn test_status_transitions() {
        use ProcessingStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Ready));
        assert!(Processing.can_transition_to(Failed));
        assert!(Ready.can_transition_to(Ready));

        assert!(!Pending.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Processing));
    }

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!("ready".parse::<ProcessingStatus>().unwrap(), ProcessingStatus::Ready);
        assert_eq!(ProcessingStatus::Failed.to_string(), "failed");
        assert!("done".parse::<ProcessingStatus>().is_err());
    }

    // ===========================================
    // VoiceManager create tests
    // ===========================================

    #[test]
    fn test_create_voice_writes_files_and_record() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);

        let profile = manager
            .create(
                NewVoice::new("Narrator")
                    .description("calm")
                    .language("hi")
                    .tags(vec!["warm".to_string()]),
                &sine_wav(5.0, 24000, 2, 0.3),
                "Narrator.WAV",
            )
            .unwrap();

        let dir = manager.storage_dir().join(profile.id.to_string());
        assert!(dir.join("original.wav").exists());
        assert!(dir.join(PROCESSED_FILENAME).exists());

        assert_eq!(profile.processing_status, ProcessingStatus::Pending);
        assert_eq!(profile.original_format, "wav");
        assert_eq!(profile.original_filename, "Narrator.WAV");
        assert_eq!(profile.sample_rate, 24000);
        assert_eq!(profile.language, "hi");
        assert!(profile.is_active);
        assert_eq!(
            profile.chatterbox_data,
            Some(json!({ "audio_path": profile.processed_audio_path.to_string_lossy() }))
        );

        let loaded = manager.get(&profile.id.to_string()).unwrap();
        assert_eq!(loaded.name, "Narrator");
        assert_eq!(loaded.tags, vec!["warm"]);
        assert_eq!(loaded.description.as_deref(), Some("calm"));
    }

    #[test]
    fn test_create_rejects_short_audio_without_leaving_files() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);

        let err = manager
            .create(NewVoice::new("short"), &sine_wav(1.0, 24000, 1, 0.5), "s.wav")
            .unwrap_err();

        assert!(matches!(err, VoiceError::Audio(AudioError::TooShort { .. })));
        let leftovers = std::fs::read_dir(manager.storage_dir())
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftovers, 0);
        assert_eq!(manager.list(1, 20, false).unwrap().total, 0);
    }

    #[test]
    fn test_create_rejects_unsupported_format() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);

        let err = manager
            .create(NewVoice::new("x"), &sine_wav(4.0, 24000, 1, 0.5), "x.aiff")
            .unwrap_err();
        assert!(matches!(
            err,
            VoiceError::Audio(AudioError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_create_rejects_empty_name() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);

        let err = manager
            .create(NewVoice::new("  "), &sine_wav(4.0, 24000, 1, 0.5), "x.wav")
            .unwrap_err();
        assert!(matches!(err, VoiceError::Invalid(_)));
    }

    // ===========================================
    // VoiceManager read/list tests
    // ===========================================

    #[test]
    fn test_get_unknown_and_malformed_ids() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);

        assert!(matches!(
            manager.get(&uuid::Uuid::new_v4().to_string()),
            Err(VoiceError::NotFound(_))
        ));
        assert!(matches!(manager.get("not-a-uuid"), Err(VoiceError::NotFound(_))));
    }

    #[test]
    fn test_list_pagination_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);

        for name in ["first", "second", "third"] {
            create_voice(&manager, name);
        }

        let page = manager.list(1, 2, true).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages(), 2);
        let names: Vec<&str> = page.items.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["third", "second"]);

        let page = manager.list(2, 2, true).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "first");
    }

    #[test]
    fn test_list_clamps_paging() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);

        let page = manager.list(0, 0, true).unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 20);
        assert_eq!(page.total_pages(), 1);

        let page = manager.list(-3, 500, true).unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 100);
    }

    #[test]
    fn test_list_active_only_filter() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);

        let hidden = create_voice(&manager, "hidden");
        create_voice(&manager, "shown");
        manager
            .update(
                &hidden.id.to_string(),
                VoiceUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(manager.list(1, 20, true).unwrap().total, 1);
        assert_eq!(manager.list(1, 20, false).unwrap().total, 2);
    }

    // ===========================================
    // VoiceManager update/delete tests
    // ===========================================

    #[test]
    fn test_update_merges_only_given_fields() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);
        let profile = create_voice(&manager, "original");

        let updated = manager
            .update(
                &profile.id.to_string(),
                VoiceUpdate {
                    description: Some("new description".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.name, "original");
        assert_eq!(updated.description.as_deref(), Some("new description"));
        assert_eq!(updated.created_at, profile.created_at);
        assert!(updated.updated_at >= profile.updated_at);
    }

    #[test]
    fn test_update_rejects_invalid_fields() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);
        let profile = create_voice(&manager, "voice");

        let err = manager
            .update(
                &profile.id.to_string(),
                VoiceUpdate {
                    name: Some("x".repeat(256)),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, VoiceError::Invalid(_)));

        let err = manager
            .update(
                &profile.id.to_string(),
                VoiceUpdate {
                    language: Some("far-too-long".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, VoiceError::Invalid(_)));
    }

    #[test]
    fn test_delete_removes_record_and_files() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);
        let profile = create_voice(&manager, "doomed");
        let id = profile.id.to_string();
        let dir = manager.storage_dir().join(&id);
        assert!(dir.exists());

        manager.delete(&id).unwrap();

        assert!(!dir.exists());
        assert!(matches!(manager.get(&id), Err(VoiceError::NotFound(_))));
        assert!(matches!(manager.delete(&id), Err(VoiceError::NotFound(_))));
    }

    // ===========================================
    // Processing status tests
    // ===========================================

    #[test]
    fn test_processing_status_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);
        let id = create_voice(&manager, "voice").id.to_string();

        manager
            .update_processing_status(&id, ProcessingStatus::Processing, None, BackendData::default())
            .unwrap();
        let ready = manager
            .update_processing_status(
                &id,
                ProcessingStatus::Ready,
                None,
                BackendData {
                    xtts: Some(json!({ "embedding": [0.1, 0.2] })),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(ready.is_ready());
        assert_eq!(ready.xtts_data, Some(json!({ "embedding": [0.1, 0.2] })));
        // Untouched blobs survive
        assert!(ready.chatterbox_data.is_some());

        let reloaded = manager.get(&id).unwrap();
        assert_eq!(reloaded.processing_status, ProcessingStatus::Ready);
        assert_eq!(reloaded.xtts_data, ready.xtts_data);
    }

    #[test]
    fn test_processing_status_rejects_skipping_states() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);
        let id = create_voice(&manager, "voice").id.to_string();

        let err = manager
            .update_processing_status(&id, ProcessingStatus::Ready, None, BackendData::default())
            .unwrap_err();
        assert!(matches!(
            err,
            VoiceError::InvalidTransition {
                from: ProcessingStatus::Pending,
                to: ProcessingStatus::Ready
            }
        ));
        assert_eq!(
            manager.get(&id).unwrap().processing_status,
            ProcessingStatus::Pending
        );
    }

    #[test]
    fn test_processing_status_failed_records_error() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);
        let id = create_voice(&manager, "voice").id.to_string();

        manager
            .update_processing_status(&id, ProcessingStatus::Processing, None, BackendData::default())
            .unwrap();
        let failed = manager
            .update_processing_status(
                &id,
                ProcessingStatus::Failed,
                Some("embedding extraction failed".to_string()),
                BackendData::default(),
            )
            .unwrap();

        assert_eq!(
            failed.processing_error.as_deref(),
            Some("embedding extraction failed")
        );
    }

    #[test]
    fn test_ready_requires_processed_audio() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);
        let profile = create_voice(&manager, "voice");
        let id = profile.id.to_string();

        manager
            .update_processing_status(&id, ProcessingStatus::Processing, None, BackendData::default())
            .unwrap();
        std::fs::remove_file(&profile.processed_audio_path).unwrap();

        let err = manager
            .update_processing_status(&id, ProcessingStatus::Ready, None, BackendData::default())
            .unwrap_err();
        assert!(matches!(err, VoiceError::AudioNotFound(_)));
        assert!(matches!(manager.audio_path(&id), Err(VoiceError::AudioNotFound(_))));
    }

    #[test]
    fn test_audio_path_points_at_processed_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);
        let profile = create_voice(&manager, "voice");

        let path = manager.audio_path(&profile.id.to_string()).unwrap();
        assert!(path.ends_with(PROCESSED_FILENAME));
        assert!(path.exists());
    }

    // ===========================================
    // VoiceStore tests
    // ===========================================

    #[test]
    fn test_store_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("voices.db");

        let id = {
            let manager = VoiceManager::new(
                VoiceStore::open(&db_path).unwrap(),
                temp_dir.path().join("voices"),
                AudioLimits::default(),
                24000,
            );
            create_voice(&manager, "durable").id
        };

        let store = VoiceStore::open(&db_path).unwrap();
        let profile = store.get(&id).unwrap().unwrap();
        assert_eq!(profile.name, "durable");
        store.ping().unwrap();
    }

    #[test]
    fn test_store_modify_failure_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir);
        let profile = create_voice(&manager, "voice");

        let store = VoiceStore::open_in_memory().unwrap();
        store.insert(&profile).unwrap();
        let result = store.modify(&profile.id, |p| {
            p.name = "changed".to_string();
            Err(VoiceError::Invalid("nope".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(store.get(&profile.id).unwrap().unwrap().name, "voice");
    }
}
