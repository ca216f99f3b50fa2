//! Voice manager: validation, storage directories and the profile store.

use std::path::{Path, PathBuf};

use chrono::{SubsecRound, Utc};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::store::VoiceStore;
use super::types::{
    BackendData, NewVoice, ProcessingStatus, VoiceError, VoicePage, VoiceProfile, VoiceUpdate,
};
use crate::audio::{self, AudioLimits};

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

/// Name of the normalized reference file inside a voice directory.
pub const PROCESSED_FILENAME: &str = "processed.wav";

/// Manages voice profiles and the files that back them.
///
/// Each profile owns `<storage_dir>/<id>/`, holding `original.<ext>` as
/// uploaded and the normalized `processed.wav`.
pub struct VoiceManager {
    store: VoiceStore,
    storage_dir: PathBuf,
    limits: AudioLimits,
    sample_rate: u32,
}

impl VoiceManager {
    pub fn new(
        store: VoiceStore,
        storage_dir: PathBuf,
        limits: AudioLimits,
        sample_rate: u32,
    ) -> Self {
        Self {
            store,
            storage_dir,
            limits,
            sample_rate,
        }
    }

    /// Get the storage directory path.
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn voice_dir(&self, id: &Uuid) -> PathBuf {
        self.storage_dir.join(id.to_string())
    }

    /// Identifiers that are not UUIDs cannot name a stored voice.
    fn parse_id(id: &str) -> Result<Uuid, VoiceError> {
        Uuid::parse_str(id).map_err(|_| VoiceError::NotFound(id.to_string()))
    }

    /// Clone a new voice from an uploaded sample.
    ///
    /// The sample is validated, stored as uploaded, normalized and recorded
    /// with status `pending`. If any step after the directory is created
    /// fails, the directory is removed again.
    pub fn create(
        &self,
        voice: NewVoice,
        content: &[u8],
        filename: &str,
    ) -> Result<VoiceProfile, VoiceError> {
        voice.validate()?;
        audio::validate_audio(content, filename, &self.limits)?;

        let id = Uuid::new_v4();
        let dir = self.voice_dir(&id);
        std::fs::create_dir_all(&dir)?;

        match self.store_new_voice(id, &dir, voice, content, filename) {
            Ok(profile) => {
                info!(
                    voice_id = %profile.id,
                    name = %profile.name,
                    duration = profile.duration_seconds,
                    "Voice profile created"
                );
                Ok(profile)
            }
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_dir_all(&dir) {
                    warn!(voice_id = %id, error = %cleanup, "Failed to clean up voice directory");
                }
                warn!(voice_id = %id, error = %e, "Voice creation failed");
                Err(e)
            }
        }
    }

    fn store_new_voice(
        &self,
        id: Uuid,
        dir: &Path,
        voice: NewVoice,
        content: &[u8],
        filename: &str,
    ) -> Result<VoiceProfile, VoiceError> {
        let extension = audio::file_extension(filename);
        let original_path = dir.join(format!("original.{extension}"));
        std::fs::write(&original_path, content)?;

        let processed_path = dir.join(PROCESSED_FILENAME);
        let info = audio::normalize_audio(&original_path, &processed_path, self.sample_rate, 1)?;

        // Stored timestamps carry microseconds
        let now = Utc::now().trunc_subsecs(6);
        let profile = VoiceProfile {
            id,
            name: voice.name,
            description: voice.description,
            original_filename: filename.to_string(),
            original_format: extension,
            duration_seconds: info.duration_seconds,
            sample_rate: info.sample_rate,
            chatterbox_data: Some(json!({ "audio_path": processed_path.to_string_lossy() })),
            processed_audio_path: processed_path,
            orpheus_data: None,
            xtts_data: None,
            svara_data: None,
            language: voice.language,
            tags: voice.tags,
            is_active: true,
            processing_status: ProcessingStatus::Pending,
            processing_error: None,
            created_at: now,
            updated_at: now,
        };

        self.store.insert(&profile)?;
        Ok(profile)
    }

    pub fn get(&self, id: &str) -> Result<VoiceProfile, VoiceError> {
        let uuid = Self::parse_id(id)?;
        self.store
            .get(&uuid)?
            .ok_or_else(|| VoiceError::NotFound(id.to_string()))
    }

    /// List profiles newest first.
    ///
    /// Out-of-range paging is clamped: `page < 1` becomes 1, `page_size < 1`
    /// becomes 20 and anything above 100 becomes 100.
    pub fn list(
        &self,
        page: i64,
        page_size: i64,
        active_only: bool,
    ) -> Result<VoicePage, VoiceError> {
        let page = page.clamp(1, u32::MAX as i64) as u32;
        let page_size = match page_size {
            n if n < 1 => DEFAULT_PAGE_SIZE,
            n if n > MAX_PAGE_SIZE as i64 => MAX_PAGE_SIZE,
            n => n as u32,
        };

        let offset = (page as u64 - 1) * page_size as u64;
        let (items, total) = self.store.list(offset, page_size, active_only)?;

        Ok(VoicePage {
            items,
            total,
            page,
            page_size,
        })
    }

    pub fn update(&self, id: &str, update: VoiceUpdate) -> Result<VoiceProfile, VoiceError> {
        let uuid = Self::parse_id(id)?;
        update.validate()?;

        let profile = self.store.modify(&uuid, |profile| {
            update.apply(profile);
            Ok(())
        })?;
        info!(voice_id = %uuid, "Voice profile updated");
        Ok(profile)
    }

    /// Delete a profile along with every file in its directory.
    pub fn delete(&self, id: &str) -> Result<(), VoiceError> {
        let uuid = Self::parse_id(id)?;
        if self.store.get(&uuid)?.is_none() {
            return Err(VoiceError::NotFound(id.to_string()));
        }

        let dir = self.voice_dir(&uuid);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }

        if !self.store.delete(&uuid)? {
            return Err(VoiceError::NotFound(id.to_string()));
        }

        info!(voice_id = %uuid, "Voice profile deleted");
        Ok(())
    }

    /// Move a profile through its processing lifecycle.
    ///
    /// Backend blobs that are `None` keep their stored value. Concurrent
    /// callers are not serialized beyond the store transaction; the last
    /// write wins.
    pub fn update_processing_status(
        &self,
        id: &str,
        status: ProcessingStatus,
        error: Option<String>,
        backend_data: BackendData,
    ) -> Result<VoiceProfile, VoiceError> {
        let uuid = Self::parse_id(id)?;

        let profile = self.store.modify(&uuid, |profile| {
            let current = profile.processing_status;
            if !current.can_transition_to(status) {
                return Err(VoiceError::InvalidTransition {
                    from: current,
                    to: status,
                });
            }
            if status == ProcessingStatus::Ready && !profile.processed_audio_path.exists() {
                return Err(VoiceError::AudioNotFound(
                    profile.processed_audio_path.display().to_string(),
                ));
            }

            profile.processing_status = status;
            profile.processing_error = error;
            backend_data.apply(profile);
            Ok(())
        })?;

        info!(voice_id = %uuid, status = %status, "Voice processing status updated");
        Ok(profile)
    }

    /// Path of the normalized reference audio, which must still exist.
    pub fn audio_path(&self, id: &str) -> Result<PathBuf, VoiceError> {
        let profile = self.get(id)?;
        Self::existing_audio_path(&profile)
    }

    pub(crate) fn existing_audio_path(profile: &VoiceProfile) -> Result<PathBuf, VoiceError> {
        if !profile.processed_audio_path.exists() {
            return Err(VoiceError::AudioNotFound(
                profile.processed_audio_path.display().to_string(),
            ));
        }
        Ok(profile.processed_audio_path.clone())
    }

    pub fn ping(&self) -> Result<(), VoiceError> {
        self.store.ping()
    }
}
