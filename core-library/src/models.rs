//! Domain models for the sample library
//!
//! Plain row types with validation. Kits are keyed by their Rample name
//! (bank letter + number); samples are addressed by kit, voice and slot.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::path::Path;

/// Voices per kit on the Rample.
pub const VOICES_PER_KIT: i64 = 4;

/// Sample slots per voice.
pub const SLOTS_PER_VOICE: i64 = 12;

// =============================================================================
// Kit
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Kit {
    /// Rample kit name, e.g. `A0` or `Z99`
    pub name: String,
    pub bank_letter: String,
    pub alias: Option<String>,
    pub artist: Option<String>,
    pub editable: bool,
    pub locked: bool,
    /// Set whenever the kit's samples change; cleared by a successful sync.
    pub modified_since_sync: bool,
    pub bpm: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Kit {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let bank_letter = name
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase().to_string())
            .unwrap_or_default();
        let now = chrono::Utc::now().timestamp();
        Self {
            name,
            bank_letter,
            alias: None,
            artist: None,
            editable: true,
            locked: false,
            modified_since_sync: false,
            bpm: 120,
            created_at: now,
            updated_at: now,
        }
    }

    /// Name must be one bank letter followed by 0-99.
    pub fn validate(&self) -> Result<(), String> {
        if !is_valid_kit_name(&self.name) {
            return Err(format!(
                "Kit name '{}' must be a bank letter A-Z followed by 0-99",
                self.name
            ));
        }
        if !(30..=180).contains(&self.bpm) {
            return Err(format!("BPM {} out of range 30-180", self.bpm));
        }
        Ok(())
    }
}

pub fn is_valid_kit_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(bank) = chars.next() else {
        return false;
    };
    let number = chars.as_str();
    bank.is_ascii_uppercase()
        && (1..=2).contains(&number.len())
        && number.chars().all(|c| c.is_ascii_digit())
}

// =============================================================================
// Sample
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub id: i64,
    pub kit_name: String,
    /// 1-4
    pub voice_number: i64,
    /// 1-12
    pub slot_number: i64,
    pub filename: String,
    /// Absolute path of the file in the local store
    pub source_path: String,
    pub is_stereo: bool,
    pub wav_bit_depth: Option<i64>,
    pub wav_sample_rate: Option<i64>,
}

impl Sample {
    /// New sample reference; `id` is assigned on insert.
    pub fn new(
        kit_name: impl Into<String>,
        voice_number: i64,
        slot_number: i64,
        source_path: impl AsRef<Path>,
    ) -> Self {
        let source_path = source_path.as_ref();
        let filename = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            id: 0,
            kit_name: kit_name.into(),
            voice_number,
            slot_number,
            filename,
            source_path: source_path.to_string_lossy().into_owned(),
            is_stereo: false,
            wav_bit_depth: None,
            wav_sample_rate: None,
        }
    }

    pub fn with_stereo(mut self, is_stereo: bool) -> Self {
        self.is_stereo = is_stereo;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(1..=VOICES_PER_KIT).contains(&self.voice_number) {
            return Err(format!(
                "Voice number {} out of range 1-{}",
                self.voice_number, VOICES_PER_KIT
            ));
        }
        if !(1..=SLOTS_PER_VOICE).contains(&self.slot_number) {
            return Err(format!(
                "Slot number {} out of range 1-{}",
                self.slot_number, SLOTS_PER_VOICE
            ));
        }
        if self.source_path.trim().is_empty() {
            return Err("Sample source path cannot be empty".to_string());
        }
        if self.filename.trim().is_empty() {
            return Err("Sample filename cannot be empty".to_string());
        }
        Ok(())
    }
}
