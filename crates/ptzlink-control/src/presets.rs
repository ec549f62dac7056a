use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use ptzlink_core::{PresetSlot, UI_PRESET_SLOTS};
use serde::Serialize;

#[derive(Debug, Clone)]
struct SavedPreset {
    command: String,
    saved_at_ms: u64,
}

/// One row of the preset table as reported by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresetRecord {
    pub slot: u8,
    pub occupied: bool,
    /// Hex of the save command that filled the slot.
    pub command: Option<String>,
    pub saved_at_ms: Option<u64>,
}

/// Which UI preset slots have been saved during this run.
///
/// The camera keeps the actual positions; this only remembers that a save
/// happened. Recall never changes it.
#[derive(Debug)]
pub struct PresetStore {
    slots: Mutex<Vec<Option<SavedPreset>>>,
}

impl Default for PresetStore {
    fn default() -> Self {
        Self { slots: Mutex::new(vec![None; UI_PRESET_SLOTS as usize]) }
    }
}

impl PresetStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Option<SavedPreset>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mark_occupied(&self, slot: PresetSlot, command: impl Into<String>) {
        let saved_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let mut slots = self.lock();
        if let Some(entry) = slots.get_mut(usize::from(slot.index() - 1)) {
            *entry = Some(SavedPreset { command: command.into(), saved_at_ms });
        }
    }

    pub fn is_occupied(&self, slot: PresetSlot) -> bool {
        self.lock()
            .get(usize::from(slot.index() - 1))
            .map_or(false, Option::is_some)
    }

    pub fn snapshot(&self) -> Vec<PresetRecord> {
        self.lock()
            .iter()
            .enumerate()
            .map(|(i, saved)| PresetRecord {
                slot: i as u8 + 1,
                occupied: saved.is_some(),
                command: saved.as_ref().map(|s| s.command.clone()),
                saved_at_ms: saved.as_ref().map(|s| s.saved_at_ms),
            })
            .collect()
    }
}
