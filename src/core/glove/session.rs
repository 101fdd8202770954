//! Therapy session records

use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::glove::patterns::VibrationPattern;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TherapySession {
    pub id: String,
    pub start_time: DateTime<Local>,
    pub end_time: Option<DateTime<Local>>,
    pub pattern_used: Option<VibrationPattern>,
    pub pattern_id: Option<String>,
    pub device_id: Option<String>,
    pub is_completed: bool,
    pub notes: Option<String>,
    /// Subjective rating, 1-5
    pub effectiveness_rating: Option<u8>,
}

impl TherapySession {
    /// Opens a session now for the given pattern and device
    pub fn begin(pattern: &VibrationPattern, device_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            start_time: Local::now(),
            end_time: None,
            pattern_used: Some(pattern.clone()),
            pattern_id: Some(pattern.id.clone()),
            device_id,
            is_completed: false,
            notes: None,
            effectiveness_rating: None,
        }
    }

    pub fn complete(&mut self) {
        self.end_time = Some(Local::now());
        self.is_completed = true;
    }

    pub fn rate(&mut self, rating: u8) {
        self.effectiveness_rating = Some(rating.clamp(1, 5));
    }

    /// Elapsed time; still counting while the session is open
    pub fn duration(&self) -> Duration {
        self.end_time.unwrap_or_else(Local::now) - self.start_time
    }
}
