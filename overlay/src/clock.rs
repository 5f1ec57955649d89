//! Cosmetic HUD clock: wall time in a fixed zone plus fake fps and ping

use crate::random::RandomSource;
use chrono::{FixedOffset, Offset, TimeZone, Utc};
use shared::ClockView;

pub const FPS_RANGE: (u32, u32) = (60, 120);
pub const PING_RANGE: (u32, u32) = (15, 40);

#[derive(Debug, Clone, PartialEq)]
pub struct SessionClock {
    offset: FixedOffset,
    time_of_day: String,
    date_label: String,
    fps: u32,
    ping_ms: u32,
}

impl SessionClock {
    pub fn new(utc_offset_hours: i32) -> Self {
        let offset =
            FixedOffset::east_opt(utc_offset_hours * 3_600).unwrap_or_else(|| Utc.fix());
        Self {
            offset,
            time_of_day: "--:--".to_string(),
            date_label: String::new(),
            fps: FPS_RANGE.0,
            ping_ms: PING_RANGE.0,
        }
    }

    /// Regenerates every displayed value for the given wall time
    pub fn refresh(&mut self, epoch_ms: i64, random: &mut dyn RandomSource) {
        if let Some(utc) = Utc.timestamp_millis_opt(epoch_ms).single() {
            let local = utc.with_timezone(&self.offset);
            self.time_of_day = local.format("%H:%M").to_string();
            self.date_label = local.format("%d.%m.%Y").to_string();
        }
        self.fps = random.range_u32(FPS_RANGE.0, FPS_RANGE.1);
        self.ping_ms = random.range_u32(PING_RANGE.0, PING_RANGE.1);
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn ping_ms(&self) -> u32 {
        self.ping_ms
    }

    pub fn view(&self) -> ClockView {
        ClockView {
            time_of_day: self.time_of_day.clone(),
            date_label: self.date_label.clone(),
            fps: self.fps,
            ping_ms: self.ping_ms,
        }
    }
}
