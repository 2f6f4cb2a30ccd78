//! Output types returned to callers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The response payload for one processed document.
///
/// `blocks` holds the model's blocks exactly as returned: they are passed
/// through without per-field validation. Use [`TimetableResult::typed_blocks`]
/// for a lenient typed view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableResult {
    /// Original name of the uploaded file.
    pub file_name: String,
    /// MIME type the file was accepted as.
    pub mime_type: String,
    /// Ordered timetable blocks.
    pub blocks: Vec<Value>,
}

impl TimetableResult {
    /// Lenient typed view of `blocks`; fields that are missing or of the wrong
    /// type come back as `None`.
    pub fn typed_blocks(&self) -> Vec<TimetableBlock> {
        self.blocks.iter().map(TimetableBlock::from_value).collect()
    }
}

/// Day of the week as abbreviated in the extraction contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayOfWeek {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Mon" => Some(DayOfWeek::Mon),
            "Tue" => Some(DayOfWeek::Tue),
            "Wed" => Some(DayOfWeek::Wed),
            "Thu" => Some(DayOfWeek::Thu),
            "Fri" => Some(DayOfWeek::Fri),
            "Sat" => Some(DayOfWeek::Sat),
            "Sun" => Some(DayOfWeek::Sun),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Mon => "Mon",
            DayOfWeek::Tue => "Tue",
            DayOfWeek::Wed => "Wed",
            DayOfWeek::Thu => "Thu",
            DayOfWeek::Fri => "Fri",
            DayOfWeek::Sat => "Sat",
            DayOfWeek::Sun => "Sun",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scheduled period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableBlock {
    pub day_of_week: Option<DayOfWeek>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub subject: Option<String>,
    pub room: Option<String>,
    pub teacher: Option<String>,
}

impl TimetableBlock {
    /// Read a block out of an arbitrary JSON value without failing.
    pub fn from_value(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            day_of_week: value
                .get("dayOfWeek")
                .and_then(Value::as_str)
                .and_then(DayOfWeek::parse),
            start_time: text("startTime"),
            end_time: text("endTime"),
            subject: text("subject"),
            room: text("room"),
            teacher: text("teacher"),
        }
    }
}
