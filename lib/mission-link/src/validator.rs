//! Schema validation for mission JSON payloads carried by op-`T` (Task) packets.

use groundlink::logging::{self, Logger};
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

const KNOWN_TASKS: [&str; 3] = ["capture_images", "sample_collection", "environmental_analysis"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeographicArea {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mission {
    pub mission_id: String,
    pub rover_id: String,
    pub geographic_area: GeographicArea,
    pub task: String,
    pub duration_minutes: f64,
    pub update_frequency_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Validates a Task payload. On success returns the parsed `Mission`; on failure
/// returns a human-readable reason (wrapped by callers into `MlError::InvalidMission`).
/// The transport layer ACKs the packet regardless of the outcome (see §7).
pub fn validate(payload: &[u8], log: &Logger) -> Result<Mission, String> {
    let value: Value = serde_json::from_slice(payload).map_err(|e| format!("not valid JSON: {}", e))?;

    let obj = value.as_object().ok_or_else(|| "payload must be a JSON object".to_string())?;

    let mission_id = require_str(obj, "mission_id")?;
    let rover_id = require_str(obj, "rover_id")?;

    let area_value = obj.get("geographic_area").ok_or_else(|| "missing geographic_area".to_string())?;
    let area_obj = area_value.as_object().ok_or_else(|| "geographic_area must be an object".to_string())?;
    let x1 = require_num(area_obj, "x1")?;
    let y1 = require_num(area_obj, "y1")?;
    let x2 = require_num(area_obj, "x2")?;
    let y2 = require_num(area_obj, "y2")?;
    if !(x1 < x2) || !(y1 < y2) {
        return Err("x1<x2 and y1<y2 required".to_string());
    }

    let task = require_str(obj, "task")?;
    if !KNOWN_TASKS.contains(&task.as_str()) {
        logging::warn!(log, "unknown task value, accepting anyway"; "task" => &task);
    }

    let duration_minutes = require_num(obj, "duration_minutes")?;
    if duration_minutes <= 0.0 {
        return Err("duration_minutes must be > 0".to_string());
    }

    let update_frequency_seconds = require_num(obj, "update_frequency_seconds")?;
    if update_frequency_seconds <= 0.0 {
        return Err("update_frequency_seconds must be > 0".to_string());
    }

    let priority = match obj.get("priority") {
        Some(Value::String(s)) => Some(match s.as_str() {
            "low" => Priority::Low,
            "medium" => Priority::Medium,
            "high" => Priority::High,
            other => return Err(format!("unknown priority value: {}", other)),
        }),
        Some(_) => return Err("priority must be a string".to_string()),
        None => None,
    };

    let instructions = match obj.get("instructions") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err("instructions must be a string".to_string()),
        None => None,
    };

    Ok(Mission {
        mission_id,
        rover_id,
        geographic_area: GeographicArea { x1, y1, x2, y2 },
        task,
        duration_minutes,
        update_frequency_seconds,
        priority,
        instructions,
    })
}

fn require_str(obj: &serde_json::Map<String, Value>, key: &str) -> Result<String, String> {
    match obj.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(format!("{} must be a string", key)),
        None => Err(format!("missing {}", key)),
    }
}

fn require_num(obj: &serde_json::Map<String, Value>, key: &str) -> Result<f64, String> {
    match obj.get(key) {
        Some(v) => v.as_f64().ok_or_else(|| format!("{} must be numeric", key)),
        None => Err(format!("missing {}", key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> Logger {
        logging::init_default()
    }

    fn valid_json() -> &'static str {
        r#"{"mission_id":"M1","rover_id":"r1","geographic_area":{"x1":0,"y1":0,"x2":5,"y2":20},
            "task":"capture_images","duration_minutes":30,"update_frequency_seconds":5}"#
    }

    #[test]
    fn accepts_well_formed_mission() {
        let mission = validate(valid_json().as_bytes(), &log()).unwrap();
        assert_eq!(mission.mission_id, "M1");
        assert_eq!(mission.task, "capture_images");
    }

    #[test]
    fn accepts_unknown_task_value_with_warning() {
        let json = valid_json().replace("capture_images", "refuel");
        let mission = validate(json.as_bytes(), &log()).unwrap();
        assert_eq!(mission.task, "refuel");
    }

    #[test]
    fn rejects_inverted_geographic_area() {
        let json = r#"{"mission_id":"M1","rover_id":"r1","geographic_area":{"x1":10,"y1":10,"x2":5,"y2":20},
            "task":"capture_images","duration_minutes":30,"update_frequency_seconds":5}"#;
        let err = validate(json.as_bytes(), &log()).unwrap_err();
        assert_eq!(err, "x1<x2 and y1<y2 required");
    }

    #[test]
    fn rejects_non_positive_duration() {
        let json = valid_json().replace("\"duration_minutes\":30", "\"duration_minutes\":0");
        assert!(validate(json.as_bytes(), &log()).is_err());
    }

    #[test]
    fn rejects_missing_required_field() {
        let json = r#"{"rover_id":"r1","geographic_area":{"x1":0,"y1":0,"x2":5,"y2":20},
            "task":"capture_images","duration_minutes":30,"update_frequency_seconds":5}"#;
        assert!(validate(json.as_bytes(), &log()).is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(validate(b"not json", &log()).is_err());
    }

    #[test]
    fn accepts_optional_priority_and_instructions() {
        let json = valid_json().trim_end_matches('}').to_string() + r#","priority":"high","instructions":"go slow"}"#;
        let mission = validate(json.as_bytes(), &log()).unwrap();
        assert_eq!(mission.priority, Some(Priority::High));
        assert_eq!(mission.instructions.as_deref(), Some("go slow"));
    }
}
