//! Record kinds collected from the EmoGo app — sentiments, vlogs and GPS points.
//!
//! These are the typed shapes accepted at the HTTP boundary. Storage itself
//! only ever sees opaque [`Record`]s.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::store::Record;

/// The three collections the service writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Vlogs,
    Sentiments,
    Gps,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [RecordKind::Vlogs, RecordKind::Sentiments, RecordKind::Gps];

    /// Storage collection name.
    pub fn collection(&self) -> &'static str {
        match self {
            RecordKind::Vlogs => "vlogs",
            RecordKind::Sentiments => "sentiments",
            RecordKind::Gps => "gps_coordinates",
        }
    }

    /// Name used in URLs and the `data_type` export parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Vlogs => "vlogs",
            RecordKind::Sentiments => "sentiments",
            RecordKind::Gps => "gps",
        }
    }

    /// Key under which list responses carry the items.
    pub fn list_key(&self) -> &'static str {
        match self {
            RecordKind::Vlogs => "vlogs",
            RecordKind::Sentiments => "sentiments",
            RecordKind::Gps => "coordinates",
        }
    }

    /// Human-readable plural, used in response messages.
    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Vlogs => "vlogs",
            RecordKind::Sentiments => "sentiments",
            RecordKind::Gps => "GPS coordinates",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vlogs" => Ok(RecordKind::Vlogs),
            "sentiments" => Ok(RecordKind::Sentiments),
            "gps" => Ok(RecordKind::Gps),
            other => Err(ValidationError::UnknownKind(other.to_string())),
        }
    }
}

/// Boundary validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("Unknown data type: {0}")]
    UnknownKind(String),

    #[error("Record could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            min,
            max,
            value,
        })
    }
}

/// A typed record that belongs to one collection.
pub trait CollectionRecord: Serialize + DeserializeOwned + Send + 'static {
    const KIND: RecordKind;

    fn validate(&self) -> Result<(), ValidationError>;

    /// Validate and convert into an opaque storage record.
    fn into_record(self) -> Result<Record, ValidationError> {
        self.validate()?;
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Ok(Record::new()),
        }
    }
}

/// A GPS fix reported by the app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsCoordinate {
    pub latitude: f64,
    pub longitude: f64,
    /// When the fix was taken on the device.
    pub timestamp: DateTime<Utc>,
    /// When the app uploaded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_time: Option<DateTime<Utc>>,
    /// Horizontal accuracy in metres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl CollectionRecord for GpsCoordinate {
    const KIND: RecordKind = RecordKind::Gps;

    fn validate(&self) -> Result<(), ValidationError> {
        check_range("latitude", self.latitude, -90.0, 90.0)?;
        check_range("longitude", self.longitude, -180.0, 180.0)?;
        if let Some(accuracy) = self.accuracy {
            check_range("accuracy", accuracy, 0.0, f64::MAX)?;
        }
        Ok(())
    }
}

/// An emotion rating with its free-text note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub text: String,
    /// Mood label, e.g. "very good".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    /// Mood rating as shown in the app, e.g. "4/5".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood_score: Option<String>,
    /// -1 (negative) to 1 (positive).
    pub sentiment_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Per-emotion weights, e.g. `{"joy": 0.8, "sadness": 0.2}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotions: Option<serde_json::Map<String, serde_json::Value>>,
}

impl CollectionRecord for Sentiment {
    const KIND: RecordKind = RecordKind::Sentiments;

    fn validate(&self) -> Result<(), ValidationError> {
        check_range("sentiment_score", self.sentiment_score, -1.0, 1.0)?;
        if let Some(confidence) = self.confidence {
            check_range("confidence", confidence, 0.0, 1.0)?;
        }
        Ok(())
    }
}

/// Metadata for a short video diary entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vlog {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_path: Option<String>,
    /// Base64-encoded video, for clients without upload storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Length in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GpsCoordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_analysis: Option<Sentiment>,
}

impl CollectionRecord for Vlog {
    const KIND: RecordKind = RecordKind::Vlogs;

    fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::Empty { field: "title" });
        }
        if let Some(duration) = self.duration {
            check_range("duration", duration, 0.0, f64::MAX)?;
        }
        if let Some(location) = &self.location {
            location.validate()?;
        }
        if let Some(sentiment) = &self.sentiment_analysis {
            sentiment.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn kinds_map_to_collections() {
        assert_eq!(RecordKind::Gps.collection(), "gps_coordinates");
        assert_eq!(RecordKind::Gps.list_key(), "coordinates");
        assert_eq!("sentiments".parse::<RecordKind>().unwrap(), RecordKind::Sentiments);
        assert!("all".parse::<RecordKind>().is_err());
    }

    #[test]
    fn gps_into_record_skips_missing_optionals() {
        let gps: GpsCoordinate = serde_json::from_value(json!({
            "latitude": 25.0330,
            "longitude": 121.5654,
            "timestamp": "2025-11-20T08:00:00Z",
        }))
        .unwrap();

        let record = gps.into_record().unwrap();
        assert_eq!(record["latitude"], 25.0330);
        assert!(!record.contains_key("accuracy"));
        assert!(!record.contains_key("id"));
    }

    #[test]
    fn gps_rejects_out_of_range_latitude() {
        let gps: GpsCoordinate = serde_json::from_value(json!({
            "latitude": 91.0,
            "longitude": 0.0,
            "timestamp": "2025-11-20T08:00:00Z",
        }))
        .unwrap();

        let err = gps.into_record().unwrap_err();
        assert!(err.to_string().contains("latitude"));
    }

    #[test]
    fn sentiment_score_is_bounded() {
        let sentiment: Sentiment = serde_json::from_value(json!({
            "text": "great day",
            "mood": "very good",
            "mood_score": "5/5",
            "sentiment_score": 1.5,
            "timestamp": "2025-11-20T08:00:00Z",
        }))
        .unwrap();
        assert!(matches!(
            sentiment.validate(),
            Err(ValidationError::OutOfRange { field: "sentiment_score", .. })
        ));
    }

    #[test]
    fn vlog_validates_nested_location() {
        let vlog: Vlog = serde_json::from_value(json!({
            "title": "walk",
            "timestamp": "2025-11-20T08:00:00Z",
            "location": {
                "latitude": 0.0,
                "longitude": 200.0,
                "timestamp": "2025-11-20T08:00:00Z",
            },
        }))
        .unwrap();
        assert!(vlog.validate().is_err());
    }

    #[test]
    fn vlog_requires_title() {
        let vlog: Vlog = serde_json::from_value(json!({
            "title": "  ",
            "timestamp": "2025-11-20T08:00:00Z",
        }))
        .unwrap();
        assert!(matches!(vlog.validate(), Err(ValidationError::Empty { field: "title" })));
    }

    #[test]
    fn emotions_map_survives_conversion() {
        let sentiment: Sentiment = serde_json::from_value(json!({
            "text": "meh",
            "sentiment_score": 0.1,
            "timestamp": "2025-11-20T08:00:00Z",
            "emotions": { "joy": 0.4, "sadness": 0.6 },
        }))
        .unwrap();
        let record = sentiment.into_record().unwrap();
        assert_eq!(record["emotions"]["sadness"], 0.6);
    }
}
