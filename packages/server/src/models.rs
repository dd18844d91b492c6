use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use sqlx::FromRow;

/// Longest feedback comment accepted, matching the `VARCHAR(500)` column.
pub const FEEDBACK_COMMENT_MAX: usize = 500;

/// A feedback entry as stored in the `feedback` table.
#[derive(Debug, FromRow, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub id: i64,
    pub rating: i64,
    pub comment: String,
}

/// A free-text comment as stored in the `comments` table.
#[derive(Debug, FromRow, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: i64,
    pub text: String,
}

/// Validated feedback ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeedback {
    pub rating: i64,
    pub comment: String,
}

impl NewFeedback {
    /// Builds a feedback entry from raw form input.
    ///
    /// Returns `None` when the rating is absent or not an integer, or when the
    /// comment is blank or longer than [`FEEDBACK_COMMENT_MAX`] characters.
    pub fn from_form(rating: Option<&str>, comment: Option<&str>) -> Option<Self> {
        let rating = rating?.trim().parse::<i64>().ok()?;
        let comment = comment?;
        if comment.trim().is_empty() || comment.chars().count() > FEEDBACK_COMMENT_MAX {
            return None;
        }
        Some(Self {
            rating,
            comment: comment.to_string(),
        })
    }
}

/// Validated comment ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub text: String,
}

impl NewComment {
    pub fn from_form(text: Option<&str>) -> Option<Self> {
        let text = text?;
        if text.trim().is_empty() {
            return None;
        }
        Some(Self {
            text: text.to_string(),
        })
    }
}

/// The simulated vehicle. Lives only in memory for the lifetime of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct Taxi {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub status: String,
}

impl Default for Taxi {
    fn default() -> Self {
        // Fort McMurray
        Self {
            id: "taxi_2".to_string(),
            lat: 56.7268,
            lng: -111.3871,
            status: "On a ride".to_string(),
        }
    }
}

#[derive(Serialize)]
struct TaxiPosition<'a> {
    lat: f64,
    lng: f64,
    status: &'a str,
}

/// Serialized keyed by taxi id: `{"taxi_2": {"lat": .., "lng": .., "status": ..}}`.
impl Serialize for Taxi {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(
            &self.id,
            &TaxiPosition {
                lat: self.lat,
                lng: self.lng,
                status: &self.status,
            },
        )?;
        map.end()
    }
}

/// Rectangular clamp for the simulated position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl GeoBounds {
    pub fn clamp(&self, lat: f64, lng: f64) -> (f64, f64) {
        (
            lat.clamp(self.min_lat, self.max_lat),
            lng.clamp(self.min_lng, self.max_lng),
        )
    }
}

impl std::str::FromStr for GeoBounds {
    type Err = String;

    /// Parses `min_lat,min_lng,max_lat,max_lng`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<f64>().map_err(|e| e.to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        let &[min_lat, min_lng, max_lat, max_lng] = parts.as_slice() else {
            return Err(format!("expected 4 comma-separated numbers, got {}", parts.len()));
        };
        if min_lat > max_lat || min_lng > max_lng {
            return Err("minimum exceeds maximum".to_string());
        }
        Ok(Self {
            min_lat,
            min_lng,
            max_lat,
            max_lng,
        })
    }
}
