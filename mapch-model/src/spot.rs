use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::flexible::{FlexibleScalar, first_non_empty};
use crate::post::Post;

/// Backend identifier of a spot.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct SpotId(pub i64);

impl SpotId {
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for SpotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SpotId {
    fn from(value: i64) -> Self {
        SpotId(value)
    }
}

/// A photo attached to a spot. `path` is either absolute or relative to the
/// image bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPhoto")]
pub struct Photo {
    pub id: i64,
    pub spot_id: Option<SpotId>,
    #[serde(rename = "photo_path")]
    pub path: String,
}

#[derive(Debug, Deserialize)]
struct RawPhoto {
    id: Option<FlexibleScalar>,
    spot_id: Option<FlexibleScalar>,
    photo_path: Option<String>,
    url: Option<String>,
    path: Option<String>,
    #[serde(rename = "photoUrl")]
    photo_url: Option<String>,
    #[serde(rename = "photoURL")]
    photo_url_upper: Option<String>,
    src: Option<String>,
}

impl TryFrom<RawPhoto> for Photo {
    type Error = ModelError;

    fn try_from(raw: RawPhoto) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .as_ref()
            .and_then(FlexibleScalar::as_i64)
            .ok_or(ModelError::MissingField("photo.id"))?;
        let path = first_non_empty([
            &raw.photo_path,
            &raw.url,
            &raw.path,
            &raw.photo_url,
            &raw.photo_url_upper,
            &raw.src,
        ])
        .map(|p| p.replace('\\', "/"))
        .unwrap_or_default();
        Ok(Photo {
            id,
            spot_id: raw
                .spot_id
                .as_ref()
                .and_then(FlexibleScalar::as_i64)
                .map(SpotId),
            path,
        })
    }
}

/// Legacy comment row carried on some spot payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentNode {
    pub id: Option<i64>,
    pub spot_id: Option<i64>,
    pub comment: Option<String>,
}

/// A pinned location on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSpot")]
pub struct Spot {
    pub id: SpotId,
    #[serde(rename = "spot_name")]
    pub name: String,
    #[serde(rename = "ido")]
    pub latitude: f64,
    #[serde(rename = "keido")]
    pub longitude: f64,
    pub evaluation: Option<String>,
    pub photos: Vec<Photo>,
    pub posts: Vec<Post>,
    pub comments: Vec<CommentNode>,
}

#[derive(Debug, Deserialize)]
struct RawSpot {
    id: Option<FlexibleScalar>,
    spot_name: Option<String>,
    ido: Option<FlexibleScalar>,
    keido: Option<FlexibleScalar>,
    evaluation: Option<FlexibleScalar>,
    photos: Option<serde_json::Value>,
    posts: Option<serde_json::Value>,
    comments: Option<serde_json::Value>,
}

/// Decode each element on its own so a single malformed entry does not
/// discard the rest of the list.
fn lenient_list<T>(value: Option<serde_json::Value>) -> Vec<T>
where
    T: for<'de> Deserialize<'de>,
{
    match value {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}

impl TryFrom<RawSpot> for Spot {
    type Error = ModelError;

    fn try_from(raw: RawSpot) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .as_ref()
            .and_then(FlexibleScalar::as_i64)
            .ok_or(ModelError::MissingField("spot.id"))?;
        let latitude = raw
            .ido
            .as_ref()
            .and_then(FlexibleScalar::as_f64)
            .ok_or(ModelError::InvalidCoordinate("ido"))?;
        let longitude = raw
            .keido
            .as_ref()
            .and_then(FlexibleScalar::as_f64)
            .ok_or(ModelError::InvalidCoordinate("keido"))?;
        Ok(Spot {
            id: SpotId(id),
            name: raw.spot_name.unwrap_or_default(),
            latitude,
            longitude,
            evaluation: raw.evaluation.as_ref().map(FlexibleScalar::as_text),
            photos: lenient_list(raw.photos),
            posts: lenient_list(raw.posts),
            comments: lenient_list(raw.comments),
        })
    }
}

impl Spot {
    /// Evaluation folded to a 0..=5 star rating.
    pub fn rating(&self) -> u8 {
        self.evaluation
            .as_ref()
            .and_then(|raw| {
                FlexibleScalar::Text(raw.clone()).as_i64()
            })
            .map(|n| n.clamp(0, 5) as u8)
            .unwrap_or(0)
    }

    /// Photo paths as delivered by the server, trimmed, blanks removed.
    pub fn photo_paths(&self) -> Vec<String> {
        self.photos
            .iter()
            .map(|p| p.path.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }

    /// Most recent non-empty legacy comment, by descending id.
    pub fn lead_comment(&self) -> Option<String> {
        let mut comments: Vec<&CommentNode> = self.comments.iter().collect();
        comments.sort_by(|a, b| b.id.unwrap_or(0).cmp(&a.id.unwrap_or(0)));
        comments
            .into_iter()
            .filter_map(|c| c.comment.as_deref())
            .map(str::trim)
            .find(|c| !c.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_numeric_string_coordinates() {
        let spot: Spot = serde_json::from_value(json!({
            "id": 12,
            "spot_name": "Shibuya crossing",
            "ido": "35.6595",
            "keido": 139.7005,
            "evaluation": "５",
            "photos": [
                {"id": 1, "photo_path": " photo\\a.jpg "},
                {"id": 2, "url": "https://cdn.example.com/b.jpg"},
                {"photo_path": "missing-id.jpg"}
            ]
        }))
        .expect("spot decodes");

        assert_eq!(spot.id, SpotId(12));
        assert!((spot.latitude - 35.6595).abs() < 1e-9);
        assert_eq!(spot.rating(), 5);
        assert_eq!(
            spot.photo_paths(),
            vec!["photo/a.jpg", "https://cdn.example.com/b.jpg"]
        );
    }

    #[test]
    fn rejects_spot_without_coordinates() {
        let result = serde_json::from_value::<Spot>(json!({
            "id": 3,
            "spot_name": "nowhere",
            "ido": "north-ish"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn lead_comment_prefers_highest_id() {
        let spot: Spot = serde_json::from_value(json!({
            "id": 1, "ido": 0, "keido": 0,
            "comments": [
                {"id": 1, "comment": "first"},
                {"id": 3, "comment": "  "},
                {"id": 2, "comment": "second"}
            ]
        }))
        .expect("spot decodes");
        assert_eq!(spot.lead_comment().as_deref(), Some("second"));
    }
}
