use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;

use mapch_model::{BoundingBox, Spot, SpotId};

use super::{ApiClient, ApiError, ApiResult};
use crate::infra::events::{EventBus, SpotEvent};
use crate::infra::http::{FilePart, HttpResponse, Method};
use crate::infra::probe::{CandidateRequest, Encoding, Payload};

/// File field names tried, in order, when uploading photos with a new spot.
pub const PHOTO_FIELD_CANDIDATES: [&str; 7] = [
    "photo[]", "photos[]", "image[]", "images[]", "file", "files[]", "photo",
];

/// Field name used when there is nothing to probe for.
pub const DEFAULT_PHOTO_FIELD: &str = "photo[]";

/// Read access to spots inside a region.
#[async_trait]
pub trait SpotSource: Send + Sync {
    async fn spots_in_bounds(
        &self,
        bounds: BoundingBox,
        limit: u32,
    ) -> ApiResult<Vec<Spot>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSpot {
    pub name: String,
    pub evaluation: u8,
    pub user_name: Option<String>,
    pub comment: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub images: Vec<FilePart>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpotUpdate {
    pub name: Option<String>,
    pub evaluation: Option<u8>,
}

impl SpotUpdate {
    fn name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

/// Multipart photo edit: new uploads plus ids of photos to drop.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoEdit {
    pub name: String,
    pub evaluation: u8,
    pub new_images: Vec<FilePart>,
    pub delete_photo_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct SpotsApi {
    client: ApiClient,
    events: EventBus,
}

impl SpotsApi {
    pub fn new(client: ApiClient, events: EventBus) -> Self {
        Self { client, events }
    }

    pub async fn fetch_in_bounds(
        &self,
        bounds: BoundingBox,
        limit: u32,
    ) -> ApiResult<Vec<Spot>> {
        let mut request =
            self.client.read(Method::Get, "api/spots/in-bounds")?;
        for (key, value) in bounds.query_pairs() {
            request = request.query_pair(key, &value);
        }
        request = request.query_pair("limit", &limit.to_string());

        let response = self.client.send(request).await?;
        let spots = decode_spot_list(&response)?;
        debug!(
            "[SpotsApi] {} spots in bounds ({}, {}) - ({}, {})",
            spots.len(),
            bounds.south,
            bounds.west,
            bounds.north,
            bounds.east
        );
        Ok(spots)
    }

    /// Register a new spot. With images attached, the upload field name is
    /// probed across [`PHOTO_FIELD_CANDIDATES`].
    pub async fn create_spot(
        &self,
        spot: &NewSpot,
    ) -> ApiResult<Option<SpotId>> {
        let name = spot.name.trim();
        if name.is_empty() {
            return Err(ApiError::Validation("spot name is required".into()));
        }
        if !spot.latitude.is_finite() || !spot.longitude.is_finite() {
            return Err(ApiError::Validation(
                "spot coordinates must be finite".into(),
            ));
        }

        let mut payload = Payload::new()
            .field("spot_name", name)
            .field("evaluation", spot.evaluation.to_string())
            .field("ido", spot.latitude.to_string())
            .field("keido", spot.longitude.to_string());
        if let Some(user) = trimmed(spot.user_name.as_deref()) {
            payload = payload.field("user_name", user).field("author", user);
        }
        if let Some(comment) = trimmed(spot.comment.as_deref()) {
            payload =
                payload.field("comment", comment).field("content", comment);
        }
        let payload = payload.files(spot.images.iter().cloned());

        let fields: &[&str] = if spot.images.is_empty() {
            &[DEFAULT_PHOTO_FIELD]
        } else {
            &PHOTO_FIELD_CANDIDATES
        };
        let candidates: Vec<CandidateRequest> = fields
            .iter()
            .map(|field| {
                CandidateRequest::multipart("api/spots/store", *field)
            })
            .collect();

        let response = self
            .client
            .probe()
            .probe(&candidates, |candidate| {
                self.client.write_candidate(candidate, &payload)
            })
            .await?;

        let id = created_id(&response);
        info!("[SpotsApi] created spot {:?}", id);
        self.events.publish_spot(SpotEvent::Created { id });
        Ok(id)
    }

    pub async fn update_spot(
        &self,
        id: SpotId,
        update: &SpotUpdate,
    ) -> ApiResult<()> {
        let by_id = format!("api/spots/update/{id}");
        let candidates = [
            CandidateRequest::json(Method::Patch, by_id.clone()),
            CandidateRequest::json(Method::Put, format!("api/spots/{id}")),
            CandidateRequest::form(by_id.clone()).with_override(Method::Patch),
            CandidateRequest::form("api/spots/update")
                .with_override(Method::Patch),
        ];

        let evaluation = update.evaluation.map(|e| e.to_string());
        let json_payload = Payload::new()
            .field_opt("spot_name", update.name())
            .field_opt("evaluation", evaluation.clone());
        let form_fields = Payload::new()
            .field("spot_name", update.name().unwrap_or_default())
            .field("evaluation", evaluation.unwrap_or_default());

        self.client
            .probe()
            .probe(&candidates, |candidate| {
                let payload = match &candidate.encoding {
                    Encoding::Json => json_payload.clone(),
                    _ if candidate.path == by_id => {
                        form_fields.clone().field("_method", "PATCH")
                    }
                    _ => form_fields.clone().field("id", id.get()),
                };
                self.client.write_candidate(candidate, &payload)
            })
            .await?;

        info!("[SpotsApi] updated spot {id}");
        self.events.publish_spot(SpotEvent::Updated {
            id,
            name: update.name().map(str::to_string),
            evaluation: update.evaluation,
        });
        Ok(())
    }

    pub async fn delete_spot(&self, id: SpotId) -> ApiResult<()> {
        let by_id = format!("api/spots/delete/{id}");
        let candidates = [
            CandidateRequest::delete(by_id.clone()),
            CandidateRequest::delete(format!("api/spots/{id}")),
            CandidateRequest::form(by_id.clone())
                .with_override(Method::Delete),
            CandidateRequest::form("api/spots/delete")
                .with_override(Method::Delete),
        ];

        self.client
            .probe()
            .probe(&candidates, |candidate| {
                let payload = if candidate.path == by_id {
                    Payload::new().field("_method", "DELETE")
                } else {
                    Payload::new().field("id", id.get())
                };
                self.client.write_candidate(candidate, &payload)
            })
            .await?;

        info!("[SpotsApi] deleted spot {id}");
        self.events.publish_spot(SpotEvent::Deleted { id });
        Ok(())
    }

    /// Upload and remove photos in one multipart `_method=PATCH` call.
    ///
    /// Returns the photo paths from the response when the server sends the
    /// updated list back, otherwise an empty list.
    pub async fn edit_photos(
        &self,
        id: SpotId,
        edit: &PhotoEdit,
    ) -> ApiResult<Vec<String>> {
        let mut payload = Payload::new()
            .field("_method", "PATCH")
            .field("spot_name", edit.name.trim())
            .field("evaluation", edit.evaluation.to_string());
        for photo_id in &edit.delete_photo_ids {
            payload =
                payload.field("delete_photo_ids[]", photo_id.to_string());
        }
        let payload = payload.files(edit.new_images.iter().cloned());

        let candidate = CandidateRequest::multipart(
            format!("api/spots/update/{id}"),
            DEFAULT_PHOTO_FIELD,
        );
        let request = self.client.write_candidate(&candidate, &payload)?;
        let response = self.client.send(request).await?;

        let paths = returned_photo_paths(&response);
        info!(
            "[SpotsApi] edited photos of spot {id}: +{} -{} ({} returned)",
            edit.new_images.len(),
            edit.delete_photo_ids.len(),
            paths.len()
        );
        self.events.publish_spot(SpotEvent::Updated {
            id,
            name: trimmed(Some(&edit.name)).map(str::to_string),
            evaluation: Some(edit.evaluation),
        });
        if !paths.is_empty() {
            self.events.publish_spot(SpotEvent::PhotosUpdated {
                id,
                paths: paths.clone(),
            });
        }
        Ok(paths)
    }
}

#[async_trait]
impl SpotSource for SpotsApi {
    async fn spots_in_bounds(
        &self,
        bounds: BoundingBox,
        limit: u32,
    ) -> ApiResult<Vec<Spot>> {
        self.fetch_in_bounds(bounds, limit).await
    }
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Accepts a bare array or a `{data}` / `{spots}` envelope.
fn decode_spot_list(response: &HttpResponse) -> ApiResult<Vec<Spot>> {
    let value: Value = response.json().map_err(|e| ApiError::Decode {
        what: "spot list",
        message: e.to_string(),
    })?;
    let list = match value {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => ["data", "spots"]
            .iter()
            .find_map(|key| map.remove(*key).filter(Value::is_array))
            .ok_or_else(|| ApiError::Decode {
                what: "spot list",
                message: "no list in response object".into(),
            })?,
        _ => {
            return Err(ApiError::Decode {
                what: "spot list",
                message: "unexpected response shape".into(),
            });
        }
    };
    serde_json::from_value(list).map_err(|e| ApiError::Decode {
        what: "spot list",
        message: e.to_string(),
    })
}

fn created_id(response: &HttpResponse) -> Option<SpotId> {
    let value: Value = response.json().ok()?;
    [&value, &value["spot"], &value["data"]]
        .into_iter()
        .find_map(|node| node.get("id").and_then(Value::as_i64))
        .map(SpotId)
}

fn returned_photo_paths(response: &HttpResponse) -> Vec<String> {
    let Ok(value) = response.json::<Value>() else {
        return Vec::new();
    };
    let photos = value
        .get("photos")
        .or_else(|| value.get("spot").and_then(|s| s.get("photos")))
        .and_then(Value::as_array);
    photos
        .into_iter()
        .flatten()
        .filter_map(|photo| photo.get("photo_path").and_then(Value::as_str))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spot_list_accepts_bare_array_and_data_envelope() {
        let bare = HttpResponse::new(
            200,
            r#"[{"id": 1, "spot_name": "a", "ido": 35.0, "keido": 139.0}]"#,
        );
        assert_eq!(decode_spot_list(&bare).expect("bare").len(), 1);

        let wrapped = HttpResponse::new(
            200,
            r#"{"data": [{"id": 2, "ido": "35.1", "keido": "139.1"}]}"#,
        );
        let spots = decode_spot_list(&wrapped).expect("wrapped");
        assert_eq!(spots[0].id, SpotId(2));

        let html = HttpResponse::new(200, "<html>");
        assert!(decode_spot_list(&html).is_err());
    }

    #[test]
    fn created_id_is_found_in_common_shapes() {
        let top = HttpResponse::new(201, r#"{"id": 5}"#);
        let nested = HttpResponse::new(201, r#"{"spot": {"id": 6}}"#);
        let none = HttpResponse::new(201, "ok");
        assert_eq!(created_id(&top), Some(SpotId(5)));
        assert_eq!(created_id(&nested), Some(SpotId(6)));
        assert_eq!(created_id(&none), None);
    }

    #[test]
    fn returned_photos_are_trimmed_and_filtered() {
        let response = HttpResponse::new(
            200,
            r#"{"id": 1, "photos": [{"photo_path": " photo/a.jpg "},
                {"photo_path": ""}, {"id": 3}]}"#,
        );
        assert_eq!(returned_photo_paths(&response), vec!["photo/a.jpg"]);
    }
}
