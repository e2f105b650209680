use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use mapch_model::{BoundingBox, Spot, SpotId};

use crate::infra::api::{ApiResult, SpotSource};
use crate::infra::executor::RequestFailure;

/// Minimal spot for assertions on result sets.
pub fn stub_spot(id: i64, name: &str) -> Spot {
    Spot {
        id: SpotId(id),
        name: name.to_string(),
        latitude: 35.0,
        longitude: 139.0,
        evaluation: None,
        photos: Vec::new(),
        posts: Vec::new(),
        comments: Vec::new(),
    }
}

#[derive(Debug)]
struct Scripted {
    delay: Duration,
    outcome: Result<Vec<Spot>, u16>,
}

#[derive(Debug, Default)]
struct SourceState {
    replies: VecDeque<Scripted>,
    calls: Vec<(BoundingBox, u32)>,
}

/// [`SpotSource`] replying from a queue, each reply after its own delay.
/// With the queue empty it answers an empty list at once.
#[derive(Debug, Clone, Default)]
pub struct StubSpotSource {
    inner: Arc<Mutex<SourceState>>,
}

impl StubSpotSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_spots(&self, delay: Duration, spots: Vec<Spot>) {
        self.inner.lock().replies.push_back(Scripted {
            delay,
            outcome: Ok(spots),
        });
    }

    pub fn push_status(&self, delay: Duration, status: u16) {
        self.inner.lock().replies.push_back(Scripted {
            delay,
            outcome: Err(status),
        });
    }

    /// `(bounds, limit)` of every call, in order.
    pub fn calls(&self) -> Vec<(BoundingBox, u32)> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().calls.len()
    }
}

#[async_trait]
impl SpotSource for StubSpotSource {
    async fn spots_in_bounds(
        &self,
        bounds: BoundingBox,
        limit: u32,
    ) -> ApiResult<Vec<Spot>> {
        let scripted = {
            let mut state = self.inner.lock();
            state.calls.push((bounds, limit));
            state.replies.pop_front()
        };
        let Some(scripted) = scripted else {
            return Ok(Vec::new());
        };
        tokio::time::sleep(scripted.delay).await;
        scripted.outcome.map_err(|status| {
            RequestFailure::Status {
                status,
                body: String::new(),
            }
            .into()
        })
    }
}
