//! In-process gateway with the same behaviour as the REST API.
//!
//! Used by tests and by the `--demo` mode of the command-line tool. Every call
//! is recorded so round trips can be counted, and failures can be injected.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use reqwest::Url;

use cellar_core::{BottleId, DomainError};
use cellar_inventory::{BottleDraft, BottlePatch, BottleRecord};

use crate::gateway::{GatewayError, RatingSummary, RemoteGateway};

const VIVINO_SEARCH: &str = "https://www.vivino.com/search/wines";

/// One call received by an [`InMemoryGateway`].
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    List,
    Create(BottleDraft),
    Patch(BottleId, BottlePatch),
    Delete(BottleId),
    AddComment(BottleId, String),
    FetchRating(BottleId),
    FetchAllRatings,
}

impl GatewayCall {
    pub fn is_list(&self) -> bool {
        matches!(self, GatewayCall::List)
    }
}

type CallMatcher = Box<dyn Fn(&GatewayCall) -> bool + Send>;

struct InjectedFailure {
    matches: CallMatcher,
    error: GatewayError,
}

#[derive(Default)]
struct ServerState {
    next_id: i64,
    bottles: BTreeMap<BottleId, BottleRecord>,
    ratings: HashMap<String, f64>,
    calls: Vec<GatewayCall>,
    failures: Vec<InjectedFailure>,
}

/// In-memory stand-in for the remote inventory service.
///
/// Mirrors the server: ids come from a counter starting at 1, a position patch
/// never clears whoever else sits in the target cell, and ratings come from a
/// name → rating table (unknown names fail the lookup).
pub struct InMemoryGateway {
    state: Mutex<ServerState>,
}

impl core::fmt::Debug for InMemoryGateway {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let bottles = self.state.lock().map(|s| s.bottles.len()).unwrap_or_default();
        f.debug_struct("InMemoryGateway")
            .field("bottles", &bottles)
            .finish()
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServerState {
                next_id: 1,
                ..ServerState::default()
            }),
        }
    }

    /// Register the rating the lookup reports for `name` (case-insensitive).
    pub fn with_rating(self, name: &str, rating: f64) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.ratings.insert(rating_key(name), rating);
        }
        self
    }

    /// Insert a bottle server-side without recording a call.
    ///
    /// `adjust` can shape the stored record (rating, position, comments); the
    /// id is always assigned by the gateway.
    pub fn seed(
        &self,
        draft: BottleDraft,
        adjust: impl FnOnce(BottleRecord) -> BottleRecord,
    ) -> Result<BottleRecord, GatewayError> {
        let mut state = self.lock()?;
        let record = state.insert(&draft)?;
        let record = adjust(record);
        state.bottles.insert(record.id(), record.clone());
        Ok(record)
    }

    /// Server-side view of the inventory, ordered by id.
    pub fn records(&self) -> Vec<BottleRecord> {
        self.state
            .lock()
            .map(|s| s.bottles.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.calls.clear();
        }
    }

    /// Fail the next call, whatever it is, with a 500 carrying `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.fail_matching(|_| true, GatewayError::api(500, message));
    }

    /// Fail the first future call accepted by `matches` with `error`.
    pub fn fail_matching(
        &self,
        matches: impl Fn(&GatewayCall) -> bool + Send + 'static,
        error: GatewayError,
    ) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.push(InjectedFailure {
                matches: Box::new(matches),
                error,
            });
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ServerState>, GatewayError> {
        self.state
            .lock()
            .map_err(|_| GatewayError::Network("in-memory gateway state poisoned".to_string()))
    }

    /// Record `call` and return the locked state, unless a failure was injected for it.
    fn receive(&self, call: GatewayCall) -> Result<MutexGuard<'_, ServerState>, GatewayError> {
        let mut state = self.lock()?;
        tracing::debug!(?call, "in-memory gateway call");

        let injected = state.failures.iter().position(|f| (f.matches)(&call));
        state.calls.push(call);
        if let Some(index) = injected {
            let failure = state.failures.remove(index);
            return Err(failure.error);
        }
        Ok(state)
    }
}

impl ServerState {
    fn insert(&mut self, draft: &BottleDraft) -> Result<BottleRecord, GatewayError> {
        let draft = draft.validated().map_err(bad_request)?;
        let id = BottleId::new(self.next_id);
        let mut record = BottleRecord::new(id, draft.name, draft.year)
            .map_err(bad_request)?
            .with_color(draft.color);
        if let Some(url) = vivino_search_url(record.name(), record.year()) {
            record = record.with_vivino_url(url);
        }

        self.next_id += 1;
        self.bottles.insert(id, record.clone());
        Ok(record)
    }

    fn existing(&self, id: BottleId) -> Result<BottleRecord, GatewayError> {
        self.bottles
            .get(&id)
            .cloned()
            .ok_or_else(|| GatewayError::api(404, "bottle not found"))
    }

    fn store(&mut self, record: BottleRecord) -> BottleRecord {
        self.bottles.insert(record.id(), record.clone());
        record
    }

    fn rated(&self, record: BottleRecord) -> Result<BottleRecord, GatewayError> {
        let Some(&rating) = self.ratings.get(&rating_key(record.name())) else {
            let msg = format!("no rating found for {}", record.name());
            return Err(GatewayError::api(502, msg));
        };
        let url = vivino_search_url(record.name(), record.year());
        let record = record.with_rating(rating);
        Ok(match url {
            Some(url) => record.with_vivino_url(url),
            None => record,
        })
    }
}

#[async_trait]
impl RemoteGateway for InMemoryGateway {
    async fn list(&self) -> Result<Vec<BottleRecord>, GatewayError> {
        let state = self.receive(GatewayCall::List)?;
        Ok(state.bottles.values().cloned().collect())
    }

    async fn create(&self, draft: &BottleDraft) -> Result<BottleRecord, GatewayError> {
        let mut state = self.receive(GatewayCall::Create(draft.clone()))?;
        state.insert(draft)
    }

    async fn patch(&self, id: BottleId, patch: &BottlePatch) -> Result<BottleRecord, GatewayError> {
        let mut state = self.receive(GatewayCall::Patch(id, patch.clone()))?;
        let record = state.existing(id)?.apply_patch(patch).map_err(bad_request)?;
        Ok(state.store(record))
    }

    async fn delete(&self, id: BottleId) -> Result<(), GatewayError> {
        let mut state = self.receive(GatewayCall::Delete(id))?;
        state
            .bottles
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| GatewayError::api(404, "bottle not found"))
    }

    async fn add_comment(&self, id: BottleId, text: &str) -> Result<BottleRecord, GatewayError> {
        let mut state = self.receive(GatewayCall::AddComment(id, text.to_string()))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(GatewayError::api(400, "comment text is required"));
        }
        let record = state.existing(id)?.with_comment(text);
        Ok(state.store(record))
    }

    async fn fetch_rating(&self, id: BottleId) -> Result<BottleRecord, GatewayError> {
        let mut state = self.receive(GatewayCall::FetchRating(id))?;
        let record = state.existing(id)?;
        let record = state.rated(record)?;
        Ok(state.store(record))
    }

    async fn fetch_all_ratings(&self) -> Result<RatingSummary, GatewayError> {
        let mut state = self.receive(GatewayCall::FetchAllRatings)?;
        let mut summary = RatingSummary::default();

        let current: Vec<BottleRecord> = state.bottles.values().cloned().collect();
        for record in current {
            match state.rated(record) {
                Ok(rated) => {
                    state.store(rated);
                    summary.updated += 1;
                }
                Err(_) => summary.failed += 1,
            }
        }
        Ok(summary)
    }
}

fn bad_request(err: DomainError) -> GatewayError {
    let message = match err {
        DomainError::Validation(msg) | DomainError::InvariantViolation(msg) => msg,
        other => other.to_string(),
    };
    GatewayError::api(400, message)
}

fn rating_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Vivino search link for a wine, form-encoded (`q=Chablis+2019`).
fn vivino_search_url(name: &str, year: i32) -> Option<String> {
    Url::parse_with_params(VIVINO_SEARCH, &[("q", format!("{name} {year}"))])
        .ok()
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellar_inventory::{Color, Position};

    #[tokio::test]
    async fn ids_are_assigned_sequentially() {
        let gateway = InMemoryGateway::new();

        let a = gateway.create(&BottleDraft::new("Chablis", 2019)).await.unwrap();
        let margaux = BottleDraft::new("Margaux", 2015).with_color(Color::Red);
        let b = gateway.create(&margaux).await.unwrap();

        assert_eq!(a.id(), BottleId::new(1));
        assert_eq!(b.id(), BottleId::new(2));
        assert_eq!(b.color(), Color::Red);
        assert_eq!(
            a.vivino_url(),
            Some("https://www.vivino.com/search/wines?q=Chablis+2019")
        );
    }

    #[tokio::test]
    async fn position_patch_does_not_clear_previous_occupant() {
        let gateway = InMemoryGateway::new();
        let cell = Position::new(2, 2);
        let a = gateway
            .seed(BottleDraft::new("A", 2000), |b| b.with_position(Some(cell)))
            .unwrap();
        let b = gateway.seed(BottleDraft::new("B", 2001), |b| b).unwrap();

        gateway.patch(b.id(), &BottlePatch::new().place_at(cell)).await.unwrap();

        let records = gateway.records();
        assert_eq!(records[0].id(), a.id());
        assert_eq!(records[0].position(), Some(cell));
        assert_eq!(records[1].position(), Some(cell));
    }

    #[tokio::test]
    async fn unknown_ids_answer_not_found() {
        let gateway = InMemoryGateway::new();
        let err = gateway.delete(BottleId::new(9)).await.unwrap_err();
        assert_eq!(err, GatewayError::api(404, "bottle not found"));
    }

    #[tokio::test]
    async fn rating_lookup_counts_failures() {
        let gateway = InMemoryGateway::new().with_rating("chablis", 4.2);
        gateway.seed(BottleDraft::new("Chablis", 2019), |b| b).unwrap();
        gateway.seed(BottleDraft::new("Obscure", 2003), |b| b).unwrap();

        let summary = gateway.fetch_all_ratings().await.unwrap();
        assert_eq!(summary, RatingSummary { updated: 1, failed: 1 });
        assert_eq!(gateway.records()[0].raw_rating(), 4.2);
    }

    #[tokio::test]
    async fn injected_failure_is_one_shot_and_recorded() {
        let gateway = InMemoryGateway::new();
        gateway.fail_matching(|c| c.is_list(), GatewayError::api(503, "maintenance"));

        assert_eq!(gateway.list().await.unwrap_err().to_string(), "maintenance");
        assert!(gateway.list().await.is_ok());
        assert_eq!(gateway.calls(), vec![GatewayCall::List, GatewayCall::List]);
    }
}
