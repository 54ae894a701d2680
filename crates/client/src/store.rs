//! Client-side inventory store.
//!
//! The store owns the local collection of bottles and is the only component that
//! mutates it. Every operation either commits a state consistent with the server
//! or fails and leaves the collection exactly as it was.
//!
//! Two reconciliation paths exist:
//! - a full record the server has already returned is merged in place;
//! - anything else (creation, partial patches, bulk rating refresh) is followed
//!   by a complete reload, so server-side defaults are never re-implemented here.
//!
//! Mutating operations take `&mut self`: callers serialize them, there is no
//! internal locking.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::watch;

use cellar_core::{BottleId, DomainError};
use cellar_inventory::{
    sorted, BottleChange, BottleDraft, BottlePatch, BottleRecord, PlacementPlan, Position,
    RackDimensions, RackOccupancy, SortState,
};

use crate::gateway::{GatewayError, RatingSummary, RemoteGateway};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Rejected client-side; no request was sent.
    #[error(transparent)]
    Validation(#[from] DomainError),
    /// The gateway call failed; the message comes from the server when it sent one.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Result of a reload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied { count: usize },
    /// The store was retired while the request was in flight; the response was dropped.
    Discarded,
}

/// Committed state of the collection, published after every change.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub bottles: Arc<Vec<BottleRecord>>,
    pub revision: u64,
    pub refreshed_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn sorted(&self, state: SortState) -> Vec<&BottleRecord> {
        sorted(&self.bottles, state)
    }

    pub fn occupancy(&self, rack: RackDimensions) -> RackOccupancy<'_> {
        RackOccupancy::build(rack, &self.bottles)
    }
}

/// Handle used by the owner of a store to invalidate in-flight loads (teardown).
#[derive(Debug, Clone)]
pub struct StoreLifecycle {
    epoch: Arc<AtomicU64>,
}

impl StoreLifecycle {
    /// Any load already waiting on the gateway will discard its response.
    pub fn retire(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct InventoryStore<G> {
    gateway: G,
    rack: RackDimensions,
    bottles: Vec<BottleRecord>,
    revision: u64,
    epoch: Arc<AtomicU64>,
    snapshots: watch::Sender<Snapshot>,
}

impl<G> core::fmt::Debug for InventoryStore<G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InventoryStore")
            .field("rack", &self.rack)
            .field("bottles", &self.bottles.len())
            .field("revision", &self.revision)
            .finish()
    }
}

impl<G: RemoteGateway> InventoryStore<G> {
    /// Create an empty store. Call [`InventoryStore::load`] to populate it.
    pub fn new(gateway: G, rack: RackDimensions) -> Self {
        let (snapshots, _) = watch::channel(Snapshot {
            bottles: Arc::new(Vec::new()),
            revision: 0,
            refreshed_at: Utc::now(),
        });
        Self {
            gateway,
            rack,
            bottles: Vec::new(),
            revision: 0,
            epoch: Arc::new(AtomicU64::new(0)),
            snapshots,
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn rack(&self) -> RackDimensions {
        self.rack
    }

    pub fn bottles(&self) -> &[BottleRecord] {
        &self.bottles
    }

    pub fn get(&self, id: BottleId) -> Option<&BottleRecord> {
        self.bottles.iter().find(|b| b.id() == id)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn sorted(&self, state: SortState) -> Vec<&BottleRecord> {
        sorted(&self.bottles, state)
    }

    pub fn occupancy(&self) -> RackOccupancy<'_> {
        RackOccupancy::build(self.rack, &self.bottles)
    }

    /// Receive a [`Snapshot`] after every committed change.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    pub fn lifecycle(&self) -> StoreLifecycle {
        StoreLifecycle {
            epoch: Arc::clone(&self.epoch),
        }
    }

    /// Replace the whole collection with the server's list.
    pub async fn load(&mut self) -> Result<LoadOutcome, StoreError> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let fresh = self.gateway.list().await?;

        if self.epoch.load(Ordering::SeqCst) != epoch {
            tracing::warn!(
                count = fresh.len(),
                "discarding bottle list that arrived after retirement"
            );
            return Ok(LoadOutcome::Discarded);
        }

        let mut seen = HashSet::with_capacity(fresh.len());
        if let Some(dup) = fresh.iter().find(|b| !seen.insert(b.id())) {
            let msg = format!("bottle id {} listed twice", dup.id());
            return Err(DomainError::invariant(msg).into());
        }

        let count = fresh.len();
        self.bottles = fresh;
        self.publish();
        tracing::info!(count, revision = self.revision, "inventory loaded");
        Ok(LoadOutcome::Applied { count })
    }

    /// Create a bottle, then reload so the server decides ids and defaults.
    pub async fn add(&mut self, draft: &BottleDraft) -> Result<BottleId, StoreError> {
        let draft = draft.validated()?;
        let created = self.gateway.create(&draft).await?;
        tracing::info!(id = %created.id(), name = created.name(), "bottle created");

        self.load().await?;
        Ok(created.id())
    }

    /// Reconcile a change of bottle `id`.
    ///
    /// A [`BottleChange::FullReplacement`] is merged in place without a request.
    /// A [`BottleChange::PartialPatch`] is sent to the server and followed by a
    /// full reload; the patch is never merged locally.
    pub async fn apply_change(
        &mut self,
        id: BottleId,
        change: BottleChange,
    ) -> Result<(), StoreError> {
        match change {
            BottleChange::FullReplacement(record) => self.merge(id, record),
            BottleChange::PartialPatch(patch) => {
                patch.validate(self.rack)?;
                self.gateway.patch(id, &patch).await?;
                tracing::info!(%id, "bottle patched");
                self.load().await?;
                Ok(())
            }
        }
    }

    fn merge(&mut self, id: BottleId, record: BottleRecord) -> Result<(), StoreError> {
        if record.id() != id {
            return Err(DomainError::invariant(format!(
                "record {} cannot replace bottle {id}",
                record.id()
            ))
            .into());
        }

        match self.bottles.iter_mut().find(|b| b.id() == id) {
            Some(slot) => {
                *slot = record;
                self.publish();
                tracing::debug!(%id, "merged full record");
            }
            None => tracing::debug!(%id, "full record for a bottle not in the collection ignored"),
        }
        Ok(())
    }

    /// Delete a bottle. Confirmation is the caller's business.
    pub async fn remove(&mut self, id: BottleId) -> Result<(), StoreError> {
        self.gateway.delete(id).await?;

        let before = self.bottles.len();
        self.bottles.retain(|b| b.id() != id);
        if self.bottles.len() != before {
            self.publish();
        }
        tracing::info!(%id, "bottle deleted");
        Ok(())
    }

    /// Append a comment. Blank text is a no-op and returns `false`.
    pub async fn add_comment_to(&mut self, id: BottleId, text: &str) -> Result<bool, StoreError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(false);
        }

        let record = self.gateway.add_comment(id, text).await?;
        self.apply_change(id, BottleChange::FullReplacement(record)).await?;
        Ok(true)
    }

    /// Run the external rating lookup for one bottle and merge the result.
    pub async fn refresh_rating(&mut self, id: BottleId) -> Result<(), StoreError> {
        let record = self.gateway.fetch_rating(id).await?;
        tracing::info!(%id, rating = record.raw_rating(), "rating refreshed");
        self.apply_change(id, BottleChange::FullReplacement(record)).await
    }

    /// Same as [`InventoryStore::refresh_rating`].
    pub async fn refresh_one(&mut self, id: BottleId) -> Result<(), StoreError> {
        self.refresh_rating(id).await
    }

    /// Refresh every rating, then reload regardless of the counts.
    pub async fn refresh_all_ratings(&mut self) -> Result<RatingSummary, StoreError> {
        let summary = self.gateway.fetch_all_ratings().await?;
        tracing::info!(updated = summary.updated, failed = summary.failed, "ratings refreshed");

        self.load().await?;
        Ok(summary)
    }

    /// Move bottle `id` into `target`, clearing every bottle that sits there first.
    ///
    /// If clearing or the move itself fails, the bottles already cleared are put
    /// back and the original error is returned.
    pub async fn place(
        &mut self,
        id: BottleId,
        target: Position,
    ) -> Result<PlacementPlan, StoreError> {
        if self.get(id).is_none() {
            return Err(DomainError::not_found(id).into());
        }
        let plan = self.occupancy().plan_placement(id, target)?;
        if plan.unchanged {
            return Ok(plan);
        }
        if plan.displaced.is_empty() {
            self.apply_change(id, BottlePatch::new().place_at(target).into()).await?;
            return Ok(plan);
        }

        let mut cleared = Vec::with_capacity(plan.displaced.len());
        for &displaced in &plan.displaced {
            let unplace = BottlePatch::new().unplace();
            if let Err(err) = self.gateway.patch(displaced, &unplace).await {
                self.restore(&cleared, target).await;
                return Err(err.into());
            }
            tracing::info!(bottle = %id, %displaced, cell = %target, "cleared cell for placement");
            cleared.push(displaced);
        }

        let place = BottlePatch::new().place_at(target);
        if let Err(err) = self.gateway.patch(id, &place).await {
            self.restore(&cleared, target).await;
            return Err(err.into());
        }

        self.load().await?;
        Ok(plan)
    }

    /// Put bottles cleared for a failed placement back into `target`.
    async fn restore(&self, cleared: &[BottleId], target: Position) {
        let patch = BottlePatch::new().place_at(target);
        for &displaced in cleared {
            match self.gateway.patch(displaced, &patch).await {
                Ok(_) => tracing::info!(%displaced, cell = %target, "restored displaced bottle"),
                Err(restore) => tracing::warn!(
                    %displaced,
                    cell = %target,
                    error = %restore,
                    "failed to restore displaced bottle"
                ),
            }
        }
    }

    /// Take a bottle out of the rack.
    pub async fn unplace(&mut self, id: BottleId) -> Result<(), StoreError> {
        self.apply_change(id, BottlePatch::new().unplace().into()).await
    }

    fn publish(&mut self) {
        self.revision += 1;

        let occupancy = RackOccupancy::build(self.rack, &self.bottles);
        for collision in occupancy.collisions() {
            tracing::warn!(
                cell = %collision.position,
                occupant = %collision.occupant,
                shadowed = %collision.shadowed,
                "rack cell claimed by two bottles"
            );
        }
        for id in occupancy.out_of_rack() {
            tracing::warn!(%id, "bottle positioned outside the rack");
        }

        self.snapshots.send_replace(Snapshot {
            bottles: Arc::new(self.bottles.clone()),
            revision: self.revision,
            refreshed_at: Utc::now(),
        });
    }
}
