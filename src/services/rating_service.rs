// src/services/rating_service.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing;

use crate::{
    errors::GrievanceResult,
    models::rating::OfficerRatings,
    services::store_service::{StoreKeys, StoreService, WriteBatch},
};

#[async_trait]
pub trait RatingOperations: Send + Sync {
    /// A missing ledger reads as an empty one.
    async fn get_ledger(&self, officer_id: &str) -> GrievanceResult<OfficerRatings>;

    /// Append a rating to the officer ledger inside the caller's batch.
    /// The ledger write is guarded, so two ratings racing on one officer can't both land.
    async fn stage_rating(
        &self,
        batch: &mut WriteBatch,
        officer_id: &str,
        stars: u8,
        complaint_id: &str,
        citizen_id: &str,
        at: DateTime<Utc>,
    ) -> GrievanceResult<OfficerRatings>;
}

pub struct RatingService {
    store_service: Arc<StoreService>,
}

impl RatingService {
    pub fn new(store_service: Arc<StoreService>) -> Self {
        Self { store_service }
    }
}

#[async_trait]
impl RatingOperations for RatingService {
    async fn get_ledger(&self, officer_id: &str) -> GrievanceResult<OfficerRatings> {
        Ok(self
            .store_service
            .get(&StoreKeys::officer_ratings(officer_id))
            .await?
            .unwrap_or_else(|| OfficerRatings::empty(officer_id)))
    }

    async fn stage_rating(
        &self,
        batch: &mut WriteBatch,
        officer_id: &str,
        stars: u8,
        complaint_id: &str,
        citizen_id: &str,
        at: DateTime<Utc>,
    ) -> GrievanceResult<OfficerRatings> {
        let key = StoreKeys::officer_ratings(officer_id);
        let mut ledger = match self.store_service.load::<OfficerRatings>(&key).await? {
            Some(snapshot) => {
                batch.guard(snapshot.guard());
                snapshot.into_inner()
            }
            None => {
                batch.expect_absent(&key);
                OfficerRatings::empty(officer_id)
            }
        };

        ledger.add_rating(stars, complaint_id, citizen_id, at)?;
        batch.set(&key, &ledger)?;

        tracing::debug!(
            "Staged {} star rating for officer {} (avg {:.2} over {})",
            stars,
            officer_id,
            ledger.avg_rating,
            ledger.entries.len()
        );
        Ok(ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GrievanceError;

    #[tokio::test]
    async fn test_staged_ratings_accumulate() {
        let store = Arc::new(StoreService::memory());
        let ratings: Arc<dyn RatingOperations> = Arc::new(RatingService::new(store.clone()));
        assert!(ratings.get_ledger("off-250101-abc12").await.unwrap().entries.is_empty());

        let mut batch = WriteBatch::new();
        ratings
            .stage_rating(&mut batch, "off-250101-abc12", 5, "cmp-1", "cit-1", Utc::now())
            .await
            .unwrap();
        store.commit(batch).await.unwrap();

        let mut batch = WriteBatch::new();
        let ledger = ratings
            .stage_rating(&mut batch, "off-250101-abc12", 2, "cmp-2", "cit-1", Utc::now())
            .await
            .unwrap();
        assert!((ledger.avg_rating - 3.5).abs() < f64::EPSILON);
        store.commit(batch).await.unwrap();

        let stored = ratings.get_ledger("off-250101-abc12").await.unwrap();
        assert_eq!(stored.entries.len(), 2);
    }

    #[tokio::test]
    async fn test_racing_first_ratings_conflict() {
        let store = Arc::new(StoreService::memory());
        let ratings = RatingService::new(store.clone());

        let mut first = WriteBatch::new();
        ratings
            .stage_rating(&mut first, "off-250101-abc12", 4, "cmp-1", "cit-1", Utc::now())
            .await
            .unwrap();
        let mut second = WriteBatch::new();
        ratings
            .stage_rating(&mut second, "off-250101-abc12", 1, "cmp-2", "cit-2", Utc::now())
            .await
            .unwrap();

        store.commit(first).await.unwrap();
        assert!(matches!(
            store.commit(second).await.unwrap_err(),
            GrievanceError::WriteConflict(_)
        ));
        assert_eq!(ratings.get_ledger("off-250101-abc12").await.unwrap().entries.len(), 1);
    }
}
