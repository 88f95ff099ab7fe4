// src/services/dashboard_service.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    common::error::AppError,
    db::Repository,
    models::{dashboard::DashboardSnapshot, lease::LeaseFilter},
    services::snapshots::SnapshotBuilder,
};

#[derive(Clone)]
pub struct DashboardService {
    repo: Arc<dyn Repository>,
    latest: i64,
}

// 00:00 UTC do dia corrente
fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

impl DashboardService {
    pub fn new(repo: Arc<dyn Repository>, latest: i64) -> Self {
        Self { repo, latest: latest.max(1) }
    }

    pub async fn get_snapshot(&self) -> Result<DashboardSnapshot, AppError> {
        let mut tx = self.repo.begin().await?;
        let mut builder = SnapshotBuilder::new();

        let leases = tx
            .list_leases(&LeaseFilter { limit: Some(self.latest), ..LeaseFilter::default() })
            .await?;
        let latest_leases = builder.leases(tx.as_mut(), leases).await?;

        let items = tx.recent_items(self.latest).await?;
        let recently_added_items = builder.items(tx.as_mut(), items).await?;

        let items_in_armory = tx.total_available().await?;
        let leased_today = tx.count_leases_since(start_of_day(Utc::now())).await?;

        tx.commit().await?;

        Ok(DashboardSnapshot {
            latest_leases,
            recently_added_items,
            items_in_armory,
            leased_today,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::MemoryRepository,
        models::lease::ReservationRequest,
        services::{change_notifier::ChangeNotifier, lease_service::LeaseService, stock_ledger::StockLedger},
    };
    use chrono::TimeZone;

    #[test]
    fn start_of_day_truncates_to_midnight_utc() {
        let now = Utc.with_ymd_and_hms(2025, 2, 16, 17, 45, 12).unwrap();
        assert_eq!(start_of_day(now), Utc.with_ymd_and_hms(2025, 2, 16, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn snapshot_reflects_demo_data_and_new_leases() {
        let repo = MemoryRepository::new();
        let user = repo.seed_demo().await.unwrap();
        let repo: Arc<dyn Repository> = Arc::new(repo);
        let dashboard = DashboardService::new(repo.clone(), 2);

        let empty = dashboard.get_snapshot().await.unwrap();
        assert!(empty.latest_leases.is_empty());
        assert_eq!(empty.recently_added_items.len(), 2);
        assert_eq!(empty.items_in_armory, 25);
        assert_eq!(empty.leased_today, 0);

        let rope = {
            let mut tx = repo.begin().await.unwrap();
            let items = tx.list_items(&Default::default()).await.unwrap();
            items.into_iter().find(|i| i.name == "Rope50m").unwrap()
        };
        let leases = LeaseService::new(repo, StockLedger::new(), ChangeNotifier::new(4));
        for _ in 0..3 {
            leases
                .create_lease(user.id, &[ReservationRequest { item_id: rope.id, quantity: 1 }])
                .await
                .unwrap();
        }

        let snapshot = dashboard.get_snapshot().await.unwrap();
        assert_eq!(snapshot.latest_leases.len(), 2);
        assert_eq!(snapshot.items_in_armory, 22);
        assert_eq!(snapshot.leased_today, 3);
        assert_eq!(snapshot.latest_leases[0].user.id, user.id);
    }
}
