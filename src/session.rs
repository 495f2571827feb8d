// Filter session: the locally cached department and delivery sets plus the
// guard that keeps a slow, superseded fetch from overwriting newer data.
use crate::client::DataService;
use crate::error::DashboardResult;
use crate::filters::FilterState;
use crate::types::{DeliveryRecord, Department};

/// Token handed out when a fetch starts; only the newest one may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied { records: usize },
    Stale,
    Failed,
}

pub struct FetchData {
    pub departments: Vec<Department>,
    pub records: Vec<DeliveryRecord>,
}

#[derive(Default)]
pub struct DashboardSession {
    filters: FilterState,
    departments: Vec<Department>,
    records: Vec<DeliveryRecord>,
    issued: u64,
    applied: Option<FetchTicket>,
}

impl DashboardSession {
    pub fn new(filters: FilterState) -> Self {
        Self {
            filters,
            ..Self::default()
        }
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut FilterState {
        &mut self.filters
    }

    pub fn departments(&self) -> &[Department] {
        &self.departments
    }

    pub fn records(&self) -> &[DeliveryRecord] {
        &self.records
    }

    pub fn has_data(&self) -> bool {
        self.applied.is_some()
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.issued += 1;
        FetchTicket(self.issued)
    }

    /// Store a fetch result if `ticket` is still the latest one issued.
    pub fn apply_fetch(
        &mut self,
        ticket: FetchTicket,
        result: DashboardResult<FetchData>,
    ) -> FetchOutcome {
        if ticket.0 != self.issued {
            tracing::debug!(ticket = ticket.0, latest = self.issued, "dropping stale fetch result");
            return FetchOutcome::Stale;
        }
        match result {
            Ok(data) => {
                let fetched = data.records.len();
                self.departments = data.departments;
                self.records = data
                    .records
                    .into_iter()
                    .filter(|r| self.filters.matches(r))
                    .collect();
                self.applied = Some(ticket);
                if fetched != self.records.len() {
                    tracing::debug!(
                        fetched,
                        kept = self.records.len(),
                        "period range narrowed fetched rows"
                    );
                }
                FetchOutcome::Applied {
                    records: self.records.len(),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load dashboard data; keeping previous state");
                FetchOutcome::Failed
            }
        }
    }

    /// Run one fetch cycle against `service` with the current filters.
    pub async fn refresh(&mut self, service: &dyn DataService) -> FetchOutcome {
        let ticket = self.begin_fetch();
        let result = load(service, &self.filters).await;
        self.apply_fetch(ticket, result)
    }
}

async fn load(service: &dyn DataService, filters: &FilterState) -> DashboardResult<FetchData> {
    let query = filters.build_query()?;
    let departments = service.fetch_departments().await?;
    let records = service.fetch_deliveries(&query).await?;
    Ok(FetchData {
        departments,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::record;
    use crate::error::DashboardError;
    use crate::filters::{DeliveryQuery, PeriodRange};
    use crate::status::Status;
    use crate::types::Period;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn data(ids: &[&str]) -> FetchData {
        FetchData {
            departments: Vec::new(),
            records: ids
                .iter()
                .map(|id| record(id, Some("A"), Status::Completed, Some(100.0), 2025, 1))
                .collect(),
        }
    }

    #[test]
    fn stale_response_does_not_overwrite_newer_state() {
        let mut session = DashboardSession::default();
        let first = session.begin_fetch();
        let second = session.begin_fetch();

        assert_eq!(
            session.apply_fetch(second, Ok(data(&["new"]))),
            FetchOutcome::Applied { records: 1 }
        );
        assert_eq!(session.apply_fetch(first, Ok(data(&["old", "older"]))), FetchOutcome::Stale);
        assert_eq!(session.records()[0].id, "new");
    }

    #[test]
    fn failure_keeps_previous_cache() {
        let mut session = DashboardSession::default();
        let t1 = session.begin_fetch();
        session.apply_fetch(t1, Ok(data(&["kept"])));

        let t2 = session.begin_fetch();
        let outcome = session.apply_fetch(t2, Err(DashboardError::Fetch("offline".into())));
        assert_eq!(outcome, FetchOutcome::Failed);
        assert_eq!(session.records().len(), 1);
        assert!(session.has_data());
    }

    #[test]
    fn applied_rows_are_narrowed_by_period_range() {
        let mut session = DashboardSession::new(FilterState {
            range: Some(PeriodRange {
                start: Period { year: 2025, month: 2 },
                end: Period { year: 2025, month: 6 },
            }),
            ..FilterState::default()
        });
        let ticket = session.begin_fetch();
        let fetched = FetchData {
            departments: Vec::new(),
            records: vec![
                record("1", Some("A"), Status::Completed, None, 2025, 1),
                record("2", Some("A"), Status::Completed, None, 2025, 3),
            ],
        };
        assert_eq!(
            session.apply_fetch(ticket, Ok(fetched)),
            FetchOutcome::Applied { records: 1 }
        );
        assert_eq!(session.records()[0].id, "2");
    }

    struct CountingService {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DataService for CountingService {
        async fn fetch_departments(&self) -> DashboardResult<Vec<Department>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn fetch_deliveries(
            &self,
            _query: &DeliveryQuery,
        ) -> DashboardResult<Vec<DeliveryRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(data(&["x", "y"]).records)
        }
    }

    #[tokio::test]
    async fn refresh_loads_through_the_service() {
        let service = CountingService {
            calls: AtomicUsize::new(0),
        };
        let mut session = DashboardSession::default();
        let outcome = session.refresh(&service).await;
        assert_eq!(outcome, FetchOutcome::Applied { records: 2 });
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalid_filters_fail_before_any_request() {
        let service = CountingService {
            calls: AtomicUsize::new(0),
        };
        let mut session = DashboardSession::default();
        session.filters_mut().toggle_month(0);
        assert_eq!(session.refresh(&service).await, FetchOutcome::Failed);
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }
}
