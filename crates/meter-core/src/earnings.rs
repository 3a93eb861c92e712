//! Earnings book
//!
//! Read side of advisor earnings plus the payout hook used once an external
//! approval has gone through.

use meter_api::{Earning, EarningStatus, EarningsSummary};
use meter_store::{AuditEvent, AuditEventType, Store, Withdrawal};
use meter_util::{ActorId, EarningId, SessionId};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::CoreResult;

const SECONDS_PER_HOUR: u64 = 3600;

#[derive(Clone)]
pub struct EarningsBook {
    store: Arc<dyn Store>,
    currency: String,
}

impl EarningsBook {
    pub fn new(store: Arc<dyn Store>, currency: impl Into<String>) -> Self {
        Self {
            store,
            currency: currency.into(),
        }
    }

    pub fn for_advisor(
        &self,
        advisor: &ActorId,
        status: Option<EarningStatus>,
    ) -> CoreResult<Vec<Earning>> {
        Ok(self.store.get_earnings(advisor, status)?)
    }

    pub fn for_session(&self, session_id: &SessionId) -> CoreResult<Option<Earning>> {
        Ok(self.store.get_session_earning(session_id)?)
    }

    pub fn summary(&self, advisor: &ActorId) -> CoreResult<EarningsSummary> {
        let earnings = self.store.get_earnings(advisor, None)?;
        Ok(summarize(&earnings))
    }

    /// Pay out the listed earnings to the advisor's wallet
    ///
    /// Unknown ids, other advisors' earnings and already withdrawn ones are
    /// skipped.
    pub fn withdraw(&self, advisor: &ActorId, ids: &[EarningId]) -> CoreResult<Withdrawal> {
        let withdrawal =
            self.store
                .withdraw_earnings(advisor, ids, &self.currency, meter_util::now())?;

        if !withdrawal.earnings.is_empty() {
            let _ = self
                .store
                .append_audit(AuditEvent::new(AuditEventType::EarningsWithdrawn {
                    advisor_id: advisor.clone(),
                    count: withdrawal.earnings.len(),
                    amount: withdrawal.amount,
                }));
        }

        info!(
            advisor_id = %advisor,
            requested = ids.len(),
            withdrawn = withdrawal.earnings.len(),
            amount = %withdrawal.amount,
            "Earnings withdrawn"
        );
        Ok(withdrawal)
    }
}

fn summarize(earnings: &[Earning]) -> EarningsSummary {
    let mut summary = EarningsSummary::default();
    let mut seconds = 0u64;

    for earning in earnings {
        match earning.status {
            EarningStatus::Pending => summary.total_pending += earning.amount,
            EarningStatus::Completed => summary.total_completed += earning.amount,
            EarningStatus::Withdrawn => summary.total_withdrawn += earning.amount,
        }
        seconds += earning.duration_seconds;
    }

    summary.total_earnings = summary.total_completed + summary.total_withdrawn;
    summary.available_for_withdrawal = summary.total_completed;
    summary.total_sessions = earnings.len() as u32;
    summary.total_hours = Decimal::from(seconds) / Decimal::from(SECONDS_PER_HOUR);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NullSink, SessionManager};
    use meter_api::{ChannelKind, TransactionKind};
    use meter_config::BillingPolicy;
    use meter_store::SqliteStore;
    use rust_decimal_macros::dec;

    struct Fixture {
        store: Arc<dyn Store>,
        manager: Arc<SessionManager>,
        book: EarningsBook,
        advisor: ActorId,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let manager = SessionManager::new(store.clone(), BillingPolicy::default(), Arc::new(NullSink));
        Fixture {
            store: store.clone(),
            manager: Arc::new(manager),
            book: EarningsBook::new(store, "USD"),
            advisor: ActorId::new("advisor"),
        }
    }

    impl Fixture {
        /// Run a session for `ticks` one-minute ticks at $1/min and end it
        fn settle(&self, client: &str, ticks: usize) -> Earning {
            let client = ActorId::new(client);
            self.manager.ledger().credit(&client, dec!(10), None).unwrap();
            let session = self
                .manager
                .create(&client, &self.advisor, ChannelKind::Chat, dec!(1))
                .unwrap();
            for _ in 0..ticks {
                self.manager.tick(&session.id).unwrap();
            }
            self.manager.end(&session.id, None).unwrap().earning
        }
    }

    #[test]
    fn empty_summary_is_zero() {
        let f = fixture();
        assert_eq!(f.book.summary(&f.advisor).unwrap(), EarningsSummary::default());
    }

    #[test]
    fn summary_groups_by_status() {
        let f = fixture();
        let first = f.settle("c1", 3);
        f.settle("c2", 3);

        let summary = f.book.summary(&f.advisor).unwrap();
        assert_eq!(summary.total_pending, dec!(5.4));
        assert_eq!(summary.total_sessions, 2);
        assert_eq!(summary.total_hours, dec!(0.1));
        assert_eq!(summary.available_for_withdrawal, Decimal::ZERO);

        f.book.withdraw(&f.advisor, &[first.id.clone()]).unwrap();
        let summary = f.book.summary(&f.advisor).unwrap();
        assert_eq!(summary.total_pending, dec!(2.7));
        assert_eq!(summary.total_withdrawn, dec!(2.7));
        assert_eq!(summary.total_earnings, dec!(2.7));
    }

    #[test]
    fn withdraw_credits_advisor_once() {
        let f = fixture();
        let earning = f.settle("c1", 2);
        assert_eq!(
            f.book.for_session(&earning.session_id).unwrap().map(|e| e.id),
            Some(earning.id.clone())
        );

        let withdrawal = f.book.withdraw(&f.advisor, &[earning.id.clone()]).unwrap();
        assert_eq!(withdrawal.amount, dec!(1.8));
        assert_eq!(withdrawal.earnings[0].status, EarningStatus::Withdrawn);
        assert!(withdrawal.earnings[0].withdrawn_at.is_some());

        let again = f.book.withdraw(&f.advisor, &[earning.id]).unwrap();
        assert!(again.earnings.is_empty());
        assert!(again.transaction.is_none());

        let ledger = f.manager.ledger();
        assert_eq!(ledger.balance(&f.advisor).unwrap(), dec!(1.8));
        let history = ledger.transactions(&f.advisor, None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TransactionKind::Earning);

        // Only the withdrawal that moved money is audited
        let withdrawals: Vec<_> = f
            .store
            .get_recent_audits(20)
            .unwrap()
            .into_iter()
            .filter_map(|a| match a.event {
                AuditEventType::EarningsWithdrawn { count, amount, .. } => Some((count, amount)),
                _ => None,
            })
            .collect();
        assert_eq!(withdrawals, vec![(1, dec!(1.8))]);
    }

    #[test]
    fn concurrent_settlements_accumulate_pending() {
        let f = fixture();
        let mut sessions = Vec::new();
        for (client, rate) in [("c1", dec!(10)), ("c2", dec!(20))] {
            let client = ActorId::new(client);
            f.manager.ledger().credit(&client, dec!(50), None).unwrap();
            let session = f
                .manager
                .create(&client, &f.advisor, ChannelKind::Video, rate)
                .unwrap();
            f.manager.tick(&session.id).unwrap();
            sessions.push(session.id);
        }

        let handles: Vec<_> = sessions
            .into_iter()
            .map(|id| {
                let manager = f.manager.clone();
                std::thread::spawn(move || manager.end(&id, None).unwrap().earning.amount)
            })
            .collect();
        let mut amounts: Vec<Decimal> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        amounts.sort();
        assert_eq!(amounts, vec![dec!(9), dec!(18)]);

        let summary = f.book.summary(&f.advisor).unwrap();
        assert_eq!(summary.total_pending, dec!(27));
        assert_eq!(summary.total_sessions, 2);
        assert_eq!(
            f.book
                .for_advisor(&f.advisor, Some(EarningStatus::Pending))
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn withdraw_ignores_other_advisors() {
        let f = fixture();
        let earning = f.settle("c1", 1);

        let stranger = ActorId::new("someone-else");
        let withdrawal = f.book.withdraw(&stranger, &[earning.id, EarningId::new()]).unwrap();
        assert!(withdrawal.earnings.is_empty());
        assert_eq!(withdrawal.amount, Decimal::ZERO);
        assert_eq!(
            f.book
                .for_advisor(&f.advisor, Some(EarningStatus::Pending))
                .unwrap()
                .len(),
            1
        );
    }
}
