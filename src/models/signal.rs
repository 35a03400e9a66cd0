use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{SignalKey, TradeSignal};

/// One or more same-key TradeSignals collapsed within an aggregation window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedSignal {
    pub key: SignalKey,
    /// Outcome token; the key's order book, so every member shares it.
    pub outcome_id: String,
    /// Sum of member sizes.
    pub net_size_usd: Decimal,
    /// Size-weighted mean price of the members.
    pub price: Decimal,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Contributing TradeSignal ids, in arrival order.
    pub member_ids: Vec<String>,
    /// Earliest detection time among members.
    pub first_detected_at: DateTime<Utc>,
}

impl AggregatedSignal {
    /// Open an aggregate from its first member.
    pub fn open(signal: &TradeSignal, window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> Self {
        Self {
            key: signal.key(),
            outcome_id: signal.outcome_id.clone(),
            net_size_usd: signal.size_usd,
            price: signal.price,
            window_start,
            window_end,
            member_ids: vec![signal.id.clone()],
            first_detected_at: signal.detected_at,
        }
    }

    /// Trivial one-member aggregate used when aggregation is disabled.
    pub fn single(signal: &TradeSignal) -> Self {
        Self::open(signal, signal.detected_at, signal.detected_at)
    }

    /// Fold another same-key member into the aggregate.
    pub fn absorb(&mut self, signal: &TradeSignal) {
        let total = self.net_size_usd + signal.size_usd;
        if !total.is_zero() {
            self.price = (self.price * self.net_size_usd + signal.price * signal.size_usd) / total;
        }
        self.net_size_usd = total;
        self.member_ids.push(signal.id.clone());
        if signal.detected_at < self.first_detected_at {
            self.first_detected_at = signal.detected_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfirmationState, Side, SourceType};

    fn signal(id: &str, size: i64, price: Decimal) -> TradeSignal {
        TradeSignal {
            id: id.into(),
            source: SourceType::Live,
            account: "0xabc".into(),
            market_id: "123".into(),
            outcome_id: "123".into(),
            side: Side::Buy,
            size_usd: Decimal::from(size),
            price,
            detected_at: Utc::now(),
            confirmation: ConfirmationState::Pending,
        }
    }

    #[test]
    fn absorb_sums_sizes_and_weights_price() {
        let first = signal("0x1", 100, Decimal::new(40, 2));
        let mut agg = AggregatedSignal::single(&first);
        agg.absorb(&signal("0x2", 300, Decimal::new(60, 2)));

        assert_eq!(agg.net_size_usd, Decimal::from(400));
        // (0.40 * 100 + 0.60 * 300) / 400 = 0.55
        assert_eq!(agg.price, Decimal::new(55, 2));
        assert_eq!(agg.member_ids, vec!["0x1".to_string(), "0x2".to_string()]);
    }
}
