use std::collections::HashSet;

use alloy::primitives::{hex, Address, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use chrono::Utc;
use rust_decimal::Decimal;

use crate::models::{ConfirmationState, Side, SourceType, TradeSignal};
use crate::ports::{DecodeResult, RawTransaction, TxDecoder};

/// CTF Exchange contract on Polygon.
pub const CTF_EXCHANGE: &str = "0x4bfb41d5b3570defd03c39a9a4d8de6bd8b8982e";

/// NegRisk CTF Exchange contract on Polygon.
pub const NEG_RISK_CTF_EXCHANGE: &str = "0xc5d563a36ae78145c45a50134d48a1215220f80a";

/// USDC and CTF outcome tokens on Polygon both have 6 decimals.
const AMOUNT_DECIMALS: u32 = 6;

sol! {
    struct Order {
        uint256 salt;
        address maker;
        address signer;
        address taker;
        uint256 tokenId;
        uint256 makerAmount;
        uint256 takerAmount;
        uint256 expiration;
        uint256 nonce;
        uint256 feeRateBps;
        uint8 side;
        uint8 signatureType;
        bytes signature;
    }

    function fillOrder(Order order, uint256 fillAmount);
    function fillOrders(Order[] orders, uint256[] fillAmounts);
    function matchOrders(Order takerOrder, Order[] makerOrders, uint256 takerFillAmount, uint256[] makerFillAmounts);
}

/// Decodes pending CTF Exchange order-fill calls into TradeSignals for
/// watched makers.
pub struct CtfOrderDecoder {
    watched: HashSet<String>,
}

/// One order's contribution, valued in USD.
struct Fill {
    account: String,
    outcome_id: String,
    side: Side,
    size_usd: Decimal,
    price: Decimal,
}

impl CtfOrderDecoder {
    pub fn new(watched_accounts: &[String]) -> Self {
        Self {
            watched: watched_accounts.iter().map(|a| a.to_lowercase()).collect(),
        }
    }

    fn watched_party(&self, order: &Order) -> Option<String> {
        [order.maker, order.signer]
            .iter()
            .map(format_address)
            .find(|addr| self.watched.contains(addr))
    }

    fn sender_watched(&self, tx: &RawTransaction) -> Option<String> {
        let from = tx.from.as_deref()?.to_lowercase();
        self.watched.contains(&from).then_some(from)
    }

    /// Every order (with its fill amount) placed by a watched maker or
    /// signer. When there is none, a watched sender claims the first order.
    fn watched_orders<'a>(
        &self,
        tx: &RawTransaction,
        orders: impl IntoIterator<Item = (&'a Order, U256)>,
    ) -> Vec<(&'a Order, U256, String)> {
        let mut first = None;
        let mut matched = Vec::new();
        for (order, fill) in orders {
            match self.watched_party(order) {
                Some(account) => matched.push((order, fill, account)),
                None => {
                    first.get_or_insert((order, fill));
                }
            }
        }
        if matched.is_empty() {
            if let (Some(sender), Some((order, fill))) = (self.sender_watched(tx), first) {
                matched.push((order, fill, sender));
            }
        }
        matched
    }

    fn decode_orders<'a>(
        &self,
        tx: &RawTransaction,
        orders: impl IntoIterator<Item = (&'a Order, U256)>,
    ) -> DecodeResult {
        let mut fills = Vec::new();
        for (order, fill, account) in self.watched_orders(tx, orders) {
            match value_fill(order, fill, account) {
                Ok(f) => fills.push(f),
                Err(reason) => return DecodeResult::Malformed(reason),
            }
        }
        if fills.is_empty() {
            return DecodeResult::NotApplicable;
        }
        DecodeResult::Decoded(build_signals(tx, fills))
    }
}

/// Price and USD size of one order fill. Amounts are in maker-asset units:
/// a BUY maker gives USDC, a SELL maker gives outcome tokens.
fn value_fill(order: &Order, fill: U256, account: String) -> Result<Fill, String> {
    let side = Side::from_api_str(&order.side.to_string())
        .ok_or_else(|| format!("unknown order side {}", order.side))?;

    let (Some(maker_amount), Some(taker_amount)) =
        (to_decimal(order.makerAmount), to_decimal(order.takerAmount))
    else {
        return Err("order amount out of range".into());
    };
    let fill_amount = to_decimal(fill).ok_or("fill amount out of range")?;
    if maker_amount.is_zero() || taker_amount.is_zero() {
        return Err("zero order amount".into());
    }

    let fill_amount = if fill_amount.is_zero() { maker_amount } else { fill_amount };
    let (price, size_usd) = match side {
        Side::Buy => (maker_amount / taker_amount, fill_amount),
        Side::Sell => {
            let price = taker_amount / maker_amount;
            (price, fill_amount * price)
        }
    };

    Ok(Fill {
        account,
        outcome_id: order.tokenId.to_string(),
        side,
        size_usd,
        price,
    })
}

/// Collapse fills into one signal per (account, outcome token, side), in
/// call order. Sizes add up; the price is size-weighted.
fn build_signals(tx: &RawTransaction, fills: Vec<Fill>) -> Vec<TradeSignal> {
    let mut signals: Vec<TradeSignal> = Vec::new();
    for fill in fills {
        let existing = signals.iter_mut().find(|s| {
            s.account == fill.account && s.outcome_id == fill.outcome_id && s.side == fill.side
        });
        match existing {
            Some(signal) => {
                let total = signal.size_usd + fill.size_usd;
                if !total.is_zero() {
                    signal.price = (signal.price * signal.size_usd + fill.price * fill.size_usd) / total;
                }
                signal.size_usd = total;
            }
            None => signals.push(TradeSignal {
                id: TradeSignal::trade_id(&tx.hash, &fill.account, &fill.outcome_id, fill.side),
                source: SourceType::Live,
                account: fill.account,
                market_id: fill.outcome_id.clone(),
                outcome_id: fill.outcome_id,
                side: fill.side,
                size_usd: fill.size_usd,
                price: fill.price,
                detected_at: Utc::now(),
                confirmation: ConfirmationState::Pending,
            }),
        }
    }
    signals
}

impl TxDecoder for CtfOrderDecoder {
    fn try_decode(&self, tx: &RawTransaction) -> DecodeResult {
        let to = tx.to.as_deref().unwrap_or_default().to_lowercase();
        if to != CTF_EXCHANGE && to != NEG_RISK_CTF_EXCHANGE {
            return DecodeResult::NotApplicable;
        }

        let input = match hex::decode(&tx.input) {
            Ok(bytes) => bytes,
            Err(e) => return DecodeResult::Malformed(format!("input is not hex: {e}")),
        };
        if input.len() < 4 {
            return DecodeResult::NotApplicable;
        }
        let selector: [u8; 4] = [input[0], input[1], input[2], input[3]];

        match selector {
            s if s == fillOrderCall::SELECTOR => match fillOrderCall::abi_decode(&input) {
                Ok(call) => self.decode_orders(tx, [(&call.order, call.fillAmount)]),
                Err(e) => DecodeResult::Malformed(format!("fillOrder: {e}")),
            },
            s if s == fillOrdersCall::SELECTOR => match fillOrdersCall::abi_decode(&input) {
                Ok(call) => {
                    let pairs = call
                        .orders
                        .iter()
                        .zip(call.fillAmounts.iter().copied().chain(std::iter::repeat(U256::ZERO)));
                    self.decode_orders(tx, pairs)
                }
                Err(e) => DecodeResult::Malformed(format!("fillOrders: {e}")),
            },
            s if s == matchOrdersCall::SELECTOR => match matchOrdersCall::abi_decode(&input) {
                Ok(call) => {
                    let taker = std::iter::once((&call.takerOrder, call.takerFillAmount));
                    let makers = call.makerOrders.iter().zip(
                        call.makerFillAmounts
                            .iter()
                            .copied()
                            .chain(std::iter::repeat(U256::ZERO)),
                    );
                    self.decode_orders(tx, taker.chain(makers))
                }
                Err(e) => DecodeResult::Malformed(format!("matchOrders: {e}")),
            },
            _ => DecodeResult::NotApplicable,
        }
    }
}

fn format_address(addr: &Address) -> String {
    addr.to_string().to_lowercase()
}

/// Convert a 6-decimal on-chain amount into a Decimal.
fn to_decimal(amount: U256) -> Option<Decimal> {
    let raw = u128::try_from(amount).ok()?;
    let raw = i128::try_from(raw).ok()?;
    Decimal::try_from_i128_with_scale(raw, AMOUNT_DECIMALS).ok()
}
