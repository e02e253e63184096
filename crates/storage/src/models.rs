use std::collections::HashMap;

use serde::{Deserialize, Serialize};

fn flag(value: Option<&String>) -> bool {
    value.map(String::as_str) == Some("1")
}

fn opt_num(value: Option<&String>) -> Option<u64> {
    value.filter(|v| !v.is_empty()).and_then(|v| v.parse().ok())
}

fn opt_str(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

// ─── Order ──────────────────────────────────────────────────────────────────

/// One on-chain barter intent, mirrored from the contract.
///
/// `fulfilled` and `cancelled` are never both set: an order is live while
/// neither flag is set and completed once exactly one is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: u64,
    pub creator: String,
    pub input_token: String,
    pub input_amount: String,
    pub output_token: String,
    pub output_amount: String,
    pub fulfilled: bool,
    pub cancelled: bool,
    pub created_at: Option<u64>,
    pub fulfilled_at: Option<u64>,
    pub cancelled_at: Option<u64>,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<String>,
}

impl Order {
    /// Encode into hash fields. Optional fields are emitted only when present
    /// so re-saving (e.g. from a full sync, which has no event context) never
    /// clears timestamps written by the indexer.
    pub fn hash_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("orderId".into(), self.order_id.to_string()),
            ("creator".into(), self.creator.to_lowercase()),
            ("inputToken".into(), self.input_token.to_lowercase()),
            ("inputAmount".into(), self.input_amount.clone()),
            ("outputToken".into(), self.output_token.to_lowercase()),
            ("outputAmount".into(), self.output_amount.clone()),
            ("fulfilled".into(), if self.fulfilled { "1" } else { "0" }.into()),
            ("cancelled".into(), if self.cancelled { "1" } else { "0" }.into()),
        ];
        if let Some(ts) = self.created_at {
            fields.push(("createdAt".into(), ts.to_string()));
        }
        if let Some(ts) = self.fulfilled_at {
            fields.push(("fulfilledAt".into(), ts.to_string()));
        }
        if let Some(ts) = self.cancelled_at {
            fields.push(("cancelledAt".into(), ts.to_string()));
        }
        if let Some(n) = self.block_number {
            fields.push(("blockNumber".into(), n.to_string()));
        }
        if let Some(hash) = &self.transaction_hash {
            fields.push(("transactionHash".into(), hash.clone()));
        }
        fields
    }

    pub fn from_hash(order_id: u64, data: &HashMap<String, String>) -> Option<Self> {
        if data.is_empty() {
            return None;
        }
        Some(Self {
            order_id,
            creator: data.get("creator").cloned().unwrap_or_default(),
            input_token: data.get("inputToken").cloned().unwrap_or_default(),
            input_amount: data.get("inputAmount").cloned().unwrap_or_default(),
            output_token: data.get("outputToken").cloned().unwrap_or_default(),
            output_amount: data.get("outputAmount").cloned().unwrap_or_default(),
            fulfilled: flag(data.get("fulfilled")),
            cancelled: flag(data.get("cancelled")),
            created_at: opt_num(data.get("createdAt")),
            fulfilled_at: opt_num(data.get("fulfilledAt")),
            cancelled_at: opt_num(data.get("cancelledAt")),
            block_number: opt_num(data.get("blockNumber")),
            transaction_hash: opt_str(data.get("transactionHash")),
        })
    }

    /// Live means neither completed flag is set.
    pub fn is_live(&self) -> bool {
        !(self.fulfilled || self.cancelled)
    }
}

/// Query filters for order listings.
#[derive(Debug, Clone, Default)]
pub struct OrderFilters {
    pub status: Option<OrderStatusFilter>,
    pub creator: Option<String>,
    pub input_token: Option<String>,
    pub output_token: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusFilter {
    Live,
    Completed,
}

// ─── Transaction ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Create,
    Fulfill,
    Cancel,
    Approve,
}

impl TxKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TxKind::Create => "create",
            TxKind::Fulfill => "fulfill",
            TxKind::Cancel => "cancel",
            TxKind::Approve => "approve",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(TxKind::Create),
            "fulfill" => Some(TxKind::Fulfill),
            "cancel" => Some(TxKind::Cancel),
            "approve" => Some(TxKind::Approve),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

impl TxStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TxStatus::Pending),
            "confirmed" => Some(TxStatus::Confirmed),
            "failed" => Some(TxStatus::Failed),
            _ => None,
        }
    }
}

/// A record of one market-relevant on-chain call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: String,
    pub from: String,
    pub to: Option<String>,
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub order_id: Option<u64>,
    pub token_address: Option<String>,
    pub amount: Option<String>,
    pub block_number: Option<u64>,
    pub timestamp: Option<u64>,
    pub status: TxStatus,
}

impl Transaction {
    pub fn hash_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("hash".into(), self.hash.clone()),
            ("from".into(), self.from.to_lowercase()),
            ("type".into(), self.kind.as_str().into()),
            ("status".into(), self.status.as_str().into()),
        ];
        if let Some(to) = &self.to {
            fields.push(("to".into(), to.to_lowercase()));
        }
        if let Some(id) = self.order_id {
            fields.push(("orderId".into(), id.to_string()));
        }
        if let Some(token) = &self.token_address {
            fields.push(("tokenAddress".into(), token.to_lowercase()));
        }
        if let Some(amount) = &self.amount {
            fields.push(("amount".into(), amount.clone()));
        }
        if let Some(n) = self.block_number {
            fields.push(("blockNumber".into(), n.to_string()));
        }
        if let Some(ts) = self.timestamp {
            fields.push(("timestamp".into(), ts.to_string()));
        }
        fields
    }

    pub fn from_hash(hash: &str, data: &HashMap<String, String>) -> Option<Self> {
        if data.is_empty() {
            return None;
        }
        Some(Self {
            hash: data.get("hash").cloned().unwrap_or_else(|| hash.to_string()),
            from: data.get("from").cloned().unwrap_or_default(),
            to: opt_str(data.get("to")),
            kind: data.get("type").and_then(|t| TxKind::parse(t))?,
            order_id: opt_num(data.get("orderId")),
            token_address: opt_str(data.get("tokenAddress")),
            amount: opt_str(data.get("amount")),
            block_number: opt_num(data.get("blockNumber")),
            timestamp: opt_num(data.get("timestamp")),
            status: data.get("status").and_then(|s| TxStatus::parse(s))?,
        })
    }
}

// ─── TokenMetadata ──────────────────────────────────────────────────────────

/// Cached ERC-20 descriptor; re-derivable from the token contract at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    #[serde(rename = "logoURI")]
    pub logo_uri: Option<String>,
    pub last_updated: Option<u64>,
}

impl TokenMetadata {
    pub fn hash_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("address".into(), self.address.to_lowercase()),
            ("symbol".into(), self.symbol.clone()),
            ("name".into(), self.name.clone()),
            ("decimals".into(), self.decimals.to_string()),
        ];
        if let Some(uri) = &self.logo_uri {
            fields.push(("logoURI".into(), uri.clone()));
        }
        if let Some(ts) = self.last_updated {
            fields.push(("lastUpdated".into(), ts.to_string()));
        }
        fields
    }

    pub fn from_hash(address: &str, data: &HashMap<String, String>) -> Option<Self> {
        if data.is_empty() {
            return None;
        }
        Some(Self {
            address: address.to_lowercase(),
            symbol: data.get("symbol").cloned().unwrap_or_default(),
            name: data.get("name").cloned().unwrap_or_default(),
            decimals: data.get("decimals").and_then(|d| d.parse().ok()).unwrap_or(18),
            logo_uri: opt_str(data.get("logoURI")),
            last_updated: opt_num(data.get("lastUpdated")),
        })
    }
}

// ─── UserStats ──────────────────────────────────────────────────────────────

/// Aggregate per-account counters, maintained by the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub address: String,
    pub orders_created: u64,
    pub orders_fulfilled: u64,
    pub orders_cancelled: u64,
    pub total_volume: Option<String>,
    pub first_seen: Option<u64>,
    pub last_seen: Option<u64>,
}

impl UserStats {
    pub fn from_hash(address: &str, data: &HashMap<String, String>) -> Option<Self> {
        if data.is_empty() {
            return None;
        }
        Some(Self {
            address: address.to_lowercase(),
            orders_created: opt_num(data.get("ordersCreated")).unwrap_or(0),
            orders_fulfilled: opt_num(data.get("ordersFulfilled")).unwrap_or(0),
            orders_cancelled: opt_num(data.get("ordersCancelled")).unwrap_or(0),
            total_volume: opt_str(data.get("totalVolume")),
            first_seen: opt_num(data.get("firstSeen")),
            last_seen: opt_num(data.get("lastSeen")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        Order {
            order_id: 7,
            creator: "0xAAaaAAaaAAaaAAaaAAaaAAaaAAaaAAaaAAaaAAaa".into(),
            input_token: "0x0000000000000000000000000000000000000000".into(),
            input_amount: "1000".into(),
            output_token: "0xBBbbBBbbBBbbBBbbBBbbBBbbBBbbBBbbBBbbBBbb".into(),
            output_amount: "2000".into(),
            fulfilled: false,
            cancelled: false,
            created_at: Some(1000),
            fulfilled_at: None,
            cancelled_at: None,
            block_number: Some(100),
            transaction_hash: Some("0xdead".into()),
        }
    }

    #[test]
    fn order_hash_round_trip_lowercases_addresses() {
        let order = sample_order();
        let map: HashMap<String, String> = order.hash_fields().into_iter().collect();
        let back = Order::from_hash(7, &map).unwrap();
        assert_eq!(back.creator, "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert_eq!(back.created_at, Some(1000));
        assert!(back.is_live());
        assert_eq!(back.fulfilled_at, None);
    }

    #[test]
    fn order_omits_absent_optional_fields() {
        let mut order = sample_order();
        order.created_at = None;
        order.block_number = None;
        order.transaction_hash = None;
        let fields = order.hash_fields();
        assert!(fields.iter().all(|(k, _)| k != "createdAt"));
        assert!(fields.iter().all(|(k, _)| k != "blockNumber"));
        assert!(fields.iter().all(|(k, _)| k != "transactionHash"));
    }

    #[test]
    fn transaction_round_trip_preserves_kind_and_status() {
        let tx = Transaction {
            hash: "0xdead".into(),
            from: "0xAA".into(),
            to: None,
            kind: TxKind::Fulfill,
            order_id: Some(7),
            token_address: None,
            amount: None,
            block_number: Some(100),
            timestamp: Some(1000),
            status: TxStatus::Confirmed,
        };
        let map: HashMap<String, String> = tx.hash_fields().into_iter().collect();
        let back = Transaction::from_hash("0xdead", &map).unwrap();
        assert_eq!(back.kind, TxKind::Fulfill);
        assert_eq!(back.status, TxStatus::Confirmed);
        assert_eq!(back.order_id, Some(7));
        assert_eq!(back.to, None);
    }

    #[test]
    fn empty_hash_is_not_a_record() {
        assert!(Order::from_hash(1, &HashMap::new()).is_none());
        assert!(Transaction::from_hash("0x1", &HashMap::new()).is_none());
        assert!(UserStats::from_hash("0xaa", &HashMap::new()).is_none());
    }
}
