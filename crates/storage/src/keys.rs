//! Redis key naming scheme for the projection.
//!
//! Addresses are normalised to lowercase before becoming key components so
//! that checksummed and lowercase forms of the same account never produce
//! two records.

// ─── Orders ─────────────────────────────────────────────────────────────────

pub fn order(order_id: u64) -> String {
    format!("order:{order_id}")
}

pub fn orders_active() -> String {
    "orders:active".into()
}

pub fn orders_fulfilled() -> String {
    "orders:fulfilled".into()
}

pub fn orders_cancelled() -> String {
    "orders:cancelled".into()
}

pub fn orders_by_creator(address: &str) -> String {
    format!("orders:by:creator:{}", address.to_lowercase())
}

pub fn orders_by_token(address: &str) -> String {
    format!("orders:by:token:{}", address.to_lowercase())
}

// ─── Transactions ───────────────────────────────────────────────────────────

pub fn transaction(hash: &str) -> String {
    format!("tx:{hash}")
}

pub fn user_transactions(address: &str) -> String {
    format!("tx:user:{}", address.to_lowercase())
}

pub fn order_transactions(order_id: u64) -> String {
    format!("tx:order:{order_id}")
}

// ─── Tokens ─────────────────────────────────────────────────────────────────

pub fn token(address: &str) -> String {
    format!("token:{}", address.to_lowercase())
}

pub fn tokens_list() -> String {
    "tokens:list".into()
}

// ─── Users ──────────────────────────────────────────────────────────────────

pub fn user(address: &str) -> String {
    format!("user:{}", address.to_lowercase())
}

pub fn user_orders_created(address: &str) -> String {
    format!("user:{}:orders:created", address.to_lowercase())
}

pub fn user_orders_fulfilled(address: &str) -> String {
    format!("user:{}:orders:fulfilled", address.to_lowercase())
}

// ─── Indexer state ──────────────────────────────────────────────────────────

pub fn indexer_last_block() -> String {
    "indexer:lastBlock".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_keys_are_case_insensitive() {
        let upper = orders_by_creator("0xAAaaAAaaAAaaAAaaAAaaAAaaAAaaAAaaAAaaAAaa");
        let lower = orders_by_creator("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert_eq!(upper, lower);
        assert_eq!(
            upper,
            "orders:by:creator:0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
        );
    }

    #[test]
    fn order_keys_embed_the_numeric_id() {
        assert_eq!(order(7), "order:7");
        assert_eq!(order_transactions(7), "tx:order:7");
    }
}
