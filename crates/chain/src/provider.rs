use alloy::providers::{Provider, ProviderBuilder};

/// Create an HTTP provider from an RPC URL string.
///
/// Read-only: the indexer never signs or submits transactions. The returned
/// provider owns its connection state and does not borrow the URL.
pub fn create_provider(rpc_url: &str) -> eyre::Result<impl Provider + Clone + use<>> {
    let url = rpc_url.parse()?;
    Ok(ProviderBuilder::new().connect_http(url))
}
