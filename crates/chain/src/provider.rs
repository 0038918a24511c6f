use alloy::providers::{ProviderBuilder, RootProvider};

/// Read-only HTTP provider used by the tracker. No fillers: nothing is ever signed or sent.
pub type ChainProvider = RootProvider;

/// Create a plain HTTP provider from an RPC URL string.
pub fn create_provider(rpc_url: &str) -> eyre::Result<ChainProvider> {
    let url = rpc_url.parse()?;
    let provider = ProviderBuilder::new()
        .disable_recommended_fillers()
        .connect_http(url);
    Ok(provider)
}
