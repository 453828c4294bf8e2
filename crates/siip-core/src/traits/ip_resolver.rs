// # IP Resolver Trait
//
// Defines the interface for discovering the caller's current public IPv4
// address.
//
// ## Implementations
//
// - HTTP echo services with quorum voting: `siip-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use siip_core::IpResolver;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let resolver = /* IpResolver implementation */;
//     let ip = resolver.get_ip().await?;
//     println!("public ip: {}", ip);
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for public IP discovery
///
/// A call either returns an address that at least one upstream source
/// actually reported, or an error. Implementations must tolerate partial
/// upstream failure internally and only fail the call when no usable
/// answer could be obtained.
///
/// # Cancellation
///
/// `get_ip()` must be cancellation-safe: dropping the future mid-call
/// (e.g. on shutdown) must leave the resolver usable.
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Discover the current public IPv4 address
    ///
    /// # Returns
    ///
    /// - `Ok(Ipv4Addr)`: The agreed-upon public address
    /// - `Err(Error::NoServersAvailable)`: Every source is cooling down
    /// - `Err(Error::ResolutionFailed)`: No source produced a usable answer
    async fn get_ip(&self) -> Result<Ipv4Addr, crate::Error>;
}
