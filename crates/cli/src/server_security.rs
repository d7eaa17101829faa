use anyhow::{Context as AnyhowContext, Result};
use std::net::SocketAddr;

/// Whether the report server may listen beyond the loopback interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BindPolicy {
    LoopbackOnly,
    Public,
}

impl BindPolicy {
    pub(crate) const fn from_public_flag(public: bool) -> Self {
        if public {
            Self::Public
        } else {
            Self::LoopbackOnly
        }
    }

    fn check(self, bind: &str, addrs: &[SocketAddr]) -> Result<()> {
        let exposed: Vec<String> = addrs
            .iter()
            .filter(|addr| !addr.ip().is_loopback())
            .map(ToString::to_string)
            .collect();
        if self == Self::LoopbackOnly && !exposed.is_empty() {
            anyhow::bail!(
                "Refusing to bind to non-loopback address without --public: {bind} ({}). Reports quote personal notes verbatim.",
                exposed.join(", ")
            )
        }
        Ok(())
    }
}

/// Resolve `bind` (Tokio lookup, so "localhost" works) and apply `policy`.
pub(crate) async fn resolve_guarded_bind_addrs(
    bind: &str,
    policy: BindPolicy,
) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host(bind)
        .await
        .with_context(|| format!("Failed to resolve bind address: {bind}"))?
        .collect();
    if addrs.is_empty() {
        anyhow::bail!("Bind address resolved to zero socket addrs: {bind}")
    }

    policy.check(bind, &addrs)?;
    Ok(addrs)
}
