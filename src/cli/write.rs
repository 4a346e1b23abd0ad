//! Commands that change globals or the cache

use std::io::Write;

use crate::domain::global::{GlobalFilter, GlobalPatch};
use crate::infrastructure::globals::GlobalRegistry;

use super::SetArgs;

pub async fn set(
    registry: &GlobalRegistry,
    args: SetArgs,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    registry.set(&args.name, args.value).await?;

    if let Some(description) = args.description {
        registry
            .update_where(
                &GlobalFilter::name(args.name.as_str()),
                &GlobalPatch::description(description),
            )
            .await?;
    }

    writeln!(out, "{} = {}", args.name, registry.get_value(&args.name).await?)?;
    Ok(())
}

pub async fn clear_cache(registry: &GlobalRegistry, out: &mut impl Write) -> anyhow::Result<()> {
    registry.clear_cache().await?;
    writeln!(out, "Cleared {}", registry.snapshot_key())?;
    Ok(())
}
