//! Read-only commands

use std::collections::BTreeMap;
use std::io::Write;

use crate::domain::global::{DictOptions, GlobalFilter, GlobalRecord};
use crate::domain::storage::EntityFilter;
use crate::infrastructure::globals::GlobalRegistry;

use super::{DictArgs, GetArgs, ListArgs};

pub async fn list(
    registry: &GlobalRegistry,
    args: &ListArgs,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let filter = GlobalFilter::prefix(args.prefix.as_str());

    for record in registry.records().await? {
        if filter.matches(&record) {
            writeln!(out, "{}", format_record(&record))?;
        }
    }

    Ok(())
}

pub async fn get(
    registry: &GlobalRegistry,
    args: &GetArgs,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let value = registry.get_value(&args.name).await?;
    writeln!(out, "{}", value)?;
    Ok(())
}

pub async fn dict(
    registry: &GlobalRegistry,
    args: &DictArgs,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut options = DictOptions::new().with_prefix(args.prefix.as_str());
    if args.lower {
        options = options.lowercase_keys();
    }
    if args.raw {
        options = options.raw_values();
    }

    // Sorted so repeated runs print identically
    let dict: BTreeMap<_, _> = registry.as_dict(&options).await?.into_iter().collect();
    writeln!(out, "{}", serde_json::to_string_pretty(&dict)?)?;
    Ok(())
}

/// One line of the admin listing
fn format_record(record: &GlobalRecord) -> String {
    if record.description().is_empty() {
        record.to_string()
    } else {
        format!("{}  # {}", record, record.description())
    }
}
