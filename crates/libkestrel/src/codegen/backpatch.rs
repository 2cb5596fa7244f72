//! Second pass: replace every placeholder with its final value.

use std::ops::Range;

use anyhow::{Context, anyhow};
use itertools::Itertools;

use crate::bytecode::{ByteCode, Slot};
use crate::codegen::tables::{JumpTable, Location, ReferenceTable};
use crate::error::CodeGenError;

/// Resolve `slots` into plain bytes. Statics are laid out right after the
/// code, in offset order.
pub fn backpatch(
    slots: &[Slot],
    refs: &ReferenceTable,
    jumps: &JumpTable,
) -> Result<ByteCode, CodeGenError> {
    let code_len = slots.len();
    let bytes = slots
        .iter()
        .enumerate()
        .map(|(index, slot)| match *slot {
            Slot::Byte(byte) | Slot::Data(byte) => Ok(byte),
            Slot::Ref(key) => {
                let entry = refs
                    .get(key)
                    .with_context(|| format!("unknown reference {key} at {index}"))?;
                match entry.location {
                    Location::Static { offset } => u8::try_from(code_len + offset - 1)
                        .with_context(|| format!("static '{}' lies outside memory", entry.name)),
                    Location::Heap { address, .. } => Ok(address),
                }
            }
            Slot::Jump(key) => {
                let entry = jumps
                    .get(key)
                    .with_context(|| format!("unknown jump {key} at {index}"))?;
                let destination = entry
                    .destination
                    .ok_or_else(|| anyhow!("jump {key} was never given a destination"))?;
                let distance = destination
                    .checked_sub(entry.origin)
                    .ok_or_else(|| anyhow!("jump {key} points backwards"))?;
                u8::try_from(distance).with_context(|| format!("jump {key} is too far"))
            }
        })
        .collect::<anyhow::Result<Vec<u8>>>()?;

    tracing::trace!(bytes = bytes.len(), "backpatching finished");
    Ok(ByteCode::new(bytes).with_data(data_ranges(slots)))
}

/// Runs of consecutive `Slot::Data`.
fn data_ranges(slots: &[Slot]) -> Vec<Range<usize>> {
    slots
        .iter()
        .positions(|slot| matches!(slot, Slot::Data(_)))
        .fold(Vec::new(), |mut ranges: Vec<Range<usize>>, index| {
            match ranges.last_mut() {
                Some(range) if range.end == index => range.end += 1,
                _ => ranges.push(index..index + 1),
            }
            ranges
        })
}
