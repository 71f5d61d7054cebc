//! `segq parts encode|needed` – front-end for the availability bitmap codec.

use anyhow::{bail, Context, Result};
use segq_core::parts::{is_needed_part, PartsInfo};
use segq_core::segment::{DoneSegments, Segment};

/// Parse `START-END` (end exclusive) into a segment.
fn parse_range(s: &str) -> Result<Segment> {
    let (start, end) = s
        .split_once('-')
        .with_context(|| format!("range {s:?} is not START-END"))?;
    let start: u64 = start
        .trim()
        .parse()
        .with_context(|| format!("bad range start in {s:?}"))?;
    let end: u64 = end
        .trim()
        .parse()
        .with_context(|| format!("bad range end in {s:?}"))?;
    if end < start {
        bail!("range {s:?} ends before it starts");
    }
    Ok(Segment::from_bounds(start, end))
}

/// Build the done set, rejecting ranges that overlap or run past the file.
fn done_from_ranges(size: u64, ranges: &[String]) -> Result<DoneSegments> {
    let mut segments = ranges
        .iter()
        .map(|r| parse_range(r))
        .collect::<Result<Vec<_>>>()?;
    segments.sort_by_key(|s| s.start());
    for pair in segments.windows(2) {
        if pair[0].overlaps(&pair[1]) {
            bail!("ranges {:?} and {:?} overlap", pair[0], pair[1]);
        }
    }
    let mut done = DoneSegments::new();
    for seg in segments {
        if seg.end() > size {
            bail!("range {}-{} is past the end of the file", seg.start(), seg.end());
        }
        done.insert(seg);
    }
    Ok(done)
}

fn encode(size: u64, block: u64, ranges: &[String]) -> Result<PartsInfo> {
    if block == 0 {
        bail!("block size must be non-zero");
    }
    let done = done_from_ranges(size, ranges)?;
    Ok(PartsInfo::encode(&done, block, size))
}

pub fn run_parts_encode(size: u64, block: u64, ranges: &[String]) -> Result<()> {
    let parts = encode(size, block, ranges)?;
    println!("{}", parts.to_wire());
    println!("blocks: {}", parts.count());
    Ok(())
}

fn needed(theirs: &str, ours: &str) -> Result<bool> {
    let theirs = PartsInfo::from_wire(theirs).context("parsing THEIRS")?;
    let ours = PartsInfo::from_wire(ours).context("parsing OURS")?;
    Ok(is_needed_part(&theirs, &ours))
}

pub fn run_parts_needed(theirs: &str, ours: &str) -> Result<()> {
    let needed = needed(theirs, ours)?;
    println!("{}", if needed { "needed" } else { "not needed" });
    Ok(())
}
