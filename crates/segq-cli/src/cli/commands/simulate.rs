//! `segq simulate` – run simulated peers against one queue item.
//!
//! Every peer runs on the blocking pool and loops: ask the item for a segment,
//! bind a transfer, "receive" the bytes, mark the range done. Partial peers
//! advertise one slice of the file and leave once they have nothing useful.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use segq_core::allocator::{AllocError, SegmentParams};
use segq_core::config::SegqConfig;
use segq_core::parts::PartsInfo;
use segq_core::queue_item::{ItemFlags, QueueItem};
use segq_core::source::{PartialSource, SourceFlags};
use segq_core::SimTransfer;
use serde::Serialize;

/// Peer `i` reports `(i + 1) * SPEED_STEP` bytes/s.
const SPEED_STEP: u64 = 256 * 1024;

type SimItem = QueueItem<String, SimTransfer>;

#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub size: u64,
    pub peers: usize,
    pub max_segments: Option<usize>,
    pub want_end: bool,
    pub partial_peers: usize,
}

/// One segment handed to a peer.
#[derive(Debug, Clone, Serialize)]
pub struct Allocation {
    pub peer: String,
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PeerStats {
    pub partial: bool,
    pub segments: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub size: u64,
    pub block_size: u64,
    pub max_segments: usize,
    pub finished: bool,
    pub elapsed_ms: u64,
    pub peers: BTreeMap<String, PeerStats>,
    pub allocations: Vec<Allocation>,
}

fn peer_name(i: usize) -> String {
    format!("peer-{i:02}")
}

fn block_index(block: u64) -> u16 {
    u16::try_from(block).unwrap_or(u16::MAX)
}

/// Slice `index` of `slices` equal slices of the file, in blocks.
fn partial_parts(index: usize, slices: usize, block_count: u64) -> PartsInfo {
    let per = block_count.div_ceil(slices.max(1) as u64);
    let start = (index as u64 * per).min(block_count);
    let end = (start + per).min(block_count);
    PartsInfo::from_pairs([(block_index(start), block_index(end))])
}

fn run_peer(
    item: &SimItem,
    peer: String,
    params: SegmentParams,
    partial: bool,
    log: &Mutex<Vec<Allocation>>,
) {
    while !item.is_finished() {
        match item.next_segment_for(&params, &peer) {
            Ok(seg) => {
                let transfer =
                    Arc::new(SimTransfer::new(peer.clone()).with_speed(params.last_speed));
                if !item.set_transfer_for_segment(&seg, Arc::clone(&transfer)) {
                    tracing::warn!(peer = %peer, segment = ?seg, "allocated segment vanished before binding");
                }
                transfer.receive(seg.size());
                item.update_downloaded_bytes_and_speed();
                item.add_segment(seg);
                item.remove_running_segment(&seg);
                log.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(Allocation {
                        peer: peer.clone(),
                        start: seg.start(),
                        end: seg.end(),
                    });
            }
            Err(AllocError::NoNeededPart) if partial => {
                tracing::debug!(peer = %peer, "partial peer has nothing left to offer");
                item.remove_source(&peer, SourceFlags::NO_NEED_PARTS);
                return;
            }
            Err(_) => std::thread::yield_now(),
        }
    }
}

/// Run the simulation and collect what each peer was handed.
pub async fn simulate(cfg: &SegqConfig, opts: SimulateOptions) -> Result<SimulationSummary> {
    if opts.size == 0 {
        bail!("--size must be greater than zero");
    }
    if opts.peers == 0 {
        bail!("--peers must be at least 1");
    }
    if opts.partial_peers >= opts.peers {
        bail!("at least one peer must have the whole file (--partial-peers < --peers)");
    }

    let flags = if opts.want_end {
        ItemFlags::WANT_END
    } else {
        ItemFlags::NONE
    };
    let item = Arc::new(SimItem::from_config(
        "simulated.bin",
        Some(opts.size),
        flags,
        cfg,
    ));
    if let Some(max) = opts.max_segments {
        item.set_max_segments(max);
    }
    let block_size = item.block_size();
    let block_count = opts.size.div_ceil(block_size);

    let mut params = SegmentParams::from_config(
        &cfg.allocation,
        cfg.allocation.wanted_chunk_size,
        0,
    );
    // Simulated transfers finish instantly, so there is never a slow one to overlap.
    params.overlap_chunks = false;

    tracing::info!(
        size = opts.size,
        block_size,
        peers = opts.peers,
        partial_peers = opts.partial_peers,
        "starting simulation"
    );

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut stats = BTreeMap::new();
    let started = Instant::now();
    let mut handles = Vec::with_capacity(opts.peers);
    for i in 0..opts.peers {
        let peer = peer_name(i);
        let partial = i < opts.partial_peers;
        item.add_source(peer.clone());
        if partial {
            let parts = partial_parts(i, opts.partial_peers, block_count);
            item.set_partial_source(&peer, PartialSource::new(block_size, parts, 0));
        }
        stats.insert(
            peer.clone(),
            PeerStats {
                partial,
                ..PeerStats::default()
            },
        );

        let peer_params = SegmentParams {
            last_speed: SPEED_STEP * (i as u64 + 1),
            ..params
        };
        let item = Arc::clone(&item);
        let log = Arc::clone(&log);
        handles.push(tokio::task::spawn_blocking(move || {
            run_peer(&item, peer, peer_params, partial, &log)
        }));
    }
    for handle in handles {
        handle.await.context("simulated peer task")?;
    }

    let allocations = std::mem::take(&mut *log.lock().unwrap_or_else(PoisonError::into_inner));
    for a in &allocations {
        let entry = stats.entry(a.peer.clone()).or_default();
        entry.segments += 1;
        entry.bytes += a.end - a.start;
    }
    let finished = item.is_finished();
    tracing::info!(finished, allocations = allocations.len(), "simulation done");

    Ok(SimulationSummary {
        size: opts.size,
        block_size,
        max_segments: item.max_segments(),
        finished,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        peers: stats,
        allocations,
    })
}

fn print_summary(summary: &SimulationSummary) {
    for a in &summary.allocations {
        println!("  {:<8} {:>12} .. {:<12}", a.peer, a.start, a.end);
    }
    println!();
    println!(
        "  {:<8}  {:>7}  {:>8}  {:>12}",
        "Peer", "Partial", "Segments", "Bytes"
    );
    println!("  {}  {}  {}  {}", "--------", "-------", "--------", "------------");
    for (peer, s) in &summary.peers {
        println!(
            "  {:<8}  {:>7}  {:>8}  {:>12}",
            peer,
            if s.partial { "yes" } else { "no" },
            s.segments,
            s.bytes
        );
    }
    println!(
        "{} bytes, block {} bytes, {} segment(s) max: {} in {} ms",
        summary.size,
        summary.block_size,
        summary.max_segments,
        if summary.finished { "finished" } else { "NOT finished" },
        summary.elapsed_ms
    );
}

pub async fn run_simulate(cfg: &SegqConfig, opts: SimulateOptions, json: bool) -> Result<()> {
    let summary = simulate(cfg, opts).await?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("serializing summary")?
        );
    } else {
        print_summary(&summary);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(size: u64, peers: usize, partial_peers: usize) -> SimulateOptions {
        SimulateOptions {
            size,
            peers,
            max_segments: None,
            want_end: false,
            partial_peers,
        }
    }

    fn assert_disjoint_cover(summary: &SimulationSummary) {
        let mut ranges: Vec<(u64, u64)> =
            summary.allocations.iter().map(|a| (a.start, a.end)).collect();
        ranges.sort();
        for w in ranges.windows(2) {
            assert!(w[0].1 <= w[1].0, "{:?} overlaps {:?}", w[0], w[1]);
        }
        let total: u64 = ranges.iter().map(|(s, e)| e - s).sum();
        assert_eq!(total, summary.size);
    }

    #[test]
    fn partial_slices_cover_the_file() {
        assert_eq!(partial_parts(0, 2, 160), PartsInfo::from_pairs([(0, 80)]));
        assert_eq!(partial_parts(1, 2, 160), PartsInfo::from_pairs([(80, 160)]));
        assert_eq!(partial_parts(2, 3, 10), PartsInfo::from_pairs([(8, 10)]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn full_peers_finish_the_file() {
        let cfg = SegqConfig::default();
        let summary = simulate(&cfg, opts(10 * 1024 * 1024 + 3, 4, 0)).await.unwrap();
        assert!(summary.finished);
        assert_eq!(summary.max_segments, cfg.default_max_segments);
        assert_eq!(summary.peers.len(), 4);
        assert_disjoint_cover(&summary);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn partial_peers_stay_in_their_slice() {
        let cfg = SegqConfig::default();
        let mut o = opts(10 * 1024 * 1024, 3, 2);
        o.max_segments = Some(4);
        o.want_end = true;
        let summary = simulate(&cfg, o).await.unwrap();
        assert!(summary.finished);
        assert_disjoint_cover(&summary);

        let half = summary.size / 2;
        for a in &summary.allocations {
            match a.peer.as_str() {
                "peer-00" => assert!(a.end <= half, "{a:?}"),
                "peer-01" => assert!(a.start >= half, "{a:?}"),
                _ => {}
            }
        }
        assert!(summary.peers["peer-00"].partial);
        assert!(!summary.peers["peer-02"].partial);
    }

    #[tokio::test]
    async fn rejects_bad_options() {
        let cfg = SegqConfig::default();
        assert!(simulate(&cfg, opts(0, 1, 0)).await.is_err());
        assert!(simulate(&cfg, opts(100, 0, 0)).await.is_err());
        assert!(simulate(&cfg, opts(100, 2, 2)).await.is_err());
    }
}
