//! Integration test: many peers allocate and complete segments of one item
//! concurrently; every byte is handed out exactly once.

use std::sync::{Arc, Mutex};

use segq_core::{
    AllocError, ItemFlags, PartialSource, PartsInfo, QueueItem, Segment, SegmentParams,
    SimTransfer, SourceFlags,
};

type Item = QueueItem<String, SimTransfer>;

/// Run `peers` workers against `item` until it is finished; return every
/// segment handed out.
async fn drain(item: Arc<Item>, peers: usize, params: SegmentParams) -> Vec<Segment> {
    let granted = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::new();
    for i in 0..peers {
        let item = Arc::clone(&item);
        let granted = Arc::clone(&granted);
        let peer = format!("peer-{i}");
        item.add_source(peer.clone());
        handles.push(tokio::task::spawn_blocking(move || {
            let mut spins = 0u32;
            while !item.is_finished() {
                match item.next_segment_for(&params, &peer) {
                    Ok(seg) => {
                        let transfer = Arc::new(SimTransfer::new(peer.clone()));
                        assert!(item.set_transfer_for_segment(&seg, Arc::clone(&transfer)));
                        transfer.advance(seg.size(), 1000);
                        item.update_downloaded_bytes_and_speed();
                        item.add_segment(seg);
                        assert!(item.remove_running_segment(&seg));
                        granted.lock().unwrap().push(seg);
                    }
                    Err(AllocError::NoFreeBlock) | Err(AllocError::NoNeededPart) => {
                        spins += 1;
                        assert!(spins < 1_000_000, "{peer} starved");
                        std::thread::yield_now();
                    }
                    Err(e) => panic!("{peer}: {e}"),
                }
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
    let granted = granted.lock().unwrap().clone();
    granted
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_peers_never_share_bytes() {
    let total = 40 * 1024 * 1024 + 777;
    let item = Arc::new(Item::new("/downloads/big.bin", Some(total), ItemFlags::NONE));
    item.set_max_segments(6);
    let params = SegmentParams {
        wanted_size: 2 * 1024 * 1024,
        ..SegmentParams::default()
    };

    let mut granted = drain(Arc::clone(&item), 8, params).await;

    granted.sort_by_key(|s| s.start());
    for pair in granted.windows(2) {
        assert!(!pair[0].overlaps(&pair[1]), "{:?} overlaps {:?}", pair[0], pair[1]);
    }
    let handed_out: u64 = granted.iter().map(|s| s.size()).sum();
    assert_eq!(handed_out, total);
    assert!(item.is_finished());
    assert_eq!(item.running_count(), 0);
    assert_eq!(item.done_segments(), vec![Segment::new(0, total)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn want_end_item_finishes_with_partial_peer() {
    let total = 20 * 1024 * 1024;
    let item = Arc::new(Item::new("/downloads/movie.mkv", Some(total), ItemFlags::WANT_END));
    item.set_max_segments(4);
    let block = item.block_size();

    // One peer only has the second half; it must only be handed blocks from it.
    item.add_source("half".to_string());
    let half_start = u16::try_from(total / 2 / block).unwrap();
    let half_end = u16::try_from(total / block).unwrap();
    item.set_partial_source(
        &"half".to_string(),
        PartialSource::new(block, PartsInfo::from_pairs([(half_start, half_end)]), 0),
    );
    let seg = item
        .next_segment_for(&SegmentParams::default(), &"half".to_string())
        .unwrap();
    assert!(seg.start() >= total / 2, "partial peer got {seg:?}");
    assert!(item.remove_running_segment(&seg));
    item.remove_source(&"half".to_string(), SourceFlags::NO_NEED_PARTS);

    let granted = drain(Arc::clone(&item), 4, SegmentParams::default()).await;
    let handed_out: u64 = granted.iter().map(|s| s.size()).sum();
    assert_eq!(handed_out, total);
    assert!(item.is_finished());
}
