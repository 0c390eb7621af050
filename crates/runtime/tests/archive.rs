//! Registry and archive working together.
use std::time::Duration;

use arena_core::{GameKind, MatchRequest};
use arena_runtime::{Event, MatchStatus, Runtime, RuntimeConfig, RuntimeError};

fn archived_runtime(dir: &std::path::Path, max_matches: usize) -> Runtime {
    Runtime::builder()
        .config(RuntimeConfig {
            max_matches,
            round_delay: Duration::ZERO,
            archive_dir: Some(dir.to_path_buf()),
            ..RuntimeConfig::default()
        })
        .build()
        .expect("runtime builds")
}

async fn play(runtime: &Runtime, game: GameKind, rounds: u32, seed: u64) -> String {
    let config = runtime
        .create_match(MatchRequest::new(game, "balanced", "chaotic", rounds), Some(seed))
        .expect("valid request");
    let match_id = config.match_id.clone();
    let report = runtime.run_match(config, Vec::<Event>::new()).await;
    assert_eq!(report.status, MatchStatus::Completed);
    match_id
}

#[tokio::test]
async fn evicted_match_replays_from_archive() {
    let dir = tempfile::tempdir().expect("temp dir");
    let runtime = archived_runtime(dir.path(), 1);

    let first = play(&runtime, GameKind::ResourceCapture, 3, 1).await;
    let second = play(&runtime, GameKind::Auction, 2, 2).await;

    assert!(matches!(
        runtime.registry().status(&first),
        Err(RuntimeError::MatchNotFound(_))
    ));

    let entries = runtime.registry().replay(&first).expect("archived replay");
    assert_eq!(entries.first().map(|e| e["kind"].clone()), Some("match_start".into()));
    assert_eq!(entries.last().map(|e| e["kind"].clone()), Some("match_end".into()));
    let rounds: Vec<_> = entries.iter().filter(|e| e["kind"] == "round").collect();
    assert_eq!(rounds.len(), 3);
    for round in rounds {
        assert_eq!(round["stateHash"].as_str().map(str::len), Some(16));
    }

    // Still live, so replay yields wire events rather than archive entries.
    let live = runtime.registry().replay(&second).expect("live replay");
    assert_eq!(live.first().map(|e| e["type"].clone()), Some("match_start".into()));
}

#[tokio::test]
async fn recent_merges_live_and_archived() {
    let dir = tempfile::tempdir().expect("temp dir");
    let runtime = archived_runtime(dir.path(), 1);

    let first = play(&runtime, GameKind::Negotiation, 2, 7).await;
    let second = play(&runtime, GameKind::GpuBidding, 2, 8).await;

    let recent = runtime.registry().recent(10);
    let ids: Vec<_> = recent.iter().map(|s| s.match_id.clone()).collect();
    assert_eq!(ids, vec![second, first]);
    assert!(recent.iter().all(|s| s.status == MatchStatus::Completed));
    assert!(recent.iter().all(|s| s.winner.is_some()));
}

#[tokio::test]
async fn unknown_match_is_not_found() {
    let dir = tempfile::tempdir().expect("temp dir");
    let runtime = archived_runtime(dir.path(), 4);
    assert!(matches!(
        runtime.registry().replay("match_ffffffff"),
        Err(RuntimeError::MatchNotFound(_))
    ));
}
