//! End-to-end producer path: pack boundary structs, stage their bytes
//! through a span feed, drain, and unpack on the far side.

use render_abi::{attrs, CursorShape, CursorState, StyledRun};
use span_feed::{FeedConfig, SpanFeed};

fn stage(feed: &mut SpanFeed, raw: &[u8]) {
    let window = feed.reserve(raw.len()).expect("reserve");
    window[..raw.len()].copy_from_slice(raw);
    feed.commit(raw.len()).expect("commit");
}

#[test]
fn styled_runs_survive_the_feed_handoff() {
    let runs = vec![
        StyledRun {
            fg: 0x00FF_00FF,
            bg: 0,
            attrs: attrs::BOLD,
            text: "fn main() {".to_string(),
            link: None,
        },
        StyledRun {
            fg: 0xAAAA_AAFF,
            bg: 0,
            attrs: 0,
            text: "    println!(\"héllo\");".to_string(),
            link: Some("https://doc.rust-lang.org/std/macro.println.html".to_string()),
        },
        StyledRun {
            fg: 0x00FF_00FF,
            bg: 0,
            attrs: attrs::BOLD | attrs::UNDERLINE,
            text: "}".to_string(),
            link: None,
        },
    ];

    // Small chunks force the batch to straddle a chunk boundary.
    let mut feed = SpanFeed::new(FeedConfig {
        chunk_size: 64,
        initial_chunks: 1,
        ..FeedConfig::default()
    })
    .expect("create feed");

    for run in &runs {
        stage(&mut feed, &run.pack().expect("pack run"));
    }

    let spans = feed.drain();
    assert_eq!(spans.len(), runs.len());

    for (span, expected) in spans.iter().zip(&runs) {
        let decoded = StyledRun::unpack(feed.span_bytes(*span)).expect("unpack run");
        assert_eq!(&decoded, expected);
    }

    for span in spans {
        feed.release(span);
    }
    assert_eq!(feed.stats().pending_spans, 0);
}

#[test]
fn mixed_frame_drains_in_commit_order() {
    // A frame interleaves cursor updates with text runs; the consumer
    // must see them in the order they were committed.
    let cursor = CursorState {
        row: 3,
        col: 17,
        visible: true,
        blinking: false,
        shape: CursorShape::Bar,
    };
    let run = StyledRun {
        fg: 0xFFFF_FFFF,
        bg: 0x1e1e_1eFF,
        attrs: 0,
        text: "status: ok".to_string(),
        link: None,
    };

    let mut feed = SpanFeed::new(FeedConfig::default()).expect("create feed");
    stage(&mut feed, &cursor.pack().expect("pack cursor"));
    stage(&mut feed, &run.pack().expect("pack run"));

    let spans = feed.drain();
    assert_eq!(spans.len(), 2);
    assert_eq!(
        CursorState::unpack(feed.span_bytes(spans[0])).expect("unpack cursor"),
        cursor
    );
    assert_eq!(
        StyledRun::unpack(feed.span_bytes(spans[1])).expect("unpack run"),
        run
    );
}
