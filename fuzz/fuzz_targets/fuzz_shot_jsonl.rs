//! Fuzz target for JSON Lines shot log ingest.
//!
//! Builds a header-shaped object per line from the fuzzer's values so the
//! coercion paths are reached, not just the JSON parser.

#![no_main]

use arbitrary::Arbitrary;
use hh_core::ingest::{read_bytes, InputFormat};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct ShotLine {
    player: String,
    made: String,
    shot_type: String,
    game_date: String,
    game_id: String,
    ordinal: Option<String>,
}

#[derive(Arbitrary, Debug)]
enum Input {
    Raw(Vec<u8>),
    Lines(Vec<ShotLine>),
}

fuzz_target!(|input: Input| {
    let bytes = match input {
        Input::Raw(bytes) => bytes,
        Input::Lines(lines) => {
            let mut buf = Vec::new();
            for line in lines {
                let mut obj = serde_json::json!({
                    "PLAYER_NAME": line.player,
                    "SHOT_MADE": line.made,
                    "SHOT_TYPE": line.shot_type,
                    "GAME_DATE": line.game_date,
                    "GAME_ID": line.game_id,
                });
                if let Some(ordinal) = line.ordinal {
                    obj["EVENT_ORDINAL"] = serde_json::Value::String(ordinal);
                }
                buf.extend_from_slice(obj.to_string().as_bytes());
                buf.push(b'\n');
            }
            buf
        }
    };

    if let Ok(output) = read_bytes(&bytes, InputFormat::Jsonl) {
        assert_eq!(output.report.rows_kept, output.events.len());
    }
});
