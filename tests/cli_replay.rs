use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_bell_cue"))
}

fn fixture_file(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

/// Float WAV at 16 kHz: quiet tone, a three-tick shout, quiet tone again.
/// Every 50ms block holds whole periods, so equal amplitudes give equal levels.
fn write_shout_wav(path: &Path) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    let amplitudes = std::iter::repeat(0.001f32)
        .take(20)
        .chain(std::iter::repeat(0.5).take(3))
        .chain(std::iter::repeat(0.001).take(20));
    for amplitude in amplitudes {
        for n in 0..800 {
            let phase = 2.0 * std::f32::consts::PI * (n % 40) as f32 / 40.0;
            writer.write_sample(amplitude * phase.sin()).expect("write sample");
        }
    }
    writer.finalize().expect("finalize wav");
}

#[test]
fn replay_fixture_matches_expectations() {
    let output = cli()
        .args(["replay", "--fixture", "single_strike"])
        .output()
        .expect("failed to run bell_cue replay");
    assert!(
        output.status.success(),
        "CLI exited with {:?}",
        output.status.code()
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("replay report JSON payload");
    assert_eq!(json["fixture"], "single_strike");
    assert_eq!(json["tick_ms"], 50);
    assert_eq!(json["detection_count"], 1);
    assert_eq!(json["detections"][0]["timestamp_ms"], 1050);
}

#[test]
fn replay_detects_mismatch() {
    let output = cli()
        .args([
            "replay",
            "--fixture",
            "single_strike",
            "--expect",
            &fixture_file("single_strike_incorrect.expect.json"),
        ])
        .output()
        .expect("failed to run mismatch replay");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(
        stderr.contains("\"failures\""),
        "expected diff JSON in stderr, got {stderr}"
    );
}

#[test]
fn frequency_gate_flag_changes_outcome() {
    let wav = std::env::temp_dir().join(format!("bell-cue-shout-{}.wav", std::process::id()));
    write_shout_wav(&wav);
    let wav_arg = wav.to_str().expect("utf-8 temp path");

    let gated = cli()
        .args(["replay", "--wav", wav_arg])
        .output()
        .expect("gated replay");
    assert!(gated.status.success());
    let json: Value = serde_json::from_slice(&gated.stdout).expect("report JSON");
    assert_eq!(json["detection_count"], 0);

    let ungated = cli()
        .args(["replay", "--wav", wav_arg, "--no-frequency-gate"])
        .output()
        .expect("ungated replay");
    assert!(ungated.status.success());
    let json: Value = serde_json::from_slice(&ungated.stdout).expect("report JSON");
    assert_eq!(json["detection_count"], 1);
    assert_eq!(json["detections"][0]["timestamp_ms"], 1050);

    let _ = std::fs::remove_file(&wav);
}

#[test]
fn levels_prints_one_line_per_tick() {
    let output = cli()
        .args(["levels", "--fixture", "room_tone"])
        .output()
        .expect("failed to run levels");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let lines: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("level line JSON"))
        .collect();
    assert_eq!(lines.len(), 40);
    assert_eq!(lines[3]["offset_ms"], 150);
    let level = lines[0]["level_db"].as_f64().unwrap();
    assert!(level < -60.0 && level > -66.0, "level {level}");
}

#[test]
fn dump_fixtures_lists_assets() {
    let output = cli()
        .arg("dump-fixtures")
        .output()
        .expect("failed to run dump-fixtures");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    assert!(
        stdout.contains("single_strike"),
        "expected fixture listing, got {stdout}"
    );
}

#[test]
fn unknown_fixture_fails() {
    let output = cli()
        .args(["replay", "--fixture", "no_such_fixture"])
        .output()
        .expect("failed to run replay");
    assert_eq!(output.status.code(), Some(1));
}
