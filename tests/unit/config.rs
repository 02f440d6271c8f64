use super::*;

const IDENTITY_SHIFT: [f64; 9] = [1.0, 0.0, 400.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

fn two_files() -> serde_json::Value {
    serde_json::json!({
        "sources": [
            { "kind": "file", "path": "left.mp4", "scale_width": 400 },
            { "kind": "file", "path": "right.mp4" }
        ],
        "align": {
            "aligner": { "kind": "fixed", "homographies": [IDENTITY_SHIFT] }
        }
    })
}

fn parse(v: &serde_json::Value) -> StitchResult<StitchConfig> {
    StitchConfig::from_json_str(&v.to_string())
}

#[test]
fn minimal_config_fills_defaults() {
    let cfg = parse(&two_files()).unwrap();
    assert_eq!(cfg.sources.len(), 2);
    assert_eq!(cfg.sources[0].scale_width(), Some(400));
    assert_eq!(cfg.align.params, AlignParams::default());
    assert_eq!(cfg.output.fps, Fps { num: 20, den: 1 });
    assert_eq!(cfg.output.resolution().unwrap(), None);
    assert!(cfg.preview.enabled);
    assert!(cfg.record.is_none());
    assert!(cfg.stream.is_none());
    assert_eq!(cfg.logging, LoggingConfig::default());
}

#[test]
fn align_params_are_flattened() {
    let mut v = two_files();
    v["align"]["min_good_matches"] = 30.into();
    v["align"]["ratio"] = 0.6.into();
    let cfg = parse(&v).unwrap();
    assert_eq!(cfg.align.params.min_good_matches, 30);
    assert!((cfg.align.params.ratio - 0.6).abs() < 1e-6);
    assert_eq!(cfg.align.params.reproj_threshold, 5.0);
}

#[test]
fn live_device_defaults() {
    let mut v = two_files();
    v["sources"][0] = serde_json::json!({
        "kind": "live_device", "device": "/dev/video0", "width": 640, "height": 480
    });
    let cfg = parse(&v).unwrap();
    assert_eq!(
        cfg.sources[0],
        SourceDescriptor::LiveDevice {
            device: "/dev/video0".to_string(),
            input_format: "v4l2".to_string(),
            width: 640,
            height: 480,
            fps: 30,
            scale_width: None,
        }
    );
}

#[test]
fn homography_count_must_match_node_count() {
    let mut v = two_files();
    v["align"]["aligner"]["homographies"] = serde_json::json!([IDENTITY_SHIFT, IDENTITY_SHIFT]);
    let err = parse(&v).unwrap_err();
    assert!(matches!(err, StitchError::Config(msg) if msg.contains("need 1 homographies")));
}

#[test]
fn min_good_matches_below_four_is_rejected() {
    let mut v = two_files();
    v["align"]["min_good_matches"] = 3.into();
    let err = parse(&v).unwrap_err();
    assert!(matches!(err, StitchError::Config(msg) if msg.contains("min_good_matches")));

    v["align"]["min_good_matches"] = 4.into();
    assert_eq!(parse(&v).unwrap().align.params.min_good_matches, 4);
}

#[test]
fn singular_homography_is_rejected() {
    let mut v = two_files();
    let zeros = [0.0f64; 9];
    v["align"]["aligner"]["homographies"] = serde_json::json!([zeros]);
    assert!(matches!(parse(&v), Err(StitchError::Config(_))));
}

#[test]
fn source_count_is_bounded() {
    let mut v = two_files();
    v["sources"] = serde_json::json!([]);
    assert!(matches!(parse(&v), Err(StitchError::Config(_))));

    let file = serde_json::json!({ "kind": "file", "path": "x.mp4" });
    v["sources"] = serde_json::Value::Array(vec![file; 5]);
    v["align"]["aligner"] = serde_json::json!({ "kind": "correspondence" });
    assert!(matches!(parse(&v), Err(StitchError::Config(_))));
}

#[test]
fn stream_requires_explicit_output_size() {
    let mut v = two_files();
    v["stream"] = serde_json::json!({ "address": "rtmp://localhost/live/stitch" });
    assert!(matches!(parse(&v), Err(StitchError::Config(msg)) if msg.contains("streaming")));

    v["output"] = serde_json::json!({ "width": 1280, "height": 480 });
    let cfg = parse(&v).unwrap();
    let stream = cfg.stream.unwrap();
    assert_eq!(stream.format, "flv");
    assert_eq!(stream.program, "ffmpeg");
    assert!(stream.extra_args.iter().any(|a| a == "libx264"));
}

#[test]
fn odd_or_partial_output_size_is_rejected() {
    let mut v = two_files();
    v["output"] = serde_json::json!({ "width": 641, "height": 480 });
    assert!(matches!(parse(&v), Err(StitchError::Config(_))));
    v["output"] = serde_json::json!({ "width": 640 });
    assert!(matches!(parse(&v), Err(StitchError::Config(_))));
}

#[test]
fn zero_scale_width_is_rejected() {
    let mut v = two_files();
    v["sources"][1]["scale_width"] = 0.into();
    assert!(matches!(parse(&v), Err(StitchError::Config(msg)) if msg.contains("source 1")));
}

#[test]
fn correction_needs_positive_focal_length() {
    let mut v = two_files();
    v["correction"] = serde_json::json!({ "fx": 0.0, "fy": 500.0, "cx": 320.0, "cy": 240.0, "k1": -0.2 });
    assert!(matches!(parse(&v), Err(StitchError::Config(_))));
    v["correction"]["fx"] = 500.0.into();
    let cfg = parse(&v).unwrap();
    assert_eq!(cfg.correction.unwrap().k2, 0.0);
}

#[test]
fn malformed_json_is_a_config_error() {
    assert!(matches!(
        StitchConfig::from_json_str("{ not json"),
        Err(StitchError::Config(_))
    ));
}

#[test]
fn from_path_reports_missing_file() {
    let err = StitchConfig::from_path(Path::new("target/does-not-exist/stitch.json")).unwrap_err();
    assert!(matches!(err, StitchError::Config(msg) if msg.contains("failed to read config")));
}
