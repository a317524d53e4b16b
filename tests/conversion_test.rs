//! Conversion integration tests.
//!
//! Drives the engine with the rule document under `tests/fixtures` the way
//! the CLI does, checking the produced job and the mapping report together.

use profileforge_engine::{ConversionEngine, ConversionStatus, EngineConfig, MappingOutcome};
use profileforge_rules::RuleSet;
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn fixture_rules() -> RuleSet {
    RuleSet::from_json(include_str!("fixtures/rules.json")).unwrap()
}

fn engine() -> ConversionEngine {
    ConversionEngine::new(fixture_rules())
}

fn hd_profile() -> Value {
    serde_json::from_str(include_str!("fixtures/hd.json")).unwrap()
}

fn first_output(target: &Value) -> &Value {
    &target["Settings"]["OutputGroups"][0]["Outputs"][0]
}

// ---------------------------------------------------------------------------
// Single output
// ---------------------------------------------------------------------------

#[test]
fn test_hd_profile_is_fully_mapped() {
    let conversion = engine().convert(&hd_profile(), None).unwrap();
    let output = first_output(&conversion.target);
    let video = &output["VideoDescription"];

    assert_eq!(output["ContainerSettings"]["Container"], json!("MP4"));
    assert_eq!(video["Width"], json!(1280));
    assert_eq!(video["Height"], json!(720));
    assert_eq!(video["CodecSettings"]["Codec"], json!("H_264"));

    let h264 = &video["CodecSettings"]["H264Settings"];
    assert_eq!(h264["RateControlMode"], json!("CBR"));
    assert_eq!(h264["Bitrate"], json!(2500000));
    assert_eq!(h264["FramerateNumerator"], json!(25));
    assert_eq!(h264["CodecProfile"], json!("HIGH"));

    assert_eq!(
        output["AudioDescriptions"][0]["CodecSettings"]["AacSettings"]["Bitrate"],
        json!(128000)
    );
    assert_eq!(output["NameModifier"], json!("_1280x720_2500000_mc"));
    assert_eq!(
        conversion.target["Settings"]["OutputGroups"][0]["OutputGroupSettings"]["Type"],
        json!("FILE_GROUP_SETTINGS")
    );
    assert_eq!(
        conversion.target["Settings"]["Inputs"][0]["TimecodeSource"],
        json!("EMBEDDED")
    );

    let notify: Vec<_> = conversion.report.records_for("notify").collect();
    assert_eq!(notify.len(), 1);
    assert_eq!(notify[0].outcome, MappingOutcome::Dummy);
    assert!(conversion.report.unmapped.is_empty());
    assert_eq!(conversion.status(), ConversionStatus::FullyMapped);
}

#[test]
fn test_unknown_parameters_make_conversion_partial() {
    let mut profile = hd_profile();
    profile["watermark"] = json!({"image": "logo.png", "position": "top-left"});

    let conversion = engine().convert(&profile, None).unwrap();

    assert!(conversion.report.is_unmapped("watermark.image"));
    assert!(conversion.report.is_unmapped("watermark.position"));
    assert_eq!(conversion.status(), ConversionStatus::Partial);
}

#[test]
fn test_transformer_miss_and_formula() {
    let conversion = engine()
        .convert(&json!({"profile": "extended", "audio_volume": 60}), None)
        .unwrap();
    let output = first_output(&conversion.target);

    let profile: Vec<_> = conversion.report.records_for("profile").collect();
    assert_eq!(profile[0].outcome, MappingOutcome::SkippedNoMatch);
    assert!(output["VideoDescription"]["CodecSettings"]["H264Settings"]
        .get("CodecProfile")
        .is_none());

    assert_eq!(
        output["AudioDescriptions"][0]["AudioNormalizationSettings"]["TargetLkfs"],
        json!(-12.0)
    );
}

#[test]
fn test_source_condition_is_case_insensitive() {
    let engine = engine();

    let on = engine.convert(&json!({"deinterlace": " YES "}), None).unwrap();
    assert_eq!(
        on.target["Settings"]["Inputs"][0]["DeinterlaceMode"],
        json!("DEINTERLACE")
    );

    let off = engine.convert(&json!({"deinterlace": "no"}), None).unwrap();
    assert!(off.target["Settings"]["Inputs"][0]
        .get("DeinterlaceMode")
        .is_none());
    let records: Vec<_> = off.report.records_for("deinterlace").collect();
    assert_eq!(records[0].outcome, MappingOutcome::SkippedCondition);
}

#[test]
fn test_source_value_overrides_rule_default() {
    let conversion = engine()
        .convert(&json!({"timecode": "ZEROBASED"}), None)
        .unwrap();
    assert_eq!(
        conversion.target["Settings"]["Inputs"][0]["TimecodeSource"],
        json!("ZEROBASED")
    );
}

#[test]
fn test_regex_mismatch_leaves_dimensions_unset() {
    let conversion = engine().convert(&json!({"size": "hd720"}), None).unwrap();

    assert_eq!(
        conversion.report.count(MappingOutcome::SkippedRegexMismatch),
        2
    );
    assert!(first_output(&conversion.target)["VideoDescription"]
        .get("Width")
        .is_none());
}

// ---------------------------------------------------------------------------
// Renditions
// ---------------------------------------------------------------------------

#[test]
fn test_hls_ladder_expands_to_outputs() {
    let profile = json!({
        "output": "advanced_hls",
        "segment_duration": 6,
        "stream": [
            {"size": "640x360", "bitrate": "800k", "framerate": 25},
            {"size": "1280x720", "bitrate": "2500k", "framerate": 25},
            {"audio_only": "yes", "audio_bitrate": "96k"}
        ]
    });
    let conversion = engine().convert(&profile, None).unwrap();
    let group = &conversion.target["Settings"]["OutputGroups"][0];
    let outputs = group["Outputs"].as_array().unwrap();

    assert_eq!(outputs.len(), 3);
    assert_eq!(group["OutputGroupSettings"]["Type"], json!("HLS_GROUP_SETTINGS"));
    assert_eq!(
        group["OutputGroupSettings"]["HlsGroupSettings"]["SegmentLength"],
        json!(6)
    );

    assert_eq!(outputs[0]["VideoDescription"]["Width"], json!(640));
    assert_eq!(outputs[1]["VideoDescription"]["Height"], json!(720));
    assert_eq!(outputs[0]["NameModifier"], json!("_640x360_800K"));
    assert_eq!(outputs[0]["ContainerSettings"]["Container"], json!("M3U8"));
    assert_eq!(
        outputs[1]["OutputSettings"]["HlsSettings"]["AudioRenditionSets"],
        json!("audio")
    );
    assert_eq!(
        outputs[2]["OutputSettings"]["HlsSettings"]["AudioGroupId"],
        json!("audio")
    );
    assert!(outputs[2].get("VideoDescription").is_none());

    let framerate: Vec<_> = conversion.report.records_for("stream[1].framerate").collect();
    assert_eq!(
        framerate[0].target_path.as_deref(),
        Some("Settings.OutputGroups[0].Outputs[1].VideoDescription.CodecSettings.H264Settings.FramerateNumerator")
    );
    assert!(!conversion.report.is_unmapped("stream[2].audio_only"));
    assert!(!conversion.report.is_unmapped("segment_duration"));
}

#[test]
fn test_parallel_arrays_become_renditions() {
    let profile = json!({
        "output": "cmaf",
        "size": ["640x360", "1280x720", "1920x1080"],
        "bitrate": ["800k", "2500k", "5000k"],
        "audio_bitrate": "128k"
    });
    let conversion = engine().convert(&profile, None).unwrap();
    let outputs = conversion.target["Settings"]["OutputGroups"][0]["Outputs"]
        .as_array()
        .unwrap();

    assert_eq!(outputs.len(), 3);
    assert_eq!(outputs[2]["VideoDescription"]["Width"], json!(1920));
    for output in outputs {
        assert_eq!(output["Extension"], json!("m4s"));
        assert_eq!(
            output["AudioDescriptions"][0]["CodecSettings"]["AacSettings"]["Bitrate"],
            json!(128000)
        );
    }
    assert!(!conversion.report.is_unmapped("size"));
}

// ---------------------------------------------------------------------------
// Templates and engine sharing
// ---------------------------------------------------------------------------

#[test]
fn test_template_fields_survive() {
    let template = json!({
        "Queue": "arn:aws:mediaconvert:queues/Default",
        "Role": "arn:aws:iam::role/MediaConvert",
        "Settings": {
            "OutputGroups": [{
                "Name": "File Group",
                "Outputs": [{"ContainerSettings": {"Container": "MP4"}}]
            }],
            "Inputs": [{"FileInput": "S3_INPUT_URL"}]
        }
    });
    let conversion = engine().convert(&hd_profile(), Some(&template)).unwrap();

    assert_eq!(conversion.target["Role"], template["Role"]);
    assert_eq!(
        conversion.target["Settings"]["Inputs"][0]["FileInput"],
        json!("S3_INPUT_URL")
    );
    assert_eq!(
        conversion.target["Settings"]["OutputGroups"][0]["Name"],
        json!("File Group")
    );
    assert_eq!(
        first_output(&conversion.target)["VideoDescription"]["Width"],
        json!(1280)
    );
}

#[test]
fn test_engine_is_shared_across_threads() {
    let engine = engine();
    let profile = hd_profile();
    let expected = engine.convert(&profile, None).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| engine.convert(&profile, None).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn test_strict_transforms_skip_unknown_names() {
    let rules = RuleSet::from_value(&json!({
        "rules": [{"source": {"path": "audio_codec_profile"}, "target": {
            "path": "Settings.OutputGroups[0].Outputs[0].AudioDescriptions[0].CodecSettings.AacSettings.CodecProfile",
            "transform": "aac_profile_map"
        }}]
    }))
    .unwrap();
    let strict = ConversionEngine::with_config(
        rules,
        EngineConfig {
            strict_transforms: true,
            ..EngineConfig::default()
        },
    );

    let conversion = strict
        .convert(&json!({"audio_codec_profile": "hev1"}), None)
        .unwrap();
    let records: Vec<_> = conversion
        .report
        .records_for("audio_codec_profile")
        .collect();
    assert_eq!(records[0].outcome, MappingOutcome::SkippedUnresolvedTransform);
    assert_eq!(strict.unresolved_transforms().to_vec(), vec!["aac_profile_map".to_string()]);
}
