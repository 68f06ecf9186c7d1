use webvtt_processor::{
    MarkupNode, WebvttParsingOptions, generate_webvtt, parse_webvtt,
};

const REAL_WORLD_VTT: &str = include_str!("test_data/real_world.vtt");

#[test]
fn test_real_world_file_parses_cleanly() {
    let parsed = parse_webvtt(REAL_WORLD_VTT, &WebvttParsingOptions::default());

    assert!(
        parsed.diagnostics.is_empty(),
        "样本文件不应产生诊断: {:?}",
        parsed.diagnostics
    );
    assert_eq!(parsed.cues.len(), 8);
    assert_eq!(parsed.styles.len(), 2);

    assert_eq!(parsed.cues[0].id, "opening-1");
    assert_eq!(parsed.cues[0].start_time, 1.2);
    assert_eq!(parsed.cues[0].size, 80.0);

    // 无标识符的提示保持空 id
    assert_eq!(parsed.cues[2].id, "");
}

#[test]
fn test_karaoke_cue_has_inline_timestamps() {
    let parsed = parse_webvtt(REAL_WORLD_VTT, &WebvttParsingOptions::default());
    let karaoke = parsed
        .cues
        .iter()
        .find(|c| c.id == "karaoke-1")
        .expect("样本文件应包含 karaoke-1 提示");

    let timestamps: Vec<f64> = karaoke
        .tree
        .iter()
        .filter_map(|node| match node {
            MarkupNode::Timestamp(value) => Some(*value),
            _ => None,
        })
        .collect();
    assert_eq!(timestamps, vec![14.0, 15.0, 16.0, 17.0]);
}

#[test]
fn test_round_trip_is_stable() {
    let options = WebvttParsingOptions::default();
    let parsed = parse_webvtt(REAL_WORLD_VTT, &options);
    let output = generate_webvtt(&parsed.cues, &parsed.styles).expect("序列化失败");

    let reparsed = parse_webvtt(&output, &options);
    assert!(
        reparsed.diagnostics.is_empty(),
        "重新解析不应产生诊断: {:?}",
        reparsed.diagnostics
    );
    assert_eq!(reparsed.cues.len(), parsed.cues.len());
    assert_eq!(reparsed.styles, parsed.styles);

    for (before, after) in parsed.cues.iter().zip(&reparsed.cues) {
        assert_eq!(before.id, after.id);
        assert_eq!(before.start_time, after.start_time);
        assert_eq!(before.end_time, after.end_time);
        assert_eq!(before.tree, after.tree);
    }
}
