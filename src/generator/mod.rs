//! # WebVTT 生成器
//!
//! 把提示列表与样式块序列化回 WebVTT 文本。与解析器共享数据
//! 模型，但不依赖其任何组件。
//!
//! 设置只在与默认值不同的情况下输出；文本节点只转义 `&`、`<`
//! 和 `>`，其余解析时解码过的实体引用不会还原。

use std::fmt::Write;

use crate::error::VttError;
use crate::types::{
    Cue, CueDirection, LineAlignment, MarkupNode, PositionAlignment, TextAlignment,
};

/// 把提示与样式块序列化为完整的 WebVTT 文本。
///
/// # 参数
///
/// * `cues` - 要输出的提示列表，按给定顺序原样输出。
/// * `styles` - STYLE 块的原始内容。
///
/// # Errors
///
/// 仅在底层字符串写入失败时返回错误。
pub fn generate_webvtt(cues: &[Cue], styles: &[String]) -> Result<String, VttError> {
    let mut output = String::with_capacity(cues.len() * 64 + 16);
    output.push_str("WEBVTT\n\n");

    for style in styles {
        writeln!(output, "STYLE\n{style}\n")?;
    }

    for cue in cues {
        if !cue.id.is_empty() {
            writeln!(output, "{}", cue.id)?;
        }
        write!(
            output,
            "{} --> {}",
            format_timestamp(cue.start_time),
            format_timestamp(cue.end_time)
        )?;
        write_settings(&mut output, cue)?;
        output.push('\n');
        write_tree(&mut output, &cue.tree);
        output.push_str("\n\n");
    }

    Ok(output)
}

/// 格式化提示时间戳。小时部分只在总时长达到一小时时输出，
/// 且不做前导零填充。
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0).round().max(0.0) as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let secs = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}.{millis:03}")
    } else {
        format!("{minutes:02}:{secs:02}.{millis:03}")
    }
}

/// 格式化提示内部的时间戳节点。小时部分始终输出并填充到两位。
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn format_tag_timestamp(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0).round().max(0.0) as u64;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total_ms / 3_600_000,
        (total_ms / 60_000) % 60,
        (total_ms / 1000) % 60,
        total_ms % 1000
    )
}

/// 按最短形式输出设置数值：整数不带小数部分。
#[allow(clippy::cast_possible_truncation)]
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// 输出与默认值不同的设置项，每项前置一个空格。
fn write_settings(output: &mut String, cue: &Cue) -> Result<(), VttError> {
    if cue.direction != CueDirection::Horizontal {
        write!(output, " vertical:{}", cue.direction)?;
    }
    if cue.line_position.is_some() || cue.line_align != LineAlignment::Start {
        let position = cue.line_position.map_or_else(
            || "auto".to_string(),
            |v| {
                let suffix = if cue.snap_to_lines { "" } else { "%" };
                format!("{}{suffix}", format_number(v))
            },
        );
        write!(output, " line:{position}")?;
        if cue.line_align != LineAlignment::Start {
            write!(output, ",{}", cue.line_align)?;
        }
    }
    if cue.text_position.is_some() || cue.position_align != PositionAlignment::Auto {
        let position = cue
            .text_position
            .map_or_else(|| "auto".to_string(), |v| format!("{}%", format_number(v)));
        write!(output, " position:{position}")?;
        if cue.position_align != PositionAlignment::Auto {
            write!(output, ",{}", cue.position_align)?;
        }
    }
    if cue.size != 100.0 {
        write!(output, " size:{}%", format_number(cue.size))?;
    }
    if cue.alignment != TextAlignment::Center {
        write!(output, " align:{}", cue.alignment)?;
    }
    Ok(())
}

fn write_tree(output: &mut String, nodes: &[MarkupNode]) {
    for node in nodes {
        match node {
            MarkupNode::Text(text) => {
                for c in text.chars() {
                    match c {
                        '&' => output.push_str("&amp;"),
                        '<' => output.push_str("&lt;"),
                        '>' => output.push_str("&gt;"),
                        c => output.push(c),
                    }
                }
            }
            MarkupNode::Element(element) => {
                output.push('<');
                output.push_str(&element.name.to_string());
                for class in &element.classes {
                    output.push('.');
                    output.push_str(class);
                }
                if let Some(value) = element.value.as_deref()
                    && !value.is_empty()
                {
                    output.push(' ');
                    output.push_str(value);
                }
                output.push('>');
                write_tree(output, &element.children);
                output.push_str("</");
                output.push_str(&element.name.to_string());
                output.push('>');
            }
            MarkupNode::Timestamp(value) => {
                output.push('<');
                output.push_str(&format_tag_timestamp(*value));
                output.push('>');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_webvtt;
    use crate::types::{ElementNode, TagName, WebvttParsingOptions};

    fn cue(start: f64, end: f64, text: &str) -> Cue {
        Cue {
            start_time: start,
            end_time: end,
            tree: vec![MarkupNode::Text(text.to_string())],
            ..Cue::default()
        }
    }

    #[test]
    fn test_minimal_output() {
        let output = generate_webvtt(&[cue(1.0, 2.0, "Hello")], &[]).unwrap();
        assert_eq!(output, "WEBVTT\n\n00:01.000 --> 00:02.000\nHello\n\n");
    }

    #[test]
    fn test_timestamp_formatting() {
        assert_eq!(format_timestamp(0.0), "00:00.000");
        assert_eq!(format_timestamp(59.999), "00:59.999");
        assert_eq!(format_timestamp(3599.999), "59:59.999");
        assert_eq!(format_timestamp(3600.0), "1:00:00.000");
        assert_eq!(format_timestamp(36000.5), "10:00:00.500");
    }

    #[test]
    fn test_tag_timestamp_always_has_hours() {
        assert_eq!(format_tag_timestamp(2.5), "00:00:02.500");
        assert_eq!(format_tag_timestamp(3661.0), "01:01:01.000");
    }

    #[test]
    fn test_default_settings_are_suppressed() {
        let output = generate_webvtt(&[cue(0.0, 1.0, "x")], &[]).unwrap();
        assert!(!output.contains("vertical:"));
        assert!(!output.contains("line:"));
        assert!(!output.contains("position:"));
        assert!(!output.contains("size:"));
        assert!(!output.contains("align:"));
    }

    #[test]
    fn test_settings_rendering_snapshot() {
        let mut c = cue(0.0, 1.0, "x");
        c.size = 37.5;
        c.alignment = TextAlignment::End;
        c.text_position = Some(90.0);
        let mut rendered = String::new();
        write_settings(&mut rendered, &c).unwrap();
        insta::assert_snapshot!(rendered, @" position:90% size:37.5% align:end");
    }

    #[test]
    fn test_non_default_settings_are_emitted() {
        let mut c = cue(0.0, 1.0, "x");
        c.direction = CueDirection::Rl;
        c.size = 50.0;
        c.alignment = TextAlignment::Left;
        c.snap_to_lines = false;
        c.line_position = Some(10.0);
        c.line_align = LineAlignment::End;
        c.text_position = Some(25.0);
        c.position_align = PositionAlignment::LineLeft;
        let output = generate_webvtt(&[c], &[]).unwrap();
        assert!(output.contains(
            "00:00.000 --> 00:01.000 vertical:rl line:10%,end position:25%,line-left size:50% align:left"
        ));
    }

    #[test]
    fn test_snap_to_lines_position_has_no_percent() {
        let mut c = cue(0.0, 1.0, "x");
        c.line_position = Some(-1.0);
        let output = generate_webvtt(&[c], &[]).unwrap();
        assert!(output.contains(" line:-1\n"));
    }

    #[test]
    fn test_id_line_is_emitted_when_present() {
        let mut c = cue(0.0, 1.0, "x");
        c.id = "intro".to_string();
        let output = generate_webvtt(&[c], &[]).unwrap();
        assert!(output.contains("\n\nintro\n00:00.000"));
    }

    #[test]
    fn test_style_blocks_come_first() {
        let output =
            generate_webvtt(&[cue(0.0, 1.0, "x")], &["::cue { color: red; }".to_string()])
                .unwrap();
        assert!(output.starts_with("WEBVTT\n\nSTYLE\n::cue { color: red; }\n\n"));
    }

    #[test]
    fn test_text_is_escaped() {
        let output = generate_webvtt(&[cue(0.0, 1.0, "a & b < c > d")], &[]).unwrap();
        assert!(output.contains("a &amp; b &lt; c &gt; d"));
    }

    #[test]
    fn test_element_rendering() {
        let mut c = cue(0.0, 1.0, "");
        c.tree = vec![MarkupNode::Element(ElementNode {
            name: TagName::V,
            classes: vec!["loud".to_string()],
            value: Some("Fred".to_string()),
            children: vec![
                MarkupNode::Text("Hi ".to_string()),
                MarkupNode::Timestamp(0.5),
                MarkupNode::Text("there".to_string()),
            ],
        })];
        let output = generate_webvtt(&[c], &[]).unwrap();
        assert!(output.contains("<v.loud Fred>Hi <00:00:00.500>there</v>"));
    }

    #[test]
    fn test_round_trip_preserves_timestamps_and_suppresses_defaults() {
        let input = "WEBVTT\n\n00:00:01.500 --> 00:00:03.000\n<i>Hello</i> world\n";
        let parsed = parse_webvtt(input, &WebvttParsingOptions::default());
        assert!(parsed.diagnostics.is_empty());
        let output = generate_webvtt(&parsed.cues, &parsed.styles).unwrap();
        assert_eq!(output, "WEBVTT\n\n00:01.500 --> 00:03.000\n<i>Hello</i> world\n\n");
        let reparsed = parse_webvtt(&output, &WebvttParsingOptions::default());
        assert_eq!(reparsed.cues[0].start_time, 1.5);
        assert_eq!(reparsed.cues[0].end_time, 3.0);
    }
}
