//! # WebVTT 数据模型
//!
//! 定义提示块（cue）、行内标记树、诊断信息以及解析选项等核心类型。

use std::fmt;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// 枚举：解析模式。
///
/// 模式只影响提示文本组件的诊断行为，不影响树的构建：
/// `Metadata` 抑制提示文本产生的所有诊断，`Chapters` 额外对
/// 出现的起始标签和时间戳标签生成诊断（但不阻止它们）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParseMode {
    /// 普通字幕模式：提示文本的诊断照常生成。
    #[default]
    Captions,
    /// 元数据模式：提示文本按尽力而为的方式静默解析。
    Metadata,
    /// 章节模式：提示文本中不允许出现标记和时间戳标签。
    Chapters,
}

/// 枚举：提示块的书写方向。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum CueDirection {
    /// 水平书写（默认值，序列化时省略）。
    #[default]
    Horizontal,
    /// 垂直书写，行从右向左排列。
    Rl,
    /// 垂直书写，行从左向右排列。
    Lr,
}

/// 枚举：`line` 设置的对齐方式。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum LineAlignment {
    /// 起始对齐（默认值）。
    #[default]
    Start,
    /// 居中对齐。
    Center,
    /// 末尾对齐。
    End,
}

/// 枚举：`position` 设置的对齐方式。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
pub enum PositionAlignment {
    /// 自动（默认值）。
    #[default]
    Auto,
    /// 对齐到行首一侧。
    LineLeft,
    /// 居中对齐。
    Center,
    /// 对齐到行尾一侧。
    LineRight,
}

/// 枚举：提示文本的对齐方式（`align` 设置）。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum TextAlignment {
    /// 起始对齐。
    Start,
    /// 居中对齐（默认值，序列化时省略）。
    #[default]
    Center,
    /// 末尾对齐。
    End,
    /// 左对齐。
    Left,
    /// 右对齐。
    Right,
}

/// 枚举：提示文本中允许出现的标签名。
///
/// WebVTT 的标签集是封闭的，任何其它名字都会被解析器丢弃并生成诊断。
/// 标签名区分大小写，字符串形式全部为小写。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum TagName {
    /// 样式类容器 `<c>`。
    C,
    /// 斜体 `<i>`。
    I,
    /// 粗体 `<b>`。
    B,
    /// 下划线 `<u>`。
    U,
    /// 注音容器 `<ruby>`。
    Ruby,
    /// 注音文本 `<rt>`，只能直接出现在 `<ruby>` 内。
    Rt,
    /// 说话人 `<v 说话人>`，不可自身嵌套。
    V,
    /// 语言 `<lang 语言代码>`。
    Lang,
}

/// 提示文本标记树中的一个节点。
///
/// 树中不存在任何指向父节点的引用；构建期间的父子回指只存在于
/// 解析器内部的栈上，不会出现在返回的结构里。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarkupNode {
    /// 已解码的文本片段。
    Text(String),
    /// 元素节点。
    Element(ElementNode),
    /// 提示内时间戳（单位：秒）。
    Timestamp(f64),
}

/// 标记树中的元素节点。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    /// 标签名。
    pub name: TagName,
    /// 有序的类名列表（`<c.yellow.bg_blue>` 中的 `yellow`、`bg_blue`）。
    pub classes: Vec<String>,
    /// 注释文本：`<v>` 的说话人或 `<lang>` 的语言代码。
    pub value: Option<String>,
    /// 有序的子节点列表。
    pub children: Vec<MarkupNode>,
}

impl ElementNode {
    /// 创建一个没有类名和注释的元素节点。
    #[must_use]
    pub const fn new(name: TagName) -> Self {
        Self {
            name,
            classes: Vec::new(),
            value: None,
            children: Vec::new(),
        }
    }
}

/// 解析过程中收集的一条诊断信息。
///
/// 诊断按出现顺序累积，永远不会作为异常抛出。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// 诊断消息。
    pub message: String,
    /// 1 起始的行号。
    pub line: usize,
    /// 1 起始的列号（按字符计），并非总是可用。
    pub column: Option<usize>,
}

impl Diagnostic {
    pub(crate) fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column: None,
        }
    }

    pub(crate) fn with_column(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column: Some(column),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(column) => write!(f, "{}:{}: {}", self.line, column, self.message),
            None => write!(f, "{}: {}", self.line, self.message),
        }
    }
}

/// 一个提示块（cue）：一条带时间的字幕单元。
///
/// 由 [`Cue::default`] 按规范默认值创建，随后被计时与设置解析器原地修改，
/// 最后由提示文本解析器填入 `tree`。排序之后提示块即视为不可变。
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default)]
pub struct Cue {
    /// 标识符，允许为空字符串。
    pub id: String,
    /// 开始时间（秒，毫秒精度）。
    pub start_time: f64,
    /// 结束时间（秒，毫秒精度）。
    pub end_time: f64,
    /// 书写方向。
    pub direction: CueDirection,
    /// `true` 时 `line_position` 是整数行号，`false` 时是百分比。
    pub snap_to_lines: bool,
    /// 行位置，`None` 表示自动。百分比形式时取值范围为 `[0, 100]`。
    pub line_position: Option<f64>,
    /// 行对齐方式。
    pub line_align: LineAlignment,
    /// 文本位置（总是百分比），`None` 表示自动。
    pub text_position: Option<f64>,
    /// 文本位置的对齐方式。
    pub position_align: PositionAlignment,
    /// 提示框大小，百分比，取值范围 `[0, 100]`。
    pub size: f64,
    /// 文本对齐方式。
    pub alignment: TextAlignment,
    /// 播放到结束时间时是否暂停。仅作记录，解析器不会设置它。
    pub pause_on_exit: bool,
    /// 原始载荷文本（多行以换行符连接）。
    pub text: String,
    /// 解析后的标记树（顶层节点的有序列表）。
    pub tree: Vec<MarkupNode>,
}

impl Default for Cue {
    fn default() -> Self {
        Self {
            id: String::new(),
            start_time: 0.0,
            end_time: 0.0,
            direction: CueDirection::Horizontal,
            snap_to_lines: true,
            line_position: None,
            line_align: LineAlignment::Start,
            text_position: None,
            position_align: PositionAlignment::Auto,
            size: 100.0,
            alignment: TextAlignment::Center,
            pause_on_exit: false,
            text: String::new(),
            tree: Vec::new(),
        }
    }
}

/// 实体引用查找表：从引用名（含 `&` 前缀）到替换文本的映射。
///
/// 查找采用最长匹配，因此同时收录带分号的规范形式（`&amp;`）
/// 和宽松的无分号形式（`&amp`）。表在构建后只读，
/// 可以安全地在多个解析调用之间共享。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTable {
    /// 按键长降序排列的 (引用名, 替换文本) 列表。
    entries: Vec<(String, String)>,
}

impl EntityTable {
    /// 从任意映射构建查找表。键应当包含 `&` 前缀。
    pub fn new<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut entries: Vec<(String, String)> = pairs.into_iter().collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { entries }
    }

    /// 在 `input` 的开头查找最长匹配的实体引用。
    pub(crate) fn longest_match<'a>(&'a self, input: &str) -> Option<(&'a str, &'a str)> {
        self.entries
            .iter()
            .find(|(key, _)| input.starts_with(key.as_str()))
            .map(|(key, replacement)| (key.as_str(), replacement.as_str()))
    }
}

impl Default for EntityTable {
    /// 默认表覆盖 `amp`、`lt`、`gt`、`lrm`、`rlm`、`nbsp` 六个名字的两种形式。
    fn default() -> Self {
        const DEFAULTS: [(&str, &str); 6] = [
            ("amp", "\u{26}"),
            ("lt", "\u{3C}"),
            ("gt", "\u{3E}"),
            ("lrm", "\u{200E}"),
            ("rlm", "\u{200F}"),
            ("nbsp", "\u{A0}"),
        ];
        Self::new(DEFAULTS.iter().flat_map(|(name, replacement)| {
            [
                (format!("&{name};"), (*replacement).to_string()),
                (format!("&{name}"), (*replacement).to_string()),
            ]
        }))
    }
}

/// WebVTT 解析选项。
#[derive(Debug, Clone, Default)]
pub struct WebvttParsingOptions {
    /// 解析模式。
    pub mode: ParseMode,
    /// 提示文本使用的实体引用表。
    pub entities: EntityTable,
}

/// 一次解析调用的完整结果。
#[derive(Debug, Clone, Default)]
pub struct ParsedWebvtt {
    /// 按 `(start_time, end_time)` 稳定排序后的提示块列表。
    pub cues: Vec<Cue>,
    /// 按出现顺序累积的诊断信息。
    pub diagnostics: Vec<Diagnostic>,
    /// 第一个提示块之前出现的 STYLE 块的原始内容。
    pub styles: Vec<String>,
    /// 解析耗时（毫秒）。
    pub elapsed_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_cue_defaults() {
        let cue = Cue::default();
        assert_eq!(cue.direction, CueDirection::Horizontal);
        assert!(cue.snap_to_lines);
        assert_eq!(cue.line_position, None);
        assert_eq!(cue.line_align, LineAlignment::Start);
        assert_eq!(cue.text_position, None);
        assert_eq!(cue.position_align, PositionAlignment::Auto);
        assert!((cue.size - 100.0).abs() < f64::EPSILON);
        assert_eq!(cue.alignment, TextAlignment::Center);
        assert!(!cue.pause_on_exit);
    }

    #[test]
    fn test_cue_builder_uses_defaults() {
        let cue = CueBuilder::default()
            .start_time(1.0)
            .end_time(2.5)
            .alignment(TextAlignment::Left)
            .build()
            .expect("构建 Cue 失败");
        assert!((cue.start_time - 1.0).abs() < f64::EPSILON);
        assert!(cue.snap_to_lines);
        assert!((cue.size - 100.0).abs() < f64::EPSILON);
        assert_eq!(cue.alignment, TextAlignment::Left);
    }

    #[test]
    fn test_tag_name_string_forms() {
        assert_eq!(TagName::from_str("ruby").unwrap(), TagName::Ruby);
        assert_eq!(TagName::from_str("lang").unwrap(), TagName::Lang);
        assert!(TagName::from_str("RUBY").is_err());
        assert!(TagName::from_str("div").is_err());
        assert_eq!(TagName::V.to_string(), "v");
        assert_eq!(PositionAlignment::LineLeft.to_string(), "line-left");
    }

    #[test]
    fn test_entity_table_longest_match() {
        let table = EntityTable::default();
        let (key, replacement) = table.longest_match("&amp;x").unwrap();
        assert_eq!(key, "&amp;");
        assert_eq!(replacement, "&");

        // 无分号的宽松形式也能匹配
        let (key, replacement) = table.longest_match("&amp").unwrap();
        assert_eq!(key, "&amp");
        assert_eq!(replacement, "&");

        assert!(table.longest_match("&foo;").is_none());
    }

    #[test]
    fn test_markup_node_serde_roundtrip() {
        let node = MarkupNode::Element(ElementNode {
            name: TagName::V,
            classes: vec!["loud".to_string()],
            value: Some("Esme".to_string()),
            children: vec![MarkupNode::Text("Hello".to_string())],
        });
        let json = serde_json::to_string(&node).expect("序列化失败");
        let back: MarkupNode = serde_json::from_str(&json).expect("反序列化失败");
        assert_eq!(node, back);
    }
}
