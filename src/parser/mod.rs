//! # WebVTT 解析器
//!
//! 顶层驱动：把输入拆分为行，校验签名行，区分文件头、NOTE、
//! STYLE 与提示块，对格式错误的块执行恢复跳过，并驱动
//! [`timing`] 与 [`cue_text`] 两个子解析器。
//!
//! 所有格式问题都以 [`Diagnostic`] 的形式收集，解析本身从不
//! 因输入内容而失败。

mod cue_text;
mod timing;

use std::sync::LazyLock;
use std::time::Instant;

use regex::Regex;
use tracing::warn;

use crate::types::{Cue, Diagnostic, ParsedWebvtt, WebvttParsingOptions};

static NOTE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^NOTE(?:[ \t]|$)").expect("未能编译 NOTE 块正则表达式")
});

static STYLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^STYLE(?:[ \t]|$)").expect("未能编译 STYLE 块正则表达式")
});

/// 解析一段完整的 WebVTT 文本。
///
/// 单遍、同步地扫描整个输入。格式错误不会中断解析：
/// 每个问题作为一条诊断记录下来，结果中保留尽可能多的提示块。
/// 唯一会整块丢弃提示的情况是时间轴行本身无法解析。
///
/// # 参数
///
/// * `input` - 已完成解码的 WebVTT 文本（允许带 BOM）。
/// * `options` - 解析模式与实体替换表。
///
/// # 返回
///
/// 按 `(start_time, end_time)` 稳定排序的提示列表、
/// 诊断列表、STYLE 块内容以及解析耗时。
#[must_use]
pub fn parse_webvtt(input: &str, options: &WebvttParsingOptions) -> ParsedWebvtt {
    let start = Instant::now();
    let mut assembler = CueAssembler::new(input, options);
    assembler.run();

    ParsedWebvtt {
        cues: assembler.cues,
        diagnostics: assembler.diagnostics,
        styles: assembler.styles,
        elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
    }
}

/// 独立解析一个时间戳字符串。
///
/// 时间戳之后若还有剩余字符会生成一条诊断，但解析出的数值仍然返回。
pub fn parse_timestamp(text: &str, diagnostics: &mut Vec<Diagnostic>) -> Option<f64> {
    timing::TimingLineScanner::new(text, 1, diagnostics).parse_timestamp_value()
}

/// 把输入按 `\r\n`、`\r` 或 `\n` 拆分为行，同时把 NUL 替换为 U+FFFD。
fn split_lines(input: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                lines.push(std::mem::take(&mut current));
            }
            '\n' => lines.push(std::mem::take(&mut current)),
            '\0' => current.push('\u{fffd}'),
            c => current.push(c),
        }
    }
    lines.push(current);
    lines
}

struct CueAssembler<'a> {
    lines: Vec<String>,
    /// 当前的 0 起始行索引。
    pos: usize,
    /// 恢复标记：上一轮已经停在下一条时间轴行上，本轮不再跳过空行。
    already_collected: bool,
    options: &'a WebvttParsingOptions,
    cues: Vec<Cue>,
    diagnostics: Vec<Diagnostic>,
    styles: Vec<String>,
}

impl<'a> CueAssembler<'a> {
    fn new(input: &str, options: &'a WebvttParsingOptions) -> Self {
        Self {
            lines: split_lines(input),
            pos: 0,
            already_collected: false,
            options,
            cues: Vec::new(),
            diagnostics: Vec::new(),
            styles: Vec::new(),
        }
    }

    fn report(&mut self, message: impl Into<String>, line_index: usize) {
        self.diagnostics.push(Diagnostic::new(message, line_index + 1));
    }

    fn line(&self) -> Option<&str> {
        self.lines.get(self.pos).map(String::as_str)
    }

    fn run(&mut self) {
        self.parse_signature();
        self.parse_header();
        while self.pos < self.lines.len() {
            if self.already_collected {
                self.already_collected = false;
            } else {
                while self.line().is_some_and(str::is_empty) {
                    self.pos += 1;
                }
            }
            let Some(line) = self.line() else { break };

            let mut id = String::new();
            if !line.contains("-->") {
                if NOTE_REGEX.is_match(line) {
                    self.skip_comment_block();
                    continue;
                }
                if STYLE_REGEX.is_match(line) {
                    self.collect_style_block();
                    continue;
                }
                id = line.to_string();
                if !self.enter_identified_cue() {
                    continue;
                }
            }
            self.parse_cue_block(id);
        }
        // 稳定排序，相同键保持出现顺序
        self.cues.sort_by(|a, b| {
            a.start_time
                .total_cmp(&b.start_time)
                .then(a.end_time.total_cmp(&b.end_time))
        });
    }

    fn parse_signature(&mut self) {
        let first = self.lines.first().map_or("", String::as_str);
        let rest = first.strip_prefix('\u{feff}').unwrap_or(first);
        let valid = match rest.strip_prefix("WEBVTT") {
            Some(tail) => tail.is_empty() || tail.starts_with(' ') || tail.starts_with('\t'),
            None => false,
        };
        if !valid {
            self.report("Invalid WebVTT signature.", 0);
        }
        self.pos = 1;
    }

    /// 消耗签名行之后、第一个空行之前的所有文件头行。
    /// 头部出现 `-->` 时立即中止，把该行交给提示循环处理。
    fn parse_header(&mut self) {
        while let Some(line) = self.line() {
            if line.is_empty() {
                break;
            }
            if line.contains("-->") {
                self.already_collected = true;
                break;
            }
            self.report("No blank line after the WebVTT signature.", self.pos);
            self.pos += 1;
        }
    }

    /// 丢弃一个 NOTE 块，直到下一个空行。内容不保留。
    fn skip_comment_block(&mut self) {
        self.pos += 1;
        while let Some(line) = self.line() {
            if line.is_empty() {
                break;
            }
            if line.contains("-->") {
                self.report("A comment cannot contain '-->'.", self.pos);
            }
            self.pos += 1;
        }
    }

    /// 收集一个 STYLE 块。只有在不含 `-->` 且此前尚未接受任何
    /// 提示块时，内容才会进入样式列表。
    fn collect_style_block(&mut self) {
        let style_line = self.pos;
        let mut content: Vec<&str> = Vec::new();
        let mut saw_arrow = false;
        self.pos += 1;
        while self.pos < self.lines.len() && !self.lines[self.pos].is_empty() {
            if self.lines[self.pos].contains("-->") {
                saw_arrow = true;
            } else {
                content.push(&self.lines[self.pos]);
            }
            self.pos += 1;
        }
        let content = content.join("\n");
        if saw_arrow {
            warn!("STYLE 块内出现 '-->'，丢弃其内容 (第 {} 行)", style_line + 1);
            self.report("A style block cannot contain '-->'.", style_line);
        } else if self.cues.is_empty() {
            self.styles.push(content);
        } else {
            warn!("首个提示块之后的 STYLE 块被丢弃 (第 {} 行)", style_line + 1);
            self.report("Style blocks cannot appear after the first cue.", style_line);
        }
    }

    /// 把当前行当作提示标识符，前进到它后面的时间轴行。
    /// 返回 `false` 表示块无效且已被丢弃。
    fn enter_identified_cue(&mut self) -> bool {
        let id_line = self.pos;
        self.pos += 1;
        match self.line() {
            None | Some("") => {
                warn!("提示标识符后没有内容，丢弃该提示块 (第 {} 行)", id_line + 1);
                self.report("Cue identifier cannot be standalone.", id_line);
                false
            }
            Some(next) if !next.contains("-->") => {
                warn!("提示标识符后缺少计时行，丢弃该提示块 (第 {} 行)", id_line + 1);
                self.report(
                    "Cue identifier needs to be followed by timestamp.",
                    id_line,
                );
                self.recover_block();
                false
            }
            Some(_) => true,
        }
    }

    /// 当前行是时间轴行。`id` 为空表示该提示块没有标识符行。
    fn parse_cue_block(&mut self, id: String) {
        let timing_index = self.pos;
        let mut cue = Cue {
            id,
            ..Cue::default()
        };
        let previous_start = self.cues.last().map(|c| c.start_time);
        let ok = timing::TimingLineScanner::new(
            &self.lines[timing_index],
            timing_index + 1,
            &mut self.diagnostics,
        )
        .parse_cue_timing(&mut cue, previous_start);
        if !ok {
            warn!("时间轴行解析失败，丢弃该提示块 (第 {} 行)", timing_index + 1);
            self.recover_block();
            return;
        }

        self.pos += 1;
        let payload_start = self.pos;
        while self.pos < self.lines.len() && !self.lines[self.pos].is_empty() {
            if self.lines[self.pos].contains("-->") {
                self.report("Blank line missing before cue.", self.pos);
                self.already_collected = true;
                break;
            }
            self.pos += 1;
        }

        cue.text = self.lines[payload_start..self.pos].join("\n");
        cue.tree = cue_text::parse_cue_text(
            &cue.text,
            self.options.mode,
            &self.options.entities,
            cue.start_time,
            cue.end_time,
            payload_start + 1,
            &mut self.diagnostics,
        );
        self.cues.push(cue);
    }

    /// 块级恢复：跳过当前行，前进到下一个空行或下一条含 `-->` 的
    /// 行。停在后者时设置恢复标记，让下一轮直接把它当作时间轴行。
    fn recover_block(&mut self) {
        self.pos += 1;
        while let Some(line) = self.line() {
            if line.is_empty() {
                break;
            }
            if line.contains("-->") {
                self.already_collected = true;
                break;
            }
            self.pos += 1;
        }
    }
}
