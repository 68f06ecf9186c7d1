//! # 计时行与设置扫描器
//!
//! 处理形如 `时间戳 --> 时间戳 设置...` 的单行文本，
//! 以及提示文本中时间戳标签使用的独立时间戳语法。

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{
    Cue, CueDirection, Diagnostic, LineAlignment, PositionAlignment, TextAlignment,
};

/// `line` 设置的数值语法：`-` 只能出现在开头，`%` 只能出现在末尾。
static LINE_VALUE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-\d]\d*(\.\d+)?%?$").expect("未能编译 LINE_VALUE_REGEX")
});

/// 作用域限定为一行的有状态扫描器。
///
/// 扫描器持有注入的诊断收集器；所有问题都以 [`Diagnostic`] 的形式报告，
/// 永远不会中止整个解析。
pub(crate) struct TimingLineScanner<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> TimingLineScanner<'a> {
    pub(crate) fn new(text: &str, line: usize, diagnostics: &'a mut Vec<Diagnostic>) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            line,
            diagnostics,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// 跳过空格和制表符，返回跳过的数量。
    fn skip_spaces(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn collect_digits(&mut self) -> String {
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            digits.push(c);
            self.pos += 1;
        }
        digits
    }

    /// 收集恰好 `n` 位数字，数量不足时返回 `None`。
    fn exactly_digits(&mut self, n: usize) -> Option<u64> {
        let mut value: u64 = 0;
        for _ in 0..n {
            let c = self.peek()?;
            let digit = c.to_digit(10)?;
            value = value * 10 + u64::from(digit);
            self.pos += 1;
        }
        Some(value)
    }

    pub(crate) fn remaining(&self) -> usize {
        self.chars.len() - self.pos
    }

    fn rest(&self) -> String {
        self.chars[self.pos..].iter().collect()
    }

    fn report(&mut self, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::with_column(message, self.line, self.pos + 1));
    }

    /// 解析一个时间戳，返回秒数。
    ///
    /// 语法失败时静默返回 `None`，由调用方决定报告哪条终结性的诊断。
    /// 首个数字串超过两位或数值大于 59 时按小时处理，
    /// 必须跟随完整的 `hh:mm:ss.mmm` 模式；否则该数字串被视为分钟，
    /// 且必须恰好为两位，小时强制为 0。
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn timestamp(&mut self) -> Option<f64> {
        if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
            return None;
        }
        let run = self.collect_digits();
        // 小时部分不设上限，用 f64 承载以避免整数溢出
        let run_value: f64 = run.parse().ok()?;

        let (hours, minutes) = if run.len() > 2 || run_value > 59.0 {
            // 小时分支：要求 `:mm:ss.mmm` 的后续模式
            if !self.eat(':') {
                return None;
            }
            let minutes = self.exactly_digits(2)?;
            (run_value, minutes)
        } else {
            // 分钟分支：数字串本身必须恰好两位
            if run.len() != 2 {
                return None;
            }
            let minutes: u64 = run.parse().ok()?;
            (0.0, minutes)
        };

        if !self.eat(':') {
            return None;
        }
        let seconds = self.exactly_digits(2)?;
        if !self.eat('.') {
            return None;
        }
        let millis = self.exactly_digits(3)?;

        if minutes > 59 || seconds > 59 {
            return None;
        }

        Some(hours * 3600.0 + (minutes * 60 + seconds) as f64 + millis as f64 / 1000.0)
    }

    /// 解析独立形式的时间戳：一个时间戳，其后不允许出现任何字符。
    ///
    /// 尾随字符会生成诊断，但已解析出的值仍会返回。
    pub(crate) fn parse_timestamp_value(&mut self) -> Option<f64> {
        let value = self.timestamp()?;
        if self.remaining() > 0 {
            self.report("Unexpected characters after the timestamp.");
        }
        Some(value)
    }

    /// 解析完整的计时行并原地修改 `cue`。
    ///
    /// 返回 `false` 表示时间戳或分隔符本身无法解析，整个提示块应当被丢弃。
    /// 结束时间不大于开始时间、开始时间早于前一个提示块这两种情况
    /// 只生成诊断，提示块保留。
    pub(crate) fn parse_cue_timing(&mut self, cue: &mut Cue, previous_start: Option<f64>) -> bool {
        self.skip_spaces();
        let Some(start) = self.timestamp() else {
            self.report("Invalid cue timestamp.");
            return false;
        };
        if self.skip_spaces() == 0 {
            self.report("Expected whitespace before '-->'.");
            return false;
        }
        if !(self.eat('-') && self.eat('-') && self.eat('>')) {
            self.report("Expected '-->' separator.");
            return false;
        }
        if self.skip_spaces() == 0 {
            self.report("Expected whitespace after '-->'.");
            return false;
        }
        let Some(end) = self.timestamp() else {
            self.report("Invalid cue timestamp.");
            return false;
        };

        if end <= start {
            self.report("End timestamp is not greater than start timestamp.");
        }
        if let Some(previous) = previous_start
            && start < previous
        {
            self.report("Start timestamp is not greater than the previous cue's start timestamp.");
        }

        cue.start_time = start;
        cue.end_time = end;

        let rest = self.rest();
        self.parse_settings(&rest, cue);
        true
    }

    /// 解析计时行剩余部分的 `key:value` 设置序列。
    ///
    /// 每个键的校验失败只影响该键（字段保持原值），重复的键后者覆盖前者，
    /// 空值则中止本行剩余的所有设置。
    fn parse_settings(&mut self, rest: &str, cue: &mut Cue) {
        let mut seen: Vec<String> = Vec::new();
        for token in rest.split_whitespace() {
            let Some((key, value)) = token.split_once(':') else {
                self.report(format!("Invalid setting '{token}'."));
                continue;
            };
            if value.is_empty() {
                self.report(format!("Setting '{key}' has no value."));
                break;
            }
            if seen.iter().any(|s| s == key) {
                // 后者覆盖前者，诊断之后照常应用
                self.report(format!("Duplicate setting '{key}'."));
            } else {
                seen.push(key.to_string());
            }

            match key {
                "vertical" => match value {
                    "rl" => cue.direction = CueDirection::Rl,
                    "lr" => cue.direction = CueDirection::Lr,
                    _ => self.report(format!("Invalid value for setting 'vertical': '{value}'.")),
                },
                "line" => self.apply_line_setting(value, cue),
                "position" => self.apply_position_setting(value, cue),
                "size" => self.apply_size_setting(value, cue),
                "align" => match TextAlignment::from_str(value) {
                    Ok(alignment) => cue.alignment = alignment,
                    Err(_) => {
                        self.report(format!("Invalid value for setting 'align': '{value}'."));
                    }
                },
                _ => self.report(format!("Invalid setting '{key}'.")),
            }
        }
    }

    fn apply_line_setting(&mut self, value: &str, cue: &mut Cue) {
        let (number_part, alignment) = match value.split_once(',') {
            Some((number, suffix)) => match LineAlignment::from_str(suffix) {
                Ok(alignment) => (number, Some(alignment)),
                Err(_) => {
                    self.report(format!("Invalid value for setting 'line': '{value}'."));
                    return;
                }
            },
            None => (value, None),
        };
        if !LINE_VALUE_REGEX.is_match(number_part) {
            self.report(format!("Invalid value for setting 'line': '{value}'."));
            return;
        }
        let is_percent = number_part.ends_with('%');
        let Ok(number) = number_part.trim_end_matches('%').parse::<f64>() else {
            self.report(format!("Invalid value for setting 'line': '{value}'."));
            return;
        };
        if is_percent && !(0.0..=100.0).contains(&number) {
            self.report(format!("Invalid value for setting 'line': '{value}'."));
            return;
        }
        cue.snap_to_lines = !is_percent;
        cue.line_position = Some(number);
        if let Some(alignment) = alignment {
            cue.line_align = alignment;
        }
    }

    fn apply_position_setting(&mut self, value: &str, cue: &mut Cue) {
        let (number_part, alignment) = match value.split_once(',') {
            Some((number, suffix)) => {
                let alignment = match suffix {
                    "line-left" => PositionAlignment::LineLeft,
                    "center" => PositionAlignment::Center,
                    "line-right" => PositionAlignment::LineRight,
                    _ => {
                        self.report(format!("Invalid value for setting 'position': '{value}'."));
                        return;
                    }
                };
                (number, Some(alignment))
            }
            None => (value, None),
        };
        let Some(digits) = number_part.strip_suffix('%') else {
            self.report(format!("Invalid value for setting 'position': '{value}'."));
            return;
        };
        let Ok(number) = digits.parse::<f64>() else {
            self.report(format!("Invalid value for setting 'position': '{value}'."));
            return;
        };
        if !(0.0..=100.0).contains(&number) {
            self.report(format!("Invalid value for setting 'position': '{value}'."));
            return;
        }
        cue.text_position = Some(number);
        if let Some(alignment) = alignment {
            cue.position_align = alignment;
        }
    }

    fn apply_size_setting(&mut self, value: &str, cue: &mut Cue) {
        let Some(digits) = value.strip_suffix('%') else {
            self.report(format!("Invalid value for setting 'size': '{value}'."));
            return;
        };
        let Ok(number) = digits.parse::<f64>() else {
            self.report(format!("Invalid value for setting 'size': '{value}'."));
            return;
        };
        if !number.is_finite() || !(0.0..=100.0).contains(&number) {
            self.report(format!("Invalid value for setting 'size': '{value}'."));
            return;
        }
        cue.size = number;
    }
}
