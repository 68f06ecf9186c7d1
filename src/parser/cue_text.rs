//! # 提示文本分词器与标记树构建器
//!
//! 对单个提示块的载荷文本运行字符级状态机，产出文本、标签和
//! 时间戳词元，随后按嵌套规则把它们装配成标记树。
//!
//! 构建期间使用一个显式的"未闭合元素"栈，栈顶即当前节点；
//! 子节点的所有权只在元素闭合（出栈）时向前转移，
//! 因此返回的树里不会出现任何指向父节点的引用。

use std::str::FromStr;

use super::timing::TimingLineScanner;
use crate::types::{Diagnostic, ElementNode, EntityTable, MarkupNode, ParseMode, TagName};

/// 分词器的内部状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenizerState {
    Data,
    Escape,
    Tag,
    StartTag,
    StartTagClass,
    StartTagAnnotation,
    EndTag,
    TimestampTag,
}

/// 分词器产出的词元。
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Text(String),
    StartTag {
        name: String,
        classes: Vec<String>,
        annotation: String,
    },
    EndTag(String),
    TimestampTag(String),
}

struct CueTextTokenizer<'a> {
    input: &'a str,
    /// 当前的字节位置。
    pos: usize,
    /// 当前的 1 起始行号（随载荷中的换行递增）。
    line: usize,
    /// 当前的 1 起始列号（按字符计）。
    column: usize,
    entities: &'a EntityTable,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> CueTextTokenizer<'a> {
    fn new(input: &'a str, entities: &'a EntityTable, base_line: usize) -> Self {
        Self {
            input,
            pos: 0,
            line: base_line,
            column: 1,
            entities,
            diagnostics: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn report(&mut self, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::with_column(message, self.line, self.column));
    }

    /// 取出下一个词元；输入耗尽且无内容可产出时返回 `None`。
    #[allow(clippy::too_many_lines)]
    fn next_token(&mut self) -> Option<Token> {
        let input: &'a str = self.input;
        let mut state = TokenizerState::Data;
        let mut result = String::new();
        let mut buffer = String::new();
        let mut name = String::new();
        let mut classes: Vec<String> = Vec::new();
        let mut class_buffer = String::new();
        let mut annotation = String::new();

        loop {
            let c = self.peek();
            match state {
                TokenizerState::Data => match c {
                    Some('&') => {
                        if let Some((key, replacement)) =
                            self.entities.longest_match(&input[self.pos..])
                        {
                            // 最长匹配命中：直接替换并越过整个引用
                            self.pos += key.len();
                            self.column += key.chars().count();
                            result.push_str(replacement);
                        } else {
                            buffer.push('&');
                            self.advance();
                            state = TokenizerState::Escape;
                        }
                    }
                    Some('<') => {
                        if result.is_empty() {
                            self.advance();
                            state = TokenizerState::Tag;
                        } else {
                            // '<' 留给下一次调用处理
                            return Some(Token::Text(result));
                        }
                    }
                    Some(ch) => {
                        result.push(ch);
                        self.advance();
                    }
                    None => {
                        if result.is_empty() {
                            return None;
                        }
                        return Some(Token::Text(result));
                    }
                },
                TokenizerState::Escape => match c {
                    Some(';') => {
                        self.advance();
                        buffer.push(';');
                        if let Some(decoded) = decode_numeric_entity(&buffer) {
                            result.push(decoded);
                        } else {
                            self.report(format!("Invalid entity reference '{buffer}'."));
                            result.push_str(&buffer);
                        }
                        buffer.clear();
                        state = TokenizerState::Data;
                    }
                    Some(ch) if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '#' => {
                        self.advance();
                        buffer.push(ch);
                    }
                    _ => {
                        // '<'、输入结束或不允许的字符都会打断缓冲：
                        // 报告后按字面内容冲刷（`&#DDD` 形状的缓冲仍尝试解码），
                        // 当前字符交还给 data 状态。
                        self.report(format!("Unterminated entity reference '{buffer}'."));
                        flush_escape(&mut result, &buffer);
                        buffer.clear();
                        state = TokenizerState::Data;
                    }
                },
                TokenizerState::Tag => match c {
                    Some(' ' | '\t' | '\n' | '\u{c}') => {
                        self.advance();
                        state = TokenizerState::StartTagAnnotation;
                    }
                    Some('.') => {
                        self.advance();
                        state = TokenizerState::StartTagClass;
                    }
                    Some('/') => {
                        self.advance();
                        state = TokenizerState::EndTag;
                    }
                    Some(ch) if ch.is_ascii_digit() => {
                        self.advance();
                        buffer.push(ch);
                        state = TokenizerState::TimestampTag;
                    }
                    Some('>') | None => {
                        if c.is_some() {
                            self.advance();
                        }
                        return Some(Token::StartTag {
                            name,
                            classes,
                            annotation,
                        });
                    }
                    Some(ch) => {
                        self.advance();
                        name.push(ch);
                        state = TokenizerState::StartTag;
                    }
                },
                TokenizerState::StartTag => match c {
                    Some(' ' | '\t' | '\n' | '\u{c}') => {
                        self.advance();
                        state = TokenizerState::StartTagAnnotation;
                    }
                    Some('.') => {
                        self.advance();
                        state = TokenizerState::StartTagClass;
                    }
                    Some('>') | None => {
                        if c.is_some() {
                            self.advance();
                        }
                        return Some(Token::StartTag {
                            name,
                            classes,
                            annotation,
                        });
                    }
                    Some(ch) => {
                        self.advance();
                        name.push(ch);
                    }
                },
                TokenizerState::StartTagClass => match c {
                    Some(' ' | '\t' | '\n' | '\u{c}') => {
                        classes.push(std::mem::take(&mut class_buffer));
                        self.advance();
                        state = TokenizerState::StartTagAnnotation;
                    }
                    Some('.') => {
                        classes.push(std::mem::take(&mut class_buffer));
                        self.advance();
                    }
                    Some('>') | None => {
                        classes.push(std::mem::take(&mut class_buffer));
                        if c.is_some() {
                            self.advance();
                        }
                        return Some(Token::StartTag {
                            name,
                            classes,
                            annotation,
                        });
                    }
                    Some(ch) => {
                        self.advance();
                        class_buffer.push(ch);
                    }
                },
                TokenizerState::StartTagAnnotation => match c {
                    Some('>') | None => {
                        if c.is_some() {
                            self.advance();
                        }
                        return Some(Token::StartTag {
                            name,
                            classes,
                            annotation,
                        });
                    }
                    Some(ch) => {
                        self.advance();
                        annotation.push(ch);
                    }
                },
                TokenizerState::EndTag => match c {
                    Some('>') | None => {
                        if c.is_some() {
                            self.advance();
                        }
                        return Some(Token::EndTag(name));
                    }
                    Some(ch) => {
                        self.advance();
                        name.push(ch);
                    }
                },
                TokenizerState::TimestampTag => match c {
                    Some('>') | None => {
                        if c.is_some() {
                            self.advance();
                        }
                        return Some(Token::TimestampTag(buffer));
                    }
                    Some(ch) => {
                        self.advance();
                        buffer.push(ch);
                    }
                },
            }
        }
    }
}

/// 解析 `&#DDD;` / `&#xHH;` 形式的数字实体引用。
fn decode_numeric_entity(buffer: &str) -> Option<char> {
    let body = buffer.strip_prefix("&#")?.strip_suffix(';')?;
    let (radix, digits) = body.strip_prefix('x').map_or((10, body), |hex| (16, hex));
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, radix).ok().and_then(char::from_u32)
}

/// 把被打断的实体缓冲按字面内容写回结果。
/// `&#DDD`（无分号的十进制）形状的缓冲仍然尝试解码。
fn flush_escape(result: &mut String, buffer: &str) {
    if let Some(digits) = buffer.strip_prefix("&#")
        && !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && let Some(decoded) = digits.parse::<u32>().ok().and_then(char::from_u32)
    {
        result.push(decoded);
        return;
    }
    result.push_str(buffer);
}

/// 去掉注释文本两端的空白并把内部空白折叠为单个空格。
fn normalize_annotation(annotation: &str) -> String {
    annotation.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn attach(root: &mut Vec<MarkupNode>, stack: &mut [ElementNode], node: MarkupNode) {
    match stack.last_mut() {
        Some(top) => top.children.push(node),
        None => root.push(node),
    }
}

/// 闭合栈顶元素，把它作为子节点交还给上一层。
fn close_one(root: &mut Vec<MarkupNode>, stack: &mut Vec<ElementNode>) {
    if let Some(element) = stack.pop() {
        attach(root, stack, MarkupNode::Element(element));
    }
}

fn open_element(
    stack: &mut Vec<ElementNode>,
    name: TagName,
    classes: Vec<String>,
    value: Option<String>,
) {
    stack.push(ElementNode {
        name,
        classes,
        value,
        children: Vec::new(),
    });
}

/// 解析一个提示块的载荷文本并构建标记树。
///
/// 所有嵌套和注释违规都是建议性的：报告诊断但尽可能保留结构。
/// `Metadata` 模式丢弃本组件产生的全部诊断，`Chapters` 模式额外
/// 对每个起始标签和时间戳标签生成诊断。`base_line` 是载荷第一行
/// 在整个输入中的 1 起始行号，用于诊断定位。
pub(crate) fn parse_cue_text(
    text: &str,
    mode: ParseMode,
    entities: &EntityTable,
    cue_start: f64,
    cue_end: f64,
    base_line: usize,
    sink: &mut Vec<Diagnostic>,
) -> Vec<MarkupNode> {
    let mut tokenizer = CueTextTokenizer::new(text, entities, base_line);
    let mut root: Vec<MarkupNode> = Vec::new();
    let mut stack: Vec<ElementNode> = Vec::new();
    let mut previous_timestamp = cue_start;

    while let Some(token) = tokenizer.next_token() {
        match token {
            Token::Text(text) => attach(&mut root, &mut stack, MarkupNode::Text(text)),
            Token::StartTag {
                name,
                classes,
                annotation,
            } => {
                if mode == ParseMode::Chapters {
                    tokenizer.report("Start tags are not allowed in chapter cues.");
                }
                let annotation = normalize_annotation(&annotation);
                match TagName::from_str(&name) {
                    Err(_) => tokenizer.report("Incorrect start tag."),
                    Ok(tag) => {
                        if !annotation.is_empty() && !matches!(tag, TagName::V | TagName::Lang) {
                            tokenizer
                                .report("Only the voice and language tags can have an annotation.");
                        }
                        match tag {
                            TagName::C | TagName::I | TagName::B | TagName::U | TagName::Ruby => {
                                open_element(&mut stack, tag, classes, None);
                            }
                            TagName::Rt => {
                                // rt 只能直接出现在 ruby 内，否则不附加
                                if stack.last().is_some_and(|e| e.name == TagName::Ruby) {
                                    open_element(&mut stack, TagName::Rt, classes, None);
                                } else {
                                    tokenizer.report("Incorrect start tag.");
                                }
                            }
                            TagName::V => {
                                if stack.iter().any(|e| e.name == TagName::V) {
                                    tokenizer.report(
                                        "A voice tag cannot be nested inside another voice tag.",
                                    );
                                }
                                if annotation.is_empty() {
                                    tokenizer.report("A voice tag requires an annotation.");
                                }
                                // 两种诊断都不阻止附加
                                open_element(&mut stack, TagName::V, classes, Some(annotation));
                            }
                            TagName::Lang => {
                                open_element(&mut stack, TagName::Lang, classes, Some(annotation));
                            }
                        }
                    }
                }
            }
            Token::EndTag(name) => {
                let tag = TagName::from_str(&name).ok();
                let current = stack.last().map(|e| e.name);
                match (tag, current) {
                    (Some(tag), Some(top)) if tag == top => close_one(&mut root, &mut stack),
                    (Some(TagName::Ruby), Some(TagName::Rt)) => {
                        // </ruby> 隐式闭合仍然打开的 <rt>
                        close_one(&mut root, &mut stack);
                        close_one(&mut root, &mut stack);
                    }
                    _ => tokenizer.report("Incorrect end tag."),
                }
            }
            Token::TimestampTag(raw) => {
                if mode == ParseMode::Chapters {
                    tokenizer.report("Timestamp tags are not allowed in chapter cues.");
                }
                let value = TimingLineScanner::new(&raw, tokenizer.line, &mut tokenizer.diagnostics)
                    .parse_timestamp_value();
                // 解析失败的时间戳标签静默消失，不产生诊断也不产生节点
                if let Some(value) = value {
                    if value <= cue_start || value >= cue_end {
                        tokenizer.report(
                            "Timestamp must be between the start and end timestamps of the cue.",
                        );
                    }
                    if value <= previous_timestamp {
                        tokenizer.report("Timestamp must be greater than the previous timestamp.");
                    }
                    // 只要解析出数值，节点就会被插入
                    attach(&mut root, &mut stack, MarkupNode::Timestamp(value));
                    previous_timestamp = value;
                }
            }
        }
    }

    // 输入耗尽：为仍然打开的非 v 元素补齐诊断，并把它们全部折叠回树中
    while let Some(element) = stack.pop() {
        if element.name != TagName::V {
            tokenizer.report("Required end tag missing.");
        }
        attach(&mut root, &mut stack, MarkupNode::Element(element));
    }

    if mode != ParseMode::Metadata {
        sink.append(&mut tokenizer.diagnostics);
    }
    root
}
