//! Read access to a parsed devicetree.
//!
//! The layout codec only needs four queries, expressed by [`DeviceTree`] and
//! [`DtsNode`]. [`SourceTree`] implements them over a small structural reader
//! that understands nodes, labels, `&label { ... }` blocks, strings and cell
//! arrays. It skips preprocessor lines and does not expand macros.

use indexmap::IndexMap;

use crate::error::{LayoutError, Result};

/// A node as seen by the layout codec.
pub trait DtsNode {
    fn name(&self) -> &str;

    /// First string of the named property.
    fn string(&self, property: &str) -> Option<String>;

    /// Cells of the named property grouped per phandle, e.g.
    /// `"&key_physical_attrs 100 100 0 0 0 0 0"`.
    fn phandle_array(&self, property: &str) -> Option<Vec<String>>;
}

/// A parsed devicetree.
pub trait DeviceTree {
    type Node: DtsNode;

    /// Nodes whose `compatible` list contains `compatible`, in document order.
    fn nodes_with_compatible(&self, compatible: &str) -> Vec<&Self::Node>;

    fn root(&self) -> &Self::Node;
}

/// One item of a property value list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyItem {
    Str(String),
    Cells(Vec<String>),
    Bytes(String),
    Reference(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceNode {
    name: String,
    labels: Vec<String>,
    properties: IndexMap<String, Vec<PropertyItem>>,
    children: Vec<SourceNode>,
}

impl SourceNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn children(&self) -> &[SourceNode] {
        &self.children
    }

    pub fn property(&self, name: &str) -> Option<&[PropertyItem]> {
        self.properties.get(name).map(Vec::as_slice)
    }

    fn strings(&self, property: &str) -> impl Iterator<Item = &str> {
        self.property(property)
            .unwrap_or_default()
            .iter()
            .filter_map(|item| match item {
                PropertyItem::Str(value) => Some(value.as_str()),
                _ => None,
            })
    }

    fn add_child(&mut self, child: SourceNode) {
        match self.children.iter_mut().find(|c| c.name == child.name) {
            Some(existing) => existing.merge(child),
            None => self.children.push(child),
        }
    }

    /// Overlay `other` onto this node: later properties win, children merge by name.
    fn merge(&mut self, other: SourceNode) {
        for label in other.labels {
            if !self.labels.contains(&label) {
                self.labels.push(label);
            }
        }
        self.properties.extend(other.properties);
        for child in other.children {
            self.add_child(child);
        }
    }

    fn find_labelled_mut(&mut self, label: &str) -> Option<&mut SourceNode> {
        if self.labels.iter().any(|l| l == label) {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_labelled_mut(label))
    }

    fn collect_compatible<'a>(&'a self, compatible: &str, out: &mut Vec<&'a SourceNode>) {
        if self.strings("compatible").any(|c| c == compatible) {
            out.push(self);
        }
        for child in &self.children {
            child.collect_compatible(compatible, out);
        }
    }
}

impl DtsNode for SourceNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn string(&self, property: &str) -> Option<String> {
        self.strings(property).next().map(str::to_string)
    }

    fn phandle_array(&self, property: &str) -> Option<Vec<String>> {
        let items = self.property(property)?;
        let mut groups: Vec<Vec<&str>> = Vec::new();
        for item in items {
            let PropertyItem::Cells(cells) = item else {
                continue;
            };
            for cell in cells {
                match groups.last_mut() {
                    Some(group) if !cell.starts_with('&') => group.push(cell.as_str()),
                    _ => groups.push(vec![cell.as_str()]),
                }
            }
        }
        Some(groups.into_iter().map(|group| group.join(" ")).collect())
    }
}

/// Devicetree read from source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTree {
    root: SourceNode,
}

impl SourceTree {
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(&strip_source(source))?;
        Parser::new(tokens).parse_file()
    }

    pub fn root_node(&self) -> &SourceNode {
        &self.root
    }
}

impl DeviceTree for SourceTree {
    type Node = SourceNode;

    fn nodes_with_compatible(&self, compatible: &str) -> Vec<&SourceNode> {
        let mut out = Vec::new();
        self.root.collect_compatible(compatible, &mut out);
        out
    }

    fn root(&self) -> &SourceNode {
        &self.root
    }
}

const DIRECTIVES: &[&str] = &[
    "include", "define", "undef", "if", "ifdef", "ifndef", "elif", "else", "endif", "pragma",
    "error", "warning", "line",
];

fn is_directive_line(line: &str) -> bool {
    let Some(rest) = line.trim_start().strip_prefix('#') else {
        return false;
    };
    let word: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    DIRECTIVES.contains(&word.as_str())
}

/// Blank out comments and preprocessor lines, keeping line numbers intact.
fn strip_source(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match (c, chars.peek().copied()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    let mut cleaned = String::with_capacity(out.len());
    let mut continued = false;
    for line in out.split('\n') {
        let skip = continued || is_directive_line(line);
        continued = skip && line.trim_end().ends_with('\\');
        if !skip {
            cleaned.push_str(line);
        }
        cleaned.push('\n');
    }
    cleaned
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Str(String),
    Cells(Vec<String>),
    Bytes(String),
    Ref(String),
    Directive(String),
    Slash,
    LBrace,
    RBrace,
    Semi,
    Eq,
    Comma,
    Colon,
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    line: usize,
}

fn syntax(line: usize, message: impl Into<String>) -> LayoutError {
    LayoutError::DtsSyntax {
        line,
        message: message.into(),
    }
}

fn is_word_start(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '#' | '.' | '+' | '-' | '?' | '@')
}

fn is_word_char(c: char) -> bool {
    is_word_start(c) || c == ','
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize(source: &str) -> Result<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1;

    while let Some(&c) = chars.peek() {
        let start = line;
        let token = match c {
            '\n' => {
                line += 1;
                chars.next();
                continue;
            }
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '{' | '}' | ';' | '=' | ',' | ':' => {
                chars.next();
                match c {
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    ';' => Token::Semi,
                    '=' => Token::Eq,
                    ',' => Token::Comma,
                    _ => Token::Colon,
                }
            }
            '"' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some('n') => value.push('\n'),
                            Some('t') => value.push('\t'),
                            Some(other) => value.push(other),
                            None => return Err(syntax(start, "unterminated string")),
                        },
                        Some('\n') => {
                            line += 1;
                            value.push('\n');
                        }
                        Some(other) => value.push(other),
                        None => return Err(syntax(start, "unterminated string")),
                    }
                }
                Token::Str(value)
            }
            '<' => {
                chars.next();
                let mut raw = String::new();
                let mut depth = 0usize;
                loop {
                    match chars.next() {
                        Some('>') if depth == 0 => break,
                        Some(ch) => {
                            match ch {
                                '(' => depth += 1,
                                ')' => depth = depth.saturating_sub(1),
                                '\n' => line += 1,
                                _ => {}
                            }
                            raw.push(ch);
                        }
                        None => return Err(syntax(start, "unterminated cell array")),
                    }
                }
                Token::Cells(split_cells(&raw))
            }
            '[' => {
                chars.next();
                let mut raw = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(ch) => {
                            if ch == '\n' {
                                line += 1;
                            }
                            raw.push(ch);
                        }
                        None => return Err(syntax(start, "unterminated byte string")),
                    }
                }
                Token::Bytes(raw.split_whitespace().collect::<Vec<_>>().join(" "))
            }
            '&' => {
                chars.next();
                let mut label = String::new();
                if chars.peek() == Some(&'{') {
                    chars.next();
                    for ch in chars.by_ref() {
                        if ch == '}' {
                            break;
                        }
                        label.push(ch);
                    }
                } else {
                    while let Some(&ch) = chars.peek() {
                        if !is_label_char(ch) {
                            break;
                        }
                        label.push(ch);
                        chars.next();
                    }
                }
                if label.is_empty() {
                    return Err(syntax(start, "empty reference"));
                }
                Token::Ref(label)
            }
            '/' => {
                chars.next();
                if chars.peek().is_some_and(|ch| ch.is_ascii_alphabetic()) {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('/') => break,
                            Some(ch) if ch.is_ascii_alphanumeric() || ch == '-' => name.push(ch),
                            _ => return Err(syntax(start, "malformed `/directive/`")),
                        }
                    }
                    Token::Directive(name)
                } else {
                    Token::Slash
                }
            }
            c if is_word_start(c) => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if !is_word_char(ch) {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                Token::Word(word)
            }
            other => return Err(syntax(start, format!("unexpected character `{other}`"))),
        };
        tokens.push(Spanned { token, line: start });
    }
    Ok(tokens)
}

/// Split the inside of `<...>` on whitespace, keeping parenthesized
/// expressions together with their inner whitespace removed.
fn split_cells(raw: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for ch in raw.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ch if ch.is_whitespace() => {
                if depth == 0 && !current.is_empty() {
                    cells.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        cells.push(current);
    }
    cells
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|s| &s.token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| s.line)
            .unwrap_or(1)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<()> {
        let line = self.line();
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(syntax(line, format!("expected {what}, found {token:?}"))),
            None => Err(syntax(line, format!("expected {what}, found end of input"))),
        }
    }

    /// Consume `label:` if it comes next.
    fn take_label(&mut self) -> Option<String> {
        let label = match (self.peek(), self.peek_at(1)) {
            (Some(Token::Word(label)), Some(Token::Colon)) => label.clone(),
            _ => return None,
        };
        self.pos += 2;
        Some(label)
    }

    fn skip_statement(&mut self) -> Result<()> {
        let line = self.line();
        while let Some(token) = self.next() {
            if token == Token::Semi {
                return Ok(());
            }
        }
        Err(syntax(line, "unterminated statement"))
    }

    fn parse_file(mut self) -> Result<SourceTree> {
        let mut root = SourceNode::new("/");
        let mut patches = Vec::new();

        while let Some(token) = self.peek().cloned() {
            match token {
                Token::Directive(_) => self.skip_statement()?,
                Token::Slash => {
                    self.next();
                    let body = self.parse_node_body("/")?;
                    root.merge(body);
                }
                Token::Ref(label) => {
                    self.next();
                    let body = self.parse_node_body(&label)?;
                    patches.push((label, body));
                }
                Token::Word(_) if self.take_label().is_some() => {}
                other => {
                    return Err(syntax(
                        self.line(),
                        format!("unexpected {other:?} at top level"),
                    ));
                }
            }
        }

        for (label, patch) in patches {
            if let Some(target) = root.find_labelled_mut(&label) {
                target.merge(patch);
            }
        }
        Ok(SourceTree { root })
    }

    /// Parse `{ ... };` into a node named `name`.
    fn parse_node_body(&mut self, name: &str) -> Result<SourceNode> {
        self.expect(Token::LBrace, "`{`")?;
        let mut node = SourceNode::new(name);

        loop {
            let mut labels = Vec::new();
            while let Some(label) = self.take_label() {
                labels.push(label);
            }

            let line = self.line();
            match self.next() {
                Some(Token::RBrace) if labels.is_empty() => break,
                Some(Token::Directive(_)) if labels.is_empty() => self.skip_statement()?,
                Some(Token::Word(word)) => match self.peek().cloned() {
                    Some(Token::LBrace) => {
                        let mut child = self.parse_node_body(&word)?;
                        child.labels = labels;
                        node.add_child(child);
                    }
                    Some(Token::Eq) => {
                        self.next();
                        let values = self.parse_values()?;
                        node.properties.insert(word, values);
                    }
                    Some(Token::Semi) => {
                        self.next();
                        node.properties.insert(word, Vec::new());
                    }
                    _ => return Err(syntax(line, format!("expected `{{`, `=` or `;` after `{word}`"))),
                },
                Some(token) => return Err(syntax(line, format!("unexpected {token:?} in node `{name}`"))),
                None => return Err(syntax(line, format!("node `{name}` is not closed"))),
            }
        }

        self.expect(Token::Semi, "`;` after node")?;
        Ok(node)
    }

    fn parse_values(&mut self) -> Result<Vec<PropertyItem>> {
        let mut values = Vec::new();
        loop {
            let line = self.line();
            let item = match self.next() {
                Some(Token::Str(value)) => PropertyItem::Str(value),
                Some(Token::Cells(cells)) => PropertyItem::Cells(cells),
                Some(Token::Bytes(bytes)) => PropertyItem::Bytes(bytes),
                Some(Token::Ref(label)) => PropertyItem::Reference(label),
                Some(token) => return Err(syntax(line, format!("unexpected {token:?} in property value"))),
                None => return Err(syntax(line, "unterminated property")),
            };
            values.push(item);

            let line = self.line();
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::Semi) => return Ok(values),
                _ => return Err(syntax(line, "expected `,` or `;` after property value")),
            }
        }
    }
}
