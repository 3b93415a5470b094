//! The reference engine's evaluator.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Implements the slice of the style-sheet language the bridge contract
//! needs to be exercisable: `@import` with importer-hook dispatch and
//! default file resolution, top-level variable declarations and
//! substitution, registered-function calls in declaration values, and the
//! four output styles. It is a collaborator stand-in, not a compiler.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sassling_engine::{
    EngineOptions, FunctionEntry, ImporterEntry, ImporterResult, OutputStyle, Value, view_str,
};

/// Maximum import nesting before the evaluator gives up.
const MAX_IMPORT_DEPTH: usize = 64;

/// A structured evaluation failure, mapped to the engine error surface.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub message: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl EvalError {
    fn new(message: impl Into<String>, file: &str, line: u32, column: u32) -> Self {
        EvalError {
            message: message.into(),
            file: file.to_string(),
            line,
            column,
        }
    }
}

#[derive(Debug)]
struct Rule {
    selector: String,
    declarations: Vec<(String, String)>,
    line: u32,
    file: String,
}

pub struct Evaluator {
    style: OutputStyle,
    precision: usize,
    indent: String,
    linefeed: String,
    source_comments: bool,
    include_paths: Vec<PathBuf>,
    importers: Vec<ImporterEntry>,
    functions: Vec<FunctionEntry>,
    vars: HashMap<String, String>,
    rules: Vec<Rule>,
    included: Vec<String>,
    origin_stack: Vec<String>,
}

impl Evaluator {
    /// Build an evaluator from a bound option block.
    ///
    /// # Safety
    ///
    /// Every string pointer in `opts` must be null or point at a live
    /// NUL-terminated buffer (the job layer's buffer bag guarantees this
    /// while the context is alive).
    pub unsafe fn new(opts: &EngineOptions) -> Self {
        let indent = unsafe { view_str(opts.indent) }.unwrap_or("  ").to_string();
        let linefeed = unsafe { view_str(opts.linefeed) }.unwrap_or("\n").to_string();
        let include_paths = unsafe { view_str(opts.include_path) }
            .map(split_path_list)
            .unwrap_or_default();

        Evaluator {
            style: opts.output_style,
            precision: opts.precision.max(0) as usize,
            indent,
            linefeed,
            source_comments: opts.source_comments,
            include_paths,
            importers: opts.importers_by_priority(),
            functions: opts.functions.clone(),
            vars: HashMap::new(),
            rules: Vec::new(),
            included: Vec::new(),
            origin_stack: Vec::new(),
        }
    }

    /// Evaluate the root source. `origin` is the display path of the entry
    /// point ("stdin" for data contexts).
    pub fn run_root(&mut self, source: &str, origin: &str) -> Result<(), EvalError> {
        self.run(source, origin.to_string())
    }

    /// Files touched during evaluation, in resolution order.
    pub fn take_included(&mut self) -> Vec<String> {
        std::mem::take(&mut self.included)
    }

    fn run(&mut self, source: &str, origin: String) -> Result<(), EvalError> {
        if self.origin_stack.len() >= MAX_IMPORT_DEPTH {
            let line = 1;
            return Err(EvalError::new("import nesting too deep", &origin, line, 1));
        }
        self.origin_stack.push(origin.clone());
        let result = self.run_inner(source, &origin);
        self.origin_stack.pop();
        result
    }

    fn run_inner(&mut self, source: &str, origin: &str) -> Result<(), EvalError> {
        let mut s = Scanner::new(source);
        loop {
            s.skip_trivia();
            let Some(c) = s.peek() else { break };
            if c == '@' {
                self.parse_at_rule(&mut s, origin)?;
            } else if c == '$' {
                self.parse_variable(&mut s, origin)?;
            } else {
                self.parse_rule(&mut s, origin)?;
            }
        }
        Ok(())
    }

    fn parse_at_rule(&mut self, s: &mut Scanner<'_>, origin: &str) -> Result<(), EvalError> {
        let line = s.line;
        let column = s.col;
        s.bump(); // '@'
        let word = s.take_while(is_ident_char);
        if word != "import" && word != "use" {
            return Err(EvalError::new(
                format!("unsupported at-rule: @{}", word),
                origin,
                line,
                column,
            ));
        }
        s.skip_trivia();
        let quote = match s.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => {
                return Err(EvalError::new(
                    "expected quoted import url",
                    origin,
                    s.line,
                    s.col,
                ));
            }
        };
        s.bump();
        let url = s.take_while(|c| c != quote).to_string();
        if s.bump().is_none() {
            return Err(EvalError::new("unterminated import url", origin, s.line, s.col));
        }
        s.skip_trivia();
        if !s.eat(';') {
            return Err(EvalError::new("expected \";\"", origin, s.line, s.col));
        }
        self.import(&url, origin, line, column)
    }

    fn parse_variable(&mut self, s: &mut Scanner<'_>, origin: &str) -> Result<(), EvalError> {
        let line = s.line;
        s.bump(); // '$'
        let name = s.take_while(is_ident_char).to_string();
        s.skip_trivia();
        if !s.eat(':') {
            return Err(EvalError::new("expected \":\"", origin, s.line, s.col));
        }
        let raw = s.take_while(|c| c != ';' && c != '}').trim().to_string();
        if !s.eat(';') {
            return Err(EvalError::new("expected \";\"", origin, s.line, s.col));
        }
        let value = self.eval_value(&raw, origin, line)?;
        self.vars.insert(name, value);
        Ok(())
    }

    fn parse_rule(&mut self, s: &mut Scanner<'_>, origin: &str) -> Result<(), EvalError> {
        let line = s.line;
        let selector = s.take_while(|c| c != '{' && c != ';').trim().to_string();
        if !s.eat('{') {
            return Err(EvalError::new("expected \"{\"", origin, s.line, s.col));
        }
        let mut declarations = Vec::new();
        loop {
            s.skip_trivia();
            match s.peek() {
                Some('}') => {
                    s.bump();
                    break;
                }
                None => {
                    return Err(EvalError::new(
                        "Invalid CSS: expected \"}\"",
                        origin,
                        s.line,
                        s.col,
                    ));
                }
                Some(';') => {
                    s.bump();
                }
                Some(_) => {
                    let decl_line = s.line;
                    let property = s
                        .take_while(|c| c != ':' && c != '{' && c != '}' && c != ';')
                        .trim()
                        .to_string();
                    if !s.eat(':') {
                        return Err(EvalError::new("expected \":\"", origin, s.line, s.col));
                    }
                    let raw = s.take_while(|c| c != ';' && c != '}').trim().to_string();
                    s.eat(';');
                    let value = self.eval_value(&raw, origin, decl_line)?;
                    declarations.push((property, value));
                }
            }
        }
        self.rules.push(Rule {
            selector,
            declarations,
            line,
            file: origin.to_string(),
        });
        Ok(())
    }

    // -- imports --------------------------------------------------------

    fn import(&mut self, url: &str, origin: &str, line: u32, column: u32) -> Result<(), EvalError> {
        let previous = origin.to_string();
        // Importers run highest priority first; the first one returning
        // something other than NotHandled settles the import.
        for entry in self.importers.clone() {
            match (entry.hook)(url, &previous, entry.cookie) {
                ImporterResult::NotHandled => continue,
                ImporterResult::Error(message) => {
                    return Err(EvalError::new(message, origin, line, column));
                }
                ImporterResult::Imports(records) => {
                    for record in records {
                        match record.contents {
                            Some(body) => {
                                self.included.push(record.path.clone());
                                self.run(&body, record.path)?;
                            }
                            None => self.import_file(&record.path, origin, line, column)?,
                        }
                    }
                    return Ok(());
                }
            }
        }
        self.import_file(url, origin, line, column)
    }

    fn import_file(
        &mut self,
        url: &str,
        origin: &str,
        line: u32,
        column: u32,
    ) -> Result<(), EvalError> {
        let Some(path) = self.resolve(url, origin) else {
            return Err(EvalError::new(
                format!("File to import not found or unreadable: {}", url),
                origin,
                line,
                column,
            ));
        };
        let body = std::fs::read_to_string(&path).map_err(|_| {
            EvalError::new(
                format!("File to import not found or unreadable: {}", url),
                origin,
                line,
                column,
            )
        })?;
        let display = path.to_string_lossy().into_owned();
        self.included.push(display.clone());
        self.run(&body, display)
    }

    fn resolve(&self, url: &str, origin: &str) -> Option<PathBuf> {
        let mut bases = Vec::new();
        if let Some(parent) = Path::new(origin).parent() {
            if !parent.as_os_str().is_empty() {
                bases.push(parent.to_path_buf());
            }
        }
        bases.push(PathBuf::from("."));
        bases.extend(self.include_paths.iter().cloned());

        let url_path = Path::new(url);
        let stem = url_path.file_name()?.to_string_lossy().into_owned();
        let dir = url_path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut names = Vec::new();
        if stem.ends_with(".scss") || stem.ends_with(".css") {
            names.push(stem.clone());
            names.push(format!("_{}", stem));
        } else {
            names.push(stem.clone());
            names.push(format!("{}.scss", stem));
            names.push(format!("_{}.scss", stem));
        }

        for base in &bases {
            for name in &names {
                let candidate = base.join(&dir).join(name);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        None
    }

    // -- value evaluation -----------------------------------------------

    fn eval_value(&mut self, raw: &str, origin: &str, line: u32) -> Result<String, EvalError> {
        let substituted = self.substitute_vars(raw, origin, line)?;
        self.apply_functions(&substituted, origin, line)
    }

    fn substitute_vars(&self, raw: &str, origin: &str, line: u32) -> Result<String, EvalError> {
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(idx) = rest.find('$') {
            out.push_str(&rest[..idx]);
            rest = &rest[idx + 1..];
            let end = rest
                .char_indices()
                .find(|(_, c)| !is_ident_char(*c))
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            let name = &rest[..end];
            match self.vars.get(name) {
                Some(value) => out.push_str(value),
                None => {
                    return Err(EvalError::new(
                        format!("Undefined variable: \"${}\"", name),
                        origin,
                        line,
                        1,
                    ));
                }
            }
            rest = &rest[end..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn apply_functions(&self, value: &str, origin: &str, line: u32) -> Result<String, EvalError> {
        let mut out = String::with_capacity(value.len());
        let mut rest = value;
        while !rest.is_empty() {
            let Some((at, entry)) = self.find_call(rest) else {
                out.push_str(rest);
                break;
            };
            out.push_str(&rest[..at]);
            let open = at + entry.name().len();
            let Some(close) = find_matching_paren(rest, open) else {
                return Err(EvalError::new("expected \")\"", origin, line, 1));
            };
            let args: Vec<Value> = split_top_level(&rest[open + 1..close])
                .iter()
                .map(|arg| parse_scalar(arg))
                .collect();
            let result = (entry.hook)(&args, entry.cookie);
            if let Value::Error(message) = result {
                return Err(EvalError::new(message, origin, line, 1));
            }
            out.push_str(&result.to_css(self.precision));
            rest = &rest[close + 1..];
        }
        Ok(out)
    }

    /// Earliest registered-function call site in `value`, if any.
    fn find_call<'e>(&'e self, value: &str) -> Option<(usize, &'e FunctionEntry)> {
        let mut best: Option<(usize, &FunctionEntry)> = None;
        for entry in &self.functions {
            let name = entry.name();
            if name.is_empty() {
                continue;
            }
            let mut from = 0;
            while let Some(idx) = value[from..].find(name) {
                let at = from + idx;
                let after = at + name.len();
                let preceded_ok = at == 0
                    || !value[..at]
                        .chars()
                        .next_back()
                        .map(is_ident_char)
                        .unwrap_or(false);
                if preceded_ok && value[after..].starts_with('(') {
                    if best.map(|(b, _)| at < b).unwrap_or(true) {
                        best = Some((at, entry));
                    }
                    break;
                }
                from = after;
            }
        }
        best
    }

    // -- output ---------------------------------------------------------

    pub fn render(&self) -> String {
        let lf = &self.linefeed;
        let mut out = String::new();
        for rule in &self.rules {
            if rule.declarations.is_empty() {
                continue;
            }
            if self.source_comments && self.style != OutputStyle::Compressed {
                out.push_str(&format!("/* line {}, {} */{}", rule.line, rule.file, lf));
            }
            match self.style {
                OutputStyle::Nested | OutputStyle::Expanded => {
                    out.push_str(&rule.selector);
                    out.push_str(" {");
                    out.push_str(lf);
                    for (prop, value) in &rule.declarations {
                        out.push_str(&self.indent);
                        out.push_str(prop);
                        out.push_str(": ");
                        out.push_str(value);
                        out.push(';');
                        out.push_str(lf);
                    }
                    out.push('}');
                    out.push_str(lf);
                }
                OutputStyle::Compact => {
                    out.push_str(&rule.selector);
                    out.push_str(" { ");
                    for (prop, value) in &rule.declarations {
                        out.push_str(prop);
                        out.push_str(": ");
                        out.push_str(value);
                        out.push_str("; ");
                    }
                    out.push('}');
                    out.push_str(lf);
                }
                OutputStyle::Compressed => {
                    out.push_str(&rule.selector);
                    out.push('{');
                    let rendered: Vec<String> = rule
                        .declarations
                        .iter()
                        .map(|(p, v)| format!("{}:{}", p, v))
                        .collect();
                    out.push_str(&rendered.join(";"));
                    out.push('}');
                }
            }
        }
        out
    }
}

// -- lexing helpers -----------------------------------------------------

struct Scanner<'s> {
    src: &'s str,
    pos: usize,
    line: u32,
    col: u32,
}

impl<'s> Scanner<'s> {
    fn new(src: &'s str) -> Self {
        Scanner {
            src,
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek2(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'s str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek2() == Some('/') => {
                    self.take_while(|c| c != '\n');
                }
                Some('/') if self.peek2() == Some('*') => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            Some('*') if self.peek2() == Some('/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                            None => break,
                        }
                    }
                }
                _ => break,
            }
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn split_path_list(joined: &str) -> Vec<PathBuf> {
    let sep = if cfg!(windows) { ';' } else { ':' };
    joined
        .split(sep)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Index of the `)` matching the `(` at `open`, quote- and nesting-aware.
fn find_matching_paren(s: &str, open: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    debug_assert_eq!(bytes[open], b'(');
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
    }
    None
}

/// Split an argument list on top-level commas.
fn split_top_level(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for c in s.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => {
                    quote = Some(c);
                    current.push(c);
                }
                '(' => {
                    depth += 1;
                    current.push(c);
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    current.push(c);
                }
                ',' if depth == 0 => {
                    parts.push(current.trim().to_string());
                    current = String::new();
                }
                _ => current.push(c),
            },
        }
    }
    let last = current.trim().to_string();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    parts.retain(|p| !p.is_empty());
    parts
}

/// Parse one textual argument into the flat exchange format.
fn parse_scalar(arg: &str) -> Value {
    let arg = arg.trim();
    if arg == "true" {
        return Value::Boolean(true);
    }
    if arg == "false" {
        return Value::Boolean(false);
    }
    if arg == "null" {
        return Value::Null;
    }
    if arg.len() >= 2 {
        let first = arg.chars().next().unwrap_or('\0');
        if (first == '"' || first == '\'') && arg.ends_with(first) {
            return Value::String {
                text: arg[1..arg.len() - 1].to_string(),
                quoted: true,
            };
        }
    }
    // number with optional unit suffix
    let unit_start = arg
        .char_indices()
        .find(|(i, c)| {
            !(c.is_ascii_digit() || *c == '.' || ((*c == '+' || *c == '-') && *i == 0))
        })
        .map(|(i, _)| i)
        .unwrap_or(arg.len());
    if unit_start > 0 {
        if let Ok(value) = arg[..unit_start].parse::<f64>() {
            let unit = &arg[unit_start..];
            if unit.is_empty() || unit == "%" || unit.chars().all(|c| c.is_ascii_alphabetic()) {
                return Value::Number {
                    value,
                    unit: unit.to_string(),
                };
            }
        }
    }
    Value::string(arg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalar_shapes() {
        assert_eq!(parse_scalar("21"), Value::number(21.0));
        assert_eq!(parse_scalar("1.5px"), Value::number_with_unit(1.5, "px"));
        assert_eq!(parse_scalar("50%"), Value::number_with_unit(50.0, "%"));
        assert_eq!(parse_scalar("true"), Value::Boolean(true));
        assert_eq!(
            parse_scalar("\"quoted\""),
            Value::String {
                text: "quoted".to_string(),
                quoted: true
            }
        );
        assert_eq!(parse_scalar("red"), Value::string("red"));
    }

    #[test]
    fn test_split_top_level_respects_nesting() {
        assert_eq!(split_top_level("1, 2"), vec!["1", "2"]);
        assert_eq!(split_top_level("f(1, 2), 3"), vec!["f(1, 2)", "3"]);
        assert_eq!(split_top_level("\"a,b\", c"), vec!["\"a,b\"", "c"]);
        assert!(split_top_level("  ").is_empty());
    }

    #[test]
    fn test_find_matching_paren() {
        let s = "double(nest(1), 2) rest";
        assert_eq!(find_matching_paren(s, 6), Some(17));
        assert_eq!(find_matching_paren("f(", 1), None);
    }
}
