//! Native JSX translation.
//!
//! Translates JSX/TSX syntax into `__jsx(tag, props, …children)` calls and
//! prepends a framework preamble binding `__jsx`/`__Fragment` to the
//! framework's factory functions. Output line count equals input line
//! count: every newline — including those inside tag heads and closing-tag
//! regions — is echoed into the emitted call, which JavaScript tolerates
//! inside argument lists.
//!
//! Malformed JSX (missing closing tag or `>`) produces a best-effort
//! emission plus a closing parenthesis; the browser surfaces the error.

use super::typescript::strip_types;

/// Compile a `.jsx`/`.tsx` source natively.
pub fn compile_jsx_native(source: &str, framework: &str, is_tsx: bool) -> Vec<u8> {
    let erased;
    let src = if is_tsx {
        erased = strip_types(source);
        &erased
    } else {
        source
    };

    let translated = translate_jsx(src);

    // Single-line preamble keeps line numbering intact; its bare import is
    // rewritten by the import rewriter downstream.
    let preamble = match framework {
        "preact" => "import { h as __jsx, Fragment as __Fragment } from 'preact';",
        _ => "import { createElement as __jsx, Fragment as __Fragment } from 'react';",
    };
    format!("{preamble}{translated}").into_bytes()
}

/// Translate JSX syntax to `__jsx` calls. Input free of JSX comes back
/// byte-identical.
pub fn translate_jsx(source: &str) -> String {
    let mut tr = Translator {
        src: source,
        bytes: source.as_bytes(),
        pos: 0,
    };
    let mut out = String::with_capacity(source.len() + 128);
    tr.scan_code(&mut out, false);
    out
}

struct Translator<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Translator<'a> {
    // =========================================================================
    // Code scanning
    // =========================================================================

    /// Copy code into `out`, translating any JSX encountered. When
    /// `stop_at_rbrace` is set, returns (without consuming) at the first
    /// unbalanced `}` — used to capture `{expression}` regions.
    fn scan_code(&mut self, out: &mut String, stop_at_rbrace: bool) {
        let mut brace_depth = 0i32;

        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            match b {
                b'"' | b'\'' => self.copy_quoted(out),
                b'`' => self.copy_template(out),
                b'/' if self.peek(1) == Some(b'/') => self.copy_line_comment(out),
                b'/' if self.peek(1) == Some(b'*') => self.copy_block_comment(out),
                b'{' => {
                    brace_depth += 1;
                    out.push('{');
                    self.pos += 1;
                }
                b'}' => {
                    if stop_at_rbrace && brace_depth == 0 {
                        return;
                    }
                    brace_depth -= 1;
                    out.push('}');
                    self.pos += 1;
                }
                b'<' if self.jsx_starts_here() => self.parse_element(out),
                _ => {
                    out.push(b as char);
                    self.pos += 1;
                }
            }
        }
    }

    /// JSX starts at `<` only in expression position: preceded (skipping
    /// whitespace) by start of input, an opener/operator, or one of the
    /// expression keywords. After `)`, `]`, a digit, or an identifier the
    /// `<` is a comparison or generic. TSX generic-parameter patterns
    /// (`<T,>`, `<T = …>`, `<T extends …>`) are rejected by lookahead.
    fn jsx_starts_here(&self) -> bool {
        // `</` outside an element body is stray; never a JSX start
        if self.peek(1) == Some(b'/') {
            return false;
        }

        let mut j = self.pos;
        while j > 0 && self.bytes[j - 1].is_ascii_whitespace() {
            j -= 1;
        }
        let allowed = if j == 0 {
            true
        } else {
            let prev = self.bytes[j - 1];
            match prev {
                b'(' | b',' | b'=' | b'>' | b'{' | b'}' | b'[' | b';' | b'?' | b':' | b'&'
                | b'|' => true,
                _ if is_ident(prev) => {
                    let mut k = j;
                    while k > 0 && is_ident(self.bytes[k - 1]) {
                        k -= 1;
                    }
                    matches!(
                        &self.src[k..j],
                        "return"
                            | "case"
                            | "default"
                            | "typeof"
                            | "void"
                            | "delete"
                            | "throw"
                            | "new"
                            | "in"
                            | "of"
                            | "else"
                            | "yield"
                            | "await"
                            | "export"
                    )
                }
                _ => false,
            }
        };

        allowed && !self.generic_params_follow()
    }

    /// Lookahead for `<T,>`, `<T = …>`, `<T extends …>`.
    fn generic_params_follow(&self) -> bool {
        let mut j = self.skip_ws_from(self.pos + 1);
        let start = j;
        while j < self.bytes.len() && is_ident(self.bytes[j]) {
            j += 1;
        }
        if j == start {
            return false;
        }
        let rest = self.skip_ws_from(j);
        match self.bytes.get(rest) {
            Some(b',') => {
                let after = self.skip_ws_from(rest + 1);
                self.bytes.get(after) == Some(&b'>')
            }
            Some(b'=') => !matches!(self.bytes.get(rest + 1), Some(b'>' | b'=')),
            Some(b'e') => {
                self.bytes[rest..].starts_with(b"extends")
                    && self
                        .bytes
                        .get(rest + 7)
                        .is_none_or(|&c| !is_ident(c))
            }
            _ => false,
        }
    }

    // =========================================================================
    // Element parsing
    // =========================================================================

    /// Parse one element (cursor on `<`) and emit its `__jsx` call.
    fn parse_element(&mut self, out: &mut String) {
        self.pos += 1; // '<'
        let name = self.read_tag_name();

        out.push_str("__jsx(");
        emit_tag(name, out);

        let self_closing = self.parse_attributes(out);
        if self_closing {
            out.push(')');
            return;
        }
        self.parse_children(name, out);
    }

    fn read_tag_name(&mut self) -> &'a str {
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if is_ident(b) || b == b'.' || b == b'-' {
                self.pos += 1;
            } else {
                break;
            }
        }
        &self.src[start..self.pos]
    }

    /// Parse the tag head after the name. Emits `, null` or `, {…props}`,
    /// echoing head newlines into the emitted object. Returns true when the
    /// element is self-closing.
    fn parse_attributes(&mut self, out: &mut String) -> bool {
        let mut props = String::new();
        let mut count = 0usize;
        let mut self_closing = false;

        loop {
            // Whitespace between attributes; newlines are kept
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
                if self.bytes[self.pos] == b'\n' {
                    props.push('\n');
                }
                self.pos += 1;
            }
            if self.pos >= self.bytes.len() {
                break; // malformed: missing '>'
            }

            match self.bytes[self.pos] {
                b'>' => {
                    self.pos += 1;
                    break;
                }
                b'/' if self.peek(1) == Some(b'>') => {
                    self.pos += 2;
                    self_closing = true;
                    break;
                }
                b'{' => {
                    // Spread props
                    self.pos += 1;
                    let mut expr = String::new();
                    self.scan_code(&mut expr, true);
                    if self.bytes.get(self.pos) == Some(&b'}') {
                        self.pos += 1;
                    }
                    if expr.trim_start().starts_with("...") {
                        push_entry(&mut props, &mut count, expr.trim());
                    } else {
                        // Stray braces: keep only the newlines
                        props.extend(expr.chars().filter(|&c| c == '\n'));
                    }
                }
                _ => {
                    let Some(entry) = self.parse_attribute(&mut props) else {
                        break;
                    };
                    push_entry(&mut props, &mut count, &entry);
                }
            }
        }

        if count == 0 && props.trim().is_empty() {
            out.push_str(", null");
            out.push_str(&props);
        } else {
            out.push_str(", {");
            out.push_str(&props);
            out.push('}');
        }
        self_closing
    }

    /// One `name`, `name="str"`, or `name={expr}` attribute. Returns the
    /// object-literal entry; newlines around `=` go into `props`.
    fn parse_attribute(&mut self, props: &mut String) -> Option<String> {
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if is_ident(b) || b == b'-' || b == b':' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            // Unparseable byte: consume it to guarantee progress
            self.pos += 1;
            return None;
        }
        let name = &self.src[start..self.pos];

        self.skip_ws_into(props);
        let value = if self.bytes.get(self.pos) == Some(&b'=') {
            self.pos += 1;
            self.skip_ws_into(props);
            match self.bytes.get(self.pos) {
                Some(&q @ (b'"' | b'\'')) => {
                    let mut lit = String::new();
                    lit.push(q as char);
                    self.pos += 1;
                    while self.pos < self.bytes.len() && self.bytes[self.pos] != q {
                        lit.push(self.bytes[self.pos] as char);
                        self.pos += 1;
                    }
                    lit.push(q as char);
                    self.pos += 1;
                    lit
                }
                Some(b'{') => {
                    self.pos += 1;
                    let mut expr = String::new();
                    self.scan_code(&mut expr, true);
                    if self.bytes.get(self.pos) == Some(&b'}') {
                        self.pos += 1;
                    }
                    expr
                }
                _ => "true".to_string(),
            }
        } else {
            "true".to_string()
        };

        let key = if name.contains('-') || name.contains(':') {
            format!("\"{name}\"")
        } else {
            name.to_string()
        };
        Some(format!("{key}: {value}"))
    }

    /// Parse children until the closing tag, emitting each as an extra
    /// argument. Text runs become string literals, one per line.
    fn parse_children(&mut self, _name: &str, out: &mut String) {
        let mut text = String::new();

        loop {
            if self.pos >= self.bytes.len() {
                // Missing closing tag: best-effort close
                flush_text(&mut text, out);
                out.push(')');
                return;
            }

            match self.bytes[self.pos] {
                b'<' if self.peek(1) == Some(b'/') => {
                    flush_text(&mut text, out);
                    self.pos += 2;
                    // Closing-tag region: echo its newlines before ')'
                    while self.pos < self.bytes.len() && self.bytes[self.pos] != b'>' {
                        if self.bytes[self.pos] == b'\n' {
                            out.push('\n');
                        }
                        self.pos += 1;
                    }
                    if self.pos < self.bytes.len() {
                        self.pos += 1;
                    }
                    out.push(')');
                    return;
                }
                b'<' => {
                    flush_text(&mut text, out);
                    out.push_str(", ");
                    self.parse_element(out);
                }
                b'{' => {
                    flush_text(&mut text, out);
                    self.pos += 1;
                    let mut expr = String::new();
                    self.scan_code(&mut expr, true);
                    if self.bytes.get(self.pos) == Some(&b'}') {
                        self.pos += 1;
                    }
                    if is_passive_expr(&expr) {
                        // Whitespace or comment-only: keep it, no argument
                        out.push_str(&expr);
                    } else {
                        out.push_str(", ");
                        out.push_str(&expr);
                    }
                }
                b'\n' => {
                    flush_text(&mut text, out);
                    out.push('\n');
                    self.pos += 1;
                }
                b => {
                    text.push(b as char);
                    self.pos += 1;
                }
            }
        }
    }

    // =========================================================================
    // Verbatim copies
    // =========================================================================

    fn copy_quoted(&mut self, out: &mut String) {
        let quote = self.bytes[self.pos];
        out.push(quote as char);
        self.pos += 1;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            out.push(b as char);
            self.pos += 1;
            if b == b'\\' && self.pos < self.bytes.len() {
                out.push(self.bytes[self.pos] as char);
                self.pos += 1;
                continue;
            }
            if b == quote {
                break;
            }
        }
    }

    /// Template literal: verbatim, except `${…}` interpolations re-enter
    /// code scanning so nested JSX is recognized.
    fn copy_template(&mut self, out: &mut String) {
        out.push('`');
        self.pos += 1;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if b == b'\\' {
                out.push('\\');
                if let Some(next) = self.peek(1) {
                    out.push(next as char);
                }
                self.pos += 2;
                continue;
            }
            if b == b'`' {
                out.push('`');
                self.pos += 1;
                return;
            }
            if b == b'$' && self.peek(1) == Some(b'{') {
                out.push_str("${");
                self.pos += 2;
                self.scan_code(out, true);
                if self.bytes.get(self.pos) == Some(&b'}') {
                    out.push('}');
                    self.pos += 1;
                }
                continue;
            }
            out.push(b as char);
            self.pos += 1;
        }
    }

    fn copy_line_comment(&mut self, out: &mut String) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            out.push(self.bytes[self.pos] as char);
            self.pos += 1;
        }
    }

    fn copy_block_comment(&mut self, out: &mut String) {
        out.push_str("/*");
        self.pos += 2;
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == b'*' && self.peek(1) == Some(b'/') {
                out.push_str("*/");
                self.pos += 2;
                return;
            }
            out.push(self.bytes[self.pos] as char);
            self.pos += 1;
        }
    }

    // =========================================================================
    // Small helpers
    // =========================================================================

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn skip_ws_from(&self, mut j: usize) -> usize {
        while j < self.bytes.len() && self.bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        j
    }

    fn skip_ws_into(&mut self, sink: &mut String) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            if self.bytes[self.pos] == b'\n' {
                sink.push('\n');
            }
            self.pos += 1;
        }
    }
}

/// Lowercase-first tags are intrinsic elements (string literals);
/// everything else is a component reference. Empty name is a fragment.
fn emit_tag(name: &str, out: &mut String) {
    if name.is_empty() {
        out.push_str("__Fragment");
    } else if name.starts_with(|c: char| c.is_ascii_lowercase()) {
        out.push('"');
        out.push_str(name);
        out.push('"');
    } else {
        out.push_str(name);
    }
}

fn push_entry(props: &mut String, count: &mut usize, entry: &str) {
    if *count > 0 {
        props.push_str(", ");
    }
    *count += 1;
    props.push_str(entry);
}

/// Emit the buffered text run as a string-literal child, trimmed; empty
/// runs emit nothing.
fn flush_text(text: &mut String, out: &mut String) {
    let t = text.trim();
    if !t.is_empty() {
        out.push_str(", \"");
        for c in t.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c => out.push(c),
            }
        }
        out.push('"');
    }
    text.clear();
}

/// Expression children that produce no argument: whitespace or a single
/// block comment (JSX comment idiom).
fn is_passive_expr(expr: &str) -> bool {
    let t = expr.trim();
    t.is_empty()
        || (t.starts_with("/*") && t.ends_with("*/") && !t[2..t.len() - 2].contains("*/"))
}

fn is_ident(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_element() {
        let out = translate_jsx("const el = <div id=\"app\">Hi</div>;");
        assert_eq!(out, "const el = __jsx(\"div\", {id: \"app\"}, \"Hi\");");
    }

    #[test]
    fn test_component_reference() {
        let out = translate_jsx("render(<Header title={name} />);");
        assert_eq!(out, "render(__jsx(Header, {title: name}));");
    }

    #[test]
    fn test_member_component() {
        let out = translate_jsx("x = <Menu.Item k=\"1\" />;");
        assert_eq!(out, "x = __jsx(Menu.Item, {k: \"1\"});");
    }

    #[test]
    fn test_fragment() {
        let out = translate_jsx("return <><a /><b /></>;");
        assert_eq!(
            out,
            "return __jsx(__Fragment, null, __jsx(\"a\", null), __jsx(\"b\", null));"
        );
    }

    #[test]
    fn test_shorthand_boolean_prop() {
        let out = translate_jsx("const x = <input disabled />;");
        assert_eq!(out, "const x = __jsx(\"input\", {disabled: true});");
    }

    #[test]
    fn test_spread_props() {
        let out = translate_jsx("const x = <div {...rest} id=\"a\" />;");
        assert_eq!(out, "const x = __jsx(\"div\", {...rest, id: \"a\"});");
    }

    #[test]
    fn test_dashed_prop_quoted() {
        let out = translate_jsx("const x = <div data-id={n} />;");
        assert_eq!(out, "const x = __jsx(\"div\", {\"data-id\": n});");
    }

    #[test]
    fn test_nested_elements_and_expr_children() {
        let out = translate_jsx("const x = <ul>{items}<li>last</li></ul>;");
        assert_eq!(
            out,
            "const x = __jsx(\"ul\", null, items, __jsx(\"li\", null, \"last\"));"
        );
    }

    #[test]
    fn test_line_count_preserved() {
        let src = "const x = (\n  <div\n    id=\"a\"\n  >\n    Hello\n    {name}\n  </div\n>\n);";
        let out = translate_jsx(src);
        assert_eq!(out.matches('\n').count(), src.matches('\n').count());
        assert!(out.contains("__jsx(\"div\""));
    }

    #[test]
    fn test_text_runs_split_per_line() {
        let src = "el = <p>\n  one\n  two\n</p>;";
        let out = translate_jsx(src);
        assert!(out.contains("\"one\""));
        assert!(out.contains("\"two\""));
        assert_eq!(out.matches('\n').count(), src.matches('\n').count());
    }

    #[test]
    fn test_idempotent_on_plain_js() {
        // No JSX in expression position -> byte-identical
        let src = "const ok = a < b && c > d;\nif (x<y) { f(); }\nlet g = foo < bar;\n";
        assert_eq!(translate_jsx(src), src);
    }

    #[test]
    fn test_comparison_after_paren_ident() {
        let src = "while (count < limit) { count += 1; }";
        assert_eq!(translate_jsx(src), src);
    }

    #[test]
    fn test_jsx_after_return() {
        let out = translate_jsx("function f() {\n  return <span>ok</span>;\n}");
        assert!(out.contains("__jsx(\"span\", null, \"ok\")"));
    }

    #[test]
    fn test_jsx_after_logical_ops() {
        let out = translate_jsx("const a = cond && <b>x</b>;\nconst o = flag || <i>y</i>;");
        assert!(out.contains("cond && __jsx(\"b\""));
        assert!(out.contains("flag || __jsx(\"i\""));
    }

    #[test]
    fn test_generic_arrow_not_jsx() {
        let src = "const id = <T,>(x: T) => x;";
        assert_eq!(translate_jsx(src), src);
        let src2 = "const f = <T extends object>(x: T) => x;";
        assert_eq!(translate_jsx(src2), src2);
        let src3 = "const g = <T = string>(x) => x;";
        assert_eq!(translate_jsx(src3), src3);
    }

    #[test]
    fn test_string_and_template_untouched() {
        let src = "const s = 'a < b';\nconst t = `x ${v} < y`;";
        assert_eq!(translate_jsx(src), src);
    }

    #[test]
    fn test_jsx_inside_template_interpolation() {
        let out = translate_jsx("const t = `${ <b>hi</b> }`;");
        assert!(out.contains("__jsx(\"b\", null, \"hi\")"));
    }

    #[test]
    fn test_jsx_comment_child() {
        let out = translate_jsx("el = <div>{/* note */}</div>;");
        assert_eq!(out, "el = __jsx(\"div\", null/* note */);");
    }

    #[test]
    fn test_text_escaping() {
        let out = translate_jsx("el = <p>say \"hi\"\\now</p>;");
        assert!(out.contains("\\\"hi\\\""));
        assert!(out.contains("\\\\"));
    }

    #[test]
    fn test_missing_close_best_effort() {
        let out = translate_jsx("el = <div>oops");
        assert_eq!(out, "el = __jsx(\"div\", null, \"oops\")");
    }

    #[test]
    fn test_preamble_react() {
        let out = compile_jsx_native("export default () => <div />;", "react", false);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("import { createElement as __jsx"));
        assert!(text.contains("from 'react';"));
        assert!(text.contains("__jsx(\"div\", null)"));
    }

    #[test]
    fn test_preamble_preact() {
        let out = compile_jsx_native("export default () => <div />;", "preact", false);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("import { h as __jsx"));
    }

    #[test]
    fn test_tsx_erasure_then_translate() {
        let src = "const App = ({ n }: Props) => <b>{n}</b>;";
        let out = compile_jsx_native(src, "react", true);
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("Props"));
        assert!(text.contains("__jsx(\"b\", null, n)"));
    }

    #[test]
    fn test_conditional_jsx_in_ternary() {
        let out = translate_jsx("const v = ok ? <a /> : <b />;");
        assert_eq!(out, "const v = ok ? __jsx(\"a\", null) : __jsx(\"b\", null);");
    }

    #[test]
    fn test_multiline_attr_head_newlines() {
        let src = "el = <div\n  a=\"1\"\n  b={x}\n/>;";
        let out = translate_jsx(src);
        assert_eq!(out.matches('\n').count(), src.matches('\n').count());
        assert!(out.contains("a: \"1\""));
        assert!(out.contains("b: x"));
    }
}
