//! TypeScript type erasure.
//!
//! Line-oriented with brace-depth tracking. Every input newline produces one
//! output newline, so browser stack traces and source-map line numbers stay
//! valid. String literals and comment bodies pass through verbatim.

/// Erase TypeScript syntax from `source`, preserving line count.
pub fn strip_types(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    // Depth of an open brace block belonging to a removed declaration
    let mut skip_depth: i32 = 0;
    // Carried across lines: ended inside a /* */ comment
    let mut in_block = false;
    // Open-bracket stack carried across lines; innermost `(` marks a
    // parameter/argument context where annotations always strip
    let mut stack: Vec<u8> = Vec::new();

    for (i, line) in source.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }

        if skip_depth > 0 {
            skip_depth += net_braces(line);
            continue;
        }

        if !in_block {
            let trimmed = line.trim_start();
            if is_removed_line(trimmed) {
                if trimmed == "};" {
                    if stack.last() == Some(&b'{') {
                        stack.pop();
                    }
                } else {
                    let net = net_braces(line);
                    if net > 0 {
                        skip_depth = net;
                    }
                }
                continue;
            }
        }

        strip_line(line, &mut in_block, &mut stack, &mut out);
    }

    out
}

// =============================================================================
// Whole-line removal
// =============================================================================

/// Lines that are erased entirely (replaced by a blank line).
fn is_removed_line(t: &str) -> bool {
    if t == "};" {
        return true;
    }
    // Comment lines, except //# and //@ directives (source maps)
    if t.starts_with("//") && !t.starts_with("//#") && !t.starts_with("//@") {
        return true;
    }

    let rest = t.strip_prefix("export ").unwrap_or(t);

    if starts_with_word(rest, "interface")
        || starts_with_word(rest, "declare")
        || starts_with_word(rest, "namespace")
        || starts_with_word(t, "import type")
    {
        return true;
    }
    if starts_with_word(rest, "abstract") && starts_with_word(skip_word(rest, "abstract"), "class")
    {
        return true;
    }
    // `export type {…}` and `export type *` re-exports
    if t.starts_with("export type") {
        let after = t["export type".len()..].trim_start();
        if after.starts_with('{') || after.starts_with('*') {
            return true;
        }
    }
    is_type_alias(rest)
}

/// `type Name[<…>] = …` — distinguished from an object property `type:` by
/// looking past any generic parameter list for the `=`.
fn is_type_alias(t: &str) -> bool {
    let Some(mut rest) = t.strip_prefix("type ") else {
        return false;
    };
    rest = rest.trim_start();

    let name_len = rest.chars().take_while(|&c| is_ident(c)).count();
    if name_len == 0 {
        return false;
    }
    rest = rest[name_len..].trim_start();

    // Generic parameter list
    if rest.starts_with('<') {
        let mut depth = 0i32;
        let mut end = None;
        for (j, c) in rest.char_indices() {
            match c {
                '<' => depth += 1,
                '>' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(j);
                        break;
                    }
                }
                _ => {}
            }
        }
        match end {
            Some(j) => rest = rest[j + 1..].trim_start(),
            None => return false,
        }
    }

    rest.starts_with('=') && !rest.starts_with("==") && !rest.starts_with("=>")
}

/// Net `{`/`}` balance of a line, ignoring braces inside strings and
/// line comments.
fn net_braces(line: &str) -> i32 {
    let bytes = line.as_bytes();
    let mut net = 0i32;
    let mut i = 0;
    let mut quote = 0u8;
    while i < bytes.len() {
        let b = bytes[i];
        if quote != 0 {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == quote {
                quote = 0;
            }
        } else {
            match b {
                b'"' | b'\'' | b'`' => quote = b,
                b'/' if bytes.get(i + 1) == Some(&b'/') => break,
                b'{' => net += 1,
                b'}' => net -= 1,
                _ => {}
            }
        }
        i += 1;
    }
    net
}

// =============================================================================
// In-line stripping
// =============================================================================

const MODIFIERS: [&str; 6] = [
    "public", "private", "protected", "readonly", "override", "abstract",
];

/// Strip type syntax from a kept line, appending the result to `out`.
fn strip_line(line: &str, in_block: &mut bool, stack: &mut Vec<u8>, out: &mut String) {
    let bytes = line.as_bytes();
    let mut i = 0;
    // Unresolved ternary `?` marks on this line
    let mut pending_ternary = 0i32;
    let decl_start = is_decl_start(line.trim_start());
    let (case_start, import_line) = {
        let t = line.trim_start();
        (
            starts_with_word(t, "case") || t.starts_with("default:"),
            starts_with_word(t, "import") || starts_with_word(t, "export"),
        )
    };

    while i < bytes.len() {
        let b = bytes[i];

        // Block comment continuation / entry: verbatim
        if *in_block {
            if b == b'*' && bytes.get(i + 1) == Some(&b'/') {
                out.push_str("*/");
                i += 2;
                *in_block = false;
            } else {
                out.push(b as char);
                i += 1;
            }
            continue;
        }

        match b {
            b'"' | b'\'' | b'`' => {
                i = copy_string(bytes, i, out);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                // Trailing line comment: verbatim to end of line
                out.push_str(&line[i..]);
                return;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                out.push_str("/*");
                i += 2;
                *in_block = true;
                continue;
            }
            b'(' | b'{' | b'[' => stack.push(b),
            b')' => pop_if(stack, b'('),
            b'}' => pop_if(stack, b'{'),
            b']' => pop_if(stack, b'['),
            b'?' => {
                let next = bytes.get(i + 1).copied();
                // `?.` chaining, `??` nullish, `?:` optional marker are not
                // ternary openers
                if next != Some(b'.') && next != Some(b'?') && next != Some(b':') {
                    pending_ternary += 1;
                }
            }
            b':' => {
                let prev_c = out.chars().last();
                // `}`/`]` cover destructured-parameter annotations; they are
                // soft sites so minified `x?{}:y` ternaries stay ternaries
                let is_site = matches!(
                    prev_c,
                    Some(c) if is_ident(c) || matches!(c, '?' | '!' | ')' | '}' | ']')
                );
                let hard_site = matches!(prev_c, Some('?' | '!' | ')'));

                if pending_ternary > 0 && !hard_site {
                    pending_ternary -= 1;
                } else if is_site && !case_start {
                    let (end, stop) = scan_type(bytes, i + 1);
                    let in_parens = stack.last() == Some(&b'(');
                    let strip = hard_site
                        || in_parens
                        || matches!(stop, b';' | b'=')
                        || (stop == b'\n' && decl_start);
                    if strip {
                        // Drop a `?`/`!` optional/definite marker with it
                        if matches!(prev_c, Some('?' | '!')) {
                            out.pop();
                        }
                        if matches!(stop, b'=' | b'{') && !out.ends_with(' ') {
                            out.push(' ');
                        }
                        i = end;
                        continue;
                    }
                }
            }
            _ => {
                // Word-level constructs
                if is_ident(b as char) && !prev_is_ident(out) {
                    let word_end = i + ident_len(&bytes[i..]);
                    let word = &line[i..word_end];

                    if MODIFIERS.contains(&word)
                        && bytes.get(word_end).is_some_and(|c| *c == b' ')
                    {
                        i = word_end + 1;
                        continue;
                    }
                    if word == "implements" {
                        // Strip through to the class body brace
                        let mut j = word_end;
                        while j < bytes.len() && bytes[j] != b'{' {
                            j += 1;
                        }
                        i = j;
                        continue;
                    }
                    // `as` inside an import/export specifier list is a
                    // rename, not a cast
                    let spec_rename = import_line && stack.last() == Some(&b'{');
                    if (word == "as" || word == "satisfies") && cast_site(out) && !spec_rename {
                        let (end, _) = scan_type(bytes, word_end);
                        if out.ends_with(' ') {
                            out.pop();
                        }
                        i = end;
                        continue;
                    }

                    out.push_str(word);
                    i = word_end;
                    continue;
                }
            }
        }

        out.push(b as char);
        i += 1;
    }
}

fn pop_if(stack: &mut Vec<u8>, open: u8) {
    if stack.last() == Some(&open) {
        stack.pop();
    }
}

/// Copy a string literal verbatim, returning the index after it. Template
/// literals are copied through `${…}` without interpretation.
fn copy_string(bytes: &[u8], start: usize, out: &mut String) -> usize {
    let quote = bytes[start];
    out.push(quote as char);
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        out.push(b as char);
        if b == b'\\' && i + 1 < bytes.len() {
            out.push(bytes[i + 1] as char);
            i += 2;
            continue;
        }
        i += 1;
        if b == quote {
            break;
        }
    }
    i
}

/// Scan a type expression starting at `from`. Tracks angle-bracket and
/// parenthesis depth; stops at `,`, `)`, `;`, `=`, `{`, `}`, or end of line.
/// A `=>` continues the scan only inside a function type (after a consumed
/// paren group or at depth), so a return-type annotation before an arrow
/// body stops at the arrow. Returns the stop index and the stop byte
/// (`\n` for end of line).
fn scan_type(bytes: &[u8], from: usize) -> (usize, u8) {
    let mut i = from;
    let mut angle = 0i32;
    let mut paren = 0i32;
    let mut consumed_group = false;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'\'' | b'"' | b'`' => {
                // String-literal type
                let quote = b;
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\\' {
                        i += 2;
                        continue;
                    }
                    if bytes[i] == quote {
                        break;
                    }
                    i += 1;
                }
            }
            b'<' => angle += 1,
            b'>' if angle > 0 => angle -= 1,
            b'(' => paren += 1,
            b')' => {
                if paren == 0 {
                    return (i, b')');
                }
                paren -= 1;
                if paren == 0 {
                    consumed_group = true;
                }
            }
            b',' if angle == 0 && paren == 0 => return (i, b','),
            b'=' if bytes.get(i + 1) == Some(&b'>') => {
                if consumed_group || angle > 0 || paren > 0 {
                    i += 2;
                    continue;
                }
                return (i, b'=');
            }
            b'=' => return (i, b'='),
            b';' => return (i, b';'),
            b'{' | b'}' if angle == 0 && paren == 0 => return (i, b),
            _ => {}
        }
        i += 1;
    }
    (i, b'\n')
}

/// Cast introducers: `)`, `]`, or an identifier, with one space before the
/// keyword.
fn cast_site(out: &str) -> bool {
    let Some(stripped) = out.strip_suffix(' ') else {
        return false;
    };
    matches!(stripped.chars().last(), Some(c) if is_ident(c) || c == ')' || c == ']')
}

fn is_decl_start(t: &str) -> bool {
    let rest = t.strip_prefix("export ").unwrap_or(t);
    starts_with_word(rest, "const")
        || starts_with_word(rest, "let")
        || starts_with_word(rest, "var")
}

fn prev_is_ident(out: &str) -> bool {
    matches!(out.chars().last(), Some(c) if is_ident(c))
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn ident_len(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|&&b| is_ident(b as char)).count()
}

fn starts_with_word(s: &str, word: &str) -> bool {
    s.starts_with(word)
        && s[word.len()..]
            .chars()
            .next()
            .is_none_or(|c| !is_ident(c))
}

fn skip_word<'a>(s: &'a str, word: &str) -> &'a str {
    s.strip_prefix(word).map(str::trim_start).unwrap_or(s)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(s: &str) -> usize {
        s.matches('\n').count()
    }

    #[test]
    fn test_type_alias_removed_adjacent_kept() {
        let src = "type Foo = string | number;\nconst x = 1;";
        let out = strip_types(src);
        assert!(out.contains("const x = 1"));
        assert!(!out.contains("type Foo"));
        assert_eq!(lines(&out), 1);
    }

    #[test]
    fn test_line_count_preserved() {
        let src = "interface A {\n  x: number;\n  y: string;\n}\nconst a = 1;\n";
        let out = strip_types(src);
        assert_eq!(lines(&out), lines(src));
        assert!(out.contains("const a = 1"));
        assert!(!out.contains("interface"));
        assert!(!out.contains("x: number"));
    }

    #[test]
    fn test_generic_type_alias() {
        let src = "type Pair<A, B> = [A, B];\nlet p = 0;";
        let out = strip_types(src);
        assert!(!out.contains("Pair"));
        assert!(out.contains("let p = 0"));
    }

    #[test]
    fn test_object_property_named_type_kept() {
        let src = "const action = {\n  type: 'INCREMENT',\n  payload: 1,\n};";
        let out = strip_types(src);
        assert!(out.contains("type: 'INCREMENT'"));
        assert!(out.contains("payload: 1"));
    }

    #[test]
    fn test_import_type_removed() {
        let src = "import type { Foo } from './types';\nimport { bar } from './bar';";
        let out = strip_types(src);
        assert!(!out.contains("Foo"));
        assert!(out.contains("import { bar } from './bar'"));
    }

    #[test]
    fn test_export_type_reexports_removed() {
        let out = strip_types(
            "export type { A } from './a';\nexport type * from './b';\nexport { c } from './c';",
        );
        assert!(!out.contains("'./a'"));
        assert!(!out.contains("'./b'"));
        assert!(out.contains("'./c'"));
    }

    #[test]
    fn test_param_annotations_stripped() {
        let out = strip_types("function add(a: number, b: number): number {");
        assert_eq!(out, "function add(a, b) {");
    }

    #[test]
    fn test_optional_param() {
        let out = strip_types("function f(name?: string) {}");
        assert_eq!(out, "function f(name) {}");
    }

    #[test]
    fn test_destructured_param_annotation() {
        let out = strip_types("const App = ({ n }: Props) => n;");
        assert_eq!(out, "const App = ({ n }) => n;");
    }

    #[test]
    fn test_variable_annotation() {
        let out = strip_types("const count: number = 0;");
        assert_eq!(out, "const count = 0;");
    }

    #[test]
    fn test_as_cast_stripped() {
        let out = strip_types("const el = document.getElementById('x') as HTMLElement;");
        assert_eq!(out, "const el = document.getElementById('x');");
    }

    #[test]
    fn test_satisfies_stripped() {
        let out = strip_types("const cfg = make() satisfies Config;");
        assert_eq!(out, "const cfg = make();");
    }

    #[test]
    fn test_access_modifiers_stripped() {
        let out = strip_types("  private readonly handler = () => {};");
        assert_eq!(out, "  handler = () => {};");
    }

    #[test]
    fn test_implements_clause_stripped() {
        let out = strip_types("class Store implements Observable, Disposable {");
        assert_eq!(out, "class Store {");
    }

    #[test]
    fn test_declare_block_skipped_as_blank() {
        let src = "declare module 'foo' {\n  export const x: number;\n}\nconst real = 1;";
        let out = strip_types(src);
        assert_eq!(lines(&out), 3);
        assert!(out.contains("const real = 1"));
        assert!(!out.contains("'foo'"));
    }

    #[test]
    fn test_string_bodies_untouched() {
        let src = "const s = 'type Foo = string; private x';";
        assert_eq!(strip_types(src), src);
    }

    #[test]
    fn test_comment_line_removed_directive_kept() {
        let src = "// a note\n//# sourceMappingURL=x.map\nlet a = 1;";
        let out = strip_types(src);
        assert!(!out.contains("a note"));
        assert!(out.contains("sourceMappingURL"));
        assert!(out.contains("let a = 1"));
    }

    #[test]
    fn test_generic_angle_depth_in_params() {
        let out = strip_types("function f(m: Map<string, number>, x: number) {}");
        assert_eq!(out, "function f(m, x) {}");
    }

    #[test]
    fn test_ternary_untouched() {
        let src = "const v = ok ? left : right;";
        assert_eq!(strip_types(src), src);
    }

    #[test]
    fn test_arrow_return_type() {
        let out = strip_types("const f = (x: number): string => String(x);");
        assert_eq!(out, "const f = (x) => String(x);");
    }

    #[test]
    fn test_function_type_annotation() {
        let out = strip_types("const h: (x: number) => void = fn;");
        assert_eq!(out, "const h = fn;");
    }

    #[test]
    fn test_multiline_params() {
        let src = "function f(\n  a: number,\n  b: string,\n) {}";
        let out = strip_types(src);
        assert_eq!(out, "function f(\n  a,\n  b,\n) {}");
    }

    #[test]
    fn test_multiline_object_literal_kept() {
        let src = "register({\n  name: 'header',\n  port: 5001,\n});";
        assert_eq!(strip_types(src), src);
    }

    #[test]
    fn test_class_field_annotation() {
        let out = strip_types("class C {\n  count: number;\n}");
        assert_eq!(out, "class C {\n  count;\n}");
    }

    #[test]
    fn test_import_rename_not_a_cast() {
        let src = "import { useState as useS } from 'react';\nexport { run as start };";
        assert_eq!(strip_types(src), src);
    }

    #[test]
    fn test_interface_with_nested_braces() {
        let src = "interface Opts {\n  cb: { (x: number): void };\n}\nrun();";
        let out = strip_types(src);
        assert_eq!(lines(&out), 3);
        assert!(out.contains("run();"));
        assert!(!out.contains("cb"));
    }
}
