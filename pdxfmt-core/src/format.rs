//! Canonical text reconstruction
//!
//! Walks the parse tree and the token stream together, deciding per block
//! between inline and expanded layout, re-attaching comments, and wrapping
//! value lists. The output is a pure function of the tree shape, the token
//! channels and the options, which is what makes formatting idempotent.

use crate::ast::{AssignExpr, BraceExpr, BraceValue, BraceValueKind, Expr, ExprKind, Program, Value, ValueKind};
use crate::config::FormatOptions;
use crate::parser::{self, ParseError};
use crate::token::{Channel, TokenStream};

/// Format a whole script source
pub fn format(source: &str, options: &FormatOptions) -> Result<String, ParseError> {
    let tokens = TokenStream::lex(source)?;
    let program = parser::parse(&tokens)?;
    let mut formatter = Formatter { tokens: &tokens, options, depth: 0 };
    Ok(formatter.format_program(&program))
}

/// Check whether a source differs from its canonical form
pub fn needs_format(source: &str, options: &FormatOptions) -> Result<bool, ParseError> {
    let formatted = format(source, options)?;
    Ok(formatted != source)
}

struct Formatter<'a, 'b> {
    tokens: &'b TokenStream<'a>,
    options: &'b FormatOptions,
    depth: usize,
}

impl Formatter<'_, '_> {
    fn format_program(&mut self, program: &Program) -> String {
        let mut out = self.cosmetic(None, false);

        for expr in &program.exprs {
            let text = self.format_expr(expr);
            out.push_str(&text);
        }

        drop_trailing_newlines(&mut out);
        out.push('\n');
        out
    }

    fn format_expr(&mut self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Assign(assign) => self.format_assign(assign, expr.stop),
            ExprKind::Value(value) => self.format_value(value),
        }
    }

    fn format_assign(&mut self, assign: &AssignExpr, stop: usize) -> String {
        let mut out = String::from(self.tokens.text(assign.key));

        if self.options.assignment_spacing {
            out.push_str(" = ");
        } else {
            out.push('=');
        }

        let value = self.format_value(&assign.value);
        out.push_str(&value);
        out.push_str(&self.cosmetic(Some(stop), true));
        out
    }

    fn format_value(&mut self, value: &Value) -> String {
        match &value.kind {
            ValueKind::Leaf => self.tokens.text(value.start).to_string(),
            ValueKind::Brace(brace) => self.format_brace(brace),
        }
    }

    fn format_brace(&mut self, brace: &BraceExpr) -> String {
        let mut out = String::from("{");

        let after_brace = self.indented(|f| f.cosmetic(Some(brace.l_brace), false));
        out.push_str(&after_brace);

        if brace.values.is_empty() {
            self.format_empty_body(&mut out);
        } else if brace.values.len() == 1 {
            self.format_single_value(&mut out, &brace.values[0]);
        } else if brace.values.iter().all(BraceValue::is_plain) {
            self.format_value_list(&mut out, &brace.values);
        } else {
            self.format_expr_block(&mut out, &brace.values);
        }

        out.push('}');
        out
    }

    fn format_empty_body(&mut self, out: &mut String) {
        if !self.options.single_line_block && out.ends_with('{') {
            out.push('\n');
            out.push_str(&self.indent());
        } else if out.ends_with('\n') {
            out.push_str(&self.indent());
        }
    }

    fn format_single_value(&mut self, out: &mut String, value: &BraceValue) {
        let expand = !self.options.single_line_block
            || value.is_assign_brace()
            || self.any_comments_after(value.stop);

        if expand {
            self.indented(|f| {
                f.clean_indent(out);
                let text = f.format_brace_value(value);
                out.push_str(&text);

                // a plain value keeps its trailing comment on the same line
                if value.is_plain() {
                    let run = f.cosmetic(Some(value.stop), false);
                    let run = run.trim();
                    if !run.is_empty() {
                        out.push(' ');
                        out.push_str(run);
                    }
                }
            });

            drop_trailing_newlines(out);
            out.push('\n');
            out.push_str(&self.indent());
        } else {
            let mut text = self.format_brace_value(value);
            drop_trailing_newlines(&mut text);

            if self.options.bracket_spacing {
                out.push(' ');
                out.push_str(&text);
                out.push(' ');
            } else {
                out.push_str(&text);
            }
        }
    }

    fn format_value_list(&mut self, out: &mut String, values: &[BraceValue]) {
        let wraparound = self.options.bracket_wraparound.max(1);

        self.indented(|f| {
            let mut column = 0;
            for value in values {
                if column % wraparound == 0 {
                    f.clean_indent(out);
                } else {
                    out.push(' ');
                }

                let text = f.format_brace_value(value);
                out.push_str(&text);
                out.push_str(&f.cosmetic(Some(value.start), false));

                column = if out.ends_with('\n') { 0 } else { column + 1 };
            }
        });

        drop_trailing_newlines(out);
        out.push('\n');
        out.push_str(&self.indent());
    }

    fn format_expr_block(&mut self, out: &mut String, values: &[BraceValue]) {
        self.indented(|f| {
            for value in values {
                f.clean_indent(out);
                let text = f.format_brace_value(value);
                out.push_str(&text);
            }
        });

        drop_trailing_newlines(out);
        out.push('\n');
        out.push_str(&self.indent());
    }

    fn format_brace_value(&mut self, value: &BraceValue) -> String {
        match &value.kind {
            BraceValueKind::Value(value) => self.format_value(value),
            BraceValueKind::Expr(expr) => self.format_expr(expr),
        }
    }

    /// Reconstruct the comment/blank-line run following the anchor token
    /// (or leading the file when the anchor is `None`), stopping at the
    /// next Default-channel token. A run without any comment is discarded
    /// unless `allow_whitespace` is set.
    fn cosmetic(&self, anchor: Option<usize>, allow_whitespace: bool) -> String {
        let mut out = String::new();
        let mut prev = anchor.map(|index| self.tokens.channel(index));

        let mut index = anchor.map_or(0, |index| index + 1);
        while index < self.tokens.len() {
            let channel = self.tokens.channel(index);
            match channel {
                Channel::Comment => {
                    match prev {
                        Some(Channel::Newline) => out.push_str(&self.indent()),
                        Some(_) => out.push(' '),
                        None => {}
                    }
                    out.push_str(self.tokens.text(index).trim_end());
                }
                Channel::Newline => {
                    out.push_str(&self.tokens.text(index).replace('\r', ""));
                }
                Channel::Default => break,
            }

            prev = Some(channel);
            index += 1;
        }

        if !allow_whitespace && out.trim().is_empty() {
            return String::new();
        }
        out
    }

    /// True when a comment token follows `stop` before the next
    /// Default-channel token
    fn any_comments_after(&self, stop: usize) -> bool {
        for index in stop + 1..self.tokens.len() {
            match self.tokens.channel(index) {
                Channel::Comment => return true,
                Channel::Default => return false,
                Channel::Newline => {}
            }
        }
        false
    }

    /// Run `block` one indentation level deeper; the previous depth is
    /// restored on every exit path
    fn indented<T>(&mut self, block: impl FnOnce(&mut Self) -> T) -> T {
        self.depth += 1;
        let result = block(self);
        self.depth -= 1;
        result
    }

    /// Start a fresh indented line unless already at the start of one
    fn clean_indent(&self, out: &mut String) {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&self.indent());
    }

    fn indent(&self) -> String {
        self.options.indent(self.depth)
    }
}

fn drop_trailing_newlines(out: &mut String) {
    while out.ends_with('\n') {
        out.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormatOptions;

    /// Asserts the canonical form and that reformatting it is a fixpoint
    fn assert_format(options: &FormatOptions, input: &str, expected: &str) {
        let result = format(input, options).unwrap();
        assert_eq!(result, expected);

        let again = format(&result, options).unwrap();
        assert_eq!(again, result, "formatting should be idempotent");
    }

    fn tab_width(width: usize) -> FormatOptions {
        FormatOptions { tab_width: width, ..Default::default() }
    }

    #[test]
    fn test_nested_assignments() {
        assert_format(
            &tab_width(2),
            "level1 = {\nlevel2 = {\nlevel3 = {\nlevel4 = {\n}\n}\n}\n}",
            "level1 = {\n  level2 = {\n    level3 = {\n      level4 = {}\n    }\n  }\n}\n",
        );

        assert_format(
            &tab_width(2),
            "level1 = {\nlevel2 = {\nlevel3 = {\nlevel4 = {\n}\n\n\nlevel4 = {\n}\n}\n}\n}",
            "level1 = {\n  level2 = {\n    level3 = {\n      level4 = {}\n\n\n      level4 = {}\n    }\n  }\n}\n",
        );
    }

    #[test]
    fn test_assignment_with_detached_brace() {
        assert_format(
            &tab_width(2),
            "something =\n\n{\nname = some_name\ntype = some_type\n\n\n}",
            "something = {\n  name = some_name\n  type = some_type\n}\n",
        );

        // a comment stranded between '=' and '{' is not recoverable
        assert_format(
            &tab_width(2),
            "something =\n# some comment here\n{\nname = some_name\ntype = some_type\n\n\n}",
            "something = {\n  name = some_name\n  type = some_type\n}\n",
        );
    }

    #[test]
    fn test_already_canonical() {
        assert_format(
            &tab_width(2),
            "assignment = {\n  nested = {\n    x = y\n    x2 = y2\n  }\n}",
            "assignment = {\n  nested = {\n    x = y\n    x2 = y2\n  }\n}\n",
        );

        assert_format(
            &FormatOptions { tab_width: 2, assignment_spacing: false, ..Default::default() },
            "assignment={\n  nested={\n    x=y\n    x2=y2\n  }\n}",
            "assignment={\n  nested={\n    x=y\n    x2=y2\n  }\n}\n",
        );
    }

    #[test]
    fn test_mixed_inline_and_expanded() {
        assert_format(
            &tab_width(2),
            "random_owned = {\n    limit = { owner = { ai = no } }\n    owner = { add_country_modifier = { name = test_modifier duration = -1 } }\n}",
            "random_owned = {\n  limit = {\n    owner = { ai = no }\n  }\n  owner = {\n    add_country_modifier = {\n      name = test_modifier\n      duration = -1\n    }\n  }\n}\n",
        );
    }

    #[test]
    fn test_single_line_blocks() {
        assert_format(&FormatOptions::default(), "x = {\n    x2 = y2\n}", "x = { x2 = y2 }\n");

        assert_format(
            &FormatOptions::default(),
            "x = { x2 = { x3 = y3\n}\n}",
            "x = {\n    x2 = { x3 = y3 }\n}\n",
        );
    }

    #[test]
    fn test_no_bracket_spacing() {
        let options = FormatOptions { bracket_spacing: false, ..Default::default() };
        assert_format(&options, "{ x = y }", "{x = y}\n");
        assert_format(&options, "{ 12345 }", "{12345}\n");

        assert_format(
            &FormatOptions { bracket_spacing: false, tab_width: 1, ..Default::default() },
            "{ x = y x2 = y2}",
            "{\n x = y\n x2 = y2\n}\n",
        );
    }

    #[test]
    fn test_nested_bare_braces() {
        assert_format(
            &FormatOptions { tab_width: 2, bracket_spacing: false, ..Default::default() },
            "{{{}}{}}",
            "{\n  {{}}\n  {}\n}\n",
        );

        let many_nested_input = "{\n  {\n    {\n    }\n    {\n      {\n      }\n      {\n      \n      }\n      {\n      \n      \n      }\n      {\n      \n      \n      \n      }\n    }\n  }\n  {\n  }\n}";
        let many_nested_expected =
            "{\n  {\n    {}\n    {\n      {}\n      {}\n      {}\n      {}\n    }\n  }\n  {}\n}\n";

        assert_format(
            &FormatOptions { tab_width: 2, bracket_spacing: false, ..Default::default() },
            many_nested_input,
            many_nested_expected,
        );
        assert_format(&tab_width(2), many_nested_input, many_nested_expected);

        assert_format(
            &FormatOptions { bracket_spacing: false, ..Default::default() },
            "{{{{{}}}}}",
            "{{{{{}}}}}\n",
        );

        // inline nesting never indents, so the width is irrelevant
        assert_format(&tab_width(100), "{{{{{}}}}}", "{ { { { {} } } } }\n");

        assert_format(
            &FormatOptions { tab_width: 1, single_line_block: false, ..Default::default() },
            "{{{{{}}}}}",
            "{\n {\n  {\n   {\n    {\n    }\n   }\n  }\n }\n}\n",
        );
    }

    #[test]
    fn test_no_assignment_spacing() {
        assert_format(
            &FormatOptions { assignment_spacing: false, ..Default::default() },
            "{ x = y }",
            "{ x=y }\n",
        );

        assert_format(
            &FormatOptions { tab_width: 2, assignment_spacing: false, ..Default::default() },
            "{ x = y  x2=y2 x3   = y3}",
            "{\n  x=y\n  x2=y2\n  x3=y3\n}\n",
        );
    }

    #[test]
    fn test_single_line_expressions() {
        assert_format(&FormatOptions::default(), "{ x = y }", "{ x = y }\n");

        assert_format(
            &FormatOptions { assignment_spacing: false, bracket_spacing: false, ..Default::default() },
            "{ x = y }",
            "{x=y}\n",
        );
    }

    #[test]
    fn test_no_single_line_blocks() {
        assert_format(
            &FormatOptions { tab_width: 2, single_line_block: false, ..Default::default() },
            "{ 10 }",
            "{\n  10\n}\n",
        );

        assert_format(
            &FormatOptions { tab_width: 1, single_line_block: false, ..Default::default() },
            "{ 10 }",
            "{\n 10\n}\n",
        );
    }

    #[test]
    fn test_bracket_wraparound() {
        assert_format(
            &FormatOptions { tab_width: 2, bracket_wraparound: 5, ..Default::default() },
            "{ 0 1 2 3 4 }",
            "{\n  0 1 2 3 4\n}\n",
        );

        assert_format(
            &FormatOptions { tab_width: 2, bracket_wraparound: 3, ..Default::default() },
            "{ 0 1 2 3 4 }",
            "{\n  0 1 2\n  3 4\n}\n",
        );

        assert_format(
            &FormatOptions { tab_width: 2, bracket_wraparound: 1, ..Default::default() },
            "{ 0 1 2 3 4 }",
            "{\n  0\n  1\n  2\n  3\n  4\n}\n",
        );
    }

    #[test]
    fn test_value_list_repacks_source_lines() {
        assert_format(
            &FormatOptions { tab_width: 2, bracket_wraparound: 3, ..Default::default() },
            "{\n0\n1\n2\n3\n4\n}",
            "{\n  0 1 2\n  3 4\n}\n",
        );
    }

    #[test]
    fn test_blank_line_preservation() {
        assert_format(
            &FormatOptions::default(),
            "i = {\n    \n        x = y\n                \n        \n        x2 = y2\n        \n        \n        \n        x3 = y3\n        }",
            "i = {\n    x = y\n\n\n    x2 = y2\n\n\n\n    x3 = y3\n}\n",
        );

        assert_format(
            &FormatOptions::default(),
            "\n\nx = y\n            \nx2 = y2\n    \n            \nx3 = y3                 \n",
            "x = y\n\nx2 = y2\n\n\nx3 = y3\n",
        );
    }

    #[test]
    fn test_single_value_with_comments() {
        assert_format(
            &tab_width(1),
            "x = {\n 1 # comment\n}",
            "x = {\n 1 # comment\n}\n",
        );

        assert_format(
            &tab_width(1),
            "x = {\n 1 \n\n\n # comment\n}",
            "x = {\n 1 # comment\n}\n",
        );

        assert_format(
            &tab_width(1),
            "x = {\n y = 1 # comment\n\n\n\n\n\n\n}",
            "x = {\n y = 1 # comment\n}\n",
        );

        assert_format(
            &tab_width(1),
            "x = {\n y = 1 \n # comment y\n\n\n\n\n\n}",
            "x = {\n y = 1\n # comment y\n}\n",
        );
    }

    #[test]
    fn test_wraparound_with_comments() {
        let options = FormatOptions { tab_width: 1, bracket_wraparound: 5, ..Default::default() };

        assert_format(
            &options,
            "x = {\n # comment\n 1 2 3 # comment\n 4 5 6 7 8 9 10 11 12 13 14 15 # comment\n # comment\n}",
            "x = {\n # comment\n 1 2 3 # comment\n 4 5 6 7 8\n 9 10 11 12 13\n 14 15 # comment\n # comment\n}\n",
        );

        assert_format(
            &options,
            "x = {\n 1 2 3 # comment\n 4 5 6 7 8 9 10 11 12 13 14 15 # comment 2\n                \n}",
            "x = {\n 1 2 3 # comment\n 4 5 6 7 8\n 9 10 11 12 13\n 14 15 # comment 2\n}\n",
        );

        assert_format(
            &options,
            "x = { y = {\n 1 2 3 # comment\n 4 5 6 7 8 9 10 11 12 13 14 15 # comment 2\n                \n}}",
            "x = {\n y = {\n  1 2 3 # comment\n  4 5 6 7 8\n  9 10 11 12 13\n  14 15 # comment 2\n }\n}\n",
        );
    }

    #[test]
    fn test_top_level_comments() {
        assert_format(&FormatOptions::default(), "#comment\n{}", "#comment\n{}\n");
        assert_format(&FormatOptions::default(), "{#}\n}", "{ #}\n}\n");
        assert_format(&FormatOptions::default(), "#    comment\nx = y", "#    comment\nx = y\n");
        assert_format(&FormatOptions::default(), "x = y # comment", "x = y # comment\n");
    }

    #[test]
    fn test_extraneous_newlines() {
        let options = FormatOptions::default();

        assert_format(&options, "\n\n\n\n\n\n\n\n", "\n");
        assert_format(&options, "x = y\n\n\n\n\n\n", "x = y\n");
        assert_format(&options, "\n\n\n\n\n\nx = y", "x = y\n");
        assert_format(&options, "{}\n\n\n\n\n\n", "{}\n");
        assert_format(&options, "\n\n\n\n\n\n{}", "{}\n");
        assert_format(&options, "x = {}\n\n\n\n\n\n", "x = {}\n");
        assert_format(&options, "\n\n\n\n\n\nx = {}", "x = {}\n");
    }

    #[test]
    fn test_empty_input() {
        assert_format(&FormatOptions::default(), "", "\n");
    }

    #[test]
    fn test_multiple_comments() {
        assert_format(
            &FormatOptions::default(),
            "# comment 1\n#    comment 2\n\n#  comment 3\nx = y # comment 4\n# comment 5",
            "# comment 1\n#    comment 2\n\n#  comment 3\nx = y # comment 4\n# comment 5\n",
        );

        assert_format(
            &FormatOptions::default(),
            "\n                x = y\n                #comment\n                x2 = y2\n                                # comment1\n#  comment 2\n    x3 = y3#comment 3\n                # comment 4\n",
            "x = y\n#comment\nx2 = y2\n# comment1\n#  comment 2\nx3 = y3 #comment 3\n# comment 4\n",
        );

        assert_format(
            &FormatOptions::default(),
            "\n                x = y\n                \n                \n                #comment\n                x2 = y2\n                \n                                # comment1\n#  comment 2\n    x3 = y3#comment 3\n    \n                # comment 4\n",
            "x = y\n\n\n#comment\nx2 = y2\n\n# comment1\n#  comment 2\nx3 = y3 #comment 3\n\n# comment 4\n",
        );
    }

    #[test]
    fn test_empty_braces() {
        assert_format(
            &FormatOptions { single_line_block: false, ..Default::default() },
            "{}",
            "{\n}\n",
        );

        assert_format(
            &FormatOptions { single_line_block: false, ..Default::default() },
            "{#comment\n}",
            "{ #comment\n}\n",
        );

        assert_format(&FormatOptions::default(), "{}", "{}\n");
        assert_format(&FormatOptions::default(), "{\n\n\n}", "{}\n");
        assert_format(&FormatOptions::default(), "{# comment\n\n}", "{ # comment\n\n}\n");
        assert_format(&FormatOptions::default(), "{\n# comment\n\n}", "{\n    # comment\n\n}\n");
    }

    #[test]
    fn test_comment_indentation() {
        assert_format(
            &FormatOptions::default(),
            "level1 = {\n#comment1\nlevel2 = {\n#comment2\nlevel3 = { #comment3\n#comment4\n}\n#comment5\n}\n}",
            "level1 = {\n    #comment1\n    level2 = {\n        #comment2\n        level3 = { #comment3\n            #comment4\n        }\n        #comment5\n    }\n}\n",
        );

        assert_format(
            &FormatOptions::default(),
            "type = {\n                x = y\n                #comment\n                x2 = y2\n                                # comment1\n#  comment 2\n    x3 = y3#comment 3\n                # comment 4\n}",
            "type = {\n    x = y\n    #comment\n    x2 = y2\n    # comment1\n    #  comment 2\n    x3 = y3 #comment 3\n    # comment 4\n}\n",
        );

        assert_format(
            &FormatOptions::default(),
            "type = {\n    # {{{{{}}}}}\n    # { 1 2 3 4 5 6 }\n    # ### }}}}\n}",
            "type = {\n    # {{{{{}}}}}\n    # { 1 2 3 4 5 6 }\n    # ### }}}}\n}\n",
        );
    }

    #[test]
    fn test_use_tab_indentation() {
        assert_format(
            &FormatOptions { use_tab: true, single_line_block: false, ..Default::default() },
            "a = { b = c }",
            "a = {\n\tb = c\n}\n",
        );
    }

    #[test]
    fn test_crlf_input() {
        assert_format(
            &tab_width(2),
            "a = {\r\nb = c\r\nd = e\r\n}\r\n",
            "a = {\n  b = c\n  d = e\n}\n",
        );
    }

    #[test]
    fn test_comment_trailing_whitespace_trimmed() {
        assert_format(
            &FormatOptions::default(),
            "x = y # comment   \t\n",
            "x = y # comment\n",
        );
    }

    #[test]
    fn test_needs_format() {
        let options = FormatOptions::default();

        assert!(!needs_format("x = { x2 = y2 }\n", &options).unwrap());
        assert!(needs_format("x = {\nx2=y2\n}", &options).unwrap());
    }

    #[test]
    fn test_malformed_input_is_an_error() {
        assert!(format("x = {", &FormatOptions::default()).is_err());
        assert!(format("} x", &FormatOptions::default()).is_err());
    }
}
