//! Recursive-descent parser producing the flat command stream.
//!
//! The parser works the way the command stream is shaped: it emits
//! commands into one output vector, and a compound form (comprehension,
//! indexer, function call) first `mark`s the current length, parses its
//! inner expression, then `close`s — detaching everything emitted since
//! the mark into a child closure of the compound command.
//!
//! Binary operators bind the way the grammar in the reference manual
//! reads: the right operand of every infix and prefix operator is the
//! whole remaining atom, so chains lean right. The two uses of `~` are
//! split by the operand: a string literal on the right is a regex match
//! (low precedence), anything else is the `a~b → index(a, b)` sugar
//! (tight, chainable like `a[b]`).

use crate::{
    command::{Closure, Command, Lit, Op},
    error::{Error, RunResult},
    intern,
    lexer::Scanner,
};

/// Parses a single expression into a command stream.
pub fn parse(src: &str) -> RunResult<Vec<Command>> {
    let mut p = Parser {
        s: Scanner::new(src),
        out: Vec::new(),
        marks: Vec::new(),
    };
    p.expr()?;
    if !p.s.at_end() {
        return Err(Error::syntax(format!(
            "unparsed input: \"{}\"",
            p.s.rest_display()
        )));
    }
    if !p.marks.is_empty() {
        return Err(Error::sanity("unbalanced closure marks after parsing"));
    }
    Ok(p.out)
}

struct Parser<'a> {
    s: Scanner<'a>,
    out: Vec<Command>,
    marks: Vec<usize>,
}

impl Parser<'_> {
    fn mark(&mut self) {
        self.marks.push(self.out.len());
    }

    /// Detaches the commands emitted since the last mark into a closure
    /// of `cmd`, then emits `cmd`.
    fn close_into(&mut self, mut cmd: Command) -> RunResult<()> {
        let m = self
            .marks
            .pop()
            .ok_or_else(|| Error::sanity("close without a mark"))?;
        let code = self.out.split_off(m);
        cmd.closures.push(Closure::new(code));
        self.out.push(cmd);
        Ok(())
    }

    /// Detaches the commands emitted since the last mark into a further
    /// closure of the most recent command (source arms, value arms).
    fn close_append(&mut self) -> RunResult<()> {
        let m = self
            .marks
            .pop()
            .ok_or_else(|| Error::sanity("close without a mark"))?;
        let code = self.out.split_off(m);
        let last = self
            .out
            .last_mut()
            .ok_or_else(|| Error::sanity("closure with no owner"))?;
        last.closures.push(Closure::new(code));
        Ok(())
    }

    fn expect(&mut self, c: u8) -> RunResult<()> {
        if self.s.eat(c) {
            Ok(())
        } else {
            Err(Error::syntax(format!(
                "expected '{}' at: \"{}\"",
                c as char,
                self.s.rest_display()
            )))
        }
    }

    fn expect_seq(&mut self, token: &[u8]) -> RunResult<()> {
        if self.s.eat_seq(token) {
            Ok(())
        } else {
            Err(Error::syntax(format!(
                "expected '{}' at: \"{}\"",
                String::from_utf8_lossy(token),
                self.s.rest_display()
            )))
        }
    }

    /// expr ::= assign ((',' | ';') assign)*
    fn expr(&mut self) -> RunResult<()> {
        self.assign()?;
        while self.s.eat(b',') || self.s.eat(b';') {
            self.assign()?;
        }
        Ok(())
    }

    /// assign ::= name '=' atom | atom
    fn assign(&mut self) -> RunResult<()> {
        let save = self.s.pos();
        if let Some(name) = self.s.scan_name() {
            if name != "@" && name != "$" && self.s.eat(b'=') {
                let sym = intern::intern_str(name);
                self.atom()?;
                self.out.push(Command::with_lit(Op::Vaw, Lit::Name(sym)));
                return Ok(());
            }
        }
        self.s.set_pos(save);
        self.atom()
    }

    /// atom ::= bit ('~' string)?   — the regex-match suffix
    fn atom(&mut self) -> RunResult<()> {
        self.bit()?;
        if self.s.peek_seq(b"~") {
            let save = self.s.pos();
            self.s.eat(b'~');
            if let Some(pat) = self.s.scan_string() {
                self.out.push(Command::with_lit(Op::Regex, Lit::Str(pat?)));
            } else {
                // not the regex form; leave it for the index sugar
                self.s.set_pos(save);
            }
        }
        Ok(())
    }

    /// bit ::= add (('&' | '|' | '^') atom)?
    fn bit(&mut self) -> RunResult<()> {
        self.add()?;
        if self.s.eat(b'&') {
            self.atom()?;
            self.out.push(Command::new(Op::And));
        } else if self.s.eat(b'|') {
            self.atom()?;
            self.out.push(Command::new(Op::Or));
        } else if self.s.eat(b'^') {
            self.atom()?;
            self.out.push(Command::new(Op::Xor));
        }
        Ok(())
    }

    /// add ::= mul (('+' | '-') atom)?
    fn add(&mut self) -> RunResult<()> {
        self.mul()?;
        if self.s.eat(b'+') {
            self.atom()?;
            self.out.push(Command::new(Op::Add));
        } else if self.s.peek_seq(b"-") && !self.s.peek_seq(b"->") {
            self.s.eat(b'-');
            self.atom()?;
            self.out.push(Command::new(Op::Sub));
        }
        Ok(())
    }

    /// mul ::= exp (('*' | '/' | '%') atom)?
    fn mul(&mut self) -> RunResult<()> {
        self.exp()?;
        if self.s.eat(b'*') {
            self.atom()?;
            self.out.push(Command::new(Op::Mul));
        } else if self.s.eat(b'/') {
            self.atom()?;
            self.out.push(Command::new(Op::Div));
        } else if self.s.eat(b'%') {
            self.atom()?;
            self.out.push(Command::new(Op::Mod));
        }
        Ok(())
    }

    /// exp ::= neg ('**' atom)?
    fn exp(&mut self) -> RunResult<()> {
        self.neg()?;
        if self.s.eat_seq(b"**") {
            self.atom()?;
            self.out.push(Command::new(Op::Exp));
        }
        Ok(())
    }

    /// neg ::= '!' atom | '~' atom | ':' atom | '?' atom | idx
    fn neg(&mut self) -> RunResult<()> {
        if self.s.eat(b'!') {
            self.atom()?;
            self.out.push(Command::new(Op::Not));
        } else if self.s.eat(b'~') {
            self.atom()?;
            self.out.push(Command::new(Op::Neg));
        } else if self.s.eat(b':') {
            // :a is flatten(a)
            self.mark();
            self.atom()?;
            self.close_into(fun_command("flatten"))?;
        } else if self.s.eat(b'?') {
            // ?a is filter(a)
            self.mark();
            self.atom()?;
            self.close_into(fun_command("filter"))?;
        } else {
            self.idx()?;
        }
        Ok(())
    }

    /// idx ::= bottom ('[' expr ']' | '~' bottom)*
    fn idx(&mut self) -> RunResult<()> {
        self.bottom()?;
        loop {
            if self.s.peek_is(b'[') && !self.s.peek_seq(b"[.") {
                self.s.eat(b'[');
                self.mark();
                self.expr()?;
                self.expect(b']')?;
                self.close_into(Command::new(Op::Idx))?;
            } else if self.s.peek_seq(b"~") {
                let save = self.s.pos();
                self.s.eat(b'~');
                if self.s.peek_string() {
                    // regex form, handled at the atom level
                    self.s.set_pos(save);
                    return Ok(());
                }
                self.mark();
                self.bottom()?;
                self.close_into(Command::new(Op::Idx))?;
            } else {
                return Ok(());
            }
        }
    }

    /// bottom ::= literal | funcall | var | '[' … ']' | '[.' … '.]'
    ///          | '{' … '}' | '<<' … '>>' | '(' atom ')'
    fn bottom(&mut self) -> RunResult<()> {
        if self.s.eat(b'(') {
            self.atom()?;
            return self.expect(b')');
        }
        if self.s.eat_seq(b"[.") {
            // [. body .] is iarray([ body ])
            self.mark();
            self.comprehension(b".]")?;
            return self.close_into(fun_command("iarray"));
        }
        if self.s.eat(b'[') {
            return self.comprehension(b"]");
        }
        if self.s.eat(b'{') {
            return self.map_literal();
        }
        if self.s.eat_seq(b"<<") {
            return self.accumulator();
        }
        if let Some(lit) = self.s.scan_number() {
            self.out.push(Command::with_lit(Op::Val, lit?));
            return Ok(());
        }
        if let Some(text) = self.s.scan_string() {
            self.out.push(Command::with_lit(Op::Val, Lit::Str(text?)));
            return Ok(());
        }
        if let Some(name) = self.s.scan_name() {
            return self.name_form(name);
        }
        Err(Error::syntax(format!(
            "expected an expression at: \"{}\"",
            self.s.rest_display()
        )))
    }

    /// A sequence literal body and optional source; the opening bracket
    /// is already consumed.
    fn comprehension(&mut self, closer: &[u8]) -> RunResult<()> {
        self.mark();
        let try_elems = self.s.scan_keyword("try");
        self.expr()?;
        let mut cmd = Command::new(Op::Arr);
        cmd.try_elems = try_elems;
        self.close_into(cmd)?;
        if self.s.eat(b':') {
            self.mark();
            self.expr()?;
            self.close_append()?;
        }
        self.expect_seq(closer)
    }

    /// map ::= '{' key ('->' val)? (':' source)? '}' — a missing value
    /// arm defaults to `UInt` 1 (the counting idiom).
    fn map_literal(&mut self) -> RunResult<()> {
        self.mark();
        let try_elems = self.s.scan_keyword("try");
        self.expr()?;
        let mut cmd = Command::new(Op::Map);
        cmd.try_elems = try_elems;
        self.close_into(cmd)?;
        if self.s.eat_seq(b"->") {
            self.mark();
            self.expr()?;
            self.close_append()?;
        } else {
            let one = Command::with_lit(Op::Val, Lit::UInt(1));
            if let Some(last) = self.out.last_mut() {
                last.closures.push(Closure::new(vec![one]));
            }
        }
        if self.s.eat(b':') {
            self.mark();
            self.expr()?;
            self.close_append()?;
        }
        self.expect(b'}')
    }

    /// The recursive accumulator `<< body : init (, source)? >>`; `<<`
    /// is already consumed. The body sees `@` as (accumulator, element).
    fn accumulator(&mut self) -> RunResult<()> {
        self.mark();
        let try_elems = self.s.scan_keyword("try");
        self.expr()?;
        let mut cmd = Command::new(Op::Rec);
        cmd.try_elems = try_elems;
        self.close_into(cmd)?;
        self.expect(b':')?;
        self.mark();
        self.assign()?;
        self.close_append()?;
        if self.s.eat(b',') {
            self.mark();
            self.assign()?;
            self.close_append()?;
        }
        self.expect_seq(b">>")
    }

    /// A name: function call `f(…)`, call sugar `f.x`, or a variable
    /// read. `$` is the same variable as `@`.
    fn name_form(&mut self, name: &str) -> RunResult<()> {
        let name = if name == "$" { "@" } else { name };
        if name != "@" {
            if self.s.eat(b'(') {
                self.mark();
                if !self.s.peek_is(b')') {
                    self.expr()?;
                }
                self.expect(b')')?;
                return self.close_into(fun_command(name));
            }
            let save = self.s.pos();
            if self.s.eat(b'.') {
                if self.s.peek_is(b']') {
                    // the '.]' closer of an iarray literal, not call sugar
                    self.s.set_pos(save);
                } else {
                    self.mark();
                    self.atom()?;
                    return self.close_into(fun_command(name));
                }
            }
        }
        self.out
            .push(Command::with_lit(Op::Var, Lit::Name(intern::intern_str(name))));
        Ok(())
    }
}

fn fun_command(name: &str) -> Command {
    Command::with_lit(Op::Fun, Lit::Name(intern::intern_str(name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(code: &[Command]) -> Vec<Op> {
        code.iter().map(|c| c.op).collect()
    }

    #[test]
    fn literal_and_operator_stream() {
        let code = parse("1 + 2").unwrap();
        assert_eq!(ops(&code), vec![Op::Val, Op::Val, Op::Add]);
    }

    #[test]
    fn operators_lean_right() {
        // the right operand of '+' is the whole remaining atom
        let code = parse("1 - 2 + 3").unwrap();
        assert_eq!(ops(&code), vec![Op::Val, Op::Val, Op::Val, Op::Add, Op::Sub]);
    }

    #[test]
    fn funcall_detaches_arguments() {
        let code = parse("grep(@, \"[0-9]+\")").unwrap();
        assert_eq!(ops(&code), vec![Op::Fun]);
        assert_eq!(code[0].closures.len(), 1);
        assert_eq!(
            ops(&code[0].closures[0].code),
            vec![Op::Var, Op::Val]
        );
    }

    #[test]
    fn call_sugar() {
        let code = parse("sum.1").unwrap();
        assert_eq!(ops(&code), vec![Op::Fun]);
        assert_eq!(ops(&code[0].closures[0].code), vec![Op::Val]);
    }

    #[test]
    fn empty_argument_list() {
        let code = parse("count()").unwrap();
        assert_eq!(ops(&code), vec![Op::Fun]);
        assert!(code[0].closures[0].code.is_empty());
    }

    #[test]
    fn regex_suffix_takes_a_string_literal() {
        let code = parse("@ ~ \"[a-z]+\"").unwrap();
        assert_eq!(ops(&code), vec![Op::Var, Op::Regex]);
        assert_eq!(code[1].lit, Lit::Str(b"[a-z]+".to_vec()));
    }

    #[test]
    fn tilde_index_sugar_is_tight() {
        // @~0 + @~1 must parse as index(@,0) + index(@,1)
        let code = parse("@~0 + @~1").unwrap();
        assert_eq!(ops(&code), vec![Op::Var, Op::Idx, Op::Var, Op::Idx, Op::Add]);
    }

    #[test]
    fn bracket_index() {
        let code = parse("x[0]").unwrap();
        assert_eq!(ops(&code), vec![Op::Var, Op::Idx]);
        assert_eq!(ops(&code[1].closures[0].code), vec![Op::Val]);
    }

    #[test]
    fn seq_literal_with_source() {
        let code = parse("[ @ : lines ]").unwrap();
        assert_eq!(ops(&code), vec![Op::Arr]);
        assert_eq!(code[0].closures.len(), 2);
    }

    #[test]
    fn map_defaults_the_value_arm() {
        let code = parse("{ @ }").unwrap();
        assert_eq!(ops(&code), vec![Op::Map]);
        assert_eq!(code[0].closures.len(), 2);
        assert_eq!(code[0].closures[1].code[0].lit, Lit::UInt(1));
    }

    #[test]
    fn map_with_value_and_source() {
        let code = parse("{ @ -> sum.1 : words }").unwrap();
        assert_eq!(ops(&code), vec![Op::Map]);
        assert_eq!(code[0].closures.len(), 3);
        assert_eq!(ops(&code[0].closures[1].code), vec![Op::Fun]);
    }

    #[test]
    fn flatten_and_filter_sugar() {
        let code = parse(":x").unwrap();
        assert_eq!(ops(&code), vec![Op::Fun]);
        let code = parse("?x").unwrap();
        assert_eq!(ops(&code), vec![Op::Fun]);
    }

    #[test]
    fn accumulator_form() {
        let code = parse("<< first(@) + second(@) : 0u, nums >>").unwrap();
        assert_eq!(ops(&code), vec![Op::Rec]);
        assert_eq!(code[0].closures.len(), 3);
    }

    #[test]
    fn iarray_wraps_the_comprehension() {
        let code = parse("[. @ .]").unwrap();
        assert_eq!(ops(&code), vec![Op::Fun]);
        assert_eq!(ops(&code[0].closures[0].code), vec![Op::Arr]);
    }

    #[test]
    fn try_keyword_marks_the_comprehension() {
        let code = parse("[ try int(@) ]").unwrap();
        assert!(code[0].try_elems);
        let code = parse("{ try @ }").unwrap();
        assert!(code[0].try_elems);
    }

    #[test]
    fn assignment_emits_vaw() {
        let code = parse("x = 5, x + 1").unwrap();
        assert_eq!(ops(&code), vec![Op::Val, Op::Vaw, Op::Var, Op::Val, Op::Add]);
    }

    #[test]
    fn unparsed_remainder_is_reported() {
        let err = parse("1 + 2 )").unwrap_err();
        assert!(err.to_string().contains("unparsed input"));
        assert!(err.to_string().contains(")"));
    }

    #[test]
    fn unterminated_forms_fail() {
        assert!(parse("[ @ ").is_err());
        assert!(parse("{ @ ").is_err());
        assert!(parse("\"abc").is_err());
        assert!(parse("f(1,").is_err());
    }
}
