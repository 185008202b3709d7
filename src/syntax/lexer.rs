use crate::diagnostic::Diagnostic;
use crate::lexeme::Lexeme;
use crate::span::{Span, Spanned};

pub(crate) struct Lexer<'src> {
    text: &'src str,
    source: &'src [u8],
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    pub(crate) fn new(source: &'src str) -> Self {
        Self {
            text: source,
            source: source.as_bytes(),
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn tokenize(mut self) -> (Vec<Spanned<Lexeme>>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.node == Lexeme::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn next_token(&mut self) -> Spanned<Lexeme> {
        loop {
            self.skip_whitespace_and_comments();

            if self.pos >= self.source.len() {
                return self.make_token(Lexeme::Eof, self.pos, self.pos);
            }

            let start = self.pos;
            let ch = self.source[self.pos];

            if is_ident_start(ch) {
                return self.scan_ident();
            }

            if ch.is_ascii_digit() || (ch == b'.' && self.digit_at(self.pos + 1)) {
                return self.scan_number();
            }

            if let Some(tok) = self.scan_symbol(start) {
                return tok;
            }
            // scan_symbol returned None → error was recorded, try again
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }

            // `#` comments run to end of line (model files)
            if self.pos < self.source.len() && self.source[self.pos] == b'#' {
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }

            break;
        }
    }

    fn scan_ident(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        while self.pos < self.source.len() && is_ident_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        let text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
        self.make_token(Lexeme::Ident(text), start, self.pos)
    }

    fn digit_at(&self, pos: usize) -> bool {
        self.source.get(pos).is_some_and(u8::is_ascii_digit)
    }

    fn skip_digits(&mut self) {
        while self.digit_at(self.pos) {
            self.pos += 1;
        }
    }

    /// Numeric literal. Floats (`1.5`, `.5`, `1e-3`, `2.5E+2`) are accepted
    /// and truncated toward zero: numeric parameters never affect arity.
    fn scan_number(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        self.skip_digits();
        let mut is_float = false;

        if self.source.get(self.pos) == Some(&b'.') && self.digit_at(self.pos + 1) {
            is_float = true;
            self.pos += 1;
            self.skip_digits();
        }

        // exponent only when digits follow, so `2e` stays `2` then `e`
        if matches!(self.source.get(self.pos), Some(b'e' | b'E')) {
            let sign = usize::from(matches!(self.source.get(self.pos + 1), Some(b'+' | b'-')));
            if self.digit_at(self.pos + 1 + sign) {
                is_float = true;
                self.pos += 1 + sign;
                self.skip_digits();
            }
        }

        let text = &self.text[start..self.pos];
        if is_float {
            // `as` saturates, so huge exponents clamp instead of failing
            let value = text.parse::<f64>().map_or(0, |v| v.trunc() as u64);
            return self.make_token(Lexeme::Integer(value), start, self.pos);
        }
        match text.parse::<u64>() {
            Ok(n) => self.make_token(Lexeme::Integer(n), start, self.pos),
            Err(_) => {
                self.diagnostics.push(
                    Diagnostic::error(
                        format!("integer literal '{}' is too large", text),
                        Span::new(start as u32, self.pos as u32),
                    )
                    .with_help("integer literals must fit in 64 bits".to_string()),
                );
                self.make_token(Lexeme::Integer(0), start, self.pos)
            }
        }
    }

    fn scan_symbol(&mut self, start: usize) -> Option<Spanned<Lexeme>> {
        let ch = self.source[self.pos];
        let next = self.source.get(self.pos + 1).copied();
        self.pos += 1;

        let tok = match ch {
            b'(' => Lexeme::LParen,
            b')' => Lexeme::RParen,
            b',' => Lexeme::Comma,
            b'|' => Lexeme::Pipe,
            b'&' => Lexeme::Amp,
            b'+' => Lexeme::Plus,
            b'-' => Lexeme::Minus,
            b'/' => Lexeme::Slash,
            b'*' => {
                if next == Some(b'*') {
                    self.pos += 1;
                    Lexeme::StarStar
                } else {
                    Lexeme::Star
                }
            }
            _ => {
                let shown = self.text[start..].chars().next().unwrap_or(char::from(ch));
                self.pos = start + shown.len_utf8();
                self.diagnostics.push(
                    Diagnostic::error(
                        format!("unexpected character '{}'", shown.escape_default()),
                        Span::new(start as u32, self.pos as u32),
                    )
                    .with_help(
                        "models combine with '&', '|', '+', '-', '*', '/' or '**'".to_string(),
                    ),
                );
                return None;
            }
        };
        Some(self.make_token(tok, start, self.pos))
    }

    fn make_token(&self, token: Lexeme, start: usize, end: usize) -> Spanned<Lexeme> {
        Spanned::new(token, Span::new(start as u32, end as u32))
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}
