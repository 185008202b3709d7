/// All lexemes of the model expression language.
#[derive(Clone, Debug, PartialEq)]
pub enum Lexeme {
    // Symbols
    LParen,   // (
    RParen,   // )
    Comma,    // ,
    Pipe,     // |
    Amp,      // &
    Plus,     // +
    Minus,    // -
    Star,     // *
    StarStar, // **
    Slash,    // /

    // Literals
    Integer(u64),
    Ident(String),

    // End of input
    Eof,
}

impl Lexeme {
    pub fn description(&self) -> &'static str {
        match self {
            Lexeme::LParen => "'('",
            Lexeme::RParen => "')'",
            Lexeme::Comma => "','",
            Lexeme::Pipe => "'|'",
            Lexeme::Amp => "'&'",
            Lexeme::Plus => "'+'",
            Lexeme::Minus => "'-'",
            Lexeme::Star => "'*'",
            Lexeme::StarStar => "'**'",
            Lexeme::Slash => "'/'",
            Lexeme::Integer(_) => "integer literal",
            Lexeme::Ident(_) => "model name",
            Lexeme::Eof => "end of input",
        }
    }
}
