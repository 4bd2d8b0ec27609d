use crate::span::Span;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn new(token_type: TokenType, lexeme: impl Into<String>, span: Span) -> Self {
        Token {
            token_type,
            lexeme: lexeme.into(),
            span,
        }
    }

    /// Comments and blank-line markers: statements at block level, skipped inside expressions.
    pub fn is_trivia(&self) -> bool {
        matches!(self.token_type, TokenType::Comment | TokenType::EmptyLine)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenType {
    // Punctuation
    LeftParen,    // (
    RightParen,   // )
    LeftBrace,    // {
    RightBrace,   // }
    LeftBracket,  // [
    RightBracket, // ]
    Comma,        // ,
    Dot,          // .
    DotDot,       // ..
    Colon,        // :
    Question,     // ?

    // Operators
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Percent,      // %
    Ampersand,    // &
    Pipe,         // |
    Bang,         // !
    Assign,       // =
    Equal,        // ==
    NotEqual,     // !=
    Greater,      // >
    GreaterEqual, // >=
    Less,         // <
    LessEqual,    // <=

    // Literals
    Identifier,     // variable names, function names
    String(String), // "hello world" or 'hello world', raw
    Number(f64),    // 123, 45.67

    // Keywords
    Use,     // use
    Expose,  // expose
    Pick,    // pick
    As,      // as
    Task,    // task
    Wait,    // wait
    To,      // to
    Run,     // run
    If,      // if
    Else,    // else
    Let,     // let
    Const,   // const, cst
    Fn,      // fn
    Return,  // return
    End,     // end
    For,     // for
    In,      // in
    Range,   // range (reserved)
    Switch,  // switch
    Case,    // case
    Default, // default
    Break,   // break
    NaN,     // NaN
    Nil,     // nil
    True,    // true
    False,   // false

    // Trivia
    Comment,   // # ... or #* ... *#
    EmptyLine, // one or more blank lines

    Eof,
}

impl TokenType {
    pub fn is_keyword(&self) -> bool {
        use TokenType::*;
        matches!(
            self,
            Use | Expose
                | Pick
                | As
                | Task
                | Wait
                | To
                | Run
                | If
                | Else
                | Let
                | Const
                | Fn
                | Return
                | End
                | For
                | In
                | Range
                | Switch
                | Case
                | Default
                | Break
                | NaN
                | Nil
                | True
                | False
        )
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenType::*;
        let text = match self {
            LeftParen => "'('",
            RightParen => "')'",
            LeftBrace => "'{'",
            RightBrace => "'}'",
            LeftBracket => "'['",
            RightBracket => "']'",
            Comma => "','",
            Dot => "'.'",
            DotDot => "'..'",
            Colon => "':'",
            Question => "'?'",
            Plus => "'+'",
            Minus => "'-'",
            Star => "'*'",
            Slash => "'/'",
            Percent => "'%'",
            Ampersand => "'&'",
            Pipe => "'|'",
            Bang => "'!'",
            Assign => "'='",
            Equal => "'=='",
            NotEqual => "'!='",
            Greater => "'>'",
            GreaterEqual => "'>='",
            Less => "'<'",
            LessEqual => "'<='",
            Identifier => "identifier",
            String(_) => "string",
            Number(_) => "number",
            Use => "'use'",
            Expose => "'expose'",
            Pick => "'pick'",
            As => "'as'",
            Task => "'task'",
            Wait => "'wait'",
            To => "'to'",
            Run => "'run'",
            If => "'if'",
            Else => "'else'",
            Let => "'let'",
            Const => "'const'",
            Fn => "'fn'",
            Return => "'return'",
            End => "'end'",
            For => "'for'",
            In => "'in'",
            Range => "'range'",
            Switch => "'switch'",
            Case => "'case'",
            Default => "'default'",
            Break => "'break'",
            NaN => "'NaN'",
            Nil => "'nil'",
            True => "'true'",
            False => "'false'",
            Comment => "comment",
            EmptyLine => "empty line",
            Eof => "end of file",
        };
        write!(f, "{}", text)
    }
}
