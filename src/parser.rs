use crate::ast::*;
use crate::error::{Pos, SyntaxError};
use crate::lexer::{Token, TokenKind};
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyntaxErrorKind {
    #[error("expected {expected}, found {found}")]
    Expected { expected: String, found: String },
    #[error("unexpected {0}")]
    UnexpectedToken(String),
    #[error("program must start with 'Wake', found {0}")]
    MissingProgramStart(String),
    #[error("program must end with 'Sleep', found {0}")]
    MissingProgramEnd(String),
    #[error("unexpected {0} after 'Sleep'")]
    TrailingInput(String),
    #[error("unexpected end of input, expected {0}")]
    UnexpectedEof(String),
}

impl SyntaxErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            SyntaxErrorKind::Expected { .. } => "expected-token",
            SyntaxErrorKind::UnexpectedToken(_) => "unexpected-token",
            SyntaxErrorKind::MissingProgramStart(_) => "missing-program-start",
            SyntaxErrorKind::MissingProgramEnd(_) => "missing-program-end",
            SyntaxErrorKind::TrailingInput(_) => "trailing-input",
            SyntaxErrorKind::UnexpectedEof(_) => "unexpected-eof",
        }
    }
}

/// How a parse method failed. Statement lists recover from `Recoverable`
/// by resynchronizing; `Fatal` unwinds the whole parse.
#[derive(Debug)]
enum Failure {
    Recoverable(SyntaxError),
    Fatal(SyntaxError),
}

impl Failure {
    fn into_error(self) -> SyntaxError {
        match self {
            Failure::Recoverable(e) | Failure::Fatal(e) => e,
        }
    }
}

type PResult<T> = Result<T, Failure>;

/// Parses a token stream into a program, reporting every syntax error found.
pub fn parse(tokens: Vec<Token>) -> Result<Program, Vec<SyntaxError>> {
    Parser::new(tokens).parse_program()
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof) {
            let pos = tokens.last().map(|t| t.pos).unwrap_or(Pos::new(1, 1));
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                pos,
            });
        }
        Parser {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    // The stream always ends in Eof and `advance` never moves past it.
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, expected: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(expected)
    }

    fn unexpected(&self, expected: &str) -> Failure {
        let token = self.peek();
        if token.kind == TokenKind::Eof {
            return Failure::Fatal(SyntaxError {
                kind: SyntaxErrorKind::UnexpectedEof(expected.to_string()),
                pos: token.pos,
            });
        }
        Failure::Recoverable(SyntaxError {
            kind: SyntaxErrorKind::Expected {
                expected: expected.to_string(),
                found: token.kind.to_string(),
            },
            pos: token.pos,
        })
    }

    fn expect(&mut self, expected: TokenKind, what: &str) -> PResult<Token> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> PResult<(String, Pos)> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                let token = self.advance();
                Ok((name, token.pos))
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn record(&mut self, kind: SyntaxErrorKind, pos: Pos) {
        trace!(%kind, %pos, "syntax error recorded");
        self.errors.push(SyntaxError { kind, pos });
    }

    /// Discards tokens until one that can start a statement or close a block.
    fn synchronize(&mut self) {
        while !self.peek().kind.is_sync_point() {
            let skipped = self.advance();
            trace!(token = %skipped.kind, "skipping during recovery");
        }
    }

    pub fn parse_program(&mut self) -> Result<Program, Vec<SyntaxError>> {
        match self.program() {
            Err(fatal) => {
                self.errors.push(fatal.into_error());
                debug!(errors = self.errors.len(), "parsing aborted");
                Err(std::mem::take(&mut self.errors))
            }
            Ok(program) => {
                debug!(errors = self.errors.len(), "parsing finished");
                if self.errors.is_empty() {
                    Ok(program)
                } else {
                    Err(std::mem::take(&mut self.errors))
                }
            }
        }
    }

    /// Parses a single expression rather than a whole program.
    #[cfg(test)]
    fn parse_expression(&mut self) -> Result<Expr, SyntaxError> {
        self.expression().map_err(Failure::into_error)
    }

    fn program(&mut self) -> PResult<Program> {
        let start = self.peek().pos;
        if self.check(&TokenKind::Wake) {
            self.advance();
        } else {
            let found = self.peek().kind.to_string();
            self.record(SyntaxErrorKind::MissingProgramStart(found), start);
        }

        let mut body = Vec::new();
        loop {
            body.extend(self.statement_list()?);
            if self.check(&TokenKind::RBrace) {
                let stray = self.advance();
                self.record(SyntaxErrorKind::UnexpectedToken(stray.kind.to_string()), stray.pos);
                continue;
            }
            break;
        }

        if self.check(&TokenKind::Sleep) {
            self.advance();
            if !self.check(&TokenKind::Eof) {
                let extra = self.peek().clone();
                self.record(SyntaxErrorKind::TrailingInput(extra.kind.to_string()), extra.pos);
            }
        } else {
            let token = self.peek().clone();
            self.record(SyntaxErrorKind::MissingProgramEnd(token.kind.to_string()), token.pos);
        }

        Ok(Program { body, pos: start })
    }

    fn statement_list(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !(self.check(&TokenKind::Sleep)
            || self.check(&TokenKind::RBrace)
            || self.check(&TokenKind::Eof))
        {
            match self.statement() {
                Ok(stmt) => stmts.push(stmt),
                Err(Failure::Recoverable(e)) => {
                    self.record(e.kind, e.pos);
                    self.synchronize();
                }
                Err(fatal) => return Err(fatal),
            }
        }
        Ok(stmts)
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let body = self.statement_list()?;
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(body)
    }

    fn statement(&mut self) -> PResult<Stmt> {
        match self.peek().kind {
            TokenKind::Box => self.var_declaration(),
            TokenKind::Hunt => self.function_def(),
            TokenKind::Purr => self.if_statement(),
            TokenKind::Chase => self.while_loop(),
            TokenKind::Bring => self.return_statement(),
            TokenKind::Meow => self.print_statement(),
            TokenKind::Identifier(_) => self.identifier_statement(),
            _ => Err(self.unexpected("a statement")),
        }
    }

    fn var_declaration(&mut self) -> PResult<Stmt> {
        let pos = self.advance().pos;
        let (name, _) = self.expect_identifier("variable name")?;
        self.expect(TokenKind::Paws, "'paws'")?;
        let value = self.expression()?;
        Ok(Stmt::new(StmtKind::VarDecl(name, value), pos))
    }

    // Left-factored: the identifier is consumed first and the next token
    // decides between assignment and call.
    fn identifier_statement(&mut self) -> PResult<Stmt> {
        let (name, pos) = self.expect_identifier("identifier")?;

        if self.check(&TokenKind::Paws) {
            self.advance();
            let value = self.expression()?;
            return Ok(Stmt::new(StmtKind::Assign(name, value), pos));
        }

        if self.check(&TokenKind::LParen) {
            let args = self.call_args()?;
            return Ok(Stmt::new(StmtKind::Call(Call { name, args }), pos));
        }

        Err(self.unexpected("'paws' or '('"))
    }

    fn function_def(&mut self) -> PResult<Stmt> {
        let pos = self.advance().pos;
        let (name, _) = self.expect_identifier("function name")?;

        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if matches!(self.peek().kind, TokenKind::Identifier(_)) {
            let (param, param_pos) = self.expect_identifier("parameter name")?;
            params.push(Param { name: param, pos: param_pos });
            while self.check(&TokenKind::Comma) {
                self.advance();
                let (param, param_pos) = self.expect_identifier("parameter name")?;
                params.push(Param { name: param, pos: param_pos });
            }
        }
        self.expect(TokenKind::RParen, "')'")?;

        let body = self.block()?;
        Ok(Stmt::new(StmtKind::FunctionDef(Function { name, params, body }), pos))
    }

    fn if_statement(&mut self) -> PResult<Stmt> {
        let pos = self.advance().pos;
        self.expect(TokenKind::LParen, "'('")?;
        let cond = self.expression()?;
        self.expect(TokenKind::RParen, "')'")?;
        let then_body = self.block()?;
        let else_body = if self.check(&TokenKind::Hiss) {
            self.advance();
            Some(self.block()?)
        } else {
            None
        };
        Ok(Stmt::new(StmtKind::If(cond, then_body, else_body), pos))
    }

    fn while_loop(&mut self) -> PResult<Stmt> {
        let pos = self.advance().pos;
        self.expect(TokenKind::LParen, "'('")?;
        let cond = self.expression()?;
        self.expect(TokenKind::RParen, "')'")?;
        let body = self.block()?;
        Ok(Stmt::new(StmtKind::While(cond, body), pos))
    }

    fn return_statement(&mut self) -> PResult<Stmt> {
        let pos = self.advance().pos;
        let value = self.expression()?;
        Ok(Stmt::new(StmtKind::Return(value), pos))
    }

    fn print_statement(&mut self) -> PResult<Stmt> {
        let pos = self.advance().pos;
        self.expect(TokenKind::LParen, "'('")?;
        let value = self.expression()?;
        self.expect(TokenKind::RParen, "')'")?;
        Ok(Stmt::new(StmtKind::Print(value), pos))
    }

    fn call_args(&mut self) -> PResult<Vec<Expr>> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            args.push(self.expression()?);
            while self.check(&TokenKind::Comma) {
                self.advance();
                args.push(self.expression()?);
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(args)
    }

    fn expression(&mut self) -> PResult<Expr> {
        self.parse_or()
    }

    fn binary(left: Expr, op: BinOp, right: Expr, pos: Pos) -> Expr {
        Expr::new(ExprKind::BinOp(Box::new(left), op, Box::new(right)), pos)
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut left = self.parse_and()?;
        while self.check(&TokenKind::Or) {
            let pos = self.advance().pos;
            let right = self.parse_and()?;
            left = Self::binary(left, BinOp::Or, right, pos);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut left = self.parse_equality()?;
        while self.check(&TokenKind::And) {
            let pos = self.advance().pos;
            let right = self.parse_equality()?;
            left = Self::binary(left, BinOp::And, right, pos);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Equal => BinOp::Eq,
                TokenKind::NotEqual => BinOp::Ne,
                _ => break,
            };
            let pos = self.advance().pos;
            let right = self.parse_comparison()?;
            left = Self::binary(left, op, right, pos);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Less => BinOp::Lt,
                TokenKind::Greater => BinOp::Gt,
                TokenKind::LessEqual => BinOp::Le,
                TokenKind::GreaterEqual => BinOp::Ge,
                _ => break,
            };
            let pos = self.advance().pos;
            let right = self.parse_additive()?;
            left = Self::binary(left, op, right, pos);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let pos = self.advance().pos;
            let right = self.parse_multiplicative()?;
            left = Self::binary(left, op, right, pos);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            let pos = self.advance().pos;
            let right = self.parse_unary()?;
            left = Self::binary(left, op, right, pos);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.parse_primary(),
        };
        let pos = self.advance().pos;
        let operand = self.parse_unary()?;
        Ok(Expr::new(ExprKind::UnaryOp(op, Box::new(operand)), pos))
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let pos = self.peek().pos;
        match self.peek().kind.clone() {
            TokenKind::IntLiteral(n) => {
                self.advance();
                Ok(Expr::new(ExprKind::IntLit(n), pos))
            }
            TokenKind::FloatLiteral(n) => {
                self.advance();
                Ok(Expr::new(ExprKind::FloatLit(n), pos))
            }
            TokenKind::StringLiteral(s) => {
                self.advance();
                Ok(Expr::new(ExprKind::StringLit(s), pos))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    let args = self.call_args()?;
                    Ok(Expr::new(ExprKind::Call(Call { name, args }), pos))
                } else {
                    Ok(Expr::new(ExprKind::Var(name), pos))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_expr(source: &str) -> Expr {
        let tokens = tokenize(source).expect("lexing failed");
        Parser::new(tokens)
            .parse_expression()
            .expect("parse_expression failed")
    }

    fn parse_source(source: &str) -> Result<Program, Vec<SyntaxError>> {
        parse(tokenize(source).expect("lexing failed"))
    }

    fn int(n: i64) -> ExprKind {
        ExprKind::IntLit(n)
    }

    // Strips positions so tree shapes can be compared directly.
    fn shape(expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::IntLit(n) => n.to_string(),
            ExprKind::FloatLit(n) => format!("{:?}", n),
            ExprKind::StringLit(s) => format!("{:?}", s),
            ExprKind::Var(name) => name.clone(),
            ExprKind::BinOp(l, op, r) => format!("({} {} {})", shape(l), op, shape(r)),
            ExprKind::UnaryOp(op, e) => format!("({}{})", op, shape(e)),
            ExprKind::Call(call) => {
                let args: Vec<String> = call.args.iter().map(shape).collect();
                format!("{}({})", call.name, args.join(", "))
            }
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse_expr("5 + 3 * 2");
        match &expr.kind {
            ExprKind::BinOp(left, BinOp::Add, right) => {
                assert_eq!(left.kind, int(5));
                match &right.kind {
                    ExprKind::BinOp(l, BinOp::Mul, r) => {
                        assert_eq!(l.kind, int(3));
                        assert_eq!(r.kind, int(2));
                    }
                    other => panic!("expected multiplication, got {:?}", other),
                }
            }
            other => panic!("expected addition at the root, got {:?}", other),
        }
    }

    #[test]
    fn subtraction_is_left_associative() {
        assert_eq!(shape(&parse_expr("10 - 3 - 2")), "((10 - 3) - 2)");
        assert_eq!(shape(&parse_expr("8 / 4 / 2 % 3")), "(((8 / 4) / 2) % 3)");
    }

    #[test]
    fn precedence_ladder() {
        assert_eq!(
            shape(&parse_expr("a || b && c == d < e + f * g")),
            "(a || (b && (c == (d < (e + (f * g))))))"
        );
        assert_eq!(shape(&parse_expr("(1 + 2) * 3")), "((1 + 2) * 3)");
    }

    #[test]
    fn unary_is_right_associative() {
        assert_eq!(shape(&parse_expr("- - x")), "(-(-x))");
        assert_eq!(shape(&parse_expr("!-x + 1")), "((!(-x)) + 1)");
    }

    #[test]
    fn calls_in_expressions() {
        assert_eq!(shape(&parse_expr("add(1, x * 2) + f()")), "(add(1, (x * 2)) + f())");
    }

    #[test]
    fn operator_nodes_carry_operator_position() {
        let expr = parse_expr("x +\n  y");
        assert_eq!(expr.pos, Pos::new(1, 3));
    }

    #[test]
    fn program_with_every_statement() {
        let source = r#"
Wake
Hunt add(a, b) {
    Bring a + b
}
Box x paws add(1, 2)
x paws x + 1
greet("Fluffy")
Purr (x < 5) {
    Meow("small")
} Hiss {
    Meow("large")
}
Chase (x > 0) {
    x paws x - 1
}
Sleep
"#;
        let program = parse_source(source).expect("program should parse");
        assert_eq!(program.body.len(), 6);

        match &program.body[0].kind {
            StmtKind::FunctionDef(func) => {
                assert_eq!(func.name, "add");
                let params: Vec<&str> = func.params.iter().map(|p| p.name.as_str()).collect();
                assert_eq!(params, vec!["a", "b"]);
                assert!(matches!(func.body[0].kind, StmtKind::Return(_)));
            }
            other => panic!("expected function, got {:?}", other),
        }
        assert!(matches!(&program.body[1].kind, StmtKind::VarDecl(name, _) if name == "x"));
        assert!(matches!(&program.body[2].kind, StmtKind::Assign(name, _) if name == "x"));
        assert!(matches!(&program.body[3].kind, StmtKind::Call(call) if call.name == "greet" && call.args.len() == 1));
        match &program.body[4].kind {
            StmtKind::If(_, then_body, Some(else_body)) => {
                assert_eq!(then_body.len(), 1);
                assert_eq!(else_body.len(), 1);
            }
            other => panic!("expected if/else, got {:?}", other),
        }
        assert!(matches!(&program.body[5].kind, StmtKind::While(_, body) if body.len() == 1));
        assert_eq!(program.body[1].pos, Pos::new(6, 1));
    }

    #[test]
    fn if_without_else() {
        let program = parse_source("Wake Purr (1) { Meow(1) } Meow(2) Sleep").unwrap();
        assert_eq!(program.body.len(), 2);
        assert!(matches!(&program.body[0].kind, StmtKind::If(_, _, None)));
    }

    #[test]
    fn empty_parameter_and_argument_lists() {
        let program = parse_source("Wake Hunt f() { Bring 1 } f() Sleep").unwrap();
        assert!(matches!(&program.body[0].kind, StmtKind::FunctionDef(func) if func.params.is_empty()));
        assert!(matches!(&program.body[1].kind, StmtKind::Call(call) if call.args.is_empty()));
    }

    #[test]
    fn missing_sleep_is_reported() {
        let errors = parse_source("Wake Box x paws 10").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].kind, SyntaxErrorKind::MissingProgramEnd(_)));
    }

    #[test]
    fn missing_wake_is_reported() {
        let errors = parse_source("Box x paws 10 Sleep").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].kind, SyntaxErrorKind::MissingProgramStart(_)));
        assert_eq!(errors[0].pos, Pos::new(1, 1));
    }

    #[test]
    fn input_after_sleep_is_reported() {
        let errors = parse_source("Wake Sleep Meow(1)").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].kind, SyntaxErrorKind::TrailingInput(_)));
    }

    #[test]
    fn recovers_and_reports_several_errors() {
        let source = "Wake\nBox paws 1\nMeow(2)\nBox y 3\nSleep";
        let errors = parse_source(source).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].pos, Pos::new(2, 5));
        assert_eq!(
            errors[0].kind,
            SyntaxErrorKind::Expected {
                expected: "variable name".into(),
                found: "'paws'".into()
            }
        );
        assert_eq!(errors[1].pos, Pos::new(4, 7));
        assert_eq!(
            errors[1].kind,
            SyntaxErrorKind::Expected {
                expected: "'paws'".into(),
                found: "integer 3".into()
            }
        );
    }

    #[test]
    fn recovers_inside_blocks() {
        let source = "Wake\nChase (x) {\n  x paws\n  Meow(x)\n  y 1\n}\nSleep";
        let errors = parse_source(source).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].pos, Pos::new(4, 3));
        assert_eq!(errors[1].pos, Pos::new(5, 5));
    }

    #[test]
    fn end_of_input_is_fatal() {
        let errors = parse_source("Wake Box x paws").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].kind, SyntaxErrorKind::UnexpectedEof(_)));
    }

    #[test]
    fn stray_closing_brace_at_top_level() {
        let errors = parse_source("Wake } Meow(1) Sleep").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].kind, SyntaxErrorKind::UnexpectedToken(_)));
        assert_eq!(errors[0].pos, Pos::new(1, 6));
    }
}
