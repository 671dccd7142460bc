use crate::ast::{
    ArithOp, CmpOp, Expr, ForNode, ForTarget, IfBranch, IfNode, ListNode, LogicOp, MapElem, Node,
    SetNode, TextNode, UnaryOp, VarNode,
};
use crate::error::{Location, Result, TsumugiError};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind, ADD_PRECEDENCE, CMP_PRECEDENCE, MUL_PRECEDENCE};

/// Recursive-descent parser over the lexer's token stream.
///
/// Keeps a three-token ring buffer so callers can restore up to three
/// consumed tokens; `next_non_space`/`peek_non_space` transparently skip the
/// whitespace tokens the lexer emits inside tags.
pub(crate) struct Parser<'a> {
    lexer: Lexer<'a>,
    source: &'a str,
    filename: &'a str,
    token: [Token; 3],
    peek_count: usize,
}

impl<'a> Parser<'a> {
    pub fn new(lexer: Lexer<'a>, source: &'a str, filename: &'a str) -> Self {
        Self {
            lexer,
            source,
            filename,
            token: [Token::initial(), Token::initial(), Token::initial()],
            peek_count: 0,
        }
    }

    /// Parse the whole template. A failed parse produces no tree.
    pub fn parse(mut self) -> Result<ListNode> {
        let mut root = ListNode::new(self.peek().pos);
        while let Some(node) = self.parse_next_node()? {
            root.push(node);
        }
        Ok(root)
    }

    // -- token plumbing --

    fn next(&mut self) -> Token {
        if self.peek_count > 0 {
            self.peek_count -= 1;
        } else {
            self.token[0] = self.lexer.next_token();
        }
        self.token[self.peek_count].clone()
    }

    /// Back the stream up one token; only valid directly after `next`.
    fn backup(&mut self) {
        self.peek_count += 1;
    }

    /// Back the stream up two tokens. The zeroth token is already in place.
    fn backup2(&mut self, t1: Token) {
        self.token[1] = t1;
        self.peek_count = 2;
    }

    /// Back the stream up three tokens. The zeroth token is already in place.
    fn backup3(&mut self, t2: Token, t1: Token) {
        self.token[1] = t1;
        self.token[2] = t2;
        self.peek_count = 3;
    }

    fn peek(&mut self) -> Token {
        if self.peek_count > 0 {
            return self.token[self.peek_count - 1].clone();
        }
        self.peek_count = 1;
        self.token[0] = self.lexer.next_token();
        self.token[0].clone()
    }

    fn next_non_space(&mut self) -> Token {
        loop {
            let token = self.next();
            if token.kind != TokenKind::Whitespace {
                return token;
            }
        }
    }

    fn peek_non_space(&mut self) -> Token {
        loop {
            let token = self.next();
            if token.kind != TokenKind::Whitespace {
                self.backup();
                return token;
            }
        }
    }

    /// Consume and return the next non-space token if it has the expected
    /// kind; otherwise fail with a located error.
    fn expect(&mut self, kind: TokenKind, context: &str) -> Result<Token> {
        let token = self.peek_non_space();
        if token.kind != kind {
            return Err(self.unexpected(&token, context));
        }
        Ok(self.next_non_space())
    }

    fn peek_name(&mut self, name: &str) -> bool {
        let token = self.peek_non_space();
        token.kind == TokenKind::Name && token.value == name
    }

    // -- errors --

    fn error_at(&self, pos: usize, message: impl Into<String>) -> TsumugiError {
        let loc = Location::from_offset(self.source, pos);
        TsumugiError::Parse {
            message: message.into(),
            filename: self.filename.to_string(),
            line: loc.line,
            column: loc.column,
        }
    }

    /// Complain about an out-of-place token. A lexer error token carries its
    /// own diagnostic, which wins over the generic message.
    fn unexpected(&self, token: &Token, context: &str) -> TsumugiError {
        if token.kind == TokenKind::Error {
            return self.error_at(token.pos, token.value.clone());
        }
        self.error_at(token.pos, format!("unexpected {} in {}", token, context))
    }

    // -- statements --

    /// Parse the next top-level node, skipping comments. Returns `None` at
    /// end of input.
    fn parse_next_node(&mut self) -> Result<Option<Node>> {
        loop {
            let token = self.peek();
            match token.kind {
                TokenKind::Eof => return Ok(None),
                TokenKind::CommentBegin => self.skip_comment()?,
                TokenKind::BlockBegin => return self.parse_block().map(Some),
                TokenKind::VariableBegin => return self.parse_var().map(Some),
                TokenKind::Text => return self.parse_text().map(Some),
                _ => return Err(self.unexpected(&token, "input")),
            }
        }
    }

    /// Comments produce no node.
    fn skip_comment(&mut self) -> Result<()> {
        self.expect(TokenKind::CommentBegin, "comment")?;
        loop {
            let token = self.next_non_space();
            match token.kind {
                TokenKind::Text => continue,
                TokenKind::CommentEnd => return Ok(()),
                _ => return Err(self.unexpected(&token, "end of comment")),
            }
        }
    }

    fn parse_text(&mut self) -> Result<Node> {
        let token = self.next();
        match token.kind {
            TokenKind::Text => Ok(Node::Text(TextNode {
                pos: token.pos,
                text: token.value,
            })),
            _ => Err(self.unexpected(&token, "input")),
        }
    }

    fn parse_var(&mut self) -> Result<Node> {
        let begin = self.expect(TokenKind::VariableBegin, "variable tag")?;
        let expr = self.parse_expr(TokenKind::VariableEnd)?;
        self.expect(TokenKind::VariableEnd, "variable tag")?;
        Ok(Node::Var(VarNode {
            pos: begin.pos,
            expr,
        }))
    }

    /// Dispatch on the first name inside a `{% … %}` tag. The opening
    /// delimiter and keyword are pushed back so each tag parser sees its
    /// whole tag.
    fn parse_block(&mut self) -> Result<Node> {
        let begin = self.expect(TokenKind::BlockBegin, "tag")?;
        let keyword = self.next_non_space();
        if keyword.kind != TokenKind::Name {
            return Err(self.unexpected(&keyword, "tag name"));
        }
        self.peek();
        let name = keyword.value.clone();
        match name.as_str() {
            "if" => {
                self.backup3(begin, keyword);
                self.parse_if()
            }
            "for" => {
                self.backup3(begin, keyword);
                self.parse_for()
            }
            "set" => {
                self.backup3(begin, keyword);
                self.parse_set()
            }
            "block" | "extends" | "macro" | "include" | "from" | "import" | "call" => Err(self.error_at(
                keyword.pos,
                format!("tag '{}' is reserved and not supported", name),
            )),
            "elif" | "else" | "endif" | "endfor" | "endblock" => Err(self.error_at(
                keyword.pos,
                format!("unexpected '{}' without an open block", name),
            )),
            _ => Err(self.unexpected(&keyword, "tag name")),
        }
    }

    /// Peek the tag name of an upcoming `{% … %}` without consuming
    /// anything, so body loops can decide whether their block is ending.
    fn next_block_name(&mut self) -> Option<String> {
        if self.peek_non_space().kind != TokenKind::BlockBegin {
            return None;
        }
        let begin = self.next_non_space();
        let name = self.peek_non_space();
        let result = (name.kind == TokenKind::Name).then(|| name.value.clone());
        self.backup2(begin);
        result
    }

    fn parse_if(&mut self) -> Result<Node> {
        let begin = self.expect(TokenKind::BlockBegin, "if tag")?;
        self.next_non_space(); // the `if` keyword
        let first_guard = self.parse_expr(TokenKind::BlockEnd)?;
        self.expect(TokenKind::BlockEnd, "if tag")?;

        let mut branches: Vec<IfBranch> = Vec::new();
        // `None` once an `else` has been seen
        let mut current_guard = Some(first_guard);
        let mut body = ListNode::new(self.peek().pos);
        let mut else_body = None;

        loop {
            match self.next_block_name().as_deref() {
                Some("elif") => {
                    match current_guard.take() {
                        Some(guard) => branches.push(IfBranch {
                            pos: guard.pos(),
                            guard,
                            body: std::mem::take(&mut body),
                        }),
                        None => {
                            let token = self.peek_non_space();
                            return Err(self.error_at(token.pos, "'elif' after 'else' in if tag"));
                        }
                    }
                    self.expect(TokenKind::BlockBegin, "elif tag")?;
                    self.next_non_space(); // `elif`
                    current_guard = Some(self.parse_expr(TokenKind::BlockEnd)?);
                    self.expect(TokenKind::BlockEnd, "elif tag")?;
                    body = ListNode::new(self.peek().pos);
                }
                Some("else") => {
                    match current_guard.take() {
                        Some(guard) => branches.push(IfBranch {
                            pos: guard.pos(),
                            guard,
                            body: std::mem::take(&mut body),
                        }),
                        None => {
                            let token = self.peek_non_space();
                            return Err(self.error_at(token.pos, "second 'else' in if tag"));
                        }
                    }
                    self.expect(TokenKind::BlockBegin, "else tag")?;
                    self.next_non_space(); // `else`
                    self.expect(TokenKind::BlockEnd, "else tag")?;
                    body = ListNode::new(self.peek().pos);
                }
                Some("endif") => {
                    self.expect(TokenKind::BlockBegin, "endif tag")?;
                    self.next_non_space(); // `endif`
                    self.expect(TokenKind::BlockEnd, "endif tag")?;
                    match current_guard.take() {
                        Some(guard) => branches.push(IfBranch {
                            pos: guard.pos(),
                            guard,
                            body,
                        }),
                        None => else_body = Some(body),
                    }
                    return Ok(Node::If(IfNode {
                        pos: begin.pos,
                        branches,
                        else_body,
                    }));
                }
                _ => match self.parse_next_node()? {
                    Some(node) => body.push(node),
                    None => return Err(self.error_at(self.source.len(), "EOF inside an If")),
                },
            }
        }
    }

    fn parse_for(&mut self) -> Result<Node> {
        let begin = self.expect(TokenKind::BlockBegin, "for tag")?;
        self.next_non_space(); // the `for` keyword
        let target = self.parse_for_target()?;
        let in_token = self.next_non_space();
        if in_token.kind != TokenKind::Name || in_token.value != "in" {
            return Err(self.unexpected(&in_token, "for tag, expected 'in'"));
        }
        let iter = self.parse_expr(TokenKind::BlockEnd)?;
        self.expect(TokenKind::BlockEnd, "for tag")?;

        let mut body = ListNode::new(self.peek().pos);
        loop {
            match self.next_block_name().as_deref() {
                Some("endfor") => {
                    self.expect(TokenKind::BlockBegin, "endfor tag")?;
                    self.next_non_space(); // `endfor`
                    self.expect(TokenKind::BlockEnd, "endfor tag")?;
                    return Ok(Node::For(ForNode {
                        pos: begin.pos,
                        target,
                        iter,
                        body,
                    }));
                }
                _ => match self.parse_next_node()? {
                    Some(node) => body.push(node),
                    None => return Err(self.error_at(self.source.len(), "EOF inside a For")),
                },
            }
        }
    }

    /// A loop target is a single name or a parenthesised tuple of names.
    fn parse_for_target(&mut self) -> Result<ForTarget> {
        let token = self.peek_non_space();
        match token.kind {
            TokenKind::Name => {
                let name = self.next_non_space();
                Ok(ForTarget::Single(name.value))
            }
            TokenKind::Lparen => {
                self.next_non_space();
                let mut names = Vec::new();
                loop {
                    let name = self.expect(TokenKind::Name, "for target")?;
                    names.push(name.value);
                    let sep = self.next_non_space();
                    match sep.kind {
                        TokenKind::Comma => continue,
                        TokenKind::Rparen => break,
                        _ => return Err(self.unexpected(&sep, "for target")),
                    }
                }
                Ok(ForTarget::Tuple(names))
            }
            _ => Err(self.unexpected(&token, "for target")),
        }
    }

    fn parse_set(&mut self) -> Result<Node> {
        let begin = self.expect(TokenKind::BlockBegin, "set tag")?;
        self.next_non_space(); // the `set` keyword
        let name = self.expect(TokenKind::Name, "set tag")?;
        self.expect(TokenKind::Assign, "set tag")?;
        let value = self.parse_expr(TokenKind::BlockEnd)?;
        self.expect(TokenKind::BlockEnd, "set tag")?;
        Ok(Node::Set(SetNode {
            pos: begin.pos,
            name: name.value,
            value,
        }))
    }

    // -- expressions --
    //
    // Precedence climbing, lowest level first:
    //   or < and < not < comparisons < additive < multiplicative
    //   < unary sign < postfix index/attribute.
    // Comparisons are non-associative; everything else binary is
    // left-associative. A comma or any terminator simply ends the climb, so
    // the enclosing list/map/paren parser decides what it means.

    fn parse_expr(&mut self, terminator: TokenKind) -> Result<Expr> {
        self.parse_or(terminator)
    }

    fn parse_or(&mut self, terminator: TokenKind) -> Result<Expr> {
        let mut lhs = self.parse_and(terminator)?;
        while self.peek_name("or") {
            self.next_non_space();
            let rhs = self.parse_and(terminator)?;
            let pos = lhs.pos();
            lhs = Expr::Logic {
                op: LogicOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self, terminator: TokenKind) -> Result<Expr> {
        let mut lhs = self.parse_not(terminator)?;
        while self.peek_name("and") {
            self.next_non_space();
            let rhs = self.parse_not(terminator)?;
            let pos = lhs.pos();
            lhs = Expr::Logic {
                op: LogicOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        Ok(lhs)
    }

    fn parse_not(&mut self, terminator: TokenKind) -> Result<Expr> {
        if self.peek_name("not") {
            let token = self.next_non_space();
            let operand = self.parse_not(terminator)?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
                pos: token.pos,
            });
        }
        self.parse_comparison(terminator)
    }

    fn parse_comparison(&mut self, terminator: TokenKind) -> Result<Expr> {
        let lhs = self.parse_additive(terminator)?;
        if self.peek_non_space().kind.precedence() != CMP_PRECEDENCE {
            return Ok(lhs);
        }
        let op_token = self.next_non_space();
        let op = match op_token.kind {
            TokenKind::Eq => CmpOp::Eq,
            TokenKind::Ne => CmpOp::Ne,
            TokenKind::Lt => CmpOp::Lt,
            TokenKind::Lteq => CmpOp::Le,
            TokenKind::Gt => CmpOp::Gt,
            TokenKind::Gteq => CmpOp::Ge,
            _ => return Err(self.unexpected(&op_token, "comparison")),
        };
        let rhs = self.parse_additive(terminator)?;
        let trailing = self.peek_non_space();
        if trailing.kind.precedence() == CMP_PRECEDENCE {
            return Err(self.error_at(trailing.pos, "comparison operators cannot be chained"));
        }
        let pos = lhs.pos();
        Ok(Expr::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            pos,
        })
    }

    fn parse_additive(&mut self, terminator: TokenKind) -> Result<Expr> {
        let mut lhs = self.parse_multiplicative(terminator)?;
        while self.peek_non_space().kind.precedence() == ADD_PRECEDENCE {
            let op_token = self.next_non_space();
            let op = match op_token.kind {
                TokenKind::Add => ArithOp::Add,
                TokenKind::Sub => ArithOp::Sub,
                _ => return Err(self.unexpected(&op_token, "expression")),
            };
            let rhs = self.parse_multiplicative(terminator)?;
            let pos = lhs.pos();
            lhs = Expr::Add {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self, terminator: TokenKind) -> Result<Expr> {
        let mut lhs = self.parse_unary(terminator)?;
        while self.peek_non_space().kind.precedence() == MUL_PRECEDENCE {
            let op_token = self.next_non_space();
            let op = match op_token.kind {
                TokenKind::Mul => ArithOp::Mul,
                TokenKind::Div => ArithOp::Div,
                TokenKind::Floordiv => ArithOp::Floordiv,
                TokenKind::Mod => ArithOp::Mod,
                _ => return Err(self.unexpected(&op_token, "expression")),
            };
            let rhs = self.parse_unary(terminator)?;
            let pos = lhs.pos();
            lhs = Expr::Mul {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self, terminator: TokenKind) -> Result<Expr> {
        let token = self.peek_non_space();
        if !matches!(token.kind, TokenKind::Add | TokenKind::Sub) {
            return self.parse_postfix(terminator);
        }
        let op_token = self.next_non_space();
        let operand = self.parse_unary(terminator)?;
        match (op_token.kind, operand) {
            // a signed numeric literal collapses into the literal itself
            (TokenKind::Sub, Expr::Int { value, .. }) => Ok(Expr::Int {
                value: -value,
                pos: op_token.pos,
            }),
            (TokenKind::Sub, Expr::Float { value, .. }) => Ok(Expr::Float {
                value: -value,
                pos: op_token.pos,
            }),
            // unary plus on a numeric literal is a no-op
            (TokenKind::Add, operand @ (Expr::Int { .. } | Expr::Float { .. })) => Ok(operand),
            (_, Expr::Unary { .. }) => Err(self.error_at(op_token.pos, "doubled unary sign")),
            (TokenKind::Sub, operand) => Ok(Expr::Unary {
                op: UnaryOp::Minus,
                operand: Box::new(operand),
                pos: op_token.pos,
            }),
            (_, operand) => Ok(Expr::Unary {
                op: UnaryOp::Plus,
                operand: Box::new(operand),
                pos: op_token.pos,
            }),
        }
    }

    fn parse_postfix(&mut self, terminator: TokenKind) -> Result<Expr> {
        let mut expr = self.parse_primary(terminator)?;
        loop {
            let token = self.peek_non_space();
            match token.kind {
                TokenKind::Lbracket => {
                    self.next_non_space();
                    let index = self.parse_expr(TokenKind::Rbracket)?;
                    self.expect(TokenKind::Rbracket, "index expression")?;
                    let pos = expr.pos();
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                        pos,
                    };
                }
                TokenKind::Dot => {
                    self.next_non_space();
                    let name = self.expect(TokenKind::Name, "attribute access")?;
                    let pos = expr.pos();
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(Expr::Str {
                            value: name.value,
                            pos: name.pos,
                        }),
                        pos,
                    };
                }
                TokenKind::Lparen => {
                    return Err(self.error_at(token.pos, "function calls are not supported"));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self, terminator: TokenKind) -> Result<Expr> {
        let token = self.peek_non_space();
        if token.kind == terminator {
            return Err(self.error_at(
                token.pos,
                format!("unexpected {}, expected an expression", token),
            ));
        }
        match token.kind {
            TokenKind::Name => {
                let token = self.next_non_space();
                Ok(Expr::Lookup {
                    name: token.value,
                    pos: token.pos,
                })
            }
            TokenKind::Lparen => {
                self.next_non_space();
                let expr = self.parse_expr(TokenKind::Rparen)?;
                self.expect(TokenKind::Rparen, "parenthesised expression")?;
                Ok(expr)
            }
            TokenKind::Lbrace => self.parse_map_literal(),
            TokenKind::Lbracket => self.parse_list_literal(),
            TokenKind::Integer => {
                let token = self.next_non_space();
                let value = token.value.parse::<i64>().map_err(|_| {
                    self.error_at(
                        token.pos,
                        format!("invalid integer literal '{}'", token.value),
                    )
                })?;
                Ok(Expr::Int {
                    value,
                    pos: token.pos,
                })
            }
            TokenKind::Float => {
                let token = self.next_non_space();
                let value = token.value.parse::<f64>().map_err(|_| {
                    self.error_at(token.pos, format!("invalid float literal '{}'", token.value))
                })?;
                Ok(Expr::Float {
                    value,
                    pos: token.pos,
                })
            }
            TokenKind::Str => {
                let token = self.next_non_space();
                Ok(Expr::Str {
                    value: token.value,
                    pos: token.pos,
                })
            }
            TokenKind::Bool => {
                let token = self.next_non_space();
                Ok(Expr::Bool {
                    value: token.value == "true",
                    pos: token.pos,
                })
            }
            _ => Err(self.unexpected(&token, "expression")),
        }
    }

    /// `{ key: value, … }` — insertion order kept, trailing comma allowed.
    fn parse_map_literal(&mut self) -> Result<Expr> {
        let open = self.expect(TokenKind::Lbrace, "map literal")?;
        let mut elems = Vec::new();
        loop {
            let token = self.peek_non_space();
            match token.kind {
                TokenKind::Rbrace => {
                    self.next_non_space();
                    break;
                }
                TokenKind::Comma => return Err(self.unexpected(&token, "map literal")),
                _ => {
                    let key = self.parse_expr(TokenKind::Colon)?;
                    self.expect(TokenKind::Colon, "map literal")?;
                    let value = self.parse_expr(TokenKind::Rbrace)?;
                    let pos = key.pos();
                    elems.push(MapElem { pos, key, value });
                    let sep = self.peek_non_space();
                    match sep.kind {
                        TokenKind::Comma => {
                            self.next_non_space();
                        }
                        TokenKind::Rbrace => {
                            self.next_non_space();
                            break;
                        }
                        _ => return Err(self.unexpected(&sep, "map literal")),
                    }
                }
            }
        }
        Ok(Expr::Map {
            elems,
            pos: open.pos,
        })
    }

    /// `[ e, … ]` — trailing comma allowed.
    fn parse_list_literal(&mut self) -> Result<Expr> {
        let open = self.expect(TokenKind::Lbracket, "list literal")?;
        let mut elems = Vec::new();
        loop {
            let token = self.peek_non_space();
            match token.kind {
                TokenKind::Rbracket => {
                    self.next_non_space();
                    break;
                }
                TokenKind::Comma => return Err(self.unexpected(&token, "list literal")),
                _ => {
                    elems.push(self.parse_expr(TokenKind::Rbracket)?);
                    let sep = self.peek_non_space();
                    match sep.kind {
                        TokenKind::Comma => {
                            self.next_non_space();
                        }
                        TokenKind::Rbracket => {
                            self.next_non_space();
                            break;
                        }
                        _ => return Err(self.unexpected(&sep, "list literal")),
                    }
                }
            }
        }
        Ok(Expr::List {
            elems,
            pos: open.pos,
        })
    }
}
