use serde_json::{json, Map, Number, Value};

use crate::{parse_json_path, to_index_path, IndexPath, ParseError};

/// Comparison operators of the filter DSL. `!=` is rewritten at parse time
/// into a negated equality, so compiled query trees treat it uniformly.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Condition {
        path: IndexPath,
        op: CmpOp,
        value: Value,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Path(String),
    Str(String),
    Num(Number),
    Bool(bool),
    Null,
    Op(CmpOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

/// Compile a filter expression such as
///
/// ```text
/// $.status == "paid"
/// $.price > 10 && $.price <= 20
/// $.items[*].productId == "A1" || $.tags[*] == "hot"
/// ```
///
/// into the search-engine query body, wrapped as `{"query": ...}`.
pub fn compile_filter(expr: &str) -> Result<Value, ParseError> {
    let ast = parse_filter(expr)?;
    Ok(json!({"query": clause(&ast)}))
}

/// Parse a filter expression into its AST without compiling it.
pub fn parse_filter(expr: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser {
        tokens: &tokens,
        end: expr.len(),
        pos: 0,
    };
    let ast = parser.parse_or()?;
    if parser.pos != tokens.len() {
        return Err(ParseError::TrailingTokens {
            at: tokens[parser.pos].1,
        });
    }
    Ok(ast)
}

fn tokenize(s: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let bytes = s.as_bytes();
    let n = bytes.len();
    let mut tokens = Vec::new();
    let mut i = 0;

    let two = |i: usize| -> &[u8] { &bytes[i..(i + 2).min(n)] };
    let is_two_char_op =
        |i: usize| -> bool { matches!(two(i), b"==" | b"!=" | b">=" | b"<=" | b"&&" | b"||") };

    while i < n {
        let ch = bytes[i];
        if ch.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        // A path runs from '$' until whitespace, a parenthesis, or an operator.
        if ch == b'$' {
            let start = i;
            i += 1;
            while i < n {
                let c = bytes[i];
                if c.is_ascii_whitespace() || matches!(c, b'(' | b')' | b'!' | b'>' | b'<') {
                    break;
                }
                if is_two_char_op(i) {
                    break;
                }
                i += 1;
            }
            tokens.push((Token::Path(s[start..i].to_string()), start));
            continue;
        }

        match two(i) {
            b"&&" => {
                tokens.push((Token::And, i));
                i += 2;
                continue;
            }
            b"||" => {
                tokens.push((Token::Or, i));
                i += 2;
                continue;
            }
            b"!=" => {
                tokens.push((Token::Op(CmpOp::Ne), i));
                i += 2;
                continue;
            }
            b"==" => {
                tokens.push((Token::Op(CmpOp::Eq), i));
                i += 2;
                continue;
            }
            b">=" => {
                tokens.push((Token::Op(CmpOp::Gte), i));
                i += 2;
                continue;
            }
            b"<=" => {
                tokens.push((Token::Op(CmpOp::Lte), i));
                i += 2;
                continue;
            }
            _ => (),
        }

        match ch {
            b'!' => {
                tokens.push((Token::Not, i));
                i += 1;
            }
            b'>' => {
                tokens.push((Token::Op(CmpOp::Gt), i));
                i += 1;
            }
            b'<' => {
                tokens.push((Token::Op(CmpOp::Lt), i));
                i += 1;
            }
            b'(' => {
                tokens.push((Token::LParen, i));
                i += 1;
            }
            b')' => {
                tokens.push((Token::RParen, i));
                i += 1;
            }
            // String literals are double-quoted and support no escapes.
            b'"' => {
                let mut j = i + 1;
                while j < n && bytes[j] != b'"' {
                    j += 1;
                }
                if j >= n {
                    return Err(ParseError::UnterminatedString { at: i });
                }
                tokens.push((Token::Str(s[i + 1..j].to_string()), i));
                i = j + 1;
            }
            b'0'..=b'9' => {
                i = lex_number(s, i, &mut tokens)?;
            }
            b'-' if i + 1 < n && bytes[i + 1].is_ascii_digit() => {
                i = lex_number(s, i, &mut tokens)?;
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < n && bytes[i].is_ascii_alphabetic() {
                    i += 1;
                }
                let word = &s[start..i];
                match word {
                    "true" => tokens.push((Token::Bool(true), start)),
                    "false" => tokens.push((Token::Bool(false), start)),
                    "null" => tokens.push((Token::Null, start)),
                    _ => {
                        return Err(ParseError::UnexpectedIdentifier {
                            word: word.to_string(),
                            at: start,
                        })
                    }
                }
            }
            _ => {
                let ch = s[i..].chars().next().unwrap_or('\u{fffd}');
                return Err(ParseError::UnexpectedChar { ch, at: i });
            }
        }
    }

    Ok(tokens)
}

fn lex_number(s: &str, start: usize, tokens: &mut Vec<(Token, usize)>) -> Result<usize, ParseError> {
    let bytes = s.as_bytes();
    let mut j = start;
    let mut has_dot = false;
    while j < bytes.len() && matches!(bytes[j], b'0'..=b'9' | b'.' | b'e' | b'E' | b'+' | b'-') {
        if bytes[j] == b'.' {
            has_dot = true;
        }
        j += 1;
    }
    let text = &s[start..j];

    let number = if has_dot {
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .ok_or_else(|| ParseError::InvalidNumber(text.to_string()))?
    } else {
        text.parse::<i64>()
            .map(Number::from)
            .map_err(|_| ParseError::InvalidNumber(text.to_string()))?
    };
    tokens.push((Token::Num(number), start));
    Ok(j)
}

// Precedence low to high: `||` < `&&` < `!` < primary.
struct Parser<'t> {
    tokens: &'t [(Token, usize)],
    end: usize,
    pos: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    // Byte position of the current token, or of the end of the expression.
    fn at(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(_, at)| *at)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.pos += 1;
            let right = self.parse_and()?;
            node = Expr::Or(Box::new(node), Box::new(right));
        }
        Ok(node)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.parse_unary()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.pos += 1;
            let right = self.parse_unary()?;
            node = Expr::And(Box::new(node), Box::new(right));
        }
        Ok(node)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.pos += 1;
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.pos += 1;
            let node = self.parse_or()?;
            if !matches!(self.peek(), Some(Token::RParen)) {
                return Err(ParseError::MissingParen { at: self.at() });
            }
            self.pos += 1;
            return Ok(node);
        }
        self.parse_condition()
    }

    fn parse_condition(&mut self) -> Result<Expr, ParseError> {
        let Some(Token::Path(raw_path)) = self.peek() else {
            return Err(ParseError::ExpectedPath { at: self.at() });
        };
        let segments = parse_json_path(raw_path)?;
        let path = to_index_path(&segments)?;
        self.pos += 1;

        let Some(Token::Op(op)) = self.peek() else {
            return Err(ParseError::ExpectedOperator { at: self.at() });
        };
        let op = *op;
        self.pos += 1;

        let value = match self.peek() {
            Some(Token::Str(v)) => Value::String(v.clone()),
            Some(Token::Num(v)) => Value::Number(v.clone()),
            Some(Token::Bool(v)) => Value::Bool(*v),
            Some(Token::Null) => Value::Null,
            _ => return Err(ParseError::ExpectedValue { at: self.at() }),
        };
        self.pos += 1;

        // Rewrite `path != v` as `!(path == v)` for a uniform query tree.
        if op == CmpOp::Ne {
            return Ok(Expr::Not(Box::new(Expr::Condition {
                path,
                op: CmpOp::Eq,
                value,
            })));
        }
        Ok(Expr::Condition { path, op, value })
    }
}

fn obj1(key: impl Into<String>, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.into(), value);
    Value::Object(map)
}

fn clause(expr: &Expr) -> Value {
    match expr {
        Expr::Condition { path, op, value } => {
            let inner = match op {
                CmpOp::Eq => obj1("term", obj1(&path.field, value.clone())),
                CmpOp::Ne => {
                    // Normally rewritten at parse time; kept equivalent for
                    // hand-built ASTs.
                    return clause(&Expr::Not(Box::new(Expr::Condition {
                        path: path.clone(),
                        op: CmpOp::Eq,
                        value: value.clone(),
                    })));
                }
                CmpOp::Gt => range(path, "gt", value),
                CmpOp::Gte => range(path, "gte", value),
                CmpOp::Lt => range(path, "lt", value),
                CmpOp::Lte => range(path, "lte", value),
            };
            match &path.nested_path {
                Some(nested) => json!({
                    "nested": {
                        "path": nested,
                        "query": inner,
                    }
                }),
                None => inner,
            }
        }
        Expr::Not(inner) => json!({"bool": {"must_not": [clause(inner)]}}),
        Expr::And(left, right) => json!({"bool": {"must": [clause(left), clause(right)]}}),
        Expr::Or(left, right) => json!({
            "bool": {
                "should": [clause(left), clause(right)],
                "minimum_should_match": 1,
            }
        }),
    }
}

fn range(path: &IndexPath, op: &str, value: &Value) -> Value {
    obj1("range", obj1(&path.field, obj1(op, value.clone())))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn simple_equality() {
        let query = compile_filter(r#"$.status == "paid""#).unwrap();
        assert_eq!(query, json!({"query": {"term": {"status": "paid"}}}));
    }

    #[test]
    fn numeric_range_conjunction() {
        let query = compile_filter("$.price > 10 && $.price <= 20").unwrap();
        assert_eq!(
            query,
            json!({
                "query": {
                    "bool": {
                        "must": [
                            {"range": {"price": {"gt": 10}}},
                            {"range": {"price": {"lte": 20}}},
                        ]
                    }
                }
            })
        );
    }

    #[test]
    fn nested_term() {
        let query = compile_filter(r#"$.items[*].productId == "A1""#).unwrap();
        assert_eq!(
            query,
            json!({
                "query": {
                    "nested": {
                        "path": "items",
                        "query": {
                            "term": {"items.productId": "A1"},
                        },
                    }
                }
            })
        );
    }

    #[test]
    fn disjunction() {
        let query = compile_filter(r#"$.status == "paid" || $.status == "pending""#).unwrap();
        assert_eq!(
            query,
            json!({
                "query": {
                    "bool": {
                        "should": [
                            {"term": {"status": "paid"}},
                            {"term": {"status": "pending"}},
                        ],
                        "minimum_should_match": 1,
                    }
                }
            })
        );
    }

    #[test]
    fn negated_equality() {
        let query = compile_filter(r#"$.status != "paid""#).unwrap();
        assert_eq!(
            query,
            json!({
                "query": {
                    "bool": {
                        "must_not": [
                            {"term": {"status": "paid"}},
                        ]
                    }
                }
            })
        );
    }

    #[test]
    fn grouped_and_within_or() {
        let query =
            compile_filter(r#"($.price > 10 && $.price <= 20) || $.status == "paid""#).unwrap();
        assert_eq!(
            query,
            json!({
                "query": {
                    "bool": {
                        "should": [
                            {
                                "bool": {
                                    "must": [
                                        {"range": {"price": {"gt": 10}}},
                                        {"range": {"price": {"lte": 20}}},
                                    ]
                                }
                            },
                            {"term": {"status": "paid"}},
                        ],
                        "minimum_should_match": 1,
                    }
                }
            })
        );
    }

    #[test]
    fn bang_negation_binds_tighter_than_and() {
        let query = compile_filter(r#"!$.archived == true && $.status == "open""#).unwrap();
        assert_eq!(
            query,
            json!({
                "query": {
                    "bool": {
                        "must": [
                            {"bool": {"must_not": [{"term": {"archived": true}}]}},
                            {"term": {"status": "open"}},
                        ]
                    }
                }
            })
        );
    }

    #[test]
    fn literal_kinds() {
        for (expr, expected) in [
            ("$.active == true", json!({"term": {"active": true}})),
            ("$.deleted == false", json!({"term": {"deleted": false}})),
            ("$.parent == null", json!({"term": {"parent": null}})),
            ("$.score >= -3.5", json!({"range": {"score": {"gte": -3.5}}})),
            ("$.count < 1000", json!({"range": {"count": {"lt": 1000}}})),
        ] {
            let query = compile_filter(expr).unwrap();
            assert_eq!(query, json!({"query": expected}), "for {expr}");
        }
    }

    #[test]
    fn nested_negated_inequality_keeps_nesting() {
        let query = compile_filter(r#"$.items[*].sku != "X""#).unwrap();
        assert_eq!(
            query,
            json!({
                "query": {
                    "bool": {
                        "must_not": [{
                            "nested": {
                                "path": "items",
                                "query": {"term": {"items.sku": "X"}},
                            }
                        }]
                    }
                }
            })
        );
    }

    #[test]
    fn compiled_query_snapshot() {
        let query = compile_filter(r#"$.items[*].productId == "A1" && $.price >= 10"#).unwrap();
        insta::assert_json_snapshot!(query, @r###"
        {
          "query": {
            "bool": {
              "must": [
                {
                  "nested": {
                    "path": "items",
                    "query": {
                      "term": {
                        "items.productId": "A1"
                      }
                    }
                  }
                },
                {
                  "range": {
                    "price": {
                      "gte": 10
                    }
                  }
                }
              ]
            }
          }
        }
        "###);
    }

    #[test]
    fn recompilation_is_structurally_equal() {
        let expr = r#"($.a == 1 || !$.b != "x") && $.items[*].qty >= 2"#;
        assert_eq!(parse_filter(expr).unwrap(), parse_filter(expr).unwrap());
        assert_eq!(compile_filter(expr).unwrap(), compile_filter(expr).unwrap());
    }

    #[test]
    fn parse_errors_carry_positions() {
        assert_eq!(
            compile_filter(r#"$.s == "unterminated"#),
            Err(ParseError::UnterminatedString { at: 7 }),
        );
        assert_eq!(
            compile_filter("$.a == 1 # trailing"),
            Err(ParseError::UnexpectedChar { ch: '#', at: 9 }),
        );
        assert_eq!(
            compile_filter("$.a == yes"),
            Err(ParseError::UnexpectedIdentifier {
                word: "yes".to_string(),
                at: 7,
            }),
        );
        assert_eq!(
            compile_filter("$.a == 1 $.b == 2"),
            Err(ParseError::TrailingTokens { at: 9 }),
        );
        assert_eq!(
            compile_filter("($.a == 1"),
            Err(ParseError::MissingParen { at: 9 }),
        );
        assert_eq!(
            compile_filter("$.a =="),
            Err(ParseError::ExpectedValue { at: 6 }),
        );
        assert_eq!(
            compile_filter("$.a 5"),
            Err(ParseError::ExpectedOperator { at: 4 }),
        );
        assert_eq!(
            compile_filter("== 5"),
            Err(ParseError::ExpectedPath { at: 0 }),
        );
        assert_eq!(
            compile_filter("$.a == 1e5"),
            Err(ParseError::InvalidNumber("1e5".to_string())),
        );
    }

    #[test]
    fn path_errors_surface_from_conditions() {
        assert!(matches!(
            compile_filter(r#"$.a..b == 1"#),
            Err(ParseError::EmptySegment(_))
        ));
        assert_eq!(compile_filter("$ == 1"), Err(ParseError::EmptyPath));
    }
}
