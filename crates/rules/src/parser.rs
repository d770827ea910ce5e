//! Eligibility condition parser and evaluator.
//!
//! A small DSL over the request context:
//!
//! ```text
//! header.user-agent CONTAINS "Mobile"
//! cookie.plan == "pro"
//! query.utm_source MATCHES "^news"
//! path NOT STARTS_WITH "/admin"
//! query.visits >= 3
//! env == "client" OR (method == "GET" AND NOT path ENDS_WITH ".json")
//! ```
//!
//! Grammar (informal):
//! ```text
//! expr     = clause (("AND" | "OR") clause)*
//! clause   = ["NOT"] atom | ["NOT"] "(" expr ")"
//! atom     = field OP value
//! field    = "header." NAME | "cookie." NAME | "query." NAME
//!          | "path" | "method" | "env"
//! OP       = ["NOT"] ("CONTAINS" | "MATCHES" | "STARTS_WITH" | "ENDS_WITH")
//!          | "==" | "!=" | ">" | "<" | ">=" | "<="
//! value    = QUOTED_STRING | NUMBER | BARE_WORD
//! ```

use abwright_core::RequestContext;
use regex_lite::Regex;
use std::borrow::Cow;

use crate::RuleError;

/// A parsed condition tree.
#[derive(Debug, Clone)]
pub enum Condition {
    Atom(Atom),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
    /// Empty rule
    Always,
}

#[derive(Debug, Clone)]
pub struct Atom {
    field: Field,
    op: Op,
    value: Value,
    /// Compiled once for `MATCHES` / `NOT MATCHES`
    pattern: Option<Regex>,
}

/// A request attribute a condition can inspect.
#[derive(Debug, Clone, PartialEq)]
enum Field {
    Header(String),
    Cookie(String),
    Query(String),
    Path,
    Method,
    Env,
}

#[derive(Debug, Clone, PartialEq)]
enum Op {
    Contains,
    NotContains,
    Matches,
    NotMatches,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    Eq,
    NotEq,
    Gt,
    Lt,
    Gte,
    Lte,
}

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Num(f64),
}

impl Condition {
    /// Evaluate this condition against a request.
    pub fn evaluate(&self, ctx: &RequestContext) -> bool {
        match self {
            Condition::Always => true,
            Condition::Atom(atom) => atom.evaluate(ctx),
            Condition::And(a, b) => a.evaluate(ctx) && b.evaluate(ctx),
            Condition::Or(a, b) => a.evaluate(ctx) || b.evaluate(ctx),
            Condition::Not(inner) => !inner.evaluate(ctx),
        }
    }
}

impl Atom {
    fn evaluate(&self, ctx: &RequestContext) -> bool {
        let field_value = self.resolve_field(ctx);
        let expected = self.value.text();
        match &self.op {
            Op::Contains => field_value.is_some_and(|fv| fv.contains(expected.as_ref())),
            Op::NotContains => field_value.is_none_or(|fv| !fv.contains(expected.as_ref())),
            Op::Matches => field_value
                .is_some_and(|fv| self.pattern.as_ref().is_some_and(|re| re.is_match(fv))),
            Op::NotMatches => field_value
                .is_none_or(|fv| self.pattern.as_ref().is_some_and(|re| !re.is_match(fv))),
            Op::StartsWith => field_value.is_some_and(|fv| fv.starts_with(expected.as_ref())),
            Op::NotStartsWith => field_value.is_none_or(|fv| !fv.starts_with(expected.as_ref())),
            Op::EndsWith => field_value.is_some_and(|fv| fv.ends_with(expected.as_ref())),
            Op::NotEndsWith => field_value.is_none_or(|fv| !fv.ends_with(expected.as_ref())),
            Op::Eq => match (field_value, &self.value) {
                (Some(fv), Value::Str(s)) => fv == s.as_str(),
                (Some(fv), Value::Num(n)) => fv
                    .trim()
                    .parse::<f64>()
                    .is_ok_and(|x| (x - n).abs() < f64::EPSILON),
                (None, _) => false,
            },
            Op::NotEq => match (field_value, &self.value) {
                (Some(fv), Value::Str(s)) => fv != s.as_str(),
                (Some(fv), Value::Num(n)) => fv
                    .trim()
                    .parse::<f64>()
                    .is_ok_and(|x| (x - n).abs() >= f64::EPSILON),
                (None, _) => true,
            },
            Op::Gt => self.compare_num(field_value, |a, b| a > b),
            Op::Lt => self.compare_num(field_value, |a, b| a < b),
            Op::Gte => self.compare_num(field_value, |a, b| a >= b),
            Op::Lte => self.compare_num(field_value, |a, b| a <= b),
        }
    }

    fn resolve_field<'a>(&self, ctx: &'a RequestContext) -> Option<&'a str> {
        match &self.field {
            Field::Header(name) => ctx.header(name),
            Field::Cookie(name) => ctx.cookie(name),
            Field::Query(name) => ctx.query_param(name),
            Field::Path => Some(ctx.path.as_str()),
            Field::Method => Some(ctx.method.as_str()),
            Field::Env => Some(ctx.environment.as_str()),
        }
    }

    fn compare_num(&self, field_value: Option<&str>, cmp: impl Fn(f64, f64) -> bool) -> bool {
        match (field_value, &self.value) {
            (Some(fv), Value::Num(n)) => fv.trim().parse::<f64>().is_ok_and(|x| cmp(x, *n)),
            _ => false,
        }
    }
}

impl Value {
    fn text(&self) -> Cow<'_, str> {
        match self {
            Value::Str(s) => Cow::Borrowed(s),
            Value::Num(n) => Cow::Owned(n.to_string()),
        }
    }
}

// ─── Parser ──────────────────────────────────────────────────────────

/// Parse a rule string into a [`Condition`] tree.
///
/// Returns `Ok(Condition::Always)` for empty input.
pub fn parse_condition(input: &str) -> Result<Condition, RuleError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Condition::Always);
    }
    let tokens = tokenize(input)?;
    let (cond, rest) = parse_or(&tokens)?;
    if !rest.is_empty() {
        return Err(RuleError::Parse(format!(
            "unexpected tokens after expression: {rest:?}"
        )));
    }
    Ok(cond)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    And,
    Or,
    Not,
    Contains,
    Matches,
    StartsWith,
    EndsWith,
    Eq,
    NotEq,
    Gt,
    Lt,
    Gte,
    Lte,
    LParen,
    RParen,
}

/// Whether the character after the current one is an ASCII digit.
fn next_is_digit(chars: &std::iter::Peekable<std::str::Chars<'_>>) -> bool {
    chars.clone().nth(1).is_some_and(|d| d.is_ascii_digit())
}

fn tokenize(input: &str) -> Result<Vec<Token>, RuleError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => {
                            if let Some(escaped) = chars.next() {
                                s.push(escaped);
                            }
                        }
                        Some(ch) if ch == quote => break,
                        Some(ch) => s.push(ch),
                        None => return Err(RuleError::Parse("unterminated string literal".into())),
                    }
                }
                tokens.push(Token::Str(s));
            }
            '>' | '<' => {
                chars.next();
                let or_equal = chars.peek() == Some(&'=');
                if or_equal {
                    chars.next();
                }
                tokens.push(match (c, or_equal) {
                    ('>', true) => Token::Gte,
                    ('>', false) => Token::Gt,
                    (_, true) => Token::Lte,
                    (_, false) => Token::Lt,
                });
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                }
                tokens.push(Token::Eq);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::NotEq);
                } else {
                    tokens.push(Token::Not);
                }
            }
            _ if c.is_ascii_digit() || (c == '-' && next_is_digit(&chars)) => {
                let mut num_str = String::new();
                num_str.push(c);
                chars.next();
                while let Some(&nc) = chars.peek() {
                    if nc.is_ascii_digit() || nc == '.' {
                        num_str.push(nc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = num_str
                    .parse::<f64>()
                    .map_err(|_| RuleError::Parse(format!("invalid number: {num_str}")))?;
                tokens.push(Token::Num(n));
            }
            _ if c.is_alphanumeric() || matches!(c, '_' | '.' | '/' | '-') => {
                // A '-' not followed by a digit starts a bare word such as `-direct`.
                let mut word = String::new();
                while let Some(&wc) = chars.peek() {
                    if wc.is_alphanumeric() || matches!(wc, '_' | '.' | '-' | '/') {
                        word.push(wc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = match word.as_str() {
                    "AND" | "and" => Token::And,
                    "OR" | "or" => Token::Or,
                    "NOT" | "not" => Token::Not,
                    "CONTAINS" | "contains" => Token::Contains,
                    "MATCHES" | "matches" => Token::Matches,
                    "STARTS_WITH" | "starts_with" => Token::StartsWith,
                    "ENDS_WITH" | "ends_with" => Token::EndsWith,
                    _ => Token::Ident(word),
                };
                tokens.push(token);
            }
            _ => return Err(RuleError::Parse(format!("unexpected character: {c}"))),
        }
    }

    Ok(tokens)
}

type Parsed<'a, T> = Result<(T, &'a [Token]), RuleError>;

fn parse_or(tokens: &[Token]) -> Parsed<'_, Condition> {
    let (mut left, mut rest) = parse_and(tokens)?;
    while rest.first() == Some(&Token::Or) {
        let (right, remaining) = parse_and(&rest[1..])?;
        left = Condition::Or(Box::new(left), Box::new(right));
        rest = remaining;
    }
    Ok((left, rest))
}

fn parse_and(tokens: &[Token]) -> Parsed<'_, Condition> {
    let (mut left, mut rest) = parse_unary(tokens)?;
    while rest.first() == Some(&Token::And) {
        let (right, remaining) = parse_unary(&rest[1..])?;
        left = Condition::And(Box::new(left), Box::new(right));
        rest = remaining;
    }
    Ok((left, rest))
}

fn parse_unary(tokens: &[Token]) -> Parsed<'_, Condition> {
    // A leading NOT negates the following atom or parenthesized group;
    // NOT between a field and an operator is handled in parse_op.
    if tokens.first() == Some(&Token::Not) {
        let (inner, rest) = parse_primary(&tokens[1..])?;
        return Ok((Condition::Not(Box::new(inner)), rest));
    }
    parse_primary(tokens)
}

fn parse_primary(tokens: &[Token]) -> Parsed<'_, Condition> {
    if tokens.first() == Some(&Token::LParen) {
        let (inner, rest) = parse_or(&tokens[1..])?;
        if rest.first() != Some(&Token::RParen) {
            return Err(RuleError::Parse("expected closing parenthesis".into()));
        }
        return Ok((inner, &rest[1..]));
    }
    parse_atom(tokens)
}

fn parse_atom(tokens: &[Token]) -> Parsed<'_, Condition> {
    let (field, rest) = parse_field(tokens)?;
    let (op, rest) = parse_op(rest)?;
    let (value, rest) = parse_value(rest)?;

    let pattern = match op {
        Op::Matches | Op::NotMatches => {
            let source = value.text();
            let re = Regex::new(&source).map_err(|e| RuleError::InvalidPattern {
                pattern: source.to_string(),
                detail: e.to_string(),
            })?;
            Some(re)
        }
        _ => None,
    };

    Ok((
        Condition::Atom(Atom {
            field,
            op,
            value,
            pattern,
        }),
        rest,
    ))
}

fn parse_field(tokens: &[Token]) -> Parsed<'_, Field> {
    let Some(Token::Ident(name)) = tokens.first() else {
        return Err(RuleError::Parse(format!(
            "expected field name, got {:?}",
            tokens.first()
        )));
    };
    let field = if let Some(header) = name.strip_prefix("header.") {
        Field::Header(header.to_ascii_lowercase())
    } else if let Some(cookie) = name.strip_prefix("cookie.") {
        Field::Cookie(cookie.to_string())
    } else if let Some(param) = name.strip_prefix("query.") {
        Field::Query(param.to_string())
    } else {
        match name.as_str() {
            "path" => Field::Path,
            "method" => Field::Method,
            "env" => Field::Env,
            other => return Err(RuleError::Parse(format!("unknown field: {other}"))),
        }
    };
    Ok((field, &tokens[1..]))
}

fn parse_op(tokens: &[Token]) -> Parsed<'_, Op> {
    if tokens.first() == Some(&Token::Not) && tokens.len() > 1 {
        let (base_op, rest) = parse_base_op(&tokens[1..])?;
        let negated = match base_op {
            Op::Contains => Op::NotContains,
            Op::Matches => Op::NotMatches,
            Op::StartsWith => Op::NotStartsWith,
            Op::EndsWith => Op::NotEndsWith,
            other => {
                return Err(RuleError::Parse(format!("cannot negate operator: {other:?}")));
            }
        };
        return Ok((negated, rest));
    }
    parse_base_op(tokens)
}

fn parse_base_op(tokens: &[Token]) -> Parsed<'_, Op> {
    let op = match tokens.first() {
        Some(Token::Contains) => Op::Contains,
        Some(Token::Matches) => Op::Matches,
        Some(Token::StartsWith) => Op::StartsWith,
        Some(Token::EndsWith) => Op::EndsWith,
        Some(Token::Eq) => Op::Eq,
        Some(Token::NotEq) => Op::NotEq,
        Some(Token::Gt) => Op::Gt,
        Some(Token::Lt) => Op::Lt,
        Some(Token::Gte) => Op::Gte,
        Some(Token::Lte) => Op::Lte,
        other => return Err(RuleError::Parse(format!("expected operator, got {other:?}"))),
    };
    Ok((op, &tokens[1..]))
}

fn parse_value(tokens: &[Token]) -> Parsed<'_, Value> {
    match tokens.first() {
        Some(Token::Str(s)) => Ok((Value::Str(s.clone()), &tokens[1..])),
        Some(Token::Num(n)) => Ok((Value::Num(*n), &tokens[1..])),
        Some(Token::Ident(s)) => Ok((Value::Str(s.clone()), &tokens[1..])),
        other => Err(RuleError::Parse(format!(
            "expected value (string or number), got {other:?}"
        ))),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn mobile_shop() -> RequestContext {
        RequestContext::server()
            .with_path("/shop/cart")
            .with_header("User-Agent", "Mozilla/5.0 (iPhone) Mobile Safari")
            .with_header("Cookie", "plan=pro; visits=7")
            .with_query_string("utm_source=newsletter&page=2")
    }

    #[test]
    fn header_contains() {
        let cond = parse_condition(r#"header.user-agent CONTAINS "Mobile""#).unwrap();
        assert!(cond.evaluate(&mobile_shop()));
        assert!(!cond.evaluate(&RequestContext::server()));
    }

    #[test]
    fn header_name_is_case_insensitive() {
        let cond = parse_condition(r#"header.User-Agent CONTAINS "iPhone""#).unwrap();
        assert!(cond.evaluate(&mobile_shop()));
    }

    #[test]
    fn not_contains_on_missing_field() {
        let cond = parse_condition(r#"header.x-bot NOT CONTAINS "crawler""#).unwrap();
        assert!(cond.evaluate(&RequestContext::server()));
    }

    #[test]
    fn and_expression() {
        let cond = parse_condition(
            r#"header.user-agent CONTAINS "Mobile" AND path STARTS_WITH "/shop""#,
        )
        .unwrap();
        assert!(cond.evaluate(&mobile_shop()));
        assert!(!cond.evaluate(&mobile_shop().with_path("/blog")));
    }

    #[test]
    fn or_and_parentheses() {
        let cond =
            parse_condition(r#"env == "client" OR (method == "GET" AND NOT path ENDS_WITH ".json")"#)
                .unwrap();
        assert!(cond.evaluate(&RequestContext::server().with_path("/home")));
        assert!(!cond.evaluate(&RequestContext::server().with_path("/feed.json")));
        assert!(cond.evaluate(&RequestContext::client().with_path("/feed.json")));
    }

    #[test]
    fn cookie_and_numeric_query() {
        let cond = parse_condition(r#"cookie.plan == "pro" AND query.page >= 2"#).unwrap();
        assert!(cond.evaluate(&mobile_shop()));

        let cond = parse_condition("cookie.visits < 5").unwrap();
        assert!(!cond.evaluate(&mobile_shop()));
    }

    #[test]
    fn regex_matches() {
        let cond = parse_condition(r#"query.utm_source MATCHES "^news""#).unwrap();
        assert!(cond.evaluate(&mobile_shop()));

        let cond = parse_condition(r#"query.utm_source NOT MATCHES "^news""#).unwrap();
        assert!(!cond.evaluate(&mobile_shop()));
    }

    #[test]
    fn bare_word_values() {
        let cond = parse_condition("method == GET AND path == /shop/cart").unwrap();
        assert!(cond.evaluate(&mobile_shop()));
    }

    #[test]
    fn dash_prefixed_bare_word() {
        let cond = parse_condition("query.ref == -direct").unwrap();
        assert!(cond.evaluate(&RequestContext::server().with_query_string("ref=-direct")));
        assert!(!cond.evaluate(&RequestContext::server().with_query_string("ref=direct")));
    }

    #[test]
    fn negative_numbers_still_numeric() {
        let cond = parse_condition("query.offset < -5").unwrap();
        assert!(cond.evaluate(&RequestContext::server().with_query_string("offset=-10")));
        assert!(!cond.evaluate(&RequestContext::server().with_query_string("offset=0")));

        let cond = parse_condition("query.offset == -2.5").unwrap();
        assert!(cond.evaluate(&RequestContext::server().with_query_string("offset=-2.50")));
    }

    #[test]
    fn empty_condition_is_always() {
        let cond = parse_condition("  ").unwrap();
        assert!(cond.evaluate(&RequestContext::server()));
    }

    #[test]
    fn invalid_conditions_rejected() {
        assert!(parse_condition("CONTAINS").is_err());
        assert!(parse_condition(r#"path BADOP "y""#).is_err());
        assert!(parse_condition(r#"body CONTAINS "x""#).is_err());
        assert!(parse_condition(r#"(path == "/""#).is_err());
        assert!(parse_condition(r#"path == "/" ;"#).is_err());
        assert!(parse_condition(r#"path NOT == "/""#).is_err());
    }

    #[test]
    fn invalid_regex_rejected_at_parse_time() {
        let err = parse_condition(r#"path MATCHES "([""#).unwrap_err();
        assert!(matches!(err, RuleError::InvalidPattern { .. }));
    }
}
