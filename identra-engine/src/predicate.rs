//! Compilation and evaluation of dynamic-membership conditions.
//!
//! A condition is a boolean expression over entity attributes:
//!
//! ```text
//! department == "engineering" AND (age >= 30 OR exists(clearance))
//! ```
//!
//! Comparisons: `==` `!=` `>` `>=` `<` `<=` `startswith` `contains`, plus
//! `exists(attr)`. Combinators: `AND` `OR` `NOT`, left-associative; mixing
//! `AND` and `OR` requires explicit parentheses. String literals are quoted;
//! numbers and `true`/`false` are bare; dates are quoted ISO-8601 strings
//! compared lexicographically against `date`-typed fields.
//!
//! Compilation validates every attribute reference against the targeted
//! kind's schema; evaluation is pure and never touches the store except
//! through the bulk [`Predicate::select`] form.

use crate::error::{EngineError, EngineResult};
use identra_model::{AttrValue, Directory, Entity, FieldType, KindSchema};
use identra_types::{AnyTypeKey, EntityKey, EntityKind};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    StartsWith,
    Contains,
}

impl CmpOp {
    fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::StartsWith => "startswith",
            CmpOp::Contains => "contains",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Text(String),
    Number(i64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Cmp {
        attr: String,
        op: CmpOp,
        value: Literal,
    },
    Exists(String),
    Not(Box<Node>),
    And(Vec<Node>),
    Or(Vec<Node>),
}

/// A compiled, schema-checked condition targeting one entity kind.
#[derive(Debug, Clone)]
pub struct Predicate {
    kind: EntityKind,
    any_type: Option<AnyTypeKey>,
    root: Node,
}

impl Predicate {
    /// Compiles condition text against the given kind schema.
    ///
    /// Fails with [`EngineError::Syntax`] on malformed input and with
    /// [`EngineError::InvalidAnyType`] when the condition references an
    /// attribute the schema does not define, or pairs an operator with an
    /// incompatible field type.
    pub fn compile(schema: &KindSchema, text: &str) -> EngineResult<Self> {
        let tokens = tokenize(text)?;
        if tokens.is_empty() {
            return Err(EngineError::Syntax("empty condition".into()));
        }
        let mut cursor = Cursor { tokens, pos: 0 };
        let (root, _) = parse_or(&mut cursor)?;
        if cursor.pos < cursor.tokens.len() {
            return Err(EngineError::Syntax(format!(
                "unexpected trailing input at token {}",
                cursor.pos + 1
            )));
        }
        typecheck(&root, schema)?;
        Ok(Self {
            kind: schema.kind,
            any_type: schema.any_type.clone(),
            root,
        })
    }

    /// The entity kind this predicate targets.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// The any-object type this predicate targets, when kind is `AnyObject`.
    pub fn any_type(&self) -> Option<&AnyTypeKey> {
        self.any_type.as_ref()
    }

    /// Evaluates the condition against one entity. Pure; entities of a
    /// different kind or any-object type never match.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        if entity.kind != self.kind || entity.any_type != self.any_type {
            return false;
        }
        eval(&self.root, entity)
    }

    /// Bulk form used for materialization: keys of every entity of the
    /// targeted kind currently satisfying the condition. Consistent with
    /// iterating [`Predicate::matches`] over the full candidate set.
    pub fn select(&self, dir: &dyn Directory) -> EngineResult<BTreeSet<EntityKey>> {
        Ok(dir.select(self.kind, self.any_type.as_ref(), &|e| self.matches(e))?)
    }
}

// ── Tokenizer ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(i64),
    LParen,
    RParen,
    Op(CmpOp),
}

fn tokenize(text: &str) -> EngineResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
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
                        Some(ch) if ch == quote => break,
                        Some(ch) => s.push(ch),
                        None => {
                            return Err(EngineError::Syntax("unterminated string literal".into()));
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            '=' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Op(CmpOp::Eq));
                } else {
                    return Err(EngineError::Syntax("expected '==' after '='".into()));
                }
            }
            '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Op(CmpOp::Ne));
                } else {
                    return Err(EngineError::Syntax("expected '!=' after '!'".into()));
                }
            }
            '>' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Op(CmpOp::Ge));
                } else {
                    tokens.push(Token::Op(CmpOp::Gt));
                }
            }
            '<' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Op(CmpOp::Le));
                } else {
                    tokens.push(Token::Op(CmpOp::Lt));
                }
            }
            '-' | '0'..='9' => {
                let mut s = String::new();
                s.push(c);
                chars.next();
                while let Some(d) = chars.next_if(|ch| ch.is_ascii_digit()) {
                    s.push(d);
                }
                let n = s
                    .parse::<i64>()
                    .map_err(|_| EngineError::Syntax(format!("bad number literal: {s}")))?;
                tokens.push(Token::Num(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut s = String::new();
                while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                    s.push(ch);
                }
                tokens.push(Token::Ident(s));
            }
            other => {
                return Err(EngineError::Syntax(format!("unexpected character: {other}")));
            }
        }
    }
    Ok(tokens)
}

// ── Parser ───────────────────────────────────────────────────────

struct Cursor {
    tokens: Vec<Token>,
    pos: usize,
}

impl Cursor {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn peek_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(word))
    }
}

/// Parses an OR-chain. Returns the node plus whether it is a bare
/// (unparenthesized) AND-chain, which the caller needs to reject mixing.
fn parse_or(cur: &mut Cursor) -> EngineResult<(Node, bool)> {
    let (first, first_bare_and) = parse_and(cur)?;
    if !cur.peek_keyword("or") {
        return Ok((first, first_bare_and));
    }
    let mut branches = vec![(first, first_bare_and)];
    while cur.peek_keyword("or") {
        cur.next();
        branches.push(parse_and(cur)?);
    }
    if branches.iter().any(|(_, bare)| *bare) {
        return Err(EngineError::Syntax(
            "mixed AND/OR requires explicit parentheses".into(),
        ));
    }
    Ok((Node::Or(branches.into_iter().map(|(n, _)| n).collect()), false))
}

fn parse_and(cur: &mut Cursor) -> EngineResult<(Node, bool)> {
    let first = parse_unary(cur)?;
    if !cur.peek_keyword("and") {
        return Ok((first, false));
    }
    let mut parts = vec![first];
    while cur.peek_keyword("and") {
        cur.next();
        parts.push(parse_unary(cur)?);
    }
    Ok((Node::And(parts), true))
}

fn parse_unary(cur: &mut Cursor) -> EngineResult<Node> {
    if cur.peek_keyword("not") {
        cur.next();
        return Ok(Node::Not(Box::new(parse_unary(cur)?)));
    }
    parse_primary(cur)
}

fn parse_primary(cur: &mut Cursor) -> EngineResult<Node> {
    match cur.next() {
        Some(Token::LParen) => {
            let (node, _) = parse_or(cur)?;
            match cur.next() {
                Some(Token::RParen) => Ok(node),
                _ => Err(EngineError::Syntax("expected ')'".into())),
            }
        }
        Some(Token::Ident(name)) if name.eq_ignore_ascii_case("exists") => {
            match (cur.next(), cur.next(), cur.next()) {
                (Some(Token::LParen), Some(Token::Ident(attr)), Some(Token::RParen)) => {
                    Ok(Node::Exists(attr))
                }
                _ => Err(EngineError::Syntax("expected exists(attribute)".into())),
            }
        }
        Some(Token::Ident(attr)) => {
            let op = match cur.next() {
                Some(Token::Op(op)) => op,
                Some(Token::Ident(word)) if word.eq_ignore_ascii_case("startswith") => {
                    CmpOp::StartsWith
                }
                Some(Token::Ident(word)) if word.eq_ignore_ascii_case("contains") => {
                    CmpOp::Contains
                }
                _ => {
                    return Err(EngineError::Syntax(format!(
                        "expected comparison operator after '{attr}'"
                    )));
                }
            };
            let value = match cur.next() {
                Some(Token::Str(s)) => Literal::Text(s),
                Some(Token::Num(n)) => Literal::Number(n),
                Some(Token::Ident(word)) if word.eq_ignore_ascii_case("true") => {
                    Literal::Bool(true)
                }
                Some(Token::Ident(word)) if word.eq_ignore_ascii_case("false") => {
                    Literal::Bool(false)
                }
                _ => {
                    return Err(EngineError::Syntax(format!(
                        "expected literal after '{attr} {}'",
                        op.symbol()
                    )));
                }
            };
            Ok(Node::Cmp { attr, op, value })
        }
        other => Err(EngineError::Syntax(format!(
            "expected condition, found {other:?}"
        ))),
    }
}

// ── Schema check ─────────────────────────────────────────────────

fn typecheck(node: &Node, schema: &KindSchema) -> EngineResult<()> {
    match node {
        Node::And(parts) | Node::Or(parts) => {
            for part in parts {
                typecheck(part, schema)?;
            }
            Ok(())
        }
        Node::Not(inner) => typecheck(inner, schema),
        Node::Exists(attr) => {
            lookup(schema, attr)?;
            Ok(())
        }
        Node::Cmp { attr, op, value } => {
            let field = lookup(schema, attr)?;
            let compatible = match (field, value) {
                (FieldType::Text, Literal::Text(_)) => !matches!(
                    op,
                    CmpOp::Gt | CmpOp::Ge | CmpOp::Lt | CmpOp::Le
                ),
                (FieldType::Number, Literal::Number(_)) => {
                    !matches!(op, CmpOp::StartsWith | CmpOp::Contains)
                }
                (FieldType::Bool, Literal::Bool(_)) => matches!(op, CmpOp::Eq | CmpOp::Ne),
                (FieldType::Date, Literal::Text(_)) => {
                    !matches!(op, CmpOp::StartsWith | CmpOp::Contains)
                }
                _ => false,
            };
            if compatible {
                Ok(())
            } else {
                Err(EngineError::InvalidAnyType(format!(
                    "operator '{}' is not applicable to attribute '{attr}'",
                    op.symbol()
                )))
            }
        }
    }
}

fn lookup<'a>(schema: &'a KindSchema, attr: &str) -> EngineResult<FieldType> {
    schema
        .field(attr)
        .map(|f| f.field_type)
        .ok_or_else(|| {
            let target = match &schema.any_type {
                Some(t) => format!("any-object type '{t}'"),
                None => format!("kind '{}'", schema.kind),
            };
            EngineError::InvalidAnyType(format!(
                "attribute '{attr}' is not defined for {target}"
            ))
        })
}

// ── Evaluation ───────────────────────────────────────────────────

fn eval(node: &Node, entity: &Entity) -> bool {
    match node {
        Node::And(parts) => parts.iter().all(|p| eval(p, entity)),
        Node::Or(parts) => parts.iter().any(|p| eval(p, entity)),
        Node::Not(inner) => !eval(inner, entity),
        Node::Exists(attr) => entity.has_attr(attr),
        Node::Cmp { attr, op, value } => {
            let values = entity.attr_values(attr);
            match op {
                // `!=` needs a present attribute with no matching value;
                // absent attributes satisfy no comparison.
                CmpOp::Ne => {
                    !values.is_empty() && !values.iter().any(|v| value_eq(v, value))
                }
                CmpOp::Eq => values.iter().any(|v| value_eq(v, value)),
                _ => values.iter().any(|v| value_cmp(v, *op, value)),
            }
        }
    }
}

fn value_eq(value: &AttrValue, literal: &Literal) -> bool {
    match (value, literal) {
        (AttrValue::Text(a), Literal::Text(b)) => a == b,
        (AttrValue::Date(a), Literal::Text(b)) => a == b,
        (AttrValue::Int(a), Literal::Number(b)) => a == b,
        (AttrValue::Bool(a), Literal::Bool(b)) => a == b,
        _ => false,
    }
}

fn value_cmp(value: &AttrValue, op: CmpOp, literal: &Literal) -> bool {
    match (value, literal) {
        (AttrValue::Int(a), Literal::Number(b)) => match op {
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            _ => false,
        },
        // ISO-8601 dates order lexicographically.
        (AttrValue::Date(a), Literal::Text(b)) => match op {
            CmpOp::Gt => a.as_str() > b.as_str(),
            CmpOp::Ge => a.as_str() >= b.as_str(),
            CmpOp::Lt => a.as_str() < b.as_str(),
            CmpOp::Le => a.as_str() <= b.as_str(),
            _ => false,
        },
        (AttrValue::Text(a), Literal::Text(b)) => match op {
            CmpOp::StartsWith => a.starts_with(b.as_str()),
            CmpOp::Contains => a.contains(b.as_str()),
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use identra_model::AttrField;

    fn schema() -> KindSchema {
        KindSchema::user(vec![
            AttrField::text("username"),
            AttrField::text("department"),
            AttrField::number("age"),
            AttrField::bool("active"),
            AttrField::date("hired"),
        ])
    }

    fn user(attrs: &[(&str, AttrValue)]) -> Entity {
        let mut e = Entity::user("/");
        for (name, value) in attrs {
            e.set_attr(*name, vec![value.clone()]);
        }
        e
    }

    #[test]
    fn equality_matches() {
        let p = Predicate::compile(&schema(), "department == \"sales\"").unwrap();
        assert!(p.matches(&user(&[("department", AttrValue::Text("sales".into()))])));
        assert!(!p.matches(&user(&[("department", AttrValue::Text("hr".into()))])));
    }

    #[test]
    fn inequality_requires_present_attribute() {
        let p = Predicate::compile(&schema(), "department != \"sales\"").unwrap();
        assert!(p.matches(&user(&[("department", AttrValue::Text("hr".into()))])));
        assert!(!p.matches(&user(&[("department", AttrValue::Text("sales".into()))])));
        // absent attribute satisfies no comparison
        assert!(!p.matches(&user(&[])));
    }

    #[test]
    fn multi_valued_attribute_matches_any_value() {
        let p = Predicate::compile(&schema(), "department == \"sales\"").unwrap();
        let mut e = Entity::user("/");
        e.set_attr(
            "department",
            vec![
                AttrValue::Text("hr".into()),
                AttrValue::Text("sales".into()),
            ],
        );
        assert!(p.matches(&e));
    }

    #[test]
    fn numeric_range() {
        let p = Predicate::compile(&schema(), "age >= 30").unwrap();
        assert!(p.matches(&user(&[("age", AttrValue::Int(30))])));
        assert!(!p.matches(&user(&[("age", AttrValue::Int(29))])));
    }

    #[test]
    fn date_range_is_lexicographic() {
        let p = Predicate::compile(&schema(), "hired < \"2024-01-01\"").unwrap();
        assert!(p.matches(&user(&[("hired", AttrValue::Date("2023-11-30".into()))])));
        assert!(!p.matches(&user(&[("hired", AttrValue::Date("2024-02-01".into()))])));
    }

    #[test]
    fn startswith_and_contains() {
        let p = Predicate::compile(&schema(), "username startswith \"ros\"").unwrap();
        assert!(p.matches(&user(&[("username", AttrValue::Text("rossini".into()))])));
        let p = Predicate::compile(&schema(), "username contains \"ssi\"").unwrap();
        assert!(p.matches(&user(&[("username", AttrValue::Text("rossini".into()))])));
        assert!(!p.matches(&user(&[("username", AttrValue::Text("verdi".into()))])));
    }

    #[test]
    fn exists_and_not() {
        let p = Predicate::compile(&schema(), "NOT exists(department)").unwrap();
        assert!(p.matches(&user(&[])));
        assert!(!p.matches(&user(&[("department", AttrValue::Text("hr".into()))])));
    }

    #[test]
    fn grouping_with_parentheses() {
        let p = Predicate::compile(
            &schema(),
            "(department == \"sales\" AND age >= 30) OR active == true",
        )
        .unwrap();
        assert!(p.matches(&user(&[("active", AttrValue::Bool(true))])));
        assert!(p.matches(&user(&[
            ("department", AttrValue::Text("sales".into())),
            ("age", AttrValue::Int(40)),
        ])));
        assert!(!p.matches(&user(&[("department", AttrValue::Text("sales".into()))])));
    }

    #[test]
    fn mixed_and_or_without_parentheses_is_rejected() {
        let err = Predicate::compile(
            &schema(),
            "department == \"sales\" AND age >= 30 OR active == true",
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Syntax(_)), "{err}");
    }

    #[test]
    fn empty_condition_is_a_syntax_error() {
        assert!(matches!(
            Predicate::compile(&schema(), "   "),
            Err(EngineError::Syntax(_))
        ));
    }

    #[test]
    fn unterminated_string_is_a_syntax_error() {
        assert!(matches!(
            Predicate::compile(&schema(), "username == \"ross"),
            Err(EngineError::Syntax(_))
        ));
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        let err = Predicate::compile(&schema(), "shoe_size == 42").unwrap_err();
        assert!(matches!(err, EngineError::InvalidAnyType(_)), "{err}");
    }

    #[test]
    fn operator_type_mismatch_is_rejected() {
        let err = Predicate::compile(&schema(), "username >= 10").unwrap_err();
        assert!(matches!(err, EngineError::InvalidAnyType(_)), "{err}");
        let err = Predicate::compile(&schema(), "department contains 7").unwrap_err();
        assert!(matches!(err, EngineError::InvalidAnyType(_)), "{err}");
    }

    #[test]
    fn kind_mismatch_never_matches() {
        let p = Predicate::compile(&schema(), "username == \"rossini\"").unwrap();
        let mut printer = Entity::any_object("printer", "/");
        printer.set_attr("username", vec![AttrValue::Text("rossini".into())]);
        assert!(!p.matches(&printer));
    }
}
