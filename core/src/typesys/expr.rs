//! Type expressions: syntax, unification, subtyping.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeExpr {
    Base {
        name: String,
    },
    Variable {
        name: String,
    },
    Unit,
    Void,
    Arrow {
        left: Box<TypeExpr>,
        right: Box<TypeExpr>,
    },
    Product {
        left: Box<TypeExpr>,
        right: Box<TypeExpr>,
    },
    Sum {
        left: Box<TypeExpr>,
        right: Box<TypeExpr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Base,
    Variable,
    Unit,
    Void,
    Arrow,
    Product,
    Sum,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Base => "base",
            Self::Variable => "variable",
            Self::Unit => "unit",
            Self::Void => "void",
            Self::Arrow => "arrow",
            Self::Product => "product",
            Self::Sum => "sum",
        })
    }
}

pub type Substitution = BTreeMap<String, TypeExpr>;

impl TypeExpr {
    #[must_use]
    pub fn base(name: impl Into<String>) -> Self {
        Self::Base { name: name.into() }
    }

    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable { name: name.into() }
    }

    #[must_use]
    pub fn arrow(left: Self, right: Self) -> Self {
        Self::Arrow {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn product(left: Self, right: Self) -> Self {
        Self::Product {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn sum(left: Self, right: Self) -> Self {
        Self::Sum {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn kind(&self) -> TypeKind {
        match self {
            Self::Base { .. } => TypeKind::Base,
            Self::Variable { .. } => TypeKind::Variable,
            Self::Unit => TypeKind::Unit,
            Self::Void => TypeKind::Void,
            Self::Arrow { .. } => TypeKind::Arrow,
            Self::Product { .. } => TypeKind::Product,
            Self::Sum { .. } => TypeKind::Sum,
        }
    }

    fn children(&self) -> Option<(&Self, &Self)> {
        match self {
            Self::Arrow { left, right } | Self::Product { left, right } | Self::Sum { left, right } => {
                Some((&**left, &**right))
            }
            _ => None,
        }
    }

    fn rebuild(&self, left: Self, right: Self) -> Self {
        match self {
            Self::Arrow { .. } => Self::arrow(left, right),
            Self::Product { .. } => Self::product(left, right),
            _ => Self::sum(left, right),
        }
    }

    #[must_use]
    pub fn occurs(&self, name: &str) -> bool {
        match self {
            Self::Variable { name: n } => n == name,
            other => other
                .children()
                .is_some_and(|(l, r)| l.occurs(name) || r.occurs(name)),
        }
    }

    /// Replace bound variables, following chains in `subst`.
    #[must_use]
    pub fn apply(&self, subst: &Substitution) -> Self {
        match self {
            Self::Variable { name } => match subst.get(name) {
                Some(bound) if bound != self => bound.apply(subst),
                _ => self.clone(),
            },
            other => match other.children() {
                Some((l, r)) => other.rebuild(l.apply(subst), r.apply(subst)),
                None => other.clone(),
            },
        }
    }

    fn fmt_prec(&self, f: &mut fmt::Formatter<'_>, prec: u8) -> fmt::Result {
        let (own, left_prec, right_prec, op) = match self {
            Self::Base { name } => return f.write_str(name),
            Self::Variable { name } => return write!(f, "'{name}"),
            Self::Unit => return f.write_str("1"),
            Self::Void => return f.write_str("0"),
            Self::Arrow { .. } => (0, 1, 0, " -> "),
            Self::Sum { .. } => (1, 1, 2, " + "),
            Self::Product { .. } => (2, 2, 3, " * "),
        };
        let Some((left, right)) = self.children() else {
            return Ok(());
        };
        let parens = prec > own;
        if parens {
            f.write_str("(")?;
        }
        left.fmt_prec(f, left_prec)?;
        f.write_str(op)?;
        right.fmt_prec(f, right_prec)?;
        if parens {
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_prec(f, 0)
    }
}

// ── Unification and subtyping ────────────────────────────────

/// Most general unifier of `a` and `b`, if any.
#[must_use]
pub fn unify(a: &TypeExpr, b: &TypeExpr) -> Option<Substitution> {
    let mut subst = Substitution::new();
    unify_into(a, b, &mut subst).then_some(subst)
}

fn unify_into(a: &TypeExpr, b: &TypeExpr, subst: &mut Substitution) -> bool {
    let a = a.apply(subst);
    let b = b.apply(subst);
    match (&a, &b) {
        (TypeExpr::Variable { name: x }, TypeExpr::Variable { name: y }) if x == y => true,
        (TypeExpr::Variable { name }, other) | (other, TypeExpr::Variable { name }) => {
            if other.occurs(name) {
                return false;
            }
            subst.insert(name.clone(), other.clone());
            true
        }
        (TypeExpr::Base { name: x }, TypeExpr::Base { name: y }) => x == y,
        (TypeExpr::Unit, TypeExpr::Unit) | (TypeExpr::Void, TypeExpr::Void) => true,
        _ if a.kind() == b.kind() => match (a.children(), b.children()) {
            (Some((al, ar)), Some((bl, br))) => {
                unify_into(al, bl, subst) && unify_into(ar, br, subst)
            }
            _ => false,
        },
        _ => false,
    }
}

/// `a <: b`. Variables are compatible with anything.
#[must_use]
pub fn is_subtype(a: &TypeExpr, b: &TypeExpr) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (TypeExpr::Void | TypeExpr::Variable { .. }, _)
        | (_, TypeExpr::Unit | TypeExpr::Variable { .. }) => true,
        (
            TypeExpr::Arrow {
                left: a1,
                right: a2,
            },
            TypeExpr::Arrow {
                left: b1,
                right: b2,
            },
        ) => is_subtype(b1, a1) && is_subtype(a2, b2),
        (
            TypeExpr::Product {
                left: a1,
                right: a2,
            },
            TypeExpr::Product {
                left: b1,
                right: b2,
            },
        )
        | (
            TypeExpr::Sum {
                left: a1,
                right: a2,
            },
            TypeExpr::Sum {
                left: b1,
                right: b2,
            },
        ) => is_subtype(a1, b1) && is_subtype(a2, b2),
        _ => false,
    }
}

// ── Parsing ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid type `{input}` at offset {offset}: {message}")]
pub struct TypeParseError {
    pub input: String,
    pub offset: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Var(String),
    One,
    Zero,
    Arrow,
    Star,
    Plus,
    Open,
    Close,
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self, TypeParseError> {
        Ok(Self {
            input,
            tokens: tokenize(input)?,
            pos: 0,
        })
    }

    fn error(&self, message: impl Into<String>) -> TypeParseError {
        let offset = self
            .tokens
            .get(self.pos)
            .map_or(self.input.len(), |(offset, _)| *offset);
        TypeParseError {
            input: self.input.to_string(),
            offset,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn arrow(&mut self) -> Result<TypeExpr, TypeParseError> {
        let left = self.sum()?;
        if self.eat(&Token::Arrow) {
            let right = self.arrow()?;
            return Ok(TypeExpr::arrow(left, right));
        }
        Ok(left)
    }

    fn sum(&mut self) -> Result<TypeExpr, TypeParseError> {
        let mut left = self.product()?;
        while self.eat(&Token::Plus) {
            left = TypeExpr::sum(left, self.product()?);
        }
        Ok(left)
    }

    fn product(&mut self) -> Result<TypeExpr, TypeParseError> {
        let mut left = self.atom()?;
        while self.eat(&Token::Star) {
            left = TypeExpr::product(left, self.atom()?);
        }
        Ok(left)
    }

    fn atom(&mut self) -> Result<TypeExpr, TypeParseError> {
        let Some((_, token)) = self.tokens.get(self.pos).cloned() else {
            return Err(self.error("unexpected end of input"));
        };
        self.pos += 1;
        match token {
            Token::Ident(name) => Ok(TypeExpr::Base { name }),
            Token::Var(name) => Ok(TypeExpr::Variable { name }),
            Token::One => Ok(TypeExpr::Unit),
            Token::Zero => Ok(TypeExpr::Void),
            Token::Open => {
                let inner = self.arrow()?;
                if !self.eat(&Token::Close) {
                    return Err(self.error("expected `)`"));
                }
                Ok(inner)
            }
            _ => {
                self.pos -= 1;
                Err(self.error("expected a type"))
            }
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, TypeParseError> {
    let fail = |offset: usize, message: &str| TypeParseError {
        input: input.to_string(),
        offset,
        message: message.to_string(),
    };
    let is_ident = |c: char| c.is_alphanumeric() || c == '_';

    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some((offset, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '(' => Token::Open,
            ')' => Token::Close,
            '*' | '×' => Token::Star,
            '+' => Token::Plus,
            '→' => Token::Arrow,
            '-' => {
                if chars.next_if(|(_, c)| *c == '>').is_none() {
                    return Err(fail(offset, "expected `->`"));
                }
                Token::Arrow
            }
            '1' if !chars.peek().is_some_and(|(_, c)| is_ident(*c)) => Token::One,
            '0' if !chars.peek().is_some_and(|(_, c)| is_ident(*c)) => Token::Zero,
            '\'' => {
                let mut name = String::new();
                while let Some((_, c)) = chars.next_if(|(_, c)| is_ident(*c)) {
                    name.push(c);
                }
                if name.is_empty() {
                    return Err(fail(offset, "expected a variable name after `'`"));
                }
                Token::Var(name)
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::from(c);
                while let Some((_, c)) = chars.next_if(|(_, c)| is_ident(*c)) {
                    name.push(c);
                }
                Token::Ident(name)
            }
            _ => return Err(fail(offset, "unexpected character")),
        };
        tokens.push((offset, token));
    }
    Ok(tokens)
}

impl FromStr for TypeExpr {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser::new(s)?;
        let expr = parser.arrow()?;
        if parser.pos < parser.tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(expr)
    }
}

/// A base-type name built from free text: identifier characters kept, the
/// rest folded to `_`.
#[must_use]
pub fn type_name(text: &str) -> String {
    let name: String = text
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    match name.chars().next() {
        None => "atom".to_string(),
        Some(first) if first.is_numeric() => format!("_{name}"),
        Some(_) => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> TypeExpr {
        s.parse().expect("valid type")
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(
            parse("A * B + C -> D -> E"),
            TypeExpr::arrow(
                TypeExpr::sum(
                    TypeExpr::product(TypeExpr::base("A"), TypeExpr::base("B")),
                    TypeExpr::base("C")
                ),
                TypeExpr::arrow(TypeExpr::base("D"), TypeExpr::base("E")),
            )
        );
        assert_eq!(parse("'a → 1 × 0"), parse("'a -> (1 * 0)"));
    }

    #[test]
    fn display_reparses_to_the_same_tree() {
        for text in [
            "(A -> B) -> C",
            "A -> B -> C",
            "A + (B + C)",
            "(A + B) * C",
            "'T0 * 'T1 * Nat",
            "1 + 0",
        ] {
            let expr = parse(text);
            assert_eq!(parse(&expr.to_string()), expr, "{text}");
        }
        assert_eq!(parse("A -> (B -> C)").to_string(), "A -> B -> C");
    }

    #[test]
    fn parse_errors_carry_offsets() {
        let err = "A -> ".parse::<TypeExpr>().expect_err("incomplete");
        assert_eq!(err.offset, 5);
        let err = "A $ B".parse::<TypeExpr>().expect_err("bad char");
        assert_eq!(err.offset, 2);
        assert!("(A".parse::<TypeExpr>().is_err());
        assert!("A B".parse::<TypeExpr>().is_err());
    }

    #[test]
    fn serde_is_tagged_by_kind() {
        let json = serde_json::to_string(&parse("'a -> 1")).expect("serialize");
        assert_eq!(
            json,
            r#"{"kind":"arrow","left":{"kind":"variable","name":"a"},"right":{"kind":"unit"}}"#
        );
    }

    #[test]
    fn unify_binds_variables() {
        let subst = unify(&parse("'a -> B"), &parse("A -> 'b")).expect("unifies");
        assert_eq!(subst.get("a"), Some(&TypeExpr::base("A")));
        assert_eq!(subst.get("b"), Some(&TypeExpr::base("B")));
        assert!(unify(&parse("A"), &parse("B")).is_none());
        assert!(unify(&parse("A * B"), &parse("A + B")).is_none());
    }

    #[test]
    fn unify_respects_occurs_check() {
        assert!(unify(&parse("'a"), &parse("'a -> B")).is_none());
        let subst = unify(&parse("'a * 'a"), &parse("'b * C")).expect("unifies");
        assert_eq!(parse("'a").apply(&subst), TypeExpr::base("C"));
    }

    #[test]
    fn subtyping_rules() {
        assert!(is_subtype(&TypeExpr::Void, &parse("A -> B")));
        assert!(is_subtype(&parse("A * B"), &TypeExpr::Unit));
        // Contravariant domain.
        assert!(is_subtype(&parse("1 -> A"), &parse("B -> A")));
        assert!(!is_subtype(&parse("B -> A"), &parse("1 -> A")));
        assert!(is_subtype(&parse("0 + A"), &parse("B + A")));
        assert!(!is_subtype(&parse("A"), &parse("B")));
    }

    #[test]
    fn type_names_are_identifiers() {
        assert_eq!(type_name("claim about X"), "claim_about_X");
        assert_eq!(type_name("2nd"), "_2nd");
        assert_eq!(type_name("  "), "atom");
    }
}
