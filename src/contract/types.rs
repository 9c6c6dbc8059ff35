//! Contract Data Types
//!
//! Guards, post effects, and the future-expression AST that make up a
//! parsed contract.

use crate::event::types::ArgValue;
use std::fmt;
use std::sync::Arc;

/// Right-hand operand of a guard comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOperand {
    /// Integer literal (zero in almost all contracts)
    Int(i64),
    /// Named parameter of the call
    Param(String),
}

impl fmt::Display for GuardOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardOperand::Int(n) => write!(f, "{}", n),
            GuardOperand::Param(p) => write!(f, "{}", p),
        }
    }
}

/// Boolean predicate over a call's arguments and return value.
///
/// Guards are restricted to equality/inequality against an integer literal
/// or a named parameter, plus the trivial `TRUE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// Always satisfied
    True,
    /// `var = operand`
    Eq(String, GuardOperand),
    /// `!(var = operand)`
    Neq(String, GuardOperand),
}

impl Guard {
    /// Evaluate the guard against concrete call values.
    ///
    /// `resolve` maps a variable name (`ret` or a parameter) to its value.
    /// Branch selection uses satisfiability semantics: a comparison involving
    /// an unknown value is satisfiable and therefore counts as satisfied.
    pub fn evaluate<F>(&self, resolve: F) -> bool
    where
        F: Fn(&str) -> ArgValue,
    {
        match self {
            Guard::True => true,
            Guard::Eq(var, operand) => match (resolve(var), Self::operand_value(operand, &resolve))
            {
                (ArgValue::Int(a), Some(b)) => a == b,
                _ => true,
            },
            Guard::Neq(var, operand) => match (resolve(var), Self::operand_value(operand, &resolve))
            {
                (ArgValue::Int(a), Some(b)) => a != b,
                _ => true,
            },
        }
    }

    fn operand_value<F>(operand: &GuardOperand, resolve: &F) -> Option<i64>
    where
        F: Fn(&str) -> ArgValue,
    {
        match operand {
            GuardOperand::Int(n) => Some(*n),
            GuardOperand::Param(p) => match resolve(p) {
                ArgValue::Int(n) => Some(n),
                ArgValue::Unknown => None,
            },
        }
    }

    /// Whether this guard and `other` can be satisfied by the same call.
    ///
    /// Conservative: returns `false` only for provably disjoint pairs
    /// (`x = a` vs `x = b` with distinct literals, or `x = a` vs `!(x = a)`).
    pub fn jointly_satisfiable(&self, other: &Guard) -> bool {
        match (self, other) {
            (Guard::True, _) | (_, Guard::True) => true,
            (Guard::Eq(v1, o1), Guard::Eq(v2, o2)) => {
                if v1 != v2 {
                    return true;
                }
                match (o1, o2) {
                    (GuardOperand::Int(a), GuardOperand::Int(b)) => a == b,
                    _ => true,
                }
            }
            (Guard::Eq(v1, o1), Guard::Neq(v2, o2))
            | (Guard::Neq(v1, o1), Guard::Eq(v2, o2)) => !(v1 == v2 && o1 == o2),
            (Guard::Neq(_, _), Guard::Neq(_, _)) => true,
        }
    }

    /// Whether this guard tests `var` for null (`var = 0`).
    ///
    /// Values created under a null guard are tracked as null-origin: any
    /// later event on them is a null dereference.
    pub fn is_null_test(&self, var: &str) -> bool {
        matches!(self, Guard::Eq(v, GuardOperand::Int(0)) if v == var)
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guard::True => write!(f, "TRUE"),
            Guard::Eq(var, op) => write!(f, "{}={}", var, op),
            Guard::Neq(var, op) => write!(f, "!({}={})", var, op),
        }
    }
}

/// Effect selected by a satisfied Post guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostEffect {
    /// No new event (`𝝐`)
    Epsilon,
    /// A named event bound to one of the call's identities
    Event { name: String, binding: String },
    /// Ownership transfer: the bound value's automaton is retired
    Consume { binding: String },
}

impl fmt::Display for PostEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostEffect::Epsilon => write!(f, "\u{1D750}"),
            PostEffect::Event { name, binding } => write!(f, "{}({})", name, binding),
            PostEffect::Consume { binding } => write!(f, "consume({})", binding),
        }
    }
}

/// Event symbol in a future expression: a named event or the `_` wildcard
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventSym {
    /// A named event, e.g. `free`
    Named(String),
    /// Any event (`_`)
    Any,
}

impl EventSym {
    /// Whether this symbol class matches the concrete event `name`
    pub fn matches(&self, name: &str) -> bool {
        match self {
            EventSym::Named(n) => n == name,
            EventSym::Any => true,
        }
    }
}

impl fmt::Display for EventSym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSym::Named(n) => write!(f, "{}", n),
            EventSym::Any => write!(f, "_"),
        }
    }
}

/// Algebraic regular expression over the event alphabet.
///
/// This is the "Future" temporal obligation language: the sequence of events
/// subsequently observed on a tracked value must match the expression.
/// `Empty` (the void language ∅) never appears in parsed contracts; it arises
/// as a derivative and denotes the reject state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FutureExpr {
    /// The void language: matches nothing
    Empty,
    /// The empty sequence (`𝝐`)
    Epsilon,
    /// A single event symbol
    Event(EventSym),
    /// Any single event other than the symbol (`!e`)
    Complement(EventSym),
    /// Concatenation (`·`)
    Seq(Box<FutureExpr>, Box<FutureExpr>),
    /// Alternation (`\/`)
    Union(Box<FutureExpr>, Box<FutureExpr>),
    /// Kleene repetition (`^*`)
    Star(Box<FutureExpr>),
}

impl FutureExpr {
    /// Convenience constructor for `Seq`
    pub fn seq(a: FutureExpr, b: FutureExpr) -> FutureExpr {
        FutureExpr::Seq(Box::new(a), Box::new(b))
    }

    /// Convenience constructor for `Union`
    pub fn union(a: FutureExpr, b: FutureExpr) -> FutureExpr {
        FutureExpr::Union(Box::new(a), Box::new(b))
    }

    /// Convenience constructor for `Star`
    pub fn star(e: FutureExpr) -> FutureExpr {
        FutureExpr::Star(Box::new(e))
    }

    /// Convenience constructor for a named event atom
    pub fn event(name: &str) -> FutureExpr {
        FutureExpr::Event(EventSym::Named(name.to_string()))
    }

    /// All named event symbols referenced by the expression
    pub fn named_events(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_named(&mut out);
        out.sort();
        out.dedup();
        out
    }

    fn collect_named(&self, out: &mut Vec<String>) {
        match self {
            FutureExpr::Empty | FutureExpr::Epsilon => {}
            FutureExpr::Event(sym) | FutureExpr::Complement(sym) => {
                if let EventSym::Named(n) = sym {
                    out.push(n.clone());
                }
            }
            FutureExpr::Seq(a, b) | FutureExpr::Union(a, b) => {
                a.collect_named(out);
                b.collect_named(out);
            }
            FutureExpr::Star(e) => e.collect_named(out),
        }
    }
}

impl fmt::Display for FutureExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FutureExpr::Empty => write!(f, "\u{2205}"),
            FutureExpr::Epsilon => write!(f, "\u{1D750}"),
            FutureExpr::Event(sym) => write!(f, "{}", sym),
            FutureExpr::Complement(sym) => write!(f, "!{}", sym),
            FutureExpr::Seq(a, b) => write!(f, "{} \u{00B7} {}", a, b),
            FutureExpr::Union(a, b) => write!(f, "({} \\/ {})", a, b),
            FutureExpr::Star(e) => write!(f, "({})^*", e),
        }
    }
}

/// One guarded Post branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostBranch {
    /// Branch guard; branches are tried in declaration order
    pub guard: Guard,
    /// Effect applied when the guard is satisfied
    pub effect: PostEffect,
}

/// One guarded Future branch
#[derive(Debug, Clone)]
pub struct FutureBranch {
    /// Branch guard; branches are tried in declaration order
    pub guard: Guard,
    /// The single identity variable the expression tracks
    pub binding: String,
    /// The temporal obligation
    pub expr: FutureExpr,
    /// Compiled automaton; populated by `Registry::compile`
    pub dfa: Option<Arc<crate::automaton::dfa::Dfa>>,
}

/// Declared usage rule for one library function
#[derive(Debug, Clone)]
pub struct Contract {
    /// Function name
    pub name: String,
    /// Ordered parameter names
    pub params: Vec<String>,
    /// Ordered Post branches; first satisfiable guard wins
    pub post: Vec<PostBranch>,
    /// Ordered Future branches; first satisfiable guard wins
    pub future: Vec<FutureBranch>,
    /// Verbatim source text, kept for byte-identical re-registration
    pub source: String,
}

impl Contract {
    /// Number of declared parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Event names declared by this contract's Post effects
    pub fn declared_events(&self) -> Vec<String> {
        self.post
            .iter()
            .filter_map(|b| match &b.effect {
                PostEffect::Event { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}
