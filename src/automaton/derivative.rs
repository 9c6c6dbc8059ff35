//! Brzozowski Derivatives
//!
//! The derivative of an expression with respect to a symbol is the residual
//! obligation after observing that symbol. Successive derivatives of a finite
//! expression tree fall into finitely many canonical classes, which become
//! the automaton's states. Canonicalization normalizes Union up to
//! associativity, commutativity and idempotence, and collapses trivial Seq
//! and Star shapes, so equivalent derivatives hash to the same state.

use crate::contract::types::{EventSym, FutureExpr};

/// Whether the expression accepts the empty event sequence
pub fn nullable(expr: &FutureExpr) -> bool {
    match expr {
        FutureExpr::Empty => false,
        FutureExpr::Epsilon => true,
        FutureExpr::Event(_) | FutureExpr::Complement(_) => false,
        FutureExpr::Seq(a, b) => nullable(a) && nullable(b),
        FutureExpr::Union(a, b) => nullable(a) || nullable(b),
        FutureExpr::Star(_) => true,
    }
}

/// Canonical form: Union flattened, sorted and deduplicated; `Empty`
/// annihilates Seq and is the Union unit; nested Star collapses.
pub fn normalize(expr: &FutureExpr) -> FutureExpr {
    match expr {
        FutureExpr::Empty
        | FutureExpr::Epsilon
        | FutureExpr::Event(_)
        | FutureExpr::Complement(_) => expr.clone(),
        FutureExpr::Seq(_, _) => {
            let mut items = Vec::new();
            flatten_seq(expr, &mut items);
            if items.iter().any(|e| matches!(e, FutureExpr::Empty)) {
                return FutureExpr::Empty;
            }
            items.retain(|e| !matches!(e, FutureExpr::Epsilon));
            rebuild_seq(items)
        }
        FutureExpr::Union(_, _) => {
            let mut items = Vec::new();
            flatten_union(expr, &mut items);
            items.retain(|e| !matches!(e, FutureExpr::Empty));
            items.sort();
            items.dedup();
            rebuild_union(items)
        }
        FutureExpr::Star(inner) => match normalize(inner) {
            FutureExpr::Empty | FutureExpr::Epsilon => FutureExpr::Epsilon,
            FutureExpr::Star(e) => FutureExpr::Star(e),
            e => FutureExpr::Star(Box::new(e)),
        },
    }
}

fn flatten_seq(expr: &FutureExpr, out: &mut Vec<FutureExpr>) {
    if let FutureExpr::Seq(a, b) = expr {
        flatten_seq(a, out);
        flatten_seq(b, out);
    } else {
        out.push(normalize(expr));
    }
}

fn rebuild_seq(items: Vec<FutureExpr>) -> FutureExpr {
    let mut iter = items.into_iter().rev();
    let Some(last) = iter.next() else {
        return FutureExpr::Epsilon;
    };
    iter.fold(last, |acc, item| FutureExpr::seq(item, acc))
}

fn flatten_union(expr: &FutureExpr, out: &mut Vec<FutureExpr>) {
    if let FutureExpr::Union(a, b) = expr {
        flatten_union(a, out);
        flatten_union(b, out);
    } else {
        out.push(normalize(expr));
    }
}

fn rebuild_union(items: Vec<FutureExpr>) -> FutureExpr {
    let mut iter = items.into_iter().rev();
    let Some(last) = iter.next() else {
        return FutureExpr::Empty;
    };
    iter.fold(last, |acc, item| FutureExpr::union(item, acc))
}

/// Derivative of `expr` with respect to the concrete event `symbol`.
///
/// The result is canonical. `Empty` means the symbol is a violation in the
/// state `expr` denotes.
pub fn derive(expr: &FutureExpr, symbol: &str) -> FutureExpr {
    let raw = match expr {
        FutureExpr::Empty | FutureExpr::Epsilon => FutureExpr::Empty,
        FutureExpr::Event(sym) => {
            if sym.matches(symbol) {
                FutureExpr::Epsilon
            } else {
                FutureExpr::Empty
            }
        }
        FutureExpr::Complement(sym) => match sym {
            // `!e` matches any single event other than `e`
            EventSym::Named(name) if name != symbol => FutureExpr::Epsilon,
            // `!_` matches no event at all
            _ => FutureExpr::Empty,
        },
        FutureExpr::Seq(a, b) => {
            let left = FutureExpr::seq(derive(a, symbol), (**b).clone());
            if nullable(a) {
                FutureExpr::union(left, derive(b, symbol))
            } else {
                left
            }
        }
        FutureExpr::Union(a, b) => FutureExpr::union(derive(a, symbol), derive(b, symbol)),
        FutureExpr::Star(a) => FutureExpr::seq(derive(a, symbol), FutureExpr::Star(a.clone())),
    };
    normalize(&raw)
}
