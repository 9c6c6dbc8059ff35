//! Call Event Types
//!
//! Events are produced by the external C front end, one ordered sequence per
//! explored program path. Each call event carries the concrete values needed
//! for guard selection and a binding map from parameter names to the abstract
//! value identities assigned by the collaborator's alias analysis.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Abstract identity of a runtime value, assigned by the external front end.
///
/// Two identities denote the same runtime object only when the alias oracle
/// says so (via [`PathEvent::Alias`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValueId(pub u64);

impl std::fmt::Display for ValueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Concrete value of an argument or return, as far as the front end knows it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgValue {
    /// Known integer/pointer value (null is `Int(0)`)
    Int(i64),
    /// Unknown along this path; satisfies any guard comparison
    Unknown,
}

/// One call site occurrence along a program path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEvent {
    /// Source location of the call site, e.g. `"lxc_string_split.c:42"`
    pub site: String,
    /// Called function name
    pub function: String,
    /// Positional argument values
    pub args: Vec<ArgValue>,
    /// Return value
    pub ret: ArgValue,
    /// Identity bindings: parameter name (or `ret`) to abstract identity
    pub bindings: BTreeMap<String, ValueId>,
}

impl CallEvent {
    /// Create a call event with no arguments and an unknown return
    pub fn new(site: &str, function: &str) -> Self {
        Self {
            site: site.to_string(),
            function: function.to_string(),
            args: Vec::new(),
            ret: ArgValue::Unknown,
            bindings: BTreeMap::new(),
        }
    }

    /// Append a positional argument value
    pub fn with_arg(mut self, value: ArgValue) -> Self {
        self.args.push(value);
        self
    }

    /// Append a positional argument value bound to an identity.
    ///
    /// `param` must match the contract's declared parameter name for this
    /// position.
    pub fn with_bound_arg(mut self, param: &str, value: ArgValue, identity: u64) -> Self {
        self.args.push(value);
        self.bindings.insert(param.to_string(), ValueId(identity));
        self
    }

    /// Set the return value and bind it to an identity
    pub fn with_ret(mut self, value: ArgValue, identity: u64) -> Self {
        self.ret = value;
        self.bindings.insert("ret".to_string(), ValueId(identity));
        self
    }

    /// Identity bound to `var` (a parameter name or `ret`), if any
    pub fn identity_of(&self, var: &str) -> Option<ValueId> {
        self.bindings.get(var).copied()
    }
}

/// One entry in a per-path event stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum PathEvent {
    /// A call site occurrence, in program order
    Call(CallEvent),
    /// Alias fact from the external oracle: the two identities denote the
    /// same runtime object from this point on
    Alias(ValueId, ValueId),
}
