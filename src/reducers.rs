//! Reducer registry: aggregation of matched values into one output value.
//!
//! Operation names are resolved once, when the configuration is loaded, into
//! an [`Operation`]. Built-in names map to a [`BuiltIn`]; names carrying the
//! [`SCRIPT_PREFIX`] are routed to the user's [`ScriptEngine`].

use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{AnnoError, Result};
use crate::interval::Interval;
use crate::script::ScriptEngine;
use crate::value::Value;

/// Prefix marking an operation as a user-scripted reducer.
pub const SCRIPT_PREFIX: &str = "script:";

/// Separator used by `concat`.
pub const CONCAT_SEPARATOR: &str = ",";

/// The closed set of built-in reducers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltIn {
    Count,
    Sum,
    Mean,
    Max,
    Min,
    Median,
    First,
    Uniq,
    Concat,
    Flag,
}

impl BuiltIn {
    pub const ALL: [BuiltIn; 10] = [
        BuiltIn::Count,
        BuiltIn::Sum,
        BuiltIn::Mean,
        BuiltIn::Max,
        BuiltIn::Min,
        BuiltIn::Median,
        BuiltIn::First,
        BuiltIn::Uniq,
        BuiltIn::Concat,
        BuiltIn::Flag,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltIn::Count => "count",
            BuiltIn::Sum => "sum",
            BuiltIn::Mean => "mean",
            BuiltIn::Max => "max",
            BuiltIn::Min => "min",
            BuiltIn::Median => "median",
            BuiltIn::First => "first",
            BuiltIn::Uniq => "uniq",
            BuiltIn::Concat => "concat",
            BuiltIn::Flag => "flag",
        }
    }

    /// VCF `Type=` of the values this reducer produces.
    pub fn vcf_type(self) -> &'static str {
        match self {
            BuiltIn::Count => "Integer",
            BuiltIn::Flag => "Flag",
            BuiltIn::Mean | BuiltIn::Median => "Float",
            _ => "String",
        }
    }

    /// Reduce the extracted values of all matches.
    ///
    /// `Ok(None)` means the output field is omitted.
    pub fn reduce(self, values: &[Value]) -> Result<Option<Value>> {
        match self {
            BuiltIn::Count => Ok(Some(Value::Int(values.len() as i64))),
            BuiltIn::Flag => Ok(Some(Value::Bool(!values.is_empty()))),
            BuiltIn::First => Ok(values.first().cloned()),
            BuiltIn::Uniq => Ok(uniq(&flatten(values))),
            BuiltIn::Concat => Ok(concat(&flatten(values))),
            BuiltIn::Sum | BuiltIn::Mean | BuiltIn::Max | BuiltIn::Min | BuiltIn::Median => {
                let numbers = Numbers::collect(self.name(), &flatten(values))?;
                Ok(numbers.reduce(self))
            }
        }
    }
}

impl fmt::Display for BuiltIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    BuiltIn(BuiltIn),
    /// Script function name, prefix stripped.
    Scripted(String),
}

impl Operation {
    pub fn vcf_type(&self) -> &'static str {
        match self {
            Operation::BuiltIn(b) => b.vcf_type(),
            Operation::Scripted(_) => "String",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::BuiltIn(b) => write!(f, "{}", b),
            Operation::Scripted(name) => write!(f, "{}{}", SCRIPT_PREFIX, name),
        }
    }
}

/// Immutable mapping from operation names to reducers.
#[derive(Debug, Clone)]
pub struct ReducerRegistry {
    builtins: FxHashMap<&'static str, BuiltIn>,
    script: Option<Arc<ScriptEngine>>,
}

impl Default for ReducerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ReducerRegistry {
    /// Registry with the built-in reducers only.
    pub fn new() -> Self {
        Self {
            builtins: BuiltIn::ALL.iter().map(|b| (b.name(), *b)).collect(),
            script: None,
        }
    }

    /// Registry that also dispatches `script:` operations to `script`.
    pub fn with_script(script: ScriptEngine) -> Self {
        Self {
            script: Some(Arc::new(script)),
            ..Self::new()
        }
    }

    pub fn has_script(&self) -> bool {
        self.script.is_some()
    }

    /// Resolve an operation name from the configuration.
    pub fn resolve(&self, name: &str) -> Result<Operation> {
        if let Some(function) = name.strip_prefix(SCRIPT_PREFIX) {
            let script = self.script.as_ref().ok_or_else(|| {
                AnnoError::config(format!(
                    "op '{}' needs a script, but none was loaded (use --script)",
                    name
                ))
            })?;
            if !script.has_function(function) {
                return Err(AnnoError::Script(format!(
                    "op '{}': no reducer function '{}' in the script",
                    name, function
                )));
            }
            return Ok(Operation::Scripted(function.to_string()));
        }

        self.builtins
            .get(name)
            .map(|b| Operation::BuiltIn(*b))
            .ok_or_else(|| {
                let mut known: Vec<&str> = self.builtins.keys().copied().collect();
                known.sort_unstable();
                AnnoError::config(format!(
                    "requested op not found: '{}' (expected one of {} or '{}<function>')",
                    name,
                    known.join(", "),
                    SCRIPT_PREFIX
                ))
            })
    }

    /// Apply a resolved operation to the values matched for `query`.
    pub fn reduce(
        &self,
        op: &Operation,
        values: &[Value],
        query: &Interval,
    ) -> Result<Option<Value>> {
        match op {
            Operation::BuiltIn(b) => b.reduce(values),
            Operation::Scripted(name) => match &self.script {
                Some(script) => script.evaluate(name, values, query),
                None => Err(AnnoError::Script(format!(
                    "no script loaded for '{}{}'",
                    SCRIPT_PREFIX, name
                ))),
            },
        }
    }
}

fn flatten(values: &[Value]) -> Vec<Value> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        value.flatten_into(&mut out);
    }
    out
}

fn uniq(values: &[Value]) -> Option<Value> {
    if values.is_empty() {
        return None;
    }
    let mut seen = FxHashSet::default();
    let distinct = values
        .iter()
        .filter(|v| seen.insert(v.to_string()))
        .cloned()
        .collect();
    Some(Value::List(distinct))
}

fn concat(values: &[Value]) -> Option<Value> {
    if values.is_empty() {
        return None;
    }
    let joined = values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(CONCAT_SEPARATOR);
    Some(Value::Str(joined))
}

/// Numeric view of a value sequence.
struct Numbers {
    values: Vec<f64>,
    /// Exact inputs when every value is an integer, so integer results
    /// keep full i64 precision.
    ints: Option<Vec<i64>>,
}

impl Numbers {
    fn collect(op: &str, values: &[Value]) -> Result<Self> {
        let mut out = Vec::with_capacity(values.len());
        let mut ints = Some(Vec::with_capacity(values.len()));
        for value in values {
            let n = value.as_f64().ok_or_else(|| AnnoError::TypeMismatch {
                op: op.to_string(),
                value: value.to_string(),
            })?;
            match (value.as_i64(), ints.as_mut()) {
                (Some(i), Some(exact)) => exact.push(i),
                _ => ints = None,
            }
            out.push(n);
        }
        Ok(Self { values: out, ints })
    }

    fn reduce(mut self, op: BuiltIn) -> Option<Value> {
        if self.values.is_empty() {
            return None;
        }
        if let Some(mut ints) = self.ints.take() {
            if let Some(value) = reduce_ints(op, &mut ints) {
                return Some(value);
            }
        }
        let n = self.values.len();
        let result = match op {
            BuiltIn::Sum => Value::Float(self.values.iter().sum()),
            BuiltIn::Mean => Value::Float(self.values.iter().sum::<f64>() / n as f64),
            BuiltIn::Max => Value::Float(self.values.iter().copied().fold(f64::MIN, f64::max)),
            BuiltIn::Min => Value::Float(self.values.iter().copied().fold(f64::MAX, f64::min)),
            BuiltIn::Median => {
                self.values.sort_by(f64::total_cmp);
                if n % 2 == 1 {
                    Value::Float(self.values[n / 2])
                } else {
                    Value::Float((self.values[n / 2 - 1] + self.values[n / 2]) / 2.0)
                }
            }
            _ => return None,
        };
        Some(result)
    }
}

/// Integer results for all-integer input. `None` falls back to floats:
/// mean, even-length median, or a sum that overflows i64.
fn reduce_ints(op: BuiltIn, ints: &mut [i64]) -> Option<Value> {
    let n = ints.len();
    let value = match op {
        BuiltIn::Sum => ints.iter().try_fold(0i64, |acc, &x| acc.checked_add(x))?,
        BuiltIn::Max => *ints.iter().max()?,
        BuiltIn::Min => *ints.iter().min()?,
        BuiltIn::Median if n % 2 == 1 => {
            ints.sort_unstable();
            ints[n / 2]
        }
        _ => return None,
    };
    Some(Value::Int(value))
}
