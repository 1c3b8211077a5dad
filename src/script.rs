//! User-defined reducers evaluated in an embedded rhai sandbox.
//!
//! The script file is compiled once at startup. Every reduction call runs
//! the requested function with a fresh scope, so nothing a script stores in
//! variables survives from one query interval to the next. The engine and
//! AST are `Send + Sync` (rhai `sync` feature) and are shared by all
//! reduction workers.
//!
//! A reducer function receives the matched values as an array and, when it
//! declares a second parameter, a map describing the query interval:
//!
//! ```text
//! fn longest(vals) { ... }
//! fn af_if_snp(vals, query) {
//!     if query.ref.len() == 1 { vals[0] } else { () }
//! }
//! ```
//!
//! Returning `()` omits the output field.

use std::io::Read;
use std::path::Path;

use rhai::{Array, Dynamic, Engine, Map, Position, Scope, AST};
use rustc_hash::FxHashMap;

use crate::error::{AnnoError, Result};
use crate::input::open_input;
use crate::interval::{Interval, Payload};
use crate::value::Value;

/// Operation budget for a single reducer call.
const MAX_OPERATIONS: u64 = 10_000_000;

/// Maximum nesting of script function calls.
const MAX_CALL_LEVELS: usize = 64;

/// Compiled user script.
pub struct ScriptEngine {
    engine: Engine,
    ast: AST,
    /// Function name -> number of parameters.
    functions: FxHashMap<String, usize>,
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("functions", &self.functions)
            .finish()
    }
}

impl ScriptEngine {
    /// Compile script source.
    pub fn compile(source: &str) -> Result<Self> {
        let mut engine = Engine::new();
        engine.set_max_operations(MAX_OPERATIONS);
        engine.set_max_call_levels(MAX_CALL_LEVELS);
        // stdout belongs to the annotated output
        engine.on_print(|text| tracing::info!(target: "vanno::script", "{}", text));
        engine.on_debug(|text, _source, pos: Position| {
            tracing::debug!(target: "vanno::script", "{} @ {}", text, pos)
        });

        let ast = engine
            .compile(source)
            .map_err(|e| AnnoError::Script(format!("failed to compile script: {}", e)))?;

        let functions = ast
            .iter_functions()
            .map(|f| (f.name.to_string(), f.params.len()))
            .collect();

        Ok(Self {
            engine,
            ast,
            functions,
        })
    }

    /// Load and compile a script file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut source = String::new();
        open_input(path.as_ref())?.read_to_string(&mut source)?;
        let engine = Self::compile(&source)?;
        tracing::debug!(
            "compiled {} script function(s) from {}",
            engine.functions.len(),
            path.as_ref().display()
        );
        Ok(engine)
    }

    /// True if the script defines a callable reducer with this name.
    pub fn has_function(&self, name: &str) -> bool {
        matches!(self.functions.get(name), Some(1) | Some(2))
    }

    /// Run reducer `name` over `values` for the given query interval.
    pub fn evaluate(&self, name: &str, values: &[Value], query: &Interval) -> Result<Option<Value>> {
        let arity = *self.functions.get(name).ok_or_else(|| {
            AnnoError::Script(format!("function '{}' is not defined in the script", name))
        })?;

        let vals: Array = values.iter().map(to_dynamic).collect();
        let mut scope = Scope::new();
        let result = match arity {
            1 => self
                .engine
                .call_fn::<Dynamic>(&mut scope, &self.ast, name, (vals,)),
            2 => self.engine.call_fn::<Dynamic>(
                &mut scope,
                &self.ast,
                name,
                (vals, query_context(query)),
            ),
            n => {
                return Err(AnnoError::Script(format!(
                    "function '{}' takes {} parameters; reducers take (vals) or (vals, query)",
                    name, n
                )))
            }
        };

        let output = result.map_err(|e| AnnoError::Script(format!("{}: {}", name, e)))?;
        Ok(from_dynamic(output))
    }
}

fn to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Int(n) => Dynamic::from_int(*n),
        Value::Float(f) => Dynamic::from_float(*f),
        Value::Str(s) => Dynamic::from(s.clone()),
        Value::Bool(b) => Dynamic::from_bool(*b),
        Value::List(items) => Dynamic::from_array(items.iter().map(to_dynamic).collect()),
    }
}

fn from_dynamic(value: Dynamic) -> Option<Value> {
    if value.is_unit() {
        return None;
    }
    if let Ok(n) = value.as_int() {
        return Some(Value::Int(n));
    }
    if let Ok(f) = value.as_float() {
        return Some(Value::Float(f));
    }
    if let Ok(b) = value.as_bool() {
        return Some(Value::Bool(b));
    }
    if value.is_string() {
        return value.into_string().ok().map(Value::Str);
    }
    if value.is_array() {
        let items = value
            .into_array()
            .unwrap_or_default()
            .into_iter()
            .filter_map(from_dynamic)
            .collect();
        return Some(Value::List(items));
    }
    Some(Value::Str(value.to_string()))
}

/// Describe the query interval for scripts as an object map.
fn query_context(query: &Interval) -> Map {
    let mut map = Map::new();
    map.insert("chrom".into(), Dynamic::from(query.chrom.clone()));
    map.insert("start".into(), Dynamic::from_int(query.start as i64));
    map.insert("end".into(), Dynamic::from_int(query.end as i64));

    match &query.payload {
        Payload::Variant(v) => {
            map.insert("id".into(), Dynamic::from(v.id.clone()));
            map.insert("ref".into(), Dynamic::from(v.reference.clone()));
            let alts: Array = v.alts.iter().map(|a| Dynamic::from(a.clone())).collect();
            map.insert("alts".into(), Dynamic::from_array(alts));
            let mut info = Map::new();
            for (key, value) in v.info.iter() {
                info.insert(key.into(), to_dynamic(value));
            }
            map.insert("info".into(), Dynamic::from_map(info));
        }
        Payload::Region(columns) => {
            let cols: Array = columns.iter().map(|c| Dynamic::from(c.clone())).collect();
            map.insert("columns".into(), Dynamic::from_array(cols));
        }
        Payload::Depth => {}
    }
    map
}
