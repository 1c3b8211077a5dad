//! Annotation configuration.
//!
//! The configuration is a TOML file with one `[[annotation]]` table per
//! source. It is parsed with serde, validated eagerly and turned into
//! [`Source`]s before any input is streamed, so every configuration
//! mistake is reported up front.
//!
//! # Example
//!
//! ```
//! use vanno::config::Config;
//! use vanno::reducers::ReducerRegistry;
//!
//! let config = Config::parse(
//!     r#"
//! [[annotation]]
//! file = "genes.bed"
//! columns = [4]
//! ops = ["concat"]
//! names = ["gene"]
//! "#,
//! )
//! .unwrap();
//!
//! let sources = config.sources(&ReducerRegistry::new()).unwrap();
//! assert_eq!(sources[0].requests[0].output_name, "gene");
//! ```

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use serde::Deserialize;

use crate::error::{AnnoError, Result};
use crate::input::{is_bam_path, is_vcf_path};
use crate::reducers::{BuiltIn, Operation, ReducerRegistry};
use crate::source::{Extract, Request, Source, SourceKind};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub annotation: Vec<AnnotationConfig>,
}

/// One `[[annotation]]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnnotationConfig {
    pub file: PathBuf,
    /// INFO keys to extract (variant sources).
    #[serde(default)]
    pub fields: Vec<String>,
    /// 1-based columns to extract (region sources).
    #[serde(default)]
    pub columns: Vec<usize>,
    #[serde(default)]
    pub ops: Vec<String>,
    /// Output names; default to `fields`.
    #[serde(default)]
    pub names: Vec<String>,
    /// Treat `file` as read extents and annotate read depth. Implied for
    /// `.bam` files.
    #[serde(default)]
    pub depth: bool,
}

impl Config {
    /// Load a configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            AnnoError::config(format!("cannot read config '{}': {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    /// Parse configuration text.
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| AnnoError::config(e.to_string()))
    }

    /// Validate every annotation and build the sources, in configuration
    /// order.
    ///
    /// Output names must be unique within one source. A name already used by
    /// an earlier source is renamed to `<name>_<index>`.
    pub fn sources(&self, registry: &ReducerRegistry) -> Result<Vec<Source>> {
        if self.annotation.is_empty() {
            return Err(AnnoError::config("no [[annotation]] entries"));
        }

        let mut taken: FxHashSet<String> = FxHashSet::default();
        let mut sources = Vec::with_capacity(self.annotation.len());
        for (index, annotation) in self.annotation.iter().enumerate() {
            let mut source = annotation.to_source(index, registry)?;
            for request in &mut source.requests {
                if taken.contains(&request.output_name) {
                    let renamed = format!("{}_{}", request.output_name, index);
                    tracing::warn!(
                        "output name '{}' from {} is already used; writing it as '{}'",
                        request.output_name,
                        source.file.display(),
                        renamed
                    );
                    request.output_name = renamed;
                }
                taken.insert(request.output_name.clone());
            }
            sources.push(source);
        }
        Ok(sources)
    }
}

impl AnnotationConfig {
    /// Kind of source implied by the `depth` flag and the file name.
    pub fn kind(&self) -> SourceKind {
        if self.depth || is_bam_path(&self.file) {
            SourceKind::Depth
        } else if is_vcf_path(&self.file) {
            SourceKind::Variant
        } else {
            SourceKind::Region
        }
    }

    /// Validate this table and resolve it into a [`Source`].
    pub fn to_source(&self, index: usize, registry: &ReducerRegistry) -> Result<Source> {
        let file = self.file.display();
        if self.file.as_os_str().is_empty() {
            return Err(AnnoError::config(format!(
                "annotation {} has an empty 'file'",
                index
            )));
        }

        let kind = self.kind();
        let extracts: Vec<Extract> = match kind {
            SourceKind::Depth => {
                // `.bam` tables may carry placeholder columns, which are ignored
                let placeholders = is_bam_path(&self.file) && self.fields.is_empty();
                if !self.fields.is_empty() || (!self.columns.is_empty() && !placeholders) {
                    return Err(AnnoError::config(format!(
                        "depth source {} takes no 'fields' or 'columns'",
                        file
                    )));
                }
                if self.names.is_empty() {
                    return Err(AnnoError::config(format!(
                        "depth source {} needs at least one name",
                        file
                    )));
                }
                if let Some(op) = self.ops.iter().find(|op| *op != BuiltIn::Count.name()) {
                    return Err(AnnoError::config(format!(
                        "depth source {} only supports op 'count', got '{}'",
                        file, op
                    )));
                }
                vec![Extract::Depth; self.names.len()]
            }
            SourceKind::Variant | SourceKind::Region => {
                match (self.fields.is_empty(), self.columns.is_empty()) {
                    (true, true) => {
                        return Err(AnnoError::config(format!(
                            "must specify either 'fields' or 'columns' for {}",
                            file
                        )))
                    }
                    (false, false) => {
                        return Err(AnnoError::config(format!(
                            "specify only 'fields' or 'columns', not both, for {}",
                            file
                        )))
                    }
                    _ => {}
                }
                if !self.fields.is_empty() {
                    if kind == SourceKind::Region {
                        return Err(AnnoError::config(format!(
                            "'fields' need a VCF source; use 'columns' for {}",
                            file
                        )));
                    }
                    if self.ops.len() != self.fields.len() {
                        return Err(AnnoError::config(format!(
                            "must specify same # of 'fields' as 'ops' for {}",
                            file
                        )));
                    }
                    self.fields.iter().cloned().map(Extract::Field).collect()
                } else {
                    if kind == SourceKind::Variant {
                        return Err(AnnoError::config(format!(
                            "'columns' need a BED source; use 'fields' for {}",
                            file
                        )));
                    }
                    if let Some(col) = self.columns.iter().find(|&&c| c == 0) {
                        return Err(AnnoError::config(format!(
                            "columns are 1-based, got {} for {}",
                            col, file
                        )));
                    }
                    if self.ops.len() != self.columns.len() {
                        return Err(AnnoError::config(format!(
                            "must specify same # of 'columns' as 'ops' for {}",
                            file
                        )));
                    }
                    if self.names.len() != self.columns.len() {
                        return Err(AnnoError::config(format!(
                            "must specify same # of 'names' as 'columns' for {}",
                            file
                        )));
                    }
                    self.columns.iter().copied().map(Extract::Column).collect()
                }
            }
        };

        let names: &[String] = if self.names.is_empty() {
            &self.fields
        } else {
            &self.names
        };
        if names.len() != extracts.len() {
            return Err(AnnoError::config(format!(
                "must specify same # of 'names' as 'fields' for {}",
                file
            )));
        }

        let mut seen = FxHashSet::default();
        let mut requests = Vec::with_capacity(extracts.len());
        for (i, (extract, name)) in extracts.into_iter().zip(names).enumerate() {
            if name.is_empty() {
                return Err(AnnoError::config(format!("empty output name for {}", file)));
            }
            if !seen.insert(name.as_str()) {
                return Err(AnnoError::config(format!(
                    "duplicate output name '{}' for {}",
                    name, file
                )));
            }
            let op = match self.ops.get(i) {
                Some(op) => registry.resolve(op)?,
                None => Operation::BuiltIn(BuiltIn::Count),
            };
            requests.push(Request {
                op,
                extract,
                output_name: name.clone(),
            });
        }

        tracing::debug!(
            "annotation {}: {} source {} with {} field(s)",
            index,
            kind,
            file,
            requests.len()
        );
        Ok(Source {
            file: self.file.clone(),
            index,
            kind,
            requests,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ScriptEngine;

    fn sources(text: &str) -> Result<Vec<Source>> {
        Config::parse(text)?.sources(&ReducerRegistry::new())
    }

    #[test]
    fn test_vcf_fields_default_names() {
        let sources = sources(
            r#"
[[annotation]]
file = "db.vcf.gz"
fields = ["AF", "ID"]
ops = ["max", "uniq"]
"#,
        )
        .unwrap();

        let source = &sources[0];
        assert_eq!(source.kind, SourceKind::Variant);
        assert_eq!(source.requests.len(), 2);
        assert_eq!(source.requests[0].output_name, "AF");
        assert_eq!(source.requests[0].op, Operation::BuiltIn(BuiltIn::Max));
        assert_eq!(source.requests[1].extract, Extract::Field("ID".to_string()));
    }

    #[test]
    fn test_bed_columns() {
        let sources = sources(
            r#"
[[annotation]]
file = "genes.bed"
columns = [4, 5]
ops = ["concat", "mean"]
names = ["gene", "score"]
"#,
        )
        .unwrap();

        assert_eq!(sources[0].kind, SourceKind::Region);
        assert_eq!(sources[0].requests[1].extract, Extract::Column(5));
    }

    #[test]
    fn test_depth_defaults_to_count() {
        let sources = sources(
            r#"
[[annotation]]
file = "reads.bed"
depth = true
names = ["coverage"]
"#,
        )
        .unwrap();

        assert_eq!(sources[0].kind, SourceKind::Depth);
        assert_eq!(sources[0].requests[0].extract, Extract::Depth);
        assert_eq!(sources[0].requests[0].op, Operation::BuiltIn(BuiltIn::Count));
    }

    #[test]
    fn test_bam_is_depth_with_implicit_count() {
        let sources = sources(
            r#"
[[annotation]]
file = "sample.bam"
names = ["coverage"]

[[annotation]]
file = "other.bam"
columns = [1]
names = ["other_coverage"]
"#,
        )
        .unwrap();

        for source in &sources {
            assert_eq!(source.kind, SourceKind::Depth);
            assert_eq!(source.requests[0].extract, Extract::Depth);
            assert_eq!(source.requests[0].op, Operation::BuiltIn(BuiltIn::Count));
        }
        assert!(self::sources("[[annotation]]\nfile = \"s.bam\"\nfields = [\"AF\"]\nnames = [\"x\"]\n").is_err());
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            // neither fields nor columns
            "[[annotation]]\nfile = \"a.bed\"\nops = [\"count\"]\nnames = [\"n\"]\n",
            // both
            "[[annotation]]\nfile = \"a.vcf\"\nfields = [\"AF\"]\ncolumns = [4]\nops = [\"max\"]\n",
            // op count mismatch
            "[[annotation]]\nfile = \"a.vcf\"\nfields = [\"AF\", \"AC\"]\nops = [\"max\"]\n",
            // columns without names
            "[[annotation]]\nfile = \"a.bed\"\ncolumns = [4]\nops = [\"concat\"]\n",
            // fields on a BED file
            "[[annotation]]\nfile = \"a.bed\"\nfields = [\"AF\"]\nops = [\"max\"]\n",
            // duplicate name within one source
            "[[annotation]]\nfile = \"a.bed\"\ncolumns = [4, 5]\nops = [\"concat\", \"max\"]\nnames = [\"x\", \"x\"]\n",
            // zero column
            "[[annotation]]\nfile = \"a.bed\"\ncolumns = [0]\nops = [\"concat\"]\nnames = [\"x\"]\n",
            // depth with a non-count op
            "[[annotation]]\nfile = \"r.bed\"\ndepth = true\nops = [\"sum\"]\nnames = [\"d\"]\n",
            // unknown key
            "[[annotation]]\nfile = \"a.vcf\"\nfield = [\"AF\"]\nops = [\"max\"]\n",
            // empty config
            "",
        ];
        for case in cases {
            let err = sources(case).unwrap_err();
            assert!(matches!(err, AnnoError::Config(_)), "{}: {}", case, err);
        }
    }

    #[test]
    fn test_unknown_op() {
        let err = sources(
            "[[annotation]]\nfile = \"a.vcf\"\nfields = [\"AF\"]\nops = [\"average\"]\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("requested op not found"));
    }

    #[test]
    fn test_collision_namespaced() {
        let sources = sources(
            r#"
[[annotation]]
file = "a.vcf"
fields = ["AF"]
ops = ["max"]

[[annotation]]
file = "b.vcf"
fields = ["AF"]
ops = ["min"]
"#,
        )
        .unwrap();

        assert_eq!(sources[0].requests[0].output_name, "AF");
        assert_eq!(sources[1].requests[0].output_name, "AF_1");
    }

    #[test]
    fn test_scripted_op() {
        let text = "[[annotation]]\nfile = \"a.vcf\"\nfields = [\"AF\"]\nops = [\"script:top\"]\n";
        let config = Config::parse(text).unwrap();

        let err = config.sources(&ReducerRegistry::new()).unwrap_err();
        assert!(matches!(err, AnnoError::Config(_)));

        let script = ScriptEngine::compile("fn top(vals) { vals[0] }").unwrap();
        let sources = config.sources(&ReducerRegistry::with_script(script)).unwrap();
        assert_eq!(sources[0].requests[0].op, Operation::Scripted("top".to_string()));

        let script = ScriptEngine::compile("fn other(vals) { 1 }").unwrap();
        let err = config
            .sources(&ReducerRegistry::with_script(script))
            .unwrap_err();
        assert!(matches!(err, AnnoError::Script(_)));
    }
}
