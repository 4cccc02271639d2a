//! Line-oriented structural extraction over `javap -v` output.
//!
//! Three matchers run against every line independently:
//!
//! - **dependencies**: every dotted identifier (`com.example.Widget`). This
//!   over-approximates and will also pick up tokens such as `Widget.java`
//!   from the `Compiled from` line.
//! - **methods**: `modifiers type name(params) [throws ...];`
//! - **fields**: `modifiers type name;`
//!
//! A line can satisfy more than one matcher.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::TaskError;
use crate::transcript::TranscriptBlock;

const DEPENDENCY_PATTERN: &str = r"[A-Za-z_$][A-Za-z0-9_$]*(?:\.[A-Za-z_$][A-Za-z0-9_$]*)+";
// Word classes are ASCII, as in java.util.regex.
const METHOD_PATTERN: &str = r"\s*(?:public|protected|private|static|final|native|synchronized|abstract|transient|volatile)*\s+[[:word:]$.<>\[\]]+\s+([[:word:]]+)\(.*\)(?:\s+throws\s+[[:word:]$.,\s]+)?;";
const FIELD_PATTERN: &str = r"\s*(?:public|protected|private|static|final|transient|volatile)*\s+[[:word:]$.<>\[\]]+\s+([[:word:]]+);";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub methods: Vec<String>,
    pub fields: Vec<String>,
    pub dependencies: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct Extractor {
    dependency: Regex,
    method: Regex,
    field: Regex,
}

impl Extractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            dependency: Regex::new(DEPENDENCY_PATTERN)?,
            method: Regex::new(METHOD_PATTERN)?,
            field: Regex::new(FIELD_PATTERN)?,
        })
    }

    /// Scans one line into `record`.
    pub fn scan_line(&self, line: &str, record: &mut ArtifactRecord) {
        for m in self.dependency.find_iter(line) {
            record.dependencies.insert(m.as_str().to_string());
        }

        if let Some(name) = self.method.captures(line).and_then(|c| c.get(1)) {
            record.methods.push(name.as_str().to_string());
        }

        if let Some(name) = self.field.captures(line).and_then(|c| c.get(1)) {
            record.fields.push(name.as_str().to_string());
        }
    }

    /// Consumes a line stream, copying every line into `transcript` before
    /// matching it. Stops at the first read error.
    pub fn extract<I>(
        &self,
        lines: I,
        transcript: &mut TranscriptBlock,
    ) -> Result<ArtifactRecord, TaskError>
    where
        I: IntoIterator<Item = Result<String, TaskError>>,
    {
        let mut record = ArtifactRecord::default();
        for line in lines {
            let line = line?;
            transcript.push_line(&line);
            self.scan_line(&line, &mut record);
        }
        Ok(record)
    }

    pub fn extract_str(&self, text: &str) -> ArtifactRecord {
        let mut record = ArtifactRecord::default();
        for line in text.lines() {
            self.scan_line(line, &mut record);
        }
        record
    }
}
