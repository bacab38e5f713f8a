//! Positional IDOC parsing
//!
//! Each line carries its segment id in the fixed leading column; fields
//! are cut out of the line at the offsets the definition declares. The
//! parent links in the definition drive a hierarchy stack, so item
//! segments nest under their header segment in the output tree and
//! repeated segments collapse into lists. Without a definition the
//! parser derives one from the file itself: segment ids from the lead
//! column, field boundaries from runs of two or more spaces.

use docmap_tree::Value;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::definition::{
    line_segment_id, IdocDefinition, IdocField, IdocSegment, SEGMENT_ID_WIDTH,
};
use crate::{Error, Result};

/// Parse result: the value tree plus non-fatal warnings.
#[derive(Debug)]
pub struct ParsedIdoc {
    pub idoc_type: String,
    /// Tree rooted at the IDOC type, segments nested by hierarchy.
    pub tree: Value,
    pub warnings: Vec<String>,
}

/// Parser for IDOC flat files.
pub struct IdocParser {
    definition: Option<IdocDefinition>,
}

impl IdocParser {
    /// Create an auto-detecting parser.
    pub fn new() -> Self {
        Self { definition: None }
    }

    /// Create a parser bound to a definition.
    pub fn with_definition(definition: IdocDefinition) -> Self {
        Self {
            definition: Some(definition),
        }
    }

    /// Parse an IDOC file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or contains no
    /// segment lines.
    pub fn parse_file(&self, path: impl AsRef<std::path::Path>) -> Result<ParsedIdoc> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| Error::io(path.display().to_string(), err))?;
        self.parse_str(&text)
    }

    /// Parse IDOC text.
    ///
    /// # Errors
    ///
    /// Returns an error when the text contains no segment lines.
    pub fn parse_str(&self, text: &str) -> Result<ParsedIdoc> {
        let lines: Vec<&str> = text.lines().collect();
        if lines.iter().all(|line| line.trim().is_empty()) {
            return Err(Error::definition("IDOC input contains no segment lines"));
        }

        let detected;
        let definition = match &self.definition {
            Some(definition) => definition,
            None => {
                detected = auto_detect(&lines);
                &detected
            }
        };

        let mut warnings = Vec::new();
        let mut root: IndexMap<String, Value> = IndexMap::new();
        // open segments, innermost last
        let mut stack: Vec<(String, IndexMap<String, Value>)> = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_number = index + 1;
            let segment_id = line_segment_id(line);

            let Some(segment) = definition.segment(segment_id) else {
                warn!(line = line_number, segment = %segment_id, "unknown segment type");
                warnings.push(format!(
                    "line {line_number}: unknown segment type '{segment_id}'"
                ));
                attach(&mut root, segment_id.to_string(), Value::string(line.trim()));
                continue;
            };

            unwind_to_parent(&mut stack, &mut root, segment.parent.as_deref());

            let mut fields = IndexMap::with_capacity(segment.fields.len());
            for field in &segment.fields {
                fields.insert(field.name.clone(), Value::String(field.extract(line)));
            }
            stack.push((segment.segment_id.clone(), fields));
        }

        unwind_to_parent(&mut stack, &mut root, None);

        debug!(
            idoc_type = %definition.idoc_type,
            warning_count = warnings.len(),
            "parsed IDOC document"
        );
        Ok(ParsedIdoc {
            idoc_type: definition.idoc_type.clone(),
            tree: Value::Object([(definition.idoc_type.clone(), Value::Object(root))].into()),
            warnings,
        })
    }
}

impl Default for IdocParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Close open segments until the top of the stack is `parent`.
///
/// Closed segments attach to their enclosing frame, or to the tree root
/// once the stack is empty. `None` closes everything.
fn unwind_to_parent(
    stack: &mut Vec<(String, IndexMap<String, Value>)>,
    root: &mut IndexMap<String, Value>,
    parent: Option<&str>,
) {
    while let Some((top_id, _)) = stack.last() {
        if parent == Some(top_id.as_str()) {
            return;
        }
        let (id, fields) = stack.pop().unwrap_or_default();
        match stack.last_mut() {
            Some((_, enclosing)) => attach(enclosing, id, Value::Object(fields)),
            None => attach(root, id, Value::Object(fields)),
        }
    }
}

fn attach(map: &mut IndexMap<String, Value>, name: String, value: Value) {
    match map.get_mut(&name) {
        Some(Value::List(items)) => items.push(value),
        Some(existing) => {
            let first = std::mem::replace(existing, Value::Null);
            *existing = Value::List(vec![first, value]);
        }
        None => {
            map.insert(name, value);
        }
    }
}

/// Derive a definition from the file itself.
///
/// Samples the first hundred segment lines; the first line seen for each
/// segment id supplies the field boundaries. All segments come out flat
/// (no parents) with generated field names, meant as a starting point
/// for manual refinement.
#[must_use]
pub fn auto_detect(lines: &[&str]) -> IdocDefinition {
    let mut samples: IndexMap<String, &str> = IndexMap::new();
    for &line in lines.iter().take(100) {
        if line.trim().is_empty() {
            continue;
        }
        let segment_id = line_segment_id(line);
        samples.entry(segment_id.to_string()).or_insert(line);
    }

    let mut definition = IdocDefinition::new("AUTO_DETECTED");
    for (segment_id, sample) in samples {
        let mut segment = IdocSegment::new(segment_id.clone(), segment_id);
        for field in detect_fields(sample) {
            segment = segment.field(field);
        }
        definition.add_segment(segment);
    }
    definition
}

/// Split a sample line into fields at runs of two or more spaces.
fn detect_fields(sample: &str) -> Vec<IdocField> {
    let chars: Vec<char> = sample.trim_end().chars().collect();
    let mut fields = Vec::new();
    let mut start: Option<usize> = None;
    let mut position = SEGMENT_ID_WIDTH.min(chars.len());

    while position <= chars.len() {
        let gap = chars[position..]
            .iter()
            .take_while(|c| c.is_whitespace())
            .count();
        let at_end = position >= chars.len();

        if at_end || gap >= 2 {
            if let Some(begin) = start.take() {
                fields.push(IdocField::new(
                    format!("FIELD_{:02}", fields.len() + 1),
                    begin,
                    position - begin,
                ));
            }
            if at_end {
                break;
            }
            position += gap.max(1);
        } else {
            if start.is_none() && !chars[position].is_whitespace() {
                start = Some(position);
            }
            position += 1;
        }
    }
    fields
}
