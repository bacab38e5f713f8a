//! IDOC segment definitions
//!
//! A definition names the segments an IDOC type may contain, each with
//! its positional field layout and its parent in the segment hierarchy.
//! Definitions round-trip through JSON so hand-refined versions of
//! auto-detected layouts can be stored and reloaded.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Width of the leading segment id column in IDOC flat files.
pub const SEGMENT_ID_WIDTH: usize = 8;

/// IDOC field value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdocFieldType {
    #[default]
    Char,
    Num,
    Date,
    Time,
}

/// One positional field inside a segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdocField {
    pub name: String,
    pub offset: usize,
    pub length: usize,
    #[serde(rename = "type", default)]
    pub field_type: IdocFieldType,
    #[serde(default)]
    pub description: String,
}

impl IdocField {
    pub fn new(name: impl Into<String>, offset: usize, length: usize) -> Self {
        Self {
            name: name.into(),
            offset,
            length,
            field_type: IdocFieldType::Char,
            description: String::new(),
        }
    }

    /// Set the field type.
    #[must_use]
    pub fn typed(mut self, field_type: IdocFieldType) -> Self {
        self.field_type = field_type;
        self
    }

    /// Set the description.
    #[must_use]
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Extract this field's trimmed value from a line.
    #[must_use]
    pub fn extract(&self, line: &str) -> String {
        line.chars()
            .skip(self.offset)
            .take(self.length)
            .collect::<String>()
            .trim()
            .to_string()
    }
}

fn default_max_occurs() -> u32 {
    999_999
}

/// One segment definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdocSegment {
    pub segment_id: String,
    pub technical_name: String,
    #[serde(default)]
    pub min_occurs: u32,
    #[serde(default = "default_max_occurs")]
    pub max_occurs: u32,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub fields: Vec<IdocField>,
}

impl IdocSegment {
    pub fn new(segment_id: impl Into<String>, technical_name: impl Into<String>) -> Self {
        Self {
            segment_id: segment_id.into(),
            technical_name: technical_name.into(),
            min_occurs: 0,
            max_occurs: default_max_occurs(),
            parent: None,
            fields: Vec::new(),
        }
    }

    /// Set the parent segment id.
    #[must_use]
    pub fn child_of(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Add a field.
    #[must_use]
    pub fn field(mut self, field: IdocField) -> Self {
        self.fields.push(field);
        self
    }

    /// Check whether a line belongs to this segment.
    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        line_segment_id(line) == self.segment_id
    }

    /// Mutable field access by name, for manual corrections to an
    /// auto-detected layout.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut IdocField> {
        self.fields.iter_mut().find(|field| field.name == name)
    }
}

/// Segment id from the fixed leading column of a line.
#[must_use]
pub fn line_segment_id(line: &str) -> &str {
    let end = line
        .char_indices()
        .nth(SEGMENT_ID_WIDTH)
        .map_or(line.len(), |(i, _)| i);
    line[..end].trim()
}

/// Complete IDOC type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdocDefinition {
    pub idoc_type: String,
    #[serde(with = "segment_list")]
    pub segments: IndexMap<String, IdocSegment>,
}

impl IdocDefinition {
    /// Create an empty definition.
    pub fn new(idoc_type: impl Into<String>) -> Self {
        Self {
            idoc_type: idoc_type.into(),
            segments: IndexMap::new(),
        }
    }

    /// Add a segment definition.
    pub fn add_segment(&mut self, segment: IdocSegment) {
        self.segments.insert(segment.segment_id.clone(), segment);
    }

    /// Look up a segment by id.
    pub fn segment(&self, segment_id: &str) -> Option<&IdocSegment> {
        self.segments.get(segment_id)
    }

    /// Mutable segment access, for refining auto-detected layouts.
    pub fn segment_mut(&mut self, segment_id: &str) -> Option<&mut IdocSegment> {
        self.segments.get_mut(segment_id)
    }

    /// Load a definition from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error when the JSON is malformed or any segment names
    /// an unknown parent.
    pub fn from_json(json: &str) -> Result<Self> {
        let definition: Self = serde_json::from_str(json)?;
        definition.validate()?;
        Ok(definition)
    }

    /// Load a definition from a JSON file.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`IdocDefinition::from_json`], plus IO.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|err| Error::io(path.display().to_string(), err))?;
        Self::from_json(&json)
    }

    /// Serialize the definition to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error when serde fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<()> {
        for segment in self.segments.values() {
            if let Some(parent) = &segment.parent {
                if !self.segments.contains_key(parent) {
                    return Err(Error::definition(format!(
                        "segment '{}' names unknown parent '{parent}'",
                        segment.segment_id
                    )));
                }
            }
        }
        Ok(())
    }

    /// The standard INVOIC02 invoice layout used as the default example.
    #[must_use]
    pub fn invoic02() -> Self {
        let mut definition = Self::new("INVOIC02");
        definition.add_segment(
            IdocSegment::new("EDI_DC40", "IDOC_CONTROL")
                .field(IdocField::new("TABNAM", 0, 10).described("Table name"))
                .field(IdocField::new("MANDT", 10, 3).described("Client"))
                .field(IdocField::new("DOCNUM", 13, 16).described("Document number"))
                .field(IdocField::new("IDOCTYP", 29, 30).described("IDOC type"))
                .field(IdocField::new("MESTYP", 59, 30).described("Message type")),
        );
        definition.add_segment(
            IdocSegment::new("E1EDK01", "DOC_HEADER")
                .child_of("EDI_DC40")
                .field(IdocField::new("BELNR", 8, 35).described("Document number"))
                .field(
                    IdocField::new("DATUM", 43, 8)
                        .typed(IdocFieldType::Date)
                        .described("Document date"),
                )
                .field(
                    IdocField::new("WKURS", 51, 12)
                        .typed(IdocFieldType::Num)
                        .described("Exchange rate"),
                ),
        );
        definition.add_segment(
            IdocSegment::new("E1EDP01", "ITEM_DATA")
                .child_of("E1EDK01")
                .field(IdocField::new("POSEX", 8, 6).described("Item number"))
                .field(
                    IdocField::new("MENGE", 14, 15)
                        .typed(IdocFieldType::Num)
                        .described("Quantity"),
                )
                .field(IdocField::new("MENEE", 29, 3).described("Unit"))
                .field(
                    IdocField::new("NTGEW", 32, 18)
                        .typed(IdocFieldType::Num)
                        .described("Net weight"),
                ),
        );
        definition
    }
}

/// JSON shape keeps segments as a list, keyed map in memory.
mod segment_list {
    use super::IdocSegment;
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        segments: &IndexMap<String, IdocSegment>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let list: Vec<&IdocSegment> = segments.values().collect();
        list.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<IndexMap<String, IdocSegment>, D::Error> {
        let list = Vec::<IdocSegment>::deserialize(deserializer)?;
        Ok(list
            .into_iter()
            .map(|segment| (segment.segment_id.clone(), segment))
            .collect())
    }
}
