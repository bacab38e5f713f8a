//! Integration test: IDOC flat file in, schema-ordered XML out
//!
//! The exported schema has to carry the definition's field order all the
//! way through to serialization, for parsed documents and for trees
//! assembled in arbitrary order alike.

use docmap_adapter_idoc::{to_schema, IdocDefinition, IdocParser};
use docmap_serialize::XmlSerializer;
use docmap_tree::{set, Value};

fn sample_idoc() -> String {
    let control = format!("{:13}{:16}", "EDI_DC40  800", "0000000090000123");
    let header = format!(
        "{:8}{:35}{:8}{:12}",
        "E1EDK01", "INV-2024-001", "20240118", "1.0"
    );
    let item = format!("{:8}{:6}{:15}{:3}", "E1EDP01", "000010", "5.000", "PCE");
    format!("{control}\n{header}\n{item}\n")
}

#[test]
fn test_parsed_idoc_serializes_in_definition_order() {
    let definition = IdocDefinition::invoic02();
    let parser = IdocParser::with_definition(definition.clone());
    let parsed = parser.parse_str(&sample_idoc()).unwrap();

    let schema = to_schema(&definition).unwrap();
    let rendered = XmlSerializer::new()
        .with_schema(&schema)
        .compact()
        .without_declaration()
        .serialize(&parsed.tree)
        .unwrap();

    assert!(rendered.warnings.is_empty(), "warnings: {:?}", rendered.warnings);
    let posex = rendered.text.find("<POSEX>").unwrap();
    let menge = rendered.text.find("<MENGE>").unwrap();
    let menee = rendered.text.find("<MENEE>").unwrap();
    assert!(posex < menge && menge < menee);
    assert!(rendered.text.contains("<BELNR>INV-2024-001</BELNR>"));
}

#[test]
fn test_exported_schema_reorders_a_scrambled_tree() {
    let schema = to_schema(&IdocDefinition::invoic02()).unwrap();

    // header fields set in the reverse of their declared order
    let mut tree = Value::object();
    set(&mut tree, "INVOIC02.EDI_DC40.E1EDK01.WKURS", Value::string("1.0")).unwrap();
    set(
        &mut tree,
        "INVOIC02.EDI_DC40.E1EDK01.DATUM",
        Value::string("20240118"),
    )
    .unwrap();
    set(
        &mut tree,
        "INVOIC02.EDI_DC40.E1EDK01.BELNR",
        Value::string("INV-2024-001"),
    )
    .unwrap();

    let rendered = XmlSerializer::new()
        .with_schema(&schema)
        .compact()
        .without_declaration()
        .serialize(&tree)
        .unwrap();

    assert!(rendered.warnings.is_empty(), "warnings: {:?}", rendered.warnings);
    assert!(rendered.text.contains(
        "<E1EDK01><BELNR>INV-2024-001</BELNR><DATUM>20240118</DATUM><WKURS>1.0</WKURS></E1EDK01>"
    ));
}
