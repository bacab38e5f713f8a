//! Integration test: Italian e-invoice to UBL-style mapping
//!
//! Exercises the engine end to end over a realistic rule set: direct
//! copies, date reformatting, lookup tables, fan-out aggregation,
//! conditions, partial failure and inversion.

use docmap_mapping::{execute, invert, MappingDefinition};
use docmap_tree::{resolve, Value};

fn invoice_tree() -> Value {
    serde_json::from_str(
        r#"{
            "FatturaElettronica": {
                "Testata": {
                    "Numero": "2024/001",
                    "Data": "18/01/2024",
                    "Divisa": "EUR",
                    "ModalitaPagamento": "MP05"
                },
                "Cedente": {
                    "Denominazione": "ACME S.r.l.",
                    "PartitaIVA": "IT01234567890"
                },
                "Dettaglio": {
                    "Linea": [
                        {"Descrizione": "Widget", "PrezzoTotale": "10.00"},
                        {"Descrizione": "Gadget", "PrezzoTotale": "20.00"},
                        {"Descrizione": "Sprocket", "PrezzoTotale": "5.00"}
                    ]
                }
            }
        }"#,
    )
    .unwrap()
}

fn invoice_mapping() -> MappingDefinition {
    MappingDefinition::from_yaml(
        r#"
name: fatturapa_to_ubl
input_schema: FatturaElettronica
output_schema: Invoice
lookup_tables:
  payment_means:
    MP05: "30"
    MP08: "48"
rules:
  - id: invoice_number
    source: FatturaElettronica.Testata.Numero
    target: Invoice.ID
  - id: issue_date
    source: FatturaElettronica.Testata.Data
    target: Invoice.IssueDate
    transformation:
      type: function
      function: format_date
      params:
        from_format: "%d/%m/%Y"
        to_format: "%Y-%m-%d"
  - id: currency
    source: FatturaElettronica.Testata.Divisa
    target: Invoice.DocumentCurrencyCode
    condition:
      type: exists
  - id: payment_code
    source: FatturaElettronica.Testata.ModalitaPagamento
    target: Invoice.PaymentMeans.PaymentMeansCode
    transformation:
      type: function
      function: lookup
      params:
        table: payment_means
  - id: supplier_name
    source: FatturaElettronica.Cedente.Denominazione
    target: Invoice.AccountingSupplierParty.Party.PartyName.Name
  - id: payable_amount
    source: FatturaElettronica.Dettaglio.Linea.PrezzoTotale
    target: Invoice.LegalMonetaryTotal.PayableAmount
    cardinality_handling: sum
  - id: line_count
    source: FatturaElettronica.Dettaglio.Linea
    target: Invoice.LineCountNumeric
    cardinality_handling: count
"#,
    )
    .unwrap()
}

#[test]
fn test_full_invoice_mapping() {
    let input = invoice_tree();
    let mapping = invoice_mapping();

    let result = execute(&input, &mapping).unwrap();
    assert!(result.is_clean(), "errors: {:?}", result.errors);

    let output = &result.output_tree;
    assert_eq!(resolve(output, "Invoice.ID"), Value::string("2024/001"));
    assert_eq!(
        resolve(output, "Invoice.IssueDate"),
        Value::string("2024-01-18")
    );
    assert_eq!(
        resolve(output, "Invoice.DocumentCurrencyCode"),
        Value::string("EUR")
    );
    assert_eq!(
        resolve(output, "Invoice.PaymentMeans.PaymentMeansCode"),
        Value::string("30")
    );
    assert_eq!(
        resolve(output, "Invoice.AccountingSupplierParty.Party.PartyName.Name"),
        Value::string("ACME S.r.l.")
    );
    assert_eq!(
        resolve(output, "Invoice.LegalMonetaryTotal.PayableAmount"),
        Value::Number(35.0)
    );
    assert_eq!(
        resolve(output, "Invoice.LineCountNumeric"),
        Value::Number(3.0)
    );
}

#[test]
fn test_mapping_is_idempotent() {
    let input = invoice_tree();
    let mapping = invoice_mapping();

    let first = execute(&input, &mapping).unwrap();
    let second = execute(&input, &mapping).unwrap();
    assert_eq!(first.output_tree, second.output_tree);
}

#[test]
fn test_broken_rule_does_not_stop_the_run() {
    let input = invoice_tree();
    let mut mapping = invoice_mapping();
    // corrupt one rule in the middle
    let rule: docmap_mapping::MappingRule = serde_json::from_str(
        r#"{
            "id": "broken",
            "source": "FatturaElettronica.Testata.Numero",
            "target": "Invoice.Broken",
            "transformation": {"type": "function", "function": "no_such_function"}
        }"#,
    )
    .unwrap();
    mapping.rules.insert(2, rule);

    let result = execute(&input, &mapping).unwrap();
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].rule_id, "broken");

    // rules before and after the broken one still ran
    assert_eq!(
        resolve(&result.output_tree, "Invoice.ID"),
        Value::string("2024/001")
    );
    assert_eq!(
        resolve(&result.output_tree, "Invoice.LineCountNumeric"),
        Value::Number(3.0)
    );
    assert!(resolve(&result.output_tree, "Invoice.Broken").is_null());
}

#[test]
fn test_yaml_json_round_trip_keeps_rules() {
    let mapping = invoice_mapping();
    let json = mapping.to_json().unwrap();
    let reloaded = MappingDefinition::from_json(&json).unwrap();
    assert_eq!(mapping, reloaded);
}

#[test]
fn test_concat_split_inversion_round_trip() {
    let mapping = MappingDefinition::from_yaml(
        r#"
name: names
rules:
  - id: full_name
    source: [person.first, person.last]
    target: Contact.FullName
    transformation:
      type: function
      function: concat
      params:
        separator: " "
"#,
    )
    .unwrap();

    let input: Value =
        serde_json::from_str(r#"{"person": {"first": "Mario", "last": "Rossi"}}"#).unwrap();

    let forward = execute(&input, &mapping).unwrap();
    assert_eq!(
        resolve(&forward.output_tree, "Contact.FullName"),
        Value::string("Mario Rossi")
    );

    let (inverted, warnings) = invert(&mapping);
    assert!(warnings.is_empty());

    let back = execute(&forward.output_tree, &inverted).unwrap();
    assert!(back.is_clean());
    assert_eq!(
        resolve(&back.output_tree, "person.first"),
        Value::string("Mario")
    );
    assert_eq!(
        resolve(&back.output_tree, "person.last"),
        Value::string("Rossi")
    );
}
