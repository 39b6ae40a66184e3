mod common;

use common::fixtures::ConfigXml;
use common::{TestResult, init_logging, record, render_pdf};
use quire::{DrawOp, InMemoryResourceProvider};
use serde_json::json;

#[test]
fn test_value_kinds_render_to_pdf_text() -> TestResult {
    init_logging();
    let xml = ConfigXml::new()
        .entry(
            r#"<page>
                 <field name="total" type="money" x="20" y="40" width="100"/>
                 <field name="issued" type="date" convert="date(.)" x="20" y="60" width="100"/>
                 <field name="customer" convert="upper(.)" x="20" y="80" width="200"/>
                 <field name="notes" type="html" x="20" y="100" width="300"/>
               </page>"#,
        )
        .build();
    let entity = json!({
        "total": 1234.5,
        "issued": "2024-03-05",
        "customer": "acme",
        "notes": "<b>Paid</b> in full"
    });
    let pdf = render_pdf(&xml, InMemoryResourceProvider::new(), vec![entity])?;
    assert_eq!(pdf.texts(1), vec!["1 234.50", "05.03.2024", "ACME", "Paid in full"]);
    Ok(())
}

#[test]
fn test_visibility_expressions() -> TestResult {
    init_logging();
    let xml = ConfigXml::new()
        .entry(
            r#"<page>
                 <field name="warning" value="OVERDUE" visible="overdue" x="20" y="40"/>
                 <field name="thanks" value="Thank you" visible="!overdue" x="20" y="60"/>
               </page>"#,
        )
        .build();
    let renderer = record(
        &xml,
        InMemoryResourceProvider::new(),
        vec![json!({ "overdue": true }), json!({ "overdue": false })],
    )?;
    assert_eq!(
        renderer.backend().all_texts(),
        vec![vec!["OVERDUE"], vec!["Thank you"]]
    );
    Ok(())
}

#[test]
fn test_checkbox_marks_only_truthy_values() -> TestResult {
    init_logging();
    let xml = ConfigXml::new()
        .entry(
            r#"<page>
                 <field name="yes" type="checkbox" x="20" y="40" width="10" height="10"/>
                 <field name="no" type="checkbox" x="40" y="40" width="10" height="10"/>
               </page>"#,
        )
        .build();
    let renderer = record(
        &xml,
        InMemoryResourceProvider::new(),
        vec![json!({ "yes": "1", "no": "0" })],
    )?;
    assert_eq!(renderer.backend().lines(0), 2);
    Ok(())
}

#[test]
fn test_long_text_wraps_inside_field_height() -> TestResult {
    init_logging();
    let xml = ConfigXml::new()
        .base(r#"<font name="helvetica" size="10"/>"#)
        .entry(r#"<page><field name="body" x="20" y="40" width="80" height="30"/></page>"#)
        .build();
    let text = "one two three four five six seven eight nine ten eleven twelve";
    let renderer = record(&xml, InMemoryResourceProvider::new(), vec![json!({ "body": text })])?;
    let lines = renderer.backend().texts(0);
    // two 12pt lines fit the 30pt box, the rest is clipped
    assert_eq!(lines.len(), 2, "got {:?}", lines);
    assert!(lines[0].starts_with("one two"));
    Ok(())
}

#[test]
fn test_flex_table_rows_follow_records() -> TestResult {
    init_logging();
    let xml = ConfigXml::new()
        .entry(
            r##"<page>
                 <flextable name="lines" datasource="lines" x="20" y="100" border="0.5" padding="2" bgcolors="#FFFFFF;#EEEEEE">
                   <column field="qty" width="40" title="Qty" align="R"/>
                   <column field="item" width="200" title="Item"/>
                 </flextable>
               </page>"##,
        )
        .build();
    let entity = json!({ "lines": [
        { "qty": 2, "item": "Widget" },
        { "qty": 10, "item": "Gadget" }
    ] });
    let pdf = render_pdf(&xml, InMemoryResourceProvider::new(), vec![entity])?;
    assert_eq!(pdf.texts(1), vec!["Qty", "Item", "2", "Widget", "10", "Gadget"]);
    Ok(())
}

#[test]
fn test_data_blocks_with_shifts() -> TestResult {
    init_logging();
    let xml = ConfigXml::new()
        .block(
            r#"<block name="address">
                 <field name="street" x="0" y="0" width="150"/>
                 <field name="city" x="0" y="14" width="150"/>
               </block>"#,
        )
        .entry(
            r#"<page>
                 <datablock name="address" datasource="billing" x="300" y="100">
                   <shift field="city" x="10" y="0"/>
                 </datablock>
               </page>"#,
        )
        .build();
    let entity = json!({ "billing": { "street": "Main St 1", "city": "Oslo" } });
    let renderer = record(&xml, InMemoryResourceProvider::new(), vec![entity])?;
    let positions: Vec<(String, f32)> = renderer
        .backend()
        .ops(0)
        .iter()
        .filter_map(|op| match op {
            DrawOp::Text { x, text, .. } => Some((text.clone(), *x)),
            _ => None,
        })
        .collect();
    assert_eq!(positions, vec![("Main St 1".to_string(), 300.0), ("Oslo".to_string(), 310.0)]);
    Ok(())
}
