mod common;

use common::fixtures::{A4, ConfigXml, labeled_pdf};
use common::{TestResult, init_logging, render_pdf};
use quire::InMemoryResourceProvider;
use serde_json::json;

fn provider() -> InMemoryResourceProvider {
    InMemoryResourceProvider::new().with("terms.pdf", labeled_pdf("terms", &[A4, A4, A4]))
}

fn config(append: &str) -> String {
    ConfigXml::new()
        .pagination("p%page%")
        .entry(r#"<page name="first"><field name="v" value="first" x="20" y="40"/></page>"#)
        .entry(r#"<page name="second"><field name="v" value="second" x="20" y="40"/></page>"#)
        .entry(append)
        .build()
}

#[test]
fn test_append_inserts_every_page_in_order() -> TestResult {
    init_logging();
    let pdf = render_pdf(&config(r#"<appendpdf src="terms.pdf" after="first"/>"#), provider(), vec![json!({})])?;
    assert_pdf_page_count!(pdf, 5);
    assert_page_shows!(pdf, 1, "first");
    assert_page_shows!(pdf, 2, "terms 1");
    assert_page_shows!(pdf, 3, "terms 2");
    assert_page_shows!(pdf, 4, "terms 3");
    assert_page_shows!(pdf, 5, "second");
    assert_eq!(pdf.texts(2), vec!["terms 1"], "appended pages carry no overlay");
    assert_eq!(pdf.summary.appended_pages, 3);
    Ok(())
}

#[test]
fn test_append_defaults_to_preceding_page() -> TestResult {
    init_logging();
    let pdf = render_pdf(&config(r#"<appendpdf src="terms.pdf"/>"#), provider(), vec![json!({})])?;
    assert_pdf_page_count!(pdf, 5);
    assert_page_shows!(pdf, 2, "second");
    assert_page_shows!(pdf, 3, "terms 1");
    Ok(())
}

#[test]
fn test_numbering_modes() -> TestResult {
    init_logging();
    let none = render_pdf(
        &config(r#"<appendpdf src="terms.pdf" after="first" numbering="none"/>"#),
        provider(),
        vec![json!({})],
    )?;
    assert_page_shows!(none, 5, "p2");

    let inherit = render_pdf(
        &config(r#"<appendpdf src="terms.pdf" after="first" numbering="inherit"/>"#),
        provider(),
        vec![json!({})],
    )?;
    assert_page_shows!(inherit, 5, "p5");
    Ok(())
}

#[test]
fn test_numbering_restarts_per_entity() -> TestResult {
    init_logging();
    let pdf = render_pdf(&config(r#"<appendpdf src="terms.pdf"/>"#), provider(), vec![json!({}), json!({})])?;
    assert_pdf_page_count!(pdf, 10);
    assert_page_shows!(pdf, 1, "p1");
    assert_page_shows!(pdf, 6, "p1");
    assert_page_shows!(pdf, 7, "p2");
    Ok(())
}

#[test]
fn test_own_numbering_keeps_global_counter_running() -> TestResult {
    init_logging();
    let xml = ConfigXml::new()
        .pagination("%page%")
        .entry(r#"<page><field name="v" value="a" x="20" y="40"/></page>"#)
        .entry(r#"<page ownnumbering="1" startnumber="100"><field name="v" value="b" x="20" y="40"/></page>"#)
        .entry(r#"<page><field name="v" value="c" x="20" y="40"/></page>"#)
        .build();
    let pdf = render_pdf(&xml, InMemoryResourceProvider::new(), vec![json!({})])?;
    assert_eq!(pdf.texts(1), vec!["a", "1"]);
    assert_eq!(pdf.texts(2), vec!["b", "100"]);
    assert_eq!(pdf.texts(3), vec!["c", "3"]);
    Ok(())
}

#[test]
fn test_missing_append_is_recorded() -> TestResult {
    init_logging();
    let pdf = render_pdf(
        &config(r#"<appendpdf src="absent.pdf"/>"#),
        InMemoryResourceProvider::new(),
        vec![json!({})],
    )?;
    assert_pdf_page_count!(pdf, 2);
    assert_eq!(pdf.errors.len(), 1);
    Ok(())
}
