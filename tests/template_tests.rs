mod common;

use common::fixtures::{A4, A4_LANDSCAPE, ConfigXml, labeled_pdf};
use common::{TestResult, builder, init_logging, record, render_pdf};
use quire::{ComposeError, InMemoryResourceProvider, Orientation, RecordingBackend, SourceName};
use serde_json::json;

fn source(name: &str, page: u32) -> (SourceName, u32) {
    (SourceName::from(name), page)
}

fn three_pages(templates: &str) -> String {
    ConfigXml::new()
        .templates(templates)
        .entry(r#"<page name="a"><field name="v" value="a" x="20" y="40"/></page>"#)
        .entry(r#"<page name="b"><field name="v" value="b" x="20" y="40"/></page>"#)
        .entry(r#"<page name="c"><field name="v" value="c" x="20" y="40"/></page>"#)
        .build()
}

#[test]
fn test_pages_take_template_pages_in_order() -> TestResult {
    init_logging();
    let provider = InMemoryResourceProvider::new()
        .with("front.pdf", labeled_pdf("front", &[A4]))
        .with("body.pdf", labeled_pdf("body", &[A4, A4, A4]));
    let xml = three_pages(r#"<template src="front.pdf"/><template src="body.pdf" pages="3,1"/>"#);
    let renderer = record(&xml, provider, vec![json!({})])?;
    let backend = renderer.backend();
    assert_eq!(backend.backgrounds(0), vec![&source("front.pdf", 1)]);
    assert_eq!(backend.backgrounds(1), vec![&source("body.pdf", 3)]);
    assert_eq!(backend.backgrounds(2), vec![&source("body.pdf", 1)]);
    Ok(())
}

#[test]
fn test_missing_template_file_is_skipped_once() -> TestResult {
    init_logging();
    let provider = InMemoryResourceProvider::new().with("real.pdf", labeled_pdf("real", &[A4]));
    let xml = three_pages(r#"<template src="gone.pdf"/><template src="real.pdf"/>"#);
    let renderer = record(&xml, provider, vec![json!({}), json!({})])?;
    let backend = renderer.backend();
    assert_eq!(backend.pages.len(), 6);
    assert_eq!(backend.backgrounds(0), vec![&source("real.pdf", 1)]);
    assert!(backend.backgrounds(1).is_empty());
    assert!(backend.backgrounds(2).is_empty());
    assert_eq!(backend.backgrounds(3), vec![&source("real.pdf", 1)]);
    let missing: Vec<_> = renderer
        .errors()
        .iter()
        .filter(|e| matches!(e, ComposeError::TemplateNotFound { .. }))
        .collect();
    assert_eq!(missing.len(), 1);
    Ok(())
}

#[test]
fn test_template_name_from_parameter() -> TestResult {
    init_logging();
    let provider = || {
        InMemoryResourceProvider::new()
            .with("en.pdf", labeled_pdf("en", &[A4]))
            .with("no.pdf", labeled_pdf("no", &[A4]))
    };
    let xml = ConfigXml::new()
        .param("lang", "en.pdf")
        .templates(r#"<template src="$lang"/>"#)
        .entry(r#"<page><field name="v" value="x" x="20" y="40"/></page>"#)
        .build();

    let renderer = record(&xml, provider(), vec![json!({})])?;
    assert_eq!(renderer.backend().backgrounds(0), vec![&source("en.pdf", 1)]);

    let mut renderer = builder(&xml, provider())?
        .with_param("lang", "no.pdf")
        .build(RecordingBackend::new())?;
    renderer.render_entity(&json!({}))?;
    assert_eq!(renderer.backend().backgrounds(0), vec![&source("no.pdf", 1)]);
    Ok(())
}

#[test]
fn test_landscape_template_sets_page_geometry() -> TestResult {
    init_logging();
    let provider = || InMemoryResourceProvider::new().with("wide.pdf", labeled_pdf("wide", &[A4_LANDSCAPE]));
    let xml = ConfigXml::new()
        .templates(r#"<template src="wide.pdf"/>"#)
        .entry(r#"<page><field name="v" value="x" x="20" y="40"/></page>"#)
        .entry(r#"<page><field name="v" value="y" x="20" y="40"/></page>"#)
        .build();
    let pdf = render_pdf(&xml, provider(), vec![json!({})])?;
    assert_eq!(pdf.page_size(1), A4_LANDSCAPE);
    let (width, height) = pdf.page_size(2);
    assert!(width < height, "queue exhausted, page 2 falls back to portrait A4");

    let renderer = record(&xml, provider(), vec![json!({})])?;
    assert_eq!(renderer.backend().pages[0].orientation, Orientation::Landscape);
    assert_eq!(renderer.backend().pages[1].orientation, Orientation::Portrait);
    Ok(())
}

#[test]
fn test_orientation_filter_on_fields() -> TestResult {
    init_logging();
    let provider = InMemoryResourceProvider::new().with("wide.pdf", labeled_pdf("wide", &[A4_LANDSCAPE]));
    let xml = ConfigXml::new()
        .templates(r#"<template src="wide.pdf"/>"#)
        .entry(
            r#"<page>
                 <field name="p" value="portrait only" orientation="P" x="20" y="40"/>
                 <field name="l" value="landscape only" orientation="L" x="20" y="60"/>
               </page>"#,
        )
        .build();
    let renderer = record(&xml, provider, vec![json!({})])?;
    assert_eq!(renderer.backend().texts(0), vec!["landscape only"]);
    Ok(())
}

#[test]
fn test_non_paginating_template_hides_footer() -> TestResult {
    init_logging();
    let provider = InMemoryResourceProvider::new()
        .with("cover.pdf", labeled_pdf("cover", &[A4]))
        .with("body.pdf", labeled_pdf("body", &[A4]));
    let xml = ConfigXml::new()
        .pagination("- %page% -")
        .templates(r#"<template src="cover.pdf" paginate="0"/><template src="body.pdf"/>"#)
        .entry(r#"<page><field name="v" value="cover" x="20" y="40"/></page>"#)
        .entry(r#"<page><field name="v" value="body" x="20" y="40"/></page>"#)
        .entry(r#"<page nopagination="1"><field name="v" value="plain" x="20" y="40"/></page>"#)
        .build();
    let pdf = render_pdf(&xml, provider, vec![json!({})])?;
    assert_eq!(pdf.texts(1), vec!["cover"]);
    assert_eq!(pdf.texts(2), vec!["body", "- 2 -"]);
    assert_eq!(pdf.texts(3), vec!["plain"]);
    Ok(())
}

#[test]
fn test_explicit_template_does_not_consume_queue() -> TestResult {
    init_logging();
    let provider = InMemoryResourceProvider::new()
        .with("queue.pdf", labeled_pdf("queue", &[A4, A4]))
        .with("special.pdf", labeled_pdf("special", &[A4, A4]));
    let xml = ConfigXml::new()
        .templates(r#"<template src="queue.pdf"/>"#)
        .entry(r#"<page><field name="v" value="1" x="20" y="40"/></page>"#)
        .entry(r#"<page><template src="special.pdf" page="2"/><field name="v" value="2" x="20" y="40"/></page>"#)
        .entry(r#"<page><field name="v" value="3" x="20" y="40"/></page>"#)
        .build();
    let renderer = record(&xml, provider, vec![json!({})])?;
    let backend = renderer.backend();
    assert_eq!(backend.backgrounds(0), vec![&source("queue.pdf", 1)]);
    assert_eq!(backend.backgrounds(1), vec![&source("special.pdf", 2)]);
    assert_eq!(backend.backgrounds(2), vec![&source("queue.pdf", 2)]);
    Ok(())
}
