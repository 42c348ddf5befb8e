mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{FakeDecoder, FakePage};
use outline::images::PageImage;
use outline::{
    extract_outline_with, extract_text_with, BBox, DocumentProfile, HeadingLevel,
    HeuristicsConfig, OcrCapability, OcrEngine, Outline, OutlineError, OutlineExtractor,
    PageGeometry, Stage, TextBlock,
};

fn run(pages: Vec<FakePage>) -> Outline {
    extract_outline_with(
        FakeDecoder::new(pages),
        &HeuristicsConfig::default(),
        &OcrCapability::Absent,
    )
    .unwrap()
}

fn texts(outline: &Outline) -> Vec<&str> {
    outline.outline.iter().map(|e| e.text.as_str()).collect()
}

/// A body-only page: sets the baseline and yields a title that is never a
/// candidate.
fn body_page() -> FakePage {
    FakePage::new().body(300.0).body(320.0).body(340.0)
}

fn report() -> Vec<FakePage> {
    vec![
        FakePage::new()
            .body(400.0)
            .line("Executive Summary", 300.0, 18.0)
            .line("Annual Review", 150.0, 28.0),
        FakePage::new()
            .line("Regional Results", 400.0, 14.0)
            .body(250.0)
            .line("Market Overview", 200.0, 18.0)
            .body(450.0),
    ]
}

#[test]
fn test_title_is_excluded_and_entries_are_in_page_order() {
    let outline = run(report());

    assert_eq!(outline.title, "Annual Review");
    assert_eq!(
        texts(&outline),
        vec!["Executive Summary", "Market Overview", "Regional Results"]
    );
    let pages: Vec<usize> = outline.outline.iter().map(|e| e.page).collect();
    assert_eq!(pages, vec![1, 2, 2]);
}

#[test]
fn test_pages_are_one_based_and_in_range() {
    let pages = report();
    let count = pages.len();
    let outline = run(pages);

    assert!(!outline.outline.is_empty());
    assert!(outline.outline.iter().all(|e| e.page >= 1 && e.page <= count));
}

#[test]
fn test_extraction_is_deterministic() {
    assert_eq!(run(report()), run(report()));
}

#[test]
fn test_zero_page_document_is_empty() {
    let outline = run(Vec::new());
    assert_eq!(outline, Outline::default());
}

#[test]
fn test_blank_page_is_empty() {
    let outline = run(vec![FakePage::new()]);
    assert_eq!(outline.title, "");
    assert!(outline.outline.is_empty());
}

#[test]
fn test_repeated_footer_is_masked() {
    let mut pages = Vec::new();
    for n in 0..10 {
        let mut page = body_page().bold("Confidential Draft", 760.0, 12.0);
        if n == 0 {
            page = page.line("Design Review", 150.0, 20.0);
        }
        if n == 4 {
            page = page.line("Open Issues", 200.0, 16.0);
        }
        pages.push(page);
    }

    let outline = run(pages);

    assert_eq!(outline.title, "Design Review");
    assert_eq!(texts(&outline), vec!["Open Issues"]);
}

#[test]
fn test_single_occurrence_in_footer_band_is_kept() {
    let pages = vec![
        body_page().line("Cover Title Here", 150.0, 24.0),
        body_page().bold("Closing Remarks", 700.0, 12.0),
        body_page(),
    ];

    let outline = run(pages);

    assert_eq!(texts(&outline), vec!["Closing Remarks"]);
}

#[test]
fn test_wrapped_heading_is_merged() {
    let pages = vec![
        body_page(),
        FakePage::new()
            .line("Chapter 1:", 150.0, 20.0)
            .line("Introduction", 174.0, 20.0)
            .body(300.0),
    ];

    let outline = run(pages);

    assert_eq!(outline.outline.len(), 1);
    assert_eq!(outline.outline[0].text, "Chapter 1: Introduction");
    assert_eq!(outline.outline[0].level, HeadingLevel::H1);
    assert_eq!(outline.outline[0].page, 2);
}

#[test]
fn test_levels_follow_size_rank() {
    let sizes = [24.0, 24.0, 18.0, 18.0, 14.0, 14.0, 14.0, 13.0];
    let names = [
        "Section Alpha",
        "Section Bravo",
        "Section Charlie",
        "Section Delta",
        "Section Echo",
        "Section Foxtrot",
        "Section Golf",
        "Section Hotel",
    ];
    let mut second = FakePage::new();
    for (i, (name, size)) in names.iter().zip(sizes).enumerate() {
        second = second.line(name, 150.0 + 40.0 * i as f32, size);
    }
    let second = second.body(500.0).body(520.0);

    let outline = run(vec![body_page(), second]);

    let levels: Vec<HeadingLevel> = outline.outline.iter().map(|e| e.level).collect();
    assert_eq!(
        levels,
        vec![
            HeadingLevel::H1,
            HeadingLevel::H1,
            HeadingLevel::H2,
            HeadingLevel::H2,
            HeadingLevel::H3,
            HeadingLevel::H3,
            HeadingLevel::H3,
            HeadingLevel::H3,
        ]
    );
}

#[test]
fn test_max_levels_is_configurable() {
    let second = FakePage::new()
        .line("Part One", 150.0, 24.0)
        .line("Part Two", 200.0, 18.0)
        .line("Part Three", 250.0, 14.0)
        .body(400.0);
    let config = HeuristicsConfig {
        max_levels: 2,
        ..Default::default()
    };

    let outline = extract_outline_with(
        FakeDecoder::new(vec![body_page(), second]),
        &config,
        &OcrCapability::Absent,
    )
    .unwrap();

    let levels: Vec<HeadingLevel> = outline.outline.iter().map(|e| e.level).collect();
    assert_eq!(levels, vec![HeadingLevel::H1, HeadingLevel::H2, HeadingLevel::H3]);
}

#[test]
fn test_corrupted_heading_is_dropped() {
    let pages = vec![
        body_page(),
        body_page()
            .bold("Annual Report Annual Report 2024", 150.0, 18.0)
            .bold("Financial Statements", 200.0, 18.0)
            .bold("the cat sat the cat sat on the mat", 250.0, 18.0),
    ];

    let outline = run(pages);

    assert_eq!(texts(&outline), vec!["Financial Statements"]);
}

#[test]
fn test_corrupted_title_is_empty() {
    let pages = vec![
        body_page().line("Annual Report Annual Report Overview", 150.0, 26.0),
        body_page().line("Key Findings", 150.0, 18.0),
    ];

    let outline = run(pages);

    assert_eq!(outline.title, "");
    assert_eq!(texts(&outline), vec!["Key Findings"]);
}

#[test]
fn test_lowercase_and_long_lines_are_not_headings() {
    let pages = vec![
        body_page(),
        body_page()
            .line("continued from previous page", 150.0, 18.0)
            .line(
                "This Heading Has Far Too Many Words To Be A Real Heading In Any Sensible Document",
                200.0,
                18.0,
            )
            .line("Capital Plan", 250.0, 18.0),
    ];

    let outline = run(pages);

    assert_eq!(texts(&outline), vec!["Capital Plan"]);
}

#[test]
fn test_lines_inside_tables_are_skipped() {
    let decoder = FakeDecoder::new(vec![
        body_page(),
        body_page()
            .bold("Quarterly Figures", 420.0, 12.0)
            .bold("Notes On Method", 150.0, 12.0)
            .table(BBox::new(50.0, 400.0, 560.0, 600.0)),
    ]);
    let table_calls = decoder.table_calls.clone();

    let outline =
        extract_outline_with(decoder, &HeuristicsConfig::default(), &OcrCapability::Absent)
            .unwrap();

    assert_eq!(texts(&outline), vec!["Notes On Method"]);
    // Both candidates live on one page: detection runs once.
    assert_eq!(table_calls.get(), 1);
}

#[test]
fn test_table_detection_failure_keeps_candidates() {
    let mut decoder = FakeDecoder::new(vec![
        body_page(),
        body_page().bold("Notes On Method", 150.0, 12.0),
    ]);
    decoder.fail_tables = true;

    let outline =
        extract_outline_with(decoder, &HeuristicsConfig::default(), &OcrCapability::Absent)
            .unwrap();

    assert_eq!(texts(&outline), vec!["Notes On Method"]);
}

#[test]
fn test_failed_span_lookup_uses_defaults() {
    let mut decoder = FakeDecoder::new(report());
    decoder.fail_spans = true;

    let outline =
        extract_outline_with(decoder, &HeuristicsConfig::default(), &OcrCapability::Absent)
            .unwrap();

    // Every line falls back to 12pt regular, so nothing stands out.
    assert_eq!(outline.title, "Annual Review");
    assert!(outline.outline.is_empty());
}

#[test]
fn test_block_failure_reports_stage() {
    let mut decoder = FakeDecoder::new(report());
    decoder.fail_blocks_on = Some(1);

    let err = extract_outline_with(decoder, &HeuristicsConfig::default(), &OcrCapability::Absent)
        .unwrap_err();

    match err {
        OutlineError::Stage { stage, message } => {
            assert_eq!(stage, Stage::Classified);
            assert!(message.contains("page 1"), "{}", message);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

struct CannedOcr {
    calls: AtomicUsize,
}

impl OcrEngine for CannedOcr {
    fn recognize(
        &self,
        _image: &PageImage,
        _geometry: &PageGeometry,
    ) -> Result<Vec<TextBlock>, OutlineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![
            TextBlock {
                text: "Scanned Annual Report".to_string(),
                bbox: BBox::new(72.0, 200.0, 400.0, 224.0),
            },
            TextBlock {
                text: "Prepared for the board of directors in full".to_string(),
                bbox: BBox::new(72.0, 400.0, 500.0, 412.0),
            },
        ])
    }

    fn name(&self) -> &str {
        "canned"
    }
}

fn scanned() -> Vec<FakePage> {
    vec![FakePage::new().with_images(), body_page().bold("Board Decisions", 150.0, 12.0)]
}

#[test]
fn test_image_only_page_is_recognized() {
    let engine = Arc::new(CannedOcr {
        calls: AtomicUsize::new(0),
    });
    let ocr = OcrCapability::Present(engine.clone());

    let outline =
        extract_outline_with(FakeDecoder::new(scanned()), &HeuristicsConfig::default(), &ocr)
            .unwrap();

    assert_eq!(outline.title, "Scanned Annual Report");
    assert_eq!(texts(&outline), vec!["Board Decisions"]);
    // Only the page without a text layer goes through OCR.
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_image_only_page_without_ocr_contributes_nothing() {
    let outline = run(scanned());

    assert_eq!(outline.title, "");
    assert_eq!(texts(&outline), vec!["Board Decisions"]);
}

#[test]
fn test_profile_is_advisory() {
    let pages = vec![
        body_page().line("Application Form for Leave", 150.0, 22.0),
        body_page().line("Applicant Details", 150.0, 16.0),
    ];

    let mut extractor = OutlineExtractor::new(
        FakeDecoder::new(pages),
        HeuristicsConfig::default(),
        OcrCapability::Absent,
    );
    assert_eq!(extractor.classify().unwrap(), DocumentProfile::Form);
    assert_eq!(extractor.stage(), Stage::Opened);

    let outline = extractor.extract().unwrap();
    assert_eq!(outline.title, "Application Form for Leave");
    assert_eq!(texts(&outline), vec!["Applicant Details"]);
}

#[test]
fn test_outline_serializes_with_level_names() {
    let outline = run(report());
    let json = serde_json::to_value(&outline).unwrap();

    assert_eq!(json["title"], "Annual Review");
    // The title holds the largest size, so the first remaining heading is H2.
    assert_eq!(json["outline"][0]["level"], "H2");
    assert_eq!(json["outline"][0]["text"], "Executive Summary");
    assert_eq!(json["outline"][0]["page"], 1);
}

#[test]
fn test_plain_text_joins_pages() {
    let decoder = FakeDecoder::new(vec![
        FakePage::new().line("First page", 100.0, 12.0),
        FakePage::new(),
        FakePage::new().line("Third page", 100.0, 12.0),
    ]);

    assert_eq!(extract_text_with(&decoder).unwrap(), "First page\nThird page");
}
