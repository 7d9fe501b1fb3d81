//! Benchmarks for the scan and splice path.
//!
//! Run with: cargo bench

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use docweave::{Merger, scan};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

/// A host with `slots` placeholders separated by filler paragraphs.
fn host(slots: u32) -> String {
    let mut body = String::new();
    for id in 0..slots {
        body.push_str(&format!(
            r#"<w:p><w:r><w:t>Абзац {id}</w:t></w:r></w:p><w:p><w:bookmarkStart w:id="{id}" w:name="Замена{id}"/><w:r><w:t>место</w:t></w:r><w:bookmarkEnd w:id="{id}"/></w:p>"#
        ));
    }
    document(&body)
}

/// A child filling placeholder `slot` with `paragraphs` paragraphs.
fn child(slot: u32, paragraphs: usize) -> String {
    let mut body = format!(r#"<w:p><w:bookmarkStart w:id="900" w:name="Замена{slot}"/>"#);
    for i in 0..paragraphs {
        if i > 0 {
            body.push_str("<w:p>");
        }
        body.push_str(&format!("<w:r><w:t>Пункт {i}</w:t></w:r>"));
        if i + 1 == paragraphs {
            body.push_str(r#"<w:bookmarkEnd w:id="900"/>"#);
        }
        body.push_str("</w:p>");
    }
    document(&body)
}

fn document(body: &str) -> String {
    format!(r#"<w:document xmlns:w="{W_NS}"><w:body>{body}<w:sectPr/></w:body></w:document>"#)
}

// ============================================================================
// Scanner
// ============================================================================

fn bench_scan(c: &mut Criterion) {
    let xml = host(200);
    c.bench_function("scan_200_bookmarks", |b| {
        b.iter(|| scan(black_box(&xml)).unwrap());
    });
}

// ============================================================================
// Merge
// ============================================================================

fn bench_merge(c: &mut Criterion) {
    let host = host(50);
    let children: Vec<String> = (0..50).map(|slot| child(slot, 3)).collect();

    c.bench_function("merge_50_children", |b| {
        b.iter(|| {
            let mut merger = Merger::load_with_seed(&host, RELS, 1).unwrap();
            merger
                .merge(children.iter().map(|c| (c.as_str(), "")))
                .unwrap();
            black_box(merger.body_xml())
        });
    });
}

criterion_group!(benches, bench_scan, bench_merge);
criterion_main!(benches);
