//! Exposition parser/renderer vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use promfile_core::text::{parse, render, HelpPolicy};

use vector_loader::{families, load};

const VECTORS: [&str; 7] = [
    "counter_basic.json",
    "malformed_line_skipped.json",
    "truncated_write.json",
    "histogram_family.json",
    "untyped_and_comments.json",
    "label_order_policy.json",
    "unsupported_type.json",
];

#[test]
fn parse_vectors() {
    for f in VECTORS {
        let v = load(f);
        let snap = parse(&v.input);
        assert_eq!(families(&snap), v.expect, "vector={}", v.description);
    }
}

#[test]
fn render_vectors() {
    for f in VECTORS {
        let v = load(f);
        let Some(expected) = v.rendered else { continue };
        let snap = parse(&v.input);
        assert_eq!(
            render(snap.families(), HelpPolicy::Always),
            expected,
            "vector={}",
            v.description
        );
    }
}

#[test]
fn parse_render_parse_is_stable() {
    for f in VECTORS {
        let v = load(f);
        let first = parse(&v.input);
        for policy in [HelpPolicy::Always, HelpPolicy::OmitEmpty] {
            let text = render(first.families(), policy);
            assert!(text.is_empty() || text.ends_with('\n'), "vector={}", v.description);

            let second = parse(&text);
            assert_eq!(families(&second), families(&first), "vector={}", v.description);
            assert_eq!(render(second.families(), policy), text, "vector={}", v.description);
        }
    }
}
