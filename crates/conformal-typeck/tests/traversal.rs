//! Integration tests for the missing / unavailable / isolated walks and
//! the issues they feed to diagnostics.

mod common;

use common::*;
use conformal_common::Span;
use conformal_typeck::diagnostics::render_issue;
use conformal_typeck::error::ConformanceIssue;
use conformal_typeck::{ConformanceCx, ConformanceRef, Ty};

/// `Array<Int>: Equatable` reaches only declared conformances.
#[test]
fn specialization_over_declared_conformances_has_nothing_missing() {
    let mut fx = fixture();
    let lookup = Counting::new(&fx.table);
    let mut cx = ConformanceCx::new(&mut fx.tcx, &lookup);

    let conformance = cx.lookup_conformance(&Ty::array(Ty::int()), fx.equatable, false);
    assert!(conformance.is_concrete());

    let mut visited = 0;
    let found = conformance.for_each_missing_conformance(cx.tcx, |_, _| {
        visited += 1;
        false
    });
    assert!(!found);
    assert_eq!(visited, 0);
    assert!(!conformance.has_missing_conformance(cx.tcx));
    assert!(!conformance.has_unavailable_conformance(cx.tcx));
    assert!(conformance.collect_issues(cx.tcx).is_empty());
}

#[test]
fn non_isolated_conformances_visit_nothing() {
    let mut fx = fixture();
    let lookup = Counting::new(&fx.table);
    let mut cx = ConformanceCx::new(&mut fx.tcx, &lookup);

    let specialized = cx.lookup_conformance(&Ty::array(Ty::int()), fx.equatable, false);
    for conformance in [ConformanceRef::Concrete(fx.int_equatable), specialized] {
        let mut visited = 0;
        let found = conformance.for_each_isolated_conformance(cx.tcx, |_| {
            visited += 1;
            false
        });
        assert!(!found);
        assert_eq!(visited, 0);
    }
}

#[test]
fn missing_conformances_inside_pack_are_all_visited() {
    let mut fx = fixture();
    let lookup = Counting::new(&fx.table);
    let mut cx = ConformanceCx::new(&mut fx.tcx, &lookup);

    let pack_ty = Ty::Pack(vec![Ty::named("Point"), Ty::int(), Ty::named("Line")]);
    let conformance = cx.lookup_conformance(&pack_ty, fx.equatable, true);
    assert!(conformance.is_pack(), "expected pack, got {:?}", conformance);

    let mut missing = Vec::new();
    let stopped = conformance.for_each_missing_conformance(cx.tcx, |_, builtin| {
        missing.push(builtin.ty.clone());
        false
    });
    assert!(!stopped);
    assert_eq!(missing, vec![Ty::named("Point"), Ty::named("Line")]);

    // A visitor returning true stops at the first one.
    let mut visited = 0;
    assert!(conformance.for_each_missing_conformance(cx.tcx, |_, _| {
        visited += 1;
        true
    }));
    assert_eq!(visited, 1);

    let issues = conformance.collect_issues(cx.tcx);
    assert_eq!(
        issues,
        vec![
            ConformanceIssue::Missing { ty: Ty::named("Point"), interface: "Equatable".to_string() },
            ConformanceIssue::Missing { ty: Ty::named("Line"), interface: "Equatable".to_string() },
        ]
    );
}

#[test]
fn failed_lookup_without_allow_missing_is_invalid() {
    let mut fx = fixture();
    let lookup = Counting::new(&fx.table);
    let mut cx = ConformanceCx::new(&mut fx.tcx, &lookup);

    let conformance = cx.lookup_conformance(&Ty::named("Point"), fx.equatable, false);
    assert!(conformance.is_invalid());
    assert!(!conformance.has_missing_conformance(cx.tcx));
}

#[test]
fn unavailable_conformance_nested_in_specialization() {
    let mut fx = fixture();
    let lookup = Counting::new(&fx.table);
    let mut cx = ConformanceCx::new(&mut fx.tcx, &lookup);

    let legacy = ConformanceRef::Concrete(fx.legacy_equatable);
    assert!(legacy.has_unavailable_conformance(cx.tcx));

    let array_legacy = Ty::array(Ty::named("Legacy"));
    let conformance = cx.lookup_conformance(&array_legacy, fx.equatable, false);
    assert!(conformance.is_concrete());
    assert!(conformance.has_unavailable_conformance(cx.tcx));

    let mut visited = Vec::new();
    conformance.for_each_unavailable_conformance(cx.tcx, |id, _| {
        visited.push(id);
        false
    });
    assert_eq!(visited, vec![fx.legacy_equatable]);

    assert_eq!(
        conformance.collect_issues(cx.tcx),
        vec![ConformanceIssue::Unavailable {
            ty: Ty::named("Legacy"),
            interface: "Equatable".to_string(),
            span: Some(Span::new(70, 80)),
        }]
    );
}

#[test]
fn isolated_conformance_nested_in_specialization() {
    let mut fx = fixture();
    let lookup = Counting::new(&fx.table);
    let mut cx = ConformanceCx::new(&mut fx.tcx, &lookup);

    let conformance = cx.lookup_conformance(&Ty::array(model()), fx.sendable, false);
    assert!(conformance.is_concrete(), "expected concrete, got {:?}", conformance);

    let mut isolated = Vec::new();
    let stopped = conformance.for_each_isolated_conformance(cx.tcx, |nested| {
        isolated.push(nested.clone());
        false
    });
    assert!(!stopped);
    assert_eq!(isolated, vec![ConformanceRef::Concrete(fx.model_sendable)]);

    assert_eq!(
        conformance.collect_issues(cx.tcx),
        vec![ConformanceIssue::Isolated {
            ty: model(),
            interface: "Sendable".to_string(),
            actor: "MainActor".to_string(),
            span: Some(Span::new(50, 60)),
        }]
    );
}

#[test]
fn abstract_and_invalid_reach_nothing() {
    let mut fx = fixture();
    let equatable = fx.tcx.decls.interface_ref(fx.equatable);
    let tcx = &fx.tcx;

    for conformance in [ConformanceRef::Invalid, ConformanceRef::for_abstract(t(), equatable)] {
        assert!(!conformance.has_missing_conformance(tcx));
        assert!(!conformance.has_unavailable_conformance(tcx));
        assert!(!conformance.for_each_isolated_conformance(tcx, |_| true));
        assert!(conformance.collect_issues(tcx).is_empty());
    }
}

#[test]
fn traversal_depth_bound_stops_the_walk() {
    let mut fx = fixture();
    fx.tcx.config.max_traversal_depth = 0;
    let lookup = Counting::new(&fx.table);
    let mut cx = ConformanceCx::new(&mut fx.tcx, &lookup);

    let conformance = cx.lookup_conformance(&Ty::array(Ty::named("Legacy")), fx.equatable, false);
    assert!(conformance.is_concrete());
    assert!(!conformance.has_unavailable_conformance(cx.tcx));
    assert!(ConformanceRef::Concrete(fx.legacy_equatable).has_unavailable_conformance(cx.tcx));
}

#[test]
fn collected_issues_render_with_codes() {
    let mut fx = fixture();
    let lookup = Counting::new(&fx.table);
    let mut cx = ConformanceCx::new(&mut fx.tcx, &lookup);

    let source = format!("{}\n{}\n", "x".repeat(60), "extension Legacy: Equatable {}");
    let conformance = cx.lookup_conformance(&Ty::array(Ty::named("Legacy")), fx.equatable, false);
    let issues = conformance.collect_issues(cx.tcx);
    assert_eq!(issues.len(), 1);

    let output = render_issue(&issues[0], &source, "legacy.swift");
    assert!(output.contains("C0002"), "missing code in {}", output);
    assert!(
        output.contains("conformance of `Legacy` to `Equatable` is unavailable"),
        "missing message in {}",
        output
    );
    assert!(output.contains("2:10"), "missing declaration position in {}", output);
}
