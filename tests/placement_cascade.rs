//! Filing notes from classifier proposals, including the synthesis cascade

mod common;

use common::{section, TestVault};
use mocweave::{
    Hierarchy, HierarchyProposal, MockGenerator, NoteReference, PlacementPolicy,
    SynthesisOutcome,
};
use serde_json::json;
use std::path::PathBuf;

fn h(labels: &[&str]) -> Hierarchy {
    Hierarchy::new(labels.iter().copied()).unwrap()
}

fn ml_proposal() -> HierarchyProposal {
    HierarchyProposal::from_value(json!({
        "hierarchy": {"level1": "Computer Science", "level2": "Machine Learning"},
        "confidence": 0.8,
        "reasoning": "Gradient descent applied to model training",
        "isCrossDomain": true,
        "alternativeHierarchies": [
            {"level1": "Mathematics", "level2": "Optimization", "strength": 0.7}
        ]
    }))
    .unwrap()
}

#[tokio::test]
async fn single_placement_links_counts_and_synthesizes() {
    let vault = TestVault::new();
    let engine = vault.engine(PlacementPolicy::Single);
    let note = vault.write_note(
        "Notes/Gradient Descent",
        "---\ncomplexity: intermediate\n---\nIterative first-order optimization.\n",
    );
    let generator = MockGenerator::new().with_response(
        r#"Here you go: {"overview": "How models learn.", "keyThemes": ["optimization"]}"#,
    );

    let report = engine
        .place_note(&generator, &NoteReference::new("Gradient Descent", note), &ml_proposal())
        .await
        .unwrap();

    assert_eq!(report.placements.len(), 1);
    let placement = &report.placements[0];
    assert_eq!(
        placement.leaf_moc,
        PathBuf::from("MOCs/Computer Science/00-Machine Learning MOC.md")
    );
    assert_eq!(
        placement.cascade[0].outcome,
        Ok(SynthesisOutcome::Synthesized { notes: 1 })
    );
    assert_eq!(placement.cascade[1].outcome, Ok(SynthesisOutcome::NoNotes));

    let leaf = vault.read(&placement.leaf_moc);
    assert!(section(&leaf, "Notes").contains("[[Notes/Gradient Descent|Gradient Descent]]"));
    assert!(section(&leaf, "Overview").contains("How models learn."));
    assert!(section(&leaf, "Key Themes").contains("optimization"));
    assert!(leaf.find("## Overview").unwrap() < leaf.find("## Learning Paths").unwrap());

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("complexity: intermediate"));

    let index = engine.index();
    let node = index.find(&h(&["Computer Science", "Machine Learning"]).path()).unwrap();
    assert_eq!(node.note_count, 1);
}

#[tokio::test]
async fn cross_domain_note_lands_in_both_leaves() {
    let vault = TestVault::new();
    let engine = vault.engine(PlacementPolicy::multi());
    let note = vault.write_note("Notes/Gradient Descent", "Iterative optimization.");
    let generator = MockGenerator::new()
        .with_response(r#"{"overview": "ML view"}"#)
        .with_response(r#"{"overview": "Math view"}"#);

    let report = engine
        .place_note(&generator, &NoteReference::new("Gradient Descent", note), &ml_proposal())
        .await
        .unwrap();

    assert_eq!(
        report.leaf_mocs(),
        vec![
            PathBuf::from("MOCs/Computer Science/00-Machine Learning MOC.md").as_path(),
            PathBuf::from("MOCs/Mathematics/00-Optimization MOC.md").as_path(),
        ]
    );
    for leaf in report.leaf_mocs() {
        let text = vault.read(leaf);
        assert!(section(&text, "Notes").contains("[[Notes/Gradient Descent|Gradient Descent]]"));
    }
    assert!(section(&vault.read("MOCs/Mathematics/00-Optimization MOC.md"), "Overview")
        .contains("Math view"));
    assert!(report.failures.is_empty());
    assert_eq!(engine.index().domains().len(), 2);
    assert!(engine.verify_consistency().unwrap().is_empty());
}

#[tokio::test]
async fn cascade_goes_leaf_to_root_and_survives_generator_failures() {
    let vault = TestVault::new();
    let engine = vault.engine(PlacementPolicy::Single);
    let hierarchy = h(&["Biology", "Genetics", "Heredity"]);
    engine.ensure_exists(&hierarchy, None).unwrap();

    let mendel = vault.write_note("Notes/Mendel", "Pea plant experiments.");
    let dna = vault.write_note("Notes/DNA", "Double helix.");
    engine
        .mocs()
        .link_note(
            &PathBuf::from("MOCs/Biology/00-Genetics MOC.md"),
            &NoteReference::new("DNA", dna),
        )
        .unwrap();

    let proposal = HierarchyProposal::new(hierarchy).unwrap();
    let generator = MockGenerator::new()
        .with_failure("rate limited")
        .with_response(r#"{"overview": "Genes and inheritance."}"#);
    let report = engine
        .place_note(&generator, &NoteReference::new("Mendel", mendel), &proposal)
        .await
        .unwrap();

    let cascade = &report.placements[0].cascade;
    let order: Vec<PathBuf> = cascade.iter().map(|s| s.moc.clone()).collect();
    assert_eq!(
        order,
        vec![
            PathBuf::from("MOCs/Biology/Genetics/00-Heredity MOC.md"),
            PathBuf::from("MOCs/Biology/00-Genetics MOC.md"),
            PathBuf::from("MOCs/00-Biology MOC.md"),
        ]
    );
    assert!(matches!(
        cascade[0].outcome,
        Ok(SynthesisOutcome::Fallback { notes: 1, .. })
    ));
    assert_eq!(cascade[1].outcome, Ok(SynthesisOutcome::Synthesized { notes: 1 }));
    assert_eq!(cascade[2].outcome, Ok(SynthesisOutcome::NoNotes));

    let prompts = generator.prompts();
    assert!(prompts[0].contains("Heredity"));
    assert!(prompts[1].contains("Genetics"));

    let leaf = vault.read("MOCs/Biology/Genetics/00-Heredity MOC.md");
    assert!(section(&leaf, "Overview").contains("Knowledge area with 1 note."));
}

#[tokio::test]
async fn placing_twice_links_once_and_counts_twice() {
    let vault = TestVault::new();
    let engine = vault.engine(PlacementPolicy::Single);
    let note = NoteReference::new("Mendel", vault.write_note("Notes/Mendel", "Peas."));
    let proposal = HierarchyProposal::new(h(&["Biology", "Genetics"])).unwrap();
    let generator = MockGenerator::new();

    engine.place_note(&generator, &note, &proposal).await.unwrap();
    engine.place_note(&generator, &note, &proposal).await.unwrap();

    let leaf = vault.read("MOCs/Biology/00-Genetics MOC.md");
    assert_eq!(leaf.matches("[[Notes/Mendel|Mendel]]").count(), 1);
    let index = engine.index();
    assert_eq!(index.find(&h(&["Biology", "Genetics"]).path()).unwrap().note_count, 2);
}

#[tokio::test]
async fn conflicting_placement_is_logged_and_still_filed() {
    let vault = TestVault::new();
    let engine = vault.engine(PlacementPolicy::Single);
    engine
        .ensure_exists(&h(&["Computer Science", "Machine Learning"]), None)
        .unwrap();

    let note = NoteReference::new("Bias", vault.write_note("Notes/Bias", "Bias and variance."));
    let proposal =
        HierarchyProposal::new(h(&["Mathematics", "Statistics", "Machine Learning"])).unwrap();
    let report = engine
        .place_note(&MockGenerator::new(), &note, &proposal)
        .await
        .unwrap();

    let conflicts = &report.placements[0].conflicts;
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].concept(), "Machine Learning");
    assert!(conflicts[0].recommendation().contains("Computer Science > Machine Learning"));
    assert!(vault
        .read("MOCs/Mathematics/Statistics/00-Machine Learning MOC.md")
        .contains("[[Notes/Bias|Bias]]"));

    let context = engine.render_context_for_classifier();
    assert!(context.contains("CONFLICTS:"));
    assert!(context.contains("[CONFLICT]"));
    assert_eq!(engine.index().conflicts().len(), 1);
}
