//! Scenario 6 (spec.md §8): a non-PASS micro-evolution response persists an
//! Experience and surfaces its strategy through `GetGuidance`.

mod common;

use common::EvolutionTestEngine;

const LESSON_RESPONSE: &str =
    "TRIGGER: over-scheduling\nINSIGHT: low focus\nSTRATEGY: cap meetings at 3";

#[tokio::test]
async fn non_pass_response_persists_an_experience_and_surfaces_as_guidance() {
    let engine = EvolutionTestEngine::with_scripted_llm(vec![LESSON_RESPONSE]).await;

    let recorded = engine
        .service
        .micro_evolve(
            "u1",
            "Should I attend the meeting?",
            "You already have 5 meetings today; skip.",
            None,
        )
        .await
        .expect("micro-evolution runs");
    assert!(recorded, "a non-PASS response records a lesson");

    let experiences = engine.graph.get_all_experiences("u1").expect("read experiences");
    assert_eq!(experiences.len(), 1);
    assert_eq!(experiences[0].strategy, "cap meetings at 3");

    assert_eq!(engine.vectors.get_stats().experiences, 1);

    let guidance = engine.service.get_guidance("meeting").await;
    assert!(guidance.iter().any(|g| g.contains("cap meetings at 3")), "guidance: {guidance:?}");
}
