// Tests for the typed content-generation contracts: the JSON the model
// is schema-constrained to produce must parse into the domain types.

use sphere_tutor_rs::content::{
    CoursePlan, CourseRequest, LibraryResource, QuizQuestion, Recommendation, ResourceType,
};

#[test]
fn full_course_plan_parses() {
    let raw = r#"{
        "title": "Intro to Rust",
        "description": "Systems programming from zero.",
        "modules": [
            {"title": "Ownership", "topics": ["Moves", "Borrows", "Lifetimes"]},
            {"title": "Traits", "topics": ["Generics", "Dyn dispatch"]},
            {"title": "Concurrency", "topics": ["Threads", "Channels"]},
            {"title": "Async", "topics": ["Futures", "Executors"]}
        ]
    }"#;
    let plan: CoursePlan = serde_json::from_str(raw).unwrap();
    assert_eq!(plan.modules.len(), 4);
    assert_eq!(plan.modules[0].topics, vec!["Moves", "Borrows", "Lifetimes"]);
}

#[test]
fn quiz_array_parses_with_camel_case_fields() {
    let raw = r#"[
        {"question": "Who owns a moved value?", "options": ["Caller", "Callee"],
         "correctIndex": 1, "explanation": "Moves transfer ownership."},
        {"question": "Can two &mut alias?", "options": ["Yes", "No"],
         "correctIndex": 1, "explanation": "Exclusive borrows never alias."}
    ]"#;
    let quiz: Vec<QuizQuestion> = serde_json::from_str(raw).unwrap();
    assert_eq!(quiz.len(), 2);
    assert_eq!(quiz[0].correct_index, 1);
    assert_eq!(quiz[1].options[1], "No");
}

#[test]
fn recommendations_parse_from_array() {
    let raw = r#"[{"title": "Linear Algebra", "description": "Foundation for ML."}]"#;
    let recs: Vec<Recommendation> = serde_json::from_str(raw).unwrap();
    assert_eq!(recs[0].title, "Linear Algebra");
}

#[test]
fn library_resource_type_enum_is_closed() {
    let raw = r#"{
        "title": "3Blue1Brown",
        "author": "Grant Sanderson",
        "type": "Video",
        "category": "Mathematics",
        "description": "Visual math explanations.",
        "link": "https://www.youtube.com/results?search_query=3blue1brown"
    }"#;
    let res: LibraryResource = serde_json::from_str(raw).unwrap();
    assert_eq!(res.resource_type, ResourceType::Video);

    // Anything outside the schema enum is a contract violation.
    let bad = raw.replace("Video", "Podcast");
    assert!(serde_json::from_str::<LibraryResource>(&bad).is_err());
}

#[test]
fn voice_command_extraction_parses() {
    let raw = r#"{"topic": "Calculus", "level": "Beginner", "style": "Visual"}"#;
    let req: CourseRequest = serde_json::from_str(raw).unwrap();
    assert_eq!(req.topic, "Calculus");
    assert_eq!(req.level, "Beginner");
    assert_eq!(req.style, "Visual");
}
