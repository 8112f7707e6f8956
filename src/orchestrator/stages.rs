//! Stage definitions and result schemas
//!
//! The pipeline has five fixed stages. Each stage's answer must parse into its
//! own typed shape; anything else is rejected at the parse boundary instead of
//! being passed on as loose JSON.

use crate::orchestrator::constants::STAGE_COUNT;
use crate::orchestrator::error::StageFailure;
use crate::orchestrator::utils::extract_json_object;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of the pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Profile intake summary
    Intake,
    /// W: the wish
    Wish,
    /// O: the best outcome
    Outcome,
    /// O: the obstacles
    Obstacles,
    /// P: if-then plans
    Plan,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; STAGE_COUNT] = [
        Stage::Intake,
        Stage::Wish,
        Stage::Outcome,
        Stage::Obstacles,
        Stage::Plan,
    ];

    /// 1-based position in the pipeline
    pub fn number(self) -> u8 {
        match self {
            Stage::Intake => 1,
            Stage::Wish => 2,
            Stage::Outcome => 3,
            Stage::Obstacles => 4,
            Stage::Plan => 5,
        }
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Stage::Intake => "Intake",
            Stage::Wish => "Wish",
            Stage::Outcome => "Outcome",
            Stage::Obstacles => "Obstacles",
            Stage::Plan => "Plan",
        }
    }

    /// The stage that follows this one, if any
    pub fn next(self) -> Option<Stage> {
        Stage::ALL.get(self.number() as usize).copied()
    }

    /// Zero-based index into per-stage storage
    fn index(self) -> usize {
        self.number() as usize - 1
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stage 1: summary of the user's profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeSummary {
    /// Narrative summary of the profile
    pub summary: String,
    /// Strengths the model picked out
    #[serde(default)]
    pub strengths: Vec<String>,
    /// Interests the model picked out
    #[serde(default)]
    pub interests: Vec<String>,
    /// Constraints the model picked out
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Track the model leans towards, if it states one
    #[serde(default)]
    pub recommended_track: Option<String>,
}

/// Stage 2: the wish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wish {
    /// The wish, one sentence
    pub wish: String,
    /// Why this wish fits the user
    #[serde(default)]
    pub rationale: Option<String>,
}

/// Stage 3: the best outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// The best outcome of fulfilling the wish
    pub outcome: String,
    /// Concrete benefits
    #[serde(default)]
    pub benefits: Vec<String>,
    /// How achieving it would feel
    #[serde(default)]
    pub feeling: Option<String>,
}

/// A single obstacle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Short name of the obstacle
    pub obstacle: String,
    /// Internal / external, as labelled by the model
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Longer explanation
    #[serde(default)]
    pub description: Option<String>,
}

/// Stage 4: obstacles standing in the way
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacles {
    /// Obstacles, most important first
    pub obstacles: Vec<Obstacle>,
}

/// One if-then implementation intention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfThenPlan {
    /// Trigger situation
    #[serde(rename = "if")]
    pub trigger: String,
    /// Planned response
    #[serde(rename = "then")]
    pub action: String,
}

/// Stage 5: the plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// If-then plans, one or more per obstacle
    pub plans: Vec<IfThenPlan>,
    /// First concrete action to take
    #[serde(default)]
    pub first_step: Option<String>,
    /// Suggested timeline
    #[serde(default)]
    pub timeline: Option<String>,
}

/// Parsed result of one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "data", rename_all = "snake_case")]
pub enum StageResult {
    /// Stage 1 result
    Intake(IntakeSummary),
    /// Stage 2 result
    Wish(Wish),
    /// Stage 3 result
    Outcome(Outcome),
    /// Stage 4 result
    Obstacles(Obstacles),
    /// Stage 5 result
    Plan(Plan),
}

impl StageResult {
    /// The stage this result belongs to
    pub fn stage(&self) -> Stage {
        match self {
            StageResult::Intake(_) => Stage::Intake,
            StageResult::Wish(_) => Stage::Wish,
            StageResult::Outcome(_) => Stage::Outcome,
            StageResult::Obstacles(_) => Stage::Obstacles,
            StageResult::Plan(_) => Stage::Plan,
        }
    }
}

/// Shape checks serde cannot express
trait Validate {
    fn validate(&self) -> Result<(), String>;
}

fn require_text(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("field `{}` is empty", field));
    }
    Ok(())
}

impl Validate for IntakeSummary {
    fn validate(&self) -> Result<(), String> {
        require_text("summary", &self.summary)
    }
}

impl Validate for Wish {
    fn validate(&self) -> Result<(), String> {
        require_text("wish", &self.wish)
    }
}

impl Validate for Outcome {
    fn validate(&self) -> Result<(), String> {
        require_text("outcome", &self.outcome)
    }
}

impl Validate for Obstacles {
    fn validate(&self) -> Result<(), String> {
        if self.obstacles.is_empty() {
            return Err("field `obstacles` is an empty list".to_string());
        }
        for obstacle in &self.obstacles {
            require_text("obstacles[].obstacle", &obstacle.obstacle)?;
        }
        Ok(())
    }
}

impl Validate for Plan {
    fn validate(&self) -> Result<(), String> {
        if self.plans.is_empty() {
            return Err("field `plans` is an empty list".to_string());
        }
        for plan in &self.plans {
            require_text("plans[].if", &plan.trigger)?;
            require_text("plans[].then", &plan.action)?;
        }
        Ok(())
    }
}

fn parse_shape<T: DeserializeOwned + Validate>(json: &str) -> Result<T, String> {
    let value: T = serde_json::from_str(json).map_err(|e| e.to_string())?;
    value.validate()?;
    Ok(value)
}

/// Parse a raw model response into the typed result for `stage`
///
/// The JSON object is located with [`extract_json_object`], deserialized into
/// the stage's shape and validated.
///
/// # Errors
/// * `StageFailure::Parse` with the raw text if no object is found, the object
///   is not valid JSON, or it does not match the stage's shape.
pub fn parse_stage_result(stage: Stage, raw: &str) -> Result<StageResult, StageFailure> {
    let parse_failure = |reason: String| StageFailure::Parse {
        reason,
        raw: raw.to_string(),
    };

    let json = extract_json_object(raw)
        .ok_or_else(|| parse_failure("no JSON object found in response".to_string()))?;

    let result = match stage {
        Stage::Intake => parse_shape(json).map(StageResult::Intake),
        Stage::Wish => parse_shape(json).map(StageResult::Wish),
        Stage::Outcome => parse_shape(json).map(StageResult::Outcome),
        Stage::Obstacles => parse_shape(json).map(StageResult::Obstacles),
        Stage::Plan => parse_shape(json).map(StageResult::Plan),
    };

    result.map_err(parse_failure)
}

/// Results collected by a run, at most one per stage
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StageResults {
    slots: [Option<StageResult>; STAGE_COUNT],
}

impl StageResults {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a result in its stage's slot
    pub fn insert(&mut self, result: StageResult) {
        let idx = result.stage().index();
        self.slots[idx] = Some(result);
    }

    /// Result for `stage`, if that stage completed
    pub fn get(&self, stage: Stage) -> Option<&StageResult> {
        self.slots[stage.index()].as_ref()
    }

    /// Number of completed stages
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether no stage has completed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Completed results in stage order
    pub fn iter(&self) -> impl Iterator<Item = &StageResult> {
        self.slots.iter().flatten()
    }

    /// Typed accessor for the intake summary
    pub fn intake(&self) -> Option<&IntakeSummary> {
        match self.get(Stage::Intake) {
            Some(StageResult::Intake(v)) => Some(v),
            _ => None,
        }
    }

    /// Typed accessor for the wish
    pub fn wish(&self) -> Option<&Wish> {
        match self.get(Stage::Wish) {
            Some(StageResult::Wish(v)) => Some(v),
            _ => None,
        }
    }

    /// Typed accessor for the outcome
    pub fn outcome(&self) -> Option<&Outcome> {
        match self.get(Stage::Outcome) {
            Some(StageResult::Outcome(v)) => Some(v),
            _ => None,
        }
    }

    /// Typed accessor for the obstacles
    pub fn obstacles(&self) -> Option<&Obstacles> {
        match self.get(Stage::Obstacles) {
            Some(StageResult::Obstacles(v)) => Some(v),
            _ => None,
        }
    }

    /// Typed accessor for the plan
    pub fn plan(&self) -> Option<&Plan> {
        match self.get(Stage::Plan) {
            Some(StageResult::Plan(v)) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert_eq!(Stage::Intake.next(), Some(Stage::Wish));
        assert_eq!(Stage::Obstacles.next(), Some(Stage::Plan));
        assert_eq!(Stage::Plan.next(), None);
        let numbers: Vec<u8> = Stage::ALL.iter().map(|s| s.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_parse_wish_from_fenced_response() {
        let raw = "```json\n{\"wish\": \"Launch a tailoring shop\", \"rationale\": \"Has sewing skills\"}\n```";
        let result = parse_stage_result(Stage::Wish, raw).unwrap();
        assert_eq!(
            result,
            StageResult::Wish(Wish {
                wish: "Launch a tailoring shop".to_string(),
                rationale: Some("Has sewing skills".to_string()),
            })
        );
    }

    #[test]
    fn test_parse_plan_uses_if_then_keys() {
        let raw = r#"Here you go: {"plans": [{"if": "I feel unmotivated", "then": "I will call my mentor"}], "first_step": "Register the business"}"#;
        let result = parse_stage_result(Stage::Plan, raw).unwrap();
        let StageResult::Plan(plan) = result else {
            panic!("expected plan result");
        };
        assert_eq!(plan.plans[0].trigger, "I feel unmotivated");
        assert_eq!(plan.plans[0].action, "I will call my mentor");
        assert_eq!(plan.first_step.as_deref(), Some("Register the business"));
    }

    #[test]
    fn test_parse_obstacles_with_type_field() {
        let raw = r#"{"obstacles": [{"obstacle": "Limited capital", "type": "external"}]}"#;
        let StageResult::Obstacles(obstacles) = parse_stage_result(Stage::Obstacles, raw).unwrap()
        else {
            panic!("expected obstacles result");
        };
        assert_eq!(obstacles.obstacles[0].kind.as_deref(), Some("external"));
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        // Valid JSON, but it is a wish, not an outcome
        let raw = r#"{"wish": "Become a nurse"}"#;
        let err = parse_stage_result(Stage::Outcome, raw).unwrap_err();
        match err {
            StageFailure::Parse { reason, raw: kept } => {
                assert!(reason.contains("outcome"), "reason was: {}", reason);
                assert_eq!(kept, raw);
            }
            other => panic!("expected parse failure, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_empty_lists_and_blank_text() {
        assert!(parse_stage_result(Stage::Obstacles, r#"{"obstacles": []}"#).is_err());
        assert!(parse_stage_result(Stage::Plan, r#"{"plans": []}"#).is_err());
        assert!(parse_stage_result(Stage::Wish, r#"{"wish": "   "}"#).is_err());
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        let raw = "{\"summary\": \"unterminated}";
        let err = parse_stage_result(Stage::Intake, raw).unwrap_err();
        assert!(matches!(err, StageFailure::Parse { .. }));
    }

    #[test]
    fn test_parse_without_object_keeps_raw_text() {
        let err = parse_stage_result(Stage::Intake, "I cannot answer that.").unwrap_err();
        assert_eq!(
            err,
            StageFailure::Parse {
                reason: "no JSON object found in response".to_string(),
                raw: "I cannot answer that.".to_string(),
            }
        );
    }

    #[test]
    fn test_stage_results_keep_order() {
        let mut results = StageResults::new();
        assert!(results.is_empty());
        results.insert(StageResult::Wish(Wish {
            wish: "w".to_string(),
            rationale: None,
        }));
        results.insert(StageResult::Intake(IntakeSummary {
            summary: "s".to_string(),
            strengths: vec![],
            interests: vec![],
            constraints: vec![],
            recommended_track: None,
        }));

        let stages: Vec<Stage> = results.iter().map(StageResult::stage).collect();
        assert_eq!(stages, vec![Stage::Intake, Stage::Wish]);
        assert_eq!(results.len(), 2);
        assert!(results.wish().is_some());
        assert!(results.outcome().is_none());
    }

    #[test]
    fn test_stage_result_serializes_with_tag() {
        let result = StageResult::Wish(Wish {
            wish: "Open a salon".to_string(),
            rationale: None,
        });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["stage"], "wish");
        assert_eq!(json["data"]["wish"], "Open a salon");
    }
}
