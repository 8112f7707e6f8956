//! Prompt construction
//!
//! Stage 1 interpolates the user's profile into a template. Stages 2-5 use
//! fixed templates; everything they need is already in the conversation.

use crate::orchestrator::constants::NOT_PROVIDED;
use crate::orchestrator::stages::Stage;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Career track chosen by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CareerTrack {
    /// Starting and running a business
    Entrepreneurship,
    /// Finding salaried work
    WageEmployment,
}

impl CareerTrack {
    fn label(self) -> &'static str {
        match self {
            CareerTrack::Entrepreneurship => "Entrepreneurship",
            CareerTrack::WageEmployment => "Wage employment",
        }
    }
}

/// Snapshot of what the user entered in the intake form
///
/// Every field is optional. Missing values are rendered with an explicit
/// marker so the model can tell "not answered" from "zero".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    /// Given name
    pub name: Option<String>,
    /// Age in years
    pub age: Option<u32>,
    /// Self-described gender
    pub gender: Option<String>,
    /// Town or region
    pub location: Option<String>,
    /// Highest completed education
    pub education_level: Option<String>,
    /// Subject studied
    pub field_of_study: Option<String>,
    /// Track chosen in the assessment
    pub track: Option<CareerTrack>,
    /// Current employment situation
    pub employment_status: Option<String>,
    /// Years of work experience
    pub years_of_experience: Option<u32>,
    /// Self-reported skills
    pub skills: Vec<String>,
    /// Self-reported interests
    pub interests: Vec<String>,
    /// Business idea, entrepreneurship track only
    pub business_idea: Option<String>,
    /// Sector the user wants to work in
    pub preferred_sector: Option<String>,
    /// Capital the user can put in, in local currency
    pub available_capital: Option<f64>,
    /// Free-text goals
    pub career_goals: Option<String>,
    /// Free-text challenges
    pub challenges: Option<String>,
}

fn text_or_marker(value: &Option<String>) -> String {
    match value.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => NOT_PROVIDED.to_string(),
    }
}

fn value_or_marker<T: Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| NOT_PROVIDED.to_string())
}

fn list_or_marker(values: &[String]) -> String {
    let items: Vec<&str> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();
    if items.is_empty() {
        NOT_PROVIDED.to_string()
    } else {
        items.join(", ")
    }
}

/// Build the stage 1 prompt from a profile snapshot
pub fn build_intake_prompt(profile: &UserProfile) -> String {
    let track = profile
        .track
        .map(|t| t.label().to_string())
        .unwrap_or_else(|| NOT_PROVIDED.to_string());

    let fields = [
        ("Name", text_or_marker(&profile.name)),
        ("Age", value_or_marker(&profile.age)),
        ("Gender", text_or_marker(&profile.gender)),
        ("Location", text_or_marker(&profile.location)),
        ("Education level", text_or_marker(&profile.education_level)),
        ("Field of study", text_or_marker(&profile.field_of_study)),
        ("Chosen track", track),
        ("Employment status", text_or_marker(&profile.employment_status)),
        (
            "Years of work experience",
            value_or_marker(&profile.years_of_experience),
        ),
        ("Skills", list_or_marker(&profile.skills)),
        ("Interests", list_or_marker(&profile.interests)),
        ("Business idea", text_or_marker(&profile.business_idea)),
        ("Preferred sector", text_or_marker(&profile.preferred_sector)),
        (
            "Available capital",
            value_or_marker(&profile.available_capital),
        ),
        ("Career goals", text_or_marker(&profile.career_goals)),
        ("Main challenges", text_or_marker(&profile.challenges)),
    ];

    let mut prompt = String::from(
        "You are a career guidance counsellor helping a young person choose between \
entrepreneurship and wage employment. Here is their profile. Fields marked \
\"Not provided by the user\" were left blank; do not assume a value for them.\n\n",
    );
    for (label, value) in fields {
        prompt.push_str(&format!("- {}: {}\n", label, value));
    }
    prompt.push_str(
        "\nSummarise this profile. Respond ONLY with a JSON object of the form:\n\
{\"summary\": string, \"strengths\": [string], \"interests\": [string], \
\"constraints\": [string], \"recommended_track\": string}",
    );
    prompt
}

const WISH_PROMPT: &str = "Using the WOOP method, and based on the profile summary above, \
formulate the person's most important career WISH: challenging but feasible, stated in one \
sentence in the first person. Respond ONLY with a JSON object of the form:\n\
{\"wish\": string, \"rationale\": string}";

const OUTCOME_PROMPT: &str = "Now describe the single best OUTCOME of fulfilling that wish: \
what would change in this person's life and how it would feel. Respond ONLY with a JSON object \
of the form:\n{\"outcome\": string, \"benefits\": [string], \"feeling\": string}";

const OBSTACLES_PROMPT: &str = "Identify the main OBSTACLES, internal (habits, fears, beliefs) \
and external (money, access, skills), that could prevent this person from reaching that outcome. \
List the most important first. Respond ONLY with a JSON object of the form:\n\
{\"obstacles\": [{\"obstacle\": string, \"type\": \"internal\" | \"external\", \"description\": string}]}";

const PLAN_PROMPT: &str = "For each obstacle, write an if-then PLAN: \"If <obstacle situation> \
happens, then I will <concrete action>\". Add the very first step to take this week and a \
realistic timeline. Respond ONLY with a JSON object of the form:\n\
{\"plans\": [{\"if\": string, \"then\": string}], \"first_step\": string, \"timeline\": string}";

/// Prompt text for `stage`
///
/// Only the intake stage looks at the profile.
pub fn prompt_for_stage(stage: Stage, profile: &UserProfile) -> String {
    match stage {
        Stage::Intake => build_intake_prompt(profile),
        Stage::Wish => WISH_PROMPT.to_string(),
        Stage::Outcome => OUTCOME_PROMPT.to_string(),
        Stage::Obstacles => OBSTACLES_PROMPT.to_string(),
        Stage::Plan => PLAN_PROMPT.to_string(),
    }
}
