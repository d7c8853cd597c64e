use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Arity bounds on the `steps` list.
pub const MIN_STEPS: usize = 5;
pub const MAX_STEPS: usize = 30;

// ---------------------------------------------------------------------------
// Schema types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Ticket,
    Issue,
    Document,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub title: String,
    pub details: String,
    pub acceptance_criteria: Vec<String>,
    pub touched_areas: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub title: String,
    pub source: PlanSource,
    pub summary: String,
    pub assumptions: Vec<String>,
    pub open_questions: Vec<String>,
    pub risks: Vec<String>,
    pub steps: Vec<PlanStep>,
}

// ---------------------------------------------------------------------------
// Shape validation
// ---------------------------------------------------------------------------

/// One reason a payload is not a valid plan. Collected exhaustively so a
/// human inspecting the raw payload sees every problem at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeIssue {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ShapeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn issue(field: impl Into<String>, message: impl Into<String>) -> ShapeIssue {
    ShapeIssue {
        field: field.into(),
        message: message.into(),
    }
}

fn check_string(obj: &serde_json::Map<String, Value>, field: &str, issues: &mut Vec<ShapeIssue>) {
    match obj.get(field) {
        None => issues.push(issue(field, "missing required field")),
        Some(Value::String(s)) if s.trim().is_empty() => {
            issues.push(issue(field, "must be a non-empty string"));
        }
        Some(Value::String(_)) => {}
        Some(_) => issues.push(issue(field, "must be a string")),
    }
}

fn check_string_list(
    obj: &serde_json::Map<String, Value>,
    field: &str,
    issues: &mut Vec<ShapeIssue>,
) {
    match obj.get(field) {
        None => issues.push(issue(field, "missing required field")),
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                if !item.is_string() {
                    issues.push(issue(format!("{field}[{i}]"), "must be a string"));
                }
            }
        }
        Some(_) => issues.push(issue(field, "must be a list of strings")),
    }
}

/// Validate a payload against the plan schema, collecting every shape issue
/// before deciding. `Ok` holds the fully typed plan; `Err` means the payload
/// must never be written to the plan artifact path.
pub fn validate(value: &Value) -> std::result::Result<Plan, Vec<ShapeIssue>> {
    let mut issues = Vec::new();

    let Some(obj) = value.as_object() else {
        return Err(vec![issue("$", "payload must be a JSON object")]);
    };

    check_string(obj, "title", &mut issues);
    check_string(obj, "summary", &mut issues);
    check_string_list(obj, "assumptions", &mut issues);
    check_string_list(obj, "open_questions", &mut issues);
    check_string_list(obj, "risks", &mut issues);

    match obj.get("source") {
        None => issues.push(issue("source", "missing required field")),
        Some(Value::String(s)) => {
            if !matches!(s.as_str(), "ticket" | "issue" | "document") {
                issues.push(issue(
                    "source",
                    format!("unknown value '{s}' (expected ticket | issue | document)"),
                ));
            }
        }
        Some(_) => issues.push(issue("source", "must be a string")),
    }

    match obj.get("steps") {
        None => issues.push(issue("steps", "missing required field")),
        Some(Value::Array(steps)) => {
            if steps.len() < MIN_STEPS || steps.len() > MAX_STEPS {
                issues.push(issue(
                    "steps",
                    format!(
                        "must contain between {MIN_STEPS} and {MAX_STEPS} entries, found {}",
                        steps.len()
                    ),
                ));
            }
            for (i, step) in steps.iter().enumerate() {
                let Some(step_obj) = step.as_object() else {
                    issues.push(issue(format!("steps[{i}]"), "must be an object"));
                    continue;
                };
                let mut step_issues = Vec::new();
                check_string(step_obj, "id", &mut step_issues);
                check_string(step_obj, "title", &mut step_issues);
                check_string(step_obj, "details", &mut step_issues);
                check_string_list(step_obj, "acceptance_criteria", &mut step_issues);
                check_string_list(step_obj, "touched_areas", &mut step_issues);
                issues.extend(step_issues.into_iter().map(|si| ShapeIssue {
                    field: format!("steps[{i}].{}", si.field),
                    message: si.message,
                }));
            }
        }
        Some(_) => issues.push(issue("steps", "must be a list")),
    }

    if !issues.is_empty() {
        return Err(issues);
    }

    serde_json::from_value(value.clone())
        .map_err(|e| vec![issue("$", format!("deserialization failed: {e}"))])
}

/// Canned schema-valid payload for tests (fake backends, pipeline tests).
#[cfg(test)]
pub(crate) fn sample_plan_value(n_steps: usize) -> Value {
    use serde_json::json;
    let steps: Vec<Value> = (0..n_steps)
        .map(|i| {
            json!({
                "id": format!("step-{i}"),
                "title": format!("Step {i}"),
                "details": "do the thing",
                "acceptance_criteria": ["it works"],
                "touched_areas": ["src/lib.rs"],
            })
        })
        .collect();
    json!({
        "title": "Fix login timeout",
        "source": "ticket",
        "summary": "Sessions expire too early",
        "assumptions": ["single region"],
        "open_questions": [],
        "risks": ["cache invalidation"],
        "steps": steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_plan_value(n_steps: usize) -> Value {
        sample_plan_value(n_steps)
    }

    #[test]
    fn minimal_valid_plan_passes() {
        let plan = validate(&valid_plan_value(5)).unwrap();
        assert_eq!(plan.steps.len(), 5);
        assert_eq!(plan.source, PlanSource::Ticket);
    }

    #[test]
    fn three_steps_violates_lower_bound() {
        let issues = validate(&valid_plan_value(3)).unwrap_err();
        assert!(issues
            .iter()
            .any(|i| i.field == "steps" && i.message.contains("between 5 and 30")));
    }

    #[test]
    fn thirty_one_steps_violates_upper_bound() {
        assert!(validate(&valid_plan_value(31)).is_err());
        assert!(validate(&valid_plan_value(30)).is_ok());
    }

    #[test]
    fn missing_and_mistyped_fields_are_all_reported() {
        let mut value = valid_plan_value(5);
        value.as_object_mut().unwrap().remove("title");
        value["summary"] = json!(42);
        value["source"] = json!("gossip");

        let issues = validate(&value).unwrap_err();
        let fields: Vec<&str> = issues.iter().map(|i| i.field.as_str()).collect();
        assert!(fields.contains(&"title"));
        assert!(fields.contains(&"summary"));
        assert!(fields.contains(&"source"));
    }

    #[test]
    fn step_issues_carry_their_index() {
        let mut value = valid_plan_value(5);
        value["steps"][2]["id"] = json!("");

        let issues = validate(&value).unwrap_err();
        assert!(issues.iter().any(|i| i.field == "steps[2].id"));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let issues = validate(&json!(["not", "an", "object"])).unwrap_err();
        assert_eq!(issues[0].field, "$");
    }
}
