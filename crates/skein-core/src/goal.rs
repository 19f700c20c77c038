use serde::{Deserialize, Serialize};

/// Declarative success criteria and constraints attached to a run.
///
/// The engine never evaluates a goal; it is forwarded verbatim to the step
/// executor with every invocation so the external evaluation surface (LLM
/// judge, scoring harness) can consult it. Immutable once a run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub success_criteria: Vec<SuccessCriterion>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

/// A single weighted success criterion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessCriterion {
    pub id: String,
    pub description: String,
    /// What is measured (e.g. "test_pass_rate", "word_count").
    pub metric: String,
    /// Target value for the metric; interpretation belongs to the evaluator.
    #[serde(default)]
    pub target: serde_json::Value,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// A constraint on the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    pub id: String,
    pub description: String,
    /// Whether violating this constraint is fatal or advisory.
    pub constraint_type: ConstraintType,
    pub category: ConstraintCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    Hard,
    Soft,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintCategory {
    Time,
    Cost,
    Safety,
    Scope,
    Quality,
}

impl Goal {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            success_criteria: vec![],
            constraints: vec![],
        }
    }

    pub fn with_criterion(mut self, criterion: SuccessCriterion) -> Self {
        self.success_criteria.push(criterion);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_builder() {
        let goal = Goal::new("g1", "Ship the report")
            .with_criterion(SuccessCriterion {
                id: "c1".into(),
                description: "report is written".into(),
                metric: "word_count".into(),
                target: serde_json::json!(500),
                weight: 2.0,
            })
            .with_constraint(Constraint {
                id: "k1".into(),
                description: "finish within budget".into(),
                constraint_type: ConstraintType::Hard,
                category: ConstraintCategory::Cost,
            });

        assert_eq!(goal.success_criteria.len(), 1);
        assert_eq!(goal.constraints.len(), 1);
        assert_eq!(goal.constraints[0].constraint_type, ConstraintType::Hard);
    }

    #[test]
    fn test_goal_deserializes_with_defaults() {
        let goal: Goal = serde_json::from_str(r#"{"id":"g1","name":"minimal"}"#).unwrap();
        assert!(goal.success_criteria.is_empty());
        assert!(goal.constraints.is_empty());
    }

    #[test]
    fn test_criterion_default_weight() {
        let c: SuccessCriterion = serde_json::from_str(
            r#"{"id":"c1","description":"d","metric":"score"}"#,
        )
        .unwrap();
        assert!((c.weight - 1.0).abs() < f64::EPSILON);
        assert!(c.target.is_null());
    }

    #[test]
    fn test_goal_serialization_roundtrip() {
        let goal = Goal::new("g2", "Review PR").with_constraint(Constraint {
            id: "k1".into(),
            description: "no force pushes".into(),
            constraint_type: ConstraintType::Soft,
            category: ConstraintCategory::Safety,
        });
        let json = serde_json::to_string(&goal).unwrap();
        let parsed: Goal = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, "g2");
        assert_eq!(parsed.constraints[0].category, ConstraintCategory::Safety);
    }
}
