//! Plan model for the plan-execute agent

use serde::{Deserialize, Serialize};

/// Shape the planner LLM is asked to emit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSpec {
    /// The overall goal
    pub goal: String,

    /// Concrete, independently executable steps
    pub steps: Vec<String>,
}

/// A plan with per-step completion tracking
#[derive(Debug, Clone)]
pub struct Plan {
    /// The overall goal
    pub goal: String,

    /// Step descriptions
    pub steps: Vec<String>,

    /// Completion flag per step
    completed: Vec<bool>,
}

impl Plan {
    /// Create a plan with all steps pending
    pub fn new(goal: impl Into<String>, steps: Vec<String>) -> Self {
        let completed = vec![false; steps.len()];
        Self {
            goal: goal.into(),
            steps,
            completed,
        }
    }

    /// Whether every step has completed
    pub fn is_complete(&self) -> bool {
        self.completed.iter().all(|done| *done)
    }

    /// Index of the next unfinished step
    pub fn next_step(&self) -> Option<usize> {
        self.completed.iter().position(|done| !done)
    }

    /// Mark a step as done
    pub fn mark_done(&mut self, index: usize) {
        if let Some(flag) = self.completed.get_mut(index) {
            *flag = true;
        }
    }

    /// Steps completed so far, with their indices
    pub fn completed_steps(&self) -> impl Iterator<Item = (usize, &str)> {
        self.steps
            .iter()
            .enumerate()
            .filter(|(i, _)| self.completed.get(*i).copied().unwrap_or(false))
            .map(|(i, step)| (i, step.as_str()))
    }
}

impl From<PlanSpec> for Plan {
    fn from(spec: PlanSpec) -> Self {
        Self::new(spec.goal, spec.steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Plan {
        Plan::new(
            "ship it",
            vec!["write".to_string(), "test".to_string(), "release".to_string()],
        )
    }

    #[test]
    fn test_new_plan_is_pending() {
        let plan = plan();
        assert!(!plan.is_complete());
        assert_eq!(plan.next_step(), Some(0));
    }

    #[test]
    fn test_next_step_advances() {
        let mut plan = plan();
        plan.mark_done(0);
        assert_eq!(plan.next_step(), Some(1));
        plan.mark_done(1);
        plan.mark_done(2);
        assert!(plan.is_complete());
        assert_eq!(plan.next_step(), None);
    }

    #[test]
    fn test_completed_steps_listing() {
        let mut plan = plan();
        plan.mark_done(0);
        plan.mark_done(2);

        let done: Vec<_> = plan.completed_steps().collect();
        assert_eq!(done, vec![(0, "write"), (2, "release")]);
    }

    #[test]
    fn test_empty_plan_is_complete() {
        let plan = Plan::new("nothing", vec![]);
        assert!(plan.is_complete());
        assert_eq!(plan.next_step(), None);
    }

    #[test]
    fn test_from_spec() {
        let spec: PlanSpec =
            serde_json::from_str(r#"{"goal": "g", "steps": ["a", "b"]}"#).unwrap();
        let plan = Plan::from(spec);
        assert_eq!(plan.goal, "g");
        assert_eq!(plan.steps.len(), 2);
        assert!(!plan.is_complete());
    }
}
