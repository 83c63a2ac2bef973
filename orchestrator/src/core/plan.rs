//! Step plans: ordered groups of agent names.

/// Agents scheduled together. More than one member means they run concurrently.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Group {
    members: Vec<String>,
}

impl Group {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Ordered sequence of groups executed strictly in order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepPlan {
    groups: Vec<Group>,
}

impl StepPlan {
    pub fn new(groups: Vec<Group>) -> Self {
        Self { groups }
    }

    /// One singleton group per name, preserving order.
    pub fn sequential<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: names.into_iter().map(|name| Group::new([name])).collect(),
        }
    }

    /// Build a plan from explicit groups, falling back to the sequential list.
    pub fn from_parts(steps: &[Vec<String>], agents: &[String]) -> Self {
        if steps.is_empty() {
            return Self::sequential(agents.iter().cloned());
        }
        Self {
            groups: steps.iter().map(|group| Group::new(group.iter().cloned())).collect(),
        }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of agent slots across all groups.
    pub fn agent_count(&self) -> usize {
        self.groups.iter().map(Group::len).sum()
    }
}

impl<S: Into<String>> FromIterator<Vec<S>> for StepPlan {
    fn from_iter<T: IntoIterator<Item = Vec<S>>>(iter: T) -> Self {
        Self {
            groups: iter.into_iter().map(Group::new).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_steps_win_over_agents() {
        let steps = vec![
            vec!["Planner".to_string()],
            vec!["Builder".to_string(), "Doc".to_string()],
        ];
        let agents = vec!["Reviewer".to_string()];
        let plan = StepPlan::from_parts(&steps, &agents);

        assert_eq!(plan.groups().len(), 2);
        assert_eq!(plan.groups()[1].members(), ["Builder", "Doc"]);
        assert_eq!(plan.agent_count(), 3);
    }

    #[test]
    fn agents_become_singleton_groups() {
        let agents = vec!["Planner".to_string(), "Builder".to_string()];
        let plan = StepPlan::from_parts(&[], &agents);

        assert_eq!(plan, StepPlan::sequential(["Planner", "Builder"]));
        assert!(plan.groups().iter().all(|group| group.len() == 1));
    }

    #[test]
    fn collects_from_nested_vectors() {
        let plan: StepPlan = vec![vec!["A"], vec![], vec!["B", "C"]].into_iter().collect();
        assert_eq!(plan.groups().len(), 3);
        assert!(plan.groups()[1].is_empty());
        assert!(!StepPlan::default().groups().iter().any(|g| !g.is_empty()));
        assert!(StepPlan::default().is_empty());
    }
}
