use shared::{
    domain::{StatusId, Task, TaskPriority},
    protocol::TaskListQuery,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(StatusId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PriorityFilter {
    #[default]
    All,
    Only(TaskPriority),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub search: String,
    pub status: StatusFilter,
    pub priority: PriorityFilter,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.matches_search(task) && self.matches_status(task) && self.matches_priority(task)
    }

    pub fn apply<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        tasks.iter().filter(|task| self.matches(task)).collect()
    }

    fn matches_search(&self, task: &Task) -> bool {
        if self.search.is_empty() {
            return true;
        }
        let needle = self.search.to_lowercase();
        task.title.to_lowercase().contains(&needle)
            || task
                .description
                .as_deref()
                .is_some_and(|description| description.to_lowercase().contains(&needle))
    }

    fn matches_status(&self, task: &Task) -> bool {
        match &self.status {
            StatusFilter::All => true,
            StatusFilter::Only(id) => task.status_id() == id,
        }
    }

    fn matches_priority(&self, task: &Task) -> bool {
        match self.priority {
            PriorityFilter::All => true,
            PriorityFilter::Only(priority) => task.priority == priority,
        }
    }

    pub fn to_query(&self) -> TaskListQuery {
        TaskListQuery {
            search: (!self.search.is_empty()).then(|| self.search.clone()),
            status_id: match &self.status {
                StatusFilter::All => None,
                StatusFilter::Only(id) => Some(id.clone()),
            },
            priority: match self.priority {
                PriorityFilter::All => None,
                PriorityFilter::Only(priority) => Some(priority),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use shared::domain::{TaskId, TaskStatus};

    use super::*;

    fn status(id: &str) -> TaskStatus {
        TaskStatus {
            id: StatusId::from(id),
            name: id.to_uppercase(),
            color: "#6B7280".to_string(),
            order_index: 0,
            is_final: false,
        }
    }

    fn task(
        id: &str,
        title: &str,
        description: Option<&str>,
        status_id: &str,
        priority: TaskPriority,
    ) -> Task {
        Task {
            id: TaskId::from(id),
            title: title.to_string(),
            description: description.map(str::to_string),
            priority,
            due_date: None,
            order_index: 0,
            is_completed: false,
            status: status(status_id),
            assignee: None,
            tags: Vec::new(),
            checklist_count: 0,
            completed_checklist_count: 0,
            comment_count: 0,
        }
    }

    fn sample() -> Vec<Task> {
        vec![
            task("t1", "Quarterly VAT", None, "s1", TaskPriority::High),
            task(
                "t2",
                "Payroll",
                Some("Reconcile vat accruals"),
                "s2",
                TaskPriority::High,
            ),
            task("t3", "Payroll", Some("January run"), "s1", TaskPriority::Low),
            task("t4", "Audit prep", None, "s2", TaskPriority::Critical),
        ]
    }

    fn ids(tasks: Vec<&Task>) -> Vec<&str> {
        tasks.into_iter().map(|task| task.id.as_str()).collect()
    }

    #[test]
    fn default_filter_shows_everything() {
        let tasks = sample();
        assert_eq!(TaskFilter::default().apply(&tasks).len(), tasks.len());
    }

    #[test]
    fn search_matches_title_or_description_case_insensitively() {
        let tasks = sample();
        let filter = TaskFilter {
            search: "VaT".to_string(),
            ..TaskFilter::default()
        };
        assert_eq!(ids(filter.apply(&tasks)), vec!["t1", "t2"]);
    }

    #[test]
    fn all_three_predicates_must_hold() {
        let tasks = sample();
        let filter = TaskFilter {
            search: "payroll".to_string(),
            status: StatusFilter::Only(StatusId::from("s2")),
            priority: PriorityFilter::Only(TaskPriority::High),
        };
        assert_eq!(ids(filter.apply(&tasks)), vec!["t2"]);
    }

    #[test]
    fn combined_filter_equals_intersection_of_single_filters() {
        let tasks = sample();
        let search = TaskFilter {
            search: "payroll".to_string(),
            ..TaskFilter::default()
        };
        let status = TaskFilter {
            status: StatusFilter::Only(StatusId::from("s1")),
            ..TaskFilter::default()
        };
        let priority = TaskFilter {
            priority: PriorityFilter::Only(TaskPriority::Low),
            ..TaskFilter::default()
        };
        let combined = TaskFilter {
            search: search.search.clone(),
            status: status.status.clone(),
            priority: priority.priority,
        };

        let expected: Vec<&str> = tasks
            .iter()
            .filter(|task| search.matches(task) && status.matches(task) && priority.matches(task))
            .map(|task| task.id.as_str())
            .collect();
        assert_eq!(ids(combined.apply(&tasks)), expected);
        assert_eq!(expected, vec!["t3"]);
        assert_eq!(tasks.len(), 4);
    }

    #[test]
    fn query_omits_wildcards() {
        assert!(TaskFilter::default().to_query().is_empty());
        let query = TaskFilter {
            search: "audit".to_string(),
            status: StatusFilter::All,
            priority: PriorityFilter::Only(TaskPriority::Critical),
        }
        .to_query();
        assert_eq!(query.search.as_deref(), Some("audit"));
        assert_eq!(query.status_id, None);
        assert_eq!(query.priority, Some(TaskPriority::Critical));
    }

    #[test]
    fn surrounding_whitespace_is_part_of_the_search() {
        let tasks = vec![
            task("t1", "Taxes", None, "s1", TaskPriority::Medium),
            task("t2", "Pay tax now", None, "s1", TaskPriority::Medium),
        ];
        let filter = TaskFilter {
            search: "tax ".to_string(),
            ..TaskFilter::default()
        };
        assert_eq!(ids(filter.apply(&tasks)), vec!["t2"]);
        assert_eq!(filter.to_query().search.as_deref(), Some("tax "));
    }

    #[test]
    fn whitespace_only_search_is_not_a_wildcard() {
        let tasks = vec![
            task("t1", "Taxes", None, "s1", TaskPriority::Medium),
            task("t2", "Pay tax now", None, "s1", TaskPriority::Medium),
        ];
        let filter = TaskFilter {
            search: " ".to_string(),
            ..TaskFilter::default()
        };
        assert_eq!(ids(filter.apply(&tasks)), vec!["t2"]);
    }
}
