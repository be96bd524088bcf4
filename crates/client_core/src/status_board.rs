use shared::{
    domain::{StatusId, TaskStatus},
    protocol::StatusOrder,
};

pub fn sorted(statuses: &[TaskStatus]) -> Vec<TaskStatus> {
    let mut sorted = statuses.to_vec();
    sorted.sort_by_key(|status| status.order_index);
    sorted
}

/// One past the highest index in use; gaps left by deletes are kept.
pub fn next_order_index(statuses: &[TaskStatus]) -> i32 {
    statuses
        .iter()
        .map(|status| status.order_index)
        .max()
        .map_or(0, |highest| highest.saturating_add(1))
}

/// Moves `moved` into the slot currently held by `target` and renumbers every
/// column 0..n. `None` when either id is unknown or nothing would move.
pub fn reorder(
    statuses: &[TaskStatus],
    moved: &StatusId,
    target: &StatusId,
) -> Option<Vec<TaskStatus>> {
    if moved == target {
        return None;
    }
    let mut columns = sorted(statuses);
    let from = columns.iter().position(|status| &status.id == moved)?;
    let to = columns.iter().position(|status| &status.id == target)?;
    let status = columns.remove(from);
    columns.insert(to, status);
    for (index, status) in columns.iter_mut().enumerate() {
        status.order_index = i32::try_from(index).unwrap_or(i32::MAX);
    }
    Some(columns)
}

pub fn status_orders(statuses: &[TaskStatus]) -> Vec<StatusOrder> {
    statuses
        .iter()
        .map(|status| StatusOrder {
            status_id: status.id.clone(),
            order_index: status.order_index,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalFlagUpdate {
    pub status: StatusId,
    pub is_final: bool,
}

impl FinalFlagUpdate {
    fn new(status: &StatusId, is_final: bool) -> Self {
        Self {
            status: status.clone(),
            is_final,
        }
    }
}

/// Updates to send, in order, so that at no point more than one status is final.
pub fn final_toggle_plan(
    statuses: &[TaskStatus],
    id: &StatusId,
    make_final: bool,
) -> Vec<FinalFlagUpdate> {
    let Some(current) = statuses.iter().find(|status| &status.id == id) else {
        return Vec::new();
    };
    if current.is_final == make_final {
        return Vec::new();
    }
    if !make_final {
        return vec![FinalFlagUpdate::new(id, false)];
    }

    let mut plan: Vec<FinalFlagUpdate> = statuses
        .iter()
        .filter(|status| status.is_final && &status.id != id)
        .map(|status| FinalFlagUpdate::new(&status.id, false))
        .collect();
    plan.push(FinalFlagUpdate::new(id, true));
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(id: &str, order_index: i32, is_final: bool) -> TaskStatus {
        TaskStatus {
            id: StatusId::from(id),
            name: id.to_string(),
            color: "#6B7280".to_string(),
            order_index,
            is_final,
        }
    }

    fn order(columns: &[TaskStatus]) -> Vec<(&str, i32)> {
        columns
            .iter()
            .map(|status| (status.id.as_str(), status.order_index))
            .collect()
    }

    fn update(id: &str, is_final: bool) -> FinalFlagUpdate {
        FinalFlagUpdate::new(&StatusId::from(id), is_final)
    }

    #[test]
    fn reorder_moves_and_renumbers_without_gaps() {
        let statuses = vec![
            status("done", 7, true),
            status("todo", 0, false),
            status("doing", 3, false),
        ];
        let columns =
            reorder(&statuses, &StatusId::from("done"), &StatusId::from("todo")).expect("moved");
        assert_eq!(order(&columns), vec![("done", 0), ("todo", 1), ("doing", 2)]);
    }

    #[test]
    fn reorder_moving_right_takes_target_slot() {
        let statuses = vec![
            status("a", 0, false),
            status("b", 1, false),
            status("c", 2, false),
        ];
        let columns =
            reorder(&statuses, &StatusId::from("a"), &StatusId::from("c")).expect("moved");
        assert_eq!(order(&columns), vec![("b", 0), ("c", 1), ("a", 2)]);
    }

    #[test]
    fn reorder_rejects_noop_and_unknown_ids() {
        let statuses = vec![status("a", 0, false), status("b", 1, false)];
        assert!(reorder(&statuses, &StatusId::from("a"), &StatusId::from("a")).is_none());
        assert!(reorder(&statuses, &StatusId::from("zzz"), &StatusId::from("a")).is_none());
    }

    #[test]
    fn making_final_unsets_previous_final_first() {
        let statuses = vec![
            status("todo", 0, false),
            status("done", 1, true),
            status("archived", 2, false),
        ];
        let plan = final_toggle_plan(&statuses, &StatusId::from("archived"), true);
        assert_eq!(plan, vec![update("done", false), update("archived", true)]);
    }

    #[test]
    fn toggle_is_empty_when_already_in_requested_state() {
        let statuses = vec![status("done", 0, true)];
        assert!(final_toggle_plan(&statuses, &StatusId::from("done"), true).is_empty());
        assert_eq!(
            final_toggle_plan(&statuses, &StatusId::from("done"), false),
            vec![update("done", false)]
        );
    }

    #[test]
    fn next_order_index_appends_after_highest() {
        assert_eq!(next_order_index(&[]), 0);
        assert_eq!(
            next_order_index(&[status("a", 0, false), status("b", 1, false)]),
            2
        );
    }

    #[test]
    fn next_order_index_skips_past_gap_left_by_delete() {
        let remaining = vec![status("todo", 0, false), status("done", 2, true)];
        assert_eq!(next_order_index(&remaining), 3);
    }
}
