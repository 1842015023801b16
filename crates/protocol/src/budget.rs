use crate::evidence::Evidence;

/// Trim `items` to `budget` tokens, preserving order.
///
/// Items are walked in order and kept while the running total stays within
/// budget; items that would overflow are skipped, later smaller items may
/// still fit. The first candidate is always kept when the budget is non-zero,
/// so a non-empty input never trims to nothing. Idempotent: re-applying the
/// same budget to an already-trimmed list is a no-op.
#[must_use]
pub fn trim_to_budget(items: Vec<Evidence>, budget: usize) -> Vec<Evidence> {
    if budget == 0 {
        return Vec::new();
    }

    let mut kept = Vec::with_capacity(items.len());
    let mut used = 0usize;
    for item in items {
        if kept.is_empty() {
            used = used.saturating_add(item.tokens);
            kept.push(item);
            continue;
        }
        let next = used.saturating_add(item.tokens);
        if next > budget {
            continue;
        }
        used = next;
        kept.push(item);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::EvidenceMetadata;
    use crate::provider::ProviderKind;
    use pretty_assertions::assert_eq;

    fn item(id: &str, tokens: usize) -> Evidence {
        Evidence {
            id: id.to_string(),
            provider: ProviderKind::Diff,
            path: format!("src/{id}.rs"),
            range: (1, 10),
            content: String::new(),
            tokens,
            base_score: 100.0,
            matched_signals: Vec::new(),
            metadata: EvidenceMetadata::default(),
        }
    }

    fn ids(items: &[Evidence]) -> Vec<&str> {
        items.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn keeps_items_while_budget_allows() {
        let trimmed = trim_to_budget(vec![item("a", 40), item("b", 40), item("c", 40)], 90);
        assert_eq!(ids(&trimmed), vec!["a", "b"]);
    }

    #[test]
    fn skipped_item_does_not_block_later_fits() {
        let trimmed = trim_to_budget(vec![item("a", 50), item("b", 100), item("c", 30)], 90);
        assert_eq!(ids(&trimmed), vec!["a", "c"]);
    }

    #[test]
    fn first_candidate_survives_even_over_budget() {
        let trimmed = trim_to_budget(vec![item("a", 500), item("b", 10)], 100);
        assert_eq!(ids(&trimmed), vec!["a"]);
    }

    #[test]
    fn zero_budget_trims_everything() {
        assert!(trim_to_budget(vec![item("a", 1)], 0).is_empty());
    }

    #[test]
    fn trimming_is_idempotent() {
        let once = trim_to_budget(vec![item("a", 40), item("b", 80), item("c", 20)], 70);
        let twice = trim_to_budget(once.clone(), 70);
        assert_eq!(once, twice);
    }

    #[test]
    fn smaller_budget_never_grows_the_total() {
        let items = vec![item("a", 30), item("b", 40), item("c", 20)];
        let total = |items: &[Evidence]| items.iter().map(|e| e.tokens).sum::<usize>();
        let mut last = usize::MAX;
        for budget in (10..=90).rev().step_by(10) {
            let trimmed = trim_to_budget(items.clone(), budget);
            let used = total(&trimmed);
            assert!(used <= last, "budget {budget} grew the total");
            last = used;
        }
    }
}
