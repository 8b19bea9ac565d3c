//! Tree unlocks.

use crate::types::TreeType;

/// Unlocked tree names after planting `trees_planted` trees.
///
/// Keeps every tree already unlocked, then appends newly earned ones in
/// catalog order. Nothing is ever removed, even when deletions lower the
/// planted count.
pub fn unlock_trees(unlocked: &[String], trees_planted: i64, catalog: &[TreeType]) -> Vec<String> {
    let mut result = unlocked.to_vec();
    for tree in catalog {
        if tree.unlock_requirement <= trees_planted && !result.contains(&tree.name) {
            result.push(tree.name.clone());
        }
    }
    result
}

/// The cheapest tree still locked and how many more trees it needs.
pub fn next_unlock<'a>(
    unlocked: &[String],
    trees_planted: i64,
    catalog: &'a [TreeType],
) -> Option<(&'a TreeType, i64)> {
    catalog
        .iter()
        .filter(|tree| !unlocked.contains(&tree.name))
        .min_by_key(|tree| tree.unlock_requirement)
        .map(|tree| (tree, (tree.unlock_requirement - trees_planted).max(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TreeRarity;

    fn tree(name: &str, requirement: i64) -> TreeType {
        TreeType {
            id: format!("tree-{}", name),
            name: name.to_string(),
            display_name: name.to_string(),
            description: None,
            rarity: TreeRarity::Common,
            unlock_requirement: requirement,
            color: "#22c55e".to_string(),
        }
    }

    fn catalog() -> Vec<TreeType> {
        vec![tree("pine", 0), tree("oak", 5), tree("sakura", 15)]
    }

    #[test]
    fn test_unlocks_in_catalog_order() {
        let unlocked = unlock_trees(&["pine".to_string()], 15, &catalog());
        assert_eq!(unlocked, vec!["pine", "oak", "sakura"]);
    }

    #[test]
    fn test_never_removes() {
        let earned = vec!["pine".to_string(), "oak".to_string()];
        let unlocked = unlock_trees(&earned, 1, &catalog());
        assert_eq!(unlocked, earned);
    }

    #[test]
    fn test_next_unlock() {
        let catalog = catalog();
        let unlocked = vec!["pine".to_string()];
        let (tree, remaining) = next_unlock(&unlocked, 3, &catalog).unwrap();
        assert_eq!(tree.name, "oak");
        assert_eq!(remaining, 2);

        let all: Vec<String> = catalog.iter().map(|t| t.name.clone()).collect();
        assert!(next_unlock(&all, 100, &catalog).is_none());
    }
}
