// src/navigation/planner.rs
// Picks the next delivery target from the request queue and the food catalog.

use super::Goal;
use crate::core::memory::{Catalog, QueueEntry, RequestQueue};
use log::{debug, info};

/// Result of consuming the request queue
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// A requested item was found in the catalog
    Target {
        /// Item name
        name: String,
        /// Catalog location, heading zero
        goal: Goal,
    },
    /// The queue is exhausted; go back to the coordinate origin
    ReturnHome(Goal),
}

impl Assignment {
    /// Goal to navigate to
    pub fn goal(&self) -> Goal {
        match self {
            Assignment::Target { goal, .. } => *goal,
            Assignment::ReturnHome(goal) => *goal,
        }
    }

    /// True once nothing else is left to deliver
    pub fn is_final(&self) -> bool {
        matches!(self, Assignment::ReturnHome(_))
    }
}

/// Pops requests until one matches the catalog or the sentinel is reached.
///
/// Names missing from the catalog are skipped without error.
pub fn assign_next_goal(queue: &mut RequestQueue, catalog: &Catalog) -> Assignment {
    while let Some(entry) = queue.pop_front() {
        match entry {
            QueueEntry::Item(name) => match catalog.get(&name) {
                Some(location) => {
                    let goal = Goal::at_location(location.x, location.y);
                    info!("Heading towards {} at ({:.3}, {:.3})", name, goal.x, goal.y);
                    return Assignment::Target { name, goal };
                }
                None => debug!("Skipping {}: not in catalog", name),
            },
            QueueEntry::Terminal => break,
        }
    }

    let home = Goal::origin();
    info!("Heading towards home at ({:.3}, {:.3})", home.x, home.y);
    Assignment::ReturnHome(home)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::FoodLocationBatch;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .replace_with(&FoodLocationBatch {
                names: vec!["apple".into(), "banana".into()],
                xs: vec![1.0, 2.0],
                ys: vec![1.0, 2.0],
            })
            .unwrap();
        catalog
    }

    #[test]
    fn empty_request_goes_home() {
        let mut queue = RequestQueue::from_request("");
        let assignment = assign_next_goal(&mut queue, &catalog());
        assert_eq!(assignment, Assignment::ReturnHome(Goal::origin()));
        assert!(queue.is_empty());
    }

    #[test]
    fn visits_in_request_order() {
        let catalog = catalog();
        let mut queue = RequestQueue::from_request("banana,apple");
        assert_eq!(assign_next_goal(&mut queue, &catalog).goal(), Goal::at_location(2.0, 2.0));
        assert_eq!(assign_next_goal(&mut queue, &catalog).goal(), Goal::at_location(1.0, 1.0));
        assert!(assign_next_goal(&mut queue, &catalog).is_final());
    }

    #[test]
    fn sentinel_name_cannot_match_a_catalog_entry() {
        let mut catalog = Catalog::new();
        catalog
            .replace_with(&FoodLocationBatch {
                names: vec!["not in list".into()],
                xs: vec![5.0],
                ys: vec![5.0],
            })
            .unwrap();
        let mut queue = RequestQueue::from_request("pizza");
        assert!(assign_next_goal(&mut queue, &catalog).is_final());
    }
}
