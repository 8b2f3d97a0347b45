use eos_courier::core::{Catalog, FoodLocationBatch, Pose, RequestQueue};
use eos_courier::navigation::{Assignment, assign_next_goal};
use eos_courier::{Command, CommandSink, Goal, LoggingSink, Tolerance};
use rstest::rstest;

fn catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog
        .replace_with(&FoodLocationBatch {
            names: vec!["pizza".into(), "salad".into(), "pizza".into()],
            xs: vec![1.0, 2.0, 9.0],
            ys: vec![-1.0, 3.0, 9.0],
        })
        .unwrap();
    catalog
}

// First occurrence of a duplicated name wins
#[test]
fn test_duplicate_names_keep_first_location() {
    let catalog = catalog();
    assert_eq!(catalog.len(), 2);
    let pizza = catalog.get("pizza").unwrap();
    assert_eq!((pizza.x, pizza.y), (1.0, -1.0));
}

// Goals are handed out in request order and end at home
#[test]
fn test_assignment_order() {
    let catalog = catalog();
    let mut queue = RequestQueue::from_request("salad,sushi,pizza");

    let first = assign_next_goal(&mut queue, &catalog);
    assert_eq!(first, Assignment::Target { name: "salad".into(), goal: Goal::at_location(2.0, 3.0) });
    let second = assign_next_goal(&mut queue, &catalog);
    assert_eq!(second.goal(), Goal::at_location(1.0, -1.0));
    assert!(!second.is_final());

    let last = assign_next_goal(&mut queue, &catalog);
    assert!(last.is_final());
    assert_eq!(last.goal(), Goal::origin());
    assert!(queue.is_empty());
}

// Arrival thresholds differ between navigation and pickup
#[rstest]
#[case(Pose::new(0.1, -0.1, 0.5), true, true)]
#[case(Pose::new(0.3, 0.0, 0.0), false, true)]
#[case(Pose::new(0.0, 0.0, 1.2), false, true)]
#[case(Pose::new(0.0, 0.6, 0.0), false, false)]
#[case(Pose::new(0.0, 0.0, -1.6), false, false)]
fn test_tolerances(#[case] pose: Pose, #[case] navigation: bool, #[case] pickup: bool) {
    let goal = Goal::origin();
    assert_eq!(Tolerance::new(0.15, 1.0).contains(&pose, &goal), navigation);
    assert_eq!(Tolerance::PICKUP_COARSE.contains(&pose, &goal), pickup);
}

// The logging sink counts every command and remembers the last
#[test]
fn test_logging_sink() {
    let mut sink = LoggingSink::new();
    sink.send(&Command::Hold).unwrap();
    sink.send(&Command::Hold).unwrap();
    sink.send(&Command::GoToPose(Goal::new(1.0, 2.0, 0.0))).unwrap();
    assert_eq!(sink.sent(), 3);
    assert_eq!(sink.last(), Some(Command::GoToPose(Goal::new(1.0, 2.0, 0.0))));
}
