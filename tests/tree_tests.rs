#![cfg(feature = "sat")]

use anymip::{Axis, Backend, DictBoolVar, KeySpec, ModelError, Solver, SolverConfig};

fn init_logging() {
    let _ = tracing_subscriber::fmt().try_init();
}

fn sat_solver() -> Solver {
    Solver::new(SolverConfig::new(Backend::Sat)).unwrap()
}

/// `{a: {p: [1, 2]}, b: {p: [1, 2]}}`: two keyed levels, four leaves.
fn two_level_spec() -> KeySpec {
    KeySpec::branch(vec![
        ("a", KeySpec::branch(vec![("p", KeySpec::leaves([1, 2]))])),
        ("b", KeySpec::branch(vec![("p", KeySpec::leaves([1, 2]))])),
    ])
}

fn names(vars: &[anymip::Node]) -> Vec<&str> {
    vars.iter().map(|v| v.name()).collect()
}

#[test]
fn leaves_become_path_named_boolean_variables() {
    init_logging();
    let mut solver = sat_solver();
    let mut tree = DictBoolVar::new(&mut solver, &two_level_spec()).unwrap();

    assert_eq!(tree.depth(), 2);
    let all = tree.select(&[Axis::All, Axis::All]).unwrap();
    assert_eq!(
        names(&all),
        vec!["a_p_1", "a_p_2", "b_p_1", "b_p_2"]
    );
    assert_eq!(solver.all_vars().len(), 4);
}

#[test]
fn explicit_labels_narrow_the_selection() {
    init_logging();
    let mut solver = sat_solver();
    let mut tree = DictBoolVar::new(&mut solver, &two_level_spec()).unwrap();

    let under_a = tree.select(&[Axis::label("a"), Axis::All]).unwrap();
    assert_eq!(names(&under_a), vec!["a_p_1", "a_p_2"]);

    let both = tree
        .select(&[Axis::labels(["a", "b"]), Axis::label("p")])
        .unwrap();
    assert_eq!(both.len(), 4);
    assert!(tree.missing_labels().is_empty());
}

#[test]
fn missing_labels_are_dropped_with_a_warning() {
    init_logging();
    let mut solver = sat_solver();
    let mut tree = DictBoolVar::new(&mut solver, &two_level_spec()).unwrap();

    let found = tree
        .select(&[Axis::labels(["a", "zz"]), Axis::All])
        .unwrap();
    assert_eq!(names(&found), vec!["a_p_1", "a_p_2"]);
    assert_eq!(tree.missing_labels(), ["zz".to_string()]);
}

#[test]
fn an_axis_with_only_missing_labels_degrades_to_the_wildcard() {
    init_logging();
    let mut solver = sat_solver();
    let mut tree = DictBoolVar::new(&mut solver, &two_level_spec()).unwrap();

    // `z` does not exist at the second level, so the axis matches everything
    let found = tree.select(&[Axis::label("a"), Axis::label("z")]).unwrap();
    assert_eq!(names(&found), vec!["a_p_1", "a_p_2"]);
    assert_eq!(tree.missing_labels(), ["z".to_string()]);
}

#[test]
fn missing_labels_reset_between_selections() {
    init_logging();
    let mut solver = sat_solver();
    let mut tree = DictBoolVar::new(&mut solver, &two_level_spec()).unwrap();

    tree.select(&[Axis::label("nope"), Axis::All]).unwrap();
    assert_eq!(tree.missing_labels().len(), 1);
    tree.select(&[Axis::All, Axis::All]).unwrap();
    assert!(tree.missing_labels().is_empty());
}

#[test]
fn selection_arity_must_match_the_keyed_depth() {
    init_logging();
    let mut solver = sat_solver();
    let mut tree = DictBoolVar::new(&mut solver, &two_level_spec()).unwrap();

    assert!(matches!(
        tree.select(&[Axis::All]),
        Err(ModelError::SelectionArity {
            expected: 2,
            got: 1
        })
    ));
    assert!(matches!(
        tree.select(&[Axis::All, Axis::All, Axis::All]),
        Err(ModelError::SelectionArity {
            expected: 2,
            got: 3
        })
    ));
}

#[test]
fn labels_absent_under_one_branch_are_skipped_silently() {
    init_logging();
    let mut solver = sat_solver();
    // `q` exists under `b` only
    let spec = KeySpec::branch(vec![
        ("a", KeySpec::branch(vec![("p", KeySpec::leaves([1]))])),
        (
            "b",
            KeySpec::branch(vec![
                ("p", KeySpec::leaves([1])),
                ("q", KeySpec::leaves([1])),
            ]),
        ),
    ]);
    let mut tree = DictBoolVar::new(&mut solver, &spec).unwrap();

    let found = tree.select(&[Axis::All, Axis::label("q")]).unwrap();
    assert_eq!(names(&found), vec!["b_q_1"]);
    assert!(tree.missing_labels().is_empty());
}

#[test]
fn ragged_structures_are_rejected_at_construction() {
    init_logging();
    let mut solver = sat_solver();
    let spec = KeySpec::branch(vec![
        ("a", KeySpec::leaves([1])),
        ("b", KeySpec::branch(vec![("p", KeySpec::leaves([1]))])),
    ]);
    assert!(matches!(
        DictBoolVar::new(&mut solver, &spec),
        Err(ModelError::RaggedTree(_))
    ));
}

#[test]
fn a_flat_leaf_list_selects_with_zero_axes() {
    init_logging();
    let mut solver = sat_solver();
    let mut tree = DictBoolVar::new(&mut solver, &KeySpec::leaves(["x", "y"])).unwrap();

    assert_eq!(tree.depth(), 0);
    let all = tree.select(&[]).unwrap();
    assert_eq!(names(&all), vec!["x", "y"]);
}

#[test]
fn selected_variables_participate_in_constraints() {
    init_logging();
    let mut solver = sat_solver();
    let mut tree = DictBoolVar::new(&mut solver, &two_level_spec()).unwrap();

    let under_a = tree.select(&[Axis::label("a"), Axis::All]).unwrap();
    let mut sum = anymip::constant(0.0);
    for var in &under_a {
        sum = sum.add(var).unwrap();
    }
    solver
        .add_constraint(sum.eq(under_a.len() as f64).unwrap(), "all_of_a")
        .unwrap();

    assert!(solver.solve().unwrap().is_feasible());
    for var in &under_a {
        assert_eq!(solver.get_var_value(var).unwrap(), 1.0);
    }
}
