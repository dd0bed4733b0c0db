#![cfg(feature = "sat")]

use anymip::{constant, Backend, ModelError, Solver, SolverConfig, Status};

fn init_logging() {
    let _ = tracing_subscriber::fmt().try_init();
}

fn sat_solver() -> Solver {
    Solver::new(SolverConfig::new(Backend::Sat)).unwrap()
}

#[test]
fn facade_starts_idle_and_never_returns_to_idle() {
    init_logging();
    let mut solver = sat_solver();
    assert_eq!(solver.status(), Status::Idle);

    let x = solver.new_bool_var("x").unwrap();
    solver.add_constraint(x.eq(1.0).unwrap(), "pin").unwrap();
    assert_eq!(solver.solve().unwrap(), Status::Optimal);
    assert_eq!(solver.status(), Status::Optimal);
}

#[test]
fn solution_values_come_back_through_the_same_nodes() {
    init_logging();
    let mut solver = sat_solver();
    let x = solver.new_int_var(0, 10, "x").unwrap();
    let y = solver.new_int_var(0, 10, "y").unwrap();
    solver.add_constraint(x.eq(3.0).unwrap(), "pin_x").unwrap();
    solver
        .add_constraint(x.add(&y).unwrap().eq(7.0).unwrap(), "sum")
        .unwrap();

    assert_eq!(solver.solve().unwrap(), Status::Optimal);
    assert_eq!(solver.get_var_value(&x).unwrap(), 3.0);
    assert_eq!(solver.get_var_value(&y).unwrap(), 4.0);
}

#[test]
fn boolean_values_are_rounded_to_exact_integers() {
    init_logging();
    let mut solver = sat_solver();
    let x = solver.new_bool_var("x").unwrap();
    let y = solver.new_bool_var("y").unwrap();
    solver
        .add_constraint(x.add(&y).unwrap().geq(1.0).unwrap(), "cover")
        .unwrap();

    assert!(solver.solve().unwrap().is_feasible());
    let vx = solver.get_var_value(&x).unwrap();
    let vy = solver.get_var_value(&y).unwrap();
    assert!(vx == 0.0 || vx == 1.0);
    assert!(vy == 0.0 || vy == 1.0);
    assert!(vx + vy >= 1.0);
}

#[test]
fn reading_values_before_any_solve_is_an_engine_error() {
    init_logging();
    let mut solver = sat_solver();
    let x = solver.new_bool_var("x").unwrap();
    assert!(solver.get_var_value(&x).is_err());
}

#[test]
fn literal_constraints_are_accepted_for_bookkeeping() {
    init_logging();
    let mut solver = sat_solver();
    let x = solver.new_bool_var("x").unwrap();
    solver.add_constraint(true, "always").unwrap();
    solver
        .add_constraint(constant(2.0).eq(2.0).unwrap(), "folded")
        .unwrap();
    solver.add_constraint(x.geq(0.0).unwrap(), "real").unwrap();

    assert_eq!(solver.constraint_formulas().len(), 3);
    assert_eq!(solver.solve().unwrap(), Status::Optimal);
}

#[test]
fn a_literal_false_constraint_makes_the_model_infeasible() {
    init_logging();
    let mut solver = sat_solver();
    let _x = solver.new_bool_var("x").unwrap();
    solver.add_constraint(false, "impossible").unwrap();
    assert_eq!(solver.solve().unwrap(), Status::Infeasible);
    assert_eq!(solver.objective_value(), None);
}

#[test]
fn objective_registry_is_keyed_by_name_with_last_write_wins() {
    init_logging();
    let mut solver = sat_solver();
    let x = solver.new_bool_var("x").unwrap();
    let x2 = solver.new_bool_var("x").unwrap();
    solver.set_obj(1.0, &x).unwrap();
    solver.set_obj(2.0, &x2).unwrap();

    assert_eq!(solver.obj_vars().len(), 1);
    assert_eq!(solver.objective_formulas(), vec!["1 * x", "2 * x"]);
}

#[test]
fn conflicting_constraints_are_isolated_by_diagnosis() {
    init_logging();
    let config = SolverConfig::new(Backend::Sat)
        .with_iis(true)
        .with_problem_name("conflict");
    let mut solver = Solver::new(config).unwrap();
    let x = solver.new_int_var(0, 10, "x").unwrap();
    solver.add_constraint(x.eq(1.0).unwrap(), "fix_one").unwrap();
    solver.add_constraint(x.eq(0.0).unwrap(), "fix_zero").unwrap();

    let conflict = solver.find_conflict_constraints().unwrap();
    assert_eq!(solver.status(), Status::Infeasible);
    assert!(conflict.contains(&"fix_one".to_string()));
    assert!(conflict.contains(&"fix_zero".to_string()));
}

#[test]
fn diagnosis_is_idempotent_on_an_unchanged_model() {
    init_logging();
    let config = SolverConfig::new(Backend::Sat).with_iis(true);
    let mut solver = Solver::new(config).unwrap();
    let x = solver.new_int_var(0, 5, "x").unwrap();
    solver.add_constraint(x.eq(1.0).unwrap(), "a").unwrap();
    solver.add_constraint(x.eq(2.0).unwrap(), "b").unwrap();

    let mut first = solver.find_conflict_constraints().unwrap();
    let mut second = solver.find_conflict_constraints().unwrap();
    first.sort();
    second.sort();
    assert_eq!(first, second);
}

#[test]
fn diagnosis_of_a_feasible_model_returns_no_conflict() {
    init_logging();
    let config = SolverConfig::new(Backend::Sat).with_iis(true);
    let mut solver = Solver::new(config).unwrap();
    let x = solver.new_bool_var("x").unwrap();
    solver.add_constraint(x.geq(0.0).unwrap(), "loose").unwrap();

    assert!(solver.find_conflict_constraints().unwrap().is_empty());
    assert!(solver.status().is_feasible());
}

#[test]
fn diagnosis_requires_iis_mode() {
    init_logging();
    let mut solver = sat_solver();
    let x = solver.new_bool_var("x").unwrap();
    solver.add_constraint(x.eq(1.0).unwrap(), "pin").unwrap();
    assert!(matches!(
        solver.find_conflict_constraints(),
        Err(ModelError::DiagnosisUnavailable)
    ));
}

#[test]
fn continuous_variables_are_refused_by_the_sat_backend() {
    init_logging();
    let mut solver = sat_solver();
    let err = solver.new_var(0.0, 1.0, false, "c");
    assert!(matches!(
        err,
        Err(ModelError::UnsupportedVariableKind { .. })
    ));
}

#[test]
fn wide_integer_domains_are_rejected_before_solving() {
    init_logging();
    let mut solver = sat_solver();
    assert!(matches!(
        solver.new_int_var(0, 4_000_000_000_000_000_000, "wide"),
        Err(ModelError::InvalidVariable { .. })
    ));
}

#[test]
fn the_sat_backend_ignores_the_objective_value() {
    init_logging();
    let mut solver = sat_solver();
    let x = solver.new_bool_var("x").unwrap();
    solver.set_obj(1.0, &x).unwrap();
    solver.add_constraint(x.eq(1.0).unwrap(), "pin").unwrap();

    assert_eq!(solver.solve().unwrap(), Status::Optimal);
    assert_eq!(solver.objective_value(), None);
}

#[test]
fn nodes_from_one_facade_are_rejected_by_another() {
    init_logging();
    let mut a = sat_solver();
    let mut b = sat_solver();
    let x = a.new_bool_var("x").unwrap();
    let y = b.new_bool_var("y").unwrap();

    assert!(matches!(
        x.add(&y),
        Err(ModelError::BackendMismatch { .. })
    ));
    let rel = y.eq(1.0).unwrap();
    assert!(matches!(
        a.add_constraint(rel, "foreign"),
        Err(ModelError::BackendMismatch { .. })
    ));
}

#[test]
fn export_is_refused_outside_the_cbc_backend() {
    init_logging();
    let solver = sat_solver();
    let path = std::env::temp_dir().join("anymip_sat_refused.lp");
    solver.export_model(Some(&path)).unwrap();
    assert!(!path.exists());
}

#[cfg(not(feature = "cbc"))]
#[test]
fn unavailable_backends_fail_at_construction() {
    init_logging();
    assert!(matches!(
        Solver::new(SolverConfig::new(Backend::Cbc)),
        Err(ModelError::SolverNotAvailable(Backend::Cbc))
    ));
}
