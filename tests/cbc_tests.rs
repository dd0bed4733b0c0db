#![cfg(feature = "cbc")]

use anymip::{Backend, Solver, SolverConfig, Status};

fn init_logging() {
    let _ = tracing_subscriber::fmt().try_init();
}

fn cbc_solver() -> Solver {
    Solver::new(SolverConfig::new(Backend::Cbc)).unwrap()
}

#[test]
fn a_covering_pair_costs_exactly_one() {
    init_logging();
    let mut solver = cbc_solver();
    let x = solver.new_bool_var("x").unwrap();
    let y = solver.new_bool_var("y").unwrap();
    solver.set_obj(1.0, &x).unwrap();
    solver.set_obj(1.0, &y).unwrap();
    solver
        .add_constraint(x.add(&y).unwrap().geq(1.0).unwrap(), "cover")
        .unwrap();

    assert_eq!(solver.solve().unwrap(), Status::Optimal);
    assert!((solver.objective_value().unwrap() - 1.0).abs() < 1e-6);
    let vx = solver.get_var_value(&x).unwrap();
    let vy = solver.get_var_value(&y).unwrap();
    assert_eq!(vx + vy, 1.0);
}

#[test]
fn continuous_variables_relax_to_fractional_solutions() {
    init_logging();
    let mut solver = cbc_solver();
    let x = solver.new_var(0.0, 10.0, false, "x").unwrap();
    let y = solver.new_var(0.0, 10.0, false, "y").unwrap();
    solver.set_obj(1.0, &x).unwrap();
    solver.set_obj(1.0, &y).unwrap();
    solver
        .add_constraint(x.add(&y).unwrap().geq(0.5).unwrap(), "half")
        .unwrap();

    assert_eq!(solver.solve().unwrap(), Status::Optimal);
    let total = solver.objective_value().unwrap();
    assert!((total - 0.5).abs() < 1e-6);
}

#[test]
fn contradictory_bounds_report_infeasible() {
    init_logging();
    let mut solver = cbc_solver();
    let x = solver.new_var(0.0, 1.0, false, "x").unwrap();
    solver.add_constraint(x.geq(2.0).unwrap(), "too_high").unwrap();

    assert_eq!(solver.solve().unwrap(), Status::Infeasible);
    assert_eq!(solver.objective_value(), None);
}

#[test]
fn a_literal_false_constraint_forces_infeasibility() {
    init_logging();
    let mut solver = cbc_solver();
    let _x = solver.new_bool_var("x").unwrap();
    solver.add_constraint(false, "impossible").unwrap();
    assert_eq!(solver.solve().unwrap(), Status::Infeasible);
}

#[test]
fn the_model_exports_in_lp_format() {
    init_logging();
    let dir = std::env::temp_dir().join("anymip_cbc_export_test");
    let path = dir.join("model.lp");
    let _ = std::fs::remove_dir_all(&dir);

    let config = SolverConfig::new(Backend::Cbc).with_problem_name("export_demo");
    let mut solver = Solver::new(config).unwrap();
    let x = solver.new_int_var(0, 5, "x").unwrap();
    let y = solver.new_bool_var("y").unwrap();
    solver.set_obj(2.0, &x).unwrap();
    solver
        .add_constraint(x.add(&y).unwrap().leq(4.0).unwrap(), "cap")
        .unwrap();
    solver.add_constraint(x.geq(0.0).unwrap(), "floor").unwrap();

    solver.export_model(Some(&path)).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("Problem: export_demo"));
    assert!(text.contains("Minimize"));
    assert!(text.contains("cap:"));
    assert!(text.contains("floor: x >= 0\n"));
    assert!(text.contains("Generals"));
    assert!(text.contains("Binaries"));
    assert!(text.trim_end().ends_with("End"));

    let _ = std::fs::remove_dir_all(&dir);
}
