use halo_relax::algs::communicator::{CommTag, LocalFabric, NoComm};
use halo_relax::algs::convergence::StopRule;
use halo_relax::algs::relax::in_precision;
use halo_relax::config::RelaxConfig;
use halo_relax::data::grid::Grid;
use halo_relax::relax_error::RelaxError;
use halo_relax::solver::{run_local, run_with_fabric, run_worker};

fn fixed(dimension: usize, sweeps: usize) -> RelaxConfig {
    RelaxConfig::new(dimension, 0.01).with_stop(StopRule::FixedSweeps(sweeps))
}

#[test]
fn sample_grid_single_worker_terminates_stably() {
    let config = RelaxConfig::new(5, 0.01);
    let report = run_worker(&NoComm, &config, Some(Grid::sample())).unwrap();
    assert!(report.locally_converged);
    assert!(report.sweeps > 1 && report.sweeps < 200, "{} sweeps", report.sweeps);
    let last = report.grid.unwrap();

    // the grid one sweep earlier shares every interior bucket with the result
    let before = run_worker(&NoComm, &fixed(5, report.sweeps - 1), Some(Grid::sample()))
        .unwrap()
        .grid
        .unwrap();
    for r in 1..4 {
        for c in 1..4 {
            assert!(in_precision(before.get(r, c), last.get(r, c), 0.01));
        }
    }
    assert_eq!(last.row(0), Grid::sample().row(0));
    assert_eq!(last.row(4), Grid::sample().row(4));
}

#[test]
fn two_workers_match_one_worker_bit_for_bit() {
    let grid = Grid::random(10, 2024);
    let config = fixed(10, 40);
    let single = run_local(grid.clone(), &config, 1).unwrap();
    let split = run_local(grid, &config, 2).unwrap();
    assert_eq!(split.sweeps, vec![40, 40]);
    assert_eq!(single.grid, split.grid);
}

#[test]
fn uneven_splits_match_one_worker() {
    let grid = Grid::random(13, 11);
    let config = fixed(13, 25);
    let single = run_local(grid.clone(), &config, 1).unwrap();
    for workers in [3, 4, 7, 11] {
        let split = run_local(grid.clone(), &config, workers).unwrap();
        assert_eq!(single.grid, split.grid, "{workers} workers");
    }
}

#[test]
fn one_row_per_worker_is_allowed() {
    let config = fixed(5, 10);
    let single = run_local(Grid::sample(), &config, 1).unwrap();
    let split = run_local(Grid::sample(), &config, 3).unwrap();
    assert_eq!(single.grid, split.grid);
}

#[test]
fn converged_runs_are_deterministic() {
    let grid = Grid::random(16, 5);
    let config = RelaxConfig::new(16, 0.001);
    let a = run_local(grid.clone(), &config, 4).unwrap();
    let b = run_local(grid, &config, 4).unwrap();
    assert_eq!(a, b);
    assert!(a.sweeps.iter().all(|&s| s >= 1));
}

#[test]
fn final_tag_ends_traffic_on_every_link() {
    let workers = 4;
    let fabric = LocalFabric::new(workers);
    let config = RelaxConfig::new(14, 0.001);
    run_with_fabric(&fabric, Grid::random(14, 99), &config).unwrap();

    for src in 0..workers {
        for dst in [src.wrapping_sub(1), src + 1] {
            if dst >= workers {
                continue;
            }
            let halo: Vec<_> = fabric
                .traffic(src, dst)
                .into_iter()
                .filter(|t| t.is_halo())
                .collect();
            assert!(!halo.is_empty(), "{src} -> {dst}");
            let finals = halo.iter().filter(|&&t| t == CommTag::FINAL).count();
            assert!(finals <= 1, "{src} -> {dst}: {finals} final tags");
            if finals == 1 {
                assert_eq!(halo.last(), Some(&CommTag::FINAL), "{src} -> {dst}");
            }
            assert_eq!(fabric.pending(src, dst), 0, "{src} -> {dst}");
        }
    }
    // everything the coordinator scattered was consumed, everything gathered
    // arrived
    for rank in 1..workers {
        assert_eq!(fabric.pending(0, rank), 0);
        assert_eq!(fabric.pending(rank, 0), 0);
    }
}

#[test]
fn too_many_workers_fails_everywhere_without_traffic() {
    let workers = 4;
    let fabric = LocalFabric::new(workers);
    let err = run_with_fabric(&fabric, Grid::sample(), &RelaxConfig::default()).unwrap_err();
    assert_eq!(
        err,
        RelaxError::TooManyWorkers {
            workers: 4,
            rows: 3
        }
    );
    assert!(err.is_configuration());
    for src in 0..workers {
        for dst in 0..workers {
            assert!(fabric.traffic(src, dst).is_empty());
        }
    }
}

#[test]
fn invalid_precision_is_rejected() {
    let config = RelaxConfig::new(5, 0.0);
    assert_eq!(
        run_local(Grid::sample(), &config, 2).unwrap_err(),
        RelaxError::InvalidPrecision(0.0)
    );
}

#[test]
fn grid_dimension_must_match_config() {
    let config = RelaxConfig::new(6, 0.01);
    let err = run_local(Grid::sample(), &config, 2).unwrap_err();
    assert_eq!(
        err,
        RelaxError::ShapeMismatch {
            expected: 36,
            found: 25
        }
    );
}

#[test]
fn bad_grid_fails_every_rank_without_fabric_abort() {
    let workers = 3;
    let fabric = LocalFabric::new(workers);
    let config = RelaxConfig::new(6, 0.01);
    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|rank| {
                let comm = fabric.comm(rank);
                let config = &config;
                s.spawn(move || {
                    let grid = (rank == 0).then(Grid::sample);
                    run_worker(&comm, config, grid)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(!fabric.is_aborted());
    assert_eq!(
        results[0],
        Err(RelaxError::ShapeMismatch {
            expected: 36,
            found: 25
        })
    );
    for result in &results[1..] {
        assert_eq!(result, &Err(RelaxError::RejectedByCoordinator));
    }
}

#[test]
fn missing_grid_fails_every_rank() {
    let fabric = LocalFabric::new(2);
    let config = RelaxConfig::new(6, 0.01);
    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|rank| {
                let comm = fabric.comm(rank);
                let config = &config;
                s.spawn(move || run_worker(&comm, config, None))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(results[0], Err(RelaxError::MissingGrid));
    assert_eq!(results[1], Err(RelaxError::RejectedByCoordinator));
    assert!(results.iter().all(|r| r.as_ref().unwrap_err().is_configuration()));
}
