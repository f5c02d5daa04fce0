#![allow(non_snake_case)]

use rand::{ SeedableRng, rngs::StdRng };
use tracing::{ error, info };
use tracing_subscriber::{ fmt, prelude::*, EnvFilter };
use xcontrol::{
    basis::Basis,
    config::RunConfig,
    cost::{ ControlCost, Cost, StateTransfer },
    hamiltonian::HamiltonianFn,
    optimiser::{ Dcrab, OptimiseOutcome },
    potential::{ Potential, cosine_well },
    stepper::SplitStepper,
    stopper::StopComponent,
};

// drive the ground state of a shaken cosine well into its first excited state
//
// usage: shaken_well [config.toml]

fn init_logging() {
    let filter
        = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

fn run(config: &RunConfig) -> anyhow::Result<OptimiseOutcome> {
    let hs = config.hilbert()?;
    let V = cosine_well(hs.x(), config.depth, config.k);
    let H = HamiltonianFn::new(&hs, Potential::shaken(&hs, &V)?);

    // initial and target states are the two lowest vibrational levels of the
    // unshaken well
    let mut H0 = H.at(0.0)?;
    let psi_0 = H0.try_eigenvector(0)?;
    let psi_t = H0.try_eigenvector(1)?;
    info!(e0 = H0.eigenvalue(0), e1 = H0.eigenvalue(1), "computed vibrational levels");

    let time = config.time();
    let stepper = SplitStepper::new(time.dt, &H, config.absorbing);
    let mut cost
        = Cost::from(StateTransfer::new(stepper, &psi_0, &psi_t)?)
        + config.regularisation * ControlCost::regularisation();
    if config.boundary > 0.0 {
        cost = cost
            + config.boundary * ControlCost::symmetric_boundaries(config.max_amp);
    }
    let stopper
        = StopComponent::fidelity(config.target_fidelity)
        + StopComponent::iterations(config.max_iterations)
        + StopComponent::stall(config.stall);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let basis
        = Basis::trig(
            &time.controls(), config.max_freq, config.mode, config.basis_size, &mut rng)?
        .with_max_amp(config.max_amp)?;
    let mut dcrab = Dcrab::new(basis, stopper, cost, config.seed.wrapping_add(1));
    Ok(dcrab.optimise(config.dressings)?)
}

fn main() {
    init_logging();

    let config
        = match std::env::args().nth(1) {
            Some(path) => RunConfig::from_file(&path),
            None => Ok(RunConfig::default()),
        };
    let config
        = match config {
            Ok(config) => config,
            Err(err) => {
                error!("invalid configuration: {err}");
                std::process::exit(1);
            },
        };
    info!(?config, "starting run");

    match run(&config) {
        Ok(outcome) => {
            println!("stopped: {}", outcome.reason);
            println!("iterations: {}", outcome.num_iterations);
            println!("full-path propagations: {}", outcome.fpp);
            println!("dressings: {}", outcome.dressings);
            println!("fidelity: {:.6}", outcome.best.fid);
            println!("norm: {:.6}", outcome.best.norm);
            println!("cost: {:.6e}", outcome.best.cost);
            if outcome.best.fid < config.target_fidelity {
                println!("target fidelity {} not reached", config.target_fidelity);
            }
        },
        Err(err) => {
            error!("{err:#}");
            std::process::exit(1);
        },
    }
}
