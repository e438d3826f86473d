//! Demuster executable entry point.
//!
//! # Architecture
//!
//! Drives a simulated fleet of vehicles, each running its own instance of the demuster
//! behaviour. Every cycle:
//!
//!     - Scripted telecommands which have come due are applied
//!     - Each vehicle's behaviour is run on the pose of its simulated vehicle
//!     - The simulated vehicles are moved according to the course and speed demands
//!     - Trajectory announcements and speeds are delivered to every other vehicle
//!
//! The run ends once every vehicle has reached the end of its trajectory, or when the maximum
//! time has elapsed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use comms_if::{
    msg::{SpeedMsg, TrajectoryMsg, VehicleId},
    tc::{DemusterCmd, Tc},
};
use demuster_lib::{
    behaviour::{Demuster, InitData, InputData},
    geom::Pose,
    params::{DemusterExecParams, VehicleParams},
    sim::{SimParams, SimVehicle},
};
use util::{
    archive::Archived,
    logger::{logger_init, LevelFilter},
    module::State,
    script_interpreter::{PendingTcs, ScriptInterpreter},
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(
    name = "demuster_exec",
    about = "Runs the demuster behaviour on a simulated fleet"
)]
struct Opt {
    /// Fleet parameter file, relative to the params directory
    #[structopt(short, long, default_value = "demuster_exec.toml")]
    params: PathBuf,

    /// Timed telecommand script
    #[structopt(short, long)]
    script: Option<PathBuf>,

    /// Override the maximum simulated time
    #[structopt(long)]
    max_time: Option<f64>,

    /// Run the cycles at the simulated rate rather than as fast as possible
    #[structopt(long)]
    realtime: bool,

    /// Minimum log level, one of info, debug or trace
    #[structopt(long, default_value = "debug")]
    log_level: LevelFilter,

    /// Vehicle the command line telecommand is addressed to, all vehicles if not given
    #[structopt(long)]
    tc_target: Option<String>,

    /// Simulated time at which the command line telecommand is executed
    #[structopt(long, default_value = "0")]
    tc_time: f64,

    /// Telecommand to execute during the run, in addition to any script
    #[structopt(subcommand)]
    tc: Option<DemusterCmd>,
}

/// One member of the fleet.
struct Vehicle {
    behaviour: Demuster,
    sim: SimVehicle,
    complete: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("demuster_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(opt.log_level, &session).wrap_err("Failed to initialise logging")?;

    info!("Demuster Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: DemusterExecParams = util::params::load(&opt.params)
        .wrap_err_with(|| format!("Could not load exec params from {:?}", opt.params))?;

    let max_time_s = opt.max_time.unwrap_or(exec_params.max_time_s);
    let period_s = exec_params.cycle_period_s;
    if !(period_s.is_finite() && period_s > 0.0) {
        return Err(eyre!("The cycle period must be positive, found {}", period_s));
    }

    info!("Exec parameters loaded");

    // ---- INITIALISE TC SOURCE ----

    let mut script = match opt.script {
        Some(ref path) => {
            info!("Loading script from {:?}", path);

            let si = ScriptInterpreter::new(path).wrap_err("Failed to load script")?;

            info!(
                "Loaded script lasts {:.02} s and contains {} TCs\n",
                si.get_duration(),
                si.get_num_tcs()
            );

            Some(si)
        }
        None => {
            info!("No script provided\n");
            None
        }
    };

    let mut cli_tc = cli_tc(&opt);
    if let Some((t, ref tc)) = cli_tc {
        info!("Command line TC {:?} will execute at {:.02} s\n", tc, t);
    }

    // ---- INITIALISE FLEET ----

    info!("Initialising {} vehicles...", exec_params.vehicles.len());

    let mut fleet = Vec::with_capacity(exec_params.vehicles.len());
    for v in exec_params.vehicles.iter() {
        fleet.push(
            init_vehicle(v, exec_params.sim, &session)
                .wrap_err_with(|| format!("Failed to initialise vehicle {}", v.name))?,
        );
    }

    if fleet.is_empty() {
        return Err(eyre!("No vehicles in the fleet"));
    }

    // Announce everyone's position before starting
    let mut outbox = Vec::new();
    for v in fleet.iter_mut() {
        let out = v.behaviour.on_idle(&sim_input(&v.sim));
        outbox.extend(out.broadcast);
        v.behaviour.on_idle_to_run();
    }
    deliver(&mut fleet, &outbox);

    info!("Fleet initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let mut num_cycles: u64 = 0;

    loop {
        let cycle_start_instant = Instant::now();
        let sim_time_s = num_cycles as f64 * period_s;

        // ---- TELECOMMAND PROCESSING ----

        if let Some(ref mut si) = script {
            match si.get_pending_tcs(sim_time_s) {
                PendingTcs::None => (),
                PendingTcs::Some(tcs) => {
                    for tc in tcs.iter() {
                        exec_tc(&mut fleet, tc);
                    }
                }
                PendingTcs::EndOfScript => {
                    info!("End of script reached");
                    script = None;
                }
            }
        }

        if cli_tc.as_ref().map_or(false, |(t, _)| sim_time_s >= *t) {
            if let Some((_, tc)) = cli_tc.take() {
                exec_tc(&mut fleet, &tc);
            }
        }

        // ---- BEHAVIOUR PROCESSING ----

        let mut outbox = Vec::new();

        for v in fleet.iter_mut() {
            let input = sim_input(&v.sim);

            let output = if v.complete {
                v.behaviour.on_idle(&input)
            } else {
                let (output, _) = v
                    .behaviour
                    .proc(&input)
                    .wrap_err_with(|| format!("Error processing {}", v.behaviour.id()))?;
                output
            };

            if let Err(e) = v.behaviour.write() {
                warn!("Could not archive {}: {}", v.behaviour.id(), e);
            }

            if output.complete && !v.complete {
                info!(
                    "{} complete at {:.1} s, pose ({:.2}, {:.2}) heading {:.1}",
                    v.behaviour.id(),
                    sim_time_s,
                    v.sim.pose.position_m.x,
                    v.sim.pose.position_m.y,
                    v.sim.pose.heading_deg
                );
                v.complete = true;
                outbox.extend(v.behaviour.on_run_to_idle().broadcast);
            }

            v.sim.step(output.target.as_ref(), period_s);

            outbox.extend(output.broadcast);
        }

        deliver(&mut fleet, &outbox);

        num_cycles += 1;

        // ---- END CONDITIONS ----

        if fleet.iter().all(|v| v.complete) {
            info!("All vehicles complete after {:.1} s", sim_time_s);
            break;
        }

        if sim_time_s >= max_time_s {
            warn!(
                "Maximum time of {:.1} s reached with {} vehicles still running",
                max_time_s,
                fleet.iter().filter(|v| !v.complete).count()
            );
            break;
        }

        // ---- CYCLE MANAGEMENT ----

        if opt.realtime {
            let cycle_dur = Instant::now() - cycle_start_instant;
            match Duration::from_secs_f64(period_s).checked_sub(cycle_dur) {
                Some(d) => thread::sleep(d),
                None => warn!("Cycle overran by {:.06} s", cycle_dur.as_secs_f64() - period_s),
            }
        }
    }

    info!("End of execution");

    session.exit();

    Ok(())
}

/// Build one vehicle from its parameters.
fn init_vehicle(
    params: &VehicleParams,
    sim_params: SimParams,
    session: &Session,
) -> Result<Vehicle, Report> {
    let id = VehicleId::new(params.name.as_str());

    let mut behaviour = match (&params.params_file, &params.params) {
        (Some(path), _) => Demuster::from_params_file(id, path)?,
        (None, Some(p)) => Demuster::init(InitData {
            id,
            params: p.clone(),
        })?,
        (None, None) => {
            return Err(eyre!(
                "Vehicle {} has neither a params file nor inline params",
                params.name
            ))
        }
    };

    behaviour.init_archive(session)?;

    let sim = SimVehicle::new(
        Pose::new(params.start[0], params.start[1], params.start_heading),
        sim_params,
    );

    info!("{} initialised", params.name);

    Ok(Vehicle {
        behaviour,
        sim,
        complete: false,
    })
}

/// The telecommand given on the command line and the time to execute it at, if there is one.
fn cli_tc(opt: &Opt) -> Option<(f64, Tc)> {
    let cmd = opt.tc.clone()?;

    Some((
        opt.tc_time,
        Tc {
            target: opt.tc_target.as_deref().map(VehicleId::new),
            cmd,
        },
    ))
}

/// Read the behaviour inputs from a simulated vehicle.
fn sim_input(sim: &SimVehicle) -> InputData {
    InputData {
        position: Some(sim.pose.position_m),
        heading_deg: Some(sim.pose.heading_deg),
        speed_ms: Some(sim.speed_ms),
        compass_heading_deg: Some(sim.pose.heading_deg),
    }
}

/// Execute a telecommand on every vehicle it's addressed to.
fn exec_tc(fleet: &mut [Vehicle], tc: &Tc) {
    debug!("Executing {:?}", tc);

    let mut handled = false;
    for v in fleet.iter_mut().filter(|v| tc.is_for(v.behaviour.id())) {
        handled = true;
        if let Err(e) = v.behaviour.apply_cmd(&tc.cmd) {
            warn!("{} could not execute {:?}: {}", v.behaviour.id(), tc.cmd, e);
        }
    }

    if !handled {
        warn!("No vehicle matches the target of {:?}", tc);
    }
}

/// Deliver trajectory announcements and speeds to every vehicle.
///
/// Announcements go through their JSON representation, as they would over a real link.
fn deliver(fleet: &mut [Vehicle], outbox: &[TrajectoryMsg]) {
    let speeds: Vec<SpeedMsg> = fleet
        .iter()
        .map(|v| SpeedMsg {
            source: v.behaviour.id().clone(),
            speed_ms: v.sim.speed_ms,
        })
        .collect();

    for msg in outbox {
        let json = match msg.to_json() {
            Ok(j) => j,
            Err(e) => {
                warn!("Could not serialise {}: {}", msg.label, e);
                continue;
            }
        };

        for v in fleet.iter_mut() {
            match TrajectoryMsg::from_json(&json) {
                Ok(m) => {
                    v.behaviour.receive(m);
                }
                Err(e) => warn!("Could not parse {}: {}", msg.label, e),
            }
        }
    }

    for v in fleet.iter_mut() {
        let own = v.behaviour.id().clone();
        for s in speeds.iter().filter(|s| s.source != own) {
            v.behaviour.registry_mut().update_speed_msg(s);
        }
    }
}
