//! Main car-side executable entry point.
//!
//! # Architecture
//!
//! The executable replays a directory of recorded camera frames through the control core:
//!
//!     - Initialise the session, logging and modules
//!     - Main loop, once per frame:
//!         - Frame acquisition (load the next PNG)
//!         - Drive control processing
//!         - Archiving of the command and status report
//!         - Overlay saving
//!     - Save the final turn history
//!
//! An optional single argument overrides the frames directory given in the parameters.
//!
//! # Modules
//!
//! All modules (e.g. `drive_ctrl`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use std::{
    env, fs,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

// Internal
use car_if::eqpt::cam::Frame;
use car_lib::{
    drive_ctrl::{DriveCtrl, InputData},
    params::CarExecParams,
    per::overlay::to_rgb_image,
};
use util::{
    archive::Archived,
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("car_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Trackcar Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: CarExecParams =
        util::params::load("car_exec.toml").wrap_err("Could not load exec params")?;

    info!("Exec parameters loaded");

    if !(exec_params.cycle_period_s.is_finite() && exec_params.cycle_period_s > 0.0) {
        return Err(eyre!(
            "Cycle period must be positive, found {}",
            exec_params.cycle_period_s
        ));
    }

    // ---- FIND FRAMES ----

    let args: Vec<String> = env::args().collect();
    debug!("CLI arguments: {:?}", args);

    let frames_dir = match args.len() {
        1 => resolve_dir(&exec_params.frames_dir)?,
        2 => PathBuf::from(&args[1]),
        n => return Err(eyre!("Expected either zero or one argument, found {}", n - 1)),
    };

    let frame_paths = list_frames(&frames_dir)
        .wrap_err_with(|| format!("Could not list frames in {:?}", frames_dir))?;

    info!("Found {} frames in {:?}\n", frame_paths.len(), frames_dir);

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut drive_ctrl =
        DriveCtrl::init("drive_ctrl.toml", &session).wrap_err("Failed to initialise DriveCtrl")?;
    info!("DriveCtrl init complete");

    info!("Module initialisation complete\n");

    let overlay_dir = session.session_root.join("overlay");
    if exec_params.overlay_every_n_cycles > 0 {
        fs::create_dir_all(&overlay_dir).wrap_err("Could not create the overlay directory")?;
    }

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let cycle_period = Duration::from_secs_f64(exec_params.cycle_period_s);
    let replay_start = Instant::now();
    let mut num_cycles: u64 = 0;

    for path in frame_paths.iter() {
        if let Some(max) = exec_params.max_cycles {
            if num_cycles >= max {
                info!("Maximum number of cycles ({}) reached, stopping", max);
                break;
            }
        }

        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // ---- DATA INPUT ----

        let frame = match load_frame(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Skipping frame {:?}: {}", path, e);
                continue;
            }
        };

        let timestamp = if exec_params.real_time {
            cycle_start_instant
        } else {
            exec_params.replay_timestamp(replay_start, num_cycles)
        };

        // ---- CONTROL ALGORITHM PROCESSING ----

        match drive_ctrl.proc(&InputData { frame, timestamp }) {
            Ok((cmd, report)) => {
                debug!(
                    "Cycle {}: throttle {:.3}, steering {:.3}, turn {}",
                    num_cycles, cmd.throttle, cmd.steering, report.current_turn
                );
            }
            Err(e) => match e {},
        }

        // ---- WRITE ARCHIVES ----

        if let Err(e) = drive_ctrl.write() {
            warn!("Could not write the DriveCtrl archive: {}", e);
        }

        let every = exec_params.overlay_every_n_cycles;
        if every > 0 && num_cycles % every == 0 {
            if let Some(overlay) = drive_ctrl.overlay() {
                let overlay_path = overlay_dir.join(format!("overlay_{:06}.png", num_cycles));
                if let Err(e) = to_rgb_image(&overlay).save(&overlay_path) {
                    warn!("Could not save overlay {:?}: {}", overlay_path, e);
                }
            }
        }

        // ---- CYCLE MANAGEMENT ----

        num_cycles += 1;

        if !exec_params.real_time {
            continue;
        }

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
            ),
        }
    }

    // ---- SHUTDOWN ----

    info!(
        "Replayed {} cycles, {} turn segments recorded",
        num_cycles,
        drive_ctrl.turn_history().len()
    );

    session.save("turn_history.json", drive_ctrl.turn_history().clone());

    info!("End of execution");

    session.exit();

    Ok(())
}

/// Resolve a directory against the software root, unless it is absolute.
fn resolve_dir(dir: &str) -> Result<PathBuf, Report> {
    let path = PathBuf::from(dir);
    if path.is_absolute() {
        return Ok(path);
    }

    let root = host::get_sw_root().wrap_err("The TRACKCAR_SW_ROOT variable is not set")?;
    Ok(root.join(path))
}

/// All PNG files in the directory, sorted by file name.
fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, Report> {
    let mut paths = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_png = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("png"))
            .unwrap_or(false);

        if path.is_file() && is_png {
            paths.push(path);
        }
    }

    paths.sort();

    Ok(paths)
}

fn load_frame(path: &Path) -> Result<Frame, image::ImageError> {
    let image = image::open(path)?.into_rgb8();
    Ok(Frame::from_rgb_image(&image))
}
