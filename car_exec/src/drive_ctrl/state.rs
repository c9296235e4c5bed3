//! Implementations for the DriveCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace};
use nalgebra::Point2;
use serde::Serialize;
use std::{convert::Infallible, time::Instant};

// Internal
use super::{
    compose::{feed_forward, CommandComposer},
    DriveCtrlError, Params,
};
use crate::{
    ctrl::{LowPass, PidController, PidTerms},
    per::{
        bearing::{bearing_deg, bearing_error, origin_for, ColorRatio},
        blob::BlobDetector,
        classify::{classify_frame, ClassifiedFrame},
        overlay::{annotate, OverlayMarks},
        target::TargetEstimator,
        ErrorStrategy,
    },
    turn::{predict, TurnHistory, TurnHistoryEntry, TurnLabel, TurnTracker},
};
use car_if::{cmd::DriveCmd, eqpt::cam::Frame};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    module::State,
    params,
    session::{self, Session},
    time::seconds_between,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of recent history entries included in the status report.
const REPORT_HISTORY_LEN: usize = 4;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drive control module state
pub struct DriveCtrl {
    params: Params,

    detector: BlobDetector,
    target_est: TargetEstimator,

    /// Low pass on the target, one per axis
    target_lp: Option<(LowPass, LowPass)>,

    ratio: ColorRatio,

    /// Error before filtering, held while there's nothing to measure
    raw_error: f64,
    error_lp: LowPass,

    pid: PidController,
    tracker: TurnTracker,
    composer: CommandComposer,

    /// Timestamp of the previous tick, or of creation before the first
    prev_instant: Instant,

    /// Last command, report and overlay inputs
    output: DriveCmd,
    report: StatusReport,
    last_frame: Option<ClassifiedFrame>,
    last_marks: Option<OverlayMarks>,

    arch_record: Option<Archiver>,
}

/// Input data to DriveCtrl.
#[derive(Debug, Clone)]
pub struct InputData {
    /// The camera frame for this tick.
    pub frame: Frame,

    /// When the frame was captured.
    pub timestamp: Instant,
}

/// Status report for DriveCtrl processing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    /// PID terms
    pub pid: PidTerms,

    /// Filtered steering error, including any feed forward offset, as given
    /// to the PID.
    pub error: f64,

    /// Units: encoder counts per second
    pub est_speed: f64,

    pub boost: bool,
    pub offset: f64,

    pub current_turn: TurnLabel,

    /// Units: seconds
    pub time_in_current_turn_s: f64,

    /// Most recent history entries, oldest first.
    pub recent_history: Vec<TurnHistoryEntry>,

    pub predicted_turns: Option<[TurnHistoryEntry; 2]>,

    pub raw_target: Option<Point2<f64>>,
    pub filtered_target: Option<Point2<f64>>,

    /// True if the target was held from a previous tick.
    pub target_held: bool,

    /// Units: degrees
    pub bearing_deg: Option<f64>,

    pub num_blobs: usize,
}

/// One row of the DriveCtrl archive.
#[derive(Debug, Clone, Serialize)]
struct ArchRecord {
    time_s: f64,
    throttle: f64,
    steering: f64,
    p: f64,
    i: f64,
    d: f64,
    error: f64,
    est_speed: f64,
    boost: bool,
    offset: f64,
    current_turn: TurnLabel,
    time_in_current_turn_s: f64,
    recent_history: String,
    predicted_turns: String,
    raw_target_x: Option<f64>,
    raw_target_y: Option<f64>,
    filtered_target_x: Option<f64>,
    filtered_target_y: Option<f64>,
    bearing_deg: Option<f64>,
    num_blobs: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveCtrl {
    /// Build a controller from parameters, without any archiving.
    ///
    /// The first tick's elapsed time is measured from now.
    pub fn new(params: Params) -> Result<Self, DriveCtrlError> {
        params.validate()?;

        let p = &params.pid;
        let int_max = p.integrator_max_factor * p.max_steering;
        let pid = PidController::new(p.k_p, p.k_i, p.k_d)
            .with_output_limits(-p.max_steering, p.max_steering)
            .with_integrator_limits(-int_max, int_max)
            .with_derivative_tau(p.deriv_lowpass_tau);

        Ok(Self {
            detector: BlobDetector::new(params.per.blob.clone()),
            target_est: TargetEstimator::new(params.per.target.clone()),
            target_lp: None,
            ratio: ColorRatio::new(),
            raw_error: 0.0,
            error_lp: LowPass::new(params.per.bearing.error_lowpass_tau, 0.0),
            pid,
            tracker: TurnTracker::new(params.turn.clone()),
            composer: CommandComposer::new(params.compose.clone(), p.max_steering),
            prev_instant: Instant::now(),
            output: DriveCmd::stop(),
            report: StatusReport::default(),
            last_frame: None,
            last_marks: None,
            arch_record: None,
            params,
        })
    }

    /// Run one tick, `dt` seconds after the previous one.
    pub fn decide(&mut self, frame: &Frame, dt: f64) -> (DriveCmd, StatusReport) {
        let per = &self.params.per;

        // ---- PERCEPTION ----

        let classified = classify_frame(frame, &per.classify);
        let (blobs, stats) = self.detector.detect_with_stats(&classified);

        let estimate = self.target_est.update(&blobs, classified.height());
        let raw_target = estimate.map(|e| e.point);
        let filtered_target = match raw_target {
            Some(t) => Some(filter_target(&mut self.target_lp, t, per.target.target_lowpass_tau)),
            None => None,
        };

        let origin = origin_for(classified.width(), classified.height(), &per.bearing);

        let mut bearing = None;
        match per.bearing.strategy {
            ErrorStrategy::ColorRatio => {
                self.raw_error = self.ratio.measure(&classified, &per.bearing);
            }
            ErrorStrategy::GeometricBearing => {
                if let Some(t) = filtered_target {
                    let b = bearing_deg(origin, t);
                    self.raw_error = bearing_error(b, per.bearing.bearing_gain);
                    bearing = Some(b);
                }
            }
        }

        let filtered_error = self.error_lp.filter(self.raw_error);

        // ---- CONTROL ----

        let prediction = predict(self.tracker.history(), &self.params.turn);
        let ff = feed_forward(
            prediction.as_ref(),
            self.tracker.time_in_current(),
            &self.params.compose.feed_forward,
        );

        let error = filtered_error + ff.offset;
        let steering = self.pid.update(error, dt);

        let (cmd, est_speed) = self.composer.compose(steering, ff.boost, dt);
        let current_turn = self.tracker.update(cmd.steering, dt);

        trace!(
            "DriveCtrl: error {:.3} (offset {:.2}), steering {:.3}, throttle {:.3}",
            error,
            ff.offset,
            cmd.steering,
            cmd.throttle
        );

        self.report = StatusReport {
            pid: self.pid.terms(),
            error,
            est_speed,
            boost: ff.boost,
            offset: ff.offset,
            current_turn,
            time_in_current_turn_s: self.tracker.time_in_current(),
            recent_history: self.tracker.history().last_n(REPORT_HISTORY_LEN),
            predicted_turns: prediction,
            raw_target,
            filtered_target,
            target_held: estimate.map(|e| e.held).unwrap_or(false),
            bearing_deg: bearing,
            num_blobs: stats.num_kept,
        };

        self.last_marks = Some(OverlayMarks {
            raw_target,
            filtered_target,
            origin,
            bearing_deg: bearing,
        });
        self.last_frame = Some(classified);
        self.output = cmd;

        (cmd, self.report.clone())
    }

    /// The debug overlay for the last tick, `None` before the first.
    pub fn overlay(&self) -> Option<ClassifiedFrame> {
        match (&self.last_frame, &self.last_marks) {
            (Some(frame), Some(marks)) => Some(annotate(frame, marks, &self.params.per.overlay)),
            _ => None,
        }
    }

    pub fn turn_history(&self) -> &TurnHistory {
        self.tracker.history()
    }

    /// The last command produced.
    pub fn output(&self) -> DriveCmd {
        self.output
    }

    pub fn params(&self) -> &Params {
        &self.params
    }
}

impl State for DriveCtrl {
    type InitData = &'static str;
    type InitError = DriveCtrlError;

    type InputData = InputData;
    type OutputData = DriveCmd;
    type StatusReport = StatusReport;
    type ProcError = Infallible;

    /// Initialise the DriveCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(init_data: Self::InitData, session: &Session) -> Result<Self, Self::InitError> {
        let params: Params = params::load(init_data).map_err(DriveCtrlError::ParamLoadError)?;

        let mut drive_ctrl = Self::new(params)?;

        drive_ctrl.arch_record = Some(
            Archiver::from_path(session, "drive_ctrl/status_report.csv")
                .map_err(DriveCtrlError::ArchiveError)?,
        );

        debug!("DriveCtrl parameters: {:#?}", drive_ctrl.params);

        Ok(drive_ctrl)
    }

    /// Perform cyclic processing of DriveCtrl.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let dt = seconds_between(self.prev_instant, input_data.timestamp);
        self.prev_instant = input_data.timestamp;

        Ok(self.decide(&input_data.frame, dt))
    }
}

impl Archived for DriveCtrl {
    fn write(&mut self) -> Result<(), ArchiveError> {
        let archiver = match self.arch_record {
            Some(ref mut a) => a,
            None => return Ok(()),
        };

        let r = &self.report;
        archiver.serialise(ArchRecord {
            time_s: session::get_elapsed_seconds(),
            throttle: self.output.throttle,
            steering: self.output.steering,
            p: r.pid.p,
            i: r.pid.i,
            d: r.pid.d,
            error: r.error,
            est_speed: r.est_speed,
            boost: r.boost,
            offset: r.offset,
            current_turn: r.current_turn,
            time_in_current_turn_s: r.time_in_current_turn_s,
            recent_history: TurnHistory::format_entries(&r.recent_history),
            predicted_turns: r
                .predicted_turns
                .map(|p| TurnHistory::format_entries(&p))
                .unwrap_or_default(),
            raw_target_x: r.raw_target.map(|t| t.x),
            raw_target_y: r.raw_target.map(|t| t.y),
            filtered_target_x: r.filtered_target.map(|t| t.x),
            filtered_target_y: r.filtered_target.map(|t| t.y),
            bearing_deg: r.bearing_deg,
            num_blobs: r.num_blobs,
        })
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Low pass the target, starting the filters on the first target seen.
fn filter_target(lp: &mut Option<(LowPass, LowPass)>, t: Point2<f64>, tau: f64) -> Point2<f64> {
    match lp {
        Some((x, y)) => Point2::new(x.filter(t.x), y.filter(t.y)),
        None => {
            *lp = Some((LowPass::new(tau, t.x), LowPass::new(tau, t.y)));
            t
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use car_if::eqpt::cam::Rgb;

    const WIDTH: usize = 63;
    const HEIGHT: usize = 48;
    const DT: f64 = 0.05;

    const BLUE: Rgb = Rgb::new(20, 30, 200);
    const GREEN: Rgb = Rgb::new(20, 180, 60);
    const RED: Rgb = Rgb::new(200, 40, 30);
    const DARK: Rgb = Rgb::new(10, 10, 10);

    /// A dark frame with a blue triangle whose single pixel apex is at
    /// `(apex_x, 20)`.
    fn triangle_frame(apex_x: usize) -> Frame {
        let mut frame = Frame::filled(WIDTH, HEIGHT, DARK);
        for y in 20..30 {
            let half = y - 20;
            for x in apex_x.saturating_sub(half)..=(apex_x + half).min(WIDTH - 1) {
                frame.set(x, y, BLUE);
            }
        }
        frame
    }

    fn ctrl() -> DriveCtrl {
        DriveCtrl::new(Params::default()).unwrap()
    }

    #[test]
    fn test_centred_target_gives_no_steering() {
        let mut dc = ctrl();
        let frame = triangle_frame(31);

        let mut last = DriveCmd::stop();
        for _ in 0..40 {
            let (cmd, report) = dc.decide(&frame, DT);
            assert_eq!(report.num_blobs, 1);
            last = cmd;
        }

        assert!(last.steering.abs() < 1e-9);
        assert!(last.throttle >= 0.0 && last.throttle <= 0.275);

        let report = dc.decide(&frame, DT).1;
        let target = report.raw_target.unwrap();
        assert!((target.x - 31.0).abs() < 1e-9);
        assert!((target.y - 20.0).abs() < 1e-9);
        assert!(report.bearing_deg.unwrap().abs() < 1e-6);
        assert_eq!(report.current_turn, TurnLabel::Straight);
        assert!(!report.target_held);
    }

    #[test]
    fn test_centred_flat_topped_block() {
        // Even width frame, the block is centred on x = 31.5 like the origin
        let mut frame = Frame::filled(64, HEIGHT, DARK);
        for y in 20..30 {
            for x in 22..=41 {
                frame.set(x, y, BLUE);
            }
        }

        let mut dc = ctrl();
        let mut last = (DriveCmd::stop(), StatusReport::default());
        for _ in 0..200 {
            last = dc.decide(&frame, DT);
        }
        let (cmd, report) = last;

        let target = report.raw_target.unwrap();
        assert!((target.x - 31.5).abs() < 1e-9);
        assert!(report.bearing_deg.unwrap().abs() < 1e-6);
        assert!(cmd.steering.abs() < 1e-6);
        assert!(cmd.is_valid());
    }

    #[test]
    fn test_target_right_steers_right() {
        let mut dc = ctrl();
        let frame = triangle_frame(50);

        let mut cmd = DriveCmd::stop();
        for _ in 0..20 {
            cmd = dc.decide(&frame, DT).0;
        }
        assert!(cmd.steering < 0.0);
        assert!(cmd.is_valid());

        let mut dc = ctrl();
        let frame = triangle_frame(10);
        for _ in 0..20 {
            cmd = dc.decide(&frame, DT).0;
        }
        assert!(cmd.steering > 0.0);
    }

    #[test]
    fn test_lost_target_is_held() {
        let mut dc = ctrl();
        let frame = triangle_frame(45);

        let mut seen = DriveCmd::stop();
        for _ in 0..20 {
            seen = dc.decide(&frame, DT).0;
        }
        assert!(seen.steering < 0.0);

        let blank = Frame::filled(WIDTH, HEIGHT, DARK);
        for _ in 0..5 {
            let (cmd, report) = dc.decide(&blank, DT);

            // Still steering towards the held target
            assert!(cmd.steering < 0.0);
            assert!(cmd.throttle >= 0.0 && cmd.throttle <= 1.0);
            assert!(report.target_held);
            assert_eq!(report.num_blobs, 0);
        }
    }

    #[test]
    fn test_never_seen_target() {
        let mut dc = ctrl();
        let blank = Frame::filled(WIDTH, HEIGHT, DARK);

        for _ in 0..10 {
            let (cmd, report) = dc.decide(&blank, DT);
            assert_eq!(cmd.steering, 0.0);
            assert!(cmd.is_valid());
            assert_eq!(report.raw_target, None);
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        let mut dc = ctrl();

        for dt in [0.0, -1.0, f64::NAN].iter() {
            let (cmd, _) = dc.decide(&triangle_frame(50), *dt);
            assert!(cmd.is_valid());
        }

        let (cmd, _) = dc.decide(&Frame::empty(), DT);
        assert!(cmd.is_valid());
    }

    #[test]
    fn test_colour_ratio_strategy() {
        let mut params = Params::default();
        params.per.bearing.strategy = ErrorStrategy::ColorRatio;
        let mut dc = DriveCtrl::new(params).unwrap();

        // Mostly green (left marking) below the border rows
        let mut frame = Frame::filled(WIDTH, HEIGHT, DARK);
        for y in 20..HEIGHT {
            for x in 0..WIDTH {
                frame.set(x, y, if x < 45 { GREEN } else { RED });
            }
        }

        let mut cmd = DriveCmd::stop();
        for _ in 0..10 {
            cmd = dc.decide(&frame, DT).0;
        }
        assert!(cmd.steering > 0.0);
    }

    #[test]
    fn test_overlay() {
        let mut dc = ctrl();
        assert!(dc.overlay().is_none());

        dc.decide(&triangle_frame(31), DT);
        let overlay = dc.overlay().unwrap();
        assert_eq!(overlay.width(), WIDTH);
        assert_eq!(overlay.height(), HEIGHT);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mut params = Params::default();
        params.compose.max_throttle = 2.0;
        assert!(matches!(
            DriveCtrl::new(params),
            Err(DriveCtrlError::InvalidParams(_))
        ));
    }
}
