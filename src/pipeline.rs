//! Session driver.
//!
//! A reader thread decodes JSON lines into frames and control ops and hands
//! them over a channel. The counting loop is the only writer of the counter
//! state; it checks the cancel token between messages.

use anyhow::Result;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::{
    io::{BufRead, Write},
    sync::mpsc::{self, RecvTimeoutError, Sender},
    thread,
    time::Duration,
};

use crate::cancel::CancelToken;
use crate::config::Profile;
use crate::counter::{Phase, Transition};
use crate::landmarks::PoseFrame;
use crate::processor::{Annotation, FrameOutcome, FrameProcessor};

pub const READY_MESSAGE: &str = "Fitness AI is working!";

const POLL: Duration = Duration::from_millis(50);

pub fn ready_line() -> serde_json::Value {
    serde_json::json!({ "message": READY_MESSAGE })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOp {
    Reset,
    Shutdown,
}

#[derive(Debug)]
enum InputMsg {
    Frame(PoseFrame),
    Control(ControlOp),
    Malformed(String),
}

fn decode_line(line: &[u8]) -> InputMsg {
    let v: serde_json::Value = match serde_json::from_slice(line) {
        Ok(v) => v,
        Err(e) => return InputMsg::Malformed(format!("invalid json: {e}")),
    };
    if let Some(op) = v.get("op") {
        return match op.as_str() {
            Some("reset") => InputMsg::Control(ControlOp::Reset),
            Some("shutdown") => InputMsg::Control(ControlOp::Shutdown),
            _ => InputMsg::Malformed(format!("unknown op: {op}")),
        };
    }
    match serde_json::from_value::<PoseFrame>(v) {
        Ok(f) => InputMsg::Frame(f),
        Err(e) => InputMsg::Malformed(format!("bad frame: {e}")),
    }
}

fn spawn_reader<R>(input: R, tx: Sender<InputMsg>) -> thread::JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || {
        let mut input = input;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match input.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    error!("input read failed: {e}");
                    break;
                }
            }
            // bad bytes are the decoder's problem, not the reader's
            let line = buf.trim_ascii();
            if line.is_empty() {
                continue;
            }
            if tx.send(decode_line(line)).is_err() {
                // counting loop is gone
                break;
            }
        }
    })
}

/// Receives one annotation per processed frame, then the session summary.
pub trait AnnotationSink {
    fn annotate(&mut self, a: &Annotation) -> Result<()>;
    fn finish(&mut self, summary: &SessionSummary) -> Result<()>;
}

pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> AnnotationSink for JsonLinesSink<W> {
    fn annotate(&mut self, a: &Annotation) -> Result<()> {
        writeln!(self.out, "{}", serde_json::to_string(a)?)?;
        self.out.flush()?;
        Ok(())
    }

    fn finish(&mut self, summary: &SessionSummary) -> Result<()> {
        writeln!(self.out, "{}", serde_json::json!({ "summary": summary }))?;
        self.out.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSummary {
    pub profile: String,
    pub final_count: u32,
    pub final_phase: Phase,
    pub frames_received: u64,
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub frames_dropped: u64,
    pub malformed_lines: u64,
    pub resets: u32,
    pub cancelled: bool,
}

/// Run one counting session until the input ends, a `shutdown` op arrives or
/// `cancel` fires. Every session starts from zero reps.
pub fn run_session<R, S>(
    profile: &Profile,
    input: R,
    sink: &mut S,
    cancel: &CancelToken,
) -> Result<SessionSummary>
where
    R: BufRead + Send + 'static,
    S: AnnotationSink + ?Sized,
{
    let mut processor = FrameProcessor::from_profile(profile);
    let mut summary = SessionSummary {
        profile: profile.display_name().to_string(),
        ..Default::default()
    };
    info!(
        "session: profile '{}', joint {}, down < {} / up > {}, every {} frame(s), confidence >= {}",
        summary.profile,
        profile.joint,
        profile.thresholds.down,
        profile.thresholds.up,
        profile.capture.frame_skip,
        profile.capture.min_confidence,
    );

    let (tx, rx) = mpsc::channel::<InputMsg>();
    let _reader = spawn_reader(input, tx);

    loop {
        if cancel.is_cancelled() {
            info!("session: cancelled");
            summary.cancelled = true;
            break;
        }

        let msg = match rx.recv_timeout(POLL) {
            Ok(m) => m,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("session: input exhausted");
                break;
            }
        };

        match msg {
            InputMsg::Frame(frame) => match processor.process(&frame) {
                FrameOutcome::Processed(a) => {
                    summary.frames_processed += 1;
                    match a.transitioned {
                        Transition::RepCompleted { new_count } => {
                            info!("rep {new_count} completed (angle {:.1})", a.angle_degrees)
                        }
                        Transition::EnteredDown => {
                            debug!("entered down (angle {:.1})", a.angle_degrees)
                        }
                        Transition::NoTransition => {}
                    }
                    sink.annotate(&a)?;
                }
                FrameOutcome::Skipped => summary.frames_skipped += 1,
                FrameOutcome::Dropped(_) => summary.frames_dropped += 1,
            },
            InputMsg::Control(ControlOp::Reset) => {
                let before = processor.snapshot();
                processor.reset();
                summary.resets += 1;
                info!("session: reset (was {} reps)", before.count);
            }
            InputMsg::Control(ControlOp::Shutdown) => {
                info!("session: shutdown requested");
                break;
            }
            InputMsg::Malformed(why) => {
                summary.malformed_lines += 1;
                warn!("dropping input line: {why}");
            }
        }
    }

    let last = processor.snapshot();
    summary.final_count = last.count;
    summary.final_phase = last.phase;
    summary.frames_received = processor.frames_seen();
    info!(
        "session: {} reps over {} frames ({} processed, {} dropped)",
        summary.final_count,
        summary.frames_received,
        summary.frames_processed,
        summary.frames_dropped
    );
    sink.finish(&summary)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::tests::leg;
    use std::io::Cursor;

    fn every_frame_profile() -> Profile {
        let mut p = Profile::bundled_default().unwrap();
        p.capture.frame_skip = 1;
        p
    }

    fn frame_line(deg: f32) -> String {
        serde_json::to_string(&leg(deg)).unwrap()
    }

    fn run(profile: &Profile, lines: &[String]) -> (SessionSummary, Vec<serde_json::Value>) {
        let input = Cursor::new(lines.join("\n").into_bytes());
        let mut sink = JsonLinesSink::new(Vec::new());
        let summary = run_session(profile, input, &mut sink, &CancelToken::new()).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        let values = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (summary, values)
    }

    #[test]
    fn decodes_control_ops_and_frames() {
        assert!(matches!(decode_line(br#"{"op":"reset"}"#), InputMsg::Control(ControlOp::Reset)));
        assert!(matches!(
            decode_line(br#"{"op":"shutdown"}"#),
            InputMsg::Control(ControlOp::Shutdown)
        ));
        assert!(matches!(decode_line(br#"{"op":"dance"}"#), InputMsg::Malformed(_)));
        assert!(matches!(decode_line(b"not json"), InputMsg::Malformed(_)));
        assert!(matches!(decode_line(br#"{"landmarks":"x"}"#), InputMsg::Malformed(_)));
        assert!(matches!(decode_line(br#"{"landmarks":null}"#), InputMsg::Frame(_)));
    }

    #[test]
    fn counts_reps_and_emits_annotations() {
        let lines: Vec<String> = [170.0, 80.0, 120.0, 170.0, 85.0, 165.0]
            .into_iter()
            .map(frame_line)
            .collect();
        let (summary, out) = run(&every_frame_profile(), &lines);

        assert_eq!(summary.final_count, 2);
        assert_eq!(summary.final_phase, Phase::Up);
        assert_eq!(summary.frames_processed, 6);
        assert!(!summary.cancelled);

        assert_eq!(out.len(), 7);
        assert_eq!(out[1]["phase"], "down");
        assert_eq!(out[1]["transitioned"]["kind"], "entered_down");
        assert_eq!(out[3]["transitioned"]["kind"], "rep_completed");
        assert_eq!(out[3]["transitioned"]["new_count"], 1);
        assert_eq!(out[5]["rep_count"], 2);
        assert_eq!(out[6]["summary"]["final_count"], 2);
    }

    #[test]
    fn bad_lines_are_dropped_not_fatal() {
        let lines = vec![
            frame_line(80.0),
            "garbage".to_string(),
            r#"{"landmarks":null}"#.to_string(),
            String::new(),
            frame_line(170.0),
        ];
        let (summary, out) = run(&every_frame_profile(), &lines);
        assert_eq!(summary.final_count, 1);
        assert_eq!(summary.malformed_lines, 1);
        assert_eq!(summary.frames_dropped, 1);
        assert_eq!(summary.frames_received, 3);
        // two annotations plus the summary
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn non_utf8_line_does_not_end_the_session() {
        let mut bytes = frame_line(80.0).into_bytes();
        bytes.extend_from_slice(b"\n\xff\xfe garbage\n");
        bytes.extend_from_slice(frame_line(170.0).as_bytes());
        let mut sink = JsonLinesSink::new(Vec::new());
        let summary = run_session(
            &every_frame_profile(),
            Cursor::new(bytes),
            &mut sink,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(summary.malformed_lines, 1);
        assert_eq!(summary.frames_received, 2);
        assert_eq!(summary.final_count, 1);
        assert_eq!(summary.final_phase, Phase::Up);
    }

    #[test]
    fn reset_op_zeroes_the_session() {
        let lines = vec![
            frame_line(80.0),
            frame_line(170.0),
            r#"{"op":"reset"}"#.to_string(),
            frame_line(170.0),
        ];
        let (summary, out) = run(&every_frame_profile(), &lines);
        assert_eq!(summary.resets, 1);
        assert_eq!(summary.final_count, 0);
        assert_eq!(summary.final_phase, Phase::Unknown);
        assert_eq!(out[2]["rep_count"], 0);
    }

    #[test]
    fn shutdown_op_stops_early() {
        let lines = vec![
            frame_line(80.0),
            r#"{"op":"shutdown"}"#.to_string(),
            frame_line(170.0),
        ];
        let (summary, _) = run(&every_frame_profile(), &lines);
        assert_eq!(summary.frames_received, 1);
        assert_eq!(summary.final_count, 0);
        assert_eq!(summary.final_phase, Phase::Down);
    }

    #[test]
    fn honours_frame_skip_from_profile() {
        let profile = Profile::bundled_default().unwrap();
        let lines: Vec<String> = [80.0, 80.0, 80.0, 170.0, 170.0, 170.0]
            .into_iter()
            .map(frame_line)
            .collect();
        let (summary, _) = run(&profile, &lines);
        assert_eq!(summary.frames_processed, 2);
        assert_eq!(summary.frames_skipped, 4);
        assert_eq!(summary.final_count, 1);
    }

    #[test]
    fn cancelled_token_stops_before_any_frame() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let input = Cursor::new(frame_line(80.0).into_bytes());
        let mut sink = JsonLinesSink::new(Vec::new());
        let summary =
            run_session(&every_frame_profile(), input, &mut sink, &cancel).unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.frames_received, 0);
    }

    #[test]
    fn ready_line_shape() {
        assert_eq!(
            ready_line().to_string(),
            r#"{"message":"Fitness AI is working!"}"#
        );
    }
}
