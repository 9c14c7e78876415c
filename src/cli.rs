use anyhow::{Result, anyhow};
use log::warn;
use pico_args::Arguments;
use std::{
    env,
    fs::File,
    io::{self, BufReader, Write},
    path::PathBuf,
};

use crate::cancel::CancelToken;
use crate::config::{ConfigState, Profile};
use crate::counter::RepCounter;
use crate::geometry::{Point2D, angle_at};
use crate::pipeline::{self, JsonLinesSink};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("run") => {
            let input: Option<PathBuf> = pargs.opt_value_from_str("--input")?;
            let profile = resolve_profile(&mut pargs)?;
            warn_leftovers(pargs);
            run_session(&profile, input)
        }

        Some("health") => {
            println!("{}", pipeline::ready_line());
            Ok(())
        }

        Some("angle") => {
            let mut coords = [0f32; 6];
            for c in coords.iter_mut() {
                *c = pargs
                    .free_from_str()
                    .map_err(|_| anyhow!("usage: repctl angle <px> <py> <vx> <vy> <dx> <dy>"))?;
            }
            let [px, py, vx, vy, dx, dy] = coords;
            let a = angle_at(Point2D::new(px, py), Point2D::new(vx, vy), Point2D::new(dx, dy));
            println!("{:.2}", a.degrees());
            Ok(())
        }

        Some("replay") => {
            let profile = resolve_profile(&mut pargs)?;
            let mut angles = Vec::new();
            while let Some(a) = pargs.opt_free_from_str::<f32>()? {
                angles.push(a);
            }
            if angles.is_empty() {
                return Err(anyhow!("usage: repctl replay [--profile <name>] <angle>..."));
            }
            let (state, events) = RepCounter::new(profile.thresholds).replay(angles)?;
            print_response(&serde_json::json!({
                "phase": state.phase,
                "rep_count": state.count,
                "transitions": events,
            }));
            Ok(())
        }

        Some("list") => {
            let cfg = ConfigState::load_or_install_default()?;
            print_response(&serde_json::json!({
                "profiles": cfg.list_profiles(),
                "active": cfg.active_name,
            }));
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: repctl use <profile_name>"))?;
            let mut cfg = ConfigState::load_or_install_default()?;
            cfg.set_active(&name)?;
            print_response(&serde_json::json!({"ok": true, "active_profile": cfg.active_name}));
            Ok(())
        }

        Some("check") => {
            let mut cfg = ConfigState::load_or_install_default()?;
            if let Some(name) = pargs.opt_value_from_str::<_, String>("--profile")? {
                cfg.select(&name)?;
            }
            print_response(&cfg.paths_report());
            Ok(())
        }

        Some("reload") => {
            let mut cfg = ConfigState::load_or_install_default()?;
            cfg.reload()?;
            print_response(&serde_json::json!({"ok": true, "active_profile": cfg.active_name}));
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

/// `--profile-file <path>` wins over `--profile <name>`, which wins over the
/// active profile.
fn resolve_profile(pargs: &mut Arguments) -> Result<Profile> {
    let file: Option<PathBuf> = pargs.opt_value_from_str("--profile-file")?;
    let name: Option<String> = pargs.opt_value_from_str("--profile")?;
    if let Some(path) = file {
        return Profile::load_file(&path);
    }
    let mut cfg = ConfigState::load_or_install_default()?;
    if let Some(name) = name {
        cfg.select(&name)?;
    }
    Ok(cfg.profile)
}

fn run_session(profile: &Profile, input: Option<PathBuf>) -> Result<()> {
    let cancel = CancelToken::new();
    cancel.on_signals()?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", pipeline::ready_line())?;
    out.flush()?;

    let mut sink = JsonLinesSink::new(out);
    match input {
        Some(path) => {
            let f = File::open(&path)
                .map_err(|e| anyhow!("failed to open {}: {e}", path.display()))?;
            pipeline::run_session(profile, BufReader::new(f), &mut sink, &cancel)?;
        }
        None => {
            pipeline::run_session(profile, BufReader::new(io::stdin()), &mut sink, &cancel)?;
        }
    }
    Ok(())
}

fn warn_leftovers(pargs: Arguments) {
    let rest = pargs.finish();
    if !rest.is_empty() {
        warn!("ignoring unexpected arguments: {rest:?}");
    }
}

fn print_help() {
    println!(
        r#"repctl — joint-angle repetition counter

USAGE:
  repctl help [command]                   Show general or command-specific help
  repctl run [--input <file>]             Count reps from a JSON-lines pose stream
             [--profile <name> | --profile-file <path>]
  repctl replay <angle>...                Fold recorded angles through the counter
  repctl angle <px> <py> <vx> <vy> <dx> <dy>
                                          Angle at the vertex, in degrees
  repctl list                             List profiles
  repctl use <name>                       Switch active profile
  repctl reload                           Re-read and validate the active profile
  repctl check [--profile <name>]         Validate a profile and show paths
  repctl health                           Print the readiness message

TIPS:
  - Profiles: ~/.config/repctl/profiles
  - Active profile pointer: ~/.config/repctl/active
  - Logging: RUST_LOG=debug repctl run ...
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "run" => println!(
            "usage: repctl run [--input <file>] [--profile <name> | --profile-file <path>]\n\
             Reads one JSON object per line: a pose frame {{\"landmarks\": [...]}} or a\n\
             control op {{\"op\": \"reset\"}} / {{\"op\": \"shutdown\"}}. Writes one annotation\n\
             per processed frame and a final summary. Stops on EOF, shutdown or Ctrl-C."
        ),
        "replay" => println!(
            "usage: repctl replay [--profile <name>] <angle>...\n\
             Prints the final phase, count and each transition."
        ),
        "angle" => println!(
            "usage: repctl angle <px> <py> <vx> <vy> <dx> <dy>\n\
             Angle at (vx, vy) between the other two points."
        ),
        "list" => println!("usage: repctl list\nLists available profiles and the active one."),
        "use" => println!("usage: repctl use <name>\nMakes <name> the active profile."),
        "check" => println!(
            "usage: repctl check [--profile <name>]\nValidates the profile and prints config paths."
        ),
        "reload" => println!(
            "usage: repctl reload\nRe-reads the active pointer and profile; reports parse errors."
        ),
        "health" => println!("usage: repctl health\nPrints the readiness message and exits."),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
