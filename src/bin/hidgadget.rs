/* Copyright (C) 2026 by the hidgadget-core contributors
 *
 * This file is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This file is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this file.  If not, see <http://www.gnu.org/licenses/>.
 */

#[macro_use]
extern crate log;

use clap::{App, Arg, SubCommand};
use hidgadget_core::built_info;
use hidgadget_core::emitter::{Emitter, BTN_LEFT, BTN_MIDDLE, BTN_RIGHT};
use hidgadget_core::endpoint::EndpointRegistry;
use hidgadget_core::error::Result;
use hidgadget_core::interp::Interpreter;
use hidgadget_core::script::Script;
use hidgadget_core::tui::Tui;
use hidgadget_core::RUNNING;
use std::env;
use std::sync::atomic::Ordering;

fn setup_logging(long_running: bool) {
    let logger = flexi_logger::Logger::with_env_or_str("warn");
    let result = if long_running {
        logger
            .log_to_file()
            .format(flexi_logger::colored_default_format)
            .format_for_files(flexi_logger::colored_detailed_format)
            .directory(env::temp_dir())
            .rotate(
                flexi_logger::Criterion::Size(1_000_000),
                flexi_logger::Naming::Numbers,
                flexi_logger::Cleanup::KeepLogFiles(5),
            )
            .duplicate_to_stderr(flexi_logger::Duplicate::Warn)
            .start()
    } else {
        logger.format(flexi_logger::colored_default_format).start()
    };
    result.unwrap_or_else(|e| panic!("logger initialization failed: {}", e));
}

fn version_info() -> String {
    format!(
        "{}{} - {}",
        built_info::PKG_VERSION,
        built_info::GIT_VERSION.map_or_else(|| "".to_owned(), |v| format!(" (git {})", v)),
        built_info::PROFILE,
    )
}

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let version = version_info();
    let matches = App::new(built_info::PKG_NAME.to_string())
        .version(version.as_str())
        .author(built_info::PKG_AUTHORS)
        .about(format!("\n{}", built_info::PKG_DESCRIPTION).as_str())
        .subcommand(
            SubCommand::with_name("keyboard")
                .about("Type a character sequence or a single named key")
                .arg(Arg::with_name("hold").long("hold").help("Leave the final key/modifiers latched"))
                .arg(Arg::with_name("release").long("release").help("Emit the all-released report only"))
                .arg(Arg::with_name("args").multiple(true)),
        )
        .subcommand(
            SubCommand::with_name("mouse")
                .about("Issue a single pointer operation")
                .subcommand(
                    SubCommand::with_name("move")
                        .arg(Arg::with_name("x").required(true))
                        .arg(Arg::with_name("y").required(true)),
                )
                .subcommand(SubCommand::with_name("click").arg(Arg::with_name("button").default_value("left")))
                .subcommand(SubCommand::with_name("doubleclick"))
                .subcommand(SubCommand::with_name("down").arg(Arg::with_name("button").default_value("left")))
                .subcommand(SubCommand::with_name("up"))
                .subcommand(
                    SubCommand::with_name("scroll")
                        .arg(Arg::with_name("v").required(true))
                        .arg(Arg::with_name("h")),
                ),
        )
        .subcommand(
            SubCommand::with_name("consumer")
                .about("Tap a named consumer-control action")
                .arg(Arg::with_name("action").required(true)),
        )
        .subcommand(
            SubCommand::with_name("ducky")
                .about("Load and run a DuckyScript-style automation script")
                .arg(Arg::with_name("path").required(true).help("Script path, or - for stdin"))
                .arg(Arg::with_name("os").long("os").short("p").takes_value(true)),
        )
        .subcommand(SubCommand::with_name("tui").about("Run the interactive terminal front-end"))
        .get_matches();

    let is_tui = matches.subcommand_name() == Some("tui");
    setup_logging(is_tui);
    info!("hidgadget {} starting", version);

    let r = RUNNING.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("error installing Ctrl-C handler");

    let registry = EndpointRegistry::discover();
    let emitter = Emitter::new(registry);

    let outcome = match matches.subcommand() {
        ("keyboard", Some(m)) => run_keyboard(&emitter, m),
        ("mouse", Some(m)) => run_mouse(&emitter, m),
        ("consumer", Some(m)) => run_consumer(&emitter, m),
        ("ducky", Some(m)) => run_ducky(&emitter, m),
        ("tui", Some(_)) => Tui::new(&emitter).run(),
        _ => {
            eprintln!("{}", matches.usage());
            return 1;
        }
    };

    match outcome {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {}", e);
            1
        }
    }
}

fn run_keyboard(emitter: &Emitter, m: &clap::ArgMatches) -> Result<()> {
    let hold = m.is_present("hold");
    let release = m.is_present("release");
    let positional: Vec<&str> = m.values_of("args").map(|v| v.collect()).unwrap_or_default();

    // First token counts as an explicit modifier set only if it looks like
    // one (contains a dash and resolves to, or is spelled like, modifier
    // names) — a lone "CTRL" or "DELETE" with no dash is a sequence/named
    // key, not modifiers. See `token_is_explicit_modifiers`.
    let (modifiers, sequence) = match positional.split_first() {
        Some((first, rest)) if hidgadget_core::emitter::token_is_explicit_modifiers(first) => {
            let seq = if rest.is_empty() { None } else { Some(rest.join(" ")) };
            (Some(first.to_string()), seq)
        }
        Some(_) => (None, Some(positional.join(" "))),
        None => (None, None),
    };
    emitter.type_sequence(modifiers.as_deref(), sequence.as_deref(), hold, release)
}

fn parse_button(name: &str) -> u8 {
    match name.to_ascii_lowercase().as_str() {
        "right" => BTN_RIGHT,
        "middle" => BTN_MIDDLE,
        _ => BTN_LEFT,
    }
}

fn run_mouse(emitter: &Emitter, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        ("move", Some(mm)) => {
            let x: i32 = mm.value_of("x").unwrap_or("0").parse().unwrap_or(0);
            let y: i32 = mm.value_of("y").unwrap_or("0").parse().unwrap_or(0);
            emitter.pointer_move(x, y)
        }
        ("click", Some(mm)) => emitter.pointer_click(parse_button(mm.value_of("button").unwrap_or("left"))),
        ("doubleclick", Some(_)) => {
            emitter.pointer_click(BTN_LEFT)?;
            emitter.pointer_click(BTN_LEFT)
        }
        ("down", Some(mm)) => emitter.pointer_press(parse_button(mm.value_of("button").unwrap_or("left"))),
        ("up", Some(_)) => emitter.pointer_release(),
        ("scroll", Some(mm)) => {
            let v: i32 = mm.value_of("v").unwrap_or("0").parse().unwrap_or(0);
            let h: i32 = mm.value_of("h").unwrap_or("0").parse().unwrap_or(0);
            emitter.pointer_scroll(v, h)
        }
        _ => Ok(()),
    }
}

fn run_consumer(emitter: &Emitter, m: &clap::ArgMatches) -> Result<()> {
    let action = m.value_of("action").unwrap_or("");
    emitter.send_consumer_tap(action)
}

/// Companion variables file checked for in the current working directory
/// and preseeded before the main script, matching the original `ducky.c`.
const PRESEED_FILENAME: &str = "ducky_vars.ducky";

fn run_ducky(emitter: &Emitter, m: &clap::ArgMatches) -> Result<()> {
    if let Some(os) = m.value_of("os") {
        env::set_var("TARGET_OS", os);
    }

    let mut interp = Interpreter::new(emitter);

    if std::path::Path::new(PRESEED_FILENAME).is_file() {
        match Script::from_path(std::path::Path::new(PRESEED_FILENAME)) {
            Ok(preseed) => {
                debug!("preseeding variables from {}", PRESEED_FILENAME);
                interp.run(&preseed).map_err(|e| {
                    warn!("preseed script failed: {}", e);
                    e
                })?;
            }
            Err(e) => warn!("could not read {}: {}", PRESEED_FILENAME, e),
        }
    }

    let path = m.value_of("path").unwrap_or("-");
    let script = Script::load(path).map_err(|e| {
        error!("failed to load script {:?}: {}", path, e);
        hidgadget_core::error::HidError::ParseError(format!("{}", e))
    })?;
    interp.run(&script)
}
