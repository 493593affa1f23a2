//! Console command parsing.

use anyhow::{bail, Context};
use platter_session::Intent;
use platter_types::{ActuatorId, Direction};

/// One line of console input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Intent(Intent),
    Quit,
    Empty,
}

pub const HELP: &str =
    "commands: speed <id> <0-100> | dir <id> fwd|rev | brake <id> on|off | stop | quit";

pub fn parse_line(line: &str) -> anyhow::Result<Line> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Line::Empty);
    };

    let line = match verb {
        "quit" | "exit" => Line::Quit,
        "stop" => Line::Intent(Intent::StopAll),
        "speed" => {
            let id = actuator(words.next())?;
            let speed = words
                .next()
                .context("missing speed")?
                .parse::<u8>()
                .context("speed must be a number between 0 and 255")?;
            Line::Intent(Intent::SetSpeed { id, speed })
        }
        "dir" => {
            let id = actuator(words.next())?;
            let direction = match words.next() {
                Some("fwd" | "forward") => Direction::Forward,
                Some("rev" | "reverse") => Direction::Reverse,
                other => bail!("direction must be fwd or rev, got {other:?}"),
            };
            Line::Intent(Intent::SetDirection { id, direction })
        }
        "brake" => {
            let id = actuator(words.next())?;
            let held = match words.next() {
                Some("on") => true,
                Some("off") => false,
                other => bail!("brake must be on or off, got {other:?}"),
            };
            Line::Intent(Intent::SetBrakeHeld { id, held })
        }
        other => bail!("unknown command {other:?}"),
    };

    if let Some(extra) = words.next() {
        bail!("unexpected argument {extra:?}");
    }
    Ok(line)
}

fn actuator(word: Option<&str>) -> anyhow::Result<ActuatorId> {
    let raw: u8 = word
        .context("missing actuator id")?
        .parse()
        .context("actuator id must be a number")?;
    Ok(ActuatorId::new(raw)?)
}
