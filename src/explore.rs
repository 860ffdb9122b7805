use std::io::{BufRead, Write};

use tracing::debug;

use crate::config::DataSources;
use crate::coverage;
use crate::loader::TableCache;
use crate::report;

const HELP: &str = "\
commands:
  completion        overall completion
  regions           coverage by region
  region <GRE>      select a region and list its hubs
  hub <POLO>        show records of a hub in the selected region
  help              show this message
  quit              leave";

enum Command<'a> {
    Completion,
    Regions,
    Region(&'a str),
    Hub(&'a str),
    Help,
    Quit,
    Unknown(&'a str),
}

fn parse(line: &str) -> Option<Command<'_>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map(|(word, rest)| (word, rest.trim()))
        .unwrap_or((line, ""));

    Some(match (word, rest) {
        ("completion", "") => Command::Completion,
        ("regions", "") => Command::Regions,
        ("region", name) if !name.is_empty() => Command::Region(name),
        ("hub", name) if !name.is_empty() => Command::Hub(name),
        ("help", _) => Command::Help,
        ("quit" | "exit", _) => Command::Quit,
        _ => Command::Unknown(line),
    })
}

/// Line-driven drill-down from region to hub. Every selection recomputes
/// from the cached tables.
pub fn run<R: BufRead, W: Write>(
    sources: &DataSources,
    cache: &mut TableCache,
    input: R,
    mut output: W,
) -> anyhow::Result<()> {
    let mut region: Option<String> = None;
    writeln!(output, "{HELP}")?;

    let mut lines = input.lines();
    loop {
        write!(output, "{}> ", region.as_deref().unwrap_or(""))?;
        output.flush()?;

        let Some(line) = lines.next() else {
            writeln!(output)?;
            break;
        };
        let line = line?;
        let Some(command) = parse(&line) else {
            continue;
        };

        match command {
            Command::Completion => {
                let tables = sources.load(cache)?;
                let value = coverage::completion_percentage(&tables.coordinators, &tables.totals);
                writeln!(output, "{}", report::progress_bar(value))?;
            }
            Command::Regions => {
                let tables = sources.load(cache)?;
                let rows = coverage::summarize_regions(&tables.coordinators, &tables.totals)?;
                write!(output, "{}", report::render_coverage("GRE", &rows))?;
            }
            Command::Region(name) => {
                let tables = sources.load(cache)?;
                let rows = coverage::summarize_hubs(&tables.coordinators, &tables.totals, name)?;
                if rows.is_empty() {
                    writeln!(output, "no hubs found for region {name}")?;
                } else {
                    debug!(region = name, hubs = rows.len(), "selected region");
                    write!(output, "{}", report::render_coverage("Hub", &rows))?;
                    region = Some(name.to_string());
                }
            }
            Command::Hub(name) => {
                let Some(selected) = region.as_deref() else {
                    writeln!(output, "select a region first")?;
                    continue;
                };
                let tables = sources.load(cache)?;
                let (coordinators, totals) = (&*tables.coordinators, &*tables.totals);
                let status = coverage::hub_status(coordinators, totals, selected, name)?;
                let details = coverage::school_details(coordinators, totals, selected, name)?;
                write!(output, "{}", report::render_status(&status))?;
                writeln!(output)?;
                write!(output, "{}", report::render_details(&details))?;
            }
            Command::Help => writeln!(output, "{HELP}")?,
            Command::Quit => break,
            Command::Unknown(line) => writeln!(output, "unknown command: {line} (try help)")?,
        }
    }

    Ok(())
}
