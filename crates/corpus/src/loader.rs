use std::collections::BTreeMap;
use std::path::Path;

use disfl_annotation::{Markup, Record, Snapshot, SpeakerKey, SpeakerRecords, SpeakerSnapshots};

use crate::error::Error;

/// Load a gold transcript: tab-separated rows
/// `interval_ID  start  end  word  POS  markup`, where the interval id is
/// `{dialogue}:{speaker}:{index}`. Blank lines separate dialogues.
pub fn load_gold(path: &Path) -> Result<SpeakerRecords, Error> {
    load_records(path)
}

/// Load a one-shot hypothesis file. Same row shape as the gold transcript,
/// one complete annotation pass per speaker.
pub fn load_final_hypothesis(path: &Path) -> Result<SpeakerRecords, Error> {
    load_records(path)
}

fn load_records(path: &Path) -> Result<SpeakerRecords, Error> {
    let path_str = path.display().to_string();
    let contents = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path_str.clone(),
        source,
    })?;

    let mut speakers = SpeakerRecords::new();
    for (number, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let (speaker, record) = parse_row(line, &path_str, number + 1)?;
        speakers.entry(speaker).or_default().push(record);
    }

    tracing::debug!(path = %path_str, speakers = speakers.len(), "loaded transcript");
    Ok(speakers)
}

/// Load an increco stream: blocks headed by `Time: <float>`, each followed
/// by the rows that became available (or were re-labelled) at that time.
/// Rows within a block are grouped per speaker into one snapshot.
pub fn load_increco(path: &Path) -> Result<SpeakerSnapshots, Error> {
    let path_str = path.display().to_string();
    let contents = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path_str.clone(),
        source,
    })?;

    let mut snapshots = SpeakerSnapshots::new();
    let mut block: Option<(f64, Vec<(SpeakerKey, Record)>)> = None;

    for (number, line) in contents.lines().enumerate() {
        let number = number + 1;
        if line.trim().is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("Time:") {
            if let Some((time, rows)) = block.take() {
                flush_block(time, rows, &mut snapshots);
            }
            let time = rest
                .trim()
                .parse::<f64>()
                .map_err(|_| Error::UpdateHeader {
                    path: path_str.clone(),
                    line: number,
                    header: line.to_string(),
                })?;
            block = Some((time, Vec::new()));
        } else {
            let row = parse_row(line, &path_str, number)?;
            match block.as_mut() {
                Some((_, rows)) => rows.push(row),
                None => {
                    return Err(Error::RowOutsideUpdate {
                        path: path_str,
                        line: number,
                    });
                }
            }
        }
    }
    if let Some((time, rows)) = block {
        flush_block(time, rows, &mut snapshots);
    }

    tracing::debug!(path = %path_str, speakers = snapshots.len(), "loaded increco stream");
    Ok(snapshots)
}

fn flush_block(time: f64, rows: Vec<(SpeakerKey, Record)>, snapshots: &mut SpeakerSnapshots) {
    let mut by_speaker: BTreeMap<SpeakerKey, Vec<Record>> = BTreeMap::new();
    for (speaker, record) in rows {
        by_speaker.entry(speaker).or_default().push(record);
    }
    for (speaker, rows) in by_speaker {
        snapshots
            .entry(speaker)
            .or_default()
            .push(Snapshot { time, rows });
    }
}

fn parse_row(line: &str, path: &str, number: usize) -> Result<(SpeakerKey, Record), Error> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 6 {
        return Err(Error::FieldCount {
            path: path.to_string(),
            line: number,
            found: fields.len(),
        });
    }

    let (speaker, index) =
        parse_interval_id(fields[0].trim()).ok_or_else(|| Error::IntervalId {
            path: path.to_string(),
            line: number,
            id: fields[0].trim().to_string(),
        })?;
    let start = parse_seconds(fields[1], path, number)?;
    let end = parse_seconds(fields[2], path, number)?;
    let markup = Markup::parse(fields[5].trim()).map_err(|source| Error::Markup {
        path: path.to_string(),
        line: number,
        source,
    })?;

    Ok((
        speaker,
        Record {
            index,
            start,
            end,
            word: fields[3].trim().to_string(),
            pos: fields[4].trim().to_string(),
            markup,
        },
    ))
}

fn parse_seconds(field: &str, path: &str, number: usize) -> Result<f64, Error> {
    field.trim().parse::<f64>().map_err(|_| Error::Timing {
        path: path.to_string(),
        line: number,
        value: field.trim().to_string(),
    })
}

/// `{dialogue}:{speaker}:{index}`, split from the right so a dialogue name
/// may itself contain colons.
fn parse_interval_id(raw: &str) -> Option<(SpeakerKey, u32)> {
    let mut parts = raw.rsplitn(3, ':');
    let index = parts.next()?.parse::<u32>().ok()?;
    let speaker = parts.next()?;
    let dialogue = parts.next()?;
    if dialogue.is_empty() || speaker.is_empty() {
        return None;
    }
    Some((SpeakerKey::new(dialogue, speaker), index))
}
