//! Driving a research loop from the terminal or from snapshot files.
use anyhow::{Context, Result, bail};
use sift_common::SiftError;
use sift_research::{Advance, PipelineOutput, ResearchLoop, Resume, RunSnapshot, Suspension};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

pub fn load_snapshot(path: &Path) -> Result<RunSnapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid snapshot {}", path.display()))
}

/// Write via a sibling temp file so a crash never leaves half a snapshot.
pub fn save_snapshot(path: &Path, snapshot: &RunSnapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json).with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move snapshot into {}", path.display()))?;
    tracing::debug!(path = %path.display(), run_id = %snapshot.run_id, "app.snapshot.saved");
    Ok(())
}

/// `y`/`yes` approve, `n`/`no` reject, anything else asks again.
pub fn parse_approval(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

async fn read_line<R>(input: &mut R, cancel: &CancellationToken) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(SiftError::Cancelled.into()),
        n = input.read_line(&mut line) => n?,
    };
    if read == 0 {
        bail!("input closed before the run finished");
    }
    Ok(line)
}

/// Answer every suspension from `input` until the run completes.
pub async fn drive_interactive<R, W>(
    run: &mut ResearchLoop,
    input: &mut R,
    out: &mut W,
    cancel: &CancellationToken,
) -> Result<PipelineOutput>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut resume = None;
    loop {
        match run.advance(resume.take(), cancel).await? {
            Advance::Completed(output) => return Ok(output),
            Advance::Suspended(Suspension::Query { message }) => {
                write!(out, "{} ", message.query)?;
                out.flush()?;
                let query = read_line(input, cancel).await?;
                resume = Some(Resume::Query {
                    query: query.trim().to_string(),
                });
            }
            Advance::Suspended(Suspension::Approval { message, summary }) => {
                writeln!(out, "{summary}\n")?;
                let approved = loop {
                    write!(out, "{message}")?;
                    out.flush()?;
                    if let Some(answer) = parse_approval(&read_line(input, cancel).await?) {
                        break answer;
                    }
                };
                resume = Some(Resume::Approval { approved });
            }
        }
    }
}

/// One `advance` for `start`/`resume`, persisting whatever state is committed
/// afterwards, cancelled runs included.
pub async fn step_and_save(
    run: &mut ResearchLoop,
    resume: Option<Resume>,
    cancel: &CancellationToken,
    state: &Path,
) -> Result<Advance> {
    let advanced = run.advance(resume, cancel).await;
    save_snapshot(state, run.snapshot())?;
    match advanced {
        Ok(a) => Ok(a),
        Err(SiftError::Cancelled) => {
            bail!("run cancelled; last state saved to {}", state.display())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn render_report<W: Write>(out: &mut W, output: &PipelineOutput) -> Result<()> {
    writeln!(out, "{}", output.report.trim_end())?;
    if !output.sources.is_empty() {
        writeln!(out, "\nSources:")?;
        for s in &output.sources {
            match &s.title {
                Some(title) => writeln!(out, "[{}] {} - {}", s.index, title, s.url)?,
                None => writeln!(out, "[{}] {}", s.index, s.url)?,
            }
        }
    }
    Ok(())
}
