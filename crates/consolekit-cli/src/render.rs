use consolekit_client::{Console, ConsoleUpdate, NoticeLevel};
use consolekit_core::{EntryKind, ToolStatus, TranscriptEntry};
use std::io::{self, Write};

/// Prints transcript changes as they arrive.
///
/// Entries only grow at their tail, so for each position we remember how
/// much is already on screen and print the rest. Updates may be rendered
/// after several reconciliation steps, so every entry is drawn from its
/// current state rather than from the update that announced it, as long as
/// the entry the update names still holds that position.
#[derive(Debug, Default)]
pub struct Renderer {
    shown: Vec<Shown>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Shown {
    bytes: usize,
    started: bool,
    finished: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(
        &mut self,
        console: &Console,
        update: &ConsoleUpdate,
        out: &mut impl Write,
    ) -> io::Result<()> {
        match update {
            ConsoleUpdate::EntryAppended { index, id } | ConsoleUpdate::EntryUpdated { index, id } => {
                // Positions are reused after a reset; skip updates for entries that are gone.
                if let Some(entry) = console.entry(*index).filter(|e| e.id == *id) {
                    self.render_entry(*index, &entry, out)?;
                }
            }
            ConsoleUpdate::Cleared => {
                self.shown.clear();
                writeln!(out, "--- new session ---")?;
            }
            ConsoleUpdate::SessionBound { session_id } => {
                writeln!(out, "[session {session_id}]")?;
            }
            ConsoleUpdate::Notice(notice) => {
                let tag = match notice.level {
                    NoticeLevel::Success => "ok",
                    NoticeLevel::Error => "error",
                };
                writeln!(out, "[{tag}] {}", notice.message)?;
            }
            ConsoleUpdate::PhaseChanged { .. } => {}
        }
        out.flush()
    }

    fn render_entry(
        &mut self,
        index: usize,
        entry: &TranscriptEntry,
        out: &mut impl Write,
    ) -> io::Result<()> {
        if self.shown.len() <= index {
            self.shown.resize(index + 1, Shown::default());
        }
        let shown = &mut self.shown[index];
        if shown.finished {
            return Ok(());
        }
        let name = entry.tool_name.as_deref().unwrap_or("tool");

        match entry.kind {
            EntryKind::User => {
                writeln!(out, "> {}", entry.content)?;
                shown.finished = true;
            }
            EntryKind::Assistant => {
                let rest = entry.content.get(shown.bytes..).unwrap_or_default();
                write!(out, "{rest}")?;
                shown.bytes = entry.content.len();
                if entry.done == Some(true) {
                    writeln!(out)?;
                    shown.finished = true;
                }
            }
            EntryKind::ToolCall => {
                if !shown.started {
                    writeln!(out, "[tool {name}] running {}", one_line(&entry.content))?;
                }
            }
            EntryKind::ToolResult => {
                if !shown.started {
                    writeln!(out, "[tool {name}] running {}", one_line(&entry.content))?;
                }
                let (status, result) = match &entry.metadata {
                    Some(meta) => (
                        meta.status,
                        meta.result.as_ref().map(render_result).unwrap_or_default(),
                    ),
                    None => (ToolStatus::Success, String::new()),
                };
                let label = if status == ToolStatus::Error { "failed" } else { "done" };
                writeln!(out, "[tool {name}] {label}: {}", one_line(&result))?;
                shown.finished = true;
            }
        }
        shown.started = true;
        Ok(())
    }
}

fn render_result(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
