//! Terminal display sink.
//!
//! A minimal `DisplaySink` for running the dashboard without a graphical
//! shell: frames become a one-line ticker, summaries become per-class
//! count lines. Anything fancier plugs in behind the same trait.

use std::io::Write;

use anyhow::{Context, Result};

use crate::detect::Summary;
use crate::display::DisplaySink;
use crate::frame::Frame;

pub struct TerminalSink<W: Write> {
    out: W,
    frames_rendered: u64,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            frames_rendered: 0,
        }
    }
}

impl TerminalSink<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write> DisplaySink for TerminalSink<W> {
    fn render_frame(&mut self, frame: &Frame) -> Result<()> {
        self.frames_rendered += 1;
        // One line every 30 frames keeps the ticker readable at ~30 FPS.
        if self.frames_rendered % 30 == 1 {
            writeln!(
                self.out,
                "frame #{}: {}x{} ({:?})",
                self.frames_rendered,
                frame.width(),
                frame.height(),
                frame.order()
            )
            .context("write frame line")?;
        }
        Ok(())
    }

    fn render_status(&mut self, status: &str) {
        // Status must never fail the loop; swallow write errors here.
        let _ = writeln!(self.out, "status: {status}");
    }

    fn render_summary(&mut self, summary: &Summary) -> Result<()> {
        if summary.total_objects == 0 {
            writeln!(self.out, "  no objects detected").context("write summary")?;
            return Ok(());
        }
        let mut line = format!("  {} objects", summary.total_objects);
        if let Some(avg) = summary.avg_confidence {
            line.push_str(&format!(" (avg confidence {avg:.2})"));
        }
        for (class_name, count) in &summary.classes {
            line.push_str(&format!(", {class_name}: {count}"));
        }
        writeln!(self.out, "{line}").context("write summary")?;
        Ok(())
    }
}
