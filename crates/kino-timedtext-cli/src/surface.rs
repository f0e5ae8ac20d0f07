//! Console render surface
//!
//! Prints every caption add/remove as it happens, as styled text lines or as
//! one JSON render instruction per line.

use crate::output::OutputFormat;
use console::style;
use kino_timedtext::{
    CaptionStyle, CueKey, Placement, Removal, RenderHandle, RenderInstruction, RenderSurface, StyleDescriptor,
};
use std::collections::HashMap;

/// Render surface writing to stdout
pub struct ConsoleSurface {
    format: OutputFormat,
    next_handle: u64,
    visible: HashMap<RenderHandle, CueKey>,
}

impl ConsoleSurface {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            next_handle: 0,
            visible: HashMap::new(),
        }
    }

    fn emit_json(&self, instruction: &RenderInstruction) {
        match serde_json::to_string(instruction) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!(error = %e, "Failed to encode render instruction"),
        }
    }
}

impl RenderSurface for ConsoleSurface {
    fn add_caption(&mut self, source_id: &str, cue_id: &str, content: &str, caption: &CaptionStyle) -> RenderHandle {
        self.next_handle += 1;
        let handle = RenderHandle(self.next_handle);
        self.visible.insert(handle, CueKey::new(source_id, cue_id));

        match self.format {
            OutputFormat::Json => self.emit_json(&RenderInstruction::Add {
                handle,
                source_id: source_id.to_string(),
                cue_id: cue_id.to_string(),
                content: content.to_string(),
                style: caption.clone(),
            }),
            _ => {
                let placement = match caption.placement {
                    Placement::Overlay => "overlay".to_string(),
                    Placement::BelowVideo { bar_height } => format!("below {}px", bar_height),
                };
                let text = content.replace('\n', " / ");
                let text = match caption.text.get("color") {
                    Some("yellow") => style(text).yellow().to_string(),
                    Some("red") => style(text).red().to_string(),
                    _ => text,
                };
                println!(
                    "{} {} [{}] {}",
                    style("+").green().bold(),
                    style(format!("{}#{}", source_id, cue_id)).cyan(),
                    placement,
                    text
                );
            }
        }
        handle
    }

    fn remove_caption(&mut self, handle: RenderHandle, removal: Removal) {
        let key = self.visible.remove(&handle);

        match self.format {
            OutputFormat::Json => self.emit_json(&RenderInstruction::Remove { handle, removal }),
            _ => {
                let how = match removal {
                    Removal::Immediate => "cut".to_string(),
                    Removal::Fade(d) => format!("fade {}ms", d.as_millis()),
                };
                let key = key.map(|k| k.to_string()).unwrap_or_else(|| format!("handle {}", handle.0));
                println!("{} {} ({})", style("-").red().bold(), style(key).dim(), how);
            }
        }
    }

    fn restyle_all(&mut self, restyle: &StyleDescriptor) {
        match self.format {
            OutputFormat::Json => self.emit_json(&RenderInstruction::Restyle {
                style: restyle.clone(),
            }),
            _ => {
                let props: Vec<String> = restyle.0.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                println!("{} restyle {}", style("~").blue().bold(), props.join("; "));
            }
        }
    }
}
