use crate::fit::{FitResult, FitStep};
use crate::types::Margins;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// JSON-lines diagnostics for the fit loop, one object per line.
#[derive(Clone)]
pub(crate) struct DebugLogger {
    inner: Arc<Mutex<DebugState>>,
}

struct DebugState {
    writer: BufWriter<File>,
    counters: HashMap<String, u64>,
}

impl DebugLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(DebugState {
                writer: BufWriter::new(file),
                counters: HashMap::new(),
            })),
        })
    }

    pub fn log_json(&self, json: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn increment(&self, key: &str, amount: u64) {
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.counters.entry(key.to_string()).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    pub fn log_fit_step(&self, invoice_no: &str, step: &FitStep) {
        let json = format!(
            "{{\"type\":\"fit.step\",\"invoice\":\"{}\",\"iteration\":{},\"action\":\"{}\",\"font_pt\":{:.3},\"row_mm\":{:.3},\"margins_mm\":{},\"table_mm\":{:.3},\"available_mm\":{:.3}}}",
            json_escape(invoice_no),
            step.iteration,
            step.action.as_str(),
            step.font_size.to_f32(),
            step.row_height.to_mm(),
            margins_json(&step.margins),
            step.table_height.to_mm(),
            step.available_height.to_mm()
        );
        self.log_json(&json);
        self.increment(&format!("fit.{}", step.action.as_str()), 1);
    }

    pub fn log_fit_result(&self, invoice_no: &str, rows: usize, result: &FitResult) {
        let json = format!(
            "{{\"type\":\"fit.result\",\"invoice\":\"{}\",\"rows\":{},\"iterations\":{},\"degraded\":{},\"font_pt\":{:.3},\"row_mm\":{:.3},\"margins_mm\":{},\"table_mm\":{:.3},\"available_mm\":{:.3}}}",
            json_escape(invoice_no),
            rows,
            result.iterations(),
            if result.is_degraded() { "true" } else { "false" },
            result.state.font_size.to_f32(),
            result.state.row_height.to_mm(),
            margins_json(&result.state.margins),
            result.metrics.total().to_mm(),
            result.available_height.to_mm()
        );
        self.log_json(&json);
        self.increment("fit.renders", 1);
        if result.is_degraded() {
            self.increment("fit.degraded", 1);
        }
    }

    pub fn emit_summary(&self, context: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let mut counters: Vec<(String, u64)> = state.counters.drain().collect();
            counters.sort_by(|a, b| a.0.cmp(&b.0));
            let counts_json = if counters.is_empty() {
                "{}".to_string()
            } else {
                let mut out = String::from("{");
                for (idx, (key, value)) in counters.iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    out.push_str(&format!("\"{}\":{}", json_escape(key), value));
                }
                out.push('}');
                out
            };
            let json = format!(
                "{{\"type\":\"debug.summary\",\"context\":\"{}\",\"counts\":{}}}",
                json_escape(context),
                counts_json
            );
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

fn margins_json(margins: &Margins) -> String {
    format!(
        "[{:.3},{:.3},{:.3},{:.3}]",
        margins.top.to_mm(),
        margins.right.to_mm(),
        margins.bottom.to_mm(),
        margins.left.to_mm()
    )
}

pub(crate) fn json_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}
