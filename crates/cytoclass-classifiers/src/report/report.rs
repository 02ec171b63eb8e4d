use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use maud::{html, Markup, PreEscaped, DOCTYPE};
use plotly::Plot;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.12.1.min.js";

/// A titled block of HTML content and plotly figures.
pub struct ReportSection {
    title: String,
    blocks: Vec<Markup>,
}

impl ReportSection {
    pub fn new(title: &str) -> Self {
        ReportSection {
            title: title.to_string(),
            blocks: Vec::new(),
        }
    }

    pub fn add_content(&mut self, content: Markup) {
        self.blocks.push(content);
    }

    pub fn add_plot(&mut self, plot: Plot) {
        let div_id = format!("plot-{}-{}", slug(&self.title), self.blocks.len());
        self.blocks.push(html! {
            div class="plot" { (PreEscaped(plot.to_inline_html(Some(div_id.as_str())))) }
        });
    }

    /// Render `text` verbatim in a monospaced block.
    pub fn add_preformatted(&mut self, text: &str) {
        self.blocks.push(html! { pre class="code-container" { (text) } });
    }

    fn render(&self) -> Markup {
        html! {
            section id=(slug(&self.title)) {
                h2 { (self.title) }
                @for block in &self.blocks {
                    (block)
                }
            }
        }
    }
}

fn slug(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

/// Self-contained HTML report, timestamped at creation.
pub struct Report {
    name: String,
    version: String,
    title: String,
    generated: String,
    sections: Vec<ReportSection>,
}

impl Report {
    pub fn new(name: &str, version: &str, title: &str) -> Self {
        Report {
            name: name.to_string(),
            version: version.to_string(),
            title: title.to_string(),
            generated: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            sections: Vec::new(),
        }
    }

    pub fn add_section(&mut self, section: ReportSection) {
        self.sections.push(section);
    }

    pub fn render(&self) -> String {
        let page = html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="utf-8";
                    title { (self.title) }
                    script src=(PLOTLY_CDN) {}
                    style {
                        "body { font-family: sans-serif; margin: 2em auto; max-width: 1100px; }
                        nav a { margin-right: 1em; }
                        .plot { margin: 1em 0; }
                        .code-container { background-color: #f5f5f5; padding: 10px;
                            border-radius: 5px; overflow-x: auto; white-space: pre; }
                        table { border-collapse: collapse; }
                        td, th { border: 1px solid #ccc; padding: 4px 8px; text-align: right; }"
                    }
                }
                body {
                    header {
                        h1 { (self.title) }
                        p { (self.name) " v" (self.version) " | generated " (self.generated) }
                        nav {
                            @for section in &self.sections {
                                a href={ "#" (slug(&section.title)) } { (section.title) }
                            }
                        }
                    }
                    @for section in &self.sections {
                        (section.render())
                    }
                }
            }
        };
        page.into_string()
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create report directory {}", parent.display()))?;
        }
        fs::write(path, self.render())
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        log::info!("Report written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotly::Scatter;

    #[test]
    fn renders_sections_and_plots() {
        let mut report = Report::new("cytoclass", "0.1.0", "Test report");
        let mut section = ReportSection::new("Model Metrics");
        section.add_content(html! { p { "accuracy <0.9>" } });
        let mut plot = Plot::new();
        plot.add_trace(Scatter::new(vec![1, 2], vec![3, 4]));
        section.add_plot(plot);
        report.add_section(section);

        let page = report.render();
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("href=\"#model-metrics\""));
        assert!(page.contains("plot-model-metrics-1"));
        assert!(page.contains("accuracy &lt;0.9&gt;"));
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.html");
        Report::new("cytoclass", "0.1.0", "Empty").save_to_file(&path).unwrap();
        assert!(path.exists());
    }
}
